// src/handlers/hierarchy.rs

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use validator::Validate;

use crate::{
    common::{
        error::{ApiError, AppError},
        hierarchy::{TreeViewOptions, MAX_TREE_DEPTH},
    },
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{RequireRole, SuperAdminOnly},
    },
    models::institution::{
        HierarchyNode, HierarchyQuery, HierarchyResponse, HierarchyValidationReport, PathEntry,
        SubtreeQuery,
    },
};

const DEFAULT_SUBTREE_DEPTH: u32 = 2;

// GET /api/hierarchy
#[utoipa::path(
    get,
    path = "/api/hierarchy",
    tag = "Hierarchy",
    params(HierarchyQuery),
    responses(
        (status = 200, description = "Árvore a partir das raízes visíveis", body = HierarchyResponse),
        (status = 400, description = "Parâmetros inválidos")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_hierarchy(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<HierarchyQuery>,
) -> Result<impl IntoResponse, ApiError> {
    query
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let options = TreeViewOptions {
        max_depth: query.max_depth.unwrap_or(MAX_TREE_DEPTH as u32),
        include_inactive: query.include_inactive,
        expand_all: query.expand_all,
    };

    let response = app_state
        .institution_service
        .hierarchy(&user, options)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(response))
}

// GET /api/hierarchy/{id}/subtree
#[utoipa::path(
    get,
    path = "/api/hierarchy/{id}/subtree",
    tag = "Hierarchy",
    params(("id" = i64, Path, description = "ID da instituição"), SubtreeQuery),
    responses(
        (status = 200, description = "Subárvore", body = HierarchyNode),
        (status = 403, description = "Fora do escopo"),
        (status = 404, description = "Não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_subtree(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    Query(query): Query<SubtreeQuery>,
) -> Result<impl IntoResponse, ApiError> {
    query
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let node = app_state
        .institution_service
        .subtree(
            &user,
            id,
            query.depth.unwrap_or(DEFAULT_SUBTREE_DEPTH),
            query.include_inactive,
        )
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(node))
}

// GET /api/hierarchy/{id}/path
#[utoipa::path(
    get,
    path = "/api/hierarchy/{id}/path",
    tag = "Hierarchy",
    params(("id" = i64, Path, description = "ID da instituição")),
    responses(
        (status = 200, description = "Caminho da raiz até a instituição", body = [PathEntry])
    ),
    security(("api_jwt" = []))
)]
pub async fn get_path(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let path = app_state
        .institution_service
        .path(&user, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(path))
}

// GET /api/hierarchy/validate
#[utoipa::path(
    get,
    path = "/api/hierarchy/validate",
    tag = "Hierarchy",
    responses(
        (status = 200, description = "Órfãos, níveis inconsistentes e ciclos", body = HierarchyValidationReport),
        (status = 403, description = "Apenas superadmin")
    ),
    security(("api_jwt" = []))
)]
pub async fn validate_hierarchy(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<SuperAdminOnly>,
) -> Result<impl IntoResponse, ApiError> {
    let report = app_state
        .institution_service
        .validate_hierarchy()
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(report))
}
