// src/handlers/institutions.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{CanManageInstitutions, CanMoveInstitutions, RequireRole},
    },
    models::institution::{
        CreateInstitutionPayload, Institution, LevelListing, LevelQuery, MoveInstitutionPayload,
    },
};

// GET /api/institutions
#[utoipa::path(
    get,
    path = "/api/institutions",
    tag = "Institutions",
    params(LevelQuery),
    responses(
        (status = 200, description = "Instituições dentro do escopo do usuário", body = [Institution]),
        (status = 401, description = "Não autorizado")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_institutions(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<LevelQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let institutions = app_state
        .institution_service
        .list_visible(&user, query.include_inactive)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(institutions))
}

// GET /api/institutions/{id}
#[utoipa::path(
    get,
    path = "/api/institutions/{id}",
    tag = "Institutions",
    params(("id" = i64, Path, description = "ID da instituição")),
    responses(
        (status = 200, description = "Instituição", body = Institution),
        (status = 403, description = "Fora do escopo"),
        (status = 404, description = "Não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_institution(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let institution = app_state
        .institution_service
        .get(&user, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(institution))
}

// POST /api/institutions
#[utoipa::path(
    post,
    path = "/api/institutions",
    tag = "Institutions",
    request_body = CreateInstitutionPayload,
    responses(
        (status = 201, description = "Instituição criada", body = Institution),
        (status = 400, description = "Pai inválido ou profundidade máxima"),
        (status = 403, description = "Sem permissão")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_institution(
    State(app_state): State<AppState>,
    locale: Locale,
    guard: RequireRole<CanManageInstitutions>,
    Json(payload): Json<CreateInstitutionPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let institution = app_state
        .institution_service
        .create(&guard.user.0, &payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(institution)))
}

// POST /api/institutions/{id}/move
#[utoipa::path(
    post,
    path = "/api/institutions/{id}/move",
    tag = "Institutions",
    params(("id" = i64, Path, description = "ID da instituição a mover")),
    request_body = MoveInstitutionPayload,
    responses(
        (status = 200, description = "Instituição movida, níveis recalculados", body = Institution),
        (status = 400, description = "Move inválido (ciclo, pai = ela mesma, profundidade)"),
        (status = 403, description = "Sem permissão ou fora do escopo"),
        (status = 404, description = "Não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn move_institution(
    State(app_state): State<AppState>,
    locale: Locale,
    guard: RequireRole<CanMoveInstitutions>,
    Path(id): Path<i64>,
    Json(payload): Json<MoveInstitutionPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let institution = app_state
        .institution_service
        .move_institution(&guard.user.0, id, payload.new_parent_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(institution))
}

// DELETE /api/institutions/{id}
#[utoipa::path(
    delete,
    path = "/api/institutions/{id}",
    tag = "Institutions",
    params(("id" = i64, Path, description = "ID da instituição")),
    responses(
        (status = 200, description = "Instituição excluída (soft delete)", body = Institution),
        (status = 409, description = "Ainda possui filhas ativas")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_institution(
    State(app_state): State<AppState>,
    locale: Locale,
    guard: RequireRole<CanManageInstitutions>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let institution = app_state
        .institution_service
        .soft_delete(&guard.user.0, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(institution))
}

// POST /api/institutions/{id}/restore
#[utoipa::path(
    post,
    path = "/api/institutions/{id}/restore",
    tag = "Institutions",
    params(("id" = i64, Path, description = "ID da instituição")),
    responses(
        (status = 200, description = "Instituição restaurada", body = Institution),
        (status = 409, description = "Instituição não está excluída")
    ),
    security(("api_jwt" = []))
)]
pub async fn restore_institution(
    State(app_state): State<AppState>,
    locale: Locale,
    guard: RequireRole<CanManageInstitutions>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let institution = app_state
        .institution_service
        .restore(&guard.user.0, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(institution))
}

// GET /api/institutions/level/{level}
#[utoipa::path(
    get,
    path = "/api/institutions/level/{level}",
    tag = "Institutions",
    params(
        ("level" = i32, Path, description = "Nível na árvore (raiz = 1)"),
        LevelQuery
    ),
    responses(
        (status = 200, description = "Instituições do nível, dentro do escopo", body = LevelListing)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_by_level(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(level): Path<i32>,
    Query(query): Query<LevelQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let listing = app_state
        .institution_service
        .by_level(&user, level, query.include_inactive)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(listing))
}
