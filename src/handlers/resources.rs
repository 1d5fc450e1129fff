// src/handlers/resources.rs

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
    middleware::{auth::AuthenticatedUser, i18n::Locale},
    models::resource::{CreateResourcePayload, ResourceListQuery, ScopedResource},
};

// GET /api/resources
#[utoipa::path(
    get,
    path = "/api/resources",
    tag = "Resources",
    params(ResourceListQuery),
    responses(
        (status = 200, description = "Registros das instituições do escopo", body = [ScopedResource])
    ),
    security(("api_jwt" = []))
)]
pub async fn list_resources(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<ResourceListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    query
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let resources = app_state
        .resource_service
        .list(&user, &query)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(resources))
}

// GET /api/resources/{id}
#[utoipa::path(
    get,
    path = "/api/resources/{id}",
    tag = "Resources",
    params(("id" = i64, Path, description = "ID do registro")),
    responses(
        (status = 200, description = "Registro", body = ScopedResource),
        (status = 404, description = "Não encontrado ou fora do escopo")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_resource(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let resource = app_state
        .resource_service
        .get(&user, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(resource))
}

// POST /api/resources
#[utoipa::path(
    post,
    path = "/api/resources",
    tag = "Resources",
    request_body = CreateResourcePayload,
    responses(
        (status = 201, description = "Registro criado", body = ScopedResource),
        (status = 403, description = "Instituição fora do escopo")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_resource(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<CreateResourcePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let resource = app_state
        .resource_service
        .create(&user, &payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(resource)))
}
