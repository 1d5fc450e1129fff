// src/routes.rs

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{config::AppState, docs::ApiDoc, handlers, middleware::auth::auth_guard};

pub fn build_router(app_state: AppState) -> Router {
    // Rotas públicas
    let auth_routes = Router::new().route("/login", post(handlers::auth::login));

    // Tudo abaixo exige Bearer válido
    let user_routes = Router::new().route("/me", get(handlers::auth::get_me));

    let institution_routes = Router::new()
        .route(
            "/",
            get(handlers::institutions::list_institutions)
                .post(handlers::institutions::create_institution),
        )
        .route("/level/{level}", get(handlers::institutions::list_by_level))
        .route(
            "/{id}",
            get(handlers::institutions::get_institution)
                .delete(handlers::institutions::delete_institution),
        )
        .route("/{id}/restore", post(handlers::institutions::restore_institution))
        .route("/{id}/move", post(handlers::institutions::move_institution));

    let hierarchy_routes = Router::new()
        .route("/", get(handlers::hierarchy::get_hierarchy))
        .route("/validate", get(handlers::hierarchy::validate_hierarchy))
        .route("/{id}/subtree", get(handlers::hierarchy::get_subtree))
        .route("/{id}/path", get(handlers::hierarchy::get_path));

    let resource_routes = Router::new()
        .route(
            "/",
            get(handlers::resources::list_resources).post(handlers::resources::create_resource),
        )
        .route("/{id}", get(handlers::resources::get_resource));

    let protected_routes = Router::new()
        .nest("/api/users", user_routes)
        .nest("/api/institutions", institution_routes)
        .nest("/api/hierarchy", hierarchy_routes)
        .nest("/api/resources", resource_routes)
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    // Combina tudo no router principal
    Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/auth", auth_routes)
        .merge(protected_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(app_state)
}
