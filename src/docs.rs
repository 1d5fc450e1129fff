// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::login,

        // --- Users ---
        handlers::auth::get_me,

        // --- Institutions ---
        handlers::institutions::list_institutions,
        handlers::institutions::get_institution,
        handlers::institutions::create_institution,
        handlers::institutions::move_institution,
        handlers::institutions::delete_institution,
        handlers::institutions::restore_institution,
        handlers::institutions::list_by_level,

        // --- Hierarchy ---
        handlers::hierarchy::get_hierarchy,
        handlers::hierarchy::get_subtree,
        handlers::hierarchy::get_path,
        handlers::hierarchy::validate_hierarchy,

        // --- Resources ---
        handlers::resources::list_resources,
        handlers::resources::get_resource,
        handlers::resources::create_resource,
    ),
    components(
        schemas(
            // --- Auth ---
            models::auth::User,
            models::auth::LoginUserPayload,
            models::auth::AuthResponse,
            models::auth::ScopeSummary,
            models::auth::MeResponse,

            // --- Institutions ---
            models::institution::Institution,
            models::institution::InstitutionType,
            models::institution::CreateInstitutionPayload,
            models::institution::MoveInstitutionPayload,
            models::institution::LevelListing,

            // --- Hierarchy ---
            models::institution::HierarchyNode,
            models::institution::PathEntry,
            models::institution::HierarchyStats,
            models::institution::HierarchyResponse,
            models::institution::OrphanedInstitution,
            models::institution::LevelInconsistency,
            models::institution::HierarchyAudit,
            models::institution::HierarchyValidationReport,

            // --- Resources ---
            models::resource::ResourceKind,
            models::resource::ScopedResource,
            models::resource::CreateResourcePayload,
        )
    ),
    tags(
        (name = "Auth", description = "Autenticação"),
        (name = "Users", description = "Usuário logado e o seu escopo"),
        (name = "Institutions", description = "Instituições e movimentação na árvore"),
        (name = "Hierarchy", description = "Visões da árvore e auditoria"),
        (name = "Resources", description = "Registros filtrados pelo escopo")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}
