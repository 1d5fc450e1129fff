// src/services/resource_service.rs

use serde_json::json;

use crate::common::error::AppError;
use crate::db::{InstitutionRepository, ResourceRepository};
use crate::models::auth::User;
use crate::models::resource::{CreateResourcePayload, ResourceListQuery, ScopedResource};
use crate::services::scope_service::ScopeService;

#[derive(Clone)]
pub struct ResourceService {
    repo: ResourceRepository,
    institution_repo: InstitutionRepository,
    scope_service: ScopeService,
}

impl ResourceService {
    pub fn new(
        repo: ResourceRepository,
        institution_repo: InstitutionRepository,
        scope_service: ScopeService,
    ) -> Self {
        Self { repo, institution_repo, scope_service }
    }

    /// Listagem filtrada pelo escopo do usuário.
    pub async fn list(&self, actor: &User, query: &ResourceListQuery) -> Result<Vec<ScopedResource>, AppError> {
        let scope = self.scope_service.resolve_scope(actor).await?;
        if scope.is_empty() {
            // Nem vale a ida ao banco
            return Ok(Vec::new());
        }

        self.repo
            .list(&scope, query.kind.map(|k| k.as_str()), query.limit(), query.offset())
            .await
    }

    /// Fora do escopo responde como inexistente, para não vazar ids.
    pub async fn get(&self, actor: &User, id: i64) -> Result<ScopedResource, AppError> {
        let resource = self.repo
            .find_by_id(id)
            .await?
            .ok_or(AppError::ResourceNotFound(id))?;

        let scope = self.scope_service.resolve_scope(actor).await?;
        if !scope.allows(resource.institution_id) {
            return Err(AppError::ResourceNotFound(id));
        }

        Ok(resource)
    }

    pub async fn create(&self, actor: &User, payload: &CreateResourcePayload) -> Result<ScopedResource, AppError> {
        let institution_id = payload.institution_id;

        match self.institution_repo.find_by_id(institution_id).await? {
            Some(institution) if !institution.is_deleted() => {}
            _ => return Err(AppError::InstitutionNotFound(institution_id)),
        }
        if !self.scope_service.resolve_scope(actor).await?.allows(institution_id) {
            return Err(AppError::OutOfScope(institution_id));
        }

        let body = if payload.payload.is_null() { json!({}) } else { payload.payload.clone() };

        let resource = self.repo
            .create(institution_id, payload.kind.as_str(), &payload.title, &body)
            .await?;

        tracing::info!(
            resource_id = resource.id,
            institution_id,
            kind = %resource.kind,
            actor = actor.id,
            "📄 Recurso criado"
        );

        Ok(resource)
    }
}
