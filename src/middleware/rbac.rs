// src/middleware/rbac.rs

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use std::marker::PhantomData;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{auth::AuthenticatedUser, i18n::Locale},
    models::auth::Role,
};

/// 1. O Trait que define quais cargos passam por uma rota
pub trait RoleRequirement: Send + Sync + 'static {
    fn allowed() -> &'static [Role];
}

/// 2. O Extractor (Guardião). Carrega o usuário já validado.
pub struct RequireRole<T> {
    pub user: AuthenticatedUser,
    _requirement: PhantomData<T>,
}

/// Cargo do usuário está na lista? Cargos desconhecidos nunca passam.
pub fn role_allowed<T: RoleRequirement>(role_name: &str) -> Option<Role> {
    Role::from_name(role_name).filter(|role| T::allowed().contains(role))
}

// 3. Implementação do FromRequestParts
impl<T, S> FromRequestParts<S> for RequireRole<T>
where
    T: RoleRequirement,
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let locale = Locale::from_request_parts(parts, state)
            .await
            .unwrap_or_else(|never| match never {});

        // A. Extrai Usuário (colocado pelo auth_guard)
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;

        // B. Confere o cargo
        match role_allowed::<T>(&user.0.role) {
            Some(_) => Ok(RequireRole {
                user,
                _requirement: PhantomData,
            }),
            None => {
                tracing::warn!(user_id = user.0.id, role = %user.0.role, "Cargo sem permissão para a rota");
                Err(AppError::RoleForbidden(user.0.role.clone())
                    .to_api_error(&locale, &app_state.i18n_store))
            }
        }
    }
}

// ---
// DEFINIÇÃO DOS REQUISITOS (TIPOS)
// ---

/// Mover instituições na árvore
pub struct CanMoveInstitutions;
impl RoleRequirement for CanMoveInstitutions {
    fn allowed() -> &'static [Role] {
        &[Role::SuperAdmin, Role::RegionAdmin]
    }
}

/// Criar, excluir e restaurar instituições
pub struct CanManageInstitutions;
impl RoleRequirement for CanManageInstitutions {
    fn allowed() -> &'static [Role] {
        &[Role::SuperAdmin, Role::RegionAdmin, Role::SektorAdmin]
    }
}

pub struct SuperAdminOnly;
impl RoleRequirement for SuperAdminOnly {
    fn allowed() -> &'static [Role] {
        &[Role::SuperAdmin]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_listed_roles_pass() {
        assert_eq!(role_allowed::<CanMoveInstitutions>("regionadmin"), Some(Role::RegionAdmin));
        assert_eq!(role_allowed::<CanMoveInstitutions>("sektoradmin"), None);
        assert_eq!(role_allowed::<CanManageInstitutions>("sektoradmin"), Some(Role::SektorAdmin));
        assert_eq!(role_allowed::<SuperAdminOnly>("regionadmin"), None);
        assert_eq!(role_allowed::<SuperAdminOnly>("root"), None);
    }
}
