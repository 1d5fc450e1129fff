use std::collections::HashMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::common::hierarchy::HierarchyViolation;
use crate::common::i18n::I18nStore;
use crate::middleware::i18n::Locale;

// Erro de serviço: o que as camadas de negócio e de banco devolvem.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Credenciais inválidas")]
    InvalidCredentials,

    #[error("Token inválido")]
    InvalidToken,

    #[error("Usuário desativado")]
    InactiveUser,

    #[error("Usuário não encontrado")]
    UserNotFound,

    #[error("Cargo '{0}' sem permissão")]
    RoleForbidden(String),

    #[error("Instituição {0} fora do escopo")]
    OutOfScope(i64),

    #[error("Instituição {0} não encontrada")]
    InstitutionNotFound(i64),

    #[error("Recurso {0} não encontrado")]
    ResourceNotFound(i64),

    #[error("Instituição {0} possui filhas ativas")]
    InstitutionHasChildren(i64),

    #[error("Instituição {0} não está excluída")]
    InstitutionNotDeleted(i64),

    // Move rejeitado (pai = ele mesmo, ciclo, profundidade)
    #[error("Move inválido: {0}")]
    InvalidMove(HierarchyViolation),

    // Criação/restauração num lugar inválido da árvore
    #[error("Posição inválida na hierarquia: {0}")]
    InvalidPlacement(HierarchyViolation),

    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de Bcrypt: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

// Erro de API: o que vai para o cliente, já traduzido.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error: String,
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.details {
            Some(details) => json!({ "error": self.error, "details": details }),
            None => json!({ "error": self.error }),
        };
        (self.status, Json(body)).into_response()
    }
}

fn violation_message(violation: &HierarchyViolation) -> (&'static str, Vec<(&'static str, String)>) {
    match violation {
        HierarchyViolation::InstitutionNotFound(id) => ("institution_not_found", vec![("id", id.to_string())]),
        HierarchyViolation::SelfParent => ("hierarchy.self_parent", vec![]),
        HierarchyViolation::ParentNotFound(id) => ("hierarchy.parent_not_found", vec![("id", id.to_string())]),
        HierarchyViolation::CyclicParent { .. } => ("hierarchy.cyclic_parent", vec![]),
        HierarchyViolation::DepthExceeded { max, .. } => ("hierarchy.depth_exceeded", vec![("max", max.to_string())]),
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials | AppError::InvalidToken | AppError::UserNotFound => {
                StatusCode::UNAUTHORIZED
            }
            AppError::InactiveUser | AppError::RoleForbidden(_) | AppError::OutOfScope(_) => {
                StatusCode::FORBIDDEN
            }
            AppError::InstitutionNotFound(_) | AppError::ResourceNotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidMove(HierarchyViolation::InstitutionNotFound(_)) => StatusCode::NOT_FOUND,
            AppError::InvalidMove(_) | AppError::InvalidPlacement(_) => StatusCode::BAD_REQUEST,
            AppError::InstitutionHasChildren(_) | AppError::InstitutionNotDeleted(_) => StatusCode::CONFLICT,
            AppError::DatabaseError(_)
            | AppError::InternalServerError(_)
            | AppError::BcryptError(_)
            | AppError::JwtError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Converte para a resposta HTTP no idioma do cliente.
    pub fn to_api_error(self, locale: &Locale, store: &I18nStore) -> ApiError {
        let lang = locale.0.as_str();
        let status = self.status();

        let (key, args): (&str, Vec<(&str, String)>) = match &self {
            AppError::ValidationError(errors) => {
                let mut details = HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .map(|e| {
                            e.message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_else(|| e.code.to_string())
                        })
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                return ApiError {
                    status,
                    error: store.translate(lang, "validation_failed"),
                    details: Some(json!(details)),
                };
            }
            AppError::InvalidCredentials => ("invalid_credentials", vec![]),
            AppError::InvalidToken => ("invalid_token", vec![]),
            AppError::InactiveUser => ("inactive_user", vec![]),
            AppError::UserNotFound => ("user_not_found", vec![]),
            AppError::RoleForbidden(role) => ("role_forbidden", vec![("role", role.clone())]),
            AppError::OutOfScope(id) => ("out_of_scope", vec![("id", id.to_string())]),
            AppError::InstitutionNotFound(id) => ("institution_not_found", vec![("id", id.to_string())]),
            AppError::ResourceNotFound(id) => ("resource_not_found", vec![("id", id.to_string())]),
            AppError::InstitutionHasChildren(id) => ("institution_has_children", vec![("id", id.to_string())]),
            AppError::InstitutionNotDeleted(id) => ("institution_not_deleted", vec![("id", id.to_string())]),
            AppError::InvalidMove(violation) | AppError::InvalidPlacement(violation) => {
                let (key, args) = violation_message(violation);
                return ApiError {
                    status,
                    error: store.translate_with(lang, key, &args),
                    details: Some(json!({ "reason": key })),
                };
            }
            // O `tracing` loga a mensagem detalhada; o cliente só vê a genérica.
            e => {
                tracing::error!("Erro Interno do Servidor: {:?}", e);
                ("internal_error", vec![])
            }
        };

        ApiError {
            status,
            error: store.translate_with(lang, key, &args),
            details: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    fn store() -> I18nStore {
        I18nStore::load().unwrap()
    }

    #[test]
    fn move_rejections_are_bad_requests_with_reason() {
        let err = AppError::InvalidMove(HierarchyViolation::CyclicParent {
            institution_id: 1,
            parent_id: 3,
        });
        let api = err.to_api_error(&Locale("az".into()), &store());
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        assert_eq!(api.error, "Təşkilatı öz alt təşkilatına köçürə bilməzsiniz.");
        assert_eq!(api.details, Some(json!({ "reason": "hierarchy.cyclic_parent" })));

        let err = AppError::InvalidMove(HierarchyViolation::InstitutionNotFound(4));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn validation_errors_carry_field_details() {
        #[derive(Validate)]
        struct Payload {
            #[validate(length(min = 1, message = "obrigatório"))]
            name: String,
        }

        let errors = Payload { name: String::new() }.validate().unwrap_err();
        let api = AppError::ValidationError(errors).to_api_error(&Locale("en".into()), &store());
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        assert_eq!(api.details, Some(json!({ "name": ["obrigatório"] })));
    }

    #[test]
    fn internal_errors_are_generic() {
        let err = AppError::InternalServerError(anyhow::anyhow!("connection reset"));
        let api = err.to_api_error(&Locale("pt".into()), &store());
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.error, "Ocorreu um erro inesperado.");
    }
}
