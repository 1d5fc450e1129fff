// src/models/auth.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

// ---
// Cargos conhecidos pelo sistema
// ---
// Conjunto fechado: qualquer nome fora daqui é tratado como "sem acesso".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    SuperAdmin,
    RegionAdmin,
    RegionOperator,
    SektorAdmin,
    SektorOperator,
    SchoolAdmin,
    DeputyDirector,
    Teacher,
}

impl Role {
    #[cfg(test)]
    pub const ALL: [Role; 8] = [
        Role::SuperAdmin,
        Role::RegionAdmin,
        Role::RegionOperator,
        Role::SektorAdmin,
        Role::SektorOperator,
        Role::SchoolAdmin,
        Role::DeputyDirector,
        Role::Teacher,
    ];

    /// Converte o nome gravado no banco. Aceita os nomes locais (az) como apelidos.
    pub fn from_name(name: &str) -> Option<Role> {
        match name.trim().to_lowercase().as_str() {
            "superadmin" => Some(Role::SuperAdmin),
            "regionadmin" => Some(Role::RegionAdmin),
            "regionoperator" => Some(Role::RegionOperator),
            "sektoradmin" => Some(Role::SektorAdmin),
            "sektoroperator" => Some(Role::SektorOperator),
            "schooladmin" | "məktəbadmin" | "mektebadmin" => Some(Role::SchoolAdmin),
            "müavin" | "müdir_müavini" => Some(Role::DeputyDirector),
            "teacher" | "müəllim" => Some(Role::Teacher),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "superadmin",
            Role::RegionAdmin => "regionadmin",
            Role::RegionOperator => "regionoperator",
            Role::SektorAdmin => "sektoradmin",
            Role::SektorOperator => "sektoroperator",
            Role::SchoolAdmin => "schooladmin",
            Role::DeputyDirector => "müavin",
            Role::Teacher => "teacher",
        }
    }
}

// Representa um usuário vindo do banco de dados
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub email: String,

    #[serde(skip_serializing)] // IMPORTANTE para segurança
    #[schema(ignore)]
    pub password_hash: String,

    #[schema(example = "sektoradmin")]
    pub role: String,

    // Só o superadmin pode ficar sem instituição
    pub institution_id: Option<i64>,

    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn role(&self) -> Option<Role> {
        Role::from_name(&self.role)
    }

    pub fn is_superadmin(&self) -> bool {
        self.role() == Some(Role::SuperAdmin)
    }
}

// Dados para login
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginUserPayload {
    #[validate(email(message = "O e-mail fornecido é inválido."))]
    #[schema(example = "sektor.admin@edu.az")]
    pub email: String,
    #[validate(length(min = 6, message = "A senha deve ter no mínimo 6 caracteres."))]
    pub password: String,
}

// Resposta de autenticação com o token
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
}

// O escopo resolvido, no formato que o frontend consome
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScopeSummary {
    /// `true` quando não há filtro algum (superadmin)
    pub all: bool,
    pub institution_ids: Vec<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: User,
    pub scope: ScopeSummary,
}

// Estrutura de dados ("claims") dentro do JWT
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Subject (ID do usuário)
    pub exp: usize,  // Expiration time (quando o token expira)
    pub iat: usize,  // Issued At (quando o token foi criado)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_local_aliases() {
        assert_eq!(Role::from_name("məktəbadmin"), Some(Role::SchoolAdmin));
        assert_eq!(Role::from_name("müəllim"), Some(Role::Teacher));
        assert_eq!(Role::from_name(" RegionAdmin "), Some(Role::RegionAdmin));
        assert_eq!(Role::from_name("testadmin"), None);
        assert_eq!(Role::from_name(""), None);
    }

    #[test]
    fn canonical_names_round_trip() {
        for role in Role::ALL {
            assert_eq!(Role::from_name(role.name()), Some(role));
        }
    }
}
