// src/config.rs

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{env, time::Duration};

use crate::{
    common::i18n::I18nStore,
    db::{InstitutionRepository, ResourceRepository, UserRepository},
    services::{
        auth::AuthService, institution_service::InstitutionService,
        resource_service::ResourceService, scope_service::ScopeService,
    },
};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_JWT_TTL_HOURS: i64 = 24 * 7;

// Tudo o que vem do ambiente (.env em desenvolvimento)
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub bind_addr: String,
    pub db_max_connections: u32,
    pub jwt_ttl_hours: i64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL deve ser definida")?;
        let jwt_secret = lookup("JWT_SECRET").context("JWT_SECRET deve ser definido")?;

        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

        let db_max_connections = match lookup("DB_MAX_CONNECTIONS") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("DB_MAX_CONNECTIONS inválido: '{}'", raw))?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let jwt_ttl_hours = match lookup("JWT_TTL_HOURS") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("JWT_TTL_HOURS inválido: '{}'", raw))?,
            None => DEFAULT_JWT_TTL_HOURS,
        };

        Ok(Self {
            database_url,
            jwt_secret,
            bind_addr,
            db_max_connections,
            jwt_ttl_hours,
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub i18n_store: I18nStore,
    pub auth_service: AuthService,
    pub scope_service: ScopeService,
    pub institution_service: InstitutionService,
    pub resource_service: ResourceService,
}

impl AppState {
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        // Conecta ao banco de dados, usando '?' para propagar erros
        let db_pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        Self::from_pool(config, db_pool)
    }

    /// Monta o gráfico de dependências em cima de uma pool já criada.
    pub fn from_pool(config: &Config, db_pool: PgPool) -> anyhow::Result<Self> {
        let i18n_store = I18nStore::load()?;

        let user_repo = UserRepository::new(db_pool.clone());
        let institution_repo = InstitutionRepository::new(db_pool.clone());
        let resource_repo = ResourceRepository::new(db_pool.clone());

        let auth_service = AuthService::new(user_repo, config.jwt_secret.clone(), config.jwt_ttl_hours);
        let scope_service = ScopeService::new(institution_repo.clone(), db_pool.clone());
        let institution_service =
            InstitutionService::new(institution_repo.clone(), scope_service.clone(), db_pool.clone());
        let resource_service = ResourceService::new(resource_repo, institution_repo, scope_service.clone());

        Ok(Self {
            db_pool,
            i18n_store,
            auth_service,
            scope_service,
            institution_service,
            resource_service,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn applies_defaults() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/edu"),
            ("JWT_SECRET", "segredo"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.db_max_connections, 5);
        assert_eq!(config.jwt_ttl_hours, 168);
    }

    #[test]
    fn requires_database_url_and_secret() {
        assert!(Config::from_lookup(lookup(&[("JWT_SECRET", "x")])).is_err());
        assert!(Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://x")])).is_err());
    }

    #[test]
    fn rejects_malformed_numbers() {
        let err = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/edu"),
            ("JWT_SECRET", "segredo"),
            ("DB_MAX_CONNECTIONS", "muitas"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("DB_MAX_CONNECTIONS"));
    }
}
