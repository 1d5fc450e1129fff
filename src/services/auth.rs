// src/services/auth.rs

use bcrypt::verify;
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};

use crate::{
    common::error::AppError,
    db::UserRepository,
    models::auth::{Claims, User},
};

#[derive(Clone)]
pub struct AuthService {
    user_repo: UserRepository,
    jwt_secret: String,
    ttl_hours: i64,
}

impl AuthService {
    pub fn new(user_repo: UserRepository, jwt_secret: String, ttl_hours: i64) -> Self {
        Self { user_repo, jwt_secret, ttl_hours }
    }

    pub async fn login_user(&self, email: &str, password: &str) -> Result<String, AppError> {
        let user = self.user_repo
            .find_by_email(email)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        let password_clone = password.to_owned();
        let password_hash_clone = user.password_hash.clone();

        // Executa a verificação em um thread separado
        let is_password_valid = tokio::task::spawn_blocking(move || {
            verify(&password_clone, &password_hash_clone)
        })
        .await
        .map_err(|e| anyhow::anyhow!("Falha na task de verificação de senha: {}", e))?
        ?;

        if !is_password_valid {
            return Err(AppError::InvalidCredentials);
        }

        if !user.is_active {
            return Err(AppError::InactiveUser);
        }

        tracing::info!(user_id = user.id, role = %user.role, "🔑 Login realizado");
        self.create_token(user.id)
    }

    /// Decodifica o token e devolve o usuário ativo dono dele.
    pub async fn validate_token(&self, token: &str) -> Result<User, AppError> {
        let user_id = self.decode_subject(token)?;

        let user = self.user_repo
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::UserNotFound)?;

        if !user.is_active {
            return Err(AppError::InactiveUser);
        }

        Ok(user)
    }

    fn decode_subject(&self, token: &str) -> Result<i64, AppError> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_ref()),
            &Validation::default(),
        )
        .map_err(|_| AppError::InvalidToken)?;

        token_data.claims.sub.parse().map_err(|_| AppError::InvalidToken)
    }

    fn create_token(&self, user_id: i64) -> Result<String, AppError> {
        let now = Utc::now();
        let expires_at = now + chrono::Duration::hours(self.ttl_hours);

        let claims = Claims {
            sub: user_id.to_string(),
            exp: expires_at.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_ref()),
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    fn service(secret: &str, ttl_hours: i64) -> AuthService {
        // Pool preguiçosa: nenhum teste aqui chega a tocar no banco
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        AuthService::new(UserRepository::new(pool), secret.to_string(), ttl_hours)
    }

    #[tokio::test]
    async fn token_round_trips_the_subject() {
        let auth = service("segredo", 1);
        let token = auth.create_token(42).unwrap();
        assert_eq!(auth.decode_subject(&token).unwrap(), 42);
    }

    #[tokio::test]
    async fn rejects_foreign_and_expired_tokens() {
        let token = service("outro-segredo", 1).create_token(42).unwrap();
        assert!(matches!(service("segredo", 1).decode_subject(&token), Err(AppError::InvalidToken)));

        let expired = service("segredo", -2).create_token(42).unwrap();
        assert!(matches!(service("segredo", 1).decode_subject(&expired), Err(AppError::InvalidToken)));

        assert!(matches!(service("segredo", 1).decode_subject("lixo"), Err(AppError::InvalidToken)));
    }
}
