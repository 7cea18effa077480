use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db::models::{CreateUser, User, UserRole};
use crate::db::UserRepository;
use crate::error::{AppError, AppResult};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
}

pub struct AuthService;

impl AuthService {
    pub fn hash_password(password: &str) -> AppResult<String> {
        Ok(bcrypt::hash(password, bcrypt::DEFAULT_COST)?)
    }

    pub fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
        Ok(bcrypt::verify(password, hash)?)
    }

    /// Create a signed JWT for a user id.
    pub fn create_jwt(config: &Config, user_id: &str) -> AppResult<String> {
        let now = Utc::now();
        let exp = now + Duration::hours(config.jwt.expiration_hours);
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp() as usize,
            exp: exp.timestamp() as usize,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt.secret.as_bytes()),
        )?;

        Ok(token)
    }

    /// Decode and validate a bearer token, returning its claims.
    pub fn decode_jwt(config: &Config, token: &str) -> AppResult<Claims> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(config.jwt.secret.as_bytes()),
            &Validation::default(),
        )?;

        Ok(token_data.claims)
    }

    pub async fn register(
        pool: &SqlitePool,
        config: &Config,
        name: &str,
        mobile: Option<String>,
        email: &str,
        password: &str,
    ) -> AppResult<(User, String)> {
        if password.len() < 6 {
            return Err(AppError::Validation(
                "Password must be at least 6 characters".to_string(),
            ));
        }

        // Emails are stored lowercased; look up the same way.
        let email = email.trim().to_lowercase();

        if UserRepository::find_by_email(pool, &email).await?.is_some() {
            return Err(AppError::BadRequest("User already exists".to_string()));
        }

        let password_hash = Self::hash_password(password)?;
        let user = UserRepository::create(
            pool,
            CreateUser {
                name: name.to_string(),
                mobile,
                email: Some(email),
                password_hash: Some(password_hash),
                role: UserRole::User,
            },
        )
        .await?;

        let token = Self::create_jwt(config, &user.id)?;

        Ok((user, token))
    }

    /// Unknown email and wrong password produce the same rejection, so the
    /// response doesn't reveal which accounts exist.
    pub async fn login(
        pool: &SqlitePool,
        config: &Config,
        email: &str,
        password: &str,
    ) -> AppResult<(User, String)> {
        let email = email.trim().to_lowercase();
        let user = UserRepository::find_by_email(pool, &email)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        let Some(ref hash) = user.password_hash else {
            return Err(AppError::InvalidCredentials);
        };

        if !Self::verify_password(password, hash)? {
            return Err(AppError::InvalidCredentials);
        }

        let token = Self::create_jwt(config, &user.id)?;

        Ok((user, token))
    }

    /// Resolve a bearer token to its user.
    pub async fn user_from_token(
        pool: &SqlitePool,
        config: &Config,
        token: &str,
    ) -> AppResult<User> {
        let claims = Self::decode_jwt(config, token)?;

        UserRepository::find_by_id(pool, &claims.sub)
            .await?
            .ok_or(AppError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.jwt.secret = "test-secret".to_string();
        config
    }

    #[test]
    fn jwt_roundtrip() {
        let config = test_config();
        let token = AuthService::create_jwt(&config, "user-1").unwrap();
        let claims = AuthService::decode_jwt(&config, &token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn jwt_rejects_wrong_secret() {
        let config = test_config();
        let token = AuthService::create_jwt(&config, "user-1").unwrap();

        let mut other = Config::default();
        other.jwt.secret = "different-secret".to_string();
        assert!(AuthService::decode_jwt(&other, &token).is_err());
    }

    #[test]
    fn password_hash_verifies() {
        let hash = AuthService::hash_password("s3cret-pass").unwrap();
        assert!(AuthService::verify_password("s3cret-pass", &hash).unwrap());
        assert!(!AuthService::verify_password("wrong", &hash).unwrap());
    }
}
