use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{abilities_for, Ability, Principal, Role};
use crate::errors::AppError;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: Arc<Vec<u8>>,
    pub access_exp_minutes: i64,
    pub refresh_exp_days: i64,
}

impl JwtConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let secret =
            std::env::var("JWT_SECRET").map_err(|_| AppError::configuration("JWT_SECRET not set"))?;
        let access_exp_minutes = std::env::var("JWT_ACCESS_EXP_MINUTES")
            .map(|val| val.parse::<i64>())
            .unwrap_or(Ok(30))
            .map_err(|_| AppError::configuration("JWT_ACCESS_EXP_MINUTES must be a valid integer"))?;
        let refresh_exp_days = std::env::var("JWT_REFRESH_EXP_DAYS")
            .map(|val| val.parse::<i64>())
            .unwrap_or(Ok(30))
            .map_err(|_| AppError::configuration("JWT_REFRESH_EXP_DAYS must be a valid integer"))?;

        Ok(Self {
            secret: Arc::new(secret.into_bytes()),
            access_exp_minutes,
            refresh_exp_days,
        })
    }

    pub fn encode_access(&self, user_id: Uuid) -> Result<String, AppError> {
        self.encode(user_id, TokenKind::Access, chrono::Duration::minutes(self.access_exp_minutes))
    }

    pub fn encode_refresh(&self, user_id: Uuid) -> Result<String, AppError> {
        self.encode(user_id, TokenKind::Refresh, chrono::Duration::days(self.refresh_exp_days))
    }

    fn encode(
        &self,
        user_id: Uuid,
        kind: TokenKind,
        ttl: chrono::Duration,
    ) -> Result<String, AppError> {
        let now = chrono::Utc::now();
        // jti keeps tokens unique even when two are minted within the same
        // second, which matters for the stored refresh-token hashes.
        let claims = Claims {
            sub: user_id,
            exp: (now + ttl).timestamp() as usize,
            iat: now.timestamp() as usize,
            jti: Uuid::new_v4(),
            kind,
        };

        jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(&self.secret))
            .map_err(|err| AppError::token(err.to_string()))
    }

    pub fn decode(&self, token: &str, expected: TokenKind) -> Result<Claims, AppError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let claims = jsonwebtoken::decode::<Claims>(
            token,
            &DecodingKey::from_secret(&self.secret),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|err| AppError::token(err.to_string()))?;

        if claims.kind != expected {
            return Err(AppError::token("wrong token type"));
        }

        Ok(claims)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: usize,
    pub iat: usize,
    pub jti: Uuid,
    pub kind: TokenKind,
}

/// Per-request authentication context: the resolved principal and its
/// freshly built ability. Extracted from the bearer token; the user row is
/// loaded so the role reflects the database, not the token.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub principal: Principal,
    pub ability: Ability,
}

impl AuthContext {
    pub fn user_id(&self) -> Uuid {
        self.principal.id
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::unauthorized("Please authenticate"))?;

        let claims = state.jwt.decode(token, TokenKind::Access)?;

        let role: Option<String> = sqlx::query_scalar("SELECT role FROM users WHERE id = ?")
            .bind(claims.sub)
            .fetch_optional(&state.pool)
            .await?;

        let role = role.ok_or_else(|| AppError::unauthorized("Please authenticate"))?;
        let principal = Principal::new(claims.sub, Role::parse(&role));
        let ability = abilities_for(&principal);

        Ok(AuthContext { principal, ability })
    }
}
