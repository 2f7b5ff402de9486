use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::jwt::{JwtConfig, TokenKind};
use crate::models::user::{AuthResponse, DbUser, LoginRequest, RegisterRequest};
use crate::services::user::{ensure_email_available, fetch_user, get_user_by_email};
use crate::utils::{hash_password, utc_now, verify_password};

pub async fn register(
    pool: &SqlitePool,
    jwt: &JwtConfig,
    body: RegisterRequest,
) -> AppResult<AuthResponse> {
    ensure_email_available(pool, &body.email, None).await?;

    let password_hash = hash_password(&body.password)?;
    let now = utc_now();
    let user_id = Uuid::new_v4();

    // Self-registration always yields a regular user; admins are seeded out
    // of band.
    sqlx::query(
        "INSERT INTO users (id, name, email, password_hash, role, created_at, updated_at) VALUES (?, ?, ?, ?, 'user', ?, ?)",
    )
    .bind(user_id)
    .bind(&body.name)
    .bind(&body.email)
    .bind(password_hash)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    let user = fetch_user(pool, user_id).await?;
    issue_tokens(pool, jwt, user).await
}

pub async fn login(pool: &SqlitePool, jwt: &JwtConfig, body: LoginRequest) -> AppResult<AuthResponse> {
    let user = get_user_by_email(pool, &body.email)
        .await?
        .ok_or_else(|| AppError::unauthorized("incorrect email or password"))?;

    if !verify_password(&body.password, &user.password_hash)? {
        return Err(AppError::unauthorized("incorrect email or password"));
    }

    issue_tokens(pool, jwt, user).await
}

/// Rotate a refresh token: verify the JWT, match the stored hash, revoke
/// the used row and hand out a fresh pair. Every failure collapses to the
/// same Unauthorized.
pub async fn refresh(pool: &SqlitePool, jwt: &JwtConfig, refresh_token: &str) -> AppResult<AuthResponse> {
    let claims = jwt
        .decode(refresh_token, TokenKind::Refresh)
        .map_err(|_| AppError::unauthorized("Please authenticate"))?;

    let hash = token_hash(refresh_token);
    let revoked = revoke_token(pool, claims.sub, &hash).await?;
    if !revoked {
        return Err(AppError::unauthorized("Please authenticate"));
    }

    let user = fetch_user(pool, claims.sub)
        .await
        .map_err(|_| AppError::unauthorized("Please authenticate"))?;

    issue_tokens(pool, jwt, user).await
}

/// Revoke the presented refresh token. Idempotent: logging out twice, or
/// with a token that was never stored, is not an error.
pub async fn logout(pool: &SqlitePool, jwt: &JwtConfig, refresh_token: &str) -> AppResult<()> {
    if let Ok(claims) = jwt.decode(refresh_token, TokenKind::Refresh) {
        let hash = token_hash(refresh_token);
        revoke_token(pool, claims.sub, &hash).await?;
    }

    Ok(())
}

async fn issue_tokens(pool: &SqlitePool, jwt: &JwtConfig, user: DbUser) -> AppResult<AuthResponse> {
    let access_token = jwt.encode_access(user.id)?;
    let refresh_token = jwt.encode_refresh(user.id)?;

    let now = utc_now();
    let expires_at = now + chrono::Duration::days(jwt.refresh_exp_days);

    // Only the hash is stored; a leaked table does not leak usable tokens.
    sqlx::query(
        "INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4())
    .bind(user.id)
    .bind(token_hash(&refresh_token))
    .bind(expires_at)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(AuthResponse {
        access_token,
        refresh_token,
        user: user.try_into()?,
    })
}

async fn revoke_token(pool: &SqlitePool, user_id: Uuid, hash: &str) -> AppResult<bool> {
    let result = sqlx::query(
        "UPDATE refresh_tokens SET revoked_at = ? WHERE user_id = ? AND token_hash = ? AND revoked_at IS NULL",
    )
    .bind(utc_now())
    .bind(user_id)
    .bind(hash)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

fn token_hash(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
