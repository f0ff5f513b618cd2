/// Refresh Token Store
///
/// Persists and manages the opaque long-lived refresh credentials:
/// - Secrets are cryptographically random 64-character strings
/// - Only the SHA-256 digest is stored (never the plaintext)
/// - Single-use: rotation revokes the presented token atomically
/// - Reuse of a revoked token revokes every active token of its owner
/// - Per-user active tokens are capped, oldest revoked first

use chrono::{Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AuthError};
use crate::models::{RefreshTokenRecord, User};

// Matches what a User-Agent header reasonably needs
const DEVICE_INFO_MAX_LENGTH: usize = 500;

/// Per-request client metadata recorded alongside a refresh token.
#[derive(Debug, Clone, Default)]
pub struct DeviceContext {
    pub ip_address: Option<String>,
    pub device_info: Option<String>,
}

/// Generate a new cryptographically secure refresh secret
///
/// 64 random alphanumeric characters from the thread-local CSPRNG,
/// well above 256 bits of entropy. The plaintext goes to the client
/// exactly once; the server keeps only the digest.
pub fn generate_refresh_secret() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}

/// SHA-256 hex digest of a refresh secret, used for storage and lookup.
pub(crate) fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Insert a new active token row for a user.
pub async fn save_refresh_token(
    pool: &PgPool,
    user_id: Uuid,
    token: &str,
    expiry_days: i64,
    context: &DeviceContext,
) -> Result<(), AppError> {
    let token_hash = hash_token(token);
    let now = Utc::now();
    let expires_at = now + Duration::days(expiry_days);
    let device_info = context
        .device_info
        .as_deref()
        .map(|s| s.chars().take(DEVICE_INFO_MAX_LENGTH).collect::<String>());

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens
            (id, user_id, token_hash, created_at, expires_at, ip_address, device_info)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(token_hash)
    .bind(now)
    .bind(expires_at)
    .bind(context.ip_address.as_deref())
    .bind(device_info)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn find_by_hash(
    pool: &PgPool,
    token_hash: &str,
) -> Result<Option<RefreshTokenRecord>, AppError> {
    let record = sqlx::query_as::<_, RefreshTokenRecord>(
        r#"
        SELECT id, user_id, token_hash, created_at, expires_at, revoked_at,
               ip_address, device_info
        FROM refresh_tokens
        WHERE token_hash = $1
        "#,
    )
    .bind(token_hash)
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

/// Validate a presented refresh secret and claim it for rotation.
///
/// Rejection reasons, in order:
/// 1. Unknown digest
/// 2. Already revoked: reuse detected, every active token of the owner
///    is revoked before rejecting
/// 3. Expired
/// 4. Owner inactive or soft-deleted
///
/// On success the presented token is atomically marked revoked via a
/// conditional update; of two concurrent refreshes with the same
/// token, exactly one claims the row. The loser is handled as reuse,
/// cascade included - a legitimate retry and a thief are
/// indistinguishable here.
pub async fn validate_for_rotation(
    pool: &PgPool,
    token: &str,
) -> Result<(RefreshTokenRecord, User), AppError> {
    let token_hash = hash_token(token);

    let record = match find_by_hash(pool, &token_hash).await? {
        Some(record) => record,
        None => {
            tracing::warn!("Unknown refresh token presented");
            return Err(AppError::Auth(AuthError::InvalidRefreshToken));
        }
    };

    if record.is_revoked() {
        tracing::warn!(
            user_id = %record.user_id,
            token_id = %record.id,
            "Revoked refresh token presented, revoking all active tokens for user"
        );
        revoke_all_for_user(pool, record.user_id).await?;
        return Err(AppError::Auth(AuthError::RefreshTokenRevoked));
    }

    if record.is_expired() {
        tracing::info!(user_id = %record.user_id, "Refresh token expired");
        return Err(AppError::Auth(AuthError::RefreshTokenExpired));
    }

    let user = User::find_by_id(pool, record.user_id).await?;
    let user = match user {
        Some(user) if user.is_authenticatable() => user,
        _ => {
            tracing::warn!(user_id = %record.user_id, "Refresh attempt for inactive account");
            return Err(AppError::Auth(AuthError::AccountInactive));
        }
    };

    if !claim_for_rotation(pool, record.id).await? {
        // A concurrent refresh rotated this token between the lookup
        // and the claim. The token is revoked now, so this caller gets
        // the reuse treatment.
        tracing::warn!(
            user_id = %record.user_id,
            token_id = %record.id,
            "Lost rotation race, treating as reuse"
        );
        revoke_all_for_user(pool, record.user_id).await?;
        return Err(AppError::Auth(AuthError::RefreshTokenRevoked));
    }

    Ok((record, user))
}

/// Compare-and-swap on the unrevoked condition. True iff this caller
/// performed the Active -> Revoked transition.
async fn claim_for_rotation(pool: &PgPool, token_id: Uuid) -> Result<bool, AppError> {
    let result = sqlx::query(
        "UPDATE refresh_tokens SET revoked_at = $2 WHERE id = $1 AND revoked_at IS NULL",
    )
    .bind(token_id)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Revoke a single token by digest. Idempotent: revoking an absent or
/// already-revoked token is a no-op, so callers (logout) reveal
/// nothing about whether the token existed.
pub async fn revoke_by_hash(pool: &PgPool, token_hash: &str) -> Result<(), AppError> {
    sqlx::query(
        "UPDATE refresh_tokens SET revoked_at = $2 \
         WHERE token_hash = $1 AND revoked_at IS NULL",
    )
    .bind(token_hash)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// Revoke every active token a user holds. The theft-detection
/// cascade and logout-all-devices both land here.
pub async fn revoke_all_for_user(pool: &PgPool, user_id: Uuid) -> Result<(), AppError> {
    let result = sqlx::query(
        "UPDATE refresh_tokens SET revoked_at = $2 \
         WHERE user_id = $1 AND revoked_at IS NULL",
    )
    .bind(user_id)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    tracing::info!(
        user_id = %user_id,
        revoked = result.rows_affected(),
        "All refresh tokens revoked for user"
    );
    Ok(())
}

/// Revoke active tokens beyond the newest `keep`, oldest first.
/// Invoked after every successful issuance.
pub async fn prune_excess(pool: &PgPool, user_id: Uuid, keep: i64) -> Result<(), AppError> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        UPDATE refresh_tokens SET revoked_at = $3
        WHERE user_id = $1
          AND revoked_at IS NULL
          AND expires_at > $3
          AND id NOT IN (
              SELECT id FROM refresh_tokens
              WHERE user_id = $1 AND revoked_at IS NULL AND expires_at > $3
              ORDER BY created_at DESC
              LIMIT $2
          )
        "#,
    )
    .bind(user_id)
    .bind(keep)
    .bind(now)
    .execute(pool)
    .await?;

    if result.rows_affected() > 0 {
        tracing::info!(
            user_id = %user_id,
            pruned = result.rows_affected(),
            "Pruned refresh tokens beyond the per-user cap"
        );
    }
    Ok(())
}
