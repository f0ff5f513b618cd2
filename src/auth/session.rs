/// Session Orchestration
///
/// `SessionService` composes the password hasher, the token issuer,
/// and the refresh token store into the register/login/refresh/logout
/// operations the HTTP layer exposes. Configuration is injected once
/// at construction and never read from the environment here.

use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::jwt::generate_access_token;
use crate::auth::password::{hash_password, verify_password};
use crate::auth::refresh_token::{
    find_by_hash, generate_refresh_secret, hash_token, prune_excess, revoke_by_hash,
    save_refresh_token, validate_for_rotation, DeviceContext,
};
use crate::configuration::AuthSettings;
use crate::error::{AppError, AuthError};
use crate::models::User;
use crate::validators::{normalize_email, normalize_name};

/// Registration input after HTTP-layer deserialization.
#[derive(Debug)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// A freshly authenticated session: the user snapshot plus the token
/// pair. `refresh_token` is the plaintext secret; this struct is the
/// only place it ever exists server-side.
#[derive(Debug)]
pub struct AuthenticatedSession {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

pub struct SessionService {
    pool: PgPool,
    settings: AuthSettings,
}

impl SessionService {
    pub fn new(pool: PgPool, settings: AuthSettings) -> Self {
        Self { pool, settings }
    }

    /// Register a new account with the default role.
    ///
    /// # Errors
    /// - Validation for malformed email/name/password
    /// - Conflict when the normalized email is already registered
    pub async fn register(&self, new_user: NewUser) -> Result<User, AppError> {
        let email = normalize_email(&new_user.email)?;
        let first_name = normalize_name("first_name", new_user.first_name.as_deref())?;
        let last_name = normalize_name("last_name", new_user.last_name.as_deref())?;

        if User::email_taken(&self.pool, &email).await? {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let password_hash = hash_password(&new_user.password, self.settings.bcrypt_cost)?;

        let user = User::insert(
            &self.pool,
            &email,
            &password_hash,
            first_name.as_deref(),
            last_name.as_deref(),
        )
        .await?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Authenticate with email and password, minting a token pair.
    ///
    /// Unknown email and wrong password produce the same error; a
    /// deactivated account gets its own, checked before the password
    /// so a correct guess against a dead account learns nothing extra.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        context: DeviceContext,
    ) -> Result<AuthenticatedSession, AppError> {
        let email = normalize_email(email)?;

        let user = User::find_by_email(&self.pool, &email)
            .await?
            .ok_or(AppError::Auth(AuthError::InvalidCredentials))?;

        if !user.is_authenticatable() {
            tracing::warn!(user_id = %user.id, "Login attempt on inactive account");
            return Err(AppError::Auth(AuthError::AccountInactive));
        }

        if !verify_password(password, &user.password_hash)? {
            tracing::warn!(user_id = %user.id, "Login attempt with wrong password");
            return Err(AppError::Auth(AuthError::InvalidCredentials));
        }

        let session = self.issue_session(user, &context).await?;
        tracing::info!(user_id = %session.user.id, "User logged in");
        Ok(session)
    }

    /// Rotate a refresh token: the presented token is consumed and a
    /// new pair is issued. Rejections surface as Unauthorized; the
    /// store handles the reuse-detection cascade internally.
    pub async fn refresh(
        &self,
        refresh_token: &str,
        context: DeviceContext,
    ) -> Result<AuthenticatedSession, AppError> {
        let (rotated, user) = validate_for_rotation(&self.pool, refresh_token).await?;

        let session = self.issue_session(user, &context).await?;
        tracing::info!(
            user_id = %session.user.id,
            rotated_token_id = %rotated.id,
            "Refresh token rotated"
        );
        Ok(session)
    }

    /// Revoke one refresh token on behalf of its owner.
    ///
    /// An unknown or already-revoked token succeeds silently so the
    /// response does not reveal whether it ever existed. A token owned
    /// by a different user is refused.
    pub async fn logout(&self, refresh_token: &str, caller: Uuid) -> Result<(), AppError> {
        let token_hash = hash_token(refresh_token);

        let record = match find_by_hash(&self.pool, &token_hash).await? {
            Some(record) => record,
            None => return Ok(()),
        };

        if record.user_id != caller {
            tracing::warn!(
                user_id = %caller,
                owner_id = %record.user_id,
                "Logout with a token owned by another user"
            );
            return Err(AppError::Auth(AuthError::TokenOwnershipMismatch));
        }

        revoke_by_hash(&self.pool, &token_hash).await?;
        tracing::info!(user_id = %caller, "Refresh token revoked on logout");
        Ok(())
    }

    /// Mint an access token, persist a fresh refresh token with the
    /// caller's device context, and prune beyond the per-user cap.
    async fn issue_session(
        &self,
        user: User,
        context: &DeviceContext,
    ) -> Result<AuthenticatedSession, AppError> {
        let access_token = generate_access_token(&user, &self.settings)?;
        let refresh_token = generate_refresh_secret();

        save_refresh_token(
            &self.pool,
            user.id,
            &refresh_token,
            self.settings.refresh_token_expiry_days,
            context,
        )
        .await?;

        prune_excess(&self.pool, user.id, self.settings.max_active_tokens).await?;

        Ok(AuthenticatedSession {
            user,
            access_token,
            refresh_token,
            expires_in: self.settings.access_token_expiry,
        })
    }
}
