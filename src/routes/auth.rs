/// Authentication Routes
///
/// Registration, login, token refresh, logout, and the current-user
/// endpoint. Handlers stay thin: deserialize, capture device context,
/// delegate to the session service, serialize.

use actix_web::{http::header, web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::auth::{AuthenticatedSession, Claims, DeviceContext, NewUser, SessionService};
use crate::error::AppError;
use crate::models::{User, UserResponse};

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: String,
}

/// Authentication response: user snapshot plus the token pair.
#[derive(Serialize)]
pub struct SessionResponse {
    pub user: UserResponse,
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl From<AuthenticatedSession> for SessionResponse {
    fn from(session: AuthenticatedSession) -> Self {
        Self {
            user: session.user.to_response(),
            access_token: session.access_token,
            refresh_token: session.refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: session.expires_in,
        }
    }
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

fn device_context(req: &HttpRequest) -> DeviceContext {
    DeviceContext {
        ip_address: req
            .connection_info()
            .realip_remote_addr()
            .map(str::to_string),
        device_info: req
            .headers()
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    }
}

/// POST /auth/register
///
/// Register a new user. Responds with the public user projection
/// only; registering does not log the caller in.
///
/// # Errors
/// - 400: Validation errors (invalid email/password/name)
/// - 409: Email already registered
pub async fn register(
    form: web::Json<RegisterRequest>,
    sessions: web::Data<SessionService>,
) -> Result<HttpResponse, AppError> {
    let form = form.into_inner();
    let user = sessions
        .register(NewUser {
            email: form.email,
            password: form.password,
            first_name: form.first_name,
            last_name: form.last_name,
        })
        .await?;

    Ok(HttpResponse::Created().json(user.to_response()))
}

/// POST /auth/login
///
/// Authenticate with email and password; returns the token pair.
///
/// # Security Notes
/// - Same error message for "not found" and "wrong password"
/// - The peer address and User-Agent are recorded with the issued
///   refresh token
///
/// # Errors
/// - 400: Validation error (malformed email)
/// - 401: Invalid credentials or inactive account
pub async fn login(
    form: web::Json<LoginRequest>,
    sessions: web::Data<SessionService>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let context = device_context(&req);
    let session = sessions.login(&form.email, &form.password, context).await?;

    Ok(HttpResponse::Ok().json(SessionResponse::from(session)))
}

/// POST /auth/refresh
///
/// Exchange a refresh token for a new pair. The presented token is
/// consumed (rotation); replaying it afterwards revokes every active
/// token of the account.
///
/// # Errors
/// - 401: Invalid, expired, or revoked refresh token; inactive account
pub async fn refresh(
    form: web::Json<RefreshRequest>,
    sessions: web::Data<SessionService>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let context = device_context(&req);
    let session = sessions.refresh(&form.refresh_token, context).await?;

    Ok(HttpResponse::Ok().json(SessionResponse::from(session)))
}

/// POST /auth/logout
///
/// Revoke the presented refresh token. Requires a valid access token;
/// succeeds silently when the refresh token is unknown or already
/// revoked.
///
/// # Errors
/// - 401: Missing/invalid access token, or the refresh token belongs
///   to another user
pub async fn logout(
    form: web::Json<LogoutRequest>,
    claims: web::ReqData<Claims>,
    sessions: web::Data<SessionService>,
) -> Result<HttpResponse, AppError> {
    let caller = claims.user_id()?;
    sessions.logout(&form.refresh_token, caller).await?;

    Ok(HttpResponse::Ok().json(MessageResponse {
        message: "Successfully logged out".to_string(),
    }))
}

/// GET /auth/me
///
/// Current authenticated user, fetched fresh from storage.
///
/// # Errors
/// - 401: Missing or invalid token (handled by middleware)
/// - 404: Account no longer exists
pub async fn current_user(
    claims: web::ReqData<Claims>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;

    let user = User::find_by_id(pool.get_ref(), user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(HttpResponse::Ok().json(user.to_response()))
}
