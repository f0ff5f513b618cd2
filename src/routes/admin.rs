/// Admin user-management routes
///
/// Field-level CRUD on user records, restricted to callers whose role
/// passes the user-management capability check.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::Claims;
use crate::error::{AppError, AuthError, ValidationError};
use crate::models::{Role, User, UserResponse};

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

#[derive(Deserialize)]
pub struct ListUsersQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub role: Option<Role>,
}

#[derive(Serialize)]
pub struct UserListResponse {
    pub users: Vec<UserResponse>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

#[derive(Deserialize)]
pub struct AdminUpdateUserRequest {
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub is_email_verified: Option<bool>,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

fn require_user_management(claims: &Claims) -> Result<(), AppError> {
    if !claims.role.can_manage_users() {
        tracing::warn!(user_id = %claims.sub, role = %claims.role, "Admin route denied");
        return Err(AppError::Auth(AuthError::InsufficientPermissions));
    }
    Ok(())
}

fn parse_user_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| {
        AppError::Validation(ValidationError::InvalidFormat(
            "user id has invalid format".to_string(),
        ))
    })
}

/// GET /admin/users
///
/// Paginated listing of non-deleted users, optionally filtered by
/// role.
pub async fn list_users(
    query: web::Query<ListUsersQuery>,
    claims: web::ReqData<Claims>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    require_user_management(&claims)?;

    let page = query.page.unwrap_or(1).max(1);
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let offset = (page - 1) * limit;

    let users = User::list(pool.get_ref(), limit, offset, query.role).await?;
    let total = User::count(pool.get_ref(), query.role).await?;

    Ok(HttpResponse::Ok().json(UserListResponse {
        users: users.iter().map(User::to_response).collect(),
        total,
        page,
        limit,
    }))
}

/// GET /admin/users/{id}
pub async fn get_user(
    path: web::Path<String>,
    claims: web::ReqData<Claims>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    require_user_management(&claims)?;
    let user_id = parse_user_id(&path)?;

    let user = User::find_by_id(pool.get_ref(), user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(HttpResponse::Ok().json(user.to_response()))
}

/// PATCH /admin/users/{id}
///
/// Partial update of role, active flag, and email-verified flag.
pub async fn update_user(
    path: web::Path<String>,
    form: web::Json<AdminUpdateUserRequest>,
    claims: web::ReqData<Claims>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    require_user_management(&claims)?;
    let user_id = parse_user_id(&path)?;

    let updated = User::admin_update(
        pool.get_ref(),
        user_id,
        form.role,
        form.is_active,
        form.is_email_verified,
    )
    .await?
    .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    tracing::info!(user_id = %updated.id, admin_id = %claims.sub, "User updated by admin");
    Ok(HttpResponse::Ok().json(updated.to_response()))
}

/// DELETE /admin/users/{id}
///
/// Soft delete: the account is deactivated and excluded from every
/// live-user query from here on.
pub async fn delete_user(
    path: web::Path<String>,
    claims: web::ReqData<Claims>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    require_user_management(&claims)?;
    let user_id = parse_user_id(&path)?;

    let deleted = User::soft_delete(pool.get_ref(), user_id).await?;
    if !deleted {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    tracing::info!(user_id = %user_id, admin_id = %claims.sub, "User soft-deleted by admin");
    Ok(HttpResponse::Ok().json(MessageResponse {
        message: "User deleted successfully".to_string(),
    }))
}
