/// User records and their public projection
///
/// The `User` struct is the full database row, credential hash
/// included. Everything that leaves the process goes through
/// `UserResponse`, which carries no credential material.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AppError;

/// Role tag checked by capability predicates at the handler boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Reviewer,
    Applicant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Reviewer => "REVIEWER",
            Role::Applicant => "APPLICANT",
        }
    }

    /// Capability predicate for the admin user-management surface.
    pub fn can_manage_users(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::Applicant
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(Role::Admin),
            "REVIEWER" => Ok(Role::Reviewer),
            "APPLICANT" => Ok(Role::Applicant),
            other => Err(AppError::Internal(format!("Unknown role: {}", other))),
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub is_email_verified: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, role, \
     is_active, is_email_verified, deleted_at, created_at, updated_at";

impl User {
    /// A user may authenticate or refresh only while active and not
    /// soft-deleted.
    pub fn is_authenticatable(&self) -> bool {
        self.is_active && self.deleted_at.is_none()
    }

    pub fn to_response(&self) -> UserResponse {
        UserResponse {
            id: self.id.to_string(),
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            role: self.role,
            is_email_verified: self.is_email_verified,
            created_at: self.created_at.to_rfc3339(),
        }
    }

    /// Lookup by normalized email among non-deleted users.
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = $1 AND deleted_at IS NULL",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Existence check for registration. Soft-deleted rows count: the
    /// email column is unique across all of them.
    pub async fn email_taken(pool: &PgPool, email: &str) -> Result<bool, AppError> {
        let existing = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(pool)
        .await?;

        Ok(existing > 0)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1 AND deleted_at IS NULL",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    pub async fn insert(
        pool: &PgPool,
        email: &str,
        password_hash: &str,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> Result<User, AppError> {
        let now = Utc::now();
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, email, password_hash, first_name, last_name,
                               role, is_active, is_email_verified, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, TRUE, FALSE, $7, $7)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(password_hash)
        .bind(first_name)
        .bind(last_name)
        .bind(Role::default())
        .bind(now)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }

    /// Paginated listing of non-deleted users, newest first.
    pub async fn list(
        pool: &PgPool,
        limit: i64,
        offset: i64,
        role: Option<Role>,
    ) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {} FROM users
            WHERE deleted_at IS NULL AND ($3::user_role IS NULL OR role = $3)
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
            USER_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .bind(role)
        .fetch_all(pool)
        .await?;

        Ok(users)
    }

    pub async fn count(pool: &PgPool, role: Option<Role>) -> Result<i64, AppError> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM users WHERE deleted_at IS NULL \
             AND ($1::user_role IS NULL OR role = $1)",
        )
        .bind(role)
        .fetch_one(pool)
        .await?;

        Ok(total)
    }

    /// Partial admin update. Absent fields keep their current value.
    pub async fn admin_update(
        pool: &PgPool,
        id: Uuid,
        role: Option<Role>,
        is_active: Option<bool>,
        is_email_verified: Option<bool>,
    ) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET role = COALESCE($2, role),
                is_active = COALESCE($3, is_active),
                is_email_verified = COALESCE($4, is_email_verified),
                updated_at = $5
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(id)
        .bind(role)
        .bind(is_active)
        .bind(is_email_verified)
        .bind(Utc::now())
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Soft delete: the row stays, the account can no longer be used.
    /// Returns false when no live row matched the id.
    pub async fn soft_delete(pool: &PgPool, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE users \
             SET deleted_at = $2, is_active = FALSE, updated_at = $2 \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Public view of a user. The projection is the only path from a
/// `User` to a response body; `password_hash` and `deleted_at` have no
/// representation here.
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Role,
    pub is_email_verified: bool,
    pub created_at: String,
}
