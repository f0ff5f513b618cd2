//! Integration tests for the authentication and admin surface.
//!
//! Each test spawns the real server against a throwaway database and
//! drives it over HTTP.

use std::net::TcpListener;

use chrono::{DateTime, Duration, Utc};
use gatehouse::configuration::{get_configuration, DatabaseSettings};
use gatehouse::startup::run;
use serde_json::{json, Value};
use sqlx::{Connection, Executor, PgConnection, PgPool};
use uuid::Uuid;

pub struct TestApp {
    pub address: String,
    pub db_pool: PgPool,
}

async fn spawn_app() -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let mut configuration = get_configuration().expect("Failed to read configuration.");
    configuration.database.database_name = Uuid::new_v4().to_string();
    // Minimum bcrypt cost keeps the suite fast
    configuration.auth.bcrypt_cost = 4;
    let connection_pool = configure_database(&configuration.database).await;

    let server = run(listener, connection_pool.clone(), configuration.auth)
        .expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        db_pool: connection_pool,
    }
}

pub async fn configure_database(config: &DatabaseSettings) -> PgPool {
    // Create database
    let mut connection = PgConnection::connect(&config.connection_string_without_db())
        .await
        .expect("Failed to connect to Postgres");
    connection
        .execute(&*format!(r#"CREATE DATABASE "{}";"#, config.database_name))
        .await
        .expect("Failed to create database.");
    // Migrate database
    let connection_pool = PgPool::connect(&config.connection_string())
        .await
        .expect("Failed to connect to Postgres.");
    sqlx::migrate!("./migrations")
        .run(&connection_pool)
        .await
        .expect("Failed to migrate the database.");
    connection_pool
}

async fn register_user(app: &TestApp, email: &str, password: &str) -> Value {
    let client = reqwest::Client::new();
    let response = client
        .post(&format!("{}/auth/register", &app.address))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(201, response.status().as_u16());
    response.json().await.expect("Failed to parse response")
}

async fn login_user(app: &TestApp, email: &str, password: &str) -> Value {
    let client = reqwest::Client::new();
    let response = client
        .post(&format!("{}/auth/login", &app.address))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(200, response.status().as_u16());
    response.json().await.expect("Failed to parse response")
}

async fn refresh_session(app: &TestApp, refresh_token: &str) -> reqwest::Response {
    let client = reqwest::Client::new();
    client
        .post(&format!("{}/auth/refresh", &app.address))
        .json(&json!({ "refresh_token": refresh_token }))
        .send()
        .await
        .expect("Failed to execute request.")
}

async fn active_token_count(pool: &PgPool, user_id: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM refresh_tokens \
         WHERE user_id = $1 AND revoked_at IS NULL AND expires_at > NOW()",
    )
    .bind(Uuid::parse_str(user_id).unwrap())
    .fetch_one(pool)
    .await
    .expect("Failed to count tokens")
}

// --- Registration ---

#[tokio::test]
async fn register_returns_201_without_credential_material() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(&format!("{}/auth/register", &app.address))
        .json(&json!({
            "email": "a@b.com",
            "password": "Passw0rd1",
            "first_name": "Ada"
        }))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(201, response.status().as_u16());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["email"], "a@b.com");
    assert_eq!(body["role"], "APPLICANT");
    assert!(body.get("password_hash").is_none());
    assert!(body.get("access_token").is_none());

    let stored_email = sqlx::query_scalar::<_, String>("SELECT email FROM users")
        .fetch_one(&app.db_pool)
        .await
        .expect("Failed to fetch created user");
    assert_eq!(stored_email, "a@b.com");
}

#[tokio::test]
async fn register_normalizes_email_case_and_whitespace() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(&format!("{}/auth/register", &app.address))
        .json(&json!({ "email": "  John@Example.COM ", "password": "Passw0rd1" }))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(201, response.status().as_u16());

    // Login with the canonical form succeeds
    login_user(&app, "john@example.com", "Passw0rd1").await;
}

#[tokio::test]
async fn register_returns_409_for_duplicate_email() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    register_user(&app, "dup@example.com", "Passw0rd1").await;

    // Same address in a different case is still a duplicate
    let response = client
        .post(&format!("{}/auth/register", &app.address))
        .json(&json!({ "email": "Dup@Example.com", "password": "Passw0rd1" }))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(409, response.status().as_u16());
}

#[tokio::test]
async fn register_returns_400_for_invalid_input() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let invalid_bodies = vec![
        json!({ "email": "notanemail", "password": "Passw0rd1" }),
        json!({ "email": "user@", "password": "Passw0rd1" }),
        json!({ "email": "valid@example.com", "password": "short1A" }),
        json!({ "email": "valid@example.com", "password": "nodigitshere" }),
    ];

    for body in invalid_bodies {
        let response = client
            .post(&format!("{}/auth/register", &app.address))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request.");

        assert_eq!(
            400,
            response.status().as_u16(),
            "Should reject body: {}",
            body
        );
    }
}

// --- Login ---

#[tokio::test]
async fn login_returns_token_pair_with_user_snapshot() {
    let app = spawn_app().await;

    register_user(&app, "a@b.com", "Passw0rd1").await;
    let body = login_user(&app, "a@b.com", "Passw0rd1").await;

    assert!(body["access_token"].as_str().is_some());
    assert!(body["refresh_token"].as_str().is_some());
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], 900);
    assert_eq!(body["user"]["email"], "a@b.com");
    assert!(body["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn refresh_token_expires_about_seven_days_out() {
    let app = spawn_app().await;

    register_user(&app, "a@b.com", "Passw0rd1").await;
    login_user(&app, "a@b.com", "Passw0rd1").await;

    let expires_at = sqlx::query_scalar::<_, DateTime<Utc>>(
        "SELECT expires_at FROM refresh_tokens",
    )
    .fetch_one(&app.db_pool)
    .await
    .expect("Failed to fetch token expiry");

    let distance = expires_at - Utc::now();
    assert!(distance > Duration::days(6), "expiry too close: {}", distance);
    assert!(distance <= Duration::days(7), "expiry too far: {}", distance);
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    register_user(&app, "real@x.com", "Passw0rd1").await;

    let unknown = client
        .post(&format!("{}/auth/login", &app.address))
        .json(&json!({ "email": "unknown@x.com", "password": "anything1A" }))
        .send()
        .await
        .expect("Failed to execute request.");
    let unknown_status = unknown.status().as_u16();
    let unknown_body: Value = unknown.json().await.expect("Failed to parse response");

    let wrong = client
        .post(&format!("{}/auth/login", &app.address))
        .json(&json!({ "email": "real@x.com", "password": "WrongPassword1" }))
        .send()
        .await
        .expect("Failed to execute request.");
    let wrong_status = wrong.status().as_u16();
    let wrong_body: Value = wrong.json().await.expect("Failed to parse response");

    assert_eq!(401, unknown_status);
    assert_eq!(unknown_status, wrong_status);
    assert_eq!(unknown_body["message"], wrong_body["message"]);
    assert_eq!(unknown_body["code"], wrong_body["code"]);
}

#[tokio::test]
async fn login_is_blocked_for_inactive_account() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    register_user(&app, "a@b.com", "Passw0rd1").await;

    sqlx::query("UPDATE users SET is_active = FALSE")
        .execute(&app.db_pool)
        .await
        .expect("Failed to deactivate user");

    let response = client
        .post(&format!("{}/auth/login", &app.address))
        .json(&json!({ "email": "a@b.com", "password": "Passw0rd1" }))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(401, response.status().as_u16());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["code"], "ACCOUNT_INACTIVE");
}

#[tokio::test]
async fn login_is_blocked_for_soft_deleted_account() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    register_user(&app, "a@b.com", "Passw0rd1").await;

    sqlx::query("UPDATE users SET deleted_at = NOW()")
        .execute(&app.db_pool)
        .await
        .expect("Failed to soft-delete user");

    let response = client
        .post(&format!("{}/auth/login", &app.address))
        .json(&json!({ "email": "a@b.com", "password": "Passw0rd1" }))
        .send()
        .await
        .expect("Failed to execute request.");

    // Soft-deleted users are invisible: same response as unknown email
    assert_eq!(401, response.status().as_u16());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["code"], "INVALID_CREDENTIALS");
}

// --- Refresh and rotation ---

#[tokio::test]
async fn refresh_rotates_the_presented_token() {
    let app = spawn_app().await;

    register_user(&app, "a@b.com", "Passw0rd1").await;
    let login = login_user(&app, "a@b.com", "Passw0rd1").await;
    let old_token = login["refresh_token"].as_str().unwrap();

    let response = refresh_session(&app, old_token).await;
    assert_eq!(200, response.status().as_u16());

    let body: Value = response.json().await.expect("Failed to parse response");
    let new_token = body["refresh_token"].as_str().unwrap();

    assert!(body["access_token"].as_str().is_some());
    assert_ne!(old_token, new_token, "Refresh token must rotate");

    // Exactly one active token remains: the new one
    let user_id = body["user"]["id"].as_str().unwrap();
    assert_eq!(1, active_token_count(&app.db_pool, user_id).await);
}

#[tokio::test]
async fn refresh_returns_401_for_unknown_token() {
    let app = spawn_app().await;

    let response = refresh_session(&app, "definitely-not-a-known-token").await;
    assert_eq!(401, response.status().as_u16());
}

#[tokio::test]
async fn reusing_a_rotated_token_revokes_everything() {
    let app = spawn_app().await;

    let user = register_user(&app, "a@b.com", "Passw0rd1").await;
    let user_id = user["id"].as_str().unwrap();

    let login = login_user(&app, "a@b.com", "Passw0rd1").await;
    let token_a = login["refresh_token"].as_str().unwrap();

    // Rotate A into B
    let response = refresh_session(&app, token_a).await;
    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.expect("Failed to parse response");
    let token_b = body["refresh_token"].as_str().unwrap().to_string();

    // Replay A: rejected, and the cascade kills B as well
    let replay = refresh_session(&app, token_a).await;
    assert_eq!(401, replay.status().as_u16());

    assert_eq!(0, active_token_count(&app.db_pool, user_id).await);

    let with_b = refresh_session(&app, &token_b).await;
    assert_eq!(401, with_b.status().as_u16());
}

#[tokio::test]
async fn refresh_returns_401_for_expired_token() {
    let app = spawn_app().await;

    register_user(&app, "a@b.com", "Passw0rd1").await;
    let login = login_user(&app, "a@b.com", "Passw0rd1").await;
    let token = login["refresh_token"].as_str().unwrap();

    sqlx::query("UPDATE refresh_tokens SET expires_at = NOW() - INTERVAL '1 day'")
        .execute(&app.db_pool)
        .await
        .expect("Failed to expire token");

    let response = refresh_session(&app, token).await;
    assert_eq!(401, response.status().as_u16());
}

#[tokio::test]
async fn refresh_is_blocked_for_inactive_account() {
    let app = spawn_app().await;

    register_user(&app, "a@b.com", "Passw0rd1").await;
    let login = login_user(&app, "a@b.com", "Passw0rd1").await;
    let token = login["refresh_token"].as_str().unwrap();

    sqlx::query("UPDATE users SET is_active = FALSE")
        .execute(&app.db_pool)
        .await
        .expect("Failed to deactivate user");

    let response = refresh_session(&app, token).await;
    assert_eq!(401, response.status().as_u16());
}

// --- Cap enforcement ---

#[tokio::test]
async fn at_most_five_tokens_stay_active_per_user() {
    let app = spawn_app().await;

    let user = register_user(&app, "a@b.com", "Passw0rd1").await;
    let user_id = user["id"].as_str().unwrap();

    for _ in 0..7 {
        login_user(&app, "a@b.com", "Passw0rd1").await;
    }

    assert_eq!(5, active_token_count(&app.db_pool, user_id).await);

    // The survivors are the five newest
    let oldest_active = sqlx::query_scalar::<_, DateTime<Utc>>(
        "SELECT MIN(created_at) FROM refresh_tokens WHERE revoked_at IS NULL",
    )
    .fetch_one(&app.db_pool)
    .await
    .expect("Failed to fetch oldest active token");
    let newest_revoked = sqlx::query_scalar::<_, DateTime<Utc>>(
        "SELECT MAX(created_at) FROM refresh_tokens WHERE revoked_at IS NOT NULL",
    )
    .fetch_one(&app.db_pool)
    .await
    .expect("Failed to fetch newest revoked token");

    assert!(newest_revoked < oldest_active);
}

// --- Logout ---

#[tokio::test]
async fn logout_is_idempotent() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    register_user(&app, "a@b.com", "Passw0rd1").await;
    let login = login_user(&app, "a@b.com", "Passw0rd1").await;
    let access_token = login["access_token"].as_str().unwrap();
    let refresh_token = login["refresh_token"].as_str().unwrap();

    for _ in 0..2 {
        let response = client
            .post(&format!("{}/auth/logout", &app.address))
            .header("Authorization", format!("Bearer {}", access_token))
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .expect("Failed to execute request.");

        assert_eq!(200, response.status().as_u16());
    }

    // Revoked exactly once; the second call changed nothing
    let revoked_count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM refresh_tokens WHERE revoked_at IS NOT NULL",
    )
    .fetch_one(&app.db_pool)
    .await
    .expect("Failed to count revoked tokens");
    assert_eq!(1, revoked_count);

    // The token is gone for refresh purposes
    let response = refresh_session(&app, refresh_token).await;
    assert_eq!(401, response.status().as_u16());
}

#[tokio::test]
async fn logout_with_unknown_token_succeeds_silently() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    register_user(&app, "a@b.com", "Passw0rd1").await;
    let login = login_user(&app, "a@b.com", "Passw0rd1").await;
    let access_token = login["access_token"].as_str().unwrap();

    let response = client
        .post(&format!("{}/auth/logout", &app.address))
        .header("Authorization", format!("Bearer {}", access_token))
        .json(&json!({ "refresh_token": "never-issued" }))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(200, response.status().as_u16());
}

#[tokio::test]
async fn logout_rejects_tokens_owned_by_another_user() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    register_user(&app, "a@b.com", "Passw0rd1").await;
    register_user(&app, "c@d.com", "Passw0rd1").await;
    let login_a = login_user(&app, "a@b.com", "Passw0rd1").await;
    let login_c = login_user(&app, "c@d.com", "Passw0rd1").await;

    let response = client
        .post(&format!("{}/auth/logout", &app.address))
        .header(
            "Authorization",
            format!("Bearer {}", login_c["access_token"].as_str().unwrap()),
        )
        .json(&json!({ "refresh_token": login_a["refresh_token"].as_str().unwrap() }))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(401, response.status().as_u16());
}

#[tokio::test]
async fn logout_requires_authentication() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(&format!("{}/auth/logout", &app.address))
        .json(&json!({ "refresh_token": "whatever" }))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(401, response.status().as_u16());
}

// --- Current user ---

#[tokio::test]
async fn me_returns_the_authenticated_user() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    register_user(&app, "a@b.com", "Passw0rd1").await;
    let login = login_user(&app, "a@b.com", "Passw0rd1").await;

    let response = client
        .get(&format!("{}/auth/me", &app.address))
        .header(
            "Authorization",
            format!("Bearer {}", login["access_token"].as_str().unwrap()),
        )
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["email"], "a@b.com");
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
async fn protected_routes_reject_malformed_authorization_headers() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let malformed_headers = vec![
        "Bearer",             // missing token
        "Basic dXNlcjpwYXNz", // not Bearer
        "BearerToken",        // missing space
        "",                   // empty
    ];

    for header in malformed_headers {
        let response = client
            .get(&format!("{}/auth/me", &app.address))
            .header("Authorization", header)
            .send()
            .await
            .expect("Failed to execute request.");

        assert_eq!(
            401,
            response.status().as_u16(),
            "Should reject malformed header: {}",
            header
        );
    }
}

// --- Admin user management ---

async fn promote_to_admin(app: &TestApp, email: &str) {
    sqlx::query("UPDATE users SET role = 'ADMIN' WHERE email = $1")
        .bind(email)
        .execute(&app.db_pool)
        .await
        .expect("Failed to promote user");
}

#[tokio::test]
async fn admin_routes_are_forbidden_for_non_admins() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    register_user(&app, "a@b.com", "Passw0rd1").await;
    let login = login_user(&app, "a@b.com", "Passw0rd1").await;

    let response = client
        .get(&format!("{}/admin/users", &app.address))
        .header(
            "Authorization",
            format!("Bearer {}", login["access_token"].as_str().unwrap()),
        )
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(403, response.status().as_u16());
}

#[tokio::test]
async fn admin_can_list_and_fetch_users() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let user = register_user(&app, "applicant@x.com", "Passw0rd1").await;
    register_user(&app, "admin@x.com", "Passw0rd1").await;
    promote_to_admin(&app, "admin@x.com").await;
    let admin = login_user(&app, "admin@x.com", "Passw0rd1").await;
    let bearer = format!("Bearer {}", admin["access_token"].as_str().unwrap());

    let response = client
        .get(&format!("{}/admin/users", &app.address))
        .header("Authorization", &bearer)
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["total"], 2);

    let response = client
        .get(&format!(
            "{}/admin/users/{}",
            &app.address,
            user["id"].as_str().unwrap()
        ))
        .header("Authorization", &bearer)
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["email"], "applicant@x.com");
}

#[tokio::test]
async fn admin_fetch_of_missing_user_returns_404() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    register_user(&app, "admin@x.com", "Passw0rd1").await;
    promote_to_admin(&app, "admin@x.com").await;
    let admin = login_user(&app, "admin@x.com", "Passw0rd1").await;

    let response = client
        .get(&format!("{}/admin/users/{}", &app.address, Uuid::new_v4()))
        .header(
            "Authorization",
            format!("Bearer {}", admin["access_token"].as_str().unwrap()),
        )
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(404, response.status().as_u16());
}

#[tokio::test]
async fn admin_can_update_role_and_flags() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let user = register_user(&app, "applicant@x.com", "Passw0rd1").await;
    register_user(&app, "admin@x.com", "Passw0rd1").await;
    promote_to_admin(&app, "admin@x.com").await;
    let admin = login_user(&app, "admin@x.com", "Passw0rd1").await;

    let response = client
        .patch(&format!(
            "{}/admin/users/{}",
            &app.address,
            user["id"].as_str().unwrap()
        ))
        .header(
            "Authorization",
            format!("Bearer {}", admin["access_token"].as_str().unwrap()),
        )
        .json(&json!({ "role": "REVIEWER", "is_email_verified": true }))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["role"], "REVIEWER");
    assert_eq!(body["is_email_verified"], true);
}

#[tokio::test]
async fn admin_soft_delete_blocks_future_logins() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let user = register_user(&app, "applicant@x.com", "Passw0rd1").await;
    register_user(&app, "admin@x.com", "Passw0rd1").await;
    promote_to_admin(&app, "admin@x.com").await;
    let admin = login_user(&app, "admin@x.com", "Passw0rd1").await;

    let response = client
        .delete(&format!(
            "{}/admin/users/{}",
            &app.address,
            user["id"].as_str().unwrap()
        ))
        .header(
            "Authorization",
            format!("Bearer {}", admin["access_token"].as_str().unwrap()),
        )
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(200, response.status().as_u16());

    // Deleting again: the row is no longer visible
    let response = client
        .delete(&format!(
            "{}/admin/users/{}",
            &app.address,
            user["id"].as_str().unwrap()
        ))
        .header(
            "Authorization",
            format!("Bearer {}", admin["access_token"].as_str().unwrap()),
        )
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(404, response.status().as_u16());

    let login = client
        .post(&format!("{}/auth/login", &app.address))
        .json(&json!({ "email": "applicant@x.com", "password": "Passw0rd1" }))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(401, login.status().as_u16());
}
