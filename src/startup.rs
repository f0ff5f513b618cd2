use actix_web::{web, App, HttpServer};
use actix_web::dev::Server;
use sqlx::PgPool;
use std::net::TcpListener;

use crate::auth::SessionService;
use crate::configuration::AuthSettings;
use crate::middleware::{JwtMiddleware, RequestLogging};
use crate::routes::{
    current_user, delete_user, get_user, health_check, list_users, login, logout, refresh,
    register, update_user,
};

pub fn run(
    listener: TcpListener,
    connection: PgPool,
    auth_config: AuthSettings,
) -> Result<Server, std::io::Error> {
    let session_service = web::Data::new(SessionService::new(
        connection.clone(),
        auth_config.clone(),
    ));
    let connection = web::Data::new(connection);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(RequestLogging)

            // Shared state
            .app_data(connection.clone())
            .app_data(session_service.clone())

            // Public routes (no authentication required)
            .route("/health_check", web::get().to(health_check))
            .route("/auth/register", web::post().to(register))
            .route("/auth/login", web::post().to(login))
            .route("/auth/refresh", web::post().to(refresh))

            // Authenticated session routes
            .service(
                web::scope("/auth")
                    .wrap(JwtMiddleware::new(auth_config.clone()))
                    .route("/logout", web::post().to(logout))
                    .route("/me", web::get().to(current_user)),
            )

            // Admin user management (role-gated in the handlers)
            .service(
                web::scope("/admin")
                    .wrap(JwtMiddleware::new(auth_config.clone()))
                    .route("/users", web::get().to(list_users))
                    .route("/users/{id}", web::get().to(get_user))
                    .route("/users/{id}", web::patch().to(update_user))
                    .route("/users/{id}", web::delete().to(delete_user)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
