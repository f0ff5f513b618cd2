mod admin;
mod auth;
mod health_check;

pub use admin::{delete_user, get_user, list_users, update_user};
pub use auth::{current_user, login, logout, refresh, register};
pub use health_check::health_check;
