use crate::state::AppState;
use axum::Router;

pub mod cookies;
pub mod credentials;
mod dto;
pub mod handlers;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod registration;
pub mod roles;
pub mod session;
pub mod session_store;
pub mod status;
pub mod validation;

pub use middleware::{role_gate, CurrentIdentity, RoleGate};

/// Public routes: login, logout, registration and session introspection.
pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::auth_routes())
}
