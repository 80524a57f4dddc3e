mod dto;
pub mod handlers;
mod services;

use crate::state::AppState;
use axum::Router;

/// Identity management. Mounted behind the admin-only role gate.
pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::admin_routes())
}
