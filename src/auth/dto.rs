use serde::{Deserialize, Serialize};

use crate::identity::{Identity, Role};

use super::session::Session;

/// Request body for login. `email` is accepted as an older name for the field.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(alias = "email")]
    pub identifier: String,
    pub password: String,
    #[serde(default)]
    pub remember: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    pub notice: Option<String>,
}

/// What the login screen needs to render.
#[derive(Debug, Serialize)]
pub struct LoginPage {
    pub fields: &'static [&'static str],
    pub notice: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct RegisterPage {
    pub roles: &'static [Role],
    pub seller_required: &'static [&'static str],
}

/// Returned by `GET /session`.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub identity: Identity,
    pub session: Session,
    pub dashboard: &'static str,
}
