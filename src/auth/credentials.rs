use tracing::warn;

use super::{password::verify_password, validation};
use crate::{
    error::{AppError, IdentifierKind},
    identity::{Identity, IdentityStore},
};

/// A login identifier classified by format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginIdentifier {
    Email(String),
    Phone(String),
}

impl LoginIdentifier {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if validation::is_valid_email(raw) {
            LoginIdentifier::Email(validation::normalize_email(raw))
        } else {
            LoginIdentifier::Phone(validation::normalize_phone(raw))
        }
    }

    pub fn kind(&self) -> IdentifierKind {
        match self {
            LoginIdentifier::Email(_) => IdentifierKind::Email,
            LoginIdentifier::Phone(_) => IdentifierKind::Phone,
        }
    }
}

/// Finds the identity behind `identifier` and checks `password` against it.
/// Has no side effects; the caller still has to pass the status gate.
pub async fn verify(
    store: &dyn IdentityStore,
    identifier: &str,
    password: &str,
) -> Result<Identity, AppError> {
    let identifier = LoginIdentifier::parse(identifier);
    let found = match &identifier {
        LoginIdentifier::Email(email) => store.find_by_email(email).await?,
        LoginIdentifier::Phone(phone) => store.find_by_phone(phone).await?,
    };
    let Some(identity) = found else {
        warn!(kind = ?identifier.kind(), "login unknown identifier");
        return Err(AppError::UnknownIdentifier(identifier.kind()));
    };

    if !verify_password(password, &identity.password_hash)? {
        warn!(user_id = identity.id, "login invalid password");
        return Err(AppError::BadCredential);
    }
    Ok(identity)
}
