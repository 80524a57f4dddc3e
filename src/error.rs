use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::identity::{Status, StoreError, UniqueField};

/// Which field a login identifier was matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierKind {
    Email,
    Phone,
}

impl IdentifierKind {
    pub fn unregistered_message(self) -> &'static str {
        match self {
            IdentifierKind::Email => "This email is not registered.",
            IdentifierKind::Phone => "This phone number is not registered.",
        }
    }
}

/// Validation messages keyed by form field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<&'static str, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// `Ok(())` when nothing was recorded, otherwise every error at once.
    pub fn into_result(self) -> Result<(), AppError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{}", .0.unregistered_message())]
    UnknownIdentifier(IdentifierKind),
    #[error("The password is incorrect.")]
    BadCredential,
    #[error("{reason}")]
    AccountNotUsable { status: Status, reason: &'static str },
    #[error("forbidden")]
    Forbidden,
    #[error("validation failed")]
    Validation(FieldErrors),
    #[error("{} has already been taken", .0.as_str())]
    DuplicateIdentifier(UniqueField),
    #[error("not found")]
    NotFound,
    #[error("the record changed while it was being edited")]
    Conflict,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Field-keyed view of the error for form rendering.
    pub fn field_errors(&self) -> Option<FieldErrors> {
        let mut errors = FieldErrors::new();
        match self {
            AppError::UnknownIdentifier(_) | AppError::AccountNotUsable { .. } => {
                errors.add("identifier", self.to_string())
            }
            AppError::BadCredential => errors.add("password", self.to_string()),
            AppError::DuplicateIdentifier(field) => errors.add(field.as_str(), self.to_string()),
            AppError::Validation(inner) => return Some(inner.clone()),
            AppError::Forbidden | AppError::NotFound | AppError::Conflict | AppError::Internal(_) => {
                return None
            }
        }
        Some(errors)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    errors: FieldErrors,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(errors) = self.field_errors() {
            let body = ErrorBody { message: self.to_string(), errors };
            return (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response();
        }
        match self {
            AppError::Forbidden => StatusCode::FORBIDDEN.into_response(),
            AppError::NotFound => StatusCode::NOT_FOUND.into_response(),
            AppError::Conflict => (StatusCode::CONFLICT, AppError::Conflict.to_string()).into_response(),
            AppError::Internal(e) => {
                error!(error = %e, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate(field) => AppError::DuplicateIdentifier(field),
            StoreError::NotFound => AppError::NotFound,
            StoreError::RoleChanged { .. } => AppError::Conflict,
            other => AppError::Internal(other.into()),
        }
    }
}
