use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

use crate::error::FieldErrors;

pub const MIN_PASSWORD_LEN: usize = 8;

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

/// `Ok(false)` on mismatch; `Err` only when the stored hash is unreadable.
pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Length and confirmation rules for a newly chosen password.
pub fn check_new_password(password: &str, confirmation: Option<&str>, errors: &mut FieldErrors) {
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.add(
            "password",
            format!("The password must be at least {MIN_PASSWORD_LEN} characters."),
        );
    }
    if confirmation != Some(password) {
        errors.add("password_confirmation", "The password confirmation does not match.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify() {
        let hash = hash_password("secret123").expect("hashing should succeed");
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("secret123", &hash).expect("verify should succeed"));
        assert!(!verify_password("secret124", &hash).expect("verify should not error"));
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        assert!(verify_password("anything", "not-a-valid-hash").is_err());
    }

    #[test]
    fn new_password_rules() {
        let mut errors = FieldErrors::new();
        check_new_password("short", Some("short"), &mut errors);
        assert!(errors.contains("password"));
        assert!(!errors.contains("password_confirmation"));

        let mut errors = FieldErrors::new();
        check_new_password("long-enough", Some("different"), &mut errors);
        assert!(errors.contains("password_confirmation"));

        let mut errors = FieldErrors::new();
        check_new_password("long-enough", None, &mut errors);
        assert!(errors.contains("password_confirmation"));

        let mut errors = FieldErrors::new();
        check_new_password("long-enough", Some("long-enough"), &mut errors);
        assert!(errors.is_empty());
    }
}
