use serde::Deserialize;
use tracing::{info, warn};

use super::{
    password::{check_new_password, hash_password},
    validation::{self, SellerFields},
};
use crate::{
    error::{AppError, FieldErrors},
    identity::{
        Identity, IdentityStore, NewIdentity, NewSellerProfile, Role, SellerProfile, Status,
        UniqueProbe,
    },
};

/// Self-service sign-up form. Farm fields are only read for sellers.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_confirmation: String,
    #[serde(default)]
    pub role: String,
    #[serde(flatten)]
    pub seller: SellerFields,
}

/// Roles open to self-registration.
pub const SELF_SERVICE_ROLES: &[Role] = &[Role::Customer, Role::Seller];

fn allowed_role(raw: &str, allowed: &[Role], errors: &mut FieldErrors) -> Option<Role> {
    match raw.trim().parse::<Role>() {
        Ok(role) if allowed.contains(&role) => Some(role),
        _ => {
            errors.add("role", "The selected role is invalid.");
            None
        }
    }
}

/// Checks every account field, collecting all failures into `errors`
/// (which may already hold the caller's own), and hashes the password.
/// Sellers also get their farm profile validated.
pub(crate) async fn validate_account(
    store: &dyn IdentityStore,
    req: &RegisterRequest,
    allowed: &[Role],
    status: Status,
    mut errors: FieldErrors,
) -> Result<(NewIdentity, Option<NewSellerProfile>), AppError> {
    let username = req.username.trim().to_string();
    let email = validation::normalize_email(&req.email);
    let phone = validation::normalize_phone(&req.phone);

    validation::check_username(&username, &mut errors);
    validation::check_email(&email, &mut errors);
    validation::check_phone(&phone, &mut errors);
    check_new_password(&req.password, Some(&req.password_confirmation), &mut errors);
    let role = allowed_role(&req.role, allowed, &mut errors);

    let profile = match role {
        Some(Role::Seller) => req.seller.to_new_profile(&mut errors),
        _ => None,
    };

    let probe = UniqueProbe {
        username: Some(&username),
        email: Some(&email),
        phone: Some(&phone),
        except_id: None,
    };
    validation::check_unique(store, probe, &mut errors).await?;
    errors.into_result()?;

    let Some(role) = role else {
        return Err(AppError::Internal(anyhow::anyhow!("role missing after validation")));
    };
    let identity = NewIdentity {
        username,
        email,
        phone,
        password_hash: hash_password(&req.password)?,
        role,
        status,
    };
    Ok((identity, profile))
}

/// Validates the form and creates the identity, plus a seller profile for
/// sellers, in one transaction. New identities start `active`.
pub async fn register(
    store: &dyn IdentityStore,
    req: &RegisterRequest,
) -> Result<(Identity, Option<SellerProfile>), AppError> {
    let validated =
        validate_account(store, req, SELF_SERVICE_ROLES, Status::Active, FieldErrors::new()).await;
    let (new_identity, new_profile) = match validated {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "registration rejected");
            return Err(e);
        }
    };
    let (identity, profile) = store.create(new_identity, new_profile).await?;
    info!(user_id = identity.id, role = %identity.role, "identity registered");
    Ok((identity, profile))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{memory::MemoryIdentityStore, UniqueField};
    use crate::testing::seed;

    fn seller_request() -> RegisterRequest {
        RegisterRequest {
            username: "alice".into(),
            email: "a@x.com".into(),
            phone: "012345678".into(),
            password: "secret123".into(),
            password_confirmation: "secret123".into(),
            role: "seller".into(),
            seller: SellerFields {
                farm_name: Some("Green Farm".into()),
                location_district: Some("X".into()),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn seller_registration_creates_identity_and_profile() {
        let store = MemoryIdentityStore::new();
        let (identity, profile) = register(&store, &seller_request()).await.unwrap();
        assert_eq!(identity.role, Role::Seller);
        assert_eq!(identity.status, Status::Active);
        assert_ne!(identity.password_hash, "secret123");
        let profile = profile.expect("seller profile");
        assert_eq!(profile.user_id, identity.id);
        assert_eq!(profile.farm_name, "Green Farm");
        assert_eq!(profile.location_district, "X");
    }

    #[tokio::test]
    async fn customer_registration_ignores_farm_fields() {
        let store = MemoryIdentityStore::new();
        let req = RegisterRequest { role: "customer".into(), ..seller_request() };
        let (identity, profile) = register(&store, &req).await.unwrap();
        assert_eq!(identity.role, Role::Customer);
        assert!(profile.is_none());
        assert_eq!(store.profile_count().await, 0);
    }

    #[tokio::test]
    async fn admin_role_cannot_self_register() {
        let store = MemoryIdentityStore::new();
        let req = RegisterRequest { role: "admin".into(), ..seller_request() };
        match register(&store, &req).await {
            Err(AppError::Validation(errors)) => assert!(errors.contains("role")),
            other => panic!("expected validation error, got {other:?}"),
        }
        assert_eq!(store.user_count().await, 0);
    }

    #[tokio::test]
    async fn duplicate_email_creates_nothing() {
        let store = MemoryIdentityStore::new();
        seed(&store, "bob", "a@x.com", "099999999", "secret123", Role::Customer, Status::Active).await;
        match register(&store, &seller_request()).await {
            Err(AppError::Validation(errors)) => {
                assert!(errors.contains("email"));
                assert!(!errors.contains("phone"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert_eq!(store.user_count().await, 1);
        assert_eq!(store.profile_count().await, 0);
    }

    #[tokio::test]
    async fn duplicate_missed_by_precheck_is_still_rejected() {
        let store = MemoryIdentityStore::new();
        seed(&store, "bob", "b@x.com", "012345678", "secret123", Role::Customer, Status::Active).await;
        store.miss_next_precheck().await;

        let err = register(&store, &seller_request()).await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateIdentifier(UniqueField::Phone)));
        assert_eq!(store.user_count().await, 1);
        assert_eq!(store.profile_count().await, 0);
    }

    #[tokio::test]
    async fn every_invalid_field_is_reported_at_once() {
        let store = MemoryIdentityStore::new();
        let req = RegisterRequest {
            username: "".into(),
            email: "not-an-email".into(),
            phone: "12".into(),
            password: "short".into(),
            password_confirmation: "other".into(),
            role: "seller".into(),
            seller: SellerFields::default(),
        };
        let Err(AppError::Validation(errors)) = register(&store, &req).await else {
            panic!("expected validation error");
        };
        for field in ["username", "email", "phone", "password", "farm_name", "location_district"] {
            assert!(errors.contains(field), "missing error for {field}");
        }
    }

    #[tokio::test]
    async fn failed_profile_write_leaves_no_identity() {
        let store = MemoryIdentityStore::new();
        store.fail_next_profile_write().await;
        assert!(register(&store, &seller_request()).await.is_err());
        assert_eq!(store.user_count().await, 0);
        assert_eq!(store.profile_count().await, 0);
    }

    #[tokio::test]
    async fn email_and_phone_are_normalized_before_storage() {
        let store = MemoryIdentityStore::new();
        let req = RegisterRequest {
            email: " A@X.COM ".into(),
            phone: "012-345 678".into(),
            ..seller_request()
        };
        let (identity, _) = register(&store, &req).await.unwrap();
        assert_eq!(identity.email, "a@x.com");
        assert_eq!(identity.phone, "012345678");
    }
}
