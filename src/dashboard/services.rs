use tracing::{info, warn};

use super::dto::ProfileUpdateRequest;
use crate::{
    auth::{
        password::{check_new_password, hash_password, verify_password},
        validation::{self, ContactEdit, SellerFields},
    },
    error::{AppError, FieldErrors},
    identity::{Identity, IdentityChanges, IdentityStore, ProfileChange, SellerProfile},
};

/// Lets an identity edit its own contact details and password. A new
/// password is only accepted together with the current one.
pub async fn update_own_profile(
    store: &dyn IdentityStore,
    identity: &Identity,
    req: &ProfileUpdateRequest,
) -> Result<Identity, AppError> {
    let mut errors = FieldErrors::new();
    let contact = ContactEdit::new(
        req.username.as_deref(),
        req.email.as_deref(),
        req.phone.as_deref(),
    );
    contact.check(&mut errors);

    let password = req.password.as_deref().filter(|p| !p.is_empty());
    if let Some(p) = password {
        let current_ok = match req.current_password.as_deref() {
            Some(current) => verify_password(current, &identity.password_hash)?,
            None => false,
        };
        if !current_ok {
            errors.add("current_password", "The current password is incorrect.");
        }
        check_new_password(p, req.password_confirmation.as_deref(), &mut errors);
    }

    validation::check_unique(store, contact.probe(identity.id), &mut errors).await?;
    if let Err(e) = errors.into_result() {
        warn!(user_id = identity.id, "profile update rejected");
        return Err(e);
    }

    let changes = IdentityChanges {
        username: contact.username,
        email: contact.email,
        phone: contact.phone,
        password_hash: password.map(hash_password).transpose()?,
        ..Default::default()
    };
    let updated = store.update(identity.id, None, changes, ProfileChange::Keep).await?;
    info!(user_id = identity.id, password_changed = password.is_some(), "profile updated");
    Ok(updated)
}

/// Seller edits to their own farm profile.
pub async fn update_farm(
    store: &dyn IdentityStore,
    user_id: i64,
    fields: &SellerFields,
) -> Result<SellerProfile, AppError> {
    let mut errors = FieldErrors::new();
    let changes = fields.to_changes(&mut errors);
    errors.into_result()?;
    let profile = store.update_seller_profile(user_id, changes).await?;
    info!(user_id, "farm profile updated");
    Ok(profile)
}
