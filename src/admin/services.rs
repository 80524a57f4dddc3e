use tracing::{info, warn};

use super::dto::{CreateUserRequest, UpdateUserRequest, UserListQuery, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::{
    auth::{
        password::{check_new_password, hash_password},
        registration,
        validation::{self, ContactEdit, SellerFields},
    },
    error::{AppError, FieldErrors},
    identity::{
        Identity, IdentityChanges, IdentityFilter, IdentityStore, ProfileChange, Role,
        SearchTerm, SellerProfile, Status,
    },
};

fn blank_to_none(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn parse_field<T: std::str::FromStr>(
    field: &'static str,
    raw: Option<&str>,
    errors: &mut FieldErrors,
) -> Option<T> {
    let raw = raw?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            errors.add(field, format!("The selected {field} is invalid."));
            None
        }
    }
}

/// Listing filter with the page size defaulted and capped.
pub fn list_filter(q: &UserListQuery) -> Result<IdentityFilter, AppError> {
    let mut errors = FieldErrors::new();
    let role = parse_field::<Role>("role", blank_to_none(&q.role), &mut errors);
    let status = parse_field::<Status>("status", blank_to_none(&q.status), &mut errors);
    errors.into_result()?;
    Ok(IdentityFilter {
        role,
        status,
        search: blank_to_none(&q.search).map(|term| SearchTerm {
            text: term.to_lowercase(),
            phone: validation::normalize_phone(term),
        }),
        limit: q.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        offset: q.offset.unwrap_or(0).max(0),
    })
}

/// What has to happen to the farm profile when an identity moves from
/// `current` to `next`. Keeps "profile exists iff seller" true.
pub fn plan_profile_change(
    current: Role,
    next: Role,
    fields: &SellerFields,
    errors: &mut FieldErrors,
) -> ProfileChange {
    match (current, next) {
        (Role::Seller, Role::Seller) => {
            let changes = fields.to_changes(errors);
            if changes.is_empty() {
                ProfileChange::Keep
            } else {
                ProfileChange::Update(changes)
            }
        }
        (Role::Seller, _) => ProfileChange::Remove,
        (_, Role::Seller) => fields
            .to_new_profile(errors)
            .map(ProfileChange::Create)
            .unwrap_or(ProfileChange::Keep),
        _ => ProfileChange::Keep,
    }
}

/// Creates an identity of any role; the status defaults to `active`.
pub async fn create_user(
    store: &dyn IdentityStore,
    req: &CreateUserRequest,
) -> Result<(Identity, Option<SellerProfile>), AppError> {
    let mut errors = FieldErrors::new();
    let status = parse_field::<Status>("status", blank_to_none(&req.status), &mut errors)
        .unwrap_or(Status::Active);
    let (identity, profile) =
        registration::validate_account(store, &req.account, &Role::ALL, status, errors).await?;
    let created = store.create(identity, profile).await?;
    info!(user_id = created.0.id, role = %created.0.role, status = %created.0.status, "identity created by admin");
    Ok(created)
}

/// Applies an admin edit. The identity update and any profile create,
/// update or removal are committed together.
pub async fn update_user(
    store: &dyn IdentityStore,
    id: i64,
    req: &UpdateUserRequest,
) -> Result<Identity, AppError> {
    let current = store.find_by_id(id).await?.ok_or(AppError::NotFound)?;
    let mut errors = FieldErrors::new();

    let contact = ContactEdit::new(
        req.username.as_deref(),
        req.email.as_deref(),
        req.phone.as_deref(),
    );
    contact.check(&mut errors);

    let role = parse_field::<Role>("role", blank_to_none(&req.role), &mut errors);
    let status = parse_field::<Status>("status", blank_to_none(&req.status), &mut errors);

    let password = req.password.as_deref().filter(|p| !p.is_empty());
    if let Some(p) = password {
        check_new_password(p, req.password_confirmation.as_deref(), &mut errors);
    }

    let next_role = role.unwrap_or(current.role);
    let profile = plan_profile_change(current.role, next_role, &req.seller, &mut errors);

    validation::check_unique(store, contact.probe(id), &mut errors).await?;
    if let Err(e) = errors.into_result() {
        warn!(user_id = id, "admin update rejected");
        return Err(e);
    }

    let changes = IdentityChanges {
        username: contact.username,
        email: contact.email,
        phone: contact.phone,
        password_hash: password.map(hash_password).transpose()?,
        role,
        status,
    };
    let updated = store
        .update(id, Some(current.role), changes, profile)
        .await
        .inspect_err(|e| warn!(user_id = id, error = %e, "admin update not applied"))?;
    info!(user_id = id, role = %updated.role, status = %updated.status, "identity updated by admin");
    Ok(updated)
}

/// Deletes `id`. An admin cannot delete their own account.
pub async fn delete_user(store: &dyn IdentityStore, actor_id: i64, id: i64) -> Result<(), AppError> {
    if actor_id == id {
        warn!(user_id = id, "admin tried to delete own account");
        return Err(AppError::Forbidden);
    }
    if !store.delete(id).await? {
        return Err(AppError::NotFound);
    }
    info!(user_id = id, actor_id, "identity deleted by admin");
    Ok(())
}
