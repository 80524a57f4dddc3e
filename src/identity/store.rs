use async_trait::async_trait;
use serde::Serialize;
use time::OffsetDateTime;

use super::model::{
    Identity, IdentityChanges, IdentityCounts, IdentityFilter, NewIdentity, NewSellerProfile,
    ProfileChange, Role, SellerProfile, SellerProfileChanges,
};

/// Columns guarded by a storage-level unique constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UniqueField {
    Username,
    Email,
    Phone,
}

impl UniqueField {
    pub fn as_str(self) -> &'static str {
        match self {
            UniqueField::Username => "username",
            UniqueField::Email => "email",
            UniqueField::Phone => "phone",
        }
    }

    /// Maps a Postgres constraint name from the `users` table.
    pub fn from_constraint(name: &str) -> Option<Self> {
        match name {
            "users_username_key" => Some(UniqueField::Username),
            "users_email_key" => Some(UniqueField::Email),
            "users_phone_key" => Some(UniqueField::Phone),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("duplicate {}", .0.as_str())]
    Duplicate(UniqueField),
    #[error("record not found")]
    NotFound,
    #[error("role changed concurrently: expected {expected}, found {found}")]
    RoleChanged { expected: Role, found: Role },
    #[error("corrupt record: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Values probed by the advisory uniqueness check.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniqueProbe<'a> {
    pub username: Option<&'a str>,
    pub email: Option<&'a str>,
    pub phone: Option<&'a str>,
    /// Identity allowed to already own the values (the one being edited).
    pub except_id: Option<i64>,
}

/// Persistence collaborator for identities and seller profiles.
///
/// Every method that writes more than one row runs as a single transaction.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Identity>, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError>;
    async fn find_by_phone(&self, phone: &str) -> Result<Option<Identity>, StoreError>;

    /// Fields of `probe` already owned by another identity.
    async fn taken_fields(&self, probe: UniqueProbe<'_>) -> Result<Vec<UniqueField>, StoreError>;

    /// Inserts the identity and, when given, its seller profile atomically.
    async fn create(
        &self,
        identity: NewIdentity,
        profile: Option<NewSellerProfile>,
    ) -> Result<(Identity, Option<SellerProfile>), StoreError>;

    /// Applies identity changes and the profile change atomically.
    ///
    /// With `expected_role` set, the row is locked first and the write is
    /// refused with `RoleChanged` when the stored role differs, since the
    /// profile change was planned against that role.
    async fn update(
        &self,
        id: i64,
        expected_role: Option<Role>,
        changes: IdentityChanges,
        profile: ProfileChange,
    ) -> Result<Identity, StoreError>;

    /// Deletes the identity; the profile and sessions cascade. `false` if absent.
    async fn delete(&self, id: i64) -> Result<bool, StoreError>;

    async fn record_login(&self, id: i64, at: OffsetDateTime) -> Result<(), StoreError>;

    async fn list(&self, filter: &IdentityFilter) -> Result<Vec<Identity>, StoreError>;
    async fn counts(&self) -> Result<IdentityCounts, StoreError>;

    async fn seller_profile(&self, user_id: i64) -> Result<Option<SellerProfile>, StoreError>;
    async fn list_sellers(
        &self,
        filter: &IdentityFilter,
    ) -> Result<Vec<(Identity, SellerProfile)>, StoreError>;
    async fn update_seller_profile(
        &self,
        user_id: i64,
        changes: SellerProfileChanges,
    ) -> Result<SellerProfile, StoreError>;
}
