use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

/// Account role. Exactly one per identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Seller,
    Customer,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Seller, Role::Customer];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Seller => "seller",
            Role::Customer => "customer",
        }
    }
}

/// Account standing, changed by admins only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Active,
    Inactive,
    Banned,
}

impl Status {
    pub const ALL: [Status; 3] = [Status::Active, Status::Inactive, Status::Banned];

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Active => "active",
            Status::Inactive => "inactive",
            Status::Banned => "banned",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized {kind} value {value:?}")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| ParseEnumError { kind: "role", value: s.to_string() })
    }
}

impl FromStr for Status {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| ParseEnumError { kind: "status", value: s.to_string() })
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User record as the rest of the crate sees it.
#[derive(Debug, Clone, Serialize)]
pub struct Identity {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub phone: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // argon2, never leaves the server
    pub role: Role,
    pub status: Status,
    pub last_login_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Raw `users` row; role and status are still text here.
#[derive(Debug, Clone, FromRow)]
pub struct IdentityRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub phone: String,
    pub password_hash: String,
    pub role: String,
    pub status: String,
    pub last_login_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl TryFrom<IdentityRow> for Identity {
    type Error = ParseEnumError;

    fn try_from(r: IdentityRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            username: r.username,
            email: r.email,
            phone: r.phone,
            password_hash: r.password_hash,
            role: r.role.parse()?,
            status: r.status.parse()?,
            last_login_at: r.last_login_at,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SellerProfile {
    pub id: i64,
    pub user_id: i64,
    pub farm_name: String,
    pub location_province: Option<String>,
    pub location_district: String,
    pub location_commune: Option<String>,
    pub location_village: Option<String>,
    pub description: Option<String>,
    pub certification: Option<String>,
    pub bank_name: Option<String>,
    pub bank_account_name: Option<String>,
    pub bank_account_number: Option<String>,
    pub rating: f64,
    pub total_sales: i64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Validated input for a new identity. `password_hash` is already hashed.
#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub username: String,
    pub email: String,
    pub phone: String,
    pub password_hash: String,
    pub role: Role,
    pub status: Status,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewSellerProfile {
    pub farm_name: String,
    pub location_province: Option<String>,
    pub location_district: String,
    pub location_commune: Option<String>,
    pub location_village: Option<String>,
    pub description: Option<String>,
    pub certification: Option<String>,
    pub bank_name: Option<String>,
    pub bank_account_name: Option<String>,
    pub bank_account_number: Option<String>,
}

/// Partial update of identity columns; `None` leaves a column untouched.
#[derive(Debug, Clone, Default)]
pub struct IdentityChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<Role>,
    pub status: Option<Status>,
}

/// Partial update of farm fields. For optional columns `Some(None)` clears.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SellerProfileChanges {
    pub farm_name: Option<String>,
    pub location_province: Option<Option<String>>,
    pub location_district: Option<String>,
    pub location_commune: Option<Option<String>>,
    pub location_village: Option<Option<String>>,
    pub description: Option<Option<String>>,
    pub certification: Option<Option<String>>,
    pub bank_name: Option<Option<String>>,
    pub bank_account_name: Option<Option<String>>,
    pub bank_account_number: Option<Option<String>>,
}

impl SellerProfileChanges {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(self, p: &mut SellerProfile) {
        if let Some(v) = self.farm_name {
            p.farm_name = v;
        }
        if let Some(v) = self.location_district {
            p.location_district = v;
        }
        let optional = [
            (self.location_province, &mut p.location_province),
            (self.location_commune, &mut p.location_commune),
            (self.location_village, &mut p.location_village),
            (self.description, &mut p.description),
            (self.certification, &mut p.certification),
            (self.bank_name, &mut p.bank_name),
            (self.bank_account_name, &mut p.bank_account_name),
            (self.bank_account_number, &mut p.bank_account_number),
        ];
        for (change, slot) in optional {
            if let Some(v) = change {
                *slot = v;
            }
        }
    }
}

/// What happens to the seller profile alongside an identity update.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileChange {
    Keep,
    Remove,
    Create(NewSellerProfile),
    Update(SellerProfileChanges),
}

/// Free-text search, matched as a literal substring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTerm {
    /// Lowercased; matched against username and email.
    pub text: String,
    /// Phone-normalized; matched against phone. Empty skips the phone column.
    pub phone: String,
}

/// Admin listing filter.
#[derive(Debug, Clone, Default)]
pub struct IdentityFilter {
    pub role: Option<Role>,
    pub status: Option<Status>,
    pub search: Option<SearchTerm>,
    pub limit: i64,
    pub offset: i64,
}

impl IdentityFilter {
    pub fn matches(&self, identity: &Identity) -> bool {
        if self.role.is_some_and(|r| r != identity.role) {
            return false;
        }
        if self.status.is_some_and(|s| s != identity.status) {
            return false;
        }
        match &self.search {
            Some(term) => {
                identity.username.to_lowercase().contains(&term.text)
                    || identity.email.to_lowercase().contains(&term.text)
                    || (!term.phone.is_empty() && identity.phone.contains(&term.phone))
            }
            None => true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct IdentityCounts {
    pub admin: i64,
    pub seller: i64,
    pub customer: i64,
    pub active: i64,
    pub inactive: i64,
    pub banned: i64,
}

impl IdentityCounts {
    pub fn add(&mut self, role: Role, status: Status, n: i64) {
        match role {
            Role::Admin => self.admin += n,
            Role::Seller => self.seller += n,
            Role::Customer => self.customer += n,
        }
        match status {
            Status::Active => self.active += n,
            Status::Inactive => self.inactive += n,
            Status::Banned => self.banned += n,
        }
    }
}
