use serde::{Deserialize, Serialize};

use crate::{
    auth::{registration::RegisterRequest, validation::SellerFields},
    identity::{Identity, IdentityCounts, SellerProfile},
};

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// `?role=&status=&search=&limit=&offset=`. Empty values mean "any".
#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub role: Option<String>,
    pub status: Option<String>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Admin-created account: the registration form plus a chosen status.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateUserRequest {
    #[serde(flatten)]
    pub account: RegisterRequest,
    pub status: Option<String>,
}

/// Admin edit. Absent fields are left as they are.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Option<String>,
    pub status: Option<String>,
    pub password: Option<String>,
    pub password_confirmation: Option<String>,
    #[serde(flatten)]
    pub seller: SellerFields,
}

#[derive(Debug, Serialize)]
pub struct AdminDashboard {
    pub counts: IdentityCounts,
    pub recent: Vec<Identity>,
}

#[derive(Debug, Serialize)]
pub struct UserDetail {
    pub identity: Identity,
    pub seller_profile: Option<SellerProfile>,
}

#[derive(Debug, Serialize)]
pub struct SellerView {
    pub identity: Identity,
    pub profile: SellerProfile,
}
