use serde::{Deserialize, Serialize};

use crate::identity::{Identity, SellerProfile};

#[derive(Debug, Serialize)]
pub struct CustomerDashboard {
    pub identity: Identity,
}

#[derive(Debug, Serialize)]
pub struct SellerDashboard {
    pub identity: Identity,
    pub profile: SellerProfile,
}

#[derive(Debug, Serialize)]
pub struct ProfileView {
    pub identity: Identity,
    pub seller_profile: Option<SellerProfile>,
}

/// Self-service account edit. Role and status are not accepted here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdateRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub current_password: Option<String>,
    pub password: Option<String>,
    pub password_confirmation: Option<String>,
}
