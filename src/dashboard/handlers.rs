use axum::{
    extract::State,
    response::Redirect,
    routing::get,
    Json, Router,
};
use tracing::{error, instrument};

use super::{
    dto::{CustomerDashboard, ProfileUpdateRequest, ProfileView, SellerDashboard},
    services,
};
use crate::{
    auth::{validation::SellerFields, CurrentIdentity},
    error::AppError,
    identity::SellerProfile,
    state::AppState,
};

pub fn customer_routes() -> Router<AppState> {
    Router::new().route("/customer/dashboard", get(customer_dashboard))
}

pub fn seller_routes() -> Router<AppState> {
    Router::new()
        .route("/seller/dashboard", get(seller_dashboard))
        .route("/seller/profile", get(get_farm).post(update_farm))
}

pub fn profile_routes() -> Router<AppState> {
    Router::new().route("/profile", get(get_profile).post(update_profile))
}

/// A seller's farm profile; its absence breaks the role/profile invariant.
async fn farm_of(state: &AppState, user_id: i64) -> Result<SellerProfile, AppError> {
    match state.identities.seller_profile(user_id).await? {
        Some(p) => Ok(p),
        None => {
            error!(user_id, "seller without farm profile");
            Err(AppError::Internal(anyhow::anyhow!("seller {user_id} has no profile")))
        }
    }
}

#[instrument(skip_all, fields(user_id = current.identity.id))]
pub async fn customer_dashboard(current: CurrentIdentity) -> Json<CustomerDashboard> {
    Json(CustomerDashboard { identity: current.identity })
}

#[instrument(skip_all, fields(user_id = current.identity.id))]
pub async fn seller_dashboard(
    State(state): State<AppState>,
    current: CurrentIdentity,
) -> Result<Json<SellerDashboard>, AppError> {
    let profile = farm_of(&state, current.identity.id).await?;
    Ok(Json(SellerDashboard { identity: current.identity, profile }))
}

#[instrument(skip_all, fields(user_id = current.identity.id))]
pub async fn get_profile(
    State(state): State<AppState>,
    current: CurrentIdentity,
) -> Result<Json<ProfileView>, AppError> {
    let seller_profile = state.identities.seller_profile(current.identity.id).await?;
    Ok(Json(ProfileView { identity: current.identity, seller_profile }))
}

#[instrument(skip_all, fields(user_id = current.identity.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    current: CurrentIdentity,
    Json(payload): Json<ProfileUpdateRequest>,
) -> Result<Redirect, AppError> {
    services::update_own_profile(state.identities.as_ref(), &current.identity, &payload).await?;
    Ok(Redirect::to("/profile"))
}

#[instrument(skip_all, fields(user_id = current.identity.id))]
pub async fn get_farm(
    State(state): State<AppState>,
    current: CurrentIdentity,
) -> Result<Json<SellerProfile>, AppError> {
    Ok(Json(farm_of(&state, current.identity.id).await?))
}

#[instrument(skip_all, fields(user_id = current.identity.id))]
pub async fn update_farm(
    State(state): State<AppState>,
    current: CurrentIdentity,
    Json(fields): Json<SellerFields>,
) -> Result<Redirect, AppError> {
    services::update_farm(state.identities.as_ref(), current.identity.id, &fields).await?;
    Ok(Redirect::to("/seller/profile"))
}
