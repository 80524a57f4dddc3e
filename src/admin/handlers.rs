use axum::{
    extract::{Path, Query, State},
    response::Redirect,
    routing::get,
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{
        AdminDashboard, CreateUserRequest, SellerView, UpdateUserRequest, UserDetail,
        UserListQuery,
    },
    services,
};
use crate::{
    auth::CurrentIdentity,
    error::AppError,
    identity::{Identity, IdentityFilter, Role},
    state::AppState,
};

const RECENT_USERS: i64 = 5;

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/dashboard", get(dashboard))
        .route("/admin/users", get(list_users).post(create_user))
        .route(
            "/admin/users/:id",
            get(get_user).post(update_user).delete(delete_user),
        )
        .route("/admin/sellers", get(list_sellers))
        .route("/admin/sellers/:id", get(get_seller))
}

#[instrument(skip_all)]
pub async fn dashboard(State(state): State<AppState>) -> Result<Json<AdminDashboard>, AppError> {
    let counts = state.identities.counts().await?;
    let recent = state
        .identities
        .list(&IdentityFilter { limit: RECENT_USERS, ..Default::default() })
        .await?;
    Ok(Json(AdminDashboard { counts, recent }))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    Query(q): Query<UserListQuery>,
) -> Result<Json<Vec<Identity>>, AppError> {
    let filter = services::list_filter(&q)?;
    Ok(Json(state.identities.list(&filter).await?))
}

#[instrument(skip_all)]
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<Redirect, AppError> {
    let (identity, _) = services::create_user(state.identities.as_ref(), &payload).await?;
    Ok(Redirect::to(&format!("/admin/users/{}", identity.id)))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<UserDetail>, AppError> {
    let identity = state.identities.find_by_id(id).await?.ok_or(AppError::NotFound)?;
    let seller_profile = state.identities.seller_profile(id).await?;
    Ok(Json(UserDetail { identity, seller_profile }))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Redirect, AppError> {
    services::update_user(state.identities.as_ref(), id, &payload).await?;
    Ok(Redirect::to(&format!("/admin/users/{id}")))
}

#[instrument(skip(state, current), fields(actor_id = current.identity.id))]
pub async fn delete_user(
    State(state): State<AppState>,
    current: CurrentIdentity,
    Path(id): Path<i64>,
) -> Result<Redirect, AppError> {
    services::delete_user(state.identities.as_ref(), current.identity.id, id).await?;
    Ok(Redirect::to("/admin/users"))
}

#[instrument(skip(state))]
pub async fn list_sellers(
    State(state): State<AppState>,
    Query(q): Query<UserListQuery>,
) -> Result<Json<Vec<SellerView>>, AppError> {
    let filter = services::list_filter(&q)?;
    let sellers = state.identities.list_sellers(&filter).await?;
    Ok(Json(
        sellers
            .into_iter()
            .map(|(identity, profile)| SellerView { identity, profile })
            .collect(),
    ))
}

#[instrument(skip(state))]
pub async fn get_seller(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<SellerView>, AppError> {
    let identity = state
        .identities
        .find_by_id(id)
        .await?
        .filter(|i| i.role == Role::Seller)
        .ok_or(AppError::NotFound)?;
    let profile = state.identities.seller_profile(id).await?.ok_or(AppError::NotFound)?;
    Ok(Json(SellerView { identity, profile }))
}
