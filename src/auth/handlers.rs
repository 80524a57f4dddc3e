use axum::{
    extract::{FromRef, Query, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use super::{
    cookies::{self, CSRF_HEADER},
    credentials,
    dto::{LoginPage, LoginQuery, LoginRequest, RegisterPage, SessionView},
    registration::{self, RegisterRequest},
    roles,
    session::{Session, SessionManager},
    status::{self, SessionDecision},
};
use crate::{
    error::AppError,
    identity::{Identity, Role, Status},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_page).post(login))
        .route("/logout", post(logout))
        .route("/register", get(register_page).post(register))
        .route("/session", get(current_session))
}

fn notice_message(notice: &str) -> Option<&'static str> {
    match notice {
        "banned" => status::unusable_reason(Status::Banned),
        "inactive" => status::unusable_reason(Status::Inactive),
        "expired" => Some("Your session has expired. Please log in again."),
        _ => None,
    }
}

/// 303 to the role's dashboard carrying the new session cookie.
fn signed_in(state: &AppState, session: &Session, role: Role) -> Result<Response, AppError> {
    let cookie = cookies::session_cookie(&state.config.session, session)?;
    let csrf = HeaderValue::from_str(&session.csrf_token).map_err(anyhow::Error::from)?;
    Ok((
        AppendHeaders([
            (header::SET_COOKIE, cookie),
            (HeaderName::from_static(CSRF_HEADER), csrf),
        ]),
        Redirect::to(roles::dashboard(role)),
    )
        .into_response())
}

#[instrument(skip_all)]
pub async fn login_page(Query(q): Query<LoginQuery>) -> Json<LoginPage> {
    Json(LoginPage {
        fields: &["identifier", "password", "remember"],
        notice: q.notice.as_deref().and_then(notice_message),
    })
}

#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, AppError> {
    let identity: Identity =
        credentials::verify(state.identities.as_ref(), &payload.identifier, &payload.password).await?;

    if let Err(e) = status::login_gate(identity.status) {
        warn!(user_id = identity.id, status = %identity.status, "login refused by status");
        return Err(e);
    }

    let prior = cookies::parse_cookie(&headers, &state.config.session.cookie_name);
    let session = SessionManager::from_ref(&state)
        .begin(&identity, payload.remember, prior.as_deref())
        .await?;
    state.identities.record_login(identity.id, OffsetDateTime::now_utc()).await?;

    info!(user_id = identity.id, role = %identity.role, "user logged in");
    signed_in(&state, &session, identity.role)
}

#[instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, AppError> {
    let cfg = &state.config.session;
    if let Some(token) = cookies::parse_cookie(&headers, &cfg.cookie_name) {
        let sessions = SessionManager::from_ref(&state);
        if let Some(session) = sessions.resolve(&token).await? {
            if !cookies::csrf_matches(&headers, &session) {
                warn!(user_id = session.identity_id, "logout without valid csrf token");
                return Err(AppError::Forbidden);
            }
        }
        sessions.terminate(&token).await?;
    }
    Ok((
        AppendHeaders([(header::SET_COOKIE, cookies::clear_session_cookie(cfg))]),
        Redirect::to("/login"),
    )
        .into_response())
}

#[instrument(skip_all)]
pub async fn register_page() -> Json<RegisterPage> {
    Json(RegisterPage {
        roles: registration::SELF_SERVICE_ROLES,
        seller_required: &["farm_name", "location_district"],
    })
}

#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<RegisterRequest>,
) -> Result<Response, AppError> {
    let (identity, _) = registration::register(state.identities.as_ref(), &payload).await?;

    let prior = cookies::parse_cookie(&headers, &state.config.session.cookie_name);
    let session = SessionManager::from_ref(&state)
        .begin(&identity, false, prior.as_deref())
        .await?;
    signed_in(&state, &session, identity.role)
}

#[instrument(skip_all)]
pub async fn current_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SessionView>, Response> {
    let unauthorized = || StatusCode::UNAUTHORIZED.into_response();
    let internal = |e: AppError| e.into_response();

    let token = cookies::parse_cookie(&headers, &state.config.session.cookie_name)
        .ok_or_else(unauthorized)?;
    let sessions = SessionManager::from_ref(&state);
    let session = sessions
        .resolve(&token)
        .await
        .map_err(|e| internal(e.into()))?
        .ok_or_else(unauthorized)?;
    let identity = state
        .identities
        .find_by_id(session.identity_id)
        .await
        .map_err(|e| internal(e.into()))?
        .ok_or_else(unauthorized)?;

    if let SessionDecision::ForceLogout { .. } = status::session_gate(identity.status) {
        sessions.terminate(&token).await.map_err(|e| internal(e.into()))?;
        return Err(unauthorized());
    }

    Ok(Json(SessionView {
        dashboard: roles::dashboard(identity.role),
        identity,
        session,
    }))
}
