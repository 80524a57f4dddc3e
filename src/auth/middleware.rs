use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, Method},
    middleware::Next,
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use tracing::{debug, warn};

use super::{
    cookies, roles,
    session::{Session, SessionManager},
    status::{self, SessionDecision},
};
use crate::{
    error::AppError,
    identity::{Identity, Role},
    state::AppState,
};

/// The authenticated caller, put on the request by [`role_gate`].
#[derive(Debug, Clone)]
pub struct CurrentIdentity {
    pub identity: Identity,
    pub session: Session,
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentIdentity
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentIdentity>()
            .cloned()
            .ok_or_else(|| Redirect::to("/login").into_response())
    }
}

/// State for one role-scoped router: the app plus the roles it admits.
#[derive(Clone)]
pub struct RoleGate {
    pub state: AppState,
    pub allowed: &'static [Role],
}

impl RoleGate {
    pub fn new(state: &AppState, allowed: &'static [Role]) -> Self {
        Self { state: state.clone(), allowed }
    }
}

fn to_login(state: &AppState, notice: Option<&str>) -> Response {
    let target = match notice {
        Some(n) => format!("/login?notice={n}"),
        None => "/login".to_string(),
    };
    (
        AppendHeaders([(header::SET_COOKIE, cookies::clear_session_cookie(&state.config.session))]),
        Redirect::to(&target),
    )
        .into_response()
}

/// Decides whether a request may reach a handler scoped to `allowed`.
/// `Err` carries the response to send instead.
pub async fn authorize_request(
    state: &AppState,
    method: &Method,
    headers: &HeaderMap,
    allowed: &[Role],
) -> Result<CurrentIdentity, Response> {
    let Some(token) = cookies::parse_cookie(headers, &state.config.session.cookie_name) else {
        return Err(Redirect::to("/login").into_response());
    };
    let sessions = SessionManager::from_ref(state);
    let session = match sessions.resolve(&token).await {
        Ok(Some(s)) => s,
        Ok(None) => return Err(to_login(state, Some("expired"))),
        Err(e) => return Err(AppError::Internal(e).into_response()),
    };

    let identity = match state.identities.find_by_id(session.identity_id).await {
        Ok(Some(identity)) => identity,
        Ok(None) => {
            sessions.terminate(&token).await.map_err(|e| AppError::Internal(e).into_response())?;
            return Err(to_login(state, None));
        }
        Err(e) => return Err(AppError::from(e).into_response()),
    };

    if let SessionDecision::ForceLogout { reason } = status::session_gate(identity.status) {
        warn!(user_id = identity.id, status = %identity.status, reason, "forced logout");
        sessions.terminate(&token).await.map_err(|e| AppError::Internal(e).into_response())?;
        return Err(to_login(state, Some(identity.status.as_str())));
    }

    if !roles::permits(allowed, identity.role) {
        warn!(user_id = identity.id, role = %identity.role, "role not permitted");
        return Err(AppError::Forbidden.into_response());
    }

    if !method.is_safe() && !cookies::csrf_matches(headers, &session) {
        warn!(user_id = identity.id, %method, "csrf token mismatch");
        return Err(AppError::Forbidden.into_response());
    }

    debug!(user_id = identity.id, role = %identity.role, "request authorized");
    Ok(CurrentIdentity { identity, session })
}

pub async fn role_gate(State(gate): State<RoleGate>, mut req: Request, next: Next) -> Response {
    let outcome =
        authorize_request(&gate.state, req.method(), req.headers(), gate.allowed).await;
    match outcome {
        Ok(current) => {
            req.extensions_mut().insert(current);
            next.run(req).await
        }
        Err(response) => response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use std::sync::Arc;

    use crate::auth::roles::{ADMIN_ONLY, ANY_ROLE, SELLER_ONLY};
    use crate::identity::{
        memory::MemoryIdentityStore, IdentityChanges, IdentityStore, ProfileChange, Status,
    };
    use crate::testing::{cookie_headers, location, seed};

    async fn logged_in(
        status: Status,
        role: Role,
    ) -> (AppState, Arc<MemoryIdentityStore>, Identity, Session) {
        let store = Arc::new(MemoryIdentityStore::new());
        let state = AppState::with_memory(store.clone());
        let identity = seed(&*store, "carol", "c@x.com", "012222222", "secret123", role, Status::Active).await;
        let session = SessionManager::from_ref(&state)
            .establish(&identity, false)
            .await
            .unwrap();
        if status != Status::Active {
            store
                .update(
                    identity.id,
                    None,
                    IdentityChanges { status: Some(status), ..Default::default() },
                    ProfileChange::Keep,
                )
                .await
                .unwrap();
        }
        (state, store, identity, session)
    }

    #[tokio::test]
    async fn no_session_redirects_to_login() {
        let state = AppState::fake();
        let err = authorize_request(&state, &Method::GET, &HeaderMap::new(), ANY_ROLE)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&err), "/login");
    }

    #[tokio::test]
    async fn garbage_cookie_redirects_and_clears_it() {
        let state = AppState::fake();
        let headers = cookie_headers(&state, "garbage");
        let err = authorize_request(&state, &Method::GET, &headers, ANY_ROLE)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&err), "/login?notice=expired");
        assert!(err.headers().contains_key(header::SET_COOKIE));
    }

    #[tokio::test]
    async fn active_identity_with_allowed_role_passes() {
        let (state, _, identity, session) = logged_in(Status::Active, Role::Seller).await;
        let headers = cookie_headers(&state, &session.token);
        let current = authorize_request(&state, &Method::GET, &headers, SELLER_ONLY)
            .await
            .expect("authorized");
        assert_eq!(current.identity.id, identity.id);
        assert_eq!(current.session.id, session.id);
    }

    #[tokio::test]
    async fn wrong_role_is_forbidden_without_redirect() {
        let (state, _, _, session) = logged_in(Status::Active, Role::Customer).await;
        let headers = cookie_headers(&state, &session.token);
        let err = authorize_request(&state, &Method::GET, &headers, ADMIN_ONLY)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert!(err.headers().get(header::LOCATION).is_none());
    }

    #[tokio::test]
    async fn banned_mid_session_is_logged_out() {
        let (state, _, _, session) = logged_in(Status::Banned, Role::Customer).await;
        let headers = cookie_headers(&state, &session.token);
        let err = authorize_request(&state, &Method::GET, &headers, ANY_ROLE)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&err), "/login?notice=banned");
        let sessions = SessionManager::from_ref(&state);
        assert!(sessions.resolve(&session.token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn inactive_mid_session_keeps_going() {
        let (state, _, _, session) = logged_in(Status::Inactive, Role::Customer).await;
        let headers = cookie_headers(&state, &session.token);
        assert!(authorize_request(&state, &Method::GET, &headers, ANY_ROLE).await.is_ok());
    }

    #[tokio::test]
    async fn deleted_identity_loses_its_session() {
        let (state, store, identity, session) = logged_in(Status::Active, Role::Customer).await;
        store.delete(identity.id).await.unwrap();
        let headers = cookie_headers(&state, &session.token);
        let err = authorize_request(&state, &Method::GET, &headers, ANY_ROLE)
            .await
            .unwrap_err();
        assert_eq!(location(&err), "/login");
    }

    #[tokio::test]
    async fn unsafe_methods_need_the_csrf_header() {
        let (state, _, _, session) = logged_in(Status::Active, Role::Admin).await;
        let mut headers = cookie_headers(&state, &session.token);
        let err = authorize_request(&state, &Method::POST, &headers, ADMIN_ONLY)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        headers.insert(cookies::CSRF_HEADER, session.csrf_token.parse().unwrap());
        assert!(authorize_request(&state, &Method::POST, &headers, ADMIN_ONLY).await.is_ok());
    }
}
