use std::sync::Arc;

use axum::extract::FromRef;
use rand::{distributions::Alphanumeric, Rng};
use serde::Serialize;
use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;

use super::jwt::{SessionKeys, SessionKind};
use super::session_store::{SessionRecord, SessionStore};
use crate::{identity::Identity, state::AppState};

const CSRF_TOKEN_LEN: usize = 40;

/// A live, authenticated session.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: Uuid,
    pub identity_id: i64,
    pub csrf_token: String,
    pub remember: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    #[serde(skip_serializing)]
    pub token: String, // goes out in the cookie only
}

/// Creates, rotates and tears down sessions. All operations are safe to retry.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    keys: SessionKeys,
}

impl FromRef<AppState> for SessionManager {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.sessions.clone(), SessionKeys::from_ref(state))
    }
}

fn csrf_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CSRF_TOKEN_LEN)
        .map(char::from)
        .collect()
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, keys: SessionKeys) -> Self {
        Self { store, keys }
    }

    async fn open(&self, identity_id: i64, remember: bool) -> anyhow::Result<Session> {
        let kind = SessionKind::from_remember(remember);
        let now = OffsetDateTime::now_utc();
        let record = SessionRecord {
            id: Uuid::new_v4(),
            user_id: identity_id,
            csrf_token: csrf_token(),
            remember,
            expires_at: now + self.keys.ttl_for(kind),
            created_at: now,
        };
        let token = self.keys.sign(identity_id, record.id, kind, now, record.expires_at)?;
        self.store.insert(&record).await?;
        Ok(Session {
            id: record.id,
            identity_id,
            csrf_token: record.csrf_token,
            remember,
            expires_at: record.expires_at,
            token,
        })
    }

    /// Binds a new session to `identity`.
    pub async fn establish(&self, identity: &Identity, remember: bool) -> anyhow::Result<Session> {
        let session = self.open(identity.id, remember).await?;
        debug!(user_id = identity.id, sid = %session.id, remember, "session established");
        Ok(session)
    }

    /// Same identity, new id, token and anti-forgery token; the old row is gone.
    pub async fn regenerate(&self, session: &Session) -> anyhow::Result<Session> {
        let fresh = self.open(session.identity_id, session.remember).await?;
        self.store.delete(session.id).await?;
        debug!(user_id = session.identity_id, old = %session.id, new = %fresh.id, "session regenerated");
        Ok(fresh)
    }

    /// Invalidates whatever session `token` names. Unknown, malformed or
    /// already-terminated tokens are a no-op.
    pub async fn terminate(&self, token: &str) -> anyhow::Result<()> {
        let Ok(claims) = self.keys.verify_ignoring_expiry(token) else {
            return Ok(());
        };
        if self.store.delete(claims.sid).await? {
            info!(user_id = claims.sub, sid = %claims.sid, "session terminated");
        }
        Ok(())
    }

    /// Looks up the live session behind `token`.
    pub async fn resolve(&self, token: &str) -> anyhow::Result<Option<Session>> {
        let Ok(claims) = self.keys.verify(token) else {
            return Ok(None);
        };
        let Some(record) = self.store.find(claims.sid).await? else {
            return Ok(None);
        };
        if record.user_id != claims.sub {
            return Ok(None);
        }
        if record.expires_at <= OffsetDateTime::now_utc() {
            self.store.delete(record.id).await?;
            return Ok(None);
        }
        Ok(Some(Session {
            id: record.id,
            identity_id: record.user_id,
            csrf_token: record.csrf_token,
            remember: record.remember,
            expires_at: record.expires_at,
            token: token.to_string(),
        }))
    }

    /// Login and registration entry: drop the channel's previous session,
    /// establish a new one and regenerate it.
    pub async fn begin(
        &self,
        identity: &Identity,
        remember: bool,
        prior_token: Option<&str>,
    ) -> anyhow::Result<Session> {
        if let Some(prior) = prior_token {
            self.terminate(prior).await?;
        }
        let session = self.establish(identity, remember).await?;
        self.regenerate(&session).await
    }
}
