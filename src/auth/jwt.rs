use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::{config::SessionConfig, state::AppState};

/// Lifetime class of a session token.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Standard,
    Remember,
}

impl SessionKind {
    pub fn from_remember(remember: bool) -> Self {
        if remember {
            SessionKind::Remember
        } else {
            SessionKind::Standard
        }
    }
}

/// Payload of the signed session cookie. The server-side row named by
/// `sid` is authoritative; the signature only stops forged ids.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionClaims {
    pub sub: i64,  // identity id
    pub sid: Uuid, // session row id
    pub iat: usize,
    pub exp: usize,
    pub iss: String,
    pub aud: String,
    pub kind: SessionKind,
}

#[derive(Clone)]
pub struct SessionKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub ttl: time::Duration,
    pub remember_ttl: time::Duration,
}

impl From<&SessionConfig> for SessionKeys {
    fn from(cfg: &SessionConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: time::Duration::minutes(cfg.ttl_minutes),
            remember_ttl: time::Duration::minutes(cfg.remember_ttl_minutes),
        }
    }
}

impl FromRef<AppState> for SessionKeys {
    fn from_ref(state: &AppState) -> Self {
        SessionKeys::from(&state.config.session)
    }
}

impl SessionKeys {
    pub fn ttl_for(&self, kind: SessionKind) -> time::Duration {
        match kind {
            SessionKind::Standard => self.ttl,
            SessionKind::Remember => self.remember_ttl,
        }
    }

    pub fn sign(
        &self,
        identity_id: i64,
        sid: Uuid,
        kind: SessionKind,
        issued_at: time::OffsetDateTime,
        expires_at: time::OffsetDateTime,
    ) -> anyhow::Result<String> {
        let claims = SessionClaims {
            sub: identity_id,
            sid,
            iat: issued_at.unix_timestamp() as usize,
            exp: expires_at.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = identity_id, %sid, kind = ?kind, "session token signed");
        Ok(token)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<SessionClaims> {
        let data = decode::<SessionClaims>(token, &self.decoding, &self.validation())?;
        Ok(data.claims)
    }

    /// Signature and audience are still checked; only expiry is ignored.
    /// Used when tearing a session down.
    pub fn verify_ignoring_expiry(&self, token: &str) -> anyhow::Result<SessionClaims> {
        let mut validation = self.validation();
        validation.validate_exp = false;
        let data = decode::<SessionClaims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }
}
