use axum::http::{header, HeaderMap, HeaderValue};

use super::session::Session;
use crate::config::SessionConfig;

pub const CSRF_HEADER: &str = "x-csrf-token";

pub fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for value in headers.get_all(header::COOKIE) {
        let Ok(s) = value.to_str() else { continue };
        for part in s.split(';') {
            if let Some((k, v)) = part.trim().split_once('=') {
                if k == name && !v.is_empty() {
                    return Some(v.to_string());
                }
            }
        }
    }
    None
}

/// `Set-Cookie` for a live session. Remembered sessions persist across
/// browser restarts; others are browser-session cookies.
pub fn session_cookie(cfg: &SessionConfig, session: &Session) -> anyhow::Result<HeaderValue> {
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/",
        cfg.cookie_name, session.token
    );
    if session.remember {
        cookie.push_str(&format!("; Max-Age={}", cfg.remember_ttl_minutes * 60));
    }
    if cfg.secure_cookie {
        cookie.push_str("; Secure");
    }
    Ok(HeaderValue::from_str(&cookie)?)
}

pub fn clear_session_cookie(cfg: &SessionConfig) -> HeaderValue {
    let mut cookie = format!("{}=; Max-Age=0; HttpOnly; SameSite=Lax; Path=/", cfg.cookie_name);
    if cfg.secure_cookie {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).unwrap_or_else(|_| HeaderValue::from_static("deleted=; Max-Age=0"))
}

pub fn csrf_matches(headers: &HeaderMap, session: &Session) -> bool {
    headers
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|provided| provided == session.csrf_token)
}
