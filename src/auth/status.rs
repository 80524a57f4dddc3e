use crate::{error::AppError, identity::Status};

/// Reason shown to an identity whose status keeps it out.
pub fn unusable_reason(status: Status) -> Option<&'static str> {
    match status {
        Status::Active => None,
        Status::Inactive => Some("Your account is inactive. Please contact support."),
        Status::Banned => Some("Your account has been banned. Please contact support."),
    }
}

/// Login-time gate: only `active` gets through.
pub fn login_gate(status: Status) -> Result<(), AppError> {
    match unusable_reason(status) {
        None => Ok(()),
        Some(reason) => Err(AppError::AccountNotUsable { status, reason }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionDecision {
    Continue,
    ForceLogout { reason: &'static str },
}

/// Per-request gate for an existing session. Looser than `login_gate`:
/// an `inactive` identity keeps a session it already holds.
pub fn session_gate(status: Status) -> SessionDecision {
    match status {
        Status::Active | Status::Inactive => SessionDecision::Continue,
        Status::Banned => SessionDecision::ForceLogout {
            reason: unusable_reason(status).unwrap_or_default(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_active_logs_in() {
        assert!(login_gate(Status::Active).is_ok());
        for status in [Status::Inactive, Status::Banned] {
            match login_gate(status) {
                Err(AppError::AccountNotUsable { status: s, reason }) => {
                    assert_eq!(s, status);
                    assert!(reason.contains("contact support"));
                }
                other => panic!("expected AccountNotUsable, got {other:?}"),
            }
        }
    }

    #[test]
    fn reasons_are_status_specific() {
        assert!(unusable_reason(Status::Inactive).unwrap().contains("inactive"));
        assert!(unusable_reason(Status::Banned).unwrap().contains("banned"));
    }

    #[test]
    fn inactive_keeps_an_existing_session_banned_does_not() {
        assert_eq!(session_gate(Status::Active), SessionDecision::Continue);
        assert_eq!(session_gate(Status::Inactive), SessionDecision::Continue);
        assert!(matches!(
            session_gate(Status::Banned),
            SessionDecision::ForceLogout { .. }
        ));
    }
}
