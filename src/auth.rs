//! Explicit authentication context handed to the submission orchestrator.
//!
//! The orchestrator never looks up a session on its own; whoever starts a
//! submission passes the caller's `AuthContext` in.

use secrecy::SecretString;

use crate::error::SubmissionError;

/// A signed-in user with the bearer token the backend expects.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user_id: String,
    access_token: SecretString,
}

impl AuthSession {
    pub fn new(user_id: impl Into<String>, access_token: SecretString) -> Self {
        Self {
            user_id: user_id.into(),
            access_token,
        }
    }

    pub fn access_token(&self) -> &SecretString {
        &self.access_token
    }
}

/// Caller identity for one submission. Anonymous when no session exists.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    session: Option<AuthSession>,
}

impl AuthContext {
    pub fn anonymous() -> Self {
        Self { session: None }
    }

    pub fn authenticated(session: AuthSession) -> Self {
        Self {
            session: Some(session),
        }
    }

    pub fn session(&self) -> Option<&AuthSession> {
        self.session.as_ref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.user_id.as_str())
    }

    /// The session, or `Unauthenticated` when absent or the user id is blank.
    pub fn require_session(&self) -> Result<&AuthSession, SubmissionError> {
        match self.session.as_ref() {
            Some(session) if !session.user_id.trim().is_empty() => Ok(session),
            _ => Err(SubmissionError::Unauthenticated),
        }
    }
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn anonymous_context_is_rejected() {
        let auth = AuthContext::anonymous();
        assert!(matches!(
            auth.require_session(),
            Err(SubmissionError::Unauthenticated)
        ));
        assert!(auth.user_id().is_none());
    }

    #[test]
    fn blank_user_id_is_rejected() {
        let auth = AuthContext::authenticated(AuthSession::new("  ", SecretString::from("tok")));
        assert!(auth.require_session().is_err());
    }

    #[test]
    fn authenticated_context_exposes_session() {
        let auth = AuthContext::authenticated(AuthSession::new("user-1", SecretString::from("tok")));
        let session = auth.require_session().unwrap();
        assert_eq!(session.user_id, "user-1");
        assert_eq!(session.access_token().expose_secret(), "tok");
    }

    #[test]
    fn debug_output_redacts_token() {
        let auth = AuthContext::authenticated(AuthSession::new(
            "user-1",
            SecretString::from("super-secret"),
        ));
        let debug = format!("{auth:?}");
        assert!(!debug.contains("super-secret"));
    }
}
