//! Narrow view of the external authentication subsystem.

use serde::{Deserialize, Serialize};

/// An established session for one principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    /// Authenticated identity owning the records.
    pub principal: String,
    /// Bearer token presented to the backend.
    pub token: String,
}

impl AuthSession {
    pub fn new(principal: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            token: token.into(),
        }
    }
}

/// Answer to "is there a valid session right now?".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    SignedOut,
    SignedIn(AuthSession),
}

impl AuthState {
    pub fn session(&self) -> Option<&AuthSession> {
        match self {
            AuthState::SignedIn(session) => Some(session),
            AuthState::SignedOut => None,
        }
    }
}

/// Transition pushed by the auth subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(AuthSession),
    SignedOut,
}

/// State of the session-driven refresh controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionState {
    #[default]
    SignedOut,
    SignedIn,
}
