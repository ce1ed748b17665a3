//! The slice of the authentication subsystem this engine depends on.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tracing::info;

use notesync_api::{AuthEvent, AuthSession, AuthState, GatewayError};

/// Session query plus push notifications on sign-in/sign-out.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Current session validity. May take a while to answer.
    async fn current_session(&self) -> Result<AuthState, GatewayError>;

    /// Receiver for subsequent sign-in/sign-out transitions.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

/// Auth source driven by explicit calls.
///
/// Stands in for the hosted identity service in tests and the CLI.
pub struct ManualAuth {
    state: RwLock<AuthState>,
    event_tx: broadcast::Sender<AuthEvent>,
    query_delay: Option<Duration>,
}

impl ManualAuth {
    pub fn new(buffer: usize) -> Self {
        Self {
            state: RwLock::new(AuthState::SignedOut),
            event_tx: broadcast::channel(buffer.max(1)).0,
            query_delay: None,
        }
    }

    /// Start with a session already established.
    pub fn signed_in(session: AuthSession, buffer: usize) -> Self {
        let auth = Self::new(buffer);
        Self {
            state: RwLock::new(AuthState::SignedIn(session)),
            ..auth
        }
    }

    /// Delay every `current_session` answer, like a slow token refresh.
    pub fn with_query_delay(mut self, delay: Duration) -> Self {
        self.query_delay = Some(delay);
        self
    }

    pub async fn sign_in(&self, session: AuthSession) {
        info!("[ManualAuth] Signed in as {}", session.principal);
        *self.state.write().await = AuthState::SignedIn(session.clone());
        // No subscribers is fine
        let _ = self.event_tx.send(AuthEvent::SignedIn(session));
    }

    pub async fn sign_out(&self) {
        info!("[ManualAuth] Signed out");
        *self.state.write().await = AuthState::SignedOut;
        let _ = self.event_tx.send(AuthEvent::SignedOut);
    }
}

#[async_trait]
impl AuthProvider for ManualAuth {
    async fn current_session(&self) -> Result<AuthState, GatewayError> {
        if let Some(delay) = self.query_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.state.read().await.clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.event_tx.subscribe()
    }
}

/// Resolves the session a remote call should run under.
pub(crate) async fn require_session(auth: &dyn AuthProvider) -> Result<AuthSession, GatewayError> {
    match auth.current_session().await? {
        AuthState::SignedIn(session) => Ok(session),
        AuthState::SignedOut => Err(GatewayError::unauthorized("no active session")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sign_in_and_out_push_events() {
        let auth = ManualAuth::new(16);
        let mut rx = auth.subscribe();

        let session = AuthSession::new("alice", "token-a");
        auth.sign_in(session.clone()).await;
        assert_eq!(rx.recv().await.unwrap(), AuthEvent::SignedIn(session.clone()));
        assert_eq!(
            auth.current_session().await.unwrap(),
            AuthState::SignedIn(session)
        );

        auth.sign_out().await;
        assert_eq!(rx.recv().await.unwrap(), AuthEvent::SignedOut);
        assert_eq!(auth.current_session().await.unwrap(), AuthState::SignedOut);
    }

    #[tokio::test]
    async fn test_require_session_without_sign_in() {
        let auth = ManualAuth::new(4);
        let err = require_session(&auth).await.unwrap_err();
        assert!(matches!(err, GatewayError::Unauthorized { .. }));
    }
}
