//! Session-driven refresh controller
//!
//! Two states, `SignedOut` and `SignedIn`, cycling for the life of the
//! process:
//! - entering `SignedIn` issues `list()` in the background; the result is
//!   converted to items and replaces the collection
//! - entering `SignedOut` clears the collection immediately
//!
//! Every transition bumps an epoch. A list result is applied only if the
//! epoch that requested it is still current, so sign-out always wins over
//! an in-flight refresh.

use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::auth::AuthProvider;
use crate::context::SyncContext;
use crate::gateway::GatewayResult;
use notesync_api::{AuthEvent, AuthState, ControllerEvent, NoteItem, SessionState};

pub struct SessionController {
    state_rx: watch::Receiver<SessionState>,
    event_tx: broadcast::Sender<ControllerEvent>,
    task: JoinHandle<()>,
}

impl SessionController {
    /// Start the controller on a new task.
    ///
    /// The initial state is taken from one `current_session()` query; the
    /// controller subscribes to auth events before asking so no transition
    /// is missed while the query is outstanding.
    pub fn spawn(auth: Arc<dyn AuthProvider>, ctx: SyncContext, buffer: usize) -> Self {
        let (state_tx, state_rx) = watch::channel(SessionState::SignedOut);
        let event_tx = broadcast::channel(buffer.max(1)).0;
        let (done_tx, done_rx) = mpsc::unbounded_channel();

        let machine = Machine {
            ctx,
            state_tx,
            event_tx: event_tx.clone(),
            epoch: 0,
            done_tx,
        };
        let task = tokio::spawn(machine.run(auth, done_rx));

        Self {
            state_rx,
            event_tx,
            task,
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Receiver that changes whenever the controller transitions.
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state_rx.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.event_tx.subscribe()
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct RefreshOutcome {
    epoch: u64,
    result: GatewayResult<Vec<NoteItem>>,
}

struct Machine {
    ctx: SyncContext,
    state_tx: watch::Sender<SessionState>,
    event_tx: broadcast::Sender<ControllerEvent>,
    epoch: u64,
    done_tx: mpsc::UnboundedSender<RefreshOutcome>,
}

impl Machine {
    async fn run(
        mut self,
        auth: Arc<dyn AuthProvider>,
        mut done_rx: mpsc::UnboundedReceiver<RefreshOutcome>,
    ) {
        let mut auth_rx = auth.subscribe();
        self.apply_auth_state(auth.as_ref()).await;

        loop {
            tokio::select! {
                event = auth_rx.recv() => match event {
                    Ok(AuthEvent::SignedIn(session)) => {
                        info!("[SessionController] Auth event: signed in as {}", session.principal);
                        self.enter_signed_in().await;
                    }
                    Ok(AuthEvent::SignedOut) => {
                        info!("[SessionController] Auth event: signed out");
                        self.enter_signed_out().await;
                    }
                    Err(RecvError::Lagged(n)) => {
                        warn!("[SessionController] Missed {} auth events, re-querying session", n);
                        self.apply_auth_state(auth.as_ref()).await;
                    }
                    Err(RecvError::Closed) => {
                        info!("[SessionController] Auth event stream closed, stopping");
                        break;
                    }
                },
                Some(outcome) = done_rx.recv() => self.apply_refresh(outcome).await,
            }
        }
    }

    async fn apply_auth_state(&mut self, auth: &dyn AuthProvider) {
        match auth.current_session().await {
            Ok(AuthState::SignedIn(session)) => {
                info!("[SessionController] Session established for {}", session.principal);
                self.enter_signed_in().await;
            }
            Ok(AuthState::SignedOut) => self.enter_signed_out().await,
            Err(e) => {
                warn!("[SessionController] Session query failed, treating as signed out: {}", e);
                self.enter_signed_out().await;
            }
        }
    }

    /// Move to `state`, invalidating any outstanding refresh. Returns the
    /// state left behind.
    fn transition(&mut self, state: SessionState) -> SessionState {
        self.epoch += 1;
        self.state_tx.send_replace(state)
    }

    fn announce(&self, state: SessionState) {
        let _ = self.event_tx.send(ControllerEvent::Transitioned(state));
    }

    async fn enter_signed_in(&mut self) {
        let previous = self.transition(SessionState::SignedIn);

        // A second sign-in may be a different principal; drop their predecessor's notes
        if previous == SessionState::SignedIn {
            self.clear_store().await;
        }
        self.announce(SessionState::SignedIn);

        let epoch = self.epoch;
        let ctx = self.ctx.clone();
        let done_tx = self.done_tx.clone();
        tokio::spawn(async move {
            let result = load_items(&ctx).await;
            // The controller may already be gone
            let _ = done_tx.send(RefreshOutcome { epoch, result });
        });
    }

    async fn enter_signed_out(&mut self) {
        self.transition(SessionState::SignedOut);
        self.clear_store().await;
        self.announce(SessionState::SignedOut);
    }

    async fn clear_store(&self) {
        if let Err(e) = self.ctx.store.replace_all(Vec::new()).await {
            error!("[SessionController] Failed to clear collection: {}", e);
        }
    }

    async fn apply_refresh(&mut self, outcome: RefreshOutcome) {
        if outcome.epoch != self.epoch {
            info!(
                "[SessionController] Dropping list result from epoch {} (current {})",
                outcome.epoch, self.epoch
            );
            let _ = self.event_tx.send(ControllerEvent::StaleRefreshDropped);
            return;
        }

        match outcome.result {
            Ok(items) => {
                let count = items.len();
                if let Err(e) = self.ctx.store.replace_all(items).await {
                    error!("[SessionController] Failed to populate collection: {}", e);
                    return;
                }
                info!("[SessionController] Refreshed collection with {} notes", count);
                let _ = self.event_tx.send(ControllerEvent::Refreshed { count });
            }
            Err(e) => {
                error!("[SessionController] List refresh failed: {}", e);
                let _ = self.event_tx.send(ControllerEvent::RefreshFailed(e));
            }
        }
    }
}

/// List remote records, resolve their images and convert them to items.
#[tracing::instrument(name = "controller.refresh", skip(ctx))]
async fn load_items(ctx: &SyncContext) -> GatewayResult<Vec<NoteItem>> {
    let records = ctx.gateway.list().await?;

    let items = records
        .into_iter()
        .map(|record| ctx.adapter.from_record(record))
        .collect::<Vec<_>>();

    let Some(attachments) = ctx.attachments.as_ref() else {
        return Ok(items);
    };

    Ok(join_all(items.into_iter().map(|mut item| async move {
        if let Some(key) = item.attachment_ref().map(str::to_string) {
            match attachments.get(&key).await {
                Ok(bytes) => item.image = Some(bytes),
                Err(e) => warn!("[SessionController] Could not load attachment {}: {}", key, e),
            }
        }
        item
    }))
    .await)
}
