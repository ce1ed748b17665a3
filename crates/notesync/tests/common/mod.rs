#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use notesync::{
    AttachmentStore, CollectionStore, ManualAuth, MemoryAttachmentStore, MemoryGateway,
    ModelAdapter, NoteService, SequentialIds, SessionController, StoreHandle, SyncContext,
};
use notesync_api::{AuthSession, ControllerEvent, NoteRecord, RecordId, SessionState};
use tokio::sync::broadcast;

pub const WAIT: Duration = Duration::from_secs(2);

/// Everything a scenario needs, wired the way an application would.
pub struct Harness {
    pub auth: Arc<ManualAuth>,
    pub gateway: Arc<MemoryGateway>,
    pub attachments: Arc<MemoryAttachmentStore>,
    pub store: StoreHandle,
    pub service: NoteService,
    pub controller: SessionController,
    pub events: broadcast::Receiver<ControllerEvent>,
}

impl Harness {
    pub async fn start(auth: ManualAuth) -> Self {
        Self::start_with(auth, |_| async {}).await
    }

    /// Build the harness, letting `seed` preload the backend first.
    pub async fn start_with<F, Fut>(auth: ManualAuth, seed: F) -> Self
    where
        F: FnOnce(Arc<MemoryGateway>) -> Fut,
        Fut: std::future::Future<Output = ()>,
    {
        let auth = Arc::new(auth);
        let gateway = Arc::new(MemoryGateway::new(auth.clone()));
        seed(gateway.clone()).await;

        let attachments = Arc::new(MemoryAttachmentStore::new());
        let store = StoreHandle::spawn(CollectionStore::new(64));
        let ctx = SyncContext::new(gateway.clone(), store.clone())
            .with_attachments(attachments.clone() as Arc<dyn AttachmentStore>)
            .with_adapter(ModelAdapter::new(Arc::new(SequentialIds::new("note"))));

        let controller = SessionController::spawn(auth.clone(), ctx.clone(), 64);
        let events = controller.subscribe();

        Self {
            auth,
            gateway,
            attachments,
            store,
            service: NoteService::new(ctx),
            controller,
            events,
        }
    }

    /// Wait for the first controller event matching `pred`.
    pub async fn expect_event(
        &mut self,
        pred: impl Fn(&ControllerEvent) -> bool,
    ) -> ControllerEvent {
        tokio::time::timeout(WAIT, async {
            loop {
                let event = self.events.recv().await.expect("controller event stream");
                if pred(&event) {
                    return event;
                }
            }
        })
        .await
        .expect("timed out waiting for controller event")
    }

    pub async fn expect_state(&mut self, state: SessionState) {
        self.expect_event(|e| *e == ControllerEvent::Transitioned(state))
            .await;
    }

    pub async fn sign_in_and_refresh(&mut self, principal: &str) -> usize {
        self.auth.sign_in(session(principal)).await;
        match self
            .expect_event(|e| matches!(e, ControllerEvent::Refreshed { .. }))
            .await
        {
            ControllerEvent::Refreshed { count } => count,
            _ => unreachable!(),
        }
    }

    pub async fn names(&self) -> Vec<String> {
        self.store
            .snapshot()
            .await
            .unwrap()
            .iter()
            .map(|item| item.name().to_string())
            .collect()
    }
}

pub fn session(principal: &str) -> AuthSession {
    AuthSession::new(principal, format!("token-{}", principal))
}

pub fn record(id: &str, name: &str) -> NoteRecord {
    NoteRecord::new(RecordId::from(id), name)
}
