//! In-memory backend with per-principal ownership.
//!
//! Behaves like the hosted API for the engine's purposes: records are
//! scoped to the signed-in principal, the caller supplies ids, the first
//! create for an id wins, and deleting a missing id reports `NotFound`.
//! Tests can inspect issued calls, inject failures and hold `list`
//! responses to observe in-flight behaviour.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};

use super::{GatewayCall, GatewayResult, RemoteGateway};
use crate::auth::{require_session, AuthProvider};
use notesync_api::{GatewayError, NoteRecord, RecordId};

#[derive(Default)]
struct MemoryState {
    records: HashMap<String, Vec<NoteRecord>>,
    calls: Vec<GatewayCall>,
    failures: VecDeque<GatewayError>,
}

pub struct MemoryGateway {
    auth: Arc<dyn AuthProvider>,
    state: Mutex<MemoryState>,
    list_held: watch::Sender<bool>,
}

impl MemoryGateway {
    pub fn new(auth: Arc<dyn AuthProvider>) -> Self {
        Self {
            auth,
            state: Mutex::new(MemoryState::default()),
            list_held: watch::channel(false).0,
        }
    }

    /// Preload records owned by `principal`.
    pub async fn seed(&self, principal: &str, records: Vec<NoteRecord>) {
        let mut state = self.state.lock().await;
        state
            .records
            .entry(principal.to_string())
            .or_default()
            .extend(records);
    }

    /// Records currently stored for `principal`, in insertion order.
    pub async fn records_for(&self, principal: &str) -> Vec<NoteRecord> {
        let state = self.state.lock().await;
        state.records.get(principal).cloned().unwrap_or_default()
    }

    /// Whether `id` exists for `principal`.
    pub async fn contains(&self, principal: &str, id: &RecordId) -> bool {
        self.records_for(principal).await.iter().any(|r| &r.id == id)
    }

    /// Every call issued so far.
    pub async fn calls(&self) -> Vec<GatewayCall> {
        self.state.lock().await.calls.clone()
    }

    /// Make the next call (of any kind) fail with `error`.
    pub async fn fail_next(&self, error: GatewayError) {
        self.state.lock().await.failures.push_back(error);
    }

    /// Park `list` responses until `release_lists` is called.
    pub fn hold_lists(&self) {
        self.list_held.send_replace(true);
    }

    pub fn release_lists(&self) {
        self.list_held.send_replace(false);
    }

    /// Record the call, resolve the principal and consume an injected failure.
    async fn begin(&self, call: GatewayCall) -> GatewayResult<String> {
        let mut state = self.state.lock().await;
        state.calls.push(call.clone());
        drop(state);

        let session = require_session(self.auth.as_ref()).await?;

        let mut state = self.state.lock().await;
        if let Some(err) = state.failures.pop_front() {
            warn!("[MemoryGateway] Injected failure for {:?}: {}", call, err);
            return Err(err);
        }
        Ok(session.principal)
    }
}

#[async_trait]
impl RemoteGateway for MemoryGateway {
    async fn list(&self) -> GatewayResult<Vec<NoteRecord>> {
        let principal = self.begin(GatewayCall::List).await?;

        let mut held = self.list_held.subscribe();
        if held.wait_for(|is_held| !*is_held).await.is_err() {
            return Err(GatewayError::network("memory backend shut down"));
        }

        let records = self.records_for(&principal).await;
        debug!(
            "[MemoryGateway] list for {} -> {} records",
            principal,
            records.len()
        );
        Ok(records)
    }

    async fn create(&self, record: &NoteRecord) -> GatewayResult<NoteRecord> {
        let principal = self.begin(GatewayCall::Create(record.clone())).await?;
        if let Err(e) = record.validate() {
            return Err(GatewayError::unknown(e.to_string()));
        }

        let mut state = self.state.lock().await;
        let owned = state.records.entry(principal).or_default();
        if let Some(existing) = owned.iter().find(|r| r.id == record.id) {
            debug!("[MemoryGateway] create for existing id {} ignored", record.id);
            return Ok(existing.clone());
        }
        owned.push(record.clone());
        Ok(record.clone())
    }

    async fn delete(&self, record: &NoteRecord) -> GatewayResult<NoteRecord> {
        let principal = self.begin(GatewayCall::Delete(record.id.clone())).await?;

        let mut state = self.state.lock().await;
        let owned = state.records.entry(principal).or_default();
        match owned.iter().position(|r| r.id == record.id) {
            Some(index) => Ok(owned.remove(index)),
            None => Err(GatewayError::not_found(record.id.as_str())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ManualAuth;
    use notesync_api::AuthSession;

    async fn signed_in(principal: &str) -> (Arc<ManualAuth>, MemoryGateway) {
        let auth = Arc::new(ManualAuth::new(8));
        auth.sign_in(AuthSession::new(principal, "t")).await;
        let gateway = MemoryGateway::new(auth.clone());
        (auth, gateway)
    }

    #[tokio::test]
    async fn test_records_are_scoped_to_principal() {
        let (auth, gateway) = signed_in("alice").await;
        gateway
            .seed("bob", vec![NoteRecord::new(RecordId::from("b1"), "Bob's")])
            .await;
        gateway
            .create(&NoteRecord::new(RecordId::from("a1"), "Alice's"))
            .await
            .unwrap();

        let listed = gateway.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, RecordId::from("a1"));

        auth.sign_in(AuthSession::new("bob", "t")).await;
        assert_eq!(gateway.list().await.unwrap()[0].id, RecordId::from("b1"));
    }

    #[tokio::test]
    async fn test_first_create_wins() {
        let (_auth, gateway) = signed_in("alice").await;
        gateway
            .create(&NoteRecord::new(RecordId::from("n"), "first"))
            .await
            .unwrap();
        let second = gateway
            .create(&NoteRecord::new(RecordId::from("n"), "second"))
            .await
            .unwrap();

        assert_eq!(second.name, "first");
        assert_eq!(gateway.records_for("alice").await.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let (_auth, gateway) = signed_in("alice").await;
        let err = gateway
            .delete(&NoteRecord::new(RecordId::from("ghost"), "x"))
            .await
            .unwrap_err();
        assert_eq!(err, GatewayError::not_found("ghost"));
    }

    #[tokio::test]
    async fn test_signed_out_is_unauthorized() {
        let auth = Arc::new(ManualAuth::new(8));
        let gateway = MemoryGateway::new(auth);
        assert!(matches!(
            gateway.list().await,
            Err(GatewayError::Unauthorized { .. })
        ));
        assert_eq!(gateway.calls().await, vec![GatewayCall::List]);
    }

    #[tokio::test]
    async fn test_injected_failure_applies_once() {
        let (_auth, gateway) = signed_in("alice").await;
        gateway.fail_next(GatewayError::network("offline")).await;

        assert_eq!(
            gateway.list().await.unwrap_err(),
            GatewayError::network("offline")
        );
        assert!(gateway.list().await.is_ok());
    }

    #[tokio::test]
    async fn test_held_list_completes_after_release() {
        let (_auth, gateway) = signed_in("alice").await;
        let gateway = Arc::new(gateway);
        gateway.hold_lists();

        let pending = tokio::spawn({
            let gateway = gateway.clone();
            async move { gateway.list().await }
        });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!pending.is_finished());

        gateway.release_lists();
        assert!(pending.await.unwrap().is_ok());
    }
}
