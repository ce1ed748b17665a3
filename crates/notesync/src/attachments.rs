//! Storage for note images referenced by `attachment_ref`.

use async_trait::async_trait;
use reqwest::StatusCode;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error};

use crate::auth::{require_session, AuthProvider};
use crate::config::SyncConfig;
use crate::gateway::http::{build_client, classify_status, classify_transport_error};
use crate::gateway::GatewayResult;
use notesync_api::GatewayError;

#[async_trait]
pub trait AttachmentStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> GatewayResult<()>;

    async fn get(&self, key: &str) -> GatewayResult<Vec<u8>>;
}

/// Attachment bucket held in memory.
#[derive(Default)]
pub struct MemoryAttachmentStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
    failures: Mutex<VecDeque<GatewayError>>,
}

impl MemoryAttachmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Fail the next `put` or `get` with `error`.
    pub async fn fail_next(&self, error: GatewayError) {
        self.failures.lock().await.push_back(error);
    }

    async fn take_failure(&self) -> GatewayResult<()> {
        match self.failures.lock().await.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl AttachmentStore for MemoryAttachmentStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> GatewayResult<()> {
        self.take_failure().await?;
        self.objects.write().await.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, key: &str) -> GatewayResult<Vec<u8>> {
        self.take_failure().await?;
        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| GatewayError::not_found(key))
    }
}

/// Attachment bucket behind plain `GET`/`PUT {base_url}/{key}`.
pub struct HttpAttachmentStore {
    base_url: String,
    client: reqwest::Client,
    auth: Arc<dyn AuthProvider>,
}

impl HttpAttachmentStore {
    pub fn new(config: &SyncConfig, auth: Arc<dyn AuthProvider>) -> anyhow::Result<Self> {
        let base_url = config
            .attachments_url
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("No attachments_url configured"))?
            .trim_end_matches('/')
            .to_string();
        Ok(Self {
            base_url,
            client: build_client(config)?,
            auth,
        })
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }
}

#[async_trait]
impl AttachmentStore for HttpAttachmentStore {
    #[tracing::instrument(
        name = "attachments.http.put",
        skip(self, bytes),
        fields(len = bytes.len())
    )]
    async fn put(&self, key: &str, bytes: Vec<u8>) -> GatewayResult<()> {
        let session = require_session(self.auth.as_ref()).await?;
        let url = self.object_url(key);

        let response = self
            .client
            .put(&url)
            .bearer_auth(&session.token)
            .body(bytes)
            .send()
            .await
            .map_err(|e| classify_transport_error(&e, &url, "upload attachment"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = classify_status(status, &url, &body);
            error!("[HttpAttachmentStore] Upload of {} failed: {}", key, err);
            return Err(err);
        }
        debug!("[HttpAttachmentStore] Uploaded {}", key);
        Ok(())
    }

    #[tracing::instrument(name = "attachments.http.get", skip(self))]
    async fn get(&self, key: &str) -> GatewayResult<Vec<u8>> {
        let session = require_session(self.auth.as_ref()).await?;
        let url = self.object_url(key);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&session.token)
            .send()
            .await
            .map_err(|e| classify_transport_error(&e, &url, "download attachment"))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(GatewayError::not_found(key));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &url, &body));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| GatewayError::network(format!("Failed to read {}: {}", url, e)))?;
        Ok(bytes.to_vec())
    }
}
