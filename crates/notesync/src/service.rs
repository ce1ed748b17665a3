//! Create/delete operations offered to the UI.
//!
//! Both operations mutate the local collection first and then issue the
//! remote write in the background. A failed remote write is logged and
//! reported through the returned `PendingWrite`; the optimistic local
//! change is not rolled back, so the collection may diverge from the
//! backend until the next full refresh.

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::context::SyncContext;
use notesync_api::{NoteItem, NoteRecord, Result, StoreEvent, SyncError};

/// A remote write already issued in the background.
///
/// Dropping it does not cancel the write.
pub struct PendingWrite<T> {
    handle: JoinHandle<std::result::Result<T, SyncError>>,
}

impl<T> PendingWrite<T> {
    /// Wait for the backend's answer.
    pub async fn wait(self) -> Result<T> {
        self.handle.await.map_err(|_| SyncError::Cancelled)?
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

#[derive(Clone)]
pub struct NoteService {
    ctx: SyncContext,
}

impl NoteService {
    pub fn new(ctx: SyncContext) -> Self {
        Self { ctx }
    }

    /// Current ordered notes.
    pub async fn notes(&self) -> Result<Vec<NoteItem>> {
        Ok(self.ctx.store.snapshot().await?)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.ctx.store.subscribe()
    }

    /// Add a note locally and push it to the backend.
    ///
    /// An empty name is rejected before anything is stored or sent. With
    /// `image`, the bytes are uploaded under a fresh attachment key before
    /// the record is created.
    pub async fn create_note(
        &self,
        name: impl Into<String>,
        description: Option<String>,
        image: Option<Vec<u8>>,
    ) -> Result<PendingWrite<NoteRecord>> {
        let mut item = NoteItem::new(name);
        if let Some(description) = description.filter(|d| !d.is_empty()) {
            item = item.with_description(description);
        }
        let upload = match (image, self.ctx.attachments.clone()) {
            (Some(bytes), Some(attachments)) => {
                let key = format!("{}.jpg", uuid::Uuid::new_v4());
                item = item.with_attachment_ref(key.clone()).with_image(bytes.clone());
                Some((attachments, key, bytes))
            }
            (Some(_), None) => {
                info!("[NoteService] No attachment store configured, dropping image");
                None
            }
            (None, _) => None,
        };

        let record = self.ctx.adapter.to_record(&item);
        record.validate()?;

        self.ctx.store.append(item).await?;
        info!("[NoteService] Created note {} locally", record.id);

        let gateway = self.ctx.gateway.clone();
        let handle = tokio::spawn(async move {
            if let Some((attachments, key, bytes)) = upload {
                attachments.put(&key, bytes).await.map_err(|e| {
                    error!("[NoteService] Upload of {} failed: {}", key, e);
                    SyncError::from(e)
                })?;
            }
            gateway.create(&record).await.map_err(|e| {
                error!("[NoteService] Remote create of {} failed: {}", record.id, e);
                SyncError::from(e)
            })
        });

        Ok(PendingWrite { handle })
    }

    /// Remove the note at `position` locally and delete it remotely.
    ///
    /// An invalid position is reported and nothing is sent.
    pub async fn delete_at(&self, position: usize) -> Result<PendingWrite<NoteRecord>> {
        let item = self.ctx.store.remove_at(position).await?;
        let record = self.ctx.adapter.to_record(&item);
        info!(
            "[NoteService] Removed note {} from position {}",
            record.id, position
        );

        let gateway = self.ctx.gateway.clone();
        let handle = tokio::spawn(async move {
            gateway.delete(&record).await.map_err(|e| {
                error!("[NoteService] Remote delete of {} failed: {}", record.id, e);
                SyncError::from(e)
            })
        });

        Ok(PendingWrite { handle })
    }
}
