//! Remote CRUD gateway: the only path from the engine to the backend.

use async_trait::async_trait;

use notesync_api::{GatewayError, NoteRecord, RecordId};

pub mod http;
pub mod memory;

pub use http::HttpGateway;
pub use memory::MemoryGateway;

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Asynchronous list/create/delete against the principal's records.
///
/// No ordering holds between concurrent calls; callers that need a
/// `create` to land before a `delete` must await it first.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// All records owned by the current principal, in no particular order.
    async fn list(&self) -> GatewayResult<Vec<NoteRecord>>;

    /// Persist a new record under the caller-supplied id.
    async fn create(&self, record: &NoteRecord) -> GatewayResult<NoteRecord>;

    /// Delete by `record.id`. A missing id is reported as `NotFound`.
    async fn delete(&self, record: &NoteRecord) -> GatewayResult<NoteRecord>;
}

/// A call observed by a gateway, in issue order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    List,
    Create(NoteRecord),
    Delete(RecordId),
}
