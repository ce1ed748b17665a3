//! Client-side sync engine for a hosted notes backend
//!
//! This crate keeps a locally held, ordered list of notes consistent with a
//! remote create/read/delete API for a single signed-in principal:
//!
//! - `adapter` - conversion between `NoteRecord` and `NoteItem`, with id generation
//! - `gateway` - `RemoteGateway` trait, `HttpGateway` (GraphQL) and `MemoryGateway`
//! - `attachments` - storage of note images referenced by `attachment_ref`
//! - `auth` - the narrow auth surface the engine consumes, plus `ManualAuth`
//! - `store` - `CollectionStore` and its single-writer `StoreHandle`
//! - `controller` - `SessionController`, refreshing the store on sign-in/sign-out
//! - `service` - `NoteService`, the create/delete facade offered to the UI
//! - `config` - `SyncConfig` loaded from YAML and environment

pub mod adapter;
pub mod attachments;
pub mod auth;
pub mod config;
pub mod context;
pub mod controller;
pub mod gateway;
pub mod service;
pub mod store;

pub use adapter::{IdGenerator, ModelAdapter, SequentialIds, UuidIds};
pub use attachments::{AttachmentStore, HttpAttachmentStore, MemoryAttachmentStore};
pub use auth::{AuthProvider, ManualAuth};
pub use config::SyncConfig;
pub use context::SyncContext;
pub use controller::SessionController;
pub use gateway::{GatewayCall, GatewayResult, HttpGateway, MemoryGateway, RemoteGateway};
pub use service::{NoteService, PendingWrite};
pub use store::{CollectionStore, StoreHandle};

pub use notesync_api::*;
