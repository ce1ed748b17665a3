//! Persisted and application-facing note shapes.
//!
//! `NoteRecord` is the wire/persistence shape produced by the backend's
//! schema code generator. `NoteItem` is what the UI holds: the same
//! persisted fields plus presentation-only state, and a lazily cached
//! `NoteRecord` so repeated remote writes reuse one id.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

use crate::ValidationError;

/// Opaque, globally unique record identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random identifier (UUID v4).
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One persisted note, replaced wholesale rather than mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteRecord {
    pub id: RecordId,
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "image")]
    pub attachment_ref: Option<String>,
}

impl NoteRecord {
    pub fn new(id: RecordId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            attachment_ref: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_attachment_ref(mut self, attachment_ref: impl Into<String>) -> Self {
        self.attachment_ref = Some(attachment_ref.into());
        self
    }

    /// Checks the fields the backend requires before a record is submitted.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "name" });
        }
        Ok(())
    }
}

/// Application-facing note.
///
/// The persisted fields are fixed at construction. `image` holds resolved
/// attachment bytes for display and is never sent to the backend.
#[derive(Clone, Default)]
pub struct NoteItem {
    name: String,
    description: Option<String>,
    attachment_ref: Option<String>,
    pub image: Option<Vec<u8>>,
    record: OnceLock<NoteRecord>,
}

impl NoteItem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_attachment_ref(mut self, attachment_ref: impl Into<String>) -> Self {
        self.attachment_ref = Some(attachment_ref.into());
        self
    }

    pub fn with_image(mut self, image: Vec<u8>) -> Self {
        self.image = Some(image);
        self
    }

    /// Id of the cached record; `None` until the record is materialized.
    pub fn id(&self) -> Option<&RecordId> {
        self.record.get().map(|record| &record.id)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn attachment_ref(&self) -> Option<&str> {
        self.attachment_ref.as_deref()
    }

    pub fn cached_record(&self) -> Option<&NoteRecord> {
        self.record.get()
    }

    /// Returns the cached record, building and caching it with `init` on
    /// first access. Later calls never invoke `init` again.
    pub fn record_or_init(&self, init: impl FnOnce(&Self) -> NoteRecord) -> &NoteRecord {
        self.record.get_or_init(|| init(self))
    }
}

impl fmt::Debug for NoteItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NoteItem")
            .field("id", &self.id())
            .field("name", &self.name)
            .field("description", &self.description)
            .field("attachment_ref", &self.attachment_ref)
            .field("image_len", &self.image.as_ref().map(Vec::len))
            .finish()
    }
}

impl PartialEq for NoteItem {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
            && self.name == other.name
            && self.description == other.description
            && self.attachment_ref == other.attachment_ref
            && self.image == other.image
    }
}
