//! Domain model adapter between persisted records and UI items.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use notesync_api::{NoteItem, NoteRecord, RecordId};

/// Source of fresh record identifiers.
///
/// Every call must return an id never returned before.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> RecordId;
}

/// Random UUID v4 identifiers.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIds;

impl IdGenerator for UuidIds {
    fn next_id(&self) -> RecordId {
        RecordId::generate()
    }
}

/// Predictable `prefix-N` identifiers, for tests and demos.
#[derive(Debug)]
pub struct SequentialIds {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> RecordId {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        RecordId::new(format!("{}-{}", self.prefix, n))
    }
}

/// Converts between `NoteRecord` and `NoteItem`.
///
/// Conversions are pure apart from the record cached on the item, which
/// makes `to_record` idempotent per item.
#[derive(Clone)]
pub struct ModelAdapter {
    ids: Arc<dyn IdGenerator>,
}

impl ModelAdapter {
    pub fn new(ids: Arc<dyn IdGenerator>) -> Self {
        Self { ids }
    }

    /// Returns the item's cached record, materializing it with a fresh id
    /// on first call.
    pub fn to_record(&self, item: &NoteItem) -> NoteRecord {
        item.record_or_init(|item| NoteRecord {
            id: self.ids.next_id(),
            name: item.name().to_string(),
            description: item.description().map(str::to_string),
            attachment_ref: item.attachment_ref().map(str::to_string),
        })
        .clone()
    }

    /// Builds an item from a record, caching the record on it.
    pub fn from_record(&self, record: NoteRecord) -> NoteItem {
        let mut item = NoteItem::new(record.name.clone());
        if let Some(description) = &record.description {
            item = item.with_description(description.clone());
        }
        if let Some(attachment_ref) = &record.attachment_ref {
            item = item.with_attachment_ref(attachment_ref.clone());
        }
        item.record_or_init(move |_| record);
        item
    }
}

impl Default for ModelAdapter {
    fn default() -> Self {
        Self::new(Arc::new(UuidIds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sequential() -> ModelAdapter {
        ModelAdapter::new(Arc::new(SequentialIds::new("note")))
    }

    #[test]
    fn test_to_record_is_idempotent() {
        let adapter = sequential();
        let item = NoteItem::new("Groceries").with_description("milk, eggs");

        let first = adapter.to_record(&item);
        let second = adapter.to_record(&item);

        assert_eq!(first.id, RecordId::from("note-1"));
        assert_eq!(first, second);
        assert_eq!(item.id(), Some(&first.id));
    }

    #[test]
    fn test_distinct_items_get_distinct_ids() {
        let adapter = ModelAdapter::default();
        let a = adapter.to_record(&NoteItem::new("a"));
        let b = adapter.to_record(&NoteItem::new("a"));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_from_record_caches_source_record() {
        let adapter = sequential();
        let record = NoteRecord::new(RecordId::from("remote-7"), "Trip")
            .with_attachment_ref("remote-7.jpg");

        let item = adapter.from_record(record.clone());

        assert_eq!(item.cached_record(), Some(&record));
        // No id is drawn from the generator for an already persisted record
        assert_eq!(adapter.to_record(&item).id, RecordId::from("remote-7"));
        assert_eq!(adapter.to_record(&NoteItem::new("x")).id, RecordId::from("note-1"));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 100,
            ..ProptestConfig::default()
        })]

        #[test]
        fn test_record_round_trip(
            name in "[a-zA-Z0-9 ]{1,40}",
            description in proptest::option::of("[a-zA-Z0-9 .,]{0,80}"),
            attachment_ref in proptest::option::of("[a-z0-9-]{1,36}\\.jpg"),
        ) {
            let adapter = ModelAdapter::default();
            let mut item = NoteItem::new(name.clone());
            if let Some(d) = &description {
                item = item.with_description(d.clone());
            }
            if let Some(a) = &attachment_ref {
                item = item.with_attachment_ref(a.clone());
            }

            let record = adapter.to_record(&item);
            let back = adapter.from_record(record.clone());

            prop_assert_eq!(back.id(), item.id());
            prop_assert_eq!(back.name(), name.as_str());
            prop_assert_eq!(back.description(), description.as_deref());
            prop_assert_eq!(back.attachment_ref(), attachment_ref.as_deref());
            prop_assert_eq!(adapter.to_record(&back), record);
        }
    }
}
