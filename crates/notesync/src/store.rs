//! Local collection store: the ordered notes the UI renders.
//!
//! `CollectionStore` is the plain collection. `StoreHandle` owns one inside
//! a dedicated task and is the only way to reach it, so every mutation,
//! whichever background completion triggered it, is applied on a single
//! logical writer.

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, warn};

use notesync_api::{NoteItem, StoreError, StoreEvent};

pub struct CollectionStore {
    items: Vec<NoteItem>,
    version: u64,
    event_tx: broadcast::Sender<StoreEvent>,
}

impl CollectionStore {
    pub fn new(buffer: usize) -> Self {
        Self {
            items: Vec::new(),
            version: 0,
            event_tx: broadcast::channel(buffer.max(1)).0,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.event_tx.subscribe()
    }

    pub fn items(&self) -> &[NoteItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Replace the whole collection in one step.
    pub fn replace_all(&mut self, items: Vec<NoteItem>) {
        debug!("[CollectionStore] replace_all: {} items", items.len());
        self.items = items;
        let version = self.bump();
        self.emit(StoreEvent::Replaced {
            items: self.items.clone(),
            version,
        });
    }

    /// Add `item` at the end; returns its position.
    pub fn append(&mut self, item: NoteItem) -> usize {
        self.items.push(item.clone());
        let position = self.items.len() - 1;
        debug!("[CollectionStore] append at {}", position);
        let version = self.bump();
        self.emit(StoreEvent::Appended {
            item,
            position,
            version,
        });
        position
    }

    /// Remove and return the item at `position`.
    ///
    /// An out-of-range position leaves the collection untouched.
    pub fn remove_at(&mut self, position: usize) -> Result<NoteItem, StoreError> {
        if position >= self.items.len() {
            let err = StoreError::InvalidPosition {
                position,
                len: self.items.len(),
            };
            warn!("[CollectionStore] remove_at rejected: {}", err);
            return Err(err);
        }
        let item = self.items.remove(position);
        debug!("[CollectionStore] removed position {}", position);
        let version = self.bump();
        self.emit(StoreEvent::Removed {
            item: item.clone(),
            position,
            version,
        });
        Ok(item)
    }

    fn bump(&mut self) -> u64 {
        self.version += 1;
        self.version
    }

    fn emit(&self, event: StoreEvent) {
        // Ignore errors if no receivers (fire-and-forget)
        let _ = self.event_tx.send(event);
    }
}

enum StoreCommand {
    ReplaceAll {
        items: Vec<NoteItem>,
        reply: oneshot::Sender<()>,
    },
    Append {
        item: NoteItem,
        reply: oneshot::Sender<usize>,
    },
    RemoveAt {
        position: usize,
        reply: oneshot::Sender<Result<NoteItem, StoreError>>,
    },
    Snapshot {
        reply: oneshot::Sender<Vec<NoteItem>>,
    },
}

/// Cloneable handle to a `CollectionStore` running on its own task.
///
/// The task exits once every handle is dropped.
#[derive(Clone)]
pub struct StoreHandle {
    command_tx: mpsc::UnboundedSender<StoreCommand>,
    event_tx: broadcast::Sender<StoreEvent>,
}

impl StoreHandle {
    /// Move `store` onto a new writer task. Requires a tokio runtime.
    pub fn spawn(store: CollectionStore) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let event_tx = store.event_tx.clone();
        tokio::spawn(run_writer(store, command_rx));
        Self {
            command_tx,
            event_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.event_tx.subscribe()
    }

    pub async fn replace_all(&self, items: Vec<NoteItem>) -> Result<(), StoreError> {
        self.request(|reply| StoreCommand::ReplaceAll { items, reply })
            .await
    }

    pub async fn append(&self, item: NoteItem) -> Result<usize, StoreError> {
        self.request(|reply| StoreCommand::Append { item, reply })
            .await
    }

    pub async fn remove_at(&self, position: usize) -> Result<NoteItem, StoreError> {
        self.request(|reply| StoreCommand::RemoveAt { position, reply })
            .await?
    }

    /// Current ordered contents.
    pub async fn snapshot(&self) -> Result<Vec<NoteItem>, StoreError> {
        self.request(|reply| StoreCommand::Snapshot { reply }).await
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> StoreCommand,
    ) -> Result<T, StoreError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(build(reply_tx))
            .map_err(|_| StoreError::Closed)?;
        reply_rx.await.map_err(|_| StoreError::Closed)
    }
}

async fn run_writer(
    mut store: CollectionStore,
    mut command_rx: mpsc::UnboundedReceiver<StoreCommand>,
) {
    while let Some(command) = command_rx.recv().await {
        // A dropped reply receiver just means the caller stopped waiting
        match command {
            StoreCommand::ReplaceAll { items, reply } => {
                store.replace_all(items);
                let _ = reply.send(());
            }
            StoreCommand::Append { item, reply } => {
                let _ = reply.send(store.append(item));
            }
            StoreCommand::RemoveAt { position, reply } => {
                let _ = reply.send(store.remove_at(position));
            }
            StoreCommand::Snapshot { reply } => {
                let _ = reply.send(store.items().to_vec());
            }
        }
    }
    debug!("[CollectionStore] writer task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn named(names: &[&str]) -> Vec<NoteItem> {
        names.iter().map(|n| NoteItem::new(*n)).collect()
    }

    fn names(items: &[NoteItem]) -> Vec<String> {
        items.iter().map(|i| i.name().to_string()).collect()
    }

    #[test]
    fn test_replace_all_keeps_order() {
        let mut store = CollectionStore::new(16);
        store.append(NoteItem::new("old"));
        store.replace_all(named(&["a", "b", "c"]));
        assert_eq!(names(store.items()), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_every_mutation_notifies() {
        let mut store = CollectionStore::new(16);
        let mut rx = store.subscribe();

        store.replace_all(named(&["a"]));
        store.append(NoteItem::new("b"));
        store.remove_at(0).unwrap();

        match rx.try_recv().unwrap() {
            StoreEvent::Replaced { items, version } => {
                assert_eq!(names(&items), vec!["a"]);
                assert_eq!(version, 1);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(matches!(
            rx.try_recv().unwrap(),
            StoreEvent::Appended { position: 1, version: 2, .. }
        ));
        match rx.try_recv().unwrap() {
            StoreEvent::Removed { item, position, version } => {
                assert_eq!(item.name(), "a");
                assert_eq!(position, 0);
                assert_eq!(version, 3);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_invalid_remove_does_not_notify() {
        let mut store = CollectionStore::new(16);
        store.append(NoteItem::new("a"));
        let mut rx = store.subscribe();

        assert_eq!(
            store.remove_at(1),
            Err(StoreError::InvalidPosition { position: 1, len: 1 })
        );
        assert!(rx.try_recv().is_err());
        assert_eq!(store.version(), 1);
    }

    #[tokio::test]
    async fn test_handle_serializes_concurrent_appends() {
        let handle = StoreHandle::spawn(CollectionStore::new(64));

        let tasks: Vec<_> = (0..20)
            .map(|i| {
                let handle = handle.clone();
                tokio::spawn(async move { handle.append(NoteItem::new(format!("n{}", i))).await })
            })
            .collect();

        let mut positions = Vec::new();
        for task in tasks {
            positions.push(task.await.unwrap().unwrap());
        }
        positions.sort_unstable();

        assert_eq!(positions, (0..20).collect::<Vec<_>>());
        assert_eq!(handle.snapshot().await.unwrap().len(), 20);
    }

    #[tokio::test]
    async fn test_handle_reports_invalid_position() {
        let handle = StoreHandle::spawn(CollectionStore::new(8));
        handle.replace_all(named(&["a", "b"])).await.unwrap();

        assert_eq!(
            handle.remove_at(5).await,
            Err(StoreError::InvalidPosition { position: 5, len: 2 })
        );
        assert_eq!(names(&handle.snapshot().await.unwrap()), vec!["a", "b"]);
    }

    proptest! {
        #[test]
        fn test_remove_at_preserves_relative_order(
            len in 0usize..12,
            position in 0usize..16,
        ) {
            let original: Vec<String> = (0..len).map(|i| format!("n{}", i)).collect();
            let mut store = CollectionStore::new(4);
            store.replace_all(original.iter().map(NoteItem::new).collect());

            let result = store.remove_at(position);

            if position < len {
                let removed = result.unwrap();
                prop_assert_eq!(removed.name(), original[position].as_str());
                let mut expected = original.clone();
                expected.remove(position);
                prop_assert_eq!(names(store.items()), expected);
            } else {
                prop_assert_eq!(result, Err(StoreError::InvalidPosition { position, len }));
                prop_assert_eq!(names(store.items()), original);
            }
        }
    }
}
