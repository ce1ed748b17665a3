//! Notifications pushed to observers of the collection and controller.

use crate::{GatewayError, NoteItem, SessionState};

/// One completed mutation of the local collection.
///
/// `version` increases by one for every mutation, so an observer can
/// detect that it lagged behind and should re-read a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// Whole collection replaced (list refresh or sign-out clear)
    Replaced { items: Vec<NoteItem>, version: u64 },
    /// Item added at the end
    Appended {
        item: NoteItem,
        position: usize,
        version: u64,
    },
    /// Item removed from `position`
    Removed {
        item: NoteItem,
        position: usize,
        version: u64,
    },
}

impl StoreEvent {
    pub fn version(&self) -> u64 {
        match self {
            StoreEvent::Replaced { version, .. }
            | StoreEvent::Appended { version, .. }
            | StoreEvent::Removed { version, .. } => *version,
        }
    }
}

/// Outcome reported by the session controller.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    /// The controller entered a new state
    Transitioned(SessionState),
    /// A list refresh populated the collection with this many items
    Refreshed { count: usize },
    /// A list refresh failed; the collection was left empty
    RefreshFailed(GatewayError),
    /// A list result arrived after the session that requested it ended
    StaleRefreshDropped,
}
