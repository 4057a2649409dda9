//! State of one whiteboard room.

use crate::history::OperationLog;
use crate::presence::PresenceTracker;

/// Everything the server knows about a room: who is in it and what has
/// been drawn. Lives for as long as the process; nothing is persisted.
#[derive(Debug, Clone, Default)]
pub struct RoomState {
    name: String,
    /// Connected users and their cursors.
    pub presence: PresenceTracker,
    /// Committed strokes and the redo stack.
    pub log: OperationLog,
}

impl RoomState {
    /// Create an empty room.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            presence: PresenceTracker::new(),
            log: OperationLog::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
