//! Client-side view of a room, rebuilt from server events.
//!
//! The replica keeps the ordered list of committed operations a renderer
//! paints, the live previews of strokes peers are still drawing, and the
//! presence list with remote cursors.

use std::collections::HashMap;

use crate::model::{ConnectionId, Operation, OperationId, Point, Tool, User, UserId};
use crate::presence::CursorUpdate;
use crate::protocol::{ServerMessage, StrokePayload};

/// A stroke a peer is still drawing.
#[derive(Debug, Clone, PartialEq)]
pub struct Preview {
    pub user_id: UserId,
    pub tool: Tool,
    pub color: String,
    pub width: f64,
    pub points: Vec<Point>,
}

/// What changed after applying a server message.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplicaEvent {
    /// Snapshot received; the view was rebuilt from scratch
    HistoryReplaced { count: usize },
    PreviewStarted { id: OperationId },
    PreviewExtended { id: OperationId, added: usize },
    Committed { id: OperationId },
    Undone { id: OperationId },
    Redone { id: OperationId },
    Cleared,
    UsersChanged { count: usize },
    CursorMoved { user_id: UserId },
    UserLeft { user_id: UserId },
}

/// Local mirror of a room's history and presence.
#[derive(Debug, Clone, Default)]
pub struct CanvasReplica {
    /// Our own connection id, used to ignore echoes of our cursor.
    local_id: Option<ConnectionId>,
    operations: Vec<Operation>,
    previews: HashMap<OperationId, Preview>,
    users: Vec<User>,
    cursors: HashMap<UserId, CursorUpdate>,
}

impl CanvasReplica {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a replica that knows its own connection id.
    pub fn with_local_id(local_id: impl Into<ConnectionId>) -> Self {
        Self {
            local_id: Some(local_id.into()),
            ..Self::default()
        }
    }

    /// Committed operations in render order.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn preview(&self, id: &str) -> Option<&Preview> {
        self.previews.get(id)
    }

    pub fn preview_count(&self) -> usize {
        self.previews.len()
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn cursor(&self, user_id: &str) -> Option<&CursorUpdate> {
        self.cursors.get(user_id)
    }

    /// Parse a text frame and apply it.
    ///
    /// Frames that do not parse are ignored.
    pub fn handle_message(&mut self, json: &str) -> Option<ReplicaEvent> {
        match ServerMessage::decode(json) {
            Ok(msg) => self.apply(msg),
            Err(e) => {
                log::warn!("Ignoring unparseable server message: {}", e);
                None
            }
        }
    }

    /// Apply one server message. Returns `None` when nothing changed.
    pub fn apply(&mut self, msg: ServerMessage) -> Option<ReplicaEvent> {
        match msg {
            ServerMessage::InitHistory(ops) => {
                self.previews.retain(|id, _| !ops.iter().any(|op| &op.id == id));
                self.operations = ops;
                Some(ReplicaEvent::HistoryReplaced {
                    count: self.operations.len(),
                })
            }
            ServerMessage::StrokeBroadcast(payload) => self.apply_stroke(payload),
            ServerMessage::UndoBroadcast(id) => {
                let index = self.operations.iter().position(|op| op.id == id)?;
                self.operations.remove(index);
                Some(ReplicaEvent::Undone { id })
            }
            ServerMessage::RedoBroadcast(op) => {
                if self.position(&op.id).is_some() {
                    return None;
                }
                let id = op.id.clone();
                self.operations.push(op);
                Some(ReplicaEvent::Redone { id })
            }
            ServerMessage::ClearBroadcast => {
                self.operations.clear();
                self.previews.clear();
                Some(ReplicaEvent::Cleared)
            }
            ServerMessage::Users(users) => {
                self.users = users;
                Some(ReplicaEvent::UsersChanged {
                    count: self.users.len(),
                })
            }
            ServerMessage::Cursor(update) => {
                if self.local_id.as_deref() == Some(update.user_id.as_str()) {
                    return None;
                }
                let user_id = update.user_id.clone();
                self.cursors.insert(user_id.clone(), update);
                Some(ReplicaEvent::CursorMoved { user_id })
            }
            ServerMessage::UserLeft(user_id) => {
                self.cursors.remove(&user_id);
                self.previews.retain(|_, preview| preview.user_id != user_id);
                Some(ReplicaEvent::UserLeft { user_id })
            }
        }
    }

    fn apply_stroke(&mut self, payload: StrokePayload) -> Option<ReplicaEvent> {
        match payload {
            StrokePayload::Provisional(stroke) => {
                if self.position(&stroke.id).is_some() {
                    return None;
                }
                let id = stroke.id.clone();
                self.previews.insert(
                    stroke.id,
                    Preview {
                        user_id: stroke.user_id,
                        tool: stroke.tool,
                        color: stroke.color,
                        width: stroke.width,
                        points: stroke.points,
                    },
                );
                Some(ReplicaEvent::PreviewStarted { id })
            }
            StrokePayload::Interim(batch) => {
                let preview = self.previews.get_mut(&batch.id)?;
                let added = batch.points.len();
                preview.points.extend(batch.points);
                Some(ReplicaEvent::PreviewExtended { id: batch.id, added })
            }
            StrokePayload::Committed(op) => {
                self.previews.remove(&op.id);
                let id = op.id.clone();
                match self.position(&op.id) {
                    Some(index) => self.operations[index] = op,
                    None => self.operations.push(op),
                }
                Some(ReplicaEvent::Committed { id })
            }
        }
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.operations.iter().position(|op| op.id == id)
    }
}
