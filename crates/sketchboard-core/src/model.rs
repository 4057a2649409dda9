//! Value types shared by the server and its clients.
//!
//! Everything here is immutable once committed: an [`Operation`] is the unit
//! of the room history, a [`StrokeDraft`] is what a client submits while
//! drawing.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Identifier of a committed stroke, unique within its room.
pub type OperationId = String;

/// Identifier of a user. Users are keyed by the connection they joined on.
pub type UserId = String;

/// Identifier the server assigns to every WebSocket connection.
pub type ConnectionId = String;

/// A canvas-space sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Drawing tool used for a stroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    #[default]
    Brush,
    Eraser,
}

/// A committed stroke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub id: OperationId,
    pub user_id: UserId,
    pub tool: Tool,
    pub color: String,
    pub width: f64,
    /// Ordered samples, never empty.
    pub points: Vec<Point>,
    /// Server receipt time in milliseconds since the Unix epoch.
    pub timestamp: u64,
}

/// Stroke content as submitted by a client on `startStroke` and
/// `finalizeStroke`.
///
/// The id and timestamp are optional; the server fills them in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrokeDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<OperationId>,
    pub tool: Tool,
    pub color: String,
    pub width: f64,
    pub points: Vec<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

impl StrokeDraft {
    /// The client-chosen id, if it sent a usable one.
    pub fn client_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    /// A draft can only be accepted with at least one finite point and a
    /// finite width.
    pub fn is_well_formed(&self) -> bool {
        !self.points.is_empty()
            && self.width.is_finite()
            && self.points.iter().all(Point::is_finite)
    }

    /// Stamp the draft into a full operation.
    pub fn into_operation(self, id: OperationId, user_id: UserId, timestamp: u64) -> Operation {
        Operation {
            id,
            user_id,
            tool: self.tool,
            color: self.color,
            width: self.width,
            points: self.points,
            timestamp,
        }
    }
}

/// Points appended to a live stroke (`strokePoint` payload).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrokePoints {
    pub id: OperationId,
    pub points: Vec<Point>,
}

/// A stroke that has started but is not in history yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionalStroke {
    pub id: OperationId,
    pub user_id: UserId,
    pub tool: Tool,
    pub color: String,
    pub width: f64,
    pub points: Vec<Point>,
    pub timestamp: u64,
    /// Always `true` on the wire; marks the payload as a live preview.
    pub provisional: bool,
}

/// Interim points relayed while a peer is drawing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterimPoints {
    pub id: OperationId,
    pub points: Vec<Point>,
    /// Always `true` on the wire.
    pub interim: bool,
}

impl InterimPoints {
    pub fn new(id: OperationId, points: Vec<Point>) -> Self {
        Self {
            id,
            points,
            interim: true,
        }
    }
}

/// Presence record of a connected user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub color: String,
}

/// Generate a fresh identifier (UUID v4, hyphenated).
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Wall-clock milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
