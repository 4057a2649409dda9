//! Sketchboard Core Library
//!
//! Runtime-agnostic synchronization model for the Sketchboard whiteboard:
//! the room operation log with its shared undo stack, the stroke commit
//! state machine, presence, and the JSON wire protocol.

pub mod history;
pub mod model;
pub mod presence;
pub mod protocol;
pub mod replica;
pub mod room;
pub mod stroke;

pub use history::OperationLog;
pub use model::{
    ConnectionId, InterimPoints, Operation, OperationId, Point, ProvisionalStroke, StrokeDraft,
    StrokePoints, Tool, User, UserId, new_id, now_millis,
};
pub use presence::{CursorUpdate, PresenceTracker};
pub use protocol::{ClientMessage, JoinRequest, ProtocolError, ServerMessage, StrokePayload, StrokeRef};
pub use replica::{CanvasReplica, Preview, ReplicaEvent};
pub use room::RoomState;
pub use stroke::{StrokeAssembler, StrokeState};
