//! Connection lifecycle: one [`Session`] per WebSocket.
//!
//! A session binds a connection id to a room, owns the connection's stroke
//! assembler, and dispatches every inbound [`ClientMessage`] to a typed
//! handler. Every history or presence mutation runs under the room lock
//! together with its ordered broadcast.

use std::sync::Arc;

use sketchboard_core::{
    ClientMessage, ConnectionId, JoinRequest, Point, ServerMessage, StrokeAssembler, StrokeDraft,
    StrokePayload, StrokePoints, new_id, now_millis,
};
use tracing::{debug, info, trace};

use crate::registry::{Room, RoomRegistry};
use crate::router::Outbox;

/// Opens and closes sessions against a shared registry.
pub struct SessionManager {
    registry: Arc<RoomRegistry>,
    default_room: String,
}

impl SessionManager {
    pub fn new(registry: Arc<RoomRegistry>, default_room: impl Into<String>) -> Self {
        Self {
            registry,
            default_room: default_room.into(),
        }
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    pub fn default_room(&self) -> &str {
        &self.default_room
    }

    /// Attach a new connection to `room` (or the default room).
    ///
    /// The connection becomes a member and its first event is the history
    /// snapshot; both happen under the room lock, so no committed event is
    /// missed or seen twice.
    pub async fn open(&self, room: Option<&str>) -> (Session, Outbox) {
        let name = room
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.default_room);
        let room = self.registry.get_or_create(name);
        let id = new_id();

        let outbox = {
            let guard = room.lock().await;
            let outbox = guard.subscribe(&id);
            guard.send_to(&id, ServerMessage::InitHistory(guard.state().log.snapshot()));
            outbox
        };
        info!("Connection {} entered room {}", id, room.name());

        let session = Session {
            strokes: StrokeAssembler::new(id.clone()),
            id,
            room,
        };
        (session, outbox)
    }
}

/// Server side of one connection.
pub struct Session {
    id: ConnectionId,
    room: Arc<Room>,
    strokes: StrokeAssembler,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn room(&self) -> &Arc<Room> {
        &self.room
    }

    /// Decode and handle a text frame. Malformed frames are dropped.
    pub async fn handle_text(&mut self, text: &str) {
        match ClientMessage::decode(text) {
            Ok(msg) => self.handle(msg).await,
            Err(e) => debug!("Dropping message from {}: {}", self.id, e),
        }
    }

    /// Dispatch one message to its handler.
    pub async fn handle(&mut self, msg: ClientMessage) {
        let received_at = now_millis();
        trace!("{} -> {}", self.id, msg.event_name());

        match msg {
            ClientMessage::Join(request) => self.join(request).await,
            ClientMessage::StartStroke(draft) => self.start_stroke(draft, received_at).await,
            ClientMessage::StrokePoint(batch) => self.stroke_point(batch),
            ClientMessage::EndStroke(stroke) => self.end_stroke(&stroke.id),
            ClientMessage::FinalizeStroke(draft) => self.finalize_stroke(draft, received_at).await,
            ClientMessage::Undo => self.undo().await,
            ClientMessage::Redo => self.redo().await,
            ClientMessage::Clear => self.clear().await,
            ClientMessage::Cursor(position) => self.cursor(position).await,
            ClientMessage::RequestHistory => self.send_history().await,
        }
    }

    async fn join(&mut self, request: JoinRequest) {
        let mut guard = self.room.lock().await;
        let user = guard
            .state_mut()
            .presence
            .join(&self.id, request.name, request.color)
            .clone();
        guard.publish(ServerMessage::Users(guard.state().presence.users().to_vec()));
        info!("{} joined room {} as {}", self.id, self.room.name(), user.name);
    }

    async fn start_stroke(&mut self, draft: StrokeDraft, received_at: u64) {
        if let Some(id) = draft.client_id() {
            if self.room.lock().await.state().log.contains(id) {
                debug!("{} restarted logged stroke {}", self.id, id);
                return;
            }
        }
        if let Some(stroke) = self.strokes.start(draft, received_at) {
            self.room.relay(
                &self.id,
                ServerMessage::StrokeBroadcast(StrokePayload::Provisional(stroke)),
            );
        }
    }

    fn stroke_point(&mut self, batch: StrokePoints) {
        if let Some(interim) = self.strokes.append(batch) {
            self.room.relay(
                &self.id,
                ServerMessage::StrokeBroadcast(StrokePayload::Interim(interim)),
            );
        }
    }

    fn end_stroke(&mut self, id: &str) {
        // Informational only: the commit comes with finalizeStroke.
        if !self.strokes.end(id) {
            debug!("{} ended unknown stroke {}", self.id, id);
        }
    }

    async fn finalize_stroke(&mut self, draft: StrokeDraft, received_at: u64) {
        let mut guard = self.room.lock().await;
        let Some(op) = self.strokes.finalize(draft, received_at, &guard.state().log) else {
            return;
        };
        guard.state_mut().log.push(op.clone());
        debug!("{} committed stroke {} in {}", self.id, op.id, self.room.name());
        guard.publish(ServerMessage::StrokeBroadcast(StrokePayload::Committed(op)));
    }

    async fn undo(&mut self) {
        let mut guard = self.room.lock().await;
        if let Some(id) = guard.state_mut().log.undo() {
            guard.publish(ServerMessage::UndoBroadcast(id));
        }
    }

    async fn redo(&mut self) {
        let mut guard = self.room.lock().await;
        if let Some(op) = guard.state_mut().log.redo() {
            guard.publish(ServerMessage::RedoBroadcast(op));
        }
    }

    async fn clear(&mut self) {
        let mut guard = self.room.lock().await;
        guard.state_mut().log.clear();
        guard.publish(ServerMessage::ClearBroadcast);
        info!("{} cleared room {}", self.id, self.room.name());
    }

    async fn cursor(&mut self, position: Point) {
        let update = {
            let mut guard = self.room.lock().await;
            guard.state_mut().presence.cursor(&self.id, position)
        };
        self.room.publish_live(&self.id, ServerMessage::Cursor(update));
    }

    async fn send_history(&mut self) {
        let guard = self.room.lock().await;
        guard.send_to(&self.id, ServerMessage::InitHistory(guard.state().log.snapshot()));
    }

    /// Detach the connection: drop presence and membership, tell the peers,
    /// and abandon any stroke that was never finalized.
    pub async fn close(mut self) {
        {
            let mut guard = self.room.lock().await;
            guard.unsubscribe(&self.id);
            guard.state_mut().presence.leave(&self.id);
            guard.publish(ServerMessage::UserLeft(self.id.clone()));
            guard.publish(ServerMessage::Users(guard.state().presence.users().to_vec()));
        }

        let abandoned = self.strokes.abandon_all();
        if abandoned > 0 {
            debug!("{} abandoned {} unfinished strokes", self.id, abandoned);
        }
        info!("Connection {} left room {}", self.id, self.room.name());
    }
}
