//! Wire protocol between whiteboard clients and the relay server.
//!
//! Every frame is a JSON text message with an event name and an optional
//! payload:
//!
//! ```json
//! { "event": "join", "data": { "name": "Ann", "color": "#e33" } }
//! { "event": "strokePoint", "data": { "id": "c_1x2", "points": [{ "x": 4, "y": 2 }] } }
//! { "event": "undo" }
//! { "event": "undoBroadcast", "data": "c_1x2" }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{
    InterimPoints, Operation, OperationId, Point, ProvisionalStroke, StrokeDraft, StrokePoints,
    User, UserId,
};
use crate::presence::CursorUpdate;

/// Protocol errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Invalid {event} payload: {reason}")]
    InvalidPayload {
        event: &'static str,
        reason: &'static str,
    },
    #[error("Failed to encode message: {0}")]
    Encode(serde_json::Error),
}

/// `join` payload. Both fields may be omitted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JoinRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// `endStroke` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrokeRef {
    pub id: OperationId,
}

/// Messages sent to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Announce display identity
    Join(JoinRequest),
    /// Begin a stroke; relayed to peers as a live preview
    StartStroke(StrokeDraft),
    /// More samples for a live stroke
    StrokePoint(StrokePoints),
    /// Pointer released; informational only
    EndStroke(StrokeRef),
    /// Complete stroke content; the only message that writes history
    FinalizeStroke(StrokeDraft),
    Undo,
    Redo,
    Clear,
    /// Local cursor moved
    Cursor(Point),
    /// Ask for a fresh history snapshot
    RequestHistory,
}

impl ClientMessage {
    /// Parse and validate a text frame.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let msg: Self = serde_json::from_str(text)?;
        msg.validate()?;
        Ok(msg)
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    /// Event name as it appears on the wire.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Join(_) => "join",
            Self::StartStroke(_) => "startStroke",
            Self::StrokePoint(_) => "strokePoint",
            Self::EndStroke(_) => "endStroke",
            Self::FinalizeStroke(_) => "finalizeStroke",
            Self::Undo => "undo",
            Self::Redo => "redo",
            Self::Clear => "clear",
            Self::Cursor(_) => "cursor",
            Self::RequestHistory => "requestHistory",
        }
    }

    fn validate(&self) -> Result<(), ProtocolError> {
        let invalid = |reason| {
            Err(ProtocolError::InvalidPayload {
                event: self.event_name(),
                reason,
            })
        };
        match self {
            Self::StartStroke(draft) | Self::FinalizeStroke(draft) if !draft.is_well_formed() => {
                invalid("stroke needs a finite width and at least one finite point")
            }
            Self::StrokePoint(batch) if batch.id.is_empty() => invalid("missing stroke id"),
            Self::StrokePoint(batch) if batch.points.is_empty() => invalid("no points"),
            Self::EndStroke(stroke) if stroke.id.is_empty() => invalid("missing stroke id"),
            Self::Cursor(p) if !(p.x.is_finite() && p.y.is_finite()) => {
                invalid("non-finite cursor position")
            }
            _ => Ok(()),
        }
    }
}

/// Content of a `strokeBroadcast`.
///
/// The three shapes are told apart by their marker fields, so the variant
/// order matters for deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StrokePayload {
    /// A stroke that just started on a peer
    Provisional(ProvisionalStroke),
    /// Samples appended to a live stroke
    Interim(InterimPoints),
    /// Authoritative, committed stroke
    Committed(Operation),
}

impl StrokePayload {
    pub fn id(&self) -> &str {
        match self {
            Self::Provisional(stroke) => &stroke.id,
            Self::Interim(batch) => &batch.id,
            Self::Committed(op) => &op.id,
        }
    }
}

/// Messages broadcast to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Full history snapshot, oldest first
    InitHistory(Vec<Operation>),
    StrokeBroadcast(StrokePayload),
    /// Remove this operation from the local view
    UndoBroadcast(OperationId),
    /// Re-add this operation to the local view
    RedoBroadcast(Operation),
    /// Wipe the local view
    ClearBroadcast,
    /// Full presence list
    Users(Vec<User>),
    Cursor(CursorUpdate),
    UserLeft(UserId),
}

impl ServerMessage {
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Tool;

    #[test]
    fn test_decode_unit_events() {
        assert_eq!(
            ClientMessage::decode(r#"{"event":"undo"}"#).unwrap(),
            ClientMessage::Undo
        );
        assert_eq!(
            ClientMessage::decode(r#"{"event":"requestHistory"}"#).unwrap(),
            ClientMessage::RequestHistory
        );
    }

    #[test]
    fn test_decode_join_without_fields() {
        let msg = ClientMessage::decode(r#"{"event":"join","data":{}}"#).unwrap();
        assert_eq!(msg, ClientMessage::Join(JoinRequest::default()));
    }

    #[test]
    fn test_decode_finalize_without_id() {
        let text = r##"{"event":"finalizeStroke","data":{"tool":"brush","color":"#123","width":3,"points":[{"x":1,"y":2},{"x":3,"y":4}]}}"##;
        match ClientMessage::decode(text).unwrap() {
            ClientMessage::FinalizeStroke(draft) => {
                assert!(draft.id.is_none());
                assert_eq!(draft.points.len(), 2);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_cursor_ignores_extra_fields() {
        let text = r##"{"event":"cursor","data":{"x":5,"y":6,"name":"Ann","color":"#f00"}}"##;
        assert_eq!(
            ClientMessage::decode(text).unwrap(),
            ClientMessage::Cursor(Point::new(5.0, 6.0))
        );
    }

    #[test]
    fn test_malformed_frames_rejected() {
        assert!(matches!(
            ClientMessage::decode("not json"),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(ClientMessage::decode(r#"{"event":"teleport"}"#).is_err());
        assert!(ClientMessage::decode(r#"{"event":"strokePoint","data":{"points":[]}}"#).is_err());
    }

    #[test]
    fn test_empty_points_rejected() {
        let text = r##"{"event":"startStroke","data":{"tool":"brush","color":"#000","width":1,"points":[]}}"##;
        assert!(matches!(
            ClientMessage::decode(text),
            Err(ProtocolError::InvalidPayload { event: "startStroke", .. })
        ));

        let text = r#"{"event":"strokePoint","data":{"id":"s1","points":[]}}"#;
        assert!(matches!(
            ClientMessage::decode(text),
            Err(ProtocolError::InvalidPayload { event: "strokePoint", .. })
        ));
    }

    #[test]
    fn test_server_message_wire_shape() {
        let json = ServerMessage::UndoBroadcast("s1".into()).encode().unwrap();
        assert_eq!(json, r#"{"event":"undoBroadcast","data":"s1"}"#);

        let json = ServerMessage::ClearBroadcast.encode().unwrap();
        assert_eq!(json, r#"{"event":"clearBroadcast"}"#);
    }

    #[test]
    fn test_stroke_payload_shapes_are_distinguished() {
        let op = Operation {
            id: "s1".into(),
            user_id: "u1".into(),
            tool: Tool::Brush,
            color: "#000".into(),
            width: 2.0,
            points: vec![Point::new(0.0, 0.0)],
            timestamp: 10,
        };
        let provisional = ProvisionalStroke {
            id: "s2".into(),
            user_id: "u1".into(),
            tool: Tool::Eraser,
            color: "#000".into(),
            width: 8.0,
            points: vec![Point::new(1.0, 1.0)],
            timestamp: 11,
            provisional: true,
        };
        let interim = InterimPoints::new("s2".into(), vec![Point::new(2.0, 2.0)]);

        for payload in [
            StrokePayload::Committed(op),
            StrokePayload::Provisional(provisional),
            StrokePayload::Interim(interim),
        ] {
            let text = ServerMessage::StrokeBroadcast(payload.clone()).encode().unwrap();
            assert_eq!(
                ServerMessage::decode(&text).unwrap(),
                ServerMessage::StrokeBroadcast(payload)
            );
        }
    }

    #[test]
    fn test_interim_wire_marker() {
        let msg = ServerMessage::StrokeBroadcast(StrokePayload::Interim(InterimPoints::new(
            "s1".into(),
            vec![Point::new(1.0, 2.0)],
        )));
        let value: serde_json::Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();
        assert_eq!(value["event"], "strokeBroadcast");
        assert_eq!(value["data"]["interim"], true);
        assert_eq!(value["data"]["id"], "s1");
    }
}
