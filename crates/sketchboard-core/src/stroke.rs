//! Per-connection stroke lifecycle: Idle → Active → Committed.
//!
//! A stroke is streamed in three kinds of messages. `startStroke` and
//! `strokePoint` only feed live previews. `finalizeStroke` carries the full
//! content and is the single message that produces a committed
//! [`Operation`]. `endStroke` never touches history.

use std::collections::{HashMap, HashSet};

use crate::history::OperationLog;
use crate::model::{
    ConnectionId, InterimPoints, Operation, OperationId, Point, ProvisionalStroke, StrokeDraft,
    StrokePoints, Tool, new_id,
};

/// Lifecycle state of a stroke id, from the point of view of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrokeState {
    /// Never started (or abandoned).
    Idle,
    /// Started and streaming, not in history.
    Active,
    /// Written to the room history.
    Committed,
}

/// Live buffer of an active stroke.
#[derive(Debug, Clone)]
struct LiveStroke {
    tool: Tool,
    color: String,
    width: f64,
    points: Vec<Point>,
    started_at: u64,
    /// Set by `endStroke`; the stroke stays active until finalized.
    ended: bool,
}

/// Turns one connection's stroke messages into committed operations.
#[derive(Debug)]
pub struct StrokeAssembler {
    owner: ConnectionId,
    active: HashMap<OperationId, LiveStroke>,
    committed: HashSet<OperationId>,
}

impl StrokeAssembler {
    pub fn new(owner: impl Into<ConnectionId>) -> Self {
        Self {
            owner: owner.into(),
            active: HashMap::new(),
            committed: HashSet::new(),
        }
    }

    pub fn state(&self, id: &str) -> StrokeState {
        if self.active.contains_key(id) {
            StrokeState::Active
        } else if self.committed.contains(id) {
            StrokeState::Committed
        } else {
            StrokeState::Idle
        }
    }

    /// Idle → Active. Returns the provisional stroke to relay to peers.
    ///
    /// A start for an id that is already active or committed is ignored.
    pub fn start(&mut self, draft: StrokeDraft, received_at: u64) -> Option<ProvisionalStroke> {
        let id = draft.client_id().map(str::to_string).unwrap_or_else(new_id);
        if self.state(&id) != StrokeState::Idle {
            log::debug!("{}: ignoring repeated start of stroke {}", self.owner, id);
            return None;
        }

        let live = LiveStroke {
            tool: draft.tool,
            color: draft.color,
            width: draft.width,
            points: draft.points,
            started_at: received_at,
            ended: false,
        };
        let provisional = ProvisionalStroke {
            id: id.clone(),
            user_id: self.owner.clone(),
            tool: live.tool,
            color: live.color.clone(),
            width: live.width,
            points: live.points.clone(),
            timestamp: live.started_at,
            provisional: true,
        };
        self.active.insert(id, live);
        Some(provisional)
    }

    /// Append samples to an active stroke. Returns the interim batch to relay.
    ///
    /// Points for a stroke that is not active are dropped.
    pub fn append(&mut self, batch: StrokePoints) -> Option<InterimPoints> {
        let Some(live) = self.active.get_mut(&batch.id) else {
            log::debug!("{}: points for inactive stroke {}", self.owner, batch.id);
            return None;
        };
        live.points.extend_from_slice(&batch.points);
        Some(InterimPoints::new(batch.id, batch.points))
    }

    /// Pointer released. Informational only: returns whether the stroke was
    /// active.
    pub fn end(&mut self, id: &str) -> bool {
        match self.active.get_mut(id) {
            Some(live) => {
                live.ended = true;
                true
            }
            None => false,
        }
    }

    /// Active → Committed. Produces the operation the caller must push.
    ///
    /// A finalize without a prior start is taken as an implicit start. The
    /// id comes from the client or is generated; an id already present in
    /// `log` is a duplicate and yields `None`; its live buffer is released
    /// either way. `received_at` becomes the operation timestamp.
    pub fn finalize(
        &mut self,
        draft: StrokeDraft,
        received_at: u64,
        log: &OperationLog,
    ) -> Option<Operation> {
        let id = draft.client_id().map(str::to_string).unwrap_or_else(new_id);
        let live = self.active.remove(&id);
        if self.committed.contains(&id) || log.contains(&id) {
            log::debug!("{}: dropping duplicate finalize of {}", self.owner, id);
            return None;
        }

        if let Some(live) = live {
            log::trace!(
                "{}: committing stroke {} ({} live points, ended: {})",
                self.owner,
                id,
                live.points.len(),
                live.ended
            );
        }
        self.committed.insert(id.clone());
        Some(draft.into_operation(id, self.owner.clone(), received_at))
    }

    /// Points buffered so far for an active stroke.
    pub fn live_points(&self, id: &str) -> Option<&[Point]> {
        self.active.get(id).map(|live| live.points.as_slice())
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Drop every active buffer; those strokes are never committed.
    pub fn abandon_all(&mut self) -> usize {
        let abandoned = self.active.len();
        self.active.clear();
        self.active.shrink_to_fit();
        abandoned
    }
}
