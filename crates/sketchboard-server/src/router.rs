//! Fan-out of room events to connected members.
//!
//! Two delivery classes:
//!
//! - **Ordered** (strokes, undo, redo, clear, presence lists, snapshots):
//!   one unbounded queue per member. Room-wide events are published while
//!   the room lock is held, so every member observes the same order. Stroke
//!   previews are relayed into the same queues by the sending session, so a
//!   peer never sees a preview after the commit or undo that follows it.
//! - **Live** (cursors): one `tokio::sync::broadcast` channel per room.
//!   Receivers skip their own events and those of connections that already
//!   left. A slow receiver loses the oldest live events instead of holding
//!   up the room.

use std::collections::HashSet;

use dashmap::DashMap;
use sketchboard_core::{ConnectionId, ServerMessage};
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

/// A live event tagged with the connection that caused it.
pub type LiveEvent = (ConnectionId, ServerMessage);

/// Delivery fabric of one room.
pub struct BroadcastRouter {
    /// Ordered queue of every member
    members: DashMap<ConnectionId, mpsc::UnboundedSender<ServerMessage>>,
    /// Best-effort channel for cursors
    live: broadcast::Sender<LiveEvent>,
}

impl BroadcastRouter {
    /// Create a router whose live channel buffers `live_capacity` events
    /// per receiver.
    pub fn new(live_capacity: usize) -> Self {
        let (live, _) = broadcast::channel(live_capacity.max(1));
        Self {
            members: DashMap::new(),
            live,
        }
    }

    /// Register a member and hand back its receiving half.
    pub(crate) fn subscribe(&self, conn: &str) -> Outbox {
        let (tx, rx) = mpsc::unbounded_channel();
        self.members.insert(conn.to_string(), tx);
        Outbox {
            conn: conn.to_string(),
            ordered: rx,
            live: Some(self.live.subscribe()),
            departed: HashSet::new(),
        }
    }

    /// Remove a member. Its outbox drains what was already queued, then ends.
    pub(crate) fn unsubscribe(&self, conn: &str) -> bool {
        self.members.remove(conn).is_some()
    }

    /// Queue an ordered event for every member. Returns how many were reached.
    pub(crate) fn publish(&self, msg: &ServerMessage) -> usize {
        self.members
            .iter()
            .filter(|member| member.value().send(msg.clone()).is_ok())
            .count()
    }

    /// Queue an event for every member except `from`.
    ///
    /// Needs no room lock: events of one sender keep their relative order
    /// because a session publishes from a single task.
    pub(crate) fn relay(&self, from: &str, msg: &ServerMessage) -> usize {
        self.members
            .iter()
            .filter(|member| member.key() != from)
            .filter(|member| member.value().send(msg.clone()).is_ok())
            .count()
    }

    /// Queue an ordered event for a single member.
    pub(crate) fn send_to(&self, conn: &str, msg: ServerMessage) -> bool {
        match self.members.get(conn) {
            Some(member) => member.value().send(msg).is_ok(),
            None => false,
        }
    }

    /// Relay a live event to every member except `from`.
    ///
    /// Never blocks and never retries. Returns the number of receivers the
    /// event was handed to (including the sender's own, which skips it).
    pub fn publish_live(&self, from: &str, msg: ServerMessage) -> usize {
        self.live.send((from.to_string(), msg)).unwrap_or(0)
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_member(&self, conn: &str) -> bool {
        self.members.contains_key(conn)
    }
}

/// Receiving half of one member: both delivery classes merged, ordered
/// traffic first.
pub struct Outbox {
    conn: ConnectionId,
    ordered: mpsc::UnboundedReceiver<ServerMessage>,
    live: Option<broadcast::Receiver<LiveEvent>>,
    /// Connections whose `userLeft` was delivered; their late cursors are stale.
    departed: HashSet<ConnectionId>,
}

impl Outbox {
    /// Wait for the next event. Returns `None` once the member has been
    /// unsubscribed and its ordered queue is drained.
    ///
    /// Cancel safe.
    pub async fn recv(&mut self) -> Option<ServerMessage> {
        let Self {
            conn,
            ordered,
            live,
            departed,
        } = self;

        loop {
            tokio::select! {
                biased;

                msg = ordered.recv() => return msg.map(|msg| note_departure(departed, msg)),

                event = recv_live(live) => match event {
                    Ok((from, msg)) => {
                        if from != *conn && !departed.contains(&from) {
                            return Some(msg);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("Connection {} skipped {} live events", conn, skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        *live = None;
                    }
                },
            }
        }
    }

    /// Take the next event if one is ready.
    pub fn try_recv(&mut self) -> Option<ServerMessage> {
        if let Ok(msg) = self.ordered.try_recv() {
            return Some(note_departure(&mut self.departed, msg));
        }
        let live = self.live.as_mut()?;
        loop {
            match live.try_recv() {
                Ok((from, msg)) if from != self.conn && !self.departed.contains(&from) => {
                    return Some(msg);
                }
                Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}

fn note_departure(departed: &mut HashSet<ConnectionId>, msg: ServerMessage) -> ServerMessage {
    if let ServerMessage::UserLeft(user_id) = &msg {
        departed.insert(user_id.clone());
    }
    msg
}

async fn recv_live(
    live: &mut Option<broadcast::Receiver<LiveEvent>>,
) -> Result<LiveEvent, broadcast::error::RecvError> {
    match live {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sketchboard_core::{CursorUpdate, ServerMessage};

    fn cursor(user: &str, x: f64) -> ServerMessage {
        ServerMessage::Cursor(CursorUpdate {
            user_id: user.to_string(),
            x,
            y: 0.0,
            name: user.to_string(),
            color: "#000".to_string(),
        })
    }

    #[tokio::test]
    async fn test_ordered_reaches_everyone_in_order() {
        let router = BroadcastRouter::new(8);
        let mut a = router.subscribe("a");
        let mut b = router.subscribe("b");

        assert_eq!(router.publish(&ServerMessage::UndoBroadcast("1".into())), 2);
        assert_eq!(router.publish(&ServerMessage::ClearBroadcast), 2);

        for outbox in [&mut a, &mut b] {
            assert_eq!(
                outbox.recv().await,
                Some(ServerMessage::UndoBroadcast("1".into()))
            );
            assert_eq!(outbox.recv().await, Some(ServerMessage::ClearBroadcast));
        }
    }

    #[tokio::test]
    async fn test_live_skips_sender() {
        let router = BroadcastRouter::new(8);
        let mut a = router.subscribe("a");
        let mut b = router.subscribe("b");

        router.publish_live("a", cursor("a", 1.0));

        assert_eq!(b.recv().await, Some(cursor("a", 1.0)));
        assert!(a.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_lagging_receiver_keeps_newest() {
        let router = BroadcastRouter::new(2);
        let _a = router.subscribe("a");
        let mut b = router.subscribe("b");

        for i in 0..5 {
            router.publish_live("a", cursor("a", f64::from(i)));
        }

        assert_eq!(b.recv().await, Some(cursor("a", 3.0)));
        assert_eq!(b.recv().await, Some(cursor("a", 4.0)));
        assert!(b.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_ordered_preferred_over_live() {
        let router = BroadcastRouter::new(8);
        let mut a = router.subscribe("a");

        router.publish_live("b", cursor("b", 1.0));
        router.publish(&ServerMessage::ClearBroadcast);

        assert_eq!(a.recv().await, Some(ServerMessage::ClearBroadcast));
        assert_eq!(a.recv().await, Some(cursor("b", 1.0)));
    }

    #[tokio::test]
    async fn test_relay_keeps_sender_order_against_ordered_events() {
        let router = BroadcastRouter::new(8);
        let mut a = router.subscribe("a");
        let mut b = router.subscribe("b");

        assert_eq!(router.relay("a", &cursor("a", 1.0)), 1);
        router.publish(&ServerMessage::UndoBroadcast("s1".into()));

        assert_eq!(b.recv().await, Some(cursor("a", 1.0)));
        assert_eq!(b.recv().await, Some(ServerMessage::UndoBroadcast("s1".into())));
        assert_eq!(a.recv().await, Some(ServerMessage::UndoBroadcast("s1".into())));
        assert!(a.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_live_events_of_departed_member_dropped() {
        let router = BroadcastRouter::new(8);
        let _a = router.subscribe("a");
        let mut b = router.subscribe("b");

        router.publish_live("a", cursor("a", 1.0));
        router.publish(&ServerMessage::UserLeft("a".into()));
        router.publish_live("c", cursor("c", 2.0));

        assert_eq!(b.recv().await, Some(ServerMessage::UserLeft("a".into())));
        assert_eq!(b.recv().await, Some(cursor("c", 2.0)));
        assert!(b.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_unsubscribe_ends_outbox() {
        let router = BroadcastRouter::new(8);
        let mut a = router.subscribe("a");

        assert!(router.send_to("a", ServerMessage::InitHistory(Vec::new())));
        assert!(router.unsubscribe("a"));
        assert!(!router.is_member("a"));
        assert!(!router.send_to("a", ServerMessage::ClearBroadcast));

        assert_eq!(a.recv().await, Some(ServerMessage::InitHistory(Vec::new())));
        assert_eq!(a.recv().await, None);
        assert_eq!(router.member_count(), 0);
    }
}
