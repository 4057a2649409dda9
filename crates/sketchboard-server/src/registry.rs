//! Process-wide lookup of rooms by name.
//!
//! Rooms are created on first access and never evicted: their state lives
//! for the lifetime of the process and is lost on restart.

use std::sync::Arc;

use dashmap::DashMap;
use sketchboard_core::{RoomState, ServerMessage};
use tokio::sync::{Mutex, MutexGuard};
use tracing::info;

use crate::router::{BroadcastRouter, Outbox};

/// A room: its state behind one exclusive lock, plus its delivery fabric.
pub struct Room {
    name: String,
    state: Mutex<RoomState>,
    router: BroadcastRouter,
}

impl Room {
    fn new(name: &str, live_capacity: usize) -> Self {
        Self {
            name: name.to_string(),
            state: Mutex::new(RoomState::new(name)),
            router: BroadcastRouter::new(live_capacity),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Take the room lock. Mutations and their ordered broadcasts go through
    /// the returned guard, so no other connection can interleave with them.
    pub async fn lock(&self) -> RoomGuard<'_> {
        RoomGuard {
            state: self.state.lock().await,
            router: &self.router,
        }
    }

    /// Queue an event for every member but `from`, in order with that
    /// member's other events. Needs no lock.
    pub fn relay(&self, from: &str, msg: ServerMessage) -> usize {
        self.router.relay(from, &msg)
    }

    /// Relay a best-effort event to every member but `from`. Needs no lock.
    pub fn publish_live(&self, from: &str, msg: ServerMessage) -> usize {
        self.router.publish_live(from, msg)
    }

    pub fn member_count(&self) -> usize {
        self.router.member_count()
    }
}

/// Exclusive access to a room's state.
pub struct RoomGuard<'a> {
    state: MutexGuard<'a, RoomState>,
    router: &'a BroadcastRouter,
}

impl RoomGuard<'_> {
    pub fn state(&self) -> &RoomState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut RoomState {
        &mut self.state
    }

    /// Deliver an ordered event to every member.
    pub fn publish(&self, msg: ServerMessage) -> usize {
        self.router.publish(&msg)
    }

    /// Deliver an ordered event to one member.
    pub fn send_to(&self, conn: &str, msg: ServerMessage) -> bool {
        self.router.send_to(conn, msg)
    }

    /// Add a member. Subscribing under the lock means the member sees every
    /// ordered event published after whatever snapshot it is sent now.
    pub fn subscribe(&self, conn: &str) -> Outbox {
        self.router.subscribe(conn)
    }

    pub fn unsubscribe(&self, conn: &str) -> bool {
        self.router.unsubscribe(conn)
    }
}

/// All rooms of the process, keyed by name.
pub struct RoomRegistry {
    rooms: DashMap<String, Arc<Room>>,
    live_capacity: usize,
}

impl RoomRegistry {
    pub fn new(live_capacity: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            live_capacity,
        }
    }

    /// Get or create a room
    ///
    /// Concurrent callers asking for the same new name all receive the one
    /// room that won the insertion.
    pub fn get_or_create(&self, name: &str) -> Arc<Room> {
        if let Some(room) = self.rooms.get(name) {
            return Arc::clone(room.value());
        }
        let entry = self.rooms.entry(name.to_string()).or_insert_with(|| {
            info!("Creating room {}", name);
            Arc::new(Room::new(name, self.live_capacity))
        });
        Arc::clone(entry.value())
    }

    pub fn get(&self, name: &str) -> Option<Arc<Room>> {
        self.rooms.get(name).map(|room| Arc::clone(room.value()))
    }

    pub fn room_names(&self) -> Vec<String> {
        self.rooms.iter().map(|room| room.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
