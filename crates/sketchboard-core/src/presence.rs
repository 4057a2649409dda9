//! Who is connected to a room and where their cursor is.
//!
//! Presence is ephemeral: it is never part of the history and has no
//! undo/redo interaction.

use crate::model::{ConnectionId, Point, User, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_USER_NAME: &str = "Anonymous";
pub const DEFAULT_USER_COLOR: &str = "#000";

/// Display identity for cursors of connections that never joined.
const UNKNOWN_CURSOR_NAME: &str = "Someone";
const UNKNOWN_CURSOR_COLOR: &str = "#333";

/// Cursor position of a peer, with its display identity attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorUpdate {
    pub user_id: UserId,
    pub x: f64,
    pub y: f64,
    pub name: String,
    pub color: String,
}

/// Connected users of one room, in first-join order.
#[derive(Debug, Clone, Default)]
pub struct PresenceTracker {
    users: Vec<User>,
    cursors: HashMap<ConnectionId, Point>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or update the user bound to `conn`.
    ///
    /// Missing or empty name/color fall back to the defaults. A re-join keeps
    /// the user's position in the list.
    pub fn join(&mut self, conn: &str, name: Option<String>, color: Option<String>) -> &User {
        let user = User {
            id: conn.to_string(),
            name: non_empty(name).unwrap_or_else(|| DEFAULT_USER_NAME.to_string()),
            color: non_empty(color).unwrap_or_else(|| DEFAULT_USER_COLOR.to_string()),
        };

        let index = match self.users.iter().position(|u| u.id == conn) {
            Some(index) => {
                self.users[index] = user;
                index
            }
            None => {
                self.users.push(user);
                self.users.len() - 1
            }
        };
        &self.users[index]
    }

    /// Remove the user and their last cursor.
    pub fn leave(&mut self, conn: &str) -> Option<User> {
        self.cursors.remove(conn);
        let index = self.users.iter().position(|u| u.id == conn)?;
        Some(self.users.remove(index))
    }

    /// Record the latest cursor of `conn` and build the event peers receive.
    pub fn cursor(&mut self, conn: &str, position: Point) -> CursorUpdate {
        self.cursors.insert(conn.to_string(), position);
        let (name, color) = match self.user(conn) {
            Some(user) => (user.name.clone(), user.color.clone()),
            None => (
                UNKNOWN_CURSOR_NAME.to_string(),
                UNKNOWN_CURSOR_COLOR.to_string(),
            ),
        };
        CursorUpdate {
            user_id: conn.to_string(),
            x: position.x,
            y: position.y,
            name,
            color,
        }
    }

    pub fn last_cursor(&self, conn: &str) -> Option<Point> {
        self.cursors.get(conn).copied()
    }

    pub fn user(&self, conn: &str) -> Option<&User> {
        self.users.iter().find(|u| u.id == conn)
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
