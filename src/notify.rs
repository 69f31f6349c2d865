/*
 * Copyright 2026 The ramfs-core authors
 *
 * This file is part of ramfs-core.
 *
 * ramfs-core is free software: you can redistribute it and/or modify it under the
 * terms of the GNU General Public License as published by the Free Software
 * Foundation, either version 3 of the License, or (at your option) any later
 * version.
 *
 * ramfs-core is distributed in the hope that it will be useful, but WITHOUT ANY
 * WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR
 * A PARTICULAR PURPOSE. See the GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License along with
 * ramfs-core. If not, see <https://www.gnu.org/licenses/>.
 */

//! The two message codes a live query emits, plus the `attribute_changed` /
//! `stat_changed` broadcasts.
//!
//! A real mount would write these as kernel port messages; since the port itself is
//! part of the out-of-scope kernel glue, this crate represents "the
//! caller-provided port" as a trait object the caller supplies to `open_query`, and
//! delivers every message through it synchronously, tagged with the caller-provided
//! token.

use crate::ids::NodeId;

/// What an `attribute_changed` message reports about the attribute.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum AttrChangeKind {
    Created,
    Changed,
    Removed,
}

/// One message a live query or a stat-change broadcast can emit.
#[derive(Debug, Clone)]
pub enum Notification {
    EntryCreated { device: u64, parent: NodeId, name: String, node: NodeId },
    EntryRemoved { device: u64, parent: NodeId, name: String, node: NodeId },
    AttributeChanged { device: u64, node: NodeId, name: String, kind: AttrChangeKind },
    StatChanged { device: u64, node: NodeId, fields_mask: u32 },
}

/// The caller-provided port a live query or stat-change subscriber receives
/// messages on, tagged with the caller-provided token.
pub trait NotificationPort: Send + Sync {
    fn send(&self, notification: Notification, token: i64);
}

/// A port that records every message it receives, in order. Used by tests and by
/// any standalone embedder of this crate that wants to poll rather than wire up a
/// real message port.
#[derive(Debug, Default)]
pub struct RecordingPort {
    sent: parking_lot::Mutex<Vec<(Notification, i64)>>,
}

impl RecordingPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<(Notification, i64)> {
        std::mem::take(&mut self.sent.lock())
    }
}

impl NotificationPort for RecordingPort {
    fn send(&self, notification: Notification, token: i64) {
        self.sent.lock().push((notification, token));
    }
}
