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

//! The bookkeeping behind "a suspended iterator advances past whatever it was
//! pointing at".
//!
//! The C++ original has a suspended [`crate::iter`] iterator attach itself to the
//! `EntryListener`/`NodeListener` list of the single item it is parked on; when that
//! item is removed, the listener callback hands the iterator its successor (computed
//! by whichever ordering the iterator is walking) directly, with no dynamic dispatch
//! through `crate::listener::ListenerBus` required, since there is exactly one
//! relationship (iterator → current item) per suspension. This module is that
//! attach/detach table, one instance per iterator family (directory order, name
//! order, size order, ...), keyed by whatever id that family iterates over.
//!
//! A handle may be moved more than once before it is ever resumed: if the iterator's
//! successor is itself removed while still suspended, [`SuspendRegistry::on_removed`]
//! re-attaches the handle under the new successor's key, chaining exactly like the
//! original's listener reattachment.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

/// A shared cell holding the key an iterator should resume at. `None` means the
/// iterator's target chain ran out (the item and every successor tried were removed)
/// and the iterator is `Done`.
pub type SuspendSlot<K> = Arc<Mutex<Option<K>>>;

/// Per-iterator-family attach table. Guarded, in practice, by `Volume`'s `iterator`
/// lock.
#[derive(Debug)]
pub struct SuspendRegistry<K: Eq + Hash + Copy> {
    attached: HashMap<K, Vec<SuspendSlot<K>>>,
}

impl<K: Eq + Hash + Copy> Default for SuspendRegistry<K> {
    fn default() -> Self {
        Self { attached: HashMap::new() }
    }
}

impl<K: Eq + Hash + Copy> SuspendRegistry<K> {
    /// Attaches a fresh handle parked on `key`, returning the shared slot the
    /// suspended iterator should read back on resume.
    pub fn attach(&mut self, key: K) -> SuspendSlot<K> {
        let slot: SuspendSlot<K> = Arc::new(Mutex::new(Some(key)));
        self.attached.entry(key).or_default().push(slot.clone());
        slot
    }

    /// Detaches `slot` from wherever it is currently registered (a no-op if it has
    /// already been moved elsewhere by a chained [`Self::on_removed`] and since moved
    /// again, or detached already). Called on resume; the slot's own value is the
    /// source of truth regardless of whether this finds a live registration.
    pub fn detach(&mut self, key_hint: K, slot: &SuspendSlot<K>) {
        if let Some(v) = self.attached.get_mut(&key_hint) {
            v.retain(|s| !Arc::ptr_eq(s, slot));
            if v.is_empty() {
                self.attached.remove(&key_hint);
            }
        }
    }

    /// Announces that `key` was removed, advancing every iterator suspended on it to
    /// `successor` (or `Done`, if `None`). If `successor` is itself later removed
    /// while these handles are still suspended, a second `on_removed(successor, ..)`
    /// call chains them again.
    pub fn on_removed(&mut self, key: K, successor: Option<K>) {
        let Some(handles) = self.attached.remove(&key) else {
            return;
        };
        for h in &handles {
            *h.lock() = successor;
        }
        if let Some(succ) = successor {
            self.attached.entry(succ).or_default().extend(handles);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn on_removed_advances_suspended_handle() {
        let mut reg: SuspendRegistry<u32> = SuspendRegistry::default();
        let slot = reg.attach(1);
        reg.on_removed(1, Some(2));
        assert_eq!(*slot.lock(), Some(2));
    }

    #[test]
    fn on_removed_with_no_successor_marks_done() {
        let mut reg: SuspendRegistry<u32> = SuspendRegistry::default();
        let slot = reg.attach(1);
        reg.on_removed(1, None);
        assert_eq!(*slot.lock(), None);
    }

    #[test]
    fn chained_removal_follows_to_second_successor() {
        let mut reg: SuspendRegistry<u32> = SuspendRegistry::default();
        let slot = reg.attach(1);
        reg.on_removed(1, Some(2));
        reg.on_removed(2, Some(3));
        assert_eq!(*slot.lock(), Some(3));
    }

    #[test]
    fn detach_before_removal_prevents_advance() {
        let mut reg: SuspendRegistry<u32> = SuspendRegistry::default();
        let slot = reg.attach(1);
        reg.detach(1, &slot);
        reg.on_removed(1, Some(2));
        // never chained since it was detached first
        assert_eq!(*slot.lock(), Some(1));
    }
}
