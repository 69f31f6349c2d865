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

//! Node/entry/attribute listeners.
//!
//! Listeners subscribe either *targeted* — to one specific node or entry — or
//! *global* — to every node or entry in the volume. The built-in indices subscribe
//! globally (a name index needs to hear about every entry; a size index about every
//! node); suspended iterators subscribe targeted, to the single node or entry they
//! are currently positioned on.
//!
//! Dispatch always iterates a *copy* of the relevant listener list, so a callback
//! that registers or unregisters another listener mid-dispatch cannot invalidate the
//! iteration it is part of.

use crate::ids::{EntryId, NodeId};
use crate::node::{Attribute, Entry, Node};
use std::collections::HashMap;

pub type ListenerId = u64;

/// What happened to an attribute.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum AttributeChange {
    Created,
    Changed,
    Removed,
}

#[derive(Default)]
struct IdAllocator(ListenerId);

impl IdAllocator {
    fn alloc(&mut self) -> ListenerId {
        self.0 += 1;
        self.0
    }
}

type NodeCallback = Box<dyn FnMut(&Node, bool) + Send>;
type EntryCallback = Box<dyn FnMut(&Entry, bool) + Send>;
type AttributeCallback = Box<dyn FnMut(NodeId, &Attribute, AttributeChange) + Send>;
type StatCallback = Box<dyn FnMut(NodeId, u32) + Send>;

/// A registry of callbacks for one event family (e.g. node add/remove), supporting
/// both global and per-key targeted subscriptions.
struct Registry<K, F> {
    global: Vec<(ListenerId, F)>,
    targeted: HashMap<K, Vec<(ListenerId, F)>>,
}

impl<K, F> Default for Registry<K, F> {
    fn default() -> Self {
        Self { global: Vec::new(), targeted: HashMap::new() }
    }
}

impl<K: std::hash::Hash + Eq + Copy, F> Registry<K, F> {
    fn add_global(&mut self, id: ListenerId, f: F) {
        self.global.push((id, f));
    }

    fn add_targeted(&mut self, id: ListenerId, key: K, f: F) {
        self.targeted.entry(key).or_default().push((id, f));
    }

    fn remove(&mut self, id: ListenerId) {
        self.global.retain(|(lid, _)| *lid != id);
        for v in self.targeted.values_mut() {
            v.retain(|(lid, _)| *lid != id);
        }
        self.targeted.retain(|_, v| !v.is_empty());
    }

    /// Detaches every targeted callback for `key`, e.g. when a node/entry is about
    /// to be removed and its targeted listeners must fire exactly once more.
    fn take_targeted(&mut self, key: &K) -> Vec<(ListenerId, F)> {
        self.targeted.remove(key).unwrap_or_default()
    }
}

/// The volume's listener registries.
#[derive(Default)]
pub struct ListenerBus {
    ids: IdAllocator,
    nodes: Registry<NodeId, NodeCallback>,
    entries: Registry<EntryId, EntryCallback>,
    attributes: Vec<(ListenerId, AttributeCallback)>,
    stats: Vec<(ListenerId, StatCallback)>,
}

impl ListenerBus {
    pub fn on_node_global(&mut self, f: NodeCallback) -> ListenerId {
        let id = self.ids.alloc();
        self.nodes.add_global(id, f);
        id
    }

    pub fn on_node_targeted(&mut self, target: NodeId, f: NodeCallback) -> ListenerId {
        let id = self.ids.alloc();
        self.nodes.add_targeted(id, target, f);
        id
    }

    pub fn remove_node_listener(&mut self, id: ListenerId) {
        self.nodes.remove(id);
    }

    pub fn on_entry_global(&mut self, f: EntryCallback) -> ListenerId {
        let id = self.ids.alloc();
        self.entries.add_global(id, f);
        id
    }

    pub fn on_entry_targeted(&mut self, target: EntryId, f: EntryCallback) -> ListenerId {
        let id = self.ids.alloc();
        self.entries.add_targeted(id, target, f);
        id
    }

    pub fn remove_entry_listener(&mut self, id: ListenerId) {
        self.entries.remove(id);
    }

    pub fn on_attribute_changed(&mut self, f: AttributeCallback) -> ListenerId {
        let id = self.ids.alloc();
        self.attributes.push((id, f));
        id
    }

    pub fn remove_attribute_listener(&mut self, id: ListenerId) {
        self.attributes.retain(|(lid, _)| *lid != id);
    }

    pub fn on_stat_changed(&mut self, f: StatCallback) -> ListenerId {
        let id = self.ids.alloc();
        self.stats.push((id, f));
        id
    }

    pub fn remove_stat_listener(&mut self, id: ListenerId) {
        self.stats.retain(|(lid, _)| *lid != id);
    }

    /// Fires every global node listener, then — if this is a removal — every
    /// targeted listener attached to `node.id`, detaching them in the process (a
    /// removed node can never fire a targeted callback again).
    pub fn fire_node(&mut self, node: &Node, added: bool) {
        let mut global: Vec<_> = std::mem::take(&mut self.nodes.global);
        for (_, f) in global.iter_mut() {
            f(node, added);
        }
        self.nodes.global = global;
        if !added {
            let mut targeted = self.nodes.take_targeted(&node.id);
            for (_, f) in targeted.iter_mut() {
                f(node, added);
            }
        }
    }

    pub fn fire_entry(&mut self, entry: &Entry, added: bool) {
        let mut global: Vec<_> = std::mem::take(&mut self.entries.global);
        for (_, f) in global.iter_mut() {
            f(entry, added);
        }
        self.entries.global = global;
        if !added {
            let mut targeted = self.entries.take_targeted(&entry.id);
            for (_, f) in targeted.iter_mut() {
                f(entry, added);
            }
        }
    }

    pub fn fire_attribute_changed(&mut self, owner: NodeId, attr: &Attribute, change: AttributeChange) {
        let mut subs: Vec<_> = std::mem::take(&mut self.attributes);
        for (_, f) in subs.iter_mut() {
            f(owner, attr, change);
        }
        self.attributes = subs;
    }

    pub fn fire_stat_changed(&mut self, node: NodeId, fields_mask: u32) {
        let mut subs: Vec<_> = std::mem::take(&mut self.stats);
        for (_, f) in subs.iter_mut() {
            f(node, fields_mask);
        }
        self.stats = subs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{NodeIdAllocator};
    use crate::node::{Node, NodeKind};

    fn dummy_node(alloc: &mut NodeIdAllocator) -> Node {
        Node::new(alloc.alloc(), crate::node::S_IFREG, 0, 0, 0, NodeKind::File { data: Default::default() })
    }

    #[test]
    fn global_listener_fires_on_every_event() {
        let mut bus = ListenerBus::default();
        let mut alloc = NodeIdAllocator::default();
        let count = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let c2 = count.clone();
        bus.on_node_global(Box::new(move |_n, _added| {
            c2.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }));
        bus.fire_node(&dummy_node(&mut alloc), true);
        bus.fire_node(&dummy_node(&mut alloc), false);
        assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[test]
    fn targeted_listener_fires_once_on_removal_then_is_gone() {
        let mut bus = ListenerBus::default();
        let mut alloc = NodeIdAllocator::default();
        let n = dummy_node(&mut alloc);
        let fired = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let f2 = fired.clone();
        bus.on_node_targeted(n.id, Box::new(move |_n, _added| {
            f2.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }));
        bus.fire_node(&n, false);
        bus.fire_node(&n, false);
        assert_eq!(fired.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
