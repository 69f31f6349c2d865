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

//! The volume's lookup tables.
//!
//! These are the only place a [`Node`], [`Entry`] or [`Attribute`] is stored by
//! value; everywhere else in the crate, the corresponding id is what gets passed
//! around and cloned.

use crate::ids::{AttributeId, EntryId, NodeId};
use crate::node::{Attribute, Entry, Node};
use std::collections::HashMap;

/// `NodeId → Node`.
#[derive(Debug, Default)]
pub struct NodeTable {
    nodes: HashMap<NodeId, Node>,
}

impl NodeTable {
    pub fn insert(&mut self, node: Node) {
        self.nodes.insert(node.id, node);
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub fn remove(&mut self, id: NodeId) -> Option<Node> {
        self.nodes.remove(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }
}

/// `(parent_id, name) → Entry`.
#[derive(Debug, Default)]
pub struct DirectoryEntryTable {
    by_parent_name: HashMap<(NodeId, String), EntryId>,
    entries: HashMap<EntryId, Entry>,
}

impl DirectoryEntryTable {
    pub fn insert(&mut self, entry: Entry) {
        self.by_parent_name.insert((entry.parent, entry.name.clone()), entry.id);
        self.entries.insert(entry.id, entry);
    }

    pub fn get(&self, id: EntryId) -> Option<&Entry> {
        self.entries.get(&id)
    }

    pub fn get_mut(&mut self, id: EntryId) -> Option<&mut Entry> {
        self.entries.get_mut(&id)
    }

    pub fn find(&self, parent: NodeId, name: &str) -> Option<EntryId> {
        self.by_parent_name.get(&(parent, name.to_string())).copied()
    }

    /// Removes an entry from both the `(parent, name)` index and the id-keyed
    /// storage. Callers are responsible for also unlinking it from the parent's
    /// `children` list and the target's `referrers` list.
    pub fn remove(&mut self, id: EntryId) -> Option<Entry> {
        let entry = self.entries.remove(&id)?;
        self.by_parent_name.remove(&(entry.parent, entry.name.clone()));
        Some(entry)
    }

    /// Re-keys an entry under a new `(parent, name)` pair, e.g. during a rename.
    /// The entry's own `parent`/`name` fields must already reflect the new value.
    pub fn rekey(&mut self, id: EntryId, old_parent: NodeId, old_name: &str) {
        self.by_parent_name.remove(&(old_parent, old_name.to_string()));
        if let Some(entry) = self.entries.get(&id) {
            self.by_parent_name.insert((entry.parent, entry.name.clone()), id);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Id-keyed storage for attributes. Unlike nodes and entries, attributes have no
/// secondary `(owner, name)` index here: that lookup goes through the owning
/// node's `attributes` list, which is short for any realistic node.
#[derive(Debug, Default)]
pub struct AttributeTable {
    attrs: HashMap<AttributeId, Attribute>,
}

impl AttributeTable {
    pub fn insert(&mut self, attr: Attribute) {
        self.attrs.insert(attr.id, attr);
    }

    pub fn get(&self, id: AttributeId) -> Option<&Attribute> {
        self.attrs.get(&id)
    }

    pub fn get_mut(&mut self, id: AttributeId) -> Option<&mut Attribute> {
        self.attrs.get_mut(&id)
    }

    pub fn remove(&mut self, id: AttributeId) -> Option<Attribute> {
        self.attrs.remove(&id)
    }
}
