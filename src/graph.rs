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

//! Node graph operations: the directory/file/symlink factory
//! methods, entry link/unlink/rename, and attribute CRUD.
//!
//! [`Graph`] owns the three lookup tables plus the id allocators and
//! is the only thing in the crate that stores a [`Node`], [`Entry`] or [`Attribute`]
//! by value. It knows nothing about indices or listeners: [`crate::volume::Volume`]
//! orchestrates those on top of the plain mutations below, so this module stays a
//! mutation layer with no notification side effects beyond the [`VnodeHooks`] calls,
//! the core's own hook surface into a host VFS.

use crate::config::{NAME_MAX, PATH_MAX};
use crate::container::DataContainer;
use crate::error::{Error, Result};
use crate::ids::{AttributeId, EntryId, IdAllocator, NodeId, NodeIdAllocator, Timestamp};
use crate::node::{
    Attribute, AttrType, Credentials, Entry, Mode, Node, NodeKind, RESERVED_ATTR_NAMES, S_IFDIR, S_IFLNK, S_IFREG,
};
use crate::table::{AttributeTable, DirectoryEntryTable, NodeTable};

/// The core's hook surface into a host VFS.
///
/// `publish` is called once, atomically with node creation, by every `create_*`
/// factory method. `get`/`put` bracket a vnode handle's lifetime; `remove`/`unremove`
/// bracket the kernel's handling of a node scheduled for deletion. A standalone user
/// of this crate (e.g. property tests) can use [`NullHooks`].
pub trait VnodeHooks: Send + Sync {
    fn publish(&self, id: NodeId);
    fn get(&self, id: NodeId);
    fn put(&self, id: NodeId);
    fn remove(&self, id: NodeId);
    fn unremove(&self, id: NodeId);
}

/// A [`VnodeHooks`] that does nothing; the default for a volume with no host shim
/// attached (unit tests, property tests).
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHooks;

impl VnodeHooks for NullHooks {
    fn publish(&self, _id: NodeId) {}
    fn get(&self, _id: NodeId) {}
    fn put(&self, _id: NodeId) {}
    fn remove(&self, _id: NodeId) {}
    fn unremove(&self, _id: NodeId) {}
}

/// What changed about a node or entry, returned by the mutating [`Graph`] methods so
/// `Volume` can drive indices and listeners without re-deriving the delta itself.
/// Creation and field-level mutations (size, mtime, attribute value/stat changes)
/// are driven directly by `Volume` from the before/after state it already has in
/// hand, so `Change` only needs to cover removal/relink, the parts a single
/// `Graph` call can fold several of into one atomic step.
#[derive(Debug, Clone)]
pub enum Change {
    NodeRemoved(NodeId),
    EntryAdded(EntryId),
    EntryRemoved(EntryId),
}

/// The node graph.
#[derive(Debug, Default)]
pub struct Graph {
    nodes: NodeTable,
    entries: DirectoryEntryTable,
    attrs: AttributeTable,
    node_ids: NodeIdAllocator,
    entry_ids: IdAllocator<EntryId>,
    attr_ids: IdAllocator<AttributeId>,
    root: Option<NodeId>,
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.len() > NAME_MAX || name.contains('\0') {
        return Err(Error::BadValue);
    }
    Ok(())
}

impl Graph {
    /// Builds a graph with a fresh root directory, calling `hooks.publish` on it
    /// exactly as any other `create_*` call would.
    pub fn new(mode: Mode, uid: u32, gid: u32, now: Timestamp, hooks: &dyn VnodeHooks) -> Self {
        let mut g = Self::default();
        let id = g.node_ids.alloc();
        let mut node = Node::new(id, (mode & !crate::node::S_IFMT) | S_IFDIR, uid, gid, now, NodeKind::Directory {
            children: Vec::new(),
        });
        node.ref_count = 1;
        g.nodes.insert(node);
        g.root = Some(id);
        hooks.publish(id);
        g
    }

    pub fn root(&self) -> NodeId {
        self.root.expect("Graph::new always sets root")
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(id).ok_or(Error::NotFound)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes.get_mut(id).ok_or(Error::NotFound)
    }

    pub fn entry(&self, id: EntryId) -> Result<&Entry> {
        self.entries.get(id).ok_or(Error::NotFound)
    }

    pub fn attribute(&self, id: AttributeId) -> Result<&Attribute> {
        self.attrs.get(id).ok_or(Error::NotFound)
    }

    pub fn attribute_mut(&mut self, id: AttributeId) -> Result<&mut Attribute> {
        self.attrs.get_mut(id).ok_or(Error::NotFound)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes_iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    fn dir_children(&self, dir: NodeId) -> Result<&[EntryId]> {
        self.node(dir)?.children().ok_or(Error::NotADirectory)
    }

    /// Looks up `name` within `parent` by entry id.
    pub fn find_entry(&self, parent: NodeId, name: &str) -> Option<EntryId> {
        self.entries.find(parent, name)
    }

    /// Looks up `name` within `parent` by the id of the node it targets.
    pub fn find_node(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.find_entry(parent, name).and_then(|e| self.entries.get(e)).map(|e| e.target)
    }

    /// As [`Self::find_node`], but also takes a VFS reference on the resolved node.
    pub fn find_and_get_node(&mut self, parent: NodeId, name: &str, hooks: &dyn VnodeHooks) -> Option<NodeId> {
        let id = self.find_node(parent, name)?;
        if let Some(n) = self.nodes.get_mut(id) {
            n.ref_count += 1;
        }
        hooks.get(id);
        Some(id)
    }

    fn new_node(&mut self, mode: Mode, uid: u32, gid: u32, now: Timestamp, kind: NodeKind) -> NodeId {
        let id = self.node_ids.alloc();
        let mut node = Node::new(id, mode, uid, gid, now, kind);
        node.ref_count = 1;
        self.nodes.insert(node);
        id
    }

    fn link_new(&mut self, parent: NodeId, name: &str, target: NodeId) -> Result<EntryId> {
        let entry_id = self.entry_ids.alloc();
        let entry = Entry { id: entry_id, parent, name: name.to_string(), target };
        self.entries.insert(entry);
        if let NodeKind::Directory { children } = &mut self.node_mut(parent)?.kind {
            children.push(entry_id);
        }
        self.node_mut(target)?.referrers.push(entry_id);
        Ok(entry_id)
    }

    /// Atomically constructs a directory node, links it under `parent` as `name`,
    /// and publishes it.
    pub fn create_dir(
        &mut self,
        parent: NodeId,
        name: &str,
        mode: Mode,
        uid: u32,
        gid: u32,
        now: Timestamp,
        hooks: &dyn VnodeHooks,
    ) -> Result<(NodeId, EntryId)> {
        validate_name(name)?;
        if !self.node(parent)?.is_dir() {
            return Err(Error::NotADirectory);
        }
        if self.find_entry(parent, name).is_some() {
            return Err(Error::AlreadyExists);
        }
        let id = self.new_node((mode & !crate::node::S_IFMT) | S_IFDIR, uid, gid, now, NodeKind::Directory {
            children: Vec::new(),
        });
        let entry_id = match self.link_new(parent, name, id) {
            Ok(e) => e,
            Err(e) => {
                self.nodes.remove(id);
                return Err(e);
            }
        };
        hooks.publish(id);
        Ok((id, entry_id))
    }

    /// Creates an empty regular file under `parent` and publishes it.
    pub fn create_file(
        &mut self,
        parent: NodeId,
        name: &str,
        mode: Mode,
        uid: u32,
        gid: u32,
        now: Timestamp,
        hooks: &dyn VnodeHooks,
    ) -> Result<(NodeId, EntryId)> {
        validate_name(name)?;
        if !self.node(parent)?.is_dir() {
            return Err(Error::NotADirectory);
        }
        if self.find_entry(parent, name).is_some() {
            return Err(Error::AlreadyExists);
        }
        let id = self.new_node((mode & !crate::node::S_IFMT) | S_IFREG, uid, gid, now, NodeKind::File {
            data: DataContainer::new(),
        });
        let entry_id = match self.link_new(parent, name, id) {
            Ok(e) => e,
            Err(e) => {
                self.nodes.remove(id);
                return Err(e);
            }
        };
        hooks.publish(id);
        Ok((id, entry_id))
    }

    /// Creates a symlink under `parent` pointing at `target` and publishes it.
    pub fn create_symlink(
        &mut self,
        parent: NodeId,
        name: &str,
        target_path: &str,
        uid: u32,
        gid: u32,
        now: Timestamp,
        hooks: &dyn VnodeHooks,
    ) -> Result<(NodeId, EntryId)> {
        validate_name(name)?;
        if target_path.len() > PATH_MAX {
            return Err(Error::BadValue);
        }
        if !self.node(parent)?.is_dir() {
            return Err(Error::NotADirectory);
        }
        if self.find_entry(parent, name).is_some() {
            return Err(Error::AlreadyExists);
        }
        let id = self.new_node(S_IFLNK | 0o777, uid, gid, now, NodeKind::SymLink {
            target: target_path.to_string(),
        });
        let entry_id = match self.link_new(parent, name, id) {
            Ok(e) => e,
            Err(e) => {
                self.nodes.remove(id);
                return Err(e);
            }
        };
        hooks.publish(id);
        Ok((id, entry_id))
    }

    /// Hard-links an existing node under a new `(parent, name)`.
    pub fn add_entry(&mut self, parent: NodeId, name: &str, target: NodeId) -> Result<EntryId> {
        validate_name(name)?;
        if !self.node(parent)?.is_dir() {
            return Err(Error::NotADirectory);
        }
        if self.find_entry(parent, name).is_some() {
            return Err(Error::AlreadyExists);
        }
        if !self.node(target)?.allows_additional_referrer() {
            return Err(Error::NotAllowed);
        }
        self.link_new(parent, name, target)
    }

    /// Unlinks `entry_id` from its parent's children and its target's referrers and
    /// drops it from the table, without touching the target node itself. Returns
    /// the removed entry and whether its target is now orphaned (empty referrers).
    fn remove_entry_raw(&mut self, entry_id: EntryId) -> Result<(Entry, bool)> {
        let entry = self.entries.remove(entry_id).ok_or(Error::NotFound)?;
        if let Some(Node { kind: NodeKind::Directory { children }, .. }) = self.nodes.get_mut(entry.parent) {
            children.retain(|e| *e != entry_id);
        }
        let orphaned = if let Some(target) = self.nodes.get_mut(entry.target) {
            target.referrers.retain(|e| *e != entry_id);
            target.referrers.is_empty()
        } else {
            true
        };
        Ok((entry, orphaned))
    }

    /// Unlinks the entry. If the target is now
    /// orphaned and its published ref-count is already zero, the node is deleted in
    /// the same step.
    pub fn remove_entry(&mut self, entry_id: EntryId, alloc: &mut crate::alloc::BlockAllocator, hooks: &dyn VnodeHooks) -> Result<(Entry, Vec<Change>)> {
        let (entry, orphaned) = self.remove_entry_raw(entry_id)?;
        let mut changes = vec![Change::EntryRemoved(entry_id)];
        if orphaned {
            if let Some(removed) = self.maybe_delete_node(entry.target, alloc, hooks)? {
                changes.push(Change::NodeRemoved(removed));
            }
        }
        Ok((entry, changes))
    }

    /// Like `remove_entry`, but on failure to clean up the
    /// target the entry is re-added to preserve invariants rather than left
    /// half-removed.
    pub fn delete_entry(&mut self, entry_id: EntryId, alloc: &mut crate::alloc::BlockAllocator, hooks: &dyn VnodeHooks) -> Result<Vec<Change>> {
        let (entry, orphaned) = self.remove_entry_raw(entry_id)?;
        if !orphaned {
            return Ok(vec![Change::EntryRemoved(entry_id)]);
        }
        match self.maybe_delete_node(entry.target, alloc, hooks) {
            Ok(removed) => {
                let mut changes = vec![Change::EntryRemoved(entry_id)];
                if let Some(r) = removed {
                    changes.push(Change::NodeRemoved(r));
                }
                Ok(changes)
            }
            Err(e) => {
                // Restore the entry exactly as it was so every invariant
                // keeps holding.
                self.entries.insert(entry.clone());
                if let NodeKind::Directory { children } = &mut self.node_mut(entry.parent)?.kind {
                    children.push(entry_id);
                }
                self.node_mut(entry.target)?.referrers.push(entry_id);
                Err(e)
            }
        }
    }

    /// Deletes `id` from the node table (freeing its data container) once it has no
    /// referrers and no outstanding published references, calling `hooks.remove`.
    /// Returns `Some(id)` if deletion actually happened.
    fn maybe_delete_node(&mut self, id: NodeId, alloc: &mut crate::alloc::BlockAllocator, hooks: &dyn VnodeHooks) -> Result<Option<NodeId>> {
        let ready = matches!(self.nodes.get(id), Some(n) if n.referrers.is_empty() && n.ref_count == 0);
        if !ready {
            return Ok(None);
        }
        let mut node = self.nodes.remove(id).expect("checked present above");
        if let NodeKind::File { data } = &mut node.kind {
            data.free(alloc)?;
        }
        for attr_id in node.attributes.drain(..) {
            if let Some(mut attr) = self.attrs.remove(attr_id) {
                attr.container.free(alloc)?;
            }
        }
        hooks.remove(id);
        Ok(Some(id))
    }

    /// Drops a published reference. If this brings the
    /// count to zero and the node has no referrers, it is deleted now.
    pub fn put(&mut self, id: NodeId, alloc: &mut crate::alloc::BlockAllocator, hooks: &dyn VnodeHooks) -> Result<Option<NodeId>> {
        let node = self.node_mut(id)?;
        node.ref_count = node.ref_count.saturating_sub(1);
        self.maybe_delete_node(id, alloc, hooks)
    }

    /// Renames `(src_parent, src_name)` to `(dst_parent, dst_name)`: the new link is created before the old one is removed, and
    /// a temporary extra reference keeps the node alive across the two steps; should
    /// removing the old link fail, the new link is rolled back.
    pub fn rename(
        &mut self,
        src_parent: NodeId,
        src_name: &str,
        dst_parent: NodeId,
        dst_name: &str,
        alloc: &mut crate::alloc::BlockAllocator,
        hooks: &dyn VnodeHooks,
    ) -> Result<Vec<Change>> {
        validate_name(dst_name)?;
        let src_entry_id = self.find_entry(src_parent, src_name).ok_or(Error::NotFound)?;
        let target = self.entry(src_entry_id)?.target;

        if let Some(existing_id) = self.find_entry(dst_parent, dst_name) {
            let existing = self.entry(existing_id)?;
            if existing.target == target {
                return Ok(vec![]); // renaming onto itself
            }
            let existing_target = existing.target;
            if self.node(existing_target)?.is_dir() {
                if !self.dir_children(existing_target)?.is_empty() {
                    return Err(Error::NameInUse);
                }
            }
            let (_, mut changes) = self.remove_entry(existing_id, alloc, hooks)?;
            changes.extend(self.rename_link_then_unlink(src_parent, src_name, src_entry_id, dst_parent, dst_name, target, alloc, hooks)?);
            return Ok(changes);
        }

        self.rename_link_then_unlink(src_parent, src_name, src_entry_id, dst_parent, dst_name, target, alloc, hooks)
    }

    #[allow(clippy::too_many_arguments)]
    fn rename_link_then_unlink(
        &mut self,
        src_parent: NodeId,
        src_name: &str,
        src_entry_id: EntryId,
        dst_parent: NodeId,
        dst_name: &str,
        target: NodeId,
        alloc: &mut crate::alloc::BlockAllocator,
        hooks: &dyn VnodeHooks,
    ) -> Result<Vec<Change>> {
        let _ = src_name;
        self.node_mut(target)?.ref_count += 1; // temporary extra reference
        let new_entry_id = match self.link_new(dst_parent, dst_name, target) {
            Ok(id) => id,
            Err(e) => {
                self.node_mut(target)?.ref_count -= 1;
                return Err(e);
            }
        };
        match self.remove_entry(src_entry_id, alloc, hooks) {
            Ok((_, mut changes)) => {
                self.node_mut(target)?.ref_count -= 1;
                changes.push(Change::EntryAdded(new_entry_id));
                Ok(changes)
            }
            Err(e) => {
                // Roll back the new link; src is untouched.
                let (_, _orphaned) = self.remove_entry_raw(new_entry_id)?;
                self.node_mut(target)?.ref_count -= 1;
                Err(e)
            }
        }
    }

    /// Creates a user attribute on `owner`. The names `name`, `size`, `last_modified`
    /// are reserved on every node.
    pub fn create_attribute(&mut self, owner: NodeId, name: &str, attr_type: AttrType) -> Result<AttributeId> {
        if name.is_empty() || name.len() > NAME_MAX {
            return Err(Error::BadValue);
        }
        if RESERVED_ATTR_NAMES.contains(&name) {
            return Err(Error::NotAllowed);
        }
        self.node(owner)?;
        if self.find_attribute(owner, name).is_some() {
            return Err(Error::AlreadyExists);
        }
        let id = self.attr_ids.alloc();
        let attr = Attribute {
            id,
            owner,
            name: name.to_string(),
            attr_type,
            container: DataContainer::new(),
            index_ref: None,
        };
        self.attrs.insert(attr);
        self.node_mut(owner)?.attributes.push(id);
        Ok(id)
    }

    pub fn find_attribute(&self, owner: NodeId, name: &str) -> Option<AttributeId> {
        let node = self.nodes.get(owner)?;
        node.attributes.iter().copied().find(|id| self.attrs.get(*id).is_some_and(|a| a.name == name))
    }

    pub fn remove_attribute(&mut self, owner: NodeId, name: &str, alloc: &mut crate::alloc::BlockAllocator) -> Result<Attribute> {
        if RESERVED_ATTR_NAMES.contains(&name) {
            return Err(Error::NotAllowed);
        }
        let id = self.find_attribute(owner, name).ok_or(Error::NotFound)?;
        self.node_mut(owner)?.attributes.retain(|a| *a != id);
        let mut attr = self.attrs.remove(id).expect("found above");
        attr.container.free(alloc)?;
        Ok(attr)
    }

    /// Renaming an attribute is left unimplemented.
    pub fn rename_attribute(&mut self, _owner: NodeId, _old: &str, _new: &str) -> Result<()> {
        Err(Error::Unsupported)
    }

    pub fn write_attribute(
        &mut self,
        id: AttributeId,
        alloc: &mut crate::alloc::BlockAllocator,
        config: &crate::config::VolumeConfig,
        offset: usize,
        buf: &[u8],
    ) -> Result<Vec<u8>> {
        let attr = self.attribute_mut(id)?;
        if RESERVED_ATTR_NAMES.contains(&attr.name.as_str()) {
            return Err(Error::NotAllowed);
        }
        attr.container.write(alloc, config, offset, buf)?;
        let mut bytes = vec![0u8; attr.container.size()];
        attr.container.read(alloc, 0, &mut bytes)?;
        Ok(bytes)
    }

    pub fn read_attribute(&self, id: AttributeId, alloc: &crate::alloc::BlockAllocator, offset: usize, buf: &mut [u8]) -> Result<usize> {
        self.attribute(id)?.container.read(alloc, offset, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::BlockAllocator;

    fn graph() -> (Graph, BlockAllocator) {
        (Graph::new(0o755, 0, 0, 1000, &NullHooks), BlockAllocator::new(4096))
    }

    #[test]
    fn create_dir_then_file_then_lookup() {
        let (mut g, _alloc) = graph();
        let root = g.root();
        let (a_id, _) = g.create_dir(root, "a", 0o755, 0, 0, 1000, &NullHooks).unwrap();
        let (b_id, _) = g.create_file(a_id, "b", 0o644, 0, 0, 1000, &NullHooks).unwrap();
        assert_eq!(g.find_node(root, "a"), Some(a_id));
        assert_eq!(g.find_node(a_id, "b"), Some(b_id));
        assert!(g.node(b_id).unwrap().is_file());
    }

    #[test]
    fn duplicate_name_rejected() {
        let (mut g, _alloc) = graph();
        let root = g.root();
        g.create_file(root, "x", 0o644, 0, 0, 1000, &NullHooks).unwrap();
        let err = g.create_file(root, "x", 0o644, 0, 0, 1000, &NullHooks).unwrap_err();
        assert_eq!(err, Error::AlreadyExists);
    }

    #[test]
    fn hard_linking_a_directory_is_forbidden() {
        let (mut g, _alloc) = graph();
        let root = g.root();
        let (a, _) = g.create_dir(root, "a", 0o755, 0, 0, 1000, &NullHooks).unwrap();
        let err = g.add_entry(root, "a2", a).unwrap_err();
        assert_eq!(err, Error::NotAllowed);
    }

    #[test]
    fn deleting_last_entry_deletes_node_when_unpublished() {
        let (mut g, mut alloc) = graph();
        let root = g.root();
        let (f, entry) = g.create_file(root, "f", 0o644, 0, 0, 1000, &NullHooks).unwrap();
        g.put(f, &mut alloc, &NullHooks).unwrap(); // drop the creation reference
        let changes = g.delete_entry(entry, &mut alloc, &NullHooks).unwrap();
        assert!(changes.iter().any(|c| matches!(c, Change::NodeRemoved(id) if *id == f)));
        assert!(g.node(f).is_err());
    }

    #[test]
    fn rename_moves_entry_and_preserves_node() {
        let (mut g, mut alloc) = graph();
        let root = g.root();
        let (dir_a, _) = g.create_dir(root, "a", 0o755, 0, 0, 1000, &NullHooks).unwrap();
        let (dir_b, _) = g.create_dir(root, "b", 0o755, 0, 0, 1000, &NullHooks).unwrap();
        let (f, _) = g.create_file(dir_a, "f", 0o644, 0, 0, 1000, &NullHooks).unwrap();
        g.rename(dir_a, "f", dir_b, "g", &mut alloc, &NullHooks).unwrap();
        assert_eq!(g.find_node(dir_a, "f"), None);
        assert_eq!(g.find_node(dir_b, "g"), Some(f));
    }

    #[test]
    fn rename_onto_empty_directory_replaces_it() {
        let (mut g, mut alloc) = graph();
        let root = g.root();
        let (src, _) = g.create_dir(root, "src", 0o755, 0, 0, 1000, &NullHooks).unwrap();
        g.create_dir(root, "dst", 0o755, 0, 0, 1000, &NullHooks).unwrap();
        g.rename(root, "src", root, "dst", &mut alloc, &NullHooks).unwrap();
        assert_eq!(g.find_node(root, "dst"), Some(src));
    }

    #[test]
    fn rename_onto_nonempty_directory_fails() {
        let (mut g, mut alloc) = graph();
        let root = g.root();
        g.create_dir(root, "src", 0o755, 0, 0, 1000, &NullHooks).unwrap();
        let (dst, _) = g.create_dir(root, "dst", 0o755, 0, 0, 1000, &NullHooks).unwrap();
        g.create_file(dst, "child", 0o644, 0, 0, 1000, &NullHooks).unwrap();
        let err = g.rename(root, "src", root, "dst", &mut alloc, &NullHooks).unwrap_err();
        assert_eq!(err, Error::NameInUse);
    }

    #[test]
    fn reserved_attribute_names_rejected() {
        let (mut g, _alloc) = graph();
        let root = g.root();
        let err = g.create_attribute(root, "size", AttrType::Int32).unwrap_err();
        assert_eq!(err, Error::NotAllowed);
    }

    #[test]
    fn attribute_round_trip() {
        let (mut g, mut alloc) = graph();
        let root = g.root();
        let (f, _) = g.create_file(root, "f", 0o644, 0, 0, 1000, &NullHooks).unwrap();
        let attr = g.create_attribute(f, "MAIL:from", AttrType::String).unwrap();
        let config = crate::config::VolumeConfig::default();
        g.write_attribute(attr, &mut alloc, &config, 0, b"alice").unwrap();
        let mut out = [0u8; 5];
        g.read_attribute(attr, &alloc, 0, &mut out).unwrap();
        assert_eq!(&out, b"alice");
    }
}
