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

//! `Volume`: the single type that ties the node graph, the index
//! directory, the block allocator and the listener bus together behind one lock
//! hierarchy, and the thing a host VFS shim actually calls into.
//!
//! # Locking
//!
//! Three locks, always acquired in this order when more than one is needed:
//!
//! - `main`: an `RwLock<VolumeState>` guarding the graph, indices, allocator and
//!   listener bus together. Every structural mutation holds this for the whole
//!   operation, since the three steps must appear atomic to any reader.
//! - `iterator_lock`: a `ReentrantMutex<RefCell<IteratorSuspendState>>` guarding the
//!   five [`crate::suspend::SuspendRegistry`] instances a suspended iterator can be
//!   parked in. Only ever taken while `main` is already held.
//! - `query_lock`: a `ReentrantMutex<RefCell<QueryRegistry>>` guarding the open
//!   live-query table. Same rule: nests inside `main` when both are needed.
//!
//! `ReentrantMutex` is used for the inner two because a single call (e.g.
//! `remove_linked_entry`) legitimately re-enters its own lock while walking a
//! multi-step removal; `parking_lot`'s plain `Mutex` would deadlock on that.

use crate::alloc::{AllocationInfo, BlockAllocator};
use crate::config::VolumeConfig;
use crate::error::{Error, Result};
use crate::graph::{Change, Graph, VnodeHooks};
use crate::ids::{now, AttributeId, EntryId, NodeId, Timestamp};
use crate::index::{AttrKey, IndexDirectory};
use crate::iter::{AttributeIterator, EntryIterator, IndexIterator};
use crate::listener::{AttributeChange, ListenerBus, ListenerId};
use crate::node::{AttrType, Credentials, Mode, NodeKind, S_IFMT};
use crate::notify::{AttrChangeKind, Notification, NotificationPort};
use crate::query::{self, Op, Query, QueryIndexSource};
use crate::suspend::{SuspendRegistry, SuspendSlot};
use parking_lot::{ReentrantMutex, RwLock};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How long a cancellable lock wait polls the token between attempts.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// A cooperative cancellation flag for a pending lock acquisition.
/// Scaffolding for a future VFS shim wiring a kernel-side interrupt through to a
/// blocked hook call; no existing `Volume` method is itself cancellable yet — a
/// caller that needs this wraps its own access via [`Volume::with_read_cancellable`]
/// / [`Volume::with_write_cancellable`].
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A directory listing record, or one hit from a query: just enough to let a caller stat or look the node up further.
#[derive(Debug, Clone)]
pub struct DirEntryRecord {
    pub name: String,
    pub node: NodeId,
}

/// The subset of `stat(2)` fields this core tracks.
#[derive(Debug, Clone, Copy)]
pub struct Stat {
    pub id: NodeId,
    pub mode: Mode,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub atime: Timestamp,
    pub mtime: Timestamp,
    pub ctime: Timestamp,
    pub crtime: Timestamp,
    pub ref_count: u32,
}

/// A masked `write_stat` request: only the `Some` fields are applied.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatUpdate {
    pub mode: Option<Mode>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub atime: Option<Timestamp>,
    pub mtime: Option<Timestamp>,
    pub crtime: Option<Timestamp>,
}

/// Volume-level capability flags reported by `read_fs_info`.
pub mod fs_flag {
    /// This volume supports user attributes.
    pub const HAS_ATTR: u32 = 1 << 0;
    /// This volume supports `open_query`/`read_query`.
    pub const HAS_QUERY: u32 = 1 << 1;
}

/// Volume-wide information reported by `read_fs_info`/`write_fs_info`. This core
/// never sets a "persistent" bit: a `Volume` forgets everything on drop.
#[derive(Debug, Clone)]
pub struct FsInfo {
    pub flags: u32,
    pub block_size: u32,
    pub io_size: u32,
    pub total_nodes: u64,
    pub device_name: String,
    pub volume_name: String,
}

/// An opaque handle to an open live or one-shot query.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct QueryCookie(u64);

struct LiveQueryEntry {
    query: Query,
    port: Option<Arc<dyn NotificationPort>>,
    token: i64,
}

#[derive(Default)]
struct QueryRegistry {
    next_cookie: u64,
    queries: HashMap<QueryCookie, LiveQueryEntry>,
}

/// The five [`SuspendRegistry`] families a suspended iterator can belong to.
/// Directory order and name-index order are
/// kept distinct since removing an entry gives each a different successor.
#[derive(Default)]
struct IteratorSuspendState {
    dir_entries: SuspendRegistry<EntryId>,
    name_entries: SuspendRegistry<EntryId>,
    attrs: SuspendRegistry<AttributeId>,
    size_nodes: SuspendRegistry<NodeId>,
    mtime_nodes: SuspendRegistry<NodeId>,
}

/// Everything guarded by `Volume::main`. Opaque outside this
/// module: reachable only through [`Volume::with_read_cancellable`] /
/// [`Volume::with_write_cancellable`], which hand out a borrow without ever
/// letting a caller construct or store one.
pub struct VolumeState {
    graph: Graph,
    indices: IndexDirectory,
    alloc: BlockAllocator,
    listeners: ListenerBus,
}

impl QueryIndexSource for VolumeState {
    fn attr_type(&self, name: &str) -> Option<AttrType> {
        match name {
            "name" => Some(AttrType::String),
            "size" => Some(AttrType::UInt64),
            "last_modified" => Some(AttrType::Int64),
            _ => self.indices.attribute_index(name).map(|i| i.attr_type),
        }
    }

    fn index_size(&self, name: &str) -> Option<usize> {
        match name {
            "name" => Some(self.indices.name_index.count()),
            "size" => Some(self.indices.size_index.count()),
            "last_modified" => Some(self.indices.mtime_index.count()),
            _ => self.indices.attribute_index(name).map(|i| i.count()),
        }
    }

    fn scan(&self, attribute: &str, op: Op, key: &AttrKey) -> Vec<NodeId> {
        match attribute {
            "size" => self
                .indices
                .size_index
                .iter()
                .filter(|n| {
                    let sz = self.graph.node(*n).map(|nd| nd.size() as u64).unwrap_or(0);
                    op.apply(&AttrKey::U64(sz), key)
                })
                .collect(),
            "last_modified" => self
                .indices
                .mtime_index
                .iter()
                .filter(|n| {
                    let mt = self.graph.node(*n).map(|nd| nd.mtime).unwrap_or(0);
                    op.apply(&AttrKey::I64(mt), key)
                })
                .collect(),
            "name" => self
                .graph
                .nodes_iter()
                .filter(|nd| {
                    nd.referrers
                        .first()
                        .and_then(|e| self.graph.entry(*e).ok())
                        .is_some_and(|entry| op.apply(&AttrKey::Bytes(entry.name.clone().into_bytes()), key))
                })
                .map(|nd| nd.id)
                .collect(),
            _ => {
                let Some(index) = self.indices.attribute_index(attribute) else {
                    return Vec::new();
                };
                index
                    .iter()
                    .filter_map(|attr_id| {
                        let attr = self.graph.attribute(attr_id).ok()?;
                        let mut bytes = vec![0u8; attr.container.size()];
                        attr.container.read(&self.alloc, 0, &mut bytes).ok()?;
                        let val = AttrKey::decode(index.attr_type, &bytes).ok()?;
                        op.apply(&val, key).then_some(attr.owner)
                    })
                    .collect()
            }
        }
    }

    fn scan_pattern(&self, attribute: &str, pattern: &str, negate: bool) -> Vec<NodeId> {
        match attribute {
            "name" => self
                .graph
                .nodes_iter()
                .filter(|nd| {
                    nd.referrers
                        .first()
                        .and_then(|e| self.graph.entry(*e).ok())
                        .is_some_and(|entry| query::glob_match(pattern, &entry.name) != negate)
                })
                .map(|nd| nd.id)
                .collect(),
            _ => {
                if !matches!(self.attr_type(attribute), Some(AttrType::String)) {
                    return Vec::new();
                }
                let Some(index) = self.indices.attribute_index(attribute) else {
                    return Vec::new();
                };
                index
                    .iter()
                    .filter_map(|attr_id| {
                        let attr = self.graph.attribute(attr_id).ok()?;
                        let mut bytes = vec![0u8; attr.container.size()];
                        attr.container.read(&self.alloc, 0, &mut bytes).ok()?;
                        let s = String::from_utf8(bytes).ok()?;
                        (query::glob_match(pattern, &s) != negate).then_some(attr.owner)
                    })
                    .collect()
            }
        }
    }
}

/// A mounted in-memory volume. Cheap to construct, nothing it owns
/// survives past `Drop` — there is no on-disk image to flush.
pub struct Volume {
    device_id: u64,
    config: VolumeConfig,
    hooks: Arc<dyn VnodeHooks>,
    volume_name: RwLock<String>,
    main: RwLock<VolumeState>,
    iterator_lock: ReentrantMutex<RefCell<IteratorSuspendState>>,
    query_lock: ReentrantMutex<RefCell<QueryRegistry>>,
}

impl Volume {
    /// Mounts a fresh, empty volume with a freshly created root directory.
    pub fn new(device_id: u64, config: VolumeConfig, hooks: Arc<dyn VnodeHooks>, root_mode: Mode, uid: u32, gid: u32, volume_name: impl Into<String>) -> Self {
        let graph = Graph::new(root_mode, uid, gid, now(), hooks.as_ref());
        log::info!("ramfs: mounted device {device_id}");
        Self {
            device_id,
            config,
            hooks,
            volume_name: RwLock::new(volume_name.into()),
            main: RwLock::new(VolumeState {
                graph,
                indices: IndexDirectory::default(),
                alloc: BlockAllocator::new(config.area_size),
                listeners: ListenerBus::default(),
            }),
            iterator_lock: ReentrantMutex::new(RefCell::new(IteratorSuspendState::default())),
            query_lock: ReentrantMutex::new(RefCell::new(QueryRegistry::default())),
        }
    }

    pub fn device_id(&self) -> u64 {
        self.device_id
    }

    /// Runs `f` against the volume's state under the `main` read lock, polling
    /// `cancel` while waiting so a blocked acquisition can be abandoned without
    /// touching any state.
    pub fn with_read_cancellable<R>(&self, cancel: Option<&CancelToken>, f: impl FnOnce(&VolumeState) -> R) -> Result<R> {
        loop {
            if let Some(c) = cancel {
                if c.is_cancelled() {
                    return Err(Error::Cancelled);
                }
            }
            if let Some(guard) = self.main.try_read_for(CANCEL_POLL_INTERVAL) {
                return Ok(f(&guard));
            }
        }
    }

    /// As [`Self::with_read_cancellable`], but under the `main` write lock.
    pub fn with_write_cancellable<R>(&self, cancel: Option<&CancelToken>, f: impl FnOnce(&mut VolumeState) -> R) -> Result<R> {
        loop {
            if let Some(c) = cancel {
                if c.is_cancelled() {
                    return Err(Error::Cancelled);
                }
            }
            if let Some(mut guard) = self.main.try_write_for(CANCEL_POLL_INTERVAL) {
                return Ok(f(&mut guard));
            }
        }
    }

    pub fn root(&self) -> NodeId {
        self.main.read().graph.root()
    }

    /// Unmounts the volume. A no-op beyond logging: there is nothing to flush.
    pub fn unmount(self) {
        log::info!("ramfs: unmounted device {}", self.device_id);
    }

    /// A no-op, since every byte this core holds is already
    /// "durable" for as long as the process lives.
    pub fn sync(&self) -> Result<()> {
        Ok(())
    }

    pub fn read_fs_info(&self) -> FsInfo {
        let state = self.main.read();
        FsInfo {
            flags: fs_flag::HAS_ATTR | fs_flag::HAS_QUERY,
            block_size: self.config.block_size as u32,
            io_size: self.config.io_size,
            total_nodes: state.graph.node_count() as u64,
            device_name: format!("ramfs{}", self.device_id),
            volume_name: self.volume_name.read().clone(),
        }
    }

    /// Only the volume name is writable.
    pub fn write_fs_info(&self, volume_name: &str) {
        *self.volume_name.write() = volume_name.to_string();
    }

    pub fn allocation_info(&self) -> AllocationInfo {
        self.main.read().alloc.allocation_info()
    }

    // -- Lookup, stat, access ------------------------------------------------

    pub fn lookup(&self, parent: NodeId, name: &str) -> Result<NodeId> {
        self.main.read().graph.find_node(parent, name).ok_or(Error::NotFound)
    }

    /// Resolves `(parent, name)` and takes a published reference in one step.
    pub fn get_vnode(&self, parent: NodeId, name: &str) -> Result<NodeId> {
        self.main.write().graph.find_and_get_node(parent, name, self.hooks.as_ref()).ok_or(Error::NotFound)
    }

    /// Drops a published reference, deleting the node if this was its last one.
    pub fn put_vnode(&self, id: NodeId) -> Result<()> {
        let mut state = self.main.write();
        let removed = state.graph.put(id, &mut state.alloc, self.hooks.as_ref())?;
        if let Some(removed) = removed {
            state.indices.size_index.removed(removed);
            state.indices.mtime_index.removed(removed);
        }
        Ok(())
    }

    pub fn read_stat(&self, node: NodeId) -> Result<Stat> {
        let state = self.main.read();
        let n = state.graph.node(node)?;
        Ok(Stat {
            id: n.id,
            mode: n.mode,
            uid: n.uid,
            gid: n.gid,
            size: n.size() as u64,
            atime: n.atime,
            mtime: n.mtime,
            ctime: n.ctime,
            crtime: n.crtime,
            ref_count: n.ref_count,
        })
    }

    pub fn write_stat(&self, node: NodeId, update: StatUpdate) -> Result<()> {
        let when = now();
        let mut state = self.main.write();
        let pre = self.snapshot_matches(&state, node);
        let mut mask = 0u32;
        {
            let n = state.graph.node_mut(node)?;
            if let Some(m) = update.mode {
                n.mode = (n.mode & S_IFMT) | (m & !S_IFMT);
                mask |= crate::node::stat_flag::MODE;
            }
            if let Some(uid) = update.uid {
                n.uid = uid;
                mask |= crate::node::stat_flag::UID;
            }
            if let Some(gid) = update.gid {
                n.gid = gid;
                mask |= crate::node::stat_flag::GID;
            }
            if let Some(a) = update.atime {
                n.atime = a;
                mask |= crate::node::stat_flag::ATIME;
            }
            if let Some(m) = update.mtime {
                n.mtime = m;
                mask |= crate::node::stat_flag::MTIME;
            }
            if let Some(c) = update.crtime {
                n.crtime = c;
                mask |= crate::node::stat_flag::CRTIME;
            }
            n.ctime = when;
            n.modified_flags |= mask;
        }
        if mask & crate::node::stat_flag::MTIME != 0 {
            let new_mtime = state.graph.node(node)?.mtime;
            state.indices.mtime_index.changed(node, new_mtime);
        }
        if mask != 0 {
            state.listeners.fire_stat_changed(node, mask);
        }
        self.notify_field_changed(&pre, &state, node);
        Ok(())
    }

    pub fn access(&self, node: NodeId, requested: Mode, creds: &Credentials) -> Result<()> {
        let state = self.main.read();
        if state.graph.node(node)?.check_permissions(requested, creds) {
            Ok(())
        } else {
            Err(Error::NotAllowed)
        }
    }

    // -- Directory/file/symlink lifecycle ------------------------------------

    pub fn create_dir(&self, parent: NodeId, name: &str, mode: Mode, uid: u32, gid: u32) -> Result<NodeId> {
        let when = now();
        let mut state = self.main.write();
        let (id, entry_id) = state.graph.create_dir(parent, name, mode, uid, gid, when, self.hooks.as_ref())?;
        self.on_node_and_entry_created(&mut state, id, entry_id, when);
        self.notify_created(&state, id, parent, name);
        Ok(id)
    }

    pub fn create_file(&self, parent: NodeId, name: &str, mode: Mode, uid: u32, gid: u32) -> Result<NodeId> {
        let when = now();
        let mut state = self.main.write();
        let (id, entry_id) = state.graph.create_file(parent, name, mode, uid, gid, when, self.hooks.as_ref())?;
        self.on_node_and_entry_created(&mut state, id, entry_id, when);
        self.notify_created(&state, id, parent, name);
        Ok(id)
    }

    pub fn create_symlink(&self, parent: NodeId, name: &str, target: &str, uid: u32, gid: u32) -> Result<NodeId> {
        let when = now();
        let mut state = self.main.write();
        let (id, entry_id) = state.graph.create_symlink(parent, name, target, uid, gid, when, self.hooks.as_ref())?;
        self.on_node_and_entry_created(&mut state, id, entry_id, when);
        self.notify_created(&state, id, parent, name);
        Ok(id)
    }

    fn on_node_and_entry_created(&self, state: &mut VolumeState, id: NodeId, entry_id: EntryId, when: Timestamp) {
        let size = state.graph.node(id).map(|n| n.size() as u64).unwrap_or(0);
        state.indices.size_index.added(id, size);
        state.indices.mtime_index.added(id, when);
        state.indices.name_index.added(entry_id, &state.graph.entry(entry_id).expect("just linked").name.clone());
    }

    pub fn read_symlink(&self, node: NodeId) -> Result<String> {
        let state = self.main.read();
        match &state.graph.node(node)?.kind {
            NodeKind::SymLink { target } => Ok(target.clone()),
            _ => Err(Error::BadValue),
        }
    }

    /// Hard-links `target` under `(parent, name)`.
    pub fn link(&self, target: NodeId, parent: NodeId, name: &str) -> Result<()> {
        let mut state = self.main.write();
        let entry_id = state.graph.add_entry(parent, name, target)?;
        state.indices.name_index.added(entry_id, name);
        self.notify_created(&state, target, parent, name);
        Ok(())
    }

    pub fn unlink(&self, parent: NodeId, name: &str) -> Result<()> {
        let mut state = self.main.write();
        let entry_id = state.graph.find_entry(parent, name).ok_or(Error::NotFound)?;
        let target = state.graph.entry(entry_id)?.target;
        if state.graph.node(target)?.is_dir() {
            return Err(Error::IsADirectory);
        }
        self.remove_linked_entry(&mut state, entry_id, parent, name, target)
    }

    pub fn rmdir(&self, parent: NodeId, name: &str) -> Result<()> {
        let mut state = self.main.write();
        let entry_id = state.graph.find_entry(parent, name).ok_or(Error::NotFound)?;
        let target = state.graph.entry(entry_id)?.target;
        let node = state.graph.node(target)?;
        if !node.is_dir() {
            return Err(Error::NotADirectory);
        }
        if !node.children().unwrap_or(&[]).is_empty() {
            return Err(Error::DirectoryNotEmpty);
        }
        self.remove_linked_entry(&mut state, entry_id, parent, name, target)
    }

    /// Common tail of `unlink`/`rmdir`: unlinks `entry_id`, maintains indices,
    /// advances any iterator suspended on the removed entry/node, and fires
    /// listener + live-query notifications.
    fn remove_linked_entry(&self, state: &mut VolumeState, entry_id: EntryId, parent: NodeId, name: &str, target: NodeId) -> Result<()> {
        let pre = self.snapshot_matches(state, target);
        let dir_succ = Self::children_successor(state, entry_id, parent);
        let name_succ = state.indices.name_index.successor(entry_id);
        let size_succ = state.indices.size_index.successor(target);
        let mtime_succ = state.indices.mtime_index.successor(target);

        let changes = state.graph.delete_entry(entry_id, &mut state.alloc, self.hooks.as_ref())?;

        let mut node_removed = false;
        for change in &changes {
            match change {
                Change::EntryRemoved(id) => state.indices.name_index.removed(*id),
                Change::NodeRemoved(id) => {
                    state.indices.size_index.removed(*id);
                    state.indices.mtime_index.removed(*id);
                    node_removed = true;
                }
                _ => {}
            }
        }

        {
            let guard = self.iterator_lock.lock();
            let mut it_state = guard.borrow_mut();
            it_state.dir_entries.on_removed(entry_id, dir_succ);
            it_state.name_entries.on_removed(entry_id, name_succ);
            if node_removed {
                it_state.size_nodes.on_removed(target, size_succ);
                it_state.mtime_nodes.on_removed(target, mtime_succ);
            }
        }

        self.notify_removed_from_snapshot(&pre, parent, name, target);
        Ok(())
    }

    fn children_successor(state: &VolumeState, entry_id: EntryId, parent: NodeId) -> Option<EntryId> {
        let children = state.graph.node(parent).ok()?.children()?;
        let pos = children.iter().position(|e| *e == entry_id)?;
        children.get(pos + 1).copied()
    }

    fn attrs_successor(state: &VolumeState, owner: NodeId, attr: AttributeId) -> Option<AttributeId> {
        let node = state.graph.node(owner).ok()?;
        let pos = node.attributes.iter().position(|a| *a == attr)?;
        node.attributes.get(pos + 1).copied()
    }

    /// Relies on [`Graph::rename`] for the link/unlink
    /// dance itself and only drives indices, suspended iterators and live queries
    /// off the [`Change`] list it returns.
    pub fn rename(&self, src_parent: NodeId, src_name: &str, dst_parent: NodeId, dst_name: &str) -> Result<()> {
        let mut state = self.main.write();
        let target = state.graph.find_node(src_parent, src_name).ok_or(Error::NotFound)?;
        let pre = self.snapshot_matches(&state, target);
        let src_entry_id = state.graph.find_entry(src_parent, src_name);
        let replaced = state.graph.find_node(dst_parent, dst_name).filter(|t| *t != target);
        let replaced_pre = replaced.map(|t| (t, self.snapshot_matches(&state, t)));
        let dir_succ = src_entry_id.and_then(|e| Self::children_successor(&state, e, src_parent));
        let name_succ = src_entry_id.and_then(|e| state.indices.name_index.successor(e));

        let changes = state.graph.rename(src_parent, src_name, dst_parent, dst_name, &mut state.alloc, self.hooks.as_ref())?;

        for change in &changes {
            match change {
                Change::EntryAdded(id) => {
                    if let Ok(entry) = state.graph.entry(*id) {
                        state.indices.name_index.added(*id, &entry.name.clone());
                    }
                }
                Change::EntryRemoved(id) => state.indices.name_index.removed(*id),
                Change::NodeRemoved(id) => {
                    state.indices.size_index.removed(*id);
                    state.indices.mtime_index.removed(*id);
                }
                _ => {}
            }
        }

        if let (Some(entry_id), true) = (src_entry_id, changes.iter().any(|c| matches!(c, Change::EntryRemoved(id) if *id == entry_id))) {
            let guard = self.iterator_lock.lock();
            let mut it_state = guard.borrow_mut();
            it_state.dir_entries.on_removed(entry_id, dir_succ);
            it_state.name_entries.on_removed(entry_id, name_succ);
        }

        if let Some((replaced_target, replaced_pre)) = replaced_pre {
            if changes.iter().any(|c| matches!(c, Change::NodeRemoved(id) if *id == replaced_target)) {
                self.notify_removed_from_snapshot(&replaced_pre, dst_parent, dst_name, replaced_target);
            }
        }

        let name_changed = src_name != dst_name || src_parent != dst_parent;
        self.notify_renamed(&pre, &state, target, dst_parent, dst_name, name_changed);
        Ok(())
    }

    // -- File data ------------------------------------------------------------

    pub fn read(&self, node: NodeId, offset: usize, buf: &mut [u8]) -> Result<usize> {
        let state = self.main.read();
        let n = state.graph.node(node)?;
        let NodeKind::File { data } = &n.kind else { return Err(Error::IsADirectory) };
        data.read(&state.alloc, offset, buf)
    }

    pub fn write(&self, node: NodeId, offset: usize, buf: &[u8]) -> Result<usize> {
        let when = now();
        let mut state = self.main.write();
        let pre = self.snapshot_matches(&state, node);
        let old_size;
        let new_size;
        {
            let n = state.graph.node_mut(node)?;
            let NodeKind::File { data } = &mut n.kind else { return Err(Error::IsADirectory) };
            old_size = data.size() as u64;
            data.write(&mut state.alloc, &self.config, offset, buf)?;
            new_size = data.size() as u64;
            n.mtime = when;
            n.modified_flags |= crate::node::stat_flag::SIZE | crate::node::stat_flag::MTIME;
        }
        if new_size != old_size {
            state.indices.size_index.changed(node, new_size);
        }
        state.indices.mtime_index.changed(node, when);
        state.listeners.fire_stat_changed(node, crate::node::stat_flag::SIZE | crate::node::stat_flag::MTIME);
        self.notify_field_changed(&pre, &state, node);
        Ok(buf.len())
    }

    pub fn truncate(&self, node: NodeId, new_size: usize) -> Result<()> {
        let when = now();
        let mut state = self.main.write();
        let pre = self.snapshot_matches(&state, node);
        {
            let n = state.graph.node_mut(node)?;
            let NodeKind::File { data } = &mut n.kind else { return Err(Error::IsADirectory) };
            data.resize(&mut state.alloc, &self.config, new_size)?;
            n.mtime = when;
            n.modified_flags |= crate::node::stat_flag::SIZE | crate::node::stat_flag::MTIME;
        }
        state.indices.size_index.changed(node, new_size as u64);
        state.indices.mtime_index.changed(node, when);
        state.listeners.fire_stat_changed(node, crate::node::stat_flag::SIZE | crate::node::stat_flag::MTIME);
        self.notify_field_changed(&pre, &state, node);
        Ok(())
    }

    // -- Directory iteration --------------------------------------------------

    fn dir_dotdot(state: &VolumeState, dir: NodeId) -> NodeId {
        let Ok(node) = state.graph.node(dir) else { return dir };
        match node.referrers.first() {
            Some(entry_id) => state.graph.entry(*entry_id).map(|e| e.parent).unwrap_or(dir),
            None => dir,
        }
    }

    pub fn read_dir_next(&self, it: &mut EntryIterator) -> Result<Option<DirEntryRecord>> {
        let state = self.main.read();
        let dir = it.directory();
        let children_ids = state.graph.node(dir)?.children().ok_or(Error::NotADirectory)?;
        let mut children = Vec::with_capacity(children_ids.len());
        for id in children_ids {
            let e = state.graph.entry(*id)?;
            children.push((*id, e.name.clone(), e.target));
        }
        let dotdot = Self::dir_dotdot(&state, dir);
        Ok(it.get_next(dir, dotdot, &children).map(|(name, node)| DirEntryRecord { name, node }))
    }

    pub fn suspend_dir_iterator(&self, it: &mut EntryIterator) -> Option<(EntryId, SuspendSlot<EntryId>)> {
        let key = it.current()?;
        let guard = self.iterator_lock.lock();
        let slot = it.suspend(&mut guard.borrow_mut().dir_entries)?;
        Some((key, slot))
    }

    pub fn resume_dir_iterator(&self, it: &mut EntryIterator, key_hint: EntryId, slot: SuspendSlot<EntryId>) {
        let guard = self.iterator_lock.lock();
        it.resume(&mut guard.borrow_mut().dir_entries, key_hint, slot);
    }

    // -- Attributes ------------------------------------------------------------

    pub fn create_attribute(&self, owner: NodeId, name: &str, attr_type: AttrType) -> Result<AttributeId> {
        let mut state = self.main.write();
        let id = state.graph.create_attribute(owner, name, attr_type)?;
        let attr = state.graph.attribute(id)?.clone();
        state.listeners.fire_attribute_changed(owner, &attr, AttributeChange::Created);
        self.notify_field_changed(&[], &state, owner);
        Ok(id)
    }

    pub fn write_attribute(&self, id: AttributeId, offset: usize, buf: &[u8]) -> Result<()> {
        let mut state = self.main.write();
        let attr_owner = state.graph.attribute(id)?.owner;
        let pre = self.snapshot_matches(&state, attr_owner);
        let bytes = state.graph.write_attribute(id, &mut state.alloc, &self.config, offset, buf)?;
        let attr = state.graph.attribute(id)?.clone();
        state.indices.reindex_attribute(id, &attr.name, &bytes)?;
        state.listeners.fire_attribute_changed(attr.owner, &attr, AttributeChange::Changed);
        self.notify_field_changed(&pre, &state, attr_owner);
        Ok(())
    }

    pub fn read_attribute(&self, id: AttributeId, offset: usize, buf: &mut [u8]) -> Result<usize> {
        let state = self.main.read();
        state.graph.read_attribute(id, &state.alloc, offset, buf)
    }

    pub fn remove_attribute(&self, owner: NodeId, name: &str) -> Result<()> {
        let mut state = self.main.write();
        let id = state.graph.find_attribute(owner, name).ok_or(Error::NotFound)?;
        let pre = self.snapshot_matches(&state, owner);
        let succ = Self::attrs_successor(&state, owner, id);
        let attr = state.graph.remove_attribute(owner, name, &mut state.alloc)?;
        state.indices.drop_attribute_from(name, attr.id);
        {
            let guard = self.iterator_lock.lock();
            guard.borrow_mut().attrs.on_removed(id, succ);
        }
        state.listeners.fire_attribute_changed(owner, &attr, AttributeChange::Removed);
        self.notify_field_changed(&pre, &state, owner);
        Ok(())
    }

    /// Stubbed: renaming an attribute is an Open Question this crate leaves
    /// unresolved.
    pub fn rename_attribute(&self, owner: NodeId, old: &str, new: &str) -> Result<()> {
        self.main.write().graph.rename_attribute(owner, old, new)
    }

    pub fn read_attrs_next(&self, it: &mut AttributeIterator) -> Result<Option<AttributeId>> {
        let state = self.main.read();
        let node = state.graph.node(it.owner())?;
        Ok(it.get_next(&node.attributes))
    }

    pub fn suspend_attr_iterator(&self, it: &mut AttributeIterator) -> Option<(AttributeId, SuspendSlot<AttributeId>)> {
        let key = it.current()?;
        let guard = self.iterator_lock.lock();
        let slot = it.suspend(&mut guard.borrow_mut().attrs)?;
        Some((key, slot))
    }

    pub fn resume_attr_iterator(&self, it: &mut AttributeIterator, key_hint: AttributeId, slot: SuspendSlot<AttributeId>) {
        let guard = self.iterator_lock.lock();
        it.resume(&mut guard.borrow_mut().attrs, key_hint, slot);
    }

    // -- Attribute/stat change notification ports --------------------------------

    /// Subscribes `port` to every `attribute_changed` broadcast on the volume,
    /// tagged with `token`. Returns a handle for [`Self::unsubscribe_attribute_changed`].
    pub fn subscribe_attribute_changed(&self, port: Arc<dyn NotificationPort>, token: i64) -> ListenerId {
        let device_id = self.device_id;
        self.main.write().listeners.on_attribute_changed(Box::new(move |owner, attr, change| {
            let kind = match change {
                AttributeChange::Created => AttrChangeKind::Created,
                AttributeChange::Changed => AttrChangeKind::Changed,
                AttributeChange::Removed => AttrChangeKind::Removed,
            };
            port.send(Notification::AttributeChanged { device: device_id, node: owner, name: attr.name.clone(), kind }, token);
        }))
    }

    pub fn unsubscribe_attribute_changed(&self, id: ListenerId) {
        self.main.write().listeners.remove_attribute_listener(id);
    }

    /// Subscribes `port` to every `stat_changed` broadcast on the volume, tagged
    /// with `token`. Returns a handle for [`Self::unsubscribe_stat_changed`].
    pub fn subscribe_stat_changed(&self, port: Arc<dyn NotificationPort>, token: i64) -> ListenerId {
        let device_id = self.device_id;
        self.main.write().listeners.on_stat_changed(Box::new(move |node, fields_mask| {
            port.send(Notification::StatChanged { device: device_id, node, fields_mask }, token);
        }))
    }

    pub fn unsubscribe_stat_changed(&self, id: ListenerId) {
        self.main.write().listeners.remove_stat_listener(id);
    }

    // -- Index directory --------------------------------------------------------

    pub fn create_index(&self, name: &str, attr_type: AttrType) -> Result<()> {
        self.main.write().indices.create_index(name, attr_type)
    }

    pub fn remove_index(&self, name: &str) -> Result<()> {
        self.main.write().indices.remove_index(name)
    }

    /// Lists every user-defined attribute index name (`open_index_dir`/
    /// `read_index_dir`). The built-in `name`/`size`/`last_modified` indices always
    /// exist and are not included.
    pub fn index_names(&self) -> Vec<String> {
        self.main.read().indices.index_names().map(str::to_string).collect()
    }

    /// Reports an attribute index's declared type and fixed key length, if any
    /// (`read_index_stat`).
    pub fn index_stat(&self, name: &str) -> Result<(AttrType, Option<usize>)> {
        let state = self.main.read();
        let index = state.indices.attribute_index(name).ok_or(Error::NotFound)?;
        Ok((index.attr_type, AttrKey::fixed_len(index.attr_type)))
    }

    /// Dumps every attribute id currently held in the named attribute index, in
    /// key order.
    pub fn dump_index(&self, name: &str) -> Result<Vec<AttributeId>> {
        let state = self.main.read();
        let index = state.indices.attribute_index(name).ok_or(Error::NotFound)?;
        Ok(index.iter().collect())
    }

    pub fn index_size_next(&self, it: &mut IndexIterator<NodeId>) -> Option<NodeId> {
        let state = self.main.read();
        it.get_next(|| state.indices.size_index.first(), |k| state.indices.size_index.successor(k))
    }

    pub fn index_mtime_next(&self, it: &mut IndexIterator<NodeId>) -> Option<NodeId> {
        let state = self.main.read();
        it.get_next(|| state.indices.mtime_index.first(), |k| state.indices.mtime_index.successor(k))
    }

    pub fn index_name_next(&self, it: &mut IndexIterator<EntryId>) -> Option<EntryId> {
        let state = self.main.read();
        it.get_next(|| state.indices.name_index.first(), |k| state.indices.name_index.successor(k))
    }

    // -- Live/one-shot queries ----------------------------------------------------

    /// Compiles and eagerly evaluates `expr`; `port`
    /// (if given) receives `EntryCreated`/`EntryRemoved` messages as the volume
    /// mutates, tagged with `token`, as long as `live` is set.
    pub fn open_query(&self, expr: &str, live: bool, port: Option<Arc<dyn NotificationPort>>, token: i64) -> Result<QueryCookie> {
        let state = self.main.read();
        let mut query = Query::compile(expr, &*state).map_err(|_| Error::BadValue)?;
        query.set_live(live);
        drop(state);
        let guard = self.query_lock.lock();
        let mut reg = guard.borrow_mut();
        reg.next_cookie += 1;
        let cookie = QueryCookie(reg.next_cookie);
        reg.queries.insert(cookie, LiveQueryEntry { query, port, token });
        Ok(cookie)
    }

    pub fn read_query(&self, cookie: QueryCookie, max: usize) -> Result<Vec<DirEntryRecord>> {
        let state = self.main.read();
        let guard = self.query_lock.lock();
        let mut reg = guard.borrow_mut();
        let entry = reg.queries.get_mut(&cookie).ok_or(Error::NotFound)?;
        let mut out = Vec::new();
        while out.len() < max {
            let Some(node) = entry.query.get_next_entry() else { break };
            if let Some((_, name)) = self.dirent_for(&state, node) {
                out.push(DirEntryRecord { name, node });
            }
        }
        Ok(out)
    }

    pub fn rewind_query(&self, cookie: QueryCookie) -> Result<()> {
        let guard = self.query_lock.lock();
        let mut reg = guard.borrow_mut();
        reg.queries.get_mut(&cookie).ok_or(Error::NotFound)?.query.rewind();
        Ok(())
    }

    pub fn close_query(&self, cookie: QueryCookie) -> Result<()> {
        let guard = self.query_lock.lock();
        guard.borrow_mut().queries.remove(&cookie).ok_or(Error::NotFound)?;
        Ok(())
    }

    // -- Live-query notification helpers -----------------------------------------

    fn dirent_for(&self, state: &VolumeState, node: NodeId) -> Option<(NodeId, String)> {
        let n = state.graph.node(node).ok()?;
        let entry_id = *n.referrers.first()?;
        let entry = state.graph.entry(entry_id).ok()?;
        Some((entry.parent, entry.name.clone()))
    }

    /// Snapshots, for every open live query, whether `node` currently matches its
    /// term. Must be called *before* the mutation whose effect the caller wants to
    /// compare against.
    fn snapshot_matches(&self, state: &VolumeState, node: NodeId) -> Vec<(QueryCookie, bool)> {
        let guard = self.query_lock.lock();
        let reg = guard.borrow();
        reg.queries
            .iter()
            .filter(|(_, e)| e.query.is_live())
            .map(|(c, e)| (*c, query::term_matches(e.query.term(), node, state)))
            .collect()
    }

    fn deliver(&self, entry: &LiveQueryEntry, outcome: query::LiveUpdate, parent: NodeId, name: &str, node: NodeId) {
        use query::LiveUpdate;
        let Some(port) = &entry.port else { return };
        match outcome {
            LiveUpdate::Created => port.send(Notification::EntryCreated { device: self.device_id, parent, name: name.to_string(), node }, entry.token),
            LiveUpdate::Removed => port.send(Notification::EntryRemoved { device: self.device_id, parent, name: name.to_string(), node }, entry.token),
            LiveUpdate::Replaced => {
                port.send(Notification::EntryRemoved { device: self.device_id, parent, name: name.to_string(), node }, entry.token);
                port.send(Notification::EntryCreated { device: self.device_id, parent, name: name.to_string(), node }, entry.token);
            }
            LiveUpdate::None => {}
        }
    }

    /// A node was just created (`old_matches` is false by construction).
    fn notify_created(&self, state: &VolumeState, node: NodeId, parent: NodeId, name: &str) {
        let guard = self.query_lock.lock();
        let mut reg = guard.borrow_mut();
        for entry in reg.queries.values_mut() {
            if !entry.query.is_live() {
                continue;
            }
            let matches = query::term_matches(entry.query.term(), node, state);
            let outcome = entry.query.live_update(node, false, matches, false);
            self.deliver(entry, outcome, parent, name, node);
        }
    }

    /// A node/entry is gone for good; `pre` is the match snapshot taken before the
    /// removal (`new_matches` is false by construction since the node no longer
    /// resolves).
    fn notify_removed_from_snapshot(&self, pre: &[(QueryCookie, bool)], parent: NodeId, name: &str, node: NodeId) {
        let guard = self.query_lock.lock();
        let mut reg = guard.borrow_mut();
        for (cookie, old_matches) in pre {
            let Some(entry) = reg.queries.get_mut(cookie) else { continue };
            let outcome = entry.query.live_update(node, *old_matches, false, false);
            self.deliver(entry, outcome, parent, name, node);
        }
    }

    /// A field changed on a node that keeps its identity and name.
    fn notify_field_changed(&self, pre: &[(QueryCookie, bool)], state: &VolumeState, node: NodeId) {
        let Some((parent, name)) = self.dirent_for(state, node) else { return };
        let guard = self.query_lock.lock();
        let mut reg = guard.borrow_mut();
        for (cookie, old_matches) in pre {
            let Some(entry) = reg.queries.get_mut(cookie) else { continue };
            let new_matches = query::term_matches(entry.query.term(), node, state);
            let outcome = entry.query.live_update(node, *old_matches, new_matches, false);
            self.deliver(entry, outcome, parent, &name, node);
        }
    }

    /// The node's name (and/or parent) just changed.
    fn notify_renamed(&self, pre: &[(QueryCookie, bool)], state: &VolumeState, node: NodeId, parent: NodeId, name: &str, name_changed: bool) {
        let guard = self.query_lock.lock();
        let mut reg = guard.borrow_mut();
        for (cookie, old_matches) in pre {
            let Some(entry) = reg.queries.get_mut(cookie) else { continue };
            let new_matches = query::term_matches(entry.query.term(), node, state);
            let outcome = entry.query.live_update(node, *old_matches, new_matches, name_changed);
            self.deliver(entry, outcome, parent, name, node);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NullHooks;
    use crate::notify::RecordingPort;

    fn volume() -> Volume {
        Volume::new(1, VolumeConfig::default(), Arc::new(NullHooks), 0o755, 0, 0, "test")
    }

    #[test]
    fn mkdir_then_touch_and_read_dir_synthesizes_dots() {
        let v = volume();
        let root = v.root();
        let a = v.create_dir(root, "a", 0o755, 0, 0).unwrap();
        v.create_file(a, "b", 0o644, 0, 0).unwrap();

        let mut it = EntryIterator::new(a);
        let mut names = Vec::new();
        while let Some(rec) = v.read_dir_next(&mut it).unwrap() {
            names.push(rec.name);
        }
        assert_eq!(names, vec![".", "..", "b"]);
    }

    #[test]
    fn write_then_stat_then_read_round_trips() {
        let v = volume();
        let root = v.root();
        let f = v.create_file(root, "f", 0o644, 0, 0).unwrap();
        v.write(f, 0, b"hello").unwrap();
        let stat = v.read_stat(f).unwrap();
        assert_eq!(stat.size, 5);
        let mut out = [0u8; 5];
        v.read(f, 0, &mut out).unwrap();
        assert_eq!(&out, b"hello");
    }

    #[test]
    fn live_query_size_transition_fires_created_not_on_small_write() {
        let v = volume();
        let root = v.root();
        let f = v.create_file(root, "big", 0o644, 0, 0).unwrap();
        let port = Arc::new(RecordingPort::new());
        let cookie = v.open_query("size > 100", true, Some(port.clone() as Arc<dyn NotificationPort>), 42).unwrap();

        v.write(f, 0, b"small").unwrap();
        assert!(port.drain().is_empty());

        v.write(f, 0, &vec![0u8; 200]).unwrap();
        let sent = port.drain();
        assert_eq!(sent.len(), 1);
        assert!(matches!(sent[0].0, Notification::EntryCreated { node, .. } if node == f));
        assert_eq!(sent[0].1, 42);

        v.close_query(cookie).unwrap();
    }

    #[test]
    fn rename_with_suspended_iterator_resumes_past_renamed_entry() {
        let v = volume();
        let root = v.root();
        let dir = v.create_dir(root, "d", 0o755, 0, 0).unwrap();
        v.create_file(dir, "a", 0o644, 0, 0).unwrap();
        v.create_file(dir, "b", 0o644, 0, 0).unwrap();

        let mut it = EntryIterator::new(dir);
        v.read_dir_next(&mut it).unwrap(); // .
        v.read_dir_next(&mut it).unwrap(); // ..
        v.read_dir_next(&mut it).unwrap(); // a

        let (key_hint, slot) = v.suspend_dir_iterator(&mut it).unwrap();
        v.rename(dir, "a", root, "a-moved").unwrap();
        v.resume_dir_iterator(&mut it, key_hint, slot);

        let next = v.read_dir_next(&mut it).unwrap().unwrap();
        assert_eq!(next.name, "b");
    }

    #[test]
    fn allocation_info_reports_used_area_after_large_write() {
        let v = volume();
        let root = v.root();
        let f = v.create_file(root, "f", 0o644, 0, 0).unwrap();
        v.write(f, 0, &vec![7u8; 10_000]).unwrap();
        let info = v.allocation_info();
        assert!(info.used_bytes > 0);
        assert!(!info.areas.is_empty());
    }

    #[test]
    fn attribute_index_query_finds_matching_owner() {
        let v = volume();
        let root = v.root();
        let f = v.create_file(root, "f", 0o644, 0, 0).unwrap();
        v.create_index("score", AttrType::Int32).unwrap();
        let attr = v.create_attribute(f, "score", AttrType::Int32).unwrap();
        v.write_attribute(attr, 0, &42i32.to_le_bytes()).unwrap();

        let cookie = v.open_query("score > 10", false, None, 0).unwrap();
        let hits = v.read_query(cookie, 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].node, f);
    }

    #[test]
    fn index_dir_lists_and_describes_user_indices() {
        let v = volume();
        v.create_index("score", AttrType::Int32).unwrap();
        assert_eq!(v.index_names(), vec!["score".to_string()]);
        let (attr_type, fixed_len) = v.index_stat("score").unwrap();
        assert_eq!(attr_type, AttrType::Int32);
        assert_eq!(fixed_len, Some(4));

        v.remove_index("score").unwrap();
        assert!(v.index_names().is_empty());
        assert_eq!(v.index_stat("score"), Err(Error::NotFound));
    }

    #[test]
    fn rmdir_on_nonempty_directory_is_rejected() {
        let v = volume();
        let root = v.root();
        let dir = v.create_dir(root, "d", 0o755, 0, 0).unwrap();
        v.create_file(dir, "child", 0o644, 0, 0).unwrap();
        let err = v.rmdir(root, "d").unwrap_err();
        assert_eq!(err, Error::DirectoryNotEmpty);
    }

    #[test]
    fn unlink_removes_entry_and_deletes_unreferenced_node() {
        let v = volume();
        let root = v.root();
        let f = v.create_file(root, "f", 0o644, 0, 0).unwrap();
        v.unlink(root, "f").unwrap();
        assert_eq!(v.lookup(root, "f"), Err(Error::NotFound));
        assert!(v.read_stat(f).is_err());
    }

    #[test]
    fn range_query_over_ten_thousand_files_returns_exactly_one_hundred_in_size_order() {
        let v = volume();
        let root = v.root();
        for i in 0..10_000u32 {
            let f = v.create_file(root, &format!("f{i}"), 0o644, 0, 0).unwrap();
            v.write(f, 0, &vec![0u8; (i % 500) as usize]).unwrap();
        }

        let cookie = v.open_query("size >= 100 && size < 200", false, None, 0).unwrap();
        let hits = v.read_query(cookie, 100).unwrap();
        assert_eq!(hits.len(), 100);

        let mut last_size = None;
        for hit in &hits {
            let sz = v.read_stat(hit.node).unwrap().size;
            assert!((100..200).contains(&sz));
            if let Some(prev) = last_size {
                assert!(sz >= prev);
            }
            last_size = Some(sz);
        }
    }

    #[test]
    fn cancelled_token_short_circuits_before_blocking() {
        let v = volume();
        let token = CancelToken::new();
        token.cancel();
        let err = v.with_read_cancellable(Some(&token), |_state| 1u32).unwrap_err();
        assert_eq!(err, Error::Cancelled);
    }

    #[test]
    fn attribute_rewrite_removes_live_match_without_recreate() {
        let v = volume();
        let root = v.root();
        let dir = v.create_dir(root, "a", 0o755, 0, 0).unwrap();
        let f = v.create_file(dir, "b", 0o644, 0, 0).unwrap();
        v.create_index("MAIL:from", AttrType::String).unwrap();
        let attr = v.create_attribute(f, "MAIL:from", AttrType::String).unwrap();
        v.write_attribute(attr, 0, b"alice").unwrap();

        let port = Arc::new(RecordingPort::new());
        let cookie = v.open_query("MAIL:from == \"alice\"", true, Some(port.clone() as Arc<dyn NotificationPort>), 7).unwrap();
        assert!(port.drain().is_empty());

        v.write_attribute(attr, 0, b"bob__").unwrap();
        let sent = port.drain();
        assert_eq!(sent.len(), 1);
        match &sent[0].0 {
            Notification::EntryRemoved { parent, name, node, .. } => {
                assert_eq!(*parent, dir);
                assert_eq!(name, "b");
                assert_eq!(*node, f);
            }
            other => panic!("expected EntryRemoved, got {other:?}"),
        }
        v.close_query(cookie).unwrap();
    }

    #[test]
    fn stat_changed_port_receives_mask_on_write() {
        let v = volume();
        let root = v.root();
        let f = v.create_file(root, "f", 0o644, 0, 0).unwrap();
        let port = Arc::new(RecordingPort::new());
        let id = v.subscribe_stat_changed(port.clone() as Arc<dyn NotificationPort>, 99);

        v.write(f, 0, b"hello").unwrap();
        let sent = port.drain();
        assert_eq!(sent.len(), 1);
        match &sent[0].0 {
            Notification::StatChanged { node, fields_mask, .. } => {
                assert_eq!(*node, f);
                assert_eq!(*fields_mask, crate::node::stat_flag::SIZE | crate::node::stat_flag::MTIME);
            }
            other => panic!("expected StatChanged, got {other:?}"),
        }
        assert_eq!(sent[0].1, 99);

        v.unsubscribe_stat_changed(id);
        v.write(f, 0, b"world").unwrap();
        assert!(port.drain().is_empty());
    }

    #[test]
    fn attribute_changed_port_receives_created_then_removed() {
        let v = volume();
        let root = v.root();
        let f = v.create_file(root, "f", 0o644, 0, 0).unwrap();
        let port = Arc::new(RecordingPort::new());
        v.subscribe_attribute_changed(port.clone() as Arc<dyn NotificationPort>, 1);

        let attr = v.create_attribute(f, "MAIL:from", AttrType::String).unwrap();
        v.write_attribute(attr, 0, b"alice").unwrap();
        v.remove_attribute(f, "MAIL:from").unwrap();

        let sent = port.drain();
        assert_eq!(sent.len(), 3);
        let kinds: Vec<AttrChangeKind> = sent
            .iter()
            .map(|(n, _)| match n {
                Notification::AttributeChanged { kind, .. } => *kind,
                other => panic!("expected AttributeChanged, got {other:?}"),
            })
            .collect();
        assert_eq!(kinds, vec![AttrChangeKind::Created, AttrChangeKind::Changed, AttrChangeKind::Removed]);
    }
}
