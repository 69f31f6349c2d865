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

//! The index subsystem: the three built-in indices (name, size,
//! last-modified) plus user-defined attribute indices, all wrapping the two-key
//! [`crate::tree::Tree`].
//!
//! None of these indices subscribe to `crate::listener::ListenerBus` directly (see
//! `DESIGN.md`, "listener wiring"): `Volume` holds both the [`crate::graph::Graph`]
//! and [`IndexDirectory`] behind the same `main` lock, so it simply calls the
//! `on_*` methods below right after the graph mutation that produced the change,
//! in the fixed order table update, then index update, then
//! notification fan-out. This keeps the two-key map the single source of ordering
//! truth instead of routing through a dynamic dispatch layer for a relationship
//! that is always 1:1 within one volume.

use crate::config::MAX_INDEX_KEY_LEN;
use crate::error::{Error, Result};
use crate::ids::{AttributeId, EntryId, NodeId, Timestamp};
use crate::node::AttrType;
use crate::tree::{Tree, TreeIndex};
use std::cmp::Ordering;
use std::collections::HashMap;

/// A normalized attribute value used as an [`AttributeIndex`] key. Comparisons use
/// native arithmetic for numeric types and length-tie-broken bytewise `memcmp` for
/// strings — which is exactly what `Vec<u8>`
/// `Ord` already does, so the `Bytes` variant needs no hand-written comparator.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrKey {
    Bytes(Vec<u8>),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
}

impl Eq for AttrKey {}

impl PartialOrd for AttrKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AttrKey {
    fn cmp(&self, other: &Self) -> Ordering {
        use AttrKey::*;
        match (self, other) {
            (Bytes(a), Bytes(b)) => a.cmp(b),
            (I32(a), I32(b)) => a.cmp(b),
            (I64(a), I64(b)) => a.cmp(b),
            (U32(a), U32(b)) => a.cmp(b),
            (U64(a), U64(b)) => a.cmp(b),
            // `f32`/`f64` have no total order of their own (NaN); `total_cmp` is the
            // IEEE-754 totalOrder predicate and gives index keys a stable sort
            // without reaching for an external "ordered float" crate.
            (F32(a), F32(b)) => a.total_cmp(b),
            (F64(a), F64(b)) => a.total_cmp(b),
            _ => panic!("AttrKey variant mismatch within one index"),
        }
    }
}

impl AttrKey {
    /// Decodes `bytes` per `attr_type`.
    pub fn decode(attr_type: AttrType, bytes: &[u8]) -> Result<Self> {
        fn arr<const N: usize>(b: &[u8]) -> Result<[u8; N]> {
            b.try_into().map_err(|_| Error::BadValue)
        }
        Ok(match attr_type {
            AttrType::String => AttrKey::Bytes(bytes.to_vec()),
            AttrType::Int32 => AttrKey::I32(i32::from_le_bytes(arr(bytes)?)),
            AttrType::Int64 => AttrKey::I64(i64::from_le_bytes(arr(bytes)?)),
            AttrType::UInt32 => AttrKey::U32(u32::from_le_bytes(arr(bytes)?)),
            AttrType::UInt64 => AttrKey::U64(u64::from_le_bytes(arr(bytes)?)),
            AttrType::Float => AttrKey::F32(f32::from_le_bytes(arr(bytes)?)),
            AttrType::Double => AttrKey::F64(f64::from_le_bytes(arr(bytes)?)),
        })
    }

    /// The fixed on-disk width of this type, or `None` for the variable-length
    /// `String` encoding.
    pub fn fixed_len(attr_type: AttrType) -> Option<usize> {
        match attr_type {
            AttrType::String => None,
            AttrType::Int32 | AttrType::UInt32 | AttrType::Float => Some(4),
            AttrType::Int64 | AttrType::UInt64 | AttrType::Double => Some(8),
        }
    }
}

/// The name index: every entry, ordered by `(name, entry)`.
#[derive(Debug, Default)]
pub struct NameIndex {
    tree: Tree<String, EntryId, EntryId>,
    handles: HashMap<EntryId, TreeIndex>,
}

impl NameIndex {
    pub fn count(&self) -> usize {
        self.tree.len()
    }

    pub fn added(&mut self, entry: EntryId, name: &str) {
        let h = self.tree.insert(name.to_string(), entry, entry);
        self.handles.insert(entry, h);
    }

    pub fn removed(&mut self, entry: EntryId) {
        if let Some(h) = self.handles.remove(&entry) {
            self.tree.remove(h);
        }
    }

    /// A name change re-keys the entry.
    pub fn changed(&mut self, entry: EntryId, new_name: &str) {
        self.removed(entry);
        self.added(entry, new_name);
    }

    pub fn find(&self, name: &str) -> Option<EntryId> {
        self.tree.find_first(&name.to_string()).map(|h| *self.tree.value(h))
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = EntryId> + '_ {
        self.tree.iter().map(move |h| *self.tree.value(h))
    }

    pub fn first(&self) -> Option<EntryId> {
        self.tree.first().map(|h| *self.tree.value(h))
    }

    pub fn last(&self) -> Option<EntryId> {
        self.tree.last().map(|h| *self.tree.value(h))
    }

    /// The item's successor, used by a suspended [`crate::iter::IndexIterator`] to
    /// advance past an item that is about to be removed: call this *before* [`Self::removed`].
    pub fn successor(&self, entry: EntryId) -> Option<EntryId> {
        let h = *self.handles.get(&entry)?;
        self.tree.successor(h).map(|h2| *self.tree.value(h2))
    }

    pub fn predecessor(&self, entry: EntryId) -> Option<EntryId> {
        let h = *self.handles.get(&entry)?;
        self.tree.predecessor(h).map(|h2| *self.tree.value(h2))
    }

    /// First entry whose name is `>= prefix`, used to bind a pattern-prefix scan
    /// to the index's ordering instead of visiting every entry.
    pub fn seek(&self, prefix: &str) -> Option<EntryId> {
        self.tree.lower_bound(&prefix.to_string()).map(|h| *self.tree.value(h))
    }
}

/// Shared plumbing for the size and last-modified indices, both of which key `&Node`
/// by a scalar field plus the node's own id for uniqueness.
#[derive(Debug, Default)]
struct NodeScalarIndex<K> {
    tree: Tree<K, NodeId, NodeId>,
    handles: HashMap<NodeId, TreeIndex>,
}

impl<K: Ord + Clone> NodeScalarIndex<K> {
    fn count(&self) -> usize {
        self.tree.len()
    }

    fn added(&mut self, node: NodeId, key: K) {
        let h = self.tree.insert(key, node, node);
        self.handles.insert(node, h);
    }

    fn removed(&mut self, node: NodeId) {
        if let Some(h) = self.handles.remove(&node) {
            self.tree.remove(h);
        }
    }

    fn changed(&mut self, node: NodeId, new_key: K) {
        self.removed(node);
        self.added(node, new_key);
    }

    fn find(&self, key: &K) -> Option<NodeId> {
        self.tree.find_first(key).map(|h| *self.tree.value(h))
    }

    fn iter(&self) -> impl DoubleEndedIterator<Item = NodeId> + '_ {
        self.tree.iter().map(move |h| *self.tree.value(h))
    }

    fn first(&self) -> Option<NodeId> {
        self.tree.first().map(|h| *self.tree.value(h))
    }

    fn last(&self) -> Option<NodeId> {
        self.tree.last().map(|h| *self.tree.value(h))
    }

    fn successor(&self, node: NodeId) -> Option<NodeId> {
        let h = *self.handles.get(&node)?;
        self.tree.successor(h).map(|h2| *self.tree.value(h2))
    }

    fn predecessor(&self, node: NodeId) -> Option<NodeId> {
        let h = *self.handles.get(&node)?;
        self.tree.predecessor(h).map(|h2| *self.tree.value(h2))
    }

    fn seek(&self, key: &K) -> Option<NodeId> {
        self.tree.lower_bound(key).map(|h| *self.tree.value(h))
    }
}

/// Tree of `&Node` keyed by `(node.size, node)`.
#[derive(Debug, Default)]
pub struct SizeIndex(NodeScalarIndex<u64>);

impl SizeIndex {
    pub fn count(&self) -> usize {
        self.0.count()
    }
    pub fn added(&mut self, node: NodeId, size: u64) {
        self.0.added(node, size)
    }
    pub fn removed(&mut self, node: NodeId) {
        self.0.removed(node)
    }
    pub fn changed(&mut self, node: NodeId, new_size: u64) {
        self.0.changed(node, new_size)
    }
    pub fn find(&self, size: u64) -> Option<NodeId> {
        self.0.find(&size)
    }
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = NodeId> + '_ {
        self.0.iter()
    }
    pub fn first(&self) -> Option<NodeId> {
        self.0.first()
    }
    pub fn last(&self) -> Option<NodeId> {
        self.0.last()
    }
    pub fn successor(&self, node: NodeId) -> Option<NodeId> {
        self.0.successor(node)
    }
    pub fn predecessor(&self, node: NodeId) -> Option<NodeId> {
        self.0.predecessor(node)
    }
}

/// Tree of `&Node` keyed by `(node.mtime, node)`.
#[derive(Debug, Default)]
pub struct LastModifiedIndex(NodeScalarIndex<Timestamp>);

impl LastModifiedIndex {
    pub fn count(&self) -> usize {
        self.0.count()
    }
    pub fn added(&mut self, node: NodeId, mtime: Timestamp) {
        self.0.added(node, mtime)
    }
    pub fn removed(&mut self, node: NodeId) {
        self.0.removed(node)
    }
    pub fn changed(&mut self, node: NodeId, new_mtime: Timestamp) {
        self.0.changed(node, new_mtime)
    }
    pub fn find(&self, mtime: Timestamp) -> Option<NodeId> {
        self.0.find(&mtime)
    }
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = NodeId> + '_ {
        self.0.iter()
    }
    pub fn first(&self) -> Option<NodeId> {
        self.0.first()
    }
    pub fn last(&self) -> Option<NodeId> {
        self.0.last()
    }
    pub fn successor(&self, node: NodeId) -> Option<NodeId> {
        self.0.successor(node)
    }
    pub fn predecessor(&self, node: NodeId) -> Option<NodeId> {
        self.0.predecessor(node)
    }
}

/// A user-defined attribute index: membership is
/// gated on the attribute's `name` matching this index and, for fixed-width types,
/// its encoded length matching exactly.
#[derive(Debug)]
pub struct AttributeIndex {
    pub name: String,
    pub attr_type: AttrType,
    tree: Tree<AttrKey, AttributeId, AttributeId>,
    handles: HashMap<AttributeId, TreeIndex>,
}

impl AttributeIndex {
    pub fn new(name: String, attr_type: AttrType) -> Self {
        Self { name, attr_type, tree: Tree::new(), handles: HashMap::new() }
    }

    pub fn count(&self) -> usize {
        self.tree.len()
    }

    /// Whether `bytes`, under this index's declared type, is eligible to join
    /// this index: decodes cleanly and, for fixed-width types, matches the
    /// expected length.
    pub fn accepts(&self, bytes: &[u8]) -> bool {
        if bytes.len() > MAX_INDEX_KEY_LEN {
            return false;
        }
        match AttrKey::fixed_len(self.attr_type) {
            Some(n) => bytes.len() == n,
            None => true,
        }
    }

    pub fn added(&mut self, attr: AttributeId, bytes: &[u8]) -> Result<()> {
        let key = AttrKey::decode(self.attr_type, bytes)?;
        let h = self.tree.insert(key, attr, attr);
        self.handles.insert(attr, h);
        Ok(())
    }

    pub fn removed(&mut self, attr: AttributeId) {
        if let Some(h) = self.handles.remove(&attr) {
            self.tree.remove(h);
        }
    }

    pub fn changed(&mut self, attr: AttributeId, new_bytes: &[u8]) -> Result<()> {
        self.removed(attr);
        self.added(attr, new_bytes)
    }

    pub fn find(&self, bytes: &[u8]) -> Result<Option<AttributeId>> {
        let key = AttrKey::decode(self.attr_type, bytes)?;
        Ok(self.tree.find_first(&key).map(|h| *self.tree.value(h)))
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = AttributeId> + '_ {
        self.tree.iter().map(move |h| *self.tree.value(h))
    }

    pub fn first(&self) -> Option<AttributeId> {
        self.tree.first().map(|h| *self.tree.value(h))
    }

    pub fn last(&self) -> Option<AttributeId> {
        self.tree.last().map(|h| *self.tree.value(h))
    }

    pub fn successor(&self, attr: AttributeId) -> Option<AttributeId> {
        let h = *self.handles.get(&attr)?;
        self.tree.successor(h).map(|h2| *self.tree.value(h2))
    }

    pub fn predecessor(&self, attr: AttributeId) -> Option<AttributeId> {
        let h = *self.handles.get(&attr)?;
        self.tree.predecessor(h).map(|h2| *self.tree.value(h2))
    }

    /// Seeks to the first item whose key is `>= bytes` (used by the query engine to
    /// bind a range scan to this index's ordering).
    pub fn seek(&self, bytes: &[u8]) -> Result<Option<AttributeId>> {
        let key = AttrKey::decode(self.attr_type, bytes)?;
        Ok(self.tree.lower_bound(&key).map(|h| *self.tree.value(h)))
    }
}

/// The volume's index registry.
#[derive(Debug, Default)]
pub struct IndexDirectory {
    pub name_index: NameIndex,
    pub size_index: SizeIndex,
    pub mtime_index: LastModifiedIndex,
    attr_indices: HashMap<String, AttributeIndex>,
}

impl IndexDirectory {
    /// Registers a new attribute index over `name` values of the given type.
    pub fn create_index(&mut self, name: &str, attr_type: AttrType) -> Result<()> {
        if self.attr_indices.contains_key(name) {
            return Err(Error::AlreadyExists);
        }
        self.attr_indices.insert(name.to_string(), AttributeIndex::new(name.to_string(), attr_type));
        Ok(())
    }

    /// Drops the attribute index over `name`.
    pub fn remove_index(&mut self, name: &str) -> Result<()> {
        self.attr_indices.remove(name).map(|_| ()).ok_or(Error::NotFound)
    }

    pub fn attribute_index(&self, name: &str) -> Option<&AttributeIndex> {
        self.attr_indices.get(name)
    }

    pub fn attribute_index_mut(&mut self, name: &str) -> Option<&mut AttributeIndex> {
        self.attr_indices.get_mut(name)
    }

    pub fn iter_attribute_indices(&self) -> impl Iterator<Item = &AttributeIndex> {
        self.attr_indices.values()
    }

    /// Names of every user-defined attribute index, for `open_index_dir`/
    /// `read_index_dir`-style enumeration. The three built-in indices (`name`,
    /// `size`, `last_modified`) are not user-removable and are not listed here.
    pub fn index_names(&self) -> impl Iterator<Item = &str> {
        self.attr_indices.keys().map(String::as_str)
    }

    /// Offers a just-written attribute value to the index matching its name, if the
    /// value's length satisfies that index's fixed-key constraint. Ejects it from any index it no longer matches first.
    pub fn reindex_attribute(&mut self, attr: AttributeId, name: &str, bytes: &[u8]) -> Result<bool> {
        let Some(index) = self.attr_indices.get_mut(name) else {
            return Ok(false);
        };
        if index.accepts(bytes) {
            index.changed(attr, bytes)?;
            Ok(true)
        } else {
            index.removed(attr);
            Ok(false)
        }
    }

    pub fn drop_attribute_from(&mut self, name: &str, attr: AttributeId) {
        if let Some(index) = self.attr_indices.get_mut(name) {
            index.removed(attr);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{EntryId, IdAllocator};

    fn entry_id(n: u64) -> EntryId {
        let mut a: IdAllocator<EntryId> = IdAllocator::default();
        for _ in 1..n {
            a.alloc();
        }
        a.alloc()
    }

    #[test]
    fn name_index_orders_lexicographically() {
        let mut idx = NameIndex::default();
        idx.added(entry_id(1), "banana");
        idx.added(entry_id(2), "apple");
        idx.added(entry_id(3), "cherry");
        let order: Vec<EntryId> = idx.iter().collect();
        assert_eq!(order, vec![entry_id(2), entry_id(1), entry_id(3)]);
    }

    #[test]
    fn attribute_index_rejects_wrong_fixed_length() {
        let idx = AttributeIndex::new("score".into(), AttrType::Int32);
        assert!(idx.accepts(&0i32.to_le_bytes()));
        assert!(!idx.accepts(&0i64.to_le_bytes()));
    }

    #[test]
    fn attribute_index_orders_integers_arithmetically_not_lexically() {
        let mut ids: IdAllocator<AttributeId> = IdAllocator::default();
        let mut idx = AttributeIndex::new("score".into(), AttrType::Int32);
        // Byte-lexical order of these little-endian encodings would differ from
        // numeric order; the index must sort numerically.
        idx.added(ids.alloc(), &500i32.to_le_bytes()).unwrap();
        idx.added(ids.alloc(), &2i32.to_le_bytes()).unwrap();
        idx.added(ids.alloc(), &10i32.to_le_bytes()).unwrap();
        let keys: Vec<i32> = idx
            .tree
            .iter()
            .map(|h| match idx.tree.primary(h) {
                AttrKey::I32(v) => *v,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(keys, vec![2, 10, 500]);
    }
}
