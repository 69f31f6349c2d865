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

//! A self-balancing two-key ordered map.
//!
//! Items are ordered first by a primary key, and, among items sharing a primary key,
//! by a secondary key (typically the item's own identity, when uniqueness is
//! required). The tree is an AVL tree; nodes live in a slab (`Vec<Option<Node>>`)
//! addressed by small integer handles instead of raw pointers, which is the
//! arena-based rendering suggested for intrusive back-edges elsewhere in this crate
//! (see `DESIGN.md`, "Two-key tree").

use std::cmp::Ordering;

/// A stable handle to an item in a [`Tree`]. Handles stay valid until the item they
/// name is removed; an index iterator may hold one across a suspend/resume cycle
/// (`crate::iter`).
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct TreeIndex(u32);

const NIL: TreeIndex = TreeIndex(u32::MAX);

impl TreeIndex {
    fn is_nil(self) -> bool {
        self == NIL
    }
}

#[derive(Debug, Clone, Copy)]
enum Side {
    Left,
    Right,
}

#[derive(Debug)]
struct Node<P, S, V> {
    primary: P,
    secondary: S,
    value: V,
    parent: TreeIndex,
    left: TreeIndex,
    right: TreeIndex,
    /// `height(right) - height(left)`. Always in `{-1, 0, 1}` between operations.
    balance: i8,
}

/// A two-key ordered map: primary key `P`, secondary key `S`, tie-broken on `P`.
#[derive(Debug)]
pub struct Tree<P, S, V> {
    slab: Vec<Option<Node<P, S, V>>>,
    free: Vec<TreeIndex>,
    root: TreeIndex,
    len: usize,
}

impl<P, S, V> Default for Tree<P, S, V> {
    fn default() -> Self {
        Self {
            slab: Vec::new(),
            free: Vec::new(),
            root: NIL,
            len: 0,
        }
    }
}

fn key_cmp<P: Ord, S: Ord>(pa: &P, sa: &S, pb: &P, sb: &S) -> Ordering {
    pa.cmp(pb).then_with(|| sa.cmp(sb))
}

impl<P: Ord, S: Ord, V> Tree<P, S, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn node(&self, idx: TreeIndex) -> &Node<P, S, V> {
        self.slab[idx.0 as usize].as_ref().expect("dangling TreeIndex")
    }

    fn node_mut(&mut self, idx: TreeIndex) -> &mut Node<P, S, V> {
        self.slab[idx.0 as usize].as_mut().expect("dangling TreeIndex")
    }

    fn alloc(&mut self, node: Node<P, S, V>) -> TreeIndex {
        if let Some(idx) = self.free.pop() {
            self.slab[idx.0 as usize] = Some(node);
            idx
        } else {
            let idx = TreeIndex(self.slab.len() as u32);
            self.slab.push(Some(node));
            idx
        }
    }

    fn dealloc(&mut self, idx: TreeIndex) -> Node<P, S, V> {
        let node = self.slab[idx.0 as usize].take().expect("double free of TreeIndex");
        self.free.push(idx);
        node
    }

    pub fn primary(&self, idx: TreeIndex) -> &P {
        &self.node(idx).primary
    }

    pub fn secondary(&self, idx: TreeIndex) -> &S {
        &self.node(idx).secondary
    }

    pub fn value(&self, idx: TreeIndex) -> &V {
        &self.node(idx).value
    }

    pub fn value_mut(&mut self, idx: TreeIndex) -> &mut V {
        &mut self.node_mut(idx).value
    }

    /// Inserts `(primary, secondary) -> value`. Returns the new item's handle.
    ///
    /// Callers wanting uniqueness should use the value's own identity (e.g. an id) as
    /// the secondary key.
    pub fn insert(&mut self, primary: P, secondary: S, value: V) -> TreeIndex {
        if self.root.is_nil() {
            let idx = self.alloc(Node {
                primary,
                secondary,
                value,
                parent: NIL,
                left: NIL,
                right: NIL,
                balance: 0,
            });
            self.root = idx;
            self.len = 1;
            return idx;
        }
        let mut cur = self.root;
        loop {
            let side = match key_cmp(&primary, &secondary, &self.node(cur).primary, &self.node(cur).secondary) {
                Ordering::Less => Side::Left,
                _ => Side::Right,
            };
            let child = match side {
                Side::Left => self.node(cur).left,
                Side::Right => self.node(cur).right,
            };
            if child.is_nil() {
                let new_idx = self.alloc(Node {
                    primary,
                    secondary,
                    value,
                    parent: cur,
                    left: NIL,
                    right: NIL,
                    balance: 0,
                });
                match side {
                    Side::Left => self.node_mut(cur).left = new_idx,
                    Side::Right => self.node_mut(cur).right = new_idx,
                }
                self.len += 1;
                self.retrace_after_insert(cur, side);
                return new_idx;
            }
            cur = child;
        }
    }

    /// Retraces from the inserted node's parent to the root, adjusting balance
    /// factors and rotating as soon as a node's balance factor would leave
    /// `{-1,0,1}`. At most one (single or double) rotation is ever required after an
    /// insertion, so this stops as soon as it performs one or finds unchanged height.
    fn retrace_after_insert(&mut self, mut parent: TreeIndex, mut side: Side) {
        loop {
            let delta: i8 = match side {
                Side::Left => -1,
                Side::Right => 1,
            };
            self.node_mut(parent).balance += delta;
            let balance = self.node(parent).balance;
            if balance == 0 {
                break; // subtree height unchanged, nothing propagates further
            }
            if balance == 1 || balance == -1 {
                let gp = self.node(parent).parent;
                if gp.is_nil() {
                    break;
                }
                side = if self.node(gp).left == parent { Side::Left } else { Side::Right };
                parent = gp;
                continue;
            }
            // balance is +-2: rebalance this subtree and stop, height restored
            self.rebalance(parent);
            break;
        }
    }

    /// Rebalances the subtree rooted at `z` (whose balance factor is `+-2`) and
    /// returns the handle of the node that takes its place.
    fn rebalance(&mut self, z: TreeIndex) -> TreeIndex {
        if self.node(z).balance > 1 {
            let mut y = self.node(z).right;
            if self.node(y).balance < 0 {
                self.rotate_right(y);
                y = self.node(z).right;
            }
            self.rotate_left(z);
            y
        } else {
            let mut y = self.node(z).left;
            if self.node(y).balance > 0 {
                self.rotate_left(y);
                y = self.node(z).left;
            }
            self.rotate_right(z);
            y
        }
    }

    fn replace_child(&mut self, parent: TreeIndex, old: TreeIndex, new: TreeIndex) {
        if parent.is_nil() {
            self.root = new;
            return;
        }
        if self.node(parent).left == old {
            self.node_mut(parent).left = new;
        } else {
            self.node_mut(parent).right = new;
        }
    }

    /// Standard AVL left rotation around `z` (z's right child `y` becomes the new
    /// subtree root).
    fn rotate_left(&mut self, z: TreeIndex) {
        let y = self.node(z).right;
        let t2 = self.node(y).left;
        let parent = self.node(z).parent;

        self.node_mut(z).right = t2;
        if !t2.is_nil() {
            self.node_mut(t2).parent = z;
        }
        self.node_mut(y).left = z;
        self.node_mut(z).parent = y;
        self.node_mut(y).parent = parent;
        self.replace_child(parent, z, y);

        let bz = self.node(z).balance;
        let by = self.node(y).balance;
        let new_bz = bz - 1 - by.max(0);
        let new_by = by - 1 + new_bz.min(0);
        self.node_mut(z).balance = new_bz;
        self.node_mut(y).balance = new_by;
    }

    /// Standard AVL right rotation around `z` (z's left child `y` becomes the new
    /// subtree root).
    fn rotate_right(&mut self, z: TreeIndex) {
        let y = self.node(z).left;
        let t2 = self.node(y).right;
        let parent = self.node(z).parent;

        self.node_mut(z).left = t2;
        if !t2.is_nil() {
            self.node_mut(t2).parent = z;
        }
        self.node_mut(y).right = z;
        self.node_mut(z).parent = y;
        self.node_mut(y).parent = parent;
        self.replace_child(parent, z, y);

        let bz = self.node(z).balance;
        let by = self.node(y).balance;
        let new_bz = bz + 1 - by.min(0);
        let new_by = by + 1 + new_bz.max(0);
        self.node_mut(z).balance = new_bz;
        self.node_mut(y).balance = new_by;
    }

    fn min_of(&self, mut idx: TreeIndex) -> TreeIndex {
        loop {
            let left = self.node(idx).left;
            if left.is_nil() {
                return idx;
            }
            idx = left;
        }
    }

    fn max_of(&self, mut idx: TreeIndex) -> TreeIndex {
        loop {
            let right = self.node(idx).right;
            if right.is_nil() {
                return idx;
            }
            idx = right;
        }
    }

    pub fn first(&self) -> Option<TreeIndex> {
        (!self.root.is_nil()).then(|| self.min_of(self.root))
    }

    pub fn last(&self) -> Option<TreeIndex> {
        (!self.root.is_nil()).then(|| self.max_of(self.root))
    }

    pub fn successor(&self, idx: TreeIndex) -> Option<TreeIndex> {
        let right = self.node(idx).right;
        if !right.is_nil() {
            return Some(self.min_of(right));
        }
        let mut cur = idx;
        let mut parent = self.node(idx).parent;
        while !parent.is_nil() && self.node(parent).right == cur {
            cur = parent;
            parent = self.node(parent).parent;
        }
        (!parent.is_nil()).then_some(parent)
    }

    pub fn predecessor(&self, idx: TreeIndex) -> Option<TreeIndex> {
        let left = self.node(idx).left;
        if !left.is_nil() {
            return Some(self.max_of(left));
        }
        let mut cur = idx;
        let mut parent = self.node(idx).parent;
        while !parent.is_nil() && self.node(parent).left == cur {
            cur = parent;
            parent = self.node(parent).parent;
        }
        (!parent.is_nil()).then_some(parent)
    }

    /// Finds *an* item with the given primary key (descends to the first matching
    /// node reached; see [`Self::find_first`] for the leftmost match).
    pub fn find(&self, primary: &P) -> Option<TreeIndex> {
        let mut cur = self.root;
        while !cur.is_nil() {
            match primary.cmp(&self.node(cur).primary) {
                Ordering::Less => cur = self.node(cur).left,
                Ordering::Greater => cur = self.node(cur).right,
                Ordering::Equal => return Some(cur),
            }
        }
        None
    }

    /// Finds the first (leftmost, in order) item with the given primary key.
    pub fn find_first(&self, primary: &P) -> Option<TreeIndex> {
        let mut found = self.find(primary)?;
        while let Some(pred) = self.predecessor(found) {
            if self.node(pred).primary == *primary {
                found = pred;
            } else {
                break;
            }
        }
        Some(found)
    }

    /// Finds the first item (in ascending order) whose primary key is `>= primary`.
    /// Used by the query engine to bind a range scan without visiting everything
    /// strictly less than the bound.
    pub fn lower_bound(&self, primary: &P) -> Option<TreeIndex> {
        let mut cur = self.root;
        let mut best: Option<TreeIndex> = None;
        while !cur.is_nil() {
            match primary.cmp(&self.node(cur).primary) {
                Ordering::Greater => cur = self.node(cur).right,
                _ => {
                    best = Some(cur);
                    cur = self.node(cur).left;
                }
            }
        }
        best
    }

    /// Finds the exact `(primary, secondary)` pair.
    pub fn find_exact(&self, primary: &P, secondary: &S) -> Option<TreeIndex> {
        let mut cur = self.root;
        while !cur.is_nil() {
            match key_cmp(primary, secondary, &self.node(cur).primary, &self.node(cur).secondary) {
                Ordering::Less => cur = self.node(cur).left,
                Ordering::Greater => cur = self.node(cur).right,
                Ordering::Equal => return Some(cur),
            }
        }
        None
    }

    /// Removes the item at `idx`, returning its value. The handle is invalid once
    /// this returns; a suspended iterator must move off it beforehand.
    pub fn remove(&mut self, idx: TreeIndex) -> V {
        self.len -= 1;
        let (left, right) = (self.node(idx).left, self.node(idx).right);
        if left.is_nil() || right.is_nil() {
            let child = if left.is_nil() { right } else { left };
            let parent = self.node(idx).parent;
            let side = if !parent.is_nil() && self.node(parent).left == idx { Side::Left } else { Side::Right };
            if !child.is_nil() {
                self.node_mut(child).parent = parent;
            }
            self.replace_child(parent, idx, child);
            let removed = self.dealloc(idx);
            if !parent.is_nil() {
                self.retrace_after_delete(parent, side);
            }
            return removed.value;
        }
        // Two children: relocate the in-order successor into `idx`'s slot instead of
        // moving payload around (keeps this generic over non-`Clone` values).
        let succ = self.min_of(right);
        let succ_right = self.node(succ).right;
        let succ_parent = self.node(succ).parent;
        let idx_parent = self.node(idx).parent;
        let idx_balance = self.node(idx).balance;

        let (retrace_from, retrace_side) = if succ_parent == idx {
            (succ, Side::Right)
        } else {
            self.replace_child(succ_parent, succ, succ_right);
            if !succ_right.is_nil() {
                self.node_mut(succ_right).parent = succ_parent;
            }
            (succ_parent, Side::Left)
        };

        self.node_mut(succ).left = left;
        self.node_mut(left).parent = succ;
        if succ_parent != idx {
            self.node_mut(succ).right = right;
            self.node_mut(right).parent = succ;
        }
        self.node_mut(succ).parent = idx_parent;
        self.node_mut(succ).balance = idx_balance;
        self.replace_child(idx_parent, idx, succ);

        let removed = self.dealloc(idx);
        self.retrace_after_delete(retrace_from, retrace_side);
        removed.value
    }

    /// Retraces from the point where a subtree's height decreased, up to the root,
    /// rotating as needed. Unlike insertion, deletion can require a rotation at every
    /// level up to the root, so this does not stop after the first one.
    fn retrace_after_delete(&mut self, mut node: TreeIndex, mut side: Side) {
        loop {
            let delta: i8 = match side {
                Side::Left => 1,
                Side::Right => -1,
            };
            self.node_mut(node).balance += delta;
            let balance = self.node(node).balance;
            if balance == 1 || balance == -1 {
                break; // height of this subtree unchanged, propagation stops
            }
            let mut cur = node;
            if balance == 2 || balance == -2 {
                cur = self.rebalance(node);
                if self.node(cur).balance == 1 || self.node(cur).balance == -1 {
                    break; // rotation restored the pre-deletion height
                }
            }
            let parent = self.node(cur).parent;
            if parent.is_nil() {
                break;
            }
            side = if self.node(parent).left == cur { Side::Left } else { Side::Right };
            node = parent;
        }
    }

    /// Iterates all items in ascending order.
    pub fn iter(&self) -> Iter<'_, P, S, V> {
        Iter {
            tree: self,
            front: self.first(),
            back: self.last(),
            done: self.is_empty(),
        }
    }
}

/// A bidirectional iterator over a [`Tree`] in ascending key order.
pub struct Iter<'t, P, S, V> {
    tree: &'t Tree<P, S, V>,
    front: Option<TreeIndex>,
    back: Option<TreeIndex>,
    done: bool,
}

impl<'t, P: Ord, S: Ord, V> Iterator for Iter<'t, P, S, V> {
    type Item = TreeIndex;

    fn next(&mut self) -> Option<TreeIndex> {
        if self.done {
            return None;
        }
        let cur = self.front?;
        if Some(cur) == self.back {
            self.done = true;
        } else {
            self.front = self.tree.successor(cur);
        }
        Some(cur)
    }
}

impl<'t, P: Ord, S: Ord, V> DoubleEndedIterator for Iter<'t, P, S, V> {
    fn next_back(&mut self) -> Option<TreeIndex> {
        if self.done {
            return None;
        }
        let cur = self.back?;
        if Some(cur) == self.front {
            self.done = true;
        } else {
            self.back = self.tree.predecessor(cur);
        }
        Some(cur)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn insert_and_iterate_sorted() {
        let mut t: Tree<i32, i32, i32> = Tree::new();
        for v in [5, 2, 9, 1, 7, 3, 8, 4, 6, 0] {
            t.insert(v, v, v * 10);
        }
        let order: Vec<i32> = t.iter().map(|idx| *t.value(idx)).collect();
        assert_eq!(order, (0..10).map(|v| v * 10).collect::<Vec<_>>());
    }

    #[test]
    fn remove_preserves_order_and_balance() {
        let mut t: Tree<i32, i32, i32> = Tree::new();
        let mut handles = Vec::new();
        for v in 0..200 {
            handles.push((v, t.insert(v, v, v)));
        }
        // remove every third element
        let mut expected: BTreeSet<i32> = (0..200).collect();
        for (v, idx) in handles.into_iter().filter(|(v, _)| v % 3 == 0) {
            t.remove(idx);
            expected.remove(&v);
        }
        let order: Vec<i32> = t.iter().map(|idx| *t.value(idx)).collect();
        let expected: Vec<i32> = expected.into_iter().collect();
        assert_eq!(order, expected);
        assert_eq!(t.len(), expected.len());
    }

    #[test]
    fn find_first_returns_leftmost_match() {
        let mut t: Tree<i32, i32, &'static str> = Tree::new();
        t.insert(1, 3, "c");
        t.insert(1, 1, "a");
        t.insert(1, 2, "b");
        t.insert(0, 0, "zero");
        let first = t.find_first(&1).unwrap();
        assert_eq!(*t.value(first), "a");
    }

    #[test]
    fn successor_predecessor_roundtrip() {
        let mut t: Tree<i32, i32, i32> = Tree::new();
        let mut handles = Vec::new();
        for v in 0..50 {
            handles.push(t.insert(v, v, v));
        }
        let first = t.first().unwrap();
        let mut cur = first;
        let mut count = 1;
        while let Some(next) = t.successor(cur) {
            assert!(t.value(next) > t.value(cur));
            cur = next;
            count += 1;
        }
        assert_eq!(count, 50);
        assert_eq!(t.predecessor(first), None);
    }

    #[test]
    fn remove_keeps_tree_balanced_under_stress() {
        let mut t: Tree<i32, i32, i32> = Tree::new();
        let mut handles = Vec::new();
        for v in 0..1000 {
            handles.push(t.insert(v, v, v));
        }
        for idx in handles {
            t.remove(idx);
        }
        assert!(t.is_empty());
        assert_eq!(t.first(), None);
    }
}
