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

//! The block allocator: a sub-page suballocator so small attribute
//! values and small files don't each cost a whole area.
//!
//! The allocator owns a set of [`Area`]s, each a fixed-size buffer sliced into
//! address-ordered blocks. A [`BlockRef`] is a stable handle: its identity survives
//! a block being physically moved by [`BlockAllocator::defragment`] or
//! [`BlockAllocator::resize`], because callers never hold offsets directly — only the
//! handle, which is resolved through an out-of-band reference table on every access.

mod area;

use crate::error::{Error, Result};
use area::Area;

/// A stable handle to a block. Survives area defragmentation and in-place resize.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct BlockRef(u32);

#[derive(Debug, Clone, Copy)]
struct RefSlot {
    area: u32,
    /// Current byte offset of the block's usable region within its area.
    offset: usize,
}

/// Per-area free-bytes census used for diagnostics (`GET_ALLOCATION_INFO`).
#[derive(Debug, Clone, Copy, Default)]
pub struct AreaInfo {
    pub size: usize,
    pub free_bytes: usize,
    pub free_block_count: usize,
    pub used_block_count: usize,
}

/// Allocator-wide census, surfaced through `Volume::allocation_info`.
#[derive(Debug, Clone, Default)]
pub struct AllocationInfo {
    pub areas: Vec<AreaInfo>,
    pub used_bytes: usize,
    pub free_bytes: usize,
}

/// The tolerance added to "one area" when deciding whether to reclaim an area
/// globally.
const AREA_RECLAIM_TOLERANCE: usize = 4096;

/// Minimum net block size used to compute a [`Area`]'s size-class bucket.
const MIN_NET_BLOCK: usize = 16;

/// Computes `ceil(log2(free_bytes / min_net_block))`, the size-class bucket index
/// used to group areas for allocation scanning.
pub(crate) fn bucket_of(free_bytes: usize) -> u32 {
    let units = (free_bytes / MIN_NET_BLOCK).max(1);
    (usize::BITS - (units - 1).leading_zeros()).max(0)
}

/// The block allocator.
///
/// Any detected invariant violation puts the allocator into *panic mode*:
/// subsequent mutating operations return
/// [`Error::Internal`] without touching state. Reads remain permitted (with a
/// logged warning), per the Open Question resolution recorded in `DESIGN.md`.
#[derive(Debug)]
pub struct BlockAllocator {
    area_size: usize,
    areas: Vec<Area>,
    refs: Vec<Option<RefSlot>>,
    free_refs: Vec<u32>,
    panicked: bool,
}

impl BlockAllocator {
    pub fn new(area_size: usize) -> Self {
        Self {
            area_size,
            areas: Vec::new(),
            refs: Vec::new(),
            free_refs: Vec::new(),
            panicked: false,
        }
    }

    pub fn is_panicked(&self) -> bool {
        self.panicked
    }

    fn panic(&mut self, why: &str) -> Error {
        log::error!("block allocator: invariant violation, entering panic mode: {why}");
        self.panicked = true;
        Error::Internal
    }

    fn new_ref(&mut self, area: u32, offset: usize) -> BlockRef {
        let slot = RefSlot { area, offset };
        if let Some(id) = self.free_refs.pop() {
            self.refs[id as usize] = Some(slot);
            BlockRef(id)
        } else {
            let id = self.refs.len() as u32;
            self.refs.push(Some(slot));
            BlockRef(id)
        }
    }

    fn slot(&self, r: BlockRef) -> Result<RefSlot> {
        self.refs
            .get(r.0 as usize)
            .and_then(|s| *s)
            .ok_or(Error::BadValue)
    }

    /// Maximum usable size of a single block, anywhere (an area's net capacity).
    fn max_net_block_size(&self) -> usize {
        self.area_size.saturating_sub(area::AREA_OVERHEAD)
    }

    /// Allocates a block able to hold `usable_size` bytes. Fails only if
    /// `usable_size` exceeds the maximum net size of one area.
    pub fn allocate(&mut self, usable_size: usize) -> Result<BlockRef> {
        if self.panicked {
            return Err(Error::Internal);
        }
        if usable_size > self.max_net_block_size() {
            return Err(Error::OutOfMemory);
        }
        if let Some((area_idx, offset)) = self.find_fit(usable_size) {
            self.areas[area_idx].use_free_block(offset, usable_size);
            let r = self.new_ref(area_idx as u32, offset);
            return Ok(r);
        }
        // No existing area fits, even after defragmenting in place; grow.
        let area_idx = self.areas.len();
        self.areas.push(Area::new(self.area_size));
        let offset = self.areas[area_idx]
            .find_free_fit(usable_size)
            .ok_or(Error::OutOfMemory)?;
        self.areas[area_idx].use_free_block(offset, usable_size);
        Ok(self.new_ref(area_idx as u32, offset))
    }

    /// First-fit search across areas, defragmenting in place when an area has enough
    /// aggregate free space but no single block large enough.
    fn find_fit(&mut self, usable_size: usize) -> Option<(usize, usize)> {
        let mut order: Vec<usize> = (0..self.areas.len()).collect();
        order.sort_by_key(|&i| bucket_of(self.areas[i].free_bytes()));
        for &i in &order {
            if let Some(off) = self.areas[i].find_free_fit(usable_size) {
                return Some((i, off));
            }
        }
        for &i in &order {
            if self.areas[i].free_bytes() >= usable_size {
                self.defragment_area(i);
                if let Some(off) = self.areas[i].find_free_fit(usable_size) {
                    return Some((i, off));
                }
            }
        }
        None
    }

    /// Defragments area `i` and repoints every live [`BlockRef`] whose block moved.
    fn defragment_area(&mut self, i: usize) {
        let moved = self.areas[i].defragment();
        if moved.is_empty() {
            return;
        }
        for slot in self.refs.iter_mut().flatten() {
            if slot.area as usize == i {
                if let Some(&(_, new_off)) = moved.iter().find(|(old, _)| *old == slot.offset) {
                    slot.offset = new_off;
                }
            }
        }
    }

    /// Frees a block. Coalesces with the immediate next and then immediate previous
    /// free block, address-wise.
    pub fn free(&mut self, r: BlockRef) -> Result<()> {
        if self.panicked {
            return Err(Error::Internal);
        }
        let slot = self.slot(r)?;
        let area = self.areas.get_mut(slot.area as usize).ok_or(Error::BadValue)?;
        area.free_block(slot.offset)?;
        self.refs[r.0 as usize] = None;
        self.free_refs.push(r.0);
        self.maybe_reclaim();
        Ok(())
    }

    /// Resizes a block in place when possible (consuming an adjoining free block);
    /// otherwise allocates a new block, copies, and frees the old one. The `BlockRef`
    /// handle is never invalidated by either path.
    pub fn resize(&mut self, r: BlockRef, new_usable_size: usize) -> Result<()> {
        if self.panicked {
            return Err(Error::Internal);
        }
        if new_usable_size > self.max_net_block_size() {
            return Err(Error::OutOfMemory);
        }
        let slot = self.slot(r)?;
        {
            let area = self.areas.get_mut(slot.area as usize).ok_or(Error::BadValue)?;
            if let Some(new_offset) = area.try_resize_in_place(slot.offset, new_usable_size)? {
                self.refs[r.0 as usize] = Some(RefSlot { area: slot.area, offset: new_offset });
                return Ok(());
            }
        }
        // Move: allocate a fresh block, copy, repoint the reference, free the old one.
        let data = self.read(r)?.to_vec();
        let new_ref = self.allocate(new_usable_size)?;
        let copy_len = data.len().min(new_usable_size);
        self.write(new_ref, 0, &data[..copy_len])?;
        let new_slot = self.slot(new_ref)?;
        // `allocate` above may have defragmented `r`'s own area (e.g. if it and the
        // new block land in the same area), which repoints `self.refs[r.0]` without
        // updating the stale local `slot` captured before the call.
        let slot = self.slot(r)?;
        {
            let old_area = self.areas.get_mut(slot.area as usize).ok_or(Error::BadValue)?;
            old_area.free_block(slot.offset)?;
        }
        // Repoint `r` at the new block, and retire `new_ref`'s own slot (the caller
        // keeps using `r`).
        self.refs[r.0 as usize] = Some(new_slot);
        self.refs[new_ref.0 as usize] = None;
        self.free_refs.push(new_ref.0);
        self.maybe_reclaim();
        Ok(())
    }

    pub fn read(&self, r: BlockRef) -> Result<&[u8]> {
        let slot = self.slot(r)?;
        let area = self.areas.get(slot.area as usize).ok_or(Error::BadValue)?;
        area.read(slot.offset)
    }

    pub fn write(&mut self, r: BlockRef, off: usize, buf: &[u8]) -> Result<()> {
        if self.panicked {
            return Err(Error::Internal);
        }
        let slot = self.slot(r)?;
        let area = self.areas.get_mut(slot.area as usize).ok_or(Error::BadValue)?;
        area.write(slot.offset, off, buf)
    }

    pub fn block_size(&self, r: BlockRef) -> Result<usize> {
        let slot = self.slot(r)?;
        let area = self.areas.get(slot.area as usize).ok_or(Error::BadValue)?;
        area.block_size(slot.offset)
    }

    /// Defragments the area backing `r`. Triggered when an area has more
    /// than 5 free blocks and a used/free block-count ratio under 10.
    fn maybe_defragment_triggered(&mut self, area_idx: usize) {
        let area = &self.areas[area_idx];
        if area.free_block_count() > 5 && area.used_block_count() < area.free_block_count() * 10 {
            self.defragment_area(area_idx);
        }
    }

    /// Reclaims wholly-empty areas once total free space exceeds one area plus a
    /// tolerance. Dropping areas renumbers the survivors, so every
    /// `BlockRef`'s area index is remapped in lockstep.
    fn maybe_reclaim(&mut self) {
        for i in 0..self.areas.len() {
            self.maybe_defragment_triggered(i);
        }
        let total_free: usize = self.areas.iter().map(|a| a.free_bytes()).sum();
        if total_free <= self.area_size + AREA_RECLAIM_TOLERANCE {
            return;
        }
        let mut new_index = vec![None; self.areas.len()];
        let mut kept = Vec::with_capacity(self.areas.len());
        for (old_i, area) in self.areas.drain(..).enumerate() {
            if area.used_block_count() > 0 {
                new_index[old_i] = Some(kept.len() as u32);
                kept.push(area);
            }
        }
        self.areas = kept;
        for slot in self.refs.iter_mut().flatten() {
            if let Some(new_i) = new_index[slot.area as usize] {
                slot.area = new_i;
            }
        }
    }

    pub fn allocation_info(&self) -> AllocationInfo {
        let areas: Vec<AreaInfo> = self
            .areas
            .iter()
            .map(|a| AreaInfo {
                size: a.capacity(),
                free_bytes: a.free_bytes(),
                free_block_count: a.free_block_count(),
                used_block_count: a.used_block_count(),
            })
            .collect();
        let free_bytes: usize = areas.iter().map(|a| a.free_bytes).sum();
        let total: usize = areas.iter().map(|a| a.size).sum();
        AllocationInfo {
            used_bytes: total.saturating_sub(free_bytes),
            free_bytes,
            areas,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_write_read_roundtrip() {
        let mut a = BlockAllocator::new(4096);
        let r = a.allocate(64).unwrap();
        a.write(r, 0, b"hello world").unwrap();
        assert_eq!(&a.read(r).unwrap()[..11], b"hello world");
    }

    #[test]
    fn free_then_allocate_reuses_space() {
        let mut a = BlockAllocator::new(4096);
        let r1 = a.allocate(100).unwrap();
        a.free(r1).unwrap();
        let r2 = a.allocate(100).unwrap();
        a.write(r2, 0, b"reused").unwrap();
        assert_eq!(&a.read(r2).unwrap()[..6], b"reused");
    }

    #[test]
    fn resize_grow_and_shrink_preserve_prefix() {
        let mut a = BlockAllocator::new(4096);
        let r = a.allocate(16).unwrap();
        a.write(r, 0, b"0123456789abcdef").unwrap();
        a.resize(r, 256).unwrap();
        assert_eq!(&a.read(r).unwrap()[..16], b"0123456789abcdef");
        a.resize(r, 4).unwrap();
        assert_eq!(&a.read(r).unwrap()[..4], b"0123");
    }

    #[test]
    fn fails_over_max_area_capacity() {
        let mut a = BlockAllocator::new(128);
        assert!(a.allocate(1_000_000).is_err());
    }

    #[test]
    fn defragmentation_keeps_references_valid() {
        let mut a = BlockAllocator::new(4096);
        let mut refs = Vec::new();
        for i in 0..20u8 {
            let r = a.allocate(32).unwrap();
            a.write(r, 0, &[i; 32]).unwrap();
            refs.push(r);
        }
        // free every other block to fragment the area, then allocate something that
        // only fits after defragmentation compacts the holes together.
        for (i, r) in refs.iter().enumerate() {
            if i % 2 == 0 {
                a.free(*r).unwrap();
            }
        }
        let big = a.allocate(300).unwrap();
        a.write(big, 0, &[0xAA; 300]).unwrap();
        for (i, r) in refs.iter().enumerate() {
            if i % 2 == 1 {
                assert_eq!(a.read(*r).unwrap(), &[i as u8; 32]);
            }
        }
        assert_eq!(a.read(big).unwrap(), &[0xAA; 300]);
    }

    #[test]
    fn allocate_more_than_area_capacity_grows_areas() {
        let mut a = BlockAllocator::new(512);
        let mut refs = Vec::new();
        for i in 0..50u16 {
            let r = a.allocate(48).unwrap();
            a.write(r, 0, &i.to_le_bytes()).unwrap();
            refs.push((i, r));
        }
        assert!(a.areas.len() > 1);
        for (i, r) in refs {
            assert_eq!(&a.read(r).unwrap()[..2], &i.to_le_bytes());
        }
    }
}
