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

//! A single block-allocator area: a fixed-size buffer sliced into address-ordered
//! blocks, some free and some in use.

use crate::error::{Error, Result};

/// Bytes reserved per area for allocator bookkeeping, kept out of the usable range
/// reported to `find_free_fit`.
pub const AREA_OVERHEAD: usize = 64;

#[derive(Debug, Clone, Copy)]
struct BlockSlot {
    offset: usize,
    size: usize,
    free: bool,
}

/// One fixed-size arena of raw bytes, carved into address-ordered blocks.
#[derive(Debug)]
pub struct Area {
    data: Vec<u8>,
    /// Always kept sorted by `offset`, with no gaps and no overlaps: every byte from
    /// `AREA_OVERHEAD` to `data.len()` belongs to exactly one block.
    blocks: Vec<BlockSlot>,
}

impl Area {
    pub fn new(capacity: usize) -> Self {
        let usable = capacity.saturating_sub(AREA_OVERHEAD);
        Self {
            data: vec![0u8; capacity],
            blocks: vec![BlockSlot {
                offset: AREA_OVERHEAD,
                size: usable,
                free: true,
            }],
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn free_bytes(&self) -> usize {
        self.blocks.iter().filter(|b| b.free).map(|b| b.size).sum()
    }

    pub fn free_block_count(&self) -> usize {
        self.blocks.iter().filter(|b| b.free).count()
    }

    pub fn used_block_count(&self) -> usize {
        self.blocks.iter().filter(|b| !b.free).count()
    }

    fn index_of(&self, offset: usize) -> Result<usize> {
        self.blocks
            .binary_search_by_key(&offset, |b| b.offset)
            .map_err(|_| Error::BadValue)
    }

    /// First-fit: the lowest-address free block at least `size` bytes long.
    pub fn find_free_fit(&self, size: usize) -> Option<usize> {
        self.blocks
            .iter()
            .find(|b| b.free && b.size >= size)
            .map(|b| b.offset)
    }

    /// Carves `size` bytes out of the free block at `offset`, splitting off the
    /// remainder as a new free block when there's any left.
    pub fn use_free_block(&mut self, offset: usize, size: usize) {
        let idx = self.index_of(offset).expect("use_free_block: no such block");
        let remainder = self.blocks[idx].size - size;
        self.blocks[idx].size = size;
        self.blocks[idx].free = false;
        if remainder > 0 {
            self.blocks.insert(
                idx + 1,
                BlockSlot {
                    offset: offset + size,
                    size: remainder,
                    free: true,
                },
            );
        }
    }

    /// Frees the block at `offset`, coalescing with an adjoining free neighbor on
    /// either side.
    pub fn free_block(&mut self, offset: usize) -> Result<()> {
        let idx = self.index_of(offset)?;
        self.blocks[idx].free = true;
        if idx + 1 < self.blocks.len() && self.blocks[idx + 1].free {
            let next_size = self.blocks[idx + 1].size;
            self.blocks[idx].size += next_size;
            self.blocks.remove(idx + 1);
        }
        if idx > 0 && self.blocks[idx - 1].free {
            let this_size = self.blocks[idx].size;
            self.blocks[idx - 1].size += this_size;
            self.blocks.remove(idx);
        }
        Ok(())
    }

    /// Attempts to resize the block at `offset` without moving it: shrinking always
    /// succeeds (the freed tail becomes/joins a free block); growing succeeds only if
    /// the immediately following block is free and big enough to absorb the
    /// difference. Returns `Ok(None)` when the block must move instead.
    pub fn try_resize_in_place(&mut self, offset: usize, new_size: usize) -> Result<Option<usize>> {
        let idx = self.index_of(offset)?;
        let cur_size = self.blocks[idx].size;
        if new_size <= cur_size {
            let freed = cur_size - new_size;
            self.blocks[idx].size = new_size;
            if freed > 0 {
                self.blocks.insert(
                    idx + 1,
                    BlockSlot {
                        offset: offset + new_size,
                        size: freed,
                        free: true,
                    },
                );
                // the newly split-off tail may itself border a free block
                self.coalesce_at(idx + 1);
            }
            return Ok(Some(offset));
        }
        let needed = new_size - cur_size;
        if idx + 1 < self.blocks.len() && self.blocks[idx + 1].free && self.blocks[idx + 1].size >= needed {
            let next_size = self.blocks[idx + 1].size;
            self.blocks[idx].size = new_size;
            if next_size == needed {
                self.blocks.remove(idx + 1);
            } else {
                self.blocks[idx + 1].offset += needed;
                self.blocks[idx + 1].size -= needed;
            }
            return Ok(Some(offset));
        }
        Ok(None)
    }

    fn coalesce_at(&mut self, idx: usize) {
        if !self.blocks[idx].free {
            return;
        }
        if idx + 1 < self.blocks.len() && self.blocks[idx + 1].free {
            let next_size = self.blocks[idx + 1].size;
            self.blocks[idx].size += next_size;
            self.blocks.remove(idx + 1);
        }
        if idx > 0 && self.blocks[idx - 1].free {
            let this_size = self.blocks[idx].size;
            self.blocks[idx - 1].size += this_size;
            self.blocks.remove(idx);
        }
    }

    pub fn read(&self, offset: usize) -> Result<&[u8]> {
        let idx = self.index_of(offset)?;
        let b = self.blocks[idx];
        Ok(&self.data[b.offset..b.offset + b.size])
    }

    pub fn write(&mut self, offset: usize, rel_off: usize, buf: &[u8]) -> Result<()> {
        let idx = self.index_of(offset)?;
        let b = self.blocks[idx];
        if rel_off + buf.len() > b.size {
            return Err(Error::BufferOverflow);
        }
        self.data[b.offset + rel_off..b.offset + rel_off + buf.len()].copy_from_slice(buf);
        Ok(())
    }

    pub fn block_size(&self, offset: usize) -> Result<usize> {
        Ok(self.blocks[self.index_of(offset)?].size)
    }

    /// Compacts every used block to the front of the area, address order preserved,
    /// leaving a single free block at the end. Returns the `(old_offset, new_offset)`
    /// pairs for every block that moved, so the caller can repoint any external
    /// references.
    pub fn defragment(&mut self) -> Vec<(usize, usize)> {
        let mut moved = Vec::new();
        let mut cursor = AREA_OVERHEAD;
        let mut new_blocks = Vec::with_capacity(self.blocks.len());
        for b in self.blocks.iter().filter(|b| !b.free) {
            if b.offset != cursor {
                self.data.copy_within(b.offset..b.offset + b.size, cursor);
                moved.push((b.offset, cursor));
            }
            new_blocks.push(BlockSlot {
                offset: cursor,
                size: b.size,
                free: false,
            });
            cursor += b.size;
        }
        let tail = self.data.len() - cursor;
        if tail > 0 {
            new_blocks.push(BlockSlot {
                offset: cursor,
                size: tail,
                free: true,
            });
        }
        self.blocks = new_blocks;
        moved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_area_is_one_free_block() {
        let a = Area::new(1024);
        assert_eq!(a.free_bytes(), 1024 - AREA_OVERHEAD);
        assert_eq!(a.free_block_count(), 1);
    }

    #[test]
    fn split_and_coalesce_round_trip() {
        let mut a = Area::new(1024);
        let off = a.find_free_fit(100).unwrap();
        a.use_free_block(off, 100);
        assert_eq!(a.used_block_count(), 1);
        assert_eq!(a.free_block_count(), 1);
        a.free_block(off).unwrap();
        assert_eq!(a.free_block_count(), 1);
        assert_eq!(a.free_bytes(), 1024 - AREA_OVERHEAD);
    }

    #[test]
    fn grow_absorbs_following_free_block() {
        let mut a = Area::new(1024);
        let off = a.find_free_fit(50).unwrap();
        a.use_free_block(off, 50);
        let new_off = a.try_resize_in_place(off, 200).unwrap().unwrap();
        assert_eq!(new_off, off);
        assert_eq!(a.block_size(off).unwrap(), 200);
    }
}
