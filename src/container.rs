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

//! Polymorphic byte storage backing both file contents and attribute values.
//!
//! Below [`VolumeConfig::inline_threshold`] bytes, a container just holds its bytes
//! directly — no block allocator involvement, so a zero-length attribute costs
//! nothing. Past the threshold it becomes a chain of fixed-size blocks, each held
//! through a [`BlockRef`] so a block can move under the container without the
//! container itself noticing. Growth always tries to widen the last block in place
//! before appending a new one; shrinking frees tail blocks and, once the container
//! fits back under the threshold, folds back down to inline.

use crate::alloc::{BlockAllocator, BlockRef};
use crate::config::VolumeConfig;
use crate::error::Result;

/// A file's or attribute's byte storage.
#[derive(Debug, Clone)]
pub enum DataContainer {
    Inline(Vec<u8>),
    Chain {
        blocks: Vec<BlockRef>,
        size: usize,
        /// Logical size of every non-last block; fixed at promotion time from the
        /// volume's configured block size.
        block_size: usize,
    },
}

impl Default for DataContainer {
    fn default() -> Self {
        DataContainer::Inline(Vec::new())
    }
}

impl DataContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn size(&self) -> usize {
        match self {
            DataContainer::Inline(buf) => buf.len(),
            DataContainer::Chain { size, .. } => *size,
        }
    }

    /// Releases every block held by a chain container. Inline containers own no
    /// allocator state and this is a no-op for them.
    pub fn free(&mut self, alloc: &mut BlockAllocator) -> Result<()> {
        if let DataContainer::Chain { blocks, .. } = self {
            for b in blocks.drain(..) {
                alloc.free(b)?;
            }
        }
        *self = DataContainer::Inline(Vec::new());
        Ok(())
    }

    /// Reads up to `buf.len()` bytes starting at `offset`, clipped to the
    /// container's current size. Returns the number of bytes actually copied.
    pub fn read(&self, alloc: &BlockAllocator, offset: usize, buf: &mut [u8]) -> Result<usize> {
        let size = self.size();
        if offset >= size {
            return Ok(0);
        }
        let n = buf.len().min(size - offset);
        match self {
            DataContainer::Inline(data) => {
                buf[..n].copy_from_slice(&data[offset..offset + n]);
            }
            DataContainer::Chain { blocks, block_size, .. } => {
                let mut done = 0;
                while done < n {
                    let pos = offset + done;
                    let idx = pos / block_size;
                    let within = pos % block_size;
                    let block_data = alloc.read(blocks[idx])?;
                    let take = (block_data.len() - within).min(n - done);
                    buf[done..done + take].copy_from_slice(&block_data[within..within + take]);
                    done += take;
                }
            }
        }
        Ok(n)
    }

    /// Writes `buf` at `offset`, growing the container (and zero-filling any gap
    /// between the old end and `offset`) if needed.
    pub fn write(
        &mut self,
        alloc: &mut BlockAllocator,
        config: &VolumeConfig,
        offset: usize,
        buf: &[u8],
    ) -> Result<()> {
        let new_size = offset + buf.len();
        if new_size > self.size() {
            self.resize(alloc, config, new_size)?;
        }
        match self {
            DataContainer::Inline(data) => {
                data[offset..offset + buf.len()].copy_from_slice(buf);
            }
            DataContainer::Chain { blocks, block_size, .. } => {
                let mut done = 0;
                while done < buf.len() {
                    let pos = offset + done;
                    let idx = pos / *block_size;
                    let within = pos % *block_size;
                    let cur_len = alloc.block_size(blocks[idx])?;
                    let take = (cur_len - within).min(buf.len() - done);
                    alloc.write(blocks[idx], within, &buf[done..done + take])?;
                    done += take;
                }
            }
        }
        Ok(())
    }

    /// Grows or shrinks the container to exactly `new_size`, zero-filling any newly
    /// exposed bytes on growth. Crosses the inline/chain boundary automatically.
    pub fn resize(&mut self, alloc: &mut BlockAllocator, config: &VolumeConfig, new_size: usize) -> Result<()> {
        let old_size = self.size();
        if new_size == old_size {
            return Ok(());
        }
        if new_size > old_size {
            self.grow(alloc, config, new_size)
        } else {
            self.shrink(alloc, config, new_size)
        }
    }

    fn grow(&mut self, alloc: &mut BlockAllocator, config: &VolumeConfig, new_size: usize) -> Result<()> {
        if let DataContainer::Inline(buf) = self {
            if new_size <= config.inline_threshold {
                buf.resize(new_size, 0);
                return Ok(());
            }
            // Promote to a block chain, carrying the inline bytes along.
            let old_bytes = std::mem::take(buf);
            let mut blocks = Vec::new();
            let mut pos = 0usize;
            while pos < new_size {
                let take = (new_size - pos).min(config.block_size);
                let r = alloc.allocate(take)?;
                let mut chunk = vec![0u8; take];
                if pos < old_bytes.len() {
                    let end = (pos + take).min(old_bytes.len());
                    chunk[..end - pos].copy_from_slice(&old_bytes[pos..end]);
                }
                alloc.write(r, 0, &chunk)?;
                blocks.push(r);
                pos += take;
            }
            *self = DataContainer::Chain {
                blocks,
                size: new_size,
                block_size: config.block_size,
            };
            return Ok(());
        }
        let DataContainer::Chain { blocks, size, block_size } = self else {
            unreachable!()
        };
        let block_size = *block_size;
        let mut remaining = new_size - *size;
        if let Some(&last) = blocks.last() {
            let cur_len = alloc.block_size(last)?;
            let room = block_size - cur_len;
            if room > 0 && remaining > 0 {
                let grow_by = remaining.min(room);
                alloc.resize(last, cur_len + grow_by)?;
                alloc.write(last, cur_len, &vec![0u8; grow_by])?;
                remaining -= grow_by;
            }
        }
        while remaining > 0 {
            let take = remaining.min(block_size);
            let r = alloc.allocate(take)?;
            alloc.write(r, 0, &vec![0u8; take])?;
            blocks.push(r);
            remaining -= take;
        }
        *size = new_size;
        Ok(())
    }

    fn shrink(&mut self, alloc: &mut BlockAllocator, config: &VolumeConfig, new_size: usize) -> Result<()> {
        if let DataContainer::Inline(buf) = self {
            buf.truncate(new_size);
            return Ok(());
        }
        let DataContainer::Chain { blocks, size, block_size } = self else {
            unreachable!()
        };
        let block_size = *block_size;
        let keep_blocks = if new_size == 0 { 0 } else { (new_size - 1) / block_size + 1 };
        while blocks.len() > keep_blocks {
            let b = blocks.pop().unwrap();
            alloc.free(b)?;
        }
        if let Some(&last) = blocks.last() {
            let last_len = new_size - (blocks.len() - 1) * block_size;
            alloc.resize(last, last_len)?;
        }
        *size = new_size;
        if new_size <= config.inline_threshold {
            let mut data = vec![0u8; new_size];
            self.read(alloc, 0, &mut data)?;
            self.free(alloc)?;
            *self = DataContainer::Inline(data);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> VolumeConfig {
        VolumeConfig {
            inline_threshold: 8,
            block_size: 16,
            ..Default::default()
        }
    }

    #[test]
    fn inline_round_trip() {
        let mut alloc = BlockAllocator::new(4096);
        let cfg = config();
        let mut c = DataContainer::new();
        c.write(&mut alloc, &cfg, 0, b"hi").unwrap();
        assert_eq!(c.size(), 2);
        let mut out = [0u8; 2];
        c.read(&alloc, 0, &mut out).unwrap();
        assert_eq!(&out, b"hi");
    }

    #[test]
    fn write_past_threshold_promotes_to_chain_and_zero_fills_gap() {
        let mut alloc = BlockAllocator::new(4096);
        let cfg = config();
        let mut c = DataContainer::new();
        c.write(&mut alloc, &cfg, 0, b"abcd").unwrap();
        c.write(&mut alloc, &cfg, 20, b"end").unwrap();
        assert_eq!(c.size(), 23);
        assert!(matches!(c, DataContainer::Chain { .. }));
        let mut out = vec![0u8; 23];
        c.read(&alloc, 0, &mut out).unwrap();
        assert_eq!(&out[0..4], b"abcd");
        assert_eq!(&out[4..20], &[0u8; 16]);
        assert_eq!(&out[20..23], b"end");
    }

    #[test]
    fn shrink_below_threshold_demotes_to_inline() {
        let mut alloc = BlockAllocator::new(4096);
        let cfg = config();
        let mut c = DataContainer::new();
        c.write(&mut alloc, &cfg, 0, b"0123456789abcdef").unwrap();
        assert!(matches!(c, DataContainer::Chain { .. }));
        c.resize(&mut alloc, &cfg, 4).unwrap();
        assert!(matches!(c, DataContainer::Inline(_)));
        let mut out = [0u8; 4];
        c.read(&alloc, 0, &mut out).unwrap();
        assert_eq!(&out, b"0123");
    }

    #[test]
    fn read_past_end_is_clipped() {
        let mut alloc = BlockAllocator::new(4096);
        let cfg = config();
        let mut c = DataContainer::new();
        c.write(&mut alloc, &cfg, 0, b"abc").unwrap();
        let mut out = [0xffu8; 10];
        let n = c.read(&alloc, 0, &mut out).unwrap();
        assert_eq!(n, 3);
        assert_eq!(&out[..3], b"abc");
    }

    #[test]
    fn multi_block_chain_round_trip() {
        let mut alloc = BlockAllocator::new(4096);
        let cfg = config();
        let mut c = DataContainer::new();
        let data: Vec<u8> = (0u8..100).collect();
        c.write(&mut alloc, &cfg, 0, &data).unwrap();
        let mut out = vec![0u8; 100];
        c.read(&alloc, 0, &mut out).unwrap();
        assert_eq!(out, data);
    }
}
