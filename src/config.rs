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

//! Volume-wide tunables: the inline/block threshold of a
//! [`crate::container::DataContainer`], the block-allocator area size, and the
//! limits enforced on names and query keys.

/// Maximum length of a path component (directory/file/symlink/attribute name).
pub const NAME_MAX: usize = 255;
/// Maximum length of a symbolic link target.
pub const PATH_MAX: usize = 4096;
/// Maximum length of an index key (name, attribute value, etc).
pub const MAX_INDEX_KEY_LEN: usize = 256;

/// Per-volume configuration.
#[derive(Debug, Clone, Copy)]
pub struct VolumeConfig {
    /// Size, in bytes, below which a [`crate::container::DataContainer`] stays inline
    /// instead of switching to a block chain.
    pub inline_threshold: usize,
    /// Size of one logical block within a block-chain container.
    pub block_size: usize,
    /// Size of one block-allocator [`crate::alloc::Area`], in bytes.
    pub area_size: usize,
    /// `io_size` reported to callers.
    pub io_size: u32,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            inline_threshold: 32,
            block_size: 4096,
            area_size: 4096 * 16,
            io_size: 65536,
        }
    }
}
