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

//! An in-memory, hierarchical, POSIX-shaped filesystem core.
//!
//! This crate holds everything a host kernel's VFS needs *except* the VFS glue
//! itself: no file descriptors, no permission-checking vnode lifecycle, no mount
//! command line, no page cache. What is here is the data structure a `tmpfs`-style
//! mount actually keeps in memory — directories, files and symlinks linked by name,
//! a block allocator and layered data container behind file and attribute content,
//! ordered indices over names/sizes/mtimes/user attributes, a small query language
//! over those indices, and a live-update channel that keeps an open query's result
//! set in sync with mutations as they happen.
//!
//! [`Volume`] is the crate's front door: it owns one [`Graph`], one allocator, one
//! index directory and one listener bus behind a lock hierarchy, and exposes the
//! method surface a VFS shim calls into (lookup, stat, create/unlink/rename, file
//! and attribute I/O, directory/attribute/index iteration, live queries).
//! Everything below it (`graph`, `node`, `table`, `container`, `alloc`, `index`,
//! `tree`, `query`, `iter`, `suspend`, `listener`) is usable on its own for anyone
//! embedding just the data structures without the locking and notification layer.

pub mod alloc;
pub mod config;
pub mod container;
pub mod error;
pub mod graph;
pub mod ids;
pub mod index;
pub mod iter;
pub mod listener;
pub mod logging;
pub mod node;
pub mod notify;
pub mod query;
pub mod suspend;
pub mod table;
pub mod tree;
pub mod volume;

pub use error::{Error, Result};
pub use graph::{Graph, NullHooks, VnodeHooks};
pub use ids::{AttributeId, EntryId, NodeId, Timestamp};
pub use node::{AttrType, Credentials, Mode};
pub use volume::{DirEntryRecord, FsInfo, QueryCookie, Stat, StatUpdate, Volume};
