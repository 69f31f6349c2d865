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

//! The error kinds surfaced by the core, and the `Result` alias used throughout.
//!
//! Every public operation returns [`Result<T>`] rather than panicking; the only
//! exception is an invariant violation, which trips [`Error::Internal`] and, for the
//! block allocator, its panic mode (see [`crate::alloc`]).

use thiserror::Error;

/// Errors the core can surface to its caller (a VFS shim, in a real mount).
#[derive(Error, Debug, Clone, Copy, Eq, PartialEq)]
pub enum Error {
    /// Writing a reserved attribute name, linking a directory, or mutating an
    /// already-removed directory.
    #[error("operation not allowed")]
    NotAllowed,
    /// Lookup of a missing node, entry, attribute, or index.
    #[error("not found")]
    NotFound,
    /// An entry or index with that name already exists.
    #[error("already exists")]
    AlreadyExists,
    /// A directory-only operation was attempted on a non-directory.
    #[error("not a directory")]
    NotADirectory,
    /// A non-directory-only operation was attempted on a directory.
    #[error("is a directory")]
    IsADirectory,
    /// Removing a non-empty directory.
    #[error("directory not empty")]
    DirectoryNotEmpty,
    /// A rename target is a non-empty directory.
    #[error("name in use")]
    NameInUse,
    /// Null/invalid parameters, a malformed query, or a key length mismatch for a
    /// fixed-length index.
    #[error("bad value")]
    BadValue,
    /// Allocation failed, anywhere in the core.
    #[error("out of memory")]
    OutOfMemory,
    /// A `read_dir` / `read_query` output record would not fit in the caller's buffer.
    #[error("buffer overflow")]
    BufferOverflow,
    /// The operation is not implemented for this kind of node.
    #[error("unsupported")]
    Unsupported,
    /// A lock acquisition was cancelled before it completed.
    #[error("cancelled")]
    Cancelled,
    /// An invariant check failed. For the block allocator this also trips panic mode.
    #[error("internal invariant violation")]
    Internal,
}

/// The result type used throughout the core.
pub type Result<T> = core::result::Result<T, Error>;
