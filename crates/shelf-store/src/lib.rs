//! Folder-backed object storage for lfs-shelf.
//!
//! Objects live in a plain directory tree keyed by their identifier, using the
//! same two-level fan-out as git-lfs's own `.git/lfs/objects` directory:
//!
//! ```text
//! <base>/ab/cd/abcd1234...
//! ```
//!
//! # Components
//!
//! - [`FolderStore`] -- maps an object identifier to its sharded path and
//!   creates the shard directories on demand
//! - [`copy_blocks`] -- copies a known number of bytes in fixed-size blocks,
//!   reporting [`BlockProgress`] after each one
//!
//! # Design Rules
//!
//! 1. Addressing is deterministic: the same identifier always resolves to the
//!    same path under the same base.
//! 2. Shard directories are created lazily and idempotently.
//! 3. The store never hashes or interprets object contents.
//! 4. The copy engine never cleans up after itself; callers own partial files.

pub mod copy;
pub mod error;
pub mod layout;

pub use copy::{copy_blocks, BlockProgress, BLOCK_SIZE};
pub use error::{StoreError, StoreResult};
pub use layout::{FolderStore, MIN_OID_LEN, TEMP_SUFFIX};
