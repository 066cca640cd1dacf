use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{StoreError, StoreResult};

/// Shortest identifier that can be split into two shard levels.
pub const MIN_OID_LEN: usize = 4;

/// Suffix of the in-progress upload file written next to its destination.
pub const TEMP_SUFFIX: &str = ".tmp";

/// A content-addressed directory tree.
///
/// Every object is stored at `base/oid[0..2]/oid[2..4]/oid`. The store is
/// shared by every repository pointed at the same base directory; use a
/// different base to keep repositories apart.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FolderStore {
    base: PathBuf,
}

impl FolderStore {
    /// Create a store rooted at `base`. The directory is not touched.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Compute the sharded path for `oid` without touching the filesystem.
    pub fn object_path(&self, oid: &str) -> StoreResult<PathBuf> {
        check_oid(oid)?;
        Ok(self.base.join(&oid[0..2]).join(&oid[2..4]).join(oid))
    }

    /// Compute the sharded path for `oid` and make sure both shard
    /// directories exist. Existing directories are not an error.
    pub fn resolve(&self, oid: &str) -> StoreResult<PathBuf> {
        let path = self.object_path(oid)?;
        if let Some(shard) = path.parent() {
            fs::create_dir_all(shard)?;
            debug!(shard = %shard.display(), "shard directory ready");
        }
        Ok(path)
    }

    /// The well-known temp path used while writing `dest`: `<dest>.tmp`.
    pub fn temp_path_for(dest: &Path) -> PathBuf {
        let mut name = OsString::from(dest.as_os_str());
        name.push(TEMP_SUFFIX);
        PathBuf::from(name)
    }
}

/// Identifiers become path components, so only ASCII alphanumerics are
/// accepted. Case is left untouched.
fn check_oid(oid: &str) -> StoreResult<()> {
    if oid.len() < MIN_OID_LEN {
        return Err(StoreError::InvalidOid {
            oid: oid.to_string(),
            reason: "shorter than 4 characters",
        });
    }
    if !oid.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(StoreError::InvalidOid {
            oid: oid.to_string(),
            reason: "contains characters other than ASCII letters and digits",
        });
    }
    Ok(())
}
