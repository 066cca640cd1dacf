//! Download and upload against the folder store.
//!
//! Both operations report progress through a callback and return either a
//! result or a [`TransferFailure`] naming the step that broke. Partial files
//! are removed before a failure is returned.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use shelf_store::{copy_blocks, BlockProgress, FolderStore};
use tempfile::TempPath;
use tracing::{debug, info, warn};

use crate::config::{AgentConfig, LinkMode};
use crate::error::{Failure, TransferFailure};

/// Prefix of staged download files.
pub const STAGING_PREFIX: &str = "lfs-shelf";

/// How an upload finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreOutcome {
    /// Bytes were copied into the store.
    Copied,
    /// The source was hard-linked into the store.
    Linked,
    /// An object of the same size was already stored; nothing was written.
    AlreadyStored,
}

/// Runs transfers for one session.
#[derive(Clone, Debug)]
pub struct Transfers {
    store: FolderStore,
    staging_dir: PathBuf,
    link_mode: LinkMode,
}

impl Transfers {
    pub fn new(store: FolderStore, config: &AgentConfig) -> Self {
        Self {
            store,
            staging_dir: config.download_dir(),
            link_mode: config.link_mode,
        }
    }

    /// Copy a stored object into a fresh staging file and return its path.
    ///
    /// git-lfs moves the staged file into its own object directory, so the
    /// file is left in place on success.
    pub fn retrieve(
        &self,
        oid: &str,
        size: u64,
        on_progress: &mut dyn FnMut(BlockProgress),
    ) -> Result<PathBuf, TransferFailure> {
        let path = self.store.resolve(oid).map_err(|e| {
            TransferFailure::new(Failure::StatStored, format!("cannot resolve {oid:?}: {e}"))
        })?;
        let meta = fs::metadata(&path).map_err(|e| {
            TransferFailure::new(
                Failure::StatStored,
                format!("cannot stat {}: {e}", path.display()),
            )
        })?;
        if !meta.is_file() {
            return Err(TransferFailure::new(
                Failure::NotRegularFile,
                format!("store corruption, {} is not a regular file", path.display()),
            ));
        }
        if meta.len() != size {
            warn!(oid, declared = size, stored = meta.len(), "declared size differs from stored object");
        }

        // Dropped (and deleted) on every early return below.
        let mut staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempfile_in(&self.staging_dir)
            .map_err(|e| {
                TransferFailure::new(
                    Failure::CreateStaging,
                    format!("error creating temp file for {}: {e}", path.display()),
                )
            })?;

        let mut src = File::open(&path).map_err(|e| {
            TransferFailure::new(
                Failure::OpenStored,
                format!("cannot read data from {}: {e}", path.display()),
            )
        })?;

        let copied = copy_blocks(size, &mut src, staging.as_file_mut(), Some(on_progress))
            .map_err(|e| {
                TransferFailure::new(
                    Failure::CopyDownload,
                    format!("error copying file from {}: {e}", path.display()),
                )
            })?;

        let close_failure = |e: io::Error| {
            TransferFailure::new(
                Failure::CloseStaging,
                format!("cannot close temp file for {oid}: {e}"),
            )
        };
        staging.as_file().sync_all().map_err(close_failure)?;
        let (_file, staged) = staging.keep().map_err(|e| close_failure(e.error))?;

        debug!(oid, bytes = copied, staged = %staged.display(), "download staged");
        Ok(staged)
    }

    /// Put `source` into the store under `oid`.
    ///
    /// The bytes land in `<dest>.tmp` first and are renamed onto the
    /// destination, so readers see either the previous object or the new one,
    /// never a partial file. An existing object of the same size as `source`
    /// is taken as already stored; its contents are not compared.
    pub fn store(
        &self,
        oid: &str,
        size: u64,
        source: &Path,
        on_progress: &mut dyn FnMut(BlockProgress),
    ) -> Result<StoreOutcome, TransferFailure> {
        let src_meta = fs::metadata(source).map_err(|e| {
            TransferFailure::new(
                Failure::StatSource,
                format!("cannot stat {}: {e}", source.display()),
            )
        })?;
        let src_len = src_meta.len();
        if src_len != size {
            warn!(oid, declared = size, actual = src_len, "declared size differs from source file");
        }

        let dest = self.store.resolve(oid).map_err(|e| {
            TransferFailure::new(
                Failure::PrepareDestination,
                format!("cannot prepare storage for {oid:?}: {e}"),
            )
        })?;

        if let Ok(existing) = fs::metadata(&dest) {
            if existing.is_file() && existing.len() == src_len {
                info!(oid, "skipping {oid}, already stored");
                on_progress(full(src_len));
                return Ok(StoreOutcome::AlreadyStored);
            }
        }

        let tmp = FolderStore::temp_path_for(&dest);
        match fs::remove_file(&tmp) {
            Ok(()) => debug!(path = %tmp.display(), "removed stale temp file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(TransferFailure::new(
                    Failure::PrepareDestination,
                    format!("cannot remove existing temp file {}: {e}", tmp.display()),
                ))
            }
        }

        if self.link_mode == LinkMode::HardLink {
            match fs::hard_link(source, &tmp) {
                Ok(()) => {
                    finalize(track_temp(&tmp, Failure::Finalize)?, &dest)?;
                    on_progress(full(src_len));
                    debug!(oid, "linked into store");
                    return Ok(StoreOutcome::Linked);
                }
                Err(e) => debug!(oid, error = %e, "hard link failed, copying instead"),
            }
        }

        let mut src = File::open(source).map_err(|e| {
            TransferFailure::new(
                Failure::OpenSource,
                format!("cannot read data from {}: {e}", source.display()),
            )
        })?;

        let create_failure = |e: io::Error| {
            TransferFailure::new(
                Failure::CreateTemp,
                format!("cannot open temp file for writing {}: {e}", tmp.display()),
            )
        };
        let mut out = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp)
            .map_err(create_failure)?;
        // From here on the temp file is removed unless it is persisted.
        let guard = track_temp(&tmp, Failure::CreateTemp)?;
        out.set_permissions(src_meta.permissions())
            .map_err(create_failure)?;

        let copy_failure = |e: io::Error| {
            TransferFailure::new(
                Failure::CopyUpload,
                format!("error writing temp file {}: {e}", tmp.display()),
            )
        };
        let copied = copy_blocks(size, &mut src, &mut out, Some(on_progress)).map_err(copy_failure)?;
        out.sync_all().map_err(copy_failure)?;
        drop(out);
        drop(src);

        finalize(guard, &dest)?;
        debug!(oid, bytes = copied, dest = %dest.display(), "object stored");
        Ok(StoreOutcome::Copied)
    }
}

/// Take ownership of `tmp` so it is deleted unless persisted. If that fails
/// the file is removed here.
fn track_temp(tmp: &Path, failure: Failure) -> Result<TempPath, TransferFailure> {
    TempPath::try_from_path(tmp).map_err(|e| {
        let _ = fs::remove_file(tmp);
        TransferFailure::new(
            failure,
            format!("cannot track temp file {}: {e}", tmp.display()),
        )
    })
}

/// Rename the temp file onto `dest`. The temp file is removed if this fails.
fn finalize(tmp: TempPath, dest: &Path) -> Result<(), TransferFailure> {
    tmp.persist(dest).map_err(|e| {
        TransferFailure::new(
            Failure::Finalize,
            format!("error moving temp file to final location: {}", e.error),
        )
    })
}

fn full(len: u64) -> BlockProgress {
    BlockProgress {
        total: len,
        so_far: len,
        since_last: len,
    }
}
