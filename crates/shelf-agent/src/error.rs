use std::fmt;

use shelf_protocol::TransferError;
use thiserror::Error;

/// The step a request failed at. Each maps to the code git-lfs sees.
///
/// Codes are stable within a release but are not a versioned contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Failure {
    /// `init` arrived but no base directory is configured.
    NotConfigured,

    /// Download: stored object missing or unreadable metadata.
    StatStored,
    /// Download: stored path is not a regular file.
    NotRegularFile,
    /// Download: staging file could not be created.
    CreateStaging,
    /// Download: stored object could not be opened.
    OpenStored,
    /// Download: copy into the staging file failed.
    CopyDownload,
    /// Download: staging file could not be flushed to disk.
    CloseStaging,

    /// Upload: source file missing or unreadable metadata.
    StatSource,
    /// Upload: shard directory could not be created, or a stale temp file
    /// could not be removed.
    PrepareDestination,
    /// Upload: source file could not be opened.
    OpenSource,
    /// Upload: `<dest>.tmp` could not be created.
    CreateTemp,
    /// Upload: copy into `<dest>.tmp` failed.
    CopyUpload,
    /// Upload: `<dest>.tmp` could not be renamed onto the destination.
    Finalize,
}

impl Failure {
    pub fn code(self) -> u32 {
        match self {
            Self::NotConfigured => 9,
            Self::StatStored => 3,
            Self::NotRegularFile => 4,
            Self::CreateStaging | Self::CloseStaging => 5,
            Self::OpenStored => 6,
            Self::CopyDownload => 7,
            Self::StatSource => 13,
            Self::PrepareDestination => 14,
            Self::OpenSource => 15,
            Self::CreateTemp => 16,
            Self::CopyUpload => 17,
            Self::Finalize => 18,
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotConfigured => "not-configured",
            Self::StatStored => "stat-stored",
            Self::NotRegularFile => "not-regular-file",
            Self::CreateStaging => "create-staging",
            Self::OpenStored => "open-stored",
            Self::CopyDownload => "copy-download",
            Self::CloseStaging => "close-staging",
            Self::StatSource => "stat-source",
            Self::PrepareDestination => "prepare-destination",
            Self::OpenSource => "open-source",
            Self::CreateTemp => "create-temp",
            Self::CopyUpload => "copy-upload",
            Self::Finalize => "finalize",
        };
        f.write_str(name)
    }
}

/// A failed transfer: which step broke and a message for the user.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{failure} (code {code}): {message}", code = .failure.code())]
pub struct TransferFailure {
    pub failure: Failure,
    pub message: String,
}

impl TransferFailure {
    pub fn new(failure: Failure, message: impl Into<String>) -> Self {
        Self {
            failure,
            message: message.into(),
        }
    }

    pub fn code(&self) -> u32 {
        self.failure.code()
    }
}

impl From<TransferFailure> for TransferError {
    fn from(f: TransferFailure) -> Self {
        TransferError::new(f.failure.code(), f.message)
    }
}

/// Session-level errors. Per-request failures never surface here.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("protocol error: {0}")]
    Protocol(#[from] shelf_protocol::ProtocolError),

    #[error("store error: {0}")]
    Store(#[from] shelf_store::StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AgentResult<T> = Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_codes() {
        assert_eq!(Failure::StatStored.code(), 3);
        assert_eq!(Failure::NotRegularFile.code(), 4);
        assert_eq!(Failure::CreateStaging.code(), 5);
        assert_eq!(Failure::OpenStored.code(), 6);
        assert_eq!(Failure::CopyDownload.code(), 7);
        assert_eq!(Failure::CloseStaging.code(), 5);
    }

    #[test]
    fn upload_codes() {
        assert_eq!(Failure::StatSource.code(), 13);
        assert_eq!(Failure::PrepareDestination.code(), 14);
        assert_eq!(Failure::OpenSource.code(), 15);
        assert_eq!(Failure::CreateTemp.code(), 16);
        assert_eq!(Failure::CopyUpload.code(), 17);
        assert_eq!(Failure::Finalize.code(), 18);
    }

    #[test]
    fn init_code() {
        assert_eq!(Failure::NotConfigured.code(), 9);
    }

    #[test]
    fn failure_converts_to_wire_error() {
        let f = TransferFailure::new(Failure::CopyUpload, "disk full");
        assert_eq!(f.to_string(), "copy-upload (code 17): disk full");
        let wire: TransferError = f.into();
        assert_eq!(wire, TransferError::new(17, "disk full"));
    }
}
