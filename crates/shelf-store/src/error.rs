/// Errors from folder store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The identifier is too short to shard or contains path-unsafe characters.
    #[error("invalid object id {oid:?}: {reason}")]
    InvalidOid { oid: String, reason: &'static str },

    /// I/O error while preparing the storage tree.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
