//! git-lfs custom transfer agent backed by a shared folder.
//!
//! A [`Session`] reads requests from one stream and writes responses to
//! another. Uploads are copied into a [`FolderStore`](shelf_store::FolderStore)
//! through a temp file and a rename. Downloads are staged in a temp file that
//! git-lfs moves into its own object directory.

pub mod config;
pub mod error;
pub mod responder;
pub mod session;
pub mod transfer;

pub use config::{AgentConfig, LinkMode};
pub use error::{AgentError, AgentResult, Failure, TransferFailure};
pub use responder::Responder;
pub use session::{serve, Session, SessionSummary};
pub use transfer::{StoreOutcome, Transfers, STAGING_PREFIX};
