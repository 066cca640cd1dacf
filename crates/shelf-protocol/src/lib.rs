//! Wire protocol for lfs-shelf.
//!
//! git-lfs drives a custom transfer agent by writing one JSON object per line
//! to the agent's stdin and reading one JSON object per line from its stdout.
//! This crate defines those messages and the line codec; it does no I/O
//! beyond writing an already-encoded line.

pub mod codec;
pub mod error;
pub mod message;

pub use codec::LineCodec;
pub use error::{ProtocolError, ProtocolResult};
pub use message::{
    operations, Action, Completion, Event, InitResponse, Progress, Request, Response,
    TransferError, TransferEvent,
};
