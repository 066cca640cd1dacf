use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event kind carried by every request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Event {
    Init,
    Upload,
    Download,
    Terminate,
    /// Missing or unrecognised event. Decoded so the line is not treated as
    /// malformed, but never answered.
    #[default]
    #[serde(other)]
    Unknown,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Upload => "upload",
            Self::Download => "download",
            Self::Terminate => "terminate",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remote action descriptor.
///
/// Only meaningful to transfer agents that talk to an HTTP endpoint. A folder
/// store never reads it, but accepts it so requests keep their full shape.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    #[serde(default)]
    pub href: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub header: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// One decoded input line.
///
/// Every field is optional on the wire; which ones matter depends on
/// [`Request::event`]. Unknown fields are ignored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Request {
    pub event: Event,
    /// `upload` or `download`; sent with `init` only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    /// Name of the git remote; sent with `init` only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
    /// Concurrency hints. Each agent process serves one sequential stream,
    /// so these are accepted and ignored.
    pub concurrent: bool,
    pub concurrenttransfers: u32,
    pub oid: String,
    /// Declared object size in bytes.
    pub size: u64,
    /// Local source file for `upload`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
}

impl Request {
    pub fn init(operation: &str) -> Self {
        Self {
            event: Event::Init,
            operation: Some(operation.to_string()),
            ..Self::default()
        }
    }

    pub fn download(oid: impl Into<String>, size: u64) -> Self {
        Self {
            event: Event::Download,
            oid: oid.into(),
            size,
            action: Some(Action::default()),
            ..Self::default()
        }
    }

    pub fn upload(oid: impl Into<String>, size: u64, path: impl Into<PathBuf>) -> Self {
        Self {
            event: Event::Upload,
            oid: oid.into(),
            size,
            path: Some(path.into()),
            action: Some(Action::default()),
            ..Self::default()
        }
    }

    pub fn terminate() -> Self {
        Self {
            event: Event::Terminate,
            ..Self::default()
        }
    }
}

/// Error embedded in an init acknowledgement or a completion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferError {
    pub code: u32,
    pub message: String,
}

impl TransferError {
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for TransferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Reply to `init`: `{}` on success.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TransferError>,
}

/// Terminal message for one transfer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub oid: String,
    /// Where the downloaded bytes were left. Never set for uploads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TransferError>,
}

/// Intermediate progress report for one transfer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub oid: String,
    pub bytes_so_far: u64,
    pub bytes_since_last: u64,
}

/// Messages tagged with an `event` field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TransferEvent {
    Complete(Completion),
    Progress(Progress),
}

/// Every message the agent writes to its output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Transfer(TransferEvent),
    Init(InitResponse),
}

impl Response {
    pub fn init_ok() -> Self {
        Self::Init(InitResponse::default())
    }

    pub fn init_error(error: TransferError) -> Self {
        Self::Init(InitResponse { error: Some(error) })
    }

    pub fn progress(oid: impl Into<String>, bytes_so_far: u64, bytes_since_last: u64) -> Self {
        Self::Transfer(TransferEvent::Progress(Progress {
            oid: oid.into(),
            bytes_so_far,
            bytes_since_last,
        }))
    }

    pub fn complete(oid: impl Into<String>, path: Option<PathBuf>) -> Self {
        Self::Transfer(TransferEvent::Complete(Completion {
            oid: oid.into(),
            path,
            error: None,
        }))
    }

    pub fn failed(oid: impl Into<String>, error: TransferError) -> Self {
        Self::Transfer(TransferEvent::Complete(Completion {
            oid: oid.into(),
            path: None,
            error: Some(error),
        }))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Init(_) => "init",
            Self::Transfer(TransferEvent::Complete(_)) => "complete",
            Self::Transfer(TransferEvent::Progress(_)) => "progress",
        }
    }

    /// The object this message refers to, if any.
    pub fn oid(&self) -> Option<&str> {
        match self {
            Self::Init(_) => None,
            Self::Transfer(TransferEvent::Complete(c)) => Some(&c.oid),
            Self::Transfer(TransferEvent::Progress(p)) => Some(&p.oid),
        }
    }

    /// The embedded error, if this message reports one.
    pub fn error(&self) -> Option<&TransferError> {
        match self {
            Self::Init(r) => r.error.as_ref(),
            Self::Transfer(TransferEvent::Complete(c)) => c.error.as_ref(),
            Self::Transfer(TransferEvent::Progress(_)) => None,
        }
    }
}

/// Operation names sent with `init`.
pub mod operations {
    pub const UPLOAD: &str = "upload";
    pub const DOWNLOAD: &str = "download";
}
