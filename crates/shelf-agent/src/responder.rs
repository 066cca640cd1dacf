use std::io::Write;

use shelf_protocol::{LineCodec, Response, TransferError};
use tracing::{debug, warn};

/// Output half of a session.
///
/// Every message goes out as one flushed line. A failed send is logged and
/// dropped: once the peer has gone away there is nobody left to tell.
pub struct Responder<W: Write> {
    writer: W,
    sent: u64,
    failed: u64,
}

impl<W: Write> Responder<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            sent: 0,
            failed: 0,
        }
    }

    /// Send one message. Returns `false` if it could not be written.
    pub fn send(&mut self, msg: &Response) -> bool {
        match LineCodec::write_message(&mut self.writer, msg) {
            Ok(line) => {
                self.sent += 1;
                debug!(
                    message = %String::from_utf8_lossy(&line).trim_end(),
                    "sent message"
                );
                true
            }
            Err(e) => {
                self.failed += 1;
                warn!(kind = msg.type_name(), oid = msg.oid().unwrap_or(""), error = %e, "unable to send message");
                false
            }
        }
    }

    pub fn progress(&mut self, oid: &str, bytes_so_far: u64, bytes_since_last: u64) -> bool {
        self.send(&Response::progress(oid, bytes_so_far, bytes_since_last))
    }

    pub fn complete(&mut self, oid: &str, path: Option<std::path::PathBuf>) -> bool {
        self.send(&Response::complete(oid, path))
    }

    pub fn fail(&mut self, oid: &str, error: impl Into<TransferError>) -> bool {
        self.send(&Response::failed(oid, error.into()))
    }

    /// Messages written successfully.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Messages dropped because the write failed.
    pub fn failed(&self) -> u64 {
        self.failed
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
