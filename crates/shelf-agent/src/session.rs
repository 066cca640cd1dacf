use std::io::{BufRead, Write};

use shelf_protocol::{Event, LineCodec, Request, Response, TransferError};
use shelf_store::{BlockProgress, FolderStore};
use tracing::{debug, info, warn};

use crate::config::AgentConfig;
use crate::error::{AgentResult, Failure, TransferFailure};
use crate::responder::Responder;
use crate::transfer::{StoreOutcome, Transfers};

const NOT_CONFIGURED: &str = "base directory not specified, check config";

/// Counters for one finished session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionSummary {
    /// Lines that decoded into a request, including `terminate`.
    pub requests: u64,
    /// Lines skipped because they did not decode.
    pub malformed: u64,
    /// Whether the session ended on `terminate` rather than end of input.
    pub terminated: bool,
}

/// One protocol session over a pair of streams.
///
/// Requests are handled strictly in order. Each transfer runs to its terminal
/// message before the next line is read.
pub struct Session<W: Write> {
    transfers: Option<Transfers>,
    responder: Responder<W>,
}

impl<W: Write> Session<W> {
    pub fn new(config: AgentConfig, writer: W) -> Self {
        let transfers = config
            .base_dir
            .as_ref()
            .map(|base| Transfers::new(FolderStore::new(base), &config));
        Self {
            transfers,
            responder: Responder::new(writer),
        }
    }

    pub fn into_writer(self) -> W {
        self.responder.into_inner()
    }

    /// Read requests until `terminate` or end of input.
    ///
    /// Undecodable lines are logged and skipped. Only a failure to read the
    /// input itself ends the session with an error.
    pub fn serve<R: BufRead>(&mut self, mut reader: R) -> AgentResult<SessionSummary> {
        let mut summary = SessionSummary::default();
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                debug!("end of input");
                break;
            }
            let line = match std::str::from_utf8(&buf) {
                Ok(line) => line,
                Err(e) => {
                    summary.malformed += 1;
                    warn!(error = %e, "skipping input line that is not UTF-8");
                    continue;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            debug!(message = line.trim_end(), "received message");

            let request = match LineCodec::decode_request(line) {
                Ok(request) => request,
                Err(e) => {
                    summary.malformed += 1;
                    warn!(error = %e, "unable to parse request");
                    continue;
                }
            };
            summary.requests += 1;

            if request.event == Event::Terminate {
                info!("terminate received");
                summary.terminated = true;
                break;
            }
            self.handle(&request);
        }

        info!(
            requests = summary.requests,
            malformed = summary.malformed,
            sent = self.responder.sent(),
            "session finished"
        );
        Ok(summary)
    }

    /// Answer one request. `terminate` is the caller's concern.
    pub fn handle(&mut self, request: &Request) {
        match request.event {
            Event::Init => self.init(request),
            Event::Download => self.download(request),
            Event::Upload => self.upload(request),
            Event::Terminate => {}
            Event::Unknown => debug!("ignoring request with unrecognised event"),
        }
    }

    fn init(&mut self, request: &Request) {
        let operation = request.operation.as_deref().unwrap_or("");
        let remote = request.remote.as_deref().unwrap_or("");
        if self.transfers.is_none() {
            warn!(operation, remote, "init without a base directory");
            self.responder.send(&Response::init_error(TransferError::new(
                Failure::NotConfigured.code(),
                NOT_CONFIGURED,
            )));
            return;
        }
        info!(
            operation,
            remote,
            concurrent = request.concurrent,
            concurrenttransfers = request.concurrenttransfers,
            "initialised"
        );
        self.responder.send(&Response::init_ok());
    }

    fn download(&mut self, request: &Request) {
        let oid = request.oid.as_str();
        info!(oid, size = request.size, "received download request");
        let Some(transfers) = self.transfers.as_ref() else {
            self.responder
                .fail(oid, TransferFailure::new(Failure::NotConfigured, NOT_CONFIGURED));
            return;
        };

        let responder = &mut self.responder;
        let mut on_progress = |p: BlockProgress| {
            responder.progress(oid, p.so_far, p.since_last);
        };
        match transfers.retrieve(oid, request.size, &mut on_progress) {
            Ok(staged) => {
                self.responder.complete(oid, Some(staged));
            }
            Err(failure) => {
                warn!(oid, %failure, "download failed");
                self.responder.fail(oid, failure);
            }
        }
    }

    fn upload(&mut self, request: &Request) {
        let oid = request.oid.as_str();
        info!(oid, size = request.size, "received upload request");
        let Some(transfers) = self.transfers.as_ref() else {
            self.responder
                .fail(oid, TransferFailure::new(Failure::NotConfigured, NOT_CONFIGURED));
            return;
        };
        let Some(source) = request.path.as_deref() else {
            self.responder.fail(
                oid,
                TransferFailure::new(Failure::StatSource, "upload request has no path"),
            );
            return;
        };

        let responder = &mut self.responder;
        let mut on_progress = |p: BlockProgress| {
            responder.progress(oid, p.so_far, p.since_last);
        };
        match transfers.store(oid, request.size, source, &mut on_progress) {
            Ok(outcome) => {
                if outcome == StoreOutcome::Linked {
                    info!(oid, "stored by hard link");
                }
                self.responder.complete(oid, None);
            }
            Err(failure) => {
                warn!(oid, %failure, "upload failed");
                self.responder.fail(oid, failure);
            }
        }
    }
}

/// Run one session over `reader` and `writer` with `config`.
pub fn serve<R: BufRead, W: Write>(
    config: AgentConfig,
    reader: R,
    writer: W,
) -> AgentResult<SessionSummary> {
    Session::new(config, writer).serve(reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor, Read};

    fn run(config: AgentConfig, input: &str) -> (SessionSummary, String) {
        let mut session = Session::new(config, Vec::new());
        let summary = session.serve(Cursor::new(input.to_string())).unwrap();
        (summary, String::from_utf8(session.into_writer()).unwrap())
    }

    #[test]
    fn init_without_base_dir_is_code_9() {
        let (summary, out) = run(AgentConfig::default(), "{\"event\":\"init\",\"operation\":\"upload\"}\n");
        assert_eq!(summary.requests, 1);
        let resp = LineCodec::decode_response(out.trim_end()).unwrap();
        let err = resp.error().unwrap();
        assert_eq!(err.code, 9);
        assert_eq!(err.message, NOT_CONFIGURED);
    }

    #[test]
    fn init_with_base_dir_acknowledges() {
        let dir = tempfile::tempdir().unwrap();
        let (_, out) = run(
            AgentConfig::with_base_dir(dir.path()),
            "{\"event\":\"init\",\"operation\":\"download\",\"remote\":\"origin\",\"concurrent\":true,\"concurrenttransfers\":3}\n",
        );
        assert_eq!(out, "{}\n");
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let (summary, out) = run(
            AgentConfig::with_base_dir(dir.path()),
            "not json\n{\"event\":\n\n{\"event\":\"init\"}\n",
        );
        assert_eq!(summary.malformed, 2);
        assert_eq!(summary.requests, 1);
        assert!(!summary.terminated);
        assert_eq!(out, "{}\n");
    }

    #[test]
    fn invalid_utf8_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let mut input = vec![0xff, 0xfe, b'\n'];
        input.extend_from_slice(b"{\"event\":\"init\"}\n");
        let mut session = Session::new(AgentConfig::with_base_dir(dir.path()), Vec::new());
        let summary = session.serve(Cursor::new(input)).unwrap();
        assert_eq!(summary.malformed, 1);
        assert_eq!(session.into_writer(), b"{}\n");
    }

    #[test]
    fn unknown_event_gets_no_response() {
        let dir = tempfile::tempdir().unwrap();
        let (summary, out) = run(AgentConfig::with_base_dir(dir.path()), "{\"event\":\"resume\"}\n");
        assert_eq!(summary.requests, 1);
        assert!(out.is_empty());
    }

    #[test]
    fn transfer_before_configuration_fails() {
        let (_, out) = run(
            AgentConfig::default(),
            "{\"event\":\"download\",\"oid\":\"abcd1234\",\"size\":1}\n",
        );
        let resp = LineCodec::decode_response(out.trim_end()).unwrap();
        assert_eq!(resp.oid(), Some("abcd1234"));
        assert_eq!(resp.error().unwrap().code, 9);
    }

    #[test]
    fn upload_without_path_is_code_13() {
        let dir = tempfile::tempdir().unwrap();
        let (_, out) = run(
            AgentConfig::with_base_dir(dir.path()),
            "{\"event\":\"upload\",\"oid\":\"abcd1234\",\"size\":1}\n",
        );
        let resp = LineCodec::decode_response(out.trim_end()).unwrap();
        assert_eq!(resp.error().unwrap().code, 13);
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "stdin closed badly"))
        }
    }

    proptest::proptest! {
        #[test]
        fn non_json_lines_get_no_response(lines in proptest::collection::vec("[^{\\[\\n]{0,40}", 0..8)) {
            let mut input = lines.join("\n");
            input.push('\n');
            let (summary, out) = run(AgentConfig::default(), &input);
            proptest::prop_assert!(out.is_empty());
            proptest::prop_assert_eq!(summary.requests, 0);
            proptest::prop_assert!(!summary.terminated);
        }
    }

    #[test]
    fn read_error_ends_session() {
        let mut session = Session::new(AgentConfig::default(), Vec::new());
        let err = session
            .serve(io::BufReader::new(FailingReader))
            .unwrap_err();
        assert!(matches!(err, crate::error::AgentError::Io(_)));
    }
}
