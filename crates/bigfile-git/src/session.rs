// Copyright (C) 2026  winnyboy5
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Persistent filter session
//!
//! One session serves many clean/smudge requests over a single pair of
//! streams. Requests are answered strictly in order; a request is fully
//! answered and flushed before the next one is read.
//!
//! ```text
//! AwaitingHandshake ──accept──► Ready ◄──────┐
//!        │                       │            │ response flushed
//!        │ reject / EOF          ├─request──► Dispatch
//!        ▼                       │
//!   Terminated ◄──end / EOF / cancel / fault
//! ```

use crate::error::{SessionError, SessionResult, TransformError};
use crate::pointer::{Pointer, MAX_POINTER_SIZE};
use crate::protocol::{
    payload_reader, read_host_reply, write_offer, FrameCodec, HostReply, Operation, Record, RequestHeader,
    DEFAULT_MAX_PAYLOAD_SIZE,
};
use crate::transform::{FilterDriver, SmudgeOutput};
use std::fmt;
use tokio::io::{AsyncBufRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Session settings
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Largest payload accepted in one request
    pub max_payload_size: u64,
    /// Checked before reading each request
    pub cancel: CancellationToken,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            cancel: CancellationToken::new(),
        }
    }
}

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Offer written, waiting for the host
    AwaitingHandshake,
    /// Waiting for the next request
    Ready,
    /// Running a transform
    Dispatch,
    /// No further reads or writes
    Terminated,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::AwaitingHandshake => "awaiting-handshake",
            SessionState::Ready => "ready",
            SessionState::Dispatch => "dispatch",
            SessionState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Why a session ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Input ended between requests
    EndOfStream,
    /// Host sent the end marker
    EndMarker,
    /// Host rejected the handshake
    Rejected,
    /// Cancellation was requested
    Cancelled,
}

/// Counters for one session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    /// How the session ended
    pub outcome: SessionOutcome,
    /// Clean requests answered
    pub cleaned: u64,
    /// Smudge requests answered
    pub smudged: u64,
    /// Requests answered with the pass-through signal
    pub passed_through: u64,
    /// Smudges answered with the pointer after a failed download
    pub download_errors: u64,
}

impl SessionSummary {
    fn new() -> Self {
        Self {
            outcome: SessionOutcome::EndOfStream,
            cleaned: 0,
            smudged: 0,
            passed_through: 0,
            download_errors: 0,
        }
    }
}

/// A filter session over a reader/writer pair
pub struct FilterSession<R, W> {
    driver: FilterDriver,
    config: SessionConfig,
    reader: R,
    writer: W,
    state: SessionState,
    summary: SessionSummary,
}

impl<R, W> FilterSession<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Create a session; nothing is written until [`run`](Self::run)
    pub fn new(driver: FilterDriver, config: SessionConfig, reader: R, writer: W) -> Self {
        Self {
            driver,
            config,
            reader,
            writer,
            state: SessionState::AwaitingHandshake,
            summary: SessionSummary::new(),
        }
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Give back the streams
    pub fn into_inner(self) -> (R, W) {
        (self.reader, self.writer)
    }

    /// Handshake, then serve requests until the session terminates
    ///
    /// Any error is fatal; its [`exit_code`](SessionError::exit_code) is the
    /// process status to report.
    pub async fn run(&mut self) -> SessionResult<SessionSummary> {
        let result = self.serve().await;
        self.transition(SessionState::Terminated);

        match &result {
            Ok(summary) => info!(
                outcome = ?summary.outcome,
                cleaned = summary.cleaned,
                smudged = summary.smudged,
                passed_through = summary.passed_through,
                "Filter session finished"
            ),
            Err(e) => warn!(error = %e, exit_code = e.exit_code(), "Filter session failed"),
        }
        result
    }

    async fn serve(&mut self) -> SessionResult<SessionSummary> {
        write_offer(&mut self.writer).await?;

        let framing = match read_host_reply(&mut self.reader).await? {
            HostReply::Accept { host_version, framing } => {
                debug!(host_version = %host_version, framing = %framing, "Handshake accepted");
                framing
            }
            HostReply::Reject => {
                info!("Host rejected the filter session");
                return Ok(self.finish(SessionOutcome::Rejected));
            }
        };
        let codec = FrameCodec::new(framing, self.config.max_payload_size);
        self.transition(SessionState::Ready);

        loop {
            if self.config.cancel.is_cancelled() {
                return Ok(self.finish(SessionOutcome::Cancelled));
            }

            let header = match codec.read_record(&mut self.reader).await? {
                Record::Request(header) => header,
                Record::End => return Ok(self.finish(SessionOutcome::EndMarker)),
                Record::EndOfStream => return Ok(self.finish(SessionOutcome::EndOfStream)),
            };

            self.transition(SessionState::Dispatch);
            debug!(
                operation = %header.operation,
                filename = %header.filename,
                len = header.payload_len,
                "Request"
            );
            match header.operation {
                Operation::Clean => self.clean(&codec, &header).await?,
                Operation::Smudge => self.smudge(&codec, &header).await?,
            }
            self.writer.flush().await?;
            self.transition(SessionState::Ready);
        }
    }

    async fn clean(&mut self, codec: &FrameCodec, header: &RequestHeader) -> SessionResult<()> {
        let mut payload = payload_reader(&mut self.reader, header);
        let result = self
            .driver
            .clean(&mut payload, &header.filename, Some(header.payload_len))
            .await;
        if payload.is_truncated() {
            return Err(payload.truncation().into());
        }
        payload.drain().await?;

        let pointer = result.map_err(|source| SessionError::Transform {
            filename: header.filename.clone(),
            source,
        })?;
        let encoded = pointer.encode();
        if encoded.is_empty() {
            self.summary.passed_through += 1;
        }
        self.summary.cleaned += 1;

        codec
            .write_response_header(&mut self.writer, encoded.len() as u64)
            .await?;
        self.writer.write_all(&encoded).await?;
        Ok(())
    }

    async fn smudge(&mut self, codec: &FrameCodec, header: &RequestHeader) -> SessionResult<()> {
        let mut payload = payload_reader(&mut self.reader, header);
        let mut head = Vec::with_capacity(MAX_POINTER_SIZE + 1);
        let read = (&mut payload)
            .take(MAX_POINTER_SIZE as u64 + 1)
            .read_to_end(&mut head)
            .await;
        if payload.is_truncated() {
            return Err(payload.truncation().into());
        }
        read?;
        payload.drain().await?;

        let allow = self.driver.download_allowed(&header.filename);
        let output = match self.driver.smudge(&head[..], &header.filename, allow).await {
            Ok(output) => output,
            Err(TransformError::Download { oid, source }) => {
                if !self.driver.config().skip_download_errors {
                    return Err(SessionError::Download {
                        oid,
                        filename: header.filename.clone(),
                        source,
                    });
                }
                warn!(filename = %header.filename, oid = %oid, error = %source, "Download failed, leaving pointer");
                self.summary.download_errors += 1;
                match Pointer::decode(&head) {
                    Ok(pointer) => SmudgeOutput::Pointer(pointer),
                    Err(_) => SmudgeOutput::PassThrough,
                }
            }
            Err(source) => {
                return Err(SessionError::Transform {
                    filename: header.filename.clone(),
                    source,
                })
            }
        };

        if matches!(output, SmudgeOutput::PassThrough) {
            self.summary.passed_through += 1;
        }
        self.summary.smudged += 1;

        let len = output.len();
        codec.write_response_header(&mut self.writer, len).await?;
        output.write_to(&mut self.writer).await?;
        Ok(())
    }

    fn finish(&mut self, outcome: SessionOutcome) -> SessionSummary {
        debug!(outcome = ?outcome, "Session terminating");
        self.summary.outcome = outcome;
        self.summary
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "Session state");
            self.state = next;
        }
    }
}

impl<R, W> fmt::Debug for FilterSession<R, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterSession")
            .field("state", &self.state)
            .field("summary", &self.summary)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProtocolFault;
    use crate::protocol::Framing;
    use crate::transform::FilterConfig;
    use crate::transfer::NoTransfer;
    use bigfile_storage::{ObjectStore, Oid};
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn setup(config: FilterConfig) -> (TempDir, FilterDriver) {
        let temp_dir = TempDir::new().unwrap();
        let store = ObjectStore::open(temp_dir.path()).await.unwrap();
        (temp_dir, FilterDriver::new(config, store, Arc::new(NoTransfer)))
    }

    fn host_input(framing: Framing, records: &[(Operation, &str, &[u8])], end: bool) -> Vec<u8> {
        let codec = FrameCodec::new(framing, u64::MAX);
        let mut input = format!("bigfile-host/1 framing={}\n", framing).into_bytes();
        for (operation, name, payload) in records {
            input.extend(codec.encode_request(*operation, name, payload));
        }
        if end {
            input.extend(codec.encode_end());
        }
        input
    }

    async fn run(
        driver: FilterDriver,
        input: Vec<u8>,
    ) -> (SessionResult<SessionSummary>, SessionState, Vec<u8>) {
        let mut session = FilterSession::new(driver, SessionConfig::default(), &input[..], Vec::new());
        let result = session.run().await;
        let state = session.state();
        let (_, output) = session.into_inner();
        (result, state, output)
    }

    fn responses(framing: Framing, output: &[u8]) -> Vec<Vec<u8>> {
        let offer = crate::protocol::handshake_offer();
        assert!(output.starts_with(offer.as_bytes()));
        FrameCodec::new(framing, u64::MAX)
            .decode_responses(&output[offer.len()..])
            .unwrap()
    }

    #[tokio::test]
    async fn test_clean_then_smudge_in_order() {
        for framing in Framing::OFFERED {
            let (_dir, driver) = setup(FilterConfig::default()).await;
            let pointer = Pointer::new(Oid::hash(b"0123456789"), 10).encode();
            let input = host_input(
                framing,
                &[
                    (Operation::Clean, "a.bin", b"0123456789"),
                    (Operation::Smudge, "a.bin", &pointer),
                    (Operation::Smudge, "b.txt", b"plain text"),
                ],
                true,
            );

            let (result, state, output) = run(driver, input).await;
            let summary = result.unwrap();
            assert_eq!(summary.outcome, SessionOutcome::EndMarker);
            assert_eq!(summary.cleaned, 1);
            assert_eq!(summary.smudged, 2);
            assert_eq!(summary.passed_through, 1);
            assert_eq!(state, SessionState::Terminated);

            let replies = responses(framing, &output);
            assert_eq!(replies, vec![pointer.clone(), b"0123456789".to_vec(), Vec::new()]);
        }
    }

    #[tokio::test]
    async fn test_end_of_stream_between_requests() {
        let (_dir, driver) = setup(FilterConfig::default()).await;
        let input = host_input(Framing::Binary, &[(Operation::Clean, "a", b"x")], false);
        let (result, _, _) = run(driver, input).await;
        assert_eq!(result.unwrap().outcome, SessionOutcome::EndOfStream);
    }

    #[tokio::test]
    async fn test_rejected_handshake() {
        let (_dir, driver) = setup(FilterConfig::default()).await;
        let (result, state, output) = run(driver, b"reject\n".to_vec()).await;
        assert_eq!(result.unwrap().outcome, SessionOutcome::Rejected);
        assert_eq!(state, SessionState::Terminated);
        assert_eq!(output, crate::protocol::handshake_offer().as_bytes());
    }

    #[tokio::test]
    async fn test_unsupported_version_faults() {
        let (_dir, driver) = setup(FilterConfig::default()).await;
        let (result, _, _) = run(driver, b"bigfile-host/7 framing=text\n".to_vec()).await;
        let err = result.unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[tokio::test]
    async fn test_truncated_payload_writes_no_response() {
        let (_dir, driver) = setup(FilterConfig::default()).await;
        let mut input = b"bigfile-host/1 framing=text\n".to_vec();
        input.extend_from_slice(b"clean\na.bin\n100\nonly a few bytes");

        let (result, state, output) = run(driver, input).await;
        let err = result.unwrap_err();
        assert!(matches!(err, SessionError::Protocol(ProtocolFault::Truncated { declared: 100, .. })));
        assert_eq!(err.exit_code(), 3);
        assert_eq!(state, SessionState::Terminated);
        assert_eq!(output, crate::protocol::handshake_offer().as_bytes());
    }

    #[tokio::test]
    async fn test_download_error_is_fatal() {
        let (_dir, driver) = setup(FilterConfig::default()).await;
        let pointer = Pointer::new(Oid::hash(b"remote"), 6).encode();
        let input = host_input(Framing::Text, &[(Operation::Smudge, "a.bin", &pointer)], true);

        let (result, _, _) = run(driver, input).await;
        let err = result.unwrap_err();
        assert!(matches!(err, SessionError::Download { .. }));
        assert_eq!(err.exit_code(), 2);
    }

    #[tokio::test]
    async fn test_download_error_skipped() {
        let (_dir, driver) = setup(FilterConfig {
            skip_download_errors: true,
            ..FilterConfig::default()
        })
        .await;
        let pointer = Pointer::new(Oid::hash(b"remote"), 6).encode();
        let input = host_input(
            Framing::Binary,
            &[(Operation::Smudge, "a.bin", &pointer), (Operation::Clean, "b", b"after")],
            true,
        );

        let (result, _, output) = run(driver, input).await;
        let summary = result.unwrap();
        assert_eq!(summary.download_errors, 1);
        let replies = responses(Framing::Binary, &output);
        assert_eq!(replies[0], pointer);
        assert_eq!(replies.len(), 2);
    }

    #[tokio::test]
    async fn test_skip_smudge_leaves_pointer() {
        let (_dir, driver) = setup(FilterConfig {
            skip_smudge: true,
            ..FilterConfig::default()
        })
        .await;
        let pointer = Pointer::new(Oid::hash(b"remote"), 6).encode();
        let input = host_input(Framing::Text, &[(Operation::Smudge, "a.bin", &pointer)], true);

        let (result, _, output) = run(driver, input).await;
        assert_eq!(result.unwrap().download_errors, 0);
        assert_eq!(responses(Framing::Text, &output), vec![pointer]);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_request() {
        let (_dir, driver) = setup(FilterConfig::default()).await;
        let config = SessionConfig::default();
        config.cancel.cancel();
        let input = host_input(Framing::Text, &[(Operation::Clean, "a", b"x")], true);

        let mut session = FilterSession::new(driver, config, &input[..], Vec::new());
        let summary = session.run().await.unwrap();
        assert_eq!(summary.outcome, SessionOutcome::Cancelled);
        assert_eq!(summary.cleaned, 0);
    }

    #[tokio::test]
    async fn test_payload_over_limit_faults() {
        let (_dir, driver) = setup(FilterConfig::default()).await;
        let config = SessionConfig {
            max_payload_size: 4,
            ..SessionConfig::default()
        };
        let input = host_input(Framing::Binary, &[(Operation::Clean, "a", b"too long")], true);

        let mut session = FilterSession::new(driver, config, &input[..], Vec::new());
        let err = session.run().await.unwrap_err();
        assert!(matches!(err, SessionError::Protocol(ProtocolFault::PayloadTooLarge { len: 8, max: 4 })));
    }
}
