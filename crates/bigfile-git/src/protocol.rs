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

//! Filter session wire format
//!
//! ## Handshake
//!
//! The filter speaks first with one line offering the framings it supports:
//!
//! ```text
//! bigfile-filter/1 framing=binary,text
//! ```
//!
//! The host answers with `bigfile-host/1 framing=<scheme>` to accept, or
//! `reject`. The chosen framing holds for the whole session.
//!
//! ## Binary framing
//!
//! ```text
//! request:  u32 op | u32 name_len | name | u32 payload_len | payload
//! end:      u32 op (= 9)
//! response: u32 len | bytes
//! ```
//!
//! All integers are little-endian. Operations: 1 clean, 2 smudge, 9 end.
//!
//! ## Text framing
//!
//! ```text
//! request:  clean|smudge\n <name>\n <decimal len>\n payload
//! end:      end\n
//! response: <decimal len>\n bytes
//! ```
//!
//! A zero-length response means "pass the input through unchanged".

use crate::error::{ProtocolFault, SessionError, SessionResult};
use std::fmt;
use std::io;
use std::pin::Pin;
use std::str::FromStr;
use std::task::{ready, Context, Poll};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf, Take};

/// Protocol version spoken by this filter
pub const PROTOCOL_VERSION: u32 = 1;

/// Longest filename accepted in a request
pub const MAX_NAME_LEN: u64 = 4096;

/// Default bound on a single request payload
pub const DEFAULT_MAX_PAYLOAD_SIZE: u64 = 1 << 32;

const FILTER_GREETING: &str = "bigfile-filter/";
const HOST_GREETING: &str = "bigfile-host/";
const REJECT: &str = "reject";
const MAX_HANDSHAKE_LINE: u64 = 256;
const MAX_LENGTH_LINE: u64 = 24;
const MAX_OPERATION_LINE: u64 = 16;

const OP_CLEAN: u32 = 1;
const OP_SMUDGE: u32 = 2;
const OP_END: u32 = 9;

/// Record framing, fixed for a session at handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Little-endian `u32` length prefixes
    Binary,
    /// Newline-terminated decimal lengths
    Text,
}

impl Framing {
    /// Framings offered in the handshake, in order of preference
    pub const OFFERED: [Framing; 2] = [Framing::Binary, Framing::Text];

    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Framing::Binary => "binary",
            Framing::Text => "text",
        }
    }
}

impl fmt::Display for Framing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Framing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "binary" => Ok(Framing::Binary),
            "text" => Ok(Framing::Text),
            other => Err(format!("unknown framing: {}", other)),
        }
    }
}

/// Request operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Content → pointer
    Clean,
    /// Pointer → content
    Smudge,
}

impl Operation {
    /// Text-framing name
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Clean => "clean",
            Operation::Smudge => "smudge",
        }
    }

    fn code(&self) -> u32 {
        match self {
            Operation::Clean => OP_CLEAN,
            Operation::Smudge => OP_SMUDGE,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything in a request ahead of its payload bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHeader {
    /// Requested transform
    pub operation: Operation,
    /// Advisory path of the file
    pub filename: String,
    /// Declared payload length
    pub payload_len: u64,
}

/// One record read from the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// A request; its payload follows on the stream
    Request(RequestHeader),
    /// Explicit end-of-session marker
    End,
    /// Input ended cleanly between records
    EndOfStream,
}

/// The host's answer to the handshake offer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostReply {
    /// Session accepted with this framing
    Accept {
        /// Host version string, informational
        host_version: String,
        /// Framing for the rest of the session
        framing: Framing,
    },
    /// Host declined (or closed the stream before answering)
    Reject,
}

/// The filter's handshake line
pub fn handshake_offer() -> String {
    let framings: Vec<&str> = Framing::OFFERED.iter().map(Framing::as_str).collect();
    format!("{}{} framing={}\n", FILTER_GREETING, PROTOCOL_VERSION, framings.join(","))
}

/// Parse one handshake line from the host (trailing newline optional)
pub fn parse_host_reply(line: &str) -> Result<HostReply, ProtocolFault> {
    let line = line.trim_end_matches('\n').trim_end_matches('\r');
    if line == REJECT {
        return Ok(HostReply::Reject);
    }

    let rest = line
        .strip_prefix(HOST_GREETING)
        .ok_or_else(|| ProtocolFault::Handshake(format!("unexpected host greeting: {:?}", line)))?;
    let (version, capability) = rest
        .split_once(' ')
        .ok_or_else(|| ProtocolFault::Handshake(format!("no framing in host greeting: {:?}", line)))?;

    if version.parse::<u32>().ok() != Some(PROTOCOL_VERSION) {
        return Err(ProtocolFault::Handshake(format!(
            "unsupported protocol version: {:?}",
            version
        )));
    }

    let scheme = capability
        .strip_prefix("framing=")
        .ok_or_else(|| ProtocolFault::Handshake(format!("unexpected capability: {:?}", capability)))?;
    let framing = scheme.parse::<Framing>().map_err(ProtocolFault::Handshake)?;
    if !Framing::OFFERED.contains(&framing) {
        return Err(ProtocolFault::Handshake(format!("framing {} was not offered", framing)));
    }

    Ok(HostReply::Accept {
        host_version: version.to_string(),
        framing,
    })
}

/// Write the handshake offer and flush
pub async fn write_offer<W>(writer: &mut W) -> io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    writer.write_all(handshake_offer().as_bytes()).await?;
    writer.flush().await
}

/// Read the host's handshake reply; end of stream counts as a rejection
pub async fn read_host_reply<R>(reader: &mut R) -> SessionResult<HostReply>
where
    R: AsyncBufRead + Unpin + ?Sized,
{
    match read_line(reader, MAX_HANDSHAKE_LINE).await? {
        Line::Eof => Ok(HostReply::Reject),
        Line::Complete(bytes) => {
            let line = String::from_utf8(bytes)
                .map_err(|_| ProtocolFault::Handshake("host greeting is not UTF-8".to_string()))?;
            Ok(parse_host_reply(&line)?)
        }
        Line::Partial(_) => Err(ProtocolFault::Handshake("host greeting is not a complete line".to_string()).into()),
    }
}

/// Reads and writes records in one framing
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    framing: Framing,
    max_payload_size: u64,
}

impl FrameCodec {
    /// Create a codec bounding payloads at `max_payload_size` bytes
    pub fn new(framing: Framing, max_payload_size: u64) -> Self {
        Self {
            framing,
            max_payload_size,
        }
    }

    /// Framing in use
    pub fn framing(&self) -> Framing {
        self.framing
    }

    /// Read the next record header
    ///
    /// The payload of a [`Record::Request`] is left on the stream; read it
    /// through [`payload_reader`].
    pub async fn read_record<R>(&self, reader: &mut R) -> SessionResult<Record>
    where
        R: AsyncBufRead + Unpin + ?Sized,
    {
        match self.framing {
            Framing::Binary => self.read_binary(reader).await,
            Framing::Text => self.read_text(reader).await,
        }
    }

    async fn read_binary<R>(&self, reader: &mut R) -> SessionResult<Record>
    where
        R: AsyncBufRead + Unpin + ?Sized,
    {
        if reader.fill_buf().await?.is_empty() {
            return Ok(Record::EndOfStream);
        }

        let op = read_u32(reader, "operation").await?;
        let operation = match op {
            OP_CLEAN => Operation::Clean,
            OP_SMUDGE => Operation::Smudge,
            OP_END => return Ok(Record::End),
            other => return Err(ProtocolFault::UnknownOperation(other.to_string()).into()),
        };

        let name_len = u64::from(read_u32(reader, "filename length").await?);
        if name_len > MAX_NAME_LEN {
            return Err(ProtocolFault::NameTooLong(name_len).into());
        }
        let mut name = vec![0u8; name_len as usize];
        read_exact(reader, &mut name, "filename").await?;
        let filename = String::from_utf8(name).map_err(|_| ProtocolFault::InvalidName)?;

        let payload_len = u64::from(read_u32(reader, "payload length").await?);
        self.check_payload_len(payload_len)?;

        Ok(Record::Request(RequestHeader {
            operation,
            filename,
            payload_len,
        }))
    }

    async fn read_text<R>(&self, reader: &mut R) -> SessionResult<Record>
    where
        R: AsyncBufRead + Unpin + ?Sized,
    {
        let operation = match read_line(reader, MAX_OPERATION_LINE).await? {
            Line::Eof => return Ok(Record::EndOfStream),
            Line::Complete(bytes) => match bytes.as_slice() {
                b"clean" => Operation::Clean,
                b"smudge" => Operation::Smudge,
                b"end" => return Ok(Record::End),
                other => {
                    return Err(ProtocolFault::UnknownOperation(String::from_utf8_lossy(other).into_owned()).into())
                }
            },
            Line::Partial(bytes) if bytes.len() as u64 > MAX_OPERATION_LINE => {
                return Err(ProtocolFault::UnknownOperation(String::from_utf8_lossy(&bytes).into_owned()).into())
            }
            Line::Partial(_) => return Err(ProtocolFault::UnexpectedEof("operation").into()),
        };

        let filename = match read_line(reader, MAX_NAME_LEN).await? {
            Line::Complete(bytes) => String::from_utf8(bytes).map_err(|_| ProtocolFault::InvalidName)?,
            Line::Partial(bytes) if bytes.len() as u64 > MAX_NAME_LEN => {
                return Err(ProtocolFault::NameTooLong(bytes.len() as u64).into())
            }
            Line::Eof | Line::Partial(_) => return Err(ProtocolFault::UnexpectedEof("filename").into()),
        };

        let payload_len = match read_line(reader, MAX_LENGTH_LINE).await? {
            Line::Complete(bytes) => parse_decimal(&bytes)?,
            Line::Partial(bytes) if bytes.len() as u64 > MAX_LENGTH_LINE => {
                return Err(ProtocolFault::InvalidLength(String::from_utf8_lossy(&bytes).into_owned()).into())
            }
            Line::Eof | Line::Partial(_) => return Err(ProtocolFault::UnexpectedEof("payload length").into()),
        };
        self.check_payload_len(payload_len)?;

        Ok(Record::Request(RequestHeader {
            operation,
            filename,
            payload_len,
        }))
    }

    fn check_payload_len(&self, len: u64) -> Result<(), ProtocolFault> {
        if len > self.max_payload_size {
            return Err(ProtocolFault::PayloadTooLarge {
                len,
                max: self.max_payload_size,
            });
        }
        Ok(())
    }

    /// Write a response length prefix; the caller writes exactly `len` bytes after it
    pub async fn write_response_header<W>(&self, writer: &mut W, len: u64) -> SessionResult<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        match self.framing {
            Framing::Binary => {
                let len = u32::try_from(len).map_err(|_| ProtocolFault::ResponseTooLarge(len))?;
                writer.write_all(&len.to_le_bytes()).await?;
            }
            Framing::Text => {
                writer.write_all(format!("{}\n", len).as_bytes()).await?;
            }
        }
        Ok(())
    }

    /// Encode a request as a host would send it
    pub fn encode_request(&self, operation: Operation, filename: &str, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(filename.len() + payload.len() + 32);
        match self.framing {
            Framing::Binary => {
                out.extend_from_slice(&operation.code().to_le_bytes());
                out.extend_from_slice(&(filename.len() as u32).to_le_bytes());
                out.extend_from_slice(filename.as_bytes());
                out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            }
            Framing::Text => {
                out.extend_from_slice(format!("{}\n{}\n{}\n", operation, filename, payload.len()).as_bytes());
            }
        }
        out.extend_from_slice(payload);
        out
    }

    /// Encode the end-of-session marker
    pub fn encode_end(&self) -> Vec<u8> {
        match self.framing {
            Framing::Binary => OP_END.to_le_bytes().to_vec(),
            Framing::Text => b"end\n".to_vec(),
        }
    }

    /// Split a stream of responses as a host would read them
    pub fn decode_responses(&self, mut bytes: &[u8]) -> Result<Vec<Vec<u8>>, ProtocolFault> {
        let mut responses = Vec::new();
        while !bytes.is_empty() {
            let (len, rest) = match self.framing {
                Framing::Binary => {
                    if bytes.len() < 4 {
                        return Err(ProtocolFault::UnexpectedEof("response length"));
                    }
                    let (prefix, rest) = bytes.split_at(4);
                    let mut raw = [0u8; 4];
                    raw.copy_from_slice(prefix);
                    (u64::from(u32::from_le_bytes(raw)), rest)
                }
                Framing::Text => {
                    let newline = bytes
                        .iter()
                        .position(|b| *b == b'\n')
                        .ok_or(ProtocolFault::UnexpectedEof("response length"))?;
                    (parse_decimal(&bytes[..newline])?, &bytes[newline + 1..])
                }
            };
            if (rest.len() as u64) < len {
                return Err(ProtocolFault::Truncated {
                    declared: len,
                    received: rest.len() as u64,
                });
            }
            let (body, rest) = rest.split_at(len as usize);
            responses.push(body.to_vec());
            bytes = rest;
        }
        Ok(responses)
    }
}

/// Bounded view of a request payload
///
/// Reads stop after the declared length. If the underlying stream ends first,
/// the read fails with `UnexpectedEof` and [`is_truncated`](Self::is_truncated)
/// turns true.
#[derive(Debug)]
pub struct PayloadReader<'a, R: ?Sized> {
    inner: Take<&'a mut R>,
    declared: u64,
    truncated: bool,
}

/// Bound `reader` to the payload of `header`
pub fn payload_reader<'a, R>(reader: &'a mut R, header: &RequestHeader) -> PayloadReader<'a, R>
where
    R: AsyncRead + Unpin + ?Sized,
{
    PayloadReader {
        inner: reader.take(header.payload_len),
        declared: header.payload_len,
        truncated: false,
    }
}

impl<R> PayloadReader<'_, R>
where
    R: AsyncRead + Unpin + ?Sized,
{
    /// Payload bytes not yet read
    pub fn remaining(&self) -> u64 {
        self.inner.limit()
    }

    /// Whether the stream ended before the declared length
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Discard unread payload bytes
    ///
    /// Returns a [`ProtocolFault::Truncated`] if the stream ends early.
    pub async fn drain(&mut self) -> SessionResult<()> {
        let drained = tokio::io::copy(self, &mut tokio::io::sink()).await;
        match drained {
            Ok(_) => Ok(()),
            Err(_) if self.truncated => Err(self.truncation().into()),
            Err(e) => Err(SessionError::Io(e)),
        }
    }

    /// The fault describing a truncated payload
    pub fn truncation(&self) -> ProtocolFault {
        ProtocolFault::Truncated {
            declared: self.declared,
            received: self.declared - self.inner.limit(),
        }
    }
}

impl<R> AsyncRead for PayloadReader<'_, R>
where
    R: AsyncRead + Unpin + ?Sized,
{
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        ready!(Pin::new(&mut this.inner).poll_read(cx, buf))?;

        if buf.filled().len() == before && buf.remaining() > 0 && this.inner.limit() > 0 {
            this.truncated = true;
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "payload ended before its declared length",
            )));
        }
        Poll::Ready(Ok(()))
    }
}

enum Line {
    /// Stream ended before any byte
    Eof,
    /// Line without its terminator
    Complete(Vec<u8>),
    /// Stream ended, or the limit was hit, before a newline
    Partial(Vec<u8>),
}

/// Read one `\n`-terminated line of at most `limit` bytes (terminator excluded)
async fn read_line<R>(reader: &mut R, limit: u64) -> io::Result<Line>
where
    R: AsyncBufRead + Unpin + ?Sized,
{
    let mut buf = Vec::new();
    (&mut *reader).take(limit + 1).read_until(b'\n', &mut buf).await?;

    if buf.is_empty() {
        return Ok(Line::Eof);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        return Ok(Line::Complete(buf));
    }
    Ok(Line::Partial(buf))
}

async fn read_u32<R>(reader: &mut R, what: &'static str) -> SessionResult<u32>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut raw = [0u8; 4];
    read_exact(reader, &mut raw, what).await?;
    Ok(u32::from_le_bytes(raw))
}

async fn read_exact<R>(reader: &mut R, buf: &mut [u8], what: &'static str) -> SessionResult<()>
where
    R: AsyncRead + Unpin + ?Sized,
{
    match reader.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(ProtocolFault::UnexpectedEof(what).into()),
        Err(e) => Err(e.into()),
    }
}

fn parse_decimal(bytes: &[u8]) -> Result<u64, ProtocolFault> {
    let invalid = || ProtocolFault::InvalidLength(String::from_utf8_lossy(bytes).into_owned());
    if bytes.is_empty() || !bytes.iter().all(u8::is_ascii_digit) {
        return Err(invalid());
    }
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(invalid)
}
