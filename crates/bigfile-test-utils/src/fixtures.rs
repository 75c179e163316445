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

//! Host-side session scripts.
//!
//! Builds the byte stream a host would send to `bigfile filter` and splits
//! the filter's output back into responses.

use bigfile_git::protocol::{handshake_offer, PROTOCOL_VERSION};
use bigfile_git::{FrameCodec, Framing, Operation};

/// Scripted input for one filter session
#[derive(Debug, Clone)]
pub struct SessionScript {
    codec: FrameCodec,
    bytes: Vec<u8>,
}

impl SessionScript {
    /// Start a script whose host accepts with `framing`
    pub fn accept(framing: Framing) -> Self {
        let reply = format!("bigfile-host/{} framing={}\n", PROTOCOL_VERSION, framing);
        Self {
            codec: FrameCodec::new(framing, u64::MAX),
            bytes: reply.into_bytes(),
        }
    }

    /// A script where the host rejects the session
    pub fn reject() -> Vec<u8> {
        b"reject\n".to_vec()
    }

    /// Append a clean request
    pub fn clean(mut self, name: &str, payload: &[u8]) -> Self {
        let frame = self.codec.encode_request(Operation::Clean, name, payload);
        self.bytes.extend_from_slice(&frame);
        self
    }

    /// Append a smudge request
    pub fn smudge(mut self, name: &str, payload: &[u8]) -> Self {
        let frame = self.codec.encode_request(Operation::Smudge, name, payload);
        self.bytes.extend_from_slice(&frame);
        self
    }

    /// Append raw bytes, e.g. a deliberately broken frame
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    /// Append the end marker
    pub fn end(mut self) -> Self {
        let frame = self.codec.encode_end();
        self.bytes.extend_from_slice(&frame);
        self
    }

    /// Bytes to feed on stdin
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Split filter stdout into responses after checking the offer line
    pub fn responses(framing: Framing, stdout: &[u8]) -> Vec<Vec<u8>> {
        let offer = handshake_offer();
        assert!(
            stdout.starts_with(offer.as_bytes()),
            "filter output does not start with the handshake offer: {:?}",
            String::from_utf8_lossy(&stdout[..stdout.len().min(64)])
        );
        FrameCodec::new(framing, u64::MAX)
            .decode_responses(&stdout[offer.len()..])
            .expect("malformed response stream")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_script() {
        let bytes = SessionScript::accept(Framing::Text)
            .clean("a.bin", b"abc")
            .end()
            .into_bytes();
        assert_eq!(
            bytes,
            b"bigfile-host/1 framing=text\nclean\na.bin\n3\nabcend\n".to_vec()
        );
    }

    #[test]
    fn test_split_responses() {
        let mut stdout = handshake_offer().into_bytes();
        stdout.extend_from_slice(b"3\nxyz0\n");
        let responses = SessionScript::responses(Framing::Text, &stdout);
        assert_eq!(responses, vec![b"xyz".to_vec(), Vec::new()]);
    }
}
