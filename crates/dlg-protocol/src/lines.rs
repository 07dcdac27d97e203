//! Line framing for streamed shell output
//!
//! Output arrives in arbitrary chunks. Complete lines are released as soon
//! as their terminating newline is seen; a trailing fragment is held until
//! the rest of the line arrives or the stream ends.

use std::borrow::Cow;

use bytes::BytesMut;

/// Splits a byte stream on `\n` (and `\r\n`) boundaries
#[derive(Debug, Default)]
pub struct LineSplitter {
    buffer: BytesMut,
}

impl LineSplitter {
    /// Create an empty splitter
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
        }
    }

    /// Append a chunk and return every line it completed
    pub fn push(&mut self, data: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(data);

        let mut lines = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw = self.buffer.split_to(newline + 1);
            lines.push(decode_line(&raw[..newline]));
        }
        lines
    }

    /// The incomplete trailing fragment, if any
    pub fn pending(&self) -> Option<Cow<'_, str>> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&self.buffer))
        }
    }

    /// Number of bytes held back
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// Release the held fragment at end of stream
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let raw = self.buffer.split();
        Some(decode_line(&raw))
    }
}

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}
