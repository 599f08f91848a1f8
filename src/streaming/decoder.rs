//! Stateful UTF-8 decoder for chunked response bodies
//!
//! A transport chunk may end in the middle of a multi-byte code point. The
//! decoder emits the longest valid prefix of each chunk and carries the
//! incomplete tail (at most three bytes) into the next call.

use crate::errors::{ChatError, Result};

/// Incremental UTF-8 decoder
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    /// Bytes of an incomplete code point left over from the previous chunk
    pending: Vec<u8>,
}

impl Utf8Decoder {
    /// Create a decoder with no carried bytes
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next chunk of bytes
    ///
    /// Returns the text that is complete so far. An invalid byte sequence is a
    /// decode error; a truncated sequence at the end of the chunk is held back.
    pub fn decode(&mut self, bytes: &[u8]) -> Result<String> {
        self.pending.extend_from_slice(bytes);

        match std::str::from_utf8(&self.pending) {
            Ok(text) => {
                let text = text.to_string();
                self.pending.clear();
                Ok(text)
            }
            Err(err) => {
                if err.error_len().is_some() {
                    return Err(ChatError::StreamDecode(format!(
                        "invalid UTF-8 sequence at byte {}",
                        err.valid_up_to()
                    )));
                }

                // Incomplete sequence at the end; keep it for the next chunk
                let valid = err.valid_up_to();
                let tail = self.pending.split_off(valid);
                let text = String::from_utf8(std::mem::replace(&mut self.pending, tail))
                    .map_err(|e| ChatError::StreamDecode(e.to_string()))?;
                Ok(text)
            }
        }
    }

    /// Flush at end of stream
    ///
    /// Any bytes still pending belong to a code point that never completed.
    pub fn finish(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let dangling = self.pending.len();
        self.pending.clear();
        Err(ChatError::StreamDecode(format!(
            "stream ended inside a multi-byte character ({} dangling bytes)",
            dangling
        )))
    }

    /// Number of carried bytes
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
