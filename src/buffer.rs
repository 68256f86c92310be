//! Accumulates transport chunks and cuts them into frames.

use bytes::{Buf, BytesMut};

use crate::{
    constants::{FRAME_TERMINATOR, LINE_TERMINATOR, MAX_BUFFER_SIZE, MAX_FRAME_SIZE, SOCKET_BUF_SIZE},
    error::{AmiError, AmiResult},
};

/// Splits a byte stream into `\r\n\r\n`-terminated frames.
///
/// Bytes after a terminator stay buffered for the next call, so a chunk that
/// holds several frames (or the start of the next one) loses nothing.
#[derive(Debug)]
pub struct FrameReader {
    buf: BytesMut,
    max_buffer: usize,
    /// Prefix of `buf` already searched for a terminator.
    scanned: usize,
}

impl FrameReader {
    /// Reader with the default buffer limit.
    pub fn new() -> Self {
        Self::with_limit(MAX_BUFFER_SIZE)
    }

    /// Reader that fails once more than `max_buffer` bytes are pending.
    pub fn with_limit(max_buffer: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(SOCKET_BUF_SIZE),
            max_buffer,
            scanned: 0,
        }
    }

    /// Append one transport chunk.
    pub fn push(&mut self, chunk: &[u8]) -> AmiResult<()> {
        self.buf
            .extend_from_slice(chunk);
        if self.buf.len() > self.max_buffer {
            return Err(AmiError::FrameTooLarge {
                size: self.buf.len(),
                limit: self.max_buffer,
            });
        }
        Ok(())
    }

    /// Next complete frame, including its terminator, if one is buffered.
    ///
    /// Bytes that are not UTF-8 are replaced with U+FFFD; AMI values carry
    /// whatever encoding the switch was configured with.
    pub fn next_frame(&mut self) -> AmiResult<Option<String>> {
        let terminator = FRAME_TERMINATOR.as_bytes();
        // A terminator may straddle the end of the previous search.
        let start = self
            .scanned
            .saturating_sub(terminator.len() - 1);
        let Some(pos) = find(&self.buf[start..], terminator).map(|p| p + start) else {
            self.scanned = self.buf.len();
            if self.buf.len() > MAX_FRAME_SIZE {
                return Err(AmiError::FrameTooLarge {
                    size: self.buf.len(),
                    limit: MAX_FRAME_SIZE,
                });
            }
            return Ok(None);
        };
        let frame = self
            .buf
            .split_to(pos + terminator.len());
        self.scanned = 0;
        Ok(Some(String::from_utf8_lossy(&frame).into_owned()))
    }

    /// Next `\r\n`-terminated line without its terminator.
    ///
    /// Only used for the greeting, which is a lone line rather than a frame.
    pub fn next_line(&mut self) -> AmiResult<Option<String>> {
        let Some(pos) = find(&self.buf, LINE_TERMINATOR.as_bytes()) else {
            return Ok(None);
        };
        let line = self
            .buf
            .split_to(pos);
        self.buf
            .advance(LINE_TERMINATOR.len());
        self.scanned = 0;
        String::from_utf8(line.to_vec())
            .map(Some)
            .map_err(|_| AmiError::protocol_violation("invalid UTF-8 in banner"))
    }

    /// Bytes received but not yet returned as a frame.
    pub fn pending(&self) -> &[u8] {
        &self.buf
    }

    /// Number of pending bytes.
    pub fn len(&self) -> usize {
        self.buf
            .len()
    }

    /// `true` if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.buf
            .is_empty()
    }
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new()
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|w| w == needle)
}
