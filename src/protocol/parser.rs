//! Incremental RESP Frame Decoder
//!
//! Clients send every command as an array of bulk strings:
//!
//! ```text
//! *<N>\r\n
//! $<L1>\r\n<L1 bytes>\r\n
//! ...
//! $<LN>\r\n<LN bytes>\r\n
//! ```
//!
//! The decoder works directly on the connection's read buffer and returns
//! one of:
//! - `Ok(Some((command, consumed)))` - a whole frame was decoded from the first `consumed` bytes
//! - `Ok(None)` - the buffer only holds a prefix of a frame, read more data
//! - `Err(DecodeError)` - the bytes can never form a valid frame
//!
//! The caller advances its buffer by exactly `consumed`, which leaves it
//! positioned at the first byte of the next frame. Running out of input
//! while a prefix is buffered is reported by the connection as
//! [`DecodeError::UnexpectedEof`].
//!
//! A bulk string with a negative length (`$-1\r\n` and friends) decodes to
//! an empty value and occupies only its header line.

use crate::protocol::types::{prefix, Command, CRLF};
use bytes::Bytes;
use thiserror::Error;

/// Errors that can occur while decoding a request frame.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The frame does not start with `*<N>` where N is a non-negative integer
    #[error("invalid array header: {0:?}")]
    InvalidArrayHeader(String),

    /// `*0\r\n`: a frame must carry at least the command name
    #[error("empty command array")]
    EmptyArray,

    /// An element does not start with `$<L>` where L is an integer
    #[error("invalid bulk string header: {0:?}")]
    InvalidBulkHeader(String),

    /// The payload of a bulk string is not followed by CRLF
    #[error("bulk string payload not terminated by CRLF")]
    MissingTerminator,

    /// A bulk string declares more bytes than we accept
    #[error("bulk string too large: {size} bytes (max: {max})")]
    BulkTooLarge { size: usize, max: usize },

    /// The stream ended in the middle of a frame
    #[error("unexpected end of stream inside a frame")]
    UnexpectedEof,
}

/// Result type for decoding operations.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Maximum size for a single bulk string (512 MB, same as Redis)
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Upper bound on up-front allocation for a frame's element list.
/// Larger frames still decode, the vector just grows as elements arrive.
const MAX_PREALLOC_ELEMENTS: usize = 1024;

/// Decodes request frames from a byte buffer.
///
/// # Example
///
/// ```
/// use minikv::protocol::parser::FrameDecoder;
///
/// let mut decoder = FrameDecoder::new();
/// let buffer = b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n";
///
/// let (command, consumed) = decoder.decode(buffer).unwrap().unwrap();
/// assert_eq!(command.name, "GET");
/// assert_eq!(consumed, buffer.len());
/// ```
#[derive(Debug, Default)]
pub struct FrameDecoder {
    /// Number of frames decoded so far
    frames: u64,
}

impl FrameDecoder {
    /// Creates a new decoder instance.
    pub fn new() -> Self {
        Self { frames: 0 }
    }

    /// Returns how many frames this decoder has produced.
    pub fn frames_decoded(&self) -> u64 {
        self.frames
    }

    /// Attempts to decode one frame from the start of `buf`.
    ///
    /// # Returns
    ///
    /// - `Ok(Some((command, consumed)))` - Successfully decoded a frame
    /// - `Ok(None)` - Incomplete data, need more bytes
    /// - `Err(e)` - Malformed frame
    pub fn decode(&mut self, buf: &[u8]) -> DecodeResult<Option<(Command, usize)>> {
        if buf.is_empty() {
            return Ok(None);
        }

        if buf[0] != prefix::ARRAY {
            // Report what we can see of the offending line
            let line = match find_crlf(buf) {
                Some(pos) => &buf[..pos],
                None => buf,
            };
            return Err(DecodeError::InvalidArrayHeader(lossy(line)));
        }

        let (count, mut consumed) = match read_line(buf) {
            Some((line, used)) => (parse_array_len(&line[1..])?, used),
            None => return Ok(None),
        };

        if count == 0 {
            return Err(DecodeError::EmptyArray);
        }

        let mut elements = Vec::with_capacity(count.min(MAX_PREALLOC_ELEMENTS));
        for _ in 0..count {
            match decode_bulk_string(&buf[consumed..])? {
                Some((element, used)) => {
                    elements.push(element);
                    consumed += used;
                }
                None => return Ok(None),
            }
        }

        match Command::from_elements(elements) {
            Some(command) => {
                self.frames += 1;
                Ok(Some((command, consumed)))
            }
            None => Err(DecodeError::EmptyArray),
        }
    }
}

/// Decodes a single bulk string element: `$<length>\r\n<data>\r\n`.
fn decode_bulk_string(buf: &[u8]) -> DecodeResult<Option<(Bytes, usize)>> {
    if buf.is_empty() {
        return Ok(None);
    }

    if buf[0] != prefix::BULK_STRING {
        let line = match find_crlf(buf) {
            Some(pos) => &buf[..pos],
            None => buf,
        };
        return Err(DecodeError::InvalidBulkHeader(lossy(line)));
    }

    let (header, header_len) = match read_line(buf) {
        Some(found) => found,
        None => return Ok(None),
    };

    let digits = &header[1..];
    let length: i64 = std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| DecodeError::InvalidBulkHeader(lossy(digits)))?;

    // Null bulk string: no payload follows the header line
    if length < 0 {
        return Ok(Some((Bytes::new(), header_len)));
    }

    let length = length as usize;
    if length > MAX_BULK_SIZE {
        return Err(DecodeError::BulkTooLarge {
            size: length,
            max: MAX_BULK_SIZE,
        });
    }

    let total_needed = header_len + length + CRLF.len();
    if buf.len() < total_needed {
        return Ok(None);
    }

    if &buf[header_len + length..total_needed] != CRLF {
        return Err(DecodeError::MissingTerminator);
    }

    let data = Bytes::copy_from_slice(&buf[header_len..header_len + length]);
    Ok(Some((data, total_needed)))
}

/// Parses the `<N>` of an array header. Negative counts are malformed.
fn parse_array_len(digits: &[u8]) -> DecodeResult<usize> {
    std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .filter(|n| *n >= 0)
        .map(|n| n as usize)
        .ok_or_else(|| DecodeError::InvalidArrayHeader(lossy(digits)))
}

/// Returns the line before the first CRLF and the number of bytes it
/// occupies including the CRLF, or `None` if no CRLF is buffered yet.
#[inline]
fn read_line(buf: &[u8]) -> Option<(&[u8], usize)> {
    find_crlf(buf).map(|pos| (&buf[..pos], pos + CRLF.len()))
}

/// Finds the position of CRLF in the buffer.
///
/// Returns the position of `\r` if found, or None if CRLF is not present.
#[inline]
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|window| window == CRLF)
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Helper function to decode a single frame from bytes.
///
/// This is a convenience function for simple use cases.
pub fn decode_frame(buf: &[u8]) -> DecodeResult<Option<(Command, usize)>> {
    FrameDecoder::new().decode(buf)
}
