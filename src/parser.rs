//! Line splitting and `data:` recognition for SSE streams

use core::str::Utf8Error;

use bytes::{Buf, Bytes, BytesMut};
use bytes_utils::Str;

use crate::constants::{DATA_PREFIX, LF};

/// A full line from an SSE stream, borrowed from the input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEventLine<'a> {
    /// Everything after `data:`, not yet validated or trimmed
    Data(&'a [u8]),
    /// Any line that doesn't start with `data:`, including blank lines and comments
    Ignored,
}

/// Owned version of [RawEventLine]. Note: You probably want to [RawEventLineOwned::validate] these into [ValidatedEventLine]s
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawEventLineOwned {
    Data(Bytes),
    Ignored,
}

/// Completely parsed SSE line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidatedEventLine {
    /// Trimmed utf-8 payload of a `data:` line, possibly empty
    Data(Str),
    Ignored,
}

/// Validates `val` as utf-8 and trims surrounding whitespace without copying
fn validate_trimmed(val: Bytes) -> Result<Str, Utf8Error> {
    let text = str::from_utf8(val.as_ref())?;
    let start = text.len() - text.trim_start().len();
    let end = start + text.trim().len();
    // Safety: trimming only removes whole chars so both bounds sit on char boundaries of valid utf-8
    Ok(unsafe { Str::from_inner_unchecked(val.slice(start..end)) })
}

impl RawEventLineOwned {
    pub fn validate(self) -> Result<ValidatedEventLine, Utf8Error> {
        match self {
            RawEventLineOwned::Data(value) => validate_trimmed(value).map(ValidatedEventLine::Data),
            RawEventLineOwned::Ignored => Ok(ValidatedEventLine::Ignored),
        }
    }
}

/// Position of the next LF, if any. CR is not a terminator here, a trailing CR ends up trimmed off the payload instead.
fn find_eol(bytes: &[u8]) -> Option<usize> {
    memchr::memchr(LF, bytes)
}

fn read_line(bytes: &[u8]) -> RawEventLine<'_> {
    match bytes.strip_prefix(DATA_PREFIX) {
        Some(value) => RawEventLine::Data(value),
        None => RawEventLine::Ignored,
    }
}

/// Tries to read the next [RawEventLine] from `bytes`, returning it with the bytes after its LF.
/// Returns [None] if `bytes` contains no LF.
pub fn parse_line(bytes: &[u8]) -> Option<(RawEventLine<'_>, &[u8])> {
    let line_end = find_eol(bytes)?;
    Some((read_line(&bytes[..line_end]), &bytes[line_end + 1..]))
}

/// Reads the next [RawEventLineOwned] from the buffer, then advances the buffer past the LF.
/// Returns [None] and leaves the buffer alone if it contains no LF.
pub fn parse_line_from_buffer(buffer: &mut BytesMut) -> Option<RawEventLineOwned> {
    let line_end = find_eol(buffer)?;

    let line = buffer.split_to(line_end).freeze();
    buffer.advance(1);

    if line.starts_with(DATA_PREFIX) {
        Some(RawEventLineOwned::Data(line.slice(DATA_PREFIX.len()..)))
    } else {
        Some(RawEventLineOwned::Ignored)
    }
}
