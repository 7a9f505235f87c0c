//! `Range` header parsing for the streaming endpoint.
//!
//! Only the single-range subset of RFC 7233 is honored: HTML5 players issue
//! one range per request while seeking, so anything after the first comma is
//! ignored. Parsing is strict about the numbers themselves; a header that
//! does not parse is answered with 416 rather than silently served in full.

use thiserror::Error;

/// Inclusive byte interval `[start, end]` within a resource of `total_size`
/// bytes. Always satisfies `start <= end < total_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    start: u64,
    end: u64,
    total_size: u64,
}

impl ByteRange {
    /// Returns `None` unless `start <= end < total_size`.
    pub fn new(start: u64, end: u64, total_size: u64) -> Option<Self> {
        (start <= end && end < total_size).then_some(Self {
            start,
            end,
            total_size,
        })
    }

    /// The whole resource. Empty resources have no byte range.
    pub fn full(total_size: u64) -> Option<Self> {
        total_size
            .checked_sub(1)
            .map(|end| Self {
                start: 0,
                end,
                total_size,
            })
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Number of bytes covered, never zero.
    pub fn length(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value for the `Content-Range` header of a 206 response.
    pub fn content_range(&self) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, self.total_size)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("malformed range header")]
    Malformed,
    #[error("range outside of the resource")]
    Unsatisfiable,
}

/// Parses a raw `Range` header value against a resource of `total_size` bytes.
pub fn parse_range(header: &str, total_size: u64) -> Result<ByteRange, RangeError> {
    let (unit, specs) = header
        .trim()
        .split_once('=')
        .ok_or(RangeError::Malformed)?;
    if !unit.trim().eq_ignore_ascii_case("bytes") {
        return Err(RangeError::Malformed);
    }

    let first = specs.split(',').next().unwrap_or_default().trim();
    let (start_raw, end_raw) = first.split_once('-').ok_or(RangeError::Malformed)?;
    let (start_raw, end_raw) = (start_raw.trim(), end_raw.trim());

    if start_raw.is_empty() {
        // bytes=-N: the last N bytes.
        let suffix = parse_position(end_raw)?;
        if suffix == 0 || total_size == 0 {
            return Err(RangeError::Unsatisfiable);
        }
        let start = total_size.saturating_sub(suffix);
        return ByteRange::new(start, total_size - 1, total_size).ok_or(RangeError::Unsatisfiable);
    }

    let start = parse_position(start_raw)?;
    if start >= total_size {
        return Err(RangeError::Unsatisfiable);
    }

    let last = total_size - 1;
    let end = if end_raw.is_empty() {
        last
    } else {
        parse_position(end_raw)?.min(last)
    };

    ByteRange::new(start, end, total_size).ok_or(RangeError::Unsatisfiable)
}

/// `u64::from_str` accepts a leading `+`, which is not valid in a range.
///
/// Positions too large for a `u64` saturate: such a start is unsatisfiable,
/// such an end or suffix reaches past the file and gets clamped.
fn parse_position(raw: &str) -> Result<u64, RangeError> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RangeError::Malformed);
    }
    Ok(raw.parse().unwrap_or(u64::MAX))
}
