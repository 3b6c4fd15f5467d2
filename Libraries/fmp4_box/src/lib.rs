//! # Fragmented MP4 media chunks
//!
//! A media chunk delivered by a smooth-streaming server is a fragmented MP4
//! buffer: a `moof` (movie fragment) box describing the samples, followed by
//! an `mdat` (media data) box carrying the sample bytes back to back.
//!
//! ## Structure of a chunk
//! - **`moof`**: movie fragment container
//!   - **`mfhd`**: fragment sequence number
//!   - **`traf`**: track fragment container
//!     - **`tfhd`**: track id plus flag-gated per-track defaults
//!       (base data offset, sample description index, default sample
//!       duration/size/flags)
//!     - **`trun`**: the sample table with per-sample durations and sizes,
//!       selected by flag bits
//!     - **`uuid`**: optional proprietary box; the DRM initialization-vector
//!       box is recognized by its 16-byte usertype
//! - **`mdat`**: raw sample payloads, addressed by the sample table
//!
//! Every integer is big-endian. A box whose 32-bit size field is 1 carries a
//! 64-bit extended size directly after the fourcc.
//!
//! ## Using this library
//! [`chunk::ChunkParser`] is the session type: feed it chunk bytes as they
//! arrive, call [`chunk::ChunkParser::parse_header`] until it reports the
//! header complete, then pull [`chunk::Frame`]s one at a time. The parser
//! never blocks on missing bytes; "not enough data yet" is a value, not an
//! error. The `boxes` module holds the individual box readers and `writer`
//! builds synthetic chunks for tools and tests.

pub mod boxes;
pub mod chunk;
pub mod error;
pub mod writer;

pub use chunk::{ChunkParser, Frame};
pub use error::BoxError;

/// Presentation timestamps and durations count hundred-nanosecond units.
pub const HNS_PER_SECOND: i64 = 10_000_000;

pub fn format_fourcc(fourcc: &[u8; 4]) -> String {
    std::str::from_utf8(fourcc).unwrap_or("????").to_string()
}

/// Reads a big-endian u16; `None` when out of bounds.
pub fn read_u16_be(data: &[u8], offset: usize) -> Option<u16> {
    let end = offset.checked_add(2)?;
    let bytes: [u8; 2] = data.get(offset..end)?.try_into().ok()?;
    Some(u16::from_be_bytes(bytes))
}

/// Reads a big-endian u32; `None` when out of bounds.
pub fn read_u32_be(data: &[u8], offset: usize) -> Option<u32> {
    let end = offset.checked_add(4)?;
    let bytes: [u8; 4] = data.get(offset..end)?.try_into().ok()?;
    Some(u32::from_be_bytes(bytes))
}

/// Reads a big-endian i32; `None` when out of bounds.
pub fn read_i32_be(data: &[u8], offset: usize) -> Option<i32> {
    let end = offset.checked_add(4)?;
    let bytes: [u8; 4] = data.get(offset..end)?.try_into().ok()?;
    Some(i32::from_be_bytes(bytes))
}

/// Reads a big-endian u64; `None` when out of bounds.
pub fn read_u64_be(data: &[u8], offset: usize) -> Option<u64> {
    let end = offset.checked_add(8)?;
    let bytes: [u8; 8] = data.get(offset..end)?.try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}

/// Reads the 1-byte version and 24-bit flags of a full box payload;
/// `None` when out of bounds.
pub fn read_version_and_flags(data: &[u8], offset: usize) -> Option<(u8, u32)> {
    let end = offset.checked_add(4)?;
    let bytes = data.get(offset..end)?;
    let flags = ((bytes[1] as u32) << 16) | ((bytes[2] as u32) << 8) | bytes[3] as u32;
    Some((bytes[0], flags))
}
