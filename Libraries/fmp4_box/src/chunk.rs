//! Chunk parse session: header walk, frame extraction, seek and rewind.

use std::mem;
use std::ops::Range;

use bytes::{Bytes, BytesMut};
use tracing::debug;

use crate::boxes::header::{read_box_header, BoxType};
use crate::boxes::mfhd::MfhdBox;
use crate::boxes::senc::{SencBox, DRM_IV_USERTYPE};
use crate::boxes::tfhd::TfhdBox;
use crate::boxes::trun::TrunBox;
use crate::error::BoxError;
use crate::HNS_PER_SECOND;

/// Seek step when no usable frame duration is known.
const FALLBACK_SEEK_STEP: i64 = 200;

/// One extracted media frame.
///
/// The payload and IV are views into the parser's chunk buffer and stay
/// valid independently of the parser.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Presentation time within the chunk, in hundred-nanosecond units.
    /// Signed: wrapped durations may step time backwards.
    pub time: i64,
    /// Byte offset of the frame payload within the chunk buffer.
    pub offset: u64,
    /// The frame payload.
    pub data: Bytes,
    /// The frame's DRM initialization vector, when the chunk carries one.
    pub iv: Option<Bytes>,
}

/// Cursors restored by `rewind`.
#[derive(Debug, Clone, Copy)]
struct Snapshot {
    offset: u64,
    remaining: u64,
    time: i64,
    frame_index: usize,
    last_duration: Option<u32>,
}

/// Everything the moof walk learns before frames can be extracted.
#[derive(Default)]
struct HeaderScan {
    sequence_number: Option<u32>,
    track_id: u32,
    default_duration: Option<u32>,
    default_size: Option<u32>,
    durations: Vec<u32>,
    sizes: Vec<u32>,
    sample_count: usize,
    iv_offsets: Vec<u64>,
    iv_sizes: Vec<u32>,
    saw_trun: bool,
}

/// Incremental parser for one media chunk.
///
/// The session owns the chunk bytes; [`ChunkParser::feed`] appends more as
/// the download progresses. [`ChunkParser::parse_header`] walks the
/// `moof`/`mdat` pair and returns `Ok(false)` until enough bytes have
/// arrived; each retry restarts the walk from the chunk start. Once the
/// header is in, [`ChunkParser::next_frame`] yields frames in order, and
/// [`ChunkParser::seek`]/[`ChunkParser::rewind`] move the frame cursor
/// without re-parsing anything.
pub struct ChunkParser {
    data: Bytes,

    // Frame cursor (captured in `snapshot` after the header parse).
    offset: u64,
    remaining: u64,
    current_time: i64,
    frame_index: usize,
    last_duration: Option<u32>,

    // Sample table assembled by the header walk.
    sample_count: usize,
    durations: Vec<u32>,
    sizes: Vec<u32>,
    default_duration: Option<u32>,
    default_size: Option<u32>,
    iv_offsets: Vec<u64>,
    iv_sizes: Vec<u32>,

    sequence_number: Option<u32>,
    header_parsed: bool,
    snapshot: Option<Snapshot>,
    frame_rate: f64,
}

impl Default for ChunkParser {
    fn default() -> Self {
        ChunkParser::new()
    }
}

impl ChunkParser {
    pub fn new() -> ChunkParser {
        ChunkParser {
            data: Bytes::new(),
            offset: 0,
            remaining: 0,
            current_time: 0,
            frame_index: 0,
            last_duration: None,
            sample_count: 0,
            durations: Vec::new(),
            sizes: Vec::new(),
            default_duration: None,
            default_size: None,
            iv_offsets: Vec::new(),
            iv_sizes: Vec::new(),
            sequence_number: None,
            header_parsed: false,
            snapshot: None,
            frame_rate: -1.0,
        }
    }

    /// Appends downloaded bytes to the chunk buffer.
    ///
    /// The buffer is reopened in place when no frame handed out earlier
    /// still holds a view of it, and copied once otherwise.
    pub fn feed(&mut self, bytes: &[u8]) {
        let mut buffer = match mem::take(&mut self.data).try_into_mut() {
            Ok(buffer) => buffer,
            Err(shared) => BytesMut::from(shared.as_ref()),
        };
        buffer.extend_from_slice(bytes);
        self.data = buffer.freeze();
    }

    /// Bytes fed so far.
    pub fn bytes_fed(&self) -> usize {
        self.data.len()
    }

    pub fn header_parsed(&self) -> bool {
        self.header_parsed
    }

    /// Total samples declared by the chunk header.
    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// Fragment sequence number from `mfhd`, once the header is parsed.
    pub fn sequence_number(&self) -> Option<u32> {
        self.sequence_number
    }

    /// Presentation time the frame cursor currently sits at.
    pub fn current_time(&self) -> i64 {
        self.current_time
    }

    /// Walks the chunk's `moof` and `mdat` boxes.
    ///
    /// Returns `Ok(false)` while the bytes fed so far stop short of a box
    /// boundary the walk needs; feed more and call again. Returns
    /// `Ok(true)` once a sample table and the media data box have both been
    /// found and a per-frame size (table or track default) is known.
    /// Structurally broken chunks fail with a [`BoxError`] and will keep
    /// failing no matter how many bytes arrive.
    pub fn parse_header(&mut self) -> Result<bool, BoxError> {
        if self.header_parsed {
            return Ok(true);
        }

        let data = &self.data[..];
        let mut scan = HeaderScan::default();
        let mut offset = 0u64;
        let mut moof_seen = false;
        let mut data_window: Option<(u64, u64)> = None;

        while !(moof_seen && data_window.is_some()) {
            let header = match read_box_header(data, offset, u64::MAX)? {
                Some(header) => header,
                None => return Ok(false),
            };
            let payload_start = offset + header.header_len;
            match header.box_type {
                BoxType::Moof => {
                    if !walk_moof(data, payload_start, header.payload_len, &mut scan)? {
                        return Ok(false);
                    }
                    moof_seen = true;
                }
                BoxType::Mdat => {
                    data_window = Some((payload_start, header.payload_len));
                }
                other => return Err(BoxError::UnknownTopLevel(other.fourcc())),
            }
            offset += header.total_size();
        }

        if !scan.saw_trun {
            return Ok(false);
        }
        if scan.sizes.is_empty() && scan.default_size.is_none() {
            // No way to delimit frames; a longer download will not fix it,
            // but the boolean channel mirrors the header walk contract.
            return Ok(false);
        }
        let (window_start, window_len) = match data_window {
            Some(window) => window,
            None => return Ok(false),
        };

        if let Some(sequence_number) = scan.sequence_number {
            debug!(
                "chunk header: track {} sequence {} with {} sample(s)",
                scan.track_id, sequence_number, scan.sample_count
            );
        }

        self.sequence_number = scan.sequence_number;
        self.sample_count = scan.sample_count;
        self.durations = scan.durations;
        self.sizes = scan.sizes;
        self.default_duration = scan.default_duration;
        self.default_size = scan.default_size;
        self.iv_offsets = scan.iv_offsets;
        self.iv_sizes = scan.iv_sizes;

        self.offset = window_start;
        self.remaining = window_len;
        self.current_time = 0;
        self.frame_index = 0;
        self.last_duration = None;
        self.frame_rate = -1.0;
        self.snapshot = Some(Snapshot {
            offset: window_start,
            remaining: window_len,
            time: 0,
            frame_index: 0,
            last_duration: None,
        });
        self.header_parsed = true;
        Ok(true)
    }

    /// Extracts the next frame.
    ///
    /// `Ok(None)` when the sample table is exhausted or the bytes fed so far
    /// do not cover the next frame's declared size. Calling this before a
    /// successful [`ChunkParser::parse_header`] is a usage error.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, BoxError> {
        if !self.header_parsed {
            return Err(BoxError::HeaderNotParsed);
        }
        if self.frame_index >= self.sample_count {
            return Ok(None);
        }
        let size = match self.frame_size(self.frame_index) {
            Some(size) => size as u64,
            None => return Ok(None),
        };
        if self.remaining < size {
            return Ok(None);
        }
        let range = match payload_range(self.offset, size, self.data.len()) {
            Some(range) => range,
            None => return Ok(None),
        };

        let data = self.data.slice(range);
        let iv = self.frame_iv(self.frame_index);
        let frame = Frame {
            time: self.current_time,
            offset: self.offset,
            data,
            iv,
        };
        self.advance(size);
        Ok(Some(frame))
    }

    /// Moves the frame cursor to the frame nearest `position` (hns).
    ///
    /// The cursor rewinds to the chunk start, then advances while the gap to
    /// the target exceeds half the next frame's duration; the landed time is
    /// returned. This is a nearest-frame seek, not an exact one.
    pub fn seek(&mut self, position: i64) -> Result<i64, BoxError> {
        self.rewind()?;
        while self.frame_index < self.sample_count {
            let gap = position - self.current_time;
            if gap <= 0 {
                break;
            }
            if gap <= self.seek_step() / 2 {
                break;
            }
            let size = match self.frame_size(self.frame_index) {
                Some(size) => size as u64,
                None => break,
            };
            if self.remaining < size {
                break;
            }
            self.advance(size);
        }
        Ok(self.current_time)
    }

    /// Restores the frame cursor to its post-header state. O(1).
    pub fn rewind(&mut self) -> Result<(), BoxError> {
        let snapshot = match self.snapshot {
            Some(snapshot) => snapshot,
            None => return Err(BoxError::HeaderNotParsed),
        };
        self.offset = snapshot.offset;
        self.remaining = snapshot.remaining;
        self.current_time = snapshot.time;
        self.frame_index = snapshot.frame_index;
        self.last_duration = snapshot.last_duration;
        Ok(())
    }

    /// Nominal frames per second of this chunk, computed once and cached.
    ///
    /// With a per-sample duration table this is
    /// `10_000_000 x samples / total duration`; with only a track default it
    /// is `10_000_000 / default`; 0.0 when the chunk carries no durations.
    pub fn frame_rate(&mut self) -> f64 {
        if self.frame_rate >= 0.0 {
            return self.frame_rate;
        }
        let rate = if !self.durations.is_empty() {
            let total: u64 = self.durations.iter().map(|&d| d as u64).sum();
            if total == 0 {
                0.0
            } else {
                HNS_PER_SECOND as f64 * self.durations.len() as f64 / total as f64
            }
        } else if let Some(default) = self.default_duration {
            if default == 0 {
                0.0
            } else {
                HNS_PER_SECOND as f64 / default as f64
            }
        } else {
            0.0
        };
        self.frame_rate = rate;
        rate
    }

    fn frame_duration(&self, index: usize) -> Option<u32> {
        self.durations.get(index).copied().or(self.default_duration)
    }

    fn frame_size(&self, index: usize) -> Option<u32> {
        self.sizes.get(index).copied().or(self.default_size)
    }

    fn frame_iv(&self, index: usize) -> Option<Bytes> {
        let offset = *self.iv_offsets.get(index)?;
        let size = *self.iv_sizes.get(index)?;
        if size == 0 {
            return None;
        }
        let range = payload_range(offset, size as u64, self.data.len())?;
        Some(self.data.slice(range))
    }

    fn advance(&mut self, size: u64) {
        if let Some(duration) = self.frame_duration(self.frame_index) {
            // Durations past i32::MAX step time backwards on purpose.
            self.current_time += duration as i32 as i64;
            self.last_duration = Some(duration);
        }
        self.offset += size;
        self.remaining -= size;
        self.frame_index += 1;
    }

    fn seek_step(&self) -> i64 {
        // A zero duration cannot carry the cursor; treat it as unknown.
        if let Some(duration) = self.frame_duration(self.frame_index) {
            if duration != 0 {
                return duration as i32 as i64;
            }
        }
        if let Some(duration) = self.last_duration {
            if duration != 0 {
                return duration as i32 as i64;
            }
        }
        FALLBACK_SEEK_STEP
    }
}

fn payload_range(start: u64, len: u64, available: usize) -> Option<Range<usize>> {
    let start = usize::try_from(start).ok()?;
    let len = usize::try_from(len).ok()?;
    let end = start.checked_add(len)?;
    if end > available {
        return None;
    }
    Some(start..end)
}

fn payload_slice(data: &[u8], start: u64, len: u64) -> Option<&[u8]> {
    let range = payload_range(start, len, data.len())?;
    Some(&data[range])
}

fn walk_moof(
    data: &[u8],
    start: u64,
    len: u64,
    scan: &mut HeaderScan,
) -> Result<bool, BoxError> {
    let end = start + len;
    let mut offset = start;
    while offset < end {
        let header = match read_box_header(data, offset, end - offset)? {
            Some(header) => header,
            None => return Ok(false),
        };
        let payload_start = offset + header.header_len;
        match header.box_type {
            BoxType::Mfhd => {
                let payload = match payload_slice(data, payload_start, header.payload_len) {
                    Some(payload) => payload,
                    None => return Ok(false),
                };
                let mfhd = MfhdBox::parse(payload)?;
                scan.sequence_number = Some(mfhd.sequence_number);
            }
            BoxType::Traf => {
                if !walk_traf(data, payload_start, header.payload_len, scan)? {
                    return Ok(false);
                }
            }
            other => {
                debug!("skipping {} inside moof", other);
            }
        }
        offset += header.total_size();
    }
    Ok(true)
}

fn walk_traf(
    data: &[u8],
    start: u64,
    len: u64,
    scan: &mut HeaderScan,
) -> Result<bool, BoxError> {
    let end = start + len;
    let mut offset = start;
    while offset < end {
        let header = match read_box_header(data, offset, end - offset)? {
            Some(header) => header,
            None => return Ok(false),
        };
        let payload_start = offset + header.header_len;
        match header.box_type {
            BoxType::Tfhd => {
                let payload = match payload_slice(data, payload_start, header.payload_len) {
                    Some(payload) => payload,
                    None => return Ok(false),
                };
                let tfhd = TfhdBox::parse(payload)?;
                scan.track_id = tfhd.track_id;
                scan.default_duration = tfhd.default_sample_duration;
                scan.default_size = tfhd.default_sample_size;
            }
            BoxType::Trun => {
                let payload = match payload_slice(data, payload_start, header.payload_len) {
                    Some(payload) => payload,
                    None => return Ok(false),
                };
                let trun = TrunBox::parse(payload)?;
                scan.saw_trun = true;
                scan.sample_count += trun.sample_count as usize;
                if let Some(durations) = trun.sample_durations {
                    scan.durations.extend(durations);
                }
                if let Some(sizes) = trun.sample_sizes {
                    scan.sizes.extend(sizes);
                }
            }
            BoxType::Uuid => {
                if header.payload_len < 16 {
                    return Err(BoxError::truncated("uuid", 16, header.payload_len as usize));
                }
                let usertype = match payload_slice(data, payload_start, 16) {
                    Some(usertype) => usertype,
                    None => return Ok(false),
                };
                if usertype == DRM_IV_USERTYPE {
                    let payload =
                        match payload_slice(data, payload_start + 16, header.payload_len - 16) {
                            Some(payload) => payload,
                            None => return Ok(false),
                        };
                    let senc = SencBox::parse(payload, payload_start + 16)?;
                    for (iv_offset, iv_size) in senc.entries {
                        scan.iv_offsets.push(iv_offset);
                        scan.iv_sizes.push(iv_size);
                    }
                } else {
                    debug!("skipping foreign uuid box inside traf");
                }
            }
            other => {
                debug!("skipping {} inside traf", other);
            }
        }
        offset += header.total_size();
    }
    Ok(true)
}
