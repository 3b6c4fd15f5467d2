use crate::error::BoxError;
use crate::format_fourcc;
use crate::read_version_and_flags;
use crate::{read_i32_be, read_u32_be};

// The `TrunBox` struct represents a Track Run Box: the per-sample table of
// the fragment. Two global fields and four per-sample fields are gated by
// flag bits:
//
// - `0x000001`: `data_offset` (i32), relative to the fragment start
// - `0x000004`: `first_sample_flags` (u32)
// - `0x000100`: per-sample duration (u32)
// - `0x000200`: per-sample size (u32)
// - `0x000400`: per-sample flags (u32), parsed over and not retained
// - `0x000800`: per-sample composition offset (u32), parsed over and not
//   retained
//
// Only durations and sizes matter to frame extraction; the sample rows are
// still walked at their full stride so the following boxes line up.
#[derive(Clone, Default)]
pub struct TrunBox {
    pub version: u8,
    pub flags: u32,
    pub sample_count: u32,
    pub data_offset: Option<i32>,
    pub first_sample_flags: Option<u32>,
    pub sample_durations: Option<Vec<u32>>,
    pub sample_sizes: Option<Vec<u32>>,
}

impl std::fmt::Debug for TrunBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrunBox")
            .field("box_type", &format_fourcc(b"trun"))
            .field("version", &self.version)
            .field("flags", &format!("0x{:06X}", self.flags))
            .field("sample_count", &self.sample_count)
            .field("data_offset", &self.data_offset)
            .field("first_sample_flags", &self.first_sample_flags)
            .field(
                "sample_durations",
                &self.sample_durations.as_ref().map(Vec::len),
            )
            .field("sample_sizes", &self.sample_sizes.as_ref().map(Vec::len))
            .finish()
    }
}

impl TrunBox {
    /// Parses a `trun` payload (the bytes after the box header).
    pub fn parse(payload: &[u8]) -> Result<TrunBox, BoxError> {
        let (version, flags) = read_version_and_flags(payload, 0)
            .ok_or_else(|| BoxError::truncated("trun", 4, payload.len()))?;

        let mut offset = 4;
        let sample_count = read_u32_be(payload, offset)
            .ok_or_else(|| BoxError::truncated("trun", offset + 4, payload.len()))?;
        offset += 4;

        let data_offset = if flags & 0x000001 != 0 {
            let val = read_i32_be(payload, offset)
                .ok_or_else(|| BoxError::truncated("trun", offset + 4, payload.len()))?;
            offset += 4;
            Some(val)
        } else {
            None
        };

        let first_sample_flags = if flags & 0x000004 != 0 {
            let val = read_u32_be(payload, offset)
                .ok_or_else(|| BoxError::truncated("trun", offset + 4, payload.len()))?;
            offset += 4;
            Some(val)
        } else {
            None
        };

        let has_duration = flags & 0x000100 != 0;
        let has_size = flags & 0x000200 != 0;
        let has_flags = flags & 0x000400 != 0;
        let has_composition_offset = flags & 0x000800 != 0;
        let stride = 4 * (has_duration as usize
            + has_size as usize
            + has_flags as usize
            + has_composition_offset as usize);

        let rows = sample_count as usize;
        let needed = rows
            .checked_mul(stride)
            .and_then(|table| table.checked_add(offset))
            .ok_or_else(|| BoxError::truncated("trun", usize::MAX, payload.len()))?;
        if payload.len() < needed {
            return Err(BoxError::truncated("trun", needed, payload.len()));
        }

        let mut sample_durations = has_duration.then(|| Vec::with_capacity(rows));
        let mut sample_sizes = has_size.then(|| Vec::with_capacity(rows));
        for _ in 0..rows {
            if let Some(durations) = sample_durations.as_mut() {
                // Bounds checked above for the whole table.
                if let Some(val) = read_u32_be(payload, offset) {
                    durations.push(val);
                }
                offset += 4;
            }
            if let Some(sizes) = sample_sizes.as_mut() {
                if let Some(val) = read_u32_be(payload, offset) {
                    sizes.push(val);
                }
                offset += 4;
            }
            if has_flags {
                offset += 4;
            }
            if has_composition_offset {
                offset += 4;
            }
        }

        Ok(TrunBox {
            version,
            flags,
            sample_count,
            data_offset,
            first_sample_flags,
            sample_durations,
            sample_sizes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(flags: u32, sample_count: u32, tail: &[u8]) -> Vec<u8> {
        let mut data = vec![0u8];
        data.extend_from_slice(&flags.to_be_bytes()[1..]);
        data.extend_from_slice(&sample_count.to_be_bytes());
        data.extend_from_slice(tail);
        data
    }

    #[test]
    fn parses_duration_and_size_rows() {
        let mut tail = Vec::new();
        tail.extend_from_slice(&64i32.to_be_bytes()); // data offset
        for (duration, size) in [(100u32, 7u32), (110, 8), (90, 9)] {
            tail.extend_from_slice(&duration.to_be_bytes());
            tail.extend_from_slice(&size.to_be_bytes());
        }
        let trun = TrunBox::parse(&payload(0x000301, 3, &tail)).unwrap();
        assert_eq!(trun.sample_count, 3);
        assert_eq!(trun.data_offset, Some(64));
        assert_eq!(trun.sample_durations, Some(vec![100, 110, 90]));
        assert_eq!(trun.sample_sizes, Some(vec![7, 8, 9]));
    }

    #[test]
    fn skips_unretained_per_sample_fields() {
        let mut tail = Vec::new();
        for size in [7u32, 8] {
            tail.extend_from_slice(&size.to_be_bytes());
            tail.extend_from_slice(&0xDEADu32.to_be_bytes()); // sample flags
            tail.extend_from_slice(&5u32.to_be_bytes()); // composition offset
        }
        let trun = TrunBox::parse(&payload(0x000E00, 2, &tail)).unwrap();
        assert_eq!(trun.sample_durations, None);
        assert_eq!(trun.sample_sizes, Some(vec![7, 8]));
    }

    #[test]
    fn bare_run_with_defaults_has_no_tables() {
        let trun = TrunBox::parse(&payload(0, 12, &[])).unwrap();
        assert_eq!(trun.sample_count, 12);
        assert_eq!(trun.sample_durations, None);
        assert_eq!(trun.sample_sizes, None);
    }

    #[test]
    fn short_sample_table_is_truncated() {
        let tail = 100u32.to_be_bytes();
        let err = TrunBox::parse(&payload(0x000100, 2, &tail)).unwrap_err();
        assert!(matches!(
            err,
            BoxError::TruncatedPayload {
                box_type: "trun",
                ..
            }
        ));
    }
}
