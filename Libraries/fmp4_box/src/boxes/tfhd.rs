use tracing::debug;

use crate::error::BoxError;
use crate::format_fourcc;
use crate::read_version_and_flags;
use crate::{read_u32_be, read_u64_be};

// The `TfhdBox` struct represents a Track Fragment Header Box. It names the
// track this fragment belongs to and, depending on the flag bits, carries
// per-track defaults the sample table falls back to.
//
// Flag bits and the optional field each one gates:
// - `0x000001`: `base_data_offset` (u64)
// - `0x000002`: `sample_description_index` (u32)
// - `0x000008`: `default_sample_duration` (u32)
// - `0x000010`: `default_sample_size` (u32)
// - `0x000020`: `default_sample_flags` (u32)
#[derive(Clone, Default)]
pub struct TfhdBox {
    pub version: u8,
    pub flags: u32,
    pub track_id: u32,
    pub base_data_offset: Option<u64>,
    pub sample_description_index: Option<u32>,
    pub default_sample_duration: Option<u32>,
    pub default_sample_size: Option<u32>,
    pub default_sample_flags: Option<u32>,
}

impl std::fmt::Debug for TfhdBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TfhdBox")
            .field("box_type", &format_fourcc(b"tfhd"))
            .field("version", &self.version)
            .field("flags", &format!("0x{:06X}", self.flags))
            .field("track_id", &self.track_id)
            .field("base_data_offset", &self.base_data_offset)
            .field("sample_description_index", &self.sample_description_index)
            .field("default_sample_duration", &self.default_sample_duration)
            .field("default_sample_size", &self.default_sample_size)
            .field("default_sample_flags", &self.default_sample_flags)
            .finish()
    }
}

impl TfhdBox {
    /// Parses a `tfhd` payload (the bytes after the box header).
    ///
    /// Versions other than 0 are skipped rather than rejected: the box
    /// contributes no defaults and the fragment is parsed without them.
    pub fn parse(payload: &[u8]) -> Result<TfhdBox, BoxError> {
        let (version, flags) = read_version_and_flags(payload, 0)
            .ok_or_else(|| BoxError::truncated("tfhd", 4, payload.len()))?;
        if version != 0 {
            debug!("ignoring tfhd with version {}", version);
            return Ok(TfhdBox::default());
        }

        let mut offset = 4;
        let track_id = read_u32_be(payload, offset)
            .ok_or_else(|| BoxError::truncated("tfhd", offset + 4, payload.len()))?;
        offset += 4;

        let base_data_offset = if flags & 0x000001 != 0 {
            let val = read_u64_be(payload, offset)
                .ok_or_else(|| BoxError::truncated("tfhd", offset + 8, payload.len()))?;
            offset += 8;
            Some(val)
        } else {
            None
        };

        let sample_description_index = if flags & 0x000002 != 0 {
            let val = read_u32_be(payload, offset)
                .ok_or_else(|| BoxError::truncated("tfhd", offset + 4, payload.len()))?;
            offset += 4;
            Some(val)
        } else {
            None
        };

        let default_sample_duration = if flags & 0x000008 != 0 {
            let val = read_u32_be(payload, offset)
                .ok_or_else(|| BoxError::truncated("tfhd", offset + 4, payload.len()))?;
            offset += 4;
            Some(val)
        } else {
            None
        };

        let default_sample_size = if flags & 0x000010 != 0 {
            let val = read_u32_be(payload, offset)
                .ok_or_else(|| BoxError::truncated("tfhd", offset + 4, payload.len()))?;
            offset += 4;
            Some(val)
        } else {
            None
        };

        let default_sample_flags = if flags & 0x000020 != 0 {
            let val = read_u32_be(payload, offset)
                .ok_or_else(|| BoxError::truncated("tfhd", offset + 4, payload.len()))?;
            Some(val)
        } else {
            None
        };

        Ok(TfhdBox {
            version,
            flags,
            track_id,
            base_data_offset,
            sample_description_index,
            default_sample_duration,
            default_sample_size,
            default_sample_flags,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(flags: u32, fields: &[u8]) -> Vec<u8> {
        let mut data = vec![0u8];
        data.extend_from_slice(&flags.to_be_bytes()[1..]);
        data.extend_from_slice(&7u32.to_be_bytes()); // track id
        data.extend_from_slice(fields);
        data
    }

    #[test]
    fn parses_bare_header() {
        let tfhd = TfhdBox::parse(&payload(0, &[])).unwrap();
        assert_eq!(tfhd.track_id, 7);
        assert_eq!(tfhd.base_data_offset, None);
        assert_eq!(tfhd.default_sample_duration, None);
    }

    #[test]
    fn parses_flag_gated_fields() {
        let mut fields = Vec::new();
        fields.extend_from_slice(&900u64.to_be_bytes());
        fields.extend_from_slice(&2u32.to_be_bytes());
        fields.extend_from_slice(&333667u32.to_be_bytes());
        fields.extend_from_slice(&4096u32.to_be_bytes());
        fields.extend_from_slice(&0x010000u32.to_be_bytes());
        let tfhd = TfhdBox::parse(&payload(0x00003B, &fields)).unwrap();
        assert_eq!(tfhd.base_data_offset, Some(900));
        assert_eq!(tfhd.sample_description_index, Some(2));
        assert_eq!(tfhd.default_sample_duration, Some(333667));
        assert_eq!(tfhd.default_sample_size, Some(4096));
        assert_eq!(tfhd.default_sample_flags, Some(0x010000));
    }

    #[test]
    fn later_version_is_skipped() {
        let mut data = payload(0x000008, &333667u32.to_be_bytes());
        data[0] = 1;
        let tfhd = TfhdBox::parse(&data).unwrap();
        assert_eq!(tfhd.track_id, 0);
        assert_eq!(tfhd.default_sample_duration, None);
    }

    #[test]
    fn flagged_field_past_payload_end_is_truncated() {
        let err = TfhdBox::parse(&payload(0x000001, &[0u8; 4])).unwrap_err();
        assert!(matches!(
            err,
            BoxError::TruncatedPayload {
                box_type: "tfhd",
                ..
            }
        ));
    }
}
