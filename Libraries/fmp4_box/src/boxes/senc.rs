use crate::error::BoxError;
use crate::read_version_and_flags;
use crate::{read_u16_be, read_u32_be};

/// Usertype identifying the DRM initialization-vector `uuid` box
/// (A2394F52-5A9B-4F14-A244-6C427C648DF4).
pub const DRM_IV_USERTYPE: [u8; 16] = [
    0xA2, 0x39, 0x4F, 0x52, 0x5A, 0x9B, 0x4F, 0x14, 0xA2, 0x44, 0x6C, 0x42, 0x7C, 0x64, 0x8D,
    0xF4,
];

/// Sample counts past this are treated as corruption, not data.
const MAX_IV_COUNT: u32 = 0x100000;

/// Default initialization-vector length when no override block is present.
const DEFAULT_IV_SIZE: u32 = 8;

// The `SencBox` struct represents the DRM initialization-vector box: one IV
// blob per sample, handed to the decryptor alongside the frame. The blobs
// are not copied at parse time; each entry records where the blob sits in
// the chunk buffer so frame extraction can slice it on demand.
//
// Flag bit `0x000001` gates a 20-byte override block (3-byte algorithm id,
// 1-byte IV size, 16-byte key id); the IV size is taken from it. Flag bit
// `0x000002` appends sub-sample ranges after each IV; they are walked over
// and dropped.
#[derive(Debug, Clone, Default)]
pub struct SencBox {
    pub version: u8,
    pub flags: u32,
    pub iv_size: u32,
    pub sample_count: u32,
    /// Absolute byte offset and length of each sample's IV blob within the
    /// chunk buffer.
    pub entries: Vec<(u64, u32)>,
}

impl SencBox {
    /// Parses the box payload following the 16-byte usertype.
    ///
    /// `base_offset` is the absolute chunk offset of `payload[0]`, so the
    /// recorded entries point into the whole chunk buffer.
    pub fn parse(payload: &[u8], base_offset: u64) -> Result<SencBox, BoxError> {
        let (version, flags) = read_version_and_flags(payload, 0)
            .ok_or_else(|| BoxError::truncated("uuid", 4, payload.len()))?;
        let mut offset = 4;

        let iv_size = if flags & 0x000001 != 0 {
            // Algorithm id (3 bytes), IV size (1 byte), key id (16 bytes).
            let block_end = offset + 20;
            let iv_byte = payload
                .get(offset + 3)
                .copied()
                .ok_or_else(|| BoxError::truncated("uuid", block_end, payload.len()))?;
            if payload.len() < block_end {
                return Err(BoxError::truncated("uuid", block_end, payload.len()));
            }
            offset = block_end;
            iv_byte as u32
        } else {
            DEFAULT_IV_SIZE
        };

        let sample_count = read_u32_be(payload, offset)
            .ok_or_else(|| BoxError::truncated("uuid", offset + 4, payload.len()))?;
        offset += 4;
        if sample_count > MAX_IV_COUNT {
            return Err(BoxError::CorruptDrmBlobCount(sample_count));
        }

        let mut entries = Vec::with_capacity(sample_count as usize);
        for _ in 0..sample_count {
            let end = offset
                .checked_add(iv_size as usize)
                .ok_or_else(|| BoxError::truncated("uuid", usize::MAX, payload.len()))?;
            if payload.len() < end {
                return Err(BoxError::truncated("uuid", end, payload.len()));
            }
            entries.push((base_offset + offset as u64, iv_size));
            offset = end;

            if flags & 0x000002 != 0 {
                // Sub-sample ranges: entry count then 6 bytes per entry.
                let ranges = read_u16_be(payload, offset)
                    .ok_or_else(|| BoxError::truncated("uuid", offset + 2, payload.len()))?;
                offset += 2;
                let skip = ranges as usize * 6;
                if payload.len() < offset + skip {
                    return Err(BoxError::truncated("uuid", offset + skip, payload.len()));
                }
                offset += skip;
            }
        }

        Ok(SencBox {
            version,
            flags,
            iv_size,
            sample_count,
            entries,
        })
    }
}
