use crate::error::BoxError;
use crate::format_fourcc;
use crate::{read_u32_be, read_u64_be};

// The box types the chunk walker tells apart. Anything else is carried as
// `Other` so it can be skipped (inside a container) or rejected (at the top
// level) with the original fourcc intact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxType {
    Moof,
    Mfhd,
    Traf,
    Tfhd,
    Trun,
    Mdat,
    Uuid,
    Other([u8; 4]),
}

impl BoxType {
    pub fn from_fourcc(fourcc: [u8; 4]) -> BoxType {
        match &fourcc {
            b"moof" => BoxType::Moof,
            b"mfhd" => BoxType::Mfhd,
            b"traf" => BoxType::Traf,
            b"tfhd" => BoxType::Tfhd,
            b"trun" => BoxType::Trun,
            b"mdat" => BoxType::Mdat,
            b"uuid" => BoxType::Uuid,
            _ => BoxType::Other(fourcc),
        }
    }

    pub fn fourcc(&self) -> [u8; 4] {
        match self {
            BoxType::Moof => *b"moof",
            BoxType::Mfhd => *b"mfhd",
            BoxType::Traf => *b"traf",
            BoxType::Tfhd => *b"tfhd",
            BoxType::Trun => *b"trun",
            BoxType::Mdat => *b"mdat",
            BoxType::Uuid => *b"uuid",
            BoxType::Other(fourcc) => *fourcc,
        }
    }
}

impl std::fmt::Display for BoxType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", format_fourcc(&self.fourcc()))
    }
}

/// Decoded box header: type plus the split between header and payload bytes.
#[derive(Debug, Clone, Copy)]
pub struct BoxHeader {
    pub box_type: BoxType,
    pub header_len: u64,
    pub payload_len: u64,
}

impl BoxHeader {
    pub fn total_size(&self) -> u64 {
        self.header_len + self.payload_len
    }
}

/// Reads one box header at `offset`.
///
/// `remaining` is the byte count the enclosing container still claims from
/// `offset`; pass `u64::MAX` at the top level, where the chunk length is
/// open-ended. Returns `Ok(None)` when the bytes fed so far stop short of
/// the header itself; the caller feeds more and retries. A size of 0, a size
/// smaller than the header, or a size overrunning the container is
/// [`BoxError::InvalidBoxSize`]. A 32-bit size of 1 switches to the 64-bit
/// extended size.
pub fn read_box_header(
    data: &[u8],
    offset: u64,
    remaining: u64,
) -> Result<Option<BoxHeader>, BoxError> {
    if remaining < 8 {
        return Err(BoxError::ContainmentViolation { offset, remaining });
    }
    let at = match usize::try_from(offset) {
        Ok(at) => at,
        Err(_) => return Ok(None),
    };

    let size32 = match read_u32_be(data, at) {
        Some(size) => size,
        None => return Ok(None),
    };
    let fourcc = match at.checked_add(4).and_then(|s| read_u32_be(data, s)) {
        Some(raw) => raw.to_be_bytes(),
        None => return Ok(None),
    };

    let (size, header_len) = if size32 == 1 {
        if remaining < 16 {
            return Err(BoxError::ContainmentViolation { offset, remaining });
        }
        match at.checked_add(8).and_then(|s| read_u64_be(data, s)) {
            Some(wide) => (wide, 16u64),
            None => return Ok(None),
        }
    } else {
        (size32 as u64, 8u64)
    };

    if size < header_len || size > remaining {
        return Err(BoxError::InvalidBoxSize { offset, size });
    }

    Ok(Some(BoxHeader {
        box_type: BoxType::from_fourcc(fourcc),
        header_len,
        payload_len: size - header_len,
    }))
}
