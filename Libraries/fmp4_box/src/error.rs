//! Error type for chunk parsing.
//!
//! A short read at a box boundary is never an error here; the parser reports
//! it through `Ok(false)` / `Ok(None)` so the caller can feed more bytes.
//! `BoxError` is reserved for data that can never become valid and for
//! calling the session out of order.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BoxError {
    /// A box declares a size of zero, smaller than its own header, or
    /// larger than the container holding it.
    #[error("box at offset {offset} declares invalid size {size}")]
    InvalidBoxSize { offset: u64, size: u64 },

    /// A top-level box is neither `moof` nor `mdat`.
    #[error("unexpected top-level box {}", crate::format_fourcc(.0))]
    UnknownTopLevel([u8; 4]),

    /// A container has trailing bytes too short to hold any child box.
    #[error("container leaves {remaining} stray byte(s) at offset {offset}")]
    ContainmentViolation { offset: u64, remaining: u64 },

    /// A DRM initialization-vector box declares an absurd sample count.
    #[error("DRM box declares {0} initialization vectors")]
    CorruptDrmBlobCount(u32),

    /// A box payload ends before its declared fields do.
    #[error("{box_type} payload truncated: need {needed} bytes, have {available}")]
    TruncatedPayload {
        box_type: &'static str,
        needed: usize,
        available: usize,
    },

    /// A frame operation was called before `parse_header` succeeded.
    #[error("chunk header has not been parsed yet")]
    HeaderNotParsed,
}

impl BoxError {
    pub(crate) fn truncated(box_type: &'static str, needed: usize, available: usize) -> BoxError {
        BoxError::TruncatedPayload {
            box_type,
            needed,
            available,
        }
    }
}
