use crate::error::BoxError;
use crate::read_u32_be;
use crate::read_version_and_flags;

// The `MfhdBox` struct represents a Movie Fragment Header Box. It carries
// only the sequence number of the fragment within the stream; the chunk
// walker logs it and moves on.
#[derive(Debug, Clone, Copy, Default)]
pub struct MfhdBox {
    pub version: u8,
    pub flags: u32,
    pub sequence_number: u32,
}

impl MfhdBox {
    /// Parses an `mfhd` payload (the bytes after the box header).
    pub fn parse(payload: &[u8]) -> Result<MfhdBox, BoxError> {
        let (version, flags) = read_version_and_flags(payload, 0)
            .ok_or_else(|| BoxError::truncated("mfhd", 4, payload.len()))?;
        let sequence_number = read_u32_be(payload, 4)
            .ok_or_else(|| BoxError::truncated("mfhd", 8, payload.len()))?;
        Ok(MfhdBox {
            version,
            flags,
            sequence_number,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sequence_number() {
        let mut payload = vec![0u8; 4];
        payload.extend_from_slice(&42u32.to_be_bytes());
        let mfhd = MfhdBox::parse(&payload).unwrap();
        assert_eq!(mfhd.sequence_number, 42);
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let err = MfhdBox::parse(&[0u8; 6]).unwrap_err();
        assert!(matches!(err, BoxError::TruncatedPayload { .. }));
    }
}
