//! Synthetic chunk builder for tools and tests.
//!
//! Produces a minimal `moof`+`mdat` pair the parser accepts: `mfhd`,
//! one `traf` with `tfhd` and `trun`, optionally the DRM
//! initialization-vector `uuid` box. Field selection mirrors the flag bits
//! the readers understand.

use crate::boxes::senc::DRM_IV_USERTYPE;

/// Shape of the chunk to build.
#[derive(Debug, Clone)]
pub struct ChunkWriterConfig {
    pub track_id: u32,
    pub sequence_number: u32,
    /// Written into `tfhd` behind flag 0x08.
    pub default_sample_duration: Option<u32>,
    /// Written into `tfhd` behind flag 0x10.
    pub default_sample_size: Option<u32>,
    /// Emit the per-sample duration column (trun flag 0x100).
    pub per_sample_durations: bool,
    /// Emit the per-sample size column (trun flag 0x200).
    pub per_sample_sizes: bool,
    /// One IV blob per sample; emits the DRM `uuid` box. Blob lengths must
    /// match the advertised IV size (8, or the override below).
    pub sample_ivs: Option<Vec<Vec<u8>>>,
    /// Emit the 20-byte override block advertising this IV size.
    pub iv_size_override: Option<u8>,
    /// Write `mdat` with a 64-bit extended size.
    pub extended_size_mdat: bool,
}

impl Default for ChunkWriterConfig {
    fn default() -> Self {
        ChunkWriterConfig {
            track_id: 1,
            sequence_number: 1,
            default_sample_duration: None,
            default_sample_size: None,
            per_sample_durations: true,
            per_sample_sizes: true,
            sample_ivs: None,
            iv_size_override: None,
            extended_size_mdat: false,
        }
    }
}

/// One sample of the chunk under construction.
#[derive(Debug, Clone)]
pub struct SampleSpec {
    /// Sample duration in hundred-nanosecond units.
    pub duration: u32,
    /// Sample payload, laid into `mdat` back to back.
    pub payload: Vec<u8>,
}

fn write_box(buffer: &mut Vec<u8>, fourcc: &[u8; 4], payload: &[u8]) {
    buffer.extend_from_slice(&(payload.len() as u32 + 8).to_be_bytes());
    buffer.extend_from_slice(fourcc);
    buffer.extend_from_slice(payload);
}

fn write_version_and_flags(buffer: &mut Vec<u8>, version: u8, flags: u32) {
    buffer.push(version);
    buffer.push(((flags >> 16) & 0xFF) as u8);
    buffer.push(((flags >> 8) & 0xFF) as u8);
    buffer.push((flags & 0xFF) as u8);
}

/// Builds one complete chunk.
pub fn build_chunk(config: &ChunkWriterConfig, samples: &[SampleSpec]) -> Vec<u8> {
    // mfhd
    let mut mfhd_payload = Vec::new();
    write_version_and_flags(&mut mfhd_payload, 0, 0);
    mfhd_payload.extend_from_slice(&config.sequence_number.to_be_bytes());

    // tfhd
    let mut tfhd_flags = 0u32;
    if config.default_sample_duration.is_some() {
        tfhd_flags |= 0x000008;
    }
    if config.default_sample_size.is_some() {
        tfhd_flags |= 0x000010;
    }
    let mut tfhd_payload = Vec::new();
    write_version_and_flags(&mut tfhd_payload, 0, tfhd_flags);
    tfhd_payload.extend_from_slice(&config.track_id.to_be_bytes());
    if let Some(duration) = config.default_sample_duration {
        tfhd_payload.extend_from_slice(&duration.to_be_bytes());
    }
    if let Some(size) = config.default_sample_size {
        tfhd_payload.extend_from_slice(&size.to_be_bytes());
    }

    // DRM uuid box, when IVs were requested
    let senc_box = config.sample_ivs.as_ref().map(|ivs| {
        let mut payload = Vec::new();
        payload.extend_from_slice(&DRM_IV_USERTYPE);
        let flags = if config.iv_size_override.is_some() {
            0x000001
        } else {
            0
        };
        write_version_and_flags(&mut payload, 0, flags);
        if let Some(iv_size) = config.iv_size_override {
            payload.extend_from_slice(&[0, 0, 1]); // algorithm id
            payload.push(iv_size);
            payload.extend_from_slice(&[0u8; 16]); // key id
        }
        payload.extend_from_slice(&(ivs.len() as u32).to_be_bytes());
        for iv in ivs {
            payload.extend_from_slice(iv);
        }
        let mut boxed = Vec::new();
        write_box(&mut boxed, b"uuid", &payload);
        boxed
    });

    // trun size is fixed once the columns are chosen, so the data offset
    // (from the moof start to the mdat payload) can be computed up front.
    let mut trun_flags = 0x000001u32; // data offset
    let mut stride = 0usize;
    if config.per_sample_durations {
        trun_flags |= 0x000100;
        stride += 4;
    }
    if config.per_sample_sizes {
        trun_flags |= 0x000200;
        stride += 4;
    }
    let trun_box_size = 8 + 4 + 4 + 4 + samples.len() * stride;
    let senc_box_size = senc_box.as_ref().map(Vec::len).unwrap_or(0);
    let traf_box_size = 8 + (8 + tfhd_payload.len()) + trun_box_size + senc_box_size;
    let moof_total = 8 + (8 + mfhd_payload.len()) + traf_box_size;
    let mdat_header_len = if config.extended_size_mdat { 16 } else { 8 };
    let data_offset = (moof_total + mdat_header_len) as i32;

    let mut trun_payload = Vec::new();
    write_version_and_flags(&mut trun_payload, 0, trun_flags);
    trun_payload.extend_from_slice(&(samples.len() as u32).to_be_bytes());
    trun_payload.extend_from_slice(&data_offset.to_be_bytes());
    for sample in samples {
        if config.per_sample_durations {
            trun_payload.extend_from_slice(&sample.duration.to_be_bytes());
        }
        if config.per_sample_sizes {
            trun_payload.extend_from_slice(&(sample.payload.len() as u32).to_be_bytes());
        }
    }

    let mut traf_payload = Vec::new();
    write_box(&mut traf_payload, b"tfhd", &tfhd_payload);
    write_box(&mut traf_payload, b"trun", &trun_payload);
    if let Some(senc) = senc_box {
        traf_payload.extend_from_slice(&senc);
    }

    let mut moof_payload = Vec::new();
    write_box(&mut moof_payload, b"mfhd", &mfhd_payload);
    write_box(&mut moof_payload, b"traf", &traf_payload);

    let mut chunk = Vec::new();
    write_box(&mut chunk, b"moof", &moof_payload);

    let mdat_payload_len: usize = samples.iter().map(|s| s.payload.len()).sum();
    if config.extended_size_mdat {
        chunk.extend_from_slice(&1u32.to_be_bytes());
        chunk.extend_from_slice(b"mdat");
        chunk.extend_from_slice(&(mdat_payload_len as u64 + 16).to_be_bytes());
    } else {
        chunk.extend_from_slice(&(mdat_payload_len as u32 + 8).to_be_bytes());
        chunk.extend_from_slice(b"mdat");
    }
    for sample in samples {
        chunk.extend_from_slice(&sample.payload);
    }

    chunk
}
