//! Data structures describing a parsed manifest.

use std::collections::{BTreeMap, HashMap};

use regex::Regex;

/// Kind of media a stream carries.
///
/// Text tracks never become streams; their content is lifted into
/// [`ManifestInfo::markers`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    Video,
    Audio,
}

impl MediaType {
    /// Maps a `StreamIndex` `Type` attribute onto a media type,
    /// case-insensitively. Returns `None` for anything else.
    pub fn from_type_attr(value: &str) -> Option<MediaType> {
        if value.eq_ignore_ascii_case("video") {
            Some(MediaType::Video)
        } else if value.eq_ignore_ascii_case("audio") {
            Some(MediaType::Audio)
        } else {
            None
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaType::Video => write!(f, "video"),
            MediaType::Audio => write!(f, "audio"),
        }
    }
}

/// One audio or video stream of the presentation.
#[derive(Debug, Clone)]
pub struct StreamInfo {
    /// Position of this stream among the non-text streams of the manifest,
    /// counted in declaration order starting at 0.
    pub stream_index: usize,
    /// Whether this stream carries video or audio.
    pub media_type: MediaType,
    /// Chunk URL template, already made absolute against the manifest URL.
    /// Placeholders like `{bitrate}` and `{start time}` are still in place;
    /// [`StreamInfo::chunk_url`] substitutes them.
    pub base_url: String,
    /// Declared language of the stream, empty when the manifest names none.
    pub language: String,
    /// Number of chunks the manifest declares for this stream.
    pub chunk_count: u32,
    /// Bitrate ladder: each available bitrate in bits per second mapped to the
    /// raw attributes of its quality level (FourCC, Width, Height,
    /// CodecPrivateData, ...). Ordered ascending by bitrate.
    pub bitrates: BTreeMap<u64, HashMap<String, String>>,
    /// Durations of the declared chunks, keyed by chunk id. Chunks the
    /// manifest does not describe have no entry.
    pub chunk_durations: HashMap<u32, u64>,
    /// Attributes of the highest-bitrate quality level, with Width/Height
    /// rewritten by the aspect-ratio reconciliation for video streams.
    pub description: HashMap<String, String>,
}

impl StreamInfo {
    /// All bitrates of the ladder, ascending.
    pub fn bitrate_ladder(&self) -> Vec<u64> {
        self.bitrates.keys().copied().collect()
    }

    /// Highest bitrate of the ladder, `None` for an empty ladder.
    pub fn max_bitrate(&self) -> Option<u64> {
        self.bitrates.keys().next_back().copied()
    }

    /// Resolves the chunk URL template for one chunk, substituting the
    /// requested bitrate and the chunk start time (in timescale units).
    pub fn chunk_url(&self, bitrate: u64, start_time: u64) -> String {
        let bitrate_marker = Regex::new(r"(?i)\{bitrate\}").unwrap();
        let start_marker = Regex::new(r"(?i)\{start[ _]?time\}").unwrap();
        let url = bitrate_marker.replace_all(&self.base_url, bitrate.to_string().as_str());
        let url = start_marker.replace_all(&url, start_time.to_string().as_str());
        url.into_owned()
    }
}

/// A timed event lifted out of a text track.
#[derive(Debug, Clone)]
pub struct TimelineMarker {
    /// Presentation time of the event, in timescale units.
    pub time: u64,
    /// Kind of event: `NAME` for plain markers, the declared command type
    /// for script commands.
    pub marker_type: String,
    /// Payload of the event.
    pub text: String,
}

/// A fully parsed manifest.
#[derive(Debug, Clone)]
pub struct ManifestInfo {
    /// Declared major manifest version, -1 when the attribute is absent.
    pub major_version: i32,
    /// Declared minor manifest version, -1 when the attribute is absent.
    pub minor_version: i32,
    /// All attributes of the manifest root, values trimmed. Always contains
    /// at least `Duration`.
    pub attributes: HashMap<String, String>,
    /// True once parsing has completed; a rejected manifest never produces a
    /// `ManifestInfo` at all.
    pub valid: bool,
    /// The audio and video streams, in declaration order.
    pub streams: Vec<StreamInfo>,
    /// Markers and script commands collected from all text tracks, in
    /// declaration order.
    pub markers: Vec<TimelineMarker>,
}

impl ManifestInfo {
    /// Declared presentation duration in timescale units, when the root
    /// `Duration` attribute is numeric.
    pub fn duration(&self) -> Option<u64> {
        self.attributes.get("Duration").and_then(|d| d.parse().ok())
    }
}
