//! Error type for manifest parsing.

use thiserror::Error;

/// Reasons a manifest is rejected.
///
/// Any error aborts the whole parse; there is no partial [`crate::ManifestInfo`]
/// for a broken manifest.
#[derive(Error, Debug)]
pub enum ManifestError {
    /// The document does not start with a `SmoothStreamingMedia` element.
    #[error("manifest root element is missing or not SmoothStreamingMedia")]
    MissingRoot,

    /// The root element carries no `Duration` attribute.
    #[error("manifest root is missing the Duration attribute")]
    MissingDuration,

    /// The manifest declares no audio or video streams at all.
    #[error("manifest contains no audio or video streams")]
    NoStreams,

    /// A `StreamIndex` element has no `Type` attribute.
    #[error("StreamIndex {position} has no Type attribute")]
    MissingStreamType { position: usize },

    /// A `StreamIndex` element is typed neither video, audio nor text.
    #[error("StreamIndex {position} has unsupported type {value:?}")]
    UnknownMediaType { position: usize, value: String },

    /// An audio or video `StreamIndex` has no usable `Url` attribute.
    #[error("StreamIndex {position} has no Url attribute")]
    MissingStreamUrl { position: usize },

    /// An audio or video `StreamIndex` has no positive `Chunks` attribute.
    #[error("StreamIndex {position} has no positive Chunks attribute")]
    MissingChunkCount { position: usize },

    /// A required attribute is absent from an element.
    #[error("{element} element is missing the {attribute} attribute")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },

    /// A quality level carries both `CodecPrivateData` and `WaveFormatEx`.
    #[error("quality level at {bitrate} bps carries both CodecPrivateData and WaveFormatEx")]
    ConflictingCodecData { bitrate: u64 },

    /// A numeric attribute did not parse as a number.
    #[error("{element}@{attribute}={value:?} is not a valid number")]
    InvalidNumber {
        element: &'static str,
        attribute: &'static str,
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },

    /// The XML itself is malformed.
    #[error("malformed manifest XML: {0}")]
    Xml(#[from] quick_xml::Error),

    /// An attribute list is malformed.
    #[error("malformed manifest attribute: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    /// An element or attribute name is not valid UTF-8.
    #[error("manifest contains a non-UTF-8 name: {0}")]
    Encoding(#[from] std::str::Utf8Error),
}
