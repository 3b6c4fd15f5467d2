//! Parser for smooth-streaming client manifests.
//!
//! A manifest describes the available audio/video streams of a presentation,
//! the bitrate ladder of each stream and the timeline of downloadable chunks.
//! [`parse_manifest`] turns the manifest XML into a [`ManifestInfo`] that the
//! rest of the player works with.

pub mod error;
pub mod parser;
pub mod types;

pub use error::ManifestError;
pub use parser::parse_manifest;
pub use types::{ManifestInfo, MediaType, StreamInfo, TimelineMarker};
