//! Bitrate-selection heuristics for adaptive streaming playback.
//!
//! The engine decides, chunk by chunk, which bitrate the downloader should
//! fetch next. Three signals feed the decision:
//!
//! - measured download bandwidth, smoothed by an outlier-aware
//!   [`SlidingWindow`],
//! - the observed encoded bitrate of each ladder entry (nominal bitrates
//!   lie, measured chunks do not),
//! - decode/render performance: dropped and rendered frames per second,
//!   polled once per "tic" from the playback element.
//!
//! When a bitrate cannot sustain real-time playback it is *suspended* for a
//! geometrically growing revocation period and excluded from selection; the
//! lowest ladder entry is never suspended. Revocation re-enables an entry
//! for retesting. All state lives behind [`HeuristicsEngine`], which is
//! strictly single-consumer: the owning application serializes every call.

pub mod bitrate;
pub mod config;
pub mod engine;
pub mod monitor;
pub mod sliding_window;

pub use bitrate::{BitrateInfo, FrameRateTestState};
pub use config::HeuristicsConfig;
pub use engine::{EventCallback, HeuristicsEngine, HeuristicsEvent, StreamTopology};
pub use monitor::FrameRateMediaInfo;
pub use sliding_window::SlidingWindow;

/// Presentation-time units per second (100 ns per unit).
pub const HNS_PER_SECOND: i64 = 10_000_000;
