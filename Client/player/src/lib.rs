//! Headless adaptive-streaming playback client.
//!
//! Wires the manifest parser, the chunk parser and the heuristics
//! engine together against local files. Everything the engine decides
//! is logged; chunks missing from disk are synthesized so the control
//! loop can be exercised without an encoder in the loop.

pub mod args;
pub mod player;
