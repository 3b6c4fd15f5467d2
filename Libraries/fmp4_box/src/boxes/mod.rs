// Box readers for the subset of the fragmented-MP4 grammar a media chunk
// uses. Each submodule owns one box type:
//
// - `header`: the common box header (size, fourcc, 64-bit extended size) and
//   the `BoxType` tag the chunk walker dispatches on.
// - `mfhd`: the Movie Fragment Header Box, carrying the fragment sequence
//   number.
// - `tfhd`: the Track Fragment Header Box, carrying the track id and
//   flag-gated per-track defaults.
// - `trun`: the Track Run Box, carrying the per-sample duration/size table.
// - `senc`: the proprietary DRM initialization-vector `uuid` box.

pub mod header;
pub mod mfhd;
pub mod senc;
pub mod tfhd;
pub mod trun;
