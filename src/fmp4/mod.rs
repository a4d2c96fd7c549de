//! Fragmented MP4 (ISO BMFF) serialization.
//!
//! Produces the two artifact kinds HLS needs: an initialization segment
//! (`ftyp` + `moov` with empty durations and a `mvex`/`trex` per track) and
//! media segments (`styp` + `moof` + `mdat`), optionally muxing video and
//! audio into a single `moof`.

mod boxes;
mod writer;

pub(crate) use boxes::write_styp;
pub use writer::{
    generate_init_segment, generate_media_segment, generate_muxed_segment, layout_segment,
    MuxedTrackInput, SegmentLayout,
};
