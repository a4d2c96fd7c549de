//! MP4 container parsing.
//!
//! Turns raw bytes into an arena-backed box tree, then into movie/track
//! metadata and run-length sample tables. Everything needed for HLS
//! preparation is extracted here; the locator and segmenter consume the
//! result.

pub mod codec_config;
mod fourcc;
mod info;
mod sample_table;
mod tree;

pub use fourcc::FourCC;
pub use info::{parse_file_info, parse_track_info, FileInfo, MediaType, TrackInfo};
pub use sample_table::{
    CompositionOffsetEntry, SampleSizes, SampleTable, SampleToChunkEntry, TimeToSampleEntry,
};
pub use tree::{read_boxes, BoxRef, BoxTree};
