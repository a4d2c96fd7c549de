//! vodforge: MP4 parsing, keyframe-aligned segmentation, and fMP4/HLS
//! packaging.
//!
//! This crate converts a conventional progressive MP4 into an HLS-ready
//! initialization segment plus a sequence of media segments aligned on
//! keyframes, without re-encoding anything.
//!
//! # Modules
//!
//! - [`codec`] - big-endian byte reader/writer with box helpers and patching
//! - [`mp4`] - box tree traversal, movie/track metadata, sample tables
//! - [`track`] - per-sample locator queries and segment boundary selection
//! - [`fmp4`] - fragmented MP4 serialization (init segment, moof/mdat)
//! - [`segment_map`] - precomputed segment boundaries and source byte ranges
//! - [`hls`] - HLS playlist generation (M3U8)
//! - [`prepare`] - the end-to-end pipeline producing an [`HlsPackage`]
//!
//! # Pipeline
//!
//! 1. [`mp4::read_boxes`] parses the box structure into an arena-backed tree
//! 2. [`mp4::parse_file_info`] and [`track::parse_track_analyses`] decode the
//!    movie header and each track's sample tables
//! 3. [`track::TrackAnalysis::calculate_segments`] picks keyframe-aligned
//!    boundaries honoring a target duration; audio is aligned to the video
//!    boundaries across timescales
//! 4. [`fmp4::generate_init_segment`] and
//!    [`fmp4::generate_media_segment`] / [`fmp4::generate_muxed_segment`]
//!    emit the byte-exact output, backpatching `trun` data offsets
//!
//! The whole core is pure computation over byte slices: no I/O, no shared
//! state, no locking.

pub mod codec;
pub mod error;
pub mod fmp4;
pub mod hls;
pub mod mp4;
pub mod prepare;
pub mod segment_map;
pub mod track;

// Re-export commonly used items at the crate root.
pub use error::{Error, Result};
pub use fmp4::{
    generate_init_segment, generate_media_segment, generate_muxed_segment, MuxedTrackInput,
};
pub use mp4::{parse_file_info, read_boxes, FileInfo, FourCC, MediaType, SampleTable, TrackInfo};
pub use prepare::{master_playlist, prepare, HlsPackage, MediaSegment, PrepareConfig};
pub use segment_map::{DataRange, MapSegment, SegmentMap};
pub use track::{parse_track_analyses, SegmentInfo, TrackAnalysis};
