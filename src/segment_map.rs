//! Precomputed segment maps for zero-copy serving.
//!
//! A [`SegmentMap`] holds everything an origin needs to serve a source file
//! as HLS without materializing the segments up front: the init segment, and
//! per segment the pre-built `moof`, the `mdat` header, and the coalesced
//! byte ranges to stream out of the source. At serve time a segment is
//! assembled from RAM plus range reads; [`MapSegment::assemble`] does the
//! same from an in-memory source, mostly for tests and small files.

use crate::codec::BoxWriter;
use crate::error::{Error, Result};
use crate::fmp4::{generate_init_segment, layout_segment, MuxedTrackInput, SegmentLayout};
use crate::mp4::FileInfo;
use crate::track::TrackAnalysis;

/// A byte range within the source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct DataRange {
    pub offset: u64,
    pub length: u64,
}

/// One precomputed segment: headers in memory, sample data as source
/// ranges.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct MapSegment {
    /// 0-based segment index.
    pub index: u32,
    /// Start time within the presentation in seconds.
    pub start_secs: f64,
    /// Duration in seconds.
    pub duration_secs: f64,
    /// Pre-built `moof` (patched offsets) and `mdat` header.
    pub layout: SegmentLayout,
    /// Coalesced source ranges, in mdat order (video block, then audio).
    pub data_ranges: Vec<DataRange>,
}

impl MapSegment {
    /// Total mdat payload length.
    pub fn data_length(&self) -> u64 {
        self.layout.data_length
    }

    /// Materialize the segment from an in-memory source.
    pub fn assemble(&self, source: &[u8]) -> Vec<u8> {
        let mut w = BoxWriter::with_capacity(self.layout.segment_len());
        w.put_bytes(&crate::fmp4::write_styp());
        w.put_bytes(&self.layout.moof);
        w.put_bytes(&self.layout.mdat_header);
        for range in &self.data_ranges {
            let start = range.offset as usize;
            w.put_bytes(&source[start..start + range.length as usize]);
        }
        w.into_vec()
    }
}

/// Precomputed HLS segment map for one source file.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct SegmentMap {
    /// `ftyp` + `moov` initialization segment.
    pub init_segment: Vec<u8>,
    /// All segments in playback order.
    pub segments: Vec<MapSegment>,
    /// Target segment duration the map was built for.
    pub target_duration_secs: f64,
    /// Largest actual segment duration.
    pub max_segment_duration_secs: f64,
    /// Total duration covered by the segments.
    pub duration_secs: f64,
}

impl SegmentMap {
    /// Build a map from analyzed tracks. Audio, when given, is aligned to
    /// the video boundaries and muxed into each segment.
    pub fn build(
        file_info: &FileInfo,
        video: &TrackAnalysis,
        audio: Option<&TrackAnalysis>,
        target_duration_secs: f64,
    ) -> Result<Self> {
        let boundaries = video.calculate_segments(target_duration_secs);
        if boundaries.is_empty() {
            return Err(Error::invalid_mp4("video track has no samples"));
        }

        let mut init_tracks = vec![video];
        if let Some(audio) = audio {
            init_tracks.push(audio);
        }
        let init_segment = generate_init_segment(file_info, &init_tracks);

        let mut segments = Vec::with_capacity(boundaries.len());
        let mut start_secs = 0.0f64;
        for (index, boundary) in boundaries.iter().enumerate() {
            let sequence_number = index as u32 + 1;
            let video_input = MuxedTrackInput {
                segment: boundary,
                track: video,
            };

            let layout = match audio {
                Some(audio_track) => {
                    let aligned =
                        audio_track.aligned_audio_segment(boundary, video.info.timescale);
                    if aligned.sample_count > 0 {
                        let audio_input = MuxedTrackInput {
                            segment: &aligned,
                            track: audio_track,
                        };
                        layout_segment(&[video_input, audio_input], sequence_number)
                    } else {
                        layout_segment(&[video_input], sequence_number)
                    }
                }
                None => layout_segment(&[video_input], sequence_number),
            };

            let data_ranges = coalesce_ranges(&layout.track_ranges);
            segments.push(MapSegment {
                index: index as u32,
                start_secs,
                duration_secs: boundary.duration,
                layout,
                data_ranges,
            });
            start_secs += boundary.duration;
        }

        let max_segment_duration_secs = segments
            .iter()
            .map(|s| s.duration_secs)
            .fold(0.0f64, f64::max);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            segments = segments.len(),
            duration_secs = start_secs,
            "built segment map"
        );

        Ok(Self {
            init_segment,
            segments,
            target_duration_secs,
            max_segment_duration_secs,
            duration_secs: start_secs,
        })
    }

    /// Number of segments in the map.
    pub fn segment_count(&self) -> u32 {
        self.segments.len() as u32
    }

    /// The segment containing the given presentation time, if any.
    pub fn find_segment_at_time(&self, time_secs: f64) -> Option<u32> {
        self.segments
            .iter()
            .find(|s| time_secs >= s.start_secs && time_secs < s.start_secs + s.duration_secs)
            .map(|s| s.index)
    }
}

/// Flatten per-track sample ranges into serve-order [`DataRange`]s, merging
/// adjacent reads. Track order is preserved; only ranges that touch are
/// merged, so interleaved sources keep multiple ranges.
fn coalesce_ranges(track_ranges: &[Vec<(u64, u32)>]) -> Vec<DataRange> {
    let mut out: Vec<DataRange> = Vec::new();
    for ranges in track_ranges {
        for &(offset, size) in ranges {
            match out.last_mut() {
                Some(last) if last.offset + last.length == offset => {
                    last.length += size as u64;
                }
                _ => out.push(DataRange {
                    offset,
                    length: size as u64,
                }),
            }
        }
    }
    out
}
