//! Per-track analysis: sample-level random access and segmentation.

mod locator;
mod segmenter;

pub use segmenter::SegmentInfo;

use crate::error::{Error, Result};
use crate::mp4::{parse_track_info, BoxTree, SampleTable, TrackInfo};
use locator::SampleLocator;

/// An immutable track analysis: metadata, the run-length sample tables, and
/// the precomputed locator indices that answer per-sample queries.
#[derive(Debug, Clone)]
pub struct TrackAnalysis {
    pub info: TrackInfo,
    pub table: SampleTable,
    locator: SampleLocator,
}

/// Parse every recognized track of the tree into an analysis.
///
/// Tracks with unknown handler types are skipped; recognized tracks missing
/// their sample tables are an error.
pub fn parse_track_analyses(tree: &BoxTree<'_>) -> Result<Vec<TrackAnalysis>> {
    let mut analyses = Vec::new();
    for trak in tree.tracks() {
        let Some(info) = parse_track_info(trak)? else {
            continue;
        };
        let stbl = trak
            .find_by_path("mdia/minf/stbl")
            .ok_or(Error::MissingBox("stbl"))?;
        let table = SampleTable::parse(stbl)?;
        analyses.push(TrackAnalysis::new(info, table));
    }
    Ok(analyses)
}

impl TrackAnalysis {
    /// Build an analysis from parsed metadata and tables.
    pub fn new(info: TrackInfo, table: SampleTable) -> Self {
        let locator = SampleLocator::new(&table);
        Self {
            info,
            table,
            locator,
        }
    }

    /// Total number of samples in the track.
    pub fn sample_count(&self) -> u32 {
        self.locator.sample_count()
    }

    /// Decode time of sample `index` in track ticks. Indices at or beyond
    /// the end saturate to the track's total ticks.
    pub fn decoding_time(&self, index: u32) -> u64 {
        self.locator.decoding_time(index)
    }

    /// Presentation time of sample `index`: DTS plus the composition offset,
    /// clamped at zero.
    pub fn presentation_time(&self, index: u32) -> u64 {
        let dts = self.locator.decoding_time(index) as i64;
        let offset = self.locator.composition_offset(index) as i64;
        (dts + offset).max(0) as u64
    }

    /// Duration of sample `index` in ticks; 0 beyond the end.
    pub fn sample_duration(&self, index: u32) -> u32 {
        self.locator.sample_duration(index)
    }

    /// Composition offset of sample `index`; 0 when the track has no `ctts`.
    pub fn composition_offset(&self, index: u32) -> i32 {
        self.locator.composition_offset(index)
    }

    /// Size of sample `index` in bytes; 0 when out of range.
    pub fn sample_size(&self, index: u32) -> u32 {
        self.table.sample_sizes.get(index)
    }

    /// Byte offset of sample `index` within the source file; 0 when out of
    /// range.
    pub fn sample_offset(&self, index: u32) -> u64 {
        self.locator.sample_offset(index, &self.table)
    }

    /// Whether sample `index` is a keyframe. Always true when the track has
    /// no `stss`.
    pub fn is_sync_sample(&self, index: u32) -> bool {
        self.locator.is_sync_sample(index, &self.table)
    }

    /// 0-based keyframe indices; every sample when the track has no `stss`.
    pub fn sync_sample_indices(&self) -> Vec<u32> {
        self.locator.sync_sample_indices(&self.table)
    }

    /// Largest keyframe index at or before `index`.
    pub fn nearest_sync_sample(&self, index: u32) -> Option<u32> {
        self.locator.nearest_sync_sample(index, &self.table)
    }

    /// `(offset, size)` pairs for `count` consecutive samples starting at
    /// `start`.
    pub fn sample_ranges(&self, start: u32, count: u32) -> Vec<(u64, u32)> {
        (start..start.saturating_add(count))
            .map(|i| (self.sample_offset(i), self.sample_size(i)))
            .collect()
    }

    /// Convert track ticks to seconds; 0 when the timescale is 0.
    pub fn ticks_to_secs(&self, ticks: u64) -> f64 {
        if self.info.timescale == 0 {
            0.0
        } else {
            ticks as f64 / self.info.timescale as f64
        }
    }

    /// Decode time of sample `index` in seconds.
    pub fn decoding_time_secs(&self, index: u32) -> f64 {
        self.ticks_to_secs(self.decoding_time(index))
    }

    /// Total track duration in seconds, derived from the sample table.
    pub fn total_duration_secs(&self) -> f64 {
        self.ticks_to_secs(self.locator.total_ticks())
    }

    /// Largest gap between consecutive keyframes in seconds.
    ///
    /// `None` without at least two keyframes or with a zero timescale.
    pub fn max_keyframe_interval_secs(&self) -> Option<f64> {
        if self.info.timescale == 0 {
            return None;
        }
        let syncs = self.sync_sample_indices();
        if syncs.len() < 2 {
            return None;
        }
        let max_interval = syncs
            .windows(2)
            .map(|w| self.decoding_time(w[1]).saturating_sub(self.decoding_time(w[0])))
            .max()?;
        Some(self.ticks_to_secs(max_interval))
    }

    pub(crate) fn has_composition_offsets(&self) -> bool {
        self.table.composition_offsets.is_some()
    }
}

/// Convenience: the first track of a given media type.
pub fn find_track<'a>(
    analyses: &'a [TrackAnalysis],
    media_type: crate::mp4::MediaType,
) -> Option<&'a TrackAnalysis> {
    analyses.iter().find(|a| a.info.media_type == media_type)
}
