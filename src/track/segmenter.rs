//! Segment boundary selection and cross-timescale audio alignment.

use super::TrackAnalysis;

/// One keyframe-aligned run of samples destined for a media segment.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct SegmentInfo {
    /// 0-based index of the first sample.
    pub first_sample: u32,
    /// Number of samples in the segment.
    pub sample_count: u32,
    /// Segment duration in seconds.
    pub duration: f64,
    /// Decode time of the first sample, in track ticks.
    pub start_dts: u64,
    /// Presentation time of the first sample, in track ticks.
    pub start_pts: u64,
    /// Whether the first sample is a keyframe. Always true for emitted
    /// segments.
    pub starts_with_keyframe: bool,
}

impl SegmentInfo {
    /// A zero-sized segment anchored at `first_sample`.
    fn empty(first_sample: u32, start_dts: u64) -> Self {
        Self {
            first_sample,
            sample_count: 0,
            duration: 0.0,
            start_dts,
            start_pts: start_dts,
            starts_with_keyframe: true,
        }
    }
}

impl TrackAnalysis {
    /// Partition the track into keyframe-aligned segments of at least
    /// `target_seconds` each (except possibly the last).
    ///
    /// Every boundary is the smallest keyframe whose DTS distance from the
    /// segment start meets the target; a tie closes the segment exactly
    /// there. The emitted segments cover all samples from the first keyframe
    /// to the end of the track.
    pub fn calculate_segments(&self, target_seconds: f64) -> Vec<SegmentInfo> {
        let sample_count = self.sample_count();
        if sample_count == 0 {
            return Vec::new();
        }
        let syncs = self.sync_sample_indices();
        if syncs.is_empty() {
            return Vec::new();
        }
        let timescale = self.info.timescale;

        let mut segments = Vec::new();
        let mut start_pos = 0usize;
        loop {
            let start = syncs[start_pos];
            let start_dts = self.decoding_time(start);

            // Smallest sync strictly after `start` meeting the target.
            let mut boundary_pos = None;
            for (pos, &sync) in syncs.iter().enumerate().skip(start_pos + 1) {
                let span = self.ticks_to_secs(self.decoding_time(sync) - start_dts);
                if timescale > 0 && span >= target_seconds {
                    boundary_pos = Some(pos);
                    break;
                }
            }

            let end = match boundary_pos {
                Some(pos) => syncs[pos],
                None => sample_count,
            };
            let end_dts = self.decoding_time(end);
            segments.push(SegmentInfo {
                first_sample: start,
                sample_count: end - start,
                duration: self.ticks_to_secs(end_dts - start_dts),
                start_dts,
                start_pts: self.presentation_time(start),
                starts_with_keyframe: true,
            });

            match boundary_pos {
                Some(pos) => start_pos = pos,
                None => break,
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            track_id = self.info.track_id,
            target_seconds,
            segments = segments.len(),
            "calculated segment boundaries"
        );

        segments
    }

    /// Select the run of audio samples covering a video segment's time span.
    ///
    /// The video segment's start is converted into audio ticks with
    /// round-to-nearest wide arithmetic; samples are then accumulated until
    /// the video duration is covered or the track ends. Audio tracks carry
    /// no `stss`, so the result always starts on a sync sample.
    pub fn aligned_audio_segment(
        &self,
        video_segment: &SegmentInfo,
        video_timescale: u32,
    ) -> SegmentInfo {
        let audio_timescale = self.info.timescale;
        let sample_count = self.sample_count();
        if audio_timescale == 0 || video_timescale == 0 || sample_count == 0 {
            return SegmentInfo::empty(0, 0);
        }

        let start_ticks = convert_ticks(
            video_segment.start_dts,
            audio_timescale,
            video_timescale,
        );

        // First audio sample at or after the converted start.
        let first = partition_samples(sample_count, |i| self.decoding_time(i) < start_ticks);
        if first >= sample_count {
            return SegmentInfo::empty(first, self.decoding_time(first));
        }

        let target_ticks = (video_segment.duration * audio_timescale as f64).round() as u64;
        let mut accumulated = 0u64;
        let mut end = first;
        while end < sample_count && accumulated < target_ticks {
            accumulated += self.sample_duration(end) as u64;
            end += 1;
        }

        let start_dts = self.decoding_time(first);
        SegmentInfo {
            first_sample: first,
            sample_count: end - first,
            duration: self.ticks_to_secs(accumulated),
            start_dts,
            start_pts: start_dts,
            starts_with_keyframe: true,
        }
    }
}

/// `ticks · to_timescale / from_timescale`, rounded to nearest, in wide
/// arithmetic.
fn convert_ticks(ticks: u64, to_timescale: u32, from_timescale: u32) -> u64 {
    let numerator = ticks as u128 * to_timescale as u128 + from_timescale as u128 / 2;
    (numerator / from_timescale as u128) as u64
}

/// First index in `[0, count)` where `pred` turns false.
fn partition_samples(count: u32, pred: impl Fn(u32) -> bool) -> u32 {
    let mut low = 0u32;
    let mut high = count;
    while low < high {
        let mid = low + (high - low) / 2;
        if pred(mid) {
            low = mid + 1;
        } else {
            high = mid;
        }
    }
    low
}
