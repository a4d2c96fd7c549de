//! fMP4 segment generation.
//!
//! The init segment is assembled from the moov-side builders. Media segments
//! share one layout pass: the `moof` is streamed through a [`BoxWriter`]
//! with placeholder `trun` data offsets that are backpatched once the `moof`
//! size is known, and each track's source byte ranges are resolved so the
//! sample data can either be copied immediately (the `generate_*` functions)
//! or served later straight out of the source file (the segment map).

use super::boxes;
use crate::codec::BoxWriter;
use crate::mp4::{FileInfo, FourCC};
use crate::track::{SegmentInfo, TrackAnalysis};

/// Sync-sample flags for `trun` entries: I-frame.
const SAMPLE_FLAGS_SYNC: u32 = 0x0200_0000;
/// Non-sync sample flags: depends on others, not independently decodable.
const SAMPLE_FLAGS_NON_SYNC: u32 = 0x0101_0000;

const TRUN_DATA_OFFSET_PRESENT: u32 = 0x000001;
const TRUN_SAMPLE_DURATION_PRESENT: u32 = 0x000100;
const TRUN_SAMPLE_SIZE_PRESENT: u32 = 0x000200;
const TRUN_SAMPLE_FLAGS_PRESENT: u32 = 0x000400;
const TRUN_SAMPLE_CTS_PRESENT: u32 = 0x000800;

/// One track's contribution to a media segment.
#[derive(Debug, Clone, Copy)]
pub struct MuxedTrackInput<'a> {
    pub segment: &'a SegmentInfo,
    pub track: &'a TrackAnalysis,
}

/// A media segment laid out but not yet filled with sample bytes.
///
/// `moof` already carries patched data offsets assuming the mdat follows it
/// directly; the sample data for track `t` is the concatenation of
/// `track_ranges[t]` slices of the source file, in order, track blocks
/// back-to-back.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct SegmentLayout {
    /// Complete `moof` box with backpatched `trun` data offsets.
    pub moof: Vec<u8>,
    /// `mdat` header (normal or extended form).
    pub mdat_header: Vec<u8>,
    /// Per input track: `(source offset, size)` of each sample.
    pub track_ranges: Vec<Vec<(u64, u32)>>,
    /// Total mdat payload length.
    pub data_length: u64,
}

impl SegmentLayout {
    /// Total serialized segment length (`styp` + `moof` + `mdat`).
    pub fn segment_len(&self) -> usize {
        boxes::write_styp().len() + self.moof.len() + self.mdat_header.len()
            + self.data_length as usize
    }

    /// Materialize the full segment by copying sample bytes from `source`.
    pub fn assemble(&self, source: &[u8]) -> Vec<u8> {
        let mut w = BoxWriter::with_capacity(self.segment_len());
        w.put_bytes(&boxes::write_styp());
        w.put_bytes(&self.moof);
        w.put_bytes(&self.mdat_header);
        for ranges in &self.track_ranges {
            for &(offset, size) in ranges {
                let start = offset as usize;
                w.put_bytes(&source[start..start + size as usize]);
            }
        }
        w.into_vec()
    }
}

/// Lay out one media segment for any number of tracks (one `traf` each,
/// in input order), backpatching every `trun` data offset.
pub fn layout_segment(tracks: &[MuxedTrackInput<'_>], sequence_number: u32) -> SegmentLayout {
    let track_ranges: Vec<Vec<(u64, u32)>> = tracks
        .iter()
        .map(|t| t.track.sample_ranges(t.segment.first_sample, t.segment.sample_count))
        .collect();
    let track_sizes: Vec<u64> = track_ranges
        .iter()
        .map(|ranges| ranges.iter().map(|&(_, size)| size as u64).sum())
        .collect();
    let data_length: u64 = track_sizes.iter().sum();

    let total_samples: usize = tracks.iter().map(|t| t.segment.sample_count as usize).sum();
    let mut w = BoxWriter::with_capacity(128 + total_samples * 16);

    let moof = w.open_box(FourCC::MOOF);
    write_mfhd(&mut w, sequence_number);
    let offset_positions: Vec<usize> = tracks
        .iter()
        .map(|t| write_traf(&mut w, t.track, t.segment))
        .collect();
    w.close_box(moof);
    let moof_size = w.count();

    let mdat_header = boxes::write_mdat_header(data_length);

    // Each track's block starts after all previous tracks' data.
    let mut data_start = (moof_size + mdat_header.len()) as u64;
    for (position, size) in offset_positions.iter().zip(&track_sizes) {
        w.patch_i32(*position, data_start as i32);
        data_start += size;
    }

    SegmentLayout {
        moof: w.into_vec(),
        mdat_header,
        track_ranges,
        data_length,
    }
}

/// Generate the initialization segment (`ftyp` + `moov`) for the given
/// tracks.
///
/// Durations are written as zero (the fragments carry the timing) and a
/// trailing `mvex` declares one `trex` per track.
pub fn generate_init_segment(file_info: &FileInfo, tracks: &[&TrackAnalysis]) -> Vec<u8> {
    let ftyp = boxes::write_ftyp();

    let next_track_id = tracks
        .iter()
        .map(|t| t.info.track_id)
        .max()
        .unwrap_or(0)
        + 1;
    let mvhd = boxes::write_mvhd(file_info.timescale, next_track_id);

    let traks: Vec<Vec<u8>> = tracks.iter().map(|t| boxes::write_trak(&t.info)).collect();
    let track_ids: Vec<u32> = tracks.iter().map(|t| t.info.track_id).collect();
    let mvex = boxes::write_mvex(&track_ids);

    let mut children: Vec<&[u8]> = Vec::with_capacity(tracks.len() + 2);
    children.push(&mvhd);
    for trak in &traks {
        children.push(trak);
    }
    children.push(&mvex);
    let moov = crate::codec::container(FourCC::MOOV, &children);

    let mut out = Vec::with_capacity(ftyp.len() + moov.len());
    out.extend_from_slice(&ftyp);
    out.extend_from_slice(&moov);

    #[cfg(feature = "tracing")]
    tracing::debug!(tracks = tracks.len(), bytes = out.len(), "generated init segment");

    out
}

/// Generate a single-track media segment (`styp` + `moof` + `mdat`).
pub fn generate_media_segment(
    segment: &SegmentInfo,
    sequence_number: u32,
    track: &TrackAnalysis,
    source: &[u8],
) -> Vec<u8> {
    layout_segment(&[MuxedTrackInput { segment, track }], sequence_number).assemble(source)
}

/// Generate a muxed A/V media segment: one `moof` with a video `traf`
/// followed by an audio `traf`, sharing one `mdat` (video bytes first).
pub fn generate_muxed_segment(
    video: MuxedTrackInput<'_>,
    audio: MuxedTrackInput<'_>,
    sequence_number: u32,
    source: &[u8],
) -> Vec<u8> {
    layout_segment(&[video, audio], sequence_number).assemble(source)
}

fn write_mfhd(w: &mut BoxWriter, sequence_number: u32) {
    let mfhd = w.open_full_box(FourCC::MFHD, 0, 0);
    w.put_u32(sequence_number);
    w.close_box(mfhd);
}

/// Write one `traf` (tfhd + tfdt + trun) and return the byte position of the
/// `trun` data-offset placeholder for later patching.
fn write_traf(w: &mut BoxWriter, track: &TrackAnalysis, segment: &SegmentInfo) -> usize {
    let traf = w.open_box(FourCC::TRAF);

    // tfhd: default-base-is-moof.
    let tfhd = w.open_full_box(FourCC::TFHD, 0, 0x020000);
    w.put_u32(track.info.track_id);
    w.close_box(tfhd);

    // tfdt: 64-bit base media decode time.
    let tfdt = w.open_full_box(FourCC::TFDT, 1, 0);
    w.put_u64(segment.start_dts);
    w.close_box(tfdt);

    // trun: per-sample flags only for video, composition offsets only when
    // the track has a ctts.
    let is_video = track.info.media_type.is_video();
    let has_cts = track.has_composition_offsets();
    let mut flags =
        TRUN_DATA_OFFSET_PRESENT | TRUN_SAMPLE_DURATION_PRESENT | TRUN_SAMPLE_SIZE_PRESENT;
    if is_video {
        flags |= TRUN_SAMPLE_FLAGS_PRESENT;
    }
    if has_cts {
        flags |= TRUN_SAMPLE_CTS_PRESENT;
    }

    let trun = w.open_full_box(FourCC::TRUN, 1, flags);
    w.put_u32(segment.sample_count);
    let data_offset_pos = w.count();
    w.put_i32(0); // patched once the moof size is known
    let end = segment.first_sample + segment.sample_count;
    for i in segment.first_sample..end {
        w.put_u32(track.sample_duration(i));
        w.put_u32(track.sample_size(i));
        if is_video {
            w.put_u32(if track.is_sync_sample(i) {
                SAMPLE_FLAGS_SYNC
            } else {
                SAMPLE_FLAGS_NON_SYNC
            });
        }
        if has_cts {
            w.put_i32(track.composition_offset(i));
        }
    }
    w.close_box(trun);

    w.close_box(traf);
    data_offset_pos
}
