//! End-to-end HLS preparation.
//!
//! Ties the pipeline together: parse the source MP4, analyze its tracks,
//! build the precomputed segment map from the video track's keyframes, then
//! materialize an init segment, one media segment per boundary (muxed A/V
//! when an audio track exists), and a VOD media playlist.

use crate::error::{Error, Result};
use crate::hls::{self, generate_master_playlist, generate_media_playlist};
use crate::mp4::codec_config;
use crate::mp4::{parse_file_info, read_boxes, MediaType, TrackInfo};
use crate::segment_map::SegmentMap;
use crate::track::{find_track, parse_track_analyses};

/// Settings for [`prepare`].
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct PrepareConfig {
    /// Target duration of each segment in seconds.
    pub target_segment_secs: f64,
    /// URI of the init segment, referenced from `#EXT-X-MAP`.
    pub init_uri: String,
    /// Template for segment URIs; `{}` is replaced with the segment index.
    pub segment_uri_template: String,
}

impl Default for PrepareConfig {
    fn default() -> Self {
        Self {
            target_segment_secs: 6.0,
            init_uri: "init.mp4".to_string(),
            segment_uri_template: "segment_{}.m4s".to_string(),
        }
    }
}

/// One emitted media segment with its playback metadata.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct MediaSegment {
    /// 0-based segment index; sequence numbers are index + 1.
    pub index: u32,
    /// Duration in seconds.
    pub duration_secs: f64,
    /// Start time within the presentation in seconds.
    pub start_secs: f64,
    /// Complete `styp` + `moof` + `mdat` bytes.
    pub bytes: Vec<u8>,
}

/// Everything an HLS origin needs to serve one prepared source.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct HlsPackage {
    /// `ftyp` + `moov` initialization segment.
    pub init_segment: Vec<u8>,
    /// Media segments in playback order.
    pub segments: Vec<MediaSegment>,
    /// VOD media playlist text.
    pub playlist: String,
    /// Total duration covered by the segments, in seconds.
    pub duration_secs: f64,
}

impl HlsPackage {
    /// Mean bitrate of the media segments in bits per second.
    pub fn bandwidth(&self) -> u64 {
        if self.duration_secs <= 0.0 {
            return 0;
        }
        let total_bytes: u64 = self.segments.iter().map(|s| s.bytes.len() as u64).sum();
        (total_bytes as f64 * 8.0 / self.duration_secs) as u64
    }
}

/// Prepare a progressive MP4 for HLS serving.
///
/// A video track is required; the first audio track, when present, is muxed
/// into each segment aligned on the video boundaries. Returns the init
/// segment, all media segments, and the playlist.
pub fn prepare(source: &[u8], config: &PrepareConfig) -> Result<HlsPackage> {
    let tree = read_boxes(source)?;
    let file_info = parse_file_info(&tree)?;
    let analyses = parse_track_analyses(&tree)?;

    let video = find_track(&analyses, MediaType::Video)
        .ok_or_else(|| Error::invalid_mp4("no video track"))?;
    let audio = find_track(&analyses, MediaType::Audio);

    #[cfg(feature = "tracing")]
    tracing::info!(
        has_audio = audio.is_some(),
        target_secs = config.target_segment_secs,
        "preparing HLS package"
    );

    let map = SegmentMap::build(&file_info, video, audio, config.target_segment_secs)?;

    let segments: Vec<MediaSegment> = map
        .segments
        .iter()
        .map(|s| MediaSegment {
            index: s.index,
            duration_secs: s.duration_secs,
            start_secs: s.start_secs,
            bytes: s.assemble(source),
        })
        .collect();

    let playlist = generate_media_playlist(&hls::MediaPlaylist {
        target_duration: map.max_segment_duration_secs.ceil() as u32,
        media_sequence: 0,
        segments: segments
            .iter()
            .map(|s| hls::Segment {
                duration: s.duration_secs,
                uri: config
                    .segment_uri_template
                    .replacen("{}", &s.index.to_string(), 1),
                title: None,
            })
            .collect(),
        ended: true,
        init_segment_uri: Some(config.init_uri.clone()),
    });

    Ok(HlsPackage {
        init_segment: map.init_segment,
        segments,
        playlist,
        duration_secs: map.duration_secs,
    })
}

/// Generate a single-variant master playlist for a prepared package.
///
/// The codec attribute comes from the tracks' decoder configuration records
/// and the bandwidth from the package's measured bitrate.
pub fn master_playlist(
    package: &HlsPackage,
    video: &TrackInfo,
    audio: Option<&TrackInfo>,
    media_playlist_uri: &str,
) -> String {
    let mut codecs = codec_config::codec_string(video);
    if let Some(audio) = audio {
        codecs.push(',');
        codecs.push_str(&codec_config::codec_string(audio));
    }
    generate_master_playlist(&hls::MasterPlaylist {
        variants: vec![hls::Variant {
            bandwidth: package.bandwidth(),
            resolution: video.dimensions,
            codecs,
            uri: media_playlist_uri.to_string(),
        }],
    })
}
