//! Segment-map and master-playlist behavior over synthetic sources.

mod common;

use common::{build_movie, TrackSpec};
use vodforge::mp4::FourCC;
use vodforge::{
    master_playlist, parse_file_info, parse_track_analyses, prepare, read_boxes, MediaType,
    PrepareConfig, SegmentMap,
};

fn analyses_for(movie: &[u8]) -> (vodforge::FileInfo, Vec<vodforge::TrackAnalysis>) {
    let tree = read_boxes(movie).unwrap();
    (
        parse_file_info(&tree).unwrap(),
        parse_track_analyses(&tree).unwrap(),
    )
}

#[test]
fn map_segments_cover_the_presentation() {
    let movie = build_movie(&[TrackSpec::video(90, vec![1, 31, 61]), TrackSpec::audio(430)]);
    let (info, analyses) = analyses_for(&movie);
    let video = &analyses[0];
    let audio = Some(&analyses[1]);

    let map = SegmentMap::build(&info, video, audio, 1.0).unwrap();
    assert_eq!(map.segment_count(), 3);
    assert!((map.duration_secs - 3.0).abs() < 1e-6);
    assert!((map.max_segment_duration_secs - 1.0).abs() < 1e-6);

    // Lookup by time: boundaries at 0, 1, 2 seconds.
    assert_eq!(map.find_segment_at_time(0.0), Some(0));
    assert_eq!(map.find_segment_at_time(0.99), Some(0));
    assert_eq!(map.find_segment_at_time(1.0), Some(1));
    assert_eq!(map.find_segment_at_time(2.5), Some(2));
    assert_eq!(map.find_segment_at_time(3.0), None);
}

#[test]
fn assembled_map_segments_match_the_prepared_package() {
    let movie = build_movie(&[TrackSpec::video(90, vec![1, 31, 61]), TrackSpec::audio(430)]);
    let (info, analyses) = analyses_for(&movie);
    let video = &analyses[0];
    let audio = Some(&analyses[1]);

    let map = SegmentMap::build(&info, video, audio, 1.0).unwrap();
    let config = PrepareConfig {
        target_segment_secs: 1.0,
        ..PrepareConfig::default()
    };
    let package = prepare(&movie, &config).unwrap();

    assert_eq!(package.init_segment, map.init_segment);
    assert_eq!(package.segments.len(), map.segments.len());
    for (from_map, from_package) in map.segments.iter().zip(&package.segments) {
        assert_eq!(from_map.assemble(&movie), from_package.bytes);
    }
}

#[test]
fn map_ranges_describe_exactly_the_mdat_payload() {
    let movie = build_movie(&[TrackSpec::video(90, vec![1, 31, 61]), TrackSpec::audio(430)]);
    let (info, analyses) = analyses_for(&movie);
    let video = &analyses[0];
    let audio = Some(&analyses[1]);

    let map = SegmentMap::build(&info, video, audio, 1.0).unwrap();
    for segment in &map.segments {
        let range_total: u64 = segment.data_ranges.iter().map(|r| r.length).sum();
        assert_eq!(range_total, segment.data_length());

        // Contiguous samples within one track coalesce into a single range,
        // so a two-track segment needs at most two ranges here.
        assert!(segment.data_ranges.len() <= 2);

        // The assembled segment parses and its mdat matches the ranges.
        let bytes = segment.assemble(&movie);
        let tree = read_boxes(&bytes).unwrap();
        let mdat = tree.find_child(FourCC::MDAT).unwrap();
        assert_eq!(mdat.data_size(), segment.data_length());
    }
}

#[test]
fn video_only_map_has_single_range_segments() {
    let movie = build_movie(&[TrackSpec::video(90, vec![1, 31, 61])]);
    let (info, analyses) = analyses_for(&movie);

    let map = SegmentMap::build(&info, &analyses[0], None, 2.0).unwrap();
    assert_eq!(map.segment_count(), 2);
    for segment in &map.segments {
        assert_eq!(segment.data_ranges.len(), 1);
    }
}

#[test]
fn master_playlist_carries_codecs_and_resolution() {
    let movie = build_movie(&[TrackSpec::video(90, vec![1, 31, 61]), TrackSpec::audio(430)]);
    let (info, _) = analyses_for(&movie);
    let package = prepare(&movie, &PrepareConfig::default()).unwrap();

    let video_info = info
        .tracks
        .iter()
        .find(|t| t.media_type == MediaType::Video)
        .unwrap();
    let audio_info = info
        .tracks
        .iter()
        .find(|t| t.media_type == MediaType::Audio)
        .unwrap();

    let m3u8 = master_playlist(&package, video_info, Some(audio_info), "media.m3u8");

    assert!(m3u8.starts_with("#EXTM3U\n"));
    assert!(m3u8.contains("RESOLUTION=1280x720"));
    // The synthetic stsd has no real avcC/esds children, so the codec
    // strings fall back to the sample-entry FourCCs.
    assert!(m3u8.contains("CODECS=\"avc1,mp4a\""));
    assert!(m3u8.contains("BANDWIDTH="));
    assert!(m3u8.contains("media.m3u8"));
    assert!(package.bandwidth() > 0);
}
