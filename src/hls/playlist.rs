//! HLS playlist (M3U8) text generation.

use super::types::{MasterPlaylist, MediaPlaylist};
use std::fmt::Write;

/// Generate an HLS master playlist from a [`MasterPlaylist`].
///
/// Output includes the `#EXTM3U` header and one `#EXT-X-STREAM-INF` per
/// variant.
pub fn generate_master_playlist(playlist: &MasterPlaylist) -> String {
    let mut out = String::new();

    writeln!(out, "#EXTM3U").unwrap();

    for variant in &playlist.variants {
        write!(out, "#EXT-X-STREAM-INF:BANDWIDTH={}", variant.bandwidth).unwrap();

        if let Some((w, h)) = variant.resolution {
            write!(out, ",RESOLUTION={}x{}", w, h).unwrap();
        }

        if !variant.codecs.is_empty() {
            write!(out, ",CODECS=\"{}\"", variant.codecs).unwrap();
        }

        writeln!(out).unwrap();
        writeln!(out, "{}", variant.uri).unwrap();
    }

    out
}

/// Generate an HLS media playlist from a [`MediaPlaylist`].
///
/// Output includes:
/// - `#EXTM3U` and `#EXT-X-VERSION:7` (fMP4 segments)
/// - `#EXT-X-TARGETDURATION` and `#EXT-X-MEDIA-SEQUENCE`
/// - Optional `#EXT-X-MAP` for the initialization segment
/// - `#EXTINF` per segment
/// - `#EXT-X-ENDLIST` for VOD playlists
pub fn generate_media_playlist(playlist: &MediaPlaylist) -> String {
    let mut out = String::new();

    writeln!(out, "#EXTM3U").unwrap();
    writeln!(out, "#EXT-X-VERSION:7").unwrap();
    writeln!(out, "#EXT-X-TARGETDURATION:{}", playlist.target_duration).unwrap();
    writeln!(out, "#EXT-X-MEDIA-SEQUENCE:{}", playlist.media_sequence).unwrap();

    if let Some(ref init_uri) = playlist.init_segment_uri {
        writeln!(out, "#EXT-X-MAP:URI=\"{}\"", init_uri).unwrap();
    }

    for segment in &playlist.segments {
        if let Some(ref title) = segment.title {
            writeln!(out, "#EXTINF:{:.6},{}", segment.duration, title).unwrap();
        } else {
            writeln!(out, "#EXTINF:{:.6},", segment.duration).unwrap();
        }
        writeln!(out, "{}", segment.uri).unwrap();
    }

    if playlist.ended {
        writeln!(out, "#EXT-X-ENDLIST").unwrap();
    }

    out
}
