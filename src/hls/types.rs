//! Typed inputs for HLS playlist generation.

/// One variant stream in a master playlist.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Variant {
    /// Peak bandwidth in bits per second.
    pub bandwidth: u64,
    /// Pixel dimensions, when known.
    pub resolution: Option<(u32, u32)>,
    /// RFC 6381 codec string (e.g. `avc1.64001f,mp4a.40.2`).
    pub codecs: String,
    /// URI of the variant's media playlist.
    pub uri: String,
}

/// Master playlist: the list of variant streams.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct MasterPlaylist {
    pub variants: Vec<Variant>,
}

/// One media segment line in a media playlist.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Segment {
    /// Exact duration in seconds.
    pub duration: f64,
    /// Segment URI.
    pub uri: String,
    /// Optional `#EXTINF` title.
    pub title: Option<String>,
}

/// Media playlist: target duration, sequence numbering, and segments.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct MediaPlaylist {
    /// `#EXT-X-TARGETDURATION` value (ceiled max segment duration).
    pub target_duration: u32,
    /// `#EXT-X-MEDIA-SEQUENCE` of the first listed segment.
    pub media_sequence: u64,
    /// Segments in playback order.
    pub segments: Vec<Segment>,
    /// Whether to close the playlist with `#EXT-X-ENDLIST` (VOD).
    pub ended: bool,
    /// Initialization segment URI for `#EXT-X-MAP`.
    pub init_segment_uri: Option<String>,
}
