//! File- and track-level metadata parsing (`ftyp`, `mvhd`, `tkhd`, `mdhd`,
//! `hdlr`, `stsd`).

use crate::codec::ByteReader;
use crate::error::{Error, Result};
use crate::mp4::{BoxRef, BoxTree, FourCC};

/// Media kind of a track, from the `hdlr` handler type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum MediaType {
    Video,
    Audio,
    Subtitle,
    Text,
}

impl MediaType {
    /// Map a handler FourCC to a media type. Unknown handlers (hint, meta,
    /// timecode, ...) return `None` and their tracks are skipped.
    pub fn from_handler(handler: FourCC) -> Option<Self> {
        match handler {
            FourCC::VIDE => Some(Self::Video),
            FourCC::SOUN => Some(Self::Audio),
            FourCC::SBTL | FourCC::SUBT => Some(Self::Subtitle),
            FourCC::TEXT => Some(Self::Text),
            _ => None,
        }
    }

    /// The `hdlr` handler FourCC for this media type.
    pub fn handler(&self) -> FourCC {
        match self {
            Self::Video => FourCC::VIDE,
            Self::Audio => FourCC::SOUN,
            Self::Subtitle => FourCC::SBTL,
            Self::Text => FourCC::TEXT,
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self, Self::Video)
    }

    pub fn is_audio(&self) -> bool {
        matches!(self, Self::Audio)
    }
}

/// Movie-level metadata.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct FileInfo {
    /// Movie timescale (ticks per second).
    pub timescale: u32,
    /// Movie duration in movie-timescale ticks.
    pub duration: u64,
    /// Compatible brands from `ftyp`; empty when `ftyp` is absent.
    pub compatible_brands: Vec<FourCC>,
    /// Per-track metadata, in `trak` order.
    pub tracks: Vec<TrackInfo>,
}

impl FileInfo {
    /// Movie duration in seconds; 0 when the timescale is 0.
    pub fn duration_secs(&self) -> f64 {
        if self.timescale == 0 {
            0.0
        } else {
            self.duration as f64 / self.timescale as f64
        }
    }
}

/// Information about a single track.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackInfo {
    /// Track ID, unique per file.
    pub track_id: u32,
    /// Media kind from the handler box.
    pub media_type: MediaType,
    /// Media timescale (ticks per second for this track).
    pub timescale: u32,
    /// Track duration in media-timescale ticks.
    pub duration: u64,
    /// Codec FourCC of the first `stsd` entry.
    pub codec: FourCC,
    /// Pixel dimensions from `tkhd` (video tracks; omitted when both zero).
    pub dimensions: Option<(u32, u32)>,
    /// ISO-639-2 language from `mdhd`; `None` for "und".
    pub language: Option<String>,
    /// Opaque bytes of the first `stsd` entry after its 8-byte entry header.
    pub sample_description_data: Vec<u8>,
    /// Whether the track carried an `stss` box.
    pub has_sync_samples: bool,
}

impl TrackInfo {
    /// Track duration in seconds; 0 when the timescale is 0.
    pub fn duration_secs(&self) -> f64 {
        if self.timescale == 0 {
            0.0
        } else {
            self.duration as f64 / self.timescale as f64
        }
    }
}

/// Parse movie-level metadata from a box tree.
///
/// `ftyp` is optional (brands stay empty); `moov` and `mvhd` are required.
pub fn parse_file_info(tree: &BoxTree<'_>) -> Result<FileInfo> {
    let compatible_brands = match tree.find_child(FourCC::FTYP) {
        Some(ftyp) => parse_ftyp_brands(ftyp)?,
        None => Vec::new(),
    };

    let moov = tree
        .find_child(FourCC::MOOV)
        .ok_or(Error::MissingBox("moov"))?;
    let mvhd = moov
        .find_child(FourCC::MVHD)
        .ok_or(Error::MissingBox("mvhd"))?;
    let (timescale, duration) = parse_mvhd(mvhd)?;

    let mut tracks = Vec::new();
    for trak in moov.find_children(FourCC::TRAK) {
        if let Some(info) = parse_track_info(trak)? {
            tracks.push(info);
        }
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(
        timescale,
        duration,
        tracks = tracks.len(),
        "parsed file info"
    );

    Ok(FileInfo {
        timescale,
        duration,
        compatible_brands,
        tracks,
    })
}

/// Parse one `trak` box. Tracks with unknown handler types yield `None`.
pub fn parse_track_info(trak: BoxRef<'_, '_>) -> Result<Option<TrackInfo>> {
    let tkhd = trak
        .find_child(FourCC::TKHD)
        .ok_or(Error::MissingBox("tkhd"))?;
    let (track_id, dimensions) = parse_tkhd(tkhd)?;

    let mdia = trak
        .find_child(FourCC::MDIA)
        .ok_or(Error::MissingBox("mdia"))?;
    let mdhd = mdia
        .find_child(FourCC::MDHD)
        .ok_or(Error::MissingBox("mdhd"))?;
    let (timescale, duration, language) = parse_mdhd(mdhd)?;

    let hdlr = mdia
        .find_child(FourCC::HDLR)
        .ok_or(Error::MissingBox("hdlr"))?;
    let handler = parse_hdlr(hdlr)?;
    let Some(media_type) = MediaType::from_handler(handler) else {
        return Ok(None);
    };

    let stbl = mdia
        .find_by_path("minf/stbl")
        .ok_or(Error::MissingBox("stbl"))?;
    let stsd = stbl
        .find_child(FourCC::STSD)
        .ok_or(Error::MissingBox("stsd"))?;
    let (codec, sample_description_data) = parse_stsd(stsd)?;

    let has_sync_samples = stbl.find_child(FourCC::STSS).is_some();

    // Video dimensions only make sense on video tracks.
    let dimensions = if media_type.is_video() {
        dimensions
    } else {
        None
    };

    Ok(Some(TrackInfo {
        track_id,
        media_type,
        timescale,
        duration,
        codec,
        dimensions,
        language,
        sample_description_data,
        has_sync_samples,
    }))
}

fn box_reader<'a>(b: BoxRef<'_, 'a>) -> ByteReader<'a> {
    ByteReader::new(b.payload().unwrap_or_default())
}

fn map_underflow(b: BoxRef<'_, '_>, e: Error) -> Error {
    match e {
        Error::BufferUnderflow { .. } => Error::invalid_box(b.box_type(), "payload too short"),
        other => other,
    }
}

fn parse_ftyp_brands(ftyp: BoxRef<'_, '_>) -> Result<Vec<FourCC>> {
    let mut r = box_reader(ftyp);
    (|| {
        let _major = r.read_four_cc()?;
        let _minor = r.read_u32()?;
        let mut brands = Vec::new();
        while r.remaining() >= 4 {
            brands.push(r.read_four_cc()?);
        }
        Ok(brands)
    })()
    .map_err(|e| map_underflow(ftyp, e))
}

/// Parse `mvhd`, returning (timescale, duration).
fn parse_mvhd(mvhd: BoxRef<'_, '_>) -> Result<(u32, u64)> {
    let mut r = box_reader(mvhd);
    (|| {
        let (version, _flags) = r.read_version_flags()?;
        if version == 1 {
            let _creation = r.read_u64()?;
            let _modification = r.read_u64()?;
            let timescale = r.read_u32()?;
            let duration = r.read_u64()?;
            Ok((timescale, duration))
        } else {
            let _creation = r.read_u32()?;
            let _modification = r.read_u32()?;
            let timescale = r.read_u32()?;
            let duration = r.read_u32()? as u64;
            Ok((timescale, duration))
        }
    })()
    .map_err(|e| map_underflow(mvhd, e))
}

/// Parse `tkhd`, returning (track_id, dimensions).
///
/// Width and height are 16.16 fixed point after the transform matrix;
/// `None` when both round to zero.
fn parse_tkhd(tkhd: BoxRef<'_, '_>) -> Result<(u32, Option<(u32, u32)>)> {
    let mut r = box_reader(tkhd);
    (|| {
        let (version, _flags) = r.read_version_flags()?;
        let track_id = if version == 1 {
            let _creation = r.read_u64()?;
            let _modification = r.read_u64()?;
            let track_id = r.read_u32()?;
            let _reserved = r.read_u32()?;
            let _duration = r.read_u64()?;
            track_id
        } else {
            let _creation = r.read_u32()?;
            let _modification = r.read_u32()?;
            let track_id = r.read_u32()?;
            let _reserved = r.read_u32()?;
            let _duration = r.read_u32()?;
            track_id
        };
        // reserved(8) + layer(2) + alternate_group(2) + volume(2) +
        // reserved(2) + matrix(36)
        r.skip(52)?;
        let width = r.read_u32()? >> 16;
        let height = r.read_u32()? >> 16;
        let dimensions = if width == 0 && height == 0 {
            None
        } else {
            Some((width, height))
        };
        Ok((track_id, dimensions))
    })()
    .map_err(|e| map_underflow(tkhd, e))
}

/// Parse `mdhd`, returning (timescale, duration, language).
fn parse_mdhd(mdhd: BoxRef<'_, '_>) -> Result<(u32, u64, Option<String>)> {
    let mut r = box_reader(mdhd);
    (|| {
        let (version, _flags) = r.read_version_flags()?;
        let (timescale, duration) = if version == 1 {
            let _creation = r.read_u64()?;
            let _modification = r.read_u64()?;
            let timescale = r.read_u32()?;
            let duration = r.read_u64()?;
            (timescale, duration)
        } else {
            let _creation = r.read_u32()?;
            let _modification = r.read_u32()?;
            let timescale = r.read_u32()?;
            let duration = r.read_u32()? as u64;
            (timescale, duration)
        };
        let language = decode_language(r.read_u16()?);
        Ok((timescale, duration, language))
    })()
    .map_err(|e| map_underflow(mdhd, e))
}

/// Decode the packed 15-bit ISO-639-2 language code.
///
/// Three 5-bit values, each plus 0x60 yielding a lowercase ASCII letter.
/// "und" (0x55C4) and malformed codes decode to `None`.
fn decode_language(packed: u16) -> Option<String> {
    let code = packed & 0x7FFF;
    let chars = [
        (((code >> 10) & 0x1F) as u8) + 0x60,
        (((code >> 5) & 0x1F) as u8) + 0x60,
        ((code & 0x1F) as u8) + 0x60,
    ];
    if !chars.iter().all(|c| c.is_ascii_lowercase()) {
        return None;
    }
    let lang = String::from_utf8(chars.to_vec()).ok()?;
    if lang == "und" {
        None
    } else {
        Some(lang)
    }
}

/// Parse `hdlr`, returning the handler type at payload offset 8.
fn parse_hdlr(hdlr: BoxRef<'_, '_>) -> Result<FourCC> {
    let mut r = box_reader(hdlr);
    (|| {
        let (_version, _flags) = r.read_version_flags()?;
        let _pre_defined = r.read_u32()?;
        r.read_four_cc()
    })()
    .map_err(|e| map_underflow(hdlr, e))
}

/// Parse `stsd`, returning the first entry's codec FourCC and its opaque
/// payload (the entry bytes after the 8-byte entry header).
fn parse_stsd(stsd: BoxRef<'_, '_>) -> Result<(FourCC, Vec<u8>)> {
    let mut r = box_reader(stsd);
    (|| {
        let (_version, _flags) = r.read_version_flags()?;
        let entry_count = r.read_u32()?;
        if entry_count == 0 {
            return Err(Error::invalid_box(FourCC::STSD, "no sample entries"));
        }
        let entry_size = r.read_u32()? as usize;
        let codec = r.read_four_cc()?;
        if entry_size < 8 || entry_size - 8 > r.remaining() {
            return Err(Error::invalid_box(FourCC::STSD, "entry size out of range"));
        }
        let data = r.read_bytes(entry_size - 8)?.to_vec();
        Ok((codec, data))
    })()
    .map_err(|e| map_underflow(stsd, e))
}
