//! Codec configuration extraction from preserved sample description entries.
//!
//! A track's `sample_description_data` holds the first `stsd` entry after
//! its 8-byte entry header: the fixed sample-entry fields followed by child
//! boxes (`avcC`, `hvcC`, `esds`, ...). These helpers pull out the pieces an
//! HLS master playlist needs.

use crate::codec::ByteReader;
use crate::mp4::{FourCC, MediaType, TrackInfo};

/// Byte length of the fixed VisualSampleEntry fields before child boxes.
const VISUAL_SAMPLE_ENTRY_LEN: usize = 78;
/// Byte length of the fixed AudioSampleEntry fields before child boxes.
const AUDIO_SAMPLE_ENTRY_LEN: usize = 28;

/// Audio parameters from the fixed AudioSampleEntry fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct AudioParams {
    pub channels: u16,
    /// Sample rate in Hz (integer part of the 16.16 field).
    pub sample_rate: u32,
}

/// Scan the child boxes after the fixed sample-entry fields for `target`,
/// returning its payload.
fn find_entry_child(data: &[u8], fixed_len: usize, target: FourCC) -> Option<Vec<u8>> {
    let mut pos = fixed_len;
    while pos + 8 <= data.len() {
        let size = u32::from_be_bytes(data[pos..pos + 4].try_into().ok()?) as usize;
        if size < 8 || pos + size > data.len() {
            return None;
        }
        let box_type = FourCC::from_bytes(data[pos + 4..pos + 8].try_into().ok()?);
        if box_type == target {
            return Some(data[pos + 8..pos + size].to_vec());
        }
        pos += size;
    }
    None
}

/// Extract the decoder configuration record of a video track: the `avcC`
/// payload for AVC, the `hvcC` payload for HEVC.
pub fn video_decoder_config(track: &TrackInfo) -> Option<Vec<u8>> {
    if !track.media_type.is_video() {
        return None;
    }
    let config_type = match track.codec.as_str() {
        "avc1" | "avc3" => FourCC::new("avcC"),
        "hvc1" | "hev1" => FourCC::new("hvcC"),
        _ => return None,
    };
    find_entry_child(
        &track.sample_description_data,
        VISUAL_SAMPLE_ENTRY_LEN,
        config_type,
    )
}

/// Extract the `esds` payload (version/flags plus the ES descriptor) of an
/// audio track.
pub fn audio_decoder_config(track: &TrackInfo) -> Option<Vec<u8>> {
    if !track.media_type.is_audio() {
        return None;
    }
    find_entry_child(
        &track.sample_description_data,
        AUDIO_SAMPLE_ENTRY_LEN,
        FourCC::new("esds"),
    )
}

/// Read channel count and sample rate from the fixed AudioSampleEntry
/// fields.
pub fn audio_params(track: &TrackInfo) -> Option<AudioParams> {
    if !track.media_type.is_audio() {
        return None;
    }
    let mut r = ByteReader::new(&track.sample_description_data);
    // reserved(6) + data_reference_index(2) + reserved(8)
    r.skip(16).ok()?;
    let channels = r.read_u16().ok()?;
    let _sample_size = r.read_u16().ok()?;
    let _pre_defined = r.read_u16().ok()?;
    let _reserved = r.read_u16().ok()?;
    let sample_rate = r.read_u32().ok()? >> 16;
    Some(AudioParams {
        channels,
        sample_rate,
    })
}

/// RFC 6381 codec string for a track, e.g. `avc1.64001f` or `mp4a.40.2`.
///
/// Falls back to the bare sample-entry FourCC when the configuration record
/// is absent or not understood.
pub fn codec_string(track: &TrackInfo) -> String {
    match track.media_type {
        MediaType::Video => avc_codec_string(track)
            .unwrap_or_else(|| track.codec.as_str().trim_end().to_string()),
        MediaType::Audio => aac_codec_string(track)
            .unwrap_or_else(|| track.codec.as_str().trim_end().to_string()),
        _ => track.codec.as_str().trim_end().to_string(),
    }
}

/// `avc1.PPCCLL` from the first three bytes after the avcC version.
fn avc_codec_string(track: &TrackInfo) -> Option<String> {
    if !matches!(track.codec.as_str(), "avc1" | "avc3") {
        return None;
    }
    let config = video_decoder_config(track)?;
    // configurationVersion, then profile, compatibility, level.
    if config.len() < 4 {
        return None;
    }
    Some(format!(
        "{}.{:02x}{:02x}{:02x}",
        track.codec.as_str(),
        config[1],
        config[2],
        config[3]
    ))
}

/// `mp4a.40.<audioObjectType>` from the AudioSpecificConfig inside esds.
fn aac_codec_string(track: &TrackInfo) -> Option<String> {
    if track.codec.as_str() != "mp4a" {
        return None;
    }
    let esds = audio_decoder_config(track)?;
    let aot = audio_object_type(&esds)?;
    Some(format!("mp4a.40.{aot}"))
}

/// Walk the esds descriptor chain to the DecoderSpecificInfo and read the
/// 5-bit audio object type.
fn audio_object_type(esds: &[u8]) -> Option<u8> {
    // Skip the fullbox version/flags the esds payload starts with.
    let mut pos = 4;
    while pos < esds.len() {
        let tag = esds[pos];
        pos += 1;
        // Descriptor lengths use a 7-bit varint with a continuation bit.
        let mut len = 0usize;
        loop {
            let byte = *esds.get(pos)?;
            pos += 1;
            len = (len << 7) | (byte & 0x7F) as usize;
            if byte & 0x80 == 0 {
                break;
            }
        }
        match tag {
            // ES_Descriptor: ES_ID(2) + flags(1), then nested descriptors.
            0x03 => pos += 3,
            // DecoderConfigDescriptor: objectType(1) + streamType(1) +
            // bufferSize(3) + maxBitrate(4) + avgBitrate(4), then nested.
            0x04 => pos += 13,
            // DecoderSpecificInfo: AudioSpecificConfig.
            0x05 => {
                let first = *esds.get(pos)?;
                return Some(first >> 3);
            }
            _ => pos += len,
        }
    }
    None
}
