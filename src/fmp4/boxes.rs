//! Builders for the moov-side boxes of an initialization segment.
//!
//! Each builder returns the complete box as owned bytes; containers
//! concatenate their children under one header.

use crate::codec::{boxed, container, full_boxed, BoxWriter};
use crate::mp4::{FourCC, MediaType, TrackInfo};

/// `ftyp` for an initialization segment.
pub(crate) fn write_ftyp() -> Vec<u8> {
    let mut w = BoxWriter::with_capacity(4 + 4 + 3 * 4);
    w.put_four_cc(FourCC::new("isom")); // major brand
    w.put_u32(0x200); // minor version
    w.put_four_cc(FourCC::new("isom"));
    w.put_four_cc(FourCC::new("iso6"));
    w.put_four_cc(FourCC::new("mp41"));
    boxed(FourCC::FTYP, w.data())
}

/// `styp` for a media segment.
pub(crate) fn write_styp() -> Vec<u8> {
    let mut w = BoxWriter::with_capacity(4 + 4 + 2 * 4);
    w.put_four_cc(FourCC::new("msdh")); // major brand
    w.put_u32(0); // minor version
    w.put_four_cc(FourCC::new("msdh"));
    w.put_four_cc(FourCC::new("msix"));
    boxed(FourCC::STYP, w.data())
}

/// Identity transform matrix shared by `mvhd` and `tkhd`.
fn put_matrix(w: &mut BoxWriter) {
    w.put_u32(0x0001_0000);
    w.put_u32(0);
    w.put_u32(0);
    w.put_u32(0);
    w.put_u32(0x0001_0000);
    w.put_u32(0);
    w.put_u32(0);
    w.put_u32(0);
    w.put_u32(0x4000_0000);
}

/// `mvhd` (version 1, zero duration per the fMP4 convention).
pub(crate) fn write_mvhd(timescale: u32, next_track_id: u32) -> Vec<u8> {
    let mut w = BoxWriter::with_capacity(108);
    w.put_u64(0); // creation_time
    w.put_u64(0); // modification_time
    w.put_u32(timescale);
    w.put_u64(0); // duration
    w.put_u32(0x0001_0000); // rate 1.0
    w.put_u16(0x0100); // volume 1.0
    w.put_zeros(10); // reserved
    put_matrix(&mut w);
    w.put_zeros(24); // pre_defined
    w.put_u32(next_track_id);
    full_boxed(FourCC::MVHD, 1, 0, w.data())
}

/// `tkhd` (version 1, flags enabled | in_movie | in_preview, zero duration).
pub(crate) fn write_tkhd(track: &TrackInfo) -> Vec<u8> {
    let mut w = BoxWriter::with_capacity(92);
    w.put_u64(0); // creation_time
    w.put_u64(0); // modification_time
    w.put_u32(track.track_id);
    w.put_u32(0); // reserved
    w.put_u64(0); // duration
    w.put_zeros(8); // reserved
    w.put_u16(0); // layer
    w.put_u16(0); // alternate_group
    w.put_u16(if track.media_type.is_audio() { 0x0100 } else { 0 }); // volume
    w.put_u16(0); // reserved
    put_matrix(&mut w);
    let (width, height) = track.dimensions.unwrap_or((0, 0));
    w.put_u32(width << 16);
    w.put_u32(height << 16);
    full_boxed(FourCC::TKHD, 1, 0x000007, w.data())
}

/// `mdhd` (version 1, undetermined language, zero duration).
pub(crate) fn write_mdhd(timescale: u32) -> Vec<u8> {
    let mut w = BoxWriter::with_capacity(32);
    w.put_u64(0); // creation_time
    w.put_u64(0); // modification_time
    w.put_u32(timescale);
    w.put_u64(0); // duration
    w.put_u16(0x55C4); // language: und
    w.put_u16(0); // pre_defined
    full_boxed(FourCC::MDHD, 1, 0, w.data())
}

/// `hdlr` with the handler type and a human-readable name.
pub(crate) fn write_hdlr(media_type: MediaType) -> Vec<u8> {
    let name: &[u8] = match media_type {
        MediaType::Video => b"VideoHandler",
        MediaType::Audio => b"SoundHandler",
        MediaType::Subtitle => b"SubtitleHandler",
        MediaType::Text => b"TextHandler",
    };
    let mut w = BoxWriter::with_capacity(20 + name.len() + 1);
    w.put_u32(0); // pre_defined
    w.put_four_cc(media_type.handler());
    w.put_zeros(12); // reserved
    w.put_bytes(name);
    w.put_u8(0);
    full_boxed(FourCC::HDLR, 0, 0, w.data())
}

pub(crate) fn write_vmhd() -> Vec<u8> {
    let mut w = BoxWriter::with_capacity(8);
    w.put_u16(0); // graphicsmode
    w.put_zeros(6); // opcolor
    full_boxed(FourCC::VMHD, 0, 1, w.data())
}

pub(crate) fn write_smhd() -> Vec<u8> {
    let mut w = BoxWriter::with_capacity(4);
    w.put_u16(0); // balance
    w.put_u16(0); // reserved
    full_boxed(FourCC::SMHD, 0, 0, w.data())
}

/// `nmhd` (null media header) for subtitle and text tracks.
pub(crate) fn write_nmhd() -> Vec<u8> {
    full_boxed(FourCC::new("nmhd"), 0, 0, &[])
}

/// `dinf` with a self-contained `url ` data reference.
pub(crate) fn write_dinf() -> Vec<u8> {
    let url_box = full_boxed(FourCC::URL, 0, 1, &[]);
    let dref_box = {
        let mut w = BoxWriter::new();
        w.put_u32(1); // entry count
        w.put_bytes(&url_box);
        full_boxed(FourCC::DREF, 0, 0, w.data())
    };
    container(FourCC::DINF, &[&dref_box])
}

/// `stsd` carrying the track's preserved sample description entry.
pub(crate) fn write_stsd(track: &TrackInfo) -> Vec<u8> {
    let mut w = BoxWriter::with_capacity(12 + 8 + track.sample_description_data.len());
    w.put_u32(1); // entry count
    w.put_u32((8 + track.sample_description_data.len()) as u32);
    w.put_four_cc(track.codec);
    w.put_bytes(&track.sample_description_data);
    full_boxed(FourCC::STSD, 0, 0, w.data())
}

fn write_empty_stts() -> Vec<u8> {
    full_boxed(FourCC::STTS, 0, 0, &0u32.to_be_bytes())
}

fn write_empty_stsc() -> Vec<u8> {
    full_boxed(FourCC::STSC, 0, 0, &0u32.to_be_bytes())
}

fn write_empty_stsz() -> Vec<u8> {
    let mut w = BoxWriter::with_capacity(8);
    w.put_u32(0); // sample size
    w.put_u32(0); // sample count
    full_boxed(FourCC::STSZ, 0, 0, w.data())
}

fn write_empty_stco() -> Vec<u8> {
    full_boxed(FourCC::STCO, 0, 0, &0u32.to_be_bytes())
}

/// `stbl` with the preserved sample description and fragment-ready empty
/// tables.
pub(crate) fn write_stbl(track: &TrackInfo) -> Vec<u8> {
    let stsd = write_stsd(track);
    let stts = write_empty_stts();
    let stsc = write_empty_stsc();
    let stsz = write_empty_stsz();
    let stco = write_empty_stco();
    container(FourCC::STBL, &[&stsd, &stts, &stsc, &stsz, &stco])
}

pub(crate) fn write_minf(track: &TrackInfo) -> Vec<u8> {
    let media_header = match track.media_type {
        MediaType::Video => write_vmhd(),
        MediaType::Audio => write_smhd(),
        MediaType::Subtitle | MediaType::Text => write_nmhd(),
    };
    let dinf = write_dinf();
    let stbl = write_stbl(track);
    container(FourCC::MINF, &[&media_header, &dinf, &stbl])
}

pub(crate) fn write_mdia(track: &TrackInfo) -> Vec<u8> {
    let mdhd = write_mdhd(track.timescale);
    let hdlr = write_hdlr(track.media_type);
    let minf = write_minf(track);
    container(FourCC::MDIA, &[&mdhd, &hdlr, &minf])
}

pub(crate) fn write_trak(track: &TrackInfo) -> Vec<u8> {
    let tkhd = write_tkhd(track);
    let mdia = write_mdia(track);
    container(FourCC::TRAK, &[&tkhd, &mdia])
}

/// `trex` with defaults zero and sample description index 1.
pub(crate) fn write_trex(track_id: u32) -> Vec<u8> {
    let mut w = BoxWriter::with_capacity(20);
    w.put_u32(track_id);
    w.put_u32(1); // default sample description index
    w.put_u32(0); // default sample duration
    w.put_u32(0); // default sample size
    w.put_u32(0); // default sample flags
    full_boxed(FourCC::TREX, 0, 0, w.data())
}

pub(crate) fn write_mvex(track_ids: &[u32]) -> Vec<u8> {
    let trexes: Vec<Vec<u8>> = track_ids.iter().map(|&id| write_trex(id)).collect();
    let refs: Vec<&[u8]> = trexes.iter().map(|t| t.as_slice()).collect();
    container(FourCC::MVEX, &refs)
}

/// `mdat` header; escalates to the extended form when the payload will not
/// fit a 32-bit size.
pub(crate) fn write_mdat_header(data_size: u64) -> Vec<u8> {
    let mut w = BoxWriter::with_capacity(16);
    if data_size + 8 > u32::MAX as u64 {
        w.put_u32(1);
        w.put_four_cc(FourCC::MDAT);
        w.put_u64(data_size + 16);
    } else {
        w.put_u32((data_size + 8) as u32);
        w.put_four_cc(FourCC::MDAT);
    }
    w.into_vec()
}
