//! Shared fixture builder: assembles complete progressive MP4s in memory.
//!
//! Each track's samples are laid out contiguously in one chunk inside the
//! mdat, with deterministic byte patterns so tests can verify that segment
//! payloads were sliced from the right places.

#![allow(dead_code)] // not every test binary exercises every helper

use vodforge::codec::{boxed, container, full_boxed, BoxWriter};
use vodforge::mp4::FourCC;

/// Specification of one track in a synthetic movie.
pub struct TrackSpec {
    pub track_id: u32,
    pub handler: FourCC,
    pub timescale: u32,
    pub codec: &'static str,
    pub sample_count: u32,
    pub sample_delta: u32,
    pub sample_size: u32,
    /// 1-based sync sample numbers; `None` omits the stss box entirely.
    pub sync_samples: Option<Vec<u32>>,
    /// Composition offset runs for a version-1 ctts.
    pub ctts: Option<Vec<(u32, i32)>>,
    /// Pixel dimensions written into tkhd.
    pub dimensions: (u32, u32),
}

impl TrackSpec {
    pub fn video(sample_count: u32, sync_samples: Vec<u32>) -> Self {
        Self {
            track_id: 1,
            handler: FourCC::VIDE,
            timescale: 90_000,
            codec: "avc1",
            sample_count,
            sample_delta: 3_000,
            sample_size: 100,
            sync_samples: Some(sync_samples),
            ctts: None,
            dimensions: (1280, 720),
        }
    }

    pub fn audio(sample_count: u32) -> Self {
        Self {
            track_id: 2,
            handler: FourCC::SOUN,
            timescale: 44_100,
            codec: "mp4a",
            sample_count,
            sample_delta: 1_024,
            sample_size: 50,
            sync_samples: None,
            ctts: None,
            dimensions: (0, 0),
        }
    }

    fn data_len(&self) -> usize {
        self.sample_count as usize * self.sample_size as usize
    }

    /// Deterministic payload byte for sample data of this track.
    pub fn byte_at(&self, offset_in_track: usize) -> u8 {
        ((self.track_id as usize * 89 + offset_in_track) % 251) as u8
    }
}

fn payload(build: impl FnOnce(&mut BoxWriter)) -> Vec<u8> {
    let mut w = BoxWriter::new();
    build(&mut w);
    w.data().to_vec()
}

fn write_stbl(spec: &TrackSpec, chunk_offset: u32) -> Vec<u8> {
    let stsd = full_boxed(
        FourCC::STSD,
        0,
        0,
        &payload(|w| {
            w.put_u32(1); // entry count
            w.put_u32(8 + 16); // entry size
            w.put_four_cc(FourCC::new(spec.codec));
            w.put_bytes(&[0x42; 16]); // opaque codec config
        }),
    );
    let stts = full_boxed(
        FourCC::STTS,
        0,
        0,
        &payload(|w| {
            w.put_u32(1);
            w.put_u32(spec.sample_count);
            w.put_u32(spec.sample_delta);
        }),
    );
    let stsc = full_boxed(
        FourCC::STSC,
        0,
        0,
        &payload(|w| {
            w.put_u32(1);
            w.put_u32(1); // first chunk
            w.put_u32(spec.sample_count.max(1)); // samples per chunk
            w.put_u32(1); // description index
        }),
    );
    let stsz = full_boxed(
        FourCC::STSZ,
        0,
        0,
        &payload(|w| {
            w.put_u32(spec.sample_size); // uniform
            w.put_u32(spec.sample_count);
        }),
    );
    let stco = full_boxed(
        FourCC::STCO,
        0,
        0,
        &payload(|w| {
            w.put_u32(1);
            w.put_u32(chunk_offset);
        }),
    );

    let mut children: Vec<&[u8]> = vec![&stsd, &stts, &stsc, &stsz, &stco];
    let stss;
    if let Some(syncs) = &spec.sync_samples {
        stss = full_boxed(
            FourCC::STSS,
            0,
            0,
            &payload(|w| {
                w.put_u32(syncs.len() as u32);
                for &s in syncs {
                    w.put_u32(s);
                }
            }),
        );
        children.push(&stss);
    }
    let ctts;
    if let Some(entries) = &spec.ctts {
        ctts = full_boxed(
            FourCC::CTTS,
            1,
            0,
            &payload(|w| {
                w.put_u32(entries.len() as u32);
                for &(count, offset) in entries {
                    w.put_u32(count);
                    w.put_i32(offset);
                }
            }),
        );
        children.push(&ctts);
    }
    container(FourCC::STBL, &children)
}

fn write_trak(spec: &TrackSpec, chunk_offset: u32) -> Vec<u8> {
    let tkhd = full_boxed(
        FourCC::TKHD,
        0,
        7,
        &payload(|w| {
            w.put_u32(0); // creation
            w.put_u32(0); // modification
            w.put_u32(spec.track_id);
            w.put_u32(0); // reserved
            w.put_u32(0); // duration
            w.put_zeros(52);
            w.put_u32(spec.dimensions.0 << 16);
            w.put_u32(spec.dimensions.1 << 16);
        }),
    );
    let duration = spec.sample_count as u64 * spec.sample_delta as u64;
    let mdhd = full_boxed(
        FourCC::MDHD,
        0,
        0,
        &payload(|w| {
            w.put_u32(0);
            w.put_u32(0);
            w.put_u32(spec.timescale);
            w.put_u32(duration as u32);
            w.put_u16(0x55C4); // und
            w.put_u16(0);
        }),
    );
    let hdlr = full_boxed(
        FourCC::HDLR,
        0,
        0,
        &payload(|w| {
            w.put_u32(0);
            w.put_four_cc(spec.handler);
            w.put_zeros(12);
            w.put_bytes(b"Handler\0");
        }),
    );
    let stbl = write_stbl(spec, chunk_offset);
    let minf = container(FourCC::MINF, &[&stbl]);
    let mdia = container(FourCC::MDIA, &[&mdhd, &hdlr, &minf]);
    container(FourCC::TRAK, &[&tkhd, &mdia])
}

fn write_moov(tracks: &[TrackSpec], chunk_offsets: &[u32]) -> Vec<u8> {
    let mvhd = full_boxed(
        FourCC::MVHD,
        0,
        0,
        &payload(|w| {
            w.put_u32(0);
            w.put_u32(0);
            w.put_u32(600); // movie timescale
            w.put_u32(6000); // movie duration
            w.put_zeros(80);
        }),
    );
    let traks: Vec<Vec<u8>> = tracks
        .iter()
        .zip(chunk_offsets)
        .map(|(spec, &offset)| write_trak(spec, offset))
        .collect();
    let mut children: Vec<&[u8]> = vec![&mvhd];
    for t in &traks {
        children.push(t);
    }
    container(FourCC::MOOV, &children)
}

/// Build a complete progressive MP4: ftyp, moov, and an mdat holding every
/// track's samples as one contiguous block per track.
pub fn build_movie(tracks: &[TrackSpec]) -> Vec<u8> {
    let ftyp = boxed(FourCC::FTYP, b"isom\x00\x00\x00\x00isomiso2");

    // Chunk offsets depend on the moov size; sizes do not change when only
    // the stco values do, so probe with zeros first.
    let probe = write_moov(tracks, &vec![0; tracks.len()]);
    let mdat_payload_start = (ftyp.len() + probe.len() + 8) as u32;

    let mut chunk_offsets = Vec::with_capacity(tracks.len());
    let mut running = mdat_payload_start;
    for spec in tracks {
        chunk_offsets.push(running);
        running += spec.data_len() as u32;
    }

    let moov = write_moov(tracks, &chunk_offsets);
    assert_eq!(moov.len(), probe.len());

    let mut mdat_payload = Vec::new();
    for spec in tracks {
        mdat_payload.extend((0..spec.data_len()).map(|i| spec.byte_at(i)));
    }

    let mut out = ftyp;
    out.extend_from_slice(&moov);
    out.extend_from_slice(&boxed(FourCC::MDAT, &mdat_payload));
    out
}
