//! Sample-table decoding.
//!
//! The tables stay run-length encoded exactly as stored in the file
//! (stts/ctts/stsc runs, uniform-or-per-sample sizes); expansion to
//! per-sample values is the locator's job.

use crate::codec::ByteReader;
use crate::error::{Error, Result};
use crate::mp4::{BoxRef, FourCC};

/// `(count, delta)` run from `stts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TimeToSampleEntry {
    pub count: u32,
    pub delta: u32,
}

/// `(count, offset)` run from `ctts`. Offsets are signed in version 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct CompositionOffsetEntry {
    pub count: u32,
    pub offset: i32,
}

/// `(first_chunk, samples_per_chunk, sample_description_index)` from `stsc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct SampleToChunkEntry {
    pub first_chunk: u32,
    pub samples_per_chunk: u32,
    pub description_index: u32,
}

/// Sample sizes from `stsz`: a single uniform size or one size per sample.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum SampleSizes {
    Uniform { size: u32, count: u32 },
    PerSample(Vec<u32>),
}

impl SampleSizes {
    /// Number of samples described.
    pub fn count(&self) -> u32 {
        match self {
            SampleSizes::Uniform { count, .. } => *count,
            SampleSizes::PerSample(sizes) => sizes.len() as u32,
        }
    }

    /// Size of sample `index`, or 0 when out of range.
    pub fn get(&self, index: u32) -> u32 {
        match self {
            SampleSizes::Uniform { size, count } => {
                if index < *count {
                    *size
                } else {
                    0
                }
            }
            SampleSizes::PerSample(sizes) => sizes.get(index as usize).copied().unwrap_or(0),
        }
    }
}

/// Decoded sample tables for one track.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct SampleTable {
    pub time_to_sample: Vec<TimeToSampleEntry>,
    pub composition_offsets: Option<Vec<CompositionOffsetEntry>>,
    pub sample_to_chunk: Vec<SampleToChunkEntry>,
    pub sample_sizes: SampleSizes,
    pub chunk_offsets: Vec<u64>,
    /// 1-based, strictly ascending. `None` when `stss` is absent.
    pub sync_samples: Option<Vec<u32>>,
}

impl SampleTable {
    /// Total number of samples in the track.
    pub fn sample_count(&self) -> u32 {
        self.sample_sizes.count()
    }

    /// Parse every sample-table child of an `stbl` box.
    pub fn parse(stbl: BoxRef<'_, '_>) -> Result<Self> {
        let stts = stbl
            .find_child(FourCC::STTS)
            .ok_or(Error::MissingBox("stts"))?;
        let time_to_sample = with_payload(stts, parse_stts)?;

        let composition_offsets = match stbl.find_child(FourCC::CTTS) {
            Some(ctts) => Some(with_payload(ctts, parse_ctts)?),
            None => None,
        };

        let stsc = stbl
            .find_child(FourCC::STSC)
            .ok_or(Error::MissingBox("stsc"))?;
        let sample_to_chunk = with_payload(stsc, parse_stsc)?;

        let stsz = stbl
            .find_child(FourCC::STSZ)
            .ok_or(Error::MissingBox("stsz"))?;
        let sample_sizes = with_payload(stsz, parse_stsz)?;

        let chunk_offsets = match stbl.find_child(FourCC::STCO) {
            Some(stco) => with_payload(stco, |r| parse_chunk_offsets(r, false))?,
            None => {
                let co64 = stbl
                    .find_child(FourCC::CO64)
                    .ok_or(Error::MissingBox("stco"))?;
                with_payload(co64, |r| parse_chunk_offsets(r, true))?
            }
        };

        let sync_samples = match stbl.find_child(FourCC::STSS) {
            Some(stss) => Some(with_payload(stss, parse_stss)?),
            None => None,
        };

        let table = Self {
            time_to_sample,
            composition_offsets,
            sample_to_chunk,
            sample_sizes,
            chunk_offsets,
            sync_samples,
        };
        table.validate()?;
        Ok(table)
    }

    fn validate(&self) -> Result<()> {
        if !self
            .sample_to_chunk
            .windows(2)
            .all(|w| w[0].first_chunk < w[1].first_chunk)
        {
            return Err(Error::invalid_box(
                FourCC::STSC,
                "first_chunk values are not strictly increasing",
            ));
        }
        if let Some(sync) = &self.sync_samples {
            if !sync.windows(2).all(|w| w[0] < w[1]) {
                return Err(Error::invalid_box(
                    FourCC::STSS,
                    "sync sample numbers are not strictly increasing",
                ));
            }
        }
        if self.sample_count() > 0 && self.chunk_offsets.is_empty() {
            return Err(Error::invalid_box(
                FourCC::STCO,
                "no chunk offsets for a non-empty track",
            ));
        }
        Ok(())
    }
}

/// Run a parser over a box payload, converting codec underflows into
/// `InvalidBoxData` for that box.
fn with_payload<T>(
    b: BoxRef<'_, '_>,
    f: impl FnOnce(&mut ByteReader<'_>) -> Result<T>,
) -> Result<T> {
    let mut r = ByteReader::new(b.payload().unwrap_or_default());
    f(&mut r).map_err(|e| match e {
        Error::BufferUnderflow { .. } => Error::invalid_box(b.box_type(), "payload too short"),
        other => other,
    })
}

/// Reject entry counts the payload cannot possibly hold.
fn check_entry_space(
    r: &ByteReader<'_>,
    box_type: FourCC,
    entry_count: u32,
    entry_size: usize,
) -> Result<()> {
    if (r.remaining() as u64) < entry_count as u64 * entry_size as u64 {
        return Err(Error::invalid_box(
            box_type,
            format!("entry count {entry_count} exceeds payload"),
        ));
    }
    Ok(())
}

fn parse_stts(r: &mut ByteReader<'_>) -> Result<Vec<TimeToSampleEntry>> {
    let (_version, _flags) = r.read_version_flags()?;
    let entry_count = r.read_u32()?;
    check_entry_space(r, FourCC::STTS, entry_count, 8)?;
    let mut entries = Vec::with_capacity(entry_count as usize);
    for _ in 0..entry_count {
        entries.push(TimeToSampleEntry {
            count: r.read_u32()?,
            delta: r.read_u32()?,
        });
    }
    Ok(entries)
}

fn parse_ctts(r: &mut ByteReader<'_>) -> Result<Vec<CompositionOffsetEntry>> {
    let (version, _flags) = r.read_version_flags()?;
    let entry_count = r.read_u32()?;
    check_entry_space(r, FourCC::CTTS, entry_count, 8)?;
    let mut entries = Vec::with_capacity(entry_count as usize);
    for _ in 0..entry_count {
        let count = r.read_u32()?;
        // Version 1 offsets are signed; version 0 stores the same bit
        // pattern as unsigned.
        let offset = if version == 1 {
            r.read_i32()?
        } else {
            r.read_u32()? as i32
        };
        entries.push(CompositionOffsetEntry { count, offset });
    }
    Ok(entries)
}

fn parse_stsc(r: &mut ByteReader<'_>) -> Result<Vec<SampleToChunkEntry>> {
    let (_version, _flags) = r.read_version_flags()?;
    let entry_count = r.read_u32()?;
    check_entry_space(r, FourCC::STSC, entry_count, 12)?;
    let mut entries = Vec::with_capacity(entry_count as usize);
    for _ in 0..entry_count {
        entries.push(SampleToChunkEntry {
            first_chunk: r.read_u32()?,
            samples_per_chunk: r.read_u32()?,
            description_index: r.read_u32()?,
        });
    }
    Ok(entries)
}

fn parse_stsz(r: &mut ByteReader<'_>) -> Result<SampleSizes> {
    let (_version, _flags) = r.read_version_flags()?;
    let uniform_size = r.read_u32()?;
    let sample_count = r.read_u32()?;
    if uniform_size != 0 {
        return Ok(SampleSizes::Uniform {
            size: uniform_size,
            count: sample_count,
        });
    }
    check_entry_space(r, FourCC::STSZ, sample_count, 4)?;
    let mut sizes = Vec::with_capacity(sample_count as usize);
    for _ in 0..sample_count {
        sizes.push(r.read_u32()?);
    }
    Ok(SampleSizes::PerSample(sizes))
}

fn parse_chunk_offsets(r: &mut ByteReader<'_>, is_co64: bool) -> Result<Vec<u64>> {
    let (_version, _flags) = r.read_version_flags()?;
    let entry_count = r.read_u32()?;
    let box_type = if is_co64 { FourCC::CO64 } else { FourCC::STCO };
    check_entry_space(r, box_type, entry_count, if is_co64 { 8 } else { 4 })?;
    let mut offsets = Vec::with_capacity(entry_count as usize);
    for _ in 0..entry_count {
        offsets.push(if is_co64 {
            r.read_u64()?
        } else {
            r.read_u32()? as u64
        });
    }
    Ok(offsets)
}

fn parse_stss(r: &mut ByteReader<'_>) -> Result<Vec<u32>> {
    let (_version, _flags) = r.read_version_flags()?;
    let entry_count = r.read_u32()?;
    check_entry_space(r, FourCC::STSS, entry_count, 4)?;
    let mut syncs = Vec::with_capacity(entry_count as usize);
    for _ in 0..entry_count {
        syncs.push(r.read_u32()?);
    }
    Ok(syncs)
}
