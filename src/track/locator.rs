//! Per-sample random access over run-length sample tables.
//!
//! Construction expands nothing: it precomputes cumulative prefix sums over
//! the `stts`/`ctts`/`stsc` runs so every query is a binary search plus a
//! bounded walk within one chunk. Tracks with tens of thousands of samples
//! stay cheap to query.

use crate::mp4::SampleTable;

/// One `stsc` run mapped onto concrete chunks.
#[derive(Debug, Clone, Copy)]
struct ChunkRun {
    /// 0-based index of the first chunk this run covers.
    first_chunk: u64,
    /// Samples per chunk within the run.
    samples_per_chunk: u32,
    /// Index of the first sample in the run.
    first_sample: u64,
}

/// Precomputed query indices for one track's sample table.
#[derive(Debug, Clone)]
pub(crate) struct SampleLocator {
    sample_count: u32,
    /// Cumulative sample counts at `stts` entry boundaries; length is
    /// entries + 1, starting at 0.
    stts_cum_counts: Vec<u64>,
    /// Cumulative ticks at the same boundaries.
    stts_cum_ticks: Vec<u64>,
    stts_deltas: Vec<u32>,
    /// Cumulative sample counts at `ctts` entry boundaries, when present.
    ctts_cum_counts: Option<Vec<u64>>,
    ctts_offsets: Vec<i32>,
    chunk_runs: Vec<ChunkRun>,
}

impl SampleLocator {
    pub(crate) fn new(table: &SampleTable) -> Self {
        let sample_count = table.sample_count();

        let mut stts_cum_counts = Vec::with_capacity(table.time_to_sample.len() + 1);
        let mut stts_cum_ticks = Vec::with_capacity(table.time_to_sample.len() + 1);
        let mut stts_deltas = Vec::with_capacity(table.time_to_sample.len());
        stts_cum_counts.push(0);
        stts_cum_ticks.push(0);
        let mut count_acc = 0u64;
        let mut tick_acc = 0u64;
        for entry in &table.time_to_sample {
            count_acc += entry.count as u64;
            tick_acc += entry.count as u64 * entry.delta as u64;
            stts_cum_counts.push(count_acc);
            stts_cum_ticks.push(tick_acc);
            stts_deltas.push(entry.delta);
        }

        let (ctts_cum_counts, ctts_offsets) = match &table.composition_offsets {
            Some(entries) => {
                let mut cum = Vec::with_capacity(entries.len() + 1);
                cum.push(0);
                let mut acc = 0u64;
                let mut offsets = Vec::with_capacity(entries.len());
                for entry in entries {
                    acc += entry.count as u64;
                    cum.push(acc);
                    offsets.push(entry.offset);
                }
                (Some(cum), offsets)
            }
            None => (None, Vec::new()),
        };

        // Each stsc entry is valid until the next entry's first_chunk.
        let total_chunks = table.chunk_offsets.len() as u64;
        let mut chunk_runs = Vec::with_capacity(table.sample_to_chunk.len());
        let mut first_sample = 0u64;
        for (k, entry) in table.sample_to_chunk.iter().enumerate() {
            let first_chunk = entry.first_chunk.saturating_sub(1) as u64;
            chunk_runs.push(ChunkRun {
                first_chunk,
                samples_per_chunk: entry.samples_per_chunk,
                first_sample,
            });
            let next_first = match table.sample_to_chunk.get(k + 1) {
                Some(next) => next.first_chunk.saturating_sub(1) as u64,
                None => total_chunks,
            };
            let chunks = next_first.saturating_sub(first_chunk);
            first_sample += chunks * entry.samples_per_chunk as u64;
        }

        Self {
            sample_count,
            stts_cum_counts,
            stts_cum_ticks,
            stts_deltas,
            ctts_cum_counts,
            ctts_offsets,
            chunk_runs,
        }
    }

    pub(crate) fn sample_count(&self) -> u32 {
        self.sample_count
    }

    /// Total ticks covered by the time-to-sample table.
    pub(crate) fn total_ticks(&self) -> u64 {
        *self.stts_cum_ticks.last().unwrap_or(&0)
    }

    /// Decode time of sample `index`; saturates to the track's total ticks
    /// at or beyond `sample_count`.
    pub(crate) fn decoding_time(&self, index: u32) -> u64 {
        let index = index as u64;
        // partition_point is on the boundary list, so the result maps to
        // the entry containing `index`.
        let entry = self
            .stts_cum_counts
            .partition_point(|&c| c <= index)
            .saturating_sub(1);
        if entry >= self.stts_deltas.len() {
            return self.total_ticks();
        }
        let within = index - self.stts_cum_counts[entry];
        self.stts_cum_ticks[entry] + within * self.stts_deltas[entry] as u64
    }

    /// Duration of sample `index` in ticks; 0 beyond the table.
    pub(crate) fn sample_duration(&self, index: u32) -> u32 {
        let index = index as u64;
        let entry = self
            .stts_cum_counts
            .partition_point(|&c| c <= index)
            .saturating_sub(1);
        if index >= self.sample_count as u64 || entry >= self.stts_deltas.len() {
            0
        } else {
            self.stts_deltas[entry]
        }
    }

    /// Composition offset of sample `index`; 0 when `ctts` is absent or the
    /// index falls beyond the table.
    pub(crate) fn composition_offset(&self, index: u32) -> i32 {
        let Some(cum) = &self.ctts_cum_counts else {
            return 0;
        };
        let index = index as u64;
        let entry = cum.partition_point(|&c| c <= index).saturating_sub(1);
        if entry >= self.ctts_offsets.len() || index >= *cum.last().unwrap_or(&0) {
            0
        } else {
            self.ctts_offsets[entry]
        }
    }

    /// Byte offset of sample `index` within the source file, combining the
    /// chunk map with preceding sample sizes inside the chunk. 0 when out of
    /// range.
    pub(crate) fn sample_offset(&self, index: u32, table: &SampleTable) -> u64 {
        if index >= self.sample_count || self.chunk_runs.is_empty() {
            return 0;
        }
        let index = index as u64;
        let run_idx = self
            .chunk_runs
            .partition_point(|r| r.first_sample <= index)
            .saturating_sub(1);
        let run = self.chunk_runs[run_idx];
        if run.samples_per_chunk == 0 {
            return 0;
        }
        let rel = index - run.first_sample;
        let chunk = run.first_chunk + rel / run.samples_per_chunk as u64;
        let Some(&chunk_offset) = table.chunk_offsets.get(chunk as usize) else {
            return 0;
        };
        let chunk_first = index - rel % run.samples_per_chunk as u64;
        let mut offset = chunk_offset;
        for s in chunk_first..index {
            offset += table.sample_sizes.get(s as u32) as u64;
        }
        offset
    }

    /// Whether sample `index` is a sync sample. All samples are sync when
    /// `stss` is absent.
    pub(crate) fn is_sync_sample(&self, index: u32, table: &SampleTable) -> bool {
        match &table.sync_samples {
            None => true,
            Some(sync) => sync.binary_search(&(index + 1)).is_ok(),
        }
    }

    /// 0-based sync sample indices; every sample when `stss` is absent.
    pub(crate) fn sync_sample_indices(&self, table: &SampleTable) -> Vec<u32> {
        match &table.sync_samples {
            None => (0..self.sample_count).collect(),
            Some(sync) => sync
                .iter()
                .filter(|&&n| n >= 1 && n <= self.sample_count)
                .map(|&n| n - 1)
                .collect(),
        }
    }

    /// Largest sync sample index at or before `index`; `index` itself when
    /// `stss` is absent.
    pub(crate) fn nearest_sync_sample(&self, index: u32, table: &SampleTable) -> Option<u32> {
        match &table.sync_samples {
            None => Some(index),
            Some(sync) => {
                let pos = sync.partition_point(|&n| n <= index + 1);
                if pos == 0 {
                    None
                } else {
                    Some(sync[pos - 1] - 1)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mp4::{
        CompositionOffsetEntry, SampleSizes, SampleTable, SampleToChunkEntry, TimeToSampleEntry,
    };

    fn table_with(
        stts: Vec<(u32, u32)>,
        ctts: Option<Vec<(u32, i32)>>,
        stsc: Vec<(u32, u32)>,
        sizes: SampleSizes,
        chunk_offsets: Vec<u64>,
        sync: Option<Vec<u32>>,
    ) -> SampleTable {
        SampleTable {
            time_to_sample: stts
                .into_iter()
                .map(|(count, delta)| TimeToSampleEntry { count, delta })
                .collect(),
            composition_offsets: ctts.map(|v| {
                v.into_iter()
                    .map(|(count, offset)| CompositionOffsetEntry { count, offset })
                    .collect()
            }),
            sample_to_chunk: stsc
                .into_iter()
                .map(|(first_chunk, samples_per_chunk)| SampleToChunkEntry {
                    first_chunk,
                    samples_per_chunk,
                    description_index: 1,
                })
                .collect(),
            sample_sizes: sizes,
            chunk_offsets,
            sync_samples: sync,
        }
    }

    #[test]
    fn test_decoding_time_across_runs() {
        let table = table_with(
            vec![(2, 100), (3, 200)],
            None,
            vec![(1, 5)],
            SampleSizes::Uniform { size: 10, count: 5 },
            vec![0],
            None,
        );
        let loc = SampleLocator::new(&table);
        assert_eq!(loc.decoding_time(0), 0);
        assert_eq!(loc.decoding_time(1), 100);
        assert_eq!(loc.decoding_time(2), 200);
        assert_eq!(loc.decoding_time(3), 400);
        assert_eq!(loc.decoding_time(4), 600);
        // Boundary and beyond saturate to total ticks.
        assert_eq!(loc.decoding_time(5), 800);
        assert_eq!(loc.decoding_time(100), 800);
        assert_eq!(loc.total_ticks(), 800);
    }

    #[test]
    fn test_sample_duration() {
        let table = table_with(
            vec![(2, 100), (3, 200)],
            None,
            vec![(1, 5)],
            SampleSizes::Uniform { size: 10, count: 5 },
            vec![0],
            None,
        );
        let loc = SampleLocator::new(&table);
        assert_eq!(loc.sample_duration(0), 100);
        assert_eq!(loc.sample_duration(1), 100);
        assert_eq!(loc.sample_duration(2), 200);
        assert_eq!(loc.sample_duration(4), 200);
        assert_eq!(loc.sample_duration(5), 0);
    }

    #[test]
    fn test_composition_offsets() {
        let table = table_with(
            vec![(4, 100)],
            Some(vec![(2, 500), (2, -250)]),
            vec![(1, 4)],
            SampleSizes::Uniform { size: 10, count: 4 },
            vec![0],
            None,
        );
        let loc = SampleLocator::new(&table);
        assert_eq!(loc.composition_offset(0), 500);
        assert_eq!(loc.composition_offset(1), 500);
        assert_eq!(loc.composition_offset(2), -250);
        assert_eq!(loc.composition_offset(3), -250);
        assert_eq!(loc.composition_offset(4), 0);
    }

    #[test]
    fn test_sample_offsets_multi_chunk() {
        // 4 samples, 2 per chunk, chunks at 1000 and 2000.
        let table = table_with(
            vec![(4, 100)],
            None,
            vec![(1, 2)],
            SampleSizes::PerSample(vec![100, 50, 200, 75]),
            vec![1000, 2000],
            None,
        );
        let loc = SampleLocator::new(&table);
        assert_eq!(loc.sample_offset(0, &table), 1000);
        assert_eq!(loc.sample_offset(1, &table), 1100);
        assert_eq!(loc.sample_offset(2, &table), 2000);
        assert_eq!(loc.sample_offset(3, &table), 2200);
        assert_eq!(loc.sample_offset(4, &table), 0);
    }

    #[test]
    fn test_sample_offsets_varying_chunk_density() {
        // stsc: chunks 1-2 hold 3 samples, chunk 3 holds 1 sample.
        let table = table_with(
            vec![(7, 100)],
            None,
            vec![(1, 3), (3, 1)],
            SampleSizes::Uniform {
                size: 10,
                count: 7,
            },
            vec![100, 200, 300],
            None,
        );
        let loc = SampleLocator::new(&table);
        assert_eq!(loc.sample_offset(0, &table), 100);
        assert_eq!(loc.sample_offset(2, &table), 120);
        assert_eq!(loc.sample_offset(3, &table), 200);
        assert_eq!(loc.sample_offset(5, &table), 220);
        assert_eq!(loc.sample_offset(6, &table), 300);
    }

    #[test]
    fn test_sync_queries_with_stss() {
        let table = table_with(
            vec![(10, 100)],
            None,
            vec![(1, 10)],
            SampleSizes::Uniform {
                size: 10,
                count: 10,
            },
            vec![0],
            Some(vec![1, 5, 9]),
        );
        let loc = SampleLocator::new(&table);
        assert!(loc.is_sync_sample(0, &table));
        assert!(!loc.is_sync_sample(1, &table));
        assert!(loc.is_sync_sample(4, &table));
        assert!(loc.is_sync_sample(8, &table));
        assert_eq!(loc.sync_sample_indices(&table), vec![0, 4, 8]);
        assert_eq!(loc.nearest_sync_sample(0, &table), Some(0));
        assert_eq!(loc.nearest_sync_sample(3, &table), Some(0));
        assert_eq!(loc.nearest_sync_sample(4, &table), Some(4));
        assert_eq!(loc.nearest_sync_sample(9, &table), Some(8));
    }

    #[test]
    fn test_sync_queries_without_stss() {
        let table = table_with(
            vec![(3, 100)],
            None,
            vec![(1, 3)],
            SampleSizes::Uniform { size: 10, count: 3 },
            vec![0],
            None,
        );
        let loc = SampleLocator::new(&table);
        assert!(loc.is_sync_sample(2, &table));
        assert_eq!(loc.sync_sample_indices(&table), vec![0, 1, 2]);
        assert_eq!(loc.nearest_sync_sample(2, &table), Some(2));
    }
}
