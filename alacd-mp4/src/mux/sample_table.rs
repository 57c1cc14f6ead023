use crate::{BoxInfo, BoxWriter, Result, Sample, bail};
use std::io::{Seek, Write};

/// Number of samples grouped into one chunk of the output file.
pub const CHUNK_SIZE: usize = 5;

/// Run of consecutive samples with the same duration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SttsEntry {
    pub count: u32,
    pub delta: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StscEntry {
    pub first_chunk: u32,
    pub samples_per_chunk: u32,
    pub sample_description_index: u32,
}

/// Sample table of a non-fragmented track.
///
/// Chunk offsets stay zero until [`SampleTable::resolve_offsets`] is called
/// with the position of the written payload.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SampleTable {
    pub sizes: Vec<u32>,
    pub durations: Vec<SttsEntry>,
    pub chunks: Vec<StscEntry>,
    pub chunk_offsets: Vec<u32>,
}

impl SampleTable {
    pub fn new(samples: &[Sample]) -> Self {
        let sizes = samples.iter().map(|x| x.data.len() as u32).collect();
        let mut durations: Vec<SttsEntry> = vec![];

        for sample in samples {
            match durations.last_mut() {
                Some(run) if run.delta == sample.duration => run.count += 1,
                _ => durations.push(SttsEntry {
                    count: 1,
                    delta: sample.duration,
                }),
            }
        }

        let full = samples.len() / CHUNK_SIZE;
        let rest = samples.len() % CHUNK_SIZE;
        let mut chunks = vec![];

        if full > 0 {
            chunks.push(StscEntry {
                first_chunk: 1,
                samples_per_chunk: CHUNK_SIZE as u32,
                sample_description_index: 1,
            });
        }

        if rest > 0 {
            chunks.push(StscEntry {
                first_chunk: full as u32 + 1,
                samples_per_chunk: rest as u32,
                sample_description_index: 1,
            });
        }

        Self {
            sizes,
            durations,
            chunks,
            chunk_offsets: vec![0; samples.len().div_ceil(CHUNK_SIZE)],
        }
    }

    pub fn sample_count(&self) -> usize {
        self.sizes.len()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_offsets.len()
    }

    /// Sum of all sample durations.
    pub fn duration(&self) -> u64 {
        self.durations
            .iter()
            .map(|x| x.count as u64 * x.delta as u64)
            .sum()
    }

    /// Compute the absolute offset of every chunk, given the absolute offset of
    /// the first payload byte.
    pub fn resolve_offsets(&mut self, payload_start: u64) -> Result<()> {
        let mut offset = payload_start;

        for (chunk, sizes) in self.sizes.chunks(CHUNK_SIZE).enumerate() {
            let Ok(value) = u32::try_from(offset) else {
                bail!("chunk {} starts at {} which exceeds stco range", chunk, offset);
            };

            self.chunk_offsets[chunk] = value;
            offset += sizes.iter().map(|x| *x as u64).sum::<u64>();
        }

        Ok(())
    }

    /// Write `stts`, `stsc`, `stsz` and `stco` and return where `stco` landed.
    pub(crate) fn write<W: Write + Seek>(&self, writer: &mut BoxWriter<W>) -> Result<BoxInfo> {
        writer.start_full_box(b"stts", 0, 0)?;
        writer.write_u32(self.durations.len() as u32)?;
        for entry in &self.durations {
            writer.write_u32(entry.count)?;
            writer.write_u32(entry.delta)?;
        }
        writer.end_box()?;

        writer.start_full_box(b"stsc", 0, 0)?;
        writer.write_u32(self.chunks.len() as u32)?;
        for entry in &self.chunks {
            writer.write_u32(entry.first_chunk)?;
            writer.write_u32(entry.samples_per_chunk)?;
            writer.write_u32(entry.sample_description_index)?;
        }
        writer.end_box()?;

        writer.start_full_box(b"stsz", 0, 0)?;
        // zero means sizes differ per sample
        writer.write_u32(0)?;
        writer.write_u32(self.sizes.len() as u32)?;
        for size in &self.sizes {
            writer.write_u32(*size)?;
        }
        writer.end_box()?;

        writer.start_full_box(b"stco", 0, 0)?;
        self.write_offsets(writer)?;
        writer.end_box()
    }

    /// Overwrite the payload of a previously written `stco` box.
    pub(crate) fn patch<W: Write + Seek>(
        &self,
        writer: &mut BoxWriter<W>,
        stco: &BoxInfo,
    ) -> Result<()> {
        writer.seek_to_payload(stco)?;
        self.write_offsets(writer)?;
        writer.seek_to_end()?;
        Ok(())
    }

    fn write_offsets<W: Write + Seek>(&self, writer: &mut BoxWriter<W>) -> Result<()> {
        writer.write_u32(self.chunk_offsets.len() as u32)?;
        for offset in &self.chunk_offsets {
            writer.write_u32(*offset)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn samples(durations: &[u32]) -> Vec<Sample> {
        durations
            .iter()
            .enumerate()
            .map(|(i, duration)| Sample {
                data: Bytes::from(vec![0; i + 1]),
                duration: *duration,
                descriptor_index: 0,
            })
            .collect()
    }

    #[test]
    fn equal_durations_merge_into_runs() {
        let table = SampleTable::new(&samples(&[1024, 1024, 1024, 2048, 2048]));

        assert_eq!(
            table.durations,
            vec![
                SttsEntry {
                    count: 3,
                    delta: 1024
                },
                SttsEntry {
                    count: 2,
                    delta: 2048
                },
            ]
        );
        assert_eq!(table.duration(), 7168);
    }

    #[test]
    fn short_last_chunk_gets_its_own_entry() {
        let table = SampleTable::new(&samples(&[1024; 12]));

        let chunks = table
            .chunks
            .iter()
            .map(|x| (x.first_chunk, x.samples_per_chunk))
            .collect::<Vec<_>>();

        assert_eq!(chunks, vec![(1, 5), (3, 2)]);
        assert_eq!(table.chunk_count(), 3);
    }

    #[test]
    fn exact_multiple_has_one_entry() {
        let table = SampleTable::new(&samples(&[1024; 10]));
        assert_eq!(table.chunks.len(), 1);
        assert_eq!(table.chunk_count(), 2);
    }

    #[test]
    fn offsets_follow_cumulative_sizes() {
        // sizes 1..=12
        let mut table = SampleTable::new(&samples(&[1024; 12]));
        table.resolve_offsets(100).unwrap();
        assert_eq!(table.chunk_offsets, vec![100, 115, 155]);
    }

    #[test]
    fn offsets_beyond_32_bits_are_rejected() {
        let mut table = SampleTable::new(&samples(&[1024; 3]));
        assert!(table.resolve_offsets(u32::MAX as u64 + 1).is_err());
    }
}
