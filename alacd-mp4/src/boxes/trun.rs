use crate::{ParsedBox, Result, err};

pub struct TrunSample {
    /// The length of the sample in timescale units.
    pub sample_duration: Option<u32>,
    /// The size of the sample in bytes.
    pub sample_size: Option<u32>,
}

pub struct TrunBox {
    /// ISO/IEC 14496-12: the number of samples being added in this run;
    pub sample_count: u32,
    /// An array of size sampleCount containing data for each sample.
    /// Empty when the run carries no per-sample fields.
    pub sample_data: Vec<TrunSample>,
    /// If specified via flags, this indicate the offset of the sample in bytes.
    pub data_offset: Option<i32>,
}

impl TrunBox {
    /// Parses a TRUN Box.
    pub fn new(box_: &mut ParsedBox) -> Result<Self> {
        let flags = box_
            .flags
            .ok_or_else(|| err!("TRUN box should have a valid flags value"))?;
        let reader = &mut box_.reader;

        let sample_count = reader.read_u32()?;
        let mut data_offset = None;

        // "data_offset"
        if (flags & 0x000001) != 0 {
            data_offset = Some(reader.read_i32()?);
        }

        // Skip "first_sample_flags" if present.
        if (flags & 0x000004) != 0 {
            reader.skip(4)?;
        }

        let mut entry_size = 0;
        for flag in [0x000100, 0x000200, 0x000400, 0x000800] {
            if (flags & flag) != 0 {
                entry_size += 4;
            }
        }

        if reader.remaining() < sample_count as u64 * entry_size {
            return Err(err!(
                "TRUN box declares {} samples but is too short for them",
                sample_count
            ));
        }

        if entry_size == 0 {
            return Ok(Self {
                sample_count,
                sample_data: vec![],
                data_offset,
            });
        }

        let mut sample_data = Vec::with_capacity(sample_count as usize);

        for _ in 0..sample_count {
            let mut sample = TrunSample {
                sample_duration: None,
                sample_size: None,
            };

            // Read "sample duration" if present.
            if (flags & 0x000100) != 0 {
                sample.sample_duration = Some(reader.read_u32()?);
            }

            // Read "sample_size" if present.
            if (flags & 0x000200) != 0 {
                sample.sample_size = Some(reader.read_u32()?);
            }

            // Skip "sample_flags" if present.
            if (flags & 0x000400) != 0 {
                reader.skip(4)?;
            }

            // Skip "sample_composition_time_offset" if present.
            if (flags & 0x000800) != 0 {
                reader.skip(4)?;
            }

            sample_data.push(sample);
        }

        Ok(Self {
            sample_count,
            sample_data,
            data_offset,
        })
    }
}
