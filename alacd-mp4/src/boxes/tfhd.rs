use crate::{ParsedBox, Result, err};

pub struct TfhdBox {
    /// ISO/IEC 14496-12: an integer that uniquely identifies this
    /// track over the entire life‐time of this presentation
    pub track_id: u32,
    /// If specified via flags, this indicate the base data offset
    pub base_data_offset: Option<u64>,
    /// Raw one-based sample description index, zero if not specified via flags
    pub sample_description_index: u32,
    /// If specified via flags, this overrides the default sample
    /// duration in the Track Extends Box for this fragment
    pub default_sample_duration: Option<u32>,
    /// If specified via flags, this overrides the default sample
    /// size in the Track Extends Box for this fragment
    pub default_sample_size: Option<u32>,
}

impl TfhdBox {
    /// Parses a TFHD Box.
    pub fn new(box_: &mut ParsedBox) -> Result<Self> {
        let flags = box_
            .flags
            .ok_or_else(|| err!("TFHD box should have a valid flags value"))?;
        let reader = &mut box_.reader;

        let mut base_data_offset = None;
        let mut sample_description_index = 0;
        let mut default_sample_duration = None;
        let mut default_sample_size = None;

        let track_id = reader.read_u32()?;

        // Read "base_data_offset" if present.
        if (flags & 0x000001) != 0 {
            base_data_offset = Some(reader.read_u64()?);
        }

        // Read "sample_description_index" if present.
        if (flags & 0x000002) != 0 {
            sample_description_index = reader.read_u32()?;
        }

        // Read "default_sample_duration" if present.
        if (flags & 0x000008) != 0 {
            default_sample_duration = Some(reader.read_u32()?);
        }

        // Read "default_sample_size" if present.
        if (flags & 0x000010) != 0 {
            default_sample_size = Some(reader.read_u32()?);
        }

        Ok(Self {
            track_id,
            base_data_offset,
            sample_description_index,
            default_sample_duration,
            default_sample_size,
        })
    }

    /// Zero-based index of the sample description used by this fragment.
    ///
    /// A zero index is returned unchanged, it is not treated as "absent".
    pub fn descriptor_index(&self) -> u32 {
        if self.sample_description_index != 0 {
            self.sample_description_index - 1
        } else {
            self.sample_description_index
        }
    }
}
