use crate::{ParsedBox, Result};

/// Movie level sample defaults of a fragmented track.
pub struct TrexBox {
    pub track_id: u32,
    pub default_sample_description_index: u32,
    pub default_sample_duration: u32,
    pub default_sample_size: u32,
    pub default_sample_flags: u32,
}

impl TrexBox {
    /// Parses a TREX Box.
    pub fn new(box_: &mut ParsedBox) -> Result<Self> {
        let reader = &mut box_.reader;

        Ok(Self {
            track_id: reader.read_u32()?,
            default_sample_description_index: reader.read_u32()?,
            default_sample_duration: reader.read_u32()?,
            default_sample_size: reader.read_u32()?,
            default_sample_flags: reader.read_u32()?,
        })
    }
}
