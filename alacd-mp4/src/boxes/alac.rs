use crate::{ParsedBox, Result};

/// ALAC specific config, the payload of the `alac` full box nested in the
/// sample entry.
///
/// `pb`, `mb` and `kb` are encoder tuning values. They are carried over as is.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CodecParams {
    pub frame_length: u32,
    pub compatible_version: u8,
    pub bit_depth: u8,
    pub pb: u8,
    pub mb: u8,
    pub kb: u8,
    pub num_channels: u8,
    pub max_run: u16,
    /// Peak frame size in bytes.
    pub max_frame_bytes: u32,
    pub avg_bit_rate: u32,
    pub sample_rate: u32,
}

impl CodecParams {
    /// Size of the encoded config in bytes.
    pub const SIZE: usize = 24;

    /// Parses an ALAC Box.
    pub fn new(box_: &mut ParsedBox) -> Result<Self> {
        let reader = &mut box_.reader;

        Ok(Self {
            frame_length: reader.read_u32()?,
            compatible_version: reader.read_u8()?,
            bit_depth: reader.read_u8()?,
            pb: reader.read_u8()?,
            mb: reader.read_u8()?,
            kb: reader.read_u8()?,
            num_channels: reader.read_u8()?,
            max_run: reader.read_u16()?,
            max_frame_bytes: reader.read_u32()?,
            avg_bit_rate: reader.read_u32()?,
            sample_rate: reader.read_u32()?,
        })
    }

    /// Encode the config exactly as it is laid out inside the `alac` box.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0; Self::SIZE];
        buf[0..4].copy_from_slice(&self.frame_length.to_be_bytes());
        buf[4] = self.compatible_version;
        buf[5] = self.bit_depth;
        buf[6] = self.pb;
        buf[7] = self.mb;
        buf[8] = self.kb;
        buf[9] = self.num_channels;
        buf[10..12].copy_from_slice(&self.max_run.to_be_bytes());
        buf[12..16].copy_from_slice(&self.max_frame_bytes.to_be_bytes());
        buf[16..20].copy_from_slice(&self.avg_bit_rate.to_be_bytes());
        buf[20..24].copy_from_slice(&self.sample_rate.to_be_bytes());
        buf
    }
}
