//! Synthetic fragmented ALAC files.
//!
//! Only the boxes read by the demuxer carry meaningful values. Everything else
//! is zero filled but well formed.

use crate::{BoxWriter, CodecParams, Result};
use std::io::{Cursor, Seek, Write};

/// One `trun` entry. `None` leaves the field to the fragment or movie default.
#[derive(Clone, Copy, Debug, Default)]
pub struct Entry {
    pub duration: Option<u32>,
    pub size: Option<u32>,
}

/// One `moof` + `mdat` pair.
#[derive(Clone, Debug, Default)]
pub struct Fragment {
    /// One-based index written to `tfhd`, when present.
    pub sample_description_index: Option<u32>,
    pub default_duration: Option<u32>,
    pub default_size: Option<u32>,
    /// Each inner list becomes its own `trun` box.
    pub runs: Vec<Vec<Entry>>,
    pub payload: Vec<u8>,
    /// Whether the `mdat` box is written.
    pub mdat: bool,
}

impl Fragment {
    /// Fragment with explicit per sample sizes and durations in one run.
    pub fn explicit(sizes: &[u32], duration: u32, sample_description_index: Option<u32>) -> Self {
        let entries = sizes
            .iter()
            .map(|x| Entry {
                duration: Some(duration),
                size: Some(*x),
            })
            .collect();

        Self {
            sample_description_index,
            runs: vec![entries],
            payload: pattern(sizes.iter().map(|x| *x as usize).sum(), sizes.len()),
            mdat: true,
            ..Default::default()
        }
    }
}

/// Builder of a complete fragmented file.
#[derive(Clone, Debug)]
pub struct Fixture {
    pub codec: CodecParams,
    /// Version of `mvhd`, `tkhd` and `mdhd`.
    pub header_version: u8,
    /// `trex` defaults as (duration, size), `None` drops the box.
    pub trex: Option<(u32, u32)>,
    pub fragments: Vec<Fragment>,
}

impl Default for Fixture {
    fn default() -> Self {
        Self {
            codec: CodecParams {
                frame_length: 4096,
                compatible_version: 0,
                bit_depth: 24,
                pb: 40,
                mb: 10,
                kb: 14,
                num_channels: 2,
                max_run: 255,
                max_frame_bytes: 0,
                avg_bit_rate: 0,
                sample_rate: 48000,
            },
            header_version: 0,
            trex: Some((4096, 0)),
            fragments: vec![],
        }
    }
}

impl Fixture {
    pub fn fragment(mut self, fragment: Fragment) -> Self {
        self.fragments.push(fragment);
        self
    }

    /// All fragment payloads back to back.
    pub fn payload(&self) -> Vec<u8> {
        self.fragments
            .iter()
            .flat_map(|x| x.payload.iter().copied())
            .collect()
    }

    pub fn build(&self) -> Result<Vec<u8>> {
        let mut writer = BoxWriter::new(Cursor::new(vec![]));

        writer.start_box(b"ftyp")?;
        writer.write_all(b"iso8")?;
        writer.write_u32(0)?;
        writer.write_all(b"iso8cmfc")?;
        writer.end_box()?;

        self.write_moov(&mut writer)?;

        for (index, fragment) in self.fragments.iter().enumerate() {
            write_moof(&mut writer, index as u32 + 1, fragment)?;

            if fragment.mdat {
                writer.write_box(b"mdat", &fragment.payload)?;
            }
        }

        Ok(writer.into_inner().into_inner())
    }

    fn write_moov<W: Write + Seek>(&self, writer: &mut BoxWriter<W>) -> Result<()> {
        let version = self.header_version;
        let wide = version == 1;

        writer.start_box(b"moov")?;

        // creation, modification, timescale, duration, rate, volume, reserved,
        // matrix, pre_defined, next track id
        let mut mvhd = zeros(if wide { 108 } else { 96 });
        let timescale = if wide { 16 } else { 8 };
        mvhd[timescale..timescale + 4].copy_from_slice(&1000_u32.to_be_bytes());
        let next_track = mvhd.len() - 4;
        mvhd[next_track..].copy_from_slice(&2_u32.to_be_bytes());
        writer.write_full_box(b"mvhd", version, 0, &mvhd)?;

        writer.start_box(b"trak")?;

        let mut tkhd = zeros(if wide { 92 } else { 80 });
        let track_id = if wide { 16 } else { 8 };
        tkhd[track_id..track_id + 4].copy_from_slice(&1_u32.to_be_bytes());
        writer.write_full_box(b"tkhd", version, 3, &tkhd)?;

        writer.start_box(b"mdia")?;

        let mut mdhd = zeros(if wide { 32 } else { 20 });
        mdhd[timescale..timescale + 4].copy_from_slice(&self.codec.sample_rate.to_be_bytes());
        writer.write_full_box(b"mdhd", version, 0, &mdhd)?;

        let mut hdlr = zeros(4);
        hdlr.extend_from_slice(b"soun");
        hdlr.extend(zeros(12));
        hdlr.extend_from_slice(b"SoundHandler\0");
        writer.write_full_box(b"hdlr", 0, 0, &hdlr)?;

        writer.start_box(b"minf")?;
        writer.write_full_box(b"smhd", 0, 0, &zeros(4))?;

        writer.start_box(b"dinf")?;
        writer.start_full_box(b"dref", 0, 0)?;
        writer.write_u32(1)?;
        writer.write_full_box(b"url ", 0, 1, &[])?;
        writer.end_box()?;
        writer.end_box()?;

        self.write_stbl(writer)?;

        writer.end_box()?; // minf
        writer.end_box()?; // mdia
        writer.end_box()?; // trak

        writer.start_box(b"mvex")?;
        writer.write_full_box(b"mehd", 0, 0, &zeros(4))?;
        if let Some((duration, size)) = self.trex {
            writer.start_full_box(b"trex", 0, 0)?;
            for value in [1, 1, duration, size, 0] {
                writer.write_u32(value)?;
            }
            writer.end_box()?;
        }
        writer.end_box()?;

        writer.write_full_box(b"pssh", 0, 0, &[0x9A; 20])?;
        writer.write_box(b"udta", &[0x55; 12])?;

        writer.end_box()?;
        Ok(())
    }

    fn write_stbl<W: Write + Seek>(&self, writer: &mut BoxWriter<W>) -> Result<()> {
        writer.start_box(b"stbl")?;

        writer.start_full_box(b"stsd", 0, 0)?;
        writer.write_u32(1)?;
        writer.start_box(b"enca")?;
        writer.write_all(&[0, 0, 0, 0, 0, 0, 0, 1])?;
        writer.write_all(&[0; 8])?;
        writer.write_u16(self.codec.num_channels as u16)?;
        writer.write_u16(16)?;
        writer.write_all(&[0; 4])?;
        writer.write_u16(0)?;
        writer.write_u16(0)?;
        writer.write_full_box(b"alac", 0, 0, &self.codec.to_bytes())?;
        writer.start_box(b"sinf")?;
        writer.write_box(b"frma", b"alac")?;
        writer.write_full_box(b"schm", 0, 0, b"cbcs\0\x01\0\0")?;
        writer.end_box()?;
        writer.end_box()?;
        writer.end_box()?;

        writer.write_full_box(b"stts", 0, 0, &zeros(4))?;
        writer.write_full_box(b"stsc", 0, 0, &zeros(4))?;
        writer.write_full_box(b"stsz", 0, 0, &zeros(8))?;
        writer.write_full_box(b"stco", 0, 0, &zeros(4))?;

        writer.end_box()?;
        Ok(())
    }
}

fn write_moof<W: Write + Seek>(
    writer: &mut BoxWriter<W>,
    sequence: u32,
    fragment: &Fragment,
) -> Result<()> {
    writer.start_box(b"moof")?;
    writer.write_full_box(b"mfhd", 0, 0, &sequence.to_be_bytes())?;

    writer.start_box(b"traf")?;

    // default-base-is-moof
    let mut flags = 0x20000;
    let mut tfhd = 1_u32.to_be_bytes().to_vec();

    if let Some(x) = fragment.sample_description_index {
        flags |= 0x2;
        tfhd.extend_from_slice(&x.to_be_bytes());
    }

    if let Some(x) = fragment.default_duration {
        flags |= 0x8;
        tfhd.extend_from_slice(&x.to_be_bytes());
    }

    if let Some(x) = fragment.default_size {
        flags |= 0x10;
        tfhd.extend_from_slice(&x.to_be_bytes());
    }

    writer.write_full_box(b"tfhd", 0, flags, &tfhd)?;
    writer.write_full_box(b"tfdt", 1, 0, &zeros(8))?;

    for run in &fragment.runs {
        let durations = run.iter().any(|x| x.duration.is_some());
        let sizes = run.iter().any(|x| x.size.is_some());
        let mut flags = 0x1;

        if durations {
            flags |= 0x100;
        }

        if sizes {
            flags |= 0x200;
        }

        writer.start_full_box(b"trun", 0, flags)?;
        writer.write_u32(run.len() as u32)?;
        // data offset, not used by the demuxer
        writer.write_u32(0)?;

        for entry in run {
            if durations {
                writer.write_u32(entry.duration.unwrap_or_default())?;
            }

            if sizes {
                writer.write_u32(entry.size.unwrap_or_default())?;
            }
        }

        writer.end_box()?;
    }

    writer.end_box()?; // traf
    writer.end_box()?; // moof
    Ok(())
}

fn zeros(len: usize) -> Vec<u8> {
    vec![0; len]
}

/// Recognizable payload bytes, distinct per sample position.
pub fn pattern(len: usize, seed: usize) -> Vec<u8> {
    (0..len).map(|x| ((x * 7 + seed) % 251) as u8).collect()
}
