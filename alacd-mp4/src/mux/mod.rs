//! Standalone `.m4a` muxer.
//!
//! The output is laid out as `ftyp`, `moov` and a single `mdat`. Chunk offsets
//! live in `moov` but point into `mdat`, so `stco` is first written with zeros
//! and patched once the payload position is known.

mod metadata;
mod sample_table;

pub use metadata::{ItemKey, MetaValue, Tags};
pub use sample_table::{CHUNK_SIZE, SampleTable, StscEntry, SttsEntry};

use crate::{BoxInfo, BoxWriter, CodecParams, Error, Result, SourceBox, Track, bail};
use log::debug;
use std::io::{Seek, Write};

/// Rebuilds one demuxed track with decrypted samples.
pub struct Muxer<'a> {
    track: &'a Track,
    tags: &'a Tags,
}

impl<'a> Muxer<'a> {
    pub fn new(track: &'a Track, tags: &'a Tags) -> Self {
        Self { track, tags }
    }

    /// Write the complete file.
    ///
    /// `decrypted` holds all samples back to back in playback order and must be
    /// exactly as long as the encrypted samples together.
    pub fn write<W: Write + Seek>(&self, writer: W, decrypted: &[u8]) -> Result<W> {
        let expected = self.track.payload_size();

        if decrypted.len() != expected {
            // reported past the last fragment, the whole track is affected
            return Err(Error::OffsetMismatch {
                fragment: self.track.fragments,
                payload: decrypted.len(),
                consumed: expected,
            });
        }

        let mut writer = BoxWriter::new(writer);
        let mut table = SampleTable::new(&self.track.samples);
        let duration = table.duration();

        write_ftyp(&mut writer)?;

        writer.start_box(b"moov")?;
        let mut stco = None;
        for child in &self.track.movie.children {
            self.write_source(&mut writer, child, &table, duration, &mut stco)?;
        }
        metadata::write_udta(&mut writer, self.tags)?;
        writer.end_box()?;

        let Some(stco) = stco else {
            bail!("source movie has no sample table");
        };

        let mdat = writer.write_box(b"mdat", decrypted)?;
        table.resolve_offsets(mdat.payload_offset())?;
        table.patch(&mut writer, &stco)?;
        writer.flush()?;

        debug!(
            "muxed {} samples into {} chunks, mdat at {}",
            table.sample_count(),
            table.chunk_count(),
            mdat.offset
        );

        Ok(writer.into_inner())
    }

    fn write_source<W: Write + Seek>(
        &self,
        writer: &mut BoxWriter<W>,
        source: &SourceBox,
        table: &SampleTable,
        duration: u64,
        stco: &mut Option<BoxInfo>,
    ) -> Result<()> {
        if !source.is_carried() {
            return Ok(());
        }

        match source {
            SourceBox::Container { kind, children } => {
                writer.start_box(kind)?;
                for child in children {
                    self.write_source(writer, child, table, duration, stco)?;
                }
                writer.end_box()?;
            }
            SourceBox::Header(header) => writer.write_all(&header.patched(duration)?)?,
            SourceBox::SampleTable => {
                writer.start_box(b"stbl")?;
                write_stsd(writer, &self.track.codec)?;
                *stco = Some(table.write(writer)?);
                writer.end_box()?;
            }
            SourceBox::Opaque { bytes, .. } => writer.write_all(bytes)?,
            _ => (),
        }

        Ok(())
    }
}

fn write_ftyp<W: Write + Seek>(writer: &mut BoxWriter<W>) -> Result<()> {
    writer.start_box(b"ftyp")?;
    writer.write_all(b"M4A ")?;
    writer.write_u32(0)?;
    for brand in [b"M4A ", b"mp42", b"isom", &[0; 4]] {
        writer.write_all(brand)?;
    }
    writer.end_box()?;
    Ok(())
}

fn write_stsd<W: Write + Seek>(writer: &mut BoxWriter<W>, codec: &CodecParams) -> Result<()> {
    writer.start_full_box(b"stsd", 0, 0)?;
    writer.write_u32(1)?;

    writer.start_box(b"alac")?;
    // reserved, data reference index
    writer.write_all(&[0, 0, 0, 0, 0, 0, 0, 1])?;
    // version, revision, vendor
    writer.write_all(&[0; 8])?;
    writer.write_u16(codec.num_channels as u16)?;
    writer.write_u16(codec.bit_depth as u16)?;
    writer.write_all(&[0, 0])?;
    writer.write_u32(codec.sample_rate)?;
    writer.write_all(&[0, 0])?;
    writer.write_full_box(b"alac", 0, 0, &codec.to_bytes())?;
    writer.end_box()?;

    writer.end_box()?;
    Ok(())
}
