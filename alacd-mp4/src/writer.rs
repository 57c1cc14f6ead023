use crate::{Result, bail, parser::type_to_string};
use std::io::{Seek, SeekFrom, Write};

/// Position and size of a box that has been written.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoxInfo {
    pub kind: [u8; 4],
    /// Absolute offset of the box header.
    pub offset: u64,
    /// Size of the header, version and flags included for full boxes.
    pub header_size: u64,
    /// Size of the complete box.
    pub size: u64,
}

impl BoxInfo {
    /// Absolute offset of the first payload byte.
    pub fn payload_offset(&self) -> u64 {
        self.offset + self.header_size
    }
}

struct OpenBox {
    kind: [u8; 4],
    offset: u64,
    header_size: u64,
}

/// Writer of nested boxes.
///
/// A box is opened with a zero size which is patched once the box is closed,
/// so payload sizes never have to be known up front.
pub struct BoxWriter<W: Write + Seek> {
    inner: W,
    open: Vec<OpenBox>,
}

impl<W: Write + Seek> BoxWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            open: vec![],
        }
    }

    pub fn position(&mut self) -> Result<u64> {
        Ok(self.inner.stream_position()?)
    }

    /// Open a basic box.
    pub fn start_box(&mut self, kind: &[u8; 4]) -> Result<()> {
        let offset = self.position()?;
        self.inner.write_all(&[0; 4])?;
        self.inner.write_all(kind)?;
        self.open.push(OpenBox {
            kind: *kind,
            offset,
            header_size: 8,
        });
        Ok(())
    }

    /// Open a full box.
    pub fn start_full_box(&mut self, kind: &[u8; 4], version: u8, flags: u32) -> Result<()> {
        self.start_box(kind)?;
        self.write_u32(((version as u32) << 24) | (flags & 0xFFFFFF))?;

        if let Some(x) = self.open.last_mut() {
            x.header_size = 12;
        }

        Ok(())
    }

    /// Close the innermost open box and patch its size.
    pub fn end_box(&mut self) -> Result<BoxInfo> {
        let Some(open) = self.open.pop() else {
            bail!("no box is open");
        };

        let end = self.position()?;
        let size = end - open.offset;

        let Ok(size32) = u32::try_from(size) else {
            bail!(
                "{} box of {} bytes does not fit a 32 bit size",
                type_to_string(open.kind),
                size
            );
        };

        self.inner.seek(SeekFrom::Start(open.offset))?;
        self.inner.write_all(&size32.to_be_bytes())?;
        self.inner.seek(SeekFrom::Start(end))?;

        Ok(BoxInfo {
            kind: open.kind,
            offset: open.offset,
            header_size: open.header_size,
            size,
        })
    }

    /// Write a basic box with a known payload.
    pub fn write_box(&mut self, kind: &[u8; 4], payload: &[u8]) -> Result<BoxInfo> {
        self.start_box(kind)?;
        self.write_all(payload)?;
        self.end_box()
    }

    /// Write a full box with a known payload.
    pub fn write_full_box(
        &mut self,
        kind: &[u8; 4],
        version: u8,
        flags: u32,
        payload: &[u8],
    ) -> Result<BoxInfo> {
        self.start_full_box(kind, version, flags)?;
        self.write_all(payload)?;
        self.end_box()
    }

    pub fn write_all(&mut self, data: &[u8]) -> Result<()> {
        Ok(self.inner.write_all(data)?)
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write_all(&[value])
    }

    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.write_all(&value.to_be_bytes())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.write_all(&value.to_be_bytes())
    }

    /// Move the write head to the payload of an already closed box, so that
    /// reserved fields can be overwritten. Call [`Self::seek_to_end`] when done.
    pub fn seek_to_payload(&mut self, info: &BoxInfo) -> Result<()> {
        if !self.open.is_empty() {
            bail!("cannot seek back while boxes are open");
        }

        self.inner.seek(SeekFrom::Start(info.payload_offset()))?;
        Ok(())
    }

    pub fn seek_to_end(&mut self) -> Result<u64> {
        Ok(self.inner.seek(SeekFrom::End(0))?)
    }

    pub fn flush(&mut self) -> Result<()> {
        Ok(self.inner.flush()?)
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}
