use bytes::Bytes;
use std::io::{Error, ErrorKind, Result};

/// Big endian reader over a shared byte buffer.
///
/// Reading byte ranges hands out slices of the same allocation, so payloads of
/// nested boxes are never copied.
#[derive(Clone, Default)]
pub struct Reader {
    data: Bytes,
    position: usize,
}

impl Reader {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            position: 0,
        }
    }

    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    pub fn get_length(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn get_position(&self) -> u64 {
        self.position as u64
    }

    pub fn remaining(&self) -> u64 {
        (self.data.len() - self.position) as u64
    }

    pub fn skip(&mut self, bytes: u64) -> Result<()> {
        self.take(bytes as usize).map(|_| ())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.array()?))
    }

    pub fn read_fourcc(&mut self) -> Result<[u8; 4]> {
        self.array()
    }

    /// Read the next `bytes` bytes as a slice of the underlying buffer.
    pub fn read_bytes(&mut self, bytes: usize) -> Result<Bytes> {
        let start = self.position;
        self.take(bytes)?;
        Ok(self.data.slice(start..self.position))
    }

    /// Slice of the underlying buffer by absolute positions, independent of the
    /// read head.
    pub fn slice(&self, start: u64, end: u64) -> Result<Bytes> {
        if start > end || end > self.get_length() {
            return Err(Error::new(
                ErrorKind::UnexpectedEof,
                "Reader slice is out of bounds.",
            ));
        }

        Ok(self.data.slice(start as usize..end as usize))
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0; N];
        buf.copy_from_slice(self.take(N)?);
        Ok(buf)
    }

    fn take(&mut self, bytes: usize) -> Result<&[u8]> {
        let end = self.position.checked_add(bytes).filter(|x| *x <= self.data.len());

        match end {
            Some(end) => {
                let start = self.position;
                self.position = end;
                Ok(&self.data[start..end])
            }
            None => Err(Error::new(
                ErrorKind::UnexpectedEof,
                "Reader reads out of memory bounds.",
            )),
        }
    }
}
