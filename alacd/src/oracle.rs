use crate::{
    Error, Result,
    resolver::{KeyIndex, PREFETCH_KEY, PREFETCH_TRACK_ID},
};
use alacd_mp4::Sample;
use log::debug;
use std::{
    io::{Read, Write},
    net::TcpStream,
};

/// Sent between key contexts once samples have been exchanged.
const CONTEXT_FLUSH: [u8; 4] = [0; 4];

/// Sent after the last sample.
const TERMINATOR: [u8; 5] = [0; 5];

/// Decrypts samples through an external oracle, one connection per track.
///
/// Each sample is written as a little-endian `u32` length followed by its bytes,
/// and the oracle answers with exactly as many decrypted bytes. Whenever the
/// descriptor index changes, the track id and key id are sent first as two
/// length prefixed strings.
pub struct DecryptionChannel<S> {
    stream: S,
    track_id: String,
}

impl DecryptionChannel<TcpStream> {
    pub fn connect(addr: &str, track_id: impl Into<String>) -> Result<Self> {
        let stream =
            TcpStream::connect(addr).map_err(|x| Error::oracle(format!("{} ({})", addr, x)))?;
        stream.set_nodelay(true).map_err(Error::oracle)?;
        debug!("connected to decryption oracle at {}", addr);
        Ok(Self::new(stream, track_id))
    }
}

impl<S: Read + Write> DecryptionChannel<S> {
    pub fn new(stream: S, track_id: impl Into<String>) -> Self {
        Self {
            stream,
            track_id: track_id.into(),
        }
    }

    /// Decrypt every sample in order and return the concatenated plaintext.
    pub fn decrypt(self, samples: &[Sample], keys: &KeyIndex) -> Result<Vec<u8>> {
        self.decrypt_with(samples, keys, |_| Ok(()))
    }

    /// Same as [`decrypt`](Self::decrypt), calling `progress` after each sample
    /// with the number of samples done.
    pub fn decrypt_with<F>(
        self,
        samples: &[Sample],
        keys: &KeyIndex,
        mut progress: F,
    ) -> Result<Vec<u8>>
    where
        F: FnMut(usize) -> Result<()>,
    {
        keys.check(samples)?;

        let Self {
            mut stream,
            track_id,
        } = self;
        let total = samples.iter().map(|x| x.data.len()).sum::<usize>();
        let mut decrypted = vec![0_u8; total];
        let mut frame = Vec::new();
        let mut position = 0;
        let mut last_index = None;

        for (i, sample) in samples.iter().enumerate() {
            frame.clear();

            if last_index != Some(sample.descriptor_index) {
                if last_index.is_some() {
                    frame.extend_from_slice(&CONTEXT_FLUSH);
                }

                let key = keys.get(sample.descriptor_index).unwrap_or(PREFETCH_KEY);
                let id = if key == PREFETCH_KEY {
                    PREFETCH_TRACK_ID
                } else {
                    track_id.as_str()
                };

                push_string(&mut frame, id)?;
                push_string(&mut frame, key)?;
                debug!("sample {} switches to key {}", i, key);
                last_index = Some(sample.descriptor_index);
            }

            let len = u32::try_from(sample.data.len())
                .map_err(|_| Error::oracle(format!("sample {} is too large", i)))?;
            frame.extend_from_slice(&len.to_le_bytes());
            frame.extend_from_slice(&sample.data);
            stream.write_all(&frame).map_err(Error::oracle)?;
            stream.flush().map_err(Error::oracle)?;

            let end = position + sample.data.len();
            stream
                .read_exact(&mut decrypted[position..end])
                .map_err(|x| Error::oracle(format!("sample {}: {}", i, x)))?;
            position = end;

            progress(i + 1)?;
        }

        stream.write_all(&TERMINATOR).map_err(Error::oracle)?;
        stream.flush().map_err(Error::oracle)?;
        Ok(decrypted)
    }
}

fn push_string(frame: &mut Vec<u8>, value: &str) -> Result<()> {
    let len = u8::try_from(value.len())
        .map_err(|_| Error::oracle(format!("identifier longer than 255 bytes: {}", value)))?;
    frame.push(len);
    frame.extend_from_slice(value.as_bytes());
    Ok(())
}
