use alacd_mp4::{CodecParams, demux::demux};
use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

/// Print a json summary of a fragmented ALAC mp4 file.
#[derive(Debug, Clone, Args)]
pub struct Inspect {
    /// Path of a fragmented mp4 file with an encrypted ALAC sample entry.
    #[arg(required = true)]
    pub input: PathBuf,
}

#[derive(Serialize)]
struct Summary {
    codec: CodecParams,
    fragments: usize,
    samples: usize,
    duration: u64,
    payload_size: usize,
    descriptor_indices: Vec<u32>,
}

impl Inspect {
    pub fn execute(self) -> Result<()> {
        let track = demux(std::fs::read(&self.input)?)?;

        let mut descriptor_indices = track
            .samples
            .iter()
            .map(|x| x.descriptor_index)
            .collect::<Vec<_>>();
        descriptor_indices.sort_unstable();
        descriptor_indices.dedup();

        let summary = Summary {
            codec: track.codec,
            fragments: track.fragments,
            samples: track.samples.len(),
            duration: track.duration(),
            payload_size: track.payload_size(),
            descriptor_indices,
        };

        serde_json::to_writer_pretty(std::io::stdout(), &summary)?;
        println!();
        Ok(())
    }
}
