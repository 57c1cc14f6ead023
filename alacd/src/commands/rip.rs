use crate::{
    Session,
    catalog::{Catalog, JsonCatalog},
    rip,
    session::{DEFAULT_ORACLE, DEFAULT_USER_AGENT},
};
use anyhow::{Result, bail};
use clap::Args;
use log::info;
use std::{
    io::{IsTerminal, stderr},
    path::PathBuf,
};

/// Rip every track of an album.
#[derive(Debug, Clone, Args)]
pub struct Rip {
    /// Album document, either a local .json file or a catalog url.
    /// The document has the same shape as a catalog albums response: {"data": [album]}.
    #[arg(required = true, value_name = "ALBUM_JSON")]
    pub input: String,

    /// Directory where album folders are created.
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,

    /// Codec of the variant to download.
    #[arg(long, default_value = "alac")]
    pub codec: String,

    /// Address of the decryption oracle.
    #[arg(long, help_heading = "Decrypt Options", default_value = DEFAULT_ORACLE)]
    pub oracle: String,

    /// Bearer token for catalog requests.
    #[arg(long, help_heading = "Client Options")]
    pub token: Option<String>,

    /// Update and set user agent header for requests.
    #[arg(long, help_heading = "Client Options", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Maximum number of retries of a request after a connection error or timeout.
    #[arg(long, help_heading = "Download Options", default_value_t = 5)]
    pub retries: u8,

    /// Maximum number of parallel range requests per track.
    /// Number of threads should be in range 1-32 (inclusive).
    #[arg(short, long, help_heading = "Download Options", default_value_t = 10, value_parser = clap::value_parser!(u8).range(1..=32))]
    pub threads: u8,
}

impl Rip {
    pub fn execute(self) -> Result<()> {
        let session = Session::builder()
            .user_agent(self.user_agent)
            .token(self.token)
            .oracle(self.oracle)
            .threads(self.threads as usize)
            .retries(self.retries)
            .output(self.output)
            .codec(self.codec)
            .progress(stderr().is_terminal())
            .build()?;

        let album = JsonCatalog::new(self.input).album(&session)?;
        let report = rip::rip_album(&session, &album)?;

        info!(
            "{} completed, {} skipped, {} failed",
            report.completed, report.skipped, report.failed
        );

        if report.is_failed() {
            bail!("{} of {} tracks failed", report.failed, album.tracks().len());
        }

        Ok(())
    }
}
