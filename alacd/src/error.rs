use thiserror::Error;

/// The Errors that may occur while processing one track.
#[derive(Debug, Error)]
pub enum Error {
    /// A request failed, returned a non-success status or ran out of retries.
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// The manifest is not a master playlist.
    #[error("manifest is not a master playlist: {0}")]
    ManifestFormat(String),

    /// No variant carries the requested codec.
    #[error("no variant with {0} codec found")]
    CodecUnavailable(String),

    /// The container could not be demuxed or muxed.
    #[error(transparent)]
    Container(#[from] alacd_mp4::Error),

    /// A sample refers to a key the manifest does not list.
    #[error("sample {sample} uses key {index} but only {len} keys are known")]
    KeyIndexOutOfRange {
        sample: usize,
        index: u32,
        len: usize,
    },

    /// The decryption oracle could not be reached or broke the protocol.
    #[error("decryption oracle: {0}")]
    OracleIo(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The album document could not be read.
    #[error("invalid catalog document: {0}")]
    Catalog(String),

    /// The catalog has no streamable asset for a track.
    #[error("{0} has no lossless asset")]
    MissingAsset(String),
}

impl Error {
    pub(crate) fn fetch<T: std::fmt::Display>(reason: T) -> Self {
        Self::Fetch(reason.to_string())
    }

    pub(crate) fn oracle<T: std::fmt::Display>(reason: T) -> Self {
        Self::OracleIo(reason.to_string())
    }
}

/// A `Result` alias where the `Err` case is `alacd::Error`.
pub type Result<T> = std::result::Result<T, Error>;
