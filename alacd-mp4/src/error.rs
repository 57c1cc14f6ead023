use thiserror::Error;

/// The Errors that may occur when demuxing or muxing mp4 data.
#[derive(Debug, Error)]
pub enum Error {
    /// An expected box is absent, duplicated or truncated.
    #[error("invalid box structure: {0}")]
    BoxStructure(String),

    /// The samples of a fragment do not consume its payload exactly.
    #[error("offset mismatch in fragment {fragment}: samples consume {consumed} of {payload} payload bytes")]
    OffsetMismatch {
        fragment: usize,
        payload: usize,
        consumed: usize,
    },

    /// A metadata value has no `data` atom representation.
    #[error("unsupported metadata value type: {0}")]
    UnsupportedMetadataType(String),

    /// Reading or writing failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a new box structure error.
    pub fn structure<T: Into<String>>(reason: T) -> Self {
        Self::BoxStructure(reason.into())
    }

    /// Returns true if the error signals a corrupted source file.
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::BoxStructure(_) | Self::OffsetMismatch { .. })
    }
}

#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::Error::structure(format!($($arg)*)))
    };
}

#[macro_export]
macro_rules! err {
    ($($arg:tt)*) => {
        $crate::Error::structure(format!($($arg)*))
    };
}
