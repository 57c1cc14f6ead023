//! Template of the source `moov` box.
//!
//! Every box found below `moov` is sorted into one [`SourceBox`] kind, which
//! decides how the box reaches the rebuilt file: copied, patched, rebuilt or
//! left out. Unknown kinds are copied byte for byte.

use crate::{Result, bail, parser::type_to_string};
use bytes::Bytes;

/// A box of the source movie.
#[derive(Clone, Debug)]
pub enum SourceBox {
    /// `trak`, `mdia` and `minf`, rebuilt around their children.
    Container {
        kind: [u8; 4],
        children: Vec<SourceBox>,
    },
    /// `mvhd`, `tkhd` and `mdhd`, copied with the duration patched.
    Header(DurationHeader),
    /// `stbl`, synthesized from the demuxed samples.
    SampleTable,
    /// `mvex`, only meaningful for fragmented files.
    FragmentDefaults,
    /// `udta`, replaced by freshly written metadata.
    UserData,
    /// `pssh`, the output is not encrypted.
    Protection,
    /// Anything else, copied verbatim.
    Opaque { kind: [u8; 4], bytes: Bytes },
}

impl SourceBox {
    pub fn kind(&self) -> [u8; 4] {
        match self {
            Self::Container { kind, .. } => *kind,
            Self::Header(header) => header.kind,
            Self::SampleTable => *b"stbl",
            Self::FragmentDefaults => *b"mvex",
            Self::UserData => *b"udta",
            Self::Protection => *b"pssh",
            Self::Opaque { kind, .. } => *kind,
        }
    }

    /// Whether the box is written to a standalone file.
    pub fn is_carried(&self) -> bool {
        !matches!(
            self,
            Self::FragmentDefaults | Self::UserData | Self::Protection
        )
    }

    fn count(&self, kind: &[u8; 4]) -> usize {
        let own = (self.kind() == *kind) as usize;

        match self {
            Self::Container { children, .. } => {
                own + children.iter().map(|x| x.count(kind)).sum::<usize>()
            }
            _ => own,
        }
    }
}

/// Children of the source `moov` box, in source order.
#[derive(Clone, Debug, Default)]
pub struct Movie {
    pub children: Vec<SourceBox>,
}

impl Movie {
    /// Number of boxes of the given kind anywhere in the tree.
    pub fn count(&self, kind: &[u8; 4]) -> usize {
        self.children.iter().map(|x| x.count(kind)).sum()
    }

    /// Check that the boxes needed for a standalone file appear exactly once.
    pub fn validate(&self) -> Result<()> {
        for kind in [b"mvhd", b"trak", b"tkhd", b"mdhd", b"stbl"] {
            let count = self.count(kind);

            if count != 1 {
                bail!(
                    "expected exactly one {} box in moov, found {}",
                    type_to_string(*kind),
                    count
                );
            }
        }

        Ok(())
    }
}

/// A header box whose duration field is rewritten.
#[derive(Clone, Debug)]
pub struct DurationHeader {
    pub kind: [u8; 4],
    pub version: u32,
    /// Size of the box header, version and flags included.
    pub header_size: usize,
    /// The complete source box.
    pub bytes: Bytes,
}

impl DurationHeader {
    pub fn new(kind: [u8; 4], version: u32, header_size: u64, bytes: Bytes) -> Result<Self> {
        if version > 1 {
            bail!(
                "{} box version can only be 0 or 1",
                type_to_string(kind)
            );
        }

        let header = Self {
            kind,
            version,
            header_size: header_size as usize,
            bytes,
        };

        let end = header.duration_offset()? + header.duration_width();
        if end > header.bytes.len() {
            bail!("{} box is too short", type_to_string(kind));
        }

        Ok(header)
    }

    /// Offset of the duration field from the start of the box.
    fn duration_offset(&self) -> Result<usize> {
        let field = match (&self.kind, self.version) {
            // creation(4) modification(4) timescale(4)
            (b"mvhd" | b"mdhd", 0) => 12,
            // creation(8) modification(8) timescale(4)
            (b"mvhd" | b"mdhd", _) => 20,
            // creation(4) modification(4) track_id(4) reserved(4)
            (b"tkhd", 0) => 16,
            // creation(8) modification(8) track_id(4) reserved(4)
            (b"tkhd", _) => 24,
            (kind, _) => bail!("{} box has no duration field", type_to_string(*kind)),
        };

        Ok(self.header_size + field)
    }

    fn duration_width(&self) -> usize {
        if self.version == 1 { 8 } else { 4 }
    }

    /// Source box with the duration replaced.
    ///
    /// Version 0 boxes store 32 bits, larger durations saturate. Track headers
    /// are also flagged enabled, in movie and in preview.
    pub fn patched(&self, duration: u64) -> Result<Vec<u8>> {
        let mut bytes = self.bytes.to_vec();
        let offset = self.duration_offset()?;

        if self.version == 1 {
            bytes[offset..offset + 8].copy_from_slice(&duration.to_be_bytes());
        } else {
            let duration = u32::try_from(duration).unwrap_or(u32::MAX);
            bytes[offset..offset + 4].copy_from_slice(&duration.to_be_bytes());
        }

        if &self.kind == b"tkhd" {
            // 24 bit flags end where the header ends
            bytes[self.header_size - 3..self.header_size].copy_from_slice(&[0, 0, 7]);
        }

        Ok(bytes)
    }
}
