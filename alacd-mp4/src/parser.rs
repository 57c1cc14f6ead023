/*
    REFERENCES
    ----------

    1. https://github.com/shaka-project/shaka-player/blob/7098f43f70119226bca2e5583833aaf27b498e33/lib/util/mp4_parser.js
    2. https://github.com/shaka-project/shaka-player/blob/7098f43f70119226bca2e5583833aaf27b498e33/externs/shaka/mp4_parser.js

*/

use crate::{Error, Reader, Result, bail, err};
use bytes::Bytes;
use std::{collections::HashMap, io::ErrorKind, rc::Rc};

/// `Result` type returned by box callbacks.
pub type HandlerResult = Result<()>;
/// Callback type for parsing an mp4 file.
pub type CallbackType = Rc<dyn Fn(ParsedBox) -> HandlerResult>;

/// Mp4 file parser.
#[derive(Clone, Default)]
pub struct Mp4Parser {
    headers: HashMap<[u8; 4], BoxType>,
    box_definitions: HashMap<[u8; 4], CallbackType>,
    fallback: Option<CallbackType>,
}

impl Mp4Parser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a box type as a Basic Box.
    pub fn base_box<F>(mut self, type_: &str, definition: F) -> Self
    where
        F: Fn(ParsedBox) -> HandlerResult + 'static,
    {
        let type_code = type_from_string(type_);
        self.headers.insert(type_code, BoxType::BasicBox);
        self.box_definitions.insert(type_code, Rc::new(definition));
        self
    }

    /// Declare a box type as a Full Box.
    pub fn full_box<F>(mut self, type_: &str, definition: F) -> Self
    where
        F: Fn(ParsedBox) -> HandlerResult + 'static,
    {
        let type_code = type_from_string(type_);
        self.headers.insert(type_code, BoxType::FullBox);
        self.box_definitions.insert(type_code, Rc::new(definition));
        self
    }

    /// Callback for every box type that has no definition of its own. Such boxes
    /// are handed over as Basic Boxes. Without a fallback they are skipped.
    pub fn other_box<F>(mut self, definition: F) -> Self
    where
        F: Fn(ParsedBox) -> HandlerResult + 'static,
    {
        self.fallback = Some(Rc::new(definition));
        self
    }

    /// Parse the given data using the added callbacks.
    pub fn parse(&self, data: impl Into<Bytes>) -> HandlerResult {
        let mut reader = Reader::new(data);

        while reader.has_more_data() {
            self.parse_next(0, &mut reader)?;
        }

        Ok(())
    }

    /// Parse the next box on the current level.
    ///
    /// `abs_start` is the absolute start position of the reader's buffer in the
    /// original byte array.
    fn parse_next(&self, abs_start: u64, reader: &mut Reader) -> HandlerResult {
        let start = reader.get_position();

        // size(4 bytes) + type(4 bytes) = 8 bytes
        if reader.remaining() < 8 {
            bail!("truncated box header at offset {}", abs_start + start);
        }

        let mut size = reader.read_u32()? as u64;
        let type_ = reader.read_fourcc()?;
        let name = type_to_string(type_);
        let mut has_64_bit_size = false;

        match size {
            0 => size = reader.get_length() - start,
            1 => {
                if reader.remaining() < 8 {
                    bail!("truncated {} box header", name);
                }
                size = reader.read_u64()?;
                has_64_bit_size = true;
            }
            _ => (),
        }

        let end = start
            .checked_add(size)
            .filter(|x| *x <= reader.get_length() && *x >= reader.get_position())
            .ok_or_else(|| err!("{} box at offset {} is truncated", name, abs_start + start))?;

        let definition = self
            .box_definitions
            .get(&type_)
            .map(|x| (x, self.headers.get(&type_) == Some(&BoxType::FullBox)))
            .or_else(|| self.fallback.as_ref().map(|x| (x, false)));

        let Some((definition, full_box)) = definition else {
            // Move the read head to be at the end of the box.
            reader.skip(end - reader.get_position())?;
            return Ok(());
        };

        let mut version = None;
        let mut flags = None;

        if full_box {
            if end - reader.get_position() < 4 {
                bail!("{} box has no version and flags", name);
            }

            let version_and_flags = reader.read_u32()?;
            version = Some(version_and_flags >> 24);
            flags = Some(version_and_flags & 0xFFFFFF);
        }

        // Read the whole payload so that the current level can be safely read
        // regardless of how the payload is parsed.
        let payload = reader.read_bytes((end - reader.get_position()) as usize)?;

        let box_ = ParsedBox {
            name: type_,
            parser: self.clone(),
            start: start + abs_start,
            size: size as usize,
            version,
            flags,
            bytes: reader.slice(start, end)?,
            reader: Reader::new(payload),
            has_64_bit_size,
        };

        definition(box_).map_err(|e| match e {
            Error::Io(x) if x.kind() == ErrorKind::UnexpectedEof => {
                err!("{} box is shorter than its fields", name)
            }
            e => e,
        })
    }
}

// CALLBACKS

/// A callback that tells the Mp4 parser to treat the body of a box as a series
/// of boxes. The number of boxes is limited by the size of the parent box.
pub fn children(mut box_: ParsedBox) -> HandlerResult {
    // The "reader" starts at the payload, so we need to add the header to the
    // start position.  The header size varies.
    let header_size = box_.header_size();

    while box_.reader.has_more_data() {
        box_.parser
            .parse_next(box_.start + header_size, &mut box_.reader)?;
    }

    Ok(())
}

/// A callback that tells the Mp4 parser to treat the body of a box as a sample
/// description. A sample description box has a fixed number of children. The
/// number of children is represented by a 4 byte unsigned integer. Each child
/// is a box.
pub fn sample_description(mut box_: ParsedBox) -> HandlerResult {
    let header_size = box_.header_size();
    let count = box_.reader.read_u32()?;

    for _ in 0..count {
        box_.parser
            .parse_next(box_.start + header_size, &mut box_.reader)?;
    }

    Ok(())
}

/// A callback that tells the Mp4 parser to treat the body of a box as a audio
/// sample entry.  A audio sample entry has some fixed-sized fields
/// describing the audio codec parameters, followed by an arbitrary number of
/// appended children.  Each child is a box.
pub fn audio_sample_entry(mut box_: ParsedBox) -> HandlerResult {
    let header_size = box_.header_size();

    // 6 bytes reserved
    // 2 bytes data reference index
    box_.reader.skip(8)?;

    // 2 bytes version
    let version = box_.reader.read_u16()?;
    // 2 bytes revision (0, could be ignored)
    // 4 bytes reserved
    box_.reader.skip(6)?;

    if version == 2 {
        // 16 bytes hard-coded values with no comments
        // 8 bytes sample rate
        // 4 bytes channel count
        // 4 bytes hard-coded values with no comments
        // 4 bytes bits per sample
        // 4 bytes lpcm flags
        // 4 bytes sample size
        // 4 bytes samples per packet
        box_.reader.skip(48)?;
    } else {
        // 2 bytes channel count
        // 2 bytes bits per sample
        // 2 bytes compression ID
        // 2 bytes packet size
        // 2 bytes sample rate
        // 2 byte reserved
        box_.reader.skip(12)?;
    }

    if version == 1 {
        // 4 bytes samples per packet
        // 4 bytes bytes per packet
        // 4 bytes bytes per frame
        // 4 bytes bytes per sample
        box_.reader.skip(16)?;
    }

    while box_.reader.has_more_data() {
        box_.parser
            .parse_next(box_.start + header_size, &mut box_.reader)?;
    }

    Ok(())
}

/// Create a callback that tells the Mp4 parser to treat the body of a box as a
/// binary blob and to parse the body's contents using the provided callback.
pub fn alldata<F>(callback: F) -> impl Fn(ParsedBox) -> HandlerResult + 'static
where
    F: Fn(Bytes) -> HandlerResult + 'static,
{
    move |mut box_| {
        let all = box_.reader.remaining();
        callback(box_.reader.read_bytes(all as usize)?)
    }
}

// UTILS

/// Convert an ascii string name to the type code for a box.
/// The name must be four characters long. `©` is accepted as the single byte
/// `0xA9` used by metadata item boxes.
pub fn type_from_string(name: &str) -> [u8; 4] {
    let code = name
        .chars()
        .map(|x| if x == '©' { 0xA9 } else { x as u8 })
        .collect::<Vec<_>>();

    assert!(code.len() == 4, "MP4 box names must be 4 characters long");
    [code[0], code[1], code[2], code[3]]
}

/// Convert a type code from a box into a printable name.
/// Useful for debugging.
pub fn type_to_string(type_: [u8; 4]) -> String {
    type_
        .iter()
        .map(|x| match x {
            0xA9 => '©',
            x if x.is_ascii_graphic() || *x == b' ' => *x as char,
            _ => '?',
        })
        .collect()
}

/// An enum used to track the type of box so that the correct values can be
/// read from the header.
#[derive(Clone, PartialEq)]
pub enum BoxType {
    BasicBox,
    FullBox,
}

/// Parsed mp4 box.
pub struct ParsedBox {
    /// The box type code (fourcc).
    pub name: [u8; 4],
    /// The parser that parsed this box. The parser can be used to parse child
    /// boxes where the configuration of the current parser is needed to parsed
    /// other boxes.
    pub parser: Mp4Parser,
    /// The start of this box (before the header) in the original buffer. This
    /// start position is the absolute position.
    pub start: u64,
    /// The size of this box (including the header).
    pub size: usize,
    /// The version for a full box, null for basic boxes.
    pub version: Option<u32>,
    /// The flags for a full box, null for basic boxes.
    pub flags: Option<u32>,
    /// The complete box, header included, as found in the original buffer.
    pub bytes: Bytes,
    /// The reader for this box is only for this box. Reading or not reading to
    /// the end will have no affect on the parser reading other sibling boxes.
    pub reader: Reader,
    /// If true, the box header had a 64-bit size field.  This affects the offsets
    /// of other fields.
    pub has_64_bit_size: bool,
}

impl ParsedBox {
    /// Find the header size of the box.
    /// Useful for modifying boxes in place or finding the exact offset of a field.
    pub fn header_size(&self) -> u64 {
        let basic_header_size = 8;
        let _64_bit_field_size = if self.has_64_bit_size { 8 } else { 0 };
        let version_and_flags_size = if self.flags.is_some() { 4 } else { 0 };
        basic_header_size + _64_bit_field_size + version_and_flags_size
    }

    pub fn name(&self) -> String {
        type_to_string(self.name)
    }
}
