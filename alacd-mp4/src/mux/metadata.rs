//! iTunes style metadata atoms.

use crate::{BoxWriter, Error, Result, parser::type_from_string};
use serde_json::Value;
use std::io::{Seek, Write};

const FREEFORM_MEAN: &str = "com.apple.iTunes";

/// Value of one metadata item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MetaValue {
    Text(String),
    Integer(i64),
    Binary(Vec<u8>),
}

impl MetaValue {
    /// Well-known type code of the `data` atom.
    pub fn type_code(&self) -> u32 {
        match self {
            Self::Text(_) => 1,
            Self::Integer(_) => 21,
            Self::Binary(_) => 0,
        }
    }

    /// Value as stored in the `data` atom.
    ///
    /// Integers take the fewest of 1, 2, 4 or 8 bytes that hold them.
    pub fn payload(&self) -> Vec<u8> {
        match self {
            Self::Text(x) => x.as_bytes().to_vec(),
            Self::Binary(x) => x.clone(),
            Self::Integer(x) => {
                if let Ok(x) = i8::try_from(*x) {
                    x.to_be_bytes().to_vec()
                } else if let Ok(x) = i16::try_from(*x) {
                    x.to_be_bytes().to_vec()
                } else if let Ok(x) = i32::try_from(*x) {
                    x.to_be_bytes().to_vec()
                } else {
                    x.to_be_bytes().to_vec()
                }
            }
        }
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for MetaValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for MetaValue {
    fn from(value: bool) -> Self {
        Self::Integer(value as i64)
    }
}

impl TryFrom<Value> for MetaValue {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::String(x) => Ok(Self::Text(x)),
            Value::Bool(x) => Ok(x.into()),
            Value::Number(x) => x
                .as_i64()
                .map(Self::Integer)
                .ok_or_else(|| Error::UnsupportedMetadataType(format!("number {}", x))),
            Value::Array(items) => items
                .iter()
                .map(|x| x.as_u64().and_then(|x| u8::try_from(x).ok()))
                .collect::<Option<Vec<_>>>()
                .map(Self::Binary)
                .ok_or_else(|| {
                    Error::UnsupportedMetadataType("array of non byte values".to_owned())
                }),
            Value::Null => Err(Error::UnsupportedMetadataType("null".to_owned())),
            Value::Object(_) => Err(Error::UnsupportedMetadataType("object".to_owned())),
        }
    }
}

/// Metadata of one output track.
#[derive(Clone, Debug, Default)]
pub struct Tags {
    pub title: String,
    pub album: String,
    pub artist: String,
    pub composer: String,
    /// ISO date, only the year is written.
    pub release_date: String,
    pub isrc: String,
    pub genre: Option<String>,
    pub album_artist: String,
    pub copyright: String,
    pub compilation: bool,
    pub label: String,
    pub upc: String,
    /// Additional freeform entries, written after `UPC`.
    pub extra: Vec<(String, MetaValue)>,
    /// One-based.
    pub track_number: u32,
    pub track_total: u16,
}

/// Key of an `ilst` item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ItemKey {
    Atom([u8; 4]),
    /// `----` item with a `com.apple.iTunes` mean.
    Freeform(String),
}

impl Tags {
    pub fn year(&self) -> &str {
        self.release_date.split('-').next().unwrap_or_default()
    }

    /// Items in the order they are written.
    pub fn items(&self) -> Vec<(ItemKey, MetaValue)> {
        let atom = |name: &str| ItemKey::Atom(type_from_string(name));
        let freeform = |name: &str| ItemKey::Freeform(name.to_owned());

        let mut items: Vec<(ItemKey, MetaValue)> = vec![
            (atom("©nam"), self.title.as_str().into()),
            (atom("©alb"), self.album.as_str().into()),
            (atom("©ART"), self.artist.as_str().into()),
            (atom("©wrt"), self.composer.as_str().into()),
            (atom("©day"), self.year().into()),
            (freeform("ISRC"), self.isrc.as_str().into()),
        ];

        if let Some(genre) = &self.genre {
            items.push((atom("©gen"), genre.as_str().into()));
        }

        items.extend([
            (atom("aART"), self.album_artist.as_str().into()),
            (atom("cprt"), self.copyright.as_str().into()),
            (atom("cpil"), self.compilation.into()),
            (freeform("LABEL"), self.label.as_str().into()),
            (freeform("UPC"), self.upc.as_str().into()),
        ]);

        items.extend(
            self.extra
                .iter()
                .map(|(name, value)| (freeform(name), value.clone())),
        );

        let mut trkn = self.track_number.to_be_bytes().to_vec();
        trkn.extend_from_slice(&self.track_total.to_be_bytes());
        trkn.extend_from_slice(&[0, 0]);
        items.push((atom("trkn"), MetaValue::Binary(trkn)));
        items
    }
}

/// Write `udta/meta/hdlr + ilst`.
pub(crate) fn write_udta<W: Write + Seek>(writer: &mut BoxWriter<W>, tags: &Tags) -> Result<()> {
    writer.start_box(b"udta")?;
    writer.start_full_box(b"meta", 0, 0)?;

    writer.start_full_box(b"hdlr", 0, 0)?;
    // pre_defined
    writer.write_u32(0)?;
    writer.write_all(b"mdir")?;
    writer.write_all(b"appl")?;
    writer.write_all(&[0; 8])?;
    // empty name
    writer.write_u8(0)?;
    writer.end_box()?;

    writer.start_box(b"ilst")?;

    for (key, value) in tags.items() {
        match key {
            ItemKey::Atom(kind) => {
                writer.start_box(&kind)?;
                write_data(writer, &value)?;
                writer.end_box()?;
            }
            ItemKey::Freeform(name) => {
                writer.start_box(b"----")?;
                writer.write_box(b"mean", &[&[0_u8; 4][..], FREEFORM_MEAN.as_bytes()].concat())?;
                writer.write_box(b"name", &[&[0_u8; 4][..], name.as_bytes()].concat())?;
                write_data(writer, &value)?;
                writer.end_box()?;
            }
        }
    }

    writer.end_box()?;
    writer.end_box()?;
    writer.end_box()?;
    Ok(())
}

fn write_data<W: Write + Seek>(writer: &mut BoxWriter<W>, value: &MetaValue) -> Result<()> {
    writer.start_box(b"data")?;
    writer.write_u32(value.type_code())?;
    // locale
    writer.write_u32(0)?;
    writer.write_all(&value.payload())?;
    writer.end_box()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Cursor;

    #[test]
    fn json_values_map_to_closed_set() {
        assert_eq!(
            MetaValue::try_from(json!("Kind of Blue")).unwrap(),
            MetaValue::Text("Kind of Blue".to_owned())
        );
        assert_eq!(
            MetaValue::try_from(json!(true)).unwrap(),
            MetaValue::Integer(1)
        );
        assert_eq!(
            MetaValue::try_from(json!(-7)).unwrap(),
            MetaValue::Integer(-7)
        );
        assert_eq!(
            MetaValue::try_from(json!([1, 2, 255])).unwrap(),
            MetaValue::Binary(vec![1, 2, 255])
        );
    }

    #[test]
    fn unsupported_values_are_errors() {
        for value in [json!(1.5), json!(null), json!({"a": 1}), json!([256]), json!(["x"])] {
            assert!(matches!(
                MetaValue::try_from(value),
                Err(Error::UnsupportedMetadataType(_))
            ));
        }
    }

    #[test]
    fn integers_use_smallest_width() {
        assert_eq!(MetaValue::Integer(1).payload(), vec![1]);
        assert_eq!(MetaValue::Integer(300).payload(), vec![1, 44]);
        assert_eq!(MetaValue::Integer(70000).payload().len(), 4);
        assert_eq!(MetaValue::Integer(1 << 40).payload().len(), 8);
    }

    #[test]
    fn items_follow_fixed_order() {
        let tags = Tags {
            release_date: "1959-08-17".to_owned(),
            genre: Some("Jazz".to_owned()),
            extra: vec![("MOOD".to_owned(), MetaValue::Text("cool".to_owned()))],
            track_number: 2,
            track_total: 5,
            ..Default::default()
        };

        let items = tags.items();
        let keys = items
            .iter()
            .map(|(key, _)| match key {
                ItemKey::Atom(x) => crate::type_to_string(*x),
                ItemKey::Freeform(x) => format!("----:{}", x),
            })
            .collect::<Vec<_>>();

        assert_eq!(
            keys,
            vec![
                "©nam", "©alb", "©ART", "©wrt", "©day", "----:ISRC", "©gen", "aART", "cprt",
                "cpil", "----:LABEL", "----:UPC", "----:MOOD", "trkn"
            ]
        );
        assert_eq!(items[4].1, MetaValue::Text("1959".to_owned()));
        assert_eq!(
            items.last().unwrap().1,
            MetaValue::Binary(vec![0, 0, 0, 2, 0, 5, 0, 0])
        );
    }

    #[test]
    fn missing_genre_is_skipped() {
        let items = Tags::default().items();
        assert_eq!(items.len(), 12);
    }

    #[test]
    fn freeform_item_layout() {
        let tags = Tags {
            isrc: "USSM15900113".to_owned(),
            ..Default::default()
        };

        let mut writer = BoxWriter::new(Cursor::new(vec![]));
        write_udta(&mut writer, &tags).unwrap();
        let data = writer.into_inner().into_inner();

        let needle = b"mean\0\0\0\0com.apple.iTunes";
        let mean = data
            .windows(needle.len())
            .position(|x| x == needle)
            .unwrap();
        let name = &data[mean + needle.len() + 4..][..12];
        assert_eq!(name, b"name\0\0\0\0ISRC");
        let value = &data[mean + needle.len() + 16 + 4..][..24];
        assert_eq!(&value[..12], &[b'd', b'a', b't', b'a', 0, 0, 0, 1, 0, 0, 0, 0]);
        assert_eq!(&value[12..], b"USSM15900113");
    }
}
