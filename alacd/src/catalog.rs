//! Album metadata as served by the catalog API.

use crate::{Error, Result, Session, utils};
use alacd_mp4::Tags;
use serde::Deserialize;
use std::{fs, path::Path};

/// Source of album metadata.
pub trait Catalog {
    fn album(&self, session: &Session) -> Result<Album>;
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    pub id: String,
    #[serde(default)]
    pub attributes: AlbumAttributes,
    #[serde(default)]
    pub relationships: Relationships,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AlbumAttributes {
    pub artist_name: String,
    pub name: String,
    pub release_date: String,
    pub record_label: String,
    pub upc: String,
    pub copyright: String,
    pub is_compilation: bool,
    pub genre_names: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Relationships {
    pub tracks: TrackList,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct TrackList {
    pub data: Vec<Track>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    #[serde(default)]
    pub attributes: TrackAttributes,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrackAttributes {
    pub name: String,
    pub artist_name: String,
    pub composer_name: String,
    pub isrc: String,
    pub genre_names: Vec<String>,
    pub extended_asset_urls: AssetUrls,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AssetUrls {
    pub enhanced_hls: Option<String>,
}

#[derive(Deserialize)]
struct Document {
    data: Vec<Album>,
}

impl Album {
    pub fn tracks(&self) -> &[Track] {
        &self.relationships.tracks.data
    }

    /// `Artist - Album`, before sanitizing.
    pub fn folder_name(&self) -> String {
        format!("{} - {}", self.attributes.artist_name, self.attributes.name)
    }

    /// Tags of the track at `index`, numbered from one in album order.
    pub fn tags(&self, index: usize) -> Tags {
        let track = &self.tracks()[index].attributes;
        let album = &self.attributes;

        Tags {
            title: track.name.clone(),
            album: album.name.clone(),
            artist: track.artist_name.clone(),
            composer: track.composer_name.clone(),
            release_date: album.release_date.clone(),
            isrc: track.isrc.clone(),
            genre: track.genre_names.first().cloned(),
            album_artist: album.artist_name.clone(),
            copyright: album.copyright.clone(),
            compilation: album.is_compilation,
            label: album.record_label.clone(),
            upc: album.upc.clone(),
            extra: vec![],
            track_number: index as u32 + 1,
            track_total: self.tracks().len() as u16,
        }
    }
}

impl Track {
    /// Master playlist of the lossless stream.
    pub fn manifest(&self) -> Result<&str> {
        self.attributes
            .extended_asset_urls
            .enhanced_hls
            .as_deref()
            .filter(|x| !x.is_empty())
            .ok_or_else(|| Error::MissingAsset(self.attributes.name.clone()))
    }
}

/// Album document read from a local file or requested from a URL.
pub struct JsonCatalog {
    source: String,
}

impl JsonCatalog {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Parse a `{"data": [album]}` document.
    pub fn parse(text: &str) -> Result<Album> {
        let document = serde_json::from_str::<Document>(text)
            .map_err(|x| Error::Catalog(x.to_string()))?;

        document
            .data
            .into_iter()
            .next()
            .ok_or_else(|| Error::Catalog("document has no album".to_owned()))
    }
}

impl Catalog for JsonCatalog {
    fn album(&self, session: &Session) -> Result<Album> {
        let text = if self.source.starts_with("http://") || self.source.starts_with("https://")
        {
            session
                .catalog_request(&self.source)
                .send()
                .and_then(|x| x.error_for_status())
                .and_then(|x| x.text())
                .map_err(|x| Error::Fetch(utils::describe(&x)))?
        } else {
            fs::read_to_string(Path::new(&self.source))?
        };

        Self::parse(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alacd_mp4::MetaValue;

    const DOCUMENT: &str = r#"{
        "data": [{
            "id": "268443092",
            "type": "albums",
            "attributes": {
                "artistName": "Miles Davis",
                "name": "Kind of Blue",
                "releaseDate": "1959-08-17",
                "recordLabel": "Columbia",
                "upc": "074646793524",
                "copyright": "(P) 1959 Columbia Records",
                "isCompilation": false,
                "genreNames": ["Jazz", "Music"],
                "trackCount": 2
            },
            "relationships": {
                "tracks": {
                    "data": [
                        {
                            "id": "268443097",
                            "attributes": {
                                "name": "So What",
                                "artistName": "Miles Davis",
                                "composerName": "Miles Davis",
                                "isrc": "USSM15900113",
                                "genreNames": ["Jazz"],
                                "extendedAssetUrls": {
                                    "enhancedHls": "https://aod.example.com/so-what/main.m3u8"
                                }
                            }
                        },
                        {
                            "id": "268443098",
                            "attributes": {
                                "name": "Freddie Freeloader",
                                "artistName": "Miles Davis",
                                "genreNames": []
                            }
                        }
                    ]
                }
            }
        }]
    }"#;

    #[test]
    fn tags_mix_album_and_track_fields() {
        let album = JsonCatalog::parse(DOCUMENT).unwrap();
        let tags = album.tags(0);

        assert_eq!(album.folder_name(), "Miles Davis - Kind of Blue");
        assert_eq!(tags.title, "So What");
        assert_eq!(tags.album, "Kind of Blue");
        assert_eq!(tags.year(), "1959");
        assert_eq!(tags.genre.as_deref(), Some("Jazz"));
        assert_eq!(tags.label, "Columbia");
        assert_eq!((tags.track_number, tags.track_total), (1, 2));
        assert!(
            tags.items()
                .iter()
                .any(|(_, x)| *x == MetaValue::Text("USSM15900113".to_owned()))
        );
    }

    #[test]
    fn missing_asset() {
        let album = JsonCatalog::parse(DOCUMENT).unwrap();

        assert_eq!(
            album.tracks()[0].manifest().unwrap(),
            "https://aod.example.com/so-what/main.m3u8"
        );
        assert!(matches!(
            album.tracks()[1].manifest(),
            Err(Error::MissingAsset(x)) if x == "Freddie Freeloader"
        ));
        assert_eq!(album.tags(1).genre, None);
    }

    #[test]
    fn empty_document() {
        assert!(matches!(
            JsonCatalog::parse(r#"{"data": []}"#),
            Err(Error::Catalog(_))
        ));
        assert!(matches!(
            JsonCatalog::parse("not json"),
            Err(Error::Catalog(_))
        ));
    }
}
