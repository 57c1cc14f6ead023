use crate::{Error, Result, Session, utils};
use alacd_mp4::Sample;
use log::{debug, info};
use m3u8_rs::{Playlist, VariantStream};
use regex::Regex;
use reqwest::Url;
use std::cmp::Reverse;

/// Key identifier the oracle holds before any manifest key is requested.
pub const PREFETCH_KEY: &str = "skd://itunes.apple.com/P000000000/s1/e1";

/// Track id sent alongside [`PREFETCH_KEY`].
pub const PREFETCH_TRACK_ID: &str = "0";

/// Ordered key identifiers addressed by sample descriptor index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyIndex {
    keys: Vec<String>,
}

impl KeyIndex {
    /// Build an index whose first entry is always the prefetch key.
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: std::iter::once(PREFETCH_KEY.to_owned())
                .chain(keys.into_iter().map(Into::into))
                .collect(),
        }
    }

    pub fn get(&self, index: u32) -> Option<&str> {
        self.keys.get(index as usize).map(|x| x.as_str())
    }

    /// Never zero, the prefetch key is always present.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(|x| x.as_str())
    }

    /// Every sample must address a known key.
    pub fn check(&self, samples: &[Sample]) -> Result<()> {
        for (i, sample) in samples.iter().enumerate() {
            if sample.descriptor_index as usize >= self.keys.len() {
                return Err(Error::KeyIndexOutOfRange {
                    sample: i,
                    index: sample.descriptor_index,
                    len: self.keys.len(),
                });
            }
        }

        Ok(())
    }
}

/// Where the container of a track lives and which keys decrypt it.
#[derive(Clone, Debug)]
pub struct ResolvedStream {
    pub url: Url,
    pub keys: KeyIndex,
    pub bandwidth: u64,
    pub bit_depth: Option<String>,
    pub sample_rate: Option<String>,
}

/// Pick the highest bandwidth variant of `codec` from a master playlist.
pub fn resolve(text: &str, base: &Url, codec: &str) -> Result<ResolvedStream> {
    let playlist = m3u8_rs::parse_playlist_res(text.as_bytes())
        .map_err(|_| Error::ManifestFormat(base.to_string()))?;

    let mut variants = match playlist {
        Playlist::MasterPlaylist(master) => master.variants,
        Playlist::MediaPlaylist(_) => return Err(Error::ManifestFormat(base.to_string())),
    };

    variants.retain(|x| !x.is_i_frame);
    variants.sort_by_key(|x| Reverse(bandwidth(x)));

    let variant = variants
        .iter()
        .find(|x| x.codecs.as_deref() == Some(codec))
        .ok_or_else(|| Error::CodecUnavailable(codec.to_owned()))?;

    let (bit_depth, sample_rate) = audio_format(variant);

    if let (Some(bit_depth), Some(sample_rate)) = (&bit_depth, &sample_rate) {
        info!("{}-bit / {} Hz", bit_depth, sample_rate);
    }

    let mut url = base
        .join(&variant.uri)
        .map_err(|x| Error::ManifestFormat(format!("{} ({})", variant.uri, x)))?;
    let path = url.path().to_owned();
    url.set_path(&format!(
        "{}_m.mp4",
        path.strip_suffix(".m3u8").unwrap_or(&path)
    ));

    let keys = KeyIndex::new(scan_keys(text));
    debug!("resolved {} with {} keys", url, keys.len());

    Ok(ResolvedStream {
        url,
        keys,
        bandwidth: bandwidth(variant),
        bit_depth,
        sample_rate,
    })
}

/// Download the manifest text.
pub fn fetch_manifest(session: &Session, url: &str) -> Result<String> {
    session
        .client
        .get(url)
        .send()
        .and_then(|x| x.error_for_status())
        .and_then(|x| x.text())
        .map_err(|x| Error::Fetch(utils::describe(&x)))
}

fn bandwidth(variant: &VariantStream) -> u64 {
    variant.average_bandwidth.unwrap_or(variant.bandwidth)
}

/// Bit depth and sample rate are the last two parts of the audio group id.
fn audio_format(variant: &VariantStream) -> (Option<String>, Option<String>) {
    let Some(group) = &variant.audio else {
        return (None, None);
    };

    let parts = group.split('-').collect::<Vec<_>>();

    if parts.len() < 3 {
        return (None, None);
    }

    (
        Some(parts[parts.len() - 1].to_owned()),
        Some(parts[parts.len() - 2].to_owned()),
    )
}

fn scan_keys(text: &str) -> Vec<String> {
    let re = Regex::new(r#""(skd?://[^"]*)""#).unwrap();

    re.captures_iter(text)
        .filter_map(|x| x.get(1))
        .map(|x| x.as_str())
        .filter(|x| x.ends_with("c23") || x.ends_with("c6"))
        .map(|x| x.to_owned())
        .collect()
}
