//! Fragmented ALAC demuxer.
//!
//! Sizes and durations of samples are not stored per sample in a fragmented
//! file. Each value is resolved from the first level that carries it:
//!
//! 1. the `trun` entry, when the run flags say so,
//! 2. the `tfhd` default, when the fragment header flags say so,
//! 3. the `trex` default of the movie.

use crate::{
    CodecParams, Error, Result, bail,
    boxes::{TfhdBox, TrexBox, TrunBox},
    err,
    movie::{DurationHeader, Movie, SourceBox},
    parser::{self, Mp4Parser, ParsedBox},
};
use bytes::Bytes;
use log::debug;
use std::{cell::RefCell, rc::Rc};

/// One encoded audio frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sample {
    pub data: Bytes,
    pub duration: u32,
    /// Zero-based index into the key list of the track.
    pub descriptor_index: u32,
}

/// Everything needed to decrypt and rebuild one track.
#[derive(Clone, Debug)]
pub struct Track {
    pub codec: CodecParams,
    /// Samples in playback order.
    pub samples: Vec<Sample>,
    pub movie: Movie,
    /// Number of `moof`/`mdat` pairs the samples came from.
    pub fragments: usize,
}

impl Track {
    /// Sum of all sample durations, in media timescale units.
    pub fn duration(&self) -> u64 {
        self.samples.iter().map(|x| x.duration as u64).sum()
    }

    /// Sum of all sample sizes.
    pub fn payload_size(&self) -> usize {
        self.samples.iter().map(|x| x.data.len()).sum()
    }
}

#[derive(Default)]
struct Fragment {
    tfhd: Option<TfhdBox>,
    truns: Vec<TrunBox>,
}

#[derive(Default)]
struct State {
    codec: Vec<CodecParams>,
    trex: Vec<TrexBox>,
    movies: Vec<Movie>,
    /// Children being collected for each open container below `moov`.
    frames: Vec<Vec<SourceBox>>,
    fragments: Vec<Fragment>,
    payloads: Vec<Bytes>,
}

/// Demux a complete fragmented file.
pub fn demux(data: impl Into<Bytes>) -> Result<Track> {
    let state = Rc::new(RefCell::new(State::default()));
    parser(&state).parse(data)?;

    let State {
        codec,
        trex,
        movies,
        fragments,
        payloads,
        ..
    } = state.take();

    let codec = exactly_one(codec, "alac")?;
    let trex = exactly_one(trex, "trex")?;
    let movie = exactly_one(movies, "moov")?;
    movie.validate()?;

    if fragments.is_empty() {
        bail!("no moof box found");
    }

    if fragments.len() != payloads.len() {
        bail!(
            "found {} moof boxes but {} mdat boxes",
            fragments.len(),
            payloads.len()
        );
    }

    let mut samples = vec![];

    for (index, (fragment, payload)) in fragments.iter().zip(payloads).enumerate() {
        samples.extend(resolve_fragment(index, fragment, &trex, payload)?);
    }

    debug!(
        "demuxed {} samples from {} fragments",
        samples.len(),
        fragments.len()
    );

    Ok(Track {
        codec,
        samples,
        movie,
        fragments: fragments.len(),
    })
}

fn resolve_fragment(
    index: usize,
    fragment: &Fragment,
    trex: &TrexBox,
    mut payload: Bytes,
) -> Result<Vec<Sample>> {
    let tfhd = fragment
        .tfhd
        .as_ref()
        .ok_or_else(|| err!("moof box {} has no tfhd box", index))?;

    if fragment.truns.is_empty() {
        bail!("moof box {} has no trun box", index);
    }

    // Every sample takes at least one byte of the payload.
    let declared = fragment
        .truns
        .iter()
        .map(|x| x.sample_count as u64)
        .sum::<u64>();

    if declared > payload.len() as u64 {
        bail!(
            "moof box {} declares {} samples for {} payload bytes",
            index,
            declared,
            payload.len()
        );
    }

    let descriptor_index = tfhd.descriptor_index();
    let entries = fragment.truns.iter().flat_map(|x| {
        (0..x.sample_count as usize).map(move |i| x.sample_data.get(i))
    });

    let resolved = entries
        .map(|entry| {
            let size = entry
                .and_then(|x| x.sample_size)
                .or(tfhd.default_sample_size)
                .unwrap_or(trex.default_sample_size);
            let duration = entry
                .and_then(|x| x.sample_duration)
                .or(tfhd.default_sample_duration)
                .unwrap_or(trex.default_sample_duration);
            (size as usize, duration)
        })
        .collect::<Vec<_>>();

    let consumed = resolved.iter().map(|(size, _)| *size).sum::<usize>();

    if consumed != payload.len() {
        return Err(Error::OffsetMismatch {
            fragment: index,
            payload: payload.len(),
            consumed,
        });
    }

    Ok(resolved
        .into_iter()
        .map(|(size, duration)| Sample {
            data: payload.split_to(size),
            duration,
            descriptor_index,
        })
        .collect())
}

fn exactly_one<T>(mut values: Vec<T>, name: &str) -> Result<T> {
    match values.len() {
        1 => Ok(values.remove(0)),
        0 => Err(err!("no {} box found", name)),
        x => Err(err!("expected exactly one {} box, found {}", name, x)),
    }
}

fn parser(state: &Rc<RefCell<State>>) -> Mp4Parser {
    let moov = state.clone();
    let tkhd = state.clone();
    let mvhd = state.clone();
    let mdhd = state.clone();
    let stbl = state.clone();
    let mvex = state.clone();
    let udta = state.clone();
    let pssh = state.clone();
    let alac = state.clone();
    let trex = state.clone();
    let moof = state.clone();
    let tfhd = state.clone();
    let trun = state.clone();
    let mdat = state.clone();
    let other = state.clone();

    Mp4Parser::new()
        .base_box("moov", move |box_| {
            moov.borrow_mut().frames.push(vec![]);
            parser::children(box_)?;
            let mut state = moov.borrow_mut();
            let children = state.frames.pop().unwrap_or_default();
            state.movies.push(Movie { children });
            Ok(())
        })
        .base_box("trak", container(state))
        .base_box("mdia", container(state))
        .base_box("minf", container(state))
        .full_box("mvhd", duration_header(mvhd))
        .full_box("tkhd", duration_header(tkhd))
        .full_box("mdhd", duration_header(mdhd))
        .base_box("stbl", move |box_| {
            // Children of stbl are parsed for the codec config only.
            stbl.borrow_mut().frames.push(vec![]);
            parser::children(box_)?;
            let mut state = stbl.borrow_mut();
            state.frames.pop();
            push_source(&mut state, SourceBox::SampleTable);
            Ok(())
        })
        .full_box("stsd", parser::sample_description)
        .base_box("enca", parser::audio_sample_entry)
        .full_box("alac", move |mut box_| {
            let codec = CodecParams::new(&mut box_)?;
            alac.borrow_mut().codec.push(codec);
            Ok(())
        })
        .base_box("mvex", move |box_| {
            mvex.borrow_mut().frames.push(vec![]);
            parser::children(box_)?;
            let mut state = mvex.borrow_mut();
            state.frames.pop();
            push_source(&mut state, SourceBox::FragmentDefaults);
            Ok(())
        })
        .full_box("trex", move |mut box_| {
            let parsed = TrexBox::new(&mut box_)?;
            trex.borrow_mut().trex.push(parsed);
            Ok(())
        })
        .base_box("udta", move |_| {
            push_source(&mut udta.borrow_mut(), SourceBox::UserData);
            Ok(())
        })
        .base_box("pssh", move |_| {
            push_source(&mut pssh.borrow_mut(), SourceBox::Protection);
            Ok(())
        })
        .base_box("moof", move |box_| {
            moof.borrow_mut().fragments.push(Fragment::default());
            parser::children(box_)
        })
        .base_box("traf", parser::children)
        .full_box("tfhd", move |mut box_| {
            let parsed = TfhdBox::new(&mut box_)?;
            let mut state = tfhd.borrow_mut();
            let index = state.fragments.len();
            let fragment = state
                .fragments
                .last_mut()
                .ok_or_else(|| err!("tfhd box outside of moof"))?;

            if fragment.tfhd.is_some() {
                bail!("moof box {} has more than one tfhd box", index - 1);
            }

            fragment.tfhd = Some(parsed);
            Ok(())
        })
        .full_box("trun", move |mut box_| {
            let parsed = TrunBox::new(&mut box_)?;
            trun.borrow_mut()
                .fragments
                .last_mut()
                .ok_or_else(|| err!("trun box outside of moof"))?
                .truns
                .push(parsed);
            Ok(())
        })
        .base_box(
            "mdat",
            parser::alldata(move |data| {
                mdat.borrow_mut().payloads.push(data);
                Ok(())
            }),
        )
        .other_box(move |box_| {
            let mut state = other.borrow_mut();

            // Only boxes below moov are part of the template.
            if !state.frames.is_empty() {
                push_source(
                    &mut state,
                    SourceBox::Opaque {
                        kind: box_.name,
                        bytes: box_.bytes,
                    },
                );
            }

            Ok(())
        })
}

fn push_source(state: &mut State, source: SourceBox) {
    if let Some(frame) = state.frames.last_mut() {
        frame.push(source);
    }
}

fn container(state: &Rc<RefCell<State>>) -> impl Fn(ParsedBox) -> Result<()> + 'static {
    let state = state.clone();

    move |box_| {
        let kind = box_.name;
        state.borrow_mut().frames.push(vec![]);
        parser::children(box_)?;
        let mut state = state.borrow_mut();
        let children = state.frames.pop().unwrap_or_default();
        push_source(&mut state, SourceBox::Container { kind, children });
        Ok(())
    }
}

fn duration_header(state: Rc<RefCell<State>>) -> impl Fn(ParsedBox) -> Result<()> + 'static {
    move |box_| {
        let header = DurationHeader::new(
            box_.name,
            box_.version.unwrap_or_default(),
            box_.header_size(),
            box_.bytes.clone(),
        )?;
        push_source(&mut state.borrow_mut(), SourceBox::Header(header));
        Ok(())
    }
}
