use crate::{
    Error, Result, Session,
    catalog::{Album, Track},
    oracle::DecryptionChannel,
    resolver, utils,
};
use alacd_mp4::{Muxer, Tags, Track as Media, demux::demux};
use kdam::{BarExt, Column, RichProgress, term::Colorizer, tqdm};
use log::{error, info};
use reqwest::Url;
use std::{
    fs::{self, File},
    io::BufWriter,
    path::{Path, PathBuf},
};

/// What happened to one track.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrackOutcome {
    Completed(PathBuf),
    /// The output file already existed.
    Skipped(PathBuf),
}

/// Counts of an album run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AlbumReport {
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl AlbumReport {
    pub fn is_failed(&self) -> bool {
        self.failed > 0
    }
}

/// `NN. Title.m4a`
pub fn track_file_name(number: usize, title: &str) -> String {
    format!("{:02}. {}.m4a", number, utils::sanitize(title))
}

/// Rip every track of an album into `<output>/<Artist - Album>/`.
///
/// A failing track is logged and counted, the remaining tracks are still processed.
pub fn rip_album(session: &Session, album: &Album) -> Result<AlbumReport> {
    let folder = session
        .output
        .join(utils::sanitize(&album.folder_name()));
    fs::create_dir_all(&folder)?;
    info!("{}", album.folder_name().colorize("bold"));

    let total = album.tracks().len();
    let mut report = AlbumReport::default();

    for (i, track) in album.tracks().iter().enumerate() {
        info!(
            "{} {} of {}: {}",
            "Track".colorize("bold green"),
            i + 1,
            total,
            track.attributes.name
        );

        let path = folder.join(track_file_name(i + 1, &track.attributes.name));

        match process_track(session, track, &album.tags(i), &path) {
            Ok(TrackOutcome::Completed(_)) => report.completed += 1,
            Ok(TrackOutcome::Skipped(path)) => {
                info!("{} already exists", path.to_string_lossy());
                report.skipped += 1;
            }
            Err(e) => {
                error!("{}", failure_message(&track.attributes.name, &e));
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

/// Download, decrypt and rebuild one track at `path`.
pub fn process_track(
    session: &Session,
    track: &Track,
    tags: &Tags,
    path: &Path,
) -> Result<TrackOutcome> {
    if path.exists() {
        return Ok(TrackOutcome::Skipped(path.to_owned()));
    }

    let manifest = track.manifest()?;
    let base =
        Url::parse(manifest).map_err(|x| Error::ManifestFormat(format!("{} ({})", manifest, x)))?;
    let text = resolver::fetch_manifest(session, manifest)?;
    let stream = resolver::resolve(&text, &base, &session.codec)?;

    info!(
        "{} {}",
        "Downloading".colorize("bold green"),
        stream.url.as_str().colorize("cyan")
    );
    let data = session.fetcher().fetch(stream.url.as_str())?;
    info!("Downloaded {}", utils::format_bytes(data.len()));

    let media = demux(data)?;
    stream.keys.check(&media.samples)?;

    let channel = DecryptionChannel::connect(&session.oracle, track.id.as_str())?;
    let decrypted = if session.progress {
        let mut pb = progress_bar(media.samples.len());
        let decrypted = channel.decrypt_with(&media.samples, &stream.keys, |_| {
            pb.update(1)?;
            Ok(())
        })?;
        eprintln!();
        decrypted
    } else {
        channel.decrypt(&media.samples, &stream.keys)?
    };

    write_track(path, &media, tags, &decrypted)?;

    info!(
        "{} {}",
        "Saved".colorize("bold green"),
        path.to_string_lossy().colorize("cyan")
    );
    Ok(TrackOutcome::Completed(path.to_owned()))
}

/// Mux into `<path>.part` and move it to `path` once complete.
///
/// Nothing is left behind at either path when writing fails.
pub fn write_track(path: &Path, media: &Media, tags: &Tags, decrypted: &[u8]) -> Result<()> {
    let part = path.with_extension("m4a.part");
    let result = write_part(&part, media, tags, decrypted)
        .and_then(|_| fs::rename(&part, path).map_err(Error::from));

    if result.is_err() {
        let _ = fs::remove_file(&part);
    }

    result
}

fn write_part(part: &Path, media: &Media, tags: &Tags, decrypted: &[u8]) -> Result<()> {
    let writer = Muxer::new(media, tags).write(BufWriter::new(File::create(part)?), decrypted)?;
    // closed before the rename
    let file = writer.into_inner().map_err(|x| x.into_error())?;
    file.sync_all()?;
    Ok(())
}

fn failure_message(name: &str, error: &Error) -> String {
    match error {
        Error::Container(e) if e.is_corruption() => {
            format!("{}: corrupted source file ({})", name, e)
        }
        e => format!("{}: {}", name, e),
    }
}

fn progress_bar(total: usize) -> RichProgress {
    RichProgress::new(
        tqdm!(
            total = total,
            unit = " samples".to_owned(),
            dynamic_ncols = true
        ),
        vec![
            Column::Text("[bold blue]Decrypting".to_owned()),
            Column::Animation,
            Column::Percentage(1),
            Column::Text("•".to_owned()),
            Column::CountTotal,
            Column::Text("•".to_owned()),
            Column::ElapsedTime,
            Column::Text("[cyan]>".to_owned()),
            Column::RemainingTime,
        ],
    )
}
