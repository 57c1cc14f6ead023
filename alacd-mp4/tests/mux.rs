use alacd_mp4::{
    Error, MetaValue, Mp4Parser, Muxer, ParsedBox, Result as Mp4Result, Tags, children,
    demux::demux,
    fixture::{Fixture, Fragment},
    type_to_string,
};
use std::{cell::RefCell, error::Error as StdError, io::Cursor, rc::Rc};

type TestResult = Result<(), Box<dyn StdError>>;

#[derive(Default)]
struct Output {
    top_level: Vec<String>,
    moov: Vec<String>,
    durations: Vec<(String, u64)>,
    tkhd_flags: u32,
    sizes: Vec<u32>,
    offsets: Vec<u32>,
    stsd: Vec<u8>,
    items: Vec<String>,
    mdat: (u64, Vec<u8>),
}

fn inspect(data: Vec<u8>) -> Result<Output, Error> {
    let output = Rc::new(RefCell::new(Output::default()));

    let duration = |output: &Rc<RefCell<Output>>| {
        let output = output.clone();
        move |mut box_: ParsedBox| -> Mp4Result<()> {
            let wide = box_.version == Some(1);
            let skip = match (&box_.name, wide) {
                (b"tkhd", false) => 12,
                (b"tkhd", true) => 20,
                (_, false) => 8,
                (_, true) => 16,
            };
            box_.reader.skip(skip)?;
            let value = if wide {
                box_.reader.read_u64()?
            } else {
                box_.reader.read_u32()? as u64
            };
            output.borrow_mut().durations.push((box_.name(), value));

            if &box_.name == b"tkhd" {
                output.borrow_mut().tkhd_flags = box_.flags.unwrap_or_default();
            }
            Ok(())
        }
    };

    let top = output.clone();
    let ftyp = output.clone();
    let moov = output.clone();
    let stsz = output.clone();
    let stco = output.clone();
    let stsd = output.clone();
    let ilst = output.clone();
    let mdat = output.clone();

    Mp4Parser::new()
        .base_box("moov", move |box_| {
            top.borrow_mut().top_level.push(box_.name());
            let mut reader = box_.reader.clone();
            while reader.has_more_data() {
                let size = reader.read_u32()?;
                let kind = reader.read_fourcc()?;
                moov.borrow_mut().moov.push(type_to_string(kind));
                reader.skip(size as u64 - 8)?;
            }
            children(box_)
        })
        .base_box("trak", children)
        .base_box("mdia", children)
        .base_box("minf", children)
        .base_box("stbl", children)
        .base_box("udta", children)
        .full_box("meta", children)
        .full_box("mvhd", duration(&output))
        .full_box("tkhd", duration(&output))
        .full_box("mdhd", duration(&output))
        .full_box("stsd", move |box_| {
            stsd.borrow_mut().stsd = box_.bytes.to_vec();
            Ok(())
        })
        .full_box("stsz", move |mut box_| {
            box_.reader.skip(4)?;
            let count = box_.reader.read_u32()?;
            for _ in 0..count {
                let size = box_.reader.read_u32()?;
                stsz.borrow_mut().sizes.push(size);
            }
            Ok(())
        })
        .full_box("stco", move |mut box_| {
            let count = box_.reader.read_u32()?;
            for _ in 0..count {
                let offset = box_.reader.read_u32()?;
                stco.borrow_mut().offsets.push(offset);
            }
            Ok(())
        })
        .base_box("ilst", move |mut box_| {
            while box_.reader.has_more_data() {
                let size = box_.reader.read_u32()?;
                let kind = box_.reader.read_fourcc()?;
                let body = box_.reader.read_bytes(size as usize - 8)?;
                let name = if &kind == b"----" {
                    // mean box is 28 bytes, name box follows
                    let len = u32::from_be_bytes([body[28], body[29], body[30], body[31]]);
                    format!(
                        "----:{}",
                        String::from_utf8_lossy(&body[40..28 + len as usize])
                    )
                } else {
                    type_to_string(kind)
                };
                ilst.borrow_mut().items.push(name);
            }
            Ok(())
        })
        .base_box("ftyp", move |box_| {
            ftyp.borrow_mut().top_level.push(box_.name());
            Ok(())
        })
        .base_box("mdat", move |mut box_| {
            let remaining = box_.reader.remaining() as usize;
            let payload = box_.reader.read_bytes(remaining)?.to_vec();
            let mut output = mdat.borrow_mut();
            output.top_level.push(box_.name());
            output.mdat = (box_.start + box_.header_size(), payload);
            Ok(())
        })
        .parse(data)?;

    Ok(output.take())
}

fn decrypt(data: &[u8]) -> Vec<u8> {
    data.iter().map(|x| x ^ 0x5A).collect()
}

fn tags() -> Tags {
    Tags {
        title: "So What".to_owned(),
        album: "Kind of Blue".to_owned(),
        artist: "Miles Davis".to_owned(),
        release_date: "1959-08-17".to_owned(),
        genre: Some("Jazz".to_owned()),
        extra: vec![("SOURCE".to_owned(), MetaValue::Text("test".to_owned()))],
        track_number: 1,
        track_total: 5,
        ..Default::default()
    }
}

fn mux(fixture: &Fixture) -> Result<(Vec<u8>, Vec<u8>), Box<dyn StdError>> {
    let track = demux(fixture.build()?)?;
    let decrypted = decrypt(&fixture.payload());
    let tags = tags();
    let output = Muxer::new(&track, &tags).write(Cursor::new(vec![]), &decrypted)?;
    Ok((output.into_inner(), decrypted))
}

#[test]
fn chunk_offsets_point_at_sample_bytes() -> TestResult {
    let fixture = Fixture::default()
        .fragment(Fragment::explicit(&[11, 12, 13, 14, 15, 16, 17], 4096, None))
        .fragment(Fragment::explicit(&[21, 22, 23, 24, 25], 4096, None));

    let (data, decrypted) = mux(&fixture)?;
    let output = inspect(data.clone())?;

    assert_eq!(
        output.sizes,
        vec![11, 12, 13, 14, 15, 16, 17, 21, 22, 23, 24, 25]
    );
    assert_eq!(output.offsets.len(), 3);
    assert_eq!(output.mdat.1, decrypted);

    let mdat = output.mdat.0 as usize;
    assert_eq!(output.offsets[0] as usize, mdat);

    let mut sample = 0;
    for offset in &output.offsets {
        let offset = *offset as usize;
        let skipped = output.sizes[..sample].iter().sum::<u32>() as usize;
        assert_eq!(&data[offset..offset + 4], &decrypted[skipped..skipped + 4]);
        sample += 5;
    }

    Ok(())
}

#[test]
fn layout_drops_fragment_boxes() -> TestResult {
    let fixture = Fixture::default().fragment(Fragment::explicit(&[8; 6], 4096, None));
    let output = inspect(mux(&fixture)?.0)?;

    assert_eq!(output.top_level, vec!["ftyp", "moov", "mdat"]);
    assert_eq!(output.moov, vec!["mvhd", "trak", "udta"]);
    Ok(())
}

#[test]
fn headers_carry_total_duration() -> TestResult {
    let fixture = Fixture::default()
        .fragment(Fragment::explicit(&[8; 3], 4096, None))
        .fragment(Fragment::explicit(&[8; 2], 1024, None));

    let output = inspect(mux(&fixture)?.0)?;

    let expected = 3 * 4096 + 2 * 1024;
    assert_eq!(
        output.durations,
        vec![
            ("mvhd".to_owned(), expected),
            ("tkhd".to_owned(), expected),
            ("mdhd".to_owned(), expected),
        ]
    );
    assert_eq!(output.tkhd_flags, 7);
    Ok(())
}

#[test]
fn version_1_headers_keep_64_bit_durations() -> TestResult {
    let fixture = Fixture {
        header_version: 1,
        ..Default::default()
    }
    .fragment(Fragment::explicit(&[8; 2], 4096, None));

    let output = inspect(mux(&fixture)?.0)?;
    assert!(output.durations.iter().all(|(_, x)| *x == 8192));
    Ok(())
}

#[test]
fn sample_entry_is_rebuilt_from_codec() -> TestResult {
    let fixture = Fixture::default().fragment(Fragment::explicit(&[8], 4096, None));
    let output = inspect(mux(&fixture)?.0)?;
    let stsd = &output.stsd;

    // stsd header(12) + entry count(4), then the entry
    let entry = &stsd[16..];
    assert_eq!(&entry[4..8], b"alac");
    assert_eq!(&entry[8..16], &[0, 0, 0, 0, 0, 0, 0, 1]);
    assert_eq!(&entry[24..26], &[0, 2]);
    assert_eq!(&entry[26..28], &[0, 24]);
    assert_eq!(&entry[30..34], &48000_u32.to_be_bytes());
    assert_eq!(&entry[40..44], b"alac");
    assert_eq!(&entry[48..72], &fixture.codec.to_bytes());
    Ok(())
}

#[test]
fn metadata_items_are_written_in_order() -> TestResult {
    let fixture = Fixture::default().fragment(Fragment::explicit(&[8], 4096, None));
    let output = inspect(mux(&fixture)?.0)?;

    assert_eq!(
        output.items,
        vec![
            "©nam", "©alb", "©ART", "©wrt", "©day", "----:ISRC", "©gen", "aART", "cprt", "cpil",
            "----:LABEL", "----:UPC", "----:SOURCE", "trkn"
        ]
    );
    Ok(())
}

#[test]
fn decrypted_length_must_match() -> TestResult {
    let fixture = Fixture::default().fragment(Fragment::explicit(&[8, 8], 4096, None));
    let track = demux(fixture.build()?)?;
    let tags = tags();

    let result = Muxer::new(&track, &tags).write(Cursor::new(vec![]), &[0; 15]);
    assert!(matches!(result, Err(Error::OffsetMismatch { .. })));
    Ok(())
}
