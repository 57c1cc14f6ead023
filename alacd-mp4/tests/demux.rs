use alacd_mp4::{
    Error,
    demux::demux,
    fixture::{Entry, Fixture, Fragment, pattern},
};
use std::error::Error as StdError;

type TestResult = Result<(), Box<dyn StdError>>;

fn defaults_only(count: usize, payload: usize) -> Fragment {
    Fragment {
        runs: vec![vec![Entry::default(); count]],
        payload: pattern(payload, 0),
        mdat: true,
        ..Default::default()
    }
}

#[test]
fn explicit_entries_split_payload() -> TestResult {
    let fixture = Fixture::default()
        .fragment(Fragment::explicit(&[10, 20, 30], 4096, None))
        .fragment(Fragment::explicit(&[5, 5], 2048, None));

    let track = demux(fixture.build()?)?;

    let sizes = track.samples.iter().map(|x| x.data.len()).collect::<Vec<_>>();
    assert_eq!(sizes, vec![10, 20, 30, 5, 5]);
    assert_eq!(track.duration(), 3 * 4096 + 2 * 2048);
    assert_eq!(track.fragments, 2);
    assert_eq!(track.codec, fixture.codec);

    let joined = track
        .samples
        .iter()
        .flat_map(|x| x.data.iter().copied())
        .collect::<Vec<_>>();
    assert_eq!(joined, fixture.payload());
    Ok(())
}

#[test]
fn fragment_defaults_override_movie_defaults() -> TestResult {
    let mut fragment = defaults_only(4, 4 * 300);
    fragment.default_duration = Some(1152);
    fragment.default_size = Some(300);

    let track = demux(Fixture::default().fragment(fragment).build()?)?;

    assert_eq!(track.samples.len(), 4);
    assert!(track.samples.iter().all(|x| x.data.len() == 300));
    assert!(track.samples.iter().all(|x| x.duration == 1152));
    Ok(())
}

#[test]
fn movie_defaults_fill_missing_values() -> TestResult {
    let fixture = Fixture {
        trex: Some((4096, 64)),
        ..Default::default()
    }
    .fragment(defaults_only(3, 3 * 64));

    let track = demux(fixture.build()?)?;

    assert_eq!(track.samples.len(), 3);
    assert!(track.samples.iter().all(|x| x.data.len() == 64));
    assert!(track.samples.iter().all(|x| x.duration == 4096));
    Ok(())
}

#[test]
fn entry_values_win_over_all_defaults() -> TestResult {
    let mut fragment = Fragment {
        default_duration: Some(1),
        default_size: Some(1),
        runs: vec![vec![
            Entry {
                duration: Some(7),
                size: Some(3),
            },
            Entry {
                duration: Some(9),
                size: Some(2),
            },
        ]],
        mdat: true,
        ..Default::default()
    };
    fragment.payload = pattern(5, 0);

    let track = demux(Fixture::default().fragment(fragment).build()?)?;

    let values = track
        .samples
        .iter()
        .map(|x| (x.data.len(), x.duration))
        .collect::<Vec<_>>();
    assert_eq!(values, vec![(3, 7), (2, 9)]);
    Ok(())
}

#[test]
fn multiple_runs_share_one_payload() -> TestResult {
    let run = |sizes: &[u32]| {
        sizes
            .iter()
            .map(|x| Entry {
                duration: None,
                size: Some(*x),
            })
            .collect::<Vec<_>>()
    };

    let fragment = Fragment {
        runs: vec![run(&[4, 4]), run(&[8])],
        payload: pattern(16, 0),
        mdat: true,
        ..Default::default()
    };

    let track = demux(Fixture::default().fragment(fragment).build()?)?;
    let sizes = track.samples.iter().map(|x| x.data.len()).collect::<Vec<_>>();
    assert_eq!(sizes, vec![4, 4, 8]);
    Ok(())
}

#[test]
fn payload_one_byte_longer_is_offset_mismatch() {
    let mut fragment = Fragment::explicit(&[10, 10], 4096, None);
    fragment.payload.push(0);
    let data = Fixture::default().fragment(fragment).build().unwrap();

    match demux(data) {
        Err(Error::OffsetMismatch {
            fragment,
            payload,
            consumed,
        }) => {
            assert_eq!(fragment, 0);
            assert_eq!(payload, 21);
            assert_eq!(consumed, 20);
        }
        x => panic!("expected offset mismatch, got {:?}", x.map(|x| x.samples.len())),
    }
}

#[test]
fn payload_one_byte_shorter_is_offset_mismatch() {
    let mut fragment = Fragment::explicit(&[10, 10], 4096, None);
    fragment.payload.pop();
    let data = Fixture::default()
        .fragment(Fragment::explicit(&[3], 4096, None))
        .fragment(fragment)
        .build()
        .unwrap();

    let result = demux(data);
    assert!(matches!(
        result,
        Err(Error::OffsetMismatch {
            fragment: 1,
            payload: 19,
            consumed: 20
        })
    ));
}

#[test]
fn moof_without_mdat_is_structure_error() {
    let mut last = Fragment::explicit(&[10], 4096, None);
    last.mdat = false;

    let data = Fixture::default()
        .fragment(Fragment::explicit(&[10], 4096, None))
        .fragment(last)
        .build()
        .unwrap();

    assert!(matches!(demux(data), Err(Error::BoxStructure(_))));
}

#[test]
fn missing_trex_is_structure_error() {
    let fixture = Fixture {
        trex: None,
        ..Default::default()
    }
    .fragment(Fragment::explicit(&[10], 4096, None));

    let result = demux(fixture.build().unwrap());
    assert!(matches!(result, Err(Error::BoxStructure(x)) if x.contains("trex")));
}

#[test]
fn truncated_file_is_structure_error() {
    let mut data = Fixture::default()
        .fragment(Fragment::explicit(&[10, 10], 4096, None))
        .build()
        .unwrap();
    data.truncate(data.len() - 5);

    assert!(matches!(demux(data), Err(Error::BoxStructure(_))));
}

#[test]
fn huge_sample_count_without_entries_is_rejected() {
    let fixture = Fixture {
        trex: Some((4096, 4)),
        ..Default::default()
    }
    .fragment(defaults_only(1, 4));
    let mut data = fixture.build().unwrap();

    let trun = data
        .windows(4)
        .position(|x| x == b"trun")
        .expect("fixture has a trun box");
    data[trun + 8..trun + 12].copy_from_slice(&u32::MAX.to_be_bytes());

    match demux(data) {
        Err(Error::BoxStructure(x)) => assert!(x.contains("4294967295 samples")),
        x => panic!("expected structure error, got {:?}", x.map(|x| x.samples.len())),
    }
}

#[test]
fn descriptor_index_is_made_zero_based() -> TestResult {
    let fixture = Fixture::default()
        .fragment(Fragment::explicit(&[4], 4096, None))
        .fragment(Fragment::explicit(&[4], 4096, Some(1)))
        .fragment(Fragment::explicit(&[4], 4096, Some(2)))
        .fragment(Fragment::explicit(&[4], 4096, Some(0)));

    let track = demux(fixture.build()?)?;
    let indices = track
        .samples
        .iter()
        .map(|x| x.descriptor_index)
        .collect::<Vec<_>>();

    // absent and explicit zero stay zero
    assert_eq!(indices, vec![0, 0, 1, 0]);
    Ok(())
}

#[test]
fn template_keeps_carried_boxes_in_order() -> TestResult {
    let fixture = Fixture::default().fragment(Fragment::explicit(&[4], 4096, None));
    let track = demux(fixture.build()?)?;

    let kinds = track
        .movie
        .children
        .iter()
        .map(|x| x.kind())
        .collect::<Vec<_>>();
    assert_eq!(kinds, vec![*b"mvhd", *b"trak", *b"mvex", *b"pssh", *b"udta"]);

    let carried = track
        .movie
        .children
        .iter()
        .filter(|x| x.is_carried())
        .count();
    assert_eq!(carried, 2);
    assert_eq!(track.movie.count(b"stbl"), 1);
    assert_eq!(track.movie.count(b"hdlr"), 1);
    Ok(())
}
