#![cfg(feature = "io-jay")]

use ironframe::error::{ErrorKind, error_kind};
use ironframe::io::jay::{JayMeta, JayMetaDecoder, PostcardMetaDecoder, is_jay, jay_bytes, open_jay};
use ironframe::io::{BytesSource, FileSource};
use ironframe::testing::{assert_frames_equal, grouped_frame};
use ironframe::{Buffer, Column, Frame, RowIndex, SType, Session, read_jay, write_jay};
use std::cell::Cell;

fn mixed_frame() -> anyhow::Result<Frame> {
    Frame::from_pairs([
        ("i8", Column::from_options(&[Some(1i8), None, Some(-3)])),
        ("i64", Column::from_slice(&[1i64 << 40, -7, 0])),
        ("f32", Column::from_options(&[Some(0.25f32), Some(-1.0), None])),
        ("f64", Column::from_slice(&[f64::INFINITY, 2.5, -0.0])),
        ("flag", Column::from_options(&[Some(true), None, Some(false)])),
        ("text", Column::from_strs(&[Some("héllo"), None, Some("")])),
        ("void", Column::new_na(SType::Void, 3)),
    ])
}

/// Decoder that counts how often it is asked to decode.
#[derive(Default)]
struct CountingDecoder {
    calls: Cell<usize>,
}

impl JayMetaDecoder for CountingDecoder {
    fn decode(&self, bytes: &[u8]) -> anyhow::Result<JayMeta> {
        self.calls.set(self.calls.get() + 1);
        PostcardMetaDecoder.decode(bytes)
    }
}

#[test]
fn write_then_read_file() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("nested").join("frame.jay");
    let frame = mixed_frame()?;
    write_jay(&frame, &path)?;

    let bytes = std::fs::read(&path)?;
    assert!(bytes.starts_with(b"JAY1\0\0\0\0"));
    assert!(bytes.ends_with(b"\0\0\0\0JAY1"));
    assert!(is_jay(&bytes));

    let back = read_jay(&Buffer::mmap(&path)?)?;
    assert_frames_equal(&back, &frame);

    let via_session = Session::default().read(&FileSource::new(&path))?;
    assert_frames_equal(&via_session, &frame);
    Ok(())
}

#[test]
fn virtual_columns_are_materialized_on_write() -> anyhow::Result<()> {
    let frame = grouped_frame().apply_rowindex(&RowIndex::slice(5, 3, -2)?)?;
    let bytes = jay_bytes(&frame)?;
    let back = read_jay(&Buffer::from_bytes(&bytes))?;
    assert_eq!(back.nrows(), 3);
    assert_frames_equal(&back, &frame);
    assert!(back.columns().iter().all(|c| !c.is_virtual()));
    Ok(())
}

#[test]
fn columns_are_views_of_the_input() -> anyhow::Result<()> {
    let bytes = jay_bytes(&mixed_frame()?)?;
    let buffer = Buffer::from_bytes(&bytes);
    let frame = read_jay(&buffer)?;
    assert!(!buffer.is_exclusive());
    drop(frame);
    assert!(buffer.is_exclusive());
    Ok(())
}

#[test]
fn bad_signatures_fail_before_metadata_is_decoded() -> anyhow::Result<()> {
    let valid = jay_bytes(&mixed_frame()?)?;

    let mut legacy = valid.clone();
    legacy[3] = b'0';
    let n = legacy.len();
    legacy[n - 1] = b'0';

    let mut foreign = vec![b'x'; 64];
    foreign[..4].copy_from_slice(b"PAR1");

    let cases: [(&[u8], &str); 3] = [
        (legacy.as_slice(), "legacy"),
        (foreign.as_slice(), "signature"),
        (b"JAY1", "smaller than"),
    ];
    for (bytes, needle) in cases {
        let decoder = CountingDecoder::default();
        let err = open_jay(&Buffer::from_bytes(bytes), &decoder).unwrap_err();
        assert_eq!(error_kind(&err), Some(ErrorKind::Io));
        assert!(format!("{err:#}").contains(needle), "{err:#}");
        assert_eq!(decoder.calls.get(), 0);
    }

    let decoder = CountingDecoder::default();
    open_jay(&Buffer::from_bytes(&valid), &decoder)?;
    assert_eq!(decoder.calls.get(), 1);
    Ok(())
}

#[test]
fn corrupt_metadata_is_rejected() -> anyhow::Result<()> {
    let valid = jay_bytes(&mixed_frame()?)?;
    let n = valid.len();

    let mut oversized = valid.clone();
    oversized[n - 16..n - 8].copy_from_slice(&u64::MAX.to_le_bytes());
    let err = read_jay(&Buffer::from_bytes(&oversized)).unwrap_err();
    assert_eq!(error_kind(&err), Some(ErrorKind::Io));

    let mut header_only = b"JAY1\0\0\0\0".to_vec();
    header_only.extend_from_slice(&0u64.to_le_bytes());
    header_only.extend_from_slice(b"\0\0\0\0JAY1");
    let err = read_jay(&Buffer::from_bytes(&header_only)).unwrap_err();
    assert_eq!(error_kind(&err), Some(ErrorKind::Io));
    Ok(())
}

#[test]
fn director_detects_jay_bytes() -> anyhow::Result<()> {
    let frame = mixed_frame()?;
    let source = BytesSource::new("memory", Buffer::from_bytes(&jay_bytes(&frame)?));
    let back = Session::default().read(&source)?;
    assert_frames_equal(&back, &frame);
    Ok(())
}
