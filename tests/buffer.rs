use ironframe::Buffer;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[test]
fn make_mut_copies_shared_storage() -> anyhow::Result<()> {
    let original = Buffer::from_vec(vec![1i32, 2, 3, 4]);
    let mut copy = original.clone();
    assert!(!copy.is_exclusive());

    copy.make_mut_slice::<i32>()[0] = 100;

    assert_eq!(original.to_vec::<i32>(), vec![1, 2, 3, 4]);
    assert_eq!(copy.to_vec::<i32>(), vec![100, 2, 3, 4]);
    assert!(copy.is_exclusive());
    assert!(original.is_exclusive());
    Ok(())
}

#[test]
fn exclusive_buffer_is_written_in_place() -> anyhow::Result<()> {
    let mut buf = Buffer::from_vec(vec![7u8; 16]);
    assert!(buf.is_mutable());
    let before = buf.as_bytes().as_ptr();
    buf.make_mut()[3] = 0;
    assert_eq!(buf.as_bytes().as_ptr(), before);
    assert_eq!(buf.as_bytes()[3], 0);
    Ok(())
}

#[test]
fn views_share_bytes_and_check_bounds() -> anyhow::Result<()> {
    let parent = Buffer::from_bytes(b"hello, world");
    let view = Buffer::view(&parent, 5, 7)?;
    assert_eq!(view.as_bytes(), b"world");
    assert!(!parent.is_exclusive());

    let nested = Buffer::view(&view, 3, 1)?;
    assert_eq!(nested.as_bytes(), b"orl");

    assert!(Buffer::view(&parent, 6, 7).is_err());
    assert!(Buffer::view(&parent, usize::MAX, 1).is_err());
    Ok(())
}

#[test]
fn resize_keeps_prefix() -> anyhow::Result<()> {
    let mut buf = Buffer::from_bytes(b"abcdef");
    buf.resize(3);
    assert_eq!(buf.as_bytes(), b"abc");
    buf.resize(5);
    assert_eq!(buf.as_bytes(), b"abc\0\0");

    let parent = Buffer::from_bytes(b"0123456789");
    let mut view = Buffer::view(&parent, 4, 2)?;
    view.resize(6);
    assert_eq!(view.as_bytes(), b"2345\0\0");
    assert_eq!(parent.as_bytes(), b"0123456789");
    Ok(())
}

#[test]
fn mmap_reads_file_and_copies_on_write() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("data.bin");
    let mut f = std::fs::File::create(&path)?;
    f.write_all(b"mapped bytes")?;
    drop(f);

    let mut buf = Buffer::mmap(&path)?;
    assert!(buf.is_mmap());
    assert!(!buf.is_mutable());
    assert_eq!(buf.as_bytes(), b"mapped bytes");

    buf.make_mut()[0] = b'M';
    assert!(!buf.is_mmap());
    assert_eq!(buf.as_bytes(), b"Mapped bytes");
    assert_eq!(std::fs::read(&path)?, b"mapped bytes");

    assert!(Buffer::mmap_with_size(&path, 3).is_err());
    assert!(Buffer::mmap(tmp.path().join("missing.bin")).is_err());
    Ok(())
}

#[test]
fn external_memory_is_released_once() -> anyhow::Result<()> {
    let data: &'static [u8] = b"foreign";
    let released = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&released);
    // SAFETY: `data` is static and never modified.
    let buf = unsafe {
        Buffer::external(data.as_ptr(), data.len(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    };
    assert!(buf.is_external());
    let view = Buffer::view(&buf, 3, 4)?;
    drop(buf);
    assert_eq!(released.load(Ordering::SeqCst), 0);
    assert_eq!(view.as_bytes(), b"ign");
    drop(view);
    assert_eq!(released.load(Ordering::SeqCst), 1);
    Ok(())
}
