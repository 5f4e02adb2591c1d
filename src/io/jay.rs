//! Jay binary container.
//!
//! ```text
//! "JAY1\0\0\0\0" | column buffers (8-aligned) | metadata | meta_size: u64 LE | "\0\0\0\0JAY1"
//! ```
//!
//! Column buffers are addressed by `(offset, length)` pairs stored in the
//! metadata block. Opening a file never copies column data: every buffer is
//! a [`Buffer::view`] onto the input, which is typically memory-mapped.
//!
//! The signature is validated before anything else is read. Decoding the
//! metadata block is delegated to a [`JayMetaDecoder`];
//! [`PostcardMetaDecoder`] reads the format produced by [`write_jay`].

use crate::buffer::Buffer;
use crate::column::{Column, FixedColumn, StringColumn};
use crate::error::FrameError;
use crate::frame::Frame;
use crate::stype::SType;
use crate::utils::align_up;
use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs::{File, create_dir_all};
use std::io::Write;
use std::path::Path;

const MAGIC: &[u8; 4] = b"JAY1";
const HEADER: &[u8; 8] = b"JAY1\0\0\0\0";
const FOOTER: &[u8; 8] = b"\0\0\0\0JAY1";
const LEGACY_MAGIC: &[u8; 3] = b"JAY";
/// Header, meta size and footer.
const MIN_SIZE: usize = 24;

/// Location of one column buffer within the file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JayBufferRef {
    pub offset: u64,
    pub length: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JayColumnMeta {
    pub name: String,
    pub stype: SType,
    /// Data buffer for fixed-width columns; offsets then character data for
    /// string columns; none for `Void`.
    pub buffers: Vec<JayBufferRef>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JayMeta {
    pub nrows: u64,
    pub columns: Vec<JayColumnMeta>,
}

/// Decodes the metadata block of a Jay file.
pub trait JayMetaDecoder {
    /// # Errors
    /// When `bytes` is not a valid metadata block.
    fn decode(&self, bytes: &[u8]) -> Result<JayMeta>;
}

/// Metadata stored with `postcard`, as written by [`write_jay`].
#[derive(Clone, Copy, Debug, Default)]
pub struct PostcardMetaDecoder;

impl JayMetaDecoder for PostcardMetaDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<JayMeta> {
        postcard::from_bytes(bytes)
            .map_err(|e| FrameError::io(format!("corrupted Jay metadata: {e}")).into())
    }
}

/// Whether `data` carries a Jay signature (current or legacy).
#[must_use]
pub fn is_jay(data: &[u8]) -> bool {
    data.len() >= HEADER.len()
        && (data.starts_with(MAGIC)
            || data.ends_with(MAGIC)
            || (data.starts_with(LEGACY_MAGIC) && data.ends_with(LEGACY_MAGIC)))
}

fn check_signature(data: &[u8]) -> Result<()> {
    let len = data.len();
    if len < HEADER.len() {
        return Err(FrameError::io(format!(
            "invalid Jay file: {len} bytes is smaller than the {}-byte header",
            HEADER.len()
        ))
        .into());
    }
    let head = &data[..MAGIC.len()];
    let tail = &data[len - MAGIC.len()..];
    if head == MAGIC && tail == MAGIC {
        return Ok(());
    }
    if (head.starts_with(LEGACY_MAGIC) && head != MAGIC) || data.ends_with(LEGACY_MAGIC) {
        return Err(FrameError::io("Jay file of an unsupported legacy version").into());
    }
    Err(FrameError::io(format!(
        "invalid Jay signature: starts with {head:?}, ends with {tail:?}"
    ))
    .into())
}

fn to_usize(v: u64) -> usize {
    usize::try_from(v).unwrap_or(usize::MAX)
}

/// Open the Jay file held in `buffer`, decoding its metadata with `decoder`.
///
/// # Errors
/// I/O error for bad signatures, truncated files, and metadata or buffer
/// ranges outside of the file; errors from `decoder`; type or value errors
/// for buffers inconsistent with their column type.
pub fn open_jay(buffer: &Buffer, decoder: &dyn JayMetaDecoder) -> Result<Frame> {
    let data = buffer.as_bytes();
    check_signature(data)?;
    let len = data.len();
    if len < MIN_SIZE {
        return Err(FrameError::io(format!(
            "truncated Jay file: {len} bytes, at least {MIN_SIZE} expected"
        ))
        .into());
    }
    let meta_end = len - 16;
    let mut size_bytes = [0u8; 8];
    size_bytes.copy_from_slice(&data[meta_end..meta_end + 8]);
    let meta_size = u64::from_le_bytes(size_bytes);
    let room = meta_end - HEADER.len();
    if meta_size > room as u64 {
        return Err(FrameError::io(format!(
            "Jay metadata size {meta_size} exceeds the {room} bytes available in a file of {len} bytes"
        ))
        .into());
    }
    let meta_start = meta_end - to_usize(meta_size);
    let meta = decoder.decode(&data[meta_start..meta_end])?;
    let nrows = to_usize(meta.nrows);
    debug!("opened Jay file: {} rows, {} columns, {len} bytes", nrows, meta.columns.len());

    let mut names = Vec::with_capacity(meta.columns.len());
    let mut columns = Vec::with_capacity(meta.columns.len());
    for cm in meta.columns {
        let views = cm
            .buffers
            .iter()
            .map(|r| -> Result<Buffer> {
                let start = to_usize(r.offset);
                let end = start.checked_add(to_usize(r.length));
                if start < HEADER.len() || end.is_none_or(|e| e > meta_start) {
                    return Err(FrameError::io(format!(
                        "buffer [{}, +{}) of column {:?} lies outside the data region [{}, {meta_start}) of a {len}-byte file",
                        r.offset,
                        r.length,
                        cm.name,
                        HEADER.len()
                    ))
                    .into());
                }
                Buffer::view(buffer, to_usize(r.length), start)
            })
            .collect::<Result<Vec<_>>>()?;
        let column = column_from_buffers(cm.stype, nrows, views)
            .with_context(|| format!("Jay column {:?}", cm.name))?;
        names.push(cm.name);
        columns.push(column);
    }
    Frame::new(names, columns)
}

fn column_from_buffers(stype: SType, nrows: usize, mut views: Vec<Buffer>) -> Result<Column> {
    let expected = match stype {
        SType::Void => 0,
        SType::Str32 | SType::Str64 => 2,
        _ => 1,
    };
    if views.len() != expected {
        return Err(FrameError::io(format!(
            "{stype} column declares {} buffers, {expected} expected",
            views.len()
        ))
        .into());
    }
    Ok(match stype {
        SType::Void => Column::new_na(SType::Void, nrows),
        SType::Str32 | SType::Str64 => {
            let strdata = views.pop().unwrap_or_default();
            let offsets = views.pop().unwrap_or_default();
            Column::new(StringColumn::new(stype, nrows, offsets, strdata)?)
        }
        _ => FixedColumn::new(stype, nrows, views.pop().unwrap_or_default())?.into(),
    })
}

/// Open a Jay file written by [`write_jay`].
///
/// # Errors
/// See [`open_jay`].
pub fn read_jay(buffer: &Buffer) -> Result<Frame> {
    open_jay(buffer, &PostcardMetaDecoder)
}

/// Serialize `frame` into the bytes of a Jay file.
///
/// # Errors
/// When the metadata cannot be encoded.
pub fn jay_bytes(frame: &Frame) -> Result<Vec<u8>> {
    let mut out = HEADER.to_vec();
    let mut columns = Vec::with_capacity(frame.ncols());
    for (name, col) in frame.names().iter().zip(frame.columns()) {
        let col = col.materialize_to_buffers();
        let buffers = (0..col.num_buffers())
            .filter_map(|i| col.get_buffer(i))
            .map(|b| {
                let offset = out.len() as u64;
                out.extend_from_slice(b.as_bytes());
                out.resize(align_up(out.len(), 8), 0);
                JayBufferRef {
                    offset,
                    length: b.size() as u64,
                }
            })
            .collect();
        columns.push(JayColumnMeta {
            name: name.clone(),
            stype: col.stype(),
            buffers,
        });
    }
    let meta = JayMeta {
        nrows: frame.nrows() as u64,
        columns,
    };
    let meta = postcard::to_allocvec(&meta).context("encode Jay metadata")?;
    out.extend_from_slice(&meta);
    out.extend_from_slice(&(meta.len() as u64).to_le_bytes());
    out.extend_from_slice(FOOTER);
    Ok(out)
}

/// Write `frame` to `path` as a Jay file, creating parent directories.
///
/// # Errors
/// On I/O failures.
pub fn write_jay(frame: &Frame, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;
    }
    let bytes = jay_bytes(frame)?;
    let mut f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    f.write_all(&bytes)
        .and_then(|()| f.flush())
        .map_err(FrameError::from)
        .with_context(|| format!("write {}", path.display()))?;
    debug!("wrote Jay file {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, error_kind};

    #[test]
    fn legacy_and_foreign_signatures_are_io_errors() {
        let legacy = Buffer::from_bytes(b"JAY\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0JAY");
        let err = read_jay(&legacy).unwrap_err();
        assert_eq!(error_kind(&err), Some(ErrorKind::Io));
        assert!(err.to_string().contains("legacy"));

        let foreign = Buffer::from_bytes(b"PAR1 this is not a jay file PAR1");
        let err = read_jay(&foreign).unwrap_err();
        assert_eq!(error_kind(&err), Some(ErrorKind::Io));
        assert!(err.to_string().contains("signature"));
    }

    #[test]
    fn oversized_meta_is_rejected() {
        let mut bytes = HEADER.to_vec();
        bytes.extend_from_slice(&1000u64.to_le_bytes());
        bytes.extend_from_slice(FOOTER);
        let err = read_jay(&Buffer::from_bytes(&bytes)).unwrap_err();
        assert_eq!(error_kind(&err), Some(ErrorKind::Io));
        assert!(err.to_string().contains("1000"));
    }
}
