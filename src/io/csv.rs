//! Chunked CSV reader driven by the ordered scheduler.
//!
//! The input is cut into byte chunks of roughly [`CsvParams::chunk_size`]
//! bytes, and each chunk goes through the three phases of
//! [`parallel_for_ordered`]:
//!
//! - **start**: move the approximate chunk start to the next line boundary
//!   and parse the records into thread-local typed buffers
//! - **order**: check that the chunk begins exactly where the previous one
//!   ended (re-parsing it otherwise), then append its rows to the output
//! - **finish**: clear the local buffers for reuse by a later chunk
//!
//! Output buffers are preallocated for an estimated number of rows. A chunk
//! that would overflow them stops the current pass: the chunk is kept aside,
//! the buffers grow (at least twofold, guided by the row density observed so
//! far), and a new pass starts at the first unread byte. No input is parsed
//! twice.
//!
//! Column types are either given in [`CsvParams::columns`] or guessed by
//! [`CsvParams::infer`] from a sample of the input. A field that does not
//! parse as its column type fails the read with a value error naming the
//! row and the column.

use crate::buffer::Buffer;
use crate::column::cast::parse_bool;
use crate::column::{Column, FixedColumn, StringBuilder};
use crate::config::CsvConfig;
use crate::error::FrameError;
use crate::frame::Frame;
use crate::parallel::{OrderedControl, OrderedTask, ThreadPool, parallel_for_ordered};
use crate::stype::{BOOL_NA, NaSentinel, SType};
use anyhow::{Context, Result};
use csv::{ByteRecord, ReaderBuilder};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const SAMPLE_POINTS: usize = 10;
const SAMPLE_ROWS: usize = 100;
const DENSITY_PROBE: usize = 64 * 1024;

/// Name and storage type of one CSV column.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvColumn {
    pub name: String,
    pub stype: SType,
}

impl CsvColumn {
    pub fn new(name: impl Into<String>, stype: SType) -> Self {
        Self {
            name: name.into(),
            stype,
        }
    }
}

/// Parameters of [`read_csv`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvParams {
    /// Field separator.
    pub sep: u8,
    /// Quote character.
    pub quote: u8,
    /// Whether the first record holds column names.
    pub header: bool,
    /// Column names and types; guessed from the input when empty.
    pub columns: Vec<CsvColumn>,
    /// Stop after this many rows.
    pub max_nrows: Option<usize>,
    /// Approximate number of input bytes per chunk.
    pub chunk_size: usize,
    /// Team size (0 means the whole pool).
    pub nthreads: usize,
    /// Initial output allocation in rows; estimated from the input when unset.
    pub alloc_nrows: Option<usize>,
}

impl Default for CsvParams {
    fn default() -> Self {
        Self {
            sep: b',',
            quote: b'"',
            header: true,
            columns: Vec::new(),
            max_nrows: None,
            chunk_size: 1 << 20,
            nthreads: 0,
            alloc_nrows: None,
        }
    }
}

impl CsvParams {
    /// Reader parameters from the `csv` section of a [`Config`](crate::config::Config).
    ///
    /// # Errors
    /// Value error when the separator or quote is not a single ASCII character.
    pub fn from_config(cfg: &CsvConfig) -> Result<Self> {
        let ascii = |c: char, what: &str| {
            u8::try_from(c)
                .ok()
                .filter(u8::is_ascii)
                .ok_or_else(|| FrameError::value(format!("CSV {what} {c:?} is not an ASCII character")))
        };
        Ok(Self {
            sep: ascii(cfg.sep, "separator")?,
            quote: ascii(cfg.quote, "quote")?,
            header: cfg.header,
            columns: Vec::new(),
            max_nrows: cfg.max_nrows,
            chunk_size: cfg.chunk_size.max(1),
            nthreads: 0,
            alloc_nrows: cfg.alloc_nrows,
        })
    }

    #[must_use]
    pub fn with_columns(mut self, columns: Vec<CsvColumn>) -> Self {
        self.columns = columns;
        self
    }

    #[must_use]
    pub fn with_max_nrows(mut self, n: usize) -> Self {
        self.max_nrows = Some(n);
        self
    }

    #[must_use]
    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes.max(1);
        self
    }

    #[must_use]
    pub fn with_nthreads(mut self, n: usize) -> Self {
        self.nthreads = n;
        self
    }

    #[must_use]
    pub fn with_alloc_nrows(mut self, n: usize) -> Self {
        self.alloc_nrows = Some(n);
        self
    }

    fn reader_builder(&self) -> ReaderBuilder {
        let mut b = ReaderBuilder::new();
        b.delimiter(self.sep)
            .quote(self.quote)
            .has_headers(false)
            .flexible(true);
        b
    }

    /// Offset of the first data record, and the header names when
    /// `self.header` is set.
    fn split_header(&self, data: &[u8]) -> Result<(usize, Option<Vec<String>>)> {
        let bom = if data.starts_with(UTF8_BOM) { UTF8_BOM.len() } else { 0 };
        if !self.header {
            return Ok((bom, None));
        }
        let mut rdr = self.reader_builder().from_reader(&data[bom..]);
        let mut rec = ByteRecord::new();
        if !rdr.read_byte_record(&mut rec).context("read CSV header")? {
            return Ok((data.len(), Some(Vec::new())));
        }
        let names = rec
            .iter()
            .map(|f| String::from_utf8_lossy(f).trim().to_string())
            .collect();
        Ok((bom + offset(rdr.position().byte()), Some(names)))
    }

    /// Fill in [`CsvParams::columns`] from the header and a sample of rows
    /// taken at evenly spaced positions of `data`. Does nothing when the
    /// columns are already set.
    ///
    /// Each column gets the narrowest of `Bool`, `Int32`, `Int64`, `Float64`
    /// and `Str32` able to hold every sampled value; columns with no sampled
    /// values become `Str32`.
    ///
    /// # Errors
    /// When the header cannot be read.
    pub fn infer(&mut self, data: &[u8]) -> Result<()> {
        if !self.columns.is_empty() {
            return Ok(());
        }
        let (body, header) = self.split_header(data)?;
        let names = header.unwrap_or_default();
        let mut stypes = vec![SType::Void; names.len()];
        // Sample points can land inside a quoted line break.
        let width = (!names.is_empty()).then_some(names.len());
        let mut rec = ByteRecord::new();
        for start in sample_starts(data, body) {
            let mut rdr = self.reader_builder().from_reader(&data[start..]);
            for _ in 0..SAMPLE_ROWS {
                match rdr.read_byte_record(&mut rec) {
                    Ok(true) => {}
                    _ => break,
                }
                if width.is_some_and(|w| w != rec.len()) {
                    continue;
                }
                if stypes.len() < rec.len() {
                    stypes.resize(rec.len(), SType::Void);
                }
                for (j, field) in rec.iter().enumerate() {
                    stypes[j] = stypes[j].max(sniff(field));
                }
            }
        }
        let names = column_names(names, stypes.len());
        self.columns = names
            .into_iter()
            .zip(stypes)
            .map(|(name, stype)| {
                let stype = if stype == SType::Void { SType::Str32 } else { stype };
                CsvColumn { name, stype }
            })
            .collect();
        debug!(
            "inferred {} CSV columns: {}",
            self.columns.len(),
            self.columns
                .iter()
                .map(|c| format!("{}:{}", c.name, c.stype))
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(())
    }
}

fn offset(pos: u64) -> usize {
    usize::try_from(pos).unwrap_or(usize::MAX)
}

/// Start of the first line beginning at or after `pos`.
fn next_line(data: &[u8], pos: usize) -> usize {
    if pos == 0 {
        return 0;
    }
    data[pos - 1..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(data.len(), |k| pos + k)
}

fn sample_starts(data: &[u8], body: usize) -> Vec<usize> {
    let len = data.len().saturating_sub(body);
    let mut starts: Vec<usize> = Vec::with_capacity(SAMPLE_POINTS);
    for k in 0..SAMPLE_POINTS {
        let p = if k == 0 {
            body
        } else {
            next_line(data, body + k * len / SAMPLE_POINTS)
        };
        if p < data.len() && starts.last() != Some(&p) {
            starts.push(p);
        }
    }
    starts
}

fn is_na_text(s: &str) -> bool {
    s.is_empty() || s == "NA"
}

/// Narrowest stype able to hold a single field (`Void` for NA).
fn sniff(field: &[u8]) -> SType {
    let Ok(s) = std::str::from_utf8(field) else {
        return SType::Str32;
    };
    let s = s.trim();
    if is_na_text(s) {
        SType::Void
    } else if parse_bool(s).is_some() {
        SType::Bool
    } else if s.parse::<i32>().is_ok_and(|v| !v.is_na()) {
        SType::Int32
    } else if s.parse::<i64>().is_ok_and(|v| !v.is_na()) {
        SType::Int64
    } else if s.parse::<f64>().is_ok() {
        SType::Float64
    } else {
        SType::Str32
    }
}

/// Fill blank names with `C<j>`, add names for columns beyond the header,
/// and make duplicates unique with a `.<k>` suffix.
fn column_names(mut names: Vec<String>, ncols: usize) -> Vec<String> {
    names.resize(ncols.max(names.len()), String::new());
    let mut seen = HashSet::with_capacity(names.len());
    names
        .into_iter()
        .enumerate()
        .map(|(j, name)| {
            let base = if name.is_empty() { format!("C{j}") } else { name };
            let mut name = base.clone();
            let mut k = 0;
            while !seen.insert(name.clone()) {
                k += 1;
                name = format!("{base}.{k}");
            }
            name
        })
        .collect()
}

/// Rough row count of `body`, from the line density of its first bytes.
fn estimate_nrows(body: &[u8]) -> usize {
    let probe = &body[..body.len().min(DENSITY_PROBE)];
    let lines = probe.iter().filter(|&&b| b == b'\n').count().max(1);
    body.len() * lines / probe.len().max(1) + 1
}

/* ===================== typed buffers ===================== */

#[derive(Debug)]
enum ColumnBuf {
    Void(usize),
    Bool(Vec<i8>),
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    Str(StringBuilder),
}

macro_rules! with_buf {
    ($buf:expr, $v:ident => $e:expr, $n:ident => $void:expr) => {
        match $buf {
            ColumnBuf::Void($n) => $void,
            ColumnBuf::Bool($v) | ColumnBuf::Int8($v) => $e,
            ColumnBuf::Int16($v) => $e,
            ColumnBuf::Int32($v) => $e,
            ColumnBuf::Int64($v) => $e,
            ColumnBuf::Float32($v) => $e,
            ColumnBuf::Float64($v) => $e,
            ColumnBuf::Str($v) => $e,
        }
    };
}

fn field_text(field: &[u8]) -> Option<&str> {
    std::str::from_utf8(field).ok().map(str::trim)
}

fn push_int<T: NaSentinel + FromStr>(v: &mut Vec<T>, field: &[u8]) -> bool {
    let Some(s) = field_text(field) else {
        return false;
    };
    if is_na_text(s) {
        v.push(T::NA);
        return true;
    }
    match s.parse::<T>() {
        Ok(x) if !x.is_na() => {
            v.push(x);
            true
        }
        _ => false,
    }
}

fn push_float<T: NaSentinel + FromStr>(v: &mut Vec<T>, field: &[u8]) -> bool {
    let Some(s) = field_text(field) else {
        return false;
    };
    if is_na_text(s) {
        v.push(T::NA);
        return true;
    }
    s.parse::<T>().map(|x| v.push(x)).is_ok()
}

impl ColumnBuf {
    fn new(stype: SType) -> Self {
        match stype {
            SType::Void => ColumnBuf::Void(0),
            SType::Bool => ColumnBuf::Bool(Vec::new()),
            SType::Int8 => ColumnBuf::Int8(Vec::new()),
            SType::Int16 => ColumnBuf::Int16(Vec::new()),
            SType::Int32 => ColumnBuf::Int32(Vec::new()),
            SType::Int64 => ColumnBuf::Int64(Vec::new()),
            SType::Float32 => ColumnBuf::Float32(Vec::new()),
            SType::Float64 => ColumnBuf::Float64(Vec::new()),
            SType::Str32 | SType::Str64 => ColumnBuf::Str(StringBuilder::default()),
        }
    }

    fn len(&self) -> usize {
        with_buf!(self, v => v.len(), n => *n)
    }

    fn truncate(&mut self, nrows: usize) {
        with_buf!(self, v => v.truncate(nrows), n => *n = (*n).min(nrows));
    }

    fn clear(&mut self) {
        with_buf!(self, v => v.clear(), n => *n = 0);
    }

    fn try_reserve(&mut self, nrows: usize) -> Result<(), std::collections::TryReserveError> {
        with_buf!(self, v => v.try_reserve(nrows), _n => Ok(()))
    }

    /// Parse `field` and append it; `false` when it does not parse.
    fn push_field(&mut self, field: &[u8]) -> bool {
        match self {
            ColumnBuf::Void(n) => {
                *n += 1;
                true
            }
            ColumnBuf::Bool(v) => {
                let Some(s) = field_text(field) else {
                    return false;
                };
                if is_na_text(s) {
                    v.push(BOOL_NA);
                } else {
                    match parse_bool(s) {
                        Some(b) => v.push(i8::from(b)),
                        None => return false,
                    }
                }
                true
            }
            ColumnBuf::Int8(v) => push_int(v, field),
            ColumnBuf::Int16(v) => push_int(v, field),
            ColumnBuf::Int32(v) => push_int(v, field),
            ColumnBuf::Int64(v) => push_int(v, field),
            ColumnBuf::Float32(v) => push_float(v, field),
            ColumnBuf::Float64(v) => push_float(v, field),
            ColumnBuf::Str(b) => {
                if field.is_empty() {
                    b.push(None);
                } else {
                    b.push(Some(&String::from_utf8_lossy(field)));
                }
                true
            }
        }
    }

    fn append(&mut self, other: &ColumnBuf) {
        match (self, other) {
            (ColumnBuf::Void(a), ColumnBuf::Void(b)) => *a += b,
            (ColumnBuf::Bool(a), ColumnBuf::Bool(b)) | (ColumnBuf::Int8(a), ColumnBuf::Int8(b)) => {
                a.extend_from_slice(b);
            }
            (ColumnBuf::Int16(a), ColumnBuf::Int16(b)) => a.extend_from_slice(b),
            (ColumnBuf::Int32(a), ColumnBuf::Int32(b)) => a.extend_from_slice(b),
            (ColumnBuf::Int64(a), ColumnBuf::Int64(b)) => a.extend_from_slice(b),
            (ColumnBuf::Float32(a), ColumnBuf::Float32(b)) => a.extend_from_slice(b),
            (ColumnBuf::Float64(a), ColumnBuf::Float64(b)) => a.extend_from_slice(b),
            (ColumnBuf::Str(a), ColumnBuf::Str(b)) => a.append(b),
            (a, b) => unreachable!("appending {b:?} to a buffer of another type {a:?}"),
        }
    }

    fn into_column(self, stype: SType) -> Column {
        match self {
            ColumnBuf::Void(n) => Column::new_na(SType::Void, n),
            ColumnBuf::Bool(v) => FixedColumn::from_vec(SType::Bool, v).into(),
            ColumnBuf::Int8(v) => FixedColumn::from_vec(SType::Int8, v).into(),
            ColumnBuf::Int16(v) => FixedColumn::from_vec(SType::Int16, v).into(),
            ColumnBuf::Int32(v) => FixedColumn::from_vec(SType::Int32, v).into(),
            ColumnBuf::Int64(v) => FixedColumn::from_vec(SType::Int64, v).into(),
            ColumnBuf::Float32(v) => FixedColumn::from_vec(SType::Float32, v).into(),
            ColumnBuf::Float64(v) => FixedColumn::from_vec(SType::Float64, v).into(),
            ColumnBuf::Str(b) => b.finish_as(stype),
        }
    }
}

/* ===================== chunks ===================== */

#[derive(Debug)]
struct ParseFailure {
    /// Row within the chunk.
    row: usize,
    column: Option<usize>,
    message: String,
}

#[derive(Debug)]
struct ParsedChunk {
    start: usize,
    end: usize,
    nrows: usize,
    columns: Vec<ColumnBuf>,
    failure: Option<ParseFailure>,
}

impl ParsedChunk {
    fn new(stypes: &[SType]) -> Self {
        Self {
            start: usize::MAX,
            end: usize::MAX,
            nrows: 0,
            columns: stypes.iter().map(|&st| ColumnBuf::new(st)).collect(),
            failure: None,
        }
    }

    fn reset(&mut self, start: usize) {
        self.start = start;
        self.end = start;
        self.nrows = 0;
        self.failure = None;
        for c in &mut self.columns {
            c.clear();
        }
    }

    fn truncate(&mut self, nrows: usize) {
        if nrows < self.nrows {
            self.nrows = nrows;
            for c in &mut self.columns {
                c.truncate(nrows);
            }
        }
    }

    fn fail(&mut self, column: Option<usize>, message: String) {
        for c in &mut self.columns {
            c.truncate(self.nrows);
        }
        self.failure = Some(ParseFailure {
            row: self.nrows,
            column,
            message,
        });
    }
}

/// Output of a read, shared across passes.
struct Output {
    columns: Vec<ColumnBuf>,
    nrows: usize,
    capacity: usize,
    /// End of the last committed (or set-aside) chunk.
    prev_end: usize,
    /// Chunk that did not fit in `capacity`.
    pending: Option<ParsedChunk>,
    hard_stop: bool,
}

impl Output {
    fn grow(&mut self, capacity: usize, names: &[CsvColumn]) -> Result<()> {
        for (col, meta) in self.columns.iter_mut().zip(names) {
            col.try_reserve(capacity.saturating_sub(col.len()))
                .map_err(|e| {
                    FrameError::alloc(format!(
                        "cannot allocate {capacity} rows for CSV column {:?}: {e}",
                        meta.name
                    ))
                })?;
        }
        self.capacity = capacity;
        Ok(())
    }

    fn commit(&mut self, chunk: &ParsedChunk) {
        for (dst, src) in self.columns.iter_mut().zip(&chunk.columns) {
            dst.append(src);
        }
        self.nrows += chunk.nrows;
    }
}

struct Pass<'a> {
    data: &'a [u8],
    params: &'a CsvParams,
    stypes: &'a [SType],
    /// First byte of this pass; always a record boundary.
    pos: usize,
    nchunks: usize,
    out: Mutex<Output>,
    stop: AtomicBool,
}

impl Pass<'_> {
    /// Approximate start and exclusive record-start limit of chunk `i`.
    fn bounds(&self, i: usize) -> (usize, usize) {
        let cs = self.params.chunk_size;
        let start = self.pos + i * cs;
        let limit = if i + 1 == self.nchunks {
            self.data.len()
        } else {
            (start + cs).min(self.data.len())
        };
        (start, limit)
    }

    /// Parse every record starting in `[start, limit)`. The last record may
    /// extend past `limit`; `chunk.end` is where the next record begins.
    fn parse(&self, chunk: &mut ParsedChunk, start: usize, limit: usize) {
        chunk.reset(start);
        if start >= limit {
            return;
        }
        let ncols = self.stypes.len();
        let mut rdr = self.params.reader_builder().from_reader(&self.data[start..]);
        let mut rec = ByteRecord::new();
        loop {
            if start + offset(rdr.position().byte()) >= limit {
                break;
            }
            match rdr.read_byte_record(&mut rec) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    chunk.fail(None, e.to_string());
                    break;
                }
            }
            if rec.len() != ncols {
                chunk.fail(None, format!("expected {ncols} fields, found {}", rec.len()));
                break;
            }
            let bad = rec
                .iter()
                .zip(chunk.columns.iter_mut())
                .position(|(field, col)| !col.push_field(field));
            if let Some(j) = bad {
                let text = String::from_utf8_lossy(&rec[j]).into_owned();
                chunk.fail(Some(j), format!("cannot parse {text:?} as {}", self.stypes[j]));
                break;
            }
            chunk.nrows += 1;
        }
        chunk.end = start + offset(rdr.position().byte());
    }

    fn failure_error(&self, failure: &ParseFailure, row0: usize) -> FrameError {
        let row = row0 + failure.row;
        match failure.column {
            Some(j) => FrameError::value(format!(
                "CSV row {row}, column {:?}: {}",
                self.params.columns[j].name, failure.message
            )),
            None => FrameError::value(format!("CSV row {row}: {}", failure.message)),
        }
    }
}

struct ChunkTask<'a> {
    pass: &'a Pass<'a>,
    chunk: ParsedChunk,
    limit: usize,
}

impl OrderedTask for ChunkTask<'_> {
    fn start(&mut self, iter: usize, _ctl: &OrderedControl<'_>) -> Result<()> {
        let (approx, limit) = self.pass.bounds(iter);
        self.limit = limit;
        if self.pass.stop.load(Ordering::Acquire) {
            self.chunk.reset(approx);
            return Ok(());
        }
        let start = if iter == 0 {
            self.pass.pos
        } else {
            next_line(self.pass.data, approx)
        };
        self.pass.parse(&mut self.chunk, start, limit);
        Ok(())
    }

    fn order(&mut self, iter: usize, ctl: &OrderedControl<'_>) -> Result<()> {
        let pass = self.pass;
        let mut out = pass.out.lock().unwrap_or_else(PoisonError::into_inner);
        if self.chunk.start != out.prev_end {
            trace!(
                "CSV chunk {iter} started at byte {} instead of {}; re-parsing",
                self.chunk.start, out.prev_end
            );
            pass.parse(&mut self.chunk, out.prev_end, self.limit);
        }
        out.prev_end = self.chunk.end;

        let row0 = out.nrows;
        let mut nrows = self.chunk.nrows;
        let mut stop = false;
        if let Some(max) = pass.params.max_nrows
            && row0 + nrows >= max
        {
            nrows = max.saturating_sub(row0);
            stop = true;
        }
        // A failure always ends its chunk, so a trimmed chunk never reaches it.
        if let Some(failure) = &self.chunk.failure
            && !stop
        {
            return Err(pass.failure_error(failure, row0).into());
        }
        self.chunk.truncate(nrows);
        if stop {
            debug!("CSV row limit reached in chunk {iter}");
            out.hard_stop = true;
            pass.stop.store(true, Ordering::Release);
            ctl.set_num_iterations(iter + 1);
        }

        if row0 + nrows > out.capacity {
            debug!(
                "CSV chunk {iter} overflows the {} allocated rows; ending the pass",
                out.capacity
            );
            pass.stop.store(true, Ordering::Release);
            ctl.set_num_iterations(iter + 1);
            let fresh = ParsedChunk::new(pass.stypes);
            out.pending = Some(std::mem::replace(&mut self.chunk, fresh));
            return Ok(());
        }
        out.commit(&self.chunk);
        Ok(())
    }

    fn finish(&mut self, _iter: usize, _ctl: &OrderedControl<'_>) -> Result<()> {
        self.chunk.reset(usize::MAX);
        Ok(())
    }
}

/// Read CSV data from `input` into a [`Frame`].
///
/// Runs on `pool` with a team of [`CsvParams::nthreads`] threads; row order
/// always follows the input.
///
/// # Errors
/// Value error for fields that do not parse as their column type or rows
/// with a wrong number of fields; allocation error when the output cannot
/// grow; errors from the header parser.
pub fn read_csv(pool: &ThreadPool, input: &Buffer, params: &CsvParams) -> Result<Frame> {
    let data = input.as_bytes();
    let mut params = params.clone();
    params.chunk_size = params.chunk_size.max(1);
    params.infer(data)?;
    let (body, _) = params.split_header(data)?;
    let stypes: Vec<SType> = params.columns.iter().map(|c| c.stype).collect();

    let estimate = params
        .alloc_nrows
        .unwrap_or_else(|| estimate_nrows(&data[body.min(data.len())..]));
    let capacity = params.max_nrows.map_or(estimate, |m| estimate.min(m)).max(1);
    let mut out = Output {
        columns: stypes.iter().map(|&st| ColumnBuf::new(st)).collect(),
        nrows: 0,
        capacity: 0,
        prev_end: body,
        pending: None,
        hard_stop: params.max_nrows == Some(0),
    };
    out.grow(capacity, &params.columns)?;

    let mut npass = 0;
    while !out.hard_stop && out.prev_end < data.len() {
        npass += 1;
        let pos = out.prev_end;
        let nchunks = (data.len() - pos).div_ceil(params.chunk_size);
        debug!("CSV pass {npass}: {nchunks} chunks from byte {pos}, {} rows allocated", out.capacity);
        let pass = Pass {
            data,
            params: &params,
            stypes: &stypes,
            pos,
            nchunks,
            out: Mutex::new(out),
            stop: AtomicBool::new(false),
        };
        parallel_for_ordered(pool, nchunks, params.nthreads, || ChunkTask {
            pass: &pass,
            chunk: ParsedChunk::new(&stypes),
            limit: 0,
        })
        .with_context(|| format!("reading CSV from byte {pos}"))?;
        out = pass.out.into_inner().unwrap_or_else(PoisonError::into_inner);

        let Some(chunk) = out.pending.take() else {
            break;
        };
        let needed = out.nrows + chunk.nrows;
        let consumed = (out.prev_end - body).max(1);
        let rest = data.len() - out.prev_end;
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let projected = needed + (needed as f64 / consumed as f64 * rest as f64 * 1.1).ceil() as usize;
        let mut grown = (out.capacity * 2).max(projected);
        if let Some(max) = params.max_nrows {
            grown = grown.min(max);
        }
        let grown = grown.max(needed);
        debug!("CSV output grows from {} to {grown} rows", out.capacity);
        out.grow(grown, &params.columns)?;
        out.commit(&chunk);
    }

    debug!("read {} CSV rows in {npass} passes", out.nrows);
    let names = params.columns.iter().map(|c| c.name.clone()).collect();
    let columns = out
        .columns
        .into_iter()
        .zip(&stypes)
        .map(|(buf, &st)| buf.into_column(st))
        .collect();
    Frame::new(names, columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_line_finds_record_starts() {
        let data = b"a,b\n1,2\n3,4\n";
        assert_eq!(next_line(data, 0), 0);
        assert_eq!(next_line(data, 4), 4);
        assert_eq!(next_line(data, 5), 8);
        assert_eq!(next_line(data, 12), 12);
    }

    #[test]
    fn sniff_orders_types() {
        assert_eq!(sniff(b""), SType::Void);
        assert_eq!(sniff(b"NA"), SType::Void);
        assert_eq!(sniff(b"true"), SType::Bool);
        assert_eq!(sniff(b"17"), SType::Int32);
        assert_eq!(sniff(b"5000000000"), SType::Int64);
        assert_eq!(sniff(b"2.5"), SType::Float64);
        assert_eq!(sniff(b"x"), SType::Str32);
    }

    #[test]
    fn duplicate_and_blank_names_are_renamed() {
        let names = column_names(vec!["a".into(), String::new(), "a".into()], 4);
        assert_eq!(names, vec!["a", "C1", "a.1", "C3"]);
    }
}
