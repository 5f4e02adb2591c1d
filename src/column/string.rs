//! Materialized string columns.
//!
//! Row `i` occupies bytes `[start_i, end_i)` of the character buffer, where
//! `end_i = offsets[i + 1]` with the NA bit cleared and `start_i` is the
//! previous end (also with the NA bit cleared). `offsets[0] == 0`. A row is NA
//! when the NA bit of its end offset is set; NA rows are empty.

use super::{Column, ColumnImpl};
use crate::buffer::Buffer;
use crate::error::FrameError;
use crate::stype::{STR32_NA_BIT, STR64_NA_BIT, SType};
use anyhow::Result;
use std::borrow::Cow;
use std::collections::TryReserveError;

#[derive(Clone, Debug)]
pub struct StringColumn {
    stype: SType,
    nrows: usize,
    offsets: Buffer,
    strdata: Buffer,
}

impl StringColumn {
    /// Wrap offsets and character data, validating their structure.
    ///
    /// # Errors
    /// Type error for non-string stypes; value error if the offsets are too
    /// short, do not start at zero, decrease, or point past the character
    /// data, or if a row is not valid UTF-8.
    pub fn new(stype: SType, nrows: usize, offsets: Buffer, strdata: Buffer) -> Result<Self> {
        if !stype.is_string() {
            return Err(FrameError::type_error(format!("{stype} is not a string type")).into());
        }
        let need = (nrows + 1) * stype.elemsize();
        if offsets.size() < need {
            return Err(FrameError::value(format!(
                "{stype} column of {nrows} rows needs {need} offset bytes, buffer has {}",
                offsets.size()
            ))
            .into());
        }
        let aligned = match stype {
            SType::Str32 => offsets.is_aligned_for::<u32>(),
            _ => offsets.is_aligned_for::<u64>(),
        };
        if !aligned {
            return Err(FrameError::value("misaligned string offsets").into());
        }
        let col = Self {
            stype,
            nrows,
            offsets,
            strdata,
        };
        col.validate()?;
        Ok(col)
    }

    /// Trusted constructor for buffers produced by this crate.
    pub(crate) fn from_parts(stype: SType, nrows: usize, offsets: Buffer, strdata: Buffer) -> Self {
        Self {
            stype,
            nrows,
            offsets,
            strdata,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.raw_offset(0) != 0 {
            return Err(FrameError::value("first string offset must be zero").into());
        }
        let data = self.strdata.as_bytes();
        let mut prev = 0usize;
        for i in 0..self.nrows {
            let (end, na) = self.end(i);
            if end < prev || end > data.len() {
                return Err(FrameError::value(format!(
                    "string offsets are invalid at row {i}: [{prev}, {end}) with {} bytes of data",
                    data.len()
                ))
                .into());
            }
            if !na && std::str::from_utf8(&data[prev..end]).is_err() {
                return Err(FrameError::value(format!("row {i} is not valid UTF-8")).into());
            }
            prev = end;
        }
        Ok(())
    }

    #[inline]
    fn raw_offset(&self, k: usize) -> u64 {
        match self.stype {
            SType::Str32 => u64::from(self.offsets.as_slice::<u32>()[k]),
            _ => self.offsets.as_slice::<u64>()[k],
        }
    }

    /// End offset of row `i` and whether the row is NA.
    #[inline]
    fn end(&self, i: usize) -> (usize, bool) {
        let raw = self.raw_offset(i + 1);
        let bit = match self.stype {
            SType::Str32 => u64::from(STR32_NA_BIT),
            _ => STR64_NA_BIT,
        };
        ((raw & !bit) as usize, raw & bit != 0)
    }

    #[must_use]
    pub fn offsets(&self) -> &Buffer {
        &self.offsets
    }

    #[must_use]
    pub fn strdata(&self) -> &Buffer {
        &self.strdata
    }
}

impl ColumnImpl for StringColumn {
    fn nrows(&self) -> usize {
        self.nrows
    }

    fn stype(&self) -> SType {
        self.stype
    }

    fn clone_impl(&self) -> Box<dyn ColumnImpl> {
        Box::new(self.clone())
    }

    fn get_str(&self, i: usize) -> Option<Cow<'_, str>> {
        let (end, na) = self.end(i);
        if na {
            return None;
        }
        let start = if i == 0 { 0 } else { self.end(i - 1).0 };
        Some(String::from_utf8_lossy(&self.strdata.as_bytes()[start..end]))
    }

    fn is_virtual(&self) -> bool {
        false
    }

    fn num_buffers(&self) -> usize {
        2
    }

    fn get_buffer(&self, i: usize) -> Option<&Buffer> {
        match i {
            0 => Some(&self.offsets),
            1 => Some(&self.strdata),
            _ => None,
        }
    }
}

/// Accumulates strings into a new [`StringColumn`].
#[derive(Debug, Default)]
pub struct StringBuilder {
    /// End offsets with the 64-bit NA bit; narrowed in `finish` when possible.
    ends: Vec<u64>,
    data: Vec<u8>,
}

impl StringBuilder {
    #[must_use]
    pub fn with_capacity(nrows: usize) -> Self {
        Self {
            ends: Vec::with_capacity(nrows),
            data: Vec::new(),
        }
    }

    pub fn push(&mut self, value: Option<&str>) {
        match value {
            Some(s) => {
                self.data.extend_from_slice(s.as_bytes());
                self.ends.push(self.data.len() as u64);
            }
            None => self.ends.push(self.data.len() as u64 | STR64_NA_BIT),
        }
    }

    /// Append the rows of another builder.
    pub fn append(&mut self, other: &StringBuilder) {
        let base = self.data.len() as u64;
        self.data.extend_from_slice(&other.data);
        self.ends.extend(
            other
                .ends
                .iter()
                .map(|&e| ((e & !STR64_NA_BIT) + base) | (e & STR64_NA_BIT)),
        );
    }

    /// Keep only the first `nrows` rows.
    pub fn truncate(&mut self, nrows: usize) {
        if nrows >= self.ends.len() {
            return;
        }
        self.ends.truncate(nrows);
        let end = self.ends.last().map_or(0, |&e| e & !STR64_NA_BIT);
        self.data.truncate(usize::try_from(end).unwrap_or(usize::MAX));
    }

    /// Reserve offsets for `nrows` more rows.
    ///
    /// # Errors
    /// When the allocation fails.
    pub fn try_reserve(&mut self, nrows: usize) -> Result<(), TryReserveError> {
        self.ends.try_reserve(nrows)
    }

    /// Remove all rows, keeping the allocations.
    pub fn clear(&mut self) {
        self.ends.clear();
        self.data.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ends.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ends.is_empty()
    }

    /// Build a column, using 32-bit offsets when the character data allows.
    #[must_use]
    pub fn finish(self) -> Column {
        self.finish_as(SType::Str32)
    }

    /// Build a column of the requested string stype, widening to `Str64`
    /// when the character data does not fit 32-bit offsets.
    #[must_use]
    pub fn finish_as(self, stype: SType) -> Column {
        let nrows = self.ends.len();
        let stype = stype.max(SType::str_for_size(self.data.len()));
        let offsets = match stype {
            SType::Str32 => {
                let mut v = Vec::with_capacity(nrows + 1);
                v.push(0u32);
                v.extend(self.ends.iter().map(|&e| {
                    let na = if e & STR64_NA_BIT != 0 { STR32_NA_BIT } else { 0 };
                    (e & !STR64_NA_BIT) as u32 | na
                }));
                Buffer::from_vec(v)
            }
            _ => {
                let mut v = Vec::with_capacity(nrows + 1);
                v.push(0u64);
                v.extend_from_slice(&self.ends);
                Buffer::from_vec(v)
            }
        };
        let strdata = Buffer::from_vec(self.data);
        Column::new(StringColumn::from_parts(stype, nrows, offsets, strdata))
    }
}
