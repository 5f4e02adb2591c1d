//! Materialized fixed-width columns.

use super::{Column, ColumnImpl};
use crate::buffer::Buffer;
use crate::error::FrameError;
use crate::stype::{BOOL_NA, NaSentinel, Pod, SType};
use anyhow::Result;
use std::mem::align_of;

/// One data buffer holding `nrows` elements with in-band NA sentinels.
#[derive(Clone, Debug)]
pub struct FixedColumn {
    stype: SType,
    nrows: usize,
    data: Buffer,
}

macro_rules! fixed_getter {
    ($name:ident, $t:ty, $stype:ident) => {
        #[inline]
        fn $name(&self, i: usize) -> Option<$t> {
            self.expect_stype(SType::$stype);
            let v = self.data.as_slice::<$t>()[i];
            (!v.is_na()).then_some(v)
        }
    };
}

impl FixedColumn {
    /// # Errors
    /// Type error for non-fixed stypes; value error when `data` is too small
    /// or misaligned for `nrows` elements.
    pub fn new(stype: SType, nrows: usize, data: Buffer) -> Result<Self> {
        if stype == SType::Void || stype.is_string() {
            return Err(FrameError::type_error(format!(
                "{stype} is not a fixed-width type"
            ))
            .into());
        }
        let need = nrows * stype.elemsize();
        if data.size() < need {
            return Err(FrameError::value(format!(
                "{stype} column of {nrows} rows needs {need} bytes, buffer has {}",
                data.size()
            ))
            .into());
        }
        let align = stype.elemsize().min(align_of::<u64>());
        if !data.is_empty() && data.as_bytes().as_ptr().align_offset(align) != 0 {
            return Err(FrameError::value(format!("misaligned {stype} data buffer")).into());
        }
        Ok(Self { stype, nrows, data })
    }

    pub(crate) fn from_vec<T: Pod>(stype: SType, values: Vec<T>) -> Self {
        debug_assert_eq!(std::mem::size_of::<T>(), stype.elemsize());
        let nrows = values.len();
        Self {
            stype,
            nrows,
            data: Buffer::from_vec(values),
        }
    }

    /// Trusted constructor for buffers allocated by this crate.
    pub(crate) fn from_buffer(stype: SType, nrows: usize, data: Buffer) -> Self {
        debug_assert!(data.size() >= nrows * stype.elemsize());
        Self { stype, nrows, data }
    }

    #[must_use]
    pub fn data(&self) -> &Buffer {
        &self.data
    }

    #[inline]
    fn expect_stype(&self, wanted: SType) {
        assert!(
            self.stype == wanted,
            "cannot retrieve {wanted} values from a column of type {}",
            self.stype
        );
    }
}

impl ColumnImpl for FixedColumn {
    fn nrows(&self) -> usize {
        self.nrows
    }

    fn stype(&self) -> SType {
        self.stype
    }

    fn clone_impl(&self) -> Box<dyn ColumnImpl> {
        Box::new(self.clone())
    }

    #[inline]
    fn get_bool(&self, i: usize) -> Option<bool> {
        self.expect_stype(SType::Bool);
        let v = self.data.as_slice::<i8>()[i];
        (v != BOOL_NA).then_some(v != 0)
    }

    fixed_getter!(get_i8, i8, Int8);
    fixed_getter!(get_i16, i16, Int16);
    fixed_getter!(get_i32, i32, Int32);
    fixed_getter!(get_i64, i64, Int64);
    fixed_getter!(get_f32, f32, Float32);
    fixed_getter!(get_f64, f64, Float64);

    fn is_virtual(&self) -> bool {
        false
    }

    fn num_buffers(&self) -> usize {
        1
    }

    fn get_buffer(&self, i: usize) -> Option<&Buffer> {
        (i == 0).then_some(&self.data)
    }
}

impl From<FixedColumn> for Column {
    fn from(col: FixedColumn) -> Self {
        Column::new(col)
    }
}
