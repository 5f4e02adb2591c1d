//! Zero-copy exchange with the Arrow C data interface.
//!
//! Imported arrays keep their foreign buffers alive through the `ArrayRef`
//! and are read in place; exported columns are converted to Arrow arrays and
//! handed out as [`FFI_ArrowArray`] / [`FFI_ArrowSchema`] pairs.

use super::{Column, ColumnImpl};
use crate::error::FrameError;
use crate::stype::{NaSentinel, SType};
use anyhow::Result;
use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float32Array, Float64Array, Int8Array, Int16Array,
    Int32Array, Int64Array, LargeStringArray, NullArray, StringArray, make_array,
};
use arrow::datatypes::{
    DataType, Float32Type, Float64Type, Int8Type, Int16Type, Int32Type, Int64Type,
};
use arrow::ffi::{FFI_ArrowArray, FFI_ArrowSchema, from_ffi, to_ffi};
use std::borrow::Cow;
use std::sync::Arc;

/// Column reading directly from an Arrow array.
#[derive(Clone, Debug)]
pub struct ArrowColumn {
    array: ArrayRef,
    stype: SType,
}

fn stype_of(dt: &DataType) -> Result<SType> {
    Ok(match dt {
        DataType::Null => SType::Void,
        DataType::Boolean => SType::Bool,
        DataType::Int8 => SType::Int8,
        DataType::Int16 => SType::Int16,
        DataType::Int32 => SType::Int32,
        DataType::Int64 => SType::Int64,
        DataType::Float32 => SType::Float32,
        DataType::Float64 => SType::Float64,
        DataType::Utf8 => SType::Str32,
        DataType::LargeUtf8 => SType::Str64,
        other => {
            return Err(FrameError::type_error(format!(
                "arrow arrays of type {other} are not supported"
            ))
            .into());
        }
    })
}

macro_rules! arrow_getter {
    ($name:ident, $t:ty, $arrow:ty) => {
        fn $name(&self, i: usize) -> Option<$t> {
            if self.array.is_null(i) {
                return None;
            }
            let v = self.array.as_primitive::<$arrow>().value(i);
            (!v.is_na()).then_some(v)
        }
    };
}

impl ArrowColumn {
    /// # Errors
    /// Type error for Arrow types without a matching stype.
    pub fn new(array: ArrayRef) -> Result<Self> {
        let stype = stype_of(array.data_type())?;
        Ok(Self { array, stype })
    }

    #[must_use]
    pub fn array(&self) -> &ArrayRef {
        &self.array
    }
}

impl ColumnImpl for ArrowColumn {
    fn nrows(&self) -> usize {
        self.array.len()
    }

    fn stype(&self) -> SType {
        self.stype
    }

    fn clone_impl(&self) -> Box<dyn ColumnImpl> {
        Box::new(self.clone())
    }

    fn get_bool(&self, i: usize) -> Option<bool> {
        (!self.array.is_null(i)).then(|| self.array.as_boolean().value(i))
    }

    arrow_getter!(get_i8, i8, Int8Type);
    arrow_getter!(get_i16, i16, Int16Type);
    arrow_getter!(get_i32, i32, Int32Type);
    arrow_getter!(get_i64, i64, Int64Type);
    arrow_getter!(get_f32, f32, Float32Type);
    arrow_getter!(get_f64, f64, Float64Type);

    fn get_str(&self, i: usize) -> Option<Cow<'_, str>> {
        if self.array.is_null(i) {
            return None;
        }
        let s = match self.stype {
            SType::Str32 => self.array.as_string::<i32>().value(i),
            _ => self.array.as_string::<i64>().value(i),
        };
        Some(Cow::Borrowed(s))
    }

    /// Backed by foreign buffers rather than computed.
    fn is_virtual(&self) -> bool {
        false
    }
}

impl Column {
    /// Import an array exported through the Arrow C data interface.
    ///
    /// # Safety
    /// `array` and `schema` must be valid, initialised structures produced by
    /// an Arrow-compatible exporter, describing the same array.
    ///
    /// # Errors
    /// Type error for unsupported Arrow types or malformed structures.
    pub unsafe fn from_arrow(array: FFI_ArrowArray, schema: &FFI_ArrowSchema) -> Result<Column> {
        // SAFETY: forwarded to the caller.
        let data = unsafe { from_ffi(array, schema) }
            .map_err(|e| FrameError::type_error(format!("invalid arrow array: {e}")))?;
        Ok(Column::new(ArrowColumn::new(make_array(data))?))
    }

    /// Build an Arrow array holding the values of this column.
    #[must_use]
    pub fn to_arrow_array(&self) -> ArrayRef {
        let n = self.nrows();
        match self.stype() {
            SType::Void => Arc::new(NullArray::new(n)),
            SType::Bool => Arc::new(BooleanArray::from(self.to_vec::<bool>())),
            SType::Int8 => Arc::new(Int8Array::from(self.to_vec::<i8>())),
            SType::Int16 => Arc::new(Int16Array::from(self.to_vec::<i16>())),
            SType::Int32 => Arc::new(Int32Array::from(self.to_vec::<i32>())),
            SType::Int64 => Arc::new(Int64Array::from(self.to_vec::<i64>())),
            SType::Float32 => Arc::new(Float32Array::from(self.to_vec::<f32>())),
            SType::Float64 => Arc::new(Float64Array::from(self.to_vec::<f64>())),
            SType::Str32 => Arc::new((0..n).map(|i| self.get_str(i)).collect::<StringArray>()),
            SType::Str64 => {
                Arc::new((0..n).map(|i| self.get_str(i)).collect::<LargeStringArray>())
            }
        }
    }

    /// Export through the Arrow C data interface.
    ///
    /// # Errors
    /// Type error if Arrow rejects the array.
    pub fn to_arrow(&self) -> Result<(FFI_ArrowArray, FFI_ArrowSchema)> {
        let data = self.to_arrow_array().to_data();
        let exported = to_ffi(&data)
            .map_err(|e| FrameError::type_error(format!("arrow export failed: {e}")))?;
        Ok(exported)
    }
}
