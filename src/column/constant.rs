//! Columns repeating a single value.

use super::{Column, ColumnImpl};
use crate::rowindex::RowIndex;
use crate::stype::{NaSentinel, SType, Value};
use std::borrow::Cow;

#[derive(Clone, Debug)]
pub struct ConstColumn {
    value: Option<Value>,
    stype: SType,
    nrows: usize,
}

impl ConstColumn {
    #[must_use]
    pub fn new(value: Value, nrows: usize) -> Self {
        let stype = value.natural_stype();
        Self {
            value: Some(value),
            stype,
            nrows,
        }
    }

    #[must_use]
    pub fn na(stype: SType, nrows: usize) -> Self {
        Self {
            value: None,
            stype,
            nrows,
        }
    }

    fn int<T: TryFrom<i64> + NaSentinel>(&self) -> Option<T> {
        match self.value {
            Some(Value::Int(v)) => T::try_from(v).ok().filter(|x| !x.is_na()),
            _ => None,
        }
    }

    fn float(&self) -> Option<f64> {
        match self.value {
            Some(Value::Float(v)) if !v.is_nan() => Some(v),
            _ => None,
        }
    }
}

impl ColumnImpl for ConstColumn {
    fn nrows(&self) -> usize {
        self.nrows
    }

    fn stype(&self) -> SType {
        self.stype
    }

    fn clone_impl(&self) -> Box<dyn ColumnImpl> {
        Box::new(self.clone())
    }

    fn get_bool(&self, _i: usize) -> Option<bool> {
        match self.value {
            Some(Value::Bool(b)) => Some(b),
            _ => None,
        }
    }

    fn get_i8(&self, _i: usize) -> Option<i8> {
        self.int()
    }

    fn get_i16(&self, _i: usize) -> Option<i16> {
        self.int()
    }

    fn get_i32(&self, _i: usize) -> Option<i32> {
        self.int()
    }

    fn get_i64(&self, _i: usize) -> Option<i64> {
        self.int()
    }

    #[allow(clippy::cast_possible_truncation)]
    fn get_f32(&self, _i: usize) -> Option<f32> {
        self.float().map(|v| v as f32)
    }

    fn get_f64(&self, _i: usize) -> Option<f64> {
        self.float()
    }

    fn get_str(&self, _i: usize) -> Option<Cow<'_, str>> {
        match &self.value {
            Some(Value::Str(s)) => Some(Cow::Borrowed(s.as_str())),
            _ => None,
        }
    }

    /// Void columns have no storage at all, so an NA constant of type void is
    /// already materialized.
    fn is_virtual(&self) -> bool {
        self.stype != SType::Void
    }

    fn fold_rowindex(&self, ri: &RowIndex) -> Option<Column> {
        if self.value.is_none() || !ri.has_missing() {
            Some(Column::new(Self {
                value: self.value.clone(),
                stype: self.stype,
                nrows: ri.size(),
            }))
        } else {
            None
        }
    }
}
