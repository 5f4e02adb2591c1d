//! Lazy type conversion.
//!
//! | from \ to  | bool | int | real | str |
//! |------------|------|-----|------|-----|
//! | bool       | =    | 0/1 | 0/1  | `True`/`False` |
//! | int        | ≠0   | range-checked | exact or rounded | decimal |
//! | real       | ≠0   | truncated, range-checked | f64→f32 range-checked | decimal |
//! | str        | parsed | parsed | parsed | = |
//!
//! Values that cannot be represented in the target type become NA, as do
//! strings that fail to parse. Void columns cast to an NA column of any type.

use super::{Column, ColumnImpl};
use crate::error::FrameError;
use crate::stype::{LType, NaSentinel, SType, Value};
use anyhow::Result;
use std::borrow::Cow;

#[derive(Clone, Debug)]
pub struct CastColumn {
    child: Column,
    stype: SType,
}

pub(crate) fn cast(col: &Column, stype: SType) -> Result<Column> {
    let from = col.stype();
    if from == stype {
        return Ok(col.clone());
    }
    if from == SType::Void {
        return Ok(Column::new_na(stype, col.nrows()));
    }
    if stype == SType::Void {
        return Err(FrameError::type_error(format!("cannot cast {from} column to void")).into());
    }
    let cast = Column::new(CastColumn {
        child: col.clone(),
        stype,
    });
    // Parsing or formatting strings on every access is expensive.
    let parses = from.is_string() != stype.is_string();
    Ok(if parses { cast.to_latent() } else { cast })
}

impl CastColumn {
    /// # Errors
    /// Type error for a cast to void.
    pub fn new(child: Column, stype: SType) -> Result<Self> {
        if stype == SType::Void && child.stype() != SType::Void {
            return Err(FrameError::type_error(format!(
                "cannot cast {} column to void",
                child.stype()
            ))
            .into());
        }
        Ok(Self { child, stype })
    }

    fn source_i64(&self, i: usize) -> Option<i64> {
        match self.child.ltype() {
            LType::Bool | LType::Int => self.child.get_as_i64(i),
            LType::Real => self.child.get_as_f64(i).and_then(float_to_i64),
            LType::Str => self.child.get_str(i).and_then(|s| parse_i64(&s)),
            LType::Void => None,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn source_f64(&self, i: usize) -> Option<f64> {
        match self.child.ltype() {
            LType::Bool | LType::Int | LType::Real => self.child.get_as_f64(i),
            LType::Str => self
                .child
                .get_str(i)
                .and_then(|s| s.trim().parse::<f64>().ok())
                .filter(|v| !v.is_nan()),
            LType::Void => None,
        }
    }

    fn narrow<T: TryFrom<i64> + NaSentinel>(&self, i: usize) -> Option<T> {
        self.source_i64(i)
            .and_then(|v| T::try_from(v).ok())
            .filter(|v| !v.is_na())
    }
}

fn parse_i64(s: &str) -> Option<i64> {
    let s = s.trim();
    s.parse::<i64>()
        .ok()
        .or_else(|| s.parse::<f64>().ok().and_then(float_to_i64))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn float_to_i64(v: f64) -> Option<i64> {
    if !v.is_finite() {
        return None;
    }
    let t = v.trunc();
    // i64::MIN is the NA sentinel, so the valid range is open on both ends.
    if t <= i64::MIN as f64 || t >= i64::MAX as f64 {
        return None;
    }
    Some(t as i64)
}

pub(crate) fn parse_bool(s: &str) -> Option<bool> {
    match s.trim() {
        "True" | "true" | "TRUE" | "1" => Some(true),
        "False" | "false" | "FALSE" | "0" => Some(false),
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn f64_to_f32(v: f64) -> Option<f32> {
    if v.is_nan() || (v.is_finite() && v.abs() > f64::from(f32::MAX)) {
        return None;
    }
    Some(v as f32)
}

impl ColumnImpl for CastColumn {
    fn nrows(&self) -> usize {
        self.child.nrows()
    }

    fn stype(&self) -> SType {
        self.stype
    }

    fn clone_impl(&self) -> Box<dyn ColumnImpl> {
        Box::new(self.clone())
    }

    fn get_bool(&self, i: usize) -> Option<bool> {
        match self.child.ltype() {
            LType::Bool | LType::Int => self.child.get_as_i64(i).map(|v| v != 0),
            LType::Real => self.child.get_as_f64(i).map(|v| v != 0.0),
            LType::Str => self.child.get_str(i).and_then(|s| parse_bool(&s)),
            LType::Void => None,
        }
    }

    fn get_i8(&self, i: usize) -> Option<i8> {
        self.narrow(i)
    }

    fn get_i16(&self, i: usize) -> Option<i16> {
        self.narrow(i)
    }

    fn get_i32(&self, i: usize) -> Option<i32> {
        self.narrow(i)
    }

    fn get_i64(&self, i: usize) -> Option<i64> {
        self.narrow(i)
    }

    fn get_f32(&self, i: usize) -> Option<f32> {
        self.source_f64(i).and_then(f64_to_f32)
    }

    fn get_f64(&self, i: usize) -> Option<f64> {
        self.source_f64(i)
    }

    fn get_str(&self, i: usize) -> Option<Cow<'_, str>> {
        if self.child.ltype() == LType::Str {
            return self.child.imp().get_str(i);
        }
        let value = match self.child.ltype() {
            LType::Real if self.child.stype() == SType::Float32 => self
                .child
                .imp()
                .get_f32(i)
                .map(|v| Value::Str(v.to_string())),
            _ => self.child.get_value(i),
        }?;
        Some(Cow::Owned(value.to_string()))
    }

    fn n_children(&self) -> usize {
        1
    }

    fn child(&self, i: usize) -> &Column {
        assert_eq!(i, 0, "a cast has a single child");
        &self.child
    }
}
