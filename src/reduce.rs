//! Per-group reductions.
//!
//! Every reducer follows the same accumulate protocol (`create`, `add_input`,
//! `finish`) over the non-NA values of one group. [`evaluate`] picks the
//! reducer for a [`ReduceOp`] and the logical type of the source column, so
//! that a single code path serves every element type.
//!
//! Reductions come in two flavours ([`Grouping`]):
//!
//! - **gto-all**: the source has one row per *row* of the grouped frame; the
//!   result is a lazy [`ReduceColumn`] with one row per group.
//! - **gto-one**: the source already has one row per *group* (it is constant
//!   within each group), so results are derived from the group sizes and
//!   computed eagerly.
//!
//! Integer sums and products widen to `Int64`. A result that overflows
//! `Int64` is NA.
//!
//! ```
//! use ironframe::{Column, Groupby, reduce::{reduce, Grouping, ReduceOp}};
//!
//! let values = Column::from_slice(&[10i32, 20, 30, 40, 0, 60]);
//! let gby = Groupby::from_offsets(vec![0, 2, 5, 6]).unwrap();
//! let sums = reduce(ReduceOp::Sum, &values, &gby, Grouping::GtoAll).unwrap();
//! assert_eq!(sums.to_vec::<i64>(), vec![Some(30), Some(70), Some(60)]);
//! ```

use crate::column::{Column, ColumnImpl};
use crate::error::FrameError;
use crate::groupby::Groupby;
use crate::parallel::ThreadPool;
use crate::stype::{LType, NaSentinel, SType, Value};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReduceOp {
    /// Number of non-NA values.
    Count,
    /// Number of NA values.
    CountNa,
    Sum,
    Prod,
    Mean,
    /// Sample standard deviation (`n - 1` denominator).
    Sd,
    Min,
    Max,
    First,
    Last,
}

/// How source rows relate to groups.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Grouping {
    /// One source row per group.
    GtoOne,
    /// One source row per grouped row.
    GtoAll,
}

impl ReduceOp {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            ReduceOp::Count => "count",
            ReduceOp::CountNa => "countna",
            ReduceOp::Sum => "sum",
            ReduceOp::Prod => "prod",
            ReduceOp::Mean => "mean",
            ReduceOp::Sd => "sd",
            ReduceOp::Min => "min",
            ReduceOp::Max => "max",
            ReduceOp::First => "first",
            ReduceOp::Last => "last",
        }
    }

    /// Stype of the reduction of an `input` column.
    ///
    /// # Errors
    /// Type error for arithmetic or ordering reductions of string columns.
    pub fn output_stype(self, input: SType) -> Result<SType> {
        let lt = input.ltype();
        let out = match self {
            ReduceOp::Count | ReduceOp::CountNa => Some(SType::Int64),
            ReduceOp::First | ReduceOp::Last => Some(input),
            ReduceOp::Sum | ReduceOp::Prod => match lt {
                LType::Void | LType::Bool | LType::Int => Some(SType::Int64),
                LType::Real => Some(input),
                LType::Str => None,
            },
            ReduceOp::Mean | ReduceOp::Sd => match input {
                SType::Float32 => Some(SType::Float32),
                _ if lt == LType::Str => None,
                _ => Some(SType::Float64),
            },
            ReduceOp::Min | ReduceOp::Max => (lt != LType::Str).then_some(input),
        };
        out.ok_or_else(|| {
            FrameError::type_error(format!("cannot compute {self} of a {input} column")).into()
        })
    }
}

impl fmt::Display for ReduceOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ReduceOp {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "count" => ReduceOp::Count,
            "countna" => ReduceOp::CountNa,
            "sum" => ReduceOp::Sum,
            "prod" => ReduceOp::Prod,
            "mean" => ReduceOp::Mean,
            "sd" => ReduceOp::Sd,
            "min" => ReduceOp::Min,
            "max" => ReduceOp::Max,
            "first" => ReduceOp::First,
            "last" => ReduceOp::Last,
            other => {
                return Err(FrameError::value(format!("unknown reduction {other:?}")).into());
            }
        })
    }
}

/// Accumulate protocol shared by the reducers below.
trait Reducer<T> {
    type Acc;
    fn create(&self) -> Self::Acc;
    fn add_input(&self, acc: &mut Self::Acc, v: T);
    fn finish(&self, acc: Self::Acc) -> Option<Value>;
}

/// Arithmetic over the two accumulation domains. `None` means overflow.
trait Num: Copy + PartialOrd {
    const ZERO: Self;
    const ONE: Self;
    fn plus(self, other: Self) -> Option<Self>;
    fn times(self, other: Self) -> Option<Self>;
    fn into_value(self) -> Value;
}

impl Num for i64 {
    const ZERO: Self = 0;
    const ONE: Self = 1;
    fn plus(self, other: Self) -> Option<Self> {
        self.checked_add(other)
    }
    fn times(self, other: Self) -> Option<Self> {
        self.checked_mul(other)
    }
    fn into_value(self) -> Value {
        Value::Int(self)
    }
}

impl Num for f64 {
    const ZERO: Self = 0.0;
    const ONE: Self = 1.0;
    fn plus(self, other: Self) -> Option<Self> {
        Some(self + other)
    }
    fn times(self, other: Self) -> Option<Self> {
        Some(self * other)
    }
    fn into_value(self) -> Value {
        Value::Float(self)
    }
}

fn fold<T, R: Reducer<T>>(r: &R, values: impl Iterator<Item = T>) -> Option<Value> {
    let mut acc = r.create();
    for v in values {
        r.add_input(&mut acc, v);
    }
    r.finish(acc)
}

/* ===================== Sum<T> ===================== */

struct Sum<T>(PhantomData<T>);

impl<T: Num> Reducer<T> for Sum<T> {
    type Acc = Option<T>;
    fn create(&self) -> Option<T> {
        Some(T::ZERO)
    }
    fn add_input(&self, acc: &mut Option<T>, v: T) {
        *acc = acc.and_then(|a| a.plus(v));
    }
    fn finish(&self, acc: Option<T>) -> Option<Value> {
        acc.map(Num::into_value)
    }
}

/* ===================== Prod<T> ===================== */

struct Prod<T>(PhantomData<T>);

impl<T: Num> Reducer<T> for Prod<T> {
    type Acc = Option<T>;
    fn create(&self) -> Option<T> {
        Some(T::ONE)
    }
    fn add_input(&self, acc: &mut Option<T>, v: T) {
        *acc = acc.and_then(|a| a.times(v));
    }
    fn finish(&self, acc: Option<T>) -> Option<Value> {
        acc.map(Num::into_value)
    }
}

/* ===================== Min<T> / Max<T> ===================== */

struct Extreme<T> {
    keep_larger: bool,
    _marker: PhantomData<T>,
}

impl<T: Num> Reducer<T> for Extreme<T> {
    type Acc = Option<T>;
    fn create(&self) -> Option<T> {
        None
    }
    fn add_input(&self, acc: &mut Option<T>, v: T) {
        match acc {
            Some(cur) => {
                if (self.keep_larger && v > *cur) || (!self.keep_larger && v < *cur) {
                    *cur = v;
                }
            }
            None => *acc = Some(v),
        }
    }
    fn finish(&self, acc: Option<T>) -> Option<Value> {
        acc.map(Num::into_value)
    }
}

/* ===================== Mean ===================== */

struct Mean;

impl Reducer<f64> for Mean {
    type Acc = (f64, usize);
    fn create(&self) -> (f64, usize) {
        (0.0, 0)
    }
    fn add_input(&self, acc: &mut (f64, usize), v: f64) {
        acc.0 += v;
        acc.1 += 1;
    }
    #[allow(clippy::cast_precision_loss)]
    fn finish(&self, (sum, n): (f64, usize)) -> Option<Value> {
        (n > 0).then(|| Value::Float(sum / n as f64))
    }
}

/* ===================== Sd (Welford) ===================== */

struct Sd;

impl Reducer<f64> for Sd {
    /// (count, mean, sum of squared deviations)
    type Acc = (usize, f64, f64);
    fn create(&self) -> Self::Acc {
        (0, 0.0, 0.0)
    }
    #[allow(clippy::cast_precision_loss)]
    fn add_input(&self, acc: &mut Self::Acc, v: f64) {
        acc.0 += 1;
        let delta = v - acc.1;
        acc.1 += delta / acc.0 as f64;
        acc.2 += delta * (v - acc.1);
    }
    #[allow(clippy::cast_precision_loss)]
    fn finish(&self, (n, _, m2): Self::Acc) -> Option<Value> {
        (n > 1).then(|| Value::Float((m2 / (n - 1) as f64).sqrt()))
    }
}

fn fold_numeric<T: Num>(op: ReduceOp, values: impl Iterator<Item = T>) -> Option<Value> {
    match op {
        ReduceOp::Sum => fold(&Sum(PhantomData), values),
        ReduceOp::Prod => fold(&Prod(PhantomData), values),
        ReduceOp::Min | ReduceOp::Max => fold(
            &Extreme {
                keep_larger: op == ReduceOp::Max,
                _marker: PhantomData,
            },
            values,
        ),
        _ => None,
    }
}

/// Reduce rows `i0..i1` of `src`.
///
/// `op` must be valid for the column's stype (see [`ReduceOp::output_stype`]).
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn evaluate(op: ReduceOp, src: &Column, i0: usize, i1: usize) -> Option<Value> {
    let rows = i0..i1;
    match op {
        ReduceOp::Count => Some(Value::Int(rows.filter(|&r| !src.is_na(r)).count() as i64)),
        ReduceOp::CountNa => Some(Value::Int(rows.filter(|&r| src.is_na(r)).count() as i64)),
        ReduceOp::First => (i0 < i1).then(|| src.get_value(i0)).flatten(),
        ReduceOp::Last => (i0 < i1).then(|| src.get_value(i1 - 1)).flatten(),
        ReduceOp::Mean => fold(&Mean, rows.filter_map(|r| src.get_as_f64(r))),
        ReduceOp::Sd => fold(&Sd, rows.filter_map(|r| src.get_as_f64(r))),
        ReduceOp::Sum | ReduceOp::Prod | ReduceOp::Min | ReduceOp::Max => match src.ltype() {
            LType::Real => fold_numeric(op, rows.filter_map(|r| src.get_as_f64(r))),
            LType::Str => None,
            _ => fold_numeric(op, rows.filter_map(|r| src.get_as_i64(r))),
        },
    }
}

/// Result of reducing a single value repeated `n` times.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
fn evaluate_repeated(op: ReduceOp, v: Option<Value>, n: usize) -> Option<Value> {
    let ni = n as i64;
    match (op, v) {
        (ReduceOp::Count, v) => Some(Value::Int(if v.is_some() { ni } else { 0 })),
        (ReduceOp::CountNa, v) => Some(Value::Int(if v.is_some() { 0 } else { ni })),
        (ReduceOp::Sum, None) => Some(Value::Int(0)),
        (ReduceOp::Prod, None) => Some(Value::Int(1)),
        (_, None) => None,
        (_, Some(_)) if n == 0 => match op {
            ReduceOp::Sum => Some(Value::Int(0)),
            ReduceOp::Prod => Some(Value::Int(1)),
            _ => None,
        },
        (ReduceOp::Sum, Some(Value::Float(x))) => Some(Value::Float(x * n as f64)),
        (ReduceOp::Sum, Some(Value::Int(x))) => x.checked_mul(ni).map(Value::Int),
        (ReduceOp::Sum, Some(Value::Bool(b))) => Some(Value::Int(i64::from(b) * ni)),
        (ReduceOp::Prod, Some(Value::Float(x))) => Some(Value::Float(x.powf(n as f64))),
        (ReduceOp::Prod, Some(Value::Int(x))) => {
            u32::try_from(n).ok().and_then(|e| x.checked_pow(e)).map(Value::Int)
        }
        (ReduceOp::Prod, Some(Value::Bool(b))) => Some(Value::Int(i64::from(b))),
        (ReduceOp::Mean, Some(v)) => v.as_f64().map(Value::Float),
        (ReduceOp::Sd, Some(_)) => (n > 1).then_some(Value::Float(0.0)),
        (_, v) => v,
    }
}

/// Lazy per-group reduction of a source column.
///
/// Computes each group's value from the source rows on access; never holds a
/// buffer of its own.
#[derive(Clone, Debug)]
pub struct ReduceColumn {
    op: ReduceOp,
    source: Column,
    gby: Groupby,
    stype: SType,
}

impl ReduceColumn {
    /// # Errors
    /// Type error if `op` does not apply to the source stype; value error if
    /// the groups do not cover the source rows exactly.
    pub fn new(op: ReduceOp, source: Column, gby: Groupby) -> Result<Self> {
        let stype = op.output_stype(source.stype())?;
        if gby.nrows() != source.nrows() {
            return Err(FrameError::value(format!(
                "groupby covers {} rows, but the column has {}",
                gby.nrows(),
                source.nrows()
            ))
            .into());
        }
        Ok(Self {
            op,
            source,
            gby,
            stype,
        })
    }

    fn value(&self, g: usize) -> Option<Value> {
        let (i0, i1) = self.gby.group(g);
        evaluate(self.op, &self.source, i0, i1)
    }

    fn int<T: TryFrom<i64> + NaSentinel>(&self, g: usize) -> Option<T> {
        match self.value(g)? {
            Value::Int(v) => T::try_from(v).ok().filter(|x| !x.is_na()),
            Value::Bool(b) => T::try_from(i64::from(b)).ok(),
            _ => None,
        }
    }
}

impl ColumnImpl for ReduceColumn {
    fn nrows(&self) -> usize {
        self.gby.size()
    }

    fn stype(&self) -> SType {
        self.stype
    }

    fn clone_impl(&self) -> Box<dyn ColumnImpl> {
        Box::new(self.clone())
    }

    fn get_bool(&self, g: usize) -> Option<bool> {
        match self.value(g)? {
            Value::Bool(b) => Some(b),
            Value::Int(v) => Some(v != 0),
            _ => None,
        }
    }

    fn get_i8(&self, g: usize) -> Option<i8> {
        self.int(g)
    }

    fn get_i16(&self, g: usize) -> Option<i16> {
        self.int(g)
    }

    fn get_i32(&self, g: usize) -> Option<i32> {
        self.int(g)
    }

    fn get_i64(&self, g: usize) -> Option<i64> {
        self.int(g)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn get_f32(&self, g: usize) -> Option<f32> {
        self.value(g)?.as_f64().map(|v| v as f32)
    }

    fn get_f64(&self, g: usize) -> Option<f64> {
        self.value(g)?.as_f64()
    }

    fn get_str(&self, g: usize) -> Option<Cow<'_, str>> {
        match self.value(g)? {
            Value::Str(s) => Some(Cow::Owned(s)),
            _ => None,
        }
    }

    fn n_children(&self) -> usize {
        1
    }

    fn child(&self, i: usize) -> &Column {
        assert_eq!(i, 0, "a reduction has a single child");
        &self.source
    }
}

/// Reduce `col` per group of `gby`.
///
/// # Errors
/// Type error if `op` does not apply to the column's stype; value error if
/// the column length does not match the grouping.
pub fn reduce(op: ReduceOp, col: &Column, gby: &Groupby, grouping: Grouping) -> Result<Column> {
    match grouping {
        Grouping::GtoAll => Ok(Column::new(ReduceColumn::new(op, col.clone(), gby.clone())?)),
        Grouping::GtoOne => {
            let stype = op.output_stype(col.stype())?;
            if col.nrows() != gby.size() {
                return Err(FrameError::value(format!(
                    "expected one row per group ({}), got {} rows",
                    gby.size(),
                    col.nrows()
                ))
                .into());
            }
            let values: Vec<Option<Value>> = gby
                .iter()
                .enumerate()
                .map(|(g, (i0, i1))| evaluate_repeated(op, col.get_value(g), i1 - i0))
                .collect();
            Column::from_values(stype, &values)
        }
    }
}

/// [`reduce`] over all rows of `col`, materialized on the thread pool.
///
/// # Errors
/// See [`reduce`]; also propagates scheduler errors.
pub fn reduce_par(pool: &ThreadPool, op: ReduceOp, col: &Column, gby: &Groupby) -> Result<Column> {
    reduce(op, col, gby, Grouping::GtoAll)?.materialize_par(pool)
}

/// Size of each group, as an `Int64` column.
#[must_use]
pub fn count_rows(gby: &Groupby) -> Column {
    let sizes: Vec<i64> = gby.iter().map(|(a, b)| (b - a) as i64).collect();
    Column::from_slice(&sizes)
}

/// Zero for each group: a nullary column has no NAs.
#[must_use]
pub fn countna_rows(gby: &Groupby) -> Column {
    Column::from_slice(&vec![0i64; gby.size()])
}
