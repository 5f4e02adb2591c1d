//! Columns: a cheap, shareable handle over a polymorphic implementation.
//!
//! A [`Column`] wraps an `Arc` of some [`ColumnImpl`]. Cloning a column shares
//! the implementation; operations that "change" a column (casting, applying a
//! row index, materializing) build a new implementation, usually a *virtual*
//! one that computes its elements on demand from child columns:
//!
//! - [`FixedColumn`] / [`StringColumn`] own their buffers (materialized)
//! - [`SliceView`] / [`ArrayView`] select rows of a child
//! - [`ConstColumn`] repeats one value (or NA)
//! - [`LatentColumn`] defers materialization of a child until first access
//! - [`CastColumn`] converts elements of a child to another stype
//! - [`RegexMatchColumn`] tests strings of a child against a pattern
//! - [`crate::reduce::ReduceColumn`] aggregates a child per group
//!
//! Views never nest: applying a row index to a view folds the two selections
//! into one (see [`ColumnImpl::fold_rowindex`]).
//!
//! ```
//! use ironframe::{Column, RowIndex};
//!
//! let col = Column::from_options(&[Some(1i32), None, Some(3), Some(4)]);
//! let tail = col.apply_rowindex(&RowIndex::slice(1, 3, 1).unwrap());
//! assert_eq!(tail.to_vec::<i32>(), vec![None, Some(3), Some(4)]);
//! ```

pub mod cast;
pub mod constant;
pub mod fixed;
pub mod latent;
pub(crate) mod materialize;
pub mod re_match;
pub mod string;
pub mod view;

#[cfg(feature = "arrow-ffi")]
pub mod arrow;

pub use cast::CastColumn;
pub use constant::ConstColumn;
pub use fixed::FixedColumn;
pub use latent::LatentColumn;
pub use re_match::RegexMatchColumn;
pub use string::{StringBuilder, StringColumn};
pub use view::{ArrayView, SliceView};

use crate::buffer::Buffer;
use crate::error::FrameError;
use crate::parallel::ThreadPool;
use crate::rowindex::RowIndex;
use crate::stats::Stats;
use crate::stype::{BOOL_NA, LType, Pod, SType, Value};
use anyhow::Result;
use paste::paste;
use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, OnceLock};

#[cold]
#[track_caller]
fn unsupported(stype: SType, what: &str) -> ! {
    panic!("cannot retrieve {what} values from a column of type {stype}")
}

/// Behaviour shared by every kind of column.
///
/// Getters return `None` for NA. A column only answers the getter matching
/// its own [`SType`]; asking for another element type is a programming error
/// and panics. Row indices must be `< nrows()`.
pub trait ColumnImpl: Send + Sync + fmt::Debug {
    fn nrows(&self) -> usize;

    fn stype(&self) -> SType;

    /// New implementation of the same kind sharing children and buffers.
    fn clone_impl(&self) -> Box<dyn ColumnImpl>;

    fn get_bool(&self, _i: usize) -> Option<bool> {
        unsupported(self.stype(), "bool")
    }
    fn get_i8(&self, _i: usize) -> Option<i8> {
        unsupported(self.stype(), "int8")
    }
    fn get_i16(&self, _i: usize) -> Option<i16> {
        unsupported(self.stype(), "int16")
    }
    fn get_i32(&self, _i: usize) -> Option<i32> {
        unsupported(self.stype(), "int32")
    }
    fn get_i64(&self, _i: usize) -> Option<i64> {
        unsupported(self.stype(), "int64")
    }
    fn get_f32(&self, _i: usize) -> Option<f32> {
        unsupported(self.stype(), "float32")
    }
    fn get_f64(&self, _i: usize) -> Option<f64> {
        unsupported(self.stype(), "float64")
    }
    fn get_str(&self, _i: usize) -> Option<Cow<'_, str>> {
        unsupported(self.stype(), "string")
    }

    /// Whether elements are computed rather than read from owned buffers.
    fn is_virtual(&self) -> bool {
        true
    }

    fn n_children(&self) -> usize {
        0
    }

    fn child(&self, i: usize) -> &Column {
        panic!("{:?} has no child #{i}", self)
    }

    /// Number of raw buffers exposed for zero-copy export.
    fn num_buffers(&self) -> usize {
        0
    }

    fn get_buffer(&self, _i: usize) -> Option<&Buffer> {
        None
    }

    /// Absorb a row index without adding a layer, if this kind of column can.
    fn fold_rowindex(&self, _ri: &RowIndex) -> Option<Column> {
        None
    }
}

/// Rust types that can be read out of a column with [`Column::get_element`].
pub trait Element: Sized {
    /// Stype of a column built from values of this type.
    const STYPE: SType;

    fn get(col: &dyn ColumnImpl, i: usize) -> Option<Self>;
}

macro_rules! impl_element {
    ($($t:ty => $suffix:ident, $stype:ident);* $(;)?) => {
        paste! {
            $(
                impl Element for $t {
                    const STYPE: SType = SType::$stype;

                    #[inline]
                    fn get(col: &dyn ColumnImpl, i: usize) -> Option<Self> {
                        col.[<get_ $suffix>](i)
                    }
                }
            )*
        }
    };
}

impl_element! {
    bool => bool, Bool;
    i8 => i8, Int8;
    i16 => i16, Int16;
    i32 => i32, Int32;
    i64 => i64, Int64;
    f32 => f32, Float32;
    f64 => f64, Float64;
}

impl Element for String {
    const STYPE: SType = SType::Str32;

    fn get(col: &dyn ColumnImpl, i: usize) -> Option<Self> {
        col.get_str(i).map(Cow::into_owned)
    }
}

/// Fixed-width element types with a raw storage representation.
pub trait FixedType: Element + Copy {
    type Raw: Pod;
    const NA_RAW: Self::Raw;

    fn to_raw(self) -> Self::Raw;
}

macro_rules! impl_fixed_native {
    ($($t:ty),*) => {
        $(
            impl FixedType for $t {
                type Raw = $t;
                const NA_RAW: $t = <$t as crate::stype::NaSentinel>::NA;

                #[inline]
                fn to_raw(self) -> $t {
                    self
                }
            }
        )*
    };
}
impl_fixed_native!(i8, i16, i32, i64, f32, f64);

impl FixedType for bool {
    type Raw = i8;
    const NA_RAW: i8 = BOOL_NA;

    #[inline]
    fn to_raw(self) -> i8 {
        i8::from(self)
    }
}

struct ColumnInner {
    imp: Box<dyn ColumnImpl>,
    stats: OnceLock<Stats>,
}

/// Shared handle to a column implementation.
#[derive(Clone)]
pub struct Column {
    inner: Arc<ColumnInner>,
}

impl Column {
    pub fn new(imp: impl ColumnImpl + 'static) -> Self {
        Self::from_box(Box::new(imp))
    }

    #[must_use]
    pub fn from_box(imp: Box<dyn ColumnImpl>) -> Self {
        Self {
            inner: Arc::new(ColumnInner {
                imp,
                stats: OnceLock::new(),
            }),
        }
    }

    /// Build a materialized column from raw values; in-band sentinels
    /// (`MIN` for integers, NaN for floats) become NA.
    #[must_use]
    pub fn from_slice<T: FixedType>(values: &[T]) -> Self {
        let raw: Vec<T::Raw> = values.iter().map(|v| v.to_raw()).collect();
        Self::new(FixedColumn::from_vec(T::STYPE, raw))
    }

    #[must_use]
    pub fn from_options<T: FixedType>(values: &[Option<T>]) -> Self {
        let raw: Vec<T::Raw> = values
            .iter()
            .map(|v| v.map_or(T::NA_RAW, FixedType::to_raw))
            .collect();
        Self::new(FixedColumn::from_vec(T::STYPE, raw))
    }

    pub fn from_strs<S: AsRef<str>>(values: &[Option<S>]) -> Self {
        let mut builder = StringBuilder::with_capacity(values.len());
        for v in values {
            builder.push(v.as_ref().map(AsRef::as_ref));
        }
        builder.finish()
    }

    /// Build a materialized column of `stype` from boxed values.
    ///
    /// # Errors
    /// Type error if a value cannot be represented in `stype`.
    pub fn from_values(stype: SType, values: &[Option<Value>]) -> Result<Self> {
        materialize::from_values(stype, values)
    }

    /// A column of `nrows` NAs of the given type, without storage.
    #[must_use]
    pub fn new_na(stype: SType, nrows: usize) -> Self {
        Self::new(ConstColumn::na(stype, nrows))
    }

    /// `value` repeated `nrows` times, without storage.
    #[must_use]
    pub fn constant(value: Value, nrows: usize) -> Self {
        Self::new(ConstColumn::new(value, nrows))
    }

    #[inline]
    #[must_use]
    pub fn imp(&self) -> &dyn ColumnImpl {
        self.inner.imp.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn nrows(&self) -> usize {
        self.imp().nrows()
    }

    #[inline]
    #[must_use]
    pub fn stype(&self) -> SType {
        self.imp().stype()
    }

    #[inline]
    #[must_use]
    pub fn ltype(&self) -> LType {
        self.stype().ltype()
    }

    #[must_use]
    pub fn is_virtual(&self) -> bool {
        self.imp().is_virtual()
    }

    #[must_use]
    pub fn n_children(&self) -> usize {
        self.imp().n_children()
    }

    #[must_use]
    pub fn child(&self, i: usize) -> &Column {
        self.imp().child(i)
    }

    #[must_use]
    pub fn num_buffers(&self) -> usize {
        self.imp().num_buffers()
    }

    #[must_use]
    pub fn get_buffer(&self, i: usize) -> Option<&Buffer> {
        self.imp().get_buffer(i)
    }

    /// True if both handles share one implementation.
    #[must_use]
    pub fn ptr_eq(&self, other: &Column) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Read row `i` as `T`; `None` means NA.
    #[inline]
    #[must_use]
    pub fn get_element<T: Element>(&self, i: usize) -> Option<T> {
        debug_assert!(i < self.nrows(), "row {i} out of range for {} rows", self.nrows());
        T::get(self.imp(), i)
    }

    #[inline]
    #[must_use]
    pub fn get_bool(&self, i: usize) -> Option<bool> {
        self.imp().get_bool(i)
    }

    #[inline]
    #[must_use]
    pub fn get_str(&self, i: usize) -> Option<Cow<'_, str>> {
        self.imp().get_str(i)
    }

    /// Integer view of a boolean or integer column.
    #[must_use]
    pub fn get_as_i64(&self, i: usize) -> Option<i64> {
        let imp = self.imp();
        match self.stype() {
            SType::Bool => imp.get_bool(i).map(i64::from),
            SType::Int8 => imp.get_i8(i).map(i64::from),
            SType::Int16 => imp.get_i16(i).map(i64::from),
            SType::Int32 => imp.get_i32(i).map(i64::from),
            SType::Int64 => imp.get_i64(i),
            _ => None,
        }
    }

    /// Floating-point view of any numeric column.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn get_as_f64(&self, i: usize) -> Option<f64> {
        match self.stype() {
            SType::Float32 => self.imp().get_f32(i).map(f64::from),
            SType::Float64 => self.imp().get_f64(i),
            _ => self.get_as_i64(i).map(|v| v as f64),
        }
    }

    /// Boxed value of row `i`.
    #[must_use]
    pub fn get_value(&self, i: usize) -> Option<Value> {
        match self.ltype() {
            LType::Void => None,
            LType::Bool => self.get_bool(i).map(Value::Bool),
            LType::Int => self.get_as_i64(i).map(Value::Int),
            LType::Real => self.get_as_f64(i).map(Value::Float),
            LType::Str => self.get_str(i).map(|s| Value::Str(s.into_owned())),
        }
    }

    #[must_use]
    pub fn is_na(&self, i: usize) -> bool {
        match self.ltype() {
            LType::Void => true,
            LType::Str => self.get_str(i).is_none(),
            LType::Bool => self.get_bool(i).is_none(),
            LType::Int => self.get_as_i64(i).is_none(),
            LType::Real => self.get_as_f64(i).is_none(),
        }
    }

    #[must_use]
    pub fn to_vec<T: Element>(&self) -> Vec<Option<T>> {
        (0..self.nrows()).map(|i| self.get_element(i)).collect()
    }

    #[must_use]
    pub fn to_values(&self) -> Vec<Option<Value>> {
        (0..self.nrows()).map(|i| self.get_value(i)).collect()
    }

    /// Select rows through `ri`.
    ///
    /// A row index that is entirely NA yields an NA constant; identity
    /// selections return the column itself; views fold instead of nesting.
    /// Every selected row must be `< nrows()` (see [`Column::try_apply_rowindex`]).
    #[must_use]
    pub fn apply_rowindex(&self, ri: &RowIndex) -> Column {
        debug_assert!(ri.check_bounds(self.nrows()).is_ok());
        if ri.is_all_missing() {
            return Column::new_na(self.stype(), ri.size());
        }
        if ri.is_identity() && ri.size() == self.nrows() {
            return self.clone();
        }
        if let Some(folded) = self.imp().fold_rowindex(ri) {
            return folded;
        }
        view::make_view(self.clone(), ri.clone())
    }

    /// Bounds-checked [`Column::apply_rowindex`].
    ///
    /// # Errors
    /// Value error if `ri` references a row outside of this column.
    pub fn try_apply_rowindex(&self, ri: &RowIndex) -> Result<Column> {
        ri.check_bounds(self.nrows())?;
        Ok(self.apply_rowindex(ri))
    }

    /// Convert to another stype.
    ///
    /// Narrowing conversions that cannot represent a value produce NA.
    ///
    /// # Errors
    /// Type error for conversions that are not supported.
    pub fn cast(&self, stype: SType) -> Result<Column> {
        cast::cast(self, stype)
    }

    /// # Errors
    /// See [`Column::cast`]; on error the column is left unchanged.
    pub fn cast_inplace(&mut self, stype: SType) -> Result<()> {
        *self = self.cast(stype)?;
        Ok(())
    }

    /// Test each string against `pattern` (whole-string match).
    ///
    /// # Errors
    /// Type error for non-string columns, value error for an invalid pattern.
    pub fn re_match(&self, pattern: &str) -> Result<Column> {
        Ok(Column::new(RegexMatchColumn::new(self.clone(), pattern)?))
    }

    /// Wrap in a [`LatentColumn`], which materializes on first access.
    #[must_use]
    pub fn to_latent(&self) -> Column {
        if !self.is_virtual() {
            return self.clone();
        }
        Column::new(LatentColumn::new(self.clone()))
    }

    /// Evaluate every row into freshly allocated buffers.
    ///
    /// Materialized columns are returned as-is, so this is idempotent.
    #[must_use]
    pub fn materialize(&self) -> Column {
        if !self.is_virtual() {
            return self.clone();
        }
        materialize::materialize(self)
    }

    pub fn materialize_inplace(&mut self) {
        if self.is_virtual() {
            *self = self.materialize();
        }
    }

    /// [`Column::materialize`] with rows evaluated on the thread pool.
    ///
    /// # Errors
    /// Propagates scheduler errors (for instance when called from inside a
    /// running parallel job).
    pub fn materialize_par(&self, pool: &ThreadPool) -> Result<Column> {
        if !self.is_virtual() {
            return Ok(self.clone());
        }
        materialize::materialize_par(self, pool)
    }

    /// Materialized form that exposes its raw buffers.
    pub(crate) fn materialize_to_buffers(&self) -> Column {
        let m = self.materialize();
        if m.stype() != SType::Void && m.num_buffers() == 0 {
            materialize::materialize(&m)
        } else {
            m
        }
    }

    /// Cached summary statistics, computed on first use.
    pub fn stats(&self) -> &Stats {
        self.inner.stats.get_or_init(|| Stats::compute(self))
    }

    /// Error unless the column holds strings.
    pub(crate) fn expect_string(&self, op: &str) -> Result<()> {
        if self.ltype() == LType::Str {
            Ok(())
        } else {
            Err(FrameError::type_error(format!(
                "{op} cannot be applied to a column of type {}",
                self.stype()
            ))
            .into())
        }
    }
}

impl fmt::Debug for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const PREVIEW: usize = 8;
        let n = self.nrows();
        let head: Vec<String> = (0..n.min(PREVIEW))
            .map(|i| self.get_value(i).map_or_else(|| "NA".to_string(), |v| v.to_string()))
            .collect();
        write!(f, "Column<{}>[{n}] [{}", self.stype(), head.join(", "))?;
        if n > PREVIEW {
            write!(f, ", ...")?;
        }
        write!(f, "] {:?}", self.imp())
    }
}
