//! Storage types, logical types, NA sentinels and boxed values.
//!
//! Fixed-width columns mark missing values in-band:
//!
//! | stype     | storage | NA          |
//! |-----------|---------|-------------|
//! | `Bool`    | `i8`    | `-128`      |
//! | `Int8`..  | `iN`    | `iN::MIN`   |
//! | `Float*`  | `fN`    | any NaN     |
//! | `Str32/64`| offsets | high bit of the end offset |

use serde::{Deserialize, Serialize};
use std::fmt;

/// Physical storage type of a column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SType {
    Void,
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Str32,
    Str64,
}

/// Logical category of an [`SType`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LType {
    Void,
    Bool,
    Int,
    Real,
    Str,
}

impl SType {
    /// Size in bytes of one element in the primary data buffer.
    ///
    /// For string types this is the width of one offset.
    #[must_use]
    pub const fn elemsize(self) -> usize {
        match self {
            SType::Void => 0,
            SType::Bool | SType::Int8 => 1,
            SType::Int16 => 2,
            SType::Int32 | SType::Float32 | SType::Str32 => 4,
            SType::Int64 | SType::Float64 | SType::Str64 => 8,
        }
    }

    #[must_use]
    pub const fn ltype(self) -> LType {
        match self {
            SType::Void => LType::Void,
            SType::Bool => LType::Bool,
            SType::Int8 | SType::Int16 | SType::Int32 | SType::Int64 => LType::Int,
            SType::Float32 | SType::Float64 => LType::Real,
            SType::Str32 | SType::Str64 => LType::Str,
        }
    }

    /// Short code used in metadata and debug output.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            SType::Void => "n0",
            SType::Bool => "b1",
            SType::Int8 => "i1",
            SType::Int16 => "i2",
            SType::Int32 => "i4",
            SType::Int64 => "i8",
            SType::Float32 => "r4",
            SType::Float64 => "r8",
            SType::Str32 => "s4",
            SType::Str64 => "s8",
        }
    }

    #[must_use]
    pub const fn is_string(self) -> bool {
        matches!(self, SType::Str32 | SType::Str64)
    }

    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(
            self.ltype(),
            LType::Bool | LType::Int | LType::Real
        )
    }

    /// Smallest string stype able to address `nbytes` of character data.
    #[must_use]
    pub fn str_for_size(nbytes: usize) -> SType {
        if (nbytes as u64) < u64::from(STR32_NA_BIT) {
            SType::Str32
        } else {
            SType::Str64
        }
    }
}

impl fmt::Display for SType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SType::Void => "void",
            SType::Bool => "bool8",
            SType::Int8 => "int8",
            SType::Int16 => "int16",
            SType::Int32 => "int32",
            SType::Int64 => "int64",
            SType::Float32 => "float32",
            SType::Float64 => "float64",
            SType::Str32 => "str32",
            SType::Str64 => "str64",
        };
        f.write_str(name)
    }
}

pub const BOOL_NA: i8 = i8::MIN;
pub const STR32_NA_BIT: u32 = 1 << 31;
pub const STR64_NA_BIT: u64 = 1 << 63;

/// Plain-old-data element that can be reinterpreted from raw buffer bytes.
///
/// # Safety
///
/// Implementors must be valid for every bit pattern and contain no padding.
pub unsafe trait Pod: Copy + Send + Sync + 'static {}

unsafe impl Pod for u8 {}
unsafe impl Pod for i8 {}
unsafe impl Pod for i16 {}
unsafe impl Pod for i32 {}
unsafe impl Pod for i64 {}
unsafe impl Pod for u32 {}
unsafe impl Pod for u64 {}
unsafe impl Pod for f32 {}
unsafe impl Pod for f64 {}

/// Fixed-width element with an in-band NA sentinel.
pub trait NaSentinel: Pod {
    const NA: Self;
    fn is_na(self) -> bool;
}

macro_rules! int_sentinel {
    ($($t:ty),*) => {
        $(
            impl NaSentinel for $t {
                const NA: Self = <$t>::MIN;
                #[inline]
                fn is_na(self) -> bool {
                    self == <$t>::MIN
                }
            }
        )*
    };
}
int_sentinel!(i8, i16, i32, i64);

impl NaSentinel for f32 {
    const NA: Self = f32::NAN;
    #[inline]
    fn is_na(self) -> bool {
        self.is_nan()
    }
}

impl NaSentinel for f64 {
    const NA: Self = f64::NAN;
    #[inline]
    fn is_na(self) -> bool {
        self.is_nan()
    }
}

/// A single boxed element, used for generic access and constants.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    /// The narrowest stype that can hold this value without loss.
    #[must_use]
    pub fn natural_stype(&self) -> SType {
        match self {
            Value::Bool(_) => SType::Bool,
            Value::Int(v) => {
                if i32::try_from(*v).is_ok_and(|x| x != i32::MIN) {
                    SType::Int32
                } else {
                    SType::Int64
                }
            }
            Value::Float(_) => SType::Float64,
            Value::Str(s) => SType::str_for_size(s.len()),
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Bool(b) => Some(f64::from(u8::from(*b))),
            #[allow(clippy::cast_precision_loss)]
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Str(_) => None,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(s) => f.write_str(s),
        }
    }
}
