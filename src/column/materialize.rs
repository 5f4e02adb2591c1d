//! Evaluating virtual columns into owned buffers.

use super::{Column, ColumnImpl, FixedColumn, StringBuilder};
use crate::buffer::Buffer;
use crate::error::FrameError;
use crate::parallel::{ThreadPool, parallel_for_dynamic};
use crate::stype::{BOOL_NA, LType, NaSentinel, Pod, SType, Value};
use anyhow::Result;
use log::debug;
use std::mem::size_of;
use std::sync::{Mutex, PoisonError};

/// Rows evaluated by one parallel task.
const CHUNK_ROWS: usize = 16 * 1024;

fn fill_fixed<T: Pod>(stype: SType, n: usize, f: impl Fn(usize) -> T) -> Column {
    let mut buf = Buffer::mem(n * size_of::<T>());
    for (i, slot) in buf.make_mut_slice::<T>().iter_mut().enumerate() {
        *slot = f(i);
    }
    Column::new(FixedColumn::from_buffer(stype, n, buf))
}

fn fill_fixed_par<T: Pod>(
    pool: &ThreadPool,
    stype: SType,
    n: usize,
    f: impl Fn(usize) -> T + Sync,
) -> Result<Column> {
    let mut buf = Buffer::mem(n * size_of::<T>());
    {
        let parts: Vec<Mutex<&mut [T]>> = buf
            .make_mut_slice::<T>()
            .chunks_mut(CHUNK_ROWS)
            .map(Mutex::new)
            .collect();
        parallel_for_dynamic(pool, parts.len(), |k| {
            let mut part = parts[k].lock().unwrap_or_else(PoisonError::into_inner);
            let base = k * CHUNK_ROWS;
            for (j, slot) in part.iter_mut().enumerate() {
                *slot = f(base + j);
            }
            Ok(())
        })?;
    }
    Ok(Column::new(FixedColumn::from_buffer(stype, n, buf)))
}

fn fill_strings(imp: &dyn ColumnImpl, stype: SType, n: usize) -> Column {
    let mut builder = StringBuilder::with_capacity(n);
    for i in 0..n {
        builder.push(imp.get_str(i).as_deref());
    }
    builder.finish_as(stype)
}

fn fill_strings_par(pool: &ThreadPool, imp: &dyn ColumnImpl, stype: SType, n: usize) -> Result<Column> {
    let nparts = n.div_ceil(CHUNK_ROWS);
    let parts: Vec<Mutex<StringBuilder>> = (0..nparts).map(|_| Mutex::default()).collect();
    parallel_for_dynamic(pool, nparts, |k| {
        let mut part = parts[k].lock().unwrap_or_else(PoisonError::into_inner);
        let end = ((k + 1) * CHUNK_ROWS).min(n);
        for i in k * CHUNK_ROWS..end {
            part.push(imp.get_str(i).as_deref());
        }
        Ok(())
    })?;
    let mut builder = StringBuilder::with_capacity(n);
    for part in parts {
        builder.append(&part.into_inner().unwrap_or_else(PoisonError::into_inner));
    }
    Ok(builder.finish_as(stype))
}

/// Sequential materialization.
pub(crate) fn materialize(col: &Column) -> Column {
    let n = col.nrows();
    let imp = col.imp();
    match col.stype() {
        SType::Void => Column::new_na(SType::Void, n),
        SType::Bool => fill_fixed(SType::Bool, n, |i| imp.get_bool(i).map_or(BOOL_NA, i8::from)),
        SType::Int8 => fill_fixed(SType::Int8, n, |i| imp.get_i8(i).unwrap_or(i8::NA)),
        SType::Int16 => fill_fixed(SType::Int16, n, |i| imp.get_i16(i).unwrap_or(i16::NA)),
        SType::Int32 => fill_fixed(SType::Int32, n, |i| imp.get_i32(i).unwrap_or(i32::NA)),
        SType::Int64 => fill_fixed(SType::Int64, n, |i| imp.get_i64(i).unwrap_or(i64::NA)),
        SType::Float32 => fill_fixed(SType::Float32, n, |i| imp.get_f32(i).unwrap_or(f32::NA)),
        SType::Float64 => fill_fixed(SType::Float64, n, |i| imp.get_f64(i).unwrap_or(f64::NA)),
        st @ (SType::Str32 | SType::Str64) => fill_strings(imp, st, n),
    }
}

/// Parallel materialization; small columns are evaluated inline.
pub(crate) fn materialize_par(col: &Column, pool: &ThreadPool) -> Result<Column> {
    let n = col.nrows();
    if n <= CHUNK_ROWS || pool.size() == 1 {
        return Ok(materialize(col));
    }
    debug!(
        "materializing {} column of {n} rows on {} threads",
        col.stype(),
        pool.size()
    );
    let imp = col.imp();
    match col.stype() {
        SType::Void => Ok(Column::new_na(SType::Void, n)),
        SType::Bool => fill_fixed_par(pool, SType::Bool, n, |i| {
            imp.get_bool(i).map_or(BOOL_NA, i8::from)
        }),
        SType::Int8 => fill_fixed_par(pool, SType::Int8, n, |i| imp.get_i8(i).unwrap_or(i8::NA)),
        SType::Int16 => fill_fixed_par(pool, SType::Int16, n, |i| imp.get_i16(i).unwrap_or(i16::NA)),
        SType::Int32 => fill_fixed_par(pool, SType::Int32, n, |i| imp.get_i32(i).unwrap_or(i32::NA)),
        SType::Int64 => fill_fixed_par(pool, SType::Int64, n, |i| imp.get_i64(i).unwrap_or(i64::NA)),
        SType::Float32 => fill_fixed_par(pool, SType::Float32, n, |i| {
            imp.get_f32(i).unwrap_or(f32::NA)
        }),
        SType::Float64 => fill_fixed_par(pool, SType::Float64, n, |i| {
            imp.get_f64(i).unwrap_or(f64::NA)
        }),
        st @ (SType::Str32 | SType::Str64) => fill_strings_par(pool, imp, st, n),
    }
}

fn incompatible(value: &Value, stype: SType) -> anyhow::Error {
    FrameError::type_error(format!("value {value} cannot be stored in a {stype} column")).into()
}

fn check_value(value: &Value, stype: SType) -> Result<()> {
    let ok = match (stype.ltype(), value) {
        (LType::Bool, Value::Bool(_)) | (LType::Str, Value::Str(_)) => true,
        (LType::Real, Value::Int(_) | Value::Float(_)) => true,
        (LType::Int, Value::Int(v)) => match stype {
            SType::Int8 => i8::try_from(*v).is_ok_and(|x| !x.is_na()),
            SType::Int16 => i16::try_from(*v).is_ok_and(|x| !x.is_na()),
            SType::Int32 => i32::try_from(*v).is_ok_and(|x| !x.is_na()),
            _ => !v.is_na(),
        },
        _ => false,
    };
    if ok { Ok(()) } else { Err(incompatible(value, stype)) }
}

fn int_or<T: TryFrom<i64> + NaSentinel>(v: Option<&Value>) -> T {
    match v {
        Some(Value::Int(x)) => T::try_from(*x).unwrap_or(T::NA),
        _ => T::NA,
    }
}

/// Materialized column holding boxed values.
pub(crate) fn from_values(stype: SType, values: &[Option<Value>]) -> Result<Column> {
    for v in values.iter().flatten() {
        check_value(v, stype)?;
    }
    let n = values.len();
    let get = |i: usize| values[i].as_ref();
    Ok(match stype {
        SType::Void => {
            if let Some(v) = values.iter().flatten().next() {
                return Err(incompatible(v, stype));
            }
            Column::new_na(SType::Void, n)
        }
        SType::Bool => fill_fixed(SType::Bool, n, |i| match get(i) {
            Some(Value::Bool(b)) => i8::from(*b),
            _ => BOOL_NA,
        }),
        SType::Int8 => fill_fixed(SType::Int8, n, |i| int_or::<i8>(get(i))),
        SType::Int16 => fill_fixed(SType::Int16, n, |i| int_or::<i16>(get(i))),
        SType::Int32 => fill_fixed(SType::Int32, n, |i| int_or::<i32>(get(i))),
        SType::Int64 => fill_fixed(SType::Int64, n, |i| int_or::<i64>(get(i))),
        #[allow(clippy::cast_possible_truncation)]
        SType::Float32 => fill_fixed(SType::Float32, n, |i| {
            get(i).and_then(Value::as_f64).map_or(f32::NA, |v| v as f32)
        }),
        SType::Float64 => fill_fixed(SType::Float64, n, |i| {
            get(i).and_then(Value::as_f64).unwrap_or(f64::NA)
        }),
        SType::Str32 | SType::Str64 => {
            let mut builder = StringBuilder::with_capacity(n);
            for v in values {
                builder.push(match v {
                    Some(Value::Str(s)) => Some(s.as_str()),
                    _ => None,
                });
            }
            builder.finish_as(stype)
        }
    })
}
