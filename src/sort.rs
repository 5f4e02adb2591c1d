//! Stable multi-column sorting and grouping.
//!
//! NAs sort before every other value, in both directions. Ties keep their
//! original relative order.

use crate::column::Column;
use crate::error::FrameError;
use crate::groupby::Groupby;
use crate::rowindex::RowIndex;
use crate::stype::LType;
use anyhow::Result;
use log::debug;
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use std::cmp::Ordering;

/// Inputs at least this long are sorted with rayon.
const PAR_SORT_THRESHOLD: usize = 1 << 14;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SortFlags {
    pub descending: bool,
    /// The column orders rows within groups but does not define them.
    pub sort_only: bool,
}

impl SortFlags {
    #[must_use]
    pub fn descending() -> Self {
        Self {
            descending: true,
            sort_only: false,
        }
    }
}

/// Key values extracted once so comparisons don't go through column getters.
enum Keys {
    Int(Vec<Option<i64>>),
    Float(Vec<Option<OrderedFloat<f64>>>),
    Str(Vec<Option<String>>),
}

impl Keys {
    fn extract(col: &Column) -> Self {
        let n = col.nrows();
        match col.ltype() {
            LType::Void | LType::Bool | LType::Int => {
                Keys::Int((0..n).map(|i| col.get_as_i64(i)).collect())
            }
            LType::Real => Keys::Float(
                (0..n)
                    .map(|i| col.get_as_f64(i).map(OrderedFloat))
                    .collect(),
            ),
            LType::Str => Keys::Str(
                (0..n)
                    .map(|i| col.get_str(i).map(std::borrow::Cow::into_owned))
                    .collect(),
            ),
        }
    }

    fn cmp(&self, a: usize, b: usize, descending: bool) -> Ordering {
        match self {
            Keys::Int(v) => cmp_na_first(&v[a], &v[b], descending),
            Keys::Float(v) => cmp_na_first(&v[a], &v[b], descending),
            Keys::Str(v) => cmp_na_first(&v[a], &v[b], descending),
        }
    }

    fn same(&self, a: usize, b: usize) -> bool {
        match self {
            Keys::Int(v) => v[a] == v[b],
            Keys::Float(v) => v[a] == v[b],
            Keys::Str(v) => v[a] == v[b],
        }
    }
}

fn cmp_na_first<T: Ord>(a: &Option<T>, b: &Option<T>, descending: bool) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) if descending => y.cmp(x),
        (Some(x), Some(y)) => x.cmp(y),
    }
}

fn validate(nrows: usize, columns: &[Column], flags: &[SortFlags]) -> Result<()> {
    if let Some(c) = columns.iter().find(|c| c.nrows() != nrows) {
        return Err(FrameError::value(format!(
            "sort columns must have {nrows} rows, got {}",
            c.nrows()
        ))
        .into());
    }
    if !flags.is_empty() && flags.len() != columns.len() {
        return Err(FrameError::value(format!(
            "{} sort flags given for {} columns",
            flags.len(),
            columns.len()
        ))
        .into());
    }
    Ok(())
}

fn sorted_order(keys: &[(Keys, SortFlags)], nrows: usize) -> Vec<usize> {
    let compare = |a: &usize, b: &usize| {
        keys.iter()
            .map(|(k, f)| k.cmp(*a, *b, f.descending))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    };
    let mut order: Vec<usize> = (0..nrows).collect();
    if nrows >= PAR_SORT_THRESHOLD {
        order.par_sort_by(compare);
    } else {
        order.sort_by(compare);
    }
    order
}

fn extract_keys(columns: &[Column], flags: &[SortFlags]) -> Vec<(Keys, SortFlags)> {
    columns
        .iter()
        .enumerate()
        .map(|(i, c)| (Keys::extract(c), flags.get(i).copied().unwrap_or_default()))
        .collect()
}

fn to_rowindex(order: &[usize]) -> RowIndex {
    RowIndex::from_indices(order.iter().map(|&r| r as i64).collect())
}

/// Row order that sorts `columns` lexicographically.
///
/// # Errors
/// Value error for an empty column list, unequal lengths, or a flag count
/// that does not match the columns.
pub fn sort(columns: &[Column], flags: &[SortFlags]) -> Result<RowIndex> {
    let Some(first) = columns.first() else {
        return Err(FrameError::value("at least one column is required for sorting").into());
    };
    let nrows = first.nrows();
    validate(nrows, columns, flags)?;
    Ok(to_rowindex(&sorted_order(&extract_keys(columns, flags), nrows)))
}

/// Sort rows and split them into groups of equal keys.
///
/// The returned row index orders the source so that each group is
/// contiguous; the [`Groupby`] refers to rows *after* applying it. Columns
/// flagged `sort_only` only order rows within a group. An empty column list
/// means zero rows; use [`group_rows`] to group a known number of rows by
/// no keys.
///
/// # Errors
/// Value error for unequal lengths, or a flag count that does not match the
/// columns.
pub fn group(columns: &[Column], flags: &[SortFlags]) -> Result<(RowIndex, Groupby)> {
    group_rows(columns.first().map_or(0, Column::nrows), columns, flags)
}

/// [`group`] for `nrows` rows.
///
/// With no key columns, or no rows, the result is the identity order and a
/// single group spanning every row.
///
/// # Errors
/// Value error when a column is not `nrows` long, or a flag count that does
/// not match the columns.
pub fn group_rows(nrows: usize, columns: &[Column], flags: &[SortFlags]) -> Result<(RowIndex, Groupby)> {
    validate(nrows, columns, flags)?;
    if columns.is_empty() || nrows == 0 {
        return Ok((RowIndex::identity(nrows), Groupby::single_group(nrows)));
    }
    let keys = extract_keys(columns, flags);
    let order = sorted_order(&keys, nrows);
    let defining: Vec<&Keys> = keys
        .iter()
        .filter(|(_, f)| !f.sort_only)
        .map(|(k, _)| k)
        .collect();
    let gby = if defining.is_empty() {
        Groupby::single_group(nrows)
    } else {
        let mut offsets = vec![0];
        for (j, w) in order.windows(2).enumerate() {
            if !defining.iter().all(|k| k.same(w[0], w[1])) {
                offsets.push(j + 1);
            }
        }
        offsets.push(nrows);
        Groupby::from_offsets(offsets)?
    };
    debug!("grouped {nrows} rows into {} groups", gby.size());
    Ok((to_rowindex(&order), gby))
}
