//! Named, equal-length columns.

use crate::column::Column;
use crate::error::FrameError;
use crate::parallel::ThreadPool;
use crate::reduce::{ReduceOp, count_rows, countna_rows, reduce_par};
use crate::rowindex::RowIndex;
use crate::sort::{SortFlags, group_rows};
use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

#[derive(Clone)]
pub struct Frame {
    names: Vec<String>,
    columns: Vec<Column>,
    nrows: usize,
}

/// One output column of [`Frame::aggregate`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregation {
    pub op: ReduceOp,
    /// Source column; `None` is only valid for `count` (group sizes) and
    /// `countna`.
    pub column: Option<String>,
    /// Output name; defaults to `<op>` or `<op>_<column>`.
    pub name: Option<String>,
}

impl Aggregation {
    pub fn new(op: ReduceOp, column: impl Into<String>) -> Self {
        Self {
            op,
            column: Some(column.into()),
            name: None,
        }
    }

    /// Number of rows per group.
    #[must_use]
    pub fn count() -> Self {
        Self {
            op: ReduceOp::Count,
            column: None,
            name: None,
        }
    }

    /// Nullary `countna`: zero for every group.
    #[must_use]
    pub fn countna() -> Self {
        Self {
            op: ReduceOp::CountNa,
            column: None,
            name: None,
        }
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    fn output_name(&self) -> String {
        match (&self.name, &self.column) {
            (Some(n), _) => n.clone(),
            (None, Some(c)) => format!("{}_{c}", self.op),
            (None, None) => self.op.to_string(),
        }
    }
}

impl Frame {
    /// # Errors
    /// Value error when the name and column counts differ, names repeat or
    /// are empty, or columns have different lengths.
    pub fn new(names: Vec<String>, columns: Vec<Column>) -> Result<Self> {
        if names.len() != columns.len() {
            return Err(FrameError::value(format!(
                "{} names given for {} columns",
                names.len(),
                columns.len()
            ))
            .into());
        }
        let mut seen = HashSet::with_capacity(names.len());
        for name in &names {
            if name.is_empty() {
                return Err(FrameError::value("column names must not be empty").into());
            }
            if !seen.insert(name.as_str()) {
                return Err(FrameError::value(format!("duplicate column name {name:?}")).into());
            }
        }
        let nrows = columns.first().map_or(0, Column::nrows);
        if let Some((j, c)) = columns.iter().enumerate().find(|(_, c)| c.nrows() != nrows) {
            return Err(FrameError::value(format!(
                "column {:?} has {} rows, expected {nrows}",
                names[j],
                c.nrows()
            ))
            .into());
        }
        Ok(Self {
            names,
            columns,
            nrows,
        })
    }

    /// Frame from `(name, column)` pairs.
    ///
    /// # Errors
    /// See [`Frame::new`].
    pub fn from_pairs<S: Into<String>>(pairs: impl IntoIterator<Item = (S, Column)>) -> Result<Self> {
        let (names, columns) = pairs.into_iter().map(|(n, c)| (n.into(), c)).unzip();
        Self::new(names, columns)
    }

    #[must_use]
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    #[must_use]
    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// # Errors
    /// Value error when `i` is out of range.
    pub fn column(&self, i: usize) -> Result<&Column> {
        self.columns.get(i).ok_or_else(|| {
            FrameError::value(format!(
                "column index {i} is out of range for a frame with {} columns",
                self.columns.len()
            ))
            .into()
        })
    }

    /// # Errors
    /// Value error when no column is called `name`.
    pub fn column_by_name(&self, name: &str) -> Result<&Column> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| &self.columns[i])
            .ok_or_else(|| FrameError::value(format!("no column named {name:?}")).into())
    }

    /// Select rows of every column through `ri`.
    ///
    /// # Errors
    /// Value error when `ri` refers to rows beyond the frame.
    pub fn apply_rowindex(&self, ri: &RowIndex) -> Result<Frame> {
        ri.check_bounds(self.nrows)?;
        Ok(Self {
            names: self.names.clone(),
            columns: self.columns.iter().map(|c| c.apply_rowindex(ri)).collect(),
            nrows: ri.size(),
        })
    }

    /// Frame whose columns are all materialized.
    #[must_use]
    pub fn materialize(&self) -> Frame {
        Self {
            names: self.names.clone(),
            columns: self.columns.iter().map(Column::materialize).collect(),
            nrows: self.nrows,
        }
    }

    /// [`Frame::materialize`], with each column computed on `pool`.
    ///
    /// # Errors
    /// Scheduler errors.
    pub fn materialize_par(&self, pool: &ThreadPool) -> Result<Frame> {
        let columns = self
            .columns
            .iter()
            .map(|c| c.materialize_par(pool))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            names: self.names.clone(),
            columns,
            nrows: self.nrows,
        })
    }

    /// Group rows by the `keys` columns and reduce each group.
    ///
    /// The result has one row per distinct key, in ascending key order: the
    /// key columns first, then one column per aggregation. With no keys the
    /// whole frame is one group and the result has a single row.
    ///
    /// # Errors
    /// Value error for unknown columns; type error for reductions that do not
    /// apply to their column.
    pub fn aggregate(&self, pool: &ThreadPool, keys: &[&str], aggs: &[Aggregation]) -> Result<Frame> {
        let key_cols = keys
            .iter()
            .map(|k| self.column_by_name(k).cloned())
            .collect::<Result<Vec<_>>>()?;
        let flags = vec![SortFlags::default(); key_cols.len()];
        let (order, gby) = group_rows(self.nrows, &key_cols, &flags)?;

        let firsts: Vec<i64> = gby
            .iter()
            .map(|(i0, i1)| {
                // An empty frame still has one (empty) group, with NA keys.
                (i0 < i1).then(|| order.nth(i0)).flatten().map_or(-1, |r| r as i64)
            })
            .collect();
        let firsts = RowIndex::from_indices(firsts);

        let mut names: Vec<String> = keys.iter().map(|k| (*k).to_string()).collect();
        let mut columns: Vec<Column> = key_cols.iter().map(|c| c.apply_rowindex(&firsts)).collect();
        for agg in aggs {
            let out = match &agg.column {
                Some(src) => {
                    let sorted = self.column_by_name(src)?.apply_rowindex(&order);
                    reduce_par(pool, agg.op, &sorted, &gby)
                        .with_context(|| format!("{} of column {src:?}", agg.op))?
                }
                None if agg.op == ReduceOp::Count => count_rows(&gby),
                None if agg.op == ReduceOp::CountNa => countna_rows(&gby),
                None => {
                    return Err(FrameError::value(format!("{} needs a source column", agg.op)).into());
                }
            };
            names.push(agg.output_name());
            columns.push(out);
        }
        debug!(
            "aggregated {} rows into {} groups by {keys:?}",
            self.nrows,
            gby.size()
        );
        Frame::new(names, columns)
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("nrows", &self.nrows)
            .field("names", &self.names)
            .finish_non_exhaustive()
    }
}
