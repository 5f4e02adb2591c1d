//! Cached per-column summary statistics.

use crate::column::Column;
use crate::reduce::{ReduceOp, evaluate};
use crate::stype::{LType, Value};
use log::trace;

/// Summary of a column, computed lazily by [`Column::stats`] and cached for
/// the lifetime of that column. Operations that replace the column's
/// implementation (casts, materialization in place) start from a fresh cache.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Stats {
    pub nrows: usize,
    pub na_count: usize,
    /// Numeric columns only.
    pub min: Option<Value>,
    pub max: Option<Value>,
    pub sum: Option<Value>,
    pub mean: Option<f64>,
    pub sd: Option<f64>,
}

impl Stats {
    pub(crate) fn compute(col: &Column) -> Self {
        let n = col.nrows();
        trace!("computing stats of a {} column of {n} rows", col.stype());
        let na_count = match evaluate(ReduceOp::CountNa, col, 0, n) {
            Some(Value::Int(k)) => usize::try_from(k).unwrap_or(0),
            _ => 0,
        };
        let mut stats = Stats {
            nrows: n,
            na_count,
            ..Stats::default()
        };
        if matches!(col.ltype(), LType::Bool | LType::Int | LType::Real) {
            stats.min = evaluate(ReduceOp::Min, col, 0, n);
            stats.max = evaluate(ReduceOp::Max, col, 0, n);
            stats.sum = evaluate(ReduceOp::Sum, col, 0, n);
            stats.mean = evaluate(ReduceOp::Mean, col, 0, n).and_then(|v| v.as_f64());
            stats.sd = evaluate(ReduceOp::Sd, col, 0, n).and_then(|v| v.as_f64());
        }
        stats
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.nrows - self.na_count
    }
}
