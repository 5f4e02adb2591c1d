//! Compact row selections and permutations.
//!
//! A [`RowIndex`] maps output row `j` to a source row (or to NA). It is either
//! an arithmetic progression ([`RowIndex::Slice`]) or an explicit array of
//! 32- or 64-bit indices where any negative entry means "missing".
//!
//! Row indices compose with `*`: `(&a * &b)` selects rows through `b` first and
//! then through `a`, so that `col.apply_rowindex(&a).apply_rowindex(&b)` and
//! `col.apply_rowindex(&(&a * &b))` agree element-wise.

use crate::column::Column;
use crate::error::FrameError;
use crate::stype::SType;
use anyhow::Result;
use std::ops::Mul;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq)]
pub enum RowIndex {
    /// Rows `start, start + step, ...` (`count` of them). `step` may be zero
    /// or negative.
    Slice { start: usize, count: usize, step: i64 },
    Arr32(Arc<[i32]>),
    Arr64(Arc<[i64]>),
}

impl RowIndex {
    #[must_use]
    pub fn identity(n: usize) -> Self {
        RowIndex::Slice { start: 0, count: n, step: 1 }
    }

    /// # Errors
    /// Value error if any row of the progression would be negative.
    pub fn slice(start: usize, count: usize, step: i64) -> Result<Self> {
        if count > 1 && step < 0 {
            let back = i128::from(step) * (count as i128 - 1);
            if (start as i128) + back < 0 {
                return Err(FrameError::value(format!(
                    "slice start={start} count={count} step={step} reaches below row 0"
                ))
                .into());
            }
        }
        Ok(RowIndex::Slice { start, count, step })
    }

    #[must_use]
    pub fn from_indices32(indices: Vec<i32>) -> Self {
        RowIndex::Arr32(indices.into())
    }

    #[must_use]
    pub fn from_indices64(indices: Vec<i64>) -> Self {
        RowIndex::Arr64(indices.into())
    }

    /// Build an array row index, using 32-bit storage when every index fits.
    #[must_use]
    pub fn from_indices(indices: Vec<i64>) -> Self {
        let fits = indices
            .iter()
            .all(|&i| i < 0 || i <= i64::from(i32::MAX));
        if fits {
            RowIndex::Arr32(
                indices
                    .into_iter()
                    .map(|i| if i < 0 { -1 } else { i as i32 })
                    .collect(),
            )
        } else {
            RowIndex::Arr64(indices.into())
        }
    }

    /// Rows where a boolean column is true (NA counts as false).
    ///
    /// # Errors
    /// Type error if `filter` is not a boolean column.
    pub fn from_filter(filter: &Column) -> Result<Self> {
        if filter.stype() != SType::Bool {
            return Err(FrameError::type_error(format!(
                "filter column must be boolean, got {}",
                filter.stype()
            ))
            .into());
        }
        let rows = (0..filter.nrows())
            .filter(|&i| filter.get_bool(i) == Some(true))
            .map(|i| i as i64)
            .collect();
        Ok(Self::from_indices(rows))
    }

    /// Number of rows selected.
    #[must_use]
    pub fn size(&self) -> usize {
        match self {
            RowIndex::Slice { count, .. } => *count,
            RowIndex::Arr32(a) => a.len(),
            RowIndex::Arr64(a) => a.len(),
        }
    }

    /// Source row of output row `j`, `None` when it is NA.
    #[inline]
    #[must_use]
    pub fn nth(&self, j: usize) -> Option<usize> {
        match self {
            RowIndex::Slice { start, step, .. } => {
                Some((*start as i64 + (j as i64) * step) as usize)
            }
            RowIndex::Arr32(a) => usize::try_from(a[j]).ok(),
            RowIndex::Arr64(a) => usize::try_from(a[j]).ok(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<usize>> + '_ {
        (0..self.size()).map(move |j| self.nth(j))
    }

    /// Largest referenced row, or `None` if every entry is NA (or empty).
    #[must_use]
    pub fn max(&self) -> Option<usize> {
        match self {
            RowIndex::Slice { start, count, step } => {
                if *count == 0 {
                    None
                } else if *step > 0 {
                    self.nth(count - 1)
                } else {
                    Some(*start)
                }
            }
            _ => self.iter().flatten().max(),
        }
    }

    #[must_use]
    pub fn is_slice(&self) -> bool {
        matches!(self, RowIndex::Slice { .. })
    }

    #[must_use]
    pub fn is_identity(&self) -> bool {
        matches!(self, RowIndex::Slice { start: 0, step: 1, .. })
    }

    /// True for a non-empty array index whose every entry is NA.
    #[must_use]
    pub fn is_all_missing(&self) -> bool {
        match self {
            RowIndex::Slice { .. } => false,
            RowIndex::Arr32(a) => !a.is_empty() && a.iter().all(|&i| i < 0),
            RowIndex::Arr64(a) => !a.is_empty() && a.iter().all(|&i| i < 0),
        }
    }

    #[must_use]
    pub fn has_missing(&self) -> bool {
        match self {
            RowIndex::Slice { .. } => false,
            RowIndex::Arr32(a) => a.iter().any(|&i| i < 0),
            RowIndex::Arr64(a) => a.iter().any(|&i| i < 0),
        }
    }

    /// # Errors
    /// Value error if some selected row is `>= nrows`.
    pub fn check_bounds(&self, nrows: usize) -> Result<()> {
        if let Some(m) = self.max()
            && m >= nrows
        {
            return Err(FrameError::value(format!(
                "row index references row {m}, but the source has only {nrows} rows"
            ))
            .into());
        }
        Ok(())
    }

    /// Materialize into explicit indices (`-1` for NA).
    #[must_use]
    pub fn to_indices(&self) -> Vec<i64> {
        self.iter()
            .map(|r| r.map_or(-1, |r| r as i64))
            .collect()
    }
}

impl Mul for &RowIndex {
    type Output = RowIndex;

    /// Composition: `(a * b)[j] == a[b[j]]`.
    fn mul(self, rhs: &RowIndex) -> RowIndex {
        match (self, rhs) {
            (
                RowIndex::Slice { start: s1, step: t1, .. },
                RowIndex::Slice { start: s2, count: n2, step: t2 },
            ) => RowIndex::Slice {
                start: (*s1 as i64 + (*s2 as i64) * t1) as usize,
                count: *n2,
                step: t1 * t2,
            },
            _ => RowIndex::from_indices(
                rhs.iter()
                    .map(|b| b.and_then(|b| self.nth(b)).map_or(-1, |r| r as i64))
                    .collect(),
            ),
        }
    }
}

impl Mul for RowIndex {
    type Output = RowIndex;

    fn mul(self, rhs: RowIndex) -> RowIndex {
        &self * &rhs
    }
}
