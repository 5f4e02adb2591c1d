//! Partition of consecutive rows into groups.

use crate::error::FrameError;
use anyhow::Result;
use std::sync::Arc;

/// Group boundaries as cumulative offsets.
///
/// `offsets[0] == 0`, offsets never decrease, and group `g` spans rows
/// `offsets[g]..offsets[g + 1]`. The groups cover `0..nrows()` without gaps.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Groupby {
    offsets: Arc<[usize]>,
}

impl Groupby {
    /// One group spanning all `nrows` rows.
    #[must_use]
    pub fn single_group(nrows: usize) -> Self {
        Self {
            offsets: Arc::from([0, nrows]),
        }
    }

    /// # Errors
    /// Value error unless the offsets are non-empty, start at zero and never decrease.
    pub fn from_offsets(offsets: Vec<usize>) -> Result<Self> {
        if offsets.first() != Some(&0) {
            return Err(FrameError::value("group offsets must start with 0").into());
        }
        if let Some(w) = offsets.windows(2).find(|w| w[1] < w[0]) {
            return Err(FrameError::value(format!(
                "group offsets must not decrease, found {} after {}",
                w[1], w[0]
            ))
            .into());
        }
        Ok(Self {
            offsets: offsets.into(),
        })
    }

    /// Number of groups.
    #[must_use]
    pub fn size(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Total number of rows covered.
    #[must_use]
    pub fn nrows(&self) -> usize {
        self.offsets[self.offsets.len() - 1]
    }

    /// Row range `[start, end)` of group `g`.
    #[inline]
    #[must_use]
    pub fn group(&self, g: usize) -> (usize, usize) {
        (self.offsets[g], self.offsets[g + 1])
    }

    #[must_use]
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.offsets.windows(2).map(|w| (w[0], w[1]))
    }
}
