//! Row-selecting views over a child column.
//!
//! A view never wraps another view: [`ColumnImpl::fold_rowindex`] composes the
//! selections so that at most one view sits above any materialized column.

use super::{Column, ColumnImpl};
use crate::rowindex::RowIndex;
use crate::stype::SType;
use std::borrow::Cow;

macro_rules! delegate_getters {
    () => {
        fn get_bool(&self, i: usize) -> Option<bool> {
            self.child.imp().get_bool(self.row(i)?)
        }
        fn get_i8(&self, i: usize) -> Option<i8> {
            self.child.imp().get_i8(self.row(i)?)
        }
        fn get_i16(&self, i: usize) -> Option<i16> {
            self.child.imp().get_i16(self.row(i)?)
        }
        fn get_i32(&self, i: usize) -> Option<i32> {
            self.child.imp().get_i32(self.row(i)?)
        }
        fn get_i64(&self, i: usize) -> Option<i64> {
            self.child.imp().get_i64(self.row(i)?)
        }
        fn get_f32(&self, i: usize) -> Option<f32> {
            self.child.imp().get_f32(self.row(i)?)
        }
        fn get_f64(&self, i: usize) -> Option<f64> {
            self.child.imp().get_f64(self.row(i)?)
        }
        fn get_str(&self, i: usize) -> Option<Cow<'_, str>> {
            self.child.imp().get_str(self.row(i)?)
        }
    };
}

/// Rows `start, start + step, ...` of the child.
#[derive(Clone, Debug)]
pub struct SliceView {
    child: Column,
    start: usize,
    count: usize,
    step: i64,
}

impl SliceView {
    #[inline]
    fn row(&self, i: usize) -> Option<usize> {
        Some((self.start as i64 + i as i64 * self.step) as usize)
    }

    #[must_use]
    pub fn rowindex(&self) -> RowIndex {
        RowIndex::Slice {
            start: self.start,
            count: self.count,
            step: self.step,
        }
    }
}

impl ColumnImpl for SliceView {
    fn nrows(&self) -> usize {
        self.count
    }

    fn stype(&self) -> SType {
        self.child.stype()
    }

    fn clone_impl(&self) -> Box<dyn ColumnImpl> {
        Box::new(self.clone())
    }

    delegate_getters!();

    fn n_children(&self) -> usize {
        1
    }

    fn child(&self, i: usize) -> &Column {
        assert_eq!(i, 0, "a view has a single child");
        &self.child
    }

    fn fold_rowindex(&self, ri: &RowIndex) -> Option<Column> {
        Some(make_view(self.child.clone(), &self.rowindex() * ri))
    }
}

/// Rows of the child picked by an explicit index array; negative entries are NA.
#[derive(Clone, Debug)]
pub struct ArrayView {
    child: Column,
    indices: RowIndex,
}

impl ArrayView {
    #[inline]
    fn row(&self, i: usize) -> Option<usize> {
        self.indices.nth(i)
    }

    #[must_use]
    pub fn rowindex(&self) -> &RowIndex {
        &self.indices
    }
}

impl ColumnImpl for ArrayView {
    fn nrows(&self) -> usize {
        self.indices.size()
    }

    fn stype(&self) -> SType {
        self.child.stype()
    }

    fn clone_impl(&self) -> Box<dyn ColumnImpl> {
        Box::new(self.clone())
    }

    delegate_getters!();

    fn n_children(&self) -> usize {
        1
    }

    fn child(&self, i: usize) -> &Column {
        assert_eq!(i, 0, "a view has a single child");
        &self.child
    }

    fn fold_rowindex(&self, ri: &RowIndex) -> Option<Column> {
        Some(make_view(self.child.clone(), &self.indices * ri))
    }
}

/// View of `child` through `ri`, choosing the cheapest representation.
pub(crate) fn make_view(child: Column, ri: RowIndex) -> Column {
    if ri.is_all_missing() {
        return Column::new_na(child.stype(), ri.size());
    }
    if ri.is_identity() && ri.size() == child.nrows() {
        return child;
    }
    match ri {
        RowIndex::Slice { start, count, step } => Column::new(SliceView {
            child,
            start,
            count,
            step,
        }),
        indices => Column::new(ArrayView { child, indices }),
    }
}
