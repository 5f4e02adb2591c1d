//! Deferred materialization.

use super::{Column, ColumnImpl};
use crate::stype::SType;
use log::trace;
use std::borrow::Cow;
use std::sync::{Arc, OnceLock};

/// Wraps a virtual column and materializes it the first time any element is
/// read. Concurrent first reads are safe: exactly one thread performs the
/// work, the others wait for it.
#[derive(Clone, Debug)]
pub struct LatentColumn {
    source: Column,
    resolved: Arc<OnceLock<Column>>,
}

impl LatentColumn {
    #[must_use]
    pub fn new(source: Column) -> Self {
        Self {
            source,
            resolved: Arc::new(OnceLock::new()),
        }
    }

    /// Materialized column, computed on first call.
    pub fn resolve(&self) -> &Column {
        self.resolved.get_or_init(|| {
            trace!(
                "materializing latent {} column of {} rows",
                self.source.stype(),
                self.source.nrows()
            );
            self.source.materialize()
        })
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resolved.get().is_some()
    }
}

impl ColumnImpl for LatentColumn {
    fn nrows(&self) -> usize {
        self.source.nrows()
    }

    fn stype(&self) -> SType {
        self.source.stype()
    }

    fn clone_impl(&self) -> Box<dyn ColumnImpl> {
        Box::new(self.clone())
    }

    fn get_bool(&self, i: usize) -> Option<bool> {
        self.resolve().imp().get_bool(i)
    }
    fn get_i8(&self, i: usize) -> Option<i8> {
        self.resolve().imp().get_i8(i)
    }
    fn get_i16(&self, i: usize) -> Option<i16> {
        self.resolve().imp().get_i16(i)
    }
    fn get_i32(&self, i: usize) -> Option<i32> {
        self.resolve().imp().get_i32(i)
    }
    fn get_i64(&self, i: usize) -> Option<i64> {
        self.resolve().imp().get_i64(i)
    }
    fn get_f32(&self, i: usize) -> Option<f32> {
        self.resolve().imp().get_f32(i)
    }
    fn get_f64(&self, i: usize) -> Option<f64> {
        self.resolve().imp().get_f64(i)
    }
    fn get_str(&self, i: usize) -> Option<Cow<'_, str>> {
        self.resolve().imp().get_str(i)
    }

    fn n_children(&self) -> usize {
        1
    }

    fn child(&self, i: usize) -> &Column {
        assert_eq!(i, 0, "a latent column has a single child");
        &self.source
    }
}
