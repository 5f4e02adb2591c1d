//! Regular-expression matching over a string column.

use super::{Column, ColumnImpl};
use crate::error::FrameError;
use crate::stype::SType;
use anyhow::Result;
use regex::Regex;
use std::sync::Arc;

/// Boolean column: whether each string matches the pattern in full.
/// NA strings give NA.
#[derive(Clone, Debug)]
pub struct RegexMatchColumn {
    child: Column,
    regex: Arc<Regex>,
}

impl RegexMatchColumn {
    /// # Errors
    /// Type error if `child` is not a string column; value error if the
    /// pattern does not compile.
    pub fn new(child: Column, pattern: &str) -> Result<Self> {
        child.expect_string("re_match")?;
        let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|e| {
            FrameError::value(format!("invalid regular expression {pattern:?}: {e}"))
        })?;
        Ok(Self {
            child,
            regex: Arc::new(regex),
        })
    }
}

impl ColumnImpl for RegexMatchColumn {
    fn nrows(&self) -> usize {
        self.child.nrows()
    }

    fn stype(&self) -> SType {
        SType::Bool
    }

    fn clone_impl(&self) -> Box<dyn ColumnImpl> {
        Box::new(self.clone())
    }

    fn get_bool(&self, i: usize) -> Option<bool> {
        self.child.get_str(i).map(|s| self.regex.is_match(&s))
    }

    fn n_children(&self) -> usize {
        1
    }

    fn child(&self, i: usize) -> &Column {
        assert_eq!(i, 0, "a regex match has a single child");
        &self.child
    }
}
