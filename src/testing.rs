//! Helpers for testing code built on frames and columns.
//!
//! - **Assertions** compare columns and frames element by element, NA
//!   positions included, and report the first differing row
//! - **Fixtures** generate deterministic columns and CSV payloads
//!
//! ```
//! use ironframe::Column;
//! use ironframe::testing::*;
//!
//! let col = Column::from_options(&[Some(1i32), None, Some(3)]);
//! assert_column_values(&col, &[Some(1i64.into()), None, Some(3i64.into())]);
//! assert_columns_equal(&col.materialize(), &col);
//! ```

pub mod assertions;
pub mod fixtures;

pub use assertions::*;
pub use fixtures::*;
