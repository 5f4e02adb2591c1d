//! # ironframe
//!
//! An in-memory columnar dataframe engine built around **virtual columns**
//! and a **cooperative thread pool**.
//!
//! ## Key Features
//!
//! - **Zero-copy buffers** - heap, memory-mapped or externally owned memory,
//!   shared by reference counting and copied only on write
//! - **Virtual columns** - views, casts, constants, regex matches and
//!   reductions compute their elements on demand and can be materialized
//!   sequentially or on the thread pool
//! - **Row indices** - slices and index arrays that compose, so chains of
//!   selections collapse into a single view
//! - **Grouping and reductions** - sort-based grouping with count, sum,
//!   mean, standard deviation, min, max and friends
//! - **Cooperative scheduler** - a fixed pool of workers running one job at a
//!   time, with dynamic, static, region and *ordered* parallel loops
//! - **I/O** - a chunked CSV reader that parses in parallel but commits rows
//!   in file order, the Jay binary container, and the Arrow C Data Interface
//!   (all optional via feature flags)
//!
//! ## Quick Start
//!
//! ```
//! use ironframe::*;
//! use ironframe::io::TextSource;
//! # use anyhow::Result;
//!
//! # fn main() -> Result<()> {
//! let session = Session::new(Config { nthreads: 2, ..Config::default() });
//! let frame = session.read(&TextSource::new("k,v\na,1\nb,2\na,3\n"))?;
//!
//! let sums = frame.aggregate(session.pool(), &["k"], &[Aggregation::new(ReduceOp::Sum, "v")])?;
//! assert_eq!(sums.column_by_name("sum_v")?.to_vec::<i64>(), vec![Some(4), Some(2)]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Buffer
//!
//! A [`Buffer`] is a reference-counted byte region. Views onto a buffer share
//! its storage; a buffer is writable only when exclusively owned, and
//! [`Buffer::make_mut`] copies otherwise.
//!
//! ### Column
//!
//! A [`Column`] is a cheap, shareable handle to a [`ColumnImpl`]. Materialized
//! implementations own buffers; virtual ones derive their elements from child
//! columns. Elements are read with [`Column::get_element`], which returns
//! `None` for NA.
//!
//! ### RowIndex and Groupby
//!
//! A [`RowIndex`] maps output rows to source rows (with NA for missing rows),
//! and `a * b` composes two indices. A [`Groupby`] splits consecutive rows
//! into groups by cumulative offsets.
//!
//! ### Thread pool
//!
//! A [`ThreadPool`] is owned by a [`Session`] (there is no global pool).
//! Parallel primitives live in [`parallel`]; see
//! [`parallel::parallel_for_ordered`] for the ordered loop used by the CSV
//! reader.
//!
//! ## Feature Flags
//!
//! - `io-csv` - chunked CSV reader (`csv`)
//! - `io-jay` - Jay binary container (`postcard` metadata)
//! - `arrow-ffi` - Arrow C Data Interface import and export (`arrow`)
//!
//! ## Errors
//!
//! Fallible operations return [`anyhow::Result`]. The root cause is always a
//! [`FrameError`], classified by [`error::error_kind`].
//!
//! ## Testing
//!
//! The [`testing`] module provides column and frame assertions plus fixtures.

pub mod buffer;
pub mod column;
pub mod config;
pub mod error;
pub mod frame;
pub mod groupby;
pub mod io;
pub mod options;
pub mod parallel;
pub mod reduce;
pub mod rowindex;
pub mod session;
pub mod sort;
pub mod stats;
pub mod stype;
pub mod testing;
pub mod utils;

// General re-exports
pub use buffer::Buffer;
pub use column::{Column, ColumnImpl, Element};
pub use config::{Config, CsvConfig};
pub use error::{ErrorKind, FrameError};
pub use frame::{Aggregation, Frame};
pub use groupby::Groupby;
pub use options::Options;
pub use parallel::{ThreadPool, ThreadTeam};
pub use reduce::{Grouping, ReduceOp};
pub use rowindex::RowIndex;
pub use session::Session;
pub use sort::SortFlags;
pub use stats::Stats;
pub use stype::{LType, SType, Value};

// Gated re-exports
#[cfg(feature = "io-csv")]
pub use io::csv::{CsvColumn, CsvParams, read_csv};

#[cfg(feature = "io-jay")]
pub use io::jay::{read_jay, write_jay};
