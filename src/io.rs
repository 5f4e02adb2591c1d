//! Reading and writing frames.
//!
//! - [`source`]: the [`Source`](source::Source) abstraction and the
//!   [`ReadDirector`](source::ReadDirector) dispatching to a format reader
//! - [`csv`]: chunked, ordered, multi-threaded CSV reader (feature `io-csv`)
//! - [`jay`]: Jay binary container (feature `io-jay`)

pub mod source;

#[cfg_attr(docsrs, doc(cfg(feature = "io-csv")))]
#[cfg(feature = "io-csv")]
pub mod csv;

#[cfg_attr(docsrs, doc(cfg(feature = "io-jay")))]
#[cfg(feature = "io-jay")]
pub mod jay;

pub use source::{BytesSource, FileSource, ReadDirector, Source, TextSource};
