//! Input sources.
//!
//! A [`Source`] knows where its bytes come from; a [`ReadDirector`] knows how
//! to turn bytes into a [`Frame`]. Sources producing URLs, archive members or
//! glob matches live outside this crate and only need to implement [`Source`].

use crate::buffer::Buffer;
use crate::error::FrameError;
use crate::frame::Frame;
use crate::parallel::ThreadPool;
use anyhow::{Context, Result};
use log::debug;
use std::fmt;
use std::path::{Path, PathBuf};

#[cfg(feature = "io-csv")]
use super::csv::{CsvParams, read_csv};
#[cfg(feature = "io-jay")]
use super::jay::{is_jay, read_jay};

/// Something that can be read into a [`Frame`].
pub trait Source: fmt::Debug {
    /// Human-readable name used in error messages.
    fn name(&self) -> String;

    /// # Errors
    /// Any error from reading or parsing the source.
    fn read_with(&self, director: &ReadDirector<'_>) -> Result<Frame>;
}

/// Reading context: the thread pool and the parsing parameters.
#[derive(Debug)]
pub struct ReadDirector<'p> {
    pool: &'p ThreadPool,
    #[cfg(feature = "io-csv")]
    csv: CsvParams,
}

impl<'p> ReadDirector<'p> {
    #[must_use]
    pub fn new(pool: &'p ThreadPool) -> Self {
        Self {
            pool,
            #[cfg(feature = "io-csv")]
            csv: CsvParams::default(),
        }
    }

    #[cfg(feature = "io-csv")]
    #[must_use]
    pub fn with_csv_params(mut self, csv: CsvParams) -> Self {
        self.csv = csv;
        self
    }

    #[must_use]
    pub fn pool(&self) -> &'p ThreadPool {
        self.pool
    }

    #[cfg(feature = "io-csv")]
    #[must_use]
    pub fn csv_params(&self) -> &CsvParams {
        &self.csv
    }

    /// Parse `buffer`: Jay when it carries a Jay signature, CSV otherwise.
    ///
    /// # Errors
    /// Parser errors; not-implemented error when the required format
    /// feature is disabled.
    pub fn read_buffer(&self, buffer: &Buffer) -> Result<Frame> {
        #[cfg(feature = "io-jay")]
        if is_jay(buffer.as_bytes()) {
            debug!("reading {} bytes as Jay", buffer.size());
            return read_jay(buffer);
        }
        #[cfg(feature = "io-csv")]
        {
            debug!("reading {} bytes as CSV", buffer.size());
            read_csv(self.pool, buffer, &self.csv)
        }
        #[cfg(not(feature = "io-csv"))]
        {
            Err(FrameError::not_implemented(format!(
                "no reader available for {} bytes of input (enable feature `io-csv`)",
                buffer.size()
            ))
            .into())
        }
    }
}

/// In-memory text.
#[derive(Clone, Debug)]
pub struct TextSource {
    text: String,
}

impl TextSource {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl Source for TextSource {
    fn name(&self) -> String {
        "<text>".to_string()
    }

    fn read_with(&self, director: &ReadDirector<'_>) -> Result<Frame> {
        director.read_buffer(&Buffer::from_bytes(self.text.as_bytes()))
    }
}

/// In-memory bytes, shared without copying.
#[derive(Clone, Debug)]
pub struct BytesSource {
    name: String,
    bytes: Buffer,
}

impl BytesSource {
    pub fn new(name: impl Into<String>, bytes: Buffer) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

impl Source for BytesSource {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn read_with(&self, director: &ReadDirector<'_>) -> Result<Frame> {
        director.read_buffer(&self.bytes)
    }
}

/// A file, memory-mapped for reading.
#[derive(Clone, Debug)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl Source for FileSource {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn read_with(&self, director: &ReadDirector<'_>) -> Result<Frame> {
        if !self.path.is_file() {
            return Err(FrameError::io(format!("{} is not a file", self.path.display())).into());
        }
        let buffer = Buffer::mmap(&self.path)?;
        director
            .read_buffer(&buffer)
            .with_context(|| format!("read {}", self.path.display()))
    }
}
