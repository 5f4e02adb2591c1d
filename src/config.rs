//! Session configuration, loadable from JSON.
//!
//! ```
//! use ironframe::config::Config;
//!
//! let cfg = Config::from_json_str(r#"{ "nthreads": -1, "csv": { "sep": ";" } }"#).unwrap();
//! assert_eq!(cfg.nthreads, -1);
//! assert_eq!(cfg.csv.sep, ';');
//! assert!(cfg.csv.header);
//! ```

use crate::error::FrameError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const fn default_true() -> bool {
    true
}

const fn default_chunk_size() -> usize {
    1 << 20
}

const fn default_sep() -> char {
    ','
}

const fn default_quote() -> char {
    '"'
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Thread pool size; `0` means all cores, negative values leave that many
    /// cores unused.
    pub nthreads: i64,
    pub csv: CsvConfig,
}

/// Defaults for the CSV reader.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvConfig {
    #[serde(default = "default_sep")]
    pub sep: char,
    #[serde(default = "default_quote")]
    pub quote: char,
    #[serde(default = "default_true")]
    pub header: bool,
    /// Approximate bytes per parsed chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alloc_nrows: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_nrows: Option<usize>,
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            sep: default_sep(),
            quote: default_quote(),
            header: true,
            chunk_size: default_chunk_size(),
            alloc_nrows: None,
            max_nrows: None,
        }
    }
}

impl Config {
    /// # Errors
    /// Value error for malformed JSON or fields of the wrong type.
    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| FrameError::value(format!("invalid configuration: {e}")).into())
    }

    /// # Errors
    /// I/O error if the file cannot be read; see [`Config::from_json_str`].
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(FrameError::from)
            .with_context(|| format!("read {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("parse {}", path.display()))
    }
}
