//! Named options with get/set callbacks.
//!
//! Each option is a pair of closures reading and writing a JSON value, so
//! that an option can be bound to live state (such as the size of a thread
//! pool) instead of being stored here.
//!
//! ```
//! use ironframe::options::Options;
//! use ironframe::parallel::ThreadPool;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let pool = Arc::new(ThreadPool::new(2));
//! let opts = Options::with_pool(Arc::clone(&pool));
//! opts.set("nthreads", &json!(3)).unwrap();
//! assert_eq!(pool.size(), 3);
//! assert_eq!(opts.get("nthreads").unwrap(), json!(3));
//! ```

use crate::error::FrameError;
use crate::parallel::ThreadPool;
use crate::utils::resolve_nthreads;
use anyhow::{Context, Result};
use log::debug;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

pub type GetFn = Arc<dyn Fn() -> Value + Send + Sync>;
pub type SetFn = Arc<dyn Fn(&Value) -> Result<()> + Send + Sync>;

#[derive(Clone)]
struct Entry {
    doc: String,
    get: GetFn,
    set: SetFn,
}

#[derive(Default)]
pub struct Options {
    entries: RwLock<BTreeMap<String, Entry>>,
}

impl Options {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `nthreads` option bound to `pool`.
    ///
    /// Setting `nthreads` to `n <= 0` selects `hardware_concurrency + n`
    /// threads, and never fewer than one.
    #[must_use]
    pub fn with_pool(pool: Arc<ThreadPool>) -> Self {
        let opts = Self::new();
        let getter = Arc::clone(&pool);
        opts.register(
            "nthreads",
            "Number of threads used by parallel operations",
            Arc::new(move || Value::from(getter.size())),
            Arc::new(move |v: &Value| {
                let n = v.as_i64().ok_or_else(|| {
                    FrameError::value(format!("option nthreads expects an integer, got {v}"))
                })?;
                pool.resize(resolve_nthreads(n))
            }),
        );
        opts
    }

    /// Add an option, replacing any previous one with the same name.
    pub fn register(&self, name: impl Into<String>, doc: impl Into<String>, get: GetFn, set: SetFn) {
        let name = name.into();
        debug!("registering option {name}");
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                name,
                Entry {
                    doc: doc.into(),
                    get,
                    set,
                },
            );
    }

    fn entry(&self, name: &str) -> Result<Entry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| FrameError::value(format!("unknown option {name:?}")).into())
    }

    /// # Errors
    /// Value error for unknown options.
    pub fn get(&self, name: &str) -> Result<Value> {
        Ok((self.entry(name)?.get)())
    }

    /// # Errors
    /// Value error for unknown options or values the option rejects.
    pub fn set(&self, name: &str, value: &Value) -> Result<()> {
        // Callbacks run without the registry lock held.
        let entry = self.entry(name)?;
        (entry.set)(value).with_context(|| format!("set option {name}"))?;
        debug!("option {name} set to {value}");
        Ok(())
    }

    /// # Errors
    /// Value error for unknown options.
    pub fn describe(&self, name: &str) -> Result<String> {
        Ok(self.entry(name)?.doc)
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options").field("names", &self.names()).finish()
    }
}
