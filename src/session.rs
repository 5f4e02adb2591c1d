//! Root object owning the thread pool and options.

use crate::config::Config;
use crate::frame::Frame;
use crate::io::source::{ReadDirector, Source};
use crate::options::Options;
use crate::parallel::ThreadPool;
use crate::utils::resolve_nthreads;
use anyhow::{Context, Result};
use log::debug;
use std::sync::Arc;

#[cfg(feature = "io-csv")]
use crate::io::csv::CsvParams;

/// Everything an operation needs besides its inputs.
///
/// There is no global pool: each session owns one, and sessions can be
/// created with different sizes side by side.
#[derive(Debug)]
pub struct Session {
    pool: Arc<ThreadPool>,
    options: Options,
    config: Config,
}

impl Session {
    #[must_use]
    pub fn new(config: Config) -> Self {
        let nthreads = resolve_nthreads(config.nthreads);
        debug!("new session with {nthreads} threads");
        let pool = Arc::new(ThreadPool::new(nthreads));
        let options = Options::with_pool(Arc::clone(&pool));
        Self {
            pool,
            options,
            config,
        }
    }

    #[must_use]
    pub fn pool(&self) -> &ThreadPool {
        &self.pool
    }

    #[must_use]
    pub fn shared_pool(&self) -> Arc<ThreadPool> {
        Arc::clone(&self.pool)
    }

    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// CSV parameters from the session configuration.
    ///
    /// # Errors
    /// See [`CsvParams::from_config`].
    #[cfg(feature = "io-csv")]
    pub fn csv_params(&self) -> Result<CsvParams> {
        CsvParams::from_config(&self.config.csv)
    }

    /// # Errors
    /// When the configured reader parameters are invalid.
    pub fn director(&self) -> Result<ReadDirector<'_>> {
        let director = ReadDirector::new(&self.pool);
        #[cfg(feature = "io-csv")]
        let director = director.with_csv_params(self.csv_params()?);
        Ok(director)
    }

    /// Read `source` with the session's pool and configuration.
    ///
    /// # Errors
    /// Any error from the source or its parser, with the source name attached.
    pub fn read(&self, source: &dyn Source) -> Result<Frame> {
        source
            .read_with(&self.director()?)
            .with_context(|| format!("read {}", source.name()))
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(Config::default())
    }
}
