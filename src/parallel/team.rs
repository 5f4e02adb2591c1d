use super::{is_worker_thread, set_team_size};
use super::thread_pool::ThreadPool;
use crate::error::FrameError;
use anyhow::Result;
use std::sync::atomic::Ordering;

/// Exclusive right to run jobs on a pool with a given number of threads.
///
/// At most one team exists per pool at a time; it is released on drop.
/// Starting a team from inside a running job (either on a worker thread or
/// from a task running on the main thread) fails instead of deadlocking.
#[derive(Debug)]
pub struct ThreadTeam<'p> {
    pool: &'p ThreadPool,
    nthreads: usize,
}

impl<'p> ThreadTeam<'p> {
    /// Team of `nthreads` threads (0 means the whole pool), capped at the
    /// pool size.
    ///
    /// # Errors
    /// Value error for nested parallel regions.
    pub fn new(pool: &'p ThreadPool, nthreads: usize) -> Result<Self> {
        if is_worker_thread() {
            return Err(FrameError::value(
                "cannot start a parallel region from inside a worker thread",
            )
            .into());
        }
        if pool.team_active.swap(true, Ordering::AcqRel) {
            return Err(FrameError::value(
                "a thread team is already active on this pool (nested parallel region)",
            )
            .into());
        }
        let size = pool.size();
        let nthreads = if nthreads == 0 { size } else { nthreads.min(size) };
        set_team_size(nthreads);
        Ok(Self { pool, nthreads })
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.nthreads
    }

    pub(super) fn pool(&self) -> &ThreadPool {
        self.pool
    }
}

impl Drop for ThreadTeam<'_> {
    fn drop(&mut self) {
        set_team_size(1);
        self.pool.team_active.store(false, Ordering::Release);
    }
}
