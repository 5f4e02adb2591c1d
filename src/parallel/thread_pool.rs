use super::idle::{IdleJob, JobHandle, Wake};
use super::job::ThreadJob;
use super::team::ThreadTeam;
use super::{mark_worker_thread, set_team_size};
use crate::error::FrameError;
use crate::utils::hardware_concurrency;
use anyhow::{Context, Result};
use log::{debug, trace, warn};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

/// Pool of worker threads executing one [`ThreadJob`] at a time.
///
/// Workers are spawned lazily, the first time a team needs them, and live
/// until [`ThreadPool::shutdown`], a shrinking [`ThreadPool::resize`], or drop.
pub struct ThreadPool {
    nthreads: AtomicUsize,
    idle: Mutex<Arc<IdleJob>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    pub(super) team_active: AtomicBool,
}

impl ThreadPool {
    /// Pool whose teams use up to `nthreads` threads, the caller included.
    #[must_use]
    pub fn new(nthreads: usize) -> Self {
        Self {
            nthreads: AtomicUsize::new(nthreads.max(1)),
            idle: Mutex::new(Arc::new(IdleJob::new())),
            workers: Mutex::new(Vec::new()),
            team_active: AtomicBool::new(false),
        }
    }

    /// Maximum team size.
    #[must_use]
    pub fn size(&self) -> usize {
        self.nthreads.load(Ordering::Acquire)
    }

    /// Number of worker threads currently alive.
    #[must_use]
    pub fn num_workers(&self) -> usize {
        self.workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Change the maximum team size. Shrinking stops all workers; they are
    /// respawned on demand.
    ///
    /// # Errors
    /// Value error while a thread team is active.
    pub fn resize(&self, nthreads: usize) -> Result<()> {
        if self.team_active.load(Ordering::Acquire) {
            return Err(FrameError::value("cannot resize the thread pool inside a parallel region").into());
        }
        let nthreads = nthreads.max(1);
        let old = self.nthreads.swap(nthreads, Ordering::AcqRel);
        debug!("thread pool resized from {old} to {nthreads} threads");
        if nthreads - 1 < self.num_workers() {
            self.shutdown();
        }
        Ok(())
    }

    fn idle(&self) -> Arc<IdleJob> {
        Arc::clone(&self.idle.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Spawn workers until at least `n` exist; returns the number alive.
    fn ensure_workers(&self, idle: &Arc<IdleJob>, n: usize) -> Result<usize> {
        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        while workers.len() < n {
            let index = workers.len() + 1;
            let idle = Arc::clone(idle);
            let sleep = idle.current_index();
            let handle = thread::Builder::new()
                .name(format!("ironframe-worker-{index}"))
                .spawn(move || worker_main(&idle, index, sleep))
                .map_err(FrameError::from)
                .with_context(|| format!("spawning worker thread {index}"))?;
            workers.push(handle);
            trace!("spawned worker thread {index}");
        }
        Ok(workers.len())
    }

    /// Run `job` on the threads of `team` and wait for it to complete.
    ///
    /// The calling thread participates as thread 0.
    ///
    /// # Errors
    /// The first error (or panic) raised by any task of the job; value error
    /// if `team` belongs to another pool.
    pub fn execute_job(&self, job: &dyn ThreadJob, team: &ThreadTeam<'_>) -> Result<()> {
        if !std::ptr::eq(team.pool(), self) {
            return Err(FrameError::value("thread team belongs to a different pool").into());
        }
        let nthreads = team.size();
        let idle = self.idle();
        if nthreads == 1 {
            idle.run(job, 0);
            return idle.take_error();
        }
        let n_workers = self.ensure_workers(&idle, nthreads - 1)?;
        trace!("executing job on {nthreads} threads ({n_workers} workers awake)");
        // SAFETY: `join` below does not return until every worker checked out
        // of this job, so `job` outlives all uses of the handle.
        let handle = unsafe { JobHandle::new(job) };
        let signalled = idle.awaken(handle, nthreads, n_workers);
        idle.run(job, 0);
        idle.join(signalled)
    }

    /// Stop and join all worker threads.
    pub fn shutdown(&self) {
        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        if workers.is_empty() {
            return;
        }
        let idle = self.idle();
        debug!("shutting down {} worker threads", workers.len());
        let signalled = idle.awaken_for_shutdown(workers.len());
        for handle in workers.drain(..) {
            if handle.join().is_err() {
                warn!("worker thread exited with a panic");
            }
        }
        if let Err(e) = idle.join(signalled) {
            warn!("error pending at shutdown: {e:#}");
        }
    }

    /// Stop workers so that a process fork does not copy live threads.
    pub fn before_fork(&self) {
        self.shutdown();
    }

    /// Reset state in a forked child. Worker threads do not survive a fork;
    /// their handles and synchronization state are discarded and workers are
    /// respawned on demand.
    pub fn after_fork_in_child(&self) {
        let stale = std::mem::take(&mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner));
        std::mem::forget(stale);
        let old = std::mem::replace(
            &mut *self.idle.lock().unwrap_or_else(PoisonError::into_inner),
            Arc::new(IdleJob::new()),
        );
        std::mem::forget(old);
        self.team_active.store(false, Ordering::Release);
    }
}

fn worker_main(idle: &IdleJob, index: usize, mut sleep: usize) {
    mark_worker_thread(index);
    loop {
        match idle.wait(sleep) {
            Wake::Run { job, team } => {
                let next = idle.current_index();
                if index < team {
                    set_team_size(team);
                    // SAFETY: the main thread keeps the job alive until this
                    // worker checks out below.
                    idle.run(unsafe { job.get() }, index);
                    set_team_size(1);
                }
                sleep = next;
                idle.checkout();
            }
            Wake::Shutdown => {
                idle.checkout();
                return;
            }
        }
    }
}

impl Default for ThreadPool {
    fn default() -> Self {
        Self::new(hardware_concurrency())
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPool")
            .field("nthreads", &self.size())
            .field("workers", &self.num_workers())
            .field("team_active", &self.team_active.load(Ordering::Relaxed))
            .finish()
    }
}
