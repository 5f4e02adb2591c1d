//! Parking and waking workers.
//!
//! Workers sleep on one of two [`SleepTask`]s. Waking the team flips the
//! "current" index first, so workers that finish the job go back to sleep on
//! the *other* task and cannot observe the signal that woke them again. The
//! task that was woken is reset only after every worker has checked out.

use super::job::ThreadJob;
use anyhow::{Result, anyhow};
use log::{trace, warn};
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use std::thread;

/// Type-erased pointer to the job being executed.
#[derive(Clone, Copy)]
pub(super) struct JobHandle(*const (dyn ThreadJob + 'static));

// SAFETY: `ThreadJob: Sync`, and the pool does not return from `execute_job`
// (and therefore does not release the job) until all workers checked out.
unsafe impl Send for JobHandle {}
unsafe impl Sync for JobHandle {}

impl JobHandle {
    /// # Safety
    /// `job` must outlive every use of the handle.
    pub(super) unsafe fn new<'a>(job: &'a (dyn ThreadJob + 'a)) -> Self {
        let ptr: *const (dyn ThreadJob + 'a) = job;
        // SAFETY: only the lifetime bound changes; see the function contract.
        Self(unsafe {
            std::mem::transmute::<*const (dyn ThreadJob + 'a), *const (dyn ThreadJob + 'static)>(ptr)
        })
    }

    /// # Safety
    /// The job must still be alive.
    pub(super) unsafe fn get(&self) -> &dyn ThreadJob {
        // SAFETY: forwarded to the caller.
        unsafe { &*self.0 }
    }
}

#[derive(Clone, Copy)]
enum Signal {
    Sleep,
    Run { job: JobHandle, team: usize },
    Shutdown,
}

/// What a sleeping worker was woken for.
pub(super) enum Wake {
    Run { job: JobHandle, team: usize },
    Shutdown,
}

struct SleepTask {
    signal: Mutex<Signal>,
    wakeup: Condvar,
}

impl SleepTask {
    fn new() -> Self {
        Self {
            signal: Mutex::new(Signal::Sleep),
            wakeup: Condvar::new(),
        }
    }

    fn post(&self, signal: Signal) {
        *self.signal.lock().unwrap_or_else(PoisonError::into_inner) = signal;
        self.wakeup.notify_all();
    }

    fn wait(&self) -> Wake {
        let mut signal = self.signal.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            match *signal {
                Signal::Sleep => {
                    signal = self
                        .wakeup
                        .wait(signal)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                Signal::Run { job, team } => return Wake::Run { job, team },
                Signal::Shutdown => return Wake::Shutdown,
            }
        }
    }
}

pub(super) struct IdleJob {
    tasks: [SleepTask; 2],
    current: AtomicUsize,
    n_running: AtomicUsize,
    error: Mutex<Option<anyhow::Error>>,
}

impl IdleJob {
    pub(super) fn new() -> Self {
        Self {
            tasks: [SleepTask::new(), SleepTask::new()],
            current: AtomicUsize::new(0),
            n_running: AtomicUsize::new(0),
            error: Mutex::new(None),
        }
    }

    /// Sleep task that idle workers should wait on.
    pub(super) fn current_index(&self) -> usize {
        self.current.load(Ordering::Acquire)
    }

    pub(super) fn wait(&self, index: usize) -> Wake {
        self.tasks[index].wait()
    }

    /// Wake all `n_workers` sleeping workers, the first `team - 1` of which
    /// join the job. Returns the index of the sleep task that was signalled.
    pub(super) fn awaken(&self, job: JobHandle, team: usize, n_workers: usize) -> usize {
        self.post(Signal::Run { job, team }, n_workers)
    }

    pub(super) fn awaken_for_shutdown(&self, n_workers: usize) -> usize {
        self.post(Signal::Shutdown, n_workers)
    }

    fn post(&self, signal: Signal, n_workers: usize) -> usize {
        let prev = self.current.load(Ordering::Acquire);
        self.current.store(1 - prev, Ordering::Release);
        self.n_running.store(n_workers, Ordering::Release);
        self.tasks[prev].post(signal);
        prev
    }

    /// A worker is done with the current signal.
    pub(super) fn checkout(&self) {
        self.n_running.fetch_sub(1, Ordering::AcqRel);
    }

    /// Wait until every worker checked out, re-arm the signalled sleep task
    /// and return the first error captured during the job.
    pub(super) fn join(&self, signalled: usize) -> Result<()> {
        let mut spins = 0u32;
        while self.n_running.load(Ordering::Acquire) != 0 {
            if spins < 1 << 10 {
                std::hint::spin_loop();
                spins += 1;
            } else {
                thread::yield_now();
            }
        }
        self.tasks[signalled].post(Signal::Sleep);
        self.take_error()
    }

    pub(super) fn take_error(&self) -> Result<()> {
        match self
            .error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Keep the first error; later ones are logged and dropped.
    fn record_error(&self, err: anyhow::Error) {
        let mut slot = self.error.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(err);
        } else {
            warn!("additional error in parallel job: {err:#}");
        }
    }

    /// Execute tasks of `job` as thread `ithread` until it runs dry.
    pub(super) fn run(&self, job: &dyn ThreadJob, ithread: usize) {
        loop {
            let task = match catch_unwind(AssertUnwindSafe(|| job.get_next_task(ithread))) {
                Ok(Some(task)) => task,
                Ok(None) => break,
                Err(payload) => {
                    self.record_error(panic_error(payload.as_ref()));
                    job.abort_execution();
                    break;
                }
            };
            let outcome = match catch_unwind(AssertUnwindSafe(|| task.execute())) {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => err,
                Err(payload) => panic_error(payload.as_ref()),
            };
            trace!("thread {ithread} failed a task, aborting job");
            self.record_error(outcome);
            job.abort_execution();
        }
    }
}

fn panic_error(payload: &(dyn Any + Send)) -> anyhow::Error {
    let msg = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    anyhow!("task panicked: {msg}")
}
