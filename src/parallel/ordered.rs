//! Ordered loops: parallel `start`, sequential `order`, parallel `finish`.
//!
//! Each iteration `i` goes through three phases. `start(i)` and `finish(i)`
//! may run concurrently with anything, but `order(i)` runs only after
//! `order(i - 1)` completed and never concurrently with another `order`. This
//! makes it the place to commit results in iteration order.
//!
//! Iterations are processed by a fixed ring of task slots (iteration `i` uses
//! slot `i % nslots`), each owning one user object created by the factory and
//! reused across iterations. All scheduling state lives behind one mutex.

use super::job::{ThreadJob, ThreadTask};
use super::team::ThreadTeam;
use super::thread_pool::ThreadPool;
use anyhow::Result;
use log::trace;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;

/// Work performed by one slot of an ordered loop.
pub trait OrderedTask: Send {
    fn start(&mut self, _iter: usize, _ctl: &OrderedControl<'_>) -> Result<()> {
        Ok(())
    }

    fn order(&mut self, _iter: usize, _ctl: &OrderedControl<'_>) -> Result<()> {
        Ok(())
    }

    fn finish(&mut self, _iter: usize, _ctl: &OrderedControl<'_>) -> Result<()> {
        Ok(())
    }
}

/// Handle passed to task phases to inspect or adjust the loop.
pub struct OrderedControl<'a> {
    state: &'a OrderedState,
    iter: usize,
}

impl OrderedControl<'_> {
    /// Stop the loop early: iterations `>= n` are no longer started, and
    /// those already started skip their `order` phase.
    ///
    /// `n` cannot go below the iteration currently being ordered.
    pub fn set_num_iterations(&self, n: usize) {
        let mut p = self.state.lock();
        let floor = p.next_order + usize::from(p.ordering);
        let n = n.max(floor);
        if n < p.n_iters {
            trace!("ordered loop reduced from {} to {n} iterations", p.n_iters);
            p.n_iters = n;
        }
    }

    #[must_use]
    pub fn num_iterations(&self) -> usize {
        self.state.lock().n_iters
    }

    /// Iteration whose phase is running.
    #[must_use]
    pub fn current_iteration(&self) -> usize {
        self.iter
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    ReadyToStart,
    Starting,
    ReadyToOrder,
    Ordering,
    ReadyToFinish,
    Finishing,
}

struct Progress {
    n_iters: usize,
    next_start: usize,
    next_order: usize,
    /// Some slot is in the `Ordering` phase.
    ordering: bool,
    phases: Vec<Phase>,
    iters: Vec<usize>,
}

struct OrderedState {
    progress: Mutex<Progress>,
    aborted: AtomicBool,
}

enum Next {
    Slot(usize),
    Wait,
    Done,
}

impl OrderedState {
    fn lock(&self) -> std::sync::MutexGuard<'_, Progress> {
        self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pick the next runnable phase: finish first, then order, then start.
    fn schedule(&self) -> Next {
        let mut p = self.lock();
        let nslots = p.phases.len();
        let n_iters = p.n_iters;

        let finishable = (0..nslots).find(|&s| match p.phases[s] {
            Phase::ReadyToFinish => true,
            Phase::ReadyToOrder => p.iters[s] >= n_iters,
            _ => false,
        });
        if let Some(s) = finishable {
            p.phases[s] = Phase::Finishing;
            return Next::Slot(s);
        }

        if !p.ordering && p.next_order < n_iters {
            let s = p.next_order % nslots;
            if p.phases[s] == Phase::ReadyToOrder && p.iters[s] == p.next_order {
                p.phases[s] = Phase::Ordering;
                p.ordering = true;
                return Next::Slot(s);
            }
        }

        if p.next_start < n_iters {
            let s = p.next_start % nslots;
            if p.phases[s] == Phase::ReadyToStart {
                p.iters[s] = p.next_start;
                p.next_start += 1;
                p.phases[s] = Phase::Starting;
                return Next::Slot(s);
            }
        }

        if p.next_start >= n_iters && p.phases.iter().all(|&ph| ph == Phase::ReadyToStart) {
            Next::Done
        } else {
            Next::Wait
        }
    }

    fn claimed(&self, slot: usize) -> (Phase, usize) {
        let p = self.lock();
        (p.phases[slot], p.iters[slot])
    }

    fn complete(&self, slot: usize, phase: Phase) {
        let mut p = self.lock();
        p.phases[slot] = match phase {
            Phase::Starting => Phase::ReadyToOrder,
            Phase::Ordering => {
                p.ordering = false;
                p.next_order += 1;
                Phase::ReadyToFinish
            }
            Phase::Finishing => Phase::ReadyToStart,
            other => other,
        };
    }
}

struct OrderedSlot<'a, T> {
    index: usize,
    state: &'a OrderedState,
    work: Mutex<T>,
}

impl<T: OrderedTask> ThreadTask for OrderedSlot<'_, T> {
    fn execute(&self) -> Result<()> {
        let (phase, iter) = self.state.claimed(self.index);
        let ctl = OrderedControl {
            state: self.state,
            iter,
        };
        let result = {
            let mut work = self.work.lock().unwrap_or_else(PoisonError::into_inner);
            match phase {
                Phase::Starting => work.start(iter, &ctl),
                Phase::Ordering => work.order(iter, &ctl),
                Phase::Finishing => work.finish(iter, &ctl),
                _ => Ok(()),
            }
        };
        self.state.complete(self.index, phase);
        result
    }
}

/// Handed out when nothing is runnable yet but the loop is not finished.
struct WaitTask;

impl ThreadTask for WaitTask {
    fn execute(&self) -> Result<()> {
        thread::yield_now();
        Ok(())
    }
}

struct OrderedJob<'a, T> {
    state: &'a OrderedState,
    slots: Vec<OrderedSlot<'a, T>>,
    wait: WaitTask,
}

impl<T: OrderedTask> ThreadJob for OrderedJob<'_, T> {
    fn get_next_task(&self, _ithread: usize) -> Option<&dyn ThreadTask> {
        if self.state.aborted.load(Ordering::Acquire) {
            return None;
        }
        match self.state.schedule() {
            Next::Slot(s) => Some(&self.slots[s]),
            Next::Wait => Some(&self.wait),
            Next::Done => None,
        }
    }

    fn abort_execution(&self) {
        self.state.aborted.store(true, Ordering::Release);
    }
}

/// Run an ordered loop of `n_iters` iterations on a team of `nthreads`
/// threads (0 means the whole pool). `factory` creates the per-slot task
/// objects.
///
/// # Errors
/// The first error returned by any phase; no new phases start afterwards.
pub fn parallel_for_ordered<T, F>(
    pool: &ThreadPool,
    n_iters: usize,
    nthreads: usize,
    mut factory: F,
) -> Result<()>
where
    T: OrderedTask,
    F: FnMut() -> T,
{
    if n_iters == 0 {
        return Ok(());
    }
    let team = ThreadTeam::new(pool, nthreads)?;
    let nslots = (2 * team.size()).min(n_iters);
    let state = OrderedState {
        progress: Mutex::new(Progress {
            n_iters,
            next_start: 0,
            next_order: 0,
            ordering: false,
            phases: vec![Phase::ReadyToStart; nslots],
            iters: vec![0; nslots],
        }),
        aborted: AtomicBool::new(false),
    };
    let job = OrderedJob {
        state: &state,
        slots: (0..nslots)
            .map(|index| OrderedSlot {
                index,
                state: &state,
                work: Mutex::new(factory()),
            })
            .collect(),
        wait: WaitTask,
    };
    trace!("ordered loop of {n_iters} iterations on {} threads, {nslots} slots", team.size());
    pool.execute_job(&job, &team)
}
