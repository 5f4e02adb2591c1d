//! Cooperative thread pool.
//!
//! The pool owns long-lived worker threads that sleep until the main thread
//! hands them a [`ThreadJob`]. A job hands out [`ThreadTask`]s on request;
//! tasks are short and never block. Only one job runs at a time per pool, and
//! only the thread that owns the active [`ThreadTeam`] may start one.
//!
//! The main thread takes part in every job as thread 0, then waits (spinning,
//! never sleeping) until every worker has released the job. The first error
//! or panic raised by any task is captured, the job is asked to abort, and
//! the error is returned from [`ThreadPool::execute_job`]. The pool is fully
//! reusable afterwards.
//!
//! Higher-level primitives built on jobs:
//!
//! - [`parallel_for_dynamic`]: iterations handed out one at a time
//! - [`parallel_for_static`]: fixed round-robin assignment of chunks
//! - [`parallel_region`]: run a closure once on every thread of the team
//! - [`parallel_for_ordered`]: `start`/`order`/`finish` pipeline whose
//!   `order` phase runs sequentially in iteration order
//!
//! ```
//! use ironframe::parallel::{ThreadPool, parallel_for_dynamic};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! let pool = ThreadPool::new(4);
//! let total = AtomicUsize::new(0);
//! parallel_for_dynamic(&pool, 100, |i| {
//!     total.fetch_add(i, Ordering::Relaxed);
//!     Ok(())
//! })
//! .unwrap();
//! assert_eq!(total.into_inner(), 4950);
//! ```

mod idle;
mod job;
mod ordered;
mod parallel_for;
mod team;
mod thread_pool;

pub use job::{ThreadJob, ThreadTask};
pub use ordered::{OrderedControl, OrderedTask, parallel_for_ordered};
pub use parallel_for::{parallel_for_dynamic, parallel_for_static, parallel_region};
pub use team::ThreadTeam;
pub use thread_pool::ThreadPool;

use std::cell::Cell;

thread_local! {
    static THREAD_INDEX: Cell<usize> = const { Cell::new(0) };
    static IS_WORKER: Cell<bool> = const { Cell::new(false) };
    static TEAM_SIZE: Cell<usize> = const { Cell::new(1) };
}

/// Index of the current thread within the pool: 0 for the main thread,
/// `1..` for workers.
#[must_use]
pub fn this_thread_index() -> usize {
    THREAD_INDEX.with(Cell::get)
}

/// Size of the team the current thread belongs to (1 outside parallel regions).
#[must_use]
pub fn num_threads_in_team() -> usize {
    TEAM_SIZE.with(Cell::get)
}

fn set_team_size(n: usize) {
    TEAM_SIZE.with(|c| c.set(n));
}

pub(crate) fn is_worker_thread() -> bool {
    IS_WORKER.with(Cell::get)
}

fn mark_worker_thread(index: usize) {
    THREAD_INDEX.with(|c| c.set(index));
    IS_WORKER.with(|c| c.set(true));
}
