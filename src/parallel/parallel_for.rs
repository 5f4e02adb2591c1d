use super::job::{ThreadJob, ThreadTask};
use super::team::ThreadTeam;
use super::thread_pool::ThreadPool;
use anyhow::Result;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/* ===================== dynamic ===================== */

struct DynamicTask<'a, F> {
    iter: AtomicUsize,
    f: &'a F,
}

impl<F> ThreadTask for DynamicTask<'_, F>
where
    F: Fn(usize) -> Result<()> + Sync,
{
    fn execute(&self) -> Result<()> {
        (self.f)(self.iter.load(Ordering::Relaxed))
    }
}

struct DynamicJob<'a, F> {
    next: AtomicUsize,
    n_iters: usize,
    stopped: AtomicBool,
    /// One reusable task per thread.
    tasks: Vec<DynamicTask<'a, F>>,
}

impl<F> ThreadJob for DynamicJob<'_, F>
where
    F: Fn(usize) -> Result<()> + Sync,
{
    fn get_next_task(&self, ithread: usize) -> Option<&dyn ThreadTask> {
        if self.stopped.load(Ordering::Acquire) {
            return None;
        }
        let i = self.next.fetch_add(1, Ordering::AcqRel);
        if i >= self.n_iters {
            return None;
        }
        let task = &self.tasks[ithread];
        task.iter.store(i, Ordering::Relaxed);
        Some(task)
    }

    fn abort_execution(&self) {
        self.stopped.store(true, Ordering::Release);
    }
}

/// Call `f(i)` for every `i` in `0..n_iters`, handing iterations to threads
/// as they become free.
///
/// # Errors
/// The first error returned by `f`; remaining iterations are skipped.
pub fn parallel_for_dynamic<F>(pool: &ThreadPool, n_iters: usize, f: F) -> Result<()>
where
    F: Fn(usize) -> Result<()> + Sync,
{
    if n_iters == 0 {
        return Ok(());
    }
    let team = ThreadTeam::new(pool, pool.size().min(n_iters))?;
    let job = DynamicJob {
        next: AtomicUsize::new(0),
        n_iters,
        stopped: AtomicBool::new(false),
        tasks: (0..team.size())
            .map(|_| DynamicTask {
                iter: AtomicUsize::new(0),
                f: &f,
            })
            .collect(),
    };
    pool.execute_job(&job, &team)
}

/* ===================== region ===================== */

struct RegionTask<'a, F> {
    ithread: usize,
    nthreads: usize,
    f: &'a F,
}

impl<F> ThreadTask for RegionTask<'_, F>
where
    F: Fn(usize, usize) -> Result<()> + Sync,
{
    fn execute(&self) -> Result<()> {
        (self.f)(self.ithread, self.nthreads)
    }
}

struct RegionJob<'a, F> {
    tasks: Vec<RegionTask<'a, F>>,
    claimed: Vec<AtomicBool>,
}

impl<F> ThreadJob for RegionJob<'_, F>
where
    F: Fn(usize, usize) -> Result<()> + Sync,
{
    fn get_next_task(&self, ithread: usize) -> Option<&dyn ThreadTask> {
        let claimed = self.claimed.get(ithread)?;
        if claimed.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(&self.tasks[ithread])
    }
}

/// Run `f(ithread, nthreads)` once on each thread of a team of `nthreads`
/// (0 means the whole pool).
///
/// # Errors
/// The first error returned by any invocation.
pub fn parallel_region<F>(pool: &ThreadPool, nthreads: usize, f: F) -> Result<()>
where
    F: Fn(usize, usize) -> Result<()> + Sync,
{
    let team = ThreadTeam::new(pool, nthreads)?;
    let n = team.size();
    let job = RegionJob {
        tasks: (0..n)
            .map(|ithread| RegionTask {
                ithread,
                nthreads: n,
                f: &f,
            })
            .collect(),
        claimed: (0..n).map(|_| AtomicBool::new(false)).collect(),
    };
    pool.execute_job(&job, &team)
}

/* ===================== static ===================== */

/// Split `0..n_iters` into chunks of `chunk_size` and call `f(start, end)`
/// for each, with chunk `k` always processed by thread `k % nthreads`.
///
/// # Errors
/// The first error returned by `f`; threads stop picking up chunks once
/// any chunk failed.
pub fn parallel_for_static<F>(pool: &ThreadPool, n_iters: usize, chunk_size: usize, f: F) -> Result<()>
where
    F: Fn(usize, usize) -> Result<()> + Sync,
{
    if n_iters == 0 {
        return Ok(());
    }
    let chunk_size = chunk_size.max(1);
    let nchunks = n_iters.div_ceil(chunk_size);
    let failed = AtomicBool::new(false);
    parallel_region(pool, pool.size().min(nchunks), |ithread, nthreads| {
        for k in (ithread..nchunks).step_by(nthreads) {
            if failed.load(Ordering::Relaxed) {
                break;
            }
            let start = k * chunk_size;
            if let Err(e) = f(start, (start + chunk_size).min(n_iters)) {
                failed.store(true, Ordering::Relaxed);
                return Err(e);
            }
        }
        Ok(())
    })
}
