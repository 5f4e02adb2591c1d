use anyhow::anyhow;
use ironframe::error::{ErrorKind, error_kind};
use ironframe::parallel::{
    OrderedControl, OrderedTask, num_threads_in_team, parallel_for_dynamic, parallel_for_ordered,
    parallel_for_static, parallel_region, this_thread_index,
};
use ironframe::utils::hardware_concurrency;
use ironframe::{ThreadPool, ThreadTeam};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Default)]
struct Log {
    ordered: Mutex<Vec<usize>>,
    started: AtomicUsize,
    finished: AtomicUsize,
    in_order: AtomicBool,
}

struct Recorder {
    log: Arc<Log>,
    fail_at: Option<usize>,
    stop_after: Option<usize>,
}

fn jitter(iter: usize) {
    thread::sleep(Duration::from_micros(((iter * 7919) % 13) as u64 * 50));
}

impl OrderedTask for Recorder {
    fn start(&mut self, iter: usize, _ctl: &OrderedControl<'_>) -> anyhow::Result<()> {
        jitter(iter);
        self.log.started.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn order(&mut self, iter: usize, ctl: &OrderedControl<'_>) -> anyhow::Result<()> {
        assert_eq!(ctl.current_iteration(), iter);
        assert!(
            !self.log.in_order.swap(true, Ordering::SeqCst),
            "two order phases overlapped"
        );
        self.log.ordered.lock().unwrap().push(iter);
        if self.stop_after == Some(iter) {
            ctl.set_num_iterations(iter + 1);
        }
        self.log.in_order.store(false, Ordering::SeqCst);
        if self.fail_at == Some(iter) {
            return Err(anyhow!("iteration {iter} failed"));
        }
        Ok(())
    }

    fn finish(&mut self, iter: usize, _ctl: &OrderedControl<'_>) -> anyhow::Result<()> {
        jitter(iter + 5);
        self.log.finished.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn recorder(log: &Arc<Log>) -> impl FnMut() -> Recorder + '_ {
    move || Recorder {
        log: Arc::clone(log),
        fail_at: None,
        stop_after: None,
    }
}

#[test]
fn ordered_phase_follows_iteration_order() -> anyhow::Result<()> {
    let hw = hardware_concurrency().min(8);
    let pool = ThreadPool::new(hw);
    for nthreads in 1..=hw {
        let log = Arc::new(Log::default());
        parallel_for_ordered(&pool, 200, nthreads, recorder(&log))?;
        assert_eq!(*log.ordered.lock().unwrap(), (0..200).collect::<Vec<_>>(), "{nthreads} threads");
        assert_eq!(log.started.load(Ordering::SeqCst), 200);
        assert_eq!(log.finished.load(Ordering::SeqCst), 200);
    }
    Ok(())
}

#[test]
fn failing_task_errors_once_and_pool_survives() -> anyhow::Result<()> {
    let pool = ThreadPool::new(4);
    let log = Arc::new(Log::default());
    let result = parallel_for_ordered(&pool, 100, 0, || Recorder {
        log: Arc::clone(&log),
        fail_at: Some(17),
        stop_after: None,
    });
    let err = result.unwrap_err();
    assert!(format!("{err:#}").contains("iteration 17 failed"));
    let ordered = log.ordered.lock().unwrap().clone();
    assert_eq!(ordered, (0..=17).collect::<Vec<_>>());

    let log = Arc::new(Log::default());
    parallel_for_ordered(&pool, 50, 0, recorder(&log))?;
    assert_eq!(log.ordered.lock().unwrap().len(), 50);
    Ok(())
}

#[test]
fn loop_can_be_shortened_from_order() -> anyhow::Result<()> {
    let pool = ThreadPool::new(3);
    let log = Arc::new(Log::default());
    parallel_for_ordered(&pool, 1000, 0, || Recorder {
        log: Arc::clone(&log),
        fail_at: None,
        stop_after: Some(9),
    })?;
    assert_eq!(*log.ordered.lock().unwrap(), (0..10).collect::<Vec<_>>());
    Ok(())
}

#[test]
fn panicking_task_is_reported() -> anyhow::Result<()> {
    let pool = ThreadPool::new(3);
    let result = parallel_for_dynamic(&pool, 64, |i| {
        if i == 33 {
            panic!("boom at {i}");
        }
        Ok(())
    });
    assert!(result.is_err());

    let hits = AtomicUsize::new(0);
    parallel_for_dynamic(&pool, 64, |_| {
        hits.fetch_add(1, Ordering::Relaxed);
        Ok(())
    })?;
    assert_eq!(hits.load(Ordering::Relaxed), 64);
    Ok(())
}

#[test]
fn nested_regions_are_rejected() -> anyhow::Result<()> {
    let pool = ThreadPool::new(2);
    let inner_errors = AtomicUsize::new(0);
    parallel_region(&pool, 2, |_, _| {
        let err = parallel_for_dynamic(&pool, 4, |_| Ok(())).unwrap_err();
        assert_eq!(error_kind(&err), Some(ErrorKind::Value));
        inner_errors.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })?;
    assert_eq!(inner_errors.load(Ordering::SeqCst), 2);

    let team = ThreadTeam::new(&pool, 0)?;
    let err = ThreadTeam::new(&pool, 1).unwrap_err();
    assert_eq!(error_kind(&err), Some(ErrorKind::Value));
    drop(team);
    assert!(ThreadTeam::new(&pool, 1).is_ok());
    Ok(())
}

#[test]
fn region_sees_thread_indices() -> anyhow::Result<()> {
    let pool = ThreadPool::new(4);
    let seen = Mutex::new(Vec::new());
    parallel_region(&pool, 0, |ithread, nthreads| {
        assert_eq!(this_thread_index(), ithread);
        assert_eq!(num_threads_in_team(), nthreads);
        seen.lock().unwrap().push(ithread);
        Ok(())
    })?;
    let mut seen = seen.into_inner().unwrap();
    seen.sort_unstable();
    assert_eq!(seen, vec![0, 1, 2, 3]);
    assert_eq!(this_thread_index(), 0);
    assert_eq!(num_threads_in_team(), 1);
    Ok(())
}

#[test]
fn static_schedule_covers_every_iteration_once() -> anyhow::Result<()> {
    let pool = ThreadPool::new(3);
    let counts: Vec<AtomicUsize> = (0..1000).map(|_| AtomicUsize::new(0)).collect();
    parallel_for_static(&pool, 1000, 37, |start, end| {
        for c in &counts[start..end] {
            c.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    })?;
    assert!(counts.iter().all(|c| c.load(Ordering::Relaxed) == 1));
    Ok(())
}

#[test]
fn resize_between_jobs() -> anyhow::Result<()> {
    let pool = ThreadPool::new(4);
    parallel_for_dynamic(&pool, 16, |_| Ok(()))?;
    assert_eq!(pool.num_workers(), 3);

    pool.resize(2)?;
    assert_eq!(pool.size(), 2);
    assert_eq!(pool.num_workers(), 0);

    let threads = Mutex::new(Vec::new());
    parallel_region(&pool, 0, |i, n| {
        threads.lock().unwrap().push((i, n));
        Ok(())
    })?;
    assert_eq!(threads.into_inner().unwrap().len(), 2);
    assert_eq!(pool.num_workers(), 1);

    let err = parallel_region(&pool, 0, |_, _| pool.resize(8)).unwrap_err();
    assert_eq!(error_kind(&err), Some(ErrorKind::Value));
    assert_eq!(pool.size(), 2);
    Ok(())
}

#[test]
fn fork_hooks_leave_pool_usable() -> anyhow::Result<()> {
    let pool = ThreadPool::new(3);
    parallel_for_dynamic(&pool, 8, |_| Ok(()))?;
    pool.before_fork();
    pool.after_fork_in_child();
    let hits = AtomicUsize::new(0);
    parallel_for_dynamic(&pool, 8, |_| {
        hits.fetch_add(1, Ordering::Relaxed);
        Ok(())
    })?;
    assert_eq!(hits.load(Ordering::Relaxed), 8);
    Ok(())
}
