use anyhow::Result;

/// A unit of work. Tasks must not block: waiting on other tasks of the same
/// job would deadlock a small team.
pub trait ThreadTask: Sync {
    fn execute(&self) -> Result<()>;
}

/// Source of tasks shared by every thread of a team.
pub trait ThreadJob: Sync {
    /// Next task for thread `ithread`, or `None` once this thread has nothing
    /// left to do for the job.
    fn get_next_task(&self, ithread: usize) -> Option<&dyn ThreadTask>;

    /// Called after a task failed; the job should stop handing out new work.
    fn abort_execution(&self) {}
}
