//! Job Scheduler
//!
//! The scheduler batches effect re-runs. Queuing a job never runs it; the
//! queue is drained by the next flush, after the current synchronous unit of
//! work completes.
//!
//! # Algorithm
//!
//! 1. `queue_job` appends an effect unless it is already waiting to run
//! 2. The first job queued while idle arms a flush (calls the flush hook)
//! 3. `flush_jobs` sorts the queue by creation id, so effects created earlier
//!    (parent components) run before effects created later (children)
//! 4. Jobs queued while flushing are slotted in by creation id after the
//!    running job and run in the same flush
//!
//! There is no ambient event loop in Rust, so the "next microtask" boundary
//! is owned by the embedder: install a hook with [`set_flush_hook`], call
//! [`flush_jobs`] after each unit of work, or await [`tick`]. Without one of
//! these, queued re-renders wait forever.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::reactive::Effect;

/// Callback invoked when a flush becomes pending.
pub type FlushHook = Rc<dyn Fn()>;

thread_local! {
    static QUEUE: RefCell<JobQueue> = RefCell::new(JobQueue::new());
}

/// The pending job queue.
///
/// `cursor` is the index of the job currently running during a flush. Jobs
/// before the cursor have already run and do not count for deduplication,
/// so a job re-queued after it ran is not lost.
struct JobQueue {
    jobs: Vec<Effect>,
    cursor: usize,
    flush_pending: bool,
    flushing: bool,
    hook: Option<FlushHook>,
}

impl JobQueue {
    fn new() -> Self {
        Self {
            jobs: Vec::new(),
            cursor: 0,
            flush_pending: false,
            flushing: false,
            hook: None,
        }
    }

    /// Add a job. Returns `true` if this arms a new flush.
    fn push(&mut self, job: Effect) -> bool {
        let waiting = self.jobs.get(self.cursor..).unwrap_or_default();
        if waiting.iter().any(|queued| queued.id() == job.id()) {
            trace!(job = ?job.id(), "job already queued");
            return false;
        }
        if self.flushing {
            // Keep the jobs that have not run yet in creation order.
            let start = (self.cursor + 1).min(self.jobs.len());
            let offset = self.jobs[start..].partition_point(|queued| queued.id() < job.id());
            self.jobs.insert(start + offset, job);
            return false;
        }
        self.jobs.push(job);

        if self.flush_pending {
            return false;
        }
        self.flush_pending = true;
        true
    }

    /// Start a flush. Returns `false` if one is already running.
    fn begin(&mut self) -> bool {
        if self.flushing {
            return false;
        }
        self.flushing = true;
        self.flush_pending = false;
        self.cursor = 0;
        self.jobs.sort_by_key(Effect::id);
        true
    }

    fn current(&self) -> Option<Effect> {
        self.jobs.get(self.cursor).cloned()
    }

    fn finish(&mut self) {
        self.jobs.clear();
        self.cursor = 0;
        self.flushing = false;
    }

    fn waiting(&self) -> usize {
        self.jobs.len().saturating_sub(self.cursor)
    }
}

/// Resets the queue when a flush ends, even if a job panicked.
struct FlushGuard;

impl Drop for FlushGuard {
    fn drop(&mut self) {
        let _ = QUEUE.try_with(|queue| queue.borrow_mut().finish());
    }
}

/// Queue an effect for the next flush.
pub fn queue_job(job: Effect) {
    let hook = QUEUE.with(|queue| {
        let mut queue = queue.borrow_mut();
        if queue.push(job) {
            Some(queue.hook.clone())
        } else {
            None
        }
    });

    if let Some(Some(hook)) = hook {
        hook();
    }
}

/// Run every queued job in creation order.
///
/// Returns the number of jobs that ran. A nested call while a flush is
/// already running returns `0` immediately.
pub fn flush_jobs() -> usize {
    let started = QUEUE.with(|queue| queue.borrow_mut().begin());
    if !started {
        return 0;
    }
    let _guard = FlushGuard;

    let mut ran = 0;
    while let Some(job) = QUEUE.with(|queue| queue.borrow().current()) {
        job.run();
        ran += 1;
        QUEUE.with(|queue| queue.borrow_mut().cursor += 1);
    }

    debug!(jobs = ran, "flushed job queue");
    ran
}

/// Yield to the async runtime, then flush.
///
/// This is the async equivalent of "after the current microtask": all
/// synchronous writes made before awaiting are coalesced into one flush.
pub async fn tick() -> usize {
    tokio::task::yield_now().await;
    flush_jobs()
}

/// Install the hook called when a flush becomes pending.
pub fn set_flush_hook<F>(hook: F)
where
    F: Fn() + 'static,
{
    QUEUE.with(|queue| queue.borrow_mut().hook = Some(Rc::new(hook)));
}

/// Remove the flush hook.
pub fn clear_flush_hook() {
    QUEUE.with(|queue| queue.borrow_mut().hook = None);
}

/// Whether a flush has been armed and not yet run.
pub fn is_flush_pending() -> bool {
    QUEUE.with(|queue| queue.borrow().flush_pending)
}

/// Number of jobs waiting to run.
pub fn pending_jobs() -> usize {
    QUEUE.with(|queue| queue.borrow().waiting())
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    #[test]
    fn queue_deduplicates_jobs() {
        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();
        let job = Effect::new_lazy(move || runs_clone.set(runs_clone.get() + 1));

        queue_job(job.clone());
        queue_job(job.clone());
        queue_job(job);

        assert_eq!(pending_jobs(), 1);
        assert_eq!(flush_jobs(), 1);
        assert_eq!(runs.get(), 1);
        assert_eq!(pending_jobs(), 0);
    }

    #[test]
    fn flush_runs_jobs_in_creation_order() {
        let order = Rc::new(RefCell::new(Vec::new()));

        let first = {
            let order = order.clone();
            Effect::new_lazy(move || order.borrow_mut().push("first"))
        };
        let second = {
            let order = order.clone();
            Effect::new_lazy(move || order.borrow_mut().push("second"))
        };

        queue_job(second);
        queue_job(first);
        flush_jobs();

        assert_eq!(*order.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn first_job_arms_the_hook_once() {
        let armed = Rc::new(Cell::new(0));
        let armed_clone = armed.clone();
        set_flush_hook(move || armed_clone.set(armed_clone.get() + 1));

        queue_job(Effect::new_lazy(|| {}));
        queue_job(Effect::new_lazy(|| {}));
        assert!(is_flush_pending());
        assert_eq!(armed.get(), 1);

        flush_jobs();
        assert!(!is_flush_pending());

        queue_job(Effect::new_lazy(|| {}));
        assert_eq!(armed.get(), 2);

        clear_flush_hook();
        flush_jobs();
    }

    #[test]
    fn jobs_queued_during_flush_run_in_the_same_flush() {
        let runs = Rc::new(Cell::new(0));

        let late = {
            let runs = runs.clone();
            Effect::new_lazy(move || runs.set(runs.get() + 1))
        };
        let early = Effect::new_lazy(move || queue_job(late.clone()));

        queue_job(early);
        assert_eq!(flush_jobs(), 2);
        assert_eq!(runs.get(), 1);
        assert!(!is_flush_pending());
    }

    #[test]
    fn jobs_queued_during_flush_keep_creation_order() {
        let order = Rc::new(RefCell::new(Vec::new()));

        let a = {
            let order = order.clone();
            Effect::new_lazy(move || order.borrow_mut().push("a"))
        };
        let b = {
            let order = order.clone();
            Effect::new_lazy(move || order.borrow_mut().push("b"))
        };
        let c = {
            let order = order.clone();
            Effect::new_lazy(move || {
                order.borrow_mut().push("c");
                queue_job(b.clone());
                queue_job(a.clone());
            })
        };

        queue_job(c);
        assert_eq!(flush_jobs(), 3);
        assert_eq!(*order.borrow(), vec!["c", "a", "b"]);
    }

    #[test]
    fn job_requeued_after_running_is_not_lost() {
        let runs = Rc::new(Cell::new(0));

        let target = {
            let runs = runs.clone();
            Effect::new_lazy(move || runs.set(runs.get() + 1))
        };
        let requeue = {
            let target = target.clone();
            Effect::new_lazy(move || queue_job(target.clone()))
        };

        // `target` was created first, so it runs before `requeue`.
        queue_job(target);
        queue_job(requeue);
        assert_eq!(flush_jobs(), 3);
        assert_eq!(runs.get(), 2);
    }

    #[tokio::test]
    async fn tick_flushes_after_yield() {
        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();
        let job = Effect::new_lazy(move || runs_clone.set(runs_clone.get() + 1));

        queue_job(job.clone());
        queue_job(job);
        assert_eq!(runs.get(), 0);

        assert_eq!(tick().await, 1);
        assert_eq!(runs.get(), 1);
    }

    #[tokio::test]
    async fn spawn_local_hook_flushes_on_its_own() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                set_flush_hook(|| {
                    tokio::task::spawn_local(tick());
                });

                let runs = Rc::new(Cell::new(0));
                let runs_clone = runs.clone();
                queue_job(Effect::new_lazy(move || runs_clone.set(runs_clone.get() + 1)));
                assert_eq!(runs.get(), 0);

                while is_flush_pending() {
                    tokio::task::yield_now().await;
                }
                assert_eq!(runs.get(), 1);

                clear_flush_hook();
            })
            .await;
    }
}
