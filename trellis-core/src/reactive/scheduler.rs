//! Post-Flush Job Queue
//!
//! Jobs deferred by `post`-flush watchers wait here until the current
//! synchronous execution window ends. Jobs run in submission order; a job
//! queued while the queue is draining runs in the same drain, after
//! everything queued before it.
//!
//! The queue can be drained three ways:
//!
//! - [`Runtime::flush_post_jobs`] drains synchronously (tests, sync apps)
//! - [`Runtime::tick`] yields one turn to the tokio scheduler, then drains
//! - [`Runtime::run_post_flush_loop`] drains after every burst, forever
//!
//! ```ignore
//! let rt = Runtime::new();
//! tokio::spawn(rt.clone().run_post_flush_loop());
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::Notify;

use super::runtime::Runtime;

type Job = Box<dyn FnOnce() + Send>;

#[derive(Default)]
pub(crate) struct JobQueue {
    jobs: Mutex<VecDeque<Job>>,
    notify: Notify,
    flushing: AtomicBool,
}

/// Clears the flushing flag, also when a job panics.
struct FlushGuard<'a>(&'a AtomicBool);

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl JobQueue {
    fn push(&self, job: Job) {
        let was_empty = {
            let mut jobs = self.jobs.lock();
            jobs.push_back(job);
            jobs.len() == 1
        };
        // One wakeup per burst
        if was_empty {
            self.notify.notify_one();
        }
    }

    fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    fn flush(&self) -> usize {
        if self.flushing.swap(true, Ordering::SeqCst) {
            // The outer drain picks up anything queued from inside a job.
            return 0;
        }
        let _guard = FlushGuard(&self.flushing);

        let mut ran = 0;
        loop {
            // Never hold the lock while a job runs
            let Some(job) = self.jobs.lock().pop_front() else {
                break;
            };
            job();
            ran += 1;
        }
        ran
    }
}

impl Runtime {
    /// Defer `job` to the end of the current synchronous window.
    pub fn queue_post_job<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.jobs.push(Box::new(job));
    }

    pub fn pending_post_jobs(&self) -> usize {
        self.inner.jobs.len()
    }

    /// Run every queued post job. Returns how many ran.
    pub fn flush_post_jobs(&self) -> usize {
        let ran = self.inner.jobs.flush();
        if ran > 0 {
            tracing::debug!(ran, "flushed post jobs");
        }
        ran
    }

    /// Yield to the async scheduler once, then drain the post queue.
    pub async fn tick(&self) -> usize {
        tokio::task::yield_now().await;
        self.flush_post_jobs()
    }

    /// Drain the post queue after every burst of submissions.
    ///
    /// Runs until the task is dropped or aborted. Jobs run on whichever
    /// worker polls the loop and track their reads on that thread's stack.
    pub async fn run_post_flush_loop(self) {
        loop {
            self.inner.jobs.notify.notified().await;
            self.flush_post_jobs();
        }
    }
}
