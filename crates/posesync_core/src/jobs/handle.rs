//! # Job Handles
//!
//! A [`JobHandle`] stands for the completion of zero or more jobs. Passes are
//! scheduled "after" a handle and return a new one, so callers build a
//! forward-only dependency chain.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::{SyncError, SyncResult};

/// Completion signal of one job.
struct CompletionSignal {
    name: &'static str,
    done: AtomicBool,
    failed: AtomicBool,
    condvar: Condvar,
    mutex: Mutex<()>,
}

impl CompletionSignal {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            done: AtomicBool::new(false),
            failed: AtomicBool::new(false),
            condvar: Condvar::new(),
            mutex: Mutex::new(()),
        }
    }

    fn signal(&self, failed: bool) {
        self.failed.store(failed, Ordering::Release);
        // Store under the mutex so a waiter cannot miss the notification
        // between its check and its wait.
        let _guard = self.mutex.lock();
        self.done.store(true, Ordering::Release);
        self.condvar.notify_all();
    }

    fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    fn wait(&self) {
        if self.is_done() {
            return;
        }
        let mut guard = self.mutex.lock();
        while !self.is_done() {
            self.condvar.wait(&mut guard);
        }
    }

    fn wait_until(&self, deadline: Instant) -> bool {
        if self.is_done() {
            return true;
        }
        let mut guard = self.mutex.lock();
        while !self.is_done() {
            if self.condvar.wait_until(&mut guard, deadline).timed_out() {
                return self.is_done();
            }
        }
        true
    }
}

/// Completion of a set of jobs.
///
/// Cloning is cheap; every clone observes the same jobs.
#[derive(Clone, Default)]
pub struct JobHandle {
    signals: Vec<Arc<CompletionSignal>>,
}

impl std::fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let jobs: Vec<_> = self.signals.iter().map(|s| (s.name, s.is_done())).collect();
        f.debug_struct("JobHandle").field("jobs", &jobs).finish()
    }
}

impl JobHandle {
    /// A handle with nothing to wait for.
    #[must_use]
    pub fn completed() -> Self {
        Self::default()
    }

    /// Creates a handle for a job that has not run yet, plus the completer
    /// the job uses to signal it.
    #[must_use]
    pub fn pending(name: &'static str) -> (Self, JobCompleter) {
        let signal = Arc::new(CompletionSignal::new(name));
        (
            Self {
                signals: vec![signal.clone()],
            },
            JobCompleter {
                signal,
                finished: false,
            },
        )
    }

    /// Combines several handles into one that completes when all of them do.
    #[must_use]
    pub fn join_all<'a>(handles: impl IntoIterator<Item = &'a JobHandle>) -> Self {
        let mut signals = Vec::new();
        for handle in handles {
            for signal in &handle.signals {
                if !signal.is_done() || signal.failed.load(Ordering::Acquire) {
                    signals.push(signal.clone());
                }
            }
        }
        Self { signals }
    }

    /// Returns true once every job behind the handle has finished.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.signals.iter().all(|s| s.is_done())
    }

    /// Name of the first finished job that panicked, if any.
    #[must_use]
    pub fn failed_job(&self) -> Option<&'static str> {
        self.signals
            .iter()
            .find(|s| s.is_done() && s.failed.load(Ordering::Acquire))
            .map(|s| s.name)
    }

    /// Blocks until every job has finished.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::WorkerPanicked`] when a job did not complete its
    /// pass.
    pub fn wait(&self) -> SyncResult<()> {
        for signal in &self.signals {
            signal.wait();
        }
        self.failed_job()
            .map_or(Ok(()), |job| Err(SyncError::WorkerPanicked { job }))
    }

    /// Waits with timeout. Returns true if every job finished in time.
    #[must_use]
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        self.signals.iter().all(|s| s.wait_until(deadline))
    }
}

/// Completes the job behind a pending [`JobHandle`].
///
/// Dropping it without calling [`JobCompleter::complete`] (for example while
/// unwinding) marks the job as failed, so waiters never hang.
pub struct JobCompleter {
    signal: Arc<CompletionSignal>,
    finished: bool,
}

impl std::fmt::Debug for JobCompleter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobCompleter")
            .field("job", &self.signal.name)
            .finish()
    }
}

impl JobCompleter {
    /// Marks the job as successfully completed.
    pub fn complete(mut self) {
        self.finished = true;
        self.signal.signal(false);
    }

    /// Marks the job as failed.
    pub fn fail(mut self) {
        self.finished = true;
        self.signal.signal(true);
    }
}

impl Drop for JobCompleter {
    fn drop(&mut self) {
        if !self.finished {
            self.signal.signal(true);
        }
    }
}
