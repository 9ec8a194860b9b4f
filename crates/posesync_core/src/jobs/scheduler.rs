//! # Job Scheduler
//!
//! A fixed set of dispatch threads fed through a channel.
//!
//! Jobs are dequeued in the order they were scheduled. A dispatch thread
//! first waits for the job's dependency handle, then runs the job. Since a
//! handle only exists once the job it stands for has been scheduled,
//! dependencies always point at earlier jobs and the queue cannot deadlock.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::handle::{JobCompleter, JobHandle};
use crate::error::{SyncError, SyncResult};

type JobFn = Box<dyn FnOnce() + Send + 'static>;

struct Task {
    name: &'static str,
    after: JobHandle,
    completer: JobCompleter,
    run: JobFn,
}

impl Task {
    fn execute(self) {
        let Self {
            name,
            after,
            completer,
            run,
        } = self;

        if let Err(e) = after.wait() {
            tracing::warn!("Skipping job `{}`: dependency failed ({})", name, e);
            completer.fail();
            return;
        }

        match catch_unwind(AssertUnwindSafe(run)) {
            Ok(()) => completer.complete(),
            Err(_) => {
                tracing::warn!("Job `{}` panicked", name);
                completer.fail();
            }
        }
    }
}

/// Runs scheduled passes on background threads.
pub struct JobScheduler {
    sender: Option<Sender<Task>>,
    threads: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for JobScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobScheduler")
            .field("threads", &self.threads.len())
            .finish()
    }
}

impl JobScheduler {
    /// Starts `threads` dispatch threads.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ThreadSpawn`] if a thread cannot be started.
    ///
    /// # Panics
    ///
    /// Panics if `threads` is zero.
    pub fn new(threads: usize) -> SyncResult<Self> {
        assert!(threads > 0, "JobScheduler needs at least one thread");

        let (sender, receiver) = unbounded::<Task>();
        let mut handles = Vec::with_capacity(threads);
        for i in 0..threads {
            let receiver: Receiver<Task> = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("posesync-job-{i}"))
                .spawn(move || {
                    while let Ok(task) = receiver.recv() {
                        task.execute();
                    }
                })
                .map_err(|e| SyncError::ThreadSpawn(e.to_string()))?;
            handles.push(handle);
        }

        tracing::debug!("Job scheduler started with {} threads", threads);
        Ok(Self {
            sender: Some(sender),
            threads: handles,
        })
    }

    /// Schedules `job` to run once `after` completes.
    ///
    /// If `after` fails, the job is skipped and its handle fails as well.
    pub fn schedule<F>(&self, after: &JobHandle, name: &'static str, job: F) -> JobHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let (handle, completer) = JobHandle::pending(name);
        let task = Task {
            name,
            after: after.clone(),
            completer,
            run: Box::new(job),
        };

        let rejected = match &self.sender {
            Some(sender) => sender.send(task).err().map(|e| e.into_inner()),
            None => Some(task),
        };
        if let Some(task) = rejected {
            // No dispatch thread left; run on the caller's thread.
            task.execute();
        }
        handle
    }
}

impl Drop for JobScheduler {
    fn drop(&mut self) {
        // Closing the channel lets every thread drain the queue and exit.
        self.sender.take();
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                tracing::warn!("Job dispatch thread panicked");
            }
        }
    }
}
