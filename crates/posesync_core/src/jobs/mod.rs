//! # Jobs
//!
//! Minimal job system for the synchronization passes:
//!
//! - [`JobHandle`]: completion of scheduled work, chained forward-only
//! - [`JobScheduler`]: dispatch threads that run a job once its dependency completes
//! - [`par_for_each_lanes`]: per-slot batching inside one job

mod handle;
mod par;
mod scheduler;

pub use handle::{JobCompleter, JobHandle};
pub use par::{par_for_each_lanes, Lanes, PARALLEL_THRESHOLD};
pub use scheduler::JobScheduler;
