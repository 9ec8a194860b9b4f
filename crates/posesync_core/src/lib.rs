//! # POSESYNC Core
//!
//! Transform synchronization engine: keeps thousands of simulation-owned
//! pose records consistent with an external scene graph, every frame.
//!
//! ## Architecture
//!
//! 1. **Slot store** - one column per pose attribute, addressed by stable
//!    slot indices handed out in contiguous chunks
//! 2. **Node bindings** - the external node of every slot, behind the
//!    [`SceneNode`] trait
//! 3. **Passes** - Capture, Write-Back, Restore and Restore-Base run as
//!    scheduled jobs, parallel over disjoint slot batches
//! 4. **Team policies** - read from an external [`TeamPolicyLookup`] at the
//!    start of every pass
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use posesync_core::{JobHandle, SlotFlags, SyncConfig, TeamPolicyTable, TransformSyncEngine};
//!
//! let teams = Arc::new(TeamPolicyTable::new());
//! let engine = TransformSyncEngine::new(SyncConfig::default(), teams)?;
//! engine.initialize();
//!
//! let chunk = engine.allocate_one(node, SlotFlags::from_bits(SlotFlags::CAPTURE | SlotFlags::ENABLE), 1);
//! let captured = engine.schedule_capture(&JobHandle::completed());
//! captured.wait()?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod component;
pub mod config;
mod diagnostics;
pub mod engine;
pub mod error;
pub mod flags;
pub mod jobs;
pub mod math;
pub mod node;
pub mod store;
pub mod team;
mod workers;

pub use component::{ComponentNodeStore, ComponentPose};
pub use config::{ParConfig, SyncConfig, DEFAULT_INITIAL_CAPACITY};
pub use engine::TransformSyncEngine;
pub use error::{SyncError, SyncResult};
pub use flags::SlotFlags;
pub use jobs::{JobCompleter, JobHandle, JobScheduler};
pub use node::{MemoryNode, NodeHandle, NodePose, NodeWrite, SceneNode};
pub use store::{Chunk, ChunkAllocator, Growth, LivePoseMut, SlotRecord, SlotSource, SlotStore};
pub use team::{TeamId, TeamPolicy, TeamPolicyLookup, TeamPolicyTable, NO_TEAM};
