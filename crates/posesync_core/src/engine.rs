//! # Transform Sync Engine
//!
//! The facade the simulation owner talks to. It owns the slot store, the
//! component-node store and the job scheduler that runs the passes.
//!
//! ## Tick
//!
//! ```text
//! schedule_capture(h0) -> h1        read nodes into the store
//! h1.wait()                         simulation step edits live poses
//! schedule_write_back(h2) -> h3     enabled slots: push results out
//! schedule_restore(h2) -> h3        disabled slots: back to the initial pose
//! schedule_restore_base(h3) -> h4   fixed teams that did not step this tick
//! ```
//!
//! ## Validity
//!
//! Until [`TransformSyncEngine::initialize`] runs, and after
//! [`TransformSyncEngine::dispose`], every operation is a silent no-op:
//! allocations return [`Chunk::INVALID`], schedule calls hand back the
//! incoming handle and accessors return `None`. Managers tearing down in
//! arbitrary order can keep calling the engine safely.
//!
//! Caller bugs (out-of-range indices or chunks) panic instead.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::component::{ComponentNodeStore, ComponentPose};
use crate::config::SyncConfig;
use crate::diagnostics;
use crate::error::SyncResult;
use crate::flags::SlotFlags;
use crate::jobs::{JobHandle, JobScheduler};
use crate::node::NodeHandle;
use crate::store::{Chunk, Growth, LivePoseMut, SlotRecord, SlotSource, SlotStore};
use crate::team::{TeamId, TeamPolicyLookup};
use crate::workers::{self, TeamSnapshot};

/// State shared between the engine and its scheduled jobs.
struct EngineShared {
    config: SyncConfig,
    teams: Arc<dyn TeamPolicyLookup>,
    valid: AtomicBool,
    store: RwLock<SlotStore>,
    components: RwLock<ComponentNodeStore>,
    /// Slot count, republished under the store's write lock. Read by the
    /// schedule calls in place of the lock.
    slot_count: AtomicUsize,
    /// Component-node count, republished under the components' write lock.
    component_count: AtomicUsize,
    /// Set by Restore when a fixed-cadence team's slot was restored.
    any_fixed_team_restored: AtomicBool,
    /// Fixed-step count seen by the previous capture.
    last_fixed_step: AtomicU64,
}

impl EngineShared {
    fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    fn publish_slot_count(&self, store: &SlotStore) {
        self.slot_count.store(store.len(), Ordering::Release);
    }

    fn publish_component_count(&self, components: &ComponentNodeStore) {
        self.component_count.store(components.len(), Ordering::Release);
    }
}

/// Keeps simulation-owned slot poses and external scene nodes in sync.
pub struct TransformSyncEngine {
    shared: Arc<EngineShared>,
    scheduler: JobScheduler,
}

impl std::fmt::Debug for TransformSyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformSyncEngine")
            .field("valid", &self.is_valid())
            .field("len", &self.len())
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

impl TransformSyncEngine {
    /// Creates an engine reading team policies from `teams`.
    ///
    /// The engine starts uninitialized.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the job threads
    /// cannot be started.
    pub fn new(config: SyncConfig, teams: Arc<dyn TeamPolicyLookup>) -> SyncResult<Self> {
        config.validate()?;
        let scheduler = JobScheduler::new(config.worker_threads)?;
        let last_step = teams.fixed_step_count();
        Ok(Self {
            shared: Arc::new(EngineShared {
                config,
                teams,
                valid: AtomicBool::new(false),
                store: RwLock::new(SlotStore::default()),
                components: RwLock::new(ComponentNodeStore::default()),
                slot_count: AtomicUsize::new(0),
                component_count: AtomicUsize::new(0),
                any_fixed_team_restored: AtomicBool::new(false),
                last_fixed_step: AtomicU64::new(last_step),
            }),
            scheduler,
        })
    }

    /// The configuration the engine was created with.
    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.shared.config
    }

    /// Allocates empty stores and makes the engine valid.
    ///
    /// Initializing an already valid engine disposes it first.
    pub fn initialize(&self) {
        let capacity = self.shared.config.initial_capacity;
        let mut store = self.shared.store.write();
        let mut components = self.shared.components.write();
        *store = SlotStore::with_capacity(capacity);
        *components = ComponentNodeStore::with_capacity(capacity);
        self.shared.publish_slot_count(&store);
        self.shared.publish_component_count(&components);
        self.shared.any_fixed_team_restored.store(false, Ordering::Release);
        self.shared
            .last_fixed_step
            .store(self.shared.teams.fixed_step_count(), Ordering::Release);
        self.shared.valid.store(true, Ordering::Release);
        tracing::debug!("Transform sync engine initialized (capacity {})", capacity);
    }

    /// Releases every slot and makes the engine invalid.
    ///
    /// Chunks handed out before must not be used again.
    pub fn dispose(&self) {
        let mut store = self.shared.store.write();
        let mut components = self.shared.components.write();
        self.shared.valid.store(false, Ordering::Release);
        *store = SlotStore::default();
        *components = ComponentNodeStore::default();
        self.shared.publish_slot_count(&store);
        self.shared.publish_component_count(&components);
        tracing::debug!("Transform sync engine disposed");
    }

    /// Checks whether the engine is initialized and not disposed.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.shared.is_valid()
    }

    /// Number of slots, tombstones included.
    ///
    /// Does not wait for a running pass.
    #[must_use]
    pub fn len(&self) -> usize {
        if !self.is_valid() {
            return 0;
        }
        self.shared.slot_count.load(Ordering::Acquire)
    }

    /// Checks whether the engine holds no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn invalid(&self, op: &str) -> bool {
        if self.is_valid() {
            return false;
        }
        tracing::trace!("Ignoring {} on invalid transform sync engine", op);
        true
    }

    // ========================================================================
    // SLOT OPERATIONS
    // ========================================================================

    /// Copies a prepared group of nodes into a new chunk of `team`.
    ///
    /// # Panics
    ///
    /// Panics if the source columns differ in length.
    pub fn allocate_bulk(&self, source: &SlotSource, team: TeamId) -> Chunk {
        if self.invalid("allocate_bulk") {
            return Chunk::INVALID;
        }
        let chunk = {
            let mut store = self.shared.store.write();
            let chunk = store.allocate_bulk(source, team);
            self.shared.publish_slot_count(&store);
            chunk
        };
        tracing::debug!("Allocated {:?} from bulk source (team {})", chunk, team);
        chunk
    }

    /// Reserves `count` empty slots of `team` bound to `placeholder`.
    pub fn allocate_range(&self, count: u32, team: TeamId, placeholder: &NodeHandle) -> Chunk {
        if self.invalid("allocate_range") {
            return Chunk::INVALID;
        }
        let chunk = {
            let mut store = self.shared.store.write();
            let chunk = store.allocate_range(count, team, placeholder);
            self.shared.publish_slot_count(&store);
            chunk
        };
        tracing::debug!("Allocated {:?} bound to {} (team {})", chunk, placeholder.name(), team);
        chunk
    }

    /// Allocates one slot bound to `node`, capturing its pose right away.
    pub fn allocate_one(&self, node: NodeHandle, flags: SlotFlags, team: TeamId) -> Chunk {
        if self.invalid("allocate_one") {
            return Chunk::INVALID;
        }
        let chunk = {
            let mut store = self.shared.store.write();
            let chunk = store.allocate_one(node, flags, team);
            self.shared.publish_slot_count(&store);
            chunk
        };
        tracing::trace!("Allocated single slot {}", chunk.start);
        chunk
    }

    /// Rebinds slot `index` to `node`, or tombstones it when `node` is `None`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range, or when binding a node to a slot of
    /// a removed range.
    pub fn set_one(&self, node: Option<NodeHandle>, flags: SlotFlags, index: usize, team: TeamId) {
        if self.invalid("set_one") {
            return;
        }
        self.shared.store.write().set_one(node, flags, index, team);
    }

    /// Copies every column value and the node binding between two slots.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of range or `to` lies in a removed range.
    pub fn copy_slot(&self, from: usize, to: usize) {
        if self.invalid("copy_slot") {
            return;
        }
        self.shared.store.write().copy_slot(from, to);
    }

    /// Tombstones every slot of `chunk` and frees the range for reuse.
    ///
    /// # Panics
    ///
    /// Panics if the chunk reaches past the end of the store.
    pub fn remove(&self, chunk: Chunk) {
        if self.invalid("remove") {
            return;
        }
        self.shared.store.write().remove(chunk);
        tracing::debug!("Removed {:?}", chunk);
    }

    /// Grows `chunk` to `new_length` slots and returns the resulting chunk.
    ///
    /// The returned chunk equals `chunk` (with the new length) unless the
    /// slots had to move.
    ///
    /// # Panics
    ///
    /// Panics if the chunk is invalid or out of range.
    pub fn expand(&self, chunk: Chunk, new_length: u32) -> Chunk {
        if self.invalid("expand") {
            return Chunk::INVALID;
        }
        let growth = {
            let mut store = self.shared.store.write();
            let growth = store.expand(chunk, new_length);
            self.shared.publish_slot_count(&store);
            growth
        };
        if let Growth::Relocated { old, new } = growth {
            tracing::debug!("Relocated {:?} to {:?}", old, new);
        }
        growth.chunk()
    }

    /// Sets or clears the enable bit of every live slot in `chunk`.
    pub fn enable_range(&self, chunk: Chunk, on: bool) {
        if self.invalid("enable_range") {
            return;
        }
        self.shared.store.write().enable_range(chunk, on);
    }

    /// Sets or clears the enable bit of one live slot.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn enable_one(&self, index: usize, on: bool) {
        if self.invalid("enable_one") {
            return;
        }
        self.shared.store.write().enable_one(index, on);
    }

    /// Lets the simulation step edit the live pose of every slot in `chunk`.
    ///
    /// `f` receives the slot index and its live pose.
    ///
    /// # Panics
    ///
    /// Panics if the chunk reaches past the end of the store.
    pub fn edit_live_poses<F>(&self, chunk: Chunk, mut f: F)
    where
        F: FnMut(usize, LivePoseMut<'_>),
    {
        if self.invalid("edit_live_poses") || !chunk.is_valid() {
            return;
        }
        let mut store = self.shared.store.write();
        for index in chunk.range() {
            f(index, store.live_pose_mut(index));
        }
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    /// Every column value of slot `index`.
    #[must_use]
    pub fn slot(&self, index: usize) -> Option<SlotRecord> {
        if !self.is_valid() {
            return None;
        }
        self.shared.store.read().record(index)
    }

    /// Flags of slot `index`.
    #[must_use]
    pub fn flags(&self, index: usize) -> Option<SlotFlags> {
        if !self.is_valid() {
            return None;
        }
        self.shared.store.read().flags(index)
    }

    /// Team of slot `index`.
    #[must_use]
    pub fn team_id(&self, index: usize) -> Option<TeamId> {
        if !self.is_valid() {
            return None;
        }
        self.shared.store.read().team_id(index)
    }

    /// Node bound to slot `index`.
    #[must_use]
    pub fn node(&self, index: usize) -> Option<NodeHandle> {
        if !self.is_valid() {
            return None;
        }
        self.shared.store.read().node(index).cloned()
    }

    /// Checks that every column and the binding table share one length.
    #[must_use]
    pub fn is_synchronized(&self) -> bool {
        self.shared.store.read().is_synchronized()
    }

    /// Free ranges available for reuse.
    #[must_use]
    pub fn free_ranges(&self) -> Vec<Chunk> {
        self.shared.store.read().allocator().free_ranges().to_vec()
    }

    // ========================================================================
    // PASSES
    // ========================================================================

    /// Schedules Capture after `after`.
    ///
    /// Whether the fixed-cadence step advanced is decided here, at schedule
    /// time, against the value seen by the previous capture.
    pub fn schedule_capture(&self, after: &JobHandle) -> JobHandle {
        if self.invalid("schedule_capture") || self.is_empty() {
            return after.clone();
        }
        let step = self.shared.teams.fixed_step_count();
        let advanced = self.shared.last_fixed_step.swap(step, Ordering::AcqRel) != step;

        let shared = Arc::clone(&self.shared);
        self.scheduler.schedule(after, "capture", move || {
            if !shared.is_valid() {
                return;
            }
            let mut store = shared.store.write();
            let teams = TeamSnapshot::take(shared.teams.as_ref(), &store.columns().team_id);
            let (columns, bindings) = store.parts_mut();
            let n = workers::capture_pass(columns, bindings, &teams, advanced, &shared.config.parallel);
            tracing::trace!("Captured {} slots (fixed step advanced: {})", n, advanced);
        })
    }

    /// Schedules Write-Back after `after`.
    pub fn schedule_write_back(&self, after: &JobHandle) -> JobHandle {
        if self.invalid("schedule_write_back") || self.is_empty() {
            return after.clone();
        }
        let shared = Arc::clone(&self.shared);
        self.scheduler.schedule(after, "write_back", move || {
            if !shared.is_valid() {
                return;
            }
            let store = shared.store.read();
            let teams = TeamSnapshot::take(shared.teams.as_ref(), &store.columns().team_id);
            let n = workers::write_back_pass(
                store.columns(),
                store.bindings(),
                &teams,
                &shared.config.parallel,
            );
            tracing::trace!("Wrote back {} slots", n);
        })
    }

    /// Schedules Restore after `after`.
    ///
    /// [`TransformSyncEngine::any_fixed_team_restored`] is reset when the
    /// pass starts and reports its outcome once the returned handle completes.
    pub fn schedule_restore(&self, after: &JobHandle) -> JobHandle {
        if self.invalid("schedule_restore") || self.is_empty() {
            self.shared
                .any_fixed_team_restored
                .store(false, Ordering::Release);
            return after.clone();
        }
        let shared = Arc::clone(&self.shared);
        self.scheduler.schedule(after, "restore", move || {
            shared.any_fixed_team_restored.store(false, Ordering::Release);
            if !shared.is_valid() {
                return;
            }
            let store = shared.store.read();
            let teams = TeamSnapshot::take(shared.teams.as_ref(), &store.columns().team_id);
            let n = workers::restore_pass(
                store.columns(),
                store.bindings(),
                &teams,
                &shared.any_fixed_team_restored,
                &shared.config.parallel,
            );
            tracing::trace!("Restored {} slots", n);
        })
    }

    /// Schedules Restore-Base after `after`.
    pub fn schedule_restore_base(&self, after: &JobHandle) -> JobHandle {
        if self.invalid("schedule_restore_base") || self.is_empty() {
            return after.clone();
        }
        let shared = Arc::clone(&self.shared);
        self.scheduler.schedule(after, "restore_base", move || {
            if !shared.is_valid() {
                return;
            }
            let store = shared.store.read();
            let teams = TeamSnapshot::take(shared.teams.as_ref(), &store.columns().team_id);
            let n = workers::restore_base_pass(
                store.columns(),
                store.bindings(),
                &teams,
                &shared.config.parallel,
            );
            tracing::trace!("Restored base pose of {} slots", n);
        })
    }

    /// Whether the last completed Restore touched a fixed-cadence team.
    ///
    /// Only meaningful after the handle of that Restore has completed.
    #[must_use]
    pub fn any_fixed_team_restored(&self) -> bool {
        self.shared.any_fixed_team_restored.load(Ordering::Acquire)
    }

    // ========================================================================
    // COMPONENT NODES
    // ========================================================================

    /// Registers an auxiliary node and returns its index.
    ///
    /// Returns `None` when the engine is invalid.
    pub fn add_component_node(&self, node: NodeHandle) -> Option<usize> {
        if self.invalid("add_component_node") {
            return None;
        }
        let mut components = self.shared.components.write();
        let index = components.add(node);
        self.shared.publish_component_count(&components);
        Some(index)
    }

    /// Releases an auxiliary node. Unknown indices are ignored.
    pub fn remove_component_node(&self, index: usize) {
        if self.invalid("remove_component_node") {
            return;
        }
        self.shared.components.write().remove(index);
    }

    /// Schedules the component-node capture after `after`.
    pub fn schedule_component_capture(&self, after: &JobHandle) -> JobHandle {
        if self.invalid("schedule_component_capture")
            || self.shared.component_count.load(Ordering::Acquire) == 0
        {
            return after.clone();
        }
        let shared = Arc::clone(&self.shared);
        self.scheduler.schedule(after, "component_capture", move || {
            if !shared.is_valid() {
                return;
            }
            let n = shared.components.write().capture(&shared.config.parallel);
            tracing::trace!("Captured {} component nodes", n);
        })
    }

    /// Last captured state of the auxiliary node at `index`.
    #[must_use]
    pub fn component_pose(&self, index: usize) -> Option<ComponentPose> {
        if !self.is_valid() {
            return None;
        }
        self.shared.components.read().pose(index)
    }

    // ========================================================================
    // DIAGNOSTICS
    // ========================================================================

    /// Human-readable listing of every slot and component node.
    ///
    /// Also emitted at `info` level.
    #[must_use]
    pub fn diagnostic_dump(&self) -> String {
        let text = if self.is_valid() {
            let store = self.shared.store.read();
            let components = self.shared.components.read();
            diagnostics::dump(Some((&store, &components)))
        } else {
            diagnostics::dump(None)
        };
        tracing::info!("{}", text);
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::MemoryNode;
    use crate::team::TeamPolicyTable;
    use glam::Vec3;

    fn engine() -> TransformSyncEngine {
        let engine =
            TransformSyncEngine::new(SyncConfig::default(), Arc::new(TeamPolicyTable::new())).unwrap();
        engine.initialize();
        engine
    }

    #[test]
    fn test_new_engine_is_invalid() {
        let engine =
            TransformSyncEngine::new(SyncConfig::default(), Arc::new(TeamPolicyTable::new())).unwrap();
        assert!(!engine.is_valid());
        let node: NodeHandle = MemoryNode::shared("n", Vec3::ZERO);
        assert_eq!(engine.allocate_one(node, SlotFlags::NONE, 0), Chunk::INVALID);
        assert_eq!(engine.len(), 0);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = SyncConfig {
            worker_threads: 0,
            ..SyncConfig::default()
        };
        assert!(TransformSyncEngine::new(config, Arc::new(TeamPolicyTable::new())).is_err());
    }

    #[test]
    fn test_initialize_then_dispose() {
        let engine = engine();
        let node: NodeHandle = MemoryNode::shared("n", Vec3::ZERO);
        let chunk = engine.allocate_one(node, SlotFlags::from_bits(SlotFlags::ENABLE), 0);
        assert_eq!(chunk, Chunk::new(0, 1));
        assert_eq!(engine.len(), 1);

        engine.dispose();
        assert!(!engine.is_valid());
        assert_eq!(engine.len(), 0);
        assert!(engine.slot(0).is_none());
        engine.remove(chunk);
        engine.enable_one(0, true);

        engine.initialize();
        assert!(engine.is_valid());
        assert!(engine.is_empty());
    }

    #[test]
    fn test_schedule_on_empty_engine_returns_incoming_handle() {
        let engine = engine();
        let (gate, opener) = JobHandle::pending("gate");
        let h = engine.schedule_capture(&gate);
        assert!(!h.is_done());
        opener.complete();
        assert!(h.is_done());
    }

    #[test]
    fn test_edit_live_poses() {
        let engine = engine();
        let node: NodeHandle = MemoryNode::shared("n", Vec3::ZERO);
        let chunk = engine.allocate_range(3, 1, &node);
        engine.edit_live_poses(chunk, |i, pose| {
            *pose.local_position = Vec3::splat(i as f32);
        });
        assert_eq!(engine.slot(2).unwrap().local_position, Vec3::splat(2.0));
    }
}
