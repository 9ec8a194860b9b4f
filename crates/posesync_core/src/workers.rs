//! # Synchronization Passes
//!
//! The four per-slot passes between the slot store and the external nodes.
//!
//! ## Gating
//!
//! | Pass         | Slot needs                      | Team must not be                 |
//! |--------------|---------------------------------|----------------------------------|
//! | Capture      | node, `ENABLE`, `CAPTURE`       | culled                           |
//! | Write-Back   | node, `ENABLE`                  | culled, scale-suspended, skipped |
//! | Restore      | node, `RESTORE_ON_DISABLE`      | keep-culled                      |
//! | Restore-Base | as Restore, fixed-cadence team  | keep-culled                      |
//!
//! Restore and Restore-Base additionally require the slot to be enabled or
//! its team to restore every tick.
//!
//! Every pass touches each slot independently, so slots are split into
//! disjoint batches with [`par_for_each_lanes`]. The only state shared
//! between batches is the "fixed-cadence team restored" flag, which is
//! reset before the pass and only ever set to `true` during it.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::config::ParConfig;
use crate::flags::SlotFlags;
use crate::jobs::{par_for_each_lanes, Lanes};
use crate::math::derive_world_scale;
use crate::node::NodeHandle;
use crate::store::{CaptureLanes, NodeBindingTable, SlotColumns};
use crate::team::{TeamId, TeamPolicy, TeamPolicyLookup};

// ============================================================================
// TEAM SNAPSHOT
// ============================================================================

/// Team policies copied once at the start of a pass.
///
/// Keeps every slot of one pass on the same policy even if the owner edits
/// the table concurrently.
#[derive(Clone, Debug, Default)]
pub(crate) struct TeamSnapshot {
    policies: Vec<TeamPolicy>,
}

impl TeamSnapshot {
    /// Copies the policy of every team id in `team_ids`.
    pub(crate) fn take(lookup: &dyn TeamPolicyLookup, team_ids: &[TeamId]) -> Self {
        let max = team_ids.iter().copied().max().unwrap_or(0);
        Self {
            policies: (0..=max).map(|team| lookup.policy(team)).collect(),
        }
    }

    #[inline]
    pub(crate) fn get(&self, team: TeamId) -> TeamPolicy {
        self.policies
            .get(usize::from(team))
            .copied()
            .unwrap_or_default()
    }
}

/// Node bound to slot `i`, if it is still alive.
#[inline]
fn live_node(bindings: &NodeBindingTable, i: usize) -> Option<&NodeHandle> {
    bindings.get(i).filter(|node| node.is_valid())
}

/// Restore gating shared by Restore and Restore-Base.
#[inline]
fn restore_allowed(flags: SlotFlags, policy: &TeamPolicy) -> bool {
    if !flags.restores_on_disable() {
        return false;
    }
    if !flags.is_enabled() && !policy.restore_only_once {
        return false;
    }
    !policy.is_keep_culled()
}

// ============================================================================
// CAPTURE
// ============================================================================

/// Reads every eligible node into the live pose columns.
///
/// `advanced` tells whether the fixed-cadence physics step ran since the
/// previous capture; fixed-cadence teams only refresh their base pose then.
/// Returns the number of slots captured.
pub(crate) fn capture_pass(
    columns: &mut SlotColumns,
    bindings: &NodeBindingTable,
    teams: &TeamSnapshot,
    advanced: bool,
    par: &ParConfig,
) -> usize {
    let captured = AtomicUsize::new(0);
    let (lanes, flags, team_ids) = columns.capture_lanes();

    par_for_each_lanes(lanes, par, &|lane: CaptureLanes<'_>| {
        let mut count = 0;
        for k in 0..lane.len() {
            let i = lane.start + k;
            let f = flags[i];
            if !f.is_enabled() || !f.captures() {
                continue;
            }
            let Some(node) = live_node(bindings, i) else {
                continue;
            };
            let policy = teams.get(team_ids[i]);
            if policy.is_culling_invisible() {
                continue;
            }

            let pose = node.read_pose();
            lane.world_position[k] = pose.world_position;
            lane.world_rotation[k] = pose.world_rotation;
            lane.local_position[k] = pose.local_position;
            lane.local_rotation[k] = pose.local_rotation;
            lane.local_scale[k] = pose.local_scale;
            lane.world_scale[k] = derive_world_scale(pose.world_rotation, pose.local_to_world);
            lane.local_to_world[k] = pose.local_to_world;

            if !policy.fixed_update || advanced {
                lane.base_local_position[k] = pose.local_position;
                lane.base_local_rotation[k] = pose.local_rotation;
            }
            count += 1;
        }
        captured.fetch_add(count, Ordering::Relaxed);
    });

    captured.into_inner()
}

// ============================================================================
// WRITE-BACK
// ============================================================================

/// Pushes the simulated pose of every eligible slot to its node.
///
/// World-rotation write-back wins over local-pose write-back when a slot has
/// both bits. Returns the number of slots written.
pub(crate) fn write_back_pass(
    columns: &SlotColumns,
    bindings: &NodeBindingTable,
    teams: &TeamSnapshot,
    par: &ParConfig,
) -> usize {
    let written = AtomicUsize::new(0);

    par_for_each_lanes(0..columns.len(), par, &|range: std::ops::Range<usize>| {
        let mut count = 0;
        for i in range {
            let f = columns.flags[i];
            if !f.is_enabled() {
                continue;
            }
            let Some(node) = live_node(bindings, i) else {
                continue;
            };
            let policy = teams.get(columns.team_id[i]);
            if !policy.allows_write_back() {
                continue;
            }

            if f.writes_world_rotation() {
                node.set_world_rotation(columns.world_rotation[i]);
                if policy.spring {
                    node.set_world_position(columns.world_position[i]);
                }
                count += 1;
            } else if f.writes_local_pose() {
                node.set_local_position(columns.local_position[i]);
                node.set_local_rotation(columns.local_rotation[i]);
                count += 1;
            }
        }
        written.fetch_add(count, Ordering::Relaxed);
    });

    written.into_inner()
}

// ============================================================================
// RESTORE
// ============================================================================

/// Writes the initial local pose back to every eligible node.
///
/// Sets `any_fixed_team` when a restored slot belongs to a fixed-cadence
/// team. The caller resets the flag before the pass. Returns the number of
/// slots restored.
pub(crate) fn restore_pass(
    columns: &SlotColumns,
    bindings: &NodeBindingTable,
    teams: &TeamSnapshot,
    any_fixed_team: &AtomicBool,
    par: &ParConfig,
) -> usize {
    let restored = AtomicUsize::new(0);

    par_for_each_lanes(0..columns.len(), par, &|range: std::ops::Range<usize>| {
        let mut count = 0;
        for i in range {
            let Some(node) = live_node(bindings, i) else {
                continue;
            };
            let policy = teams.get(columns.team_id[i]);
            if !restore_allowed(columns.flags[i], &policy) {
                continue;
            }

            node.set_local_position(columns.init_local_position[i]);
            node.set_local_rotation(columns.init_local_rotation[i]);
            if policy.fixed_update {
                any_fixed_team.store(true, Ordering::Relaxed);
            }
            count += 1;
        }
        restored.fetch_add(count, Ordering::Relaxed);
    });

    restored.into_inner()
}

/// Writes the base local pose back to every eligible node of a fixed-cadence
/// team. Returns the number of slots restored.
pub(crate) fn restore_base_pass(
    columns: &SlotColumns,
    bindings: &NodeBindingTable,
    teams: &TeamSnapshot,
    par: &ParConfig,
) -> usize {
    let restored = AtomicUsize::new(0);

    par_for_each_lanes(0..columns.len(), par, &|range: std::ops::Range<usize>| {
        let mut count = 0;
        for i in range {
            let Some(node) = live_node(bindings, i) else {
                continue;
            };
            let policy = teams.get(columns.team_id[i]);
            if !policy.fixed_update || !restore_allowed(columns.flags[i], &policy) {
                continue;
            }

            node.set_local_position(columns.base_local_position[i]);
            node.set_local_rotation(columns.base_local_rotation[i]);
            count += 1;
        }
        restored.fetch_add(count, Ordering::Relaxed);
    });

    restored.into_inner()
}
