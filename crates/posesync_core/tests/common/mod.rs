//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use glam::{Quat, Vec3};
use posesync_core::{
    MemoryNode, NodeHandle, SlotFlags, SlotSource, SyncConfig, TeamId, TeamPolicy,
    TeamPolicyTable, TransformSyncEngine,
};

/// Engine plus the policy table it reads.
pub struct Rig {
    pub engine: TransformSyncEngine,
    pub teams: Arc<TeamPolicyTable>,
}

/// Initialized engine with `team_count` default teams (ids `1..=team_count`).
pub fn rig(team_count: usize) -> Rig {
    let teams = Arc::new(TeamPolicyTable::new());
    for _ in 0..team_count {
        teams.add_team(TeamPolicy::default());
    }
    let engine = TransformSyncEngine::new(SyncConfig::default(), teams.clone()).unwrap();
    engine.initialize();
    Rig { engine, teams }
}

/// `count` root nodes named `{prefix}{i}`, node `i` at `(i, 0, 0)`.
pub fn nodes(prefix: &str, count: usize) -> Vec<Arc<MemoryNode>> {
    (0..count)
        .map(|i| MemoryNode::shared(format!("{prefix}{i}"), Vec3::new(i as f32, 0.0, 0.0)))
        .collect()
}

/// Bulk source binding every node with the same flags.
pub fn source(nodes: &[Arc<MemoryNode>], flags: u8) -> SlotSource {
    let anchor: NodeHandle = MemoryNode::shared("anchor", Vec3::ZERO);
    let mut source = SlotSource::new(anchor);
    for node in nodes {
        let handle: NodeHandle = node.clone();
        source.push_node(handle, SlotFlags::from_bits(flags));
    }
    source
}

/// Sets `policy` on `team`.
pub fn set_policy(rig: &Rig, team: TeamId, policy: TeamPolicy) {
    rig.teams.set_policy(team, policy);
}

/// Moves a node without recording a write.
pub fn place(node: &MemoryNode, position: Vec3) {
    node.place(position, Quat::IDENTITY);
}
