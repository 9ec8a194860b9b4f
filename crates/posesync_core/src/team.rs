//! # Team Policy
//!
//! Slots are grouped into teams. The per-team policy table is owned by a
//! collaborator (the simulation owner); the engine only reads it through
//! [`TeamPolicyLookup`] at the start of every pass.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

/// Team identifier. `0` means "no team".
pub type TeamId = u16;

/// The unassigned team.
pub const NO_TEAM: TeamId = 0;

/// Policy flags of one team, as seen by the synchronization passes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TeamPolicy {
    /// Physics step runs at a fixed cadence below the frame rate.
    pub fixed_update: bool,
    /// Culled by the camera this frame.
    pub camera_culling_invisible: bool,
    /// Camera culling keeps the last pose instead of resetting it.
    pub camera_culling_keep: bool,
    /// Culled by distance this frame.
    pub distance_culling_invisible: bool,
    /// Suspended because the owner's scale is near zero.
    pub scale_suspend: bool,
    /// Write-back suppressed.
    pub skip_writing: bool,
    /// Spring-driven team: write-back also places the world position.
    pub spring: bool,
    /// Restore disabled slots every qualifying tick.
    pub restore_only_once: bool,
}

impl TeamPolicy {
    /// Culled by either the camera or the distance check.
    #[inline]
    #[must_use]
    pub const fn is_culling_invisible(&self) -> bool {
        self.camera_culling_invisible || self.distance_culling_invisible
    }

    /// Culled in a mode where the node must keep its current pose.
    #[inline]
    #[must_use]
    pub const fn is_keep_culled(&self) -> bool {
        (self.camera_culling_invisible && self.camera_culling_keep) || self.distance_culling_invisible
    }

    /// Write-back is allowed for this team this tick.
    #[inline]
    #[must_use]
    pub const fn allows_write_back(&self) -> bool {
        !self.is_culling_invisible() && !self.scale_suspend && !self.skip_writing
    }
}

/// Read-only view of the team policy table.
pub trait TeamPolicyLookup: Send + Sync {
    /// Policy of `team`. Unknown teams and [`NO_TEAM`] yield the default policy.
    fn policy(&self, team: TeamId) -> TeamPolicy;

    /// Monotonic count of fixed-cadence physics steps taken so far.
    ///
    /// Capture compares it against the value it saw last time to decide
    /// whether a fixed-cadence team advanced since the previous capture.
    fn fixed_step_count(&self) -> u64;
}

/// Ready-made policy table.
///
/// Index `0` is reserved for [`NO_TEAM`] and always holds the default policy.
#[derive(Debug)]
pub struct TeamPolicyTable {
    teams: RwLock<Vec<TeamPolicy>>,
    fixed_steps: AtomicU64,
}

impl Default for TeamPolicyTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TeamPolicyTable {
    /// Creates a table holding only the unassigned team.
    #[must_use]
    pub fn new() -> Self {
        Self {
            teams: RwLock::new(vec![TeamPolicy::default()]),
            fixed_steps: AtomicU64::new(0),
        }
    }

    /// Registers a new team and returns its id.
    ///
    /// # Panics
    ///
    /// Panics once every [`TeamId`] is taken.
    pub fn add_team(&self, policy: TeamPolicy) -> TeamId {
        let mut teams = self.teams.write();
        let Ok(id) = TeamId::try_from(teams.len()) else {
            panic!("team table full ({} teams)", teams.len());
        };
        teams.push(policy);
        id
    }

    /// Replaces the policy of an existing team.
    ///
    /// # Panics
    ///
    /// Panics for [`NO_TEAM`] or an unknown id.
    pub fn set_policy(&self, team: TeamId, policy: TeamPolicy) {
        assert!(team != NO_TEAM, "the unassigned team has a fixed policy");
        let mut teams = self.teams.write();
        let slot = teams
            .get_mut(usize::from(team))
            .unwrap_or_else(|| panic!("unknown team {team}"));
        *slot = policy;
    }

    /// Applies `f` to the policy of an existing team.
    ///
    /// # Panics
    ///
    /// Panics for [`NO_TEAM`] or an unknown id.
    pub fn update_policy(&self, team: TeamId, f: impl FnOnce(&mut TeamPolicy)) {
        let mut policy = self.policy(team);
        f(&mut policy);
        self.set_policy(team, policy);
    }

    /// Number of registered teams, including the unassigned one.
    #[must_use]
    pub fn team_count(&self) -> usize {
        self.teams.read().len()
    }

    /// Records that one fixed-cadence physics step ran.
    pub fn advance_fixed_step(&self) {
        self.fixed_steps.fetch_add(1, Ordering::AcqRel);
    }
}

impl TeamPolicyLookup for TeamPolicyTable {
    fn policy(&self, team: TeamId) -> TeamPolicy {
        self.teams
            .read()
            .get(usize::from(team))
            .copied()
            .unwrap_or_default()
    }

    fn fixed_step_count(&self) -> u64 {
        self.fixed_steps.load(Ordering::Acquire)
    }
}
