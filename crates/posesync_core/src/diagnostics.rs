//! Human-readable dump of the engine state, for tooling.
//!
//! ```text
//! ========== Transform Sync ==========
//! Slots. Length:3
//!   -flags:3/256
//!   ...
//!   [0] team:3 (ErW) hip
//!   [1] team:0 () (null)
//! Component Nodes. Length:1
//!   -position:1/256
//!   -min_scale:1/256
//!   [0] pos:(0.000, 1.000, 0.000) min_scale:1.000 body
//! ```

use std::fmt::Write;

use crate::component::ComponentNodeStore;
use crate::store::SlotStore;

const HEADER: &str = "========== Transform Sync ==========";

/// Renders the dump. `None` stands for an invalid engine.
pub(crate) fn dump(state: Option<(&SlotStore, &ComponentNodeStore)>) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = render(&mut out, state);
    out
}

fn render(out: &mut String, state: Option<(&SlotStore, &ComponentNodeStore)>) -> std::fmt::Result {
    writeln!(out, "{HEADER}")?;
    let Some((store, components)) = state else {
        writeln!(out, "Transform Sync. Invalid.")?;
        return Ok(());
    };

    writeln!(out, "Slots. Length:{}", store.len())?;
    for (name, len, capacity) in store.columns().summary() {
        writeln!(out, "  -{name}:{len}/{capacity}")?;
    }
    for i in 0..store.len() {
        let flags = store.flags(i).unwrap_or_default();
        let team = store.team_id(i).unwrap_or_default();
        let name = store.node(i).map_or("(null)", |n| n.name());
        writeln!(out, "  [{i}] team:{team} ({}) {name}", flags.summary())?;
    }

    writeln!(out, "Component Nodes. Length:{}", components.len())?;
    for (name, len, capacity) in components.summary() {
        writeln!(out, "  -{name}:{len}/{capacity}")?;
    }
    for i in 0..components.len() {
        match (components.node(i), components.pose(i)) {
            (Some(node), Some(pose)) => writeln!(
                out,
                "  [{i}] pos:({:.3}, {:.3}, {:.3}) min_scale:{:.3} {}",
                pose.position.x,
                pose.position.y,
                pose.position.z,
                pose.min_scale,
                node.name()
            )?,
            _ => writeln!(out, "  [{i}] (null)")?,
        }
    }
    Ok(())
}
