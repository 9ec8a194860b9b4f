//! Integration tests for component nodes and the diagnostic dump.

mod common;

use std::f32::consts::{FRAC_PI_2, FRAC_PI_6};
use std::sync::Arc;

use glam::{Mat4, Quat, Vec3};
use posesync_core::{JobHandle, MemoryNode, NodeHandle, SlotFlags, SyncConfig};

#[test]
fn test_component_capture_reads_position_and_min_scale() {
    let rig = common::rig(1);
    let body: NodeHandle = Arc::new(MemoryNode::new(
        "body",
        Vec3::new(0.0, 1.0, 0.0),
        Quat::IDENTITY,
        Vec3::new(2.0, -0.5, 3.0),
    ));
    let index = rig.engine.add_component_node(body).unwrap();

    let before = rig.engine.component_pose(index).unwrap();
    assert_eq!(before.position, Vec3::ZERO);
    assert_eq!(before.min_scale, 1.0);

    rig.engine
        .schedule_component_capture(&JobHandle::completed())
        .wait()
        .unwrap();
    let pose = rig.engine.component_pose(index).unwrap();
    assert_eq!(pose.position, Vec3::new(0.0, 1.0, 0.0));
    assert!((pose.min_scale - 0.5).abs() < 1e-5);
}

#[test]
fn test_component_min_scale_under_sheared_parent() {
    let rig = common::rig(1);
    let node: NodeHandle = Arc::new(MemoryNode::with_parent(
        "sheared",
        Mat4::from_scale(Vec3::new(2.0, 3.0, 4.0)),
        Quat::IDENTITY,
        Vec3::ZERO,
        Quat::from_rotation_z(FRAC_PI_2),
        Vec3::ONE,
    ));
    let index = rig.engine.add_component_node(node).unwrap();
    rig.engine
        .schedule_component_capture(&JobHandle::completed())
        .wait()
        .unwrap();
    assert!((rig.engine.component_pose(index).unwrap().min_scale - 2.0).abs() < 1e-4);
}

#[test]
fn test_component_min_scale_under_skewed_parent() {
    let rig = common::rig(1);
    let node: NodeHandle = Arc::new(MemoryNode::with_parent(
        "skewed",
        Mat4::from_scale(Vec3::new(2.0, 3.0, 4.0)),
        Quat::IDENTITY,
        Vec3::ZERO,
        Quat::from_rotation_z(FRAC_PI_6),
        Vec3::ONE,
    ));
    let index = rig.engine.add_component_node(node).unwrap();
    rig.engine
        .schedule_component_capture(&JobHandle::completed())
        .wait()
        .unwrap();
    // Lossy axes are (2.25, 2.75, 4.0).
    assert!((rig.engine.component_pose(index).unwrap().min_scale - 2.25).abs() < 1e-4);
}

#[test]
fn test_component_indices_are_reused() {
    let rig = common::rig(1);
    let a = rig.engine.add_component_node(MemoryNode::shared("a", Vec3::ZERO)).unwrap();
    let b = rig.engine.add_component_node(MemoryNode::shared("b", Vec3::ZERO)).unwrap();
    assert_eq!((a, b), (0, 1));

    rig.engine.remove_component_node(a);
    assert!(rig.engine.component_pose(a).is_none());
    rig.engine.remove_component_node(a);
    rig.engine.remove_component_node(99);

    let c = rig.engine.add_component_node(MemoryNode::shared("c", Vec3::ZERO)).unwrap();
    assert_eq!(c, a);
    assert!(rig.engine.component_pose(b).is_some());
}

#[test]
fn test_component_capture_skips_destroyed_node() {
    let rig = common::rig(1);
    let node = MemoryNode::shared("gone", Vec3::new(5.0, 0.0, 0.0));
    let index = rig.engine.add_component_node(node.clone()).unwrap();
    node.set_valid(false);

    rig.engine
        .schedule_component_capture(&JobHandle::completed())
        .wait()
        .unwrap();
    assert_eq!(rig.engine.component_pose(index).unwrap().position, Vec3::ZERO);
}

#[test]
fn test_dump_lists_slots_and_components() {
    let rig = common::rig(3);
    let nodes = common::nodes("hip", 1);
    let flags = SlotFlags::CAPTURE | SlotFlags::ENABLE | SlotFlags::WORLD_ROTATION_WRITE;
    let chunk = rig.engine.allocate_bulk(&common::source(&nodes, flags), 3);
    let _ = rig.engine.allocate_bulk(&common::source(&common::nodes("arm", 1), flags), 3);
    rig.engine.remove(chunk);
    let _ = rig
        .engine
        .add_component_node(MemoryNode::shared("body", Vec3::new(0.0, 1.0, 0.0)));
    rig.engine
        .schedule_component_capture(&JobHandle::completed())
        .wait()
        .unwrap();

    let text = rig.engine.diagnostic_dump();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "========== Transform Sync ==========");
    assert_eq!(lines[1], "Slots. Length:2");
    assert!(lines.contains(&"  [0] team:0 () (null)"));
    assert!(lines.contains(&"  [1] team:3 (ErW) arm0"));
    assert!(lines.contains(&"Component Nodes. Length:1"));
    assert!(lines.contains(&"  [0] pos:(0.000, 1.000, 0.000) min_scale:1.000 body"));
    assert!(lines.iter().any(|l| l.starts_with("  -flags:2/")));
}

#[test]
fn test_engine_from_toml_config() {
    let config = SyncConfig::from_toml_str(
        r#"
        initial_capacity = 8
        worker_threads = 1

        [parallel]
        min_batch_size = 16
        "#,
    )
    .unwrap();
    assert_eq!(config.initial_capacity, 8);
    assert_eq!(config.parallel.min_batch_size, 16);

    let teams = Arc::new(posesync_core::TeamPolicyTable::new());
    let engine = posesync_core::TransformSyncEngine::new(config, teams).unwrap();
    engine.initialize();
    let chunk = engine.allocate_bulk(&common::source(&common::nodes("n", 20), SlotFlags::CAPTURE), 0);
    assert_eq!(chunk.length, 20);
    assert!(engine.is_synchronized());
}
