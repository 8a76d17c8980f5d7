// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn save_then_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.json");
    let mut state = MaterializedState::default();
    state.next_build_number("proj");

    Snapshot::new(state).save(&path).unwrap();
    assert!(!path.with_extension("tmp").exists());

    let loaded = Snapshot::load(&path).unwrap().unwrap();
    assert_eq!(loaded.version, CURRENT_SNAPSHOT_VERSION);
    assert_eq!(loaded.state.build_counters["proj"], 1);
}

#[test]
fn missing_file_loads_as_none() {
    let dir = tempfile::tempdir().unwrap();
    assert!(Snapshot::load(&dir.path().join("nope.json")).unwrap().is_none());
}

#[test]
fn bak_rotation_keeps_three() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.json");
    for i in 0..5 {
        let bak = rotate_bak_path(&path);
        std::fs::write(&bak, format!("{i}")).unwrap();
    }
    assert_eq!(std::fs::read_to_string(path.with_extension("bak")).unwrap(), "4");
    assert_eq!(std::fs::read_to_string(path.with_extension("bak.2")).unwrap(), "3");
    assert_eq!(std::fs::read_to_string(path.with_extension("bak.3")).unwrap(), "2");
    assert!(!path.with_extension("bak.4").exists());
}
