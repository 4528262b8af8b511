//! QA tests for save slots and the ending ledger on disk.
//!
//! These tests verify that stories and unlocked endings survive a restart
//! of the process, and that a hard reset really wipes everything.
//! Run with: `cargo test -p rain-core --test qa_persistence`

use rain_core::persist::SAVE_VERSION;
use rain_core::testing::{ending, scene, ScriptedOracle};
use rain_core::{Cue, EndingType, FileStore, KvStore, NarrativeConfig, Scene, SlotId, StorySession};
use std::fs;
use tempfile::TempDir;

fn session(dir: &TempDir, scenes: Vec<Scene>) -> StorySession<ScriptedOracle, FileStore> {
    let store = FileStore::open(dir.path()).unwrap();
    StorySession::new(NarrativeConfig::new(), store, ScriptedOracle::new(scenes))
}

// =============================================================================
// TEST 1: Basic save and load across processes
// =============================================================================

#[tokio::test]
async fn test_save_and_load_basic() {
    let dir = TempDir::new().unwrap();

    {
        let mut first = session(
            &dir,
            vec![
                scene("Neon bleeds into the puddles outside the station.", &["Walk"]),
                scene("The crossing is empty.", &["Wait"]),
            ],
        );
        first.start().await.unwrap();
        first.choose("Walk").await.unwrap();
        let saved = first.save(SlotId::One).unwrap();
        assert_eq!(saved.version, SAVE_VERSION);
        assert_eq!(saved.excerpt, "The crossing is empty....");
    }

    assert!(dir.path().join("andromeda_save_slot_1.json").exists());

    let mut second = session(&dir, vec![]);
    let slots = second.slots();
    let summary = slots[0].summary.as_ref().unwrap();
    assert_eq!(summary.id, SlotId::One);
    assert_eq!(summary.excerpt, "The crossing is empty....");

    let cues = second.load(SlotId::One).unwrap();
    assert!(cues.contains(&Cue::FadeOut));
    assert_eq!(second.state().scene_count, 2);
    assert_eq!(second.state().history.len(), 2);
    assert!(!second.state().is_loading);
}

// =============================================================================
// TEST 2: Overwriting a slot
// =============================================================================

#[tokio::test]
async fn test_overwrite_slot() {
    let dir = TempDir::new().unwrap();
    let mut s = session(
        &dir,
        vec![scene("First.", &["Go"]), scene("Second.", &["Go"])],
    );
    s.start().await.unwrap();
    s.save(SlotId::Three).unwrap();
    s.choose("Go").await.unwrap();
    s.save(SlotId::Three).unwrap();

    s.restart();
    s.load(SlotId::Three).unwrap();
    assert_eq!(s.current_scene().unwrap().narrative, "Second.");
}

// =============================================================================
// TEST 3: Damaged and outdated files read as empty
// =============================================================================

#[tokio::test]
async fn test_damaged_slots_are_empty() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("andromeda_save_slot_1.json"), "{ not json").unwrap();
    fs::write(
        dir.path().join("andromeda_save_slot_2.json"),
        r#"{"version": 99, "id": "slot_2", "timestamp": 1, "excerpt": "old", "game_state": {}}"#,
    )
    .unwrap();
    fs::write(dir.path().join("andromeda_endings.json"), "garbage").unwrap();

    let mut s = session(&dir, vec![]);
    assert!(s.slots().iter().all(|slot| slot.summary.is_none()));
    assert!(s.load(SlotId::One).is_none());
    assert!(s.load(SlotId::Two).is_none());
    assert_eq!(s.progress().normal_unlocked, 0);
}

// =============================================================================
// TEST 4: Ledger persistence and hard reset
// =============================================================================

#[tokio::test]
async fn test_ledger_survives_and_hard_reset_wipes() {
    let dir = TempDir::new().unwrap();

    {
        let mut s = session(
            &dir,
            vec![scene("Rain.", &["Call home"]), ending(EndingType::Connection)],
        );
        s.start().await.unwrap();
        s.choose("Call home").await.unwrap();
        s.save(SlotId::Two).unwrap();
    }

    let store = FileStore::open(dir.path()).unwrap();
    let raw = store.get("andromeda_endings").unwrap().unwrap();
    assert_eq!(raw, r#"["connection"]"#);

    let mut s = session(&dir, vec![]);
    assert_eq!(s.progress().normal_unlocked, 1);
    fs::write(dir.path().join("notes.txt"), "keep me").unwrap();

    s.hard_reset().unwrap();
    assert_eq!(s.progress().normal_unlocked, 0);
    assert!(s.load(SlotId::Two).is_none());
    assert!(store.get("andromeda_endings").unwrap().is_none());

    // Only store records are removed.
    assert!(dir.path().join("notes.txt").exists());
}
