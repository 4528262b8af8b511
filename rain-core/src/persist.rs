//! Save slots.
//!
//! Three fixed slots hold a full [`GameState`] each, next to a timestamp and
//! a short excerpt for the slot picker. Records carry a format version; a
//! record that fails to parse or has the wrong version reads as an empty slot.

use crate::state::{now_millis, GameState};
use crate::store::{KvStore, StoreError};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::warn;

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Current save format version.
pub const SAVE_VERSION: u32 = 1;

const SLOT_KEY_PREFIX: &str = "andromeda_save_";
const EXCERPT_CHARS: usize = 30;

/// One of the three fixed save slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotId {
    #[serde(rename = "slot_1")]
    One,
    #[serde(rename = "slot_2")]
    Two,
    #[serde(rename = "slot_3")]
    Three,
}

impl SlotId {
    pub const ALL: [SlotId; 3] = [SlotId::One, SlotId::Two, SlotId::Three];

    pub fn as_str(self) -> &'static str {
        match self {
            SlotId::One => "slot_1",
            SlotId::Two => "slot_2",
            SlotId::Three => "slot_3",
        }
    }

    pub fn number(self) -> u8 {
        match self {
            SlotId::One => 1,
            SlotId::Two => 2,
            SlotId::Three => 3,
        }
    }

    fn key(self) -> String {
        format!("{SLOT_KEY_PREFIX}{}", self.as_str())
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A populated save slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveSlot {
    pub version: u32,
    pub id: SlotId,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub excerpt: String,
    pub game_state: GameState,
}

/// What the slot picker shows for a populated slot.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SlotSummary {
    pub id: SlotId,
    pub timestamp: u64,
    pub excerpt: String,
}

/// A slot as listed by [`PersistenceGateway::list_slots`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotListing {
    pub id: SlotId,
    pub summary: Option<SlotSummary>,
}

/// Saves and restores game state through a key-value store.
#[derive(Debug, Clone)]
pub struct PersistenceGateway<S> {
    store: S,
}

impl<S: KvStore> PersistenceGateway<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Write `state` into `slot`, replacing whatever was there.
    pub fn save(&self, slot: SlotId, state: &GameState) -> Result<SaveSlot, PersistError> {
        let record = SaveSlot {
            version: SAVE_VERSION,
            id: slot,
            timestamp: now_millis(),
            excerpt: excerpt(state),
            game_state: state.clone(),
        };
        let json = serde_json::to_string(&record)?;
        self.store.put(&slot.key(), &json)?;
        Ok(record)
    }

    /// Read the state in `slot`.
    ///
    /// Absent, unreadable and outdated slots all yield `None`. The loading flag
    /// is always cleared on the way out.
    pub fn load(&self, slot: SlotId) -> Option<GameState> {
        match self.read(slot) {
            Ok(Some(record)) => {
                let mut state = record.game_state;
                state.is_loading = false;
                Some(state)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(slot = %slot, error = %e, "discarding unreadable save slot");
                None
            }
        }
    }

    /// All three slots in order, each populated or empty.
    pub fn list_slots(&self) -> Vec<SlotListing> {
        SlotId::ALL
            .iter()
            .map(|&id| SlotListing {
                id,
                summary: self.peek(id).unwrap_or_else(|e| {
                    warn!(slot = %id, error = %e, "save slot unreadable");
                    None
                }),
            })
            .collect()
    }

    /// Remove every slot and every other persisted record.
    pub fn wipe_all(&self) -> Result<(), PersistError> {
        self.store.clear()?;
        Ok(())
    }

    fn read(&self, slot: SlotId) -> Result<Option<SaveSlot>, PersistError> {
        let Some(json) = self.store.get(&slot.key())? else {
            return Ok(None);
        };
        let record: SaveSlot = serde_json::from_str(&json)?;
        check_version(record.version)?;
        Ok(Some(record))
    }

    /// Parse just the slot header, skipping the embedded state.
    fn peek(&self, slot: SlotId) -> Result<Option<SlotSummary>, PersistError> {
        #[derive(Deserialize)]
        struct Partial {
            version: u32,
            #[serde(flatten)]
            summary: SlotSummary,
        }

        let Some(json) = self.store.get(&slot.key())? else {
            return Ok(None);
        };
        let partial: Partial = serde_json::from_str(&json)?;
        check_version(partial.version)?;
        Ok(Some(partial.summary))
    }
}

fn check_version(found: u32) -> Result<(), PersistError> {
    if found != SAVE_VERSION {
        return Err(PersistError::VersionMismatch {
            expected: SAVE_VERSION,
            found,
        });
    }
    Ok(())
}

/// First characters of the current narrative, for the slot picker.
pub fn excerpt(state: &GameState) -> String {
    match &state.current_scene {
        Some(scene) => {
            let head: String = scene.narrative.chars().take(EXCERPT_CHARS).collect();
            format!("{head}...")
        }
        None => "Unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Choice, Scene};
    use crate::store::MemoryStore;

    fn state_with(narrative: &str) -> GameState {
        GameState {
            current_scene: Some(Scene::new(narrative, vec![Choice::new("Walk")])),
            scene_count: 4,
            ..GameState::default()
        }
    }

    #[test]
    fn test_excerpt() {
        assert_eq!(excerpt(&GameState::default()), "Unknown");
        assert_eq!(excerpt(&state_with("Short.")), "Short....");

        let long = "a".repeat(31) + "é";
        assert_eq!(excerpt(&state_with(&long)), format!("{}...", "a".repeat(30)));
    }

    #[test]
    fn test_load_clears_loading_flag() {
        let gateway = PersistenceGateway::new(MemoryStore::new());
        let mut state = state_with("Neon on wet asphalt.");
        state.is_loading = true;

        gateway.save(SlotId::Two, &state).unwrap();
        let loaded = gateway.load(SlotId::Two).unwrap();

        assert!(!loaded.is_loading);
        state.is_loading = false;
        assert_eq!(loaded, state);
    }

    #[test]
    fn test_absent_and_corrupt_slots() {
        let store = MemoryStore::new();
        let gateway = PersistenceGateway::new(store.clone());
        assert!(gateway.load(SlotId::One).is_none());

        store.put("andromeda_save_slot_1", "{\"version\":").unwrap();
        assert!(gateway.load(SlotId::One).is_none());
        assert!(gateway.list_slots()[0].summary.is_none());
    }

    #[test]
    fn test_version_mismatch_reads_empty() {
        let store = MemoryStore::new();
        let gateway = PersistenceGateway::new(store.clone());
        gateway.save(SlotId::Three, &state_with("Rain.")).unwrap();

        let json = store.get("andromeda_save_slot_3").unwrap().unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
        value["version"] = serde_json::json!(SAVE_VERSION + 1);
        store
            .put("andromeda_save_slot_3", &value.to_string())
            .unwrap();

        assert!(gateway.load(SlotId::Three).is_none());
        assert!(matches!(
            gateway.read(SlotId::Three),
            Err(PersistError::VersionMismatch { .. })
        ));
    }

    #[test]
    fn test_list_slots() {
        let gateway = PersistenceGateway::new(MemoryStore::new());
        gateway.save(SlotId::Two, &state_with("The last train.")).unwrap();

        let slots = gateway.list_slots();
        assert_eq!(slots.len(), 3);
        assert_eq!(
            slots.iter().map(|s| s.id).collect::<Vec<_>>(),
            SlotId::ALL.to_vec()
        );
        assert!(slots[0].summary.is_none());
        assert_eq!(
            slots[1].summary.as_ref().map(|s| s.excerpt.as_str()),
            Some("The last train....")
        );
        assert!(slots[2].summary.is_none());
    }

    #[test]
    fn test_wipe_all() {
        let store = MemoryStore::new();
        let gateway = PersistenceGateway::new(store.clone());
        gateway.save(SlotId::One, &state_with("Rain.")).unwrap();
        store.put("andromeda_endings", "[]").unwrap();

        gateway.wipe_all().unwrap();
        assert!(gateway.load(SlotId::One).is_none());
        assert!(store.is_empty());
    }
}
