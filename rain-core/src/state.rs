//! The aggregate game state that gets saved and restored wholesale.

use crate::meta::MetaPhase;
use crate::scene::Scene;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// One exchange fed back to the oracle as context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub user: String,
    pub model: String,
}

/// Who produced a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// An entry in the reader-facing log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub role: Role,
    pub text: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

/// Background music selection, cycled by the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MusicMode {
    #[default]
    Piano,
    Lofi,
    Machinery,
    Drone,
    Silence,
}

impl MusicMode {
    /// Cycling order.
    pub const ALL: [MusicMode; 5] = [
        MusicMode::Piano,
        MusicMode::Lofi,
        MusicMode::Machinery,
        MusicMode::Drone,
        MusicMode::Silence,
    ];

    pub fn next(self) -> Self {
        let index = Self::ALL.iter().position(|m| *m == self).unwrap_or(0);
        Self::ALL[(index + 1) % Self::ALL.len()]
    }

    pub fn label(self) -> &'static str {
        match self {
            MusicMode::Piano => "Night",
            MusicMode::Lofi => "Cafe",
            MusicMode::Machinery => "Subway",
            MusicMode::Drone => "Error",
            MusicMode::Silence => "Pure Rain",
        }
    }
}

/// Everything needed to resume a story.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    /// Context window source for the oracle.
    pub history: Vec<Turn>,
    /// Full display log, never truncated.
    pub full_log: Vec<LogEntry>,
    pub current_scene: Option<Scene>,
    pub is_loading: bool,
    pub is_audio_playing: bool,
    pub music_mode: MusicMode,
    pub scene_count: u32,
    /// Set while the scripted meta sequence is running.
    #[serde(default)]
    pub meta: Option<MetaPhase>,
}

impl GameState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recent `window` turns of history.
    pub fn recent_history(&self, window: usize) -> &[Turn] {
        let start = self.history.len().saturating_sub(window);
        &self.history[start..]
    }

    /// Append an entry to the display log.
    pub fn log(&mut self, role: Role, text: impl Into<String>) {
        self.full_log.push(LogEntry {
            role,
            text: text.into(),
            timestamp: now_millis(),
        });
    }
}

/// Current time in milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_music_cycle() {
        let mut mode = MusicMode::Piano;
        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(mode);
            mode = mode.next();
        }
        assert_eq!(seen, MusicMode::ALL);
        assert_eq!(mode, MusicMode::Piano);
    }

    #[test]
    fn test_recent_history_window() {
        let mut state = GameState::new();
        for i in 0..10 {
            state.history.push(Turn {
                user: format!("u{i}"),
                model: format!("m{i}"),
            });
        }
        let recent = state.recent_history(8);
        assert_eq!(recent.len(), 8);
        assert_eq!(recent[0].user, "u2");
        assert_eq!(state.recent_history(20).len(), 10);
    }

    #[test]
    fn test_old_saves_without_meta_field() {
        let json = serde_json::json!({
            "history": [],
            "full_log": [],
            "current_scene": null,
            "is_loading": false,
            "is_audio_playing": true,
            "music_mode": "lofi",
            "scene_count": 3
        });
        let state: GameState = serde_json::from_value(json).unwrap();
        assert!(state.meta.is_none());
        assert_eq!(state.music_mode, MusicMode::Lofi);
    }
}
