//! Narrative tuning: context window, pacing thresholds and oracle settings.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Where the story stands relative to its expected length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacingPhase {
    Introduction,
    Development,
    Climax,
    Imminent,
}

/// Scene-count thresholds that steer the story toward an ending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingPolicy {
    /// Scenes below this count are introduction.
    pub introduction_below: u32,
    /// First scene count of the climax.
    pub climax_from: u32,
    /// From here on the oracle must offer ending-bound choices.
    pub imminent_from: u32,
    /// Past this count an ending is forced outright.
    pub force_after: u32,
    /// History turns required before steering toward the truth ending.
    pub truth_steer_after: usize,
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self {
            introduction_below: 5,
            climax_from: 8,
            imminent_from: 12,
            force_after: 15,
            truth_steer_after: 3,
        }
    }
}

impl PacingPolicy {
    pub fn phase(&self, scene_count: u32) -> PacingPhase {
        if scene_count < self.introduction_below {
            PacingPhase::Introduction
        } else if scene_count >= self.imminent_from {
            PacingPhase::Imminent
        } else if scene_count >= self.climax_from {
            PacingPhase::Climax
        } else {
            PacingPhase::Development
        }
    }

    /// Forcing stops once the truth path is open.
    pub fn force_ending(&self, scene_count: u32, normal_complete: bool) -> bool {
        scene_count > self.force_after && !normal_complete
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.introduction_below > self.climax_from
            || self.climax_from > self.imminent_from
            || self.imminent_from > self.force_after
        {
            return Err(ConfigError::Invalid(format!(
                "pacing thresholds out of order: {} <= {} <= {} <= {}",
                self.introduction_below, self.climax_from, self.imminent_from, self.force_after
            )));
        }
        Ok(())
    }
}

/// Configuration for the narrative layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrativeConfig {
    /// Turns of history sent with each oracle call.
    pub history_window: usize,
    pub pacing: PacingPolicy,
    /// Scene counter value installed by the debug unlock.
    pub debug_scene_count: u32,
    /// Delay before the breach scene replaces the current one.
    pub breach_delay_ms: u64,
    /// Model override for the oracle.
    pub model: Option<String>,
    pub max_tokens: usize,
    pub temperature: Option<f32>,
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            history_window: 8,
            pacing: PacingPolicy::default(),
            debug_scene_count: 999,
            breach_delay_ms: 100,
            model: None,
            max_tokens: 4096,
            temperature: Some(0.9),
        }
    }
}

impl NarrativeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and validate a JSON configuration file. Missing fields keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_window == 0 {
            return Err(ConfigError::Invalid("history_window must be at least 1".into()));
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::Invalid("max_tokens must be at least 1".into()));
        }
        self.pacing.validate()
    }

    pub fn with_history_window(mut self, turns: usize) -> Self {
        self.history_window = turns;
        self
    }

    pub fn with_pacing(mut self, pacing: PacingPolicy) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_breach_delay(mut self, delay: Duration) -> Self {
        self.breach_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, tokens: usize) -> Self {
        self.max_tokens = tokens;
        self
    }

    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn breach_delay(&self) -> Duration {
        Duration::from_millis(self.breach_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phases() {
        let pacing = PacingPolicy::default();
        assert_eq!(pacing.phase(0), PacingPhase::Introduction);
        assert_eq!(pacing.phase(4), PacingPhase::Introduction);
        assert_eq!(pacing.phase(5), PacingPhase::Development);
        assert_eq!(pacing.phase(8), PacingPhase::Climax);
        assert_eq!(pacing.phase(11), PacingPhase::Climax);
        assert_eq!(pacing.phase(12), PacingPhase::Imminent);
        assert_eq!(pacing.phase(999), PacingPhase::Imminent);
    }

    #[test]
    fn test_truth_steering_threshold() {
        assert_eq!(PacingPolicy::default().truth_steer_after, 3);
    }

    #[test]
    fn test_force_ending() {
        let pacing = PacingPolicy::default();
        assert!(!pacing.force_ending(15, false));
        assert!(pacing.force_ending(16, false));
        assert!(!pacing.force_ending(16, true));
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rain.json");
        std::fs::write(&path, r#"{"history_window": 4, "pacing": {"force_after": 20}}"#).unwrap();

        let config = NarrativeConfig::load(&path).unwrap();
        assert_eq!(config.history_window, 4);
        assert_eq!(config.pacing.force_after, 20);
        assert_eq!(config.pacing.climax_from, 8);
        assert_eq!(config.debug_scene_count, 999);
    }

    #[test]
    fn test_load_rejects_unordered_pacing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rain.json");
        std::fs::write(&path, r#"{"pacing": {"climax_from": 14}}"#).unwrap();

        assert!(matches!(
            NarrativeConfig::load(&path),
            Err(ConfigError::Invalid(_))
        ));
    }
}
