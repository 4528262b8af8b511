//! Testing utilities for the story layer.
//!
//! This module provides doubles for the two outside collaborators:
//! - `ScriptedOracle` and `FailingOracle` stand in for Claude
//! - `RecordingMixer` stands in for the audio backend
//!
//! plus small scene builders and `harness` for scripted sessions.

use crate::audio::{AudioError, Mixer, NoiseLayer, Soundtrack, VoiceId};
use crate::config::NarrativeConfig;
use crate::controller::OracleRequest;
use crate::oracle::{NarrativeOracle, OracleError};
use crate::scene::{Choice, EndingType, Mood, Scene};
use crate::session::StorySession;
use crate::store::MemoryStore;
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One scripted oracle answer.
#[derive(Debug, Clone)]
pub enum Scripted {
    Scene(Scene),
    Fail(String),
}

/// An oracle that returns scripted answers in order.
///
/// Every request is recorded so tests can check what the controller asked
/// for. Once the script runs out, requests fail.
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<OracleRequest>>,
}

impl ScriptedOracle {
    pub fn new(scenes: Vec<Scene>) -> Self {
        Self {
            script: Mutex::new(scenes.into_iter().map(Scripted::Scene).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue another scene.
    pub fn push(&self, scene: Scene) {
        lock(&self.script).push_back(Scripted::Scene(scene));
    }

    /// Queue a failure.
    pub fn push_failure(&self, message: impl Into<String>) {
        lock(&self.script).push_back(Scripted::Fail(message.into()));
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<OracleRequest> {
        lock(&self.requests).clone()
    }

    pub fn remaining(&self) -> usize {
        lock(&self.script).len()
    }
}

#[async_trait]
impl NarrativeOracle for ScriptedOracle {
    async fn generate(&self, request: &OracleRequest) -> Result<Scene, OracleError> {
        lock(&self.requests).push(request.clone());
        match lock(&self.script).pop_front() {
            Some(Scripted::Scene(scene)) => Ok(scene),
            Some(Scripted::Fail(message)) => Err(OracleError::Rejected(message)),
            None => Err(OracleError::Rejected("script exhausted".into())),
        }
    }
}

/// An oracle whose every call fails like a network outage.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingOracle;

#[async_trait]
impl NarrativeOracle for FailingOracle {
    async fn generate(&self, _request: &OracleRequest) -> Result<Scene, OracleError> {
        Err(OracleError::Claude(claude::Error::Network(
            "connection refused".into(),
        )))
    }
}

/// Calls made on a [`RecordingMixer`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MixerEvent {
    Open,
    LayerGain(NoiseLayer, f32),
    Start(VoiceId, Soundtrack),
    Volume(VoiceId, f32),
    Pause(VoiceId),
    Resume(VoiceId),
    Stop(VoiceId),
}

/// A mixer that records every call instead of making sound.
#[derive(Debug, Default)]
pub struct RecordingMixer {
    pub events: Vec<MixerEvent>,
    fail_open: bool,
}

impl RecordingMixer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mixer whose output device never opens.
    pub fn failing() -> Self {
        Self {
            events: Vec::new(),
            fail_open: true,
        }
    }

    pub fn starts(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, MixerEvent::Start(..)))
            .count()
    }

    pub fn stops(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, MixerEvent::Stop(_)))
            .count()
    }

    /// Voices started and not yet stopped.
    pub fn live_voices(&self) -> Vec<VoiceId> {
        let stopped: HashSet<VoiceId> = self
            .events
            .iter()
            .filter_map(|e| match e {
                MixerEvent::Stop(id) => Some(*id),
                _ => None,
            })
            .collect();
        self.events
            .iter()
            .filter_map(|e| match e {
                MixerEvent::Start(id, _) if !stopped.contains(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    /// Last gain set on `layer`.
    pub fn last_gain(&self, layer: NoiseLayer) -> Option<f32> {
        self.events.iter().rev().find_map(|e| match e {
            MixerEvent::LayerGain(l, g) if *l == layer => Some(*g),
            _ => None,
        })
    }
}

impl Mixer for RecordingMixer {
    fn open(&mut self) -> Result<(), AudioError> {
        if self.fail_open {
            return Err(AudioError::Unavailable("no output device".into()));
        }
        self.events.push(MixerEvent::Open);
        Ok(())
    }

    fn set_layer_gain(&mut self, layer: NoiseLayer, gain: f32) {
        self.events.push(MixerEvent::LayerGain(layer, gain));
    }

    fn start_voice(&mut self, id: VoiceId, track: Soundtrack) -> Result<(), AudioError> {
        self.events.push(MixerEvent::Start(id, track));
        Ok(())
    }

    fn set_voice_volume(&mut self, id: VoiceId, volume: f32) {
        self.events.push(MixerEvent::Volume(id, volume));
    }

    fn pause_voice(&mut self, id: VoiceId) {
        self.events.push(MixerEvent::Pause(id));
    }

    fn resume_voice(&mut self, id: VoiceId) {
        self.events.push(MixerEvent::Resume(id));
    }

    fn stop_voice(&mut self, id: VoiceId) {
        self.events.push(MixerEvent::Stop(id));
    }
}

/// A mid-story scene offering `choices`.
pub fn scene(narrative: &str, choices: &[&str]) -> Scene {
    Scene::new(narrative, choices.iter().map(|c| Choice::new(*c)).collect())
        .with_thoughts(["the rain", "cold hands"])
}

/// A scene with a mood.
pub fn scene_in(mood: Mood, narrative: &str, choices: &[&str]) -> Scene {
    scene(narrative, choices).with_mood(mood)
}

/// An ending scene.
pub fn ending(ending: EndingType) -> Scene {
    let mood = if ending == EndingType::Truth {
        Mood::Glitch
    } else {
        Mood::Calm
    };
    Scene::ending(format!("It ends in {ending}."), ending).with_mood(mood)
}

/// A session over an in-memory store, answering from `scenes`.
pub fn harness(scenes: Vec<Scene>) -> StorySession<ScriptedOracle, MemoryStore> {
    harness_with_store(MemoryStore::new(), scenes)
}

/// A session over `store`, answering from `scenes`.
pub fn harness_with_store(
    store: MemoryStore,
    scenes: Vec<Scene>,
) -> StorySession<ScriptedOracle, MemoryStore> {
    let config = NarrativeConfig::new().with_breach_delay(Duration::from_millis(1));
    StorySession::new(config, store, ScriptedOracle::new(scenes))
}
