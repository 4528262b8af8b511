//! Cue-to-presentation mapping.
//!
//! Every transition of the scene graph comes with [`Cue`]s. This module carries
//! them out against the audio director, the rain and the game phase.

use std::collections::VecDeque;

use bevy::prelude::*;
use rain_core::{Cue, Mixer, Soundtrack};

use crate::audio::AudioStage;
use crate::rain::RainField;
use crate::state::{AppState, GamePhase};

/// System that drains the cue queue every frame.
pub fn apply_queued_cues(
    mut app_state: ResMut<AppState>,
    mut audio: ResMut<AudioStage>,
    mut rain: ResMut<RainField>,
    mut next_phase: ResMut<NextState<GamePhase>>,
    time: Res<Time>,
) {
    let cues = app_state.take_cues();
    if cues.is_empty() {
        return;
    }
    let phase = apply_cues(
        cues,
        &mut app_state,
        &mut audio.director,
        &mut rain,
        time.elapsed_secs_f64(),
    );
    if let Some(phase) = phase {
        next_phase.set(phase);
    }
}

/// Carry out `cues` in order. Returns the phase to switch to, if any.
pub fn apply_cues<M: Mixer>(
    cues: Vec<Cue>,
    app_state: &mut AppState,
    director: &mut rain_core::AudioDirector<M>,
    rain: &mut RainField,
    time: f64,
) -> Option<GamePhase> {
    let mut queue = VecDeque::from(cues);
    let mut phase = None;

    while let Some(cue) = queue.pop_front() {
        debug!(?cue, "applying cue");
        match cue {
            Cue::InitAudio => {
                let track = Soundtrack::Mode(app_state.graph.state().music_mode);
                let ok = match director.init(track) {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("audio init failed: {e}");
                        false
                    }
                };
                queue.extend(app_state.graph.audio_initialised(ok));
            }
            Cue::FadeIn => director.fade_in(),
            Cue::FadeOut => director.fade_out(),
            Cue::Intensity(intensity) => director.set_intensity(intensity),
            Cue::SwitchTrack(track) => {
                director.switch_track(track);
            }
            Cue::Mood(mood) => rain.set_mood(mood),
            Cue::EndingUnlocked(ending) => {
                info!("ending unlocked: {ending}");
                app_state.set_status(format!("Ending unlocked: {}", ending.title()), time);
            }
            Cue::ShowEnding(ending) => {
                app_state.shown_ending = Some(ending);
                phase = Some(GamePhase::Ending);
            }
        }
    }

    phase
}
