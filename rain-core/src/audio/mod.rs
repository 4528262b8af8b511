//! Audio direction: two procedural noise layers plus one music track.
//!
//! [`AudioDirector`] owns all gain and volume scheduling and talks to the
//! actual output through the [`Mixer`] trait. It never sleeps; the host calls
//! [`AudioDirector::advance`] with elapsed time and the director issues
//! whatever gain changes are due. Layer gains follow linear ramps, track
//! volumes follow fixed-size steps at fixed intervals.

pub mod noise;

use crate::scene::Mood;
use crate::state::MusicMode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors reported by a mixer.
#[derive(Debug, Clone, Error)]
pub enum AudioError {
    #[error("audio output unavailable: {0}")]
    Unavailable(String),

    #[error("track {0:?} has no source")]
    MissingTrack(Soundtrack),
}

/// Rain/city intensity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intensity {
    High,
    Low,
}

impl Intensity {
    pub fn for_mood(mood: Mood) -> Self {
        if mood == Mood::Stormy {
            Intensity::High
        } else {
            Intensity::Low
        }
    }
}

/// A music selection the director can play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Soundtrack {
    Mode(MusicMode),
    /// Closing track of the meta sequence.
    Reconciliation,
}

impl Soundtrack {
    /// Asset path of the track, `None` for silence.
    pub fn asset_path(self) -> Option<&'static str> {
        match self {
            Soundtrack::Mode(MusicMode::Piano) => Some("music/night.ogg"),
            Soundtrack::Mode(MusicMode::Lofi) => Some("music/cafe.ogg"),
            Soundtrack::Mode(MusicMode::Machinery) => Some("music/subway.ogg"),
            Soundtrack::Mode(MusicMode::Drone) => Some("music/error.ogg"),
            Soundtrack::Mode(MusicMode::Silence) => None,
            Soundtrack::Reconciliation => Some("music/words.ogg"),
        }
    }

    pub fn is_silence(self) -> bool {
        self.asset_path().is_none()
    }
}

/// One of the two continuous noise beds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoiseLayer {
    /// Pink noise, low-passed.
    Rain,
    /// Brown noise, low-passed harder.
    City,
}

/// Handle for a started track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceId(pub u64);

/// The output device the director drives.
pub trait Mixer {
    /// Bring up the output and start both noise layers at zero gain.
    fn open(&mut self) -> Result<(), AudioError>;
    fn set_layer_gain(&mut self, layer: NoiseLayer, gain: f32);
    /// Start looping `track` at zero volume.
    fn start_voice(&mut self, id: VoiceId, track: Soundtrack) -> Result<(), AudioError>;
    fn set_voice_volume(&mut self, id: VoiceId, volume: f32);
    fn pause_voice(&mut self, id: VoiceId);
    fn resume_voice(&mut self, id: VoiceId);
    fn stop_voice(&mut self, id: VoiceId);
}

/// Maximum track volume, kept below full scale so text stays readable.
pub const TRACK_CAP: f32 = 0.5;

const RISE_STEP: f32 = 0.02;
const RISE_EVERY: Duration = Duration::from_millis(80);
const SWAP_STEP: f32 = 0.05;
const SWAP_EVERY: Duration = Duration::from_millis(100);
const MUTE_STEP: f32 = 0.1;
const MUTE_EVERY: Duration = Duration::from_millis(100);

struct LayerTarget {
    rain: f32,
    city: f32,
    rain_over: Duration,
    city_over: Duration,
}

const HIGH: LayerTarget = LayerTarget {
    rain: 0.6,
    city: 0.15,
    rain_over: Duration::from_secs(2),
    city_over: Duration::from_secs(2),
};
const LOW: LayerTarget = LayerTarget {
    rain: 0.25,
    city: 0.08,
    rain_over: Duration::from_secs(2),
    city_over: Duration::from_secs(2),
};
const FADE_IN: LayerTarget = LayerTarget {
    rain: 0.25,
    city: 0.08,
    rain_over: Duration::from_secs(3),
    city_over: Duration::from_secs(4),
};
const FADE_OUT: LayerTarget = LayerTarget {
    rain: 0.0,
    city: 0.0,
    rain_over: Duration::from_secs(1),
    city_over: Duration::from_secs(1),
};

/// A linear ramp toward a target value.
#[derive(Debug, Clone, Copy)]
struct Ramp {
    value: f32,
    from: f32,
    target: f32,
    elapsed: Duration,
    duration: Duration,
}

impl Ramp {
    fn at(value: f32) -> Self {
        Self {
            value,
            from: value,
            target: value,
            elapsed: Duration::ZERO,
            duration: Duration::ZERO,
        }
    }

    fn toward(&mut self, target: f32, over: Duration) {
        self.from = self.value;
        self.target = target;
        self.elapsed = Duration::ZERO;
        self.duration = over;
    }

    fn settled(&self) -> bool {
        self.value == self.target
    }

    fn advance(&mut self, dt: Duration) -> f32 {
        if self.settled() {
            return self.value;
        }
        self.elapsed += dt;
        if self.duration.is_zero() || self.elapsed >= self.duration {
            self.value = self.target;
        } else {
            let t = self.elapsed.as_secs_f32() / self.duration.as_secs_f32();
            self.value = self.from + (self.target - self.from) * t;
        }
        self.value
    }
}

/// Counts whole intervals out of accumulated time.
#[derive(Debug, Clone, Copy, Default)]
struct Stepper {
    carry: Duration,
}

impl Stepper {
    fn steps(&mut self, dt: Duration, every: Duration) -> u32 {
        self.carry += dt;
        let mut n = 0;
        while self.carry >= every {
            self.carry -= every;
            n += 1;
        }
        n
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VoicePhase {
    Rising,
    Holding,
    /// Global fade-out; pauses at zero.
    Muting,
    Paused,
}

#[derive(Debug, Clone, Copy)]
struct Voice {
    id: VoiceId,
    track: Soundtrack,
    volume: f32,
    phase: VoicePhase,
    stepper: Stepper,
}

#[derive(Debug, Clone, Copy)]
struct Outgoing {
    id: VoiceId,
    volume: f32,
    stepper: Stepper,
}

/// Schedules noise-layer ramps and track crossfades on a [`Mixer`].
pub struct AudioDirector<M> {
    mixer: M,
    ready: bool,
    enabled: bool,
    rain: Ramp,
    city: Ramp,
    /// Selected soundtrack, silence included.
    selected: Option<Soundtrack>,
    current: Option<Voice>,
    outgoing: Option<Outgoing>,
    next_voice: u64,
}

impl<M: Mixer> AudioDirector<M> {
    pub fn new(mixer: M) -> Self {
        Self {
            mixer,
            ready: false,
            enabled: false,
            rain: Ramp::at(0.0),
            city: Ramp::at(0.0),
            selected: None,
            current: None,
            outgoing: None,
            next_voice: 0,
        }
    }

    /// Open the output and start `track`. Calling again once ready does nothing.
    pub fn init(&mut self, track: Soundtrack) -> Result<(), AudioError> {
        if self.ready {
            return Ok(());
        }
        self.mixer.open()?;
        self.ready = true;
        self.selected = None;
        self.switch_track(track);
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Ramp both noise layers toward the level for `intensity`.
    ///
    /// Ignored until the output is open and while audio is faded out.
    pub fn set_intensity(&mut self, intensity: Intensity) {
        if !self.ready || !self.enabled {
            return;
        }
        let target = match intensity {
            Intensity::High => &HIGH,
            Intensity::Low => &LOW,
        };
        self.ramp_layers(target);
    }

    /// Crossfade to `track`. Returns `false` when it is already selected.
    ///
    /// The previous track steps down and stops while the new one steps up from
    /// zero. A track still fading out from an earlier switch is cut at once so
    /// that at most two voices ever sound. Before [`init`](Self::init) only the
    /// selection is recorded.
    pub fn switch_track(&mut self, track: Soundtrack) -> bool {
        if self.selected == Some(track) {
            return false;
        }
        self.selected = Some(track);
        if !self.ready {
            return true;
        }

        if let Some(old) = self.outgoing.take() {
            self.mixer.stop_voice(old.id);
        }
        if let Some(voice) = self.current.take() {
            if voice.phase == VoicePhase::Paused || voice.volume <= 0.0 {
                self.mixer.stop_voice(voice.id);
            } else {
                self.outgoing = Some(Outgoing {
                    id: voice.id,
                    volume: voice.volume,
                    stepper: Stepper::default(),
                });
            }
        }

        if track.is_silence() {
            debug!("music silenced");
            return true;
        }

        let id = VoiceId(self.next_voice);
        self.next_voice += 1;
        if let Err(e) = self.mixer.start_voice(id, track) {
            warn!(error = %e, ?track, "could not start track");
            return true;
        }

        let phase = if self.enabled {
            VoicePhase::Rising
        } else {
            self.mixer.pause_voice(id);
            VoicePhase::Paused
        };
        self.current = Some(Voice {
            id,
            track,
            volume: 0.0,
            phase,
            stepper: Stepper::default(),
        });
        true
    }

    /// Bring the noise layers and the current track back up.
    pub fn fade_in(&mut self) {
        if !self.ready {
            return;
        }
        self.enabled = true;
        self.ramp_layers(&FADE_IN);
        if let Some(voice) = &mut self.current {
            if voice.phase == VoicePhase::Paused {
                self.mixer.resume_voice(voice.id);
            }
            voice.phase = VoicePhase::Rising;
        }
    }

    /// Take everything down; the track pauses once silent.
    pub fn fade_out(&mut self) {
        self.enabled = false;
        if !self.ready {
            return;
        }
        self.ramp_layers(&FADE_OUT);
        if let Some(voice) = &mut self.current {
            if voice.phase != VoicePhase::Paused {
                voice.phase = VoicePhase::Muting;
            }
        }
    }

    /// Apply every change due within `dt`.
    pub fn advance(&mut self, dt: Duration) {
        if !self.rain.settled() {
            let gain = self.rain.advance(dt);
            self.mixer.set_layer_gain(NoiseLayer::Rain, gain);
        }
        if !self.city.settled() {
            let gain = self.city.advance(dt);
            self.mixer.set_layer_gain(NoiseLayer::City, gain);
        }

        if let Some(voice) = &mut self.current {
            match voice.phase {
                VoicePhase::Rising => {
                    let n = voice.stepper.steps(dt, RISE_EVERY);
                    if n > 0 {
                        voice.volume = (voice.volume + RISE_STEP * n as f32).min(TRACK_CAP);
                        self.mixer.set_voice_volume(voice.id, voice.volume);
                        if voice.volume >= TRACK_CAP {
                            voice.phase = VoicePhase::Holding;
                        }
                    }
                }
                VoicePhase::Muting => {
                    let n = voice.stepper.steps(dt, MUTE_EVERY);
                    if n > 0 {
                        voice.volume = (voice.volume - MUTE_STEP * n as f32).max(0.0);
                        self.mixer.set_voice_volume(voice.id, voice.volume);
                        if voice.volume <= 0.0 {
                            self.mixer.pause_voice(voice.id);
                            voice.phase = VoicePhase::Paused;
                        }
                    }
                }
                VoicePhase::Holding | VoicePhase::Paused => {}
            }
        }

        if let Some(old) = &mut self.outgoing {
            let n = old.stepper.steps(dt, SWAP_EVERY);
            if n > 0 {
                old.volume = (old.volume - SWAP_STEP * n as f32).max(0.0);
                self.mixer.set_voice_volume(old.id, old.volume);
                if old.volume <= 0.0 {
                    self.mixer.stop_voice(old.id);
                    self.outgoing = None;
                }
            }
        }
    }

    /// Stop everything immediately.
    pub fn shutdown(&mut self) {
        if let Some(old) = self.outgoing.take() {
            self.mixer.stop_voice(old.id);
        }
        if let Some(voice) = self.current.take() {
            self.mixer.stop_voice(voice.id);
        }
        self.rain = Ramp::at(0.0);
        self.city = Ramp::at(0.0);
        if self.ready {
            self.mixer.set_layer_gain(NoiseLayer::Rain, 0.0);
            self.mixer.set_layer_gain(NoiseLayer::City, 0.0);
        }
        self.selected = None;
        self.enabled = false;
    }

    /// The selected soundtrack, silence included.
    pub fn selected_track(&self) -> Option<Soundtrack> {
        self.selected
    }

    /// Track of the voice currently playing or paused.
    pub fn current_track(&self) -> Option<Soundtrack> {
        self.current.map(|v| v.track)
    }

    pub fn track_volume(&self) -> f32 {
        self.current.map(|v| v.volume).unwrap_or(0.0)
    }

    pub fn layer_gain(&self, layer: NoiseLayer) -> f32 {
        match layer {
            NoiseLayer::Rain => self.rain.value,
            NoiseLayer::City => self.city.value,
        }
    }

    pub fn is_crossfading(&self) -> bool {
        self.outgoing.is_some()
    }

    pub fn mixer(&self) -> &M {
        &self.mixer
    }

    pub fn mixer_mut(&mut self) -> &mut M {
        &mut self.mixer
    }

    fn ramp_layers(&mut self, target: &LayerTarget) {
        self.rain.toward(target.rain, target.rain_over);
        self.city.toward(target.city, target.city_over);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MixerEvent, RecordingMixer};

    fn ready_director() -> AudioDirector<RecordingMixer> {
        let mut director = AudioDirector::new(RecordingMixer::new());
        director.init(Soundtrack::Mode(MusicMode::Piano)).unwrap();
        director.fade_in();
        director
    }

    fn run(director: &mut AudioDirector<RecordingMixer>, total: Duration) {
        let tick = Duration::from_millis(20);
        let mut elapsed = Duration::ZERO;
        while elapsed < total {
            director.advance(tick);
            elapsed += tick;
        }
    }

    #[test]
    fn test_init_starts_default_track() {
        let director = ready_director();
        assert!(director.is_ready());
        assert_eq!(
            director.current_track(),
            Some(Soundtrack::Mode(MusicMode::Piano))
        );
        assert_eq!(director.mixer().starts(), 1);
    }

    #[test]
    fn test_init_failure_leaves_director_cold() {
        let mut director = AudioDirector::new(RecordingMixer::failing());
        assert!(director.init(Soundtrack::Mode(MusicMode::Piano)).is_err());
        assert!(!director.is_ready());
        assert_eq!(director.mixer().starts(), 0);
    }

    #[test]
    fn test_track_rises_to_cap_and_holds() {
        let mut director = ready_director();
        run(&mut director, Duration::from_secs(5));
        assert!((director.track_volume() - TRACK_CAP).abs() < 1e-6);
        assert!(director
            .mixer()
            .events
            .iter()
            .all(|e| !matches!(e, MixerEvent::Volume(_, v) if *v > TRACK_CAP + 1e-6)));
    }

    #[test]
    fn test_switch_same_track_is_noop() {
        let mut director = ready_director();
        let before = director.mixer().events.len();
        assert!(!director.switch_track(Soundtrack::Mode(MusicMode::Piano)));
        assert_eq!(director.mixer().events.len(), before);
        assert!(!director.is_crossfading());
    }

    #[test]
    fn test_switch_stops_one_starts_one() {
        let mut director = ready_director();
        run(&mut director, Duration::from_secs(2));

        assert!(director.switch_track(Soundtrack::Mode(MusicMode::Lofi)));
        assert!(director.is_crossfading());
        assert_eq!(director.mixer().starts(), 2);

        run(&mut director, Duration::from_secs(3));
        assert!(!director.is_crossfading());
        assert_eq!(director.mixer().stops(), 1);
        assert_eq!(
            director.current_track(),
            Some(Soundtrack::Mode(MusicMode::Lofi))
        );
    }

    #[test]
    fn test_switch_during_crossfade_supersedes() {
        let mut director = ready_director();
        run(&mut director, Duration::from_secs(2));

        director.switch_track(Soundtrack::Mode(MusicMode::Lofi));
        run(&mut director, Duration::from_millis(300));
        director.switch_track(Soundtrack::Mode(MusicMode::Drone));

        // The piano voice is cut, the lofi voice becomes the outgoing one.
        assert_eq!(director.mixer().stops(), 1);
        assert_eq!(director.mixer().starts(), 3);
        run(&mut director, Duration::from_secs(3));
        assert_eq!(director.mixer().stops(), 2);
        assert_eq!(director.mixer().live_voices().len(), 1);
    }

    #[test]
    fn test_silence_stops_without_replacement() {
        let mut director = ready_director();
        run(&mut director, Duration::from_secs(1));
        assert!(director.switch_track(Soundtrack::Mode(MusicMode::Silence)));
        assert_eq!(director.current_track(), None);
        run(&mut director, Duration::from_secs(2));
        assert_eq!(director.mixer().starts(), 1);
        assert!(director.mixer().live_voices().is_empty());
    }

    #[test]
    fn test_intensity_ramps() {
        let mut director = ready_director();
        run(&mut director, Duration::from_secs(5));
        assert!((director.layer_gain(NoiseLayer::Rain) - 0.25).abs() < 1e-6);
        assert!((director.layer_gain(NoiseLayer::City) - 0.08).abs() < 1e-6);

        director.set_intensity(Intensity::High);
        run(&mut director, Duration::from_secs(1));
        let mid = director.layer_gain(NoiseLayer::Rain);
        assert!(mid > 0.25 && mid < 0.6);

        run(&mut director, Duration::from_secs(2));
        assert!((director.layer_gain(NoiseLayer::Rain) - 0.6).abs() < 1e-6);
        assert!((director.layer_gain(NoiseLayer::City) - 0.15).abs() < 1e-6);

        director.set_intensity(Intensity::Low);
        run(&mut director, Duration::from_secs(3));
        assert!(director.layer_gain(NoiseLayer::Rain) > 0.0);
        assert!(director.layer_gain(NoiseLayer::City) > 0.0);
    }

    #[test]
    fn test_fade_out_pauses_track() {
        let mut director = ready_director();
        run(&mut director, Duration::from_secs(3));

        director.fade_out();
        run(&mut director, Duration::from_secs(2));
        assert_eq!(director.track_volume(), 0.0);
        assert_eq!(director.layer_gain(NoiseLayer::Rain), 0.0);
        assert!(director
            .mixer()
            .events
            .iter()
            .any(|e| matches!(e, MixerEvent::Pause(_))));

        // Intensity cues while faded out do not bring the rain back.
        director.set_intensity(Intensity::High);
        run(&mut director, Duration::from_secs(3));
        assert_eq!(director.layer_gain(NoiseLayer::Rain), 0.0);

        director.fade_in();
        assert!(director
            .mixer()
            .events
            .iter()
            .any(|e| matches!(e, MixerEvent::Resume(_))));
        run(&mut director, Duration::from_secs(5));
        assert!((director.track_volume() - TRACK_CAP).abs() < 1e-6);
    }

    #[test]
    fn test_shutdown_stops_every_voice() {
        let mut director = ready_director();
        run(&mut director, Duration::from_secs(2));
        director.switch_track(Soundtrack::Mode(MusicMode::Lofi));
        run(&mut director, Duration::from_millis(200));
        assert_eq!(director.mixer().live_voices().len(), 2);

        director.shutdown();
        assert!(director.mixer().live_voices().is_empty());
        assert!(!director.is_crossfading());
        assert_eq!(director.current_track(), None);
        assert_eq!(
            director.mixer().events[director.mixer().events.len() - 2..],
            [
                MixerEvent::LayerGain(NoiseLayer::Rain, 0.0),
                MixerEvent::LayerGain(NoiseLayer::City, 0.0),
            ]
        );

        let settled = director.mixer().events.len();
        run(&mut director, Duration::from_secs(2));
        assert_eq!(director.mixer().events.len(), settled);
    }

    #[test]
    fn test_intensity_before_init_is_ignored() {
        let mut director = AudioDirector::new(RecordingMixer::new());
        director.set_intensity(Intensity::High);
        director.advance(Duration::from_secs(3));
        assert!(director.mixer().events.is_empty());
    }
}
