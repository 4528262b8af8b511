//! Bevy audio backend for the [`AudioDirector`].
//!
//! The director talks to a [`MixerDesk`], which only records what it was asked
//! to do. [`apply_desk_commands`] turns those records into entities and
//! component state, and [`sync_sinks`] pushes that state into Bevy's audio
//! sinks every frame, so changes made before a sink exists are not lost.
//!
//! A voice started within a drain has no entity yet, so the commands that
//! follow it in the same drain are folded into the spawn instead.

use std::path::{Path, PathBuf};
use std::time::Duration;

use bevy::audio::{AddAudioSource, AudioSinkPlayback, Decodable, Source, Volume};
use bevy::prelude::*;
use rain_core::audio::noise::NoiseGenerator;
use rain_core::audio::{AudioError, VoiceId};
use rain_core::{AudioDirector, Mixer, NoiseLayer, Soundtrack};

const SAMPLE_RATE: u32 = 44_100;

/// A procedural noise bed, played as an endless source.
#[derive(Asset, TypePath, Clone, Copy)]
pub struct NoiseBed {
    pub layer: NoiseLayer,
    pub seed: u64,
}

/// Sample stream for a [`NoiseBed`].
pub struct NoiseDecoder {
    generator: NoiseGenerator,
}

impl Iterator for NoiseDecoder {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        self.generator.next()
    }
}

impl Source for NoiseDecoder {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        self.generator.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

impl Decodable for NoiseBed {
    type DecoderItem = f32;
    type Decoder = NoiseDecoder;

    fn decoder(&self) -> Self::Decoder {
        NoiseDecoder {
            generator: NoiseGenerator::for_layer(self.layer, SAMPLE_RATE, self.seed),
        }
    }
}

/// Something the director asked for that still has to reach the ECS.
#[derive(Debug, Clone, PartialEq)]
enum DeskCommand {
    SpawnBeds,
    LayerGain(NoiseLayer, f32),
    Start(VoiceId, PathBuf),
    Volume(VoiceId, f32),
    Pause(VoiceId),
    Resume(VoiceId),
    Stop(VoiceId),
}

/// [`Mixer`] that queues work for the Bevy systems below.
#[derive(Default)]
pub struct MixerDesk {
    asset_root: PathBuf,
    queue: Vec<DeskCommand>,
}

impl MixerDesk {
    pub fn new(asset_root: impl Into<PathBuf>) -> Self {
        Self {
            asset_root: asset_root.into(),
            queue: Vec::new(),
        }
    }

    fn drain(&mut self) -> Vec<DeskCommand> {
        std::mem::take(&mut self.queue)
    }
}

impl Mixer for MixerDesk {
    fn open(&mut self) -> Result<(), AudioError> {
        self.queue.push(DeskCommand::SpawnBeds);
        Ok(())
    }

    fn set_layer_gain(&mut self, layer: NoiseLayer, gain: f32) {
        self.queue.push(DeskCommand::LayerGain(layer, gain));
    }

    fn start_voice(&mut self, id: VoiceId, track: Soundtrack) -> Result<(), AudioError> {
        let path = track.asset_path().ok_or(AudioError::MissingTrack(track))?;
        if !self.asset_root.join(path).exists() {
            return Err(AudioError::MissingTrack(track));
        }
        self.queue.push(DeskCommand::Start(id, PathBuf::from(path)));
        Ok(())
    }

    fn set_voice_volume(&mut self, id: VoiceId, volume: f32) {
        self.queue.push(DeskCommand::Volume(id, volume));
    }

    fn pause_voice(&mut self, id: VoiceId) {
        self.queue.push(DeskCommand::Pause(id));
    }

    fn resume_voice(&mut self, id: VoiceId) {
        self.queue.push(DeskCommand::Resume(id));
    }

    fn stop_voice(&mut self, id: VoiceId) {
        self.queue.push(DeskCommand::Stop(id));
    }
}

/// The director, as a resource.
#[derive(Resource)]
pub struct AudioStage {
    pub director: AudioDirector<MixerDesk>,
}

impl AudioStage {
    pub fn new(asset_root: impl AsRef<Path>) -> Self {
        Self {
            director: AudioDirector::new(MixerDesk::new(asset_root.as_ref())),
        }
    }
}

/// A playing noise bed and the gain it should have.
#[derive(Component)]
pub struct Bed {
    layer: NoiseLayer,
    gain: f32,
}

/// A playing music track and the state it should be in.
#[derive(Component, Debug, Clone, PartialEq)]
pub struct Voice {
    id: VoiceId,
    volume: f32,
    paused: bool,
}

/// One drain of the desk, split by whether a voice already has an entity.
#[derive(Debug, Default, PartialEq)]
struct Batch {
    /// Gains for noise beds opened in this drain, rain then city.
    beds: Option<[f32; 2]>,
    /// Voices started in this drain, with the state they ended it in.
    spawns: Vec<(PathBuf, Voice)>,
    /// Everything that targets beds or already spawned voices.
    rest: Vec<DeskCommand>,
}

impl Batch {
    fn fold(commands: Vec<DeskCommand>) -> Self {
        let mut batch = Batch::default();
        for command in commands {
            let id = match &command {
                DeskCommand::Start(id, path) => {
                    batch.spawns.push((
                        path.clone(),
                        Voice {
                            id: *id,
                            volume: 0.0,
                            paused: false,
                        },
                    ));
                    continue;
                }
                DeskCommand::Volume(id, _)
                | DeskCommand::Pause(id)
                | DeskCommand::Resume(id)
                | DeskCommand::Stop(id) => *id,
                DeskCommand::SpawnBeds => {
                    batch.beds = Some([0.0; 2]);
                    continue;
                }
                DeskCommand::LayerGain(layer, gain) => {
                    let (layer, gain) = (*layer, *gain);
                    match batch.beds.as_mut() {
                        Some(gains) => gains[bed_index(layer)] = gain,
                        None => batch.rest.push(DeskCommand::LayerGain(layer, gain)),
                    }
                    continue;
                }
            };

            let Some(index) = batch.spawns.iter().position(|(_, v)| v.id == id) else {
                batch.rest.push(command);
                continue;
            };
            let voice = &mut batch.spawns[index].1;
            match command {
                DeskCommand::Volume(_, volume) => voice.volume = volume,
                DeskCommand::Pause(_) => voice.paused = true,
                DeskCommand::Resume(_) => voice.paused = false,
                DeskCommand::Stop(_) => {
                    batch.spawns.remove(index);
                }
                _ => {}
            }
        }
        batch
    }
}

fn bed_index(layer: NoiseLayer) -> usize {
    match layer {
        NoiseLayer::Rain => 0,
        NoiseLayer::City => 1,
    }
}

pub fn register(app: &mut App) {
    app.add_audio_source::<NoiseBed>()
        .add_systems(Update, (advance_director, apply_desk_commands, sync_sinks).chain())
        .add_systems(Last, (shutdown_on_exit, apply_desk_commands).chain());
}

/// Silence everything once the app is about to exit.
fn shutdown_on_exit(mut exits: EventReader<AppExit>, mut stage: ResMut<AudioStage>) {
    if exits.read().next().is_some() {
        info!("shutting down audio");
        stage.director.shutdown();
    }
}

/// Let the director run its ramps.
fn advance_director(mut stage: ResMut<AudioStage>, time: Res<Time>) {
    stage.director.advance(time.delta());
}

/// Spawn, update and despawn audio entities for queued desk commands.
fn apply_desk_commands(
    mut commands: Commands,
    mut stage: ResMut<AudioStage>,
    asset_server: Res<AssetServer>,
    mut noise_beds: ResMut<Assets<NoiseBed>>,
    mut beds: Query<&mut Bed>,
    mut voices: Query<(Entity, &mut Voice, Option<&AudioSink>)>,
) {
    let batch = Batch::fold(stage.director.mixer_mut().drain());
    if let Some(gains) = batch.beds {
        for layer in [NoiseLayer::Rain, NoiseLayer::City] {
            let gain = gains[bed_index(layer)];
            let handle = noise_beds.add(NoiseBed {
                layer,
                seed: rand::random(),
            });
            commands.spawn((
                AudioPlayer(handle),
                PlaybackSettings::LOOP.with_volume(Volume::new(gain)),
                Bed { layer, gain },
            ));
        }
        info!("noise beds started");
    }
    for (path, voice) in batch.spawns {
        let settings = PlaybackSettings::LOOP.with_volume(Volume::new(voice.volume));
        commands.spawn((
            AudioPlayer::<AudioSource>(asset_server.load(path)),
            if voice.paused { settings.paused() } else { settings },
            voice,
        ));
    }

    for command in batch.rest {
        match command {
            DeskCommand::LayerGain(layer, gain) => {
                for mut bed in beds.iter_mut().filter(|b| b.layer == layer) {
                    bed.gain = gain;
                }
            }
            DeskCommand::SpawnBeds | DeskCommand::Start(..) => {}
            DeskCommand::Volume(id, volume) => {
                if let Some((_, mut voice, _)) = voices.iter_mut().find(|(_, v, _)| v.id == id) {
                    voice.volume = volume;
                }
            }
            DeskCommand::Pause(id) => {
                if let Some((_, mut voice, _)) = voices.iter_mut().find(|(_, v, _)| v.id == id) {
                    voice.paused = true;
                }
            }
            DeskCommand::Resume(id) => {
                if let Some((_, mut voice, _)) = voices.iter_mut().find(|(_, v, _)| v.id == id) {
                    voice.paused = false;
                }
            }
            DeskCommand::Stop(id) => {
                if let Some((entity, _, sink)) = voices.iter().find(|(_, v, _)| v.id == id) {
                    if let Some(sink) = sink {
                        sink.stop();
                    }
                    commands.entity(entity).despawn();
                }
            }
        }
    }
}

/// Push bed gains and voice state into the sinks.
fn sync_sinks(
    beds: Query<(&Bed, &AudioSink)>,
    voices: Query<(&Voice, &AudioSink)>,
) {
    for (bed, sink) in &beds {
        if (sink.volume() - bed.gain).abs() > f32::EPSILON {
            sink.set_volume(bed.gain);
        }
    }
    for (voice, sink) in &voices {
        if (sink.volume() - voice.volume).abs() > f32::EPSILON {
            sink.set_volume(voice.volume);
        }
        if voice.paused != sink.is_paused() {
            if voice.paused {
                sink.pause();
            } else {
                sink.play();
            }
        }
    }
}
