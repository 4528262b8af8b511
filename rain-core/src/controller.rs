//! The scene graph controller.
//!
//! [`SceneGraph`] owns the [`GameState`] and the [`EndingLedger`] and is the
//! only thing that mutates them. It performs no I/O of its own: operations
//! that need the oracle hand back an [`OracleCall`] carrying a [`Ticket`], and
//! the host later feeds the oracle's scene back through
//! [`SceneGraph::complete`]. Restarting, loading or forcing the meta sequence
//! starts a new epoch, and a ticket from an older epoch is refused, so a late
//! response can never land on a state that has since been reset.
//!
//! Every transition also returns [`Cue`]s for the audio director, the rain
//! field and the UI.

use crate::audio::{Intensity, Soundtrack};
use crate::config::{NarrativeConfig, PacingPhase};
use crate::ledger::EndingLedger;
use crate::meta::{MetaPhase, MetaStep, DEBUG_UNLOCK_ENTRY, PLACEHOLDER_USER_TEXT};
use crate::scene::{EndingType, Mood, Scene};
use crate::state::{GameState, MusicMode, Role, Turn};
use crate::store::{KvStore, StoreError};
use serde::Serialize;
use std::collections::BTreeSet;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// User text recorded for the opening turn.
pub const OPENING_USER_TEXT: &str = "Story Start";

/// Why the controller refused an action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChooseError {
    #[error("waiting for the narrative oracle")]
    Busy,

    #[error("no scene is active")]
    NoScene,

    #[error("the story has ended")]
    EndingReached,

    #[error("expected \"{expected}\" during the meta sequence")]
    UnexpectedMetaInput { expected: &'static str },

    #[error("the current scene is not an ending")]
    NotAnEnding,

    #[error("the cycle cannot be broken from here")]
    BreakUnavailable,
}

/// A response arrived for a request that is no longer pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("discarded response for a superseded request")]
pub struct StaleResponse;

/// Identifies one outstanding request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    epoch: u64,
    serial: u64,
}

/// Pacing guidance the oracle should follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Directive {
    pub phase: PacingPhase,
    /// The story has run long; end it now.
    pub force_ending: bool,
    /// All normal endings are unlocked, so `truth` may be produced.
    pub truth_path: bool,
    /// Actively steer toward the `truth` ending.
    pub steer_truth: bool,
}

/// What the oracle is asked to continue from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OracleRequest {
    /// Most recent turns, oldest first.
    pub history: Vec<Turn>,
    /// `None` for the opening scene.
    pub last_choice: Option<String>,
    pub unlocked: BTreeSet<EndingType>,
    pub scene_count: u32,
    pub directive: Directive,
}

/// A request to run against the oracle and report back with its ticket.
#[derive(Debug, Clone)]
pub struct OracleCall {
    pub ticket: Ticket,
    pub request: OracleRequest,
}

/// Side effects a transition asks the host to carry out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    /// Bring up the audio output; report back with [`SceneGraph::audio_initialised`].
    InitAudio,
    FadeIn,
    FadeOut,
    Intensity(Intensity),
    SwitchTrack(Soundtrack),
    /// Reseed the rain for this mood.
    Mood(Mood),
    EndingUnlocked(EndingType),
    ShowEnding(EndingType),
}

/// Cues produced by a completed transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transition {
    pub cues: Vec<Cue>,
}

impl Transition {
    pub fn has(&self, cue: Cue) -> bool {
        self.cues.contains(&cue)
    }
}

/// Result of a choice: either the oracle must be asked, or a scripted step
/// already happened.
#[derive(Debug, Clone)]
pub enum Dispatch {
    Oracle(OracleCall),
    Scripted(Transition),
}

/// Startup: the opening oracle call plus audio cues to run alongside it.
#[derive(Debug, Clone)]
pub struct Launch {
    pub call: OracleCall,
    pub cues: Vec<Cue>,
}

/// A debug unlock waiting for its breach scene.
#[derive(Debug, Clone)]
pub struct Breach {
    pub ticket: Ticket,
    /// How long to wait before calling [`SceneGraph::complete_breach`].
    pub delay: Duration,
    pub cues: Vec<Cue>,
}

/// Ending progress for the menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub normal_unlocked: usize,
    pub normal_total: usize,
    pub truth: bool,
    pub reconciliation: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Pending {
    Opening(Ticket),
    Choice { ticket: Ticket, choice: String },
    Breach(Ticket),
}

/// The narrative state machine.
pub struct SceneGraph<S> {
    config: NarrativeConfig,
    ledger: EndingLedger<S>,
    state: GameState,
    epoch: u64,
    serial: u64,
    pending: Option<Pending>,
}

impl<S: KvStore> SceneGraph<S> {
    pub fn new(config: NarrativeConfig, ledger: EndingLedger<S>) -> Self {
        Self {
            config,
            ledger,
            state: GameState::new(),
            epoch: 0,
            serial: 0,
            pending: None,
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn current_scene(&self) -> Option<&Scene> {
        self.state.current_scene.as_ref()
    }

    pub fn ledger(&self) -> &EndingLedger<S> {
        &self.ledger
    }

    pub fn config(&self) -> &NarrativeConfig {
        &self.config
    }

    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    /// Mood of the current scene, calm when there is none.
    pub fn mood(&self) -> Mood {
        self.current_scene().map(Scene::mood).unwrap_or_default()
    }

    /// Begin a story: ask for the opening scene and bring up audio.
    pub fn start(&mut self) -> Result<Launch, ChooseError> {
        if self.pending.is_some() {
            return Err(ChooseError::Busy);
        }
        self.state.meta = None;
        self.state.is_loading = true;

        let ticket = self.issue();
        self.pending = Some(Pending::Opening(ticket));
        let request = self.request(None);
        debug!("requesting opening scene");

        Ok(Launch {
            call: OracleCall { ticket, request },
            cues: vec![Cue::InitAudio],
        })
    }

    /// Record how audio initialisation went.
    pub fn audio_initialised(&mut self, ok: bool) -> Vec<Cue> {
        self.state.is_audio_playing = ok;
        if ok {
            vec![Cue::FadeIn]
        } else {
            warn!("audio unavailable, continuing without sound");
            Vec::new()
        }
    }

    /// Act on a reader's choice.
    ///
    /// During the meta sequence only the step's reserved choice is accepted
    /// and it advances the script without touching the oracle. Otherwise the
    /// choice is logged and an oracle call is returned.
    pub fn choose(&mut self, choice: &str) -> Result<Dispatch, ChooseError> {
        if self.pending.is_some() {
            return Err(ChooseError::Busy);
        }
        let is_ending = self
            .state
            .current_scene
            .as_ref()
            .ok_or(ChooseError::NoScene)?
            .is_ending;

        if let Some(phase) = self.state.meta {
            return match phase.step.token() {
                Some(token) if token == choice => Ok(Dispatch::Scripted(self.advance_meta(phase))),
                Some(token) => Err(ChooseError::UnexpectedMetaInput { expected: token }),
                None => Err(ChooseError::EndingReached),
            };
        }

        if is_ending {
            return Err(ChooseError::EndingReached);
        }

        self.state.is_loading = true;
        self.state.log(Role::User, choice);

        let ticket = self.issue();
        self.pending = Some(Pending::Choice {
            ticket,
            choice: choice.to_string(),
        });
        let request = self.request(Some(choice.to_string()));
        debug!(scene_count = self.state.scene_count, "requesting next scene");

        Ok(Dispatch::Oracle(OracleCall { ticket, request }))
    }

    /// Apply the oracle's scene for `ticket`.
    pub fn complete(&mut self, ticket: Ticket, scene: Scene) -> Result<Transition, StaleResponse> {
        let choice = match self.pending.take() {
            Some(Pending::Opening(t)) if t == ticket => None,
            Some(Pending::Choice { ticket: t, choice }) if t == ticket => Some(choice),
            other => {
                self.pending = other;
                debug!("dropping stale oracle response");
                return Err(StaleResponse);
            }
        };

        let mut cues = Vec::new();
        if let Some(mood) = scene.background_mood {
            cues.push(Cue::Intensity(Intensity::for_mood(mood)));
        }
        cues.push(Cue::Mood(scene.mood()));

        if let (true, Some(ending)) = (scene.is_ending, scene.ending_type) {
            self.unlock(ending, &mut cues);
        }

        match choice {
            None => {
                self.state.scene_count = 1;
                self.state.history = vec![Turn {
                    user: OPENING_USER_TEXT.to_string(),
                    model: scene.narrative.clone(),
                }];
                self.state.full_log.clear();
            }
            Some(choice) => {
                self.state.history.push(Turn {
                    user: choice,
                    model: scene.narrative.clone(),
                });
                self.state.scene_count += 1;
            }
        }

        self.state.log(Role::Model, scene.narrative.clone());
        self.state.current_scene = Some(scene);
        self.state.is_loading = false;

        Ok(Transition { cues })
    }

    /// Show the ending screen for the current scene.
    pub fn finish_ending(&self) -> Result<Cue, ChooseError> {
        let scene = self.current_scene().ok_or(ChooseError::NoScene)?;
        match (scene.is_ending, scene.ending_type) {
            (true, Some(ending)) => Ok(Cue::ShowEnding(ending)),
            _ => Err(ChooseError::NotAnEnding),
        }
    }

    /// Whether the truth ending on screen can open the meta sequence.
    pub fn can_break_cycle(&self) -> bool {
        self.state.meta.is_none()
            && self.ledger.is_normal_complete()
            && self
                .current_scene()
                .is_some_and(|s| s.ending_type == Some(EndingType::Truth))
    }

    /// Enter the meta sequence from a reached truth ending.
    pub fn break_cycle(&mut self) -> Result<Transition, ChooseError> {
        if self.pending.is_some() {
            return Err(ChooseError::Busy);
        }
        if !self.can_break_cycle() {
            return Err(ChooseError::BreakUnavailable);
        }
        info!("entering meta sequence from the truth ending");

        let scene = MetaStep::GlitchIntro.scene();
        self.state.history.push(Turn {
            user: PLACEHOLDER_USER_TEXT.to_string(),
            model: scene.narrative.clone(),
        });
        self.state.log(Role::Model, scene.narrative.clone());
        self.state.scene_count += 1;
        self.state.music_mode = MusicMode::Drone;
        self.state.meta = Some(MetaPhase {
            step: MetaStep::GlitchIntro,
            forced: false,
        });
        self.state.current_scene = Some(scene);

        Ok(Transition {
            cues: vec![
                Cue::Intensity(Intensity::High),
                Cue::SwitchTrack(Soundtrack::Mode(MusicMode::Drone)),
                Cue::Mood(Mood::Glitch),
            ],
        })
    }

    /// Unlock every normal ending and schedule the breach scene.
    ///
    /// Any in-flight oracle call is superseded. The breach scene is installed
    /// by [`complete_breach`](Self::complete_breach) once the delay has passed.
    pub fn trigger_debug_unlock(&mut self) -> Breach {
        info!("debug unlock: forcing the meta sequence");
        let mut cues = Vec::new();
        for ending in EndingType::NORMAL {
            self.unlock(ending, &mut cues);
        }
        cues.push(Cue::Intensity(Intensity::High));
        cues.push(Cue::SwitchTrack(Soundtrack::Mode(MusicMode::Drone)));

        self.epoch += 1;
        let ticket = self.issue();
        self.pending = Some(Pending::Breach(ticket));

        Breach {
            ticket,
            delay: self.config.breach_delay(),
            cues,
        }
    }

    /// Install the breach scene scheduled by [`trigger_debug_unlock`](Self::trigger_debug_unlock).
    pub fn complete_breach(&mut self, ticket: Ticket) -> Result<Transition, StaleResponse> {
        if self.pending.as_ref() != Some(&Pending::Breach(ticket)) {
            debug!("dropping stale breach");
            return Err(StaleResponse);
        }
        self.pending = None;

        self.state.history.clear();
        self.state.log(Role::User, DEBUG_UNLOCK_ENTRY);
        self.state.current_scene = Some(MetaStep::GlitchIntro.scene());
        self.state.is_loading = false;
        self.state.scene_count = self.config.debug_scene_count;
        self.state.music_mode = MusicMode::Drone;
        self.state.meta = Some(MetaPhase {
            step: MetaStep::GlitchIntro,
            forced: true,
        });

        Ok(Transition {
            cues: vec![Cue::Mood(Mood::Glitch)],
        })
    }

    /// Clear the story and fade audio out. Safe to call repeatedly.
    ///
    /// The soundtrack goes back to the default mode along with the state, so a
    /// track forced by the meta sequence does not outlive it.
    pub fn restart(&mut self) -> Vec<Cue> {
        self.epoch += 1;
        self.pending = None;
        self.state = GameState::new();
        debug!(epoch = self.epoch, "story reset");
        vec![
            Cue::FadeOut,
            Cue::SwitchTrack(Soundtrack::Mode(self.state.music_mode)),
            Cue::Mood(Mood::Calm),
        ]
    }

    /// Wipe every save and the ledger, then restart.
    pub fn hard_reset(&mut self) -> Result<Vec<Cue>, StoreError> {
        info!("hard reset: wiping all persisted data");
        self.ledger.wipe()?;
        Ok(self.restart())
    }

    /// Replace the state with a loaded one.
    pub fn restore(&mut self, mut state: GameState) -> Vec<Cue> {
        self.epoch += 1;
        self.pending = None;
        state.is_loading = false;

        let mut cues = if state.is_audio_playing {
            vec![Cue::InitAudio, Cue::FadeIn]
        } else {
            vec![Cue::FadeOut]
        };
        let track = match state.meta {
            Some(MetaPhase {
                step: MetaStep::Reconciliation,
                ..
            }) => Soundtrack::Reconciliation,
            _ => Soundtrack::Mode(state.music_mode),
        };
        cues.push(Cue::SwitchTrack(track));
        cues.push(Cue::Mood(
            state.current_scene.as_ref().map(Scene::mood).unwrap_or_default(),
        ));

        self.state = state;
        cues
    }

    /// Move to the next music mode.
    pub fn cycle_music(&mut self) -> Cue {
        self.state.music_mode = self.state.music_mode.next();
        Cue::SwitchTrack(Soundtrack::Mode(self.state.music_mode))
    }

    /// Turn audio on or off.
    pub fn toggle_audio(&mut self) -> Vec<Cue> {
        self.state.is_audio_playing = !self.state.is_audio_playing;
        if self.state.is_audio_playing {
            vec![Cue::InitAudio, Cue::FadeIn]
        } else {
            vec![Cue::FadeOut]
        }
    }

    pub fn progress(&self) -> Progress {
        Progress {
            normal_unlocked: self.ledger.normal_count(),
            normal_total: EndingType::NORMAL.len(),
            truth: self.ledger.contains(EndingType::Truth),
            reconciliation: self.ledger.contains(EndingType::Reconciliation),
        }
    }

    fn advance_meta(&mut self, phase: MetaPhase) -> Transition {
        let Some(step) = phase.step.next() else {
            return Transition::default();
        };
        debug!(?step, "meta sequence advanced");

        let scene = step.scene();
        let mut cues = vec![Cue::Mood(scene.mood())];

        self.state.history.push(Turn {
            user: PLACEHOLDER_USER_TEXT.to_string(),
            model: scene.narrative.clone(),
        });
        self.state.log(Role::Model, scene.narrative.clone());
        if !phase.forced {
            self.state.scene_count += 1;
        }
        self.state.is_loading = false;
        self.state.meta = Some(MetaPhase { step, ..phase });

        if step.is_terminal() {
            cues.push(Cue::SwitchTrack(Soundtrack::Reconciliation));
            self.unlock(EndingType::Reconciliation, &mut cues);
        }
        self.state.current_scene = Some(scene);

        Transition { cues }
    }

    fn unlock(&mut self, ending: EndingType, cues: &mut Vec<Cue>) {
        if !self.ledger.contains(ending) {
            self.ledger.unlock(ending);
            cues.push(Cue::EndingUnlocked(ending));
        }
    }

    fn issue(&mut self) -> Ticket {
        self.serial += 1;
        Ticket {
            epoch: self.epoch,
            serial: self.serial,
        }
    }

    fn request(&self, last_choice: Option<String>) -> OracleRequest {
        let pacing = &self.config.pacing;
        let scene_count = self.state.scene_count;
        let normal_complete = self.ledger.is_normal_complete();

        OracleRequest {
            history: self
                .state
                .recent_history(self.config.history_window)
                .to_vec(),
            last_choice,
            unlocked: self.ledger.unlocked_set().clone(),
            scene_count,
            directive: Directive {
                phase: pacing.phase(scene_count),
                force_ending: pacing.force_ending(scene_count, normal_complete),
                truth_path: normal_complete,
                steer_truth: normal_complete
                    && self.state.history.len() > pacing.truth_steer_after,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{CONTINUE_TOKEN, PRESENCE_TOKEN};
    use crate::audio::AudioDirector;
    use crate::scene::Choice;
    use crate::store::MemoryStore;
    use crate::testing::RecordingMixer;

    fn graph() -> SceneGraph<MemoryStore> {
        SceneGraph::new(
            NarrativeConfig::default(),
            EndingLedger::open(MemoryStore::new()),
        )
    }

    fn scene(text: &str) -> Scene {
        Scene::new(text, vec![Choice::new("Walk on"), Choice::new("Stay")])
    }

    fn oracle_call(dispatch: Dispatch) -> OracleCall {
        match dispatch {
            Dispatch::Oracle(call) => call,
            Dispatch::Scripted(_) => panic!("expected an oracle call"),
        }
    }

    fn started() -> SceneGraph<MemoryStore> {
        let mut graph = graph();
        let launch = graph.start().unwrap();
        graph.complete(launch.call.ticket, scene("Opening.")).unwrap();
        graph
    }

    #[test]
    fn test_start_seeds_history() {
        let mut graph = graph();
        let launch = graph.start().unwrap();
        assert_eq!(launch.cues, vec![Cue::InitAudio]);
        assert!(launch.call.request.history.is_empty());
        assert_eq!(launch.call.request.last_choice, None);
        assert_eq!(launch.call.request.scene_count, 0);
        assert!(graph.state().is_loading);

        graph.complete(launch.call.ticket, scene("Opening.")).unwrap();
        let state = graph.state();
        assert_eq!(state.scene_count, 1);
        assert_eq!(state.history.len(), 1);
        assert_eq!(state.history[0].user, OPENING_USER_TEXT);
        assert_eq!(state.full_log.len(), 1);
        assert!(!state.is_loading);
    }

    #[test]
    fn test_choose_while_loading_is_busy() {
        let mut graph = started();
        let _call = oracle_call(graph.choose("Walk on").unwrap());
        assert_eq!(graph.choose("Stay").unwrap_err(), ChooseError::Busy);
        assert_eq!(graph.start().unwrap_err(), ChooseError::Busy);
    }

    #[test]
    fn test_choose_records_turn() {
        let mut graph = started();
        let call = oracle_call(graph.choose("Walk on").unwrap());
        assert_eq!(call.request.last_choice.as_deref(), Some("Walk on"));
        assert_eq!(call.request.scene_count, 1);

        let t = graph
            .complete(call.ticket, scene("The crossing.").with_mood(Mood::Stormy))
            .unwrap();
        assert!(t.has(Cue::Intensity(Intensity::High)));
        assert!(t.has(Cue::Mood(Mood::Stormy)));

        let state = graph.state();
        assert_eq!(state.scene_count, 2);
        assert_eq!(state.history.last().unwrap().user, "Walk on");
        assert_eq!(state.full_log.len(), 3);
    }

    #[test]
    fn test_no_mood_no_intensity_cue() {
        let mut graph = started();
        let call = oracle_call(graph.choose("Stay").unwrap());
        let t = graph.complete(call.ticket, scene("Still.")).unwrap();
        assert!(!t.cues.iter().any(|c| matches!(c, Cue::Intensity(_))));
        assert!(t.has(Cue::Mood(Mood::Calm)));
    }

    #[test]
    fn test_stale_response_after_restart() {
        let mut graph = started();
        let call = oracle_call(graph.choose("Walk on").unwrap());
        let cues = graph.restart();
        assert!(cues.contains(&Cue::FadeOut));

        assert_eq!(
            graph.complete(call.ticket, scene("Too late.")),
            Err(StaleResponse)
        );
        assert_eq!(graph.state(), &GameState::new());
    }

    /// Play cues into a director the way the frontend does.
    fn play(
        graph: &mut SceneGraph<MemoryStore>,
        director: &mut AudioDirector<RecordingMixer>,
        cues: Vec<Cue>,
    ) {
        let mut queue: std::collections::VecDeque<Cue> = cues.into();
        while let Some(cue) = queue.pop_front() {
            match cue {
                Cue::InitAudio => {
                    let ok = director
                        .init(Soundtrack::Mode(graph.state().music_mode))
                        .is_ok();
                    queue.extend(graph.audio_initialised(ok));
                }
                Cue::FadeIn => director.fade_in(),
                Cue::FadeOut => director.fade_out(),
                Cue::Intensity(level) => director.set_intensity(level),
                Cue::SwitchTrack(track) => {
                    director.switch_track(track);
                }
                Cue::Mood(_) | Cue::EndingUnlocked(_) | Cue::ShowEnding(_) => {}
            }
            director.advance(Duration::from_millis(100));
        }
    }

    #[test]
    fn test_restart_returns_music_to_default() {
        let mut graph = graph();
        let mut director = AudioDirector::new(RecordingMixer::new());

        let launch = graph.start().unwrap();
        play(&mut graph, &mut director, launch.cues);
        let t = graph.complete(launch.call.ticket, scene("Opening.")).unwrap();
        play(&mut graph, &mut director, t.cues);

        let breach = graph.trigger_debug_unlock();
        play(&mut graph, &mut director, breach.cues);
        let t = graph.complete_breach(breach.ticket).unwrap();
        play(&mut graph, &mut director, t.cues);
        assert_eq!(
            director.current_track(),
            Some(Soundtrack::Mode(MusicMode::Drone))
        );

        let cues = graph.restart();
        play(&mut graph, &mut director, cues);
        let launch = graph.start().unwrap();
        play(&mut graph, &mut director, launch.cues);

        assert_eq!(graph.state().music_mode, MusicMode::Piano);
        assert_eq!(
            director.current_track(),
            Some(Soundtrack::Mode(MusicMode::Piano))
        );
    }

    #[test]
    fn test_hard_reset_switches_track() {
        let mut graph = started();
        graph.trigger_debug_unlock();
        let cues = graph.hard_reset().unwrap();
        assert!(cues.contains(&Cue::SwitchTrack(Soundtrack::Mode(MusicMode::Piano))));
    }

    #[test]
    fn test_restart_is_idempotent() {
        let mut graph = started();
        graph.restart();
        let once = graph.state().clone();
        graph.restart();
        assert_eq!(graph.state(), &once);
        assert!(!graph.is_busy());
    }

    #[test]
    fn test_ending_unlocks_and_blocks_choices() {
        let mut graph = started();
        let call = oracle_call(graph.choose("Walk on").unwrap());
        let t = graph
            .complete(call.ticket, Scene::ending("The train leaves.", EndingType::Departure))
            .unwrap();
        assert!(t.has(Cue::EndingUnlocked(EndingType::Departure)));
        assert!(graph.ledger().contains(EndingType::Departure));

        assert_eq!(graph.choose("Walk on").unwrap_err(), ChooseError::EndingReached);
        assert_eq!(
            graph.finish_ending(),
            Ok(Cue::ShowEnding(EndingType::Departure))
        );
    }

    #[test]
    fn test_finish_ending_requires_ending() {
        let graph = started();
        assert_eq!(graph.finish_ending(), Err(ChooseError::NotAnEnding));
        assert_eq!(self::graph().finish_ending(), Err(ChooseError::NoScene));
    }

    #[test]
    fn test_reserved_text_goes_to_oracle_outside_meta() {
        let mut graph = started();
        let dispatch = graph.choose(CONTINUE_TOKEN).unwrap();
        assert!(matches!(dispatch, Dispatch::Oracle(_)));
    }

    #[test]
    fn test_debug_unlock_supersedes_pending_call() {
        let mut graph = started();
        let call = oracle_call(graph.choose("Walk on").unwrap());

        let breach = graph.trigger_debug_unlock();
        assert_eq!(breach.delay, Duration::from_millis(100));
        assert!(breach.cues.contains(&Cue::Intensity(Intensity::High)));
        assert!(breach
            .cues
            .contains(&Cue::SwitchTrack(Soundtrack::Mode(MusicMode::Drone))));
        assert!(graph.ledger().is_normal_complete());

        assert_eq!(graph.complete(call.ticket, scene("Late.")), Err(StaleResponse));

        let t = graph.complete_breach(breach.ticket).unwrap();
        assert!(t.has(Cue::Mood(Mood::Glitch)));
        let state = graph.state();
        assert_eq!(state.scene_count, 999);
        assert_eq!(state.music_mode, MusicMode::Drone);
        assert!(state.history.is_empty());
        assert_eq!(state.full_log.last().unwrap().text, DEBUG_UNLOCK_ENTRY);
        assert_eq!(
            state.current_scene.as_ref().unwrap().choices[0].text,
            CONTINUE_TOKEN
        );
        assert!(!state.is_loading);
    }

    #[test]
    fn test_breach_cancelled_by_restart() {
        let mut graph = started();
        let breach = graph.trigger_debug_unlock();
        graph.restart();
        assert_eq!(graph.complete_breach(breach.ticket), Err(StaleResponse));
        assert!(graph.current_scene().is_none());
    }

    #[test]
    fn test_forced_meta_freezes_counter() {
        let mut graph = started();
        let breach = graph.trigger_debug_unlock();
        graph.complete_breach(breach.ticket).unwrap();

        let dispatch = graph.choose(CONTINUE_TOKEN).unwrap();
        assert!(matches!(dispatch, Dispatch::Scripted(_)));
        assert_eq!(graph.state().scene_count, 999);
        assert_eq!(graph.state().meta.unwrap().step, MetaStep::Realization);
        assert_eq!(graph.state().history.last().unwrap().user, PLACEHOLDER_USER_TEXT);
    }

    #[test]
    fn test_meta_rejects_wrong_token() {
        let mut graph = started();
        let breach = graph.trigger_debug_unlock();
        graph.complete_breach(breach.ticket).unwrap();

        assert_eq!(
            graph.choose(PRESENCE_TOKEN).unwrap_err(),
            ChooseError::UnexpectedMetaInput {
                expected: CONTINUE_TOKEN
            }
        );
        assert_eq!(graph.state().meta.unwrap().step, MetaStep::GlitchIntro);
        assert!(!graph.is_busy());
    }

    #[test]
    fn test_break_cycle_needs_truth_and_normals() {
        let mut graph = started();
        assert_eq!(graph.break_cycle().unwrap_err(), ChooseError::BreakUnavailable);

        for ending in EndingType::NORMAL {
            graph.ledger.unlock(ending);
        }
        let call = oracle_call(graph.choose("Look up").unwrap());
        assert!(call.request.directive.truth_path);
        graph
            .complete(call.ticket, Scene::ending("Static.", EndingType::Truth))
            .unwrap();

        assert!(graph.can_break_cycle());
        let scene_count = graph.state().scene_count;
        let t = graph.break_cycle().unwrap();
        assert!(t.has(Cue::Mood(Mood::Glitch)));
        assert_eq!(graph.state().scene_count, scene_count + 1);
        assert_eq!(
            graph.state().meta,
            Some(MetaPhase {
                step: MetaStep::GlitchIntro,
                forced: false
            })
        );
    }

    #[test]
    fn test_directive_pacing() {
        let mut graph = started();
        graph.state.scene_count = 16;
        let call = oracle_call(graph.choose("Walk on").unwrap());
        let d = call.request.directive;
        assert_eq!(d.phase, PacingPhase::Imminent);
        assert!(d.force_ending);
        assert!(!d.truth_path);
        assert!(!d.steer_truth);
    }

    #[test]
    fn test_history_window_in_request() {
        let mut graph = started();
        for i in 0..12 {
            let call = oracle_call(graph.choose(&format!("choice {i}")).unwrap());
            graph.complete(call.ticket, scene(&format!("scene {i}"))).unwrap();
        }
        let call = oracle_call(graph.choose("last").unwrap());
        assert_eq!(call.request.history.len(), 8);
        assert_eq!(call.request.history[7].user, "choice 11");
        assert_eq!(graph.state().history.len(), 13);
    }

    #[test]
    fn test_restore_syncs_audio_and_supersedes() {
        let mut graph = started();
        let mut saved = graph.state().clone();
        saved.is_audio_playing = true;
        saved.music_mode = MusicMode::Machinery;
        saved.is_loading = true;

        let call = oracle_call(graph.choose("Walk on").unwrap());
        let cues = graph.restore(saved);

        assert_eq!(cues[..2], [Cue::InitAudio, Cue::FadeIn]);
        assert!(cues.contains(&Cue::SwitchTrack(Soundtrack::Mode(MusicMode::Machinery))));
        assert!(!graph.state().is_loading);
        assert_eq!(graph.complete(call.ticket, scene("Late.")), Err(StaleResponse));
    }

    #[test]
    fn test_toggle_and_cycle() {
        let mut graph = started();
        assert_eq!(graph.toggle_audio(), vec![Cue::InitAudio, Cue::FadeIn]);
        assert!(graph.state().is_audio_playing);
        assert_eq!(graph.toggle_audio(), vec![Cue::FadeOut]);

        assert_eq!(
            graph.cycle_music(),
            Cue::SwitchTrack(Soundtrack::Mode(MusicMode::Lofi))
        );
        assert_eq!(graph.state().music_mode, MusicMode::Lofi);
    }

    #[test]
    fn test_audio_initialised() {
        let mut graph = graph();
        assert_eq!(graph.audio_initialised(true), vec![Cue::FadeIn]);
        assert!(graph.state().is_audio_playing);
        assert!(graph.audio_initialised(false).is_empty());
        assert!(!graph.state().is_audio_playing);
    }

    #[test]
    fn test_hard_reset_wipes_ledger() {
        let mut graph = started();
        graph.trigger_debug_unlock();
        assert_eq!(graph.progress().normal_unlocked, 5);

        graph.hard_reset().unwrap();
        let progress = graph.progress();
        assert_eq!(progress.normal_unlocked, 0);
        assert!(!progress.truth);
        assert!(graph.current_scene().is_none());
    }
}
