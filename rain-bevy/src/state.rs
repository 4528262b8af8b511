//! Application state and oracle worker integration.
//!
//! [`AppState`] owns the [`SceneGraph`] and drives it directly. Oracle calls
//! run on worker threads and come back over a channel tagged with their
//! ticket, so a reply that arrives after a restart or a load is simply
//! rejected by the graph. Cues produced along the way are queued here and
//! carried out by [`crate::effects::apply_queued_cues`].

use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex};

use bevy::prelude::*;
use rain_core::controller::OracleCall;
use rain_core::persist::SlotListing;
use rain_core::{
    generate_or_fallback, Cue, EndingLedger, EndingType, KvStore, NarrativeConfig,
    NarrativeOracle, PersistenceGateway, Scene, SceneGraph, SlotId, Ticket,
};

/// Store shared by the ledger and the save slots.
pub type SharedStore = Arc<dyn KvStore>;

type SceneReply = (Ticket, Scene);

/// Game phase state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, States)]
pub enum GamePhase {
    /// Title screen
    #[default]
    Title,
    /// A story is on screen
    Playing,
    /// The ending card after the player continues past an ending scene
    Ending,
}

/// Active overlay screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActiveOverlay {
    #[default]
    None,
    Menu,
    Slots,
    Log,
    Help,
}

/// A debug unlock waiting out its breach delay.
pub struct PendingBreach {
    ticket: Ticket,
    timer: Timer,
}

/// Main application state resource.
#[derive(Resource)]
pub struct AppState {
    pub graph: SceneGraph<SharedStore>,
    saves: PersistenceGateway<SharedStore>,
    oracle: Arc<dyn NarrativeOracle>,
    reply_tx: Sender<SceneReply>,
    reply_rx: Mutex<Receiver<SceneReply>>,
    cues: Vec<Cue>,
    breach: Option<PendingBreach>,
    /// Current overlay.
    pub overlay: ActiveOverlay,
    /// Status bar message.
    pub status_message: Option<String>,
    /// When the status message was set (for auto-clear).
    pub status_set_time: Option<f64>,
    /// Error message to display.
    pub error_message: Option<String>,
    /// Ending shown on the ending card.
    pub shown_ending: Option<EndingType>,
    /// Slot listing, refreshed whenever the slots overlay opens.
    pub slots: Vec<SlotListing>,
}

impl AppState {
    /// Build the state around `store` and `oracle`.
    pub fn new(
        config: NarrativeConfig,
        store: SharedStore,
        oracle: Arc<dyn NarrativeOracle>,
    ) -> Self {
        let ledger = EndingLedger::open(Arc::clone(&store));
        let saves = PersistenceGateway::new(store);
        let slots = saves.list_slots();
        let (reply_tx, reply_rx) = channel();

        Self {
            graph: SceneGraph::new(config, ledger),
            saves,
            oracle,
            reply_tx,
            reply_rx: Mutex::new(reply_rx),
            cues: Vec::new(),
            breach: None,
            overlay: ActiveOverlay::None,
            status_message: None,
            status_set_time: None,
            error_message: None,
            shown_ending: None,
            slots,
        }
    }

    /// Ask for the opening scene of a new story.
    pub fn begin(&mut self) {
        match self.graph.start() {
            Ok(launch) => {
                self.cues.extend(launch.cues);
                self.dispatch(launch.call);
                self.set_status_persistent("The rain begins...");
            }
            Err(e) => self.error_message = Some(e.to_string()),
        }
    }

    /// Make a choice on the current scene.
    pub fn choose(&mut self, choice: &str) {
        match self.graph.choose(choice) {
            Ok(rain_core::Dispatch::Oracle(call)) => self.dispatch(call),
            Ok(rain_core::Dispatch::Scripted(transition)) => self.cues.extend(transition.cues),
            Err(e) => {
                warn!("choice rejected: {e}");
                self.error_message = Some(e.to_string());
            }
        }
    }

    /// Run `call` on a worker thread; the reply arrives in [`Self::receive_replies`].
    fn dispatch(&self, call: OracleCall) {
        let oracle = Arc::clone(&self.oracle);
        let tx = self.reply_tx.clone();
        std::thread::spawn(move || {
            let scene = crate::runtime::RUNTIME.block_on(generate_or_fallback(&*oracle, &call.request));
            let _ = tx.send((call.ticket, scene));
        });
    }

    /// Feed every finished oracle call into the graph.
    pub fn receive_replies(&mut self) {
        loop {
            let reply = match self.reply_rx.lock() {
                Ok(rx) => rx.try_recv(),
                Err(_) => return,
            };
            match reply {
                Ok((ticket, scene)) => {
                    if let Ok(transition) = self.graph.complete(ticket, scene) {
                        self.cues.extend(transition.cues);
                        self.clear_status();
                    }
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return,
            }
        }
    }

    /// Unlock every normal ending and break the story after a short delay.
    pub fn debug_unlock(&mut self) {
        let breach = self.graph.trigger_debug_unlock();
        self.cues.extend(breach.cues);
        self.breach = Some(PendingBreach {
            ticket: breach.ticket,
            timer: Timer::new(breach.delay, TimerMode::Once),
        });
        self.overlay = ActiveOverlay::None;
    }

    /// Advance the breach timer and complete the breach when it runs out.
    pub fn tick_breach(&mut self, delta: std::time::Duration) {
        let Some(breach) = &mut self.breach else {
            return;
        };
        if !breach.timer.tick(delta).finished() {
            return;
        }
        let ticket = breach.ticket;
        self.breach = None;
        if let Ok(transition) = self.graph.complete_breach(ticket) {
            self.cues.extend(transition.cues);
        }
    }

    pub fn is_breaching(&self) -> bool {
        self.breach.is_some()
    }

    pub fn finish_ending(&mut self) {
        match self.graph.finish_ending() {
            Ok(cue) => self.cues.push(cue),
            Err(e) => self.error_message = Some(e.to_string()),
        }
    }

    pub fn break_cycle(&mut self) {
        match self.graph.break_cycle() {
            Ok(transition) => {
                self.shown_ending = None;
                self.cues.extend(transition.cues);
            }
            Err(e) => self.error_message = Some(e.to_string()),
        }
    }

    pub fn restart(&mut self) {
        self.breach = None;
        self.shown_ending = None;
        self.cues.extend(self.graph.restart());
    }

    /// Wipe the ledger and every save slot, then restart.
    pub fn hard_reset(&mut self) {
        self.breach = None;
        self.shown_ending = None;
        match self.graph.hard_reset() {
            Ok(cues) => self.cues.extend(cues),
            Err(e) => {
                error!("hard reset failed: {e}");
                self.error_message = Some(format!("Could not erase saved data: {e}"));
            }
        }
        self.refresh_slots();
    }

    pub fn cycle_music(&mut self) {
        let cue = self.graph.cycle_music();
        self.cues.push(cue);
    }

    pub fn toggle_audio(&mut self) {
        self.cues.extend(self.graph.toggle_audio());
    }

    pub fn save(&mut self, slot: SlotId, time: f64) {
        match self.saves.save(slot, self.graph.state()) {
            Ok(saved) => {
                info!("saved to {slot} at scene {}", saved.game_state.scene_count);
                self.set_status(format!("Saved to slot {}", slot.number()), time);
            }
            Err(e) => self.error_message = Some(format!("Save failed: {e}")),
        }
        self.refresh_slots();
    }

    /// Load `slot`. Returns `false` when the slot is empty or unreadable.
    pub fn load(&mut self, slot: SlotId, time: f64) -> bool {
        let Some(state) = self.saves.load(slot) else {
            self.set_status(format!("Slot {} is empty", slot.number()), time);
            return false;
        };
        info!("loaded {slot} at scene {}", state.scene_count);
        self.breach = None;
        self.shown_ending = None;
        self.cues.extend(self.graph.restore(state));
        self.set_status(format!("Loaded slot {}", slot.number()), time);
        self.overlay = ActiveOverlay::None;
        true
    }

    pub fn refresh_slots(&mut self) {
        self.slots = self.saves.list_slots();
    }

    /// Take the cues queued since the last call.
    pub fn take_cues(&mut self) -> Vec<Cue> {
        std::mem::take(&mut self.cues)
    }

    /// Set a status message (with timestamp for auto-clear).
    pub fn set_status(&mut self, message: impl Into<String>, current_time: f64) {
        self.status_message = Some(message.into());
        self.status_set_time = Some(current_time);
    }

    /// Set a status message without timestamp (won't auto-clear).
    pub fn set_status_persistent(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
        self.status_set_time = None;
    }

    pub fn clear_status(&mut self) {
        self.status_message = None;
        self.status_set_time = None;
    }

    /// Toggle an overlay.
    pub fn toggle_overlay(&mut self, overlay: ActiveOverlay) {
        if self.overlay == overlay {
            self.overlay = ActiveOverlay::None;
        } else {
            if overlay == ActiveOverlay::Slots {
                self.refresh_slots();
            }
            self.overlay = overlay;
        }
    }
}

/// System to clear old status messages after 3 seconds.
pub fn clear_old_status(mut app_state: ResMut<AppState>, time: Res<Time>) {
    if let Some(set_time) = app_state.status_set_time {
        let elapsed = time.elapsed_secs_f64() - set_time;
        if elapsed > 3.0 {
            app_state.clear_status();
        }
    }
}

/// System to collect oracle replies and run the breach timer.
pub fn poll_story(mut app_state: ResMut<AppState>, time: Res<Time>) {
    app_state.receive_replies();
    app_state.tick_breach(time.delta());
}
