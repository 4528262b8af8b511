//! Story session management.
//!
//! [`StorySession`] drives a [`SceneGraph`] against a live oracle: it runs
//! each [`OracleCall`] to completion, waits out the debug breach, and wires
//! save slots to the same store the ending ledger lives in. Hosts that need
//! to stay responsive while the oracle works (the Bevy frontend) drive the
//! graph directly instead.
//!
//! [`OracleCall`]: crate::controller::OracleCall

use crate::config::NarrativeConfig;
use crate::controller::{ChooseError, Cue, Dispatch, OracleCall, Progress, SceneGraph, StaleResponse};
use crate::ledger::EndingLedger;
use crate::oracle::{generate_or_fallback, NarrativeOracle};
use crate::persist::{PersistError, PersistenceGateway, SaveSlot, SlotId, SlotListing};
use crate::scene::Scene;
use crate::state::GameState;
use crate::store::{KvStore, StoreError};
use thiserror::Error;
use tracing::info;

/// Errors that can occur during a session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Choose(#[from] ChooseError),

    #[error(transparent)]
    Stale(#[from] StaleResponse),

    #[error("save error: {0}")]
    Persist(#[from] PersistError),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

/// A story driven end to end against an oracle.
pub struct StorySession<O, S> {
    graph: SceneGraph<S>,
    saves: PersistenceGateway<S>,
    oracle: O,
}

impl<O, S> StorySession<O, S>
where
    O: NarrativeOracle,
    S: KvStore + Clone,
{
    /// Open a session whose ledger and saves share `store`.
    pub fn new(config: NarrativeConfig, store: S, oracle: O) -> Self {
        let ledger = EndingLedger::open(store.clone());
        Self {
            graph: SceneGraph::new(config, ledger),
            saves: PersistenceGateway::new(store),
            oracle,
        }
    }

    pub fn graph(&self) -> &SceneGraph<S> {
        &self.graph
    }

    pub fn state(&self) -> &GameState {
        self.graph.state()
    }

    pub fn current_scene(&self) -> Option<&Scene> {
        self.graph.current_scene()
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn progress(&self) -> Progress {
        self.graph.progress()
    }

    /// Begin a new story and wait for the opening scene.
    pub async fn start(&mut self) -> Result<Vec<Cue>, SessionError> {
        let launch = self.graph.start()?;
        let mut cues = launch.cues;
        cues.extend(self.run(launch.call).await?);
        Ok(cues)
    }

    /// Forward the host's audio initialisation result.
    pub fn audio_initialised(&mut self, ok: bool) -> Vec<Cue> {
        self.graph.audio_initialised(ok)
    }

    /// Make a choice and wait for the resulting scene.
    pub async fn choose(&mut self, choice: &str) -> Result<Vec<Cue>, SessionError> {
        match self.graph.choose(choice)? {
            Dispatch::Oracle(call) => self.run(call).await,
            Dispatch::Scripted(transition) => Ok(transition.cues),
        }
    }

    /// Unlock every normal ending and enter the meta sequence after the breach delay.
    pub async fn trigger_debug_unlock(&mut self) -> Result<Vec<Cue>, SessionError> {
        let breach = self.graph.trigger_debug_unlock();
        let mut cues = breach.cues;
        tokio::time::sleep(breach.delay).await;
        cues.extend(self.graph.complete_breach(breach.ticket)?.cues);
        Ok(cues)
    }

    pub fn finish_ending(&self) -> Result<Cue, SessionError> {
        Ok(self.graph.finish_ending()?)
    }

    pub fn break_cycle(&mut self) -> Result<Vec<Cue>, SessionError> {
        Ok(self.graph.break_cycle()?.cues)
    }

    pub fn restart(&mut self) -> Vec<Cue> {
        self.graph.restart()
    }

    /// Wipe the ledger and every slot, then restart.
    pub fn hard_reset(&mut self) -> Result<Vec<Cue>, SessionError> {
        Ok(self.graph.hard_reset()?)
    }

    pub fn cycle_music(&mut self) -> Cue {
        self.graph.cycle_music()
    }

    pub fn toggle_audio(&mut self) -> Vec<Cue> {
        self.graph.toggle_audio()
    }

    /// Save the current story into `slot`.
    pub fn save(&self, slot: SlotId) -> Result<SaveSlot, SessionError> {
        let saved = self.saves.save(slot, self.graph.state())?;
        info!(slot = %slot, scene_count = saved.game_state.scene_count, "story saved");
        Ok(saved)
    }

    /// Load `slot`, returning the restore cues, or `None` when the slot is
    /// empty or unreadable.
    pub fn load(&mut self, slot: SlotId) -> Option<Vec<Cue>> {
        let state = self.saves.load(slot)?;
        info!(slot = %slot, scene_count = state.scene_count, "story loaded");
        Some(self.graph.restore(state))
    }

    pub fn slots(&self) -> Vec<SlotListing> {
        self.saves.list_slots()
    }

    async fn run(&mut self, call: OracleCall) -> Result<Vec<Cue>, SessionError> {
        let scene = generate_or_fallback(&self.oracle, &call.request).await;
        Ok(self.graph.complete(call.ticket, scene)?.cues)
    }
}
