//! Scenes written by Claude through a forced `write_scene` tool call.

use super::prompts;
use super::{NarrativeOracle, OracleError};
use crate::config::NarrativeConfig;
use crate::controller::OracleRequest;
use crate::scene::{Choice, EndingType, Mood, Scene};
use async_trait::async_trait;
use claude::{Claude, Message, Request};
use rain_macros::{Schema, Tool};
use serde::Deserialize;
use tracing::debug;

/// A choice as Claude proposes it.
#[derive(Debug, Clone, Schema, Deserialize)]
pub struct ChoiceDraft {
    /// Short action text shown on the button
    pub text: String,
    /// Hidden note on where this choice leads
    #[tool(optional)]
    #[serde(default)]
    pub impact: Option<String>,
}

/// Write the next scene of the story
#[derive(Debug, Clone, Tool, Deserialize)]
#[tool(name = "write_scene")]
pub struct WriteScene {
    /// Prose for the scene, plain text without markdown
    pub narrative: String,
    /// 8-12 short drifting inner thoughts
    #[serde(default)]
    pub thoughts: Vec<String>,
    /// Two or three choices, empty when the scene is an ending
    #[serde(default)]
    pub choices: Vec<ChoiceDraft>,
    /// True when this scene ends the story
    pub is_ending: bool,
    /// Which ending this scene reaches
    #[tool(one_of = "dissolution, connection, departure, stagnation, destruction, truth")]
    #[serde(default)]
    pub ending_type: Option<EndingType>,
    /// Atmosphere for rain and music
    #[tool(one_of = "calm, stormy, ethereal, glitch")]
    #[serde(default)]
    pub background_mood: Option<Mood>,
}

impl From<WriteScene> for Scene {
    fn from(draft: WriteScene) -> Self {
        Scene {
            narrative: draft.narrative,
            thoughts: draft.thoughts,
            choices: draft
                .choices
                .into_iter()
                .map(|c| Choice {
                    text: c.text,
                    impact: c.impact,
                })
                .collect(),
            is_ending: draft.is_ending,
            ending_type: draft.ending_type,
            background_mood: draft.background_mood,
        }
    }
}

/// Narrative oracle backed by the Claude API.
#[derive(Clone)]
pub struct ClaudeOracle {
    client: Claude,
    config: NarrativeConfig,
}

impl ClaudeOracle {
    pub fn new(client: Claude, config: NarrativeConfig) -> Self {
        let client = match &config.model {
            Some(model) => client.with_model(model.clone()),
            None => client,
        };
        Self { client, config }
    }

    /// Build from `ANTHROPIC_API_KEY`.
    pub fn from_env(config: NarrativeConfig) -> Result<Self, OracleError> {
        Ok(Self::new(Claude::from_env()?, config))
    }

    pub fn model(&self) -> &str {
        self.client.model()
    }

    /// The Messages API request for `request`.
    pub fn build_request(&self, request: &OracleRequest) -> Request {
        let mut messages = Vec::with_capacity(request.history.len() * 2 + 1);
        match &request.last_choice {
            None => messages.push(Message::user(prompts::opening_prompt())),
            Some(choice) => {
                for turn in &request.history {
                    messages.push(Message::user(turn.user.clone()));
                    messages.push(Message::assistant(turn.model.clone()));
                }
                messages.push(Message::user(prompts::choice_prompt(request, choice)));
            }
        }

        let mut req = Request::new(messages)
            .with_system(prompts::system_prompt(request))
            .with_max_tokens(self.config.max_tokens);
        if let Some(temperature) = self.config.temperature {
            req = req.with_temperature(temperature);
        }
        req
    }
}

#[async_trait]
impl NarrativeOracle for ClaudeOracle {
    async fn generate(&self, request: &OracleRequest) -> Result<Scene, OracleError> {
        debug!(
            scene_count = request.scene_count,
            turns = request.history.len(),
            model = self.model(),
            "requesting scene"
        );
        let draft: WriteScene = self
            .client
            .complete_structured(self.build_request(request), WriteScene::as_tool())
            .await?;
        Ok(draft.into())
    }
}
