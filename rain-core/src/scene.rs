//! Scene data model.
//!
//! A [`Scene`] is one unit of narrative plus the choices that lead out of it.
//! Scenes come either from the narrative oracle or from the scripted meta
//! sequence; both go through the same shape rules in [`Scene::validate`].

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Visual and audio tone of a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    #[default]
    Calm,
    Stormy,
    Ethereal,
    Glitch,
}

impl Mood {
    pub const ALL: [Mood; 4] = [Mood::Calm, Mood::Stormy, Mood::Ethereal, Mood::Glitch];

    pub fn as_str(self) -> &'static str {
        match self {
            Mood::Calm => "calm",
            Mood::Stormy => "stormy",
            Mood::Ethereal => "ethereal",
            Mood::Glitch => "glitch",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a story ended.
///
/// The five normal endings are reachable through ordinary play. `Truth` needs
/// all five first, and `Reconciliation` only closes the meta sequence.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum EndingType {
    Dissolution,
    Connection,
    Departure,
    Stagnation,
    Destruction,
    Truth,
    Reconciliation,
}

impl EndingType {
    /// Endings reachable through organic play.
    pub const NORMAL: [EndingType; 5] = [
        EndingType::Dissolution,
        EndingType::Connection,
        EndingType::Departure,
        EndingType::Stagnation,
        EndingType::Destruction,
    ];

    pub fn is_normal(self) -> bool {
        Self::NORMAL.contains(&self)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EndingType::Dissolution => "dissolution",
            EndingType::Connection => "connection",
            EndingType::Departure => "departure",
            EndingType::Stagnation => "stagnation",
            EndingType::Destruction => "destruction",
            EndingType::Truth => "truth",
            EndingType::Reconciliation => "reconciliation",
        }
    }

    /// Title shown on the ending screen.
    pub fn title(self) -> &'static str {
        match self {
            EndingType::Dissolution => "DISSOLUTION",
            EndingType::Connection => "CONNECTION",
            EndingType::Departure => "DEPARTURE",
            EndingType::Stagnation => "STAGNATION",
            EndingType::Destruction => "DESTRUCTION",
            EndingType::Truth => "THE TRUTH",
            EndingType::Reconciliation => "RECONCILIATION",
        }
    }
}

impl fmt::Display for EndingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A choice offered to the reader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub text: String,
    /// Hidden hint about where the choice leads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact: Option<String>,
}

impl Choice {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            impact: None,
        }
    }

    pub fn with_impact(mut self, impact: impl Into<String>) -> Self {
        self.impact = Some(impact.into());
        self
    }
}

/// Shape violations in a scene.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SceneError {
    #[error("scene has no narrative")]
    EmptyNarrative,

    #[error("non-ending scene offers no choices")]
    MissingChoices,

    #[error("ending scene offers {0} choices")]
    ChoicesOnEnding(usize),

    #[error("ending scene has no ending type")]
    MissingEndingType,

    #[error("non-ending scene carries ending type {0}")]
    UnexpectedEndingType(EndingType),

    #[error("choice {0} has no text")]
    BlankChoice(usize),
}

/// One unit of narrative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub narrative: String,
    /// Decorative thought fragments that drift over the scene.
    #[serde(default)]
    pub thoughts: Vec<String>,
    pub choices: Vec<Choice>,
    pub is_ending: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ending_type: Option<EndingType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_mood: Option<Mood>,
}

impl Scene {
    /// Create a non-ending scene.
    pub fn new(narrative: impl Into<String>, choices: Vec<Choice>) -> Self {
        Self {
            narrative: narrative.into(),
            thoughts: Vec::new(),
            choices,
            is_ending: false,
            ending_type: None,
            background_mood: None,
        }
    }

    /// Create an ending scene.
    pub fn ending(narrative: impl Into<String>, ending: EndingType) -> Self {
        Self {
            narrative: narrative.into(),
            thoughts: Vec::new(),
            choices: Vec::new(),
            is_ending: true,
            ending_type: Some(ending),
            background_mood: None,
        }
    }

    pub fn with_mood(mut self, mood: Mood) -> Self {
        self.background_mood = Some(mood);
        self
    }

    pub fn with_thoughts<I, T>(mut self, thoughts: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.thoughts = thoughts.into_iter().map(Into::into).collect();
        self
    }

    /// The scene's mood, calm when unspecified.
    pub fn mood(&self) -> Mood {
        self.background_mood.unwrap_or_default()
    }

    /// Check the structural rules every scene must follow.
    pub fn validate(&self) -> Result<(), SceneError> {
        if self.narrative.trim().is_empty() {
            return Err(SceneError::EmptyNarrative);
        }

        if let Some(index) = self.choices.iter().position(|c| c.text.trim().is_empty()) {
            return Err(SceneError::BlankChoice(index));
        }

        match (self.is_ending, self.ending_type) {
            (true, None) => Err(SceneError::MissingEndingType),
            (true, Some(_)) if !self.choices.is_empty() => {
                Err(SceneError::ChoicesOnEnding(self.choices.len()))
            }
            (false, Some(ending)) => Err(SceneError::UnexpectedEndingType(ending)),
            (false, None) if self.choices.is_empty() => Err(SceneError::MissingChoices),
            _ => Ok(()),
        }
    }

    /// The scene shown when the oracle cannot be reached.
    pub fn fallback() -> Self {
        Scene::new(
            "The signal breaks up somewhere in the rain... (check your connection)\n\
             We are all in the rain. We are all breathing.",
            vec![Choice::new("Reconnect").with_impact("retry")],
        )
        .with_thoughts(["signal...", "disconnected", "still", "the rain...", "can't hear", "who is speaking?"])
        .with_mood(Mood::Calm)
    }
}
