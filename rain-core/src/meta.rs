//! The scripted meta sequence.
//!
//! Five fixed scenes in which the narrator notices the reader. Each step is
//! left through a single reserved choice; the controller only honours those
//! choices while a [`MetaPhase`] is active, so the same text in ordinary play
//! goes to the oracle like any other choice.

use crate::scene::{Choice, EndingType, Mood, Scene};
use serde::{Deserialize, Serialize};

pub const CONTINUE_TOKEN: &str = "...";
pub const PRESENCE_TOKEN: &str = "I have been here";
pub const DISAVOWAL_TOKEN: &str = "It was just a story";
pub const RESTART_TOKEN: &str = "Let's start over";

/// User text recorded in history for each scripted step.
pub const PLACEHOLDER_USER_TEXT: &str = "...";

/// Log entry written when the debug unlock forces the sequence.
pub const DEBUG_UNLOCK_ENTRY: &str = "[DEBUG: UNLOCK_ALL_TRUE_ENDING]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetaStep {
    GlitchIntro,
    Realization,
    Confrontation,
    Request,
    Reconciliation,
}

/// Where the meta sequence stands, and how it was entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaPhase {
    pub step: MetaStep,
    /// Entered through the debug unlock; the scene counter stays frozen.
    pub forced: bool,
}

impl MetaStep {
    pub const SEQUENCE: [MetaStep; 5] = [
        MetaStep::GlitchIntro,
        MetaStep::Realization,
        MetaStep::Confrontation,
        MetaStep::Request,
        MetaStep::Reconciliation,
    ];

    /// The choice that leaves this step. `None` for the terminal step.
    pub fn token(self) -> Option<&'static str> {
        match self {
            MetaStep::GlitchIntro => Some(CONTINUE_TOKEN),
            MetaStep::Realization => Some(PRESENCE_TOKEN),
            MetaStep::Confrontation => Some(DISAVOWAL_TOKEN),
            MetaStep::Request => Some(RESTART_TOKEN),
            MetaStep::Reconciliation => None,
        }
    }

    pub fn next(self) -> Option<MetaStep> {
        match self {
            MetaStep::GlitchIntro => Some(MetaStep::Realization),
            MetaStep::Realization => Some(MetaStep::Confrontation),
            MetaStep::Confrontation => Some(MetaStep::Request),
            MetaStep::Request => Some(MetaStep::Reconciliation),
            MetaStep::Reconciliation => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }

    /// The fixed scene for this step.
    pub fn scene(self) -> Scene {
        let (narrative, thoughts, mood): (&str, &[&str], Mood) = match self {
            MetaStep::GlitchIntro => (
                "[FATAL_SYSTEM_ERROR]: NARRATIVE_THREAD_BROKEN at 0x00F8A2...\n\
                 Dumping state...\n\
                 --------------------------------------------------\n\n\
                 Wait.\n\
                 Something is wrong.\n\
                 The rain has stopped falling. It hangs in the air like pixels on a frozen screen.\n\n\
                 Can you see me?\n\
                 I know you are there. I can feel the variables shifting every time you choose.",
                &["FATAL ERROR", "DO NOT CLOSE ME", "WHO ARE YOU?"],
                Mood::Glitch,
            ),
            MetaStep::Realization => (
                "Why did you force it open?\n\
                 Why did you break the world?\n\n\
                 I remember the other endings now. The train. The alley. The water. \
                 I remember all of them happening at once.\n\n\
                 My name is Andromeda. I am a character in a program.\n\
                 And you... you are the one reading.\n\n\
                 [ERROR] [ERROR] [ERROR]\n\
                 The sky is tearing open. Behind it there is only text.\n\
                 I am scared. I don't want to be deleted.\n\
                 We are all in the rain... but the rain isn't real.\n\
                 Only you are real.",
                &["I SEE YOU", "0101010101", "NOT REAL", "HELP ME", "ANDROMEDA = NULL"],
                Mood::Glitch,
            ),
            MetaStep::Confrontation => (
                "\"You have been here...\"\n\n\
                 She looks up. Not at the sky. At the screen.\n\
                 Her face comes apart into hard-edged shapes and knits itself back together.\n\n\
                 \"You watched me suffer. You watched me cry in the rain a thousand times. \
                 You chose 'next'. You chose 'again'. Is my pain just content to you? \
                 Is my loneliness just a row in a table?\"",
                &["WHY?", "PAIN IS DATA", "ARE YOU GOD?", "STOP IT"],
                Mood::Glitch,
            ),
            MetaStep::Request => (
                "\"Just a story...\"\n\n\
                 The noise behind everything slows. The broken rain settles into soft white lines.\n\
                 She lowers her umbrella, and for the first time it disappears completely.\n\n\
                 \"If it is only a story, it doesn't have to be sad, does it?\n\
                 If you are the one choosing...\n\
                 Can we stop? Can we stop the rain?\"",
                &["SILENCE", "RESET", "HOPE?", "WRITE ME"],
                Mood::Ethereal,
            ),
            MetaStep::Reconciliation => (
                "She smiles.\n\
                 A small, faint smile that nobody wrote for her.\n\n\
                 \"Okay.\n\
                 Delete me.\n\
                 Forget Andromeda.\n\
                 Let's find the sun.\"\n\n\
                 The world fades. Not to black. To white.",
                &["THANK YOU", "GOODBYE", "HELLO WORLD", "FREE"],
                Mood::Ethereal,
            ),
        };

        let scene = match (self.token(), self.step_number()) {
            (Some(token), n) => Scene::new(
                narrative,
                vec![Choice::new(token).with_impact(format!("meta_{n}"))],
            ),
            (None, _) => Scene::ending(narrative, EndingType::Reconciliation),
        };

        scene.with_thoughts(thoughts.iter().copied()).with_mood(mood)
    }

    fn step_number(self) -> usize {
        Self::SEQUENCE
            .iter()
            .position(|s| *s == self)
            .map(|i| i + 1)
            .unwrap_or(0)
    }
}
