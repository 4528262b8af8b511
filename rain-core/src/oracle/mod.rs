//! The narrative oracle: whatever writes the next scene.
//!
//! The controller never calls an oracle itself. Hosts run an [`OracleCall`]
//! through [`generate_or_fallback`], which validates the answer against the
//! request and swaps in [`Scene::fallback`] on any failure, so the story
//! always has somewhere to go.
//!
//! [`OracleCall`]: crate::controller::OracleCall

mod anthropic;
pub mod prompts;

pub use self::anthropic::{ChoiceDraft, ClaudeOracle, WriteScene};

use crate::controller::OracleRequest;
use crate::scene::{EndingType, Scene, SceneError};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Errors from a narrative oracle.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("no narrative oracle configured - set ANTHROPIC_API_KEY")]
    Unavailable,

    #[error("Claude error: {0}")]
    Claude(#[from] claude::Error),

    #[error("malformed scene: {0}")]
    Malformed(#[from] SceneError),

    #[error("scene rejected: {0}")]
    Rejected(String),
}

/// Produces the next scene for a request.
#[async_trait]
pub trait NarrativeOracle: Send + Sync {
    async fn generate(&self, request: &OracleRequest) -> Result<Scene, OracleError>;
}

#[async_trait]
impl<O: NarrativeOracle + ?Sized> NarrativeOracle for Arc<O> {
    async fn generate(&self, request: &OracleRequest) -> Result<Scene, OracleError> {
        (**self).generate(request).await
    }
}

#[async_trait]
impl<O: NarrativeOracle + ?Sized> NarrativeOracle for Box<O> {
    async fn generate(&self, request: &OracleRequest) -> Result<Scene, OracleError> {
        (**self).generate(request).await
    }
}

/// An oracle that always fails; used when no credentials are configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableOracle;

#[async_trait]
impl NarrativeOracle for UnavailableOracle {
    async fn generate(&self, _request: &OracleRequest) -> Result<Scene, OracleError> {
        Err(OracleError::Unavailable)
    }
}

/// Check an oracle scene against the request it answers.
pub fn accept(request: &OracleRequest, scene: Scene) -> Result<Scene, OracleError> {
    scene.validate()?;
    match scene.ending_type {
        Some(EndingType::Reconciliation) => Err(OracleError::Rejected(
            "reconciliation only closes the scripted sequence".into(),
        )),
        Some(EndingType::Truth) if !request.directive.truth_path => Err(OracleError::Rejected(
            "truth ending before every normal ending is unlocked".into(),
        )),
        _ => Ok(scene),
    }
}

/// Ask `oracle` for the next scene, falling back on any failure.
pub async fn generate_or_fallback<O>(oracle: &O, request: &OracleRequest) -> Scene
where
    O: NarrativeOracle + ?Sized,
{
    let result = oracle
        .generate(request)
        .await
        .and_then(|scene| accept(request, scene));

    result.unwrap_or_else(|e| {
        warn!(error = %e, scene_count = request.scene_count, "narrative oracle failed, using fallback scene");
        Scene::fallback()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PacingPhase;
    use crate::controller::Directive;
    use crate::scene::Choice;
    use crate::testing::{FailingOracle, ScriptedOracle};
    use std::collections::BTreeSet;

    fn request(truth_path: bool) -> OracleRequest {
        OracleRequest {
            history: Vec::new(),
            last_choice: Some("Walk".into()),
            unlocked: BTreeSet::new(),
            scene_count: 3,
            directive: Directive {
                phase: PacingPhase::Introduction,
                force_ending: false,
                truth_path,
                steer_truth: false,
            },
        }
    }

    #[test]
    fn test_accept_rules() {
        let ok = Scene::new("Rain.", vec![Choice::new("Wait")]);
        assert!(accept(&request(false), ok).is_ok());

        let truth = Scene::ending("Static.", EndingType::Truth);
        assert!(matches!(
            accept(&request(false), truth.clone()),
            Err(OracleError::Rejected(_))
        ));
        assert!(accept(&request(true), truth).is_ok());

        let reconciliation = Scene::ending("White.", EndingType::Reconciliation);
        assert!(matches!(
            accept(&request(true), reconciliation),
            Err(OracleError::Rejected(_))
        ));

        let malformed = Scene::new("Rain.", vec![]);
        assert!(matches!(
            accept(&request(false), malformed),
            Err(OracleError::Malformed(SceneError::MissingChoices))
        ));
    }

    #[tokio::test]
    async fn test_failure_falls_back() {
        let scene = generate_or_fallback(&FailingOracle, &request(false)).await;
        assert_eq!(scene, Scene::fallback());

        let scene = generate_or_fallback(&UnavailableOracle, &request(false)).await;
        assert!(!scene.is_ending);
        assert_eq!(scene.choices.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_shape_falls_back() {
        let oracle = ScriptedOracle::new(vec![Scene::new("No way out.", vec![])]);
        let scene = generate_or_fallback(&oracle, &request(false)).await;
        assert_eq!(scene, Scene::fallback());
    }
}
