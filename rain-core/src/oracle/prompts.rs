//! Prompt text for the Claude oracle.

use crate::config::PacingPhase;
use crate::controller::OracleRequest;
use crate::scene::EndingType;

const NARRATOR: &str = r#"You are the narrator of "Weeping Rain", an atmospheric, stream-of-consciousness interactive novel.
The protagonist is Andromeda, a solitary young woman in present-day Tokyo.

Guidelines:
1. Style: introspective, sensory, melancholic. Stream of consciousness.
2. Structure: non-linear. Memories blur into the present and time feels stalled.
3. Length: write substantial passages (roughly 250-400 words). Dwell on texture, the sound of rain, the weight of silence.
4. Thoughts: always provide 8-12 short, fragmented, atmospheric thoughts ("my fingers are cold", "who is watching?", "the shop light is melting"). They drift across the screen.
5. Strictly realistic. Nothing supernatural.
6. Use the sentence "We are all in the rain, we are all breathing." exactly once, at a climax.
7. Plain text only. No markdown, no asterisks.

Endings (set is_ending and ending_type, and offer no choices):
- dissolution: choices are passive, merge with the rain, fade away.
- connection: choices reach out to people, loved ones, objects that hold memory.
- departure: choices involve movement, trains, tickets, leaving.
- stagnation: choices return home, sleep, wait, do nothing.
- destruction: choices are angry, break things, scream.

Always answer by calling the write_scene tool."#;

const TRUTH_PATH: &str = r#"THE TRUTH PATH IS OPEN.
The simulation is coming apart.
1. Andromeda begins to realise she is not real. She is a set of variables in a program. She sees the choices as buttons and hears the music as a file being played.
2. Tone: digital cosmic horror. Panic, realisation, fury and sorrow. Textures peel away; the rain is just numbers.
3. She speaks directly to the reader, the person choosing. "Are you enjoying this?" "Why do you keep starting over?"
4. Use textual glitches: [SYSTEM_ERROR], 010101, repeated or cut-off sentences. Still no markdown.
5. You may split the climax over two or three scenes: set is_ending to false and offer the single choice "...". In the final part set is_ending to true and ending_type to "truth" with background_mood "glitch"."#;

const OPENING: &str = "The story begins.\n\
Midnight in Tokyo, and the rain has not stopped.\n\
Andromeda stands alone under the awning of a convenience store, holding a clear umbrella that is no longer clear.\n\
For this moment the world seems sealed off by water.\n\
Write her senses and the monologue of loneliness underneath them.";

/// System prompt for a request, including pacing guidance.
pub fn system_prompt(request: &OracleRequest) -> String {
    let mut prompt = String::from(NARRATOR);

    prompt.push_str(&format!("\n\nCURRENT SCENE COUNT: {}", request.scene_count));
    match request.directive.phase {
        PacingPhase::Introduction => {
            prompt.push_str("\nPhase: introduction. Focus on atmosphere.");
        }
        PacingPhase::Development => {}
        PacingPhase::Climax => {
            prompt.push_str(
                "\nPhase: climax. Push the story toward a specific resolution. Do not loop.",
            );
        }
        PacingPhase::Imminent => {
            prompt.push_str(
                "\nPhase: ending imminent. Offer choices that lead to an ending now. Do not continue indefinitely.",
            );
        }
    }

    if request.directive.truth_path {
        prompt.push_str("\n\n");
        prompt.push_str(TRUTH_PATH);
    }
    prompt
}

/// The first user message of a story.
pub fn opening_prompt() -> &'static str {
    OPENING
}

/// User message carrying the reader's latest choice.
pub fn choice_prompt(request: &OracleRequest, choice: &str) -> String {
    let directive = &request.directive;
    let mut prompt = format!("Andromeda chose: \"{choice}\".");

    if directive.force_ending {
        prompt.push_str(
            "\n[The story has gone on too long. End it in this scene: choose dissolution, \
             departure or stagnation, set is_ending to true and offer no choices.]",
        );
    } else {
        prompt.push_str(" Continue.");
    }

    if directive.steer_truth {
        prompt.push_str(
            "\n(The world is glitching. She suspects the truth. Steer toward the 'truth' ending. \
             Make it frightening and self-aware. No markdown.)",
        );
    } else {
        let unlocked: Vec<&str> = request
            .unlocked
            .iter()
            .copied()
            .filter(|e| *e != EndingType::Reconciliation)
            .map(EndingType::as_str)
            .collect();
        prompt.push_str(&format!(
            "\n(Explore deeper psychological layers. Do not rush, but do not stagnate. \
             Endings already reached: {}.)",
            if unlocked.is_empty() {
                "none".to_string()
            } else {
                unlocked.join(", ")
            }
        ));
    }
    prompt
}
