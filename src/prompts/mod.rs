//! Prompts sent to the generative-AI provider
//!
//! This module owns the fixed teaching-style instruction and the way it is
//! combined with the student's first message.

pub mod tutor_prompt;

/// Builds the text of the first user content of a conversation
///
/// The tutor instruction is prepended to the student's question. Only used
/// when the conversation history is empty.
///
/// # Arguments
///
/// * `message` - The student's question (may be empty when only images were sent)
/// * `deep_thinking` - Whether deep thinking mode is on for this turn
///
/// # Examples
///
/// ```
/// use studysphere::prompts::build_first_turn_text;
///
/// let text = build_first_turn_text("What is a monad?", false);
/// assert!(text.ends_with("\n\nStudent question: What is a monad?"));
/// ```
pub fn build_first_turn_text(message: &str, deep_thinking: bool) -> String {
    format!(
        "{}\n\nStudent question: {}",
        tutor_prompt::generate_tutor_prompt(deep_thinking),
        message
    )
}
