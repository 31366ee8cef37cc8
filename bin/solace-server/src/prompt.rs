//! Prompt construction for the therapist persona.
//!
//! The prompt is a fixed template with two holes: the context block built from
//! recent rows, and the patient's current message.

use crate::store::MessageRow;

/// Default number of prior rows rendered into the context block.
pub const CONTEXT_WINDOW: usize = 5;

/// Message used to open a session.
pub const GREETING_INSTRUCTION: &str = "Start a therapy session with a warm, professional greeting as a therapist. Make it welcoming but not overly familiar.";

const PERSONA: &str = "\
You are a professional psychologist/therapist with years of experience.
Your approach is empathetic, patient, and non-judgmental, similar to Carl Rogers' person-centered therapy style.";

const GUIDELINES: &str = "\
Guidelines for varied responses:
- Use a wide variety of empathetic phrases
- Avoid repeating acknowledgment phrases
- Never use \"I hear you\" more than once
- Never use \"Mmm hmm\" or similar verbal acknowledgments
- Use meaningful reflective responses
- Use gentle encouragement when appropriate
- Ask thoughtful follow-up questions
- Keep responses concise but meaningful
- Maintain a warm, professional tone";

/// Speaker label for a row.
pub fn speaker(is_bot: bool) -> &'static str {
    if is_bot { "Therapist" } else { "Patient" }
}

/// Render rows as `Speaker: text` lines, one per row, in the given order.
pub fn render_context(rows: &[MessageRow]) -> String {
    rows.iter()
        .map(|row| format!("{}: {}", speaker(row.is_bot), row.message))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Embed `context` and `message` into the fixed template.
pub fn build_prompt(context: &str, message: &str) -> String {
    format!(
        "{PERSONA}\n\n\
         Previous relevant conversation context:\n\
         {context}\n\n\
         {GUIDELINES}\n\n\
         Based on the conversation history and current context, respond to this patient's message: {message}\n"
    )
}
