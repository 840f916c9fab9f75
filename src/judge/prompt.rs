//! Verdict prompt rendering.
//!
//! The system message pins the judging contract (answer with exactly one
//! accepted token); the user message carries the caller's rubric and the
//! two items, XML-escaped inside tags so item text cannot masquerade as
//! instructions.

/// Rubric used when the caller supplies none.
pub const DEFAULT_INSTRUCTIONS: &str =
    "Decide which of the two items is stronger overall for the stated purpose.";

const SYSTEM_PROMPT: &str = "You are an impartial pairwise judge. Compare the two items \
against the instructions and answer with exactly one token: \"One\" if the first item \
wins, \"Two\" if the second item wins, or \"Neither\" if you cannot decide. Output \
nothing else.";

/// Builds the system/user message pair for one comparison.
#[derive(Debug, Clone)]
pub struct VerdictPrompt {
    /// Caller-supplied rubric describing what "stronger" means here.
    pub instructions: String,
}

impl Default for VerdictPrompt {
    fn default() -> Self {
        Self {
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
        }
    }
}

impl VerdictPrompt {
    pub fn new(instructions: impl Into<String>) -> Self {
        Self {
            instructions: instructions.into(),
        }
    }

    pub fn system(&self) -> &'static str {
        SYSTEM_PROMPT
    }

    pub fn user(&self, first: &str, second: &str) -> String {
        format!(
            "{}\n\n<item_one>\n{}\n</item_one>\n\n<item_two>\n{}\n</item_two>",
            self.instructions,
            escape_xml_chars(first),
            escape_xml_chars(second),
        )
    }
}

fn escape_xml_chars(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
