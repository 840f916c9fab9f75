//! LLM judge adapter.
//!
//! A [`Comparator`](crate::comparator::Comparator) implementation backed
//! by an OpenAI-compatible chat-completions endpoint: render the two
//! items into a verdict prompt, call the API once, and hand the raw
//! assistant text back to the engine. The engine owns verdict parsing and
//! retries, so this client never retries internally.

mod client;
mod error;
mod prompt;
mod types;

pub use client::{ChatJudge, JudgeConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};
pub use error::JudgeError;
pub use prompt::{VerdictPrompt, DEFAULT_INSTRUCTIONS};
pub use types::{ChatChoice, ChatMessage, ChatRequest, ChatResponse, ChoiceMessage, Role};
