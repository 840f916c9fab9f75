//! Judge adapter errors.

use thiserror::Error;

use crate::comparator::ComparatorError;

#[derive(Debug, Error)]
pub enum JudgeError {
    /// Transport-level failure from the HTTP client.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    /// Non-success status from the completions endpoint.
    #[error("judge endpoint returned {status}: {body}")]
    Api { status: u16, body: String },
    /// The response decoded but carried no usable assistant text.
    #[error("judge response from model {model} had no content")]
    EmptyCompletion { model: String },
    /// Required configuration was missing or malformed.
    #[error("judge config error: {0}")]
    Config(String),
}

impl From<JudgeError> for ComparatorError {
    fn from(error: JudgeError) -> Self {
        ComparatorError::msg(error.to_string())
    }
}
