//! Chat-completions judge client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

use super::error::JudgeError;
use super::prompt::VerdictPrompt;
use super::types::{ChatMessage, ChatRequest, ChatResponse};
use crate::comparator::{Comparator, ComparatorError};
use crate::tournament::GroupKey;

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "openai/gpt-5-mini";

const API_KEY_ENV: &str = "ARENA_API_KEY";
const BASE_URL_ENV: &str = "ARENA_BASE_URL";
const MODEL_ENV: &str = "ARENA_MODEL";

const BODY_EXCERPT_LEN: usize = 300;

/// Configuration for [`ChatJudge`].
#[derive(Debug, Clone)]
pub struct JudgeConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub prompt: VerdictPrompt,
    /// Verdicts should be reproducible; zero by default.
    pub temperature: f64,
    /// The verdict is a single token; a small ceiling keeps misbehaving
    /// models from billing a paragraph.
    pub max_tokens: u32,
    pub request_timeout: Duration,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            prompt: VerdictPrompt::default(),
            temperature: 0.0,
            max_tokens: 16,
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl JudgeConfig {
    /// Read `ARENA_API_KEY` (required) plus optional `ARENA_BASE_URL` and
    /// `ARENA_MODEL` overrides.
    pub fn from_env() -> Result<Self, JudgeError> {
        let api_key = std::env::var(API_KEY_ENV)
            .map_err(|_| JudgeError::Config(format!("{API_KEY_ENV} is not set")))?;
        let mut config = JudgeConfig {
            api_key,
            ..JudgeConfig::default()
        };
        if let Ok(base_url) = std::env::var(BASE_URL_ENV) {
            config.base_url = base_url;
        }
        if let Ok(model) = std::env::var(MODEL_ENV) {
            config.model = model;
        }
        Ok(config)
    }
}

/// Pairwise judge speaking the OpenAI chat-completions wire format.
///
/// One API call per comparison, no internal retry: the tournament's
/// wrapper owns the retry budget, so a transport or API failure maps
/// straight to a [`ComparatorError`].
pub struct ChatJudge {
    http: reqwest::Client,
    config: JudgeConfig,
}

impl ChatJudge {
    pub fn from_env() -> Result<Self, JudgeError> {
        Self::with_config(JudgeConfig::from_env()?)
    }

    pub fn with_config(config: JudgeConfig) -> Result<Self, JudgeError> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|e| JudgeError::Config(format!("api key not header-safe: {e}")))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .default_headers(headers)
            .build()?;
        Ok(Self { http, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// One completions call; returns the raw assistant text.
    pub async fn complete_verdict(&self, first: &str, second: &str) -> Result<String, JudgeError> {
        let request = ChatRequest::new(
            &self.config.model,
            vec![
                ChatMessage::system(self.config.prompt.system()),
                ChatMessage::user(self.config.prompt.user(first, second)),
            ],
        )
        .temperature(self.config.temperature)
        .max_tokens(self.config.max_tokens);

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let response = self.http.post(&url).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(JudgeError::Api {
                status: status.as_u16(),
                body: excerpt(&body),
            });
        }

        let decoded: ChatResponse = response.json().await?;
        decoded
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| JudgeError::EmptyCompletion {
                model: self.config.model.clone(),
            })
    }
}

#[async_trait]
impl<I> Comparator<I> for ChatJudge
where
    I: AsRef<str> + Send + Sync,
{
    async fn judge(
        &self,
        _group: GroupKey,
        first: &I,
        second: &I,
    ) -> Result<String, ComparatorError> {
        self.complete_verdict(first.as_ref(), second.as_ref())
            .await
            .map_err(ComparatorError::from)
    }
}

fn excerpt(body: &str) -> String {
    body.trim().chars().take(BODY_EXCERPT_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_config_rejects_unsafe_api_key() {
        let config = JudgeConfig {
            api_key: "line\nbreak".to_string(),
            ..JudgeConfig::default()
        };
        assert!(matches!(
            ChatJudge::with_config(config),
            Err(JudgeError::Config(_))
        ));
    }

    #[test]
    fn test_excerpt_bounds_error_bodies() {
        let long = "e".repeat(10_000);
        assert_eq!(excerpt(&long).chars().count(), 300);
    }
}
