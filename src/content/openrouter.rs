use anyhow::Result;
use log::{debug, warn};
use serde_json::{Value, json};
use std::time::Duration;

use super::{ContentProvider, parse_response};
use super::error::ProviderError;

pub const API_KEY_VAR: &str = "OPENROUTER_API_KEY";
const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Chat-completions client for OpenRouter.
pub struct OpenRouterProvider {
    http: reqwest::blocking::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenRouterProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Result<Self> {
        Self::with_base_url(api_key, model, DEFAULT_BASE_URL, timeout)
    }

    pub fn with_base_url(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::blocking::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into(),
        })
    }

    fn request(&self, prompt: &str) -> Result<String, ProviderError> {
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
        });

        debug!("Sending request to OpenRouter (model {})", self.model);

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()?;

        let status = response.status();
        let response_body = parse_response(&response.text()?)?;

        if !status.is_success() {
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: error_message(&response_body),
            });
        }

        extract_text(&response_body).ok_or(ProviderError::EmptyResponse)
    }
}

fn error_message(body: &Value) -> String {
    body.get("error")
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .unwrap_or("Unknown error")
        .to_string()
}

/// `choices[0].message.content`, if non-blank.
pub(crate) fn extract_text(body: &Value) -> Option<String> {
    let text = body
        .get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()?;
    if text.trim().is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

impl ContentProvider for OpenRouterProvider {
    fn name(&self) -> &str {
        "openrouter"
    }

    fn complete(&self, prompt: &str) -> Option<String> {
        match self.request(prompt) {
            Ok(text) => Some(text),
            Err(e) => {
                warn!("Error generating content with OpenRouter: {e}");
                None
            }
        }
    }
}
