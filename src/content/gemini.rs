use anyhow::Result;
use log::{debug, warn};
use serde_json::{Value, json};
use std::time::Duration;

use super::{ContentProvider, parse_response};
use super::error::ProviderError;

pub const API_KEY_VAR: &str = "GEMINI_API_KEY";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// `generateContent` client for the Gemini API.
pub struct GeminiProvider {
    http: reqwest::blocking::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiProvider {
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
            "contents": [{ "parts": [{ "text": prompt }] }],
        });

        debug!("Sending request to Gemini (model {})", self.model);

        let response = self
            .http
            .post(format!(
                "{}/models/{}:generateContent",
                self.base_url, self.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()?;

        let status = response.status();
        let response_body = parse_response(&response.text()?)?;

        if !status.is_success() {
            let message = response_body
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .unwrap_or("Unknown error")
                .to_string();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        extract_text(&response_body).ok_or(ProviderError::EmptyResponse)
    }
}

/// Concatenated text parts of the first candidate.
pub(crate) fn extract_text(body: &Value) -> Option<String> {
    let parts = body
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();
    if text.trim().is_empty() { None } else { Some(text) }
}

impl ContentProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn complete(&self, prompt: &str) -> Option<String> {
        match self.request(prompt) {
            Ok(text) => Some(text),
            Err(e) => {
                warn!("Error generating content with Gemini: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_joins_parts() {
        let body = json!({
            "candidates": [{ "content": { "parts": [{ "text": "Subject: A\n" }, { "text": "Body" }] } }]
        });
        assert_eq!(extract_text(&body).as_deref(), Some("Subject: A\nBody"));
    }

    #[test]
    fn test_extract_missing_candidates() {
        assert!(extract_text(&json!({ "promptFeedback": {} })).is_none());
    }
}
