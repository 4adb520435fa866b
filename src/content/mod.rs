pub mod error;
pub mod fallback;
pub mod gemini;
pub mod openrouter;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::persona::Persona;

pub use error::ProviderError;
pub use gemini::GeminiProvider;
pub use openrouter::OpenRouterProvider;

/// Source of generated prose.
///
/// Implementations must never fail past this boundary: any transport or parse
/// problem collapses to `None` and callers fall back to templates.
pub trait ContentProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Free-form completion for an arbitrary prompt.
    fn complete(&self, prompt: &str) -> Option<String>;

    fn generate_email(&self, prompt: &EmailPrompt<'_>) -> Option<GeneratedEmail> {
        let text = self.complete(&prompt.render())?;
        parse_subject_body(&text)
    }
}

#[derive(Debug, Clone)]
pub struct EmailPrompt<'a> {
    pub sender: &'a Persona,
    pub recipients: &'a [Persona],
    pub topic: &'a str,
    /// Body of the message being replied to or forwarded.
    pub context: Option<&'a str>,
    pub used_subjects: &'a [String],
}

impl EmailPrompt<'_> {
    pub fn render(&self) -> String {
        let names: Vec<&str> = self.recipients.iter().map(|r| r.name.as_str()).collect();
        let mut prompt = format!(
            "Generate a professional email.\n\
             Sender: {} ({} in {})\n\
             Recipients: {}\n\
             Topic: {}\n",
            self.sender.name,
            self.sender.title,
            self.sender.department,
            names.join(", "),
            self.topic
        );
        if let Some(ctx) = self.context {
            prompt.push_str("\nContext/Previous Thread:\n");
            prompt.push_str(ctx);
            prompt.push('\n');
        }
        if !self.used_subjects.is_empty() {
            prompt.push_str("\nDo not reuse any of these subjects:\n");
            for s in self.used_subjects {
                prompt.push_str("- ");
                prompt.push_str(s);
                prompt.push('\n');
            }
        }
        prompt.push_str("\n\nPlease provide the email in the following format:\nSubject: [Subject]\n\n[Body]");
        prompt
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedEmail {
    pub subject: Option<String>,
    pub body: String,
}

impl GeneratedEmail {
    /// True when there is a body worth using.
    pub fn has_body(&self) -> bool {
        !self.body.trim().is_empty()
    }
}

/// Decode a raw provider response body.
pub(crate) fn parse_response(text: &str) -> Result<Value, ProviderError> {
    Ok(serde_json::from_str(text)?)
}

/// Split a completion into subject and body.
///
/// The first line starting with `subject:` (any case) supplies the subject and
/// everything after it the body. Without such a line the subject is
/// "No Subject" and the whole text is the body.
pub fn parse_subject_body(text: &str) -> Option<GeneratedEmail> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let lines: Vec<&str> = trimmed.lines().collect();
    for (i, line) in lines.iter().enumerate() {
        if line.to_lowercase().starts_with("subject:") {
            let subject = line.get("subject:".len()..).unwrap_or("").trim().to_string();
            let body = lines[i + 1..].join("\n").trim().to_string();
            return Some(GeneratedEmail {
                subject: Some(subject),
                body,
            });
        }
    }

    Some(GeneratedEmail {
        subject: Some("No Subject".to_string()),
        body: text.to_string(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    None,
    Gemini,
    Openrouter,
}

/// Build the configured provider. `None` means template text only.
pub fn build_provider(
    kind: ProviderKind,
    model: &str,
    timeout: Duration,
) -> Result<Option<Arc<dyn ContentProvider>>> {
    match kind {
        ProviderKind::None => Ok(None),
        ProviderKind::Gemini => {
            let key = std::env::var(gemini::API_KEY_VAR)
                .map_err(|_| ProviderError::MissingApiKey(gemini::API_KEY_VAR))?;
            log::info!("Initializing Gemini provider with model: {model}");
            Ok(Some(Arc::new(GeminiProvider::new(key, model, timeout)?)))
        }
        ProviderKind::Openrouter => {
            let key = std::env::var(openrouter::API_KEY_VAR)
                .map_err(|_| ProviderError::MissingApiKey(openrouter::API_KEY_VAR))?;
            log::info!("Initializing OpenRouter provider with model: {model}");
            Ok(Some(Arc::new(OpenRouterProvider::new(key, model, timeout)?)))
        }
    }
}
