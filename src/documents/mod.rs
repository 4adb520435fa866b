pub mod render;

use anyhow::Result;
use log::debug;
use rand::Rng;
use rand::seq::SliceRandom;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::content::{ContentProvider, fallback};
use crate::domain::email::Attachment;

pub use render::{DocumentRenderer, DocxRenderer, MarkdownRenderer, Orientation, PdfRenderer};

pub const DOC_TYPES: &[&str] = &["report", "proposal", "notes", "analysis", "summary"];

const DOCUMENT_RULES: &str = "\
CRITICAL RULES - This is a standalone business document (Word/PDF attachment), NOT AN EMAIL:
- NO email headers or metadata (no \"Date:\", \"From:\", \"To:\", \"Subject:\", \"Re:\", etc.)
- NO email greetings or signatures (\"Dear\", \"Hi\", \"Best regards\", \"Sincerely\", etc.)
- NO date headers at the top of the document
- NO \"Prepared by\" or \"Prepared for\" lines
- NO document metadata blocks
FORMAT: Start directly with the document title/heading, then the content.
Use markdown formatting for structure:
- Use ## for section headings and ### for sub-headings
- Use - or * for bullet lists
- Use 1. 2. 3. for numbered lists
- Use **bold** for key terms and emphasis
Keep it under 750 words. Write ONLY the document content.";

/// Produces attachment files for exported emails.
pub struct DocumentGenerator {
    output_dir: PathBuf,
    topic: Option<String>,
    provider: Option<Arc<dyn ContentProvider>>,
    renderers: Vec<Box<dyn DocumentRenderer>>,
}

impl DocumentGenerator {
    pub fn new(
        output_dir: impl Into<PathBuf>,
        topic: Option<String>,
        provider: Option<Arc<dyn ContentProvider>>,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            topic: topic.filter(|t| !t.trim().is_empty()),
            provider,
            renderers: vec![Box::new(PdfRenderer::default()), Box::new(DocxRenderer::default())],
        }
    }

    pub fn with_renderers(mut self, renderers: Vec<Box<dyn DocumentRenderer>>) -> Self {
        if !renderers.is_empty() {
            self.renderers = renderers;
        }
        self
    }

    /// Title_Case_Underscored file stem for a document of `doc_type`.
    pub fn generate_title(&self, doc_type: &str) -> String {
        if let Some(provider) = &self.provider {
            let prompt = format!(
                "Generate a short, professional document filename (no extension) for a {doc_type}.\n\
                 Context: {}\n\
                 Rules:\n\
                 - Use 2-5 words maximum\n\
                 - Use Title_Case_With_Underscores\n\
                 - No dates, no special characters, no spaces\n\
                 - Examples: Quarterly_Budget_Analysis, Project_Proposal, Meeting_Notes, Vendor_Agreement\n\
                 Return ONLY the filename, nothing else.",
                self.topic.as_deref().unwrap_or("general business")
            );
            if let Some(raw) = provider.complete(&prompt) {
                let title = clean_title(&raw);
                if !title.is_empty() {
                    return title;
                }
            }
        }

        fallback_title(self.topic.as_deref(), doc_type)
    }

    /// Markdown body for a document of `doc_type`.
    pub fn generate_content<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        doc_type: &str,
        context: Option<&str>,
    ) -> String {
        if let Some(provider) = &self.provider {
            let mut prompt = format!("Generate a realistic {doc_type} document");
            if let Some(topic) = &self.topic {
                prompt.push_str(&format!(" related to {topic}"));
            }
            if let Some(ctx) = context {
                prompt.push_str(&format!(". Context from related email thread: {ctx}"));
            }
            prompt.push_str(".\n");
            prompt.push_str(DOCUMENT_RULES);

            if let Some(content) = provider.complete(&prompt).filter(|c| !c.trim().is_empty()) {
                return content;
            }
        }

        fallback::document(rng, self.topic.as_deref())
    }

    /// Render a new document into the output directory and describe it as an attachment.
    pub fn generate_random_file<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        doc_type: &str,
        context: Option<&str>,
    ) -> Result<Attachment> {
        fs::create_dir_all(&self.output_dir)?;

        let idx = rng.gen_range(0..self.renderers.len());
        let renderer = &self.renderers[idx];

        let title = self.generate_title(doc_type);
        let content = self.generate_content(rng, doc_type, context);

        let orientation = if rng.gen_bool(renderer.landscape_chance().clamp(0.0, 1.0)) {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        };

        let path = unique_path(&self.output_dir, &title, renderer.extension());
        renderer.render(&title, &content, orientation, &path)?;
        debug!("Rendered {} ({})", path.display(), renderer.content_type());

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{title}.{}", renderer.extension()));
        let id = uuid::Builder::from_random_bytes(rng.r#gen()).into_uuid();

        Ok(Attachment::new(id, filename, path, renderer.content_type()))
    }

    pub fn random_doc_type<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
        DOC_TYPES.choose(rng).copied().unwrap_or("report")
    }
}

/// Strip quotes, Title_Case each word, keep only alphanumerics and underscores.
pub fn clean_title(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches(|c| c == '"' || c == '\'').trim();
    let joined = trimmed
        .replace('_', " ")
        .split_whitespace()
        .map(fallback::capitalize)
        .collect::<Vec<_>>()
        .join("_");
    joined
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect()
}

pub fn fallback_title(topic: Option<&str>, doc_type: &str) -> String {
    let doc_type = fallback::capitalize(doc_type);
    match topic {
        Some(topic) => {
            let words: Vec<String> = topic
                .split_whitespace()
                .take(3)
                .map(fallback::capitalize)
                .collect();
            let part: String = words
                .join("_")
                .chars()
                .filter(|c| c.is_alphanumeric() || *c == '_')
                .collect();
            format!("{part}_{doc_type}")
        }
        None => format!("Business_{doc_type}"),
    }
}

/// `dir/stem.ext`, or `dir/stem_N.ext` when that name is taken.
fn unique_path(dir: &Path, stem: &str, ext: &str) -> PathBuf {
    let mut path = dir.join(format!("{stem}.{ext}"));
    let mut n = 2;
    while path.exists() {
        path = dir.join(format!("{stem}_{n}.{ext}"));
        n += 1;
    }
    path
}
