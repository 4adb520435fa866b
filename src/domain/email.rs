use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

pub type ThreadId = String;

pub const CONTENT_TYPE_PDF: &str = "application/pdf";
pub const CONTENT_TYPE_MARKDOWN: &str = "text/markdown";
pub const CONTENT_TYPE_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    New,
    Reply,
    Forward,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::New => "new",
            MessageKind::Reply => "reply",
            MessageKind::Forward => "forward",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A generated file attached to one or more messages.
///
/// Forwards share their parent's attachments through `Arc`; export makes the
/// per-message copies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub id: Uuid,
    pub filename: String,
    pub filepath: PathBuf,
    pub content_type: String,
}

impl Attachment {
    pub fn new(
        id: Uuid,
        filename: impl Into<String>,
        filepath: impl Into<PathBuf>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            id,
            filename: filename.into(),
            filepath: filepath.into(),
            content_type: content_type.into(),
        }
    }

    /// Content type guessed from the file extension.
    pub fn content_type_for(filename: &str) -> &'static str {
        let lower = filename.to_lowercase();
        if lower.ends_with(".pdf") {
            CONTENT_TYPE_PDF
        } else if lower.ends_with(".md") {
            CONTENT_TYPE_MARKDOWN
        } else {
            CONTENT_TYPE_DOCX
        }
    }
}

#[derive(Debug, Clone)]
pub struct Message {
    pub id: Uuid,
    pub message_id: String,
    pub thread_id: ThreadId,
    pub parent_id: Option<String>,

    pub sender: String,
    pub recipients: Vec<String>,
    pub cc: Vec<String>,

    pub subject: String,
    pub body: String,
    pub date: NaiveDateTime,
    pub kind: MessageKind,

    pub references: Vec<String>,
    pub attachments: Vec<Arc<Attachment>>,
}

impl Message {
    pub fn add_attachment(&mut self, attachment: Arc<Attachment>) {
        self.attachments.push(attachment);
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} -> {} | {} ({})",
            self.date.format("%Y-%m-%d %H:%M"),
            self.sender,
            self.recipients.join(", "),
            self.subject,
            self.kind
        )
    }
}
