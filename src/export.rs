//! Inclusive-email export.
//!
//! Each exported email becomes `NNNNa_<subject>.md` and each of its attachments
//! `NNNNb_<name>`, so a plain lexicographic listing keeps every email directly
//! ahead of its attachments and the emails in (thread, date) order.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use log::{debug, warn};
use std::borrow::Borrow;
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::email::Message;

pub const DATE_FORMAT: &str = "%A, %B %d, %Y %I:%M %p";
const SUBJECT_MAX_LEN: usize = 40;

/// Replace everything but alphanumerics and `_` with `_`, optionally truncating.
pub fn sanitize_filename(text: &str, max_len: Option<usize>) -> String {
    let cleaned = text
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' });
    match max_len {
        Some(n) => cleaned.take(n).collect(),
        None => cleaned.collect(),
    }
}

/// Drop `**` markers and turn `* ` list items into bullets.
pub fn strip_markdown(text: &str) -> String {
    text.replace("**", "")
        .split('\n')
        .map(|line| match line.strip_prefix("* ") {
            Some(rest) => format!("\u{2022} {rest}"),
            None => line.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn safe_subject(subject: &str) -> String {
    sanitize_filename(subject, Some(SUBJECT_MAX_LEN))
}

/// First two topic words, lowercased; a timestamp when there is no topic.
pub fn run_folder_name(topic: Option<&str>, now: NaiveDateTime) -> String {
    let words: Vec<String> = topic
        .unwrap_or("")
        .split_whitespace()
        .take(2)
        .map(str::to_lowercase)
        .collect();
    if words.is_empty() {
        now.format("%Y%m%d_%H%M%S").to_string()
    } else {
        sanitize_filename(&words.join("_"), None)
    }
}

/// Matches `NNNN_` and `NNNNx_` where x is a lowercase letter.
pub fn is_numbered_file(name: &str) -> bool {
    let b = name.as_bytes();
    if b.len() < 5 || !b[..4].iter().all(u8::is_ascii_digit) {
        return false;
    }
    match b[4] {
        b'_' => true,
        c if c.is_ascii_lowercase() => b.get(5) == Some(&b'_'),
        _ => false,
    }
}

/// Remove numbered files left by an earlier run. Returns how many were removed.
pub fn clean_numbered_files(dir: &Path) -> Result<usize> {
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        if is_numbered_file(&name.to_string_lossy()) && entry.file_type()?.is_file() {
            fs::remove_file(entry.path())?;
            removed += 1;
        }
    }
    if removed > 0 {
        debug!("Removed {removed} stale files from {}", dir.display());
    }
    Ok(removed)
}

/// Order messages for export: by thread, then by date.
pub fn sort_inclusive<M: Borrow<Message>>(messages: &mut [M]) {
    messages.sort_by(|a, b| {
        let (a, b) = (a.borrow(), b.borrow());
        a.thread_id.cmp(&b.thread_id).then(a.date.cmp(&b.date))
    });
}

/// Write one email (and copies of its attachments) under `dir` using `index`.
pub fn save_as_markdown(message: &Message, dir: &Path, index: usize) -> Result<PathBuf> {
    let path = dir.join(format!("{index:04}a_{}.md", safe_subject(&message.subject)));

    let mut names = Vec::with_capacity(message.attachments.len());
    for att in &message.attachments {
        if !att.filepath.exists() {
            warn!("Attachment {} is missing, listing it by name only", att.filepath.display());
            names.push(att.filename.clone());
            continue;
        }

        let (stem, ext) = split_extension(&att.filename);
        let copy_name = format!("{index:04}b_{stem}{ext}");
        let copy_path = dir.join(&copy_name);
        if !copy_path.exists() {
            fs::copy(&att.filepath, &copy_path).with_context(|| {
                format!("copying {} to {}", att.filepath.display(), copy_path.display())
            })?;
        }
        names.push(copy_name);
    }

    let mut out = String::new();
    out.push_str(&format!("**From:** {}\n", message.sender));
    out.push_str(&format!("**Date:** {}\n", message.date.format(DATE_FORMAT)));
    out.push_str(&format!("**To:** {}\n", message.recipients.join(", ")));
    if !message.cc.is_empty() {
        out.push_str(&format!("**Cc:** {}\n", message.cc.join(", ")));
    }
    out.push_str(&format!("**Subject:** {}\n", message.subject));
    if !names.is_empty() {
        out.push_str(&format!("**Attachments:** {}\n", names.join(", ")));
    }
    out.push_str("\n---\n\n");
    out.push_str(&message.body);

    fs::write(&path, out).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

/// `("name", ".ext")`; the extension is empty when there is none.
fn split_extension(filename: &str) -> (&str, &str) {
    match filename.rfind('.') {
        Some(i) if i > 0 => filename.split_at(i),
        _ => (filename, ""),
    }
}
