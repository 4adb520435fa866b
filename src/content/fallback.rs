//! Template text used whenever no provider is configured or a provider call
//! comes back empty.

use rand::Rng;
use rand::seq::SliceRandom;

use crate::roster::names::{FIRST_NAMES, LAST_NAMES};

const WORDS: &[&str] = &[
    "account", "action", "agenda", "align", "analysis", "approach", "approval", "budget",
    "call", "change", "client", "contract", "cost", "customer", "data", "deadline",
    "decision", "delivery", "design", "detail", "draft", "estimate", "feedback", "figure",
    "final", "follow", "forecast", "goal", "growth", "issue", "item", "launch",
    "list", "meeting", "metric", "milestone", "month", "note", "offer", "option",
    "order", "owner", "partner", "plan", "point", "policy", "priority", "process",
    "product", "progress", "project", "proposal", "quarter", "question", "report", "request",
    "review", "revenue", "risk", "schedule", "scope", "service", "share", "sign",
    "staff", "status", "step", "summary", "support", "system", "target", "task",
    "team", "timeline", "update", "vendor", "week", "work", "confirm", "discuss",
    "prepare", "send", "check", "expect", "include", "consider", "need", "should",
    "will", "our", "their", "next", "current", "new", "open", "early", "late",
];

const SUBJECT_OPENERS: &[&str] = &[
    "Regarding",
    "Update on",
    "Question about",
    "Notes for",
    "Discussion:",
];

/// A sentence of roughly `words` words, capitalised and ending with a period.
pub fn sentence<R: Rng + ?Sized>(rng: &mut R, words: usize) -> String {
    let n = words.max(1);
    let picked: Vec<&str> = (0..n)
        .map(|_| *WORDS.choose(rng).unwrap_or(&"update"))
        .collect();
    let first = capitalize(picked[0]);
    let rest = picked[1..].join(" ");
    if rest.is_empty() {
        format!("{first}.")
    } else {
        format!("{first} {rest}.")
    }
}

/// `sentences` sentences of 4-12 words each.
pub fn paragraph<R: Rng + ?Sized>(rng: &mut R, sentences: usize) -> String {
    (0..sentences.max(1))
        .map(|_| {
            let n = rng.gen_range(4..=12);
            sentence(rng, n)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn person_name<R: Rng + ?Sized>(rng: &mut R) -> String {
    let first = FIRST_NAMES.choose(rng).unwrap_or(&"Alex");
    let last = LAST_NAMES.choose(rng).unwrap_or(&"Reed");
    format!("{first} {last}")
}

/// Subject and body for a thread-starting email.
pub fn root_email<R: Rng + ?Sized>(rng: &mut R, topic: Option<&str>) -> (String, String) {
    match topic {
        Some(topic) => {
            let opener = SUBJECT_OPENERS.choose(rng).unwrap_or(&"Regarding");
            let subject = format!("{opener} {topic}");
            let body = format!(
                "Hi all,\n\nI wanted to discuss {topic}.\n\n{}",
                paragraph(rng, 5)
            );
            (subject, body)
        }
        None => {
            let subject = sentence(rng, 4).trim_end_matches('.').to_string();
            (subject, paragraph(rng, 5))
        }
    }
}

pub fn reply_body<R: Rng + ?Sized>(rng: &mut R, topic: Option<&str>) -> String {
    let mut body = paragraph(rng, 3);
    if let Some(topic) = topic
        && rng.gen_bool(0.2)
    {
        body.push_str(&format!("\n\nRegarding the {topic} aspect, I agree."));
    }
    body
}

pub fn forward_body<R: Rng + ?Sized>(rng: &mut R, topic: Option<&str>) -> String {
    let body = "FYI.".to_string();
    match topic {
        Some(topic) if rng.gen_bool(0.3) => {
            format!("Thought you should see this regarding {topic}.\n\n{body}")
        }
        _ => body,
    }
}

/// Markdown-structured document body.
pub fn document<R: Rng + ?Sized>(rng: &mut R, topic: Option<&str>) -> String {
    let Some(topic) = topic else {
        return format!(
            "## Business Document\n\n{}\n\n## Key Points\n\n- {}\n- {}\n- {}\n\n## Summary\n\n{}",
            paragraph(rng, 4),
            sentence(rng, 8),
            sentence(rng, 8),
            sentence(rng, 8),
            paragraph(rng, 3)
        );
    };

    match rng.gen_range(0..4) {
        0 => format!(
            "## Overview\n\n{}\n\n## Key Points\n\n- {}\n- {}\n- {}\n\n## Details\n\n{}",
            paragraph(rng, 4),
            sentence(rng, 8),
            sentence(rng, 8),
            sentence(rng, 8),
            paragraph(rng, 6)
        ),
        1 => format!(
            "## Executive Summary\n\n{}\n\n## Analysis of {topic}\n\n{}\n\n### Findings\n\n\
             1. {}\n2. {}\n3. {}\n\n## Conclusion\n\n{}",
            paragraph(rng, 5),
            paragraph(rng, 4),
            sentence(rng, 8),
            sentence(rng, 8),
            sentence(rng, 8),
            paragraph(rng, 3)
        ),
        2 => format!(
            "## {topic} Discussion Notes\n\n**Attendees:** {}, {}, {}\n\n### Agenda Items\n\n\
             - {}\n- {}\n\n### Action Items\n\n1. {}\n2. {}\n\n## Summary\n\n{}",
            person_name(rng),
            person_name(rng),
            person_name(rng),
            sentence(rng, 8),
            sentence(rng, 8),
            sentence(rng, 8),
            sentence(rng, 8),
            paragraph(rng, 4)
        ),
        _ => format!(
            "## Proposal: {topic}\n\n### Background\n\n{}\n\n### Recommendations\n\n\
             - **Option A:** {}\n- **Option B:** {}\n\n### Next Steps\n\n{}",
            paragraph(rng, 4),
            sentence(rng, 8),
            sentence(rng, 8),
            paragraph(rng, 3)
        ),
    }
}

pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
        None => String::new(),
    }
}
