use anyhow::Result;
use docx_rs::{
    AbstractNumbering, Docx, IndentLevel, Level, LevelJc, LevelText, NumberFormat, Numbering,
    NumberingId, Paragraph, Run, Start, Style, StyleType,
};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};
use std::fs::{self, File};
use std::path::Path;

use crate::domain::email::{CONTENT_TYPE_DOCX, CONTENT_TYPE_MARKDOWN, CONTENT_TYPE_PDF};
use crate::export::strip_markdown;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

/// Turns document text into a file on disk.
pub trait DocumentRenderer {
    /// File extension without the dot.
    fn extension(&self) -> &'static str;
    fn content_type(&self) -> &'static str;

    /// Chance that a generated file is laid out in landscape.
    fn landscape_chance(&self) -> f64 {
        0.0
    }

    fn render(&self, title: &str, content: &str, orientation: Orientation, path: &Path) -> Result<()>;
}

pub struct MarkdownRenderer;

impl DocumentRenderer for MarkdownRenderer {
    fn extension(&self) -> &'static str {
        "md"
    }

    fn content_type(&self) -> &'static str {
        CONTENT_TYPE_MARKDOWN
    }

    fn render(&self, title: &str, content: &str, _orientation: Orientation, path: &Path) -> Result<()> {
        let heading = title.replace('_', " ");
        fs::write(path, format!("# {heading}\n\n{}\n", content.trim_end()))?;
        Ok(())
    }
}

/// A run of text in one of the two Helvetica weights.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub bold: bool,
}

/// One line of a PDF page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Line(pub Vec<Span>);

impl Line {
    pub fn plain(text: impl Into<String>) -> Self {
        Line(vec![Span {
            text: text.into(),
            bold: false,
        }])
    }

    pub fn bold(text: impl Into<String>) -> Self {
        Line(vec![Span {
            text: text.into(),
            bold: true,
        }])
    }

    pub fn blank() -> Self {
        Line::default()
    }

    pub fn text(&self) -> String {
        self.0.iter().map(|s| s.text.as_str()).collect()
    }
}

/// Letter-size Helvetica PDF. Markdown markers are flattened to plain text.
pub struct PdfRenderer {
    font_size: f32,
    wrap_at: usize,
}

impl Default for PdfRenderer {
    fn default() -> Self {
        Self {
            font_size: 11.0,
            wrap_at: 90,
        }
    }
}

pub const PAGE_WIDTH: f32 = 612.0;
pub const PAGE_HEIGHT: f32 = 792.0;
const MARGIN: f32 = 72.0;

impl PdfRenderer {
    pub fn wrap_at(&self) -> usize {
        self.wrap_at
    }

    fn leading(&self) -> f32 {
        self.font_size * 1.4
    }

    fn lines_per_page(&self) -> usize {
        ((PAGE_HEIGHT - 2.0 * MARGIN) / self.leading()).floor() as usize
    }

    /// Bold title, then the content with headings unmarked and long lines wrapped.
    pub fn layout(&self, title: &str, content: &str) -> Vec<Line> {
        let mut out = vec![Line::bold(title.replace('_', " ")), Line::blank()];
        out.extend(self.text_lines(&strip_markdown(content)));
        out
    }

    /// Plain wrapped lines for already flattened text.
    pub fn text_lines(&self, text: &str) -> Vec<Line> {
        let mut out = Vec::new();
        for raw in text.lines() {
            let line = raw.trim_start_matches('#').trim();
            if line.is_empty() {
                out.push(Line::blank());
                continue;
            }
            out.extend(wrap(line, self.wrap_at).into_iter().map(Line::plain));
        }
        out
    }

    /// Paginate `lines` into a standalone document.
    pub fn document(&self, lines: &[Line]) -> Result<Document> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let regular = doc.add_object(helvetica("Helvetica"));
        let bold = doc.add_object(helvetica("Helvetica-Bold"));
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => regular, "F2" => bold },
        });

        let mut kids: Vec<Object> = Vec::new();
        let chunks: Vec<&[Line]> = if lines.is_empty() {
            vec![lines]
        } else {
            lines.chunks(self.lines_per_page().max(1)).collect()
        };
        for page in chunks {
            let contents_id = doc.add_object(Stream::new(dictionary! {}, self.page_content(page)?));
            let page_id: ObjectId = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), Object::Real(PAGE_WIDTH), Object::Real(PAGE_HEIGHT)],
                "Resources" => resources_id,
                "Contents" => contents_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        Ok(doc)
    }

    fn page_content(&self, lines: &[Line]) -> Result<Vec<u8>> {
        let mut ops = vec![
            Operation::new("BT", vec![]),
            Operation::new("TL", vec![Object::Real(self.leading())]),
            Operation::new(
                "Td",
                vec![Object::Real(MARGIN), Object::Real(PAGE_HEIGHT - MARGIN)],
            ),
        ];
        for line in lines {
            ops.push(Operation::new("T*", vec![]));
            for span in &line.0 {
                let font = if span.bold { "F2" } else { "F1" };
                ops.push(Operation::new(
                    "Tf",
                    vec![font.into(), Object::Real(self.font_size)],
                ));
                ops.push(Operation::new(
                    "Tj",
                    vec![Object::string_literal(win_ansi(&span.text))],
                ));
            }
        }
        ops.push(Operation::new("ET", vec![]));
        Ok(Content { operations: ops }.encode()?)
    }

    pub fn to_bytes(&self, title: &str, content: &str) -> Result<Vec<u8>> {
        let mut doc = self.document(&self.layout(title, content))?;
        let mut buf = Vec::new();
        doc.save_to(&mut buf)?;
        Ok(buf)
    }
}

impl DocumentRenderer for PdfRenderer {
    fn extension(&self) -> &'static str {
        "pdf"
    }

    fn content_type(&self) -> &'static str {
        CONTENT_TYPE_PDF
    }

    fn render(&self, title: &str, content: &str, _orientation: Orientation, path: &Path) -> Result<()> {
        fs::write(path, self.to_bytes(title, content)?)?;
        Ok(())
    }
}

pub(crate) fn helvetica(base: &str) -> lopdf::Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => Object::Name(base.as_bytes().to_vec()),
        "Encoding" => "WinAnsiEncoding",
    }
}

pub(crate) fn wrap(line: &str, width: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    for word in line.split_whitespace() {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > width {
            out.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

/// Encode for the standard fonts' WinAnsiEncoding. Latin-1 maps straight
/// through, common typographic marks use the 0x80-0x9F slots, anything
/// else becomes '?'.
pub(crate) fn win_ansi(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| match c {
            '\t' => b' ',
            c if c.is_ascii() && !c.is_ascii_control() => c as u8,
            '\u{a0}'..='\u{ff}' => c as u32 as u8,
            '\u{20ac}' => 0x80,
            '\u{2026}' => 0x85,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201c}' => 0x93,
            '\u{201d}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{2122}' => 0x99,
            _ => b'?',
        })
        .collect()
}

const TWIPS_LETTER_WIDTH: u32 = 12240;
const TWIPS_LETTER_HEIGHT: u32 = 15840;
const BULLET_NUMBERING: usize = 1;
const DECIMAL_NUMBERING: usize = 2;

/// Word document with a title heading, section headings, lists and bold runs.
pub struct DocxRenderer {
    landscape_chance: f64,
}

impl Default for DocxRenderer {
    fn default() -> Self {
        Self {
            landscape_chance: 0.25,
        }
    }
}

impl DocxRenderer {
    pub fn build(&self, title: &str, content: &str, orientation: Orientation) -> Docx {
        let mut docx = Docx::new()
            .add_style(heading_style("Title", "Title", 52))
            .add_style(heading_style("Heading1", "Heading 1", 32))
            .add_style(heading_style("Heading2", "Heading 2", 26))
            .add_abstract_numbering(list_numbering(BULLET_NUMBERING, "bullet", "\u{2022}"))
            .add_numbering(Numbering::new(BULLET_NUMBERING, BULLET_NUMBERING))
            .add_abstract_numbering(list_numbering(DECIMAL_NUMBERING, "decimal", "%1."))
            .add_numbering(Numbering::new(DECIMAL_NUMBERING, DECIMAL_NUMBERING));

        if orientation == Orientation::Landscape {
            docx = docx.page_size(TWIPS_LETTER_HEIGHT, TWIPS_LETTER_WIDTH);
        }

        let heading = title.replace('_', " ");
        docx = docx.add_paragraph(
            Paragraph::new()
                .style("Title")
                .add_run(Run::new().add_text(heading.trim())),
        );

        for raw in content.lines() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            let paragraph = if let Some(h) = line.strip_prefix("### ") {
                Paragraph::new()
                    .style("Heading2")
                    .add_run(Run::new().add_text(h.trim_matches(|c| c == '#' || c == ' ')))
            } else if let Some(h) = line.strip_prefix("## ").or_else(|| line.strip_prefix("# ")) {
                Paragraph::new()
                    .style("Heading1")
                    .add_run(Run::new().add_text(h.trim_matches(|c| c == '#' || c == ' ')))
            } else if let Some(item) = bullet_item(line) {
                add_runs(Paragraph::new(), item)
                    .numbering(NumberingId::new(BULLET_NUMBERING), IndentLevel::new(0))
            } else if let Some(item) = numbered_item(line) {
                add_runs(Paragraph::new(), item)
                    .numbering(NumberingId::new(DECIMAL_NUMBERING), IndentLevel::new(0))
            } else {
                add_runs(Paragraph::new(), line)
            };
            docx = docx.add_paragraph(paragraph);
        }
        docx
    }
}

impl DocumentRenderer for DocxRenderer {
    fn extension(&self) -> &'static str {
        "docx"
    }

    fn content_type(&self) -> &'static str {
        CONTENT_TYPE_DOCX
    }

    fn landscape_chance(&self) -> f64 {
        self.landscape_chance
    }

    fn render(&self, title: &str, content: &str, orientation: Orientation, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        self.build(title, content, orientation).build().pack(file)?;
        Ok(())
    }
}

fn heading_style(id: &str, name: &str, half_points: usize) -> Style {
    Style::new(id, StyleType::Paragraph)
        .name(name)
        .size(half_points)
        .bold()
}

fn list_numbering(id: usize, format: &str, text: &str) -> AbstractNumbering {
    AbstractNumbering::new(id).add_level(Level::new(
        0,
        Start::new(1),
        NumberFormat::new(format),
        LevelText::new(text),
        LevelJc::new("left"),
    ))
}

fn bullet_item(line: &str) -> Option<&str> {
    let rest = line.strip_prefix('-').or_else(|| line.strip_prefix('*'))?;
    if rest.starts_with(char::is_whitespace) {
        Some(rest.trim_start())
    } else {
        None
    }
}

fn numbered_item(line: &str) -> Option<&str> {
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let rest = line[digits..].strip_prefix('.')?;
    if rest.starts_with(char::is_whitespace) {
        Some(rest.trim_start())
    } else {
        None
    }
}

/// Split `**bold**` markers into bold and regular runs.
fn add_runs(mut paragraph: Paragraph, text: &str) -> Paragraph {
    for (part, bold) in bold_parts(text) {
        let run = Run::new().add_text(part);
        paragraph = paragraph.add_run(if bold { run.bold() } else { run });
    }
    paragraph
}

fn bold_parts(text: &str) -> Vec<(&str, bool)> {
    let mut parts = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find("**") {
        let after = &rest[open + 2..];
        let Some(close) = after.find("**").filter(|&c| c > 0) else {
            break;
        };
        if open > 0 {
            parts.push((&rest[..open], false));
        }
        parts.push((&after[..close], true));
        rest = &after[close + 2..];
    }
    if !rest.is_empty() {
        parts.push((rest, false));
    }
    parts
}
