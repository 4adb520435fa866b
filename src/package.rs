//! One PDF per run: every numbered export file in order, optionally Bates stamped.
//!
//! Emails start on a fresh page with their headers restated; PDF attachments
//! are merged page for page; DOCX attachments are re-typeset from their
//! paragraph text.

use anyhow::{Result, anyhow};
use docx_rs::{DocumentChild, Docx, ParagraphChild, RunChild};
use log::{info, warn};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::documents::render::{Line, PdfRenderer, Span, helvetica, win_ansi, wrap};
use crate::export::{is_numbered_file, strip_markdown};

const BATES_FONT: &str = "FBates";
const BATES_FONT_SIZE: i64 = 10;
const BATES_X: i64 = 450;
const BATES_Y: i64 = 30;

/// Deepest page tree walked when looking up inherited page attributes.
const MAX_TREE_DEPTH: usize = 32;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct PackageSettings {
    /// Build the combined PDF after every generate run.
    pub enabled: bool,
    pub bates: bool,
    pub prefix: String,
    pub separator: String,
    pub start: u64,
    /// Zero padding of the page number.
    pub padding: usize,
}

impl Default for PackageSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            bates: true,
            prefix: "BATES".to_string(),
            separator: "-".to_string(),
            start: 1,
            padding: 7,
        }
    }
}

impl PackageSettings {
    /// Bates number of the page at zero-based `index`.
    pub fn label(&self, index: usize) -> String {
        format!(
            "{}{}{:0width$}",
            self.prefix,
            self.separator,
            self.start + index as u64,
            width = self.padding
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSummary {
    pub path: PathBuf,
    pub files: usize,
    pub pages: usize,
    /// First and last Bates numbers, when stamped.
    pub bates_range: Option<(String, String)>,
}

/// `{folder}_combined.pdf` inside the run folder.
pub fn default_package_path(run_dir: &Path) -> PathBuf {
    let folder = run_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "run".to_string());
    run_dir.join(format!("{folder}_combined.pdf"))
}

/// Combine the numbered files in `run_dir` into `out`.
pub fn package_run(run_dir: &Path, out: &Path, settings: &PackageSettings) -> Result<PackageSummary> {
    let mut names: Vec<String> = fs::read_dir(run_dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| is_numbered_file(n))
        .collect();
    names.sort();
    if names.is_empty() {
        return Err(anyhow!("no numbered files in {}", run_dir.display()));
    }

    let renderer = PdfRenderer::default();
    let mut docs = Vec::with_capacity(names.len());
    for name in &names {
        info!("Adding {name}");
        docs.push(convert_file(&renderer, &run_dir.join(name))?);
    }

    let mut combined = merge(docs)?;
    let pages = combined.get_pages().len();

    let bates_range = if settings.bates {
        let labels = stamp(&mut combined, settings)?;
        labels.first().cloned().zip(labels.last().cloned())
    } else {
        None
    };

    if let Some(parent) = out.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    combined.save(out)?;

    match &bates_range {
        Some((first, last)) => info!(
            "Created combined PDF {} ({pages} pages, {first} to {last})",
            out.display()
        ),
        None => info!("Created combined PDF {} ({pages} pages)", out.display()),
    }

    Ok(PackageSummary {
        path: out.to_path_buf(),
        files: names.len(),
        pages,
        bates_range,
    })
}

fn convert_file(renderer: &PdfRenderer, path: &Path) -> Result<Document> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = name.rsplit('.').next().unwrap_or("").to_lowercase();
    let is_email = name.as_bytes().get(4) == Some(&b'a');

    match ext.as_str() {
        "md" if is_email => {
            let text = fs::read_to_string(path)?;
            renderer.document(&email_lines(renderer, &text))
        }
        "md" => {
            let text = fs::read_to_string(path)?;
            renderer.document(&renderer.layout(&attachment_title(&name), &text))
        }
        "pdf" => match Document::load(path) {
            Ok(doc) => Ok(doc),
            Err(e) => {
                warn!("Could not read PDF {name}: {e}");
                renderer.document(&[Line::plain(format!("[Error reading PDF {name}: {e}]"))])
            }
        },
        "docx" => {
            let lines = match fs::read(path)
                .map_err(anyhow::Error::from)
                .and_then(|bytes| docx_rs::read_docx(&bytes).map_err(|e| anyhow!("{e}")))
            {
                Ok(docx) => docx_lines(renderer, &attachment_title(&name), &docx),
                Err(e) => {
                    warn!("Could not read DOCX {name}: {e}");
                    vec![Line::plain(format!("[Error reading docx {name}: {e}]"))]
                }
            };
            renderer.document(&lines)
        }
        _ => renderer.document(&[Line::plain(format!("[Attachment: {name}]"))]),
    }
}

/// Stem after the `NNNNb_` prefix with underscores as spaces.
fn attachment_title(name: &str) -> String {
    let stem = name.rsplit_once('.').map(|(s, _)| s).unwrap_or(name);
    let stem = stem.get(6..).unwrap_or(stem);
    stem.replace('_', " ")
}

/// Header block of an exported email followed by its body.
fn email_lines(renderer: &PdfRenderer, text: &str) -> Vec<Line> {
    let mut from = None;
    let mut date = None;
    let mut to = None;
    let mut cc = None;
    let mut subject = None;
    let mut attachments = None;

    let mut lines = text.lines();
    for line in lines.by_ref() {
        if line.trim() == "---" {
            break;
        }
        let field = |label: &str| line.strip_prefix(&format!("**{label}:** ")).map(str::to_string);
        if let Some(v) = field("From") {
            from = Some(v);
        } else if let Some(v) = field("Date") {
            date = Some(v);
        } else if let Some(v) = field("To") {
            to = Some(v);
        } else if let Some(v) = field("Cc") {
            cc = Some(v);
        } else if let Some(v) = field("Subject") {
            subject = Some(v);
        } else if let Some(v) = field("Attachments") {
            attachments = Some(v);
        }
    }
    let body: Vec<&str> = lines.collect();

    let mut headers = vec![
        ("From:", from.unwrap_or_else(|| "(Unknown Sender)".into())),
        ("Sent:", date.unwrap_or_else(|| "(Unknown Date)".into())),
        ("To:", to.unwrap_or_else(|| "(Unknown Recipient)".into())),
    ];
    if let Some(cc) = cc {
        headers.push(("Cc:", cc));
    }
    headers.push(("Subject:", subject.unwrap_or_else(|| "(No Subject)".into())));
    if let Some(att) = attachments {
        headers.push(("Attachments:", att));
    }

    let mut out = Vec::new();
    for (label, value) in headers {
        let width = renderer.wrap_at().saturating_sub(label.len() + 1).max(10);
        let mut wrapped = wrap(&value, width).into_iter();
        let first = wrapped.next().unwrap_or_default();
        out.push(Line(vec![
            Span {
                text: label.to_string(),
                bold: true,
            },
            Span {
                text: format!(" {first}"),
                bold: false,
            },
        ]));
        out.extend(wrapped.map(Line::plain));
    }
    out.push(Line::blank());
    out.extend(renderer.text_lines(&strip_markdown(body.join("\n").trim())));
    out
}

/// Non-empty paragraph texts in document order.
pub fn docx_paragraphs(docx: &Docx) -> Vec<String> {
    docx.document
        .children
        .iter()
        .filter_map(|child| match child {
            DocumentChild::Paragraph(p) => Some(
                p.children
                    .iter()
                    .filter_map(|c| match c {
                        ParagraphChild::Run(run) => Some(
                            run.children
                                .iter()
                                .filter_map(|rc| match rc {
                                    RunChild::Text(t) => Some(t.text.as_str()),
                                    _ => None,
                                })
                                .collect::<String>(),
                        ),
                        _ => None,
                    })
                    .collect::<String>(),
            ),
            _ => None,
        })
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .collect()
}

fn docx_lines(renderer: &PdfRenderer, title: &str, docx: &Docx) -> Vec<Line> {
    let mut out = vec![Line::bold(title), Line::blank()];
    for para in docx_paragraphs(docx) {
        out.extend(renderer.text_lines(&para.replace("**", "")));
    }
    out
}

/// Concatenate the pages of `docs` under a single page tree.
fn merge(docs: Vec<Document>) -> Result<Document> {
    let mut merged = Document::with_version("1.5");
    let mut next_id = 1;
    let mut page_ids: Vec<ObjectId> = Vec::new();

    for mut doc in docs {
        doc.renumber_objects_with(next_id);
        next_id = doc.max_id + 1;

        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        for &id in &pages {
            let missing = inherited_attributes(&doc, id);
            let page = doc.get_object_mut(id)?.as_dict_mut()?;
            for (key, value) in missing {
                page.set(key, value);
            }
        }

        // pages are re-parented below, so the old tree goes
        doc.objects
            .retain(|_, obj| !matches!(type_name(obj), Some(b"Catalog" | b"Pages")));
        merged.objects.extend(doc.objects);
        page_ids.extend(pages);
    }

    merged.max_id = next_id;
    let pages_id = merged.new_object_id();
    for &id in &page_ids {
        merged
            .get_object_mut(id)?
            .as_dict_mut()?
            .set("Parent", pages_id);
    }

    let count = page_ids.len() as i64;
    let kids: Vec<Object> = page_ids.into_iter().map(Object::Reference).collect();
    merged.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = merged.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    merged.trailer.set("Root", catalog_id);
    Ok(merged)
}

fn type_name(obj: &Object) -> Option<&[u8]> {
    obj.as_dict()
        .ok()
        .and_then(|d| d.get(b"Type").ok())
        .and_then(|t| t.as_name().ok())
}

/// Attributes a page inherits from its tree ancestors but does not set itself.
fn inherited_attributes(doc: &Document, page_id: ObjectId) -> Vec<(&'static str, Object)> {
    let Ok(page) = doc.get_dictionary(page_id) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for key in ["MediaBox", "CropBox", "Resources", "Rotate"] {
        if page.has(key.as_bytes()) {
            continue;
        }
        let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
        for _ in 0..MAX_TREE_DEPTH {
            let Some(node) = parent.and_then(|id| doc.get_dictionary(id).ok()) else {
                break;
            };
            if let Ok(value) = node.get(key.as_bytes()) {
                out.push((key, value.clone()));
                break;
            }
            parent = node.get(b"Parent").and_then(Object::as_reference).ok();
        }
    }
    out
}

/// Draw the Bates number on every page. Returns the labels in page order.
fn stamp(doc: &mut Document, settings: &PackageSettings) -> Result<Vec<String>> {
    let font_id = doc.add_object(helvetica("Helvetica"));
    let save_id = doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));

    let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
    let mut labels = Vec::with_capacity(pages.len());
    for (i, page_id) in pages.into_iter().enumerate() {
        let label = settings.label(i);
        let content = Content {
            operations: vec![
                Operation::new("Q", vec![]),
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec![BATES_FONT.into(), BATES_FONT_SIZE.into()]),
                Operation::new("Td", vec![BATES_X.into(), BATES_Y.into()]),
                Operation::new("Tj", vec![Object::string_literal(win_ansi(&label))]),
                Operation::new("ET", vec![]),
            ],
        };
        let stamp_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        add_font(doc, page_id, font_id)?;

        let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
        let mut contents = vec![Object::Reference(save_id)];
        match page.get(b"Contents") {
            Ok(Object::Reference(id)) => contents.push(Object::Reference(*id)),
            Ok(Object::Array(items)) => contents.extend(items.iter().cloned()),
            _ => {}
        }
        contents.push(Object::Reference(stamp_id));
        page.set("Contents", contents);
        labels.push(label);
    }
    Ok(labels)
}

/// Give the page its own resource dictionary with the stamp font added.
fn add_font(doc: &mut Document, page_id: ObjectId, font_id: ObjectId) -> Result<()> {
    let resources = doc.get_dictionary(page_id)?.get(b"Resources").ok().cloned();
    let mut resources = match resources {
        Some(Object::Reference(id)) => doc.get_dictionary(id)?.clone(),
        Some(Object::Dictionary(d)) => d,
        _ => Dictionary::new(),
    };
    let mut fonts = match resources.get(b"Font").ok().cloned() {
        Some(Object::Reference(id)) => doc.get_dictionary(id)?.clone(),
        Some(Object::Dictionary(d)) => d,
        _ => Dictionary::new(),
    };
    fonts.set(BATES_FONT, font_id);
    resources.set("Font", fonts);
    doc.get_object_mut(page_id)?
        .as_dict_mut()?
        .set("Resources", resources);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::render::{DocumentRenderer, DocxRenderer, Orientation};

    const EMAIL_ONE: &str = "**From:** Ann Lee <ann@acme.com>\n\
        **Date:** Monday, March 04, 2024 09:15 AM\n\
        **To:** Bo Chen <bo@acme.com>\n\
        **Subject:** Vendor audit kickoff\n\
        **Attachments:** 0001b_Audit_Plan.pdf\n\
        \n---\n\n\
        Hi Bo,\n\n* **Scope** first\n";

    const EMAIL_TWO: &str = "**From:** Bo Chen <bo@acme.com>\n\
        **Date:** Monday, March 04, 2024 10:02 AM\n\
        **To:** Ann Lee <ann@acme.com>\n\
        **Cc:** Cy Diaz <cy@acme.com>\n\
        **Subject:** Re: Vendor audit kickoff\n\
        \n---\n\n\
        Sounds good.\n";

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    fn page_contents(path: &Path) -> Vec<Vec<u8>> {
        let doc = Document::load(path).unwrap();
        doc.get_pages()
            .values()
            .map(|id| doc.get_page_content(*id).unwrap())
            .collect()
    }

    fn write_run(dir: &Path) {
        fs::write(dir.join("0001a_Vendor_audit_kickoff.md"), EMAIL_ONE).unwrap();
        PdfRenderer::default()
            .render(
                "Audit_Plan",
                "## Plan\n\nWeek one.",
                Orientation::Portrait,
                &dir.join("0001b_Audit_Plan.pdf"),
            )
            .unwrap();
        fs::write(dir.join("0002a_Re_Vendor_audit_kickoff.md"), EMAIL_TWO).unwrap();
        DocxRenderer::default()
            .render(
                "Vendor_List",
                "- **Northwind** Traders",
                Orientation::Portrait,
                &dir.join("0002b_Vendor_List.docx"),
            )
            .unwrap();
        fs::write(dir.join("notes.txt"), "not part of the export").unwrap();
    }

    #[test]
    fn test_label() {
        let s = PackageSettings::default();
        assert_eq!(s.label(0), "BATES-0000001");
        let custom = PackageSettings {
            prefix: "ACME".into(),
            separator: "_".into(),
            start: 120,
            padding: 4,
            ..Default::default()
        };
        assert_eq!(custom.label(5), "ACME_0125");
    }

    #[test]
    fn test_default_package_path() {
        let p = default_package_path(Path::new("/tmp/out/vendor_audit"));
        assert_eq!(p, Path::new("/tmp/out/vendor_audit/vendor_audit_combined.pdf"));
    }

    #[test]
    fn test_email_lines() {
        let lines = email_lines(&PdfRenderer::default(), EMAIL_TWO);
        let text: Vec<String> = lines.iter().map(Line::text).collect();
        assert_eq!(text[0], "From: Bo Chen <bo@acme.com>");
        assert_eq!(text[1], "Sent: Monday, March 04, 2024 10:02 AM");
        assert_eq!(text[3], "Cc: Cy Diaz <cy@acme.com>");
        assert_eq!(text[4], "Subject: Re: Vendor audit kickoff");
        assert!(lines[0].0[0].bold && !lines[0].0[1].bold);
        assert_eq!(text.last().unwrap(), "Sounds good.");

        let first = email_lines(&PdfRenderer::default(), EMAIL_ONE);
        let text: Vec<String> = first.iter().map(Line::text).collect();
        assert!(text.contains(&"Attachments: 0001b_Audit_Plan.pdf".to_string()));
        assert!(text.contains(&"\u{2022} Scope first".to_string()));
    }

    #[test]
    fn test_package_order_and_stamps() {
        let dir = tempfile::tempdir().unwrap();
        write_run(dir.path());
        let out = default_package_path(dir.path());
        let settings = PackageSettings {
            prefix: "ACME".into(),
            ..Default::default()
        };

        let summary = package_run(dir.path(), &out, &settings).unwrap();
        assert_eq!(summary.files, 4);
        assert_eq!(summary.pages, 4);
        assert_eq!(
            summary.bates_range,
            Some(("ACME-0000001".to_string(), "ACME-0000004".to_string()))
        );

        let pages = page_contents(&out);
        assert_eq!(pages.len(), 4);
        let markers: [&[u8]; 4] = [
            b"( Vendor audit kickoff)",
            b"(Audit Plan)",
            b"( Re: Vendor audit kickoff)",
            b"(Northwind Traders)",
        ];
        for (i, (page, marker)) in pages.iter().zip(markers).enumerate() {
            assert!(contains(page, marker), "page {i}");
            let label = format!("(ACME-{:07})", i + 1);
            assert!(contains(page, label.as_bytes()), "page {i}");
        }
    }

    #[test]
    fn test_package_without_stamps() {
        let dir = tempfile::tempdir().unwrap();
        write_run(dir.path());
        let out = dir.path().join("bundle/plain.pdf");
        let settings = PackageSettings {
            bates: false,
            ..Default::default()
        };

        let summary = package_run(dir.path(), &out, &settings).unwrap();
        assert_eq!(summary.bates_range, None);
        for page in page_contents(&out) {
            assert!(!contains(&page, b"BATES-"));
        }
    }

    #[test]
    fn test_package_is_repeatable() {
        let dir = tempfile::tempdir().unwrap();
        write_run(dir.path());
        let out = default_package_path(dir.path());
        let first = package_run(dir.path(), &out, &PackageSettings::default()).unwrap();
        let second = package_run(dir.path(), &out, &PackageSettings::default()).unwrap();
        assert_eq!(first.pages, second.pages);
    }

    #[test]
    fn test_empty_run_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("x.pdf");
        assert!(package_run(dir.path(), &out, &PackageSettings::default()).is_err());
    }

    #[test]
    fn test_merge_fills_inherited_attributes() {
        let mut doc = PdfRenderer::default()
            .document(&[Line::plain("inherited")])
            .unwrap();
        // move MediaBox and Resources up to the page tree node
        let page_id = *doc.get_pages().values().next().unwrap();
        let page = doc.get_object_mut(page_id).unwrap().as_dict_mut().unwrap();
        let media = page.remove(b"MediaBox").unwrap();
        let resources = page.remove(b"Resources").unwrap();
        let parent = page.get(b"Parent").unwrap().as_reference().unwrap();
        let node = doc.get_object_mut(parent).unwrap().as_dict_mut().unwrap();
        node.set("MediaBox", media);
        node.set("Resources", resources);

        let merged = merge(vec![doc]).unwrap();
        let id = *merged.get_pages().values().next().unwrap();
        let page = merged.get_dictionary(id).unwrap();
        assert!(page.has(b"MediaBox"));
        assert!(page.has(b"Resources"));
    }
}
