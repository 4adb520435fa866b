//! End-to-end generation run: roster, provider, simulation, attachments, export.

use anyhow::Result;
use chrono::{Local, NaiveDateTime};
use log::{info, warn};
use rand::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Config;
use crate::content::{ContentProvider, build_provider};
use crate::documents::DocumentGenerator;
use crate::domain::email::Message;
use crate::engine::ThreadSimulator;
use crate::export;
use crate::package::{self, PackageSummary, default_package_path};
use crate::roster::Roster;

/// Characters of the email body handed to the document prompt.
const DOCUMENT_CONTEXT_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub run_dir: PathBuf,
    pub total_messages: usize,
    pub inclusive: usize,
    pub attachments: usize,
    /// Exported email files in index order.
    pub files: Vec<PathBuf>,
    /// Combined PDF, when packaging is enabled.
    pub package: Option<PackageSummary>,
}

/// RNG for a run: seeded when the config says so, entropy otherwise.
pub fn run_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Generate `target` inclusive emails as configured.
pub fn run(cfg: &Config, target: usize) -> Result<RunSummary> {
    cfg.validate()?;
    let mut rng = run_rng(cfg.seed);

    let roster = Roster::load_or_generate(&cfg.roster_path, &mut rng, cfg.roster_size)?;
    let provider = build_provider(cfg.provider, &cfg.model, cfg.request_timeout())?;
    if provider.is_none() {
        info!("No LLM provider selected, using template text");
    }

    generate(cfg, target, &roster, provider, &mut rng, None)
}

/// Simulate and export with an already prepared roster and provider.
///
/// `start` fixes the virtual clock; `None` starts thirty days before now.
pub fn generate(
    cfg: &Config,
    target: usize,
    roster: &Roster,
    provider: Option<Arc<dyn ContentProvider>>,
    rng: &mut StdRng,
    start: Option<NaiveDateTime>,
) -> Result<RunSummary> {
    let topic = cfg.topic.as_deref().filter(|t| !t.trim().is_empty());

    let run_dir = cfg
        .output_dir
        .join(export::run_folder_name(topic, Local::now().naive_local()));
    fs::create_dir_all(&run_dir)?;
    export::clean_numbered_files(&run_dir)?;
    info!("Output folder: {}", run_dir.display());

    let mut sim = ThreadSimulator::new(roster.employees.clone(), cfg.simulation.clone())?
        .with_topic(topic.map(str::to_string))
        .with_provider(provider.clone())
        .with_seed(rng.r#gen());
    if let Some(start) = start {
        sim = sim.with_start_date(start);
    }

    info!("Generating {target} inclusive email threads...");
    info!("Attachment rate: {}%", cfg.attachment_percent);
    if let Some(topic) = topic {
        info!("Topic: {topic}");
    }

    sim.simulate(target)?;
    let messages = sim.into_messages();
    let total_messages = messages.len();
    info!("Generated {total_messages} emails.");

    let mut inclusive = inclusive_of(messages);
    export::sort_inclusive(&mut inclusive);
    info!("Inclusive (leaf) emails: {}", inclusive.len());

    let docs = DocumentGenerator::new(&run_dir, topic.map(str::to_string), provider);
    let attach_chance = f64::from(cfg.attachment_percent) / 100.0;
    let mut scratch: HashSet<PathBuf> = HashSet::new();
    let mut attachments = 0;
    let mut files = Vec::with_capacity(inclusive.len());

    info!("Saving {} inclusive emails...", inclusive.len());
    let count = inclusive.len();
    for (i, message) in inclusive.iter_mut().enumerate() {
        let index = i + 1;
        info!("[{index}/{count}] Processing email: {}", message.subject);

        if rng.gen_bool(attach_chance) {
            let doc_type = DocumentGenerator::random_doc_type(rng);
            info!("  Generating attachment (type: {doc_type})...");
            let context: String = message.body.chars().take(DOCUMENT_CONTEXT_CHARS).collect();
            match docs.generate_random_file(rng, doc_type, Some(&context)) {
                Ok(att) => {
                    info!("  Attachment generated: {}", att.filepath.display());
                    message.add_attachment(Arc::new(att));
                    attachments += 1;
                }
                Err(e) => warn!("  Could not generate attachment: {e:#}"),
            }
        }

        scratch.extend(message.attachments.iter().map(|a| a.filepath.clone()));

        let path = export::save_as_markdown(message, &run_dir, index)?;
        info!("Saved: {}", path.display());
        files.push(path);
    }

    for path in &scratch {
        if path.exists()
            && let Err(e) = fs::remove_file(path)
        {
            warn!("Could not remove original attachment {}: {e}", path.display());
        }
    }

    let package = if cfg.package.enabled {
        let out = default_package_path(&run_dir);
        Some(package::package_run(&run_dir, &out, &cfg.package)?)
    } else {
        None
    };

    Ok(RunSummary {
        run_dir,
        total_messages,
        inclusive: count,
        attachments,
        files,
        package,
    })
}

/// Messages no other message names as parent.
fn inclusive_of(messages: Vec<Message>) -> Vec<Message> {
    let parents: HashSet<String> = messages
        .iter()
        .filter_map(|m| m.parent_id.clone())
        .collect();
    messages
        .into_iter()
        .filter(|m| !parents.contains(&m.message_id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::persona::Persona;
    use chrono::NaiveDate;

    fn roster() -> Roster {
        let mut r = Roster::new("Acme Corp");
        for (i, name) in ["Ann Lee", "Bo Chen", "Cy Diaz", "Di Park", "Ed Moss"]
            .iter()
            .enumerate()
        {
            r.employees.push(Persona::new(
                *name,
                format!("user{i}@acmecorp.com"),
                "Analyst",
                "Finance",
            ));
        }
        r
    }

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 8)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_inclusive_of() {
        let cfg = Config::default();
        let mut sim = ThreadSimulator::new(roster().employees, cfg.simulation)
            .unwrap()
            .with_seed(5);
        sim.simulate(6).unwrap();
        let expected = sim.inclusive_count();
        assert_eq!(inclusive_of(sim.into_messages()).len(), expected);
    }

    #[test]
    fn test_run_rng_is_seeded() {
        let a: u64 = run_rng(Some(3)).r#gen();
        let b: u64 = run_rng(Some(3)).r#gen();
        assert_eq!(a, b);
    }

    #[test]
    fn test_generate_without_attachments() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config {
            output_dir: dir.path().to_path_buf(),
            topic: Some("Vendor audit findings".into()),
            attachment_percent: 0,
            ..Default::default()
        };
        let mut rng = run_rng(Some(11));

        let summary = generate(&cfg, 4, &roster(), None, &mut rng, Some(start())).unwrap();
        assert_eq!(summary.run_dir, dir.path().join("vendor_audit"));
        assert!(summary.inclusive >= 4);
        assert_eq!(summary.files.len(), summary.inclusive);
        assert_eq!(summary.attachments, 0);
        assert!(summary.total_messages >= summary.inclusive);
        assert!(summary.package.is_none());

        for (i, f) in summary.files.iter().enumerate() {
            let name = f.file_name().unwrap().to_string_lossy().into_owned();
            assert!(name.starts_with(&format!("{:04}a_", i + 1)), "{name}");
        }
    }
}
