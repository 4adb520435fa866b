use anyhow::{Result, anyhow};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use rs_mail_synth::config::{Config, config_path, load_config, write_template};
use rs_mail_synth::content::ProviderKind;
use rs_mail_synth::engine::ActionWeights;
use rs_mail_synth::package::{PackageSettings, default_package_path, package_run};
use rs_mail_synth::pipeline::{self, run_rng};
use rs_mail_synth::roster::Roster;

#[derive(Parser)]
#[command(name = "rs_mail_synth")]
#[command(about = "Synthetic email thread generator", long_about = None)]
struct Cli {
    /// Config file (defaults to the per-user config when it exists)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Simulate threads and export the inclusive emails
    Generate(GenerateArgs),

    /// Generate a roster and save it as JSON
    Roster {
        #[arg(long, default_value_t = 25)]
        count: usize,

        #[arg(long, default_value = "roster.json")]
        out: PathBuf,

        /// Company name (random when omitted)
        #[arg(long)]
        company: Option<String>,

        #[arg(long)]
        seed: Option<u64>,
    },

    /// Combine an exported run folder into one PDF, Bates stamped by default
    Package(PackageArgs),

    /// Write a config file with every default filled in
    InitConfig {
        /// Where to write it (defaults to the per-user config path)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[derive(Args)]
struct GenerateArgs {
    /// Number of inclusive emails to produce
    #[arg(long, default_value_t = 5)]
    files: usize,

    #[arg(long)]
    output: Option<PathBuf>,

    #[arg(long)]
    topic: Option<String>,

    /// Percentage of exported emails that get an attachment
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=100))]
    attachments: Option<u32>,

    #[arg(long)]
    roster: Option<PathBuf>,

    #[arg(long, value_enum)]
    provider: Option<ProviderKind>,

    /// Shorthand for --provider gemini
    #[arg(long)]
    gemini: bool,

    #[arg(long)]
    model: Option<String>,

    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=100))]
    reply_pct: Option<u32>,

    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=100))]
    forward_pct: Option<u32>,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    max_per_thread: Option<usize>,

    /// Chance (0-1) that a thread stops early after its second message
    #[arg(long)]
    early_end: Option<f64>,

    /// Also build the combined PDF for the run
    #[arg(long)]
    package: bool,
}

#[derive(Args)]
struct PackageArgs {
    /// Run folder holding the numbered export files
    dir: PathBuf,

    /// Output file (defaults to <dir>/<folder>_combined.pdf)
    #[arg(long)]
    out: Option<PathBuf>,

    #[arg(long)]
    prefix: Option<String>,

    #[arg(long)]
    separator: Option<String>,

    #[arg(long)]
    start: Option<u64>,

    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=20))]
    padding: Option<u8>,

    /// Skip Bates numbering
    #[arg(long)]
    no_bates: bool,
}

impl PackageArgs {
    fn apply(&self, settings: &mut PackageSettings) {
        if let Some(prefix) = &self.prefix {
            settings.prefix = prefix.clone();
        }
        if let Some(separator) = &self.separator {
            settings.separator = separator.clone();
        }
        if let Some(start) = self.start {
            settings.start = start;
        }
        if let Some(padding) = self.padding {
            settings.padding = usize::from(padding);
        }
        if self.no_bates {
            settings.bates = false;
        }
    }
}

impl GenerateArgs {
    /// Layer the flags that were given over `cfg`.
    fn apply(&self, cfg: &mut Config) {
        if let Some(output) = &self.output {
            cfg.output_dir = output.clone();
        }
        if self.topic.is_some() {
            cfg.topic = self.topic.clone();
        }
        if let Some(pct) = self.attachments {
            cfg.attachment_percent = pct;
        }
        if let Some(roster) = &self.roster {
            cfg.roster_path = roster.clone();
        }
        match (self.provider, self.gemini) {
            (Some(kind), _) => cfg.provider = kind,
            (None, true) => cfg.provider = ProviderKind::Gemini,
            (None, false) => {}
        }
        if let Some(model) = &self.model {
            cfg.model = model.clone();
        }
        if self.reply_pct.is_some() || self.forward_pct.is_some() {
            let current = cfg.simulation.weights;
            let reply = self
                .reply_pct
                .unwrap_or((current.reply * 100.0).round() as u32);
            let forward = self
                .forward_pct
                .unwrap_or((current.forward * 100.0).round() as u32);
            cfg.simulation.weights = ActionWeights::from_percentages(reply, forward);
        }
        if self.seed.is_some() {
            cfg.seed = self.seed;
        }
        if let Some(max) = self.max_per_thread {
            cfg.simulation.max_emails_per_thread = max;
        }
        if let Some(chance) = self.early_end {
            cfg.simulation.early_end_chance = chance;
        }
        if self.package {
            cfg.package.enabled = true;
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::Generate(args) => {
            let mut cfg =
                load_config(cli.config.as_deref()).map_err(|e| anyhow!("Configuration error: {e}"))?;
            args.apply(&mut cfg);
            cfg.validate()
                .map_err(|e| anyhow!("Configuration error: {e}"))?;

            let summary = pipeline::run(&cfg, args.files)?;
            println!(
                "Wrote {} inclusive emails ({} total, {} attachments) to {}",
                summary.inclusive,
                summary.total_messages,
                summary.attachments,
                summary.run_dir.display()
            );
            if let Some(pkg) = &summary.package {
                println!("Combined PDF: {} ({} pages)", pkg.path.display(), pkg.pages);
            }
            Ok(())
        }

        Command::Package(args) => {
            let cfg =
                load_config(cli.config.as_deref()).map_err(|e| anyhow!("Configuration error: {e}"))?;
            let mut settings = cfg.package;
            args.apply(&mut settings);

            let out = args
                .out
                .clone()
                .unwrap_or_else(|| default_package_path(&args.dir));
            let summary = package_run(&args.dir, &out, &settings)?;
            match &summary.bates_range {
                Some((first, last)) => println!(
                    "Created {} ({} pages, {first} to {last})",
                    summary.path.display(),
                    summary.pages
                ),
                None => println!("Created {} ({} pages)", summary.path.display(), summary.pages),
            }
            Ok(())
        }

        Command::Roster {
            count,
            out,
            company,
            seed,
        } => {
            let mut rng = run_rng(seed);
            let mut roster = match company {
                Some(name) => Roster::new(name),
                None => Roster::random(&mut rng),
            };
            roster.generate(&mut rng, count);
            roster.save(&out)?;
            println!(
                "Saved roster for {} with {} employees to {}",
                roster.company_name,
                roster.employees.len(),
                out.display()
            );
            Ok(())
        }

        Command::InitConfig { path } => {
            let path = match path.or(cli.config) {
                Some(p) => p,
                None => config_path()?,
            };
            write_template(&path)?;
            println!("Created config at {}", path.display());
            Ok(())
        }
    }
}
