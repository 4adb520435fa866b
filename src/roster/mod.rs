pub(crate) mod names;

use anyhow::{Result, anyhow};
use log::info;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::domain::persona::Persona;

pub use names::DEPARTMENTS;

/// A synthetic company and its staff, stored as pretty JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    pub company_name: String,
    pub domain: String,
    pub employees: Vec<Persona>,
}

impl Roster {
    pub fn new(company_name: impl Into<String>) -> Self {
        let company_name = company_name.into();
        let domain = domain_for(&company_name);
        Self {
            company_name,
            domain,
            employees: Vec::new(),
        }
    }

    /// Company with a random name.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::new(company_name(rng))
    }

    /// Replace the staff with `count` freshly generated employees.
    pub fn generate<R: Rng + ?Sized>(&mut self, rng: &mut R, count: usize) -> &[Persona] {
        self.employees.clear();
        let mut taken: HashSet<String> = HashSet::new();

        for _ in 0..count {
            let first = names::FIRST_NAMES.choose(rng).unwrap_or(&"Alex");
            let last = names::LAST_NAMES.choose(rng).unwrap_or(&"Smith");
            let base = format!("{}.{}", first.to_lowercase(), last.to_lowercase());

            // keep emails unique so each persona stays addressable
            let mut local = base.clone();
            let mut n = 2;
            while taken.contains(&local) {
                local = format!("{base}{n}");
                n += 1;
            }
            taken.insert(local.clone());

            let (dept, titles) = DEPARTMENTS.choose(rng).copied().unwrap_or(DEPARTMENTS[0]);
            let title = titles.choose(rng).unwrap_or(&"Employee");

            self.employees.push(Persona::new(
                format!("{first} {last}"),
                format!("{local}@{}", self.domain),
                *title,
                dept,
            ));
        }
        &self.employees
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let s = serde_json::to_string_pretty(self)?;
        fs::write(path, s)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let s = fs::read_to_string(path)
            .map_err(|e| anyhow!("could not read roster {}: {e}", path.display()))?;
        let roster: Roster = serde_json::from_str(&s)?;
        Ok(roster)
    }

    /// Load the roster at `path`, or generate `count` employees and save them there.
    pub fn load_or_generate<R: Rng + ?Sized>(path: &Path, rng: &mut R, count: usize) -> Result<Self> {
        if path.exists() {
            info!("Loading roster from {}...", path.display());
            return Self::load(path);
        }

        info!("Generating new roster...");
        let mut roster = Self::random(rng);
        roster.generate(rng, count);
        roster.save(path)?;
        info!(
            "Saved roster for {} with {} employees to {}",
            roster.company_name,
            roster.employees.len(),
            path.display()
        );
        Ok(roster)
    }
}

/// Lowercased company name without spaces or commas, plus `.com`.
pub fn domain_for(company_name: &str) -> String {
    let cleaned: String = company_name
        .to_lowercase()
        .chars()
        .filter(|c| *c != ' ' && *c != ',')
        .collect();
    format!("{cleaned}.com")
}

fn company_name<R: Rng + ?Sized>(rng: &mut R) -> String {
    let word = names::COMPANY_WORDS.choose(rng).unwrap_or(&"Summit");
    let suffix = names::COMPANY_SUFFIXES.choose(rng).unwrap_or(&"Group");
    if *suffix == "LLC" || *suffix == "Inc" || *suffix == "Ltd" {
        format!("{word}, {suffix}")
    } else {
        format!("{word} {suffix}")
    }
}
