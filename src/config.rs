use anyhow::{Result, anyhow};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::content::ProviderKind;
use crate::engine::SimulationSettings;
use crate::package::PackageSettings;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub output_dir: PathBuf,
    pub roster_path: PathBuf,
    /// Employees generated when `roster_path` does not exist yet.
    pub roster_size: usize,
    /// Chance, in percent, that an exported email gets a document attached.
    pub attachment_percent: u32,
    pub topic: Option<String>,
    pub seed: Option<u64>,
    pub provider: ProviderKind,
    pub model: String,
    pub request_timeout_secs: u64,
    pub simulation: SimulationSettings,
    pub package: PackageSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            roster_path: PathBuf::from("roster.json"),
            roster_size: 25,
            attachment_percent: 30,
            topic: None,
            seed: None,
            provider: ProviderKind::None,
            model: "gemini-2.5-flash".to_string(),
            request_timeout_secs: 60,
            simulation: SimulationSettings::default(),
            package: PackageSettings::default(),
        }
    }
}

impl Config {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.attachment_percent > 100 {
            return Err(anyhow!(
                "attachment_percent must be within 0..=100, got {}",
                self.attachment_percent
            ));
        }
        self.simulation.validate()?;
        if self.package.padding > 20 {
            return Err(anyhow!(
                "package.padding must be at most 20, got {}",
                self.package.padding
            ));
        }
        Ok(())
    }
}

fn config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or_else(|| anyhow!("no config dir available"))?
        .join("rs_mail_synth"))
}

pub fn config_path() -> Result<PathBuf> {
    let mut p = config_dir()?;
    p.push("config.toml");
    Ok(p)
}

/// Load `explicit` if given, else the per-user config file if it exists, else defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => match config_path() {
            Ok(p) if p.exists() => p,
            _ => {
                debug!("No config file found, using defaults");
                return Ok(Config::default());
            }
        },
    };

    let s = fs::read_to_string(&path)
        .map_err(|e| anyhow!("could not read config {}: {e}", path.display()))?;
    let cfg: Config = toml::from_str(&s)
        .map_err(|e| anyhow!("invalid config {}: {e}", path.display()))?;
    debug!("Loaded config from {}", path.display());
    Ok(cfg)
}

/// Write a config file with every default filled in.
pub fn write_template(path: &Path) -> Result<()> {
    if path.exists() {
        return Err(anyhow!("{} already exists", path.display()));
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let tom = toml::to_string_pretty(&Config::default())?;
    fs::write(path, tom)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.roster_size, 25);
        assert_eq!(cfg.attachment_percent, 30);
        assert_eq!(cfg.provider, ProviderKind::None);
        assert_eq!(cfg.request_timeout(), Duration::from_secs(60));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "topic = \"vendor audit\"\nprovider = \"openrouter\"\nseed = 7\n\n\
             [simulation]\nforward_weight = 0.3\nreply_all = false\n",
        )
        .unwrap();

        let cfg = load_config(Some(&path)).unwrap();
        assert_eq!(cfg.topic.as_deref(), Some("vendor audit"));
        assert_eq!(cfg.provider, ProviderKind::Openrouter);
        assert_eq!(cfg.seed, Some(7));
        assert_eq!(cfg.simulation.weights.forward, 0.3);
        assert_eq!(cfg.simulation.weights.reply, 0.8);
        assert!(!cfg.simulation.reply_all);
        assert_eq!(cfg.output_dir, PathBuf::from("output"));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn test_template_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf/config.toml");
        write_template(&path).unwrap();
        assert_eq!(load_config(Some(&path)).unwrap(), Config::default());
        assert!(write_template(&path).is_err());
    }

    #[test]
    fn test_package_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[package]\nenabled = true\nprefix = \"ACME\"\npadding = 5\n",
        )
        .unwrap();

        let cfg = load_config(Some(&path)).unwrap();
        assert!(cfg.package.enabled);
        assert!(cfg.package.bates);
        assert_eq!(cfg.package.label(0), "ACME-00001");
        assert!(!Config::default().package.enabled);
    }

    #[test]
    fn test_rejects_bad_percent() {
        let cfg = Config {
            attachment_percent: 150,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
