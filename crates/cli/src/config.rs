//! User-level settings stored as TOML, separate from the analyzer
//! configuration that travels with the models.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

use loader::Severity;

use crate::args::ConfigCmd;
use crate::output::Format;
use crate::ui;

#[cfg(windows)]
pub fn config_dir() -> PathBuf {
    std::env::var("APPDATA")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("undisposed")
}

#[cfg(not(windows))]
pub fn config_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".config")
        .join("undisposed")
}

pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Defaults for `scan` flags that were not given on the command line.
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct ScanDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<Format>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_on: Option<Severity>,
    /// Analyzer configuration used when none is given or discovered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<PathBuf>,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache")
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Relative paths resolve against the configuration directory.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            cache_dir: default_cache_dir(),
        }
    }
}

impl CacheConfig {
    pub fn resolved_dir(&self) -> PathBuf {
        if self.cache_dir.is_relative() {
            config_dir().join(&self.cache_dir)
        } else {
            self.cache_dir.clone()
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub scan: ScanDefaults,
    #[serde(default)]
    pub cache: CacheConfig,
}

pub fn load_config() -> Result<Config> {
    let path = config_file_path();
    if path.exists() {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&content).context("failed to parse config")
    } else {
        Ok(Config::default())
    }
}

pub fn save_config(config: &Config) -> Result<()> {
    let path = config_file_path();
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    }
    let data = toml::to_string_pretty(config).context("failed to serialize config")?;
    fs::write(&path, data).with_context(|| format!("failed to write {}", path.display()))
}

pub fn handle_config(cmd: ConfigCmd) -> Result<()> {
    match cmd {
        ConfigCmd::Show => {
            let cfg = load_config()?;
            print!("{}", toml::to_string_pretty(&cfg).context("failed to serialize config")?);
        }
        ConfigCmd::Path => println!("{}", config_file_path().display()),
        ConfigCmd::Init { force } => {
            let path = config_file_path();
            if path.exists() && !force {
                bail!(
                    "{} already exists; pass --force to overwrite",
                    path.display()
                );
            }
            save_config(&Config::default())?;
            ui::print_success("CONFIG", &format!("Wrote {}", path.display()));
        }
    }
    Ok(())
}
