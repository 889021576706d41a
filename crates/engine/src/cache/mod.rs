use blake3::Hasher;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::Finding;
use ir::ProgramModel;
use loader::AnalyzerConfig;

/// Findings of previous runs keyed by model digest.
#[derive(Default, Serialize, Deserialize)]
pub struct AnalysisCache {
    entries: HashMap<String, Vec<Finding>>,
    #[serde(default)]
    config_hash: Option<String>,
}

impl AnalysisCache {
    pub fn load(path: &Path) -> Self {
        fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string(self)?)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Vec<Finding>> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: String, findings: Vec<Finding>, config_hash: &str) {
        self.config_hash = Some(config_hash.to_owned());
        self.entries.insert(key, findings);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn config_hash(&self) -> Option<&str> {
        self.config_hash.as_deref()
    }

    /// Drops every entry computed under a different configuration.
    pub fn validate(&mut self, config_hash: &str) {
        if self.config_hash.as_deref() != Some(config_hash) {
            self.entries.clear();
            self.config_hash = Some(config_hash.to_owned());
        }
    }
}

pub fn hash_model(model: &ProgramModel) -> String {
    let mut hasher = Hasher::new();
    let bytes = serde_json::to_vec(model).unwrap_or_default();
    hasher.update(&bytes);
    hasher.finalize().to_hex().to_string()
}

/// Digest of everything in the configuration that affects findings.
pub fn hash_config(cfg: &AnalyzerConfig) -> String {
    let mut hasher = Hasher::new();
    hasher.update(env!("CARGO_PKG_VERSION").as_bytes());
    hasher.update(b"\0");
    let bytes = serde_json::to_vec(cfg).unwrap_or_default();
    hasher.update(&bytes);
    hasher.finalize().to_hex().to_string()
}
