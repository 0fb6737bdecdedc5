use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{EngineError, Result};
use crate::history::DEFAULT_HISTORY_LIMIT;
use crate::registry::{ModelProfile, ModelRegistry};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringSettings {
    /// Fixed seed for the random source; unset means fresh entropy per call.
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub endpoint: String,
    pub timeout_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8000".to_string(),
            timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub limit: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub scoring: ScoringSettings,
    pub models: BTreeMap<String, ModelProfile>,
    pub batch: BatchConfig,
    pub store: StoreConfig,
    pub history: HistoryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scoring: ScoringSettings::default(),
            models: ModelRegistry::default_table(),
            batch: BatchConfig::default(),
            store: StoreConfig::default(),
            history: HistoryConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn load(path: Option<PathBuf>) -> Result<(Self, Option<PathBuf>)> {
        let config_path = path.or_else(default_config_path);
        let mut config = match config_path.as_ref() {
            Some(path) if path.exists() => {
                let contents = std::fs::read_to_string(path)
                    .map_err(|err| EngineError::Config(format!("failed to read config: {}", err)))?;
                Self::from_toml(&contents)?
            }
            _ => EngineConfig::default(),
        };

        config.apply_env_overrides();
        Ok((config, config_path))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|err| EngineError::Config(format!("failed to parse config: {}", err)))
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|err| EngineError::Config(format!("failed to create config dir: {}", err)))?;
        }
        let payload = toml::to_string_pretty(self)
            .map_err(|err| EngineError::Config(format!("failed to serialize config: {}", err)))?;
        std::fs::write(path, payload)
            .map_err(|err| EngineError::Config(format!("failed to write config: {}", err)))?;
        Ok(())
    }

    /// Validates the model table; fails if any model is missing or unknown.
    pub fn registry(&self) -> Result<ModelRegistry> {
        ModelRegistry::from_table(&self.models)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(seed) = env::var("TRENDIFY_SEED") {
            if let Ok(value) = seed.parse::<u64>() {
                self.scoring.seed = Some(value);
            }
        }
        if let Ok(endpoint) = env::var("BATCH_ENDPOINT") {
            if !endpoint.trim().is_empty() {
                self.batch.endpoint = endpoint;
            }
        }
        if let Ok(timeout) = env::var("BATCH_TIMEOUT_MS") {
            if let Ok(value) = timeout.parse::<u64>() {
                self.batch.timeout_ms = value;
            }
        }
        if let Ok(dir) = env::var("TRENDIFY_DATA_DIR") {
            if !dir.trim().is_empty() {
                self.store.data_dir = PathBuf::from(dir);
            }
        }
        if let Ok(limit) = env::var("HISTORY_LIMIT") {
            if let Ok(value) = limit.parse::<usize>() {
                self.history.limit = value;
            }
        }
    }
}

fn default_config_path() -> Option<PathBuf> {
    env::var("TRENDIFY_CONFIG_PATH")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
        .or_else(|| Some(PathBuf::from("config/trendify.toml")))
}
