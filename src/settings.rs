use std::path::PathBuf;
use std::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{ApnexusError, Result};
use crate::oracle::{Disambiguator, HttpDisambiguator, OfflineDisambiguator};
use crate::thresholds::{EvaluatorConfig, ThresholdSettings};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub thresholds: ThresholdSettings,
    #[serde(default)]
    pub oracle: OracleSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            company_name: String::new(),
            thresholds: ThresholdSettings::default(),
            oracle: OracleSettings::default(),
        }
    }
}

impl Settings {
    pub fn evaluator_config(&self) -> Result<EvaluatorConfig> {
        EvaluatorConfig::from_settings(&self.thresholds)
    }

    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("apnexus.db")
    }
}

/// Where the disambiguation service lives. No endpoint means offline: every
/// multi-candidate match takes the closest-odometer fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleSettings {
    pub endpoint: Option<String>,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: "gpt-4o-mini".to_string(),
            api_key_env: "APNEXUS_ORACLE_KEY".to_string(),
            timeout_secs: 5,
        }
    }
}

const MAX_ORACLE_TIMEOUT_SECS: u64 = 30;

impl OracleSettings {
    pub fn disambiguator(&self) -> Result<Box<dyn Disambiguator>> {
        if self.timeout_secs == 0 || self.timeout_secs > MAX_ORACLE_TIMEOUT_SECS {
            return Err(ApnexusError::Config(format!(
                "oracle timeout_secs must be within 1..={MAX_ORACLE_TIMEOUT_SECS}, got {}",
                self.timeout_secs
            )));
        }
        let Some(endpoint) = self.endpoint.as_deref().filter(|e| !e.trim().is_empty()) else {
            info!("no disambiguation endpoint configured, running offline");
            return Ok(Box::new(OfflineDisambiguator));
        };
        let api_key = std::env::var(&self.api_key_env).ok().filter(|k| !k.is_empty());
        if api_key.is_none() {
            warn!("{} is not set, calling {endpoint} without credentials", self.api_key_env);
        }
        Ok(Box::new(HttpDisambiguator::new(
            endpoint,
            &self.model,
            api_key,
            Duration::from_secs(self.timeout_secs),
        )))
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("apnexus")
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("apnexus")
}

/// Missing file means defaults; an unreadable or invalid file is an error so
/// a broken threshold never silently reverts.
pub fn load_settings() -> Result<Settings> {
    let path = settings_path();
    if !path.exists() {
        return Ok(Settings::default());
    }
    let content = std::fs::read_to_string(&path)?;
    serde_json::from_str(&content)
        .map_err(|e| ApnexusError::Settings(format!("{}: {e}", path.display())))
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| ApnexusError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}
