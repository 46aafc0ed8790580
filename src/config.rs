// src/config.rs
//! Application configuration loaded from a YAML file with env overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub search: SearchConfig,
    pub matching: MatchingConfig,
    pub application: ApplicationConfig,
    pub resume: ResumeConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub keywords: Vec<String>,
    pub locations: Vec<String>,
    #[serde(default = "default_max_postings")]
    pub max_postings: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Minimum compatibility score for creating an application.
    #[serde(default = "default_threshold")]
    pub score_threshold: i64,
    #[serde(default = "default_model")]
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Automated submission is off unless explicitly enabled.
    #[serde(default)]
    pub auto_submit: bool,
    /// Minimum delay between consecutive submissions.
    #[serde(default = "default_submit_delay")]
    pub submit_delay_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeConfig {
    pub file_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
}

fn default_max_postings() -> usize {
    25
}
fn default_threshold() -> i64 {
    70
}
fn default_model() -> String {
    "gemini-pro".to_string()
}
fn default_submit_delay() -> u64 {
    30
}
fn default_address() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_database_path() -> PathBuf {
    PathBuf::from("data/jobpilot.db")
}
fn default_log_file() -> PathBuf {
    PathBuf::from("logs/jobpilot.log")
}
fn default_upload_dir() -> PathBuf {
    PathBuf::from("data/resume")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            log_file: default_log_file(),
            upload_dir: default_upload_dir(),
        }
    }
}

impl AppConfig {
    /// Load and validate configuration. Failures here are fatal startup errors.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Configuration file not found: {}", path.display()))?;

        let config: AppConfig = serde_yaml::from_str(&raw)
            .with_context(|| format!("Invalid YAML in configuration file: {}", path.display()))?;

        config.validate()?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.search.keywords.is_empty() {
            anyhow::bail!("Configuration error: search.keywords must not be empty");
        }
        if self.search.locations.is_empty() {
            anyhow::bail!("Configuration error: search.locations must not be empty");
        }
        if !(0..=100).contains(&self.matching.score_threshold) {
            anyhow::bail!(
                "Configuration error: matching.score_threshold must be in 0-100, got {}",
                self.matching.score_threshold
            );
        }
        if self.search.max_postings == 0 {
            anyhow::bail!("Configuration error: search.max_postings must be at least 1");
        }
        Ok(())
    }

    /// Validate that the configured resume file exists and has a supported
    /// extension. Called by entry points that need a parseable resume.
    pub fn validate_resume_file(&self) -> Result<()> {
        let path = &self.resume.file_path;
        if !path.exists() {
            anyhow::bail!("Resume file not found: {}", path.display());
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        if ext != "pdf" && ext != "docx" {
            anyhow::bail!(
                "Unsupported resume format '{}': expected .pdf or .docx",
                path.display()
            );
        }
        Ok(())
    }

    /// Persist the current configuration (used by the settings page).
    pub fn save(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize configuration")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        std::fs::write(path, yaml)
            .with_context(|| format!("Failed to write configuration: {}", path.display()))?;
        info!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// API key comes from the environment (populated from .env), never from
    /// the config file itself.
    pub fn api_key(&self) -> Result<String> {
        std::env::var(API_KEY_ENV).with_context(|| {
            format!(
                "{} environment variable not set. Add it to your .env file.",
                API_KEY_ENV
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_yaml() -> &'static str {
        r#"
search:
  keywords: ["data engineer"]
  locations: ["Remote"]
matching:
  score_threshold: 70
application:
  auto_submit: false
resume:
  file_path: "data/resume/resume.pdf"
"#
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: AppConfig = serde_yaml::from_str(minimal_yaml()).unwrap();
        assert_eq!(config.search.keywords, vec!["data engineer"]);
        assert_eq!(config.matching.score_threshold, 70);
        assert!(!config.application.auto_submit);
        assert_eq!(config.server.address, "127.0.0.1");
        assert_eq!(config.application.submit_delay_secs, 30);
        config.validate().unwrap();
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let mut config: AppConfig = serde_yaml::from_str(minimal_yaml()).unwrap();
        config.matching.score_threshold = 150;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_keywords_rejected() {
        let mut config: AppConfig = serde_yaml::from_str(minimal_yaml()).unwrap();
        config.search.keywords.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_is_error() {
        let result = AppConfig::load(Path::new("/nonexistent/config.yaml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_config_round_trip() {
        let config: AppConfig = serde_yaml::from_str(minimal_yaml()).unwrap();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let back: AppConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.search.keywords, config.search.keywords);
        assert_eq!(back.matching.score_threshold, config.matching.score_threshold);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");

        let mut config: AppConfig = serde_yaml::from_str(minimal_yaml()).unwrap();
        config.matching.score_threshold = 85;
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.matching.score_threshold, 85);
        assert_eq!(loaded.search.locations, vec!["Remote"]);
    }
}
