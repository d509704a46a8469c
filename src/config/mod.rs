//! Configuration management for Grievance
//!
//! Handles loading, environment overrides and validation of the TOML
//! configuration file. Term lists for severity scoring live in a separate
//! lexicon file referenced from the `severity` section.

use crate::error::{GrievanceError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub clustering: ClusteringConfig,
    pub severity: SeverityConfig,
    pub submission: SubmissionConfig,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub database_file: String,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub mode: String, // "offline" or "online"
    pub model: String,
    /// Expected vector length and length of the zero-vector fallback
    pub dimension: usize,
    pub batch_size: usize,
    pub max_concurrent: usize,
}

/// Text-generation (and online embedding) service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub enabled: bool,
    pub provider: String,
    pub api_key_env: String,
    pub model: String,
    pub embedding_model: String,
    pub base_url: String,
    pub timeout_secs: u64,
    pub temperature: f32,
}

/// Clustering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringConfig {
    /// Minimum average cosine similarity for joining an existing cluster
    pub similarity_threshold: f32,
    /// Number of most recent members sampled per candidate cluster
    pub sample_size: usize,
}

/// Severity scoring thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeverityConfig {
    /// Lexicon file; the built-in lexicon is used when unset or missing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lexicon_file: Option<PathBuf>,
    /// Score at or above which the result is forced to HIGH
    pub high_threshold: u32,
    /// Score at or above which a LOW model opinion is raised to MEDIUM
    pub upgrade_threshold: u32,
    /// Score at or above which the fallback path reports MEDIUM
    pub fallback_medium_threshold: u32,
    /// Numeric score cap
    pub max_score: u32,
}

/// Submission limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionConfig {
    pub max_complaint_length: usize,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.75,
            sample_size: 5,
        }
    }
}

impl Default for SeverityConfig {
    fn default() -> Self {
        Self {
            lexicon_file: None,
            high_threshold: 8,
            upgrade_threshold: 5,
            fallback_medium_threshold: 4,
            max_score: 10,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(GrievanceError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| GrievanceError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        // Apply environment variable overrides
        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| GrievanceError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: GRIEVANCE_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("GRIEVANCE_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "LLM__ENABLED" => {
                self.llm.enabled = value.parse().map_err(|_| GrievanceError::InvalidConfigValue {
                    path: path.to_string(),
                    message: format!("Cannot parse '{}' as boolean", value),
                })?;
            }
            "LLM__MODEL" => {
                self.llm.model = value.to_string();
            }
            "EMBEDDING__MODE" => {
                self.embedding.mode = value.to_string();
            }
            "EMBEDDING__MODEL" => {
                self.embedding.model = value.to_string();
            }
            "CLUSTERING__SIMILARITY_THRESHOLD" => {
                self.clustering.similarity_threshold =
                    value
                        .parse()
                        .map_err(|_| GrievanceError::InvalidConfigValue {
                            path: path.to_string(),
                            message: format!("Cannot parse '{}' as float", value),
                        })?;
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            GrievanceError::Config("Cannot determine config directory".to_string())
        })?;

        Ok(config_dir.join("grievance").join("config.toml"))
    }

    /// Full path of the SQLite database
    pub fn database_path(&self) -> PathBuf {
        self.storage.data_dir.join(&self.storage.database_file)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: "1.0.0".to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            storage: StorageConfig {
                data_dir: PathBuf::from("~/.grievance"),
                database_file: "complaints.sqlite".to_string(),
            },
            embedding: EmbeddingConfig {
                mode: "online".to_string(),
                model: "bge-base-en-v1.5".to_string(),
                dimension: 768,
                batch_size: 32,
                max_concurrent: 4,
            },
            llm: LlmConfig {
                enabled: false,
                provider: "gemini".to_string(),
                api_key_env: "GEMINI_API_KEY".to_string(),
                model: "gemini-pro".to_string(),
                embedding_model: "models/embedding-001".to_string(),
                base_url: "https://generativelanguage.googleapis.com".to_string(),
                timeout_secs: 30,
                temperature: 0.1,
            },
            clustering: ClusteringConfig::default(),
            severity: SeverityConfig::default(),
            submission: SubmissionConfig {
                max_complaint_length: 2000,
            },
        }
    }
}
