use crate::config::Config;
use crate::error::{GrievanceError, Result, ValidationError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        // Validate schema version
        Self::validate_schema_version(config, &mut errors);

        // Validate storage settings
        Self::validate_storage(config, &mut errors);

        // Validate embedding settings
        Self::validate_embedding(config, &mut errors);

        // Validate LLM settings
        Self::validate_llm(config, &mut errors);

        // Validate clustering settings
        Self::validate_clustering(config, &mut errors);

        // Validate severity thresholds
        Self::validate_severity(config, &mut errors);

        if config.submission.max_complaint_length == 0 {
            errors.push(ValidationError::new(
                "submission.max_complaint_length",
                "Maximum complaint length must be greater than 0",
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(GrievanceError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_storage(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.storage.data_dir.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.data_dir",
                "Data directory cannot be empty",
            ));
        }

        if config.storage.database_file.trim().is_empty() {
            errors.push(ValidationError::new(
                "storage.database_file",
                "Database file name cannot be empty",
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        // Validate mode
        let mode = &config.embedding.mode;
        if mode != "offline" && mode != "online" {
            errors.push(ValidationError::new(
                "embedding.mode",
                format!("Mode must be 'offline' or 'online', got '{}'", mode),
            ));
        }

        if config.embedding.dimension == 0 {
            errors.push(ValidationError::new(
                "embedding.dimension",
                "Embedding dimension must be greater than 0",
            ));
        }

        if config.embedding.batch_size == 0 {
            errors.push(ValidationError::new(
                "embedding.batch_size",
                "Batch size must be greater than 0",
            ));
        }

        if config.embedding.max_concurrent == 0 {
            errors.push(ValidationError::new(
                "embedding.max_concurrent",
                "Concurrency limit must be greater than 0",
            ));
        }

        if config.embedding.model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
        }
    }

    fn validate_llm(config: &Config, errors: &mut Vec<ValidationError>) {
        // If LLM is enabled, validate API key environment variable is set
        if config.llm.enabled {
            let env_var = &config.llm.api_key_env;
            match std::env::var(env_var) {
                Ok(key) if key.is_empty() => {
                    errors.push(ValidationError::new(
                        "llm.api_key_env",
                        format!("Environment variable {} is empty", env_var),
                    ));
                }
                Ok(_) => {}
                Err(_) => {
                    errors.push(ValidationError::new(
                        "llm.api_key_env",
                        format!("Environment variable {} is not set", env_var),
                    ));
                }
            }
        }

        // Validate temperature range
        let temp = config.llm.temperature;
        if !(0.0..=2.0).contains(&temp) {
            errors.push(ValidationError::new(
                "llm.temperature",
                format!("Temperature must be between 0.0 and 2.0, got {}", temp),
            ));
        }

        let provider = &config.llm.provider;
        let valid_providers = ["gemini"];
        if !valid_providers.contains(&provider.as_str()) {
            errors.push(ValidationError::new(
                "llm.provider",
                format!(
                    "Provider must be one of {:?}, got '{}'",
                    valid_providers, provider
                ),
            ));
        }

        if config.llm.timeout_secs == 0 {
            errors.push(ValidationError::new(
                "llm.timeout_secs",
                "Timeout must be greater than 0",
            ));
        }
    }

    fn validate_clustering(config: &Config, errors: &mut Vec<ValidationError>) {
        let threshold = config.clustering.similarity_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            errors.push(ValidationError::new(
                "clustering.similarity_threshold",
                format!("Threshold must be between 0.0 and 1.0, got {}", threshold),
            ));
        }

        if config.clustering.sample_size == 0 {
            errors.push(ValidationError::new(
                "clustering.sample_size",
                "Sample size must be greater than 0",
            ));
        }
    }

    fn validate_severity(config: &Config, errors: &mut Vec<ValidationError>) {
        let s = &config.severity;
        if !(s.fallback_medium_threshold <= s.upgrade_threshold
            && s.upgrade_threshold <= s.high_threshold
            && s.high_threshold <= s.max_score)
        {
            errors.push(ValidationError::new(
                "severity",
                format!(
                    "Thresholds must satisfy fallback_medium ({}) <= upgrade ({}) \
                     <= high ({}) <= max_score ({})",
                    s.fallback_medium_threshold, s.upgrade_threshold, s.high_threshold, s.max_score
                ),
            ));
        }
    }
}
