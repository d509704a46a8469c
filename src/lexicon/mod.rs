//! Severity lexicon for configuration-driven keyword scoring
//!
//! This module provides:
//! - Critical terms that force HIGH severity on their own
//! - Medical-facility / urgency co-occurrence lists
//! - Weighted term buckets for the numeric severity score
//! - Category keyword table used when classification cannot reach the model
//!
//! Lists are loaded from TOML so they can be tuned without code changes. The
//! shipped template is embedded as the built-in default.

use crate::complaint::Category;
use crate::error::{GrievanceError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const BUILTIN_LEXICON: &str = include_str!("../../config-templates/severity.toml");

/// Per-bucket weights for the numeric severity score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub health: u32,
    pub safety: u32,
    pub urgency: u32,
    pub multiple_people: u32,
    pub repeated: u32,
    pub ignored: u32,
    pub long_duration: u32,
    pub essential_failure: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriticalConfig {
    pub terms: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoOccurrenceConfig {
    pub medical_facility: Vec<String>,
    pub urgency: Vec<String>,
}

/// Term buckets for numeric scoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub health: Vec<String>,
    pub safety: Vec<String>,
    pub urgency: Vec<String>,
    pub multiple_people: Vec<String>,
    pub repeated: Vec<String>,
    pub ignored: Vec<String>,
    pub long_duration: Vec<String>,
    pub essential_services: Vec<String>,
    pub failure_words: Vec<String>,
}

/// Keyword list for a single category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryKeywords {
    pub name: String,
    pub keywords: Vec<String>,
}

/// Lexicon file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LexiconConfig {
    pub weights: ScoreWeights,
    pub critical: CriticalConfig,
    pub co_occurrence: CoOccurrenceConfig,
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub category: Vec<CategoryKeywords>,
}

/// Lowercased term list matched by substring
#[derive(Debug, Clone, Default)]
pub struct TermSet {
    terms: Vec<String>,
}

impl TermSet {
    fn compile(terms: &[String]) -> Self {
        let mut compiled: Vec<String> = Vec::with_capacity(terms.len());
        for term in terms {
            let term = term.to_lowercase();
            if !term.trim().is_empty() && !compiled.contains(&term) {
                compiled.push(term);
            }
        }
        Self { terms: compiled }
    }

    /// First term contained in `text_lower`
    pub fn first_match(&self, text_lower: &str) -> Option<&str> {
        self.terms
            .iter()
            .find(|t| text_lower.contains(t.as_str()))
            .map(|t| t.as_str())
    }

    /// Every term contained in `text_lower`, in lexicon order
    pub fn matches<'a>(&'a self, text_lower: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.terms
            .iter()
            .filter(move |t| text_lower.contains(t.as_str()))
            .map(|t| t.as_str())
    }

    pub fn contains_any(&self, text_lower: &str) -> bool {
        self.first_match(text_lower).is_some()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// Compiled lexicon consumed by the severity scorer and the category fallback
#[derive(Debug, Clone)]
pub struct SeverityLexicon {
    pub weights: ScoreWeights,
    pub critical: TermSet,
    pub medical_facility: TermSet,
    pub co_urgency: TermSet,
    pub health: TermSet,
    pub safety: TermSet,
    pub urgency: TermSet,
    pub multiple_people: TermSet,
    pub repeated: TermSet,
    pub ignored: TermSet,
    pub long_duration: TermSet,
    pub essential_services: TermSet,
    pub failure_words: TermSet,
    pub categories: Vec<(Category, TermSet)>,
}

impl SeverityLexicon {
    /// Lexicon shipped with the crate
    pub fn builtin() -> Result<Self> {
        Self::from_toml(BUILTIN_LEXICON)
    }

    /// Load a lexicon from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| GrievanceError::Io {
            source: e,
            context: format!("Failed to read severity lexicon: {:?}", path),
        })?;
        Self::from_toml(&content)
    }

    /// Load from `path` when it exists, otherwise fall back to the built-in lexicon
    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) if p.exists() => Self::from_file(p),
            Some(p) => {
                tracing::warn!(
                    "Severity lexicon {:?} not found, using built-in lexicon",
                    p
                );
                Self::builtin()
            }
            None => Self::builtin(),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: LexiconConfig = toml::from_str(content)?;
        Self::from_config(config)
    }

    /// Build a lexicon from a parsed configuration
    pub fn from_config(config: LexiconConfig) -> Result<Self> {
        if config.critical.terms.iter().all(|t| t.trim().is_empty()) {
            return Err(GrievanceError::Config(
                "Severity lexicon must define at least one critical term".to_string(),
            ));
        }

        let mut categories = Vec::with_capacity(config.category.len());
        for entry in &config.category {
            let category = Category::resolve(&entry.name);
            if category.as_str() != entry.name.trim() {
                return Err(GrievanceError::Config(format!(
                    "Unknown category in lexicon: '{}'",
                    entry.name
                )));
            }
            categories.push((category, TermSet::compile(&entry.keywords)));
        }

        let scoring = &config.scoring;
        Ok(Self {
            critical: TermSet::compile(&config.critical.terms),
            medical_facility: TermSet::compile(&config.co_occurrence.medical_facility),
            co_urgency: TermSet::compile(&config.co_occurrence.urgency),
            health: TermSet::compile(&scoring.health),
            safety: TermSet::compile(&scoring.safety),
            urgency: TermSet::compile(&scoring.urgency),
            multiple_people: TermSet::compile(&scoring.multiple_people),
            repeated: TermSet::compile(&scoring.repeated),
            ignored: TermSet::compile(&scoring.ignored),
            long_duration: TermSet::compile(&scoring.long_duration),
            essential_services: TermSet::compile(&scoring.essential_services),
            failure_words: TermSet::compile(&scoring.failure_words),
            weights: config.weights,
            categories,
        })
    }

    /// Keyword-based category guess; first listed category with a hit wins
    pub fn classify_category(&self, text: &str) -> Category {
        let lower = text.to_lowercase();
        self.categories
            .iter()
            .find(|(_, keywords)| keywords.contains_any(&lower))
            .map(|(category, _)| *category)
            .unwrap_or(Category::Other)
    }
}
