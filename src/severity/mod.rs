//! Severity scoring
//!
//! Three-layer decision:
//! 1. critical keywords (or a medical facility term next to an urgency term) force HIGH
//! 2. the text generator's opinion, parsed defensively with a MEDIUM default
//! 3. the numeric score overrides the opinion (>= high threshold forces HIGH,
//!    >= upgrade threshold lifts LOW to MEDIUM)
//!
//! When the generator fails, the numeric score is mapped directly instead.
mod score;

pub use score::{score_breakdown, severity_score, ScoreBreakdown, ScoreContribution};

use crate::complaint::Severity;
use crate::config::SeverityConfig;
use crate::lexicon::SeverityLexicon;
use crate::llm::TextGenerator;
use score::normalize;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Why the critical pass fired
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CriticalTrigger {
    Keyword { term: String },
    MedicalUrgency { facility: String, urgency: String },
}

/// Which layer produced the final tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Critical,
    Model,
    ScoreOverride,
    ScoreUpgrade,
    Fallback,
}

/// Full outcome of a severity decision
#[derive(Debug, Clone, Serialize)]
pub struct SeverityAssessment {
    pub severity: Severity,
    pub decision: Decision,
    pub score: u32,
    /// Parsed model opinion, when the generator answered
    pub model_opinion: Option<Severity>,
    pub critical: Option<CriticalTrigger>,
}

/// Human-readable diagnostic for a severity value
#[derive(Debug, Clone, Serialize)]
pub struct SeverityExplanation {
    pub severity: Severity,
    pub score: u32,
    pub reasons: Vec<String>,
}

/// Score thresholds, tunable through the `severity` config section
#[derive(Debug, Clone, Copy)]
pub struct SeverityThresholds {
    pub high: u32,
    pub upgrade: u32,
    pub fallback_medium: u32,
    pub max_score: u32,
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self::from(&SeverityConfig::default())
    }
}

impl From<&SeverityConfig> for SeverityThresholds {
    fn from(config: &SeverityConfig) -> Self {
        Self {
            high: config.high_threshold,
            upgrade: config.upgrade_threshold,
            fallback_medium: config.fallback_medium_threshold,
            max_score: config.max_score,
        }
    }
}

const SEVERITY_PROMPT: &str = "You are triaging a student complaint for a campus administration.

Think step by step:
1. Is anyone's health at risk (illness, injury, contamination)?
2. Is there a safety hazard (fire, electricity, structural damage, violence)?
3. How urgent is it, and how many people are affected?
4. Is an essential service (water, power, food, medical care) unavailable?

Then classify the severity:
- high: immediate health or safety risk, or an essential service is down
- medium: significant inconvenience that needs attention soon
- low: minor issue or suggestion

Respond with exactly one word: high, medium, or low.

Complaint: ";

/// Parse a free-form model answer into a tier
///
/// Looks for "high", "medium", "low" in that order; anything else is MEDIUM.
pub fn parse_model_severity(response: &str) -> Severity {
    let lower = response.to_lowercase();
    if lower.contains("high") {
        Severity::High
    } else if lower.contains("medium") {
        Severity::Medium
    } else if lower.contains("low") {
        Severity::Low
    } else {
        Severity::Medium
    }
}

/// Severity scorer over a lexicon and a text generator
pub struct SeverityScorer {
    generator: Arc<dyn TextGenerator>,
    lexicon: Arc<SeverityLexicon>,
    thresholds: SeverityThresholds,
}

impl SeverityScorer {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        lexicon: Arc<SeverityLexicon>,
        thresholds: SeverityThresholds,
    ) -> Self {
        Self {
            generator,
            lexicon,
            thresholds,
        }
    }

    pub fn lexicon(&self) -> &SeverityLexicon {
        &self.lexicon
    }

    pub fn thresholds(&self) -> SeverityThresholds {
        self.thresholds
    }

    /// Severity tier for `text`; never fails
    pub fn detect_severity(&self, text: &str) -> Severity {
        self.assess(text).severity
    }

    /// Severity for each text, in input order
    pub fn detect_batch_severity(&self, texts: &[String]) -> Vec<Severity> {
        texts.iter().map(|t| self.detect_severity(t)).collect()
    }

    /// Numeric score for `text`, capped at the configured maximum
    pub fn score(&self, text: &str) -> u32 {
        severity_score(text, &self.lexicon, self.thresholds.max_score)
    }

    /// Critical keyword or medical-facility/urgency co-occurrence in `text`
    pub fn critical_trigger(&self, text: &str) -> Option<CriticalTrigger> {
        let lower = normalize(text);
        if let Some(term) = self.lexicon.critical.first_match(&lower) {
            return Some(CriticalTrigger::Keyword {
                term: term.trim().to_string(),
            });
        }

        match (
            self.lexicon.medical_facility.first_match(&lower),
            self.lexicon.co_urgency.first_match(&lower),
        ) {
            (Some(facility), Some(urgency)) => Some(CriticalTrigger::MedicalUrgency {
                facility: facility.trim().to_string(),
                urgency: urgency.trim().to_string(),
            }),
            _ => None,
        }
    }

    /// Run the full decision and keep every intermediate result
    pub fn assess(&self, text: &str) -> SeverityAssessment {
        if let Some(trigger) = self.critical_trigger(text) {
            debug!("Critical trigger {:?}, severity high", trigger);
            return SeverityAssessment {
                severity: Severity::High,
                decision: Decision::Critical,
                score: self.score(text),
                model_opinion: None,
                critical: Some(trigger),
            };
        }

        let score = self.score(text);
        let prompt = format!("{}{}", SEVERITY_PROMPT, text);

        match self.generator.generate(&prompt) {
            Ok(response) => {
                let opinion = parse_model_severity(&response);
                let (severity, decision) = self.apply_override(opinion, score);
                debug!(
                    "Model said {}, score {}, final {} ({:?})",
                    opinion, score, severity, decision
                );
                SeverityAssessment {
                    severity,
                    decision,
                    score,
                    model_opinion: Some(opinion),
                    critical: None,
                }
            }
            Err(e) => {
                warn!("Severity model unavailable, using score only: {}", e);
                SeverityAssessment {
                    severity: self.severity_from_score(score),
                    decision: Decision::Fallback,
                    score,
                    model_opinion: None,
                    critical: None,
                }
            }
        }
    }

    fn apply_override(&self, opinion: Severity, score: u32) -> (Severity, Decision) {
        if score >= self.thresholds.high {
            (Severity::High, Decision::ScoreOverride)
        } else if score >= self.thresholds.upgrade && opinion == Severity::Low {
            (Severity::Medium, Decision::ScoreUpgrade)
        } else {
            (opinion, Decision::Model)
        }
    }

    /// Direct score mapping used when the generator is unavailable
    pub fn severity_from_score(&self, score: u32) -> Severity {
        if score >= self.thresholds.high {
            Severity::High
        } else if score >= self.thresholds.fallback_medium {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    /// Report which rules support `severity` for `text`
    ///
    /// Does not call the generator; reasons come from the lexicon alone.
    pub fn explain_severity(&self, text: &str, severity: Severity) -> SeverityExplanation {
        let breakdown = score_breakdown(text, &self.lexicon, self.thresholds.max_score);
        let mut reasons = Vec::new();

        match self.critical_trigger(text) {
            Some(CriticalTrigger::Keyword { term }) => {
                reasons.push(format!("critical keyword '{}'", term));
            }
            Some(CriticalTrigger::MedicalUrgency { facility, urgency }) => {
                reasons.push(format!(
                    "medical facility '{}' mentioned with urgency '{}'",
                    facility, urgency
                ));
            }
            None => {}
        }

        for contribution in &breakdown.contributions {
            reasons.push(format!(
                "{} '{}' (+{})",
                contribution.bucket.replace('_', " "),
                contribution.term,
                contribution.points
            ));
        }

        if breakdown.score >= self.thresholds.high {
            reasons.push(format!(
                "score {} reaches the high threshold {}",
                breakdown.score, self.thresholds.high
            ));
        } else if breakdown.score >= self.thresholds.upgrade {
            reasons.push(format!(
                "score {} reaches the upgrade threshold {}",
                breakdown.score, self.thresholds.upgrade
            ));
        }

        if reasons.is_empty() {
            reasons.push(match severity {
                Severity::Low => "no severity indicators found".to_string(),
                _ => format!("classified {} without keyword indicators", severity),
            });
        }

        SeverityExplanation {
            severity,
            score: breakdown.score,
            reasons,
        }
    }
}
