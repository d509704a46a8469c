//! Numeric severity score
//!
//! Additive weighted term buckets over the complaint text, capped at `max_score`.
//! Per-term buckets (health, safety, urgency) add their weight once for every
//! distinct matching term; flag buckets add their weight once if any term matches.
use crate::lexicon::{SeverityLexicon, TermSet};
use serde::Serialize;

/// Lowercase and pad with spaces so padded terms like " er " can match at the edges
pub(crate) fn normalize(text: &str) -> String {
    format!(" {} ", text.to_lowercase())
}

/// One rule that added points to the score
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreContribution {
    pub bucket: &'static str,
    /// Matched term(s), comma separated for co-occurrence rules
    pub term: String,
    pub points: u32,
}

/// Score with the contributions that produced it
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScoreBreakdown {
    /// Capped score
    pub score: u32,
    /// Sum before capping
    pub raw: u32,
    pub contributions: Vec<ScoreContribution>,
}

impl ScoreBreakdown {
    fn add(&mut self, bucket: &'static str, term: impl Into<String>, points: u32) {
        if points == 0 {
            return;
        }
        self.raw += points;
        self.contributions.push(ScoreContribution {
            bucket,
            term: term.into(),
            points,
        });
    }
}

/// Compute the capped numeric score for `text`
pub fn severity_score(text: &str, lexicon: &SeverityLexicon, max_score: u32) -> u32 {
    score_breakdown(text, lexicon, max_score).score
}

/// Compute the score and record which rule contributed what
pub fn score_breakdown(text: &str, lexicon: &SeverityLexicon, max_score: u32) -> ScoreBreakdown {
    let lower = normalize(text);
    let weights = &lexicon.weights;
    let mut breakdown = ScoreBreakdown::default();

    per_term(&mut breakdown, "health", &lexicon.health, &lower, weights.health);
    per_term(&mut breakdown, "safety", &lexicon.safety, &lower, weights.safety);
    per_term(&mut breakdown, "urgency", &lexicon.urgency, &lower, weights.urgency);

    flag(
        &mut breakdown,
        "multiple_people",
        &lexicon.multiple_people,
        &lower,
        weights.multiple_people,
    );
    flag(&mut breakdown, "repeated", &lexicon.repeated, &lower, weights.repeated);
    flag(&mut breakdown, "ignored", &lexicon.ignored, &lower, weights.ignored);
    flag(
        &mut breakdown,
        "long_duration",
        &lexicon.long_duration,
        &lower,
        weights.long_duration,
    );

    if let (Some(service), Some(failure)) = (
        lexicon.essential_services.first_match(&lower),
        lexicon.failure_words.first_match(&lower),
    ) {
        breakdown.add(
            "essential_failure",
            format!("{}, {}", service.trim(), failure.trim()),
            weights.essential_failure,
        );
    }

    breakdown.score = breakdown.raw.min(max_score);
    breakdown
}

fn per_term(
    breakdown: &mut ScoreBreakdown,
    bucket: &'static str,
    terms: &TermSet,
    lower: &str,
    weight: u32,
) {
    for term in terms.matches(lower) {
        breakdown.add(bucket, term.trim(), weight);
    }
}

fn flag(
    breakdown: &mut ScoreBreakdown,
    bucket: &'static str,
    terms: &TermSet,
    lower: &str,
    weight: u32,
) {
    if let Some(term) = terms.first_match(lower) {
        breakdown.add(bucket, term.trim(), weight);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lexicon() -> SeverityLexicon {
        SeverityLexicon::builtin().unwrap()
    }

    #[test]
    fn test_neutral_text_scores_zero() {
        assert_eq!(
            severity_score("The library could use better lighting.", &lexicon(), 10),
            0
        );
    }

    #[test]
    fn test_safety_terms_add_four_each() {
        let breakdown = score_breakdown("The stairs are slippery and dangerous", &lexicon(), 10);
        assert_eq!(breakdown.raw, 8);
        assert!(breakdown
            .contributions
            .iter()
            .all(|c| c.bucket == "safety" && c.points == 4));
    }

    #[test]
    fn test_score_is_capped() {
        let breakdown =
            score_breakdown("Unsafe and dangerous hazard, fix urgent", &lexicon(), 10);
        assert!(breakdown.raw > 10);
        assert_eq!(breakdown.score, 10);
    }

    #[test]
    fn test_flag_buckets_count_once() {
        // "again" and "twice" are both repeated terms but the bucket is flat
        let score = severity_score("The fan broke again, twice now", &lexicon(), 10);
        assert_eq!(score, 2);
    }

    #[test]
    fn test_essential_service_failure_bonus() {
        let breakdown = score_breakdown("The toilet flush is not working", &lexicon(), 10);
        assert_eq!(breakdown.score, 3);
        assert_eq!(breakdown.contributions[0].bucket, "essential_failure");
        assert_eq!(breakdown.contributions[0].term, "toilet, not working");
    }

    #[test]
    fn test_essential_service_alone_scores_nothing() {
        assert_eq!(severity_score("The toilet paper brand", &lexicon(), 10), 0);
    }
}
