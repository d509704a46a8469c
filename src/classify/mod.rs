//! Category classification and formal rewriting
//!
//! Both operations ask the text generator first and degrade without it: the
//! category falls back to the lexicon's keyword table, the rewrite falls back to
//! the raw text.
use crate::complaint::Category;
use crate::lexicon::SeverityLexicon;
use crate::llm::TextGenerator;
use std::sync::Arc;
use tracing::{debug, warn};

const REWRITE_PROMPT: &str = "Rewrite the following student complaint in clear, formal, \
respectful English suitable for a campus administration. Keep every fact, do not add \
new information, and reply with the rewritten complaint only.

Complaint: ";

fn category_prompt(text: &str) -> String {
    let categories: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();
    format!(
        "Classify the following student complaint into exactly one of these categories: {}.\n\
         Reply with the category name only.\n\nComplaint: {}",
        categories.join(", "),
        text
    )
}

/// Classifier and rewriter backed by a text generator
pub struct ComplaintClassifier {
    generator: Arc<dyn TextGenerator>,
    lexicon: Arc<SeverityLexicon>,
}

impl ComplaintClassifier {
    pub fn new(generator: Arc<dyn TextGenerator>, lexicon: Arc<SeverityLexicon>) -> Self {
        Self { generator, lexicon }
    }

    /// Category for `text`; always a member of the fixed set
    pub fn classify_category(&self, text: &str) -> Category {
        match self.generator.generate(&category_prompt(text)) {
            Ok(answer) => {
                let category = Category::resolve(&answer);
                debug!("Model answered '{}', resolved to {}", answer.trim(), category);
                category
            }
            Err(e) => {
                let category = self.lexicon.classify_category(text);
                warn!(
                    "Category model unavailable, keyword fallback chose {}: {}",
                    category, e
                );
                category
            }
        }
    }

    /// Formal rewrite of `text`; the raw text when the generator fails or answers nothing
    pub fn rewrite_complaint(&self, text: &str) -> String {
        match self.generator.generate(&format!("{}{}", REWRITE_PROMPT, text)) {
            Ok(rewritten) if !rewritten.trim().is_empty() => rewritten.trim().to_string(),
            Ok(_) => {
                warn!("Rewrite returned empty text, keeping the original");
                text.to_string()
            }
            Err(e) => {
                warn!("Rewrite unavailable, keeping the original: {}", e);
                text.to_string()
            }
        }
    }
}
