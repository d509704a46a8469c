//! Complaint submission pipeline
//!
//! validate -> rewrite -> category -> severity -> embedding -> insert -> cluster.
//! Only validation and the insert can fail a submission; every enrichment step
//! has a fallback and clustering is attempted after the complaint is stored.
use crate::classify::ComplaintClassifier;
use crate::clustering::ClusterEngine;
use crate::complaint::{Category, Complaint, ComplaintId, NewComplaint, Severity};
use crate::config::Config;
use crate::embedding::{self, is_zero_vector, BatchEmbedder, EmbeddingAdapter};
use crate::error::{GrievanceError, Result};
use crate::lexicon::SeverityLexicon;
use crate::llm::{DisabledGenerator, GeminiClient, TextGenerator};
use crate::severity::{SeverityScorer, SeverityThresholds};
use crate::storage::ComplaintStore;
use std::sync::Arc;
use tracing::{info, warn};

/// A complaint as submitted by a student
#[derive(Debug, Clone, Default)]
pub struct Submission {
    pub text: String,
    /// Category chosen by the submitter; resolved against the fixed set
    pub category: Option<String>,
    pub student_id: Option<String>,
}

impl Submission {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_student(mut self, student_id: impl Into<String>) -> Self {
        self.student_id = Some(student_id.into());
        self
    }
}

/// Enriched fields computed before embedding
struct Enriched {
    submission: Submission,
    rewritten: String,
    category: Category,
    severity: Severity,
}

pub struct SubmissionPipeline {
    store: Arc<dyn ComplaintStore>,
    classifier: ComplaintClassifier,
    scorer: SeverityScorer,
    adapter: EmbeddingAdapter,
    engine: ClusterEngine,
    max_complaint_length: usize,
    max_concurrent: usize,
}

impl SubmissionPipeline {
    pub fn new(
        store: Arc<dyn ComplaintStore>,
        classifier: ComplaintClassifier,
        scorer: SeverityScorer,
        adapter: EmbeddingAdapter,
        engine: ClusterEngine,
        config: &Config,
    ) -> Self {
        Self {
            store,
            classifier,
            scorer,
            adapter,
            engine,
            max_complaint_length: config.submission.max_complaint_length,
            max_concurrent: config.embedding.max_concurrent,
        }
    }

    /// Wire every collaborator from configuration
    pub fn from_config(config: &Config, store: Arc<dyn ComplaintStore>) -> Result<Self> {
        let generator = text_generator(config);
        let lexicon = Arc::new(SeverityLexicon::load_or_builtin(
            config.severity.lexicon_file.as_deref(),
        )?);
        let adapter = EmbeddingAdapter::new(
            embedding::provider_from_config(config),
            config.embedding.dimension,
        );

        Ok(Self::new(
            store.clone(),
            ComplaintClassifier::new(generator.clone(), lexicon.clone()),
            SeverityScorer::new(
                generator,
                lexicon,
                SeverityThresholds::from(&config.severity),
            ),
            adapter,
            ClusterEngine::new(store, &config.clustering),
            config,
        ))
    }

    pub fn engine(&self) -> &ClusterEngine {
        &self.engine
    }

    pub fn scorer(&self) -> &SeverityScorer {
        &self.scorer
    }

    fn validate(&self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Err(GrievanceError::InvalidComplaint(
                "Complaint text cannot be empty".to_string(),
            ));
        }
        let length = text.chars().count();
        if length > self.max_complaint_length {
            return Err(GrievanceError::InvalidComplaint(format!(
                "Complaint must be at most {} characters, got {}",
                self.max_complaint_length, length
            )));
        }
        Ok(())
    }

    fn enrich(&self, submission: Submission) -> Result<Enriched> {
        self.validate(&submission.text)?;

        let rewritten = self.classifier.rewrite_complaint(submission.text.trim());
        let category = match submission.category.as_deref() {
            Some(label) if !label.trim().is_empty() => Category::resolve(label),
            _ => self.classifier.classify_category(&rewritten),
        };
        let severity = self.scorer.detect_severity(&rewritten);

        Ok(Enriched {
            submission,
            rewritten,
            category,
            severity,
        })
    }

    /// Store the complaint and attach it to a cluster
    fn persist(&self, enriched: Enriched, embedding: Vec<f32>) -> Result<Complaint> {
        let mut new = NewComplaint::new(
            enriched.submission.text.trim(),
            enriched.rewritten,
            enriched.category,
            enriched.severity,
        );
        new.student_id = enriched.submission.student_id;
        // A zero vector carries no similarity signal; store it as absent
        if !is_zero_vector(&embedding) {
            new.embedding = Some(embedding);
        }

        let mut complaint = self.store.insert_complaint(new)?;

        match self.engine.assign_and_attach(&complaint) {
            Some(cluster_id) => complaint.cluster_id = Some(cluster_id),
            None => warn!("Complaint {} stored without a cluster", complaint.id),
        }

        Ok(complaint)
    }

    /// Run the full pipeline for one complaint
    pub fn submit(&self, submission: Submission) -> Result<Complaint> {
        let enriched = self.enrich(submission)?;
        let embedding = self.adapter.generate_embedding(&enriched.rewritten);
        let complaint = self.persist(enriched, embedding)?;

        info!(
            "Stored complaint {} ({}, {}, cluster {:?})",
            complaint.id, complaint.category, complaint.severity, complaint.cluster_id
        );
        Ok(complaint)
    }

    /// Submit many complaints, embedding them concurrently
    ///
    /// Results are in input order; one rejected complaint does not stop the rest.
    /// Must not be called from inside an async runtime.
    pub fn submit_batch(&self, submissions: Vec<Submission>) -> Result<Vec<Result<Complaint>>> {
        let enriched: Vec<Result<Enriched>> =
            submissions.into_iter().map(|s| self.enrich(s)).collect();

        let texts: Vec<String> = enriched
            .iter()
            .filter_map(|e| e.as_ref().ok().map(|e| e.rewritten.clone()))
            .collect();

        let runtime = tokio::runtime::Runtime::new().map_err(|e| GrievanceError::Io {
            source: e,
            context: "Failed to create tokio runtime".to_string(),
        })?;
        let embedder = BatchEmbedder::new(self.adapter.clone(), self.max_concurrent);
        let mut embeddings = runtime.block_on(embedder.embed_all(texts)).embeddings.into_iter();

        let results: Vec<Result<Complaint>> = enriched
            .into_iter()
            .map(|item| {
                let item = item?;
                let embedding = embeddings
                    .next()
                    .unwrap_or_else(|| self.adapter.zero_vector());
                self.persist(item, embedding)
            })
            .collect();


        let stored = results.iter().filter(|r| r.is_ok()).count();
        info!("Batch stored {} of {} complaints", stored, results.len());
        Ok(results)
    }

    /// Add one upvote to a complaint and return the new total
    pub fn upvote(&self, complaint_id: ComplaintId) -> Result<u32> {
        Ok(self.store.increment_upvotes(complaint_id)?)
    }
}

/// Gemini when the LLM is enabled and reachable, otherwise a generator that always fails
pub fn text_generator(config: &Config) -> Arc<dyn TextGenerator> {
    if !config.llm.enabled {
        return Arc::new(DisabledGenerator);
    }

    match GeminiClient::from_config(&config.llm, config.embedding.dimension) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            warn!("LLM unavailable, using keyword fallbacks: {}", e);
            Arc::new(DisabledGenerator)
        }
    }
}
