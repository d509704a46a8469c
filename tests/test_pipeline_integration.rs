use grievance::classify::ComplaintClassifier;
use grievance::clustering::{dashboard_stats, ClusterEngine};
use grievance::complaint::{Category, Severity};
use grievance::config::Config;
use grievance::embedding::{EmbeddingAdapter, EmbeddingError, EmbeddingProvider};
use grievance::error::GrievanceError;
use grievance::lexicon::SeverityLexicon;
use grievance::llm::{DisabledGenerator, TextGenerator};
use grievance::pipeline::{Submission, SubmissionPipeline};
use grievance::severity::{SeverityScorer, SeverityThresholds};
use grievance::storage::{ComplaintStore, MemoryStore, SqliteStore};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

const DIM: usize = 4;

/// Embeds known texts with fixed vectors and fails on anything else
struct LookupProvider {
    vectors: HashMap<String, Vec<f32>>,
}

impl LookupProvider {
    fn new(entries: &[(&str, Vec<f32>)]) -> Self {
        Self {
            vectors: entries
                .iter()
                .map(|(text, vector)| (text.to_string(), vector.clone()))
                .collect(),
        }
    }
}

impl EmbeddingProvider for LookupProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.vectors
            .get(text)
            .cloned()
            .ok_or_else(|| EmbeddingError::GenerationError(format!("unknown text '{}'", text)))
    }

    fn dimension(&self) -> usize {
        DIM
    }

    fn model_name(&self) -> &str {
        "lookup"
    }
}

const COLD_FOOD: [&str; 3] = [
    "The mess food is cold at dinner",
    "Dinner in the mess was served cold",
    "Cold food at the mess tonight",
];

fn near_duplicates() -> Vec<(&'static str, Vec<f32>)> {
    let third = 1.0 / 3.0;
    vec![
        (COLD_FOOD[0], vec![1.0, third, 0.0, 0.0]),
        (COLD_FOOD[1], vec![1.0, 0.0, third, 0.0]),
        (COLD_FOOD[2], vec![1.0, 0.0, 0.0, third]),
    ]
}

fn pipeline(provider: LookupProvider) -> (SubmissionPipeline, Arc<SqliteStore>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(SqliteStore::open(&temp_dir.path().join("complaints.sqlite")).unwrap());

    let mut config = Config::default();
    config.embedding.dimension = DIM;
    config.embedding.max_concurrent = 2;
    config.submission.max_complaint_length = 200;

    let generator: Arc<dyn TextGenerator> = Arc::new(DisabledGenerator);
    let lexicon = Arc::new(SeverityLexicon::builtin().unwrap());
    let dyn_store: Arc<dyn ComplaintStore> = store.clone();

    let pipeline = SubmissionPipeline::new(
        dyn_store.clone(),
        ComplaintClassifier::new(generator.clone(), lexicon.clone()),
        SeverityScorer::new(generator, lexicon, SeverityThresholds::default()),
        EmbeddingAdapter::new(Arc::new(provider), DIM),
        ClusterEngine::new(dyn_store, &config.clustering),
        &config,
    );

    (pipeline, store, temp_dir)
}

#[test]
fn test_near_duplicates_end_to_end() {
    let (pipeline, store, _dir) = pipeline(LookupProvider::new(&near_duplicates()));

    let complaints: Vec<_> = COLD_FOOD
        .iter()
        .map(|text| {
            pipeline
                .submit(Submission::new(*text).with_category("Mess Food Quality"))
                .unwrap()
        })
        .collect();

    let cluster_id = complaints[0].cluster_id.expect("clustered");
    assert!(complaints.iter().all(|c| c.cluster_id == Some(cluster_id)));

    let cluster = store.get_cluster(cluster_id).unwrap().unwrap();
    assert_eq!(cluster.count, 3);
    assert_eq!(cluster.category, Category::MessFoodQuality);
    assert_eq!(cluster.name, "Mess Food Quality - LOW");
    assert!(complaints.iter().all(|c| c.severity == Severity::Low));
    assert_eq!(store.list_clusters().unwrap().len(), 1);
    assert_eq!(pipeline.engine().update_clusters().unwrap().updated, 0);
}

#[test]
fn test_rejected_submissions_store_nothing() {
    let (pipeline, store, _dir) = pipeline(LookupProvider::new(&[]));

    let empty = pipeline.submit(Submission::new("   ")).unwrap_err();
    assert!(matches!(empty, GrievanceError::InvalidComplaint(_)));

    let long = pipeline.submit(Submission::new("x".repeat(201))).unwrap_err();
    assert!(matches!(long, GrievanceError::InvalidComplaint(_)));

    assert!(store.get_all_complaints().unwrap().is_empty());
    assert!(store.list_clusters().unwrap().is_empty());
}

#[test]
fn test_embedding_failure_still_stores_and_clusters() {
    let (pipeline, store, _dir) = pipeline(LookupProvider::new(&[]));

    let complaint = pipeline
        .submit(Submission::new("The wifi in my room keeps dropping").with_student("s-42"))
        .unwrap();

    assert_eq!(complaint.category, Category::CampusWifi);
    assert_eq!(complaint.student_id.as_deref(), Some("s-42"));
    assert!(complaint.embedding.is_none());
    assert!(complaint.cluster_id.is_some());

    let stored = store.get_complaint(complaint.id).unwrap().unwrap();
    assert!(stored.embedding.is_none());
    assert_eq!(stored.cluster_id, complaint.cluster_id);
}

#[test]
fn test_critical_text_is_high_without_model() {
    let (pipeline, _store, _dir) = pipeline(LookupProvider::new(&[]));
    let complaint = pipeline
        .submit(Submission::new("There is a gas leak near the hostel kitchen"))
        .unwrap();
    assert_eq!(complaint.severity, Severity::High);
}

#[test]
fn test_batch_keeps_order_and_isolates_failures() {
    let (pipeline, store, _dir) = pipeline(LookupProvider::new(&near_duplicates()));

    let results = pipeline
        .submit_batch(vec![
            Submission::new(COLD_FOOD[0]).with_category("Mess Food Quality"),
            Submission::new(""),
            Submission::new(COLD_FOOD[1]).with_category("Mess Food Quality"),
        ])
        .unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().unwrap().raw_text, COLD_FOOD[0]);
    assert!(results[1].is_err());
    assert_eq!(results[2].as_ref().unwrap().raw_text, COLD_FOOD[1]);
    assert_eq!(
        results[0].as_ref().unwrap().cluster_id,
        results[2].as_ref().unwrap().cluster_id
    );
    assert_eq!(store.get_all_complaints().unwrap().len(), 2);
}

#[test]
fn test_upvotes_and_dashboard() {
    let (pipeline, store, _dir) = pipeline(LookupProvider::new(&near_duplicates()));
    let complaint = pipeline
        .submit(Submission::new(COLD_FOOD[0]).with_category("Mess Food Quality"))
        .unwrap();

    assert_eq!(pipeline.upvote(complaint.id).unwrap(), 1);
    assert_eq!(pipeline.upvote(complaint.id).unwrap(), 2);
    assert!(pipeline.upvote(complaint.id + 100).is_err());

    let stats = dashboard_stats(store.as_ref()).unwrap();
    assert_eq!(stats.total_complaints, 1);
    assert_eq!(stats.last_7_days, 1);
    assert_eq!(stats.total_clusters, 1);
    assert_eq!(stats.by_severity.len(), 3);
    assert_eq!(stats.by_category.get("Mess Food Quality"), Some(&1));
}

/// One-hot embedding per group so every group forms exactly one cluster
struct GroupProvider {
    groups: usize,
}

impl EmbeddingProvider for GroupProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let group: usize = text
            .rsplit(' ')
            .next()
            .and_then(|g| g.parse().ok())
            .ok_or_else(|| EmbeddingError::InvalidInput(text.to_string()))?;
        let mut vector = vec![0.0; self.groups];
        vector[group % self.groups] = 1.0;
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.groups
    }

    fn model_name(&self) -> &str {
        "group"
    }
}

#[test]
fn test_concurrent_submissions_never_orphan_complaints() {
    const GROUPS: usize = 4;
    const THREADS: usize = 8;
    const PER_THREAD: usize = 8;

    let store = Arc::new(MemoryStore::new());
    let dyn_store: Arc<dyn ComplaintStore> = store.clone();
    let mut config = Config::default();
    config.embedding.dimension = GROUPS;

    let generator: Arc<dyn TextGenerator> = Arc::new(DisabledGenerator);
    let lexicon = Arc::new(SeverityLexicon::builtin().unwrap());
    let pipeline = SubmissionPipeline::new(
        dyn_store.clone(),
        ComplaintClassifier::new(generator.clone(), lexicon.clone()),
        SeverityScorer::new(generator, lexicon, SeverityThresholds::default()),
        EmbeddingAdapter::new(Arc::new(GroupProvider { groups: GROUPS }), GROUPS),
        ClusterEngine::new(dyn_store, &config.clustering),
        &config,
    );

    thread::scope(|scope| {
        for t in 0..THREADS {
            let pipeline = &pipeline;
            scope.spawn(move || {
                for i in 0..PER_THREAD {
                    let text = format!("Printer queue stuck, report {} group {}", t, i);
                    pipeline
                        .submit(Submission::new(text).with_category("Other"))
                        .unwrap();
                    // Maintenance running alongside submissions
                    pipeline.engine().update_clusters().unwrap();
                }
            });
        }
    });

    let complaints = store.get_all_complaints().unwrap();
    assert_eq!(complaints.len(), THREADS * PER_THREAD);
    for complaint in &complaints {
        let cluster_id = complaint.cluster_id.expect("every complaint is clustered");
        assert!(
            store.get_cluster(cluster_id).unwrap().is_some(),
            "complaint {} references missing cluster {}",
            complaint.id,
            cluster_id
        );
    }

    let clusters = store.list_clusters().unwrap();
    assert_eq!(clusters.len(), GROUPS);
    for cluster in &clusters {
        assert_eq!(
            cluster.count,
            store.count_complaints_in_cluster(cluster.id).unwrap()
        );
    }
}
