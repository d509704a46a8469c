use grievance::clustering::{ClusterEngine, MergeError};
use grievance::complaint::{Category, ClusterId, Complaint, NewComplaint, Severity};
use grievance::config::ClusteringConfig;
use grievance::storage::{ClusterUpdate, ComplaintStore, MemoryStore};
use std::sync::Arc;

fn engine_with_threshold(threshold: f32) -> (ClusterEngine, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let config = ClusteringConfig {
        similarity_threshold: threshold,
        sample_size: 5,
    };
    (ClusterEngine::new(store.clone(), &config), store)
}

fn insert(
    store: &MemoryStore,
    category: Category,
    severity: Severity,
    embedding: Option<Vec<f32>>,
) -> Complaint {
    let mut new = NewComplaint::new("raw", "formal", category, severity);
    new.embedding = embedding;
    store.insert_complaint(new).expect("insert complaint")
}

/// Insert a complaint and cluster it the way submission does
fn submit(
    engine: &ClusterEngine,
    store: &MemoryStore,
    category: Category,
    severity: Severity,
    embedding: Vec<f32>,
) -> ClusterId {
    let complaint = insert(store, category, severity, Some(embedding));
    engine.assign_and_attach(&complaint).expect("cluster assigned")
}

#[test]
fn test_first_complaint_creates_named_cluster() {
    let (engine, store) = engine_with_threshold(0.75);
    let cluster_id = submit(
        &engine,
        &store,
        Category::MedicalCenter,
        Severity::High,
        vec![1.0, 0.0, 0.0],
    );

    let cluster = store.get_cluster(cluster_id).unwrap().unwrap();
    assert_eq!(cluster.name, "Medical Center - HIGH");
    assert_eq!(cluster.count, 1);
    assert_eq!(cluster.category, Category::MedicalCenter);
    assert_eq!(cluster.severity, Severity::High);
}

#[test]
fn test_affinity_equal_to_threshold_joins() {
    let (engine, store) = engine_with_threshold(0.75);
    let first = submit(
        &engine,
        &store,
        Category::CampusWifi,
        Severity::Low,
        vec![1.0, 1.0, 1.0, 1.0, 0.0],
    );
    let second = submit(
        &engine,
        &store,
        Category::CampusWifi,
        Severity::Low,
        vec![1.0, 1.0, 1.0, 0.0, 1.0],
    );
    assert_eq!(first, second);
}

#[test]
fn test_affinity_below_threshold_creates_cluster() {
    let (engine, store) = engine_with_threshold(0.7501);
    let first = submit(
        &engine,
        &store,
        Category::CampusWifi,
        Severity::Low,
        vec![1.0, 1.0, 1.0, 1.0, 0.0],
    );
    let second = submit(
        &engine,
        &store,
        Category::CampusWifi,
        Severity::Low,
        vec![1.0, 1.0, 1.0, 0.0, 1.0],
    );
    assert_ne!(first, second);
    assert_eq!(store.list_clusters().unwrap().len(), 2);
}

#[test]
fn test_affinity_just_under_threshold_creates_cluster() {
    let (engine, store) = engine_with_threshold(0.75);
    let first = submit(
        &engine,
        &store,
        Category::PlacementCdc,
        Severity::Medium,
        vec![1.0, 0.0],
    );
    let cosine: f32 = 0.7499;
    let second = submit(
        &engine,
        &store,
        Category::PlacementCdc,
        Severity::Medium,
        vec![cosine, (1.0 - cosine * cosine).sqrt()],
    );
    assert_ne!(first, second);
}

#[test]
fn test_clusters_never_mix_severity() {
    let (engine, store) = engine_with_threshold(0.75);
    let embedding = vec![0.5, 0.5, 0.5];
    let low = submit(
        &engine,
        &store,
        Category::HostelMaintenance,
        Severity::Low,
        embedding.clone(),
    );
    let high = submit(
        &engine,
        &store,
        Category::HostelMaintenance,
        Severity::High,
        embedding,
    );
    assert_ne!(low, high);
}

#[test]
fn test_near_duplicates_share_a_cluster() {
    let (engine, store) = engine_with_threshold(0.75);
    let third = 1.0 / 3.0;
    let vectors = [
        vec![1.0, third, 0.0, 0.0],
        vec![1.0, 0.0, third, 0.0],
        vec![1.0, 0.0, 0.0, third],
    ];

    let ids: Vec<ClusterId> = vectors
        .iter()
        .map(|v| {
            submit(
                &engine,
                &store,
                Category::MessFoodQuality,
                Severity::Medium,
                v.clone(),
            )
        })
        .collect();

    assert!(ids.iter().all(|id| *id == ids[0]));
    assert_eq!(store.get_cluster(ids[0]).unwrap().unwrap().count, 3);
    assert_eq!(engine.update_clusters().unwrap(), Default::default());
    assert_eq!(store.get_cluster(ids[0]).unwrap().unwrap().count, 3);
}

#[test]
fn test_update_clusters_is_idempotent() {
    let (engine, store) = engine_with_threshold(0.75);
    let kept = submit(
        &engine,
        &store,
        Category::Other,
        Severity::Low,
        vec![1.0, 0.0],
    );
    submit(&engine, &store, Category::Other, Severity::Low, vec![0.9, 0.1]);
    let orphan = store
        .create_cluster("Other - LOW", Category::Other, Severity::Low, 4)
        .unwrap();

    let first = engine.update_clusters().unwrap();
    assert_eq!(first.removed, 1);
    assert!(store.get_cluster(orphan.id).unwrap().is_none());
    assert_eq!(store.get_cluster(kept).unwrap().unwrap().count, 2);

    let snapshot = store.list_clusters().unwrap();
    let second = engine.update_clusters().unwrap();
    assert_eq!(second.removed, 0);
    let after = store.list_clusters().unwrap();
    assert_eq!(
        snapshot.iter().map(|c| (c.id, c.count)).collect::<Vec<_>>(),
        after.iter().map(|c| (c.id, c.count)).collect::<Vec<_>>()
    );
}

#[test]
fn test_cleanup_removes_zero_count_clusters() {
    let (engine, store) = engine_with_threshold(0.75);
    let empty = store
        .create_cluster("Other - LOW", Category::Other, Severity::Low, 1)
        .unwrap();
    store
        .update_cluster(empty.id, ClusterUpdate::count(0))
        .unwrap();
    let busy = submit(&engine, &store, Category::Other, Severity::Medium, vec![1.0]);

    assert_eq!(engine.cleanup_empty_clusters().unwrap(), 1);
    assert!(store.get_cluster(empty.id).unwrap().is_none());
    assert!(store.get_cluster(busy).unwrap().is_some());
}

#[test]
fn test_merge_moves_members_and_deletes_absorbed() {
    let (engine, store) = engine_with_threshold(0.75);
    let keep = submit(&engine, &store, Category::CampusWifi, Severity::Low, vec![1.0, 0.0]);
    let absorb = submit(&engine, &store, Category::CampusWifi, Severity::Low, vec![0.0, 1.0]);
    assert_ne!(keep, absorb);

    let moved = engine.merge_clusters(keep, absorb).unwrap();
    assert_eq!(moved, 1);
    assert!(store.get_cluster(absorb).unwrap().is_none());
    assert_eq!(store.get_cluster(keep).unwrap().unwrap().count, 2);
    assert_eq!(store.get_complaints_by_cluster(keep).unwrap().len(), 2);
}

#[test]
fn test_merge_category_mismatch_changes_nothing() {
    let (engine, store) = engine_with_threshold(0.75);
    let wifi = submit(&engine, &store, Category::CampusWifi, Severity::Low, vec![1.0]);
    let mess = submit(&engine, &store, Category::MessFoodQuality, Severity::Low, vec![1.0]);
    let before = store.list_clusters().unwrap();

    let err = engine.merge_clusters(wifi, mess).unwrap_err();
    assert!(matches!(err, MergeError::CategoryMismatch { .. }));
    assert_eq!(store.list_clusters().unwrap(), before);
    assert_eq!(store.get_complaints_by_cluster(mess).unwrap().len(), 1);
}

#[test]
fn test_merge_missing_cluster() {
    let (engine, store) = engine_with_threshold(0.75);
    let keep = submit(&engine, &store, Category::Other, Severity::Low, vec![1.0]);
    let err = engine.merge_clusters(keep, 999).unwrap_err();
    assert!(matches!(err, MergeError::ClusterNotFound(999)));
}

#[test]
fn test_recalculate_rebuilds_membership() {
    let (engine, store) = engine_with_threshold(0.75);
    for v in [vec![1.0, 0.0], vec![0.95, 0.05], vec![0.0, 1.0]] {
        insert(&store, Category::FacultyConcerns, Severity::Medium, Some(v));
    }

    let report = engine.recalculate_all_clusters().unwrap();
    assert_eq!(report.failed, 0);

    let clusters = store.list_clusters().unwrap();
    let total: u32 = clusters.iter().map(|c| c.count).sum();
    assert_eq!(total, 3);
    assert!(clusters.iter().all(|c| c.count > 0));
    assert!(store
        .get_all_complaints()
        .unwrap()
        .iter()
        .all(|c| c.cluster_id.is_some()));
}
