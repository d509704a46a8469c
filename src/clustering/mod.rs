//! Incremental complaint clustering
//!
//! A complaint joins the existing cluster of the same category and severity whose
//! recent members it most resembles, provided the average cosine similarity reaches
//! the configured threshold. Otherwise a new cluster is created. Clustering is
//! best-effort: storage failures fall back to creating a cluster, and a failure to
//! create one leaves the complaint unclustered.

mod maintenance;
mod views;

pub use maintenance::{MergeError, RecalculationReport, UpdateReport};
pub use views::{
    cluster_summary, dashboard_stats, trending_clusters, ClusterSummary, DashboardStats,
    SummaryComplaint, TrendingCluster,
};

use crate::complaint::{Category, ClusterId, Complaint, IssueCluster, Severity};
use crate::config::ClusteringConfig;
use crate::embedding::{cosine_similarity, is_zero_vector};
use crate::storage::{ClusterUpdate, ComplaintStore, StoreResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

type KeyLock = Arc<Mutex<()>>;

/// Best candidate found by the similarity search
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterMatch {
    pub cluster_id: ClusterId,
    pub affinity: f32,
}

/// Where a complaint landed
#[derive(Debug, Clone, Copy)]
struct Placement {
    cluster_id: ClusterId,
    created: bool,
}

impl Placement {
    fn created(cluster: IssueCluster) -> Self {
        Self {
            cluster_id: cluster.id,
            created: true,
        }
    }

    fn joined(cluster_id: ClusterId) -> Self {
        Self {
            cluster_id,
            created: false,
        }
    }
}

/// Assigns complaints to clusters and runs the maintenance jobs
pub struct ClusterEngine {
    store: Arc<dyn ComplaintStore>,
    similarity_threshold: f32,
    sample_size: usize,
    /// One lock per (category, severity), held by assignment and by every
    /// maintenance step that touches a cluster of that key
    key_locks: Mutex<HashMap<(Category, Severity), KeyLock>>,
}

impl ClusterEngine {
    pub fn new(store: Arc<dyn ComplaintStore>, config: &ClusteringConfig) -> Self {
        Self {
            store,
            similarity_threshold: config.similarity_threshold,
            sample_size: config.sample_size,
            key_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn ComplaintStore> {
        &self.store
    }

    pub fn similarity_threshold(&self) -> f32 {
        self.similarity_threshold
    }

    fn key_lock(&self, category: Category, severity: Severity) -> KeyLock {
        let mut locks = self
            .key_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks.entry((category, severity)).or_default().clone()
    }

    /// Run `f` while holding the lock for one (category, severity) key
    ///
    /// Not reentrant: `f` must not call back into a locking engine method.
    pub(crate) fn locked<T>(
        &self,
        category: Category,
        severity: Severity,
        f: impl FnOnce() -> T,
    ) -> T {
        let lock = self.key_lock(category, severity);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }

    /// Find or create the cluster for `complaint`
    ///
    /// Only decides; the complaint's reference is left untouched. Submission and
    /// recalculation go through [`ClusterEngine::assign_and_attach`]. Returns `None`
    /// only when the store could not create a cluster either.
    pub fn assign_cluster(&self, complaint: &Complaint) -> Option<ClusterId> {
        self.locked(complaint.category, complaint.severity, || {
            self.place(complaint).map(|placement| placement.cluster_id)
        })
    }

    /// Find or create the cluster for `complaint` and record the membership
    ///
    /// Placement, the reference write and the count refresh all happen under the
    /// key lock, so neither another submission nor a maintenance job can observe a
    /// new cluster before its first member is attached. A joined cluster gets its
    /// count recomputed and `last_updated` stamped. Returns `None` when no cluster
    /// could be created or the reference could not be written; the complaint then
    /// stays without a cluster.
    pub fn assign_and_attach(&self, complaint: &Complaint) -> Option<ClusterId> {
        self.locked(complaint.category, complaint.severity, || {
            let placement = self.place(complaint)?;
            if Some(placement.cluster_id) == complaint.cluster_id {
                return Some(placement.cluster_id);
            }

            if let Err(e) = self
                .store
                .update_complaint_cluster_ref(complaint.id, Some(placement.cluster_id))
            {
                warn!(
                    "Could not attach complaint {} to cluster {}: {}",
                    complaint.id, placement.cluster_id, e
                );
                if placement.created {
                    self.discard(placement.cluster_id);
                }
                return None;
            }

            if !placement.created {
                self.refresh_count(placement.cluster_id);
            }
            Some(placement.cluster_id)
        })
    }

    fn place(&self, complaint: &Complaint) -> Option<Placement> {
        match self.find_or_create(complaint) {
            Ok(placement) => Some(placement),
            Err(e) => {
                warn!(
                    "Clustering failed for complaint {}, creating a new cluster: {}",
                    complaint.id, e
                );
                self.create_new_cluster(complaint.category, complaint.severity)
                    .map(Placement::created)
                    .map_err(|e| {
                        warn!("Could not create cluster for complaint {}: {}", complaint.id, e)
                    })
                    .ok()
            }
        }
    }

    /// Recount a cluster after a join; the next maintenance run repairs a failure
    fn refresh_count(&self, cluster_id: ClusterId) {
        let result = self
            .store
            .count_complaints_in_cluster(cluster_id)
            .and_then(|count| {
                self.store
                    .update_cluster(cluster_id, ClusterUpdate::count(count))
            });
        if let Err(e) = result {
            warn!("Could not refresh count of cluster {}: {}", cluster_id, e);
        }
    }

    /// Drop a cluster created for a complaint that could not be attached
    fn discard(&self, cluster_id: ClusterId) {
        if let Err(e) = self.store.delete_cluster(cluster_id) {
            warn!("Could not remove unused cluster {}: {}", cluster_id, e);
        }
    }

    fn find_or_create(&self, complaint: &Complaint) -> StoreResult<Placement> {
        let candidates = self
            .store
            .find_clusters_by(complaint.category, complaint.severity)?;

        if candidates.is_empty() {
            return self
                .create_new_cluster(complaint.category, complaint.severity)
                .map(Placement::created);
        }

        let target = match complaint.embedding.as_deref() {
            Some(embedding) if !is_zero_vector(embedding) => embedding,
            _ => {
                // Known simplification: no similarity signal, take the first candidate
                let first = candidates[0].id;
                debug!(
                    "Complaint {} has no embedding, using first candidate cluster {}",
                    complaint.id, first
                );
                return Ok(Placement::joined(first));
            }
        };

        match self.best_match(target, &candidates)? {
            Some(best) if best.affinity >= self.similarity_threshold => {
                debug!(
                    "Complaint {} joins cluster {} (affinity {:.4})",
                    complaint.id, best.cluster_id, best.affinity
                );
                Ok(Placement::joined(best.cluster_id))
            }
            best => {
                debug!(
                    "Best affinity {:?} below threshold {}, creating cluster",
                    best.map(|b| b.affinity),
                    self.similarity_threshold
                );
                self.create_new_cluster(complaint.category, complaint.severity)
                    .map(Placement::created)
            }
        }
    }

    /// Candidate with the highest average similarity to its recent members
    ///
    /// Members without an embedding and similarities outside [0, 1] are ignored;
    /// clusters with no usable member are skipped.
    pub fn best_match(
        &self,
        target: &[f32],
        candidates: &[IssueCluster],
    ) -> StoreResult<Option<ClusterMatch>> {
        let mut best: Option<ClusterMatch> = None;

        for cluster in candidates {
            let members = self
                .store
                .get_recent_complaints_in_cluster(cluster.id, self.sample_size)?;

            let similarities: Vec<f32> = members
                .iter()
                .filter_map(|member| member.embedding.as_deref())
                .map(|embedding| cosine_similarity(target, embedding))
                .filter(|sim| (0.0..=1.0).contains(sim))
                .collect();

            if similarities.is_empty() {
                continue;
            }

            let affinity = similarities.iter().sum::<f32>() / similarities.len() as f32;
            if affinity > best.map_or(0.0, |b| b.affinity) {
                best = Some(ClusterMatch {
                    cluster_id: cluster.id,
                    affinity,
                });
            }
        }

        Ok(best)
    }

    /// Create a cluster named "{category} - {SEVERITY}" with one member
    pub fn create_new_cluster(
        &self,
        category: Category,
        severity: Severity,
    ) -> StoreResult<IssueCluster> {
        let name = IssueCluster::display_name(category, severity);
        let cluster = self.store.create_cluster(&name, category, severity, 1)?;
        info!("Created new cluster {}: {}", cluster.id, cluster.name);
        Ok(cluster)
    }
}
