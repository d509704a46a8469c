//! Cluster maintenance jobs
//!
//! Batch operations over the whole store. A failing item is logged and skipped;
//! only a failure to list the work aborts a job.
use super::ClusterEngine;
use crate::complaint::{Category, ClusterId, IssueCluster, Severity};
use crate::storage::{ClusterUpdate, StoreError};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

/// Reasons a merge is refused or interrupted
#[derive(Error, Debug)]
pub enum MergeError {
    #[error("Cluster {0} not found")]
    ClusterNotFound(ClusterId),

    #[error("Cannot merge cluster {0} into itself")]
    SameCluster(ClusterId),

    #[error("Cannot merge clusters with different categories ({keep} vs {absorb})")]
    CategoryMismatch { keep: Category, absorb: Category },

    #[error("Cannot merge clusters with different severity levels ({keep} vs {absorb})")]
    SeverityMismatch { keep: Severity, absorb: Severity },

    #[error("Storage error after moving {moved} complaints: {source}")]
    Storage {
        moved: usize,
        #[source]
        source: StoreError,
    },
}

/// Outcome of [`ClusterEngine::update_clusters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpdateReport {
    /// Clusters whose stored count differed from their membership
    pub updated: usize,
    /// Clusters deleted because they had no members
    pub removed: usize,
    pub failed: usize,
}

/// Outcome of [`ClusterEngine::recalculate_all_clusters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecalculationReport {
    pub reassigned: usize,
    pub failed: usize,
    pub update: UpdateReport,
    pub cleaned: usize,
}

enum Recount {
    Updated,
    Removed,
    Unchanged,
}

fn storage(moved: usize) -> impl FnOnce(StoreError) -> MergeError {
    move |source| MergeError::Storage { moved, source }
}

impl ClusterEngine {
    /// Recount every cluster from membership and delete the empty ones
    ///
    /// Idempotent: a second run without intervening writes updates nothing.
    pub fn update_clusters(&self) -> Result<UpdateReport, StoreError> {
        let clusters = self.store.list_clusters()?;
        let mut report = UpdateReport::default();

        for cluster in clusters {
            let outcome =
                self.locked(cluster.category, cluster.severity, || self.recount(&cluster));

            match outcome {
                Ok(Recount::Updated) => report.updated += 1,
                Ok(Recount::Removed) => report.removed += 1,
                Ok(Recount::Unchanged) => {}
                Err(e) => {
                    warn!("Error updating cluster {}: {}", cluster.id, e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "Updated {} clusters, removed {} empty",
            report.updated, report.removed
        );
        Ok(report)
    }

    fn recount(&self, cluster: &IssueCluster) -> Result<Recount, StoreError> {
        let count = self.store.count_complaints_in_cluster(cluster.id)?;

        if count == 0 {
            info!("Removing empty cluster {}", cluster.id);
            self.store.delete_cluster(cluster.id)?;
            Ok(Recount::Removed)
        } else if count != cluster.count {
            self.store
                .update_cluster(cluster.id, ClusterUpdate::count(count))?;
            Ok(Recount::Updated)
        } else {
            Ok(Recount::Unchanged)
        }
    }

    /// Delete clusters whose stored count is zero, without recounting
    pub fn cleanup_empty_clusters(&self) -> Result<usize, StoreError> {
        let mut deleted = 0;

        for cluster in self.store.list_clusters()? {
            if cluster.count != 0 {
                continue;
            }
            match self.locked(cluster.category, cluster.severity, || {
                self.store.delete_cluster(cluster.id)
            }) {
                Ok(()) => deleted += 1,
                Err(e) => warn!("Error deleting empty cluster {}: {}", cluster.id, e),
            }
        }

        info!("Cleaned up {} empty clusters", deleted);
        Ok(deleted)
    }

    /// Move every member of `absorb_id` into `keep_id` and delete `absorb_id`
    ///
    /// Both clusters must exist and share category and severity; a refused merge
    /// changes nothing. Returns the number of complaints moved.
    pub fn merge_clusters(
        &self,
        keep_id: ClusterId,
        absorb_id: ClusterId,
    ) -> Result<usize, MergeError> {
        if keep_id == absorb_id {
            return Err(MergeError::SameCluster(keep_id));
        }

        let keep = self
            .store
            .get_cluster(keep_id)
            .map_err(storage(0))?
            .ok_or(MergeError::ClusterNotFound(keep_id))?;
        let absorb = self
            .store
            .get_cluster(absorb_id)
            .map_err(storage(0))?
            .ok_or(MergeError::ClusterNotFound(absorb_id))?;

        if keep.category != absorb.category {
            return Err(MergeError::CategoryMismatch {
                keep: keep.category,
                absorb: absorb.category,
            });
        }
        if keep.severity != absorb.severity {
            return Err(MergeError::SeverityMismatch {
                keep: keep.severity,
                absorb: absorb.severity,
            });
        }

        let moved = self.locked(keep.category, keep.severity, || {
            self.move_members(keep_id, absorb_id)
        })?;

        info!(
            "Merged cluster {} into {}, moved {} complaints",
            absorb_id, keep_id, moved
        );
        Ok(moved)
    }

    fn move_members(
        &self,
        keep_id: ClusterId,
        absorb_id: ClusterId,
    ) -> Result<usize, MergeError> {
        let members = self
            .store
            .get_complaints_by_cluster(absorb_id)
            .map_err(storage(0))?;

        let mut moved = 0;
        for complaint in &members {
            self.store
                .update_complaint_cluster_ref(complaint.id, Some(keep_id))
                .map_err(storage(moved))?;
            moved += 1;
        }

        self.store.delete_cluster(absorb_id).map_err(storage(moved))?;

        let count = self
            .store
            .count_complaints_in_cluster(keep_id)
            .map_err(storage(moved))?;
        self.store
            .update_cluster(keep_id, ClusterUpdate::count(count))
            .map_err(storage(moved))?;

        Ok(moved)
    }

    /// Re-run assignment for every complaint, then converge cluster bookkeeping
    pub fn recalculate_all_clusters(&self) -> Result<RecalculationReport, StoreError> {
        let complaints = self.store.get_all_complaints()?;
        let mut report = RecalculationReport::default();

        for complaint in &complaints {
            match self.assign_and_attach(complaint) {
                Some(cluster_id) if Some(cluster_id) == complaint.cluster_id => {}
                Some(_) => report.reassigned += 1,
                None => {
                    warn!("Could not reassign complaint {}", complaint.id);
                    report.failed += 1;
                }
            }
        }

        report.update = self.update_clusters()?;
        report.cleaned = self.cleanup_empty_clusters()?;

        info!(
            "Recalculated clusters, reassigned {} complaints",
            report.reassigned
        );
        Ok(report)
    }
}
