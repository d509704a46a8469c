//! Storage layer for complaints and issue clusters
//!
//! The clustering core only talks to [`ComplaintStore`]. Two backends exist:
//! an in-memory store for tests and ephemeral runs, and a SQLite store for the
//! CLI. Every method is an atomic single-record operation; multi-step jobs
//! tolerate partial completion.

pub mod database;
pub mod memory;

use crate::complaint::{
    Category, ClusterId, Complaint, ComplaintId, IssueCluster, NewComplaint, Severity,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

pub use database::SqliteStore;
pub use memory::MemoryStore;

/// Errors from storage backends
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("cluster {0} not found")]
    ClusterNotFound(ClusterId),

    #[error("complaint {0} not found")]
    ComplaintNotFound(ComplaintId),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("store lock poisoned")]
    Poisoned,
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Fields that may change on a cluster record
#[derive(Debug, Clone, Default)]
pub struct ClusterUpdate {
    pub count: Option<u32>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl ClusterUpdate {
    /// New member count, stamped now
    pub fn count(count: u32) -> Self {
        Self {
            count: Some(count),
            last_updated: Some(Utc::now()),
        }
    }
}

/// Aggregate complaint counts
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreStats {
    pub total_complaints: u32,
    pub by_severity: BTreeMap<String, u32>,
    pub by_category: BTreeMap<String, u32>,
    pub cluster_count: u32,
    /// Complaints created at or after the `since` cutoff
    pub recent_complaints: u32,
}

/// Storage interface consumed by the clustering engine and maintenance jobs
pub trait ComplaintStore: Send + Sync {
    /// Clusters with exactly this category and severity, oldest id first
    fn find_clusters_by(
        &self,
        category: Category,
        severity: Severity,
    ) -> StoreResult<Vec<IssueCluster>>;

    fn get_cluster(&self, id: ClusterId) -> StoreResult<Option<IssueCluster>>;

    /// Create a cluster and assign its id
    fn create_cluster(
        &self,
        name: &str,
        category: Category,
        severity: Severity,
        count: u32,
    ) -> StoreResult<IssueCluster>;

    fn update_cluster(&self, id: ClusterId, update: ClusterUpdate) -> StoreResult<()>;

    fn delete_cluster(&self, id: ClusterId) -> StoreResult<()>;

    /// Up to `limit` members, newest first
    fn get_recent_complaints_in_cluster(
        &self,
        cluster_id: ClusterId,
        limit: usize,
    ) -> StoreResult<Vec<Complaint>>;

    /// Every member of a cluster
    fn get_complaints_by_cluster(&self, cluster_id: ClusterId) -> StoreResult<Vec<Complaint>>;

    fn update_complaint_cluster_ref(
        &self,
        complaint_id: ComplaintId,
        cluster_id: Option<ClusterId>,
    ) -> StoreResult<()>;

    /// Every complaint, oldest id first
    fn get_all_complaints(&self) -> StoreResult<Vec<Complaint>>;

    fn insert_complaint(&self, complaint: NewComplaint) -> StoreResult<Complaint>;

    fn get_complaint(&self, id: ComplaintId) -> StoreResult<Option<Complaint>>;

    /// Every cluster, oldest id first
    fn list_clusters(&self) -> StoreResult<Vec<IssueCluster>>;

    fn count_complaints_in_cluster(&self, cluster_id: ClusterId) -> StoreResult<u32>;

    /// Add one upvote and return the new total
    fn increment_upvotes(&self, complaint_id: ComplaintId) -> StoreResult<u32>;

    fn stats(&self, since: DateTime<Utc>) -> StoreResult<StoreStats>;
}

impl<T: ComplaintStore + ?Sized> ComplaintStore for std::sync::Arc<T> {
    fn find_clusters_by(
        &self,
        category: Category,
        severity: Severity,
    ) -> StoreResult<Vec<IssueCluster>> {
        (**self).find_clusters_by(category, severity)
    }

    fn get_cluster(&self, id: ClusterId) -> StoreResult<Option<IssueCluster>> {
        (**self).get_cluster(id)
    }

    fn create_cluster(
        &self,
        name: &str,
        category: Category,
        severity: Severity,
        count: u32,
    ) -> StoreResult<IssueCluster> {
        (**self).create_cluster(name, category, severity, count)
    }

    fn update_cluster(&self, id: ClusterId, update: ClusterUpdate) -> StoreResult<()> {
        (**self).update_cluster(id, update)
    }

    fn delete_cluster(&self, id: ClusterId) -> StoreResult<()> {
        (**self).delete_cluster(id)
    }

    fn get_recent_complaints_in_cluster(
        &self,
        cluster_id: ClusterId,
        limit: usize,
    ) -> StoreResult<Vec<Complaint>> {
        (**self).get_recent_complaints_in_cluster(cluster_id, limit)
    }

    fn get_complaints_by_cluster(&self, cluster_id: ClusterId) -> StoreResult<Vec<Complaint>> {
        (**self).get_complaints_by_cluster(cluster_id)
    }

    fn update_complaint_cluster_ref(
        &self,
        complaint_id: ComplaintId,
        cluster_id: Option<ClusterId>,
    ) -> StoreResult<()> {
        (**self).update_complaint_cluster_ref(complaint_id, cluster_id)
    }

    fn get_all_complaints(&self) -> StoreResult<Vec<Complaint>> {
        (**self).get_all_complaints()
    }

    fn insert_complaint(&self, complaint: NewComplaint) -> StoreResult<Complaint> {
        (**self).insert_complaint(complaint)
    }

    fn get_complaint(&self, id: ComplaintId) -> StoreResult<Option<Complaint>> {
        (**self).get_complaint(id)
    }

    fn list_clusters(&self) -> StoreResult<Vec<IssueCluster>> {
        (**self).list_clusters()
    }

    fn count_complaints_in_cluster(&self, cluster_id: ClusterId) -> StoreResult<u32> {
        (**self).count_complaints_in_cluster(cluster_id)
    }

    fn increment_upvotes(&self, complaint_id: ComplaintId) -> StoreResult<u32> {
        (**self).increment_upvotes(complaint_id)
    }

    fn stats(&self, since: DateTime<Utc>) -> StoreResult<StoreStats> {
        (**self).stats(since)
    }
}
