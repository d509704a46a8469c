//! In-memory complaint store
use super::{ClusterUpdate, ComplaintStore, StoreError, StoreResult, StoreStats};
use crate::complaint::{
    Category, ClusterId, Complaint, ComplaintId, IssueCluster, NewComplaint, Severity,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct State {
    complaints: BTreeMap<ComplaintId, Complaint>,
    clusters: BTreeMap<ClusterId, IssueCluster>,
    last_complaint_id: ComplaintId,
    last_cluster_id: ClusterId,
}

/// Store backed by ordered maps behind a lock; ids start at 1
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, State>> {
        self.state.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, State>> {
        self.state.write().map_err(|_| StoreError::Poisoned)
    }
}

fn newest_first(complaints: &mut [Complaint]) {
    complaints.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

impl ComplaintStore for MemoryStore {
    fn find_clusters_by(
        &self,
        category: Category,
        severity: Severity,
    ) -> StoreResult<Vec<IssueCluster>> {
        Ok(self
            .read()?
            .clusters
            .values()
            .filter(|c| c.category == category && c.severity == severity)
            .cloned()
            .collect())
    }

    fn get_cluster(&self, id: ClusterId) -> StoreResult<Option<IssueCluster>> {
        Ok(self.read()?.clusters.get(&id).cloned())
    }

    fn create_cluster(
        &self,
        name: &str,
        category: Category,
        severity: Severity,
        count: u32,
    ) -> StoreResult<IssueCluster> {
        let mut state = self.write()?;
        state.last_cluster_id += 1;
        let cluster = IssueCluster {
            id: state.last_cluster_id,
            name: name.to_string(),
            category,
            severity,
            count,
            last_updated: Utc::now(),
        };
        state.clusters.insert(cluster.id, cluster.clone());
        Ok(cluster)
    }

    fn update_cluster(&self, id: ClusterId, update: ClusterUpdate) -> StoreResult<()> {
        let mut state = self.write()?;
        let cluster = state
            .clusters
            .get_mut(&id)
            .ok_or(StoreError::ClusterNotFound(id))?;
        if let Some(count) = update.count {
            cluster.count = count;
        }
        if let Some(last_updated) = update.last_updated {
            cluster.last_updated = last_updated;
        }
        Ok(())
    }

    fn delete_cluster(&self, id: ClusterId) -> StoreResult<()> {
        self.write()?
            .clusters
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::ClusterNotFound(id))
    }

    fn get_recent_complaints_in_cluster(
        &self,
        cluster_id: ClusterId,
        limit: usize,
    ) -> StoreResult<Vec<Complaint>> {
        let mut members = self.get_complaints_by_cluster(cluster_id)?;
        newest_first(&mut members);
        members.truncate(limit);
        Ok(members)
    }

    fn get_complaints_by_cluster(&self, cluster_id: ClusterId) -> StoreResult<Vec<Complaint>> {
        Ok(self
            .read()?
            .complaints
            .values()
            .filter(|c| c.cluster_id == Some(cluster_id))
            .cloned()
            .collect())
    }

    fn update_complaint_cluster_ref(
        &self,
        complaint_id: ComplaintId,
        cluster_id: Option<ClusterId>,
    ) -> StoreResult<()> {
        let mut state = self.write()?;
        let complaint = state
            .complaints
            .get_mut(&complaint_id)
            .ok_or(StoreError::ComplaintNotFound(complaint_id))?;
        complaint.cluster_id = cluster_id;
        Ok(())
    }

    fn get_all_complaints(&self) -> StoreResult<Vec<Complaint>> {
        Ok(self.read()?.complaints.values().cloned().collect())
    }

    fn insert_complaint(&self, complaint: NewComplaint) -> StoreResult<Complaint> {
        let mut state = self.write()?;
        state.last_complaint_id += 1;
        let complaint = complaint.into_complaint(state.last_complaint_id);
        state.complaints.insert(complaint.id, complaint.clone());
        Ok(complaint)
    }

    fn get_complaint(&self, id: ComplaintId) -> StoreResult<Option<Complaint>> {
        Ok(self.read()?.complaints.get(&id).cloned())
    }

    fn list_clusters(&self) -> StoreResult<Vec<IssueCluster>> {
        Ok(self.read()?.clusters.values().cloned().collect())
    }

    fn count_complaints_in_cluster(&self, cluster_id: ClusterId) -> StoreResult<u32> {
        Ok(self
            .read()?
            .complaints
            .values()
            .filter(|c| c.cluster_id == Some(cluster_id))
            .count() as u32)
    }

    fn increment_upvotes(&self, complaint_id: ComplaintId) -> StoreResult<u32> {
        let mut state = self.write()?;
        let complaint = state
            .complaints
            .get_mut(&complaint_id)
            .ok_or(StoreError::ComplaintNotFound(complaint_id))?;
        complaint.upvotes += 1;
        Ok(complaint.upvotes)
    }

    fn stats(&self, since: DateTime<Utc>) -> StoreResult<StoreStats> {
        let state = self.read()?;
        let mut stats = StoreStats {
            total_complaints: state.complaints.len() as u32,
            cluster_count: state.clusters.len() as u32,
            ..StoreStats::default()
        };

        for complaint in state.complaints.values() {
            *stats
                .by_severity
                .entry(complaint.severity.as_str().to_string())
                .or_insert(0) += 1;
            *stats
                .by_category
                .entry(complaint.category.as_str().to_string())
                .or_insert(0) += 1;
            if complaint.created_at >= since {
                stats.recent_complaints += 1;
            }
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn complaint(text: &str) -> NewComplaint {
        NewComplaint::new(text, text, Category::CampusWifi, Severity::Medium)
    }

    #[test]
    fn test_ids_are_sequential() {
        let store = MemoryStore::new();
        let a = store.insert_complaint(complaint("a")).unwrap();
        let b = store.insert_complaint(complaint("b")).unwrap();
        assert_eq!((a.id, b.id), (1, 2));
        assert_eq!(a.upvotes, 0);
    }

    #[test]
    fn test_recent_members_newest_first() {
        let store = MemoryStore::new();
        let cluster = store
            .create_cluster("Campus Wi-Fi - MEDIUM", Category::CampusWifi, Severity::Medium, 0)
            .unwrap();
        let now = Utc::now();

        for hours in [3, 1, 2] {
            let c = store
                .insert_complaint(complaint("x").with_created_at(now - Duration::hours(hours)))
                .unwrap();
            store
                .update_complaint_cluster_ref(c.id, Some(cluster.id))
                .unwrap();
        }

        let recent = store
            .get_recent_complaints_in_cluster(cluster.id, 2)
            .unwrap();
        let ids: Vec<ComplaintId> = recent.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn test_missing_records() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.update_cluster(9, ClusterUpdate::count(1)),
            Err(StoreError::ClusterNotFound(9))
        ));
        assert!(matches!(
            store.increment_upvotes(4),
            Err(StoreError::ComplaintNotFound(4))
        ));
        assert!(store.get_cluster(1).unwrap().is_none());
    }

    #[test]
    fn test_upvotes() {
        let store = MemoryStore::new();
        let c = store.insert_complaint(complaint("a")).unwrap();
        store.increment_upvotes(c.id).unwrap();
        assert_eq!(store.increment_upvotes(c.id).unwrap(), 2);
    }

    #[test]
    fn test_stats() {
        let store = MemoryStore::new();
        let old = Utc::now() - Duration::days(30);
        store.insert_complaint(complaint("a")).unwrap();
        store
            .insert_complaint(
                NewComplaint::new("b", "b", Category::MedicalCenter, Severity::High)
                    .with_created_at(old),
            )
            .unwrap();

        let stats = store.stats(Utc::now() - Duration::days(7)).unwrap();
        assert_eq!(stats.total_complaints, 2);
        assert_eq!(stats.recent_complaints, 1);
        assert_eq!(stats.by_severity.get("high"), Some(&1));
        assert_eq!(stats.by_category.get("Campus Wi-Fi"), Some(&1));
    }
}
