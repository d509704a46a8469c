//! Read-only views over clusters for dashboards and the CLI
use crate::complaint::{Category, ClusterId, ComplaintId, IssueCluster, Severity};
use crate::storage::{ComplaintStore, StoreResult};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize)]
pub struct SummaryComplaint {
    pub id: ComplaintId,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub upvotes: u32,
}

/// Cluster header plus its newest complaints
#[derive(Debug, Clone, Serialize)]
pub struct ClusterSummary {
    pub id: ClusterId,
    pub name: String,
    pub category: Category,
    pub severity: Severity,
    pub count: u32,
    pub last_updated: DateTime<Utc>,
    pub complaints: Vec<SummaryComplaint>,
}

pub fn cluster_summary(
    store: &dyn ComplaintStore,
    cluster_id: ClusterId,
    max_complaints: usize,
) -> StoreResult<Option<ClusterSummary>> {
    let Some(cluster) = store.get_cluster(cluster_id)? else {
        return Ok(None);
    };

    let complaints = store
        .get_recent_complaints_in_cluster(cluster_id, max_complaints)?
        .into_iter()
        .map(|c| SummaryComplaint {
            id: c.id,
            text: c.rewritten_text,
            created_at: c.created_at,
            upvotes: c.upvotes,
        })
        .collect();

    Ok(Some(ClusterSummary {
        id: cluster.id,
        name: cluster.name,
        category: cluster.category,
        severity: cluster.severity,
        count: cluster.count,
        last_updated: cluster.last_updated,
        complaints,
    }))
}

/// A cluster with its activity inside the trending window
#[derive(Debug, Clone, Serialize)]
pub struct TrendingCluster {
    pub cluster: IssueCluster,
    pub recent_count: u32,
}

/// Clusters updated in the last `days`, ranked by complaints created in that window
///
/// Ties keep the older cluster first. Clusters without recent complaints are left out.
pub fn trending_clusters(
    store: &dyn ComplaintStore,
    days: i64,
    limit: usize,
) -> StoreResult<Vec<TrendingCluster>> {
    let cutoff = Utc::now() - Duration::days(days);
    let mut trending = Vec::new();

    for cluster in store.list_clusters()? {
        if cluster.last_updated < cutoff {
            continue;
        }

        let recent_count = store
            .get_complaints_by_cluster(cluster.id)?
            .iter()
            .filter(|c| c.created_at >= cutoff)
            .count() as u32;

        if recent_count > 0 {
            trending.push(TrendingCluster {
                cluster,
                recent_count,
            });
        }
    }

    trending.sort_by(|a, b| b.recent_count.cmp(&a.recent_count));
    trending.truncate(limit);
    Ok(trending)
}

/// Totals for the admin dashboard
#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub total_complaints: u32,
    /// Always carries all three tiers, zero-filled
    pub by_severity: BTreeMap<String, u32>,
    /// Only categories with at least one complaint
    pub by_category: BTreeMap<String, u32>,
    pub total_clusters: u32,
    pub last_7_days: u32,
}

pub fn dashboard_stats(store: &dyn ComplaintStore) -> StoreResult<DashboardStats> {
    let stats = store.stats(Utc::now() - Duration::days(7))?;

    let mut by_severity = stats.by_severity;
    for severity in Severity::ALL {
        by_severity.entry(severity.as_str().to_string()).or_insert(0);
    }

    Ok(DashboardStats {
        total_complaints: stats.total_complaints,
        by_severity,
        by_category: stats.by_category,
        total_clusters: stats.cluster_count,
        last_7_days: stats.recent_complaints,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::complaint::NewComplaint;
    use crate::storage::{ClusterUpdate, MemoryStore};

    fn member(store: &MemoryStore, cluster_id: ClusterId, age_days: i64) {
        let complaint = store
            .insert_complaint(
                NewComplaint::new("raw", "formal", Category::CampusWifi, Severity::Low)
                    .with_created_at(Utc::now() - Duration::days(age_days)),
            )
            .unwrap();
        store
            .update_complaint_cluster_ref(complaint.id, Some(cluster_id))
            .unwrap();
    }

    #[test]
    fn test_summary() {
        let store = MemoryStore::new();
        let cluster = store
            .create_cluster("Campus Wi-Fi - LOW", Category::CampusWifi, Severity::Low, 3)
            .unwrap();
        for age in [3, 1, 2] {
            member(&store, cluster.id, age);
        }

        let summary = cluster_summary(&store, cluster.id, 2).unwrap().unwrap();
        assert_eq!(summary.name, "Campus Wi-Fi - LOW");
        assert_eq!(summary.complaints.len(), 2);
        assert_eq!(summary.complaints[0].id, 2);
        assert_eq!(summary.complaints[0].text, "formal");

        assert!(cluster_summary(&store, 42, 5).unwrap().is_none());
    }

    #[test]
    fn test_trending_ranks_by_recent_activity() {
        let store = MemoryStore::new();
        let quiet = store
            .create_cluster("a", Category::CampusWifi, Severity::Low, 0)
            .unwrap();
        let busy = store
            .create_cluster("b", Category::CampusWifi, Severity::Low, 0)
            .unwrap();
        let stale = store
            .create_cluster("c", Category::CampusWifi, Severity::Low, 0)
            .unwrap();

        member(&store, quiet.id, 1);
        member(&store, quiet.id, 30);
        member(&store, busy.id, 1);
        member(&store, busy.id, 2);
        member(&store, stale.id, 1);
        store
            .update_cluster(
                stale.id,
                ClusterUpdate {
                    count: None,
                    last_updated: Some(Utc::now() - Duration::days(20)),
                },
            )
            .unwrap();

        let trending = trending_clusters(&store, 7, 5).unwrap();
        let ids: Vec<ClusterId> = trending.iter().map(|t| t.cluster.id).collect();
        assert_eq!(ids, vec![busy.id, quiet.id]);
        assert_eq!(trending[0].recent_count, 2);

        assert_eq!(trending_clusters(&store, 7, 1).unwrap().len(), 1);
    }

    #[test]
    fn test_dashboard_zero_fills_severities() {
        let store = MemoryStore::new();
        store
            .insert_complaint(NewComplaint::new(
                "x",
                "x",
                Category::MedicalCenter,
                Severity::High,
            ))
            .unwrap();

        let stats = dashboard_stats(&store).unwrap();
        assert_eq!(stats.total_complaints, 1);
        assert_eq!(stats.by_severity.len(), 3);
        assert_eq!(stats.by_severity["low"], 0);
        assert_eq!(stats.by_severity["high"], 1);
        assert_eq!(stats.by_category.len(), 1);
        assert_eq!(stats.last_7_days, 1);
    }
}
