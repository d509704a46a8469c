//! SQLite complaint store with migrations
//!
//! Complaints and clusters live in two independent tables. `complaints.cluster_id`
//! is a plain column without a foreign key: membership is a query, and a deleted
//! cluster may briefly leave dangling references until the next maintenance run.

use super::{ClusterUpdate, ComplaintStore, StoreError, StoreResult, StoreStats};
use crate::complaint::{
    Category, ClusterId, Complaint, ComplaintId, IssueCluster, NewComplaint, Severity,
};
use crate::error::{GrievanceError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, Row};
use std::path::Path;

/// Database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

type PooledConn = r2d2::PooledConnection<SqliteConnectionManager>;

const COMPLAINT_COLUMNS: &str = "id, student_id, raw_text, rewritten_text, category, severity, \
     embedding, cluster_id, created_at, upvotes";

const CLUSTER_COLUMNS: &str = "id, name, category, severity, count, last_updated";

/// SQLite-backed [`ComplaintStore`]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    /// Open (or create) the database at `db_path` and apply pending migrations
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| GrievanceError::Io {
                source: e,
                context: format!("Failed to create database directory: {:?}", parent),
            })?;
        }

        let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
            conn.execute_batch(
                "
                PRAGMA synchronous = NORMAL;
                PRAGMA busy_timeout = 5000;
                ",
            )
        });

        let pool = Pool::builder().max_size(8).build(manager)?;

        {
            let conn = pool.get()?;
            // WAL is persistent, setting it once per database file is enough
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }

        let store = Self { pool };
        store.migrate()?;

        tracing::debug!("Opened complaint store at {:?}", db_path);
        Ok(store)
    }

    fn conn(&self) -> StoreResult<PooledConn> {
        Ok(self.pool.get()?)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let current_version: i32 = conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM _migrations",
            [],
            |row| row.get(0),
        )?;

        for (version, migration) in MIGRATIONS.iter().enumerate() {
            let version = version as i32 + 1;

            if version > current_version {
                tracing::info!("Applying migration {}", version);
                conn.execute_batch(migration)?;
                conn.execute(
                    "INSERT INTO _migrations (version, applied_at) VALUES (?1, datetime('now'))",
                    params![version],
                )?;
            }
        }

        Ok(())
    }

    fn query_complaints(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> StoreResult<Vec<Complaint>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, ComplaintRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(ComplaintRow::into_complaint).collect()
    }

    fn query_clusters(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> StoreResult<Vec<IssueCluster>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, ClusterRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(ClusterRow::into_cluster).collect()
    }
}

/// Timestamps are stored as fixed-width UTC RFC 3339 so text order is time order
fn encode_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_time(text: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp '{}': {}", text, e)))
}

/// Little-endian f32 bytes
pub fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn decode_embedding(bytes: &[u8]) -> StoreResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(StoreError::Corrupt(format!(
            "embedding blob length {} is not a multiple of 4",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

fn decode_severity(text: &str) -> StoreResult<Severity> {
    text.parse().map_err(StoreError::Corrupt)
}

fn decode_category(text: &str) -> StoreResult<Category> {
    Category::ALL
        .iter()
        .find(|c| c.as_str() == text)
        .copied()
        .ok_or_else(|| StoreError::Corrupt(format!("unknown category '{}'", text)))
}

/// Raw column values, decoded outside the rusqlite row callback
struct ComplaintRow {
    id: ComplaintId,
    student_id: Option<String>,
    raw_text: String,
    rewritten_text: String,
    category: String,
    severity: String,
    embedding: Option<Vec<u8>>,
    cluster_id: Option<ClusterId>,
    created_at: String,
    upvotes: u32,
}

impl ComplaintRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            student_id: row.get(1)?,
            raw_text: row.get(2)?,
            rewritten_text: row.get(3)?,
            category: row.get(4)?,
            severity: row.get(5)?,
            embedding: row.get(6)?,
            cluster_id: row.get(7)?,
            created_at: row.get(8)?,
            upvotes: row.get(9)?,
        })
    }

    fn into_complaint(self) -> StoreResult<Complaint> {
        Ok(Complaint {
            id: self.id,
            student_id: self.student_id,
            raw_text: self.raw_text,
            rewritten_text: self.rewritten_text,
            category: decode_category(&self.category)?,
            severity: decode_severity(&self.severity)?,
            embedding: self
                .embedding
                .as_deref()
                .map(decode_embedding)
                .transpose()?,
            cluster_id: self.cluster_id,
            created_at: decode_time(&self.created_at)?,
            upvotes: self.upvotes,
        })
    }
}

struct ClusterRow {
    id: ClusterId,
    name: String,
    category: String,
    severity: String,
    count: u32,
    last_updated: String,
}

impl ClusterRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            category: row.get(2)?,
            severity: row.get(3)?,
            count: row.get(4)?,
            last_updated: row.get(5)?,
        })
    }

    fn into_cluster(self) -> StoreResult<IssueCluster> {
        Ok(IssueCluster {
            id: self.id,
            name: self.name,
            category: decode_category(&self.category)?,
            severity: decode_severity(&self.severity)?,
            count: self.count,
            last_updated: decode_time(&self.last_updated)?,
        })
    }
}

impl ComplaintStore for SqliteStore {
    fn find_clusters_by(
        &self,
        category: Category,
        severity: Severity,
    ) -> StoreResult<Vec<IssueCluster>> {
        self.query_clusters(
            &format!(
                "SELECT {} FROM issue_clusters WHERE category = ?1 AND severity = ?2 ORDER BY id",
                CLUSTER_COLUMNS
            ),
            params![category.as_str(), severity.as_str()],
        )
    }

    fn get_cluster(&self, id: ClusterId) -> StoreResult<Option<IssueCluster>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM issue_clusters WHERE id = ?1", CLUSTER_COLUMNS),
                params![id],
                ClusterRow::from_row,
            )
            .optional()?;
        row.map(ClusterRow::into_cluster).transpose()
    }

    fn create_cluster(
        &self,
        name: &str,
        category: Category,
        severity: Severity,
        count: u32,
    ) -> StoreResult<IssueCluster> {
        let conn = self.conn()?;
        let now = Utc::now();
        conn.execute(
            "INSERT INTO issue_clusters (name, category, severity, count, last_updated)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![name, category.as_str(), severity.as_str(), count, encode_time(&now)],
        )?;

        Ok(IssueCluster {
            id: conn.last_insert_rowid(),
            name: name.to_string(),
            category,
            severity,
            count,
            last_updated: now,
        })
    }

    fn update_cluster(&self, id: ClusterId, update: ClusterUpdate) -> StoreResult<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE issue_clusters
             SET count = COALESCE(?2, count), last_updated = COALESCE(?3, last_updated)
             WHERE id = ?1",
            params![id, update.count, update.last_updated.as_ref().map(encode_time)],
        )?;

        if changed == 0 {
            return Err(StoreError::ClusterNotFound(id));
        }
        Ok(())
    }

    fn delete_cluster(&self, id: ClusterId) -> StoreResult<()> {
        let conn = self.conn()?;
        let changed = conn.execute("DELETE FROM issue_clusters WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(StoreError::ClusterNotFound(id));
        }
        Ok(())
    }

    fn get_recent_complaints_in_cluster(
        &self,
        cluster_id: ClusterId,
        limit: usize,
    ) -> StoreResult<Vec<Complaint>> {
        self.query_complaints(
            &format!(
                "SELECT {} FROM complaints WHERE cluster_id = ?1
                 ORDER BY created_at DESC, id DESC LIMIT ?2",
                COMPLAINT_COLUMNS
            ),
            params![cluster_id, limit as i64],
        )
    }

    fn get_complaints_by_cluster(&self, cluster_id: ClusterId) -> StoreResult<Vec<Complaint>> {
        self.query_complaints(
            &format!(
                "SELECT {} FROM complaints WHERE cluster_id = ?1 ORDER BY id",
                COMPLAINT_COLUMNS
            ),
            params![cluster_id],
        )
    }

    fn update_complaint_cluster_ref(
        &self,
        complaint_id: ComplaintId,
        cluster_id: Option<ClusterId>,
    ) -> StoreResult<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE complaints SET cluster_id = ?2 WHERE id = ?1",
            params![complaint_id, cluster_id],
        )?;
        if changed == 0 {
            return Err(StoreError::ComplaintNotFound(complaint_id));
        }
        Ok(())
    }

    fn get_all_complaints(&self) -> StoreResult<Vec<Complaint>> {
        self.query_complaints(
            &format!("SELECT {} FROM complaints ORDER BY id", COMPLAINT_COLUMNS),
            params![],
        )
    }

    fn insert_complaint(&self, complaint: NewComplaint) -> StoreResult<Complaint> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO complaints
                (student_id, raw_text, rewritten_text, category, severity, embedding,
                 cluster_id, created_at, upvotes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0)",
            params![
                complaint.student_id,
                complaint.raw_text,
                complaint.rewritten_text,
                complaint.category.as_str(),
                complaint.severity.as_str(),
                complaint.embedding.as_deref().map(encode_embedding),
                complaint.cluster_id,
                encode_time(&complaint.created_at),
            ],
        )?;

        Ok(complaint.into_complaint(conn.last_insert_rowid()))
    }

    fn get_complaint(&self, id: ComplaintId) -> StoreResult<Option<Complaint>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM complaints WHERE id = ?1", COMPLAINT_COLUMNS),
                params![id],
                ComplaintRow::from_row,
            )
            .optional()?;
        row.map(ComplaintRow::into_complaint).transpose()
    }

    fn list_clusters(&self) -> StoreResult<Vec<IssueCluster>> {
        self.query_clusters(
            &format!("SELECT {} FROM issue_clusters ORDER BY id", CLUSTER_COLUMNS),
            params![],
        )
    }

    fn count_complaints_in_cluster(&self, cluster_id: ClusterId) -> StoreResult<u32> {
        let conn = self.conn()?;
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM complaints WHERE cluster_id = ?1",
            params![cluster_id],
            |row| row.get(0),
        )?)
    }

    fn increment_upvotes(&self, complaint_id: ComplaintId) -> StoreResult<u32> {
        let conn = self.conn()?;
        conn.query_row(
            "UPDATE complaints SET upvotes = upvotes + 1 WHERE id = ?1 RETURNING upvotes",
            params![complaint_id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or(StoreError::ComplaintNotFound(complaint_id))
    }

    fn stats(&self, since: DateTime<Utc>) -> StoreResult<StoreStats> {
        let conn = self.conn()?;
        let mut stats = StoreStats {
            total_complaints: conn.query_row("SELECT COUNT(*) FROM complaints", [], |row| {
                row.get(0)
            })?,
            cluster_count: conn.query_row("SELECT COUNT(*) FROM issue_clusters", [], |row| {
                row.get(0)
            })?,
            recent_complaints: conn.query_row(
                "SELECT COUNT(*) FROM complaints WHERE created_at >= ?1",
                params![encode_time(&since)],
                |row| row.get(0),
            )?,
            ..StoreStats::default()
        };

        for (column, target) in [
            ("severity", &mut stats.by_severity),
            ("category", &mut stats.by_category),
        ] {
            let mut stmt = conn.prepare(&format!(
                "SELECT {0}, COUNT(*) FROM complaints GROUP BY {0}",
                column
            ))?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?))
            })?;
            for row in rows {
                let (key, count) = row?;
                target.insert(key, count);
            }
        }

        Ok(stats)
    }
}

/// Database migrations (each string is one migration)
const MIGRATIONS: &[&str] = &[
    // Migration 1: complaints and clusters
    r#"
    CREATE TABLE issue_clusters (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        category TEXT NOT NULL,
        severity TEXT NOT NULL,
        count INTEGER NOT NULL DEFAULT 0,
        last_updated TEXT NOT NULL
    );

    CREATE INDEX idx_clusters_key ON issue_clusters(category, severity);

    CREATE TABLE complaints (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        student_id TEXT,
        raw_text TEXT NOT NULL,
        rewritten_text TEXT NOT NULL,
        category TEXT NOT NULL,
        severity TEXT NOT NULL,
        embedding BLOB,          -- little-endian f32
        cluster_id INTEGER,
        created_at TEXT NOT NULL,
        upvotes INTEGER NOT NULL DEFAULT 0
    );

    CREATE INDEX idx_complaints_cluster ON complaints(cluster_id, created_at);
    CREATE INDEX idx_complaints_created_at ON complaints(created_at);
    "#,
];

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open() -> (SqliteStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteStore::open(&temp_dir.path().join("complaints.sqlite")).unwrap();
        (store, temp_dir)
    }

    #[test]
    fn test_migrations() {
        let (store, _temp) = open();
        let conn = store.conn().unwrap();
        let version: i32 = conn
            .query_row("SELECT MAX(version) FROM _migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, MIGRATIONS.len() as i32);
    }

    #[test]
    fn test_reopen_keeps_data() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("complaints.sqlite");

        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .insert_complaint(NewComplaint::new(
                    "wifi",
                    "Wi-Fi is down",
                    Category::CampusWifi,
                    Severity::Low,
                ))
                .unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get_all_complaints().unwrap().len(), 1);
    }

    #[test]
    fn test_embedding_blob_encoding() {
        let vector = vec![0.5f32, -1.25, 3.0];
        let bytes = encode_embedding(&vector);
        assert_eq!(bytes.len(), 12);
        assert_eq!(&bytes[0..4], &0.5f32.to_le_bytes());
        assert!(decode_embedding(&bytes[..5]).is_err());
    }

    #[test]
    fn test_complaint_fields_persist() {
        let (store, _temp) = open();
        let inserted = store
            .insert_complaint(
                NewComplaint::new("raw", "formal", Category::PlacementCdc, Severity::High)
                    .with_student("s-42")
                    .with_embedding(vec![0.1, 0.2, 0.3]),
            )
            .unwrap();

        let loaded = store.get_complaint(inserted.id).unwrap().unwrap();
        assert_eq!(loaded.student_id.as_deref(), Some("s-42"));
        assert_eq!(loaded.category, Category::PlacementCdc);
        assert_eq!(loaded.severity, Severity::High);
        assert_eq!(loaded.embedding, Some(vec![0.1, 0.2, 0.3]));
        assert_eq!(loaded.cluster_id, None);
        assert_eq!(
            loaded.created_at.timestamp_micros(),
            inserted.created_at.timestamp_micros()
        );
    }

    #[test]
    fn test_cluster_update_and_delete() {
        let (store, _temp) = open();
        let cluster = store
            .create_cluster("Other - LOW", Category::Other, Severity::Low, 1)
            .unwrap();

        store
            .update_cluster(
                cluster.id,
                ClusterUpdate {
                    count: Some(4),
                    last_updated: None,
                },
            )
            .unwrap();
        let loaded = store.get_cluster(cluster.id).unwrap().unwrap();
        assert_eq!(loaded.count, 4);

        store.delete_cluster(cluster.id).unwrap();
        assert!(store.get_cluster(cluster.id).unwrap().is_none());
        assert!(matches!(
            store.delete_cluster(cluster.id),
            Err(StoreError::ClusterNotFound(_))
        ));
    }

    #[test]
    fn test_upvotes() {
        let (store, _temp) = open();
        let c = store
            .insert_complaint(NewComplaint::new("a", "a", Category::Other, Severity::Low))
            .unwrap();
        assert_eq!(store.increment_upvotes(c.id).unwrap(), 1);
        assert_eq!(store.increment_upvotes(c.id).unwrap(), 2);
        assert!(matches!(
            store.increment_upvotes(999),
            Err(StoreError::ComplaintNotFound(999))
        ));
    }
}
