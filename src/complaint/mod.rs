//! Complaint and issue-cluster records
//!
//! Complaints and clusters are independent top-level records. A complaint points at
//! its cluster through `cluster_id`; a cluster never owns its complaints, membership
//! is always answered by a storage query.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Complaint identifier assigned by the store
pub type ComplaintId = i64;

/// Cluster identifier assigned by the store
pub type ClusterId = i64;

/// Urgency tier of a complaint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub const ALL: [Severity; 3] = [Severity::Low, Severity::Medium, Severity::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }

    /// Numeric rank used for sorting (low = 1, medium = 2, high = 3)
    pub fn score(&self) -> u8 {
        match self {
            Severity::Low => 1,
            Severity::Medium => 2,
            Severity::High => 3,
        }
    }

    /// Rank for an arbitrary label; unknown labels rank as medium
    pub fn score_of(label: &str) -> u8 {
        label.parse::<Severity>().map(|s| s.score()).unwrap_or(2)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            other => Err(format!("unknown severity '{}'", other)),
        }
    }
}

/// Fixed complaint category set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Mess Food Quality")]
    MessFoodQuality,
    #[serde(rename = "Campus Wi-Fi")]
    CampusWifi,
    #[serde(rename = "Medical Center")]
    MedicalCenter,
    #[serde(rename = "Placement/CDC")]
    PlacementCdc,
    #[serde(rename = "Faculty Concerns")]
    FacultyConcerns,
    #[serde(rename = "Hostel Maintenance")]
    HostelMaintenance,
    #[serde(rename = "Other")]
    Other,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::MessFoodQuality,
        Category::CampusWifi,
        Category::MedicalCenter,
        Category::PlacementCdc,
        Category::FacultyConcerns,
        Category::HostelMaintenance,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::MessFoodQuality => "Mess Food Quality",
            Category::CampusWifi => "Campus Wi-Fi",
            Category::MedicalCenter => "Medical Center",
            Category::PlacementCdc => "Placement/CDC",
            Category::FacultyConcerns => "Faculty Concerns",
            Category::HostelMaintenance => "Hostel Maintenance",
            Category::Other => "Other",
        }
    }

    /// Resolve free text (user input or a model answer) to a category.
    ///
    /// Exact match first, then case-insensitive containment in either direction,
    /// otherwise `Other`. Never fails.
    pub fn resolve(label: &str) -> Category {
        let label = label.trim();
        if let Some(exact) = Self::ALL.iter().find(|c| c.as_str() == label) {
            return *exact;
        }

        let lower = label.to_lowercase();
        if lower.is_empty() {
            return Category::Other;
        }

        Self::ALL
            .iter()
            .find(|c| {
                let name = c.as_str().to_lowercase();
                lower.contains(&name) || name.contains(&lower)
            })
            .copied()
            .unwrap_or(Category::Other)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored complaint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Complaint {
    pub id: ComplaintId,
    /// Submitter reference, `None` for anonymous submissions
    pub student_id: Option<String>,
    pub raw_text: String,
    /// Formal version; equals `raw_text` when rewriting failed
    pub rewritten_text: String,
    pub category: Category,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub cluster_id: Option<ClusterId>,
    pub created_at: DateTime<Utc>,
    pub upvotes: u32,
}

/// Complaint fields known before the store assigns an id
#[derive(Debug, Clone)]
pub struct NewComplaint {
    pub student_id: Option<String>,
    pub raw_text: String,
    pub rewritten_text: String,
    pub category: Category,
    pub severity: Severity,
    pub embedding: Option<Vec<f32>>,
    pub cluster_id: Option<ClusterId>,
    pub created_at: DateTime<Utc>,
}

impl NewComplaint {
    /// Build a record stamped with the current time and no cluster
    pub fn new(
        raw_text: impl Into<String>,
        rewritten_text: impl Into<String>,
        category: Category,
        severity: Severity,
    ) -> Self {
        Self {
            student_id: None,
            raw_text: raw_text.into(),
            rewritten_text: rewritten_text.into(),
            category,
            severity,
            embedding: None,
            cluster_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn with_student(mut self, student_id: impl Into<String>) -> Self {
        self.student_id = Some(student_id.into());
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn into_complaint(self, id: ComplaintId) -> Complaint {
        Complaint {
            id,
            student_id: self.student_id,
            raw_text: self.raw_text,
            rewritten_text: self.rewritten_text,
            category: self.category,
            severity: self.severity,
            embedding: self.embedding,
            cluster_id: self.cluster_id,
            created_at: self.created_at,
            upvotes: 0,
        }
    }
}

/// A group of similar complaints sharing category and severity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueCluster {
    pub id: ClusterId,
    pub name: String,
    pub category: Category,
    pub severity: Severity,
    /// Maintained member count; recomputed from membership by maintenance jobs
    pub count: u32,
    pub last_updated: DateTime<Utc>,
}

impl IssueCluster {
    /// Display name in the form "{category} - {SEVERITY}"
    pub fn display_name(category: Category, severity: Severity) -> String {
        format!("{} - {}", category, severity.as_str().to_uppercase())
    }
}
