//! Record models shared by the civic services
//!
//! Wire format is camelCase JSON. Timestamps are UTC.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::Error;

// ========================================
// Enumerations
// ========================================

/// Issue lifecycle status
///
/// Every status may follow every other; there is no terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IssueStatus {
    Reported,
    #[serde(alias = "In Progress")]
    InProgress,
    Resolved,
}

impl IssueStatus {
    /// All statuses in lifecycle order
    pub const ALL: [IssueStatus; 3] = [
        IssueStatus::Reported,
        IssueStatus::InProgress,
        IssueStatus::Resolved,
    ];

    /// Stored representation
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueStatus::Reported => "Reported",
            IssueStatus::InProgress => "InProgress",
            IssueStatus::Resolved => "Resolved",
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, IssueStatus::Resolved)
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueStatus {
    type Err = Error;

    /// Accepts the stored form plus the spaced "In Progress" used by older clients
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Reported" => Ok(IssueStatus::Reported),
            "InProgress" | "In Progress" => Ok(IssueStatus::InProgress),
            "Resolved" => Ok(IssueStatus::Resolved),
            other => Err(Error::InvalidInput(format!(
                "unknown status '{}' (expected Reported, InProgress or Resolved)",
                other
            ))),
        }
    }
}

/// Classifier priority label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
    Emergency,
}

impl Priority {
    /// Map a severity score to a priority
    ///
    /// ≤2 Low, 3 Medium, 4 High, ≥5 Emergency.
    pub fn from_severity(severity: i64) -> Self {
        match severity {
            i64::MIN..=2 => Priority::Low,
            3 => Priority::Medium,
            4 => Priority::High,
            _ => Priority::Emergency,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
            Priority::Emergency => "Emergency",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "emergency" => Ok(Priority::Emergency),
            other => Err(Error::InvalidInput(format!("unknown priority '{}'", other))),
        }
    }
}

/// Caller role carried in the bearer token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Citizen,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Citizen => "citizen",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ========================================
// Records
// ========================================

/// Resolved caller identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub id: String,
    pub role: Role,
}

impl Caller {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self { id: id.into(), role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Geographic point in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

/// Citizen-submitted issue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub id: Uuid,
    pub reporter_id: String,
    pub description: String,
    pub image_ref: String,
    pub location: Location,
    pub status: IssueStatus,
    pub prediction_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Immutable classification result for one issue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub id: Uuid,
    pub issue_id: Uuid,
    pub issue_type: String,
    pub confidence: f64,
    pub severity: i64,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
}

/// Issue with its prediction embedded (null when classification was unavailable)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssueView {
    #[serde(flatten)]
    pub issue: Issue,
    pub prediction: Option<Prediction>,
}

/// Audit record of one admin status change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub id: Uuid,
    pub issue_id: Uuid,
    pub admin_id: String,
    pub from_status: IssueStatus,
    pub to_status: IssueStatus,
    pub remarks: Option<String>,
    pub changed_at: DateTime<Utc>,
}
