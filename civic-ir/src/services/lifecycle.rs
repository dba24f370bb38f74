//! Issue Lifecycle Manager
//!
//! Owns issue creation (with classification) and the admin status
//! transition. Every write path runs in one sqlx transaction so a failure
//! leaves nothing half-created.
//!
//! Transitions are permissive: any status may follow any other. Resolved
//! stamps `resolved_at`, every other status clears it, and each change is
//! appended to the `status_changes` log in the same transaction.

use crate::db::issues::{self, IssueFilter};
use crate::db::{predictions, status_changes};
use crate::error::{ApiError, ApiResult};
use crate::services::access_policy::require;
use crate::services::classifier_client::{Classification, Classifier, ClassifierRequest};
use crate::services::image_store::{ImageStore, StoredImage};
use chrono::{DateTime, Utc};
use civic_common::{
    Caller, Issue, IssueStatus, IssueView, Location, Prediction, Role, StatusChange,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// Location frequency hint used when the reporter sends none
pub const DEFAULT_LOCATION_FREQUENCY: u32 = 1;

/// Raw report fields as received, before validation
#[derive(Debug, Clone, Default)]
pub struct ReportForm {
    pub description: Option<String>,
    pub image: Option<Vec<u8>>,
    /// JSON `{"lat": .., "lng": ..}`
    pub location: Option<String>,
    pub lat: Option<String>,
    pub lng: Option<String>,
    pub location_frequency: Option<String>,
}

/// Validated report input
#[derive(Debug, Clone, PartialEq)]
pub struct NewReport {
    pub description: String,
    pub image: Vec<u8>,
    pub location: Location,
    pub location_frequency: u32,
}

#[derive(Deserialize)]
struct LocationInput {
    lat: Option<serde_json::Value>,
    lng: Option<serde_json::Value>,
}

impl ReportForm {
    /// Check preconditions, naming the first offending field
    pub fn validate(self) -> ApiResult<NewReport> {
        let description = self
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .ok_or_else(|| ApiError::validation("description", "description is required"))?;

        let image = self
            .image
            .filter(|bytes| !bytes.is_empty())
            .ok_or_else(|| ApiError::validation("image", "image is required"))?;

        let location = match self.location {
            Some(json) => parse_location_json(&json)?,
            None => Location {
                lat: parse_coordinate("lat", self.lat.as_deref(), 90.0)?,
                lng: parse_coordinate("lng", self.lng.as_deref(), 180.0)?,
            },
        };

        let location_frequency = match self.location_frequency.as_deref().map(str::trim) {
            None | Some("") => DEFAULT_LOCATION_FREQUENCY,
            Some(value) => value.parse::<u32>().map_err(|_| {
                ApiError::validation("locationFreq", "locationFreq must be a non-negative integer")
            })?,
        };

        Ok(NewReport {
            description,
            image,
            location,
            location_frequency,
        })
    }
}

fn parse_location_json(json: &str) -> ApiResult<Location> {
    let input: LocationInput = serde_json::from_str(json)
        .map_err(|e| ApiError::validation("location", format!("location is not valid JSON: {}", e)))?;

    let lat = coordinate_text(input.lat);
    let lng = coordinate_text(input.lng);

    Ok(Location {
        lat: parse_coordinate("location.lat", lat.as_deref(), 90.0)?,
        lng: parse_coordinate("location.lng", lng.as_deref(), 180.0)?,
    })
}

/// Coordinates may arrive as JSON numbers or numeric strings
fn coordinate_text(value: Option<serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn parse_coordinate(field: &str, value: Option<&str>, limit: f64) -> ApiResult<f64> {
    let value = value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::validation(field, format!("{} is required", field)))?;

    let parsed: f64 = value
        .parse()
        .map_err(|_| ApiError::validation(field, format!("{} is not a number", field)))?;

    if !parsed.is_finite() || parsed.abs() > limit {
        return Err(ApiError::validation(
            field,
            format!("{} must be within ±{}", field, limit),
        ));
    }

    Ok(parsed)
}

/// Result of ReportIssue
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportOutcome {
    pub issue: Issue,
    pub prediction: Option<Prediction>,
}

/// ListIssues filter
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ListQuery {
    /// Only the caller's own issues
    pub mine: bool,
    /// Admin-only status filter
    pub status: Option<IssueStatus>,
}

/// Requested transition
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: IssueStatus,
    pub remarks: Option<String>,
}

impl StatusUpdate {
    /// Parse the wire status name; blank remarks are dropped
    pub fn parse(status: &str, remarks: Option<String>) -> ApiResult<Self> {
        let status = status
            .parse::<IssueStatus>()
            .map_err(|_| {
                ApiError::validation(
                    "status",
                    format!("status must be one of Reported, InProgress, Resolved (got '{}')", status),
                )
            })?;

        let remarks = remarks
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        Ok(Self { status, remarks })
    }
}

/// Compute the issue after a transition
///
/// Every edge is allowed. `resolved_at` is set exactly when the new status
/// is Resolved, so the invariant holds across reopen cycles.
pub fn apply_transition(issue: &Issue, new_status: IssueStatus, now: DateTime<Utc>) -> Issue {
    let mut updated = issue.clone();
    updated.status = new_status;
    updated.resolved_at = if new_status.is_resolved() {
        Some(now)
    } else {
        None
    };
    updated
}

/// Issue creation and transition service
#[derive(Clone)]
pub struct IssueLifecycle {
    db: SqlitePool,
    classifier: Arc<dyn Classifier>,
    classifier_timeout: Duration,
    images: ImageStore,
}

impl IssueLifecycle {
    pub fn new(
        db: SqlitePool,
        classifier: Arc<dyn Classifier>,
        classifier_timeout: Duration,
        images: ImageStore,
    ) -> Self {
        Self {
            db,
            classifier,
            classifier_timeout,
            images,
        }
    }

    pub fn images(&self) -> &ImageStore {
        &self.images
    }

    /// ReportIssue
    ///
    /// Classification failure or timeout degrades to an issue without a
    /// prediction. Storage failure aborts the whole report.
    pub async fn report_issue(&self, caller: Option<&Caller>, report: NewReport) -> ApiResult<ReportOutcome> {
        let caller = require(caller, Role::Citizen, "ReportIssue")?;

        let kind = self.images.inspect(&report.image)?;

        let request = ClassifierRequest {
            image: report.image.clone(),
            file_name: format!("upload.{}", kind.extension),
            mime_type: kind.mime_type.clone(),
            description_length: report.description.chars().count(),
            location_frequency: report.location_frequency,
        };
        let classification = match self.classify(&request).await {
            Ok(classification) => Some(classification),
            Err(e) => {
                warn!(reporter = %caller.id, "{}; creating issue without prediction", e);
                None
            }
        };

        let stored = self.images.save(&report.image, kind).await?;

        match self.persist_report(caller, &report, &stored, classification).await {
            Ok(outcome) => {
                info!(
                    issue_id = %outcome.issue.id,
                    reporter = %caller.id,
                    classified = outcome.prediction.is_some(),
                    "Issue reported"
                );
                Ok(outcome)
            }
            Err(e) => {
                self.images.discard(&stored.image_ref).await;
                Err(e)
            }
        }
    }

    /// Call the classifier under the configured deadline
    async fn classify(&self, request: &ClassifierRequest) -> ApiResult<Classification> {
        match tokio::time::timeout(self.classifier_timeout, self.classifier.classify(request)).await {
            Ok(Ok(classification)) => Ok(classification),
            Ok(Err(e)) => Err(ApiError::UpstreamUnavailable(e.to_string())),
            Err(_) => Err(ApiError::UpstreamUnavailable(format!(
                "classifier timed out after {:?}",
                self.classifier_timeout
            ))),
        }
    }

    async fn persist_report(
        &self,
        caller: &Caller,
        report: &NewReport,
        stored: &StoredImage,
        classification: Option<Classification>,
    ) -> ApiResult<ReportOutcome> {
        let now = civic_common::time::now();

        let mut issue = Issue {
            id: civic_common::uuid_utils::generate(),
            reporter_id: caller.id.clone(),
            description: report.description.clone(),
            image_ref: stored.image_ref.clone(),
            location: report.location,
            status: IssueStatus::Reported,
            prediction_id: None,
            created_at: now,
            resolved_at: None,
        };

        let prediction = classification.map(|c| Prediction {
            id: civic_common::uuid_utils::generate(),
            issue_id: issue.id,
            issue_type: c.issue_type,
            confidence: c.confidence,
            severity: c.severity,
            priority: c.priority,
            created_at: now,
        });

        let mut tx = self.db.begin().await?;

        issues::insert_issue(&mut *tx, &issue).await?;

        if let Some(prediction) = &prediction {
            predictions::insert_prediction(&mut *tx, prediction).await?;
            if !issues::link_prediction(&mut *tx, issue.id, prediction.id).await? {
                return Err(ApiError::Internal(format!(
                    "Issue {} could not be linked to its prediction",
                    issue.id
                )));
            }
            issue.prediction_id = Some(prediction.id);
        }

        tx.commit().await?;

        Ok(ReportOutcome { issue, prediction })
    }

    /// ListIssues
    pub async fn list_issues(&self, caller: Option<&Caller>, query: ListQuery) -> ApiResult<Vec<IssueView>> {
        let filter = if query.mine {
            let caller = require(caller, Role::Citizen, "ListIssues")?;
            if query.status.is_some() {
                require(Some(caller), Role::Admin, "Filtering issues by status")?;
            }
            IssueFilter {
                reporter_id: Some(caller.id.clone()),
                status: query.status,
            }
        } else {
            require(caller, Role::Admin, "Listing all issues")?;
            IssueFilter {
                reporter_id: None,
                status: query.status,
            }
        };

        Ok(issues::list_issues(&self.db, &filter).await?)
    }

    /// Single issue with its prediction, for its reporter or an admin
    pub async fn get_issue(&self, caller: Option<&Caller>, id: Uuid) -> ApiResult<IssueView> {
        let caller = require(caller, Role::Citizen, "GetIssue")?;

        let view = issues::find_issue_view(&self.db, id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Issue {} not found", id)))?;

        if !caller.is_admin() && view.issue.reporter_id != caller.id {
            return Err(ApiError::Forbidden(
                "Only the reporter or an admin may read this issue".to_string(),
            ));
        }

        Ok(view)
    }

    /// ChangeStatus
    pub async fn change_status(
        &self,
        caller: Option<&Caller>,
        id: Uuid,
        update: StatusUpdate,
    ) -> ApiResult<Issue> {
        self.change_status_at(caller, id, update, civic_common::time::now())
            .await
    }

    /// ChangeStatus with an explicit clock
    pub async fn change_status_at(
        &self,
        caller: Option<&Caller>,
        id: Uuid,
        update: StatusUpdate,
        now: DateTime<Utc>,
    ) -> ApiResult<Issue> {
        let caller = require(caller, Role::Admin, "ChangeStatus")?;

        let mut tx = self.db.begin().await?;

        // Write before reading: a read snapshot taken first cannot be
        // upgraded under contention (SQLITE_BUSY_SNAPSHOT)
        if !issues::claim_for_update(&mut *tx, id).await? {
            return Err(ApiError::NotFound(format!("Issue {} not found", id)));
        }

        let current = issues::find_issue(&mut *tx, id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Issue {} not found", id)))?;

        let updated = apply_transition(&current, update.status, now);

        if !issues::update_status(&mut *tx, &updated).await? {
            return Err(ApiError::NotFound(format!("Issue {} not found", id)));
        }

        let change = StatusChange {
            id: civic_common::uuid_utils::generate(),
            issue_id: id,
            admin_id: caller.id.clone(),
            from_status: current.status,
            to_status: updated.status,
            remarks: update.remarks,
            changed_at: now,
        };
        status_changes::insert_status_change(&mut *tx, &change).await?;

        tx.commit().await?;

        info!(
            issue_id = %id,
            admin = %caller.id,
            from = %current.status,
            to = %updated.status,
            "Issue status changed"
        );

        Ok(updated)
    }

    /// Status change log of one issue, oldest first (admin only)
    pub async fn history(&self, caller: Option<&Caller>, id: Uuid) -> ApiResult<Vec<StatusChange>> {
        require(caller, Role::Admin, "Reading issue history")?;

        if issues::find_issue(&self.db, id).await?.is_none() {
            return Err(ApiError::NotFound(format!("Issue {} not found", id)));
        }

        Ok(status_changes::list_for_issue(&self.db, id).await?)
    }
}
