//! Issue table operations

use civic_common::time::to_storage;
use civic_common::{Issue, IssueStatus, IssueView, Location, Prediction, Priority, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use super::{stored_timestamp, stored_uuid};

/// Columns selected for an issue joined with its optional prediction
const ISSUE_VIEW_COLUMNS: &str = r#"
    i.id, i.reporter_id, i.description, i.image_ref, i.lat, i.lng,
    i.status, i.prediction_id, i.created_at, i.resolved_at,
    p.id AS p_id, p.issue_type AS p_issue_type, p.confidence AS p_confidence,
    p.severity AS p_severity, p.priority AS p_priority, p.created_at AS p_created_at
"#;

/// Filter for issue listings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssueFilter {
    /// Restrict to one reporter
    pub reporter_id: Option<String>,
    /// Restrict to one current status
    pub status: Option<IssueStatus>,
}

/// Insert a new issue row
pub async fn insert_issue<'e, E>(executor: E, issue: &Issue) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO issues (
            id, reporter_id, description, image_ref, lat, lng,
            status, prediction_id, created_at, resolved_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(issue.id.to_string())
    .bind(&issue.reporter_id)
    .bind(&issue.description)
    .bind(&issue.image_ref)
    .bind(issue.location.lat)
    .bind(issue.location.lng)
    .bind(issue.status.as_str())
    .bind(issue.prediction_id.map(|id| id.to_string()))
    .bind(to_storage(&issue.created_at))
    .bind(issue.resolved_at.as_ref().map(to_storage))
    .execute(executor)
    .await?;

    Ok(())
}

/// Link an issue to its prediction
///
/// Only succeeds while the issue has no prediction yet; returns whether a row changed.
pub async fn link_prediction<'e, E>(executor: E, issue_id: Uuid, prediction_id: Uuid) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "UPDATE issues SET prediction_id = ? WHERE id = ? AND prediction_id IS NULL",
    )
    .bind(prediction_id.to_string())
    .bind(issue_id.to_string())
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Persist status and resolution timestamp of an issue; returns whether a row changed
pub async fn update_status<'e, E>(executor: E, issue: &Issue) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("UPDATE issues SET status = ?, resolved_at = ? WHERE id = ?")
        .bind(issue.status.as_str())
        .bind(issue.resolved_at.as_ref().map(to_storage))
        .bind(issue.id.to_string())
        .execute(executor)
        .await?;

    Ok(result.rows_affected() == 1)
}

/// Take the database write lock for one issue's row
///
/// A no-op write, so a deferred transaction holds the write lock before it
/// reads. Returns false when the issue does not exist.
pub async fn claim_for_update<'e, E>(executor: E, id: Uuid) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("UPDATE issues SET status = status WHERE id = ?")
        .bind(id.to_string())
        .execute(executor)
        .await?;

    Ok(result.rows_affected() == 1)
}

/// Load one issue without its prediction
pub async fn find_issue<'e, E>(executor: E, id: Uuid) -> Result<Option<Issue>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        r#"
        SELECT id, reporter_id, description, image_ref, lat, lng,
               status, prediction_id, created_at, resolved_at
        FROM issues
        WHERE id = ?
        "#,
    )
    .bind(id.to_string())
    .fetch_optional(executor)
    .await?;

    row.as_ref().map(issue_from_row).transpose()
}

/// Load one issue with its prediction embedded
pub async fn find_issue_view(pool: &SqlitePool, id: Uuid) -> Result<Option<IssueView>> {
    let sql = format!(
        "SELECT {} FROM issues i LEFT JOIN predictions p ON p.id = i.prediction_id WHERE i.id = ?",
        ISSUE_VIEW_COLUMNS
    );

    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(issue_view_from_row).transpose()
}

/// List issues newest-first with predictions embedded
///
/// Ties on `created_at` keep insertion order.
pub async fn list_issues(pool: &SqlitePool, filter: &IssueFilter) -> Result<Vec<IssueView>> {
    let mut sql = format!(
        "SELECT {} FROM issues i LEFT JOIN predictions p ON p.id = i.prediction_id WHERE 1 = 1",
        ISSUE_VIEW_COLUMNS
    );

    if filter.reporter_id.is_some() {
        sql.push_str(" AND i.reporter_id = ?");
    }
    if filter.status.is_some() {
        sql.push_str(" AND i.status = ?");
    }
    sql.push_str(" ORDER BY i.created_at DESC, i.rowid ASC");

    let mut query = sqlx::query(&sql);
    if let Some(reporter_id) = &filter.reporter_id {
        query = query.bind(reporter_id);
    }
    if let Some(status) = filter.status {
        query = query.bind(status.as_str());
    }

    let rows = query.fetch_all(pool).await?;

    rows.iter().map(issue_view_from_row).collect()
}

fn issue_from_row(row: &SqliteRow) -> Result<Issue> {
    let id: String = row.try_get("id")?;
    let status: String = row.try_get("status")?;
    let prediction_id: Option<String> = row.try_get("prediction_id")?;
    let created_at: String = row.try_get("created_at")?;
    let resolved_at: Option<String> = row.try_get("resolved_at")?;

    Ok(Issue {
        id: stored_uuid("issues.id", &id)?,
        reporter_id: row.try_get("reporter_id")?,
        description: row.try_get("description")?,
        image_ref: row.try_get("image_ref")?,
        location: Location {
            lat: row.try_get("lat")?,
            lng: row.try_get("lng")?,
        },
        status: status
            .parse::<IssueStatus>()
            .map_err(|e| civic_common::Error::Internal(format!("Corrupt issues.status: {}", e)))?,
        prediction_id: prediction_id
            .map(|s| stored_uuid("issues.prediction_id", &s))
            .transpose()?,
        created_at: stored_timestamp("issues.created_at", &created_at)?,
        resolved_at: resolved_at
            .map(|s| stored_timestamp("issues.resolved_at", &s))
            .transpose()?,
    })
}

fn issue_view_from_row(row: &SqliteRow) -> Result<IssueView> {
    let issue = issue_from_row(row)?;

    let prediction = match row.try_get::<Option<String>, _>("p_id")? {
        Some(p_id) => {
            let priority: String = row.try_get("p_priority")?;
            let created_at: String = row.try_get("p_created_at")?;

            Some(Prediction {
                id: stored_uuid("predictions.id", &p_id)?,
                issue_id: issue.id,
                issue_type: row.try_get("p_issue_type")?,
                confidence: row.try_get("p_confidence")?,
                severity: row.try_get("p_severity")?,
                priority: priority.parse::<Priority>().map_err(|e| {
                    civic_common::Error::Internal(format!("Corrupt predictions.priority: {}", e))
                })?,
                created_at: stored_timestamp("predictions.created_at", &created_at)?,
            })
        }
        None => None,
    };

    Ok(IssueView { issue, prediction })
}
