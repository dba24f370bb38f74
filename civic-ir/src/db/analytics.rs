//! Read-only aggregation queries
//!
//! These take no locks and run directly against the pool. The service layer
//! folds their rows into the response shapes.

use chrono::{DateTime, Utc};
use civic_common::{IssueStatus, Result};
use sqlx::{Row, SqlitePool};

use super::stored_timestamp;

/// Issue counts by current status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub reported: i64,
    pub in_progress: i64,
    pub resolved: i64,
}

impl StatusCounts {
    pub fn total(&self) -> i64 {
        self.reported + self.in_progress + self.resolved
    }

    pub fn add(&mut self, status: IssueStatus, count: i64) {
        match status {
            IssueStatus::Reported => self.reported += count,
            IssueStatus::InProgress => self.in_progress += count,
            IssueStatus::Resolved => self.resolved += count,
        }
    }
}

/// One `(year, month, status)` group from the first aggregation phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthStatusGroup {
    pub year: i32,
    pub month: u32,
    pub status: IssueStatus,
    pub count: i64,
}

/// Active issue location with the severity used as cluster weight
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActivePoint {
    pub lat: f64,
    pub lng: f64,
    pub severity: i64,
}

/// Count issues grouped by current status
pub async fn count_by_status(pool: &SqlitePool) -> Result<StatusCounts> {
    let rows = sqlx::query("SELECT status, COUNT(*) AS n FROM issues GROUP BY status")
        .fetch_all(pool)
        .await?;

    let mut counts = StatusCounts::default();
    for row in rows {
        let status: String = row.try_get("status")?;
        let n: i64 = row.try_get("n")?;
        counts.add(parse_status(&status)?, n);
    }

    Ok(counts)
}

/// `(created_at, resolved_at)` of every resolved issue
pub async fn resolution_spans(pool: &SqlitePool) -> Result<Vec<(DateTime<Utc>, DateTime<Utc>)>> {
    let rows = sqlx::query(
        r#"
        SELECT created_at, resolved_at
        FROM issues
        WHERE status = 'Resolved' AND resolved_at IS NOT NULL
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| -> Result<(DateTime<Utc>, DateTime<Utc>)> {
            let created_at: String = row.try_get("created_at")?;
            let resolved_at: String = row.try_get("resolved_at")?;
            Ok((
                stored_timestamp("issues.created_at", &created_at)?,
                stored_timestamp("issues.resolved_at", &resolved_at)?,
            ))
        })
        .collect()
}

/// Non-resolved issues whose prediction carries Emergency priority
pub async fn count_emergency_pending(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM issues i
        JOIN predictions p ON p.id = i.prediction_id
        WHERE i.status != 'Resolved' AND p.priority = 'Emergency'
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// First aggregation phase: counts grouped by creation month and current status
///
/// Timestamps are stored as UTC RFC 3339 text, so `strftime` buckets by the
/// recorded UTC calendar month.
pub async fn group_by_month_and_status(pool: &SqlitePool) -> Result<Vec<MonthStatusGroup>> {
    let rows = sqlx::query(
        r#"
        SELECT CAST(strftime('%Y', created_at) AS INTEGER) AS year,
               CAST(strftime('%m', created_at) AS INTEGER) AS month,
               status,
               COUNT(*) AS n
        FROM issues
        GROUP BY year, month, status
        ORDER BY year ASC, month ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| -> Result<MonthStatusGroup> {
            let year: i64 = row.try_get("year")?;
            let month: i64 = row.try_get("month")?;
            let status: String = row.try_get("status")?;

            Ok(MonthStatusGroup {
                year: year as i32,
                month: month as u32,
                status: parse_status(&status)?,
                count: row.try_get("n")?,
            })
        })
        .collect()
}

/// Locations of every non-resolved issue, weighted by prediction severity
///
/// Issues without a prediction weigh 1. Ordered by creation so clustering
/// output is deterministic.
pub async fn active_points(pool: &SqlitePool) -> Result<Vec<ActivePoint>> {
    let rows = sqlx::query(
        r#"
        SELECT i.lat, i.lng, COALESCE(p.severity, 1) AS severity
        FROM issues i
        LEFT JOIN predictions p ON p.id = i.prediction_id
        WHERE i.status != 'Resolved'
        ORDER BY i.created_at ASC, i.rowid ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| -> Result<ActivePoint> {
            Ok(ActivePoint {
                lat: row.try_get("lat")?,
                lng: row.try_get("lng")?,
                severity: row.try_get("severity")?,
            })
        })
        .collect()
}

fn parse_status(value: &str) -> Result<IssueStatus> {
    value
        .parse::<IssueStatus>()
        .map_err(|e| civic_common::Error::Internal(format!("Corrupt issues.status: {}", e)))
}
