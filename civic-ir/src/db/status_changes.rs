//! Status change audit log operations

use civic_common::time::to_storage;
use civic_common::{IssueStatus, Result, StatusChange};
use sqlx::{Executor, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use super::{stored_timestamp, stored_uuid};

/// Append one status change record
pub async fn insert_status_change<'e, E>(executor: E, change: &StatusChange) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO status_changes (id, issue_id, admin_id, from_status, to_status, remarks, changed_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(change.id.to_string())
    .bind(change.issue_id.to_string())
    .bind(&change.admin_id)
    .bind(change.from_status.as_str())
    .bind(change.to_status.as_str())
    .bind(&change.remarks)
    .bind(to_storage(&change.changed_at))
    .execute(executor)
    .await?;

    Ok(())
}

/// History of one issue in commit order
pub async fn list_for_issue(pool: &SqlitePool, issue_id: Uuid) -> Result<Vec<StatusChange>> {
    let rows = sqlx::query(
        r#"
        SELECT id, issue_id, admin_id, from_status, to_status, remarks, changed_at
        FROM status_changes
        WHERE issue_id = ?
        ORDER BY rowid ASC
        "#,
    )
    .bind(issue_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| -> Result<StatusChange> {
            let id: String = row.try_get("id")?;
            let issue_id: String = row.try_get("issue_id")?;
            let from_status: String = row.try_get("from_status")?;
            let to_status: String = row.try_get("to_status")?;
            let changed_at: String = row.try_get("changed_at")?;

            Ok(StatusChange {
                id: stored_uuid("status_changes.id", &id)?,
                issue_id: stored_uuid("status_changes.issue_id", &issue_id)?,
                admin_id: row.try_get("admin_id")?,
                from_status: parse_status(&from_status)?,
                to_status: parse_status(&to_status)?,
                remarks: row.try_get("remarks")?,
                changed_at: stored_timestamp("status_changes.changed_at", &changed_at)?,
            })
        })
        .collect()
}

fn parse_status(value: &str) -> Result<IssueStatus> {
    value
        .parse::<IssueStatus>()
        .map_err(|e| civic_common::Error::Internal(format!("Corrupt status_changes status: {}", e)))
}
