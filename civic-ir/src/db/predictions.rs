//! Prediction table operations
//!
//! Predictions are write-once: there is no update or delete.

use civic_common::time::to_storage;
use civic_common::{Prediction, Priority, Result};
use sqlx::{Executor, Row, Sqlite};
use uuid::Uuid;

use super::{stored_timestamp, stored_uuid};

/// Insert a prediction row
pub async fn insert_prediction<'e, E>(executor: E, prediction: &Prediction) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO predictions (id, issue_id, issue_type, confidence, severity, priority, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(prediction.id.to_string())
    .bind(prediction.issue_id.to_string())
    .bind(&prediction.issue_type)
    .bind(prediction.confidence)
    .bind(prediction.severity)
    .bind(prediction.priority.as_str())
    .bind(to_storage(&prediction.created_at))
    .execute(executor)
    .await?;

    Ok(())
}

/// Load the prediction belonging to an issue
pub async fn find_by_issue<'e, E>(executor: E, issue_id: Uuid) -> Result<Option<Prediction>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        r#"
        SELECT id, issue_id, issue_type, confidence, severity, priority, created_at
        FROM predictions
        WHERE issue_id = ?
        "#,
    )
    .bind(issue_id.to_string())
    .fetch_optional(executor)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let id: String = row.try_get("id")?;
    let issue_id: String = row.try_get("issue_id")?;
    let priority: String = row.try_get("priority")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(Some(Prediction {
        id: stored_uuid("predictions.id", &id)?,
        issue_id: stored_uuid("predictions.issue_id", &issue_id)?,
        issue_type: row.try_get("issue_type")?,
        confidence: row.try_get("confidence")?,
        severity: row.try_get("severity")?,
        priority: priority
            .parse::<Priority>()
            .map_err(|e| civic_common::Error::Internal(format!("Corrupt predictions.priority: {}", e)))?,
        created_at: stored_timestamp("predictions.created_at", &created_at)?,
    }))
}
