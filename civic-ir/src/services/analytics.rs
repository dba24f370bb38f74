//! Analytics Aggregator
//!
//! Read-only. Each operation is a handful of grouped queries followed by a
//! pure fold, so the arithmetic is testable without a database.

use crate::db::analytics::{self as queries, MonthStatusGroup, StatusCounts};
use crate::error::ApiResult;
use crate::services::access_policy::require;
use crate::services::hotspots::{find_hotspots, Hotspot, DEFAULT_EPS, DEFAULT_MIN_SAMPLES};
use chrono::{DateTime, Utc};
use civic_common::time::hours_between;
use civic_common::{Caller, Role};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_issues: i64,
    pub active_issues: i64,
    pub resolved_issues: i64,
    pub avg_resolution_time_hours: f64,
    /// Non-resolved issues predicted as Emergency
    pub emergency_pending: i64,
}

/// Issue counts for one `(year, month)` of creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyBucket {
    pub year: i32,
    pub month: u32,
    pub reported_count: i64,
    pub in_progress_count: i64,
    pub resolved_count: i64,
    pub total_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HotspotReport {
    pub hotspots: Vec<Hotspot>,
}

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Mean resolution time in hours, 0 when nothing is resolved
pub fn average_resolution_hours(spans: &[(DateTime<Utc>, DateTime<Utc>)]) -> f64 {
    if spans.is_empty() {
        return 0.0;
    }

    let total: f64 = spans
        .iter()
        .map(|(created, resolved)| hours_between(created, resolved))
        .sum();

    round2(total / spans.len() as f64)
}

pub fn summarize(
    counts: StatusCounts,
    spans: &[(DateTime<Utc>, DateTime<Utc>)],
    emergency_pending: i64,
) -> Summary {
    let total_issues = counts.total();
    let resolved_issues = counts.resolved;

    Summary {
        total_issues,
        active_issues: total_issues - resolved_issues,
        resolved_issues,
        avg_resolution_time_hours: average_resolution_hours(spans),
        emergency_pending,
    }
}

/// Second aggregation phase: fold status groups into ascending month buckets
pub fn fold_monthly(groups: &[MonthStatusGroup]) -> Vec<MonthlyBucket> {
    let mut buckets: BTreeMap<(i32, u32), StatusCounts> = BTreeMap::new();

    for group in groups {
        buckets
            .entry((group.year, group.month))
            .or_default()
            .add(group.status, group.count);
    }

    buckets
        .into_iter()
        .map(|((year, month), counts)| MonthlyBucket {
            year,
            month,
            reported_count: counts.reported,
            in_progress_count: counts.in_progress,
            resolved_count: counts.resolved,
            total_count: counts.total(),
        })
        .collect()
}

/// Admin-only aggregate views over the issue store
#[derive(Clone)]
pub struct AnalyticsAggregator {
    db: SqlitePool,
}

impl AnalyticsAggregator {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn summary(&self, caller: Option<&Caller>) -> ApiResult<Summary> {
        require(caller, Role::Admin, "Viewing analytics")?;

        let counts = queries::count_by_status(&self.db).await?;
        let spans = queries::resolution_spans(&self.db).await?;
        let emergency_pending = queries::count_emergency_pending(&self.db).await?;

        Ok(summarize(counts, &spans, emergency_pending))
    }

    pub async fn monthly_trend(&self, caller: Option<&Caller>) -> ApiResult<Vec<MonthlyBucket>> {
        require(caller, Role::Admin, "Viewing analytics")?;

        let groups = queries::group_by_month_and_status(&self.db).await?;

        Ok(fold_monthly(&groups))
    }

    pub async fn hotspots(&self, caller: Option<&Caller>) -> ApiResult<HotspotReport> {
        require(caller, Role::Admin, "Viewing analytics")?;

        let points = queries::active_points(&self.db).await?;
        let hotspots = find_hotspots(&points, DEFAULT_EPS, DEFAULT_MIN_SAMPLES);

        tracing::debug!(points = points.len(), clusters = hotspots.len(), "Hotspots computed");

        Ok(HotspotReport { hotspots })
    }
}
