//! civic-ir library - Issue Reporting module
//!
//! Citizens report issues (photo, description, location), an external
//! classifier attaches a prediction, admins move issues through their
//! lifecycle and read aggregate analytics.

use axum::Router;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod services;

use services::{AnalyticsAggregator, Classifier, ImageStore, IssueLifecycle};

/// Request bodies beyond the image itself (text fields, multipart framing)
const BODY_OVERHEAD_BYTES: usize = 64 * 1024;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Token signing secret
    pub shared_secret: i64,
    pub lifecycle: IssueLifecycle,
    pub analytics: AnalyticsAggregator,
    /// Largest accepted upload
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        shared_secret: i64,
        classifier: Arc<dyn Classifier>,
        classifier_timeout: Duration,
        images: ImageStore,
    ) -> Self {
        let max_upload_bytes = images.max_bytes();
        Self {
            lifecycle: IssueLifecycle::new(db.clone(), classifier, classifier_timeout, images),
            analytics: AnalyticsAggregator::new(db),
            shared_secret,
            max_upload_bytes,
        }
    }
}

/// Build application router
///
/// `/health` is public. Every other route passes through the bearer token
/// middleware; role checks happen in the services.
pub fn build_router(state: AppState) -> Router {
    use axum::extract::DefaultBodyLimit;
    use axum::middleware;
    use axum::routing::{get, patch};
    use tower_http::cors::CorsLayer;
    use tower_http::trace::TraceLayer;

    let body_limit = state.max_upload_bytes + BODY_OVERHEAD_BYTES;

    let protected = Router::new()
        .route("/issues", get(api::issues::list_issues).post(api::issues::report_issue))
        .route("/issues/:id", get(api::issues::get_issue))
        .route("/issues/:id/status", patch(api::issues::change_status))
        .route("/issues/:id/history", get(api::issues::issue_history))
        .route("/analytics/summary", get(api::analytics::summary))
        .route("/analytics/monthly", get(api::analytics::monthly))
        .route("/analytics/hotspots", get(api::analytics::hotspots))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ))
        .layer(DefaultBodyLimit::max(body_limit));

    let public = Router::new().merge(api::health_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
