//! Issue endpoints
//!
//! - `POST /issues`: multipart report (any authenticated caller)
//! - `GET /issues`: all issues (admin), or `?mine=true` for the caller's own
//! - `GET /issues/:id`: one issue (reporter or admin)
//! - `PATCH /issues/:id/status`: status transition (admin)
//! - `GET /issues/:id/history`: status change log (admin)

use axum::{
    extract::{
        multipart::{Field, MultipartError, MultipartRejection},
        rejection::{JsonRejection, QueryRejection},
        Multipart, Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use civic_common::{Issue, IssueStatus, IssueView, Role, StatusChange};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::auth::{caller_of, Identity};
use crate::error::{ApiError, ApiResult};
use crate::services::access_policy::require;
use crate::services::lifecycle::{ListQuery, ReportForm, ReportOutcome, StatusUpdate};
use crate::AppState;

/// Query parameters for `GET /issues`
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListParams {
    pub mine: Option<bool>,
    pub status: Option<String>,
}

/// Body of `PATCH /issues/:id/status`
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatusChangeRequest {
    pub status: String,
    #[serde(default)]
    pub remarks: Option<String>,
}

/// POST /issues
pub async fn report_issue(
    State(state): State<AppState>,
    identity: Identity,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<(StatusCode, Json<ReportOutcome>)> {
    let caller = require(caller_of(&identity), Role::Citizen, "ReportIssue")?;

    let multipart = multipart
        .map_err(|e| ApiError::validation("body", format!("Expected multipart/form-data: {}", e.body_text())))?;

    let report = read_report_form(multipart).await?.validate()?;

    let outcome = state.lifecycle.report_issue(Some(caller), report).await?;

    Ok((StatusCode::CREATED, Json(outcome)))
}

/// Collect the known multipart fields; anything else is rejected
async fn read_report_form(mut multipart: Multipart) -> ApiResult<ReportForm> {
    let mut form = ReportForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "description" => set_once(&mut form.description, &name, text(field).await?)?,
            "image" | "file" => {
                let bytes = field.bytes().await.map_err(multipart_error)?;
                set_once(&mut form.image, "image", bytes.to_vec())?
            }
            "location" => set_once(&mut form.location, &name, text(field).await?)?,
            "lat" => set_once(&mut form.lat, &name, text(field).await?)?,
            "lng" => set_once(&mut form.lng, &name, text(field).await?)?,
            "locationFreq" | "location_freq" => {
                set_once(&mut form.location_frequency, "locationFreq", text(field).await?)?
            }
            "" => return Err(ApiError::validation("body", "multipart field without a name")),
            other => {
                return Err(ApiError::validation(other, format!("unexpected field '{}'", other)))
            }
        }
    }

    Ok(form)
}

async fn text(field: Field<'_>) -> ApiResult<String> {
    field.text().await.map_err(multipart_error)
}

fn set_once<T>(slot: &mut Option<T>, field: &str, value: T) -> ApiResult<()> {
    if slot.is_some() {
        return Err(ApiError::validation(field, format!("{} given more than once", field)));
    }
    *slot = Some(value);
    Ok(())
}

fn multipart_error(err: MultipartError) -> ApiError {
    ApiError::validation("body", err.body_text())
}

/// GET /issues
pub async fn list_issues(
    State(state): State<AppState>,
    identity: Identity,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Json<Vec<IssueView>>> {
    let Query(params) = params?;

    let status = params
        .status
        .as_deref()
        .map(|s| {
            s.parse::<IssueStatus>()
                .map_err(|_| ApiError::validation("status", format!("unknown status '{}'", s)))
        })
        .transpose()?;

    let query = ListQuery {
        mine: params.mine.unwrap_or(false),
        status,
    };

    let issues = state.lifecycle.list_issues(caller_of(&identity), query).await?;

    Ok(Json(issues))
}

/// GET /issues/:id
pub async fn get_issue(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> ApiResult<Json<IssueView>> {
    let id = issue_id(&id)?;
    let view = state.lifecycle.get_issue(caller_of(&identity), id).await?;
    Ok(Json(view))
}

/// PATCH /issues/:id/status
pub async fn change_status(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
    body: Result<Json<StatusChangeRequest>, JsonRejection>,
) -> ApiResult<Json<Issue>> {
    let caller = require(caller_of(&identity), Role::Admin, "ChangeStatus")?;
    let id = issue_id(&id)?;
    let Json(body) = body?;

    let update = StatusUpdate::parse(&body.status, body.remarks)?;
    let issue = state.lifecycle.change_status(Some(caller), id, update).await?;

    Ok(Json(issue))
}

/// GET /issues/:id/history
pub async fn issue_history(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<StatusChange>>> {
    let caller = require(caller_of(&identity), Role::Admin, "Reading issue history")?;
    let id = issue_id(&id)?;
    let history = state.lifecycle.history(Some(caller), id).await?;
    Ok(Json(history))
}

/// Ids are UUIDs; anything else cannot name an existing issue
fn issue_id(raw: &str) -> ApiResult<Uuid> {
    civic_common::uuid_utils::parse(raw)
        .map_err(|_| ApiError::NotFound(format!("Issue {} not found", raw)))
}
