//! Integration tests for civic-ir API endpoints
//!
//! Router-level tests against an in-memory database and a scripted classifier.

mod helpers;

use axum::http::StatusCode;
use civic_common::Role;
use helpers::*;
use serde_json::{json, Value};
use tower::util::ServiceExt; // for `oneshot` method

async fn report(app: &TestApp, token: &str, description: &str) -> Value {
    let response = app
        .router
        .clone()
        .oneshot(report_request(Some(token), &report_parts(description, "12.9716", "77.5946")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    json_body(response.into_body()).await
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint_no_auth_required() {
    let app = setup(Script::Succeed(pothole())).await;

    let response = app.router.clone().oneshot(get_request("/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "civic-ir");
    assert!(body["version"].is_string());
}

// =============================================================================
// Authentication
// =============================================================================

#[tokio::test]
async fn test_missing_token_is_unauthenticated() {
    let app = setup(Script::Succeed(pothole())).await;

    let response = app
        .router
        .clone()
        .oneshot(get_request("/issues?mine=true", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = json_body(response.into_body()).await;
    assert_eq!(body["error"]["code"], "UNAUTHENTICATED");
}

#[tokio::test]
async fn test_bad_signature_is_unauthenticated() {
    let app = setup(Script::Succeed(pothole())).await;

    let forged = civic_common::api::sign_token(
        &civic_common::api::TokenClaims::new("admin-1", Role::Admin, i64::MAX),
        SECRET + 1,
    );

    let response = app
        .router
        .clone()
        .oneshot(get_request("/analytics/summary", Some(&forged)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_token_is_unauthenticated() {
    let app = setup(Script::Succeed(pothole())).await;

    let expired = civic_common::api::sign_token(
        &civic_common::api::TokenClaims::new("admin-1", Role::Admin, 1_000),
        SECRET,
    );

    let response = app
        .router
        .clone()
        .oneshot(get_request("/issues", Some(&expired)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// ReportIssue
// =============================================================================

#[tokio::test]
async fn test_report_issue_with_prediction() {
    let app = setup(Script::Succeed(pothole())).await;

    let body = report(&app, &citizen_token("citizen-1"), "Deep pothole near bus stop").await;

    let issue = &body["issue"];
    let prediction = &body["prediction"];

    assert_eq!(issue["status"], "Reported");
    assert_eq!(issue["reporterId"], "citizen-1");
    assert_eq!(issue["description"], "Deep pothole near bus stop");
    assert_eq!(issue["location"]["lat"], 12.9716);
    assert!(issue["resolvedAt"].is_null());
    assert!(issue["imageRef"].as_str().unwrap().starts_with("uploads/"));

    assert_eq!(prediction["issueType"], "Pothole");
    assert_eq!(prediction["priority"], "High");
    assert_eq!(prediction["severity"], 4);
    assert_eq!(issue["predictionId"], prediction["id"]);
    assert_eq!(prediction["issueId"], issue["id"]);
    assert_eq!(app.classifier.calls(), 1);

    // Upload landed on disk
    let image_ref = issue["imageRef"].as_str().unwrap();
    assert!(app.root.path().join(image_ref).exists());
}

#[tokio::test]
async fn test_report_issue_classifier_failure_degrades() {
    let app = setup(Script::Fail).await;

    let body = report(&app, &citizen_token("citizen-1"), "Overflowing bin").await;

    assert_eq!(body["issue"]["status"], "Reported");
    assert!(body["issue"]["predictionId"].is_null());
    assert!(body["prediction"].is_null());
}

#[tokio::test]
async fn test_report_issue_classifier_timeout_degrades() {
    let app = setup(Script::Hang).await;

    let started = std::time::Instant::now();
    let body = report(&app, &citizen_token("citizen-1"), "Streetlight out").await;

    assert!(started.elapsed() < std::time::Duration::from_secs(5));
    assert_eq!(body["issue"]["status"], "Reported");
    assert!(body["prediction"].is_null());

    // Persisted, not just returned
    let id = body["issue"]["id"].as_str().unwrap();
    let response = app
        .router
        .clone()
        .oneshot(get_request(&format!("/issues/{}", id), Some(&citizen_token("citizen-1"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let view = json_body(response.into_body()).await;
    assert!(view["prediction"].is_null());
    assert_eq!(view["status"], "Reported");
}

#[tokio::test]
async fn test_report_issue_accepts_json_location() {
    let app = setup(Script::Succeed(pothole())).await;

    let parts = vec![
        Part::Text("description", "Broken footpath"),
        Part::Text("location", r#"{"lat": 28.61, "lng": 77.2}"#),
        Part::Text("locationFreq", "4"),
        Part::File("image", "photo.png", PNG_BYTES),
    ];

    let response = app
        .router
        .clone()
        .oneshot(report_request(Some(&citizen_token("citizen-1")), &parts))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = json_body(response.into_body()).await;
    assert_eq!(body["issue"]["location"]["lat"], 28.61);
    assert_eq!(body["issue"]["location"]["lng"], 77.2);
}

#[tokio::test]
async fn test_report_issue_validation_names_field() {
    let app = setup(Script::Succeed(pothole())).await;
    let token = citizen_token("citizen-1");

    let cases: Vec<(Vec<Part<'_>>, &str)> = vec![
        (
            vec![
                Part::Text("lat", "1.0"),
                Part::Text("lng", "2.0"),
                Part::File("image", "photo.png", PNG_BYTES),
            ],
            "description",
        ),
        (
            vec![
                Part::Text("description", "No photo"),
                Part::Text("lat", "1.0"),
                Part::Text("lng", "2.0"),
            ],
            "image",
        ),
        (
            vec![
                Part::Text("description", "Bad lat"),
                Part::Text("lat", "abc"),
                Part::Text("lng", "2.0"),
                Part::File("image", "photo.png", PNG_BYTES),
            ],
            "lat",
        ),
        (
            vec![
                Part::Text("description", "Not an image"),
                Part::Text("lat", "1.0"),
                Part::Text("lng", "2.0"),
                Part::File("image", "notes.txt", b"just some text"),
            ],
            "image",
        ),
        (
            vec![
                Part::Text("description", "Extra field"),
                Part::Text("lat", "1.0"),
                Part::Text("lng", "2.0"),
                Part::Text("priority", "Emergency"),
                Part::File("image", "photo.png", PNG_BYTES),
            ],
            "priority",
        ),
    ];

    for (parts, field) in cases {
        let response = app
            .router
            .clone()
            .oneshot(report_request(Some(&token), &parts))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "field {}", field);

        let body = json_body(response.into_body()).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["field"], field);
    }

    // Nothing was created and the classifier was never consulted
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM issues")
        .fetch_one(&app.db)
        .await
        .unwrap();
    assert_eq!(count, 0);
    assert_eq!(app.classifier.calls(), 0);
}

#[tokio::test]
async fn test_report_issue_requires_token() {
    let app = setup(Script::Succeed(pothole())).await;

    let response = app
        .router
        .clone()
        .oneshot(report_request(None, &report_parts("x", "1", "2")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// ListIssues / GetIssue
// =============================================================================

#[tokio::test]
async fn test_list_mine_newest_first_with_predictions() {
    let app = setup(Script::Succeed(pothole())).await;
    let alice = citizen_token("alice");

    report(&app, &alice, "first").await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    report(&app, &alice, "second").await;
    report(&app, &citizen_token("bob"), "someone else's").await;

    let response = app
        .router
        .clone()
        .oneshot(get_request("/issues?mine=true", Some(&alice)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response.into_body()).await;
    let issues = body.as_array().unwrap();
    assert_eq!(issues.len(), 2);
    assert_eq!(issues[0]["description"], "second");
    assert_eq!(issues[1]["description"], "first");
    assert_eq!(issues[0]["prediction"]["issueType"], "Pothole");
    assert!(issues.iter().all(|i| i["reporterId"] == "alice"));
}

#[tokio::test]
async fn test_list_all_requires_admin() {
    let app = setup(Script::Succeed(pothole())).await;
    report(&app, &citizen_token("alice"), "one").await;
    report(&app, &citizen_token("bob"), "two").await;

    let response = app
        .router
        .clone()
        .oneshot(get_request("/issues", Some(&citizen_token("alice"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .router
        .clone()
        .oneshot(get_request("/issues", Some(&admin_token())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response.into_body()).await;
    assert_eq!(body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_list_status_filter() {
    let app = setup(Script::Fail).await;
    let admin = admin_token();

    let first = report(&app, &citizen_token("alice"), "one").await;
    report(&app, &citizen_token("alice"), "two").await;

    let id = first["issue"]["id"].as_str().unwrap();
    let response = app
        .router
        .clone()
        .oneshot(patch_status_request(id, Some(&admin), json!({"status": "Resolved"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .router
        .clone()
        .oneshot(get_request("/issues?status=Resolved", Some(&admin)))
        .await
        .unwrap();
    let body = json_body(response.into_body()).await;
    let issues = body.as_array().unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0]["id"], id);
    assert!(issues[0]["prediction"].is_null());

    let response = app
        .router
        .clone()
        .oneshot(get_request("/issues?status=Closed", Some(&admin)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .router
        .clone()
        .oneshot(get_request("/issues?sort=asc", Some(&admin)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_issue_visibility() {
    let app = setup(Script::Succeed(pothole())).await;
    let created = report(&app, &citizen_token("alice"), "mine").await;
    let uri = format!("/issues/{}", created["issue"]["id"].as_str().unwrap());

    let response = app
        .router
        .clone()
        .oneshot(get_request(&uri, Some(&citizen_token("bob"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    for token in [citizen_token("alice"), admin_token()] {
        let response = app.router.clone().oneshot(get_request(&uri, Some(&token))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response.into_body()).await;
        assert_eq!(body["prediction"]["priority"], "High");
    }

    let response = app
        .router
        .clone()
        .oneshot(get_request(&format!("/issues/{}", uuid::Uuid::new_v4()), Some(&admin_token())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// ChangeStatus
// =============================================================================

#[tokio::test]
async fn test_change_status_non_admin_forbidden_and_unchanged() {
    let app = setup(Script::Succeed(pothole())).await;
    let created = report(&app, &citizen_token("alice"), "pothole").await;
    let id = created["issue"]["id"].as_str().unwrap();

    let response = app
        .router
        .clone()
        .oneshot(patch_status_request(
            id,
            Some(&citizen_token("alice")),
            json!({"status": "Resolved"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let status: String = sqlx::query_scalar("SELECT status FROM issues WHERE id = ?")
        .bind(id)
        .fetch_one(&app.db)
        .await
        .unwrap();
    assert_eq!(status, "Reported");
}

#[tokio::test]
async fn test_change_status_resolve_then_reopen() {
    let app = setup(Script::Succeed(pothole())).await;
    let admin = admin_token();
    let created = report(&app, &citizen_token("alice"), "pothole").await;
    let id = created["issue"]["id"].as_str().unwrap();

    let response = app
        .router
        .clone()
        .oneshot(patch_status_request(
            id,
            Some(&admin),
            json!({"status": "Resolved", "remarks": "Patched"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let resolved = json_body(response.into_body()).await;
    assert_eq!(resolved["status"], "Resolved");
    assert!(resolved["resolvedAt"].is_string());
    assert_eq!(resolved["createdAt"], created["issue"]["createdAt"]);

    let response = app
        .router
        .clone()
        .oneshot(patch_status_request(id, Some(&admin), json!({"status": "Reported"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let reopened = json_body(response.into_body()).await;
    assert_eq!(reopened["status"], "Reported");
    assert!(reopened["resolvedAt"].is_null());

    // Spaced spelling is accepted, canonical one is returned
    let response = app
        .router
        .clone()
        .oneshot(patch_status_request(id, Some(&admin), json!({"status": "In Progress"})))
        .await
        .unwrap();
    let in_progress = json_body(response.into_body()).await;
    assert_eq!(in_progress["status"], "InProgress");

    let response = app
        .router
        .clone()
        .oneshot(get_request(&format!("/issues/{}/history", id), Some(&admin)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let history = json_body(response.into_body()).await;
    let entries = history.as_array().unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0]["fromStatus"], "Reported");
    assert_eq!(entries[0]["toStatus"], "Resolved");
    assert_eq!(entries[0]["remarks"], "Patched");
    assert_eq!(entries[0]["adminId"], "admin-1");
    assert_eq!(entries[1]["toStatus"], "Reported");
    assert_eq!(entries[2]["toStatus"], "InProgress");
}

#[tokio::test]
async fn test_change_status_errors() {
    let app = setup(Script::Succeed(pothole())).await;
    let admin = admin_token();
    let created = report(&app, &citizen_token("alice"), "pothole").await;
    let id = created["issue"]["id"].as_str().unwrap().to_string();

    let unknown = uuid::Uuid::new_v4().to_string();
    let response = app
        .router
        .clone()
        .oneshot(patch_status_request(&unknown, Some(&admin), json!({"status": "Resolved"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .router
        .clone()
        .oneshot(patch_status_request(&id, Some(&admin), json!({"status": "Closed"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response.into_body()).await;
    assert_eq!(body["error"]["field"], "status");

    let response = app
        .router
        .clone()
        .oneshot(patch_status_request(
            &id,
            Some(&admin),
            json!({"status": "Resolved", "resolvedAt": "2020-01-01T00:00:00Z"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .router
        .clone()
        .oneshot(get_request(&format!("/issues/{}/history", unknown), Some(&admin)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Analytics
// =============================================================================

#[tokio::test]
async fn test_analytics_admin_only() {
    let app = setup(Script::Succeed(pothole())).await;

    for uri in ["/analytics/summary", "/analytics/monthly", "/analytics/hotspots"] {
        let response = app
            .router
            .clone()
            .oneshot(get_request(uri, Some(&citizen_token("alice"))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{}", uri);

        let response = app.router.clone().oneshot(get_request(uri, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
    }
}

#[tokio::test]
async fn test_summary_and_monthly_are_consistent() {
    let app = setup(Script::Succeed(emergency())).await;
    let admin = admin_token();

    let mut ids = Vec::new();
    for n in 0..4 {
        let created = report(&app, &citizen_token("alice"), &format!("issue {}", n)).await;
        ids.push(created["issue"]["id"].as_str().unwrap().to_string());
    }

    app.router
        .clone()
        .oneshot(patch_status_request(&ids[0], Some(&admin), json!({"status": "Resolved"})))
        .await
        .unwrap();
    app.router
        .clone()
        .oneshot(patch_status_request(&ids[1], Some(&admin), json!({"status": "InProgress"})))
        .await
        .unwrap();

    let response = app
        .router
        .clone()
        .oneshot(get_request("/analytics/summary", Some(&admin)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let summary = json_body(response.into_body()).await;

    assert_eq!(summary["totalIssues"], 4);
    assert_eq!(summary["resolvedIssues"], 1);
    assert_eq!(summary["activeIssues"], 3);
    assert_eq!(summary["emergencyPending"], 3);
    assert!(summary["avgResolutionTimeHours"].as_f64().unwrap() >= 0.0);

    let response = app
        .router
        .clone()
        .oneshot(get_request("/analytics/monthly", Some(&admin)))
        .await
        .unwrap();
    let monthly = json_body(response.into_body()).await;
    let buckets = monthly.as_array().unwrap();

    let total: i64 = buckets.iter().map(|b| b["totalCount"].as_i64().unwrap()).sum();
    assert_eq!(total, 4);
    for bucket in buckets {
        let parts = bucket["reportedCount"].as_i64().unwrap()
            + bucket["inProgressCount"].as_i64().unwrap()
            + bucket["resolvedCount"].as_i64().unwrap();
        assert_eq!(parts, bucket["totalCount"].as_i64().unwrap());
    }
}

#[tokio::test]
async fn test_hotspots_need_enough_points() {
    let app = setup(Script::Succeed(pothole())).await;
    let admin = admin_token();

    for n in 0..4 {
        report(&app, &citizen_token("alice"), &format!("issue {}", n)).await;
    }

    let response = app
        .router
        .clone()
        .oneshot(get_request("/analytics/hotspots", Some(&admin)))
        .await
        .unwrap();
    let body = json_body(response.into_body()).await;
    assert_eq!(body["hotspots"].as_array().unwrap().len(), 0);

    report(&app, &citizen_token("bob"), "fifth").await;

    let response = app
        .router
        .clone()
        .oneshot(get_request("/analytics/hotspots", Some(&admin)))
        .await
        .unwrap();
    let body = json_body(response.into_body()).await;
    let hotspots = body["hotspots"].as_array().unwrap();
    assert_eq!(hotspots.len(), 1);
    assert_eq!(hotspots[0]["points"].as_array().unwrap().len(), 5);
    assert_eq!(hotspots[0]["avgSeverity"], 4.0);
    let center_lat = hotspots[0]["center"]["lat"].as_f64().unwrap();
    assert!((center_lat - 12.9716).abs() < 1e-9);
}
