//! Shared test fixtures: in-memory app, scripted classifier, tokens, multipart bodies

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request},
    Router,
};
use civic_common::api::{sign_token, TokenClaims};
use civic_common::{Priority, Role};
use civic_ir::services::{Classification, Classifier, ClassifierError, ClassifierRequest, ImageStore};
use civic_ir::{build_router, AppState};
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const SECRET: i64 = 987_654_321;
pub const CLASSIFIER_TIMEOUT: Duration = Duration::from_millis(200);
pub const MAX_UPLOAD_BYTES: usize = 64 * 1024;
pub const BOUNDARY: &str = "civic-test-boundary";

/// Smallest byte prefix `infer` recognises as PNG
pub const PNG_BYTES: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
];

/// How the fake classifier answers
#[derive(Debug, Clone)]
pub enum Script {
    Succeed(Classification),
    Fail,
    /// Sleep well past the lifecycle deadline
    Hang,
}

pub struct FakeClassifier {
    script: Script,
    calls: AtomicUsize,
}

impl FakeClassifier {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Classifier for FakeClassifier {
    async fn classify(&self, _request: &ClassifierRequest) -> Result<Classification, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Script::Succeed(classification) => Ok(classification.clone()),
            Script::Fail => Err(ClassifierError::Api(503, "model not loaded".to_string())),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Err(ClassifierError::Network("unreachable".to_string()))
            }
        }
    }
}

pub fn pothole() -> Classification {
    Classification {
        issue_type: "Pothole".to_string(),
        confidence: 0.87,
        severity: 4,
        priority: Priority::High,
    }
}

pub fn emergency() -> Classification {
    Classification {
        issue_type: "Fallen tree".to_string(),
        confidence: 0.95,
        severity: 5,
        priority: Priority::Emergency,
    }
}

pub struct TestApp {
    pub router: Router,
    pub db: SqlitePool,
    pub classifier: Arc<FakeClassifier>,
    pub state: AppState,
    pub root: TempDir,
}

pub async fn setup(script: Script) -> TestApp {
    let db = civic_common::db::init_in_memory()
        .await
        .expect("in-memory database");
    let root = tempfile::tempdir().expect("temp dir");
    build(db, root, script)
}

/// Same app over a WAL database file with the production pool settings
pub async fn setup_on_disk(script: Script) -> TestApp {
    let root = tempfile::tempdir().expect("temp dir");
    let db = civic_common::db::init_database(&root.path().join("civic.db"))
        .await
        .expect("on-disk database");
    build(db, root, script)
}

fn build(db: SqlitePool, root: TempDir, script: Script) -> TestApp {
    let images = ImageStore::new(root.path().join("uploads"), MAX_UPLOAD_BYTES);
    let classifier = Arc::new(FakeClassifier::new(script));

    let state = AppState::new(
        db.clone(),
        SECRET,
        classifier.clone(),
        CLASSIFIER_TIMEOUT,
        images,
    );

    TestApp {
        router: build_router(state.clone()),
        db,
        classifier,
        state,
        root,
    }
}

pub fn token(sub: &str, role: Role) -> String {
    let exp = chrono::Utc::now().timestamp() + 3600;
    sign_token(&TokenClaims::new(sub, role, exp), SECRET)
}

pub fn citizen_token(sub: &str) -> String {
    token(sub, Role::Citizen)
}

pub fn admin_token() -> String {
    token("admin-1", Role::Admin)
}

/// One multipart part
pub enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File(name, file_name, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                        name, file_name
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

/// A complete, valid report form
pub fn report_parts<'a>(description: &'a str, lat: &'a str, lng: &'a str) -> Vec<Part<'a>> {
    vec![
        Part::Text("description", description),
        Part::Text("lat", lat),
        Part::Text("lng", lng),
        Part::File("image", "photo.png", PNG_BYTES),
    ]
}

pub fn report_request(token: Option<&str>, parts: &[Part<'_>]) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/issues")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        );
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(multipart_body(parts))).unwrap()
}

pub fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn patch_status_request(id: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("PATCH")
        .uri(format!("/issues/{}/status", id))
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub async fn json_body(body: Body) -> Value {
    let bytes = body.collect().await.expect("read body").to_bytes();
    serde_json::from_slice(&bytes).expect("JSON body")
}
