//! Image classification client
//!
//! The predictor is an external HTTP service taking a multipart form with the
//! image (`file`) and two numeric hints (`description_length`,
//! `location_freq`). Any failure here is recoverable: the lifecycle manager
//! degrades to an issue without a prediction.

use async_trait::async_trait;
use civic_common::Priority;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("civic-ir/", env!("CARGO_PKG_VERSION"));

/// Classifier client errors
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Classifier timed out after {0:?}")]
    Timeout(Duration),

    #[error("Classifier returned {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid classification: {0}")]
    InvalidResponse(String),
}

/// Image and hints sent to the classifier
#[derive(Debug, Clone)]
pub struct ClassifierRequest {
    pub image: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
    pub description_length: usize,
    pub location_frequency: u32,
}

/// Validated classification result
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub issue_type: String,
    pub confidence: f64,
    pub severity: i64,
    pub priority: Priority,
}

/// Wire shape of the predictor response
///
/// The predictor answers in snake_case; camelCase is accepted too.
#[derive(Debug, Clone, Deserialize)]
pub struct RawClassification {
    #[serde(alias = "issueType")]
    pub issue_type: String,
    pub confidence: f64,
    pub severity: i64,
    #[serde(default)]
    pub priority: Option<String>,
}

impl RawClassification {
    /// Check ranges and settle the priority
    ///
    /// A missing or unrecognised priority is derived from severity.
    pub fn validate(self) -> Result<Classification, ClassifierError> {
        let issue_type = self.issue_type.trim().to_string();
        if issue_type.is_empty() {
            return Err(ClassifierError::InvalidResponse("empty issue type".to_string()));
        }

        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(ClassifierError::InvalidResponse(format!(
                "confidence {} outside 0..=1",
                self.confidence
            )));
        }

        if self.severity < 1 {
            return Err(ClassifierError::InvalidResponse(format!(
                "severity {} is not positive",
                self.severity
            )));
        }

        let priority = self
            .priority
            .as_deref()
            .and_then(|p| p.parse::<Priority>().ok())
            .unwrap_or_else(|| Priority::from_severity(self.severity));

        Ok(Classification {
            issue_type,
            confidence: self.confidence,
            severity: self.severity,
            priority,
        })
    }
}

/// Seam between the lifecycle manager and the predictor
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, request: &ClassifierRequest) -> Result<Classification, ClassifierError>;
}

/// HTTP predictor client
pub struct HttpClassifier {
    http_client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpClassifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ClassifierError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ClassifierError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            url: url.into(),
            timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(&self, request: &ClassifierRequest) -> Result<Classification, ClassifierError> {
        let file = reqwest::multipart::Part::bytes(request.image.clone())
            .file_name(request.file_name.clone())
            .mime_str(&request.mime_type)
            .map_err(|e| ClassifierError::Network(e.to_string()))?;

        let form = reqwest::multipart::Form::new()
            .part("file", file)
            .text("description_length", request.description_length.to_string())
            .text("location_freq", request.location_frequency.to_string());

        tracing::debug!(
            url = %self.url,
            bytes = request.image.len(),
            description_length = request.description_length,
            "Requesting classification"
        );

        let response = self
            .http_client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClassifierError::Timeout(self.timeout)
                } else {
                    ClassifierError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ClassifierError::Api(status.as_u16(), error_text));
        }

        let raw: RawClassification = response
            .json()
            .await
            .map_err(|e| ClassifierError::Parse(e.to_string()))?;

        let classification = raw.validate()?;

        tracing::debug!(
            issue_type = %classification.issue_type,
            confidence = classification.confidence,
            severity = classification.severity,
            "Classification received"
        );

        Ok(classification)
    }
}
