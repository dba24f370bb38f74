//! Business logic for civic-ir

pub mod access_policy;
pub mod analytics;
pub mod classifier_client;
pub mod hotspots;
pub mod image_store;
pub mod lifecycle;

pub use access_policy::{authorize, Decision, DenyReason};
pub use analytics::{AnalyticsAggregator, MonthlyBucket, Summary};
pub use classifier_client::{Classification, Classifier, ClassifierError, ClassifierRequest, HttpClassifier};
pub use image_store::ImageStore;
pub use lifecycle::{IssueLifecycle, ListQuery, NewReport, ReportForm, ReportOutcome, StatusUpdate};
