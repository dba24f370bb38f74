//! Upload storage
//!
//! Images are sniffed by content, not by the client's filename or content
//! type, and written under `<root>/uploads/<uuid>.<ext>`. The `imageRef`
//! recorded on the issue is the path relative to the root folder.

use crate::error::{ApiError, ApiResult};
use civic_common::config::UPLOADS_DIR;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Content type detected for an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageKind {
    pub mime_type: String,
    pub extension: String,
}

/// Saved upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub image_ref: String,
    pub kind: ImageKind,
}

#[derive(Debug, Clone)]
pub struct ImageStore {
    uploads_dir: PathBuf,
    max_bytes: usize,
}

impl ImageStore {
    pub fn new(uploads_dir: PathBuf, max_bytes: usize) -> Self {
        Self {
            uploads_dir,
            max_bytes,
        }
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Reject empty, oversized or non-image uploads
    pub fn inspect(&self, bytes: &[u8]) -> ApiResult<ImageKind> {
        if bytes.is_empty() {
            return Err(ApiError::validation("image", "image is empty"));
        }

        if bytes.len() > self.max_bytes {
            return Err(ApiError::validation(
                "image",
                format!("image exceeds {} bytes", self.max_bytes),
            ));
        }

        match infer::get(bytes) {
            Some(kind) if kind.matcher_type() == infer::MatcherType::Image => Ok(ImageKind {
                mime_type: kind.mime_type().to_string(),
                extension: kind.extension().to_string(),
            }),
            Some(kind) => Err(ApiError::validation(
                "image",
                format!("unsupported content type {}", kind.mime_type()),
            )),
            None => Err(ApiError::validation("image", "unrecognised image format")),
        }
    }

    /// Write an inspected upload under a fresh name
    pub async fn save(&self, bytes: &[u8], kind: ImageKind) -> ApiResult<StoredImage> {
        let file_name = format!("{}.{}", civic_common::uuid_utils::generate(), kind.extension);

        tokio::fs::create_dir_all(&self.uploads_dir).await?;
        tokio::fs::write(self.uploads_dir.join(&file_name), bytes).await?;

        debug!(file = %file_name, bytes = bytes.len(), "Stored upload");

        Ok(StoredImage {
            image_ref: format!("{}/{}", UPLOADS_DIR, file_name),
            kind,
        })
    }

    /// Best-effort removal of an upload whose issue was never committed
    pub async fn discard(&self, image_ref: &str) {
        let Some(file_name) = image_ref.strip_prefix(&format!("{}/", UPLOADS_DIR)) else {
            return;
        };

        if let Err(e) = tokio::fs::remove_file(self.uploads_dir.join(file_name)).await {
            warn!(image_ref = %image_ref, "Failed to discard upload: {}", e);
        }
    }
}
