use async_trait::async_trait;
use mime::Mime;
use serde::Serialize;

use super::projection::ImageView;

pub const MAX_IMAGES_PER_PROPERTY: usize = 10;
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
pub const PROPERTY_MEDIA_FOLDER: &str = "properties";

const ACCEPTED_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

/// One file from an upload request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Format and size gate applied before anything reaches the media host.
    pub fn validate(&self) -> Result<Mime, MediaError> {
        let mime: Mime = self
            .content_type
            .parse()
            .map_err(|_| MediaError::Rejected(format!("unrecognised content type '{}'", self.content_type)))?;

        if !ACCEPTED_TYPES.contains(&mime.essence_str()) {
            return Err(MediaError::Rejected(
                "only JPEG, PNG, or WEBP images are allowed".to_string(),
            ));
        }
        if self.bytes.is_empty() {
            return Err(MediaError::Rejected("file is empty".to_string()));
        }
        if self.bytes.len() > MAX_IMAGE_BYTES {
            return Err(MediaError::Rejected(format!(
                "file exceeds the {} MiB limit",
                MAX_IMAGE_BYTES / (1024 * 1024)
            )));
        }
        Ok(mime)
    }
}

/// Where the media host put a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMedia {
    pub url: String,
    pub storage_key: String,
}

/// Third-party image host.
#[async_trait]
pub trait MediaUploader: Send + Sync {
    async fn upload(&self, file: &ImageUpload, folder: &str) -> Result<StoredMedia, MediaError>;
    async fn delete(&self, storage_key: &str) -> Result<(), MediaError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MediaError {
    /// Permanent: the file itself is unacceptable.
    #[error("{0}")]
    Rejected(String),
    /// Worth retrying later.
    #[error("media host unavailable: {0}")]
    Transient(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadFailure {
    pub file_name: String,
    pub reason: String,
}

/// Best-effort batch outcome. Partial success is reported, not rolled back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadReport {
    pub uploaded: Vec<ImageView>,
    pub failures: Vec<UploadFailure>,
}

impl UploadReport {
    pub fn summary(&self) -> String {
        if self.failures.is_empty() {
            format!("{} images uploaded successfully", self.uploaded.len())
        } else {
            format!(
                "{} images uploaded, {} failed",
                self.uploaded.len(),
                self.failures.len()
            )
        }
    }
}
