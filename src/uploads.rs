use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::error::ServiceError;
use crate::models::new_id;

const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Stores uploaded images on local disk and hands back a public URL.
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
    public_base_url: String,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>, public_base_url: &str) -> Self {
        ImageStore {
            dir: dir.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Stored names are generated; only the extension of the client's name is kept.
    pub fn stored_name(original: &str) -> Result<String, ServiceError> {
        let extension = Path::new(original)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .filter(|e| ALLOWED_EXTENSIONS.contains(&e.as_str()))
            .ok_or_else(|| ServiceError::Validation("image must be a jpg, png, webp or gif file".to_string()))?;
        Ok(format!("{}.{}", new_id(), extension))
    }

    pub async fn save(&self, original: &str, bytes: &[u8]) -> Result<String, ServiceError> {
        if bytes.is_empty() {
            return Err(ServiceError::Validation("image is required".to_string()));
        }
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(ServiceError::Validation("image must be at most 5 MB".to_string()));
        }

        let name = Self::stored_name(original)?;
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            error!("Failed to create upload directory {:?}: {}", self.dir, e);
            ServiceError::Internal(e.to_string())
        })?;
        tokio::fs::write(self.dir.join(&name), bytes).await.map_err(|e| {
            error!("Failed to store upload {}: {}", name, e);
            ServiceError::Internal(e.to_string())
        })?;

        info!("Stored upload {} ({} bytes)", name, bytes.len());
        Ok(format!("{}/uploads/{}", self.public_base_url, name))
    }

    /// Reads a previously stored file; names that could escape the directory are refused.
    pub async fn load(&self, name: &str) -> Option<Vec<u8>> {
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
            return None;
        }
        tokio::fs::read(self.dir.join(name)).await.ok()
    }
}

pub fn content_type(name: &str) -> &'static str {
    match Path::new(name).extension().and_then(|e| e.to_str()) {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/jpeg",
    }
}
