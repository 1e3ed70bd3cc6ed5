// Uploaded-file store for post photos. Posts keep the path relative to the media root.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

const PHOTO_DIR: &str = "photos";
const SNIFFED_FORMATS: [&str; 5] = ["jpg", "png", "gif", "webp", "bmp"];

static IMAGE_EXTENSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\.(jpe?g|png|gif|webp|bmp)$").expect("image extension pattern is valid")
});

#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lowercased extension of an accepted image file name.
    pub fn image_extension(file_name: &str) -> Option<String> {
        IMAGE_EXTENSION
            .captures(file_name)
            .and_then(|caps| caps.get(1))
            .map(|ext| ext.as_str().to_ascii_lowercase())
    }

    /// Checks an upload without touching the disk: the name must carry an
    /// image extension and the content must sniff as one of the accepted
    /// formats. Returns the sniffed extension to store it under.
    pub fn validate_photo(original_name: &str, bytes: &[u8]) -> AppResult<String> {
        let not_an_image = || {
            AppError::Validation(
                "Upload a valid image. The file you uploaded was either not an image or a corrupted image."
                    .to_string(),
            )
        };

        Self::image_extension(original_name).ok_or_else(not_an_image)?;
        if bytes.is_empty() {
            return Err(AppError::Validation("The submitted file is empty.".to_string()));
        }

        let kind = infer::get(bytes)
            .filter(|kind| kind.matcher_type() == infer::MatcherType::Image)
            .filter(|kind| SNIFFED_FORMATS.contains(&kind.extension()))
            .ok_or_else(not_an_image)?;
        Ok(kind.extension().to_string())
    }

    /// Store a photo under `photos/` with a fresh name; returns the relative path.
    pub async fn save_photo(&self, original_name: &str, bytes: &[u8]) -> AppResult<String> {
        let extension = Self::validate_photo(original_name, bytes)?;

        let relative = format!("{}/{}.{}", PHOTO_DIR, Uuid::new_v4(), extension);
        let target = self.root.join(&relative);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;

        info!("Stored photo {} ({} bytes)", relative, bytes.len());
        Ok(relative)
    }

    /// Best-effort removal; a missing file is not an error worth surfacing.
    pub async fn remove(&self, relative: &str) {
        if relative.contains("..") {
            warn!("Refusing to remove media path outside the root: {}", relative);
            return;
        }
        if let Err(e) = tokio::fs::remove_file(self.root.join(relative)).await {
            warn!("Failed to remove media file {}: {}", relative, e);
        }
    }
}
