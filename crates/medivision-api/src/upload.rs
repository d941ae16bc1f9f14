// Image payloads for the multipart endpoints (profile picture, image
// search). Camera captures and gallery picks both arrive here as a file.

use std::path::Path;

use reqwest::multipart::{Form, Part};

use crate::error::ApiError;

/// Multipart field every image endpoint expects.
pub const IMAGE_FIELD: &str = "image";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let mime_type = mime_for_name(&file_name).to_string();
        Self {
            file_name,
            mime_type,
            bytes,
        }
    }

    /// Read an image from disk.
    pub async fn from_path(path: &Path) -> Result<Self, ApiError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            ApiError::InvalidRequest(format!("failed to read image {}: {e}", path.display()))
        })?;
        if bytes.is_empty() {
            return Err(ApiError::InvalidRequest(format!(
                "image {} is empty",
                path.display()
            )));
        }
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("image.jpg")
            .to_string();
        Ok(Self::new(file_name, bytes))
    }

    /// Multipart form with the image as its single `image` field.
    pub(crate) fn into_form(self) -> Result<Form, ApiError> {
        let part = Part::bytes(self.bytes)
            .file_name(self.file_name)
            .mime_str(&self.mime_type)
            .map_err(|e| ApiError::InvalidRequest(format!("invalid image type: {e}")))?;
        Ok(Form::new().part(IMAGE_FIELD, part))
    }
}

/// MIME type guessed from the file extension. Cameras default to JPEG.
pub fn mime_for_name(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("heic") => "image/heic",
        Some("heif") => "image/heif",
        _ => "image/jpeg",
    }
}
