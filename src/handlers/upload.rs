//! Shared image upload helpers
//!
//! Multipart forms carry an optional "imagen" file next to regular text
//! fields. Files are validated (JPG/PNG, size limit), renamed to a random
//! filename and written under the uploads tree.

use axum::extract::Multipart;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum UploadError {
    #[error("Formato no válido, solo se acepta JPG o PNG")]
    InvalidFormat,

    #[error("El archivo supera los {0}k permitidos")]
    TooLarge(usize),

    #[error("Error al leer el formulario")]
    Malformed,
}

/// An accepted image, not yet written to disk
#[derive(Debug, Clone)]
pub struct UploadedImage {
    /// Randomized filename including extension
    pub filename: String,
    pub data: Vec<u8>,
}

/// Map an accepted MIME type to its file extension
fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" => Some("jpeg"),
        "image/png" => Some("png"),
        _ => None,
    }
}

/// Drain a multipart form into text fields plus an optional "imagen" file
pub async fn collect_form(
    mut multipart: Multipart,
    max_image_size: usize,
) -> Result<(HashMap<String, String>, Option<UploadedImage>), UploadError> {
    let mut fields = HashMap::new();
    let mut image = None;

    while let Some(field) = multipart.next_field().await.map_err(|_| UploadError::Malformed)? {
        let name = field.name().unwrap_or("").to_string();

        if name == "imagen" && field.file_name().map_or(false, |f| !f.is_empty()) {
            let content_type = field.content_type().unwrap_or("").to_string();
            let ext = extension_for(&content_type).ok_or(UploadError::InvalidFormat)?;

            let data = field.bytes().await.map_err(|_| UploadError::Malformed)?;
            if data.len() > max_image_size {
                return Err(UploadError::TooLarge(max_image_size / 1000));
            }

            image = Some(UploadedImage {
                filename: format!("{}.{}", Uuid::new_v4().simple(), ext),
                data: data.to_vec(),
            });
        } else {
            let text = field.text().await.map_err(|_| UploadError::Malformed)?;
            fields.insert(name, text);
        }
    }

    Ok((fields, image))
}

/// Write an uploaded image into the given directory
pub async fn save_image(dir: &Path, image: &UploadedImage) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(dir.join(&image.filename), &image.data).await
}

/// Best-effort removal of a stored image; failures are logged, never fatal
pub async fn delete_image(dir: &Path, filename: &str) {
    let path = dir.join(filename);
    if let Err(e) = tokio::fs::remove_file(&path).await {
        tracing::error!("Failed to delete image {}: {}", path.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_whitelist() {
        assert_eq!(extension_for("image/jpeg"), Some("jpeg"));
        assert_eq!(extension_for("image/png"), Some("png"));
        assert_eq!(extension_for("image/gif"), None);
        assert_eq!(extension_for("application/pdf"), None);
    }

    #[test]
    fn test_too_large_message_in_kilobytes() {
        let err = UploadError::TooLarge(200);
        assert_eq!(err.to_string(), "El archivo supera los 200k permitidos");
    }

    #[tokio::test]
    async fn test_save_and_delete_image() {
        let dir = std::env::temp_dir().join(format!("meeti-test-{}", Uuid::new_v4().simple()));
        let image = UploadedImage {
            filename: "abc.png".to_string(),
            data: vec![1, 2, 3],
        };
        save_image(&dir, &image).await.unwrap();
        assert!(dir.join("abc.png").exists());
        delete_image(&dir, "abc.png").await;
        assert!(!dir.join("abc.png").exists());
        // deleting again only logs
        delete_image(&dir, "abc.png").await;
        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
