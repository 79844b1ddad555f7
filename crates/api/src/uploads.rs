//! Upload intake: content sniffing and storage of submitted images.

use std::io::Cursor;

use image::{ImageFormat, ImageReader};
use modelforge_pipeline::LocalStore;

use crate::error::{AppError, AppResult};

/// Storage key prefix for uploaded images.
const UPLOAD_PREFIX: &str = "uploads";

/// Formats accepted as job input.
const ACCEPTED_FORMATS: &[ImageFormat] = &[ImageFormat::Png, ImageFormat::Jpeg, ImageFormat::WebP];

/// An upload that passed sniffing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SniffedImage {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

impl SniffedImage {
    pub fn extension(&self) -> &'static str {
        match self.format {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::WebP => "webp",
            _ => "png",
        }
    }
}

/// Identify an image from its bytes, ignoring any client-supplied name or
/// content type. Only the header is decoded.
pub fn sniff_image(field: &str, bytes: &[u8]) -> AppResult<SniffedImage> {
    if bytes.is_empty() {
        return Err(AppError::BadRequest(format!("'{field}' is empty")));
    }

    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| AppError::BadRequest(format!("'{field}' could not be read: {e}")))?;

    let format = reader
        .format()
        .filter(|f| ACCEPTED_FORMATS.contains(f))
        .ok_or_else(|| {
            AppError::BadRequest(format!(
                "'{field}' is not a supported image. Supported: PNG, JPEG, WebP"
            ))
        })?;

    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| AppError::BadRequest(format!("'{field}' is not a valid image: {e}")))?;
    if width == 0 || height == 0 {
        return Err(AppError::BadRequest(format!("'{field}' has no pixels")));
    }

    Ok(SniffedImage {
        format,
        width,
        height,
    })
}

/// Sniff and store one uploaded image, returning its public URL.
pub async fn store_image(storage: &LocalStore, field: &str, bytes: &[u8]) -> AppResult<String> {
    let sniffed = sniff_image(field, bytes)?;
    let key = format!(
        "{UPLOAD_PREFIX}/{}.{}",
        uuid::Uuid::now_v7(),
        sniffed.extension()
    );

    let url = storage
        .write(&key, bytes)
        .await
        .map_err(|e| AppError::InternalError(format!("Failed to store upload: {e}")))?;

    tracing::debug!(
        key = %key,
        bytes = bytes.len(),
        width = sniffed.width,
        height = sniffed.height,
        "Upload stored",
    );
    Ok(url)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    /// Smallest valid PNG: 1x1, 8-bit grayscale.
    const TINY_PNG: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x00, 0x00, 0x00, 0x00, 0x3A,
        0x7E, 0x9B, 0x55, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x60,
        0x00, 0x00, 0x00, 0x02, 0x00, 0x01, 0x48, 0xAF, 0xA4, 0x71, 0x00, 0x00, 0x00, 0x00, 0x49,
        0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
    ];

    #[test]
    fn png_is_recognised() {
        let sniffed = sniff_image("images", TINY_PNG).unwrap();
        assert_eq!(sniffed.format, ImageFormat::Png);
        assert_eq!((sniffed.width, sniffed.height), (1, 1));
        assert_eq!(sniffed.extension(), "png");
    }

    #[test]
    fn text_is_rejected() {
        assert_matches!(
            sniff_image("images", b"definitely not pixels"),
            Err(AppError::BadRequest(msg)) if msg.contains("not a supported image")
        );
    }

    #[test]
    fn empty_is_rejected() {
        assert_matches!(sniff_image("texture_image", b""), Err(AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn stored_under_uploads_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStore::new(dir.path(), "http://files.test");

        let url = store_image(&storage, "images", TINY_PNG).await.unwrap();

        assert!(url.starts_with("http://files.test/uploads/"));
        assert!(url.ends_with(".png"));
        let name = url.rsplit('/').next().unwrap();
        assert!(dir.path().join("uploads").join(name).exists());
    }
}
