//! Image encoding: page image file → base64 `ImageData` for the VLM request.
//!
//! The bytes on disk are sent unchanged; the MIME type is taken from the
//! detected image format rather than the file extension. `detail: "high"`
//! asks GPT-4-class models to use the full tile budget so fine print and
//! small tables survive.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::ImageFormat;
use std::path::Path;
use tracing::debug;

/// Why a page image could not be prepared for transport.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("read failed: {0}")]
    Read(#[from] std::io::Error),
    #[error("unrecognised image data: {0}")]
    Format(#[from] image::ImageError),
    #[error("unsupported image format {0:?}")]
    Unsupported(ImageFormat),
}

/// Encode raw image bytes as base64 `ImageData`.
pub fn encode_bytes(bytes: &[u8]) -> Result<ImageData, EncodeError> {
    let format = image::guess_format(bytes)?;
    let mime = match format {
        ImageFormat::Png => "image/png",
        ImageFormat::Jpeg => "image/jpeg",
        other => return Err(EncodeError::Unsupported(other)),
    };

    let b64 = STANDARD.encode(bytes);
    debug!("Encoded image → {} bytes base64", b64.len());

    Ok(ImageData::new(b64, mime).with_detail("high"))
}

/// Read a page image from disk and encode it.
pub async fn encode_image_file(path: &Path) -> Result<ImageData, EncodeError> {
    let bytes = tokio::fs::read(path).await?;
    encode_bytes(&bytes)
}
