//! VLM interaction: send one page image and collect the transcription.
//!
//! [`VisionModel`] is the seam between the Transcriber and the model
//! endpoint. [`LlmVisionModel`] implements it on top of any
//! `edgequake-llm` provider; tests substitute scripted models.
//!
//! A failed call is not retried; it becomes a [`PageError`] and the batch
//! moves on.

use crate::config::PipelineConfig;
use crate::error::PageError;
use crate::pipeline::encode::encode_image_file;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Error reported by a [`VisionModel`].
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct ModelError(pub String);

/// A vision-language model that turns one page image into Markdown.
pub trait VisionModel {
    /// Send `image` together with the system `instruction`.
    ///
    /// Returns the ordered text segments of the response (one per choice);
    /// the caller concatenates them without a separator.
    fn transcribe(
        &self,
        instruction: &str,
        image: ImageData,
    ) -> impl Future<Output = Result<Vec<String>, ModelError>> + Send;
}

/// [`VisionModel`] backed by an `edgequake-llm` provider.
///
/// ## Message Layout
///
/// 1. **System message**: the transcription instruction
/// 2. **User message**: the page image as a base64 attachment (empty text)
pub struct LlmVisionModel {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
}

impl LlmVisionModel {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &PipelineConfig) -> Self {
        Self {
            provider,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    fn build_options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

impl VisionModel for LlmVisionModel {
    async fn transcribe(
        &self,
        instruction: &str,
        image: ImageData,
    ) -> Result<Vec<String>, ModelError> {
        let messages = vec![
            ChatMessage::system(instruction),
            ChatMessage::user_with_images("", vec![image]),
        ];
        let options = self.build_options();

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| ModelError(e.to_string()))?;

        debug!(
            "{} input tokens, {} output tokens",
            response.prompt_tokens, response.completion_tokens
        );
        Ok(vec![response.content])
    }
}

/// Transcribe a single page image into a Markdown fragment.
///
/// Encodes the image, calls the model (bounded by `timeout` when set) and
/// joins the response segments verbatim. A response without any
/// non-whitespace text is reported as [`PageError::EmptyResponse`].
pub async fn transcribe_page<M: VisionModel>(
    model: &M,
    instruction: &str,
    page_num: usize,
    image_path: &Path,
    timeout: Option<Duration>,
) -> Result<String, PageError> {
    let image = encode_image_file(image_path)
        .await
        .map_err(|e| PageError::ImageUnreadable {
            page: page_num,
            path: image_path.to_path_buf(),
            detail: e.to_string(),
        })?;

    let call = model.transcribe(instruction, image);
    let segments = match timeout {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .map_err(|_| PageError::Timeout {
                page: page_num,
                secs: limit.as_secs(),
            })?,
        None => call.await,
    }
    .map_err(|e| PageError::ModelFailed {
        page: page_num,
        detail: e.to_string(),
    })?;

    let markdown = segments.concat();
    if markdown.trim().is_empty() {
        return Err(PageError::EmptyResponse { page: page_num });
    }
    Ok(markdown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
    use tempfile::TempDir;

    struct Scripted(Result<Vec<String>, ModelError>);

    impl VisionModel for Scripted {
        async fn transcribe(
            &self,
            _instruction: &str,
            _image: ImageData,
        ) -> Result<Vec<String>, ModelError> {
            self.0.clone()
        }
    }

    struct Stalling;

    impl VisionModel for Stalling {
        async fn transcribe(
            &self,
            _instruction: &str,
            _image: ImageData,
        ) -> Result<Vec<String>, ModelError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(vec!["late".into()])
        }
    }

    fn page_png(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("page_1.png");
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255])))
            .save_with_format(&path, ImageFormat::Png)
            .unwrap();
        path
    }

    #[tokio::test]
    async fn segments_concatenated_without_separator() {
        let dir = TempDir::new().unwrap();
        let path = page_png(dir.path());
        let model = Scripted(Ok(vec!["# Title\n".into(), "Body".into()]));
        let md = transcribe_page(&model, "inst", 1, &path, None).await.unwrap();
        assert_eq!(md, "# Title\nBody");
    }

    #[tokio::test]
    async fn whitespace_response_is_unusable() {
        let dir = TempDir::new().unwrap();
        let path = page_png(dir.path());
        let model = Scripted(Ok(vec!["  \n".into()]));
        let err = transcribe_page(&model, "inst", 4, &path, None).await.unwrap_err();
        assert!(matches!(err, PageError::EmptyResponse { page: 4 }));
    }

    #[tokio::test]
    async fn model_error_mapped_to_page_error() {
        let dir = TempDir::new().unwrap();
        let path = page_png(dir.path());
        let model = Scripted(Err(ModelError("HTTP 500".into())));
        let err = transcribe_page(&model, "inst", 2, &path, None).await.unwrap_err();
        match err {
            PageError::ModelFailed { page, detail } => {
                assert_eq!(page, 2);
                assert!(detail.contains("500"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn timeout_reported() {
        let dir = TempDir::new().unwrap();
        let path = page_png(dir.path());
        let err = transcribe_page(&Stalling, "inst", 3, &path, Some(Duration::from_secs(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, PageError::Timeout { page: 3, secs: 1 }));
    }

    #[tokio::test]
    async fn unreadable_image_reported() {
        let model = Scripted(Ok(vec!["x".into()]));
        let err = transcribe_page(&model, "inst", 9, Path::new("/nope/page_9.png"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, PageError::ImageUnreadable { page: 9, .. }));
    }
}
