//! Configuration types for a batch pipeline run.
//!
//! Every knob lives in [`PipelineConfig`], built once at process start via
//! [`PipelineConfigBuilder`] and passed by reference to each stage. Library
//! code never reads environment variables; only the binary maps flags and
//! environment into a config.

use crate::error::PipelineError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Configuration for a Rasterize → Transcribe → Assemble run.
///
/// # Example
/// ```rust
/// use edgequake_pdfbatch::{PipelineConfig, StageSelection};
///
/// let config = PipelineConfig::builder()
///     .input_dir("pdfs")
///     .image_root("out/images")
///     .markdown_root("out/markdown")
///     .stages(StageSelection::only(false, false, true))
///     .build()
///     .unwrap();
/// assert!(!config.stages.transcribe);
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Directory scanned for `*.pdf` source documents.
    pub input_dir: PathBuf,

    /// Root of the Rasterizer output: `<image_root>/<doc>/page_<N>.png`.
    pub image_root: PathBuf,

    /// Root of the Transcriber and Assembler output:
    /// `<markdown_root>/<doc>/page_<N>.md` and `full_document.md`.
    pub markdown_root: PathBuf,

    /// Which stages run. Default: all three.
    pub stages: StageSelection,

    /// Rendering DPI. Range: 36–600. Default: 72 (pdfium's 1:1 point-to-pixel scale).
    pub dpi: u32,

    /// Maximum rendered image dimension (width or height) in pixels. Default: 4000.
    ///
    /// Caps the longest edge independently of DPI so oversized pages (posters,
    /// engineering drawings) cannot exhaust memory.
    pub max_rendered_pixels: u32,

    /// Explicit pdfium library location (file or containing directory).
    /// If None, the working directory and then the system loader are tried.
    pub pdfium_lib_path: Option<PathBuf>,

    /// LLM model or deployment identifier. If None, uses the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "azure", "openai", "ollama").
    /// If None along with `provider`, uses `ProviderFactory::from_env()`.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Azure OpenAI endpoint and key. When set, the provider is built
    /// directly with `model` as the deployment name.
    pub azure: Option<AzureSettings>,

    /// Azure OpenAI API version. If None, the provider default is used.
    pub api_version: Option<String>,

    /// Sampling temperature. Default: 1.0.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate per page. Default: 32000.
    ///
    /// Dense pages transcribed with inline figure descriptions routinely exceed
    /// a few thousand tokens; a low cap silently truncates the fragment.
    pub max_tokens: usize,

    /// Custom system prompt. If None, uses [`crate::prompts::SYSTEM_PROMPT`].
    pub system_prompt: Option<String>,

    /// Per-VLM-call timeout in seconds. None waits indefinitely.
    pub api_timeout_secs: Option<u64>,

    /// What the Transcriber does after a page fails. Default: continue.
    pub failure_policy: FailurePolicy,

    /// Optional transcription progress observer.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("input"),
            image_root: PathBuf::from("output/images"),
            markdown_root: PathBuf::from("output/markdown"),
            stages: StageSelection::default(),
            dpi: 72,
            max_rendered_pixels: 4000,
            pdfium_lib_path: None,
            model: None,
            provider_name: None,
            provider: None,
            azure: None,
            api_version: None,
            temperature: 1.0,
            max_tokens: 32000,
            system_prompt: None,
            api_timeout_secs: None,
            failure_policy: FailurePolicy::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("input_dir", &self.input_dir)
            .field("image_root", &self.image_root)
            .field("markdown_root", &self.markdown_root)
            .field("stages", &self.stages)
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("azure", &self.azure)
            .field("api_version", &self.api_version)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("failure_policy", &self.failure_policy)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn callback>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// Per-document image directory: `<image_root>/<doc_name>`.
    pub fn image_dir(&self, doc_name: &str) -> PathBuf {
        self.image_root.join(doc_name)
    }

    /// Per-document markdown directory: `<markdown_root>/<doc_name>`.
    pub fn markdown_dir(&self, doc_name: &str) -> PathBuf {
        self.markdown_root.join(doc_name)
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn input_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.config.input_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn image_root(mut self, dir: impl AsRef<Path>) -> Self {
        self.config.image_root = dir.as_ref().to_path_buf();
        self
    }

    pub fn markdown_root(mut self, dir: impl AsRef<Path>) -> Self {
        self.config.markdown_root = dir.as_ref().to_path_buf();
        self
    }

    pub fn stages(mut self, stages: StageSelection) -> Self {
        self.config.stages = stages;
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config.pdfium_lib_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn azure(mut self, endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        self.config.azure = Some(AzureSettings {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        });
        self
    }

    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.config.api_version = Some(version.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = Some(secs);
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, PipelineError> {
        let c = &self.config;
        if c.dpi < 36 || c.dpi > 600 {
            return Err(PipelineError::InvalidConfig(format!(
                "DPI must be 36–600, got {}",
                c.dpi
            )));
        }
        if c.max_tokens == 0 {
            return Err(PipelineError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == Some(0) {
            return Err(PipelineError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        for (label, dir) in [
            ("input directory", &c.input_dir),
            ("image root", &c.image_root),
            ("markdown root", &c.markdown_root),
        ] {
            if dir.as_os_str().is_empty() {
                return Err(PipelineError::InvalidConfig(format!(
                    "{label} must not be empty"
                )));
            }
        }
        if c.stages.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "at least one stage must be selected".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Connection settings for an Azure OpenAI resource.
#[derive(Clone)]
pub struct AzureSettings {
    pub endpoint: String,
    pub api_key: String,
}

impl fmt::Debug for AzureSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureSettings")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// The pipeline stages selected for a run.
///
/// Selected stages always execute in the fixed order
/// Rasterize → Transcribe → Assemble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSelection {
    pub rasterize: bool,
    pub transcribe: bool,
    pub assemble: bool,
}

impl Default for StageSelection {
    fn default() -> Self {
        Self::all()
    }
}

impl StageSelection {
    /// All three stages.
    pub fn all() -> Self {
        Self {
            rasterize: true,
            transcribe: true,
            assemble: true,
        }
    }

    /// Exactly the flagged stages; no flag at all means every stage.
    pub fn only(rasterize: bool, transcribe: bool, assemble: bool) -> Self {
        if !(rasterize || transcribe || assemble) {
            return Self::all();
        }
        Self {
            rasterize,
            transcribe,
            assemble,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.rasterize || self.transcribe || self.assemble)
    }
}

/// What to do once a page transcription has failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Record the failure and continue with the remaining pages and documents. (default)
    #[default]
    Continue,
    /// Stop the transcription batch after the first failed page.
    FailFast,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_build() {
        let config = PipelineConfig::builder().build().unwrap();
        assert_eq!(config.dpi, 72);
        assert_eq!(config.max_tokens, 32000);
        assert_eq!(config.failure_policy, FailurePolicy::Continue);
        assert_eq!(config.stages, StageSelection::all());
    }

    #[test]
    fn dpi_out_of_range_rejected() {
        let err = PipelineConfig::builder().dpi(1200).build().unwrap_err();
        assert!(err.to_string().contains("DPI"), "got: {err}");
    }

    #[test]
    fn zero_timeout_rejected() {
        assert!(PipelineConfig::builder().api_timeout_secs(0).build().is_err());
    }

    #[test]
    fn empty_root_rejected() {
        let err = PipelineConfig::builder().markdown_root("").build().unwrap_err();
        assert!(err.to_string().contains("markdown root"), "got: {err}");
    }

    #[test]
    fn no_stage_flag_means_all() {
        assert_eq!(StageSelection::only(false, false, false), StageSelection::all());
    }

    #[test]
    fn explicit_stage_flags_are_exact() {
        let s = StageSelection::only(false, true, true);
        assert!(!s.rasterize);
        assert!(s.transcribe);
        assert!(s.assemble);
    }

    #[test]
    fn per_document_dirs() {
        let config = PipelineConfig::builder()
            .image_root("/img")
            .markdown_root("/md")
            .build()
            .unwrap();
        assert_eq!(config.image_dir("report"), PathBuf::from("/img/report"));
        assert_eq!(config.markdown_dir("report"), PathBuf::from("/md/report"));
    }

    #[test]
    fn debug_redacts_azure_key() {
        let config = PipelineConfig::builder()
            .azure("https://res.openai.azure.com", "secret-key")
            .api_version("2024-02-15-preview")
            .build()
            .unwrap();
        let s = format!("{config:?}");
        assert!(s.contains("res.openai.azure.com"));
        assert!(s.contains("2024-02-15-preview"));
        assert!(!s.contains("secret-key"));
    }

    #[test]
    fn debug_hides_provider() {
        let config = PipelineConfig::default();
        let s = format!("{config:?}");
        assert!(s.contains("PipelineConfig"));
        assert!(s.contains("failure_policy"));
    }
}
