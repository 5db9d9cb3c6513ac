//! Batch driver: run the selected stages in order over the stage roots.
//!
//! Stages always execute as Rasterize → Transcribe → Assemble. A stage that
//! is not selected is skipped entirely; the next one picks up whatever the
//! previous run left on disk. Transcription uses the documents just
//! rasterised, or re-scans `<image_root>` when rasterisation was skipped.

use crate::config::{AzureSettings, PipelineConfig};
use crate::error::PipelineError;
use crate::output::RunReport;
use crate::pipeline::assemble::assemble_batch;
use crate::pipeline::consistency::check_consistency;
use crate::pipeline::input::discover_pdfs;
use crate::pipeline::layout::{scan_image_root, DocumentImages};
use crate::pipeline::llm::{LlmVisionModel, VisionModel};
use crate::pipeline::render::{rasterize_batch_async, PageRenderer, PdfiumRenderer};
use crate::pipeline::transcribe::transcribe_batch;
use edgequake_llm::{AzureOpenAIProvider, LLMProvider, ProviderFactory, ProviderType};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Run the configured stages with pdfium and the configured LLM provider.
///
/// The pdfium library is bound only when rasterisation is selected, and the
/// provider is resolved only when transcription is selected, so
/// `--assemble` alone needs neither.
///
/// # Errors
/// Returns `Err(PipelineError)` only for fatal errors (missing input
/// directory, unusable stage root, provider or pdfium not available).
/// Document and page failures are reported inside [`RunReport`].
pub async fn run_pipeline(config: &PipelineConfig) -> Result<RunReport, PipelineError> {
    let renderer = PdfiumRenderer::new(config);
    if config.stages.rasterize {
        renderer.check_binding()?;
    }

    let model = if config.stages.transcribe {
        Some(LlmVisionModel::new(resolve_provider(config)?, config))
    } else {
        None
    };

    run_pipeline_with(config, Arc::new(renderer), model.as_ref()).await
}

/// Run the configured stages with an explicit renderer and vision model.
///
/// `model` may be `None` when transcription is not selected.
pub async fn run_pipeline_with<M: VisionModel>(
    config: &PipelineConfig,
    renderer: Arc<dyn PageRenderer>,
    model: Option<&M>,
) -> Result<RunReport, PipelineError> {
    let total_start = Instant::now();
    let stages = config.stages;
    let mut report = RunReport::default();

    // ── Stage 1: Rasterize ───────────────────────────────────────────────
    let mut documents: Option<Vec<DocumentImages>> = None;
    if stages.rasterize {
        info!("=== Stage 1: rasterising PDFs from {} ===", config.input_dir.display());
        let pdfs = discover_pdfs(&config.input_dir)?;
        info!("Found {} PDF files", pdfs.len());
        let rasterized =
            rasterize_batch_async(renderer, pdfs, config.image_root.clone()).await?;
        info!(
            "Rasterised {} documents ({} pages), {} failed",
            rasterized.documents.len(),
            rasterized.total_pages(),
            rasterized.failures.len()
        );
        documents = Some(rasterized.documents.clone());
        report.rasterize = Some(rasterized);
    } else {
        debug!("Skipping rasterisation");
    }

    // ── Stage 2: Transcribe ──────────────────────────────────────────────
    if stages.transcribe {
        let model = model.ok_or_else(|| {
            PipelineError::InvalidConfig(
                "transcription selected but no vision model was supplied".to_string(),
            )
        })?;
        let docs = match documents.take() {
            Some(docs) => docs,
            None => rescan_images(config)?,
        };
        info!(
            "=== Stage 2: transcribing {} documents into {} ===",
            docs.len(),
            config.markdown_root.display()
        );
        let transcription = transcribe_batch(model, &docs, config).await?;
        info!(
            "Transcribed {} pages, {} failed",
            transcription.transcribed_count(),
            transcription.failed_pages().len()
        );
        report.consistency = check_consistency(&docs, &config.markdown_root);
        report.transcription = Some(transcription);
    } else {
        debug!("Skipping transcription");
        if stages.assemble && config.image_root.is_dir() {
            let docs = rescan_images(config)?;
            report.consistency = check_consistency(&docs, &config.markdown_root);
        }
    }

    for issue in &report.consistency {
        warn!("Inconsistent output: {}", issue);
    }

    // ── Stage 3: Assemble ────────────────────────────────────────────────
    if stages.assemble {
        info!(
            "=== Stage 3: assembling documents in {} ===",
            config.markdown_root.display()
        );
        let assembly = assemble_batch(&config.markdown_root)?;
        info!(
            "Assembled {} documents, {} skipped, {} failed",
            assembly.assembled.len(),
            assembly.skipped.len(),
            assembly.failures.len()
        );
        report.assembly = Some(assembly);
    } else {
        debug!("Skipping assembly");
    }

    info!(
        "Run complete in {}ms",
        total_start.elapsed().as_millis() as u64
    );
    Ok(report)
}

fn rescan_images(config: &PipelineConfig) -> Result<Vec<DocumentImages>, PipelineError> {
    if !config.image_root.is_dir() {
        warn!("No page images to transcribe: {} does not exist", config.image_root.display());
        return Ok(Vec::new());
    }
    info!("Re-scanning page images in {}", config.image_root.display());
    scan_image_root(&config.image_root).map_err(|e| PipelineError::DirectoryAccess {
        path: config.image_root.clone(),
        source: e,
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`): used as-is.
/// 2. **Azure settings** (`config.azure`): an [`AzureOpenAIProvider`] with
///    `config.model` as the deployment and `config.api_version` applied.
///    Used when no provider name is given or the name is an Azure alias.
/// 3. **Named provider + model** (`config.provider_name`): built by
///    [`ProviderFactory::create_llm_provider`], which reads that provider's
///    credentials and endpoint from the environment.
/// 4. **Auto-detection** ([`ProviderFactory::from_env`]): the first provider
///    whose API key is present, rebuilt with `config.model` when one is set.
pub fn resolve_provider(config: &PipelineConfig) -> Result<Arc<dyn LLMProvider>, PipelineError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref azure) = config.azure {
        let wants_azure = config
            .provider_name
            .as_deref()
            .map_or(true, |name| ProviderType::from_str(name) == Some(ProviderType::AzureOpenAI));
        if wants_azure {
            return azure_provider(azure, config);
        }
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return ProviderFactory::create_llm_provider(name, model).map_err(|e| {
            PipelineError::ProviderNotConfigured {
                provider: name.clone(),
                hint: e.to_string(),
            }
        });
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| PipelineError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set --provider or an API key (AZURE_OPENAI_API_KEY, OPENAI_API_KEY, ...).\n\
                Error: {}",
                e
            ),
        })?;

    match config.model.as_deref() {
        Some(model) if model != llm_provider.model() => {
            let name = llm_provider.name().to_string();
            ProviderFactory::create_llm_provider(&name, model).map_err(|e| {
                PipelineError::ProviderNotConfigured {
                    provider: name,
                    hint: e.to_string(),
                }
            })
        }
        _ => Ok(llm_provider),
    }
}

fn azure_provider(
    azure: &AzureSettings,
    config: &PipelineConfig,
) -> Result<Arc<dyn LLMProvider>, PipelineError> {
    let deployment = config
        .model
        .as_deref()
        .ok_or_else(|| PipelineError::ProviderNotConfigured {
            provider: "azure".to_string(),
            hint: "Azure OpenAI needs a deployment name: set --model or OPENAI_DEPLOYMENT"
                .to_string(),
        })?;

    let mut provider = AzureOpenAIProvider::new(&azure.endpoint, &azure.api_key, deployment);
    if let Some(ref version) = config.api_version {
        provider = provider.with_api_version(version);
    }
    debug!("Using Azure OpenAI deployment {}", deployment);
    Ok(Arc::new(provider))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn azure_config() -> crate::config::PipelineConfigBuilder {
        PipelineConfig::builder()
            .azure("https://my-resource.openai.azure.com", "test-key")
            .api_version("2024-02-15-preview")
    }

    #[test]
    fn azure_settings_use_model_as_deployment() {
        let config = azure_config().model("my-gpt4o").build().unwrap();
        let provider = resolve_provider(&config).unwrap();
        assert_eq!(provider.name(), "azure-openai");
        assert_eq!(provider.model(), "my-gpt4o");
    }

    #[test]
    fn azure_alias_selects_azure_settings() {
        let config = azure_config()
            .provider_name("azure")
            .model("my-gpt4o")
            .build()
            .unwrap();
        let provider = resolve_provider(&config).unwrap();
        assert_eq!(provider.name(), "azure-openai");
        assert_eq!(provider.model(), "my-gpt4o");
    }

    #[test]
    fn azure_without_deployment_is_not_configured() {
        let config = azure_config().build().unwrap();
        let err = resolve_provider(&config).err().unwrap();
        match err {
            PipelineError::ProviderNotConfigured { provider, hint } => {
                assert_eq!(provider, "azure");
                assert!(hint.contains("OPENAI_DEPLOYMENT"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn prebuilt_provider_wins_over_azure() {
        let mock: Arc<dyn LLMProvider> = Arc::new(edgequake_llm::MockProvider::new());
        let config = azure_config()
            .model("my-gpt4o")
            .provider(Arc::clone(&mock))
            .build()
            .unwrap();
        let provider = resolve_provider(&config).unwrap();
        assert_eq!(provider.name(), mock.name());
    }
}
