//! # edgequake-pdfbatch
//!
//! Batch-transcribe a directory of PDFs into Markdown with a Vision Language
//! Model (VLM).
//!
//! Each page is rasterised to a PNG, each PNG is transcribed by one VLM call
//! into a Markdown fragment, and the fragments of each document are
//! concatenated, in page order and with per-page delimiters, into
//! `full_document.md`.
//!
//! ## Pipeline Overview
//!
//! ```text
//! <input_dir>/*.pdf
//!  │
//!  ├─ 1. Rasterize   pdfium → <image_root>/<doc>/page_<N>.png
//!  ├─ 2. Transcribe  one VLM call per image → <markdown_root>/<doc>/page_<N>.md
//!  └─ 3. Assemble    fragments in page order → <markdown_root>/<doc>/full_document.md
//! ```
//!
//! Stages communicate only through those directories, so each one can be
//! run on its own against the output of an earlier run.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdfbatch::{run_pipeline, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from AZURE_OPENAI_API_KEY / OPENAI_API_KEY / ...
//!     let config = PipelineConfig::builder()
//!         .input_dir("input")
//!         .image_root("output/images")
//!         .markdown_root("output/markdown")
//!         .build()?;
//!     let report = run_pipeline(&config).await?;
//!     for line in report.failure_summary() {
//!         eprintln!("{line}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfbatch` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod run;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    AzureSettings, FailurePolicy, PipelineConfig, PipelineConfigBuilder, StageSelection,
};
pub use error::{DocumentError, PageError, PipelineError};
pub use output::{
    AssembledDocument, AssemblyReport, DocumentFailure, DocumentTranscript, PageOutcome,
    RasterizeReport, RunReport, TranscriptionReport,
};
pub use pipeline::consistency::ConsistencyIssue;
pub use pipeline::layout::{page_index_of, DocumentImages, PageImage};
pub use pipeline::llm::{LlmVisionModel, ModelError, VisionModel};
pub use pipeline::render::{PageRenderer, PageSink, PdfiumRenderer};
pub use progress::{NoopProgressCallback, ProgressCallback, TranscriptionProgressCallback};
pub use run::{resolve_provider, run_pipeline, run_pipeline_with};
