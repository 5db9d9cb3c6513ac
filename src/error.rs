//! Error types for the edgequake-pdfbatch library.
//!
//! Three error types mirror the three scopes a batch run can fail at:
//!
//! * [`PipelineError`] (**fatal**): the run cannot proceed at all (missing
//!   input directory, provider not configured, pdfium not loadable).
//!   Returned as `Err(PipelineError)` from [`crate::run::run_pipeline`].
//!
//! * [`DocumentError`] (**per document**): one PDF is unreadable or one
//!   fragment directory is empty. Recorded in the stage report; sibling
//!   documents are still processed.
//!
//! * [`PageError`] (**per page**): a single VLM call failed. Recorded in
//!   [`crate::output::PageOutcome`]; the remaining pages and documents are
//!   still transcribed unless [`crate::config::FailurePolicy::FailFast`] is set.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdfbatch library.
#[derive(Debug, Error)]
pub enum PipelineError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The configured input directory does not exist or is not a directory.
    #[error("Input directory not found: '{path}'\nSet INPUT_PDF_DIR or pass --input-dir.")]
    InputDirNotFound { path: PathBuf },

    /// A stage root could not be listed or created.
    #[error("Failed to access directory '{path}': {source}")]
    DirectoryAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium (or the directory containing it),\n\
or install pdfium where the system loader can find it.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A per-document failure. The batch continues with the next document.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum DocumentError {
    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// The PDF library could not open or parse the document.
    #[error("PDF '{path}' is unreadable: {detail}")]
    Unreadable { path: PathBuf, detail: String },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page} of '{path}': {detail}")]
    RasterisationFailed {
        path: PathBuf,
        page: usize,
        detail: String,
    },

    /// No page fragments were found when assembling a document.
    #[error("No page markdown files found in '{dir}'")]
    NoPagesFound { dir: PathBuf },

    /// Reading or writing a document artefact failed.
    #[error("I/O error on '{path}': {detail}")]
    Io { path: PathBuf, detail: String },
}

impl DocumentError {
    pub(crate) fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        DocumentError::Io {
            path: path.into(),
            detail: err.to_string(),
        }
    }
}

/// A non-fatal error for a single page.
///
/// Stored in [`crate::output::PageOutcome`] when a page fails.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum PageError {
    /// The page image could not be read or recognised.
    #[error("Page {page}: image '{path}' unreadable: {detail}")]
    ImageUnreadable {
        page: usize,
        path: PathBuf,
        detail: String,
    },

    /// The VLM call returned an error.
    #[error("Page {page}: LLM call failed: {detail}")]
    ModelFailed { page: usize, detail: String },

    /// The VLM call did not complete within the configured timeout.
    #[error("Page {page}: LLM call timed out after {secs}s")]
    Timeout { page: usize, secs: u64 },

    /// The VLM answered with no usable text.
    #[error("Page {page}: LLM returned an empty response")]
    EmptyResponse { page: usize },

    /// The fragment could not be persisted.
    #[error("Page {page}: failed to write '{path}': {detail}")]
    WriteFailed {
        page: usize,
        path: PathBuf,
        detail: String,
    },
}

impl PageError {
    /// 1-based page index the error refers to.
    pub fn page(&self) -> usize {
        match self {
            PageError::ImageUnreadable { page, .. }
            | PageError::ModelFailed { page, .. }
            | PageError::Timeout { page, .. }
            | PageError::EmptyResponse { page }
            | PageError::WriteFailed { page, .. } => *page,
        }
    }
}
