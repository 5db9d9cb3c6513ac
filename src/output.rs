//! Result types produced by each stage and by a whole pipeline run.
//!
//! Every stage reports per-item outcomes instead of stopping at the first
//! error, so the driver can finish the batch and print a summary of exactly
//! which documents and pages need attention.

use crate::error::{DocumentError, PageError};
use crate::pipeline::consistency::ConsistencyIssue;
use crate::pipeline::layout::DocumentImages;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A document a stage could not process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentFailure {
    pub document: String,
    pub error: DocumentError,
}

/// Output of the Rasterizer for a batch of PDFs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RasterizeReport {
    /// Ordered page images of every successfully rasterised document.
    pub documents: Vec<DocumentImages>,
    /// Documents that could not be opened or rendered.
    pub failures: Vec<DocumentFailure>,
}

impl RasterizeReport {
    pub fn total_pages(&self) -> usize {
        self.documents.iter().map(|d| d.images.len()).sum()
    }
}

/// Result of transcribing one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PageOutcome {
    /// The fragment was written to `path`.
    Transcribed {
        page_num: usize,
        path: PathBuf,
        markdown_len: usize,
        duration_ms: u64,
    },
    /// The page failed; no fragment was written.
    Failed { error: PageError },
}

impl PageOutcome {
    pub fn page_num(&self) -> usize {
        match self {
            PageOutcome::Transcribed { page_num, .. } => *page_num,
            PageOutcome::Failed { error } => error.page(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PageOutcome::Transcribed { .. })
    }

    pub fn error(&self) -> Option<&PageError> {
        match self {
            PageOutcome::Failed { error } => Some(error),
            PageOutcome::Transcribed { .. } => None,
        }
    }
}

/// Per-page outcomes of one document, in ascending page order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentTranscript {
    pub name: String,
    pub pages: Vec<PageOutcome>,
}

impl DocumentTranscript {
    pub fn success_count(&self) -> usize {
        self.pages.iter().filter(|p| p.is_success()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.pages.len() - self.success_count()
    }
}

/// Output of the Transcriber for a batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranscriptionReport {
    pub documents: Vec<DocumentTranscript>,
    /// True when [`crate::config::FailurePolicy::FailFast`] stopped the batch early.
    pub aborted: bool,
}

impl TranscriptionReport {
    /// Every failed page, tagged with its document name.
    pub fn failed_pages(&self) -> Vec<(&str, &PageError)> {
        self.documents
            .iter()
            .flat_map(|d| {
                d.pages
                    .iter()
                    .filter_map(move |p| p.error().map(|e| (d.name.as_str(), e)))
            })
            .collect()
    }

    pub fn transcribed_count(&self) -> usize {
        self.documents.iter().map(|d| d.success_count()).sum()
    }
}

/// One `full_document.md` written by the Assembler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssembledDocument {
    pub name: String,
    pub path: PathBuf,
    /// Page indices in the order they were concatenated.
    pub pages: Vec<usize>,
}

/// Output of the Assembler for a markdown root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssemblyReport {
    pub assembled: Vec<AssembledDocument>,
    /// Documents without any fragment (no output written, warning logged).
    pub skipped: Vec<String>,
    /// Documents whose fragments could not be read or whose output could not be written.
    pub failures: Vec<DocumentFailure>,
}

/// Everything a pipeline run did, one section per executed stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub rasterize: Option<RasterizeReport>,
    pub transcription: Option<TranscriptionReport>,
    pub consistency: Vec<ConsistencyIssue>,
    pub assembly: Option<AssemblyReport>,
}

impl RunReport {
    /// True when any document or page failed in any stage.
    ///
    /// Skipped (empty) documents and consistency issues are warnings, not failures.
    pub fn has_failures(&self) -> bool {
        self.rasterize.as_ref().is_some_and(|r| !r.failures.is_empty())
            || self
                .transcription
                .as_ref()
                .is_some_and(|t| t.aborted || !t.failed_pages().is_empty())
            || self.assembly.as_ref().is_some_and(|a| !a.failures.is_empty())
    }

    /// Human-readable lines describing every failure, for the post-run summary.
    pub fn failure_summary(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(r) = &self.rasterize {
            for f in &r.failures {
                lines.push(format!("[rasterize] {}: {}", f.document, f.error));
            }
        }
        if let Some(t) = &self.transcription {
            for (doc, err) in t.failed_pages() {
                lines.push(format!("[transcribe] {doc}: {err}"));
            }
            if t.aborted {
                lines.push("[transcribe] batch aborted after first failure".to_string());
            }
        }
        if let Some(a) = &self.assembly {
            for f in &a.failures {
                lines.push(format!("[assemble] {}: {}", f.document, f.error));
            }
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transcript(name: &str, failed_page: Option<usize>) -> DocumentTranscript {
        let mut pages = vec![PageOutcome::Transcribed {
            page_num: 1,
            path: PathBuf::from(format!("{name}/page_1.md")),
            markdown_len: 10,
            duration_ms: 5,
        }];
        if let Some(page) = failed_page {
            pages.push(PageOutcome::Failed {
                error: PageError::EmptyResponse { page },
            });
        }
        DocumentTranscript {
            name: name.to_string(),
            pages,
        }
    }

    #[test]
    fn counts_per_document() {
        let t = transcript("a", Some(2));
        assert_eq!(t.success_count(), 1);
        assert_eq!(t.failed_count(), 1);
        assert_eq!(t.pages[1].page_num(), 2);
    }

    #[test]
    fn failed_pages_tagged_with_document() {
        let report = TranscriptionReport {
            documents: vec![transcript("a", None), transcript("b", Some(7))],
            aborted: false,
        };
        let failed = report.failed_pages();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, "b");
        assert_eq!(failed[0].1.page(), 7);
        assert_eq!(report.transcribed_count(), 2);
    }

    #[test]
    fn skipped_documents_are_not_failures() {
        let report = RunReport {
            assembly: Some(AssemblyReport {
                skipped: vec!["empty".into()],
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(!report.has_failures());
        assert!(report.failure_summary().is_empty());
    }

    #[test]
    fn summary_lists_every_failure() {
        let report = RunReport {
            rasterize: Some(RasterizeReport {
                documents: vec![],
                failures: vec![DocumentFailure {
                    document: "corrupt".into(),
                    error: DocumentError::Unreadable {
                        path: PathBuf::from("corrupt.pdf"),
                        detail: "bad xref".into(),
                    },
                }],
            }),
            transcription: Some(TranscriptionReport {
                documents: vec![transcript("b", Some(3))],
                aborted: false,
            }),
            ..Default::default()
        };
        assert!(report.has_failures());
        let lines = report.failure_summary();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("[rasterize] corrupt"));
        assert!(lines[1].starts_with("[transcribe] b"));
    }

    #[test]
    fn page_outcome_serialises_with_status_tag() {
        let json = serde_json::to_string(&transcript("a", Some(2)).pages).unwrap();
        assert!(json.contains("\"status\":\"transcribed\""));
        assert!(json.contains("\"status\":\"failed\""));
    }
}
