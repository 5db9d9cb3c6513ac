//! Page Transcriber: one VLM call and one `page_<N>.md` per page image.
//!
//! Documents are handled one after another, pages in ascending page index.
//! Each page yields a [`PageOutcome`]; a failed page is logged, reported to
//! the progress callback and recorded, then the batch moves on unless the
//! configured [`FailurePolicy`] says to stop.

use crate::config::{FailurePolicy, PipelineConfig};
use crate::error::{PageError, PipelineError};
use crate::output::{DocumentTranscript, PageOutcome, TranscriptionReport};
use crate::pipeline::layout::{fragment_file_name, DocumentImages};
use crate::pipeline::llm::{transcribe_page, VisionModel};
use crate::prompts::system_prompt;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Transcribe every image of every document into `<markdown_root>/<doc>/page_<N>.md`.
///
/// # Errors
/// Only a failure to create `markdown_root` itself is fatal. Page-level
/// failures are returned inside the report.
pub async fn transcribe_batch<M: VisionModel>(
    model: &M,
    documents: &[DocumentImages],
    config: &PipelineConfig,
) -> Result<TranscriptionReport, PipelineError> {
    tokio::fs::create_dir_all(&config.markdown_root)
        .await
        .map_err(|e| PipelineError::DirectoryAccess {
            path: config.markdown_root.clone(),
            source: e,
        })?;

    let instruction = system_prompt(config.system_prompt.as_deref());
    let timeout = config.api_timeout_secs.map(Duration::from_secs);
    let progress = config.progress_callback.as_ref();

    if let Some(cb) = progress {
        cb.on_batch_start(documents.len());
    }

    let mut report = TranscriptionReport::default();

    for doc in documents {
        let doc_dir = config.markdown_dir(&doc.name);
        let mut images = doc.images.clone();
        images.sort_by_key(|img| img.page_num);
        let total = images.len();

        info!("Processing {} pages from document \"{}\"", total, doc.name);
        if let Some(cb) = progress {
            cb.on_document_start(&doc.name, total);
        }

        let mut pages = Vec::with_capacity(total);

        if let Err(e) = tokio::fs::create_dir_all(&doc_dir).await {
            warn!("Cannot create {}: {}", doc_dir.display(), e);
            for (i, img) in images.iter().enumerate() {
                let error = PageError::WriteFailed {
                    page: img.page_num,
                    path: doc_dir.clone(),
                    detail: e.to_string(),
                };
                if let Some(cb) = progress {
                    cb.on_page_error(&doc.name, img.page_num, i + 1, total, &error.to_string());
                }
                pages.push(PageOutcome::Failed { error });
            }
        } else {
            for (i, img) in images.iter().enumerate() {
                if let Some(cb) = progress {
                    cb.on_page_start(&doc.name, img.page_num, total);
                }
                let start = Instant::now();
                let result =
                    transcribe_page(model, instruction, img.page_num, &img.path, timeout).await;
                let outcome = match result {
                    Ok(markdown) => save_fragment(&doc_dir, img.page_num, &markdown, start).await,
                    Err(error) => PageOutcome::Failed { error },
                };

                match (&outcome, progress) {
                    (PageOutcome::Transcribed { markdown_len, .. }, Some(cb)) => {
                        cb.on_page_complete(&doc.name, img.page_num, i + 1, total, *markdown_len);
                    }
                    (PageOutcome::Failed { error }, cb) => {
                        warn!("\"{}\": {}", doc.name, error);
                        if let Some(cb) = cb {
                            cb.on_page_error(&doc.name, img.page_num, i + 1, total, &error.to_string());
                        }
                    }
                    _ => {}
                }

                let failed = !outcome.is_success();
                pages.push(outcome);
                if failed && config.failure_policy == FailurePolicy::FailFast {
                    break;
                }
            }
        }

        let transcript = DocumentTranscript {
            name: doc.name.clone(),
            pages,
        };
        info!(
            "Completed markdown generation for \"{}\": {}/{} pages",
            doc.name,
            transcript.success_count(),
            total
        );
        if let Some(cb) = progress {
            cb.on_document_complete(&doc.name, total, transcript.success_count());
        }
        let doc_failed = transcript.failed_count() > 0;
        report.documents.push(transcript);

        if doc_failed && config.failure_policy == FailurePolicy::FailFast {
            report.aborted = true;
            warn!("Stopping transcription after first failure");
            break;
        }
    }

    if let Some(cb) = progress {
        cb.on_batch_complete(report.documents.len(), report.failed_pages().len());
    }
    Ok(report)
}

/// Persist a fragment verbatim as `page_<N>.md`.
async fn save_fragment(doc_dir: &Path, page_num: usize, markdown: &str, start: Instant) -> PageOutcome {
    let path = doc_dir.join(fragment_file_name(page_num));
    match tokio::fs::write(&path, markdown).await {
        Ok(()) => {
            debug!("Saved markdown {}", path.display());
            PageOutcome::Transcribed {
                page_num,
                path,
                markdown_len: markdown.len(),
                duration_ms: start.elapsed().as_millis() as u64,
            }
        }
        Err(e) => PageOutcome::Failed {
            error: PageError::WriteFailed {
                page: page_num,
                path,
                detail: e.to_string(),
            },
        },
    }
}
