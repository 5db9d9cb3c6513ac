//! Assembler: concatenate a document's page fragments into `full_document.md`.
//!
//! Fragments are ordered by the page index parsed from their file names,
//! never by listing order. Each fragment is wrapped in a delimiter pair:
//!
//! ```text
//! <!-- START PAGE 7 (page_7.md) -->
//! <fragment, trailing newlines stripped>
//! <!-- END PAGE 7 (page_7.md) -->
//!
//! ```
//!
//! The output is written to a temporary file in the same directory and then
//! renamed into place, so an interrupted run never leaves a truncated
//! transcript behind.

use crate::error::{DocumentError, PipelineError};
use crate::output::{AssembledDocument, AssemblyReport, DocumentFailure};
use crate::pipeline::layout::{document_dirs, list_pages, FRAGMENT_EXTENSION, FULL_DOCUMENT_FILE};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Render one delimited page block.
pub fn render_block(page_num: usize, file_name: &str, content: &str) -> String {
    format!(
        "<!-- START PAGE {page_num} ({file_name}) -->\n{}\n<!-- END PAGE {page_num} ({file_name}) -->\n\n",
        content.trim_end_matches('\n')
    )
}

/// The `page_<N>.md` fragments of a document directory, sorted by `N`.
pub fn list_fragments(doc_dir: &Path) -> Result<Vec<(usize, PathBuf)>, DocumentError> {
    list_pages(doc_dir, FRAGMENT_EXTENSION).map_err(|e| DocumentError::io(doc_dir, e))
}

/// Concatenate all fragments of `doc_dir` into `doc_dir/full_document.md`.
///
/// Returns the page indices in the order they were written.
///
/// # Errors
/// [`DocumentError::NoPagesFound`] when the directory has no fragment; in
/// that case no output file is created.
pub fn assemble_document(doc_dir: &Path) -> Result<AssembledDocument, DocumentError> {
    let fragments = list_fragments(doc_dir)?;
    if fragments.is_empty() {
        return Err(DocumentError::NoPagesFound {
            dir: doc_dir.to_path_buf(),
        });
    }

    let mut markdown = String::new();
    for (page_num, path) in &fragments {
        let content = std::fs::read_to_string(path).map_err(|e| DocumentError::io(path, e))?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        markdown.push_str(&render_block(*page_num, file_name, &content));
    }

    let out_path = doc_dir.join(FULL_DOCUMENT_FILE);
    write_atomic(doc_dir, &out_path, &markdown)?;
    info!("Concatenated markdown saved to {}", out_path.display());

    Ok(AssembledDocument {
        name: doc_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        path: out_path,
        pages: fragments.iter().map(|(n, _)| *n).collect(),
    })
}

fn write_atomic(dir: &Path, path: &Path, contents: &str) -> Result<(), DocumentError> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| DocumentError::io(dir, e))?;
    tmp.write_all(contents.as_bytes())
        .map_err(|e| DocumentError::io(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| DocumentError::io(path, e.error))?;
    Ok(())
}

/// Assemble every document sub-directory of `markdown_root`.
///
/// Non-directory entries are ignored. Empty documents are skipped with a
/// warning; other per-document failures are recorded and do not stop the batch.
pub fn assemble_batch(markdown_root: &Path) -> Result<AssemblyReport, PipelineError> {
    if !markdown_root.is_dir() {
        warn!("Nothing to assemble: {} does not exist", markdown_root.display());
        return Ok(AssemblyReport::default());
    }

    let dirs = document_dirs(markdown_root).map_err(|e| PipelineError::DirectoryAccess {
        path: markdown_root.to_path_buf(),
        source: e,
    })?;

    let mut report = AssemblyReport::default();
    for (name, dir) in dirs {
        info!("Concatenating markdown for \"{}\"", name);
        match assemble_document(&dir) {
            Ok(doc) => report.assembled.push(doc),
            Err(DocumentError::NoPagesFound { dir }) => {
                warn!("No page markdown files found in {}", dir.display());
                report.skipped.push(name);
            }
            Err(e) => {
                warn!("Failed to assemble \"{}\": {}", name, e);
                report.failures.push(DocumentFailure {
                    document: name,
                    error: e,
                });
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_strips_only_trailing_newlines() {
        assert_eq!(
            render_block(7, "page_7.md", "Hello\n\n"),
            "<!-- START PAGE 7 (page_7.md) -->\nHello\n<!-- END PAGE 7 (page_7.md) -->\n\n"
        );
        assert_eq!(
            render_block(1, "page_1.md", "\n  indented  \n"),
            "<!-- START PAGE 1 (page_1.md) -->\n\n  indented  \n<!-- END PAGE 1 (page_1.md) -->\n\n"
        );
    }

    #[test]
    fn empty_fragment_still_gets_a_block() {
        assert_eq!(
            render_block(2, "page_2.md", ""),
            "<!-- START PAGE 2 (page_2.md) -->\n\n<!-- END PAGE 2 (page_2.md) -->\n\n"
        );
    }
}
