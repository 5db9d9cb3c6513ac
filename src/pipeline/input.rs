//! Input discovery: find the source PDFs of a batch.
//!
//! Only the top level of the input directory is scanned. Files are matched by
//! a case-insensitive `.pdf` extension and returned sorted by path so every
//! run visits documents in the same order.

use crate::error::{DocumentError, PipelineError};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// List the `*.pdf` files directly inside `input_dir`, sorted by path.
pub fn discover_pdfs(input_dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    if !input_dir.is_dir() {
        return Err(PipelineError::InputDirNotFound {
            path: input_dir.to_path_buf(),
        });
    }

    let entries = std::fs::read_dir(input_dir).map_err(|e| PipelineError::DirectoryAccess {
        path: input_dir.to_path_buf(),
        source: e,
    })?;

    let mut pdfs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_pdf_name(path))
        .collect();
    pdfs.sort();

    if pdfs.is_empty() {
        warn!("No PDF files found in {}", input_dir.display());
    } else {
        debug!("Discovered {} PDF files in {}", pdfs.len(), input_dir.display());
    }
    Ok(pdfs)
}

fn is_pdf_name(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

/// Check the `%PDF` magic bytes before handing the file to the renderer.
///
/// Files shorter than four bytes are left to the renderer, which reports
/// them as unreadable.
pub fn validate_pdf(path: &Path) -> Result<(), DocumentError> {
    let mut f = std::fs::File::open(path).map_err(|e| DocumentError::io(path, e))?;
    let mut magic = [0u8; 4];
    if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
        return Err(DocumentError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        });
    }
    Ok(())
}
