//! The on-disk layout shared by all stages.
//!
//! ```text
//! <image_root>/<doc_name>/page_<N>.png
//! <markdown_root>/<doc_name>/page_<N>.md
//! <markdown_root>/<doc_name>/full_document.md
//! ```
//!
//! The page index `N` is the only ordering key. It is written into every
//! derived file name and recovered with [`page_index_of`]; directory listing
//! order is never trusted (it would put `page_10` before `page_2`).

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name of the Assembler output inside a document's markdown directory.
pub const FULL_DOCUMENT_FILE: &str = "full_document.md";

/// Extension of Rasterizer output.
pub const IMAGE_EXTENSION: &str = "png";

/// Extension of Transcriber output.
pub const FRAGMENT_EXTENSION: &str = "md";

static RE_PAGE_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^page_([1-9][0-9]*)\.([A-Za-z0-9]+)$").unwrap());

/// One rasterised page on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageImage {
    /// 1-based page index parsed from (or written into) the file name.
    pub page_num: usize,
    pub path: PathBuf,
}

/// All page images of one document, sorted by ascending `page_num`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentImages {
    pub name: String,
    pub images: Vec<PageImage>,
}

impl DocumentImages {
    /// Build from unordered images; sorts by page index.
    pub fn new(name: impl Into<String>, mut images: Vec<PageImage>) -> Self {
        images.sort_by_key(|img| img.page_num);
        Self {
            name: name.into(),
            images,
        }
    }
}

/// Extract the 1-based page index embedded in a `page_<N>.<ext>` file name.
///
/// Returns `None` for names that do not follow the pattern, for `page_0`,
/// and for indices that overflow `usize`.
pub fn page_index_of(file_name: &str) -> Option<usize> {
    let caps = RE_PAGE_FILE.captures(file_name)?;
    let index: usize = caps[1].parse().ok()?;
    (index >= 1).then_some(index)
}

/// Like [`page_index_of`], but only for files with the given extension.
pub fn page_index_with_extension(file_name: &str, extension: &str) -> Option<usize> {
    let caps = RE_PAGE_FILE.captures(file_name)?;
    if &caps[2] != extension {
        return None;
    }
    page_index_of(file_name)
}

/// `page_<N>.png`
pub fn image_file_name(page_num: usize) -> String {
    format!("page_{page_num}.{IMAGE_EXTENSION}")
}

/// `page_<N>.md`
pub fn fragment_file_name(page_num: usize) -> String {
    format!("page_{page_num}.{FRAGMENT_EXTENSION}")
}

/// Stable document name: the source file name without its extension.
pub fn document_name(pdf_path: &Path) -> Option<String> {
    pdf_path
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// List the `page_<N>.<extension>` files of one directory, sorted by `N`.
///
/// Files named `page_*.<extension>` whose index cannot be parsed are skipped
/// with a warning; everything else is ignored silently.
pub fn list_pages(dir: &Path, extension: &str) -> io::Result<Vec<(usize, PathBuf)>> {
    let mut pages = Vec::new();
    let suffix = format!(".{extension}");

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        match page_index_with_extension(name, extension) {
            Some(idx) => pages.push((idx, entry.path())),
            None if name.starts_with("page_") && name.ends_with(&suffix) => {
                warn!("Ignoring {}: no page index in file name", entry.path().display());
            }
            None => {}
        }
    }

    pages.sort_by_key(|(idx, _)| *idx);
    Ok(pages)
}

/// List the sub-directories of a stage root, sorted by name.
pub fn document_dirs(root: &Path) -> io::Result<Vec<(String, PathBuf)>> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            dirs.push((name.to_string(), entry.path()));
        }
    }
    dirs.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(dirs)
}

/// Reconstruct the Rasterizer output from `<image_root>` when that stage was skipped.
///
/// Document directories without any page image are skipped with a warning.
pub fn scan_image_root(image_root: &Path) -> io::Result<Vec<DocumentImages>> {
    let mut documents = Vec::new();
    for (name, dir) in document_dirs(image_root)? {
        let images: Vec<PageImage> = list_pages(&dir, IMAGE_EXTENSION)?
            .into_iter()
            .map(|(page_num, path)| PageImage { page_num, path })
            .collect();
        if images.is_empty() {
            warn!("No page images found in {}", dir.display());
            continue;
        }
        debug!("Found {} page images for \"{}\"", images.len(), name);
        documents.push(DocumentImages::new(name, images));
    }
    Ok(documents)
}
