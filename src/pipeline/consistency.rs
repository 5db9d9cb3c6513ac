//! Cross-stage consistency check between page images and fragments.
//!
//! Every fragment must correspond to an image of the same document. A
//! fragment without an image usually means the PDF shrank since an earlier
//! run and the stale fragment will be concatenated into the transcript; an
//! image without a fragment means that page has not been transcribed (yet).
//! Nothing is deleted here; the driver only logs the findings.

use crate::pipeline::layout::{list_pages, DocumentImages, FRAGMENT_EXTENSION};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

/// A mismatch between a document's images and its fragments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConsistencyIssue {
    /// `page_<N>.md` exists but `page_<N>.png` does not.
    OrphanFragment { document: String, page_num: usize },
    /// `page_<N>.png` exists but `page_<N>.md` does not.
    MissingFragment { document: String, page_num: usize },
}

impl fmt::Display for ConsistencyIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsistencyIssue::OrphanFragment { document, page_num } => write!(
                f,
                "\"{document}\": fragment for page {page_num} has no source image"
            ),
            ConsistencyIssue::MissingFragment { document, page_num } => {
                write!(f, "\"{document}\": page {page_num} has no fragment")
            }
        }
    }
}

/// Compare the images of each document against `<markdown_root>/<doc>/page_<N>.md`.
///
/// Issues are ordered by document, then page index. A document without a
/// markdown directory reports every page as missing.
pub fn check_consistency(documents: &[DocumentImages], markdown_root: &Path) -> Vec<ConsistencyIssue> {
    let mut issues = Vec::new();

    for doc in documents {
        let images: BTreeSet<usize> = doc.images.iter().map(|i| i.page_num).collect();
        let fragments: BTreeSet<usize> = list_pages(&markdown_root.join(&doc.name), FRAGMENT_EXTENSION)
            .map(|pages| pages.into_iter().map(|(n, _)| n).collect())
            .unwrap_or_default();

        let mut doc_issues: Vec<ConsistencyIssue> = fragments
            .difference(&images)
            .map(|&page_num| ConsistencyIssue::OrphanFragment {
                document: doc.name.clone(),
                page_num,
            })
            .chain(images.difference(&fragments).map(|&page_num| {
                ConsistencyIssue::MissingFragment {
                    document: doc.name.clone(),
                    page_num,
                }
            }))
            .collect();
        doc_issues.sort_by_key(|issue| match issue {
            ConsistencyIssue::OrphanFragment { page_num, .. }
            | ConsistencyIssue::MissingFragment { page_num, .. } => *page_num,
        });
        issues.extend(doc_issues);
    }

    issues
}
