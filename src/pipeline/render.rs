//! Rasterizer: render every page of each PDF to `page_<N>.png`.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which is
//! CPU-bound and not async-aware. [`rasterize_batch_async`] moves the whole
//! batch onto tokio's blocking pool so the runtime's worker threads never
//! stall during rendering.
//!
//! The PDF library sits behind [`PageRenderer`]; [`PdfiumRenderer`] is the
//! production implementation.

use crate::config::PipelineConfig;
use crate::error::{DocumentError, PipelineError};
use crate::output::{DocumentFailure, RasterizeReport};
use crate::pipeline::input::validate_pdf;
use crate::pipeline::layout::{document_name, image_file_name, DocumentImages, PageImage};
use image::{DynamicImage, ImageFormat};
use once_cell::sync::OnceCell;
use pdfium_render::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Callback receiving each rendered page: `(1-based page index, image)`.
pub type PageSink<'a> = dyn FnMut(usize, DynamicImage) -> Result<(), DocumentError> + 'a;

/// Renders the pages of one PDF, in page order.
pub trait PageRenderer: Send + Sync {
    /// Render every page of `pdf_path`, handing each to `on_page` in
    /// ascending page order. Returns the document's page count.
    fn render_pages(&self, pdf_path: &Path, on_page: &mut PageSink<'_>)
        -> Result<usize, DocumentError>;
}

/// [`PageRenderer`] backed by pdfium.
///
/// The library is bound on first use and the binding is shared by every
/// document rendered through this renderer.
#[derive(Debug)]
pub struct PdfiumRenderer {
    lib_path: Option<PathBuf>,
    dpi: u32,
    max_pixels: u32,
    pdfium: OnceCell<Pdfium>,
}

impl PdfiumRenderer {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            lib_path: config.pdfium_lib_path.clone(),
            dpi: config.dpi,
            max_pixels: config.max_rendered_pixels,
            pdfium: OnceCell::new(),
        }
    }

    /// Bind up front so a missing pdfium library fails the run before any
    /// document is touched.
    pub fn check_binding(&self) -> Result<(), PipelineError> {
        self.pdfium()
            .map(|_| ())
            .map_err(|e| PipelineError::PdfiumBindingFailed(e.to_string()))
    }

    fn pdfium(&self) -> Result<&Pdfium, PdfiumError> {
        self.pdfium
            .get_or_try_init(|| bind_pdfium(self.lib_path.as_deref()))
    }
}

/// Bind to pdfium: the explicit path (file or directory) when given, else the
/// working directory, else the system library.
fn bind_pdfium(lib_path: Option<&Path>) -> Result<Pdfium, PdfiumError> {
    let bindings = match lib_path {
        Some(p) if p.is_dir() => {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(p))
        }
        Some(p) => Pdfium::bind_to_library(p),
        None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }?;
    Ok(Pdfium::new(bindings))
}

impl PageRenderer for PdfiumRenderer {
    fn render_pages(
        &self,
        pdf_path: &Path,
        on_page: &mut PageSink<'_>,
    ) -> Result<usize, DocumentError> {
        let pdfium = self.pdfium().map_err(|e| {
            DocumentError::Unreadable {
                path: pdf_path.to_path_buf(),
                detail: format!("pdfium unavailable: {e}"),
            }
        })?;

        let document = pdfium
            .load_pdf_from_file(pdf_path, None)
            .map_err(|e| DocumentError::Unreadable {
                path: pdf_path.to_path_buf(),
                detail: format!("{:?}", e),
            })?;

        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(self.dpi as f32 / 72.0)
            .set_maximum_width(self.max_pixels as i32)
            .set_maximum_height(self.max_pixels as i32);

        let pages = document.pages();
        let total_pages = pages.len() as usize;
        debug!("PDF loaded: {} pages", total_pages);

        for (idx, page) in pages.iter().enumerate() {
            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                DocumentError::RasterisationFailed {
                    path: pdf_path.to_path_buf(),
                    page: idx + 1,
                    detail: format!("{:?}", e),
                }
            })?;
            on_page(idx + 1, bitmap.as_image())?;
        }

        Ok(total_pages)
    }
}

/// Rasterise one PDF into `dest_dir`, one `page_<N>.png` per page.
///
/// Creates `dest_dir` if needed and overwrites images with the same name.
/// Returns the produced images in page order.
pub fn rasterize_document(
    renderer: &dyn PageRenderer,
    pdf_path: &Path,
    dest_dir: &Path,
) -> Result<Vec<PageImage>, DocumentError> {
    validate_pdf(pdf_path)?;
    std::fs::create_dir_all(dest_dir).map_err(|e| DocumentError::io(dest_dir, e))?;

    let mut images = Vec::new();
    renderer.render_pages(pdf_path, &mut |page_num, image| {
        let path = dest_dir.join(image_file_name(page_num));
        image
            .save_with_format(&path, ImageFormat::Png)
            .map_err(|e| DocumentError::Io {
                path: path.clone(),
                detail: e.to_string(),
            })?;
        debug!(
            "Exported page {} ({}x{} px) to {}",
            page_num,
            image.width(),
            image.height(),
            path.display()
        );
        images.push(PageImage { page_num, path });
        Ok(())
    })?;

    images.sort_by_key(|img| img.page_num);
    Ok(images)
}

/// Rasterise a batch of PDFs into `<image_root>/<doc_name>/`.
///
/// A document that cannot be rendered is recorded in
/// [`RasterizeReport::failures`]; the remaining documents are still processed.
pub fn rasterize_batch(
    renderer: &dyn PageRenderer,
    pdf_paths: &[PathBuf],
    image_root: &Path,
) -> RasterizeReport {
    let mut report = RasterizeReport::default();
    let mut seen = HashSet::new();

    for pdf in pdf_paths {
        let Some(name) = document_name(pdf) else {
            warn!("Skipping {}: cannot derive a document name", pdf.display());
            report.failures.push(DocumentFailure {
                document: pdf.display().to_string(),
                error: DocumentError::Unreadable {
                    path: pdf.clone(),
                    detail: "file name has no stem".into(),
                },
            });
            continue;
        };

        // Two sources with the same stem would write into the same directory.
        if !seen.insert(name.clone()) {
            warn!("Skipping {}: document name \"{}\" already used", pdf.display(), name);
            report.failures.push(DocumentFailure {
                document: name,
                error: DocumentError::Unreadable {
                    path: pdf.clone(),
                    detail: "duplicate document name".into(),
                },
            });
            continue;
        }

        info!("Rasterising \"{}\"", name);
        let dest_dir = image_root.join(&name);
        match rasterize_document(renderer, pdf, &dest_dir) {
            Ok(images) => {
                info!("Rasterised \"{}\": {} pages", name, images.len());
                report.documents.push(DocumentImages::new(name, images));
            }
            Err(e) => {
                warn!("Failed to rasterise \"{}\": {}", name, e);
                report.failures.push(DocumentFailure {
                    document: name,
                    error: e,
                });
            }
        }
    }

    report
}

/// Run [`rasterize_batch`] on tokio's blocking pool.
pub async fn rasterize_batch_async(
    renderer: Arc<dyn PageRenderer>,
    pdf_paths: Vec<PathBuf>,
    image_root: PathBuf,
) -> Result<RasterizeReport, PipelineError> {
    tokio::task::spawn_blocking(move || rasterize_batch(renderer.as_ref(), &pdf_paths, &image_root))
        .await
        .map_err(|e| PipelineError::Internal(format!("Render task panicked: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use tempfile::TempDir;

    /// Renders `pages` solid-colour images for any file it is given.
    struct FakeRenderer {
        pages: usize,
    }

    impl PageRenderer for FakeRenderer {
        fn render_pages(
            &self,
            _pdf_path: &Path,
            on_page: &mut PageSink<'_>,
        ) -> Result<usize, DocumentError> {
            for n in 1..=self.pages {
                let shade = (n * 20) as u8;
                let img = RgbaImage::from_pixel(4, 4, Rgba([shade, 0, 0, 255]));
                on_page(n, DynamicImage::ImageRgba8(img))?;
            }
            Ok(self.pages)
        }
    }

    fn write_pdf(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"%PDF-1.7\n").unwrap();
        path
    }

    #[test]
    fn pages_named_by_one_based_index() {
        let input = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let pdf = write_pdf(input.path(), "doc.pdf");

        let images =
            rasterize_document(&FakeRenderer { pages: 12 }, &pdf, &out.path().join("doc")).unwrap();

        assert_eq!(images.len(), 12);
        for (i, img) in images.iter().enumerate() {
            assert_eq!(img.page_num, i + 1);
            assert_eq!(img.path.file_name().unwrap().to_str().unwrap(), format!("page_{}.png", i + 1));
            assert!(img.path.exists());
        }
    }

    #[test]
    fn rerun_overwrites_existing_images() {
        let input = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let pdf = write_pdf(input.path(), "doc.pdf");
        let dest = out.path().join("doc");
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(dest.join("page_1.png"), b"stale").unwrap();

        rasterize_document(&FakeRenderer { pages: 1 }, &pdf, &dest).unwrap();

        let bytes = std::fs::read(dest.join("page_1.png")).unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn zero_page_document_yields_no_images() {
        let input = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let pdf = write_pdf(input.path(), "empty.pdf");
        let images =
            rasterize_document(&FakeRenderer { pages: 0 }, &pdf, &out.path().join("empty")).unwrap();
        assert!(images.is_empty());
    }

    #[test]
    fn corrupt_document_does_not_abort_batch() {
        let input = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let good = write_pdf(input.path(), "good.pdf");
        let bad = input.path().join("bad.pdf");
        std::fs::write(&bad, b"garbage bytes").unwrap();

        let report = rasterize_batch(&FakeRenderer { pages: 2 }, &[bad, good], out.path());

        assert_eq!(report.documents.len(), 1);
        assert_eq!(report.documents[0].name, "good");
        assert_eq!(report.documents[0].images.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].document, "bad");
        assert!(matches!(report.failures[0].error, DocumentError::NotAPdf { .. }));
        assert!(!out.path().join("bad").exists());
    }

    #[test]
    fn duplicate_stems_are_rejected() {
        let input = TempDir::new().unwrap();
        let sub = input.path().join("sub");
        std::fs::create_dir_all(&sub).unwrap();
        let out = TempDir::new().unwrap();
        let a = write_pdf(input.path(), "same.pdf");
        let b = write_pdf(&sub, "same.pdf");

        let report = rasterize_batch(&FakeRenderer { pages: 1 }, &[a, b], out.path());
        assert_eq!(report.documents.len(), 1);
        assert_eq!(report.failures.len(), 1);
    }

    #[test]
    fn async_wrapper_runs_batch() {
        let input = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let pdf = write_pdf(input.path(), "doc.pdf");
        let renderer: Arc<dyn PageRenderer> = Arc::new(FakeRenderer { pages: 3 });

        let rt = tokio::runtime::Runtime::new().unwrap();
        let report = rt
            .block_on(rasterize_batch_async(renderer, vec![pdf], out.path().to_path_buf()))
            .unwrap();
        assert_eq!(report.total_pages(), 3);
    }

    #[test]
    fn failed_binding_is_not_cached() {
        let lib = TempDir::new().unwrap();
        let config = PipelineConfig::builder()
            .pdfium_lib_path(lib.path().join("libpdfium-missing.so"))
            .build()
            .unwrap();
        let renderer = PdfiumRenderer::new(&config);

        assert!(matches!(
            renderer.check_binding(),
            Err(PipelineError::PdfiumBindingFailed(_))
        ));
        assert!(renderer.pdfium.get().is_none());

        let input = TempDir::new().unwrap();
        let pdf = write_pdf(input.path(), "doc.pdf");
        let err = renderer.render_pages(&pdf, &mut |_, _| Ok(())).unwrap_err();
        assert!(err.to_string().contains("pdfium unavailable"));
    }
}
