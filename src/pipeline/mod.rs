//! Pipeline stages for batch PDF-to-Markdown transcription.
//!
//! Each submodule implements exactly one step. Stages hand work to each
//! other only through the directory layout defined in [`layout`], so any
//! stage can be re-run on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ llm ──▶ transcribe ──▶ assemble
//! (*.pdf)   (pdfium)   (base64)   (VLM)   (page_N.md)    (full_document.md)
//! ```
//!
//! 1. [`input`]: discover source PDFs and check their magic bytes
//! 2. [`render`]: Rasterizer; runs in `spawn_blocking` because pdfium is blocking
//! 3. [`encode`]: base64-wrap each page image for the multimodal request
//! 4. [`llm`]: one VLM call per page, behind the [`llm::VisionModel`] seam
//! 5. [`transcribe`]: Page Transcriber; per-page outcomes, failure policy
//! 6. [`assemble`]: Assembler; numeric page order, delimited blocks
//!
//! [`consistency`] compares images and fragments across stages.

pub mod assemble;
pub mod consistency;
pub mod encode;
pub mod input;
pub mod layout;
pub mod llm;
pub mod render;
pub mod transcribe;
