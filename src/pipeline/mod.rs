//! Pipeline stages for paper-to-Markdown conversion.
//!
//! Each submodule implements one transformation step; [`crate::convert`]
//! wires them together per engine.
//!
//! ## Data Flow
//!
//! ```text
//!                ┌─▶ extract ──▶ cleanup ──▶ structure ──┐
//! input ─────────┤   (text layer)  (headers)  (headings)  ├─▶ equations ──▶ tidy
//! (path/URL)     └─▶ render ──▶ encode ──▶ llm ──▶ postprocess ─┘
//!                    (pdfium)   (PNG)     (VLM)   (+ figures)
//!
//! first page ──▶ metadata ──▶ bibtex
//! ```
//!
//! 1. [`input`]: canonicalise the user-supplied path or URL to a local file
//! 2. [`engine`]: bind pdfium and open documents; used by every pdfium stage
//! 3. [`extract`]: per-page text layer and info dictionary (`spawn_blocking`)
//! 4. [`cleanup`]: drop running headers, footers and page numbers
//! 5. [`structure`]: title, authors, sections, equations, tables
//! 6. [`render`] / [`encode`]: rasterise and PNG-encode pages for the VLM
//! 7. [`llm`]: one VLM call per page, the only stage with network I/O
//! 8. [`postprocess`]: deterministic Markdown cleanup
//! 9. [`figures`]: page-image links for pages with figure captions
//! 10. [`equations`]: `\[ \]` / `\( \)` → `$$` / `$` (inside `postprocess` for VLM pages)
//! 11. [`metadata`]: title, authors, year, venue, abstract from page 1

pub mod cleanup;
pub mod encode;
pub mod engine;
pub mod equations;
pub mod extract;
pub mod figures;
pub mod input;
pub mod llm;
pub mod metadata;
pub mod postprocess;
pub mod render;
pub mod structure;
