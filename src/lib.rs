//! # paper2md
//!
//! Convert PDF research papers into Markdown, with paper metadata and BibTeX.
//!
//! ## Engines
//!
//! | Engine | Needs | Output |
//! |--------|-------|--------|
//! | `plain` | text layer | page text joined with blank lines |
//! | `structured` (default) | text layer | title, `##` sections, `$$` equations, table captions |
//! | `vision` | VLM API key | per-page VLM Markdown, LaTeX math, figure links |
//!
//! The text engines are offline and take milliseconds per page. The vision
//! engine renders each page, sends it to a vision-language model and is the
//! one to use for scanned papers or heavy two-column mathematics.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF file / URL / directory
//!  │
//!  ├─ 1. Input      validate %PDF magic, or download the URL
//!  ├─ 2. Extract    text layer per page         │  render pages (vision)
//!  ├─ 3. Transform  strip running lines,        │  VLM transcription,
//!  │                structure headings and math │  figure links
//!  ├─ 4. Normalise  \( \) and \[ \] → $ and $$
//!  ├─ 5. Metadata   title, authors, year, venue, abstract → BibTeX
//!  └─ 6. Output     <stem>.md, <stem>.bib, <stem>_figures/page_N.png
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use paper2md::{convert_to_dir, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder().emit_bibtex(true).build()?;
//!     let written = convert_to_dir("attention.pdf", "out/", &config).await?;
//!     println!("{}", written.markdown.display());
//!     Ok(())
//! }
//! ```
//!
//! For a whole directory use [`convert_directory`]; a file that fails is
//! recorded in the [`BatchReport`] and the run continues.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `paper2md` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod bibtex;
pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{convert_directory, discover_pdfs, BatchReport, ConvertedFile, FailedFile};
pub use bibtex::{citation_key, to_bibtex};
pub use config::{
    ConversionConfig, ConversionConfigBuilder, Engine, PageSelection, PageSeparator,
};
pub use convert::{
    convert, convert_from_bytes, convert_sync, convert_to_dir, inspect, inspect_with,
    write_outputs,
};
pub use error::Paper2MdError;
pub use output::{
    ConversionOutput, ConversionStats, DocumentMetadata, FigureRef, Inspection, PageResult,
    PaperMetadata, WrittenFiles,
};
pub use pipeline::equations::normalize_delimiters;
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{convert_stream, PageStream};
