//! Error types for the paper2md library.
//!
//! A single fatal error type, [`Paper2MdError`], covers everything that can
//! stop the conversion of one document: bad input, unreadable PDF, a
//! misconfigured or failing VLM provider, or an output write failure.
//!
//! Batch conversion ([`crate::batch::convert_directory`]) never propagates a
//! per-file error. It logs it, records it in the
//! [`crate::batch::BatchReport`], and moves on to the next file.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the paper2md library.
#[derive(Debug, Error)]
pub enum Paper2MdError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// Input directory could not be listed.
    #[error("Cannot read input directory '{dir}': {source}")]
    InputDirUnreadable {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Input directory contains no `*.pdf` files.
    #[error("No PDF files found in '{dir}'")]
    NoPdfsFound { dir: PathBuf },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}\nTry repairing with: qpdf --decrypt input.pdf output.pdf")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// Selected page numbers exceed the actual page count.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// pdfium could not read the text layer of a page.
    #[error("Text extraction failed for page {page}: {detail}")]
    TextExtractionFailed { page: usize, detail: String },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The VLM call for a page failed. Pages are not retried.
    #[error("LLM API error on page {page}: {message}")]
    LlmApiError { page: usize, message: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file (Markdown, BibTeX, image).
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Install libpdfium for your platform (https://github.com/bblanchon/pdfium-binaries)\n\
and either place it next to the binary, install it system-wide, or set\n\
PDFIUM_LIB_PATH=/path/to/libpdfium (file or directory).\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Paper2MdError {
    /// `true` for errors that concern the whole run rather than one file.
    ///
    /// The batch loop aborts on these instead of recording a per-file failure.
    pub fn is_fatal_for_batch(&self) -> bool {
        matches!(
            self,
            Paper2MdError::ProviderNotConfigured { .. }
                | Paper2MdError::InvalidConfig(_)
                | Paper2MdError::InputDirUnreadable { .. }
                | Paper2MdError::NoPdfsFound { .. }
        )
    }
}
