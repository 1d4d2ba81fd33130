//! Result types produced by a conversion.
//!
//! Everything here is `Serialize + Deserialize` so the CLI can emit a whole
//! [`ConversionOutput`] with `--json`. Page images are the exception: they
//! are large binary blobs and are skipped during serialisation.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Full result of converting one PDF.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// Input file name without extension; every output file is named after it.
    pub stem: String,
    /// The assembled Markdown document.
    pub markdown: String,
    /// Per-page results in page order.
    pub pages: Vec<PageResult>,
    /// PDF info-dictionary metadata.
    pub metadata: DocumentMetadata,
    /// Bibliographic record, when requested and successfully extracted.
    pub paper: Option<PaperMetadata>,
    /// Rendered BibTeX entry for `paper`, when BibTeX output was requested.
    pub bibtex: Option<String>,
    /// Pages whose Markdown links to a saved page image.
    pub figures: Vec<FigureRef>,
    /// Rendered pages to be written as `<stem>_figures/page_N.png`.
    #[serde(skip)]
    pub page_images: Vec<PageImage>,
    /// Timing and token statistics.
    pub stats: ConversionStats,
}

/// Markdown produced for one page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-indexed page number.
    pub page_num: usize,
    pub markdown: String,
    /// Prompt tokens reported by the VLM (0 for text-layer engines).
    pub input_tokens: usize,
    /// Completion tokens reported by the VLM (0 for text-layer engines).
    pub output_tokens: usize,
    pub duration_ms: u64,
    /// `true` when the page mentions a numbered figure caption.
    pub has_figure: bool,
}

/// A figure link inserted into the Markdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FigureRef {
    pub page_num: usize,
    /// Path relative to the Markdown file, e.g. `paper_figures/page_3.png`.
    pub path: String,
}

/// PNG bytes of one rendered page.
#[derive(Clone)]
pub struct PageImage {
    pub page_num: usize,
    pub png: Vec<u8>,
}

impl std::fmt::Debug for PageImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageImage")
            .field("page_num", &self.page_num)
            .field("png_bytes", &self.png.len())
            .finish()
    }
}

/// Metadata read from the PDF's info dictionary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
}

/// Bibliographic record assembled from the title page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaperMetadata {
    pub title: String,
    pub authors: Vec<String>,
    pub year: Option<u16>,
    pub venue: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub doi: Option<String>,
    pub arxiv_id: Option<String>,
}

/// Aggregate statistics for one conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Pages in the document.
    pub total_pages: usize,
    /// Pages that were selected and converted.
    pub processed_pages: usize,
    /// Pages with a figure link.
    pub figure_pages: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_duration_ms: u64,
    /// Time spent in pdfium (text extraction or rasterisation).
    pub extract_duration_ms: u64,
    /// Time spent waiting on the VLM.
    pub llm_duration_ms: u64,
}

/// Files produced by [`crate::convert::write_outputs`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WrittenFiles {
    pub markdown: PathBuf,
    pub bibtex: Option<PathBuf>,
    pub figures: Vec<PathBuf>,
}

/// Result of [`crate::convert::inspect`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inspection {
    pub document: DocumentMetadata,
    pub paper: Option<PaperMetadata>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_images_are_not_serialised() {
        let out = ConversionOutput {
            stem: "paper".into(),
            markdown: "# T\n".into(),
            pages: vec![],
            metadata: DocumentMetadata::default(),
            paper: None,
            bibtex: None,
            figures: vec![],
            page_images: vec![PageImage {
                page_num: 1,
                png: vec![0; 16],
            }],
            stats: ConversionStats::default(),
        };
        let json = serde_json::to_string(&out).unwrap();
        assert!(!json.contains("page_images"));

        let back: ConversionOutput = serde_json::from_str(&json).unwrap();
        assert!(back.page_images.is_empty());
        assert_eq!(back.stem, "paper");
    }

    #[test]
    fn abstract_field_is_renamed() {
        let meta = PaperMetadata {
            title: "T".into(),
            authors: vec!["A B".into()],
            abstract_text: Some("We study.".into()),
            ..Default::default()
        };
        let json = serde_json::to_string(&meta).unwrap();
        assert!(json.contains("\"abstract\":\"We study.\""));
    }
}
