//! Whole-document conversion entry points.
//!
//! [`convert`] resolves the input, runs the configured [`Engine`] and returns
//! the assembled [`ConversionOutput`] without touching the output directory.
//! [`write_outputs`] persists it; [`convert_to_dir`] does both. Use
//! [`crate::stream::convert_stream`] to receive pages one at a time instead.

use crate::bibtex::to_bibtex;
use crate::config::{ConversionConfig, Engine, PageSeparator};
use crate::error::Paper2MdError;
use crate::output::{
    ConversionOutput, ConversionStats, DocumentMetadata, FigureRef, Inspection, PageImage,
    PageResult, PaperMetadata, WrittenFiles,
};
use crate::pipeline::structure::{structure_text, Structurer};
use crate::pipeline::{
    cleanup, encode, equations, extract, figures, input, llm, metadata, postprocess, render,
};
use edgequake_llm::LLMProvider;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Convert a PDF file or URL to Markdown.
///
/// # Errors
/// Any [`Paper2MdError`]: unreadable input, a PDF pdfium cannot open, an
/// empty page selection, or (vision engine) a missing provider or a failed
/// VLM call. Nothing is written to disk.
pub async fn convert(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Paper2MdError> {
    let input_str = input_str.as_ref();
    info!("Starting conversion: {} (engine: {})", input_str, config.engine);

    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let provider = vision_provider(config)?;
    convert_path(resolved.path(), &resolved.stem(), config, provider.as_ref()).await
}

/// Convert and write `<stem>.md` (plus `.bib` and figures) into `out_dir`.
pub async fn convert_to_dir(
    input_str: impl AsRef<str>,
    out_dir: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<WrittenFiles, Paper2MdError> {
    let output = convert(input_str, config).await?;
    write_outputs(&output, out_dir).await
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Paper2MdError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Paper2MdError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input_str, config))
}

/// Convert PDF bytes held in memory.
///
/// The bytes are written to `document.pdf` in a temporary directory that is
/// removed on return, so the output stem is always `document`.
///
/// # Example
/// ```rust,no_run
/// use paper2md::{convert_from_bytes, ConversionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes: Vec<u8> = std::fs::read("paper.pdf")?;
/// let output = convert_from_bytes(&bytes, &ConversionConfig::default()).await?;
/// println!("{}", output.markdown);
/// # Ok(())
/// # }
/// ```
pub async fn convert_from_bytes(
    bytes: &[u8],
    config: &ConversionConfig,
) -> Result<ConversionOutput, Paper2MdError> {
    let dir = tempfile::tempdir().map_err(|e| Paper2MdError::Internal(format!("tempdir: {e}")))?;
    let path = dir.path().join("document.pdf");
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| Paper2MdError::Internal(format!("tempfile write: {e}")))?;
    let path_str = path.to_string_lossy().to_string();
    // `dir` is removed when this function returns
    convert(&path_str, config).await
}

/// Read document and paper metadata without converting content.
///
/// Does not require an LLM provider or API key.
pub async fn inspect(input_str: impl AsRef<str>) -> Result<Inspection, Paper2MdError> {
    inspect_with(input_str, &ConversionConfig::default()).await
}

/// [`inspect`] honouring the password and download timeout in `config`.
pub async fn inspect_with(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<Inspection, Paper2MdError> {
    let resolved = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    let password = config.password.as_deref();

    let document = extract::extract_metadata(resolved.path(), password).await?;
    let first_page = if document.page_count > 0 {
        extract::extract_page_texts(resolved.path(), password, &[0])
            .await?
            .pop()
            .map(|(_, text)| text)
            .unwrap_or_default()
    } else {
        String::new()
    };

    let paper = metadata::extract_paper_metadata(&first_page, &document);
    Ok(Inspection { document, paper })
}

/// Write `<stem>.md`, `<stem>.bib` and `<stem>_figures/page_N.png` into
/// `out_dir`, creating it if needed.
///
/// The Markdown and BibTeX files are written atomically (temp file +
/// rename) so an interrupted run never leaves a truncated document behind.
pub async fn write_outputs(
    output: &ConversionOutput,
    out_dir: impl AsRef<Path>,
) -> Result<WrittenFiles, Paper2MdError> {
    let out_dir = out_dir.as_ref();
    create_dir(out_dir).await?;

    let markdown = out_dir.join(format!("{}.md", output.stem));
    write_atomic(&markdown, output.markdown.as_bytes()).await?;

    let bibtex = match &output.bibtex {
        Some(entry) => {
            let path = out_dir.join(format!("{}.bib", output.stem));
            write_atomic(&path, entry.as_bytes()).await?;
            Some(path)
        }
        None => None,
    };

    let mut figure_files = Vec::with_capacity(output.page_images.len());
    if !output.page_images.is_empty() {
        create_dir(&out_dir.join(figures::figures_dir_name(&output.stem))).await?;
        for image in &output.page_images {
            let path = out_dir.join(figures::page_image_path(&output.stem, image.page_num));
            tokio::fs::write(&path, &image.png)
                .await
                .map_err(|e| Paper2MdError::OutputWriteFailed {
                    path: path.clone(),
                    source: e,
                })?;
            figure_files.push(path);
        }
    }

    info!(
        "Wrote {} ({} bytes{}{})",
        markdown.display(),
        output.markdown.len(),
        if bibtex.is_some() { ", .bib" } else { "" },
        if figure_files.is_empty() {
            String::new()
        } else {
            format!(", {} page images", figure_files.len())
        }
    );

    Ok(WrittenFiles {
        markdown,
        bibtex,
        figures: figure_files,
    })
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// The VLM provider when the engine needs one.
pub(crate) fn vision_provider(
    config: &ConversionConfig,
) -> Result<Option<Arc<dyn LLMProvider>>, Paper2MdError> {
    match config.engine {
        Engine::Vision => llm::resolve_provider(config).map(Some),
        Engine::Plain | Engine::Structured => Ok(None),
    }
}

/// Output of one engine run, before metadata and assembly.
struct EngineOutput {
    pages: Vec<PageResult>,
    /// Document body: pages joined, not yet tidied.
    body: String,
    page_images: Vec<PageImage>,
    figures: Vec<FigureRef>,
    /// Text layer of page 1, when the engine already read it.
    first_page_text: Option<String>,
    extract_ms: u64,
    llm_ms: u64,
}

/// Convert an already-validated local PDF.
pub(crate) async fn convert_path(
    pdf_path: &Path,
    stem: &str,
    config: &ConversionConfig,
    provider: Option<&Arc<dyn LLMProvider>>,
) -> Result<ConversionOutput, Paper2MdError> {
    let total_start = Instant::now();
    let password = config.password.as_deref();

    let document = extract::extract_metadata(pdf_path, password).await?;
    let total_pages = document.page_count;
    info!("PDF has {} pages", total_pages);

    let page_indices = config.pages.to_indices(total_pages);
    if page_indices.is_empty() {
        return Err(Paper2MdError::PageOutOfRange {
            page: 0,
            total: total_pages,
        });
    }
    debug!("Selected {} pages for conversion", page_indices.len());

    let engine_out = match config.engine {
        Engine::Plain | Engine::Structured => {
            run_text_engine(pdf_path, config, &page_indices).await?
        }
        Engine::Vision => {
            let provider = match provider {
                Some(p) => Arc::clone(p),
                None => llm::resolve_provider(config)?,
            };
            run_vision_engine(pdf_path, stem, config, &page_indices, &provider).await?
        }
    };

    let paper = if config.emit_bibtex || config.include_metadata {
        let source = first_page_source(
            pdf_path,
            password,
            engine_out.first_page_text.clone(),
            &engine_out.pages,
        )
        .await;
        let paper = metadata::extract_paper_metadata(&source, &document);
        match &paper {
            Some(p) => debug!("Paper metadata: '{}' by {} authors", p.title, p.authors.len()),
            None => warn!("{}: no title and author found on the first page", stem),
        }
        paper
    } else {
        None
    };
    let bibtex = if config.emit_bibtex {
        paper.as_ref().map(to_bibtex)
    } else {
        None
    };

    let mut markdown = String::new();
    if config.include_metadata {
        markdown.push_str(&format_yaml_front_matter(paper.as_ref(), &document));
    }
    markdown.push_str(&equations::normalize_delimiters(&engine_out.body));
    let markdown = postprocess::tidy_markdown(&markdown);

    let pages = engine_out.pages;
    let stats = ConversionStats {
        total_pages,
        processed_pages: pages.len(),
        figure_pages: engine_out.figures.len(),
        total_input_tokens: pages.iter().map(|p| p.input_tokens as u64).sum(),
        total_output_tokens: pages.iter().map(|p| p.output_tokens as u64).sum(),
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        extract_duration_ms: engine_out.extract_ms,
        llm_duration_ms: engine_out.llm_ms,
    };

    info!(
        "Conversion complete: {}/{} pages, {}ms total",
        stats.processed_pages, total_pages, stats.total_duration_ms
    );

    Ok(ConversionOutput {
        stem: stem.to_string(),
        markdown,
        pages,
        metadata: document,
        paper,
        bibtex,
        figures: engine_out.figures,
        page_images: engine_out.page_images,
        stats,
    })
}

async fn run_text_engine(
    pdf_path: &Path,
    config: &ConversionConfig,
    page_indices: &[usize],
) -> Result<EngineOutput, Paper2MdError> {
    let start = Instant::now();
    let texts =
        extract::extract_page_texts(pdf_path, config.password.as_deref(), page_indices).await?;
    let extract_ms = start.elapsed().as_millis() as u64;

    let first_page_text = texts
        .iter()
        .find(|(idx, _)| *idx == 0)
        .map(|(_, t)| t.clone());

    let (pages, body) = text_pages(texts, config);

    Ok(EngineOutput {
        pages,
        body,
        page_images: Vec::new(),
        figures: Vec::new(),
        first_page_text,
        extract_ms,
        llm_ms: 0,
    })
}

/// Per-page results and the joined document body for the text engines.
///
/// The structured engine with no page separator structures the joined text
/// in one pass, so paragraphs split by a page break stay in one block.
pub(crate) fn text_pages(
    texts: Vec<(usize, String)>,
    config: &ConversionConfig,
) -> (Vec<PageResult>, String) {
    let (page_nums, raw): (Vec<usize>, Vec<String>) =
        texts.into_iter().map(|(idx, t)| (idx + 1, t)).unzip();
    let total = page_nums.len();

    let prepared = if config.engine == Engine::Structured && config.strip_running_lines {
        cleanup::strip_running_lines(&raw)
    } else {
        raw
    };

    let mut structurer = Structurer::new();
    let pages: Vec<PageResult> = page_nums
        .iter()
        .zip(&prepared)
        .map(|(&page_num, text)| {
            if let Some(ref cb) = config.progress_callback {
                cb.on_page_start(page_num, total);
            }
            let md = match config.engine {
                Engine::Structured => structurer.structure(text),
                _ => text.clone(),
            };
            let markdown = postprocess::tidy_markdown(&equations::normalize_delimiters(&md));
            if let Some(ref cb) = config.progress_callback {
                cb.on_page_complete(page_num, total, markdown.len());
            }
            PageResult {
                page_num,
                has_figure: figures::has_figure_caption(&markdown),
                markdown,
                ..Default::default()
            }
        })
        .collect();

    let separator = config.effective_separator();
    let body = if config.engine == Engine::Structured && separator == PageSeparator::None {
        structure_text(&prepared.join("\n\n"))
    } else {
        join_pages(&pages, &separator)
    };

    (pages, body)
}

async fn run_vision_engine(
    pdf_path: &Path,
    stem: &str,
    config: &ConversionConfig,
    page_indices: &[usize],
    provider: &Arc<dyn LLMProvider>,
) -> Result<EngineOutput, Paper2MdError> {
    let render_start = Instant::now();
    let rendered = render::render_pages(pdf_path, config, page_indices).await?;
    let extract_ms = render_start.elapsed().as_millis() as u64;
    info!("Rendered {} pages in {}ms", rendered.len(), extract_ms);

    let total = rendered.len();
    let mut pages = Vec::with_capacity(total);
    let mut page_images = Vec::new();
    let mut figure_refs = Vec::new();
    let mut prior: Option<String> = None;
    let mut llm_ms = 0u64;

    for (idx, image) in rendered {
        let page_num = idx + 1;
        if let Some(ref cb) = config.progress_callback {
            cb.on_page_start(page_num, total);
        }

        let png = encode::png_bytes(&image).map_err(|e| Paper2MdError::RasterisationFailed {
            page: page_num,
            detail: format!("PNG encoding failed: {e}"),
        })?;

        let llm_start = Instant::now();
        let mut page = llm::process_page(
            provider,
            page_num,
            encode::to_image_data(&png),
            prior.as_deref(),
            config,
        )
        .await?;
        llm_ms += llm_start.elapsed().as_millis() as u64;

        let mut markdown = postprocess::clean_markdown(&page.markdown);
        prior = Some(markdown.clone());

        page.has_figure = figures::has_figure_caption(&markdown);
        if config.save_page_images {
            if let Some(fig) = figures::attach_figure_link(&mut markdown, stem, page_num) {
                figure_refs.push(fig);
            }
            page_images.push(PageImage { page_num, png });
        }
        page.markdown = markdown;

        if let Some(ref cb) = config.progress_callback {
            cb.on_page_complete(page_num, total, page.markdown.len());
        }
        pages.push(page);
    }

    let body = join_pages(&pages, &config.effective_separator());

    Ok(EngineOutput {
        pages,
        body,
        page_images,
        figures: figure_refs,
        first_page_text: None,
        extract_ms,
        llm_ms,
    })
}

/// Join page Markdown with the separator rendered for each following page.
fn join_pages(pages: &[PageResult], separator: &PageSeparator) -> String {
    let mut out = String::new();
    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            out.push_str(&separator.render(page.page_num));
        }
        out.push_str(page.markdown.trim_end());
    }
    out
}

/// First-page text for metadata: the text layer if the engine already has
/// it, else read page 1 now, else the first converted page's Markdown.
async fn first_page_source(
    pdf_path: &Path,
    password: Option<&str>,
    known: Option<String>,
    pages: &[PageResult],
) -> String {
    if let Some(text) = known.filter(|t| !t.trim().is_empty()) {
        return text;
    }
    match extract::extract_page_texts(pdf_path, password, &[0]).await {
        Ok(mut texts) => {
            if let Some((_, text)) = texts.pop().filter(|(_, t)| !t.trim().is_empty()) {
                return text;
            }
        }
        Err(e) => debug!("First-page text unavailable: {}", e),
    }
    pages.first().map(|p| p.markdown.clone()).unwrap_or_default()
}

/// YAML front matter from paper metadata, falling back to the info
/// dictionary for title and author.
fn format_yaml_front_matter(paper: Option<&PaperMetadata>, doc: &DocumentMetadata) -> String {
    let mut yaml = String::from("---\n");

    let title = paper.map(|p| p.title.clone()).or_else(|| doc.title.clone());
    if let Some(t) = title {
        yaml.push_str(&format!("title: {}\n", yaml_quote(&t)));
    }

    match paper {
        Some(p) => {
            yaml.push_str("authors:\n");
            for a in &p.authors {
                yaml.push_str(&format!("  - {}\n", yaml_quote(a)));
            }
            if let Some(y) = p.year {
                yaml.push_str(&format!("year: {}\n", y));
            }
            if let Some(ref v) = p.venue {
                yaml.push_str(&format!("venue: {}\n", yaml_quote(v)));
            }
            if let Some(ref d) = p.doi {
                yaml.push_str(&format!("doi: {}\n", yaml_quote(d)));
            }
            if let Some(ref id) = p.arxiv_id {
                yaml.push_str(&format!("arxiv: {}\n", yaml_quote(id)));
            }
        }
        None => {
            if let Some(ref a) = doc.author {
                yaml.push_str(&format!("author: {}\n", yaml_quote(a)));
            }
        }
    }

    yaml.push_str(&format!("pages: {}\n", doc.page_count));
    if !doc.pdf_version.is_empty() {
        yaml.push_str(&format!("pdf_version: {}\n", yaml_quote(&doc.pdf_version)));
    }

    yaml.push_str("---\n\n");
    yaml
}

fn yaml_quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

async fn create_dir(dir: &Path) -> Result<(), Paper2MdError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| Paper2MdError::OutputWriteFailed {
            path: dir.to_path_buf(),
            source: e,
        })
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), Paper2MdError> {
    let tmp_path = tmp_path_for(path);
    let fail = |e: std::io::Error| Paper2MdError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };
    tokio::fs::write(&tmp_path, bytes).await.map_err(fail)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(fail)
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
