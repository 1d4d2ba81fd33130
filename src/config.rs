//! Configuration types for paper-to-Markdown conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. One struct carries every knob so a
//! batch run can share a single config across files and log it up front.

use crate::error::Paper2MdError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Configuration for a PDF-to-Markdown conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use paper2md::{ConversionConfig, Engine};
///
/// let config = ConversionConfig::builder()
///     .engine(Engine::Structured)
///     .emit_bibtex(true)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Which extraction path to run. Default: [`Engine::Structured`].
    pub engine: Engine,

    /// Rendering DPI for the vision engine. Range: 72–400. Default: 200.
    pub dpi: u32,

    /// Maximum rendered image dimension (width or height) in pixels. Default: 2000.
    ///
    /// Caps the longest edge regardless of DPI so an oversized page cannot
    /// exhaust memory or exceed the provider's upload limit.
    pub max_rendered_pixels: u32,

    /// LLM model identifier. If None, uses the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for the VLM. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the VLM may generate per page. Default: 4096.
    pub max_tokens: usize,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Custom system prompt for the vision engine. If None, uses the built-in default.
    pub system_prompt: Option<String>,

    /// Pass the previous page's Markdown to the VLM as context. Default: false.
    pub maintain_format: bool,

    /// Page selection. Default: all pages.
    pub pages: PageSelection,

    /// Page separator in assembled output. `None` picks the engine default
    /// (see [`Engine::default_separator`]).
    pub page_separator: Option<PageSeparator>,

    /// Remove running headers/footers and bare page numbers before
    /// structuring. Only the structured engine uses it. Default: true.
    pub strip_running_lines: bool,

    /// Save every rendered page as `<stem>_figures/page_N.png` and link
    /// pages that mention a figure. Vision engine only. Default: true.
    pub save_page_images: bool,

    /// Extract paper metadata and write `<stem>.bib`. Default: false.
    pub emit_bibtex: bool,

    /// Include YAML front-matter with paper/document metadata. Default: false.
    pub include_metadata: bool,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Receives file- and page-level progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            engine: Engine::default(),
            dpi: 200,
            max_rendered_pixels: 2000,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 4096,
            password: None,
            system_prompt: None,
            maintain_format: false,
            pages: PageSelection::default(),
            page_separator: None,
            strip_running_lines: true,
            save_page_images: true,
            emit_bibtex: false,
            include_metadata: false,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("engine", &self.engine)
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("maintain_format", &self.maintain_format)
            .field("pages", &self.pages)
            .field("page_separator", &self.page_separator)
            .field("strip_running_lines", &self.strip_running_lines)
            .field("save_page_images", &self.save_page_images)
            .field("emit_bibtex", &self.emit_bibtex)
            .field("include_metadata", &self.include_metadata)
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The separator actually used between pages.
    pub fn effective_separator(&self) -> PageSeparator {
        self.page_separator
            .clone()
            .unwrap_or_else(|| self.engine.default_separator())
    }
}

/// Builder for [`ConversionConfig`].
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl fmt::Debug for ConversionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ConversionConfigBuilder {
    pub fn engine(mut self, engine: Engine) -> Self {
        self.config.engine = engine;
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn maintain_format(mut self, v: bool) -> Self {
        self.config.maintain_format = v;
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn page_separator(mut self, sep: PageSeparator) -> Self {
        self.config.page_separator = Some(sep);
        self
    }

    pub fn strip_running_lines(mut self, v: bool) -> Self {
        self.config.strip_running_lines = v;
        self
    }

    pub fn save_page_images(mut self, v: bool) -> Self {
        self.config.save_page_images = v;
        self
    }

    pub fn emit_bibtex(mut self, v: bool) -> Self {
        self.config.emit_bibtex = v;
        self
    }

    pub fn include_metadata(mut self, v: bool) -> Self {
        self.config.include_metadata = v;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Paper2MdError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(Paper2MdError::InvalidConfig(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        if c.max_tokens == 0 {
            return Err(Paper2MdError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Extraction path used to turn a PDF into Markdown.
///
/// | Engine | Text source | Output |
/// |--------|-------------|--------|
/// | `Plain` | pdfium text layer | raw page text |
/// | `Structured` | pdfium text layer | headings, equations, paragraphs (default) |
/// | `Vision` | rendered pages → VLM | VLM Markdown + figure links |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// Page text joined with blank lines.
    Plain,
    /// Page text run through the section/equation/table heuristics. (default)
    #[default]
    Structured,
    /// Page images transcribed by a vision-language model.
    Vision,
}

impl Engine {
    /// Separator used when the config does not set one explicitly.
    pub fn default_separator(self) -> PageSeparator {
        match self {
            Engine::Vision => PageSeparator::HorizontalRule,
            Engine::Plain | Engine::Structured => PageSeparator::None,
        }
    }

    /// `true` when the engine reads the PDF text layer.
    pub fn uses_text_layer(self) -> bool {
        matches!(self, Engine::Plain | Engine::Structured)
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Engine::Plain => "plain",
            Engine::Structured => "structured",
            Engine::Vision => "vision",
        };
        f.write_str(s)
    }
}

/// Specifies which pages of the PDF to convert.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum PageSelection {
    /// Convert all pages (default).
    #[default]
    All,
    /// Convert a single page (1-indexed).
    Single(usize),
    /// Convert a contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Convert specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed page numbers.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

/// How to separate pages in the assembled Markdown output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSeparator {
    /// No separator; pages joined with "\n\n".
    None,
    /// Horizontal rule: "\n\n---\n\n"
    HorizontalRule,
    /// HTML comment with page number: "<!-- page N -->"
    Comment,
    /// Custom string inserted between pages.
    Custom(String),
}

impl PageSeparator {
    /// Render the separator string for the given page number (1-indexed).
    pub fn render(&self, page_num: usize) -> String {
        match self {
            PageSeparator::None => "\n\n".to_string(),
            PageSeparator::HorizontalRule => "\n\n---\n\n".to_string(),
            PageSeparator::Comment => format!("\n\n<!-- page {} -->\n\n", page_num),
            PageSeparator::Custom(s) => format!("\n\n{}\n\n", s),
        }
    }
}
