//! CLI binary for paper2md.
//!
//! A thin shim over the library crate: flags map onto `ConversionConfig`,
//! a directory input runs the batch loop and anything else converts one
//! document.

use anyhow::{Context, Result};
use clap::Parser;
use paper2md::pipeline::input::is_url;
use paper2md::{
    convert, convert_directory, convert_to_dir, discover_pdfs, inspect_with, BatchReport,
    ConversionConfig, ConversionProgressCallback, Engine, Inspection, PageSelection,
    PageSeparator, Paper2MdError, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: one bar over the files of a batch, with the current
/// page shown in the message while the vision engine works.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Start time of the file in flight.
    file_started: Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            file_started: Mutex::new(None),
        })
    }

    fn elapsed_secs(&self) -> f64 {
        self.file_started
            .lock()
            .ok()
            .and_then(|mut t| t.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_files: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total_files as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Converting");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {total_files} PDFs…"))
        ));
    }

    fn on_file_start(&self, file: &str, _index: usize, _total_files: usize) {
        if let Ok(mut t) = self.file_started.lock() {
            *t = Some(Instant::now());
        }
        self.bar.set_message(file.to_string());
    }

    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        self.bar
            .set_message(format!("page {page_num}/{total_pages}"));
    }

    fn on_file_complete(&self, file: &str, markdown_len: usize) {
        self.bar.println(format!(
            "  {} {:<40}  {}  {}",
            green("✓"),
            file,
            dim(&format!("{markdown_len:>7} chars")),
            dim(&format!("{:.1}s", self.elapsed_secs())),
        ));
        self.bar.inc(1);
    }

    fn on_file_error(&self, file: &str, error: &str) {
        let first_line = error.lines().next().unwrap_or(error);
        let msg = if first_line.chars().count() > 80 {
            format!("{}\u{2026}", first_line.chars().take(79).collect::<String>())
        } else {
            first_line.to_string()
        };
        self.bar.println(format!(
            "  {} {:<40}  {}  {}",
            red("✗"),
            file,
            red(&msg),
            dim(&format!("{:.1}s", self.elapsed_secs())),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_files: usize, success_count: usize) {
        let failed = total_files.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} files converted successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} files converted  ({} failed)",
                if failed == total_files {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_files,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert every PDF in /pdfs into /output (the defaults)
  paper2md

  # Convert a directory with BibTeX and YAML front matter
  paper2md papers/ --output-dir md/ --bibtex --metadata

  # One paper from arXiv through a vision model
  paper2md https://arxiv.org/pdf/1706.03762 --engine vision --model gpt-4.1-mini

  # Raw text layer of pages 1-3 to stdout
  paper2md paper.pdf --engine plain --pages 1-3 --stdout

  # Title, authors, year and venue only (no API key needed)
  paper2md --inspect-only paper.pdf

ENGINES:
  plain        PDF text layer, pages joined with blank lines
  structured   text layer + headings, equations, table captions (default)
  vision       page images transcribed by a vision-language model

ENVIRONMENT VARIABLES:
  PAPER2MD_INPUT          Default input path (default: /pdfs)
  PAPER2MD_OUTPUT_DIR     Default output directory (default: /output)
  OPENAI_API_KEY          OpenAI API key (vision engine)
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  RUST_LOG                Log filter, e.g. paper2md=debug
"#;

/// Convert PDF research papers to Markdown.
#[derive(Parser, Debug)]
#[command(
    name = "paper2md",
    version,
    about = "Convert PDF research papers to Markdown, with BibTeX",
    long_about = "Convert PDF research papers (a directory, a file or a URL) to Markdown. \
The text-layer engines run offline; the vision engine sends rendered pages to a \
vision-language model (OpenAI, Anthropic, Gemini, Ollama, ...).",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Directory of PDFs, a single PDF, or an HTTP/HTTPS URL.
    #[arg(env = "PAPER2MD_INPUT", default_value = "/pdfs")]
    input: String,

    /// Directory for `<stem>.md`, `<stem>.bib` and `<stem>_figures/`.
    #[arg(short, long, env = "PAPER2MD_OUTPUT_DIR", default_value = "/output")]
    output_dir: PathBuf,

    /// Extraction engine.
    #[arg(short, long, env = "PAPER2MD_ENGINE", value_enum, default_value = "structured")]
    engine: EngineArg,

    /// Write `<stem>.bib` with the extracted citation.
    #[arg(long, env = "PAPER2MD_BIBTEX")]
    bibtex: bool,

    /// Prepend YAML front-matter with paper metadata.
    #[arg(long, env = "PAPER2MD_METADATA")]
    metadata: bool,

    /// Keep running headers, footers and page numbers (structured engine).
    #[arg(long, env = "PAPER2MD_NO_STRIP_HEADERS")]
    no_strip_headers: bool,

    /// Do not save page images or insert figure links (vision engine).
    #[arg(long, env = "PAPER2MD_NO_FIGURES")]
    no_figures: bool,

    /// Rendering DPI for the vision engine (72–400).
    #[arg(long, env = "PAPER2MD_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "PAPER2MD_PAGES", default_value = "all")]
    pages: String,

    /// Page separator: none, hr, comment, or custom string. Engine default if unset.
    #[arg(long, env = "PAPER2MD_SEPARATOR")]
    separator: Option<String>,

    /// VLM model ID (e.g. gpt-4.1-nano, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// VLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PAPER2MD_PASSWORD")]
    password: Option<String>,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "PAPER2MD_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Max VLM output tokens per page.
    #[arg(long, env = "PAPER2MD_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// VLM temperature (0.0–2.0).
    #[arg(long, env = "PAPER2MD_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Pass the previous page to the VLM for format continuity.
    #[arg(long, env = "PAPER2MD_MAINTAIN_FORMAT")]
    maintain_format: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PAPER2MD_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Print document and paper metadata only, no conversion.
    #[arg(long)]
    inspect_only: bool,

    /// Print Markdown to stdout instead of writing files (single input).
    #[arg(long)]
    stdout: bool,

    /// Print JSON (conversion output, batch report or metadata).
    #[arg(long, env = "PAPER2MD_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PAPER2MD_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PAPER2MD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PAPER2MD_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum EngineArg {
    Plain,
    Structured,
    Vision,
}

impl From<EngineArg> for Engine {
    fn from(v: EngineArg) -> Self {
        match v {
            EngineArg::Plain => Engine::Plain,
            EngineArg::Structured => Engine::Structured,
            EngineArg::Vision => Engine::Vision,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // INFO logs would interleave with the progress bar, so they are only
    // shown when the bar is off.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.stdout;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let is_dir = !is_url(&cli.input) && Path::new(&cli.input).is_dir();

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let config = build_config(&cli, None).await?;
        let inputs: Vec<String> = if is_dir {
            discover_pdfs(Path::new(&cli.input))
                .await?
                .iter()
                .map(|p| p.display().to_string())
                .collect()
        } else {
            vec![cli.input.clone()]
        };
        if inputs.is_empty() {
            anyhow::bail!("no PDF files found in {}", cli.input);
        }

        let results = inspect_inputs(&inputs, &config).await;
        let failed = results.iter().filter(|(_, r)| r.is_err()).count();
        for (input, result) in &results {
            let Ok(inspection) = result else { continue };
            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(inspection)
                        .context("Failed to serialise metadata")?
                );
            } else {
                print_inspection(input, inspection);
            }
        }
        if failed > 0 && failed == results.len() {
            anyhow::bail!("all {failed} inputs failed to inspect");
        }
        return Ok(());
    }

    let progress = show_progress.then(CliProgressCallback::new);
    let config = build_config(
        &cli,
        progress
            .clone()
            .map(|cb| cb as Arc<dyn ConversionProgressCallback>),
    )
    .await?;

    // ── Batch mode ───────────────────────────────────────────────────────
    if is_dir {
        let report = convert_directory(&cli.input, &cli.output_dir, &config)
            .await
            .context("Batch conversion failed")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("Failed to serialise report")?
            );
        } else if !cli.quiet {
            print_batch_summary(&report, &cli.output_dir, show_progress);
        }

        if report.all_failed() {
            anyhow::bail!("all {} input files failed to convert", report.total());
        }
        return Ok(());
    }

    // ── Single document ──────────────────────────────────────────────────
    if cli.stdout || cli.json {
        let output = convert(&cli.input, &config).await;
        if let Some(ref cb) = progress {
            cb.finish();
        }
        let output = output.context("Conversion failed")?;

        if cli.json {
            let json =
                serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
            println!("{json}");
        } else {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(output.markdown.as_bytes())
                .context("Failed to write to stdout")?;
        }

        if !cli.quiet && !cli.json {
            eprintln!(
                "Converted {}/{} pages in {}ms",
                output.stats.processed_pages,
                output.stats.total_pages,
                output.stats.total_duration_ms
            );
        }
        return Ok(());
    }

    let started = Instant::now();
    let written = convert_to_dir(&cli.input, &cli.output_dir, &config).await;
    if let Some(ref cb) = progress {
        cb.finish();
    }
    let written = written.context("Conversion failed")?;

    if !cli.quiet {
        eprintln!(
            "{}  {}ms  →  {}",
            green("✔"),
            started.elapsed().as_millis(),
            bold(&written.markdown.display().to_string()),
        );
        if let Some(ref bib) = written.bibtex {
            eprintln!("   {}", dim(&bib.display().to_string()));
        }
        if !written.figures.is_empty() {
            eprintln!("   {}", dim(&format!("{} page images", written.figures.len())));
        }
    }

    Ok(())
}

/// Inspect each input in order. A failure is logged and kept in the
/// result so the remaining inputs are still inspected.
async fn inspect_inputs(
    inputs: &[String],
    config: &ConversionConfig,
) -> Vec<(String, Result<Inspection, Paper2MdError>)> {
    let mut results = Vec::with_capacity(inputs.len());
    for input in inputs {
        let result = inspect_with(input, config).await;
        if let Err(ref e) = result {
            tracing::error!("Failed to inspect {}: {}", input, e);
        }
        results.push((input.clone(), result));
    }
    results
}

fn print_inspection(input: &str, inspection: &Inspection) {
    let doc = &inspection.document;
    println!("File:         {}", input);
    println!("Pages:        {}", doc.page_count);
    println!("PDF Version:  {}", doc.pdf_version);
    if let Some(ref p) = doc.producer {
        println!("Producer:     {}", p);
    }
    match inspection.paper {
        Some(ref paper) => {
            println!("Title:        {}", paper.title);
            println!("Authors:      {}", paper.authors.join(", "));
            if let Some(y) = paper.year {
                println!("Year:         {}", y);
            }
            if let Some(ref v) = paper.venue {
                println!("Venue:        {}", v);
            }
            if let Some(ref d) = paper.doi {
                println!("DOI:          {}", d);
            }
            if let Some(ref id) = paper.arxiv_id {
                println!("arXiv:        {}", id);
            }
        }
        None => {
            if let Some(ref t) = doc.title {
                println!("Title:        {}", t);
            }
            if let Some(ref a) = doc.author {
                println!("Author:       {}", a);
            }
        }
    }
    println!();
}

fn print_batch_summary(report: &BatchReport, output_dir: &Path, progress_shown: bool) {
    // The progress callback already printed one line per file.
    if !progress_shown {
        for file in &report.converted {
            eprintln!(
                "{} {}  →  {}",
                green("✓"),
                file.input.display(),
                file.written.markdown.display()
            );
        }
        for file in &report.failed {
            eprintln!("{} {}: {}", red("✗"), file.input.display(), file.error);
        }
    }
    let pages: usize = report.converted.iter().map(|f| f.stats.processed_pages).sum();
    eprintln!(
        "   {} converted, {} failed, {} pages  →  {}",
        bold(&report.converted.len().to_string()),
        red(&report.failed.len().to_string()),
        pages,
        bold(&output_dir.display().to_string()),
    );
}

/// Map CLI args to `ConversionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let system_prompt = if let Some(ref path) = cli.system_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let mut builder = ConversionConfig::builder()
        .engine(cli.engine.into())
        .dpi(cli.dpi)
        .pages(parse_pages(&cli.pages)?)
        .strip_running_lines(!cli.no_strip_headers)
        .save_page_images(!cli.no_figures)
        .emit_bibtex(cli.bibtex)
        .include_metadata(cli.metadata)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .maintain_format(cli.maintain_format)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref sep) = cli.separator {
        builder = builder.page_separator(parse_separator(sep));
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password);
    }
    if let Some(prompt) = system_prompt {
        builder = builder.system_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--pages` string into `PageSelection`.
fn parse_pages(s: &str) -> Result<PageSelection> {
    let s = s.trim().to_lowercase();

    if s == "all" {
        return Ok(PageSelection::All);
    }

    // Range: "3-15"
    if let Some((start, end)) = s.split_once('-') {
        let start: usize = start
            .trim()
            .parse()
            .context("Invalid start page in range")?;
        let end: usize = end.trim().parse().context("Invalid end page in range")?;

        if start < 1 {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", start);
        }
        if start > end {
            anyhow::bail!(
                "Invalid page range '{}-{}': start must be <= end",
                start,
                end
            );
        }

        return Ok(PageSelection::Range(start, end));
    }

    // Set: "1,3,5,7"
    if s.contains(',') {
        let pages: Vec<usize> = s
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<usize>()
                    .context(format!("Invalid page number: '{}'", p.trim()))
            })
            .collect::<Result<Vec<_>>>()?;

        if let Some(&p) = pages.iter().find(|&&p| p < 1) {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", p);
        }

        return Ok(PageSelection::Set(pages));
    }

    let page: usize = s.parse().context("Invalid page number")?;
    if page < 1 {
        anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", page);
    }

    Ok(PageSelection::Single(page))
}

/// Parse `--separator` string into `PageSeparator`.
fn parse_separator(s: &str) -> PageSeparator {
    match s.to_lowercase().as_str() {
        "none" => PageSeparator::None,
        "hr" | "---" => PageSeparator::HorizontalRule,
        "comment" => PageSeparator::Comment,
        _ => PageSeparator::Custom(s.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_parse() {
        assert!(matches!(parse_pages("all").unwrap(), PageSelection::All));
        assert!(matches!(parse_pages(" 5 ").unwrap(), PageSelection::Single(5)));
        assert!(matches!(
            parse_pages("3-15").unwrap(),
            PageSelection::Range(3, 15)
        ));
        match parse_pages("1,3,5").unwrap() {
            PageSelection::Set(v) => assert_eq!(v, vec![1, 3, 5]),
            other => panic!("unexpected {other:?}"),
        }
        assert!(parse_pages("0").is_err());
        assert!(parse_pages("9-2").is_err());
        assert!(parse_pages("x").is_err());
    }

    #[test]
    fn separators_parse() {
        assert_eq!(parse_separator("HR"), PageSeparator::HorizontalRule);
        assert_eq!(parse_separator("none"), PageSeparator::None);
        assert_eq!(
            parse_separator("* * *"),
            PageSeparator::Custom("* * *".into())
        );
    }

    #[test]
    fn defaults_point_at_container_paths() {
        let cli = Cli::try_parse_from(["paper2md"]).unwrap();
        assert_eq!(cli.input, "/pdfs");
        assert_eq!(cli.output_dir, PathBuf::from("/output"));
        assert!(matches!(cli.engine, EngineArg::Structured));
    }

    #[tokio::test]
    async fn flags_map_onto_config() {
        let cli = Cli::try_parse_from([
            "paper2md",
            "papers/",
            "--engine",
            "vision",
            "--bibtex",
            "--no-figures",
            "--separator",
            "comment",
        ])
        .unwrap();
        let config = build_config(&cli, None).await.unwrap();
        assert_eq!(config.engine, Engine::Vision);
        assert!(config.emit_bibtex);
        assert!(!config.save_page_images);
        assert!(config.strip_running_lines);
        assert_eq!(config.page_separator, Some(PageSeparator::Comment));
    }

    #[tokio::test]
    async fn bad_input_does_not_stop_inspection() {
        let dir = tempfile::tempdir().unwrap();
        let html = dir.path().join("a.pdf");
        std::fs::write(&html, b"<html>not a pdf</html>").unwrap();
        let inputs = vec![
            html.display().to_string(),
            dir.path().join("missing.pdf").display().to_string(),
        ];

        let results = inspect_inputs(&inputs, &ConversionConfig::default()).await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, inputs[0]);
        assert_eq!(results[1].0, inputs[1]);
        assert!(matches!(results[0].1, Err(Paper2MdError::NotAPdf { .. })));
        assert!(results[1].1.is_err());
    }
}
