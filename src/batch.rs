//! Directory batch conversion.
//!
//! Files are converted one after another. A file that fails is logged,
//! reported to the progress callback and recorded in [`BatchReport::failed`];
//! the loop then moves on. Only run-level problems (unreadable input
//! directory, no PDFs, no VLM provider) abort the whole batch.

use crate::config::ConversionConfig;
use crate::convert::{convert_path, vision_provider, write_outputs};
use crate::error::Paper2MdError;
use crate::output::{ConversionStats, WrittenFiles};
use crate::pipeline::input::{file_stem, resolve_local};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Outcome of a directory run.
#[derive(Debug, Default, Serialize)]
pub struct BatchReport {
    pub converted: Vec<ConvertedFile>,
    pub failed: Vec<FailedFile>,
}

#[derive(Debug, Serialize)]
pub struct ConvertedFile {
    pub input: PathBuf,
    pub written: WrittenFiles,
    pub stats: ConversionStats,
}

#[derive(Debug, Serialize)]
pub struct FailedFile {
    pub input: PathBuf,
    /// Display form of the [`Paper2MdError`].
    pub error: String,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.converted.len() + self.failed.len()
    }

    /// `true` when at least one file was attempted and none succeeded.
    pub fn all_failed(&self) -> bool {
        self.converted.is_empty() && !self.failed.is_empty()
    }
}

/// PDF files directly inside `dir`, sorted by path.
///
/// Matches `.pdf` in any case; subdirectories are not searched. Symlinks
/// count when they resolve to a regular file.
pub async fn discover_pdfs(dir: &Path) -> Result<Vec<PathBuf>, Paper2MdError> {
    let unreadable = |e: std::io::Error| Paper2MdError::InputDirUnreadable {
        dir: dir.to_path_buf(),
        source: e,
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(unreadable)?;
    let mut pdfs = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(unreadable)? {
        let path = entry.path();
        if !has_pdf_extension(&path) {
            continue;
        }
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => pdfs.push(path),
            Ok(_) => {}
            Err(e) => warn!("Skipping {}: {}", path.display(), e),
        }
    }
    pdfs.sort();
    pdfs.dedup();
    Ok(pdfs)
}

fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// Convert every PDF in `input_dir`, writing outputs into `output_dir`.
///
/// # Errors
/// Only for run-level failures: [`Paper2MdError::InputDirUnreadable`],
/// [`Paper2MdError::NoPdfsFound`], a missing VLM provider, or an output
/// directory that cannot be created. Per-file errors land in the report.
pub async fn convert_directory(
    input_dir: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<BatchReport, Paper2MdError> {
    let input_dir = input_dir.as_ref();
    let output_dir = output_dir.as_ref();

    let pdfs = discover_pdfs(input_dir).await?;
    if pdfs.is_empty() {
        return Err(Paper2MdError::NoPdfsFound {
            dir: input_dir.to_path_buf(),
        });
    }

    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(|e| Paper2MdError::OutputWriteFailed {
            path: output_dir.to_path_buf(),
            source: e,
        })?;

    let provider = vision_provider(config)?;

    let total = pdfs.len();
    info!(
        "Converting {} PDFs from {} into {} (engine: {})",
        total,
        input_dir.display(),
        output_dir.display(),
        config.engine
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    let mut report = BatchReport::default();
    // Stems with outputs on disk. Claimed after a successful write so a
    // failed `paper.PDF` does not block `paper.pdf`.
    let mut written_stems: HashSet<String> = HashSet::new();

    for (i, pdf) in pdfs.into_iter().enumerate() {
        let name = display_name(&pdf);
        if let Some(ref cb) = config.progress_callback {
            cb.on_file_start(&name, i + 1, total);
        }

        let stem = file_stem(&pdf);
        if written_stems.contains(&stem) {
            let msg = format!("another input already produced {stem}.md");
            warn!("Skipping {}: {}", name, msg);
            if let Some(ref cb) = config.progress_callback {
                cb.on_file_error(&name, &msg);
            }
            report.failed.push(FailedFile {
                input: pdf,
                error: msg,
            });
            continue;
        }

        info!("[{}/{}] {}", i + 1, total, name);
        let result = async {
            let path = resolve_local(&pdf)?;
            let output = convert_path(&path, &stem, config, provider.as_ref()).await?;
            let written = write_outputs(&output, output_dir).await?;
            Ok::<_, Paper2MdError>((output, written))
        }
        .await;

        match result {
            Ok((output, written)) => {
                written_stems.insert(stem);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_file_complete(&name, output.markdown.len());
                }
                report.converted.push(ConvertedFile {
                    input: pdf,
                    written,
                    stats: output.stats,
                });
            }
            Err(e) if e.is_fatal_for_batch() => return Err(e),
            Err(e) => {
                error!("Failed to convert {}: {}", name, e);
                let msg = e.to_string();
                if let Some(ref cb) = config.progress_callback {
                    cb.on_file_error(&name, &msg);
                }
                report.failed.push(FailedFile {
                    input: pdf,
                    error: msg,
                });
            }
        }
    }

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total, report.converted.len());
    }
    info!(
        "Batch complete: {} converted, {} failed",
        report.converted.len(),
        report.failed.len()
    );

    Ok(report)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
