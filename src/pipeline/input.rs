//! Input resolution: turn a user-supplied path or URL into a local PDF.
//!
//! pdfium opens files by path, so URLs are downloaded into a `TempDir` that
//! lives as long as the [`ResolvedInput`]. Both paths check the `%PDF`
//! magic bytes up front; a stray `.pdf` that is really HTML or PostScript
//! fails here with [`Paper2MdError::NotAPdf`] instead of deep inside pdfium.

use crate::error::Paper2MdError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// The resolved input: a local path or a downloaded temp file.
pub enum ResolvedInput {
    Local(PathBuf),
    /// The `TempDir` is held so the download survives until conversion ends.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }

    /// File name without extension; names every output for this document.
    pub fn stem(&self) -> String {
        file_stem(self.path())
    }
}

/// `paper.PDF` → `paper`; falls back to `document` for odd paths.
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document".to_string())
}

pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve `input` to a local PDF, downloading URLs with `timeout_secs`.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, Paper2MdError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(Path::new(input)).map(ResolvedInput::Local)
    }
}

/// Validate a local file: it exists, is a regular file, is readable and
/// starts with `%PDF`.
pub fn resolve_local(path: &Path) -> Result<PathBuf, Paper2MdError> {
    let path = path.to_path_buf();

    if !path.exists() {
        return Err(Paper2MdError::FileNotFound { path });
    }
    if !path.is_file() {
        return Err(Paper2MdError::InvalidInput {
            input: path.display().to_string(),
        });
    }

    let mut file = match std::fs::File::open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Paper2MdError::PermissionDenied { path });
        }
        Err(_) => return Err(Paper2MdError::FileNotFound { path }),
    };

    let mut head = Vec::with_capacity(4);
    file.by_ref()
        .take(4)
        .read_to_end(&mut head)
        .map_err(|_| Paper2MdError::PermissionDenied { path: path.clone() })?;
    check_magic(&head).map_err(|magic| Paper2MdError::NotAPdf {
        path: path.clone(),
        magic,
    })?;

    debug!("Resolved local PDF: {}", path.display());
    Ok(path)
}

/// `Err(first four bytes, zero-padded)` unless `head` starts with `%PDF`.
fn check_magic(head: &[u8]) -> Result<(), [u8; 4]> {
    if head.starts_with(PDF_MAGIC) {
        return Ok(());
    }
    let mut magic = [0u8; 4];
    let n = head.len().min(4);
    magic[..n].copy_from_slice(&head[..n]);
    Err(magic)
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, Paper2MdError> {
    info!("Downloading PDF from: {}", url);

    let failed = |reason: String| Paper2MdError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Paper2MdError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;

    let temp_dir = TempDir::new().map_err(|e| Paper2MdError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(filename_from_url(url));

    check_magic(&bytes).map_err(|magic| Paper2MdError::NotAPdf {
        path: file_path.clone(),
        magic,
    })?;

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| Paper2MdError::Internal(format!("Failed to write temp file: {}", e)))?;

    info!("Downloaded {} bytes to: {}", bytes.len(), file_path.display());

    Ok(ResolvedInput::Downloaded {
        path: file_path,
        _temp_dir: temp_dir,
    })
}

/// Last path segment of the URL, with `.pdf` appended when it has no
/// extension (arXiv serves `/pdf/1706.03762v7`).
fn filename_from_url(url: &str) -> String {
    let last = reqwest::Url::parse(url).ok().and_then(|parsed| {
        parsed
            .path_segments()
            .and_then(|mut s| s.next_back().map(str::to_string))
            .filter(|s| !s.is_empty())
    });

    match last {
        Some(name) if name.to_lowercase().ends_with(".pdf") => name,
        Some(name) => format!("{name}.pdf"),
        None => "downloaded.pdf".to_string(),
    }
}
