//! pdfium binding and document loading shared by the text and render stages.
//!
//! pdfium is a C++ library loaded at runtime. Lookup order:
//!
//! 1. `PDFIUM_LIB_PATH`: the library file itself, or a directory holding it
//! 2. the current working directory (`./libpdfium.so` and friends)
//! 3. the system library search path
//!
//! All functions here block; callers run them inside `spawn_blocking`.

use crate::error::Paper2MdError;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::debug;

/// Bind to a pdfium library using the lookup order above.
pub fn bind_pdfium() -> Result<Pdfium, Paper2MdError> {
    if let Ok(env_path) = std::env::var("PDFIUM_LIB_PATH") {
        let bound = if Path::new(&env_path).is_dir() {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                env_path.as_str(),
            ))
        } else {
            Pdfium::bind_to_library(&env_path)
        };
        match bound {
            Ok(bindings) => {
                debug!("Bound pdfium from PDFIUM_LIB_PATH: {}", env_path);
                return Ok(Pdfium::new(bindings));
            }
            Err(e) => debug!("PDFIUM_LIB_PATH '{}' unusable: {:?}", env_path, e),
        }
    }

    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| Paper2MdError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

/// Open a PDF, mapping pdfium's load errors onto [`Paper2MdError`].
pub fn open_document<'a>(
    pdfium: &'a Pdfium,
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<PdfDocument<'a>, Paper2MdError> {
    pdfium
        .load_pdf_from_file(pdf_path, password)
        .map_err(|e| map_load_error(pdf_path, password.is_some(), format!("{:?}", e)))
}

/// Classify a pdfium load error by its debug text.
fn map_load_error(pdf_path: &Path, had_password: bool, detail: String) -> Paper2MdError {
    if detail.to_lowercase().contains("password") {
        if had_password {
            Paper2MdError::WrongPassword {
                path: pdf_path.to_path_buf(),
            }
        } else {
            Paper2MdError::PasswordRequired {
                path: pdf_path.to_path_buf(),
            }
        }
    } else {
        Paper2MdError::CorruptPdf {
            path: pdf_path.to_path_buf(),
            detail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_errors_are_classified() {
        let p = Path::new("secret.pdf");
        assert!(matches!(
            map_load_error(p, false, "PdfiumLibraryInternalError(PasswordError)".into()),
            Paper2MdError::PasswordRequired { .. }
        ));
        assert!(matches!(
            map_load_error(p, true, "PasswordError".into()),
            Paper2MdError::WrongPassword { .. }
        ));
    }

    #[test]
    fn other_errors_are_corrupt() {
        let err = map_load_error(Path::new("bad.pdf"), false, "FormatError".into());
        match err {
            Paper2MdError::CorruptPdf { detail, .. } => assert_eq!(detail, "FormatError"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
