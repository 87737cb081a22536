//! Text sources: turn a document file into plain text.
//!
//! [`PdfiumTextSource`] is the production source. It binds to a pdfium
//! shared library and concatenates the text layer of every page.
//! [`PlainTextSource`] reads UTF-8 `.txt` files; it exists for dry runs and
//! tests on machines without pdfium.
//!
//! Sources are called from `spawn_blocking` workers and may run on several
//! threads at once.

use super::input;
use crate::error::{DarmError, DocumentError};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Converts one document file into text.
pub trait TextSource: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Whether discovery should pick up `path`.
    fn accepts(&self, path: &Path) -> bool;

    /// Full text of the document.
    fn extract_text(&self, path: &Path) -> Result<String, DocumentError>;
}

// ── Pdfium ───────────────────────────────────────────────────────────────

/// Text layer extraction through pdfium.
#[derive(Debug, Clone)]
pub struct PdfiumTextSource {
    lib_path: Option<PathBuf>,
}

impl PdfiumTextSource {
    /// Bind once to fail fast when no library is available.
    pub fn new(lib_path: Option<PathBuf>) -> Result<Self, DarmError> {
        load_pdfium(lib_path.as_deref())?;
        Ok(Self { lib_path })
    }
}

impl TextSource for PdfiumTextSource {
    fn name(&self) -> &'static str {
        "pdfium"
    }

    fn accepts(&self, path: &Path) -> bool {
        input::has_pdf_extension(path)
    }

    fn extract_text(&self, path: &Path) -> Result<String, DocumentError> {
        input::check_pdf_magic(path)?;

        let pdfium =
            load_pdfium(self.lib_path.as_deref()).map_err(|e| DocumentError::TextExtractionFailed {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;

        let document = pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| DocumentError::CorruptPdf {
                path: path.to_path_buf(),
                detail: format!("{e:?}"),
            })?;

        let mut text = String::new();
        for (idx, page) in document.pages().iter().enumerate() {
            match page.text() {
                Ok(page_text) => {
                    text.push_str(&page_text.all());
                    text.push('\n');
                }
                Err(e) => warn!(
                    "{}: page {} has no readable text layer: {e:?}",
                    path.display(),
                    idx + 1
                ),
            }
        }

        debug!("{}: extracted {} chars", path.display(), text.chars().count());
        Ok(text)
    }
}

/// Bind to pdfium.
///
/// Lookup order: explicit path, `PDFIUM_DYNAMIC_LIB_PATH`, the directory of
/// the running executable, then the system library.
pub fn load_pdfium(lib_path: Option<&Path>) -> Result<Pdfium, DarmError> {
    if let Some(path) = lib_path {
        debug!(path = %path.display(), "Loading pdfium from configured path");
        let bindings = Pdfium::bind_to_library(path)
            .map_err(|e| DarmError::PdfiumBindingFailed(format!("{}: {e:?}", path.display())))?;
        return Ok(Pdfium::new(bindings));
    }

    if let Ok(path) = std::env::var("PDFIUM_DYNAMIC_LIB_PATH") {
        debug!(path = %path, "Loading pdfium from env var");
        let bindings = Pdfium::bind_to_library(&path)
            .map_err(|e| DarmError::PdfiumBindingFailed(format!("{path}: {e:?}")))?;
        return Ok(Pdfium::new(bindings));
    }

    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        let candidate = Pdfium::pdfium_platform_library_name_at_path(exe_dir.to_string_lossy().as_ref());
        if let Ok(bindings) = Pdfium::bind_to_library(&candidate) {
            debug!(dir = %exe_dir.display(), "Loaded pdfium next to executable");
            return Ok(Pdfium::new(bindings));
        }
    }

    let bindings = Pdfium::bind_to_system_library()
        .map_err(|e| DarmError::PdfiumBindingFailed(format!("{e:?}")))?;
    Ok(Pdfium::new(bindings))
}

// ── Plain text ───────────────────────────────────────────────────────────

/// Reads `.txt` files verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextSource;

impl TextSource for PlainTextSource {
    fn name(&self) -> &'static str {
        "text"
    }

    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("txt"))
    }

    fn extract_text(&self, path: &Path) -> Result<String, DocumentError> {
        let bytes = std::fs::read(path).map_err(|_| DocumentError::FileNotFound {
            path: path.to_path_buf(),
        })?;
        String::from_utf8(bytes).map_err(|e| DocumentError::TextExtractionFailed {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guia.txt");
        std::fs::write(&path, "Inscrição: 1").unwrap();
        assert_eq!(PlainTextSource.extract_text(&path).unwrap(), "Inscrição: 1");
    }

    #[test]
    fn plain_text_rejects_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.txt");
        std::fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();
        assert!(matches!(
            PlainTextSource.extract_text(&path),
            Err(DocumentError::TextExtractionFailed { .. })
        ));
    }

    #[test]
    fn plain_text_missing_file() {
        assert!(matches!(
            PlainTextSource.extract_text(Path::new("/no/such/file.txt")),
            Err(DocumentError::FileNotFound { .. })
        ));
    }

    #[test]
    fn accepts_by_extension() {
        assert!(PlainTextSource.accepts(Path::new("a.TXT")));
        assert!(!PlainTextSource.accepts(Path::new("a.pdf")));
    }

    #[test]
    fn bad_explicit_pdfium_path_fails() {
        let err = load_pdfium(Some(Path::new("/no/such/libpdfium.so")))
            .err()
            .unwrap();
        assert!(matches!(err, DarmError::PdfiumBindingFailed(_)));
    }
}
