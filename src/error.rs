//! Error types for the darm2sql library.
//!
//! Three distinct error types reflect three distinct failure modes:
//!
//! * [`DarmError`] is **fatal**: the run cannot proceed at all (input
//!   directory missing, output directory not creatable, bad configuration,
//!   pdfium unavailable). Returned as `Err(DarmError)` from the top-level
//!   `process*` functions.
//!
//! * [`DocumentError`] is **non-fatal**: a single document failed (unreadable
//!   file, corrupt PDF, output file not writable) but every other document is
//!   fine. Stored inside [`crate::output::DocumentResult`] so the run keeps
//!   going and still emits whatever batch it can.
//!
//! * [`DateError`] is returned by [`crate::pipeline::date`] when text is not a
//!   real calendar date. The extractor resolves it to an absent due date.
//!
//! A document whose text lacks the required fields is *not* an error: it is
//! reported with status [`crate::output::DocumentStatus::Skipped`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the darm2sql library.
///
/// Document-level failures use [`DocumentError`] and are stored in
/// [`crate::output::DocumentResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum DarmError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The documents directory does not exist.
    #[error("Documents directory not found: '{path}'\nCreate it and place the DARM PDFs inside.")]
    DirectoryNotFound { path: PathBuf },

    /// The documents directory exists but could not be listed.
    #[error("Failed to read documents directory '{path}': {source}")]
    DirectoryUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Output errors ─────────────────────────────────────────────────────
    /// The output directory could not be created.
    #[error("Failed to create output directory '{path}': {source}")]
    OutputDirUnwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A run-level output file (batch, report) could not be written.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder or config-file validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An explicitly requested configuration file does not exist.
    #[error("Configuration file not found: '{path}'")]
    ConfigNotFound { path: PathBuf },

    /// The configuration file exists but could not be read.
    #[error("Failed to read configuration file '{path}': {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for [`crate::config::ConfigFile`].
    #[error("Failed to parse configuration file '{path}': {detail}")]
    ConfigParse { path: PathBuf, detail: String },

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
You can:\n\
  • Set PDFIUM_DYNAMIC_LIB_PATH=/path/to/libpdfium.\n\
  • Place libpdfium next to the darm2sql executable.\n\
  • Install pdfium system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single document.
///
/// Stored alongside [`crate::output::DocumentResult`] when a document fails.
/// The run continues with the remaining documents.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum DocumentError {
    /// The document disappeared or could not be opened.
    #[error("{path}: file not found or unreadable")]
    FileNotFound { path: PathBuf },

    /// The file was read but does not start with the PDF magic bytes.
    #[error("{path}: not a valid PDF (first bytes: {magic:?})")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// pdfium refused to open the document.
    #[error("{path}: corrupt PDF: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// The text source failed for a reason other than the above.
    #[error("{path}: text extraction failed: {detail}")]
    TextExtractionFailed { path: PathBuf, detail: String },

    /// The per-document SQL file could not be written.
    #[error("{path}: failed to write output: {detail}")]
    WriteFailed { path: PathBuf, detail: String },

    /// The worker handling this document panicked or was cancelled.
    #[error("{path}: worker aborted: {detail}")]
    WorkerAborted { path: PathBuf, detail: String },
}

impl DocumentError {
    /// Path of the document the error refers to.
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::FileNotFound { path }
            | Self::NotAPdf { path, .. }
            | Self::CorruptPdf { path, .. }
            | Self::TextExtractionFailed { path, .. }
            | Self::WriteFailed { path, .. }
            | Self::WorkerAborted { path, .. } => path,
        }
    }
}

/// Text that is not a real `DD/MM/YYYY` calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid date '{input}': expected a real DD/MM/YYYY calendar date")]
pub struct DateError {
    pub input: String,
}
