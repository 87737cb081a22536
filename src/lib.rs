//! # darm2sql
//!
//! Turn municipal tax-payment documents (DARMs) into SQL for the
//! `FarrDarmsPagos` paid-documents ledger.
//!
//! Each PDF in the input directory is reduced to its text layer, the text is
//! matched against a cascade of patterns for each field, the values are
//! normalised (Brazilian currency, `DD/MM/YYYY` dates, guide numbers) and
//! rendered as a 33-column `INSERT`. At the end of the run every accepted
//! record is consolidated into one multi-row statement with a concrete
//! `SQ_DOC` per row.
//!
//! ## Pipeline Overview
//!
//! ```text
//! darms/*.pdf
//!  │
//!  ├─ 1. Input    discover documents, check %PDF magic
//!  ├─ 2. Text     pdfium text layer (spawn_blocking, ≤ concurrency workers)
//!  ├─ 3. Extract  pattern cascades → DarmRecord
//!  ├─ 4. Render   per-document INSERT + CHECK query
//!  └─ 5. Batch    single owner consolidates rows, assigns SQ_DOC, writes report
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use darm2sql::{process_directory, ProcessorConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ProcessorConfig::builder()
//!         .darms_dir("darms")
//!         .output_dir("inserts")
//!         .build()?;
//!     let output = process_directory(&config).await?;
//!     eprintln!(
//!         "{} accepted, {} skipped, {} failed",
//!         output.stats.accepted, output.stats.skipped, output.stats.failed
//!     );
//!     Ok(())
//! }
//! ```
//!
//! Text that is already extracted can be processed without any I/O:
//!
//! ```rust
//! use darm2sql::{process_text, ProcessorConfig};
//!
//! let text = "Inscrição: 123456\nValor Total: R$ 1.234,56\nGuia: 000789";
//! let out = process_text(text, &ProcessorConfig::default()).unwrap();
//! assert_eq!(out.record.guide_number.as_deref(), Some("789"));
//! assert_eq!(out.record.principal_value, "1234.56");
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `darm2sql` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! darm2sql = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod progress;
pub mod report;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConfigFile, MergeOrder, ProcessorConfig, ProcessorConfigBuilder};
pub use error::{DarmError, DateError, DocumentError};
pub use output::{DarmRecord, DocumentResult, DocumentStatus, InscriptionKind, RunOutput, RunStats};
pub use pipeline::batch::{consolidate_batch, BatchSession, ConsolidatedBatch};
pub use pipeline::extract::{extract_record, FieldExtractor};
pub use pipeline::patterns::{ExtractionPatterns, Field};
pub use pipeline::sql::{SqDoc, SqlRecordBuilder, SqlValue};
pub use pipeline::text::{PdfiumTextSource, PlainTextSource, TextSource};
pub use process::{
    inspect_document, process_directory, process_documents, process_sync, process_text,
    ProcessedText,
};
pub use progress::{NoopProgressCallback, ProgressCallback, RunProgressCallback};
pub use stream::{process_stream, DocumentStream};
