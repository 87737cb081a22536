//! Output types: the extracted record and the per-document / per-run results.

use crate::error::DocumentError;
use crate::pipeline::batch::ConsolidatedBatch;
use crate::pipeline::checksum;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ── Record ───────────────────────────────────────────────────────────────

/// What kind of taxpayer identifier the inscription number is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InscriptionKind {
    /// Valid CPF (11 digits).
    Individual,
    /// Valid CNPJ (14 digits).
    Entity,
    /// Anything else: a municipal registration number.
    Municipal,
}

impl InscriptionKind {
    /// Classify an inscription by its check digits.
    pub fn classify(inscription: &str) -> Self {
        if checksum::validate_cpf(inscription) {
            Self::Individual
        } else if checksum::validate_cnpj(inscription) {
            Self::Entity
        } else {
            Self::Municipal
        }
    }
}

/// Structured fields extracted from one DARM.
///
/// Monetary values are already normalised to `1234.56` form. Fields the
/// document does not print are `None`; ledger defaults for them are applied
/// when the SQL statement is rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DarmRecord {
    /// Taxpayer inscription number, digits only. Never empty.
    pub inscription: String,
    pub inscription_kind: InscriptionKind,
    /// Up to 48 digits of the payment line.
    pub barcode: Option<String>,
    /// Revenue code with the hyphen removed (`262-3` → `2623`).
    pub revenue_code: Option<String>,
    /// Normalised principal. Copied from the total when the form omits it.
    pub principal_value: String,
    /// Normalised total, when printed.
    pub total_value: Option<String>,
    pub due_date: Option<NaiveDate>,
    /// Four-digit fiscal year.
    pub fiscal_year: Option<String>,
    /// Guide number without leading zeros (`"0"` if it was all zeros).
    pub guide_number: Option<String>,
    /// Competência as printed, `MM/YYYY`.
    pub reference_period: Option<String>,
}

impl DarmRecord {
    /// Guide number used in output file names.
    pub fn file_key(&self) -> &str {
        self.guide_number.as_deref().unwrap_or("SEM_GUIA")
    }
}

// ── Per-document result ──────────────────────────────────────────────────

/// Outcome classification for one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    /// A record was extracted and its statement produced.
    Accepted,
    /// Text was read but lacked the required fields.
    Skipped,
    /// The document could not be read or its output could not be written.
    Failed,
}

/// Result of processing one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentResult {
    /// Position of the document in discovery order (0-based).
    pub index: usize,
    pub path: PathBuf,
    pub record: Option<DarmRecord>,
    /// Standalone INSERT statement for this record.
    pub statement: Option<String>,
    pub sql_file: Option<PathBuf>,
    pub check_file: Option<PathBuf>,
    /// Characters of text the source produced.
    pub text_chars: usize,
    pub duration_ms: u64,
    pub error: Option<DocumentError>,
    /// Problems that did not cost the record, such as an unwritable check file.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl DocumentResult {
    pub(crate) fn new(index: usize, path: PathBuf) -> Self {
        Self {
            index,
            path,
            record: None,
            statement: None,
            sql_file: None,
            check_file: None,
            text_chars: 0,
            duration_ms: 0,
            error: None,
            warnings: Vec::new(),
        }
    }

    pub fn status(&self) -> DocumentStatus {
        match (&self.error, &self.record) {
            (Some(_), _) => DocumentStatus::Failed,
            (None, Some(_)) => DocumentStatus::Accepted,
            (None, None) => DocumentStatus::Skipped,
        }
    }

    /// File name component, lossy for non-UTF-8 names.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

// ── Per-run output ───────────────────────────────────────────────────────

/// Aggregate counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub total_documents: usize,
    pub accepted: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Distinct guide numbers among accepted records.
    pub unique_guides: usize,
    /// Rows present in the consolidated batch.
    pub batch_rows: usize,
    /// Statements left out of the batch because they did not split into 33 values.
    pub dropped_rows: usize,
    pub duration_ms: u64,
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutput {
    /// One entry per discovered document, in batch order.
    pub documents: Vec<DocumentResult>,
    /// `None` when no record was accepted.
    pub batch: Option<ConsolidatedBatch>,
    pub batch_file: Option<PathBuf>,
    pub report_file: Option<PathBuf>,
    /// Run-level files that could not be written.
    pub output_errors: Vec<String>,
    pub stats: RunStats,
}

impl RunOutput {
    pub fn accepted(&self) -> impl Iterator<Item = &DocumentResult> {
        self.documents
            .iter()
            .filter(|d| d.status() == DocumentStatus::Accepted)
    }

    pub fn failures(&self) -> impl Iterator<Item = &DocumentResult> {
        self.documents
            .iter()
            .filter(|d| d.status() == DocumentStatus::Failed)
    }

    /// Guide numbers of accepted records, in batch order, duplicates kept.
    pub fn guide_numbers(&self) -> Vec<String> {
        self.accepted()
            .filter_map(|d| d.record.as_ref())
            .filter_map(|r| r.guide_number.clone())
            .collect()
    }
}
