//! Field extraction: document text → [`DarmRecord`].
//!
//! Text extraction from PDFs is lossy: labels and values can land on
//! different lines, accents may survive or not, and pdfium renders `Nº` as
//! `NØ`. Each field is therefore read through a cascade of patterns (see
//! [`super::patterns`]) and the first non-empty capture wins.
//!
//! A record is produced only when the inscription and at least one monetary
//! value are present. Everything else is optional.

use super::patterns::{ExtractionPatterns, Field};
use super::{date, money};
use crate::output::{DarmRecord, InscriptionKind};
use std::sync::Arc;
use tracing::{debug, warn};

/// Maximum number of barcode digits kept.
pub const BARCODE_DIGITS: usize = 48;

/// Applies an [`ExtractionPatterns`] table to document text.
///
/// Cheap to clone; the pattern table is shared.
#[derive(Debug, Clone)]
pub struct FieldExtractor {
    patterns: Arc<ExtractionPatterns>,
}

impl Default for FieldExtractor {
    fn default() -> Self {
        Self::new(ExtractionPatterns::builtin())
    }
}

impl FieldExtractor {
    pub fn new(patterns: Arc<ExtractionPatterns>) -> Self {
        Self { patterns }
    }

    /// Extract a record, or `None` when the required fields are missing.
    pub fn extract(&self, text: &str) -> Option<DarmRecord> {
        let Some(inscription) = self
            .first_capture(Field::Inscription, text)
            .map(|s| digits_only(&s))
            .filter(|s| !s.is_empty())
        else {
            debug!("No inscription found; document skipped");
            return None;
        };

        let principal_raw = self.first_capture(Field::PrincipalValue, text);
        let total_raw = self.first_capture(Field::TotalValue, text);
        if principal_raw.is_none() && total_raw.is_none() {
            debug!(%inscription, "No principal or total value found; document skipped");
            return None;
        }

        let total_value = total_raw.as_deref().map(money::normalize);
        let principal_value = match principal_raw.as_deref() {
            Some(raw) => money::normalize(raw),
            // Forms that print only the total pay exactly that amount.
            None => total_value.clone().unwrap_or_else(|| money::ZERO.to_string()),
        };

        let due_date = self
            .first_capture(Field::DueDate, text)
            .and_then(|raw| match date::parse_br(&raw) {
                Ok(d) => Some(d),
                Err(e) => {
                    warn!(%inscription, "{e}; due date left empty");
                    None
                }
            });

        let record = DarmRecord {
            inscription_kind: InscriptionKind::classify(&inscription),
            barcode: self.barcode(text),
            revenue_code: self.revenue_code(text),
            principal_value,
            total_value,
            due_date,
            fiscal_year: self.first_capture(Field::FiscalYear, text),
            guide_number: self
                .first_capture(Field::GuideNumber, text)
                .map(|g| strip_leading_zeros(&g)),
            reference_period: self.first_capture(Field::ReferencePeriod, text),
            inscription,
        };

        debug!(
            inscription = %record.inscription,
            kind = ?record.inscription_kind,
            guide = record.guide_number.as_deref().unwrap_or("-"),
            revenue_code = record.revenue_code.as_deref().unwrap_or("-"),
            principal = %record.principal_value,
            total = record.total_value.as_deref().unwrap_or("-"),
            due_date = ?record.due_date,
            "Record extracted"
        );
        Some(record)
    }

    /// First non-empty group-1 capture across the field's cascade.
    pub fn first_capture(&self, field: Field, text: &str) -> Option<String> {
        let found = self.patterns.cascade(field).iter().find_map(|re| {
            re.captures(text)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().trim())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        });
        if let Some(value) = &found {
            debug!(field = field.name(), %value, "Field matched");
        }
        found
    }

    /// Revenue code with the hyphen removed.
    ///
    /// A pattern that captures the two halves separately has them joined.
    fn revenue_code(&self, text: &str) -> Option<String> {
        self.patterns
            .cascade(Field::RevenueCode)
            .iter()
            .find_map(|re| {
                let caps = re.captures(text)?;
                let code = match (caps.get(1), caps.get(2)) {
                    (Some(head), Some(tail)) => format!("{}{}", head.as_str(), tail.as_str()),
                    (Some(whole), None) => whole.as_str().replace('-', ""),
                    _ => return None,
                };
                let code = code.trim().to_string();
                (!code.is_empty()).then_some(code)
            })
    }

    /// Digits of every digit/dot/space run, concatenated and cut to 48.
    fn barcode(&self, text: &str) -> Option<String> {
        let digits: String = self
            .patterns
            .barcode_run()
            .find_iter(text)
            .flat_map(|m| m.as_str().chars())
            .filter(char::is_ascii_digit)
            .take(BARCODE_DIGITS)
            .collect();
        (!digits.is_empty()).then_some(digits)
    }
}

/// Extract with the built-in DARM layout.
pub fn extract_record(text: &str) -> Option<DarmRecord> {
    FieldExtractor::default().extract(text)
}

fn digits_only(s: &str) -> String {
    s.chars().filter(char::is_ascii_digit).collect()
}

fn strip_leading_zeros(s: &str) -> String {
    match s.trim_start_matches('0') {
        "" => "0".to_string(),
        rest => rest.to_string(),
    }
}
