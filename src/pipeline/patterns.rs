//! Ordered regular-expression cascades describing the DARM layout.
//!
//! Each extracted field owns a list of patterns tried in order; the first
//! pattern whose capture is non-empty after trimming wins. Cascades start
//! with labelled forms (`Inscrição: 123`) and fall back to the numbered box
//! headings printed on municipal forms (`02. INSCRIÇÃO MUNICIPAL 123`).
//!
//! The table is immutable once built. [`ExtractionPatterns::builtin`] returns
//! a shared instance compiled on first use; callers that process a different
//! layout build their own table and replace single cascades with
//! [`ExtractionPatterns::with_cascade`].

use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

/// Fields the extractor reads from document text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Inscription,
    RevenueCode,
    PrincipalValue,
    TotalValue,
    DueDate,
    FiscalYear,
    GuideNumber,
    ReferencePeriod,
}

impl Field {
    pub const ALL: [Field; 8] = [
        Field::Inscription,
        Field::RevenueCode,
        Field::PrincipalValue,
        Field::TotalValue,
        Field::DueDate,
        Field::FiscalYear,
        Field::GuideNumber,
        Field::ReferencePeriod,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Field::Inscription => "inscription",
            Field::RevenueCode => "revenue_code",
            Field::PrincipalValue => "principal_value",
            Field::TotalValue => "total_value",
            Field::DueDate => "due_date",
            Field::FiscalYear => "fiscal_year",
            Field::GuideNumber => "guide_number",
            Field::ReferencePeriod => "reference_period",
        }
    }
}

// Digits are `[0-9]`, not `\d`: a Unicode digit must not let a pattern win
// with a capture the extractor then throws away.
const INSCRIPTION: &[&str] = &[
    r"(?:Inscrição|INSCRIÇÃO|Inscrição Municipal)\s*:?\s*([0-9]+)",
    r"(?:Inscrição|INSCRIÇÃO)\s*([0-9]+)",
    r"Insc\.?\s*:?\s*([0-9]+)",
    r"02\.\s*INSCRIÇÃO MUNICIPAL\s*([0-9]+)",
];

// The last form captures the two halves separately; the extractor joins them.
const REVENUE_CODE: &[&str] = &[
    r"(?:RECEITA|Receita)\s*([0-9]{1,4}-[0-9]{1,2})(?:[^0-9]|$)",
    r"01\.\s*RECEITA\s*([0-9]{1,4}-[0-9]{1,2})(?:[^0-9]|$)",
    r"([0-9]{1,4})-([0-9]{1,2})(?:[^0-9]|$)",
];

const PRINCIPAL_VALUE: &[&str] = &[
    r"(?:Valor Principal|VALOR PRINCIPAL|Valor principal)\s*:?\s*R?\$?\s*([0-9,.]+)",
    r"(?:Principal|PRINCIPAL)\s*:?\s*R?\$?\s*([0-9,.]+)",
    r"R?\$?\s*([0-9,.]+)\s*(?:Principal|PRINCIPAL)",
    r"06\.\s*VALOR DO TRIBUTO\s*R?\$?\s*([0-9,.]+)",
];

const TOTAL_VALUE: &[&str] = &[
    r"(?:Valor Total|VALOR TOTAL|Valor total)\s*:?\s*R?\$?\s*([0-9,.]+)",
    r"(?:Total|TOTAL)\s*:?\s*R?\$?\s*([0-9,.]+)",
    r"R?\$?\s*([0-9,.]+)\s*(?:Total|TOTAL)",
    r"09\.\s*VALOR TOTAL\s*R?\$?\s*([0-9,.]+)",
];

const DUE_DATE: &[&str] = &[
    r"(?:Vencimento|VENCIMENTO|Venc\.?)\s*:?\s*([0-9]{2}/[0-9]{2}/[0-9]{4})",
    r"([0-9]{2}/[0-9]{2}/[0-9]{4})\s*(?:Vencimento|VENCIMENTO)",
    r"03\.\s*DATA VENCIMENTO\s*([0-9]{2}/[0-9]{2}/[0-9]{4})",
];

const FISCAL_YEAR: &[&str] = &[
    r"(?:Exercício|EXERCÍCIO|Exerc\.?)\s*:?\s*([0-9]{4})",
    r"([0-9]{4})\s*(?:Exercício|EXERCÍCIO)",
    r"04\.\s*ANO DE REFERÊNCIA\s*([0-9]{4})",
];

// `NØ` is how pdfium renders the `Nº` glyph on these forms.
const GUIDE_NUMBER: &[&str] = &[
    r"05\.\s*GUIA\s*NØ\s*([0-9]+)",
    r"05\.\s*GUIA\s*NØ([0-9]+)",
    r"(?:Guia|GUIA|Número da Guia|Nº Guia)\s*:?\s*([0-9]+)",
    r"(?:Guia|GUIA)\s*([0-9]+)",
    r"Guia\.?\s*:?\s*([0-9]+)",
];

const REFERENCE_PERIOD: &[&str] = &[
    r"(?:Competência|COMPETÊNCIA|Comp\.?)\s*:?\s*([0-9]{2}/[0-9]{4})",
    r"([0-9]{2}/[0-9]{4})\s*(?:Competência|COMPETÊNCIA)",
];

/// Runs of digits, dots, and whitespace; their digits are concatenated into
/// the barcode candidate.
const BARCODE_RUN: &str = r"[0-9.\s]+";

static BUILTIN: Lazy<Arc<ExtractionPatterns>> = Lazy::new(|| {
    Arc::new(
        ExtractionPatterns::compile_builtin()
            .unwrap_or_else(|e| panic!("built-in DARM patterns must compile: {e}")),
    )
});

/// Immutable table of per-field pattern cascades.
#[derive(Debug, Clone)]
pub struct ExtractionPatterns {
    inscription: Vec<Regex>,
    revenue_code: Vec<Regex>,
    principal_value: Vec<Regex>,
    total_value: Vec<Regex>,
    due_date: Vec<Regex>,
    fiscal_year: Vec<Regex>,
    guide_number: Vec<Regex>,
    reference_period: Vec<Regex>,
    barcode_run: Regex,
}

impl ExtractionPatterns {
    /// Shared table for the standard municipal DARM layout.
    pub fn builtin() -> Arc<Self> {
        Arc::clone(&BUILTIN)
    }

    fn compile_builtin() -> Result<Self, regex::Error> {
        Ok(Self {
            inscription: compile(INSCRIPTION)?,
            revenue_code: compile(REVENUE_CODE)?,
            principal_value: compile(PRINCIPAL_VALUE)?,
            total_value: compile(TOTAL_VALUE)?,
            due_date: compile(DUE_DATE)?,
            fiscal_year: compile(FISCAL_YEAR)?,
            guide_number: compile(GUIDE_NUMBER)?,
            reference_period: compile(REFERENCE_PERIOD)?,
            barcode_run: Regex::new(BARCODE_RUN)?,
        })
    }

    /// Replace the cascade for one field, keeping the others.
    ///
    /// Patterns must expose the value in capture group 1. For
    /// [`Field::RevenueCode`] a pattern may instead capture the two halves of
    /// `NNNN-D` in groups 1 and 2.
    pub fn with_cascade(mut self, field: Field, sources: &[&str]) -> Result<Self, regex::Error> {
        *self.cascade_mut(field) = compile(sources)?;
        Ok(self)
    }

    /// Patterns for `field`, in priority order.
    pub fn cascade(&self, field: Field) -> &[Regex] {
        match field {
            Field::Inscription => &self.inscription,
            Field::RevenueCode => &self.revenue_code,
            Field::PrincipalValue => &self.principal_value,
            Field::TotalValue => &self.total_value,
            Field::DueDate => &self.due_date,
            Field::FiscalYear => &self.fiscal_year,
            Field::GuideNumber => &self.guide_number,
            Field::ReferencePeriod => &self.reference_period,
        }
    }

    fn cascade_mut(&mut self, field: Field) -> &mut Vec<Regex> {
        match field {
            Field::Inscription => &mut self.inscription,
            Field::RevenueCode => &mut self.revenue_code,
            Field::PrincipalValue => &mut self.principal_value,
            Field::TotalValue => &mut self.total_value,
            Field::DueDate => &mut self.due_date,
            Field::FiscalYear => &mut self.fiscal_year,
            Field::GuideNumber => &mut self.guide_number,
            Field::ReferencePeriod => &mut self.reference_period,
        }
    }

    pub fn barcode_run(&self) -> &Regex {
        &self.barcode_run
    }
}

fn compile(sources: &[&str]) -> Result<Vec<Regex>, regex::Error> {
    sources.iter().map(|s| Regex::new(s)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_compiles_and_is_shared() {
        let a = ExtractionPatterns::builtin();
        let b = ExtractionPatterns::builtin();
        assert!(Arc::ptr_eq(&a, &b));
        for field in Field::ALL {
            assert!(!a.cascade(field).is_empty(), "{} has no patterns", field.name());
        }
    }

    #[test]
    fn labelled_forms_come_before_box_headings() {
        let p = ExtractionPatterns::builtin();
        let inscription = p.cascade(Field::Inscription);
        assert!(inscription[0].is_match("Inscrição: 42"));
        assert!(inscription.last().unwrap().is_match("02. INSCRIÇÃO MUNICIPAL 42"));
    }

    #[test]
    fn revenue_code_fallback_has_two_groups() {
        let p = ExtractionPatterns::builtin();
        let last = p.cascade(Field::RevenueCode).last().unwrap();
        let caps = last.captures("código 262-3 ").unwrap();
        assert_eq!(&caps[1], "262");
        assert_eq!(&caps[2], "3");
    }

    #[test]
    fn with_cascade_replaces_one_field() {
        let p = ExtractionPatterns::builtin()
            .as_ref()
            .clone()
            .with_cascade(Field::GuideNumber, &[r"DOC\s*(\d+)"])
            .unwrap();
        assert_eq!(p.cascade(Field::GuideNumber).len(), 1);
        assert_eq!(
            p.cascade(Field::Inscription).len(),
            ExtractionPatterns::builtin().cascade(Field::Inscription).len()
        );
    }

    #[test]
    fn with_cascade_reports_bad_regex() {
        let result = ExtractionPatterns::builtin()
            .as_ref()
            .clone()
            .with_cascade(Field::DueDate, &[r"(unclosed"]);
        assert!(result.is_err());
    }
}
