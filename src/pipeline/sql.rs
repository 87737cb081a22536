//! SQL rendering for the `FarrDarmsPagos` paid-DARM ledger.
//!
//! Every row has the same 33 columns. Most are fixed ledger constants (bank
//! 70, BDA 37, lot 730 …); the rest come from the [`DarmRecord`]. Values are
//! typed through [`SqlValue`] so that quoting is decided once, in one place.

use crate::config::ProcessorConfig;
use crate::output::DarmRecord;
use chrono::Datelike;
use std::fmt;
use tracing::warn;

/// Number of columns in a ledger row.
pub const COLUMN_COUNT: usize = 33;

/// Ledger columns in insertion order.
pub const COLUMNS: [&str; COLUMN_COUNT] = [
    "id",
    "AA_EXERCICIO",
    "CD_BANCO",
    "NR_BDA",
    "NR_COMPLEMENTO",
    "NR_LOTE_NSA",
    "TP_LOTE_D",
    "SQ_DOC",
    "CD_RECEITA",
    "CD_USU_ALT",
    "CD_USU_INCL",
    "DT_ALT",
    "DT_INCL",
    "DT_VENCTO",
    "DT_PAGTO",
    "NR_INSCRICAO",
    "NR_GUIA",
    "NR_COMPETENCIA",
    "NR_CODIGO_BARRAS",
    "NR_LOTE_IPTU",
    "ST_DOC_D",
    "TP_IMPOSTO",
    "VL_PAGO",
    "VL_RECEITA",
    "VL_PRINCIPAL",
    "VL_MORA",
    "VL_MULTA",
    "VL_MULTAF_TCDL",
    "VL_MULTAP_TSD",
    "VL_INSU_TIP",
    "VL_JUROS",
    "processado",
    "criticaProcessamento",
];

/// Index of `SQ_DOC` within a row.
pub const SQ_DOC_SLOT: usize = 7;

/// Columns per line in the column list.
const COLUMN_LINES: [usize; 6] = [7, 7, 5, 6, 6, 2];
/// Values per line in a row.
const VALUE_LINES: [usize; 7] = [7, 5, 3, 4, 6, 6, 2];

// Fixed ledger values for DARMs paid through this channel.
pub const BANK_CODE: i64 = 70;
pub const BDA_NUMBER: i64 = 37;
pub const COMPLEMENT_NUMBER: i64 = 0;
pub const LOT_NSA: i64 = 730;
pub const LOT_TYPE: i64 = 1;
pub const INCLUDING_USER: &str = "FARR";
pub const DOCUMENT_STATUS: &str = "13";

// ── Values ───────────────────────────────────────────────────────────────

/// A literal in a rendered statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Integer(i64),
    /// Decimal already in canonical `1234.56` form; rendered unquoted.
    Decimal(String),
    /// Quoted string with `'` doubled.
    Text(String),
    /// Raw SQL expression such as `NOW()`.
    Expr(String),
}

impl SqlValue {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Integer when `s` parses, quoted text otherwise.
    pub fn integer_or_text(s: &str) -> Self {
        s.parse::<i64>()
            .map(Self::Integer)
            .unwrap_or_else(|_| Self::text(s))
    }

    pub fn now() -> Self {
        Self::Expr("NOW()".to_string())
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => f.write_str("NULL"),
            SqlValue::Bool(b) => f.write_str(if *b { "1" } else { "0" }),
            SqlValue::Integer(n) => write!(f, "{n}"),
            SqlValue::Decimal(d) => f.write_str(d),
            SqlValue::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            SqlValue::Expr(e) => f.write_str(e),
        }
    }
}

/// How `SQ_DOC` is filled in a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqDoc {
    /// Computed by the server at insert time from the guide number.
    ServerExpression,
    /// Pre-computed value.
    Value(i64),
}

/// `guide mod 1000`, computed from the last three digits so arbitrarily long
/// guide numbers cannot overflow. Absent or non-numeric guides count as 0.
pub fn guide_mod_1000(guide: Option<&str>) -> i64 {
    let digits: Vec<u8> = guide
        .unwrap_or("")
        .bytes()
        .filter(u8::is_ascii_digit)
        .collect();
    digits[digits.len().saturating_sub(3)..]
        .iter()
        .fold(0, |acc, d| acc * 10 + i64::from(d - b'0'))
}

/// Server-side `SQ_DOC` expression for a standalone statement.
pub fn sq_doc_expression(guide: Option<&str>) -> String {
    format!(
        "((({} % 1000) * 1000) + (UNIX_TIMESTAMP() % 1000)) % 1000000",
        guide_mod_1000(guide)
    )
}

// ── Builder ──────────────────────────────────────────────────────────────

/// Renders records into ledger statements.
#[derive(Debug, Clone)]
pub struct SqlRecordBuilder {
    database: Option<String>,
    table: String,
    default_revenue_code: String,
    processing_year: i32,
}

impl SqlRecordBuilder {
    pub fn new(
        database: Option<String>,
        table: impl Into<String>,
        default_revenue_code: &str,
        processing_year: i32,
    ) -> Self {
        Self {
            database,
            table: table.into(),
            default_revenue_code: default_revenue_code.to_string(),
            processing_year,
        }
    }

    /// Builder for the configured table, using the current year unless the
    /// config pins one.
    pub fn from_config(config: &ProcessorConfig) -> Self {
        let year = config
            .processing_year
            .unwrap_or_else(|| chrono::Local::now().year());
        Self::new(
            config.database.clone(),
            config.table.clone(),
            &config.default_revenue_code,
            year,
        )
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn processing_year(&self) -> i32 {
        self.processing_year
    }

    /// The 33 typed values for `record`.
    pub fn row(&self, record: &DarmRecord, sq_doc: SqDoc) -> Vec<SqlValue> {
        let fiscal_year = self.fiscal_year(record);
        let revenue_code = numeric_or_text(
            "revenue code",
            present(&record.revenue_code).unwrap_or(self.default_revenue_code.as_str()),
        );
        let sq_doc = match sq_doc {
            SqDoc::ServerExpression => {
                SqlValue::Expr(sq_doc_expression(record.guide_number.as_deref()))
            }
            SqDoc::Value(v) => SqlValue::Integer(v),
        };
        let due_date = record
            .due_date
            .map(|d| SqlValue::text(format!("{} 00:00:00", d.format("%Y-%m-%d"))))
            .unwrap_or(SqlValue::Null);
        let guide = record
            .guide_number
            .as_deref()
            .map(SqlValue::integer_or_text)
            .unwrap_or(SqlValue::Null);
        let barcode = record
            .barcode
            .clone()
            .map(SqlValue::Text)
            .unwrap_or(SqlValue::Null);
        let total = match record.total_value.as_deref() {
            Some(t) if t != super::money::ZERO => t.to_string(),
            _ => record.principal_value.clone(),
        };

        vec![
            SqlValue::Null,
            fiscal_year,
            SqlValue::Integer(BANK_CODE),
            SqlValue::Integer(BDA_NUMBER),
            SqlValue::Integer(COMPLEMENT_NUMBER),
            SqlValue::Integer(LOT_NSA),
            SqlValue::Integer(LOT_TYPE),
            sq_doc,
            revenue_code,
            SqlValue::Null,
            SqlValue::text(INCLUDING_USER),
            SqlValue::Null,
            SqlValue::now(),
            due_date,
            SqlValue::now(),
            SqlValue::text(record.inscription.clone()),
            guide,
            SqlValue::Integer(i64::from(self.processing_year)),
            barcode,
            SqlValue::Null,
            SqlValue::text(DOCUMENT_STATUS),
            SqlValue::Null,
            SqlValue::Decimal(total.clone()),
            SqlValue::Decimal(total),
            SqlValue::Decimal(record.principal_value.clone()),
            SqlValue::Decimal("0.00".into()),
            SqlValue::Decimal("0.00".into()),
            SqlValue::Null,
            SqlValue::Null,
            SqlValue::Null,
            SqlValue::Decimal("0.00".into()),
            SqlValue::Bool(false),
            SqlValue::Null,
        ]
    }

    /// `use <db>;` prologue followed by the `INSERT INTO … (columns) VALUES`
    /// head, without the values.
    pub fn insert_head(&self) -> String {
        let mut out = String::new();
        if let Some(db) = &self.database {
            out.push_str(&format!("use {db};\n\n"));
        }
        out.push_str(&format!("INSERT INTO {} (\n", self.table));
        out.push_str(&grouped_lines(&COLUMNS, &COLUMN_LINES, "    "));
        out.push_str("\n) VALUES");
        out
    }

    /// Standalone statement for one record.
    pub fn build_insert_statement(&self, record: &DarmRecord, sq_doc: SqDoc) -> String {
        let values: Vec<String> = self.row(record, sq_doc).iter().map(ToString::to_string).collect();
        format!(
            "{} (\n{}\n);\n",
            self.insert_head(),
            grouped_lines(&values, &VALUE_LINES, "    ")
        )
    }

    /// Printed fiscal year, or the processing year when the form has none.
    fn fiscal_year(&self, record: &DarmRecord) -> SqlValue {
        match present(&record.fiscal_year) {
            Some(year) => numeric_or_text("fiscal year", year),
            None => SqlValue::Integer(i64::from(self.processing_year)),
        }
    }

    /// Query that counts ledger rows for the record's guide.
    pub fn build_check_statement(&self, record: &DarmRecord) -> String {
        let guide = record
            .guide_number
            .as_deref()
            .map(SqlValue::integer_or_text)
            .unwrap_or(SqlValue::Null);
        let fiscal_year = self.fiscal_year(record);
        format!(
            "SELECT COUNT(*) as total FROM {} WHERE NR_GUIA = {guide} AND AA_EXERCICIO = {fiscal_year} \
             AND CD_BANCO = {BANK_CODE} AND NR_BDA = {BDA_NUMBER} AND NR_COMPLEMENTO = {COMPLEMENT_NUMBER} \
             AND NR_LOTE_NSA = {LOT_NSA} AND TP_LOTE_D = {LOT_TYPE};\n",
            self.table
        )
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Numeric columns keep a value that does not fit `i64` as quoted text
/// rather than replacing it.
fn numeric_or_text(column: &str, value: &str) -> SqlValue {
    let rendered = SqlValue::integer_or_text(value);
    if matches!(rendered, SqlValue::Text(_)) {
        warn!(column, value, "Value is not a 64-bit integer; rendered as text");
    }
    rendered
}

/// One batch row: the values wrapped in parentheses, indented for a
/// multi-row `VALUES` list.
pub fn format_batch_row<S: AsRef<str>>(values: &[S]) -> String {
    format!("    (\n{}\n    )", grouped_lines(values, &VALUE_LINES, "        "))
}

fn grouped_lines<S: AsRef<str>>(items: &[S], shape: &[usize], indent: &str) -> String {
    let mut lines = Vec::with_capacity(shape.len());
    let mut start = 0;
    for &width in shape {
        let end = (start + width).min(items.len());
        let line: Vec<&str> = items[start..end].iter().map(|s| s.as_ref()).collect();
        lines.push(format!("{indent}{}", line.join(", ")));
        start = end;
    }
    lines.join(",\n")
}
