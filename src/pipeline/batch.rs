//! Batch consolidation: many standalone statements → one multi-row INSERT.
//!
//! Each accepted document contributes its standalone statement to a
//! [`BatchSession`]. At the end of a run the session is consolidated: the
//! value list of every statement is recovered, its `SQ_DOC` slot is replaced
//! by a concrete number, and all rows are emitted under a single
//! `INSERT … VALUES` head.
//!
//! `SQ_DOC` for the row at position `i` (0-based, counting every entry in
//! the session) is
//!
//! ```text
//! ((guide mod 1000) * 1000) + (timestamp_ms mod 1000) + i
//! ```
//!
//! with one timestamp captured per run, so repeated consolidation of the
//! same session with the same timestamp is byte-identical.

use super::sql::{self, SqlRecordBuilder, COLUMN_COUNT, SQ_DOC_SLOT};
use crate::output::DarmRecord;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Value list of a standalone statement.
static VALUES_LIST: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)VALUES\s*\((.*?)\);").unwrap());

/// One accepted document waiting to be consolidated.
#[derive(Debug, Clone)]
pub struct BatchEntry {
    /// Discovery index of the source document.
    pub index: usize,
    pub record: DarmRecord,
    pub statement: String,
}

/// Accumulates accepted records for one run.
///
/// Owned by a single task; workers hand their results to it instead of
/// sharing it.
#[derive(Debug, Default)]
pub struct BatchSession {
    entries: Vec<BatchEntry>,
}

impl BatchSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, index: usize, record: DarmRecord, statement: String) {
        self.entries.push(BatchEntry {
            index,
            record,
            statement,
        });
    }

    /// Reorder entries by discovery index.
    pub fn sort_by_submission(&mut self) {
        self.entries.sort_by_key(|e| e.index);
    }

    pub fn entries(&self) -> &[BatchEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `SQ_DOC` assigned to one batch row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqDocAssignment {
    /// Position in the session.
    pub position: usize,
    pub guide_number: Option<String>,
    pub sq_doc: i64,
}

/// Result of consolidating a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidatedBatch {
    /// Complete multi-row statement, terminated by `;`.
    pub sql: String,
    pub timestamp_ms: i64,
    /// Rows that made it into `sql`, in order.
    pub assignments: Vec<SqDocAssignment>,
    /// Positions of statements whose value list did not have 33 entries.
    pub dropped: Vec<usize>,
}

impl ConsolidatedBatch {
    pub fn rows(&self) -> usize {
        self.assignments.len()
    }
}

/// `SQ_DOC` for the row at `position`.
pub fn sq_doc(guide: Option<&str>, timestamp_ms: i64, position: usize) -> i64 {
    let position = i64::try_from(position).unwrap_or(i64::MAX);
    (sql::guide_mod_1000(guide) * 1000)
        .saturating_add(timestamp_ms.rem_euclid(1000))
        .saturating_add(position)
}

/// Consolidate every entry of `session` into one statement.
///
/// Returns `None` when the session is empty or no entry survives
/// decomposition.
pub fn consolidate_batch(
    session: &BatchSession,
    timestamp_ms: i64,
    builder: &SqlRecordBuilder,
) -> Option<ConsolidatedBatch> {
    let mut rows = Vec::with_capacity(session.len());
    let mut assignments = Vec::with_capacity(session.len());
    let mut dropped = Vec::new();

    for (position, entry) in session.entries().iter().enumerate() {
        let Some(mut values) = split_values(&entry.statement) else {
            warn!(
                position,
                guide = entry.record.file_key(),
                "Statement does not hold {COLUMN_COUNT} values; left out of the batch"
            );
            dropped.push(position);
            continue;
        };
        let guide = entry.record.guide_number.as_deref();
        let value = sq_doc(guide, timestamp_ms, position);
        values[SQ_DOC_SLOT] = value.to_string();
        rows.push(sql::format_batch_row(&values));
        assignments.push(SqDocAssignment {
            position,
            guide_number: entry.record.guide_number.clone(),
            sq_doc: value,
        });
    }

    if rows.is_empty() {
        return None;
    }

    let sql = format!("{}\n{};\n", builder.insert_head(), rows.join(",\n"));
    Some(ConsolidatedBatch {
        sql,
        timestamp_ms,
        assignments,
        dropped,
    })
}

/// Recover the 33 trimmed values of a standalone statement.
///
/// Splitting is on bare commas, so a value containing a comma yields more
/// than 33 parts and the statement is rejected.
fn split_values(statement: &str) -> Option<Vec<String>> {
    let list = VALUES_LIST.captures(statement)?.get(1)?.as_str();
    let values: Vec<String> = list.split(',').map(|v| v.trim().to_string()).collect();
    (values.len() == COLUMN_COUNT).then_some(values)
}
