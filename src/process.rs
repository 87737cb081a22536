//! Eager (whole-run) processing entry points.
//!
//! These wait for every document, consolidate the batch, and write the
//! run-level files. Use [`crate::stream::process_stream`] instead to observe
//! documents as they finish.

use crate::config::{MergeOrder, ProcessorConfig};
use crate::error::DarmError;
use crate::output::{DarmRecord, DocumentResult, DocumentStatus, RunOutput, RunStats};
use crate::pipeline::batch::{consolidate_batch, BatchSession};
use crate::pipeline::extract::FieldExtractor;
use crate::pipeline::input;
use crate::pipeline::sql::{SqDoc, SqlRecordBuilder};
use crate::pipeline::text::TextSource;
use crate::report;
use crate::stream::{self, Worker};
use futures::StreamExt;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Consolidated batch file name.
pub const BATCH_FILE: &str = "INSERT_TODOS_DARMs.sql";
/// Run report file name.
pub const REPORT_FILE: &str = "RELATORIO_PROCESSAMENTO.md";

/// Process every document in `config.darms_dir`.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(RunOutput)` even when some documents failed or were skipped (check
/// `output.stats`). An empty directory is a successful run with no batch.
///
/// # Errors
/// Fatal only: missing documents directory, unbindable pdfium, or an output
/// directory that cannot be created. A batch or report file that cannot be
/// written is recorded in `output.output_errors` instead.
pub async fn process_directory(config: &ProcessorConfig) -> Result<RunOutput, DarmError> {
    let source = stream::resolve_source(config)?;
    let paths = input::discover_documents(&config.darms_dir, source.as_ref())?;
    run(paths, config, source).await
}

/// Process an explicit list of documents.
///
/// Discovery indices follow the order of `paths`.
pub async fn process_documents(
    paths: Vec<PathBuf>,
    config: &ProcessorConfig,
) -> Result<RunOutput, DarmError> {
    let source = stream::resolve_source(config)?;
    run(paths, config, source).await
}

/// Synchronous wrapper around [`process_directory`].
///
/// Creates a temporary tokio runtime internally.
pub fn process_sync(config: &ProcessorConfig) -> Result<RunOutput, DarmError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| DarmError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(process_directory(config))
}

/// Extract one document without writing anything.
///
/// The statement in the result still carries the server-side `SQ_DOC`
/// expression.
pub async fn inspect_document(
    path: impl AsRef<Path>,
    config: &ProcessorConfig,
) -> Result<DocumentResult, DarmError> {
    let source = stream::resolve_source(config)?;
    let quiet = ProcessorConfig {
        write_individual_files: false,
        write_check_files: false,
        progress_callback: None,
        ..config.clone()
    };
    let worker = Arc::new(Worker::new(
        &quiet,
        source,
        SqlRecordBuilder::from_config(config),
        1,
    ));
    Ok(worker.run_blocking(0, path.as_ref().to_path_buf()).await)
}

/// Statements produced from already-extracted text.
#[derive(Debug, Clone)]
pub struct ProcessedText {
    pub record: DarmRecord,
    pub statement: String,
    pub check_statement: String,
}

/// Run extraction and rendering on text, with no I/O.
pub fn process_text(text: &str, config: &ProcessorConfig) -> Option<ProcessedText> {
    let extractor = config
        .patterns
        .as_ref()
        .map(|p| FieldExtractor::new(Arc::clone(p)))
        .unwrap_or_default();
    let builder = SqlRecordBuilder::from_config(config);
    let record = extractor.extract(text)?;
    Some(ProcessedText {
        statement: builder.build_insert_statement(&record, SqDoc::ServerExpression),
        check_statement: builder.build_check_statement(&record),
        record,
    })
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn run(
    paths: Vec<PathBuf>,
    config: &ProcessorConfig,
    source: Arc<dyn TextSource>,
) -> Result<RunOutput, DarmError> {
    let total_start = Instant::now();
    let total = paths.len();
    info!(
        "Processing {} document(s) with {} worker(s)",
        total, config.concurrency
    );

    if config.writes_anything() {
        prepare_output_dir(&config.output_dir).await?;
    }
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(total);
    }

    // ── Collect results; this task is the only owner of the session ─────
    let builder = SqlRecordBuilder::from_config(config);
    let mut results = stream::spawn_workers(paths, config, source, builder.clone());
    let mut documents = Vec::with_capacity(total);
    let mut session = BatchSession::new();
    while let Some(result) = results.next().await {
        if result.status() == DocumentStatus::Accepted {
            if let (Some(record), Some(statement)) = (&result.record, &result.statement) {
                session.push(result.index, record.clone(), statement.clone());
            }
        }
        documents.push(result);
    }

    if config.merge_order == MergeOrder::Submission {
        session.sort_by_submission();
        documents.sort_by_key(|d| d.index);
    }
    warn_duplicate_guides(&session);

    // ── Consolidate ──────────────────────────────────────────────────────
    let timestamp_ms = chrono::Utc::now().timestamp_millis();
    let batch = consolidate_batch(&session, timestamp_ms, &builder);
    if batch.is_none() {
        info!("No record accepted; batch file not generated");
    }

    let mut output_errors = Vec::new();
    let batch_file = match (&batch, config.write_batch_file) {
        (Some(b), true) => {
            let path = config.output_dir.join(BATCH_FILE);
            match write_run_file(&path, &b.sql).await {
                Ok(()) => {
                    info!("Batch written: {} ({} rows)", path.display(), b.rows());
                    Some(path)
                }
                Err(e) => {
                    error!("{e}");
                    output_errors.push(e.to_string());
                    None
                }
            }
        }
        _ => None,
    };

    let stats = compute_stats(&documents, batch.as_ref().map(|b| (b.rows(), b.dropped.len())));
    let mut output = RunOutput {
        documents,
        batch,
        batch_file,
        report_file: None,
        output_errors,
        stats,
    };
    output.stats.duration_ms = total_start.elapsed().as_millis() as u64;

    if config.write_report {
        let path = config.output_dir.join(REPORT_FILE);
        let markdown = report::render_report(&output, chrono::Local::now().naive_local());
        match write_run_file(&path, &markdown).await {
            Ok(()) => output.report_file = Some(path),
            Err(e) => {
                error!("{e}");
                output.output_errors.push(e.to_string());
            }
        }
    }

    info!(
        "Run complete: {}/{} accepted, {} skipped, {} failed, {}ms",
        output.stats.accepted,
        output.stats.total_documents,
        output.stats.skipped,
        output.stats.failed,
        output.stats.duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(total, output.stats.accepted);
    }

    Ok(output)
}

fn compute_stats(documents: &[DocumentResult], batch: Option<(usize, usize)>) -> RunStats {
    let count = |status: DocumentStatus| documents.iter().filter(|d| d.status() == status).count();
    let unique_guides: BTreeSet<&str> = documents
        .iter()
        .filter(|d| d.status() == DocumentStatus::Accepted)
        .filter_map(|d| d.record.as_ref()?.guide_number.as_deref())
        .collect();
    let (batch_rows, dropped_rows) = batch.unwrap_or((0, 0));
    RunStats {
        total_documents: documents.len(),
        accepted: count(DocumentStatus::Accepted),
        skipped: count(DocumentStatus::Skipped),
        failed: count(DocumentStatus::Failed),
        unique_guides: unique_guides.len(),
        batch_rows,
        dropped_rows,
        duration_ms: 0,
    }
}

/// Several documents with the same guide overwrite each other's
/// per-document files; the batch keeps all of them.
fn warn_duplicate_guides(session: &BatchSession) {
    let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
    for entry in session.entries() {
        if let Some(guide) = entry.record.guide_number.as_deref() {
            *seen.entry(guide).or_default() += 1;
        }
    }
    for (guide, n) in seen.into_iter().filter(|(_, n)| *n > 1) {
        warn!("Guide {guide} appears in {n} documents; per-document files were overwritten");
    }
}

pub(crate) async fn prepare_output_dir(dir: &Path) -> Result<(), DarmError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| DarmError::OutputDirUnwritable {
            path: dir.to_path_buf(),
            source,
        })
}

/// [`write_atomic`] on the blocking pool.
async fn write_run_file(path: &Path, contents: &str) -> Result<(), DarmError> {
    let target = path.to_path_buf();
    let contents = contents.to_string();
    tokio::task::spawn_blocking(move || write_atomic(&target, &contents))
        .await
        .map_err(|e| DarmError::Internal(format!("write task failed: {e}")))?
        .map_err(|source| DarmError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        })
}

/// Blocking atomic write used from worker threads.
///
/// Readers never observe a partially written file, and a later write to the
/// same path replaces the earlier one.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::text::PlainTextSource;

    #[test]
    fn write_atomic_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.sql");
        write_atomic(&path, "first").unwrap();
        write_atomic(&path, "second").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn failed_run_file_leaves_no_temp_behind() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join(REPORT_FILE);
        std::fs::create_dir_all(target.join("occupied")).unwrap();

        let err = write_run_file(&target, "# report").await.unwrap_err();
        assert!(matches!(err, DarmError::OutputWriteFailed { .. }));
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from(REPORT_FILE)]);

        let ok = dir.path().join(BATCH_FILE);
        write_run_file(&ok, "INSERT;").await.unwrap();
        assert_eq!(std::fs::read_to_string(&ok).unwrap(), "INSERT;");
    }

    #[test]
    fn process_text_renders_both_statements() {
        let cfg = ProcessorConfig::builder().processing_year(2026).build().unwrap();
        let out = process_text("Inscrição: 9\nValor Total: 3,00\nGuia: 12", &cfg).unwrap();
        assert_eq!(out.record.guide_number.as_deref(), Some("12"));
        assert!(out.statement.contains("INSERT INTO FarrDarmsPagos"));
        assert!(out.check_statement.contains("NR_GUIA = 12"));
        assert!(process_text("nada", &cfg).is_none());
    }

    #[test]
    fn stats_count_statuses() {
        let mut ok = DocumentResult::new(0, PathBuf::from("a"));
        ok.record = process_text(
            "Inscrição: 9\nValor Total: 3,00\nGuia: 12",
            &ProcessorConfig::default(),
        )
        .map(|p| p.record);
        let skipped = DocumentResult::new(1, PathBuf::from("b"));
        let stats = compute_stats(&[ok.clone(), ok, skipped], Some((2, 0)));
        assert_eq!(stats.total_documents, 3);
        assert_eq!(stats.accepted, 2);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.unique_guides, 1);
        assert_eq!(stats.batch_rows, 2);
    }

    #[tokio::test]
    async fn inspect_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("a.txt");
        std::fs::write(&doc, "Inscrição: 9\nValor Total: 3,00\nGuia: 12").unwrap();
        let out = dir.path().join("out");
        let cfg = ProcessorConfig::builder()
            .output_dir(&out)
            .text_source(Arc::new(PlainTextSource))
            .build()
            .unwrap();

        let result = inspect_document(&doc, &cfg).await.unwrap();
        assert_eq!(result.status(), DocumentStatus::Accepted);
        assert!(result.statement.unwrap().contains("UNIX_TIMESTAMP()"));
        assert!(!out.exists());
    }
}
