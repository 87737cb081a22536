//! Streaming processing API: emit document results as workers finish.
//!
//! Documents are handed to at most `concurrency` blocking workers at once
//! (`buffer_unordered` is the admission gate). Each worker owns its
//! document end to end: text extraction, field extraction, statement
//! rendering, and the per-document files. Finished [`DocumentResult`]s are
//! sent over a channel; nothing is shared between workers except read-only
//! configuration.
//!
//! Results arrive in completion order. Sort by `index` if order matters.

use crate::config::ProcessorConfig;
use crate::error::{DarmError, DocumentError};
use crate::output::{DocumentResult, DocumentStatus};
use crate::pipeline::extract::FieldExtractor;
use crate::pipeline::sql::{SqDoc, SqlRecordBuilder};
use crate::pipeline::text::{PdfiumTextSource, TextSource};
use crate::process::write_atomic;
use crate::progress::ProgressCallback;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;
use tracing::{debug, info, warn};

/// A boxed stream of per-document results.
pub type DocumentStream = Pin<Box<dyn Stream<Item = DocumentResult> + Send>>;

/// Process `paths`, streaming each result as soon as its worker finishes.
///
/// Does not write the batch file or the report; see
/// [`crate::process::process_documents`] for the full run.
///
/// # Errors
/// Fatal only: pdfium cannot be bound, or the output directory cannot be
/// created while per-document files are enabled.
pub async fn process_stream(
    paths: Vec<PathBuf>,
    config: &ProcessorConfig,
) -> Result<DocumentStream, DarmError> {
    let source = resolve_source(config)?;
    if config.write_individual_files || config.write_check_files {
        crate::process::prepare_output_dir(&config.output_dir).await?;
    }
    let builder = SqlRecordBuilder::from_config(config);
    Ok(spawn_workers(paths, config, source, builder))
}

/// Pre-built text source from the config, or pdfium.
pub(crate) fn resolve_source(config: &ProcessorConfig) -> Result<Arc<dyn TextSource>, DarmError> {
    if let Some(source) = &config.text_source {
        return Ok(Arc::clone(source));
    }
    let pdfium = PdfiumTextSource::new(config.pdfium_lib_path.clone())?;
    Ok(Arc::new(pdfium))
}

/// Start the driver task and return the receiving end.
pub(crate) fn spawn_workers(
    paths: Vec<PathBuf>,
    config: &ProcessorConfig,
    source: Arc<dyn TextSource>,
    builder: SqlRecordBuilder,
) -> DocumentStream {
    let concurrency = config.concurrency.max(1);
    let worker = Arc::new(Worker::new(config, source, builder, paths.len()));
    let (tx, rx) = mpsc::channel(concurrency);

    tokio::spawn(async move {
        let mut results = stream::iter(paths.into_iter().enumerate().map(|(index, path)| {
            let worker = Arc::clone(&worker);
            async move { worker.run_blocking(index, path).await }
        }))
        .buffer_unordered(concurrency);

        while let Some(result) = results.next().await {
            if tx.send(result).await.is_err() {
                debug!("Result receiver dropped; stopping");
                break;
            }
        }
    });

    Box::pin(ReceiverStream::new(rx))
}

// ── Worker ───────────────────────────────────────────────────────────────

/// Per-run read-only state shared by every worker.
pub(crate) struct Worker {
    extractor: FieldExtractor,
    builder: SqlRecordBuilder,
    source: Arc<dyn TextSource>,
    output_dir: PathBuf,
    write_individual_files: bool,
    write_check_files: bool,
    callback: Option<ProgressCallback>,
    total: usize,
}

impl Worker {
    pub(crate) fn new(
        config: &ProcessorConfig,
        source: Arc<dyn TextSource>,
        builder: SqlRecordBuilder,
        total: usize,
    ) -> Self {
        let extractor = config
            .patterns
            .as_ref()
            .map(|p| FieldExtractor::new(Arc::clone(p)))
            .unwrap_or_default();
        Self {
            extractor,
            builder,
            source,
            output_dir: config.output_dir.clone(),
            write_individual_files: config.write_individual_files,
            write_check_files: config.write_check_files,
            callback: config.progress_callback.clone(),
            total,
        }
    }

    /// Run [`Worker::process`] on the blocking pool.
    ///
    /// A panicking worker yields a failed result instead of tearing down the run.
    pub(crate) async fn run_blocking(self: Arc<Self>, index: usize, path: PathBuf) -> DocumentResult {
        let worker = Arc::clone(&self);
        let fallback = path.clone();
        match tokio::task::spawn_blocking(move || worker.process(index, path)).await {
            Ok(result) => result,
            Err(e) => {
                let error = DocumentError::WorkerAborted {
                    path: fallback.clone(),
                    detail: e.to_string(),
                };
                warn!("{error}");
                if let Some(cb) = &self.callback {
                    cb.on_document_error(index, self.total, &error.to_string());
                }
                let mut result = DocumentResult::new(index, fallback);
                result.error = Some(error);
                result
            }
        }
    }

    /// Handle one document end to end.
    pub(crate) fn process(&self, index: usize, path: PathBuf) -> DocumentResult {
        let start = Instant::now();
        if let Some(cb) = &self.callback {
            cb.on_document_start(index, self.total);
        }

        let mut result = DocumentResult::new(index, path);
        if let Err(e) = self.fill(&mut result) {
            warn!("{e}");
            result.error = Some(e);
        }
        result.duration_ms = start.elapsed().as_millis() as u64;

        if let Some(cb) = &self.callback {
            match result.status() {
                DocumentStatus::Accepted => cb.on_document_complete(
                    index,
                    self.total,
                    result
                        .record
                        .as_ref()
                        .and_then(|r| r.guide_number.as_deref()),
                ),
                DocumentStatus::Skipped => cb.on_document_skipped(index, self.total),
                DocumentStatus::Failed => {
                    let msg = result
                        .error
                        .as_ref()
                        .map(ToString::to_string)
                        .unwrap_or_default();
                    cb.on_document_error(index, self.total, &msg)
                }
            }
        }
        result
    }

    fn fill(&self, result: &mut DocumentResult) -> Result<(), DocumentError> {
        let text = self.source.extract_text(&result.path)?;
        result.text_chars = text.chars().count();

        let Some(record) = self.extractor.extract(&text) else {
            info!(
                "{}: inscription or amount not found; skipped",
                result.path.display()
            );
            return Ok(());
        };

        let statement = self
            .builder
            .build_insert_statement(&record, SqDoc::ServerExpression);
        let key = record.file_key().to_string();
        let check = record
            .guide_number
            .is_some()
            .then(|| self.builder.build_check_statement(&record));
        result.record = Some(record);
        result.statement = Some(statement.clone());

        if self.write_individual_files {
            let path = self.output_dir.join(format!("INSERT_DARM_PAGO_{key}.sql"));
            self.write(&path, &statement)?;
            result.sql_file = Some(path);
        }
        // A failed check file is a warning; the record stays accepted.
        if let (true, Some(check)) = (self.write_check_files, check) {
            let path = self.output_dir.join(format!("CHECK_GUIA_{key}.sql"));
            match self.write(&path, &check) {
                Ok(()) => result.check_file = Some(path),
                Err(e) => {
                    warn!("{e}");
                    result.warnings.push(e.to_string());
                }
            }
        }

        info!("{}: guide {key} processed", result.path.display());
        Ok(())
    }

    fn write(&self, path: &Path, contents: &str) -> Result<(), DocumentError> {
        write_atomic(path, contents).map_err(|e| DocumentError::WriteFailed {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::text::PlainTextSource;

    const FORM: &str = "Inscrição: 123456\nValor Total: R$ 10,00\nGuia: 0042\n";

    fn config(out: &Path) -> ProcessorConfig {
        ProcessorConfig::builder()
            .output_dir(out)
            .processing_year(2026)
            .text_source(Arc::new(PlainTextSource))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn stream_yields_every_document() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let mut paths = Vec::new();
        for i in 0..6 {
            let p = dir.path().join(format!("{i}.txt"));
            let body = if i % 2 == 0 { FORM.to_string() } else { "nothing here".to_string() };
            std::fs::write(&p, body).unwrap();
            paths.push(p);
        }

        let results: Vec<DocumentResult> = process_stream(paths, &config(&out))
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(results.len(), 6);
        let accepted = results
            .iter()
            .filter(|r| r.status() == DocumentStatus::Accepted)
            .count();
        assert_eq!(accepted, 3);
        assert!(out.join("INSERT_DARM_PAGO_42.sql").exists());
        assert!(out.join("CHECK_GUIA_42.sql").exists());
    }

    #[tokio::test]
    async fn missing_file_is_a_failed_result() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(&dir.path().join("out"));
        let mut s = process_stream(vec![dir.path().join("gone.txt")], &cfg)
            .await
            .unwrap();
        let r = s.next().await.unwrap();
        assert_eq!(r.status(), DocumentStatus::Failed);
        assert!(matches!(r.error, Some(DocumentError::FileNotFound { .. })));
        assert!(s.next().await.is_none());
    }

    #[test]
    fn worker_without_guide_skips_check_file() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("a.txt");
        std::fs::write(&doc, "Inscrição: 1\nValor Total: 5,00\n").unwrap();
        let cfg = config(dir.path());
        let builder = SqlRecordBuilder::from_config(&cfg);
        let worker = Worker::new(&cfg, Arc::new(PlainTextSource), builder, 1);

        let r = worker.process(0, doc);
        assert_eq!(r.status(), DocumentStatus::Accepted);
        assert_eq!(r.sql_file, Some(dir.path().join("INSERT_DARM_PAGO_SEM_GUIA.sql")));
        assert_eq!(r.check_file, None);
    }

    #[test]
    fn unwritable_check_file_keeps_record() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("a.txt");
        std::fs::write(&doc, FORM).unwrap();
        let out = dir.path().join("out");
        let blocked = out.join("CHECK_GUIA_42.sql");
        std::fs::create_dir_all(blocked.join("occupied")).unwrap();
        let cfg = config(&out);
        let builder = SqlRecordBuilder::from_config(&cfg);
        let worker = Worker::new(&cfg, Arc::new(PlainTextSource), builder, 1);

        let r = worker.process(0, doc);
        assert_eq!(r.status(), DocumentStatus::Accepted);
        assert!(r.error.is_none());
        assert!(r.statement.is_some());
        assert_eq!(r.sql_file, Some(out.join("INSERT_DARM_PAGO_42.sql")));
        assert_eq!(r.check_file, None);
        assert_eq!(r.warnings.len(), 1);
        assert!(blocked.is_dir());
    }
}
