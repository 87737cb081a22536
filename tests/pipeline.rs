//! Whole-run integration tests.
//!
//! Documents are plain `.txt` files read through [`PlainTextSource`], so
//! these tests need neither pdfium nor sample PDFs.
//!
//! Run with:
//!   cargo test --test pipeline -- --nocapture

use darm2sql::{
    process_directory, process_documents, DarmError, DocumentStatus, MergeOrder, PlainTextSource,
    ProcessorConfig, RunProgressCallback,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn form(inscription: &str, total: &str, guide: &str) -> String {
    format!("Inscrição: {inscription}\nValor Total: R$ {total}\nGuia: {guide}\n")
}

/// A `darms/` directory populated with `(file name, body)` pairs.
fn darms_dir(files: &[(&str, &str)]) -> (TempDir, PathBuf, PathBuf) {
    let root = tempfile::tempdir().unwrap();
    let darms = root.path().join("darms");
    std::fs::create_dir(&darms).unwrap();
    for (name, body) in files {
        std::fs::write(darms.join(name), body).unwrap();
    }
    let out = root.path().join("inserts");
    (root, darms, out)
}

fn config(darms: &Path, out: &Path) -> darm2sql::ProcessorConfigBuilder {
    ProcessorConfig::builder()
        .darms_dir(darms)
        .output_dir(out)
        .processing_year(2026)
        .text_source(Arc::new(PlainTextSource))
}

fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap_or_else(|e| panic!("{}: {e}", path.display()))
}

#[derive(Default)]
struct Counter {
    started: AtomicUsize,
    completed: AtomicUsize,
    skipped: AtomicUsize,
    errors: AtomicUsize,
    run_total: AtomicUsize,
    run_accepted: AtomicUsize,
}

impl RunProgressCallback for Counter {
    fn on_run_start(&self, total_documents: usize) {
        self.run_total.store(total_documents, Ordering::SeqCst);
    }
    fn on_document_start(&self, _index: usize, _total: usize) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }
    fn on_document_complete(&self, _index: usize, _total: usize, _guide: Option<&str>) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
    fn on_document_skipped(&self, _index: usize, _total: usize) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
    }
    fn on_document_error(&self, _index: usize, _total: usize, _error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
    fn on_run_complete(&self, _total_documents: usize, accepted: usize) {
        self.run_accepted.store(accepted, Ordering::SeqCst);
    }
}

// ── Full runs ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_run_writes_every_artefact() {
    let a = form("123456", "1.234,56", "000789");
    let b = form("654321", "10,00", "1001");
    let (_root, darms, out) = darms_dir(&[
        ("a.txt", a.as_str()),
        ("b.txt", b.as_str()),
        ("c.txt", "sem dados"),
        ("ignored.pdf", "%PDF-1.4"),
    ]);
    let cfg = config(&darms, &out).build().unwrap();

    let output = tokio_test::assert_ok!(process_directory(&cfg).await);

    assert_eq!(output.stats.total_documents, 3);
    assert_eq!(output.stats.accepted, 2);
    assert_eq!(output.stats.skipped, 1);
    assert_eq!(output.stats.failed, 0);
    assert_eq!(output.stats.unique_guides, 2);
    assert_eq!(output.stats.batch_rows, 2);
    assert!(output.output_errors.is_empty());

    // Per-document files.
    let single = read(&out.join("INSERT_DARM_PAGO_789.sql"));
    assert!(single.starts_with("use silfae;\n\nINSERT INTO FarrDarmsPagos ("));
    assert!(single.contains("UNIX_TIMESTAMP()"));
    assert!(single.contains("1234.56"));
    assert!(read(&out.join("CHECK_GUIA_789.sql")).contains("NR_GUIA = 789"));
    assert!(out.join("INSERT_DARM_PAGO_1001.sql").exists());
    assert!(out.join("CHECK_GUIA_1001.sql").exists());

    // Consolidated batch with concrete SQ_DOC values.
    let batch = output.batch.as_ref().unwrap();
    let batch_sql = read(&out.join("INSERT_TODOS_DARMs.sql"));
    assert_eq!(batch_sql, batch.sql);
    assert!(!batch_sql.contains("UNIX_TIMESTAMP"));
    assert_eq!(batch_sql.matches("INSERT INTO").count(), 1);
    assert!(batch_sql.ends_with(");\n"));
    let ts = batch.timestamp_ms.rem_euclid(1000);
    for a in &batch.assignments {
        let guide: i64 = a.guide_number.as_deref().unwrap().parse().unwrap();
        assert_eq!(a.sq_doc, (guide % 1000) * 1000 + ts + a.position as i64);
        assert!(batch_sql.contains(&format!("        {}, ", a.sq_doc)));
    }

    // Report.
    let report = read(&out.join("RELATORIO_PROCESSAMENTO.md"));
    assert!(report.starts_with("# RELATÓRIO DE PROCESSAMENTO DE DARMs"));
    assert!(report.contains("## Guias Processadas: 2"));
    assert!(report.contains("- `c.txt`: "));
    assert_eq!(output.report_file, Some(out.join("RELATORIO_PROCESSAMENTO.md")));

    // No temporary files left behind.
    for entry in std::fs::read_dir(&out).unwrap() {
        let name = entry.unwrap().file_name().to_string_lossy().into_owned();
        assert!(name.ends_with(".sql") || name.ends_with(".md"), "stray file {name}");
    }
}

#[tokio::test]
async fn submission_order_follows_file_names() {
    let bodies: Vec<String> = ["300", "100", "200", "400", "500", "600"]
        .iter()
        .map(|g| form("111", "5,00", g))
        .collect();
    let names = ["a.txt", "b.txt", "c.txt", "d.txt", "e.txt", "f.txt"];
    let files: Vec<(&str, &str)> = names
        .iter()
        .zip(&bodies)
        .map(|(n, b)| (*n, b.as_str()))
        .collect();
    let (_root, darms, out) = darms_dir(&files);
    let cfg = config(&darms, &out)
        .merge_order(MergeOrder::Submission)
        .concurrency(3)
        .dry_run()
        .build()
        .unwrap();

    let output = process_directory(&cfg).await.unwrap();
    assert_eq!(
        output.guide_numbers(),
        vec!["300", "100", "200", "400", "500", "600"]
    );
    let indices: Vec<usize> = output.documents.iter().map(|d| d.index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3, 4, 5]);
    let positions: Vec<usize> = output
        .batch
        .unwrap()
        .assignments
        .iter()
        .map(|a| a.position)
        .collect();
    assert_eq!(positions, vec![0, 1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn completion_order_keeps_every_row() {
    let bodies: Vec<String> = (1..=8).map(|g| form("222", "1,00", &g.to_string())).collect();
    let names: Vec<String> = (1..=8).map(|i| format!("{i}.txt")).collect();
    let files: Vec<(&str, &str)> = names
        .iter()
        .zip(&bodies)
        .map(|(n, b)| (n.as_str(), b.as_str()))
        .collect();
    let (_root, darms, out) = darms_dir(&files);
    let cfg = config(&darms, &out).dry_run().build().unwrap();

    let output = process_directory(&cfg).await.unwrap();
    let mut guides = output.guide_numbers();
    guides.sort_by_key(|g| g.parse::<u32>().unwrap());
    let expected: Vec<String> = (1..=8).map(|g| g.to_string()).collect();
    assert_eq!(guides, expected);
    assert_eq!(output.stats.batch_rows, 8);
}

#[tokio::test]
async fn unreadable_document_is_counted_as_failed() {
    let good = form("123456", "2,00", "5");
    let (_root, darms, out) = darms_dir(&[("good.txt", good.as_str())]);
    std::fs::write(darms.join("bad.txt"), b"\xff\xfe\x00\x80").unwrap();
    let cfg = config(&darms, &out).build().unwrap();

    let output = process_directory(&cfg).await.unwrap();
    assert_eq!(output.stats.accepted, 1);
    assert_eq!(output.stats.failed, 1);
    let failed: Vec<_> = output.failures().collect();
    assert_eq!(failed[0].file_name(), "bad.txt");
    assert_eq!(failed[0].status(), DocumentStatus::Failed);
    assert!(read(&out.join("RELATORIO_PROCESSAMENTO.md")).contains("- `bad.txt`: "));
}

#[tokio::test]
async fn duplicate_guides_share_files_but_not_rows() {
    let a = form("111", "1,00", "42");
    let b = form("222", "2,00", "0042");
    let (_root, darms, out) = darms_dir(&[("a.txt", a.as_str()), ("b.txt", b.as_str())]);
    let cfg = config(&darms, &out)
        .merge_order(MergeOrder::Submission)
        .build()
        .unwrap();

    let output = process_directory(&cfg).await.unwrap();
    assert_eq!(output.stats.accepted, 2);
    assert_eq!(output.stats.unique_guides, 1);
    assert_eq!(output.stats.batch_rows, 2);

    let sq: Vec<i64> = output
        .batch
        .as_ref()
        .unwrap()
        .assignments
        .iter()
        .map(|a| a.sq_doc)
        .collect();
    assert_eq!(sq[1], sq[0] + 1);

    let sql_files = std::fs::read_dir(&out)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("INSERT_DARM_PAGO_"))
        .count();
    assert_eq!(sql_files, 1);
}

#[tokio::test]
async fn blocked_check_file_still_reaches_the_batch() {
    let a = form("123456", "4,00", "42");
    let (_root, darms, out) = darms_dir(&[("a.txt", a.as_str())]);
    std::fs::create_dir_all(out.join("CHECK_GUIA_42.sql").join("occupied")).unwrap();
    let cfg = config(&darms, &out).build().unwrap();

    let output = process_directory(&cfg).await.unwrap();
    assert_eq!(output.stats.accepted, 1);
    assert_eq!(output.stats.failed, 0);
    assert_eq!(output.stats.batch_rows, 1);
    assert!(output.output_errors.is_empty());
    assert_eq!(output.documents[0].warnings.len(), 1);
    assert!(out.join("INSERT_DARM_PAGO_42.sql").exists());
    assert!(read(&out.join("INSERT_TODOS_DARMs.sql")).contains("4.00"));
    assert!(read(&out.join("RELATORIO_PROCESSAMENTO.md")).contains("### Erros de gravação:"));
}

// ── Edge cases ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_directory_is_fatal() {
    let root = tempfile::tempdir().unwrap();
    let cfg = config(&root.path().join("nope"), &root.path().join("out"))
        .build()
        .unwrap();
    let err = process_directory(&cfg).await.unwrap_err();
    assert!(matches!(err, DarmError::DirectoryNotFound { .. }));
}

#[tokio::test]
async fn empty_directory_produces_no_batch() {
    let (_root, darms, out) = darms_dir(&[]);
    let cfg = config(&darms, &out).build().unwrap();

    let output = process_directory(&cfg).await.unwrap();
    assert_eq!(output.stats.total_documents, 0);
    assert!(output.batch.is_none());
    assert!(output.batch_file.is_none());
    assert!(!out.join("INSERT_TODOS_DARMs.sql").exists());
    assert!(read(&out.join("RELATORIO_PROCESSAMENTO.md")).contains("## Guias Processadas: 0"));
}

#[tokio::test]
async fn dry_run_writes_nothing() {
    let a = form("123456", "9,99", "7");
    let (_root, darms, out) = darms_dir(&[("a.txt", a.as_str())]);
    let cfg = config(&darms, &out).dry_run().build().unwrap();

    let output = process_directory(&cfg).await.unwrap();
    assert_eq!(output.stats.accepted, 1);
    assert!(output.batch.is_some());
    assert!(output.batch_file.is_none());
    assert!(output.report_file.is_none());
    assert!(output.documents[0].sql_file.is_none());
    assert!(!out.exists());
}

#[tokio::test]
async fn progress_callback_sees_every_document() {
    let a = form("1", "1,00", "1");
    let b = form("2", "2,00", "2");
    let (_root, darms, out) = darms_dir(&[
        ("a.txt", a.as_str()),
        ("b.txt", b.as_str()),
        ("c.txt", "vazio"),
    ]);
    let counter = Arc::new(Counter::default());
    let cfg = config(&darms, &out)
        .dry_run()
        .progress_callback(counter.clone())
        .build()
        .unwrap();

    let mut paths = vec![darms.join("a.txt"), darms.join("b.txt"), darms.join("c.txt")];
    paths.push(darms.join("missing.txt"));
    let output = process_documents(paths, &cfg).await.unwrap();

    assert_eq!(output.stats.total_documents, 4);
    assert_eq!(counter.run_total.load(Ordering::SeqCst), 4);
    assert_eq!(counter.started.load(Ordering::SeqCst), 4);
    assert_eq!(counter.completed.load(Ordering::SeqCst), 2);
    assert_eq!(counter.skipped.load(Ordering::SeqCst), 1);
    assert_eq!(counter.errors.load(Ordering::SeqCst), 1);
    assert_eq!(counter.run_accepted.load(Ordering::SeqCst), 2);
}

#[test]
fn sync_wrapper_runs_outside_a_runtime() {
    let a = form("123456", "3,00", "12");
    let (_root, darms, out) = darms_dir(&[("a.txt", a.as_str())]);
    let cfg = config(&darms, &out).dry_run().build().unwrap();
    let output = darm2sql::process_sync(&cfg).unwrap();
    assert_eq!(output.guide_numbers(), vec!["12"]);
}
