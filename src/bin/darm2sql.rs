//! CLI binary for darm2sql.
//!
//! A thin shim over the library crate: loads the optional JSON config file,
//! applies CLI flags on top, runs the processor, and prints a summary.

use anyhow::{bail, Context, Result};
use clap::Parser;
use darm2sql::{
    inspect_document, process_directory, ConfigFile, DocumentStatus, MergeOrder, PlainTextSource,
    ProcessorConfig, ProgressCallback, RunProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar over documents. Workers finish out of order, so every
/// line carries the document number.
struct CliProgressCallback {
    bar: ProgressBar,
    skipped: AtomicUsize,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Scanning");
        bar.set_message("looking for DARMs…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            skipped: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
        })
    }
}

impl RunProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_documents: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} DARMs  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        self.bar.set_length(total_documents as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Processing");
        self.bar.reset_eta();
    }

    fn on_document_complete(&self, index: usize, total: usize, guide: Option<&str>) {
        self.bar.println(format!(
            "  {} DARM {:>3}/{:<3}  guia {}",
            green("✓"),
            index + 1,
            total,
            bold(guide.unwrap_or("SEM_GUIA")),
        ));
        self.bar.inc(1);
    }

    fn on_document_skipped(&self, index: usize, total: usize) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} DARM {:>3}/{:<3}  {}",
            yellow("–"),
            index + 1,
            total,
            dim("required fields not found"),
        ));
        self.bar.inc(1);
    }

    fn on_document_error(&self, index: usize, total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 100 {
            error.chars().take(99).chain(['…']).collect()
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} DARM {:>3}/{:<3}  {}",
            red("✗"),
            index + 1,
            total,
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, _total_documents: usize, _accepted: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Process ./darms into ./inserts
  darm2sql

  # Explicit directories, deterministic batch order
  darm2sql --darms-dir /data/darms --output-dir /data/sql --order submission

  # Look at what one document yields, without writing anything
  darm2sql --inspect darms/guia_0123.pdf

  # Pre-extracted .txt files instead of PDFs (no pdfium needed)
  darm2sql --text --darms-dir texts

  # Write a config file with every default spelled out
  darm2sql --init-config darm2sql.json

OUTPUT FILES (in --output-dir):
  INSERT_TODOS_DARMs.sql        all accepted records in one INSERT
  INSERT_DARM_PAGO_<guia>.sql   one INSERT per document
  CHECK_GUIA_<guia>.sql         SELECT COUNT(*) probe per guide
  RELATORIO_PROCESSAMENTO.md    run report

CONFIG FILE:
  --config FILE, else ./darm2sql.json, else ~/.darm2sql/config.json.
  Flags override file values.

ENVIRONMENT VARIABLES:
  PDFIUM_DYNAMIC_LIB_PATH  Path to libpdfium when not beside the executable
  RUST_LOG                 Overrides the log filter (e.g. darm2sql=debug)
"#;

/// Convert DARM tax-payment PDFs into SQL for the FarrDarmsPagos ledger.
#[derive(Parser, Debug)]
#[command(
    name = "darm2sql",
    version,
    about = "Convert DARM tax-payment PDFs into SQL INSERT statements",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Directory containing the DARM documents. [default: darms]
    #[arg(short = 'i', long, env = "DARM2SQL_DARMS_DIR")]
    darms_dir: Option<PathBuf>,

    /// Directory receiving SQL files and the report. [default: inserts]
    #[arg(short, long, env = "DARM2SQL_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// JSON config file.
    #[arg(long, env = "DARM2SQL_CONFIG")]
    config: Option<PathBuf>,

    /// Documents processed at the same time. [default: 4]
    #[arg(short, long, env = "DARM2SQL_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Batch row order: completion or submission (file-name order).
    #[arg(long, env = "DARM2SQL_ORDER", value_enum)]
    order: Option<OrderArg>,

    /// Database selected with `use <db>;`. [default: silfae]
    #[arg(long, env = "DARM2SQL_DATABASE", conflicts_with = "no_use")]
    database: Option<String>,

    /// Omit the `use <db>;` prologue.
    #[arg(long)]
    no_use: bool,

    /// Ledger table. [default: FarrDarmsPagos]
    #[arg(long, env = "DARM2SQL_TABLE")]
    table: Option<String>,

    /// Year for NR_COMPETENCIA and missing fiscal years. [default: current year]
    #[arg(long, env = "DARM2SQL_YEAR")]
    year: Option<i32>,

    /// Explicit path to the pdfium shared library.
    #[arg(long)]
    pdfium_lib: Option<PathBuf>,

    /// Read UTF-8 .txt files instead of PDFs.
    #[arg(long)]
    text: bool,

    /// Do not write INSERT_DARM_PAGO_*.sql files.
    #[arg(long)]
    no_individual_files: bool,

    /// Do not write CHECK_GUIA_*.sql files.
    #[arg(long)]
    no_check_files: bool,

    /// Do not write RELATORIO_PROCESSAMENTO.md.
    #[arg(long)]
    no_report: bool,

    /// Write nothing; report results only.
    #[arg(long)]
    dry_run: bool,

    /// Print the run output (or inspected document) as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "DARM2SQL_NO_PROGRESS")]
    no_progress: bool,

    /// Extract a single document and print the result; writes nothing.
    #[arg(long, value_name = "FILE")]
    inspect: Option<PathBuf>,

    /// Write a default config file and exit.
    #[arg(long, value_name = "FILE")]
    init_config: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum OrderArg {
    Completion,
    Submission,
}

impl From<OrderArg> for MergeOrder {
    fn from(v: OrderArg) -> Self {
        match v {
            OrderArg::Completion => MergeOrder::Completion,
            OrderArg::Submission => MergeOrder::Submission,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(ref path) = cli.init_config {
        ConfigFile::default()
            .save(path)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        eprintln!("{} wrote {}", green("✔"), bold(&path.display().to_string()));
        return Ok(());
    }

    let file_path = cli.config.clone().or_else(ConfigFile::default_path);
    let file = ConfigFile::load(file_path.as_deref()).context("Failed to load configuration")?;

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level logs; verbose always wins.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && cli.inspect.is_none();
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        file.logging.level.as_str()
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    if let Some(ref p) = file_path {
        tracing::info!("Using config file {}", p.display());
    }

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn RunProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, file, progress_cb)?;

    // ── Inspect mode ─────────────────────────────────────────────────────
    if let Some(ref path) = cli.inspect {
        let result = inspect_document(path, &config)
            .await
            .context("Failed to inspect document")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&result).context("Failed to serialise result")?
            );
            return Ok(());
        }
        println!("File:          {}", path.display());
        println!("Status:        {:?}", result.status());
        println!("Text chars:    {}", result.text_chars);
        if let Some(ref e) = result.error {
            println!("Error:         {e}");
        }
        if let Some(ref r) = result.record {
            println!("Inscription:   {} ({:?})", r.inscription, r.inscription_kind);
            println!("Guide:         {}", r.file_key());
            println!("Revenue code:  {}", r.revenue_code.as_deref().unwrap_or("-"));
            println!("Principal:     {}", r.principal_value);
            println!("Total:         {}", r.total_value.as_deref().unwrap_or("-"));
            println!(
                "Due date:      {}",
                r.due_date.map(|d| d.to_string()).unwrap_or_else(|| "-".into())
            );
            println!("Fiscal year:   {}", r.fiscal_year.as_deref().unwrap_or("-"));
            println!("Competência:   {}", r.reference_period.as_deref().unwrap_or("-"));
            println!("Barcode:       {}", r.barcode.as_deref().unwrap_or("-"));
        }
        if let Some(ref s) = result.statement {
            println!("\n{s}");
        }
        return Ok(());
    }

    // ── Run ──────────────────────────────────────────────────────────────
    let output = process_directory(&config)
        .await
        .context("Processing failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    }

    if !cli.quiet {
        let stats = &output.stats;
        eprintln!(
            "{}  {}/{} DARMs  {} skipped  {} failed  {}ms",
            if stats.failed == 0 { green("✔") } else { yellow("⚠") },
            bold(&stats.accepted.to_string()),
            stats.total_documents,
            stats.skipped,
            stats.failed,
            stats.duration_ms,
        );
        if let Some(ref path) = output.batch_file {
            eprintln!(
                "   {} rows  →  {}",
                stats.batch_rows,
                bold(&path.display().to_string())
            );
        }
        if stats.dropped_rows > 0 {
            eprintln!("   {}", yellow(&format!("{} rows left out of the batch", stats.dropped_rows)));
        }
        if let Some(ref path) = output.report_file {
            eprintln!("   report  →  {}", dim(&path.display().to_string()));
        }
        if !show_progress {
            for d in output.documents.iter().filter(|d| d.status() == DocumentStatus::Failed) {
                if let Some(ref e) = d.error {
                    eprintln!("   {} {e}", red("✗"));
                }
            }
        }
    }

    if !output.output_errors.is_empty() {
        bail!(
            "{} output file(s) could not be written:\n{}",
            output.output_errors.len(),
            output.output_errors.join("\n")
        );
    }

    Ok(())
}

/// Apply CLI flags on top of the config file.
fn build_config(
    cli: &Cli,
    file: ConfigFile,
    progress: Option<ProgressCallback>,
) -> Result<ProcessorConfig> {
    let mut builder = file.into_builder();

    if let Some(ref dir) = cli.darms_dir {
        builder = builder.darms_dir(dir);
    }
    if let Some(ref dir) = cli.output_dir {
        builder = builder.output_dir(dir);
    }
    if let Some(n) = cli.concurrency {
        builder = builder.concurrency(n);
    }
    if let Some(order) = cli.order {
        builder = builder.merge_order(order.into());
    }
    if cli.no_use {
        builder = builder.database(None);
    } else if let Some(ref db) = cli.database {
        builder = builder.database(Some(db.clone()));
    }
    if let Some(ref table) = cli.table {
        builder = builder.table(table);
    }
    if let Some(year) = cli.year {
        builder = builder.processing_year(year);
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(lib);
    }
    if cli.text {
        builder = builder.text_source(Arc::new(PlainTextSource));
    }
    if cli.no_individual_files {
        builder = builder.write_individual_files(false);
    }
    if cli.no_check_files {
        builder = builder.write_check_files(false);
    }
    if cli.no_report {
        builder = builder.write_report(false);
    }
    if cli.dry_run {
        builder = builder.dry_run();
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
