//! Configuration types for a DARM processing run.
//!
//! All run behaviour is controlled through [`ProcessorConfig`], built via its
//! [`ProcessorConfigBuilder`]. The persistent subset of those knobs can also
//! live in a JSON file, modelled by [`ConfigFile`], which the CLI loads first
//! and then overrides with flags.

use crate::error::DarmError;
use crate::pipeline::patterns::ExtractionPatterns;
use crate::pipeline::text::TextSource;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Configuration for one processing run.
///
/// # Example
/// ```rust
/// use darm2sql::{MergeOrder, ProcessorConfig};
///
/// let config = ProcessorConfig::builder()
///     .darms_dir("darms")
///     .output_dir("inserts")
///     .concurrency(4)
///     .merge_order(MergeOrder::Submission)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ProcessorConfig {
    /// Directory scanned for documents. Default: `darms`.
    pub darms_dir: PathBuf,

    /// Directory receiving the generated SQL files and report. Default: `inserts`.
    pub output_dir: PathBuf,

    /// Maximum number of documents extracted at the same time. Default: 4.
    pub concurrency: usize,

    /// Order of records in the consolidated batch. Default: [`MergeOrder::Completion`].
    pub merge_order: MergeOrder,

    /// Database selected with a `use <db>;` prologue. `None` omits it. Default: `silfae`.
    pub database: Option<String>,

    /// Ledger table receiving the rows. Default: `FarrDarmsPagos`.
    pub table: String,

    /// Revenue code used when a document does not print one. Default: `2585`.
    pub default_revenue_code: String,

    /// Year used for `NR_COMPETENCIA` and for a missing fiscal year.
    /// `None` means the current local year.
    pub processing_year: Option<i32>,

    /// Write `INSERT_DARM_PAGO_<guide>.sql` per accepted document. Default: true.
    pub write_individual_files: bool,

    /// Write `CHECK_GUIA_<guide>.sql` per accepted document. Default: true.
    pub write_check_files: bool,

    /// Write the consolidated `INSERT_TODOS_DARMs.sql`. Default: true.
    pub write_batch_file: bool,

    /// Write `RELATORIO_PROCESSAMENTO.md`. Default: true.
    pub write_report: bool,

    /// Explicit pdfium library path. Falls back to `PDFIUM_DYNAMIC_LIB_PATH`,
    /// the executable directory, then the system library.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Pre-constructed text source. Takes precedence over pdfium.
    pub text_source: Option<Arc<dyn TextSource>>,

    /// Custom extraction pattern table. `None` uses the built-in DARM layout.
    pub patterns: Option<Arc<ExtractionPatterns>>,

    /// Receives per-document progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            darms_dir: PathBuf::from("darms"),
            output_dir: PathBuf::from("inserts"),
            concurrency: 4,
            merge_order: MergeOrder::default(),
            database: Some("silfae".to_string()),
            table: "FarrDarmsPagos".to_string(),
            default_revenue_code: "2585".to_string(),
            processing_year: None,
            write_individual_files: true,
            write_check_files: true,
            write_batch_file: true,
            write_report: true,
            pdfium_lib_path: None,
            text_source: None,
            patterns: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ProcessorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorConfig")
            .field("darms_dir", &self.darms_dir)
            .field("output_dir", &self.output_dir)
            .field("concurrency", &self.concurrency)
            .field("merge_order", &self.merge_order)
            .field("database", &self.database)
            .field("table", &self.table)
            .field("default_revenue_code", &self.default_revenue_code)
            .field("processing_year", &self.processing_year)
            .field("write_individual_files", &self.write_individual_files)
            .field("write_check_files", &self.write_check_files)
            .field("write_batch_file", &self.write_batch_file)
            .field("write_report", &self.write_report)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field(
                "text_source",
                &self.text_source.as_ref().map(|s| s.name()),
            )
            .field("patterns", &self.patterns.as_ref().map(|_| "<custom>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn callback>"),
            )
            .finish()
    }
}

impl ProcessorConfig {
    /// Create a new builder for `ProcessorConfig`.
    pub fn builder() -> ProcessorConfigBuilder {
        ProcessorConfigBuilder {
            config: Self::default(),
        }
    }

    /// True when any per-run output file is enabled.
    pub fn writes_anything(&self) -> bool {
        self.write_individual_files
            || self.write_check_files
            || self.write_batch_file
            || self.write_report
    }
}

/// Builder for [`ProcessorConfig`].
pub struct ProcessorConfigBuilder {
    config: ProcessorConfig,
}

impl fmt::Debug for ProcessorConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ProcessorConfigBuilder {
    pub fn darms_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.darms_dir = dir.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    /// Values below 1 are raised to 1.
    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn merge_order(mut self, order: MergeOrder) -> Self {
        self.config.merge_order = order;
        self
    }

    pub fn database(mut self, db: Option<String>) -> Self {
        self.config.database = db;
        self
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.config.table = table.into();
        self
    }

    pub fn default_revenue_code(mut self, code: impl Into<String>) -> Self {
        self.config.default_revenue_code = code.into();
        self
    }

    pub fn processing_year(mut self, year: i32) -> Self {
        self.config.processing_year = Some(year);
        self
    }

    pub fn write_individual_files(mut self, v: bool) -> Self {
        self.config.write_individual_files = v;
        self
    }

    pub fn write_check_files(mut self, v: bool) -> Self {
        self.config.write_check_files = v;
        self
    }

    pub fn write_batch_file(mut self, v: bool) -> Self {
        self.config.write_batch_file = v;
        self
    }

    pub fn write_report(mut self, v: bool) -> Self {
        self.config.write_report = v;
        self
    }

    /// Disable every output file; results stay in memory only.
    pub fn dry_run(self) -> Self {
        self.write_individual_files(false)
            .write_check_files(false)
            .write_batch_file(false)
            .write_report(false)
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn text_source(mut self, source: Arc<dyn TextSource>) -> Self {
        self.config.text_source = Some(source);
        self
    }

    pub fn patterns(mut self, patterns: Arc<ExtractionPatterns>) -> Self {
        self.config.patterns = Some(patterns);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ProcessorConfig, DarmError> {
        let c = &self.config;
        if c.darms_dir.as_os_str().is_empty() {
            return Err(DarmError::InvalidConfig("darms_dir must not be empty".into()));
        }
        if c.output_dir.as_os_str().is_empty() {
            return Err(DarmError::InvalidConfig("output_dir must not be empty".into()));
        }
        if !is_identifier(&c.table) {
            return Err(DarmError::InvalidConfig(format!(
                "table must be a plain SQL identifier, got '{}'",
                c.table
            )));
        }
        if let Some(db) = &c.database {
            if !is_identifier(db) {
                return Err(DarmError::InvalidConfig(format!(
                    "database must be a plain SQL identifier, got '{db}'"
                )));
            }
        }
        if c.default_revenue_code.is_empty()
            || !c.default_revenue_code.chars().all(|ch| ch.is_ascii_digit())
        {
            return Err(DarmError::InvalidConfig(format!(
                "default_revenue_code must be digits, got '{}'",
                c.default_revenue_code
            )));
        }
        Ok(self.config)
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Order in which accepted records enter the consolidated batch.
///
/// SQ_DOC values depend on each record's position, so this choice decides
/// whether two runs over the same directory can agree on positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeOrder {
    /// Records appear as their workers finish. Positions vary between runs.
    #[default]
    Completion,
    /// Records appear in document discovery order (sorted file names).
    Submission,
}

// ── Config file ──────────────────────────────────────────────────────────

/// Persistent configuration stored as JSON.
///
/// Every section has defaults, so a file only needs the keys it changes:
///
/// ```json
/// { "paths": { "darms_dir": "/data/darms" }, "processing": { "concurrency": 8 } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ConfigFile {
    pub paths: PathsSection,
    pub sql: SqlSection,
    pub processing: ProcessingSection,
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsSection {
    pub darms_dir: PathBuf,
    pub output_dir: PathBuf,
    pub pdfium_lib_path: Option<PathBuf>,
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            darms_dir: PathBuf::from("darms"),
            output_dir: PathBuf::from("inserts"),
            pdfium_lib_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlSection {
    pub database: Option<String>,
    pub table: String,
    pub default_revenue_code: String,
    pub write_check_files: bool,
    pub write_batch_file: bool,
}

impl Default for SqlSection {
    fn default() -> Self {
        Self {
            database: Some("silfae".to_string()),
            table: "FarrDarmsPagos".to_string(),
            default_revenue_code: "2585".to_string(),
            write_check_files: true,
            write_batch_file: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingSection {
    pub concurrency: usize,
    pub merge_order: MergeOrder,
    pub write_report: bool,
}

impl Default for ProcessingSection {
    fn default() -> Self {
        Self {
            concurrency: 4,
            merge_order: MergeOrder::default(),
            write_report: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl ConfigFile {
    /// Load a config file.
    ///
    /// `None` yields the defaults. An explicit path that does not exist is an
    /// error rather than a silent fallback.
    pub fn load(path: Option<&Path>) -> Result<Self, DarmError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Err(DarmError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }
        let data = std::fs::read_to_string(path).map_err(|source| DarmError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let file: Self = serde_json::from_str(&data).map_err(|e| DarmError::ConfigParse {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        file.validate()?;
        Ok(file)
    }

    /// Write the config as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), DarmError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| DarmError::Internal(format!("serialise config: {e}")))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| DarmError::OutputWriteFailed {
                path: path.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, json).map_err(|source| DarmError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check values that serde cannot check on its own.
    pub fn validate(&self) -> Result<(), DarmError> {
        if self.paths.darms_dir.as_os_str().is_empty() {
            return Err(DarmError::InvalidConfig("paths.darms_dir must not be empty".into()));
        }
        if self.paths.output_dir.as_os_str().is_empty() {
            return Err(DarmError::InvalidConfig("paths.output_dir must not be empty".into()));
        }
        if self.processing.concurrency == 0 {
            return Err(DarmError::InvalidConfig(
                "processing.concurrency must be ≥ 1".into(),
            ));
        }
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(DarmError::InvalidConfig(format!(
                "logging.level must be one of {LOG_LEVELS:?}, got '{}'",
                self.logging.level
            )));
        }
        Ok(())
    }

    /// Locate the config file used when none is given explicitly.
    ///
    /// `./darm2sql.json` first, then `$HOME/.darm2sql/config.json`. Returns
    /// `None` when neither exists.
    pub fn default_path() -> Option<PathBuf> {
        let local = PathBuf::from("darm2sql.json");
        if local.exists() {
            return Some(local);
        }
        std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".darm2sql").join("config.json"))
            .filter(|p| p.exists())
    }

    /// Seed a [`ProcessorConfigBuilder`] with this file's values.
    pub fn into_builder(self) -> ProcessorConfigBuilder {
        let mut builder = ProcessorConfig::builder()
            .darms_dir(self.paths.darms_dir)
            .output_dir(self.paths.output_dir)
            .concurrency(self.processing.concurrency)
            .merge_order(self.processing.merge_order)
            .write_report(self.processing.write_report)
            .database(self.sql.database)
            .table(self.sql.table)
            .default_revenue_code(self.sql.default_revenue_code)
            .write_check_files(self.sql.write_check_files)
            .write_batch_file(self.sql.write_batch_file);
        if let Some(lib) = self.paths.pdfium_lib_path {
            builder = builder.pdfium_lib_path(lib);
        }
        builder
    }
}
