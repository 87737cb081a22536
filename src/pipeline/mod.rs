//! Pipeline stages for DARM-to-SQL processing.
//!
//! Each submodule implements one transformation step and can be tested on
//! its own. Only [`input`] and [`text`] touch the file system.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ text ──▶ extract ──▶ sql ──▶ batch
//! (files)  (pdfium)  (record)   (row)   (multi-row INSERT)
//! ```
//!
//! 1. [`input`]    discover documents, validate PDF magic bytes
//! 2. [`text`]     [`text::TextSource`] implementations (pdfium, plain text)
//! 3. [`extract`]  apply the [`patterns`] cascades; normalise with
//!    [`money`], [`date`], and classify with [`checksum`]
//! 4. [`sql`]      render the 33-column statement and the check query
//! 5. [`batch`]    consolidate accepted statements and assign `SQ_DOC`

pub mod batch;
pub mod checksum;
pub mod date;
pub mod extract;
pub mod input;
pub mod money;
pub mod patterns;
pub mod sql;
pub mod text;
