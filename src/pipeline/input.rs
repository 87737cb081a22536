//! Input discovery: list the documents of a run and sanity-check them.
//!
//! Discovery is deterministic: entries are sorted by file name, so the
//! discovery index of a document is stable between runs over the same
//! directory. Only regular files the text source accepts are returned;
//! subdirectories are not descended into.

use super::text::TextSource;
use crate::error::{DarmError, DocumentError};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// List the documents in `dir` that `source` can read, sorted by name.
pub fn discover_documents(dir: &Path, source: &dyn TextSource) -> Result<Vec<PathBuf>, DarmError> {
    if !dir.is_dir() {
        return Err(DarmError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }

    let entries = std::fs::read_dir(dir).map_err(|source| DarmError::DirectoryUnreadable {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| DarmError::DirectoryUnreadable {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if source.accepts(&path) {
            paths.push(path);
        } else {
            debug!("Ignoring {}", path.display());
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    info!(
        "Found {} document(s) in {} for source '{}'",
        paths.len(),
        dir.display(),
        source.name()
    );
    Ok(paths)
}

/// True when the extension is `pdf`, in any case.
pub fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

/// Verify that `path` is readable and starts with `%PDF`.
///
/// Files shorter than four bytes are rejected as well.
pub fn check_pdf_magic(path: &Path) -> Result<(), DocumentError> {
    let mut file = std::fs::File::open(path).map_err(|_| DocumentError::FileNotFound {
        path: path.to_path_buf(),
    })?;

    let mut magic = [0u8; 4];
    let mut read = 0;
    while read < magic.len() {
        match file.read(&mut magic[read..]) {
            Ok(0) => break,
            Ok(n) => read += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(_) => {
                return Err(DocumentError::FileNotFound {
                    path: path.to_path_buf(),
                })
            }
        }
    }

    if &magic != b"%PDF" {
        return Err(DocumentError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        });
    }
    Ok(())
}
