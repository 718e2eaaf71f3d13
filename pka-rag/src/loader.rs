//! Corpus loading: recursive directory scan and per-file text extraction.
//!
//! Plain-text and markdown files are read as UTF-8 (a leading byte-order
//! mark is tolerated); PDFs go through `pdf-extract`. A file that fails to
//! parse or yields only whitespace is skipped with a warning so one bad
//! file cannot abort ingestion. An entirely empty corpus is fatal.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::document::Document;
use crate::error::{RagError, Result};

/// File extensions loaded by default (lowercase, without the dot).
pub const DEFAULT_EXTENSIONS: [&str; 3] = ["txt", "md", "pdf"];

/// Recursively load all supported documents under `directory`.
///
/// `extensions` filters by lowercase extension without the dot; pass
/// [`DEFAULT_EXTENSIONS`] for the standard set.
///
/// # Errors
///
/// Returns [`RagError::Loader`] if `directory` does not exist or is not a
/// directory, and [`RagError::EmptyCorpus`] if no file produced usable text.
pub fn load_documents(directory: &Path, extensions: &[&str]) -> Result<Vec<Document>> {
    if !directory.is_dir() {
        return Err(RagError::Loader(format!(
            "corpus directory does not exist: {}",
            directory.display()
        )));
    }

    let mut documents = Vec::new();

    for entry in WalkDir::new(directory).into_iter() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let Some(ext) = file_extension(path) else { continue };
        if !extensions.contains(&ext.as_str()) {
            continue;
        }

        match load_single_document(path) {
            Ok(doc) if doc.text.trim().is_empty() => {
                warn!(path = %path.display(), "skipping empty file");
            }
            Ok(doc) => {
                debug!(path = %path.display(), bytes = doc.text.len(), "loaded document");
                documents.push(doc);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping file");
            }
        }
    }

    if documents.is_empty() {
        return Err(RagError::EmptyCorpus { directory: directory.display().to_string() });
    }

    info!(count = documents.len(), directory = %directory.display(), "loaded corpus");
    Ok(documents)
}

/// Load one file as a [`Document`].
///
/// # Errors
///
/// Returns [`RagError::Loader`] for unsupported extensions, unreadable
/// files, and PDF extraction failures.
pub fn load_single_document(path: &Path) -> Result<Document> {
    let ext = file_extension(path)
        .ok_or_else(|| RagError::Loader(format!("file has no extension: {}", path.display())))?;

    let text = match ext.as_str() {
        "pdf" => load_pdf_file(path)?,
        "txt" | "md" => load_text_file(path)?,
        other => {
            return Err(RagError::Loader(format!("unsupported file type: .{other}")));
        }
    };

    let size = fs::metadata(path)
        .map_err(|e| RagError::Loader(format!("failed to stat {}: {e}", path.display())))?
        .len();
    let source = path
        .canonicalize()
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string();
    let filename =
        path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();

    let mut metadata = HashMap::new();
    metadata.insert("source".to_string(), source.clone());
    metadata.insert("filename".to_string(), filename);
    metadata.insert("extension".to_string(), ext);
    metadata.insert("size".to_string(), size.to_string());

    Ok(Document { id: source, text, metadata })
}

/// Lowercase extension without the dot, if any.
fn file_extension(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_lowercase())
}

/// Read a UTF-8 text file, stripping a leading byte-order mark if present.
fn load_text_file(path: &Path) -> Result<String> {
    let text = fs::read_to_string(path)
        .map_err(|e| RagError::Loader(format!("failed to read {}: {e}", path.display())))?;
    Ok(text.strip_prefix('\u{feff}').map(str::to_string).unwrap_or(text))
}

/// Extract all text from a PDF. Pages without extractable text contribute
/// nothing rather than failing the file.
fn load_pdf_file(path: &Path) -> Result<String> {
    let bytes = fs::read(path)
        .map_err(|e| RagError::Loader(format!("failed to read {}: {e}", path.display())))?;
    pdf_extract::extract_text_from_mem(&bytes)
        .map_err(|e| RagError::Loader(format!("PDF extraction failed for {}: {e}", path.display())))
}
