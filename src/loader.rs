//! Document ingestion: file discovery and text extraction.
//!
//! This module is the boundary between raw file formats and the rest of the
//! pipeline. Everything downstream consumes the normalized
//! [`PageRecord`] stream — `(text, source path, page)` — and never touches
//! PDFs or encodings directly.

use std::{
    path::{Path, PathBuf},
    process::Command,
};

use crate::{
    chunking::{ChunkingConfig, chunk_text},
    error::{Error, Result},
    passage::Passage,
};

/// A page (or whole file) of extracted text, tagged with provenance.
#[derive(Debug, Clone)]
pub struct PageRecord {
    pub text: String,
    /// Source path as discovered, relative to the ingestion root.
    pub source: String,
    /// One-based page number for paged formats, `None` otherwise.
    pub page: Option<u32>,
}

/// Supported file extensions for document discovery.
const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "md", "txt"];

/// A discovered document file.
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    /// Path relative to the ingestion root directory.
    pub relative_path: PathBuf,
    /// Fully resolved absolute path.
    pub absolute_path: PathBuf,
}

/// Recursively walk a directory and discover eligible document files.
///
/// Skips hidden files/directories (names starting with `.`) and only
/// returns files with supported extensions. Results are sorted by relative
/// path so ingestion order is deterministic.
pub fn discover_files(root: &Path) -> Result<Vec<DiscoveredFile>> {
    let canonical_root = root.canonicalize()?;
    let mut results = Vec::new();
    walk_dir(&canonical_root, &canonical_root, &mut results)?;
    results.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(results)
}

fn walk_dir(
    root: &Path,
    current: &Path,
    results: &mut Vec<DiscoveredFile>,
) -> Result<()> {
    let entries = std::fs::read_dir(current)?;

    for entry in entries {
        let entry = entry?;
        let file_name = entry.file_name();
        let name = file_name.to_string_lossy();

        // Skip hidden files and directories.
        if name.starts_with('.') {
            continue;
        }

        let file_type = entry.file_type()?;

        let path = entry.path();
        if file_type.is_dir() {
            walk_dir(root, &path, results)?;
        } else if file_type.is_file() && is_supported(&path) {
            let absolute_path = path.canonicalize()?;
            let relative_path =
                path.strip_prefix(root).unwrap_or(&path).to_path_buf();
            results.push(DiscoveredFile {
                relative_path,
                absolute_path,
            });
        }
    }

    Ok(())
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str())
        })
}

/// Extract text from a discovered file as one record per page.
///
/// PDFs go through the external `pdftotext` binary (pages are split on the
/// form-feed separator it emits); plain text and markdown are read whole
/// with no page number.
pub fn extract_pages(file: &DiscoveredFile) -> Result<Vec<PageRecord>> {
    let source = file.relative_path.to_string_lossy().to_string();
    let ext = file
        .absolute_path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    if ext == "pdf" {
        let text = pdf_to_text(&file.absolute_path)?;
        let mut records = Vec::new();
        for (page_idx, page_text) in text.split('\u{c}').enumerate() {
            if page_text.trim().is_empty() {
                continue;
            }
            records.push(PageRecord {
                text: page_text.to_string(),
                source: source.clone(),
                page: Some(page_idx as u32 + 1),
            });
        }
        Ok(records)
    } else {
        let text = std::fs::read_to_string(&file.absolute_path)?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![PageRecord {
            text,
            source,
            page: None,
        }])
    }
}

/// Run `pdftotext` on a file and return the layout-preserving text.
fn pdf_to_text(path: &Path) -> Result<String> {
    let output = Command::new("pdftotext")
        .arg("-layout")
        .arg("-enc")
        .arg("UTF-8")
        .arg(path)
        .arg("-")
        .output()
        .map_err(|e| {
            Error::Config(format!(
                "pdftotext command failed: {e} (is poppler installed?)"
            ))
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Config(format!(
            "pdftotext failed for {}: {stderr}",
            path.display()
        )));
    }

    let text = String::from_utf8_lossy(&output.stdout).to_string();
    if text.trim().is_empty() {
        tracing::warn!("pdftotext produced no text for {}", path.display());
    }
    Ok(text)
}

/// Extract records from every discovered file, skipping files that fail
/// extraction with a warning rather than aborting the whole ingestion.
pub fn load_directory(root: &Path) -> Result<Vec<PageRecord>> {
    let files = discover_files(root)?;
    let mut records = Vec::new();
    for file in &files {
        match extract_pages(file) {
            Ok(pages) => records.extend(pages),
            Err(e) => {
                tracing::warn!(
                    "skipping {}: {e}",
                    file.relative_path.display()
                );
            }
        }
    }
    Ok(records)
}

/// Split extracted records into passages.
///
/// Each record is chunked independently; a passage's identity is derived
/// from its source, page, and chunk index, so re-ingesting identical
/// content yields identical ids.
pub fn passages_from_records(
    records: &[PageRecord],
    config: &ChunkingConfig,
) -> Vec<Passage> {
    let mut passages = Vec::new();
    for record in records {
        for chunk in chunk_text(&record.text, config.chunk_size, config.overlap)
        {
            passages.push(Passage::new(
                chunk.text,
                record.source.clone(),
                record.page,
                chunk.index,
            ));
        }
    }
    passages
}
