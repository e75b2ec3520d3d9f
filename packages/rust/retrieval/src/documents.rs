//! Loading the document corpus from disk.

use std::path::{Path, PathBuf};

use explainer_shared::{ExplainerError, Result};
use tracing::{debug, warn};

use crate::cleanup::clean_markdown;

const BOM: &str = "\u{feff}";

/// One source document as read from disk, before cleanup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SourceDocument {
    /// File name relative to the documents directory.
    pub name: String,
    pub raw: String,
    pub markdown: bool,
}

impl SourceDocument {
    /// Text fed to the splitter: Markdown is cleaned, plain text is kept.
    pub fn text(&self) -> String {
        if self.markdown {
            clean_markdown(&self.raw)
        } else {
            self.raw.clone()
        }
    }
}

/// `*.txt` and `*.md` files directly under `dir`, sorted by path. A missing
/// directory is an empty corpus.
pub(crate) fn list_documents(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        debug!(dir = %dir.display(), "documents directory missing");
        return Ok(Vec::new());
    }

    let entries = std::fs::read_dir(dir).map_err(|e| ExplainerError::io(dir, e))?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && supported_extension(p).is_some())
        .collect();
    paths.sort();
    Ok(paths)
}

pub(crate) fn load_documents(dir: &Path) -> Result<Vec<SourceDocument>> {
    list_documents(dir)?
        .iter()
        .map(|p| read_document(p))
        .collect()
}

fn supported_extension(path: &Path) -> Option<bool> {
    match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
        "md" => Some(true),
        "txt" => Some(false),
        _ => None,
    }
}

/// Read a document as UTF-8, dropping a leading BOM. Invalid sequences are
/// replaced rather than failing the whole corpus.
pub(crate) fn read_document(path: &Path) -> Result<SourceDocument> {
    let markdown = supported_extension(path).ok_or_else(|| {
        ExplainerError::validation(format!(
            "unsupported document type: {} (only .txt and .md)",
            path.display()
        ))
    })?;

    let bytes = std::fs::read(path).map_err(|e| ExplainerError::io(path, e))?;
    let raw = match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            warn!(path = %path.display(), "document is not valid UTF-8, decoding lossily");
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    };
    let raw = raw.strip_prefix(BOM).map(str::to_string).unwrap_or(raw);

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    Ok(SourceDocument {
        name,
        raw,
        markdown,
    })
}
