//! Document text extraction.
//!
//! The retrieval core only needs "extracted plain text plus a page count"
//! from a source path; how that text is produced is behind the
//! `DocumentSource` trait so tests can substitute a fixed source.

use docchat_core::{AppError, AppResult};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File extensions the default source can extract.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "txt", "md"];

/// Text extracted from a document.
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    /// Full plain text of the document
    pub text: String,

    /// Number of pages in the source (1 for plain-text files)
    pub page_count: usize,
}

/// Trait for document sources.
pub trait DocumentSource: Send + Sync {
    /// Extract plain text from the document at `path`.
    ///
    /// A missing or unreadable file surfaces as `AppError::Load`.
    fn extract(&self, path: &Path) -> AppResult<ExtractedDocument>;
}

/// Default source: local files, dispatched by extension.
///
/// PDFs go through the `pdftotext` system binary (poppler); text and
/// markdown files are read directly.
#[derive(Debug, Default)]
pub struct FileSource;

impl FileSource {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentSource for FileSource {
    fn extract(&self, path: &Path) -> AppResult<ExtractedDocument> {
        if !path.exists() {
            return Err(AppError::Load(format!(
                "Document not found: {}",
                path.display()
            )));
        }

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "pdf" => extract_pdf(path),
            "txt" | "md" => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    AppError::Load(format!("Failed to read {}: {}", path.display(), e))
                })?;
                Ok(ExtractedDocument {
                    text,
                    page_count: 1,
                })
            }
            other => Err(AppError::Load(format!(
                "Unsupported document format '{}': {}",
                other,
                path.display()
            ))),
        }
    }
}

/// Extract PDF text with the `pdftotext` binary.
///
/// `pdftotext` separates pages with form feeds, which gives us the page
/// count for free.
fn extract_pdf(path: &Path) -> AppResult<ExtractedDocument> {
    use std::process::Command;

    tracing::info!("Extracting PDF text from {}", path.display());

    let output = Command::new("pdftotext")
        .arg("-layout")
        .arg("-enc")
        .arg("UTF-8")
        .arg(path)
        .arg("-")
        .output()
        .map_err(|e| {
            AppError::Load(format!(
                "Failed to run pdftotext: {} (is poppler installed?)",
                e
            ))
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AppError::Load(format!(
            "pdftotext failed for {}: {}",
            path.display(),
            stderr.trim()
        )));
    }

    let text = String::from_utf8_lossy(&output.stdout).to_string();
    if text.trim().is_empty() {
        return Err(AppError::Load(format!(
            "No text extracted from {}",
            path.display()
        )));
    }

    let page_count = text
        .split('\u{c}')
        .filter(|page| !page.trim().is_empty())
        .count()
        .max(1);

    tracing::info!(
        "Extracted {} pages ({} chars) from {}",
        page_count,
        text.chars().count(),
        path.display()
    );

    Ok(ExtractedDocument { text, page_count })
}

/// Fixed in-memory source for tests.
#[derive(Debug, Clone)]
pub struct StaticSource {
    text: String,
    page_count: usize,
}

impl StaticSource {
    pub fn new(text: impl Into<String>, page_count: usize) -> Self {
        Self {
            text: text.into(),
            page_count,
        }
    }
}

impl DocumentSource for StaticSource {
    fn extract(&self, _path: &Path) -> AppResult<ExtractedDocument> {
        Ok(ExtractedDocument {
            text: self.text.clone(),
            page_count: self.page_count,
        })
    }
}

/// Find all supported documents under a directory, sorted for determinism.
pub fn discover_documents(dir: &Path) -> AppResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(AppError::Load(format!(
            "Not a directory: {}",
            dir.display()
        )));
    }

    let mut documents = Vec::new();
    for entry in WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
            documents.push(path.to_path_buf());
        }
    }

    documents.sort();
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_load_error() {
        let source = FileSource::new();
        let err = source.extract(Path::new("/no/such/file.pdf")).unwrap_err();
        assert!(matches!(err, AppError::Load(_)));
    }

    #[test]
    fn test_unsupported_extension_is_load_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("archive.zip");
        std::fs::write(&path, b"zip bytes").unwrap();

        let source = FileSource::new();
        let err = source.extract(&path).unwrap_err();
        assert!(matches!(err, AppError::Load(_)));
    }

    #[test]
    fn test_text_file_extraction() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello from a text file").unwrap();

        let source = FileSource::new();
        let doc = source.extract(&path).unwrap();
        assert_eq!(doc.text, "hello from a text file");
        assert_eq!(doc.page_count, 1);
    }

    #[test]
    fn test_static_source() {
        let source = StaticSource::new("fixed text", 3);
        let doc = source.extract(Path::new("ignored.pdf")).unwrap();
        assert_eq!(doc.text, "fixed text");
        assert_eq!(doc.page_count, 3);
    }

    #[test]
    fn test_discover_documents() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        std::fs::write(dir.path().join("a.md"), "a").unwrap();
        std::fs::write(dir.path().join("ignored.bin"), "x").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub").join("c.pdf"), "not a real pdf").unwrap();

        let documents = discover_documents(dir.path()).unwrap();
        let names: Vec<String> = documents
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();

        assert_eq!(names, vec!["a.md", "b.txt", "c.pdf"]);
    }

    #[test]
    fn test_discover_on_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("single.txt");
        std::fs::write(&path, "x").unwrap();

        assert!(discover_documents(&path).is_err());
    }
}
