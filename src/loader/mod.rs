//! Document loading: saving uploads and extracting text from PDF, DOCX, TXT and Markdown.

mod docx;
mod pdf;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::short_hex;

pub use pdf::read_pdf;

/// Errors raised while saving or parsing documents.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// File extension is not one of the supported document kinds.
    #[error("unsupported file type: {0}")]
    Unsupported(String),
    /// Reading or writing the file failed.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// File being read or written.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// PDF is password protected.
    #[error("PDF is encrypted: {0}")]
    Encrypted(String),
    /// PDF parser rejected the file.
    #[error("failed to parse PDF {path}: {message}")]
    Pdf {
        /// File being parsed.
        path: PathBuf,
        /// Parser diagnostic.
        message: String,
    },
    /// DOCX archive or XML body could not be read.
    #[error("failed to parse DOCX {path}: {message}")]
    Docx {
        /// File being parsed.
        path: PathBuf,
        /// Parser diagnostic.
        message: String,
    },
    /// Text file was not valid UTF-8.
    #[error("file is not valid UTF-8: {0}")]
    Encoding(PathBuf),
    /// Blocking extraction task panicked or was cancelled.
    #[error("extraction task failed: {0}")]
    Join(String),
}

/// Supported document kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// Portable Document Format.
    Pdf,
    /// Office Open XML word processing document.
    Docx,
    /// Plain UTF-8 text.
    Text,
    /// Markdown, loaded as plain text.
    Markdown,
}

impl DocumentKind {
    /// Classify a file by its extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "txt" => Some(Self::Text),
            "md" => Some(Self::Markdown),
            _ => None,
        }
    }

    /// Canonical extension including the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Pdf => ".pdf",
            Self::Docx => ".docx",
            Self::Text => ".txt",
            Self::Markdown => ".md",
        }
    }
}

/// Where a piece of text came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMetadata {
    /// Path of the file the text was extracted from.
    pub source: String,
    /// Zero-based page index for paged formats.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
}

/// Extracted text with its provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Extracted text.
    pub page_content: String,
    /// Provenance of the text.
    pub metadata: SourceMetadata,
}

/// File received from a client.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Client-supplied file name.
    pub name: String,
    /// Raw file contents.
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    /// Build an upload from a name and contents.
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Read an upload from a local file, keeping its file name.
    pub fn from_path(path: &Path) -> Result<Self, LoaderError> {
        let bytes = std::fs::read(path).map_err(|source| LoaderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            name: file_name(&path.to_string_lossy()),
            bytes,
        })
    }

    /// Kind implied by the file name, if supported.
    pub fn kind(&self) -> Option<DocumentKind> {
        DocumentKind::from_path(Path::new(&self.name))
    }
}

/// How an upload is named on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveAs {
    /// Keep the client file name (reduced to its last path component).
    Original,
    /// Write `<8 hex>` followed by the upload's extension.
    Randomized,
    /// Use an explicit file name.
    Named(String),
}

/// Reduce a client-supplied name to its final path component.
pub(crate) fn file_name(raw: &str) -> String {
    raw.rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Write an upload into `dir` and return the saved path.
pub fn save_upload(
    dir: &Path,
    upload: &UploadedFile,
    save_as: SaveAs,
) -> Result<PathBuf, LoaderError> {
    let name = match save_as {
        SaveAs::Original => file_name(&upload.name),
        SaveAs::Randomized => {
            let ext = upload.kind().map(DocumentKind::extension).unwrap_or_default();
            format!("{}{ext}", short_hex())
        }
        SaveAs::Named(name) => file_name(&name),
    };
    if name.is_empty() || name == "." || name == ".." {
        return Err(LoaderError::Unsupported(upload.name.clone()));
    }

    let path = dir.join(&name);
    std::fs::write(&path, &upload.bytes).map_err(|source| LoaderError::Io {
        path: path.clone(),
        source,
    })?;
    tracing::info!(filename = %upload.name, saved_as = %path.display(), "File saved");
    Ok(path)
}

/// Load a saved file into one or more documents according to its kind.
///
/// PDFs yield one document per page; other kinds yield a single document.
pub async fn load_document(path: &Path) -> Result<Vec<Document>, LoaderError> {
    let kind = DocumentKind::from_path(path)
        .ok_or_else(|| LoaderError::Unsupported(path.display().to_string()))?;
    load_document_as(path, kind).await
}

/// Load a saved file treating it as `kind` regardless of its extension.
pub async fn load_document_as(
    path: &Path,
    kind: DocumentKind,
) -> Result<Vec<Document>, LoaderError> {
    let source = path.display().to_string();
    let documents = match kind {
        DocumentKind::Pdf => pdf::load_pages(path)
            .await?
            .into_iter()
            .enumerate()
            .map(|(page, text)| Document {
                page_content: text,
                metadata: SourceMetadata {
                    source: source.clone(),
                    page: Some(page),
                },
            })
            .collect(),
        DocumentKind::Docx => vec![Document {
            page_content: docx::extract_text(path).await?,
            metadata: SourceMetadata { source, page: None },
        }],
        DocumentKind::Text | DocumentKind::Markdown => {
            let bytes = read_file(path).await?;
            let text =
                String::from_utf8(bytes).map_err(|_| LoaderError::Encoding(path.to_path_buf()))?;
            vec![Document {
                page_content: text,
                metadata: SourceMetadata { source, page: None },
            }]
        }
    };
    tracing::debug!(path = %path.display(), ?kind, documents = documents.len(), "Document loaded");
    Ok(documents)
}

pub(crate) async fn read_file(path: &Path) -> Result<Vec<u8>, LoaderError> {
    tokio::fs::read(path).await.map_err(|source| LoaderError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pdf_loads_one_document_per_page() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("policy.pdf");
        std::fs::write(&path, include_bytes!("../../tests/fixtures/two_pages.pdf")).unwrap();

        let documents = load_document(&path).await.unwrap();
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].metadata.page, Some(0));
        assert_eq!(documents[1].metadata.page, Some(1));
        assert_eq!(documents[0].metadata.source, path.display().to_string());
        assert!(documents[0].page_content.contains("Refunds are issued"));
        assert!(documents[1].page_content.contains("Orders ship"));
    }

    #[test]
    fn kind_detection_is_case_insensitive() {
        assert_eq!(DocumentKind::from_path(Path::new("a/B.PDF")), Some(DocumentKind::Pdf));
        assert_eq!(DocumentKind::from_path(Path::new("notes.Md")), Some(DocumentKind::Markdown));
        assert_eq!(DocumentKind::from_path(Path::new("x.docx")), Some(DocumentKind::Docx));
        assert_eq!(DocumentKind::from_path(Path::new("x.csv")), None);
        assert_eq!(DocumentKind::from_path(Path::new("README")), None);
    }

    #[test]
    fn save_upload_strips_directories_from_names() {
        let temp = tempfile::tempdir().unwrap();
        let upload = UploadedFile::new("../../etc/report.txt", b"hello".to_vec());
        let path = save_upload(temp.path(), &upload, SaveAs::Original).unwrap();
        assert_eq!(path, temp.path().join("report.txt"));
        assert_eq!(std::fs::read(path).unwrap(), b"hello");
    }

    #[test]
    fn randomized_names_keep_extension() {
        let temp = tempfile::tempdir().unwrap();
        let upload = UploadedFile::new("Report.PDF", b"%PDF".to_vec());
        let path = save_upload(temp.path(), &upload, SaveAs::Randomized).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert_eq!(name.len(), 12);
        assert!(name.ends_with(".pdf"));
    }

    #[tokio::test]
    async fn text_files_load_as_single_document() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("notes.md");
        std::fs::write(&path, "# Title\n\nBody").unwrap();

        let docs = load_document(&path).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].page_content, "# Title\n\nBody");
        assert_eq!(docs[0].metadata.page, None);
    }

    #[tokio::test]
    async fn invalid_utf8_is_rejected() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("bad.txt");
        std::fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();

        let error = load_document(&path).await.unwrap_err();
        assert!(matches!(error, LoaderError::Encoding(_)));
    }

    #[tokio::test]
    async fn unsupported_extension_is_rejected() {
        let error = load_document(Path::new("table.xlsx")).await.unwrap_err();
        assert!(matches!(error, LoaderError::Unsupported(_)));
    }
}
