use std::path::{Path, PathBuf};

use crate::loader::{DocumentKind, LoaderError, SaveAs, UploadedFile, read_pdf, save_upload};
use crate::session::{SessionId, clean_old_sessions, create_session_dir};

use super::IngestionError;

/// Stores a reference/actual PDF pair for comparison and renders them as one text.
pub struct ComparisonIngestor {
    base_dir: PathBuf,
    session_id: SessionId,
    session_path: PathBuf,
}

impl ComparisonIngestor {
    /// Create `<base_dir>/<session>`; a UUID session id is generated when none is supplied.
    pub fn new(base_dir: &Path, session_id: Option<SessionId>) -> Result<Self, IngestionError> {
        let session_id = session_id.unwrap_or_else(SessionId::generate_uuid);
        let session_path = create_session_dir(base_dir, &session_id)?;
        tracing::info!(
            session_id = %session_id,
            path = %session_path.display(),
            "ComparisonIngestor initialized"
        );
        Ok(Self {
            base_dir: base_dir.to_path_buf(),
            session_id,
            session_path,
        })
    }

    /// Session this comparison belongs to.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Directory holding this session's PDFs.
    pub fn session_path(&self) -> &Path {
        &self.session_path
    }

    /// Save both uploads under their original names. Only PDFs are accepted.
    pub fn save_uploaded_files(
        &self,
        reference: &UploadedFile,
        actual: &UploadedFile,
    ) -> Result<(PathBuf, PathBuf), IngestionError> {
        for upload in [reference, actual] {
            if upload.kind() != Some(DocumentKind::Pdf) {
                tracing::error!(
                    filename = %upload.name,
                    session_id = %self.session_id,
                    "Only PDF files are allowed"
                );
                return Err(LoaderError::Unsupported(upload.name.clone()).into());
            }
        }
        let reference_path = save_upload(&self.session_path, reference, SaveAs::Original)?;
        let actual_path = save_upload(&self.session_path, actual, SaveAs::Original)?;
        tracing::info!(
            reference = %reference_path.display(),
            actual = %actual_path.display(),
            session_id = %self.session_id,
            "Files saved"
        );
        Ok((reference_path, actual_path))
    }

    /// Page-marked text of one PDF.
    pub async fn read_pdf(&self, path: &Path) -> Result<String, IngestionError> {
        let text = read_pdf(path).await?;
        tracing::info!(file = %path.display(), "PDF read successfully");
        Ok(text)
    }

    /// Every PDF in the session, sorted by file name, rendered as `Document: <name>\n<text>`
    /// and joined with blank lines.
    pub async fn combine_documents(&self) -> Result<String, IngestionError> {
        let mut pdfs = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.session_path)
            .await
            .map_err(|source| self.io_error(source))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|source| self.io_error(source))?
        {
            let path = entry.path();
            if path.is_file() && DocumentKind::from_path(&path) == Some(DocumentKind::Pdf) {
                pdfs.push(path);
            }
        }
        pdfs.sort();

        let mut sections = Vec::with_capacity(pdfs.len());
        for path in &pdfs {
            let content = read_pdf(path).await?;
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            sections.push(format!("Document: {name}\n{content}"));
        }
        tracing::info!(count = sections.len(), session_id = %self.session_id, "Documents combined");
        Ok(sections.join("\n\n"))
    }

    /// Delete all but the newest `keep_latest` comparison sessions under the base directory.
    pub fn clean_old_sessions(&self, keep_latest: usize) -> Result<Vec<PathBuf>, IngestionError> {
        Ok(clean_old_sessions(&self.base_dir, keep_latest)?)
    }

    fn io_error(&self, source: std::io::Error) -> IngestionError {
        LoaderError::Io {
            path: self.session_path.clone(),
            source,
        }
        .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_non_pdf_pair() {
        let temp = tempfile::tempdir().unwrap();
        let ingestor = ComparisonIngestor::new(temp.path(), None).unwrap();
        let error = ingestor
            .save_uploaded_files(
                &UploadedFile::new("a.pdf", b"%PDF".to_vec()),
                &UploadedFile::new("b.docx", b"PK".to_vec()),
            )
            .unwrap_err();
        assert!(matches!(
            error,
            IngestionError::Loader(LoaderError::Unsupported(name)) if name == "b.docx"
        ));
        assert_eq!(std::fs::read_dir(ingestor.session_path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn saves_pair_under_original_names() {
        let temp = tempfile::tempdir().unwrap();
        let ingestor =
            ComparisonIngestor::new(temp.path(), Some(SessionId::parse("cmp").unwrap())).unwrap();
        let (reference, actual) = ingestor
            .save_uploaded_files(
                &UploadedFile::new("v1.pdf", b"%PDF-1".to_vec()),
                &UploadedFile::new("dir/v2.pdf", b"%PDF-2".to_vec()),
            )
            .unwrap();
        assert_eq!(reference, temp.path().join("cmp/v1.pdf"));
        assert_eq!(actual, temp.path().join("cmp/v2.pdf"));
    }

    #[tokio::test]
    async fn combine_of_empty_session_is_empty() {
        let temp = tempfile::tempdir().unwrap();
        let ingestor = ComparisonIngestor::new(temp.path(), None).unwrap();
        std::fs::write(ingestor.session_path().join("notes.txt"), "ignored").unwrap();
        assert_eq!(ingestor.combine_documents().await.unwrap(), "");
    }

    #[tokio::test]
    async fn keeps_only_latest_sessions() {
        let temp = tempfile::tempdir().unwrap();
        for name in ["session_20240101", "session_20240102", "session_20240103"] {
            std::fs::create_dir(temp.path().join(name)).unwrap();
        }
        let session = SessionId::parse("session_20240104").unwrap();
        let ingestor = ComparisonIngestor::new(temp.path(), Some(session)).unwrap();
        let removed = ingestor.clean_old_sessions(2).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(temp.path().join("session_20240104").is_dir());
        assert!(temp.path().join("session_20240103").is_dir());
        assert!(!temp.path().join("session_20240101").exists());
    }
}
