use std::path::{Path, PathBuf};

use crate::loader::{SaveAs, UploadedFile, load_document, save_upload};
use crate::session::{SessionId, create_session_dir};

use super::{IndexBuilder, IngestOutcome, IngestionError};

/// Multi-document chat ingestion with per-session upload and index directories.
pub struct DocumentIngestor {
    session_id: SessionId,
    session_temp_dir: PathBuf,
    session_index_dir: PathBuf,
    builder: IndexBuilder,
}

impl DocumentIngestor {
    /// Create `<temp_dir>/<session>` and `<index_dir>/<session>`; a session id is generated
    /// when none is supplied.
    pub fn new(
        temp_dir: &Path,
        index_dir: &Path,
        session_id: Option<SessionId>,
        builder: IndexBuilder,
    ) -> Result<Self, IngestionError> {
        let session_id = session_id.unwrap_or_else(SessionId::generate);
        let session_temp_dir = create_session_dir(temp_dir, &session_id)?;
        let session_index_dir = create_session_dir(index_dir, &session_id)?;
        tracing::info!(
            session_id = %session_id,
            temp_path = %session_temp_dir.display(),
            index_path = %session_index_dir.display(),
            "DocumentIngestor initialized"
        );
        Ok(Self {
            session_id,
            session_temp_dir,
            session_index_dir,
            builder,
        })
    }

    /// Session this ingestor writes into.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Directory holding the session's index.
    pub fn index_dir(&self) -> &Path {
        &self.session_index_dir
    }

    /// Save supported uploads under random names, load them, and build the session index.
    ///
    /// Unsupported files are skipped with a warning; if nothing remains the call fails.
    pub async fn ingest_files(
        &self,
        uploads: &[UploadedFile],
    ) -> Result<IngestOutcome, IngestionError> {
        let mut documents = Vec::new();
        let mut saved = Vec::new();

        for upload in uploads {
            if upload.kind().is_none() {
                tracing::warn!(
                    filename = %upload.name,
                    session_id = %self.session_id,
                    "Unsupported file skipped"
                );
                continue;
            }
            let path = save_upload(&self.session_temp_dir, upload, SaveAs::Randomized)?;
            let loaded = load_document(&path).await.inspect_err(|error| {
                tracing::error!(filename = %upload.name, error = %error, "Error loading file");
            })?;
            documents.extend(loaded);
            saved.push(path);
        }

        if documents.is_empty() {
            tracing::error!(session_id = %self.session_id, "No valid documents loaded");
            return Err(IngestionError::NoValidDocuments);
        }
        tracing::info!(
            total_docs = documents.len(),
            session_id = %self.session_id,
            "Documents loaded successfully"
        );

        self.builder
            .create_retriever(&documents, &self.session_index_dir, saved)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::test_support::builder;
    use crate::index::INDEX_FILE;

    #[tokio::test]
    async fn indexes_text_and_markdown_and_skips_unsupported() {
        let temp = tempfile::tempdir().unwrap();
        let session = SessionId::parse("session_test").unwrap();
        let ingestor = DocumentIngestor::new(
            &temp.path().join("uploads"),
            &temp.path().join("index"),
            Some(session),
            builder(),
        )
        .unwrap();

        let outcome = ingestor
            .ingest_files(&[
                UploadedFile::new("a.txt", b"The warranty lasts two years.".to_vec()),
                UploadedFile::new(
                    "b.md",
                    b"# Returns\nReturns are accepted within 30 days.".to_vec(),
                ),
                UploadedFile::new("c.csv", b"x,y".to_vec()),
            ])
            .await
            .unwrap();

        assert_eq!(outcome.saved_files.len(), 2);
        assert_eq!(outcome.chunk_count, 2);
        assert!(temp.path().join("index/session_test").join(INDEX_FILE).is_file());
        for path in &outcome.saved_files {
            assert!(path.starts_with(temp.path().join("uploads/session_test")));
        }

        let hits = outcome.retriever.retrieve("how long is the warranty").await.unwrap();
        assert_eq!(hits[0].text, "The warranty lasts two years.");
    }

    #[tokio::test]
    async fn only_unsupported_uploads_fail() {
        let temp = tempfile::tempdir().unwrap();
        let ingestor =
            DocumentIngestor::new(&temp.path().join("u"), &temp.path().join("i"), None, builder())
                .unwrap();
        assert!(ingestor.session_id().as_str().starts_with("session_"));
        assert!(matches!(
            ingestor
                .ingest_files(&[UploadedFile::new("x.pptx", b"..".to_vec())])
                .await,
            Err(IngestionError::NoValidDocuments)
        ));
    }

    #[tokio::test]
    async fn blank_documents_have_no_text() {
        let temp = tempfile::tempdir().unwrap();
        let ingestor =
            DocumentIngestor::new(&temp.path().join("u"), &temp.path().join("i"), None, builder())
                .unwrap();
        assert!(matches!(
            ingestor
                .ingest_files(&[UploadedFile::new("empty.txt", b"   \n".to_vec())])
                .await,
            Err(IngestionError::NoText)
        ));
    }
}
