use std::path::{Path, PathBuf};

use crate::loader::{
    DocumentKind, LoaderError, SaveAs, UploadedFile, load_document_as, save_upload,
};
use crate::session::{SessionId, ensure_dir};

use super::{IndexBuilder, IngestOutcome, IngestionError};

/// Single-document chat ingestion: PDFs in, one shared index out.
///
/// Each upload is stored as `<data_dir>/session_<timestamp>_<hex>`; the index is written
/// directly into `index_dir`, replacing the previous one.
pub struct SingleDocIngestor {
    data_dir: PathBuf,
    index_dir: PathBuf,
    builder: IndexBuilder,
}

impl SingleDocIngestor {
    /// Create the data and index directories.
    pub fn new(
        data_dir: &Path,
        index_dir: &Path,
        builder: IndexBuilder,
    ) -> Result<Self, IngestionError> {
        ensure_dir(data_dir)?;
        ensure_dir(index_dir)?;
        tracing::info!(
            temp_path = %data_dir.display(),
            index_dir = %index_dir.display(),
            "SingleDocIngestor initialized"
        );
        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            index_dir: index_dir.to_path_buf(),
            builder,
        })
    }

    /// Save, load, split, embed and index the uploads.
    pub async fn ingest_files(
        &self,
        uploads: &[UploadedFile],
    ) -> Result<IngestOutcome, IngestionError> {
        let mut documents = Vec::new();
        let mut saved = Vec::new();

        for upload in uploads {
            if upload.kind() != Some(DocumentKind::Pdf) {
                tracing::error!(
                    filename = %upload.name,
                    "Only PDF files are supported for single-document chat"
                );
                return Err(LoaderError::Unsupported(upload.name.clone()).into());
            }
            let stored_name = SessionId::generate().to_string();
            let path = save_upload(&self.data_dir, upload, SaveAs::Named(stored_name))?;
            tracing::info!(filename = %upload.name, "PDF saved for ingestion");
            documents.extend(load_document_as(&path, DocumentKind::Pdf).await?);
            saved.push(path);
        }

        if documents.is_empty() {
            return Err(IngestionError::NoValidDocuments);
        }
        tracing::info!(count = documents.len(), "PDF files loaded successfully");

        self.builder
            .create_retriever(&documents, &self.index_dir, saved)
            .await
            .inspect_err(|error| tracing::error!(error = %error, "Error ingesting files"))
    }
}
