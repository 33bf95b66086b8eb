use std::path::{Path, PathBuf};

use crate::loader::{DocumentKind, LoaderError, SaveAs, UploadedFile, read_pdf, save_upload};
use crate::session::{SessionId, create_session_dir};

use super::IngestionError;

/// Saves and reads PDFs for document analysis, one directory per session.
pub struct DocumentHandler {
    session_id: SessionId,
    session_path: PathBuf,
}

impl DocumentHandler {
    /// Create `<data_dir>/<session>`; a timestamped session id is generated when none is supplied.
    pub fn new(data_dir: &Path, session_id: Option<SessionId>) -> Result<Self, IngestionError> {
        let session_id = session_id.unwrap_or_else(SessionId::generate);
        let session_path = create_session_dir(data_dir, &session_id)?;
        tracing::info!(
            session_id = %session_id,
            session_path = %session_path.display(),
            "DocumentHandler initialized"
        );
        Ok(Self {
            session_id,
            session_path,
        })
    }

    /// Session this handler writes into.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Directory holding this session's files.
    pub fn session_path(&self) -> &Path {
        &self.session_path
    }

    /// Save a PDF under its original name.
    pub fn save_pdf(&self, upload: &UploadedFile) -> Result<PathBuf, IngestionError> {
        if upload.kind() != Some(DocumentKind::Pdf) {
            tracing::error!(filename = %upload.name, "Invalid file type; only PDFs are accepted");
            return Err(LoaderError::Unsupported(upload.name.clone()).into());
        }
        let path = save_upload(&self.session_path, upload, SaveAs::Original)?;
        tracing::info!(
            file = %path.display(),
            session_id = %self.session_id,
            "PDF saved successfully"
        );
        Ok(path)
    }

    /// Page-marked text of a saved PDF.
    pub async fn read_pdf(&self, path: &Path) -> Result<String, IngestionError> {
        let text = read_pdf(path).await?;
        tracing::info!(
            pdf_path = %path.display(),
            session_id = %self.session_id,
            "PDF read successfully"
        );
        Ok(text)
    }
}
