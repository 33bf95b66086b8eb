//! PDF text extraction backed by `pdf-extract`.

use std::path::{Path, PathBuf};

use pdf_extract::{Document as PdfDocument, PlainTextOutput, output_doc_page};

use super::{LoaderError, read_file};

/// Extract the text of every page, in order. Pages without text yield empty strings.
pub(super) async fn load_pages(path: &Path) -> Result<Vec<String>, LoaderError> {
    let bytes = read_file(path).await?;
    let owned: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || extract_pages(&owned, &bytes))
        .await
        .map_err(|error| LoaderError::Join(error.to_string()))?
}

/// Documents protected by an empty user password are decrypted while loading, so an
/// `/Encrypt` entry left in the trailer means a password is required.
fn extract_pages(path: &Path, bytes: &[u8]) -> Result<Vec<String>, LoaderError> {
    let document = PdfDocument::load_mem(bytes).map_err(|error| pdf_error(path, error))?;
    if document.is_encrypted() {
        return Err(LoaderError::Encrypted(display_name(path)));
    }
    document
        .get_pages()
        .into_keys()
        .map(|page_number| {
            let mut text = String::new();
            output_doc_page(&document, &mut PlainTextOutput::new(&mut text), page_number)
                .map_err(|error| pdf_error(path, error))?;
            Ok(text)
        })
        .collect()
}

fn pdf_error(path: &Path, error: impl std::fmt::Display) -> LoaderError {
    LoaderError::Pdf {
        path: path.to_path_buf(),
        message: error.to_string(),
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Read a PDF into a single string with a page marker before each non-empty page.
///
/// Pages are rendered as `"\n--- Page {n} ---\n{text}"` (1-based `n`) and joined with newlines,
/// which is the layout the analysis and comparison prompts expect.
pub async fn read_pdf(path: &Path) -> Result<String, LoaderError> {
    let pages = load_pages(path).await.inspect_err(|error| {
        tracing::error!(path = %path.display(), error = %error, "Failed to read PDF");
    })?;
    let text = format_pages(&pages);
    tracing::info!(
        file = %path.display(),
        pages = pages.iter().filter(|page| !page.trim().is_empty()).count(),
        "PDF read successfully"
    );
    Ok(text)
}

pub(super) fn format_pages(pages: &[String]) -> String {
    pages
        .iter()
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(index, text)| format!("\n--- Page {} ---\n{text}", index + 1))
        .collect::<Vec<_>>()
        .join("\n")
}
