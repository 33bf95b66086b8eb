//! Portal service coordinating the analysis, comparison and chat pipelines.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::analysis::{DocumentAnalyzer, DocumentComparator, DocumentMetadata, PageChange};
use crate::config::Config;
use crate::embedding::{SharedEmbeddingClient, get_embedding_client};
use crate::error::DocumentError;
use crate::index::ScoredChunk;
use crate::ingestion::{
    ComparisonIngestor, DocumentHandler, DocumentIngestor, IndexBuilder, IngestOutcome,
    SingleDocIngestor,
};
use crate::llm::{ChatMessage, SharedChatModel, get_chat_model};
use crate::loader::UploadedFile;
use crate::metrics::{MetricsSnapshot, PortalMetrics};
use crate::retrieval::{ChatHistoryStore, ConversationalRag};
use crate::session::SessionId;

/// History key for the shared single-document index.
pub const SINGLE_DOCUMENT_SESSION: &str = "single_document_chat";

/// Files to index for chat.
#[derive(Debug, Clone)]
pub struct ChatIndexRequest {
    /// Uploaded documents.
    pub files: Vec<UploadedFile>,
    /// Session to write into; generated when absent. Ignored without session directories.
    pub session_id: Option<String>,
    /// Index into a per-session directory (multi-document chat) rather than the shared
    /// single-document index.
    pub use_session_dirs: bool,
}

/// Result of indexing files for chat.
#[derive(Debug, Clone, Serialize)]
pub struct ChatIndexOutcome {
    /// Session the index belongs to; `None` for the shared single-document index.
    pub session_id: Option<String>,
    /// Number of files indexed.
    pub indexed_files: usize,
    /// Number of chunks written.
    pub chunks: usize,
    /// Chunks dropped as duplicates.
    pub skipped_duplicates: usize,
}

/// A chat question.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatQuery {
    /// Question text.
    pub question: String,
    /// Session whose index answers the question; the shared index when absent.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Caller-owned history. When absent the server keeps the transcript per session.
    #[serde(default)]
    pub history: Option<Vec<ChatMessage>>,
}

/// Provenance of one retrieved chunk.
#[derive(Debug, Clone, Serialize)]
pub struct SourceRef {
    /// Saved file the chunk came from.
    pub source: String,
    /// Page number for PDFs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
    /// Similarity score.
    pub score: f32,
}

impl From<&ScoredChunk> for SourceRef {
    fn from(chunk: &ScoredChunk) -> Self {
        Self {
            source: chunk.metadata.source.clone(),
            page: chunk.metadata.page,
            score: chunk.score,
        }
    }
}

/// Answer to a chat question.
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    /// Model answer.
    pub answer: String,
    /// Chunks the answer was grounded on.
    pub sources: Vec<SourceRef>,
}

/// Page-wise comparison result.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    /// Comparison session holding the uploaded pair.
    pub session_id: String,
    /// One row per page.
    pub rows: Vec<PageChange>,
}

/// Abstraction over the portal pipelines used by external surfaces (HTTP, CLI).
#[async_trait]
pub trait PortalApi: Send + Sync {
    /// Save a PDF, extract its text and analyze it.
    async fn analyze_document(&self, upload: UploadedFile)
    -> Result<DocumentMetadata, DocumentError>;

    /// Save a reference/actual PDF pair and compare them page by page.
    async fn compare_documents(
        &self,
        reference: UploadedFile,
        actual: UploadedFile,
    ) -> Result<ComparisonReport, DocumentError>;

    /// Build a chat index over uploaded files.
    async fn index_chat(&self, request: ChatIndexRequest)
    -> Result<ChatIndexOutcome, DocumentError>;

    /// Answer a question against a persisted chat index.
    async fn query_chat(&self, query: ChatQuery) -> Result<ChatReply, DocumentError>;

    /// Current metrics snapshot.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Default [`PortalApi`] implementation backed by the configured model providers.
///
/// Construct once at process start and share through an `Arc`; chat transcripts and metrics
/// live for the lifetime of the service.
pub struct PortalService {
    config: Config,
    builder: IndexBuilder,
    llm: SharedChatModel,
    history: Arc<ChatHistoryStore>,
    metrics: Arc<PortalMetrics>,
}

impl PortalService {
    /// Build the service with providers selected by `config`.
    pub fn new(config: Config) -> Result<Self, DocumentError> {
        tracing::info!("Initializing embedding client and chat model");
        let embedder = get_embedding_client(&config);
        let llm = get_chat_model(&config);
        Self::with_clients(config, embedder, llm)
    }

    /// Build the service with explicit clients.
    pub fn with_clients(
        config: Config,
        embedder: SharedEmbeddingClient,
        llm: SharedChatModel,
    ) -> Result<Self, DocumentError> {
        let builder = IndexBuilder::from_config(&config, embedder)?;
        Ok(Self {
            config,
            builder,
            llm,
            history: Arc::new(ChatHistoryStore::new()),
            metrics: Arc::new(PortalMetrics::new()),
        })
    }

    /// Configuration the service was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn record_ingestion(&self, outcome: &IngestOutcome) {
        self.metrics.record_ingestion(
            outcome.saved_files.len() as u64,
            outcome.chunk_count as u64,
            self.config.text_splitter_chunk_size as u64,
        );
    }

    fn chat_index_dir(&self, session_id: Option<&SessionId>) -> PathBuf {
        match session_id {
            Some(id) => self.config.index_storage_path.join(id.as_str()),
            None => self.config.index_storage_path.clone(),
        }
    }
}

#[async_trait]
impl PortalApi for PortalService {
    async fn analyze_document(
        &self,
        upload: UploadedFile,
    ) -> Result<DocumentMetadata, DocumentError> {
        let handler = DocumentHandler::new(&self.config.analysis_dir(), None)?;
        let path = handler.save_pdf(&upload)?;
        let text = handler.read_pdf(&path).await?;
        let metadata = DocumentAnalyzer::new(self.llm.clone())
            .analyze_document(&text)
            .await?;
        self.metrics.record_analysis();
        Ok(metadata)
    }

    async fn compare_documents(
        &self,
        reference: UploadedFile,
        actual: UploadedFile,
    ) -> Result<ComparisonReport, DocumentError> {
        let ingestor =
            ComparisonIngestor::new(&self.config.compare_dir(), Some(SessionId::generate()))?;
        ingestor.save_uploaded_files(&reference, &actual)?;
        let combined = ingestor.combine_documents().await?;
        let rows = DocumentComparator::new(self.llm.clone())
            .compare_documents(&combined)
            .await?;
        if let Err(error) = ingestor.clean_old_sessions(self.config.session_keep_latest) {
            tracing::warn!(error = %error, "Failed to clean old comparison sessions");
        }
        self.metrics.record_comparison();
        Ok(ComparisonReport {
            session_id: ingestor.session_id().to_string(),
            rows,
        })
    }

    async fn index_chat(
        &self,
        request: ChatIndexRequest,
    ) -> Result<ChatIndexOutcome, DocumentError> {
        if request.files.is_empty() {
            return Err(DocumentError::InvalidInput("no files uploaded".into()));
        }

        let (session_id, outcome) = if request.use_session_dirs {
            let requested = request
                .session_id
                .as_deref()
                .map(SessionId::parse)
                .transpose()?;
            let ingestor = DocumentIngestor::new(
                &self.config.multi_chat_dir(),
                &self.config.index_storage_path,
                requested,
                self.builder.clone(),
            )?;
            let outcome = ingestor.ingest_files(&request.files).await?;
            (Some(ingestor.session_id().to_string()), outcome)
        } else {
            let ingestor = SingleDocIngestor::new(
                &self.config.single_chat_dir(),
                &self.config.index_storage_path,
                self.builder.clone(),
            )?;
            let outcome = ingestor.ingest_files(&request.files).await?;
            self.history.clear(SINGLE_DOCUMENT_SESSION).await;
            (None, outcome)
        };

        self.record_ingestion(&outcome);
        tracing::info!(
            session_id = ?session_id,
            files = outcome.saved_files.len(),
            chunks = outcome.chunk_count,
            "Chat index built"
        );
        Ok(ChatIndexOutcome {
            session_id,
            indexed_files: outcome.saved_files.len(),
            chunks: outcome.chunk_count,
            skipped_duplicates: outcome.skipped_duplicates,
        })
    }

    async fn query_chat(&self, query: ChatQuery) -> Result<ChatReply, DocumentError> {
        let question = query.question.trim();
        if question.is_empty() {
            return Err(DocumentError::InvalidInput("question must not be empty".into()));
        }
        let session_id = query
            .session_id
            .as_deref()
            .map(SessionId::parse)
            .transpose()?;
        let index_dir = self.chat_index_dir(session_id.as_ref());
        let history_key = session_id
            .as_ref()
            .map_or(SINGLE_DOCUMENT_SESSION, SessionId::as_str);

        let mut rag = ConversationalRag::without_retriever(history_key, self.llm.clone())
            .with_history_store(self.history.clone());
        rag.load_retriever_from_index(
            &index_dir,
            self.builder.embedder().clone(),
            self.builder.top_k(),
        )
        .await?;

        let answer = match query.history.as_deref() {
            Some(history) => rag.invoke(question, Some(history)).await?,
            None => rag.invoke_with_session_history(question).await?,
        };
        self.metrics.record_question();
        Ok(ChatReply {
            answer: answer.answer,
            sources: answer.sources.iter().map(SourceRef::from).collect(),
        })
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
