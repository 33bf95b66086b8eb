use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the document portal.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Root directory for uploaded documents; each mode writes to its own sub-directory.
    pub data_storage_path: PathBuf,
    /// Root directory for persisted vector indexes.
    pub index_storage_path: PathBuf,
    /// Embedding provider used to generate vector representations.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Language model provider used for rewriting, answering and analysis.
    pub llm_provider: LlmProvider,
    /// Chat model identifier passed to the provider.
    pub llm_model: String,
    /// Sampling temperature for chat completions.
    pub llm_temperature: f32,
    /// API key for OpenAI-compatible endpoints.
    pub openai_api_key: Option<String>,
    /// Base URL of the OpenAI-compatible API.
    pub openai_base_url: String,
    /// Base URL of the Ollama runtime.
    pub ollama_url: String,
    /// Maximum chunk length, measured in [`Config::text_splitter_unit`].
    pub text_splitter_chunk_size: usize,
    /// Overlap carried from one chunk into the next.
    pub text_splitter_chunk_overlap: usize,
    /// Unit used to measure chunk length.
    pub text_splitter_unit: SplitUnit,
    /// Number of chunks returned by the retriever.
    pub retriever_top_k: usize,
    /// Number of comparison sessions retained by cleanup.
    pub session_keep_latest: usize,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported embedding backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Hosted OpenAI (or compatible) embeddings API.
    OpenAI,
    /// Local Ollama runtime.
    Ollama,
    /// Deterministic offline encoder.
    Hash,
}

/// Supported chat model backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Hosted OpenAI (or compatible) chat completions API.
    OpenAI,
    /// Local Ollama runtime.
    Ollama,
}

/// Unit used when measuring chunk length.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitUnit {
    /// Unicode scalar values.
    Characters,
    /// Tokens of the embedding model's tokenizer.
    Tokens,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let embedding_provider = parse_or("EMBEDDING_PROVIDER", EmbeddingProvider::Hash)?;
        let llm_provider = parse_or("LLM_PROVIDER", LlmProvider::OpenAI)?;
        let openai_api_key = load_env_optional("OPENAI_API_KEY");

        let needs_openai = embedding_provider == EmbeddingProvider::OpenAI
            || llm_provider == LlmProvider::OpenAI;
        if needs_openai && openai_api_key.is_none() {
            return Err(ConfigError::MissingVariable("OPENAI_API_KEY".to_string()));
        }

        let text_splitter_chunk_size = parse_or("TEXT_SPLITTER_CHUNK_SIZE", 1000_usize)?;
        let text_splitter_chunk_overlap = parse_or("TEXT_SPLITTER_CHUNK_OVERLAP", 300_usize)?;
        if text_splitter_chunk_size == 0 {
            return Err(ConfigError::InvalidValue(
                "TEXT_SPLITTER_CHUNK_SIZE".to_string(),
            ));
        }
        if text_splitter_chunk_overlap >= text_splitter_chunk_size {
            return Err(ConfigError::InvalidValue(
                "TEXT_SPLITTER_CHUNK_OVERLAP".to_string(),
            ));
        }

        let retriever_top_k = parse_or("RETRIEVER_TOP_K", 5_usize)?;
        if retriever_top_k == 0 {
            return Err(ConfigError::InvalidValue("RETRIEVER_TOP_K".to_string()));
        }

        Ok(Self {
            data_storage_path: load_env_optional("DATA_STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data")),
            index_storage_path: load_env_optional("INDEX_STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("faiss_index")),
            embedding_provider,
            embedding_model: load_env_optional("EMBEDDING_MODEL")
                .unwrap_or_else(|| "text-embedding-3-small".to_string()),
            embedding_dimension: parse_or("EMBEDDING_DIMENSION", 1536_usize)?,
            llm_provider,
            llm_model: load_env_optional("LLM_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            llm_temperature: parse_or("LLM_TEMPERATURE", 0.0_f32)?,
            openai_api_key,
            openai_base_url: load_env_optional("OPENAI_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            ollama_url: load_env_optional("OLLAMA_URL")
                .unwrap_or_else(|| "http://127.0.0.1:11434".to_string()),
            text_splitter_chunk_size,
            text_splitter_chunk_overlap,
            text_splitter_unit: parse_or("TEXT_SPLITTER_UNIT", SplitUnit::Characters)?,
            retriever_top_k,
            session_keep_latest: parse_or("SESSION_KEEP_LATEST", 3_usize)?,
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
        })
    }

    /// Default settings rooted at the given storage directories, with hash embeddings and
    /// no API key. Used by tests and embedders that build configuration in code.
    pub fn with_storage(
        data_storage_path: impl Into<PathBuf>,
        index_storage_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            data_storage_path: data_storage_path.into(),
            index_storage_path: index_storage_path.into(),
            embedding_provider: EmbeddingProvider::Hash,
            embedding_model: "hash".to_string(),
            embedding_dimension: 256,
            llm_provider: LlmProvider::OpenAI,
            llm_model: "gpt-4o-mini".to_string(),
            llm_temperature: 0.0,
            openai_api_key: None,
            openai_base_url: "https://api.openai.com/v1".to_string(),
            ollama_url: "http://127.0.0.1:11434".to_string(),
            text_splitter_chunk_size: 1000,
            text_splitter_chunk_overlap: 300,
            text_splitter_unit: SplitUnit::Characters,
            retriever_top_k: 5,
            session_keep_latest: 3,
            server_port: None,
        }
    }

    /// Upload directory for the single-document chat mode.
    pub fn single_chat_dir(&self) -> PathBuf {
        self.data_storage_path.join("single_document_chat")
    }

    /// Upload directory for the multi-document chat mode.
    pub fn multi_chat_dir(&self) -> PathBuf {
        self.data_storage_path.join("multi_document_chat")
    }

    /// Upload directory for the comparison mode.
    pub fn compare_dir(&self) -> PathBuf {
        self.data_storage_path.join("document_compare")
    }

    /// Upload directory for the analysis mode.
    pub fn analysis_dir(&self) -> PathBuf {
        self.data_storage_path.join("document_analysis")
    }
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match load_env_optional(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            "hash" => Ok(Self::Hash),
            _ => Err(()),
        }
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            _ => Err(()),
        }
    }
}

impl std::str::FromStr for SplitUnit {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "characters" | "chars" => Ok(Self::Characters),
            "tokens" => Ok(Self::Tokens),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load `.env` and the environment, then install the result in the global cache.
///
/// A second call returns the configuration installed by the first.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        data_path = %config.data_storage_path.display(),
        index_path = %config.index_storage_path.display(),
        embedding_provider = ?config.embedding_provider,
        llm_provider = ?config.llm_provider,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    Ok(CONFIG.get_or_init(|| config))
}
