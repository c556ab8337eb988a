use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

use crate::processing::PageBoundary;

const DEFAULT_COLLECTION: &str = "summeryai";
const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";
const DEFAULT_EMBEDDING_DIMENSION: usize = 768;
const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
const DEFAULT_SUMMARIZATION_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_SPEECH_URL: &str = "https://translate.google.com";
const DEFAULT_SPEECH_LANGUAGE: &str = "en";

/// Default chunk size, in characters, used by the ingestion splitter.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
/// Default maximum number of input tokens accepted by the generative model.
pub const DEFAULT_MAX_INPUT_TOKENS: usize = 1_048_576;
/// Default output budget requested from the generative model.
pub const DEFAULT_MAX_OUTPUT_TOKENS: usize = 8192;
/// Default upper bound on the size of a document accepted for extraction.
pub const DEFAULT_MAX_DOCUMENT_BYTES: usize = 100 * 1024 * 1024;

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

/// Runtime configuration for the Summery AI server.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Base URL of the Qdrant instance that stores chunk embeddings.
    pub qdrant_url: String,
    /// Name of the Qdrant collection used for uploaded documents.
    pub qdrant_collection_name: String,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Embedding provider used to generate vector representations.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Base URL of the Ollama runtime (embeddings and optional generation).
    pub ollama_url: String,
    /// Maximum characters per chunk produced by the splitter.
    pub chunk_size: usize,
    /// Generative backend used for summaries, flashcards, and answers.
    pub summarization_provider: SummarizationProvider,
    /// Model identifier passed to the generative backend.
    pub summarization_model: String,
    /// API key for the Gemini backend.
    pub gemini_api_key: Option<String>,
    /// Base URL of the Gemini REST API.
    pub gemini_url: String,
    /// Input token budget enforced before any generation call.
    pub max_input_tokens: usize,
    /// Output token budget requested from the generative backend.
    pub max_output_tokens: usize,
    /// Speech synthesis backend used for audio narration.
    pub speech_provider: SpeechProvider,
    /// Language code requested from the speech backend.
    pub speech_language: String,
    /// Base URL of the speech backend.
    pub speech_url: String,
    /// Root directory that `file://` and bare-path locators resolve against.
    pub local_storage_root: Option<PathBuf>,
    /// Largest document accepted for text extraction.
    pub max_document_bytes: usize,
    /// Hosts (optionally `host:port`) that HTTP locators may reach besides S3 endpoints.
    pub document_allowed_hosts: Vec<String>,
    /// Drop repeated sentences from extracted text before it is split for indexing.
    pub ingest_deduplicate_sentences: bool,
    /// Whether the splitter seals its accumulator at every page end.
    pub page_boundary: PageBoundary,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported embedding backends for the ingestion pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Local Ollama runtime.
    Ollama,
    /// Deterministic byte-hashing embedder for offline development.
    Hashing,
}

/// Supported generative backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummarizationProvider {
    /// Google Gemini `generateContent` API.
    Gemini,
    /// Local Ollama runtime.
    Ollama,
}

/// Supported speech synthesis backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeechProvider {
    /// Audio narration disabled.
    None,
    /// Google Translate text-to-speech endpoint.
    Google,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let summarization_provider = load_env_optional("SUMMARIZATION_PROVIDER")
            .map(|value| parse_value::<SummarizationProvider>("SUMMARIZATION_PROVIDER", &value))
            .transpose()?
            .unwrap_or(SummarizationProvider::Gemini);
        let gemini_api_key = load_env_optional("GEMINI_API_KEY");
        if summarization_provider == SummarizationProvider::Gemini && gemini_api_key.is_none() {
            return Err(ConfigError::MissingVariable("GEMINI_API_KEY".to_string()));
        }

        let chunk_size = load_parsed("TEXT_SPLITTER_CHUNK_SIZE")?.unwrap_or(DEFAULT_CHUNK_SIZE);
        if chunk_size == 0 {
            return Err(ConfigError::InvalidValue(
                "TEXT_SPLITTER_CHUNK_SIZE".to_string(),
            ));
        }

        Ok(Self {
            qdrant_url: load_env("QDRANT_URL")?,
            qdrant_collection_name: load_env_optional("QDRANT_COLLECTION_NAME")
                .unwrap_or_else(|| DEFAULT_COLLECTION.to_string()),
            qdrant_api_key: load_env_optional("QDRANT_API_KEY"),
            embedding_provider: load_parsed("EMBEDDING_PROVIDER")?
                .unwrap_or(EmbeddingProvider::Ollama),
            embedding_model: load_env_optional("EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            embedding_dimension: load_parsed("EMBEDDING_DIMENSION")?
                .unwrap_or(DEFAULT_EMBEDDING_DIMENSION),
            ollama_url: load_env_optional("OLLAMA_URL")
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            chunk_size,
            summarization_provider,
            summarization_model: load_env_optional("SUMMARIZATION_MODEL")
                .unwrap_or_else(|| DEFAULT_SUMMARIZATION_MODEL.to_string()),
            gemini_api_key,
            gemini_url: load_env_optional("GEMINI_URL")
                .unwrap_or_else(|| DEFAULT_GEMINI_URL.to_string()),
            max_input_tokens: load_parsed("SUMMARIZATION_MAX_INPUT_TOKENS")?
                .unwrap_or(DEFAULT_MAX_INPUT_TOKENS),
            max_output_tokens: load_parsed("SUMMARIZATION_MAX_OUTPUT_TOKENS")?
                .unwrap_or(DEFAULT_MAX_OUTPUT_TOKENS),
            speech_provider: load_parsed("SPEECH_PROVIDER")?.unwrap_or(SpeechProvider::Google),
            speech_language: load_env_optional("SPEECH_LANGUAGE")
                .unwrap_or_else(|| DEFAULT_SPEECH_LANGUAGE.to_string()),
            speech_url: load_env_optional("SPEECH_URL")
                .unwrap_or_else(|| DEFAULT_SPEECH_URL.to_string()),
            local_storage_root: load_env_optional("LOCAL_STORAGE_ROOT").map(PathBuf::from),
            max_document_bytes: load_parsed("MAX_DOCUMENT_BYTES")?
                .unwrap_or(DEFAULT_MAX_DOCUMENT_BYTES),
            document_allowed_hosts: load_env_optional("DOCUMENT_ALLOWED_HOSTS")
                .map(|value| parse_list(&value))
                .unwrap_or_default(),
            ingest_deduplicate_sentences: load_parsed::<Flag>("INGEST_DEDUPLICATE_SENTENCES")?
                .is_some_and(|flag| flag.0),
            page_boundary: load_parsed("TEXT_SPLITTER_PAGE_BOUNDARY")?.unwrap_or_default(),
            server_port: load_parsed("SERVER_PORT")?,
        })
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    load_env_optional(key).ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn load_parsed<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| parse_value(key, &value))
        .transpose()
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(key.to_string()))
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

struct Flag(bool);

impl FromStr for Flag {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Self(true)),
            "0" | "false" | "no" | "off" => Ok(Self(false)),
            _ => Err(()),
        }
    }
}

impl FromStr for PageBoundary {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "continue" => Ok(Self::Continue),
            "seal_at_page_end" | "seal" => Ok(Self::SealAtPageEnd),
            _ => Err(()),
        }
    }
}

impl FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "hashing" => Ok(Self::Hashing),
            _ => Err(()),
        }
    }
}

impl FromStr for SummarizationProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "ollama" => Ok(Self::Ollama),
            _ => Err(()),
        }
    }
}

impl FromStr for SpeechProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "off" | "disabled" => Ok(Self::None),
            "google" | "gtts" => Ok(Self::Google),
            _ => Err(()),
        }
    }
}

/// Load `.env` (when present) and parse the configuration from the environment.
///
/// The caller owns the returned value and passes it to the components it constructs.
pub fn load() -> Result<Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        qdrant_url = %config.qdrant_url,
        collection = %config.qdrant_collection_name,
        embedding_provider = ?config.embedding_provider,
        summarization_provider = ?config.summarization_provider,
        speech_provider = ?config.speech_provider,
        chunk_size = config.chunk_size,
        page_boundary = ?config.page_boundary,
        deduplicate_sentences = config.ingest_deduplicate_sentences,
        allowed_hosts = ?config.document_allowed_hosts,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    Ok(config)
}
