//! Core data types and error definitions for the processing pipeline.

use crate::{
    embedding::EmbeddingClientError,
    extraction::ExtractionError,
    index::IndexError,
    qdrant::compute_chunk_hash,
    speech::SpeechClientError,
    storage::StorageError,
    summarization::GenerationClientError,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors produced while configuring the chunk splitter.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Ingestion configured an impossible character budget.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
}

/// A bounded-size span of extracted text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Position of the chunk within its document, starting at 0.
    pub ordinal: usize,
    /// Chunk text; every source line is followed by a `\n`.
    pub text: String,
    /// Length of `text` in characters.
    pub char_count: usize,
    /// Number of source lines packed into the chunk.
    pub line_count: usize,
}

impl Chunk {
    /// Iterate the source lines of the chunk, without the appended line breaks.
    pub fn lines(&self) -> std::str::Lines<'_> {
        self.text.lines()
    }
}

/// A chunk tagged with the identity metadata handed to the embedding/index collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestionRecord {
    /// Identifier shared by every record of one upload.
    pub session_id: String,
    /// Name of the uploaded file.
    pub file_name: String,
    /// Ordinal of the chunk within the document.
    pub chunk_ordinal: usize,
    /// Chunk text.
    pub text: String,
}

impl IngestionRecord {
    /// Stable record identifier: `{session}_{file}_chunk_{ordinal}`.
    pub fn record_id(&self) -> String {
        format!(
            "{}_{}_chunk_{}",
            self.session_id, self.file_name, self.chunk_ordinal
        )
    }

    /// Metadata stored with the record's vector.
    pub fn metadata(&self) -> Map<String, Value> {
        let mut metadata = Map::new();
        metadata.insert("file_name".into(), Value::String(self.file_name.clone()));
        metadata.insert("chunk_number".into(), Value::from(self.chunk_ordinal));
        metadata.insert(
            "upload_session_id".into(),
            Value::String(self.session_id.clone()),
        );
        metadata.insert("text".into(), Value::String(self.text.clone()));
        metadata.insert(
            "chunk_hash".into(),
            Value::String(compute_chunk_hash(&self.text)),
        );
        metadata
    }
}

/// Result of a completed ingestion produced by [`crate::processing::IngestionPipeline::ingest`].
#[derive(Debug, Clone)]
pub struct IngestionOutcome {
    /// Session identifier minted for this upload.
    pub session_id: String,
    /// Name of the ingested file.
    pub file_name: String,
    /// Chunk size used during splitting.
    pub chunk_size: usize,
    /// Records handed to the index, in ordinal order.
    pub records: Vec<IngestionRecord>,
}

/// Why a single record failed to index.
#[derive(Debug, Error)]
pub enum IndexingFailure {
    /// Embedding provider failed to produce a vector for the chunk.
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Vector index rejected the upsert.
    #[error("upsert failed: {0}")]
    Index(#[from] IndexError),
    /// Returned embedding dimension does not match configuration.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension configured for the index.
        expected: usize,
        /// Dimension returned by the provider.
        actual: usize,
    },
}

/// Errors emitted by the ingestion pipeline.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// The document locator could not be resolved to bytes.
    #[error("Failed to fetch document: {0}")]
    Storage(#[from] StorageError),
    /// The document could not be read.
    #[error("Failed to extract text: {0}")]
    Extraction(#[from] ExtractionError),
    /// A record failed to embed or index. Records before `ordinal` remain indexed.
    #[error("Failed to index chunk {ordinal} of session {session_id} ({indexed} indexed before failure): {source}")]
    Indexing {
        /// Ordinal of the failing chunk.
        ordinal: usize,
        /// Number of records indexed before the failure.
        indexed: usize,
        /// Session the partial upload belongs to.
        session_id: String,
        /// Underlying failure.
        #[source]
        source: IndexingFailure,
    },
}

/// Errors shared by operations that turn a document or raw text into model input.
#[derive(Debug, Error)]
pub enum PreparationError {
    /// Neither a document nor text was supplied.
    #[error("No file or text provided")]
    MissingInput,
    /// The document could not be read.
    #[error("Failed to extract text: {0}")]
    Extraction(#[from] ExtractionError),
    /// Estimated input size exceeds the model budget.
    #[error("Input is too large: {measured} tokens exceeds the limit of {limit}")]
    InputTooLarge {
        /// Estimated token count of the prepared text.
        measured: usize,
        /// Configured input budget.
        limit: usize,
    },
}

/// Errors emitted by the summarization orchestrator.
#[derive(Debug, Error)]
pub enum SummarizeError {
    /// Input preparation failed before any collaborator call.
    #[error(transparent)]
    Input(#[from] PreparationError),
    /// Generative collaborator failed.
    #[error("Summarization failed: {0}")]
    Summarization(#[from] GenerationClientError),
    /// Generative collaborator returned no text.
    #[error("Summarization failed: provider returned an empty summary")]
    EmptySummary,
    /// Audio was required and could not be produced.
    #[error("Audio generation failed: {0}")]
    Speech(#[from] SpeechClientError),
}

/// Errors emitted by the flashcard generator.
#[derive(Debug, Error)]
pub enum FlashcardError {
    /// Input preparation failed before any collaborator call.
    #[error(transparent)]
    Input(#[from] PreparationError),
    /// Generative collaborator failed.
    #[error("Flashcard generation failed: {0}")]
    Generation(#[from] GenerationClientError),
    /// Provider output was not a flashcard list.
    #[error("Error parsing response from API: {0}")]
    MalformedResponse(String),
    /// Provider returned the wrong number of cards.
    #[error("API did not generate exactly {expected} flashcards (got {actual})")]
    UnexpectedCount {
        /// Requested number of cards.
        expected: usize,
        /// Number of cards returned.
        actual: usize,
    },
}

/// Errors emitted while answering questions over indexed documents.
#[derive(Debug, Error)]
pub enum AskError {
    /// The question was empty.
    #[error("No question provided")]
    MissingQuestion,
    /// Embedding provider failed for the question text.
    #[error("Failed to embed question: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Vector index query failed.
    #[error("Vector index query failed: {0}")]
    Index(#[from] IndexError),
    /// Generative collaborator failed.
    #[error("Answer generation failed: {0}")]
    Generation(#[from] GenerationClientError),
}

/// How the summarizer treats audio narration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioMode {
    /// Do not synthesize audio.
    Skip,
    /// Synthesize audio when possible; failures leave a text-only summary.
    #[default]
    BestEffort,
    /// Fail the request when audio cannot be produced.
    Required,
}

impl std::str::FromStr for AudioMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "skip" | "false" | "off" => Ok(Self::Skip),
            "best_effort" | "best-effort" | "true" | "on" => Ok(Self::BestEffort),
            "required" => Ok(Self::Required),
            _ => Err(()),
        }
    }
}

/// Document bytes or raw text supplied to a generation request.
#[derive(Debug, Clone, Default)]
pub struct StudyInput {
    /// Uploaded PDF bytes.
    pub document: Option<Vec<u8>>,
    /// Raw text supplied instead of (or alongside) a document.
    pub text: Option<String>,
}

impl StudyInput {
    /// Input backed by a PDF document.
    pub fn document(bytes: Vec<u8>) -> Self {
        Self {
            document: Some(bytes),
            text: None,
        }
    }

    /// Input backed by raw text.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            document: None,
            text: Some(text.into()),
        }
    }
}

/// Where prepared model input came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputSource {
    /// Extracted from a PDF.
    Document {
        /// Number of pages in the document.
        pages: usize,
        /// Number of chunks the text was split into.
        chunks: usize,
    },
    /// Supplied as raw text.
    Text,
}

/// Options accepted by the summarizer.
#[derive(Debug, Clone, Copy)]
pub struct SummaryOptions {
    /// Audio narration policy.
    pub audio: AudioMode,
    /// Drop repeated sentences before counting tokens.
    pub deduplicate: bool,
    /// Override for the output token budget.
    pub max_output_tokens: Option<usize>,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            audio: AudioMode::BestEffort,
            deduplicate: true,
            max_output_tokens: None,
        }
    }
}

/// Summary text plus optional narration.
#[derive(Debug, Clone)]
pub struct SummaryResult {
    /// Generated summary.
    pub summary: String,
    /// MP3 narration of the summary, when produced.
    pub audio: Option<Vec<u8>>,
    /// Why audio is missing, when best-effort synthesis failed.
    pub audio_error: Option<String>,
    /// Estimated token count of the summarized input.
    pub input_tokens: usize,
    /// Origin of the summarized text.
    pub source: InputSource,
}

/// One question/answer card.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Flashcard {
    /// Question side.
    pub front: String,
    /// Answer side.
    pub back: String,
}

/// Question posed against indexed documents.
#[derive(Debug, Clone, Default)]
pub struct AskRequest {
    /// Natural-language question.
    pub question: String,
    /// Restrict retrieval to one upload session.
    pub session_id: Option<String>,
    /// Restrict retrieval to chunks of one document.
    pub file_name: Option<String>,
    /// Number of chunks retrieved as context (defaults applied downstream).
    pub top_k: Option<usize>,
}

/// Retrieved chunk referenced by an answer.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerSource {
    /// Record identifier of the chunk.
    pub record_id: Option<String>,
    /// Similarity score reported by the index.
    pub score: f32,
}

/// Answer generated from retrieved context.
#[derive(Debug, Clone)]
pub struct Answer {
    /// Answer text (or the polite fallback).
    pub message: String,
    /// Session the question was scoped to.
    pub session_id: Option<String>,
    /// Chunks used as context.
    pub sources: Vec<AnswerSource>,
}
