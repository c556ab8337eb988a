//! Processing service wiring every component to its collaborators.

use crate::{
    config::Config,
    embedding::{EmbeddingClient, EmbeddingClientError, build_embedding_client},
    extraction::PdfTextExtractor,
    index::VectorIndex,
    metrics::{CodeMetrics, MetricsSnapshot},
    processing::{
        ask::QuestionAnswerer,
        chunking::ChunkSplitter,
        flashcards::FlashcardGenerator,
        ingest::IngestionPipeline,
        prepare::InputPreparer,
        summarize::SummarizationOrchestrator,
        tokens::build_token_counter,
        types::{
            Answer, AskError, AskRequest, ChunkingError, Flashcard, FlashcardError,
            IngestionError, IngestionOutcome, PreparationError, StudyInput, SummarizeError,
            SummaryOptions, SummaryResult,
        },
    },
    qdrant::{QdrantError, QdrantService},
    speech::{SpeechClientError, SpeechSynthesizer, build_speech_synthesizer},
    storage::{BlobClient, BlobStore, StorageError},
    summarization::{GenerationClientError, GenerativeClient, build_generative_client},
};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while constructing the service at startup.
#[derive(Debug, Error)]
pub enum ServiceInitError {
    /// Chunk size configuration was invalid.
    #[error("Invalid configuration: {0}")]
    Chunking(#[from] ChunkingError),
    /// Embedding client could not be built.
    #[error(transparent)]
    Embedding(#[from] EmbeddingClientError),
    /// Qdrant client or collection setup failed.
    #[error("Failed to prepare Qdrant: {0}")]
    Qdrant(#[from] QdrantError),
    /// Generative client could not be built.
    #[error(transparent)]
    Generation(#[from] GenerationClientError),
    /// Speech client could not be built.
    #[error(transparent)]
    Speech(#[from] SpeechClientError),
    /// Blob client could not be built.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// External services the processing components depend on.
pub struct Collaborators {
    /// Embedding provider.
    pub embedder: Arc<dyn EmbeddingClient>,
    /// Vector index.
    pub index: Arc<dyn VectorIndex>,
    /// Generative provider.
    pub generator: Arc<dyn GenerativeClient>,
    /// Speech provider, when narration is enabled.
    pub synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    /// Document store used for locator uploads.
    pub blob_store: Arc<dyn BlobStore>,
}

/// Abstraction over the processing pipeline used by the HTTP surface.
#[async_trait]
pub trait ProcessingApi: Send + Sync {
    /// Fetch a document by locator, then chunk, embed, and index it.
    async fn ingest_locator(&self, locator: &str) -> Result<IngestionOutcome, IngestionError>;

    /// Chunk, embed, and index an uploaded document.
    async fn ingest_document(
        &self,
        document: Vec<u8>,
        file_name: &str,
    ) -> Result<IngestionOutcome, IngestionError>;

    /// Extract a document's text as chunk texts joined by spaces.
    fn extract_text(&self, document: &[u8]) -> Result<String, PreparationError>;

    /// Summarize a document or raw text.
    async fn summarize(
        &self,
        input: StudyInput,
        options: SummaryOptions,
    ) -> Result<SummaryResult, SummarizeError>;

    /// Generate `count` flashcards from a document or raw text.
    async fn flashcards(
        &self,
        input: StudyInput,
        count: usize,
    ) -> Result<Vec<Flashcard>, FlashcardError>;

    /// Answer a question from indexed chunks.
    async fn ask(&self, request: AskRequest) -> Result<Answer, AskError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Owns one instance of every processing component plus the shared metrics registry.
///
/// Construct it once near process start and share it through an `Arc`.
pub struct ProcessingService {
    ingestion: IngestionPipeline,
    preparer: Arc<InputPreparer>,
    summarizer: SummarizationOrchestrator,
    flashcards: FlashcardGenerator,
    answerer: QuestionAnswerer,
    metrics: Arc<CodeMetrics>,
}

impl ProcessingService {
    /// Build the service from configuration and explicit collaborators.
    pub fn new(config: &Config, collaborators: Collaborators) -> Result<Self, ServiceInitError> {
        let Collaborators {
            embedder,
            index,
            generator,
            synthesizer,
            blob_store,
        } = collaborators;

        let extractor = PdfTextExtractor::new().with_max_bytes(config.max_document_bytes);
        let splitter =
            ChunkSplitter::new(config.chunk_size)?.with_page_boundary(config.page_boundary);
        let token_counter = build_token_counter(&config.summarization_model);
        let preparer = Arc::new(InputPreparer::new(
            extractor.clone(),
            splitter.clone(),
            token_counter,
            config.max_input_tokens,
        ));

        let ingestion =
            IngestionPipeline::new(extractor, splitter, embedder.clone(), index.clone())
                .with_blob_store(blob_store)
                .with_expected_dimension(config.embedding_dimension)
                .with_sentence_deduplication(config.ingest_deduplicate_sentences);

        Ok(Self {
            ingestion,
            summarizer: SummarizationOrchestrator::new(
                preparer.clone(),
                generator.clone(),
                synthesizer,
                config.max_output_tokens,
            ),
            flashcards: FlashcardGenerator::new(
                preparer.clone(),
                generator.clone(),
                config.max_output_tokens,
            ),
            answerer: QuestionAnswerer::new(embedder, index, generator, config.max_output_tokens),
            preparer,
            metrics: Arc::new(CodeMetrics::new()),
        })
    }

    /// Build every collaborator from configuration, ensure the Qdrant collection, and wire
    /// the service.
    pub async fn from_config(config: &Config) -> Result<Self, ServiceInitError> {
        tracing::info!("Initializing collaborators");
        let embedder = build_embedding_client(config)?;
        let qdrant = QdrantService::from_config(config)?;
        qdrant
            .ensure_collection(config.embedding_dimension as u64)
            .await?;
        tracing::debug!(collection = qdrant.collection(), "Primary collection ready");

        let collaborators = Collaborators {
            embedder,
            index: Arc::new(qdrant),
            generator: build_generative_client(config)?,
            synthesizer: build_speech_synthesizer(config)?,
            blob_store: Arc::new(
                BlobClient::new(config.local_storage_root.clone(), config.max_document_bytes)?
                    .with_allowed_hosts(config.document_allowed_hosts.clone()),
            ),
        };
        Self::new(config, collaborators)
    }

    fn record_ingestion(&self, outcome: &IngestionOutcome) {
        self.metrics
            .record_document(outcome.records.len() as u64, outcome.chunk_size as u64);
    }
}

#[async_trait]
impl ProcessingApi for ProcessingService {
    async fn ingest_locator(&self, locator: &str) -> Result<IngestionOutcome, IngestionError> {
        let outcome = self.ingestion.ingest_locator(locator).await?;
        self.record_ingestion(&outcome);
        Ok(outcome)
    }

    async fn ingest_document(
        &self,
        document: Vec<u8>,
        file_name: &str,
    ) -> Result<IngestionOutcome, IngestionError> {
        let outcome = self.ingestion.ingest(&document, file_name).await?;
        self.record_ingestion(&outcome);
        Ok(outcome)
    }

    fn extract_text(&self, document: &[u8]) -> Result<String, PreparationError> {
        if document.is_empty() {
            return Err(PreparationError::MissingInput);
        }
        let (text, source) = self.preparer.document_text(document)?;
        if text.trim().is_empty() {
            tracing::warn!(?source, "Document contained no extractable text");
            return Err(PreparationError::MissingInput);
        }
        Ok(text)
    }

    async fn summarize(
        &self,
        input: StudyInput,
        options: SummaryOptions,
    ) -> Result<SummaryResult, SummarizeError> {
        let result = self.summarizer.summarize(&input, options).await?;
        self.metrics.record_summary();
        Ok(result)
    }

    async fn flashcards(
        &self,
        input: StudyInput,
        count: usize,
    ) -> Result<Vec<Flashcard>, FlashcardError> {
        let cards = self.flashcards.generate(&input, count).await?;
        self.metrics.record_flashcards();
        Ok(cards)
    }

    async fn ask(&self, request: AskRequest) -> Result<Answer, AskError> {
        let answer = self.answerer.ask(&request).await?;
        self.metrics.record_answer();
        Ok(answer)
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
