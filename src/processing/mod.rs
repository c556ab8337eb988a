//! Document processing: chunking, indexing, summaries, flashcards, and retrieval answers.

pub mod ask;
pub mod chunking;
pub mod dedupe;
pub mod flashcards;
pub mod ingest;
pub mod prepare;
mod service;
pub mod summarize;
pub mod tokens;
pub mod types;

pub use ask::QuestionAnswerer;
pub use chunking::{ChunkSplitter, PageBoundary, split_pages};
pub use dedupe::deduplicate;
pub use flashcards::FlashcardGenerator;
pub use ingest::IngestionPipeline;
pub use prepare::InputPreparer;
pub use service::{Collaborators, ProcessingApi, ProcessingService, ServiceInitError};
pub use summarize::SummarizationOrchestrator;
pub use types::{
    Answer, AnswerSource, AskError, AskRequest, AudioMode, Chunk, ChunkingError, Flashcard,
    FlashcardError, IndexingFailure, IngestionError, IngestionOutcome, IngestionRecord,
    InputSource, PreparationError, StudyInput, SummarizeError, SummaryOptions, SummaryResult,
};
