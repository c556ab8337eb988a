use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing service activity since startup.
#[derive(Default)]
pub struct CodeMetrics {
    documents_ingested: AtomicU64,
    chunks_indexed: AtomicU64,
    summaries_generated: AtomicU64,
    flashcard_sets_generated: AtomicU64,
    questions_answered: AtomicU64,
    last_chunk_size: AtomicU64,
}

impl CodeMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an ingested document, its chunk count, and the chunk size used.
    pub fn record_document(&self, chunk_count: u64, chunk_size: u64) {
        self.documents_ingested.fetch_add(1, Ordering::Relaxed);
        self.chunks_indexed.fetch_add(chunk_count, Ordering::Relaxed);
        self.last_chunk_size.store(chunk_size, Ordering::Relaxed);
    }

    /// Record a generated summary.
    pub fn record_summary(&self) {
        self.summaries_generated.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a generated flashcard set.
    pub fn record_flashcards(&self) {
        self.flashcard_sets_generated.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an answered question.
    pub fn record_answer(&self) {
        self.questions_answered.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let last_chunk_size = self.last_chunk_size.load(Ordering::Relaxed);
        MetricsSnapshot {
            documents_ingested: self.documents_ingested.load(Ordering::Relaxed),
            chunks_indexed: self.chunks_indexed.load(Ordering::Relaxed),
            summaries_generated: self.summaries_generated.load(Ordering::Relaxed),
            flashcard_sets_generated: self.flashcard_sets_generated.load(Ordering::Relaxed),
            questions_answered: self.questions_answered.load(Ordering::Relaxed),
            last_chunk_size: (last_chunk_size > 0).then_some(last_chunk_size),
        }
    }
}

/// Immutable view of the service counters used for reporting.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Documents ingested since startup.
    pub documents_ingested: u64,
    /// Chunks written to the vector index.
    pub chunks_indexed: u64,
    /// Summaries returned to callers.
    pub summaries_generated: u64,
    /// Flashcard sets returned to callers.
    pub flashcard_sets_generated: u64,
    /// Questions answered through retrieval.
    pub questions_answered: u64,
    /// Chunk size used by the most recent ingestion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_chunk_size: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_documents_and_chunks() {
        let metrics = CodeMetrics::new();
        metrics.record_document(2, 1000);
        metrics.record_document(3, 500);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.documents_ingested, 2);
        assert_eq!(snapshot.chunks_indexed, 5);
        assert_eq!(snapshot.last_chunk_size, Some(500));
    }

    #[test]
    fn counts_generation_activity() {
        let metrics = CodeMetrics::new();
        metrics.record_summary();
        metrics.record_summary();
        metrics.record_flashcards();
        metrics.record_answer();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.summaries_generated, 2);
        assert_eq!(snapshot.flashcard_sets_generated, 1);
        assert_eq!(snapshot.questions_answered, 1);
    }

    #[test]
    fn empty_snapshot_omits_chunk_size() {
        let snapshot = CodeMetrics::new().snapshot();
        assert_eq!(snapshot.documents_ingested, 0);
        assert_eq!(snapshot.last_chunk_size, None);
        let json = serde_json::to_value(snapshot).expect("json");
        assert!(json.get("last_chunk_size").is_none());
    }
}
