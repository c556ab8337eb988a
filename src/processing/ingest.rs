//! Document ingestion: extract, split, tag, embed, and index.
//!
//! Records are embedded and upserted strictly one at a time in ordinal order. There is no
//! rollback: when a record fails, everything before it stays indexed and the error reports
//! the failing ordinal together with the number of records already written.

use std::sync::Arc;

use uuid::Uuid;

use super::chunking::ChunkSplitter;
use super::dedupe::deduplicate_with_stats;
use super::types::{IndexingFailure, IngestionError, IngestionOutcome, IngestionRecord};
use crate::embedding::EmbeddingClient;
use crate::extraction::PdfTextExtractor;
use crate::index::{IndexPoint, VectorIndex};
use crate::storage::{BlobStore, StorageError, parse_locator};

/// Chunks and indexes uploaded documents.
pub struct IngestionPipeline {
    extractor: PdfTextExtractor,
    splitter: ChunkSplitter,
    embedder: Arc<dyn EmbeddingClient>,
    index: Arc<dyn VectorIndex>,
    blob_store: Option<Arc<dyn BlobStore>>,
    expected_dimension: Option<usize>,
    deduplicate_sentences: bool,
}

impl IngestionPipeline {
    /// Build a pipeline from its collaborators.
    pub fn new(
        extractor: PdfTextExtractor,
        splitter: ChunkSplitter,
        embedder: Arc<dyn EmbeddingClient>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            extractor,
            splitter,
            embedder,
            index,
            blob_store: None,
            expected_dimension: None,
            deduplicate_sentences: false,
        }
    }

    /// Attach the store used by [`IngestionPipeline::ingest_locator`].
    pub fn with_blob_store(mut self, blob_store: Arc<dyn BlobStore>) -> Self {
        self.blob_store = Some(blob_store);
        self
    }

    /// Reject embeddings whose length differs from `dimension`.
    pub fn with_expected_dimension(mut self, dimension: usize) -> Self {
        self.expected_dimension = Some(dimension);
        self
    }

    /// Remove repeated sentences from each page before splitting.
    pub fn with_sentence_deduplication(mut self, enabled: bool) -> Self {
        self.deduplicate_sentences = enabled;
        self
    }

    /// Chunk size used by the splitter.
    pub fn chunk_size(&self) -> usize {
        self.splitter.chunk_size()
    }

    /// Extract, split, and tag a document without calling any collaborator.
    pub fn prepare(
        &self,
        document: &[u8],
        file_name: &str,
    ) -> Result<IngestionOutcome, IngestionError> {
        let pages = self.extractor.extract(document)?;
        let texts: Vec<String> = pages
            .into_iter()
            .map(|page| {
                if self.deduplicate_sentences {
                    let result = deduplicate_with_stats(&page.text);
                    if result.removed > 0 {
                        tracing::debug!(
                            page = page.index,
                            removed = result.removed,
                            "Dropped repeated sentences"
                        );
                    }
                    result.text
                } else {
                    page.text
                }
            })
            .collect();

        let session_id = Uuid::new_v4().to_string();
        let records = self
            .splitter
            .split(&texts)
            .into_iter()
            .map(|chunk| IngestionRecord {
                session_id: session_id.clone(),
                file_name: file_name.to_string(),
                chunk_ordinal: chunk.ordinal,
                text: chunk.text,
            })
            .collect();

        Ok(IngestionOutcome {
            session_id,
            file_name: file_name.to_string(),
            chunk_size: self.splitter.chunk_size(),
            records,
        })
    }

    /// Ingest a document: prepare it, then embed and index every record in order.
    pub async fn ingest(
        &self,
        document: &[u8],
        file_name: &str,
    ) -> Result<IngestionOutcome, IngestionError> {
        let outcome = self.prepare(document, file_name)?;
        tracing::info!(
            session_id = %outcome.session_id,
            file_name,
            chunks = outcome.records.len(),
            chunk_size = outcome.chunk_size,
            "Indexing document"
        );

        for (indexed, record) in outcome.records.iter().enumerate() {
            self.index_record(record)
                .await
                .map_err(|source| {
                    tracing::error!(
                        session_id = %record.session_id,
                        ordinal = record.chunk_ordinal,
                        indexed,
                        error = %source,
                        "Chunk indexing failed"
                    );
                    IngestionError::Indexing {
                        ordinal: record.chunk_ordinal,
                        indexed,
                        session_id: record.session_id.clone(),
                        source,
                    }
                })?;
        }

        tracing::info!(
            session_id = %outcome.session_id,
            records = outcome.records.len(),
            "Document indexed"
        );
        Ok(outcome)
    }

    /// Resolve a locator to bytes, derive the file name from its key, and ingest.
    pub async fn ingest_locator(&self, locator: &str) -> Result<IngestionOutcome, IngestionError> {
        let store = self
            .blob_store
            .as_ref()
            .ok_or_else(|| StorageError::Fetch("no document store configured".into()))?;
        let locator = parse_locator(locator)?;
        let bytes = store.fetch(&locator).await?;
        self.ingest(&bytes, locator.file_name()).await
    }

    async fn index_record(&self, record: &IngestionRecord) -> Result<(), IndexingFailure> {
        let vector = self.embedder.embed(&record.text).await?;
        if let Some(expected) = self.expected_dimension
            && vector.len() != expected
        {
            return Err(IndexingFailure::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }

        self.index
            .upsert(IndexPoint {
                id: record.record_id(),
                vector,
                metadata: record.metadata(),
            })
            .await?;
        tracing::debug!(
            record_id = %record.record_id(),
            ordinal = record.chunk_ordinal,
            "Chunk indexed"
        );
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::embedding::EmbeddingClientError;
    use crate::index::{IndexError, IndexFilter, IndexMatch};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Embeds every text as a fixed-size vector and counts calls.
    pub(crate) struct StubEmbedder {
        pub(crate) dimension: usize,
        pub(crate) calls: AtomicUsize,
    }

    impl StubEmbedder {
        pub(crate) fn new(dimension: usize) -> Self {
            Self {
                dimension,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EmbeddingClient for StubEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![text.len() as f32; self.dimension])
        }
    }

    /// Records upserts; optionally fails at a given call index; serves canned matches.
    #[derive(Default)]
    pub(crate) struct RecordingIndex {
        pub(crate) points: Mutex<Vec<IndexPoint>>,
        pub(crate) fail_at: Option<usize>,
        pub(crate) matches: Vec<IndexMatch>,
        pub(crate) queries: Mutex<Vec<(usize, IndexFilter)>>,
    }

    #[async_trait]
    impl VectorIndex for RecordingIndex {
        async fn upsert(&self, point: IndexPoint) -> Result<(), IndexError> {
            let mut points = self.points.lock().expect("points lock");
            if self.fail_at == Some(points.len()) {
                return Err(IndexError::InvalidRequest("index offline".into()));
            }
            points.push(point);
            Ok(())
        }

        async fn query(
            &self,
            _vector: Vec<f32>,
            top_k: usize,
            filter: &IndexFilter,
        ) -> Result<Vec<IndexMatch>, IndexError> {
            self.queries
                .lock()
                .expect("queries lock")
                .push((top_k, filter.clone()));
            Ok(self.matches.iter().take(top_k).cloned().collect())
        }
    }
}
