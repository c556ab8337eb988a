//! Turns an uploaded document or raw text into budget-checked model input.

use super::chunking::ChunkSplitter;
use super::dedupe::deduplicate_with_stats;
use super::tokens::TokenCounter;
use super::types::{InputSource, PreparationError, StudyInput};
use crate::extraction::PdfTextExtractor;

/// Text ready to be placed in a prompt.
#[derive(Debug, Clone)]
pub struct PreparedInput {
    /// Prompt-ready text.
    pub text: String,
    /// Estimated token count of `text`.
    pub tokens: usize,
    /// Where the text came from.
    pub source: InputSource,
}

/// Shared input preparation for summaries and flashcards.
pub struct InputPreparer {
    extractor: PdfTextExtractor,
    splitter: ChunkSplitter,
    token_counter: TokenCounter,
    max_input_tokens: usize,
}

impl InputPreparer {
    /// Build a preparer enforcing `max_input_tokens`.
    pub fn new(
        extractor: PdfTextExtractor,
        splitter: ChunkSplitter,
        token_counter: TokenCounter,
        max_input_tokens: usize,
    ) -> Self {
        Self {
            extractor,
            splitter,
            token_counter,
            max_input_tokens,
        }
    }

    /// Configured input budget.
    pub fn max_input_tokens(&self) -> usize {
        self.max_input_tokens
    }

    /// Extract a document and join its chunk texts with single spaces.
    pub fn document_text(
        &self,
        document: &[u8],
    ) -> Result<(String, InputSource), PreparationError> {
        let pages = self.extractor.extract(document)?;
        let texts: Vec<String> = pages.into_iter().map(|page| page.text).collect();
        let chunks = self.splitter.split(&texts);
        let source = InputSource::Document {
            pages: texts.len(),
            chunks: chunks.len(),
        };
        let joined = chunks
            .into_iter()
            .map(|chunk| chunk.text)
            .collect::<Vec<_>>()
            .join(" ");
        Ok((joined, source))
    }

    /// Resolve the input to text, optionally drop repeated sentences, and enforce the budget.
    ///
    /// A document takes precedence over text when both are present, unless the document
    /// yields no text, in which case the supplied text is used. Empty uploads and blank text
    /// count as absent.
    pub fn prepare(
        &self,
        input: &StudyInput,
        deduplicate: bool,
    ) -> Result<PreparedInput, PreparationError> {
        let document = input.document.as_deref().filter(|bytes| !bytes.is_empty());
        let raw_text = input.text.as_deref().filter(|text| !text.trim().is_empty());

        let (text, source) = match (document, raw_text) {
            (Some(bytes), fallback) => {
                let (text, source) = self.document_text(bytes)?;
                match fallback {
                    Some(raw) if text.trim().is_empty() => {
                        tracing::info!(?source, "Document yielded no text, using supplied text");
                        (raw.to_string(), InputSource::Text)
                    }
                    _ => (text, source),
                }
            }
            (None, Some(text)) => (text.to_string(), InputSource::Text),
            (None, None) => return Err(PreparationError::MissingInput),
        };

        let text = if deduplicate {
            let result = deduplicate_with_stats(&text);
            if result.removed > 0 {
                tracing::debug!(removed = result.removed, "Dropped repeated sentences");
            }
            result.text
        } else {
            text
        };

        if text.trim().is_empty() {
            tracing::warn!(?source, "Input contained no extractable text");
            return Err(PreparationError::MissingInput);
        }

        let tokens = (self.token_counter)(&text);
        if tokens > self.max_input_tokens {
            tracing::warn!(
                tokens,
                limit = self.max_input_tokens,
                "Input exceeds token budget"
            );
            return Err(PreparationError::InputTooLarge {
                measured: tokens,
                limit: self.max_input_tokens,
            });
        }

        Ok(PreparedInput {
            text,
            tokens,
            source,
        })
    }
}
