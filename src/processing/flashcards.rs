//! Question/answer flashcard generation.

use std::sync::Arc;

use serde::Deserialize;

use super::prepare::InputPreparer;
use super::types::{Flashcard, FlashcardError, StudyInput};
use crate::summarization::{GenerationRequest, GenerativeClient};

/// Number of cards requested when the caller does not choose.
pub const DEFAULT_FLASHCARD_COUNT: usize = 10;

fn flashcard_prompt(text: &str, count: usize) -> String {
    format!(
        "You are a flashcard creator.\n\n\
         Create flashcards from the text below. Each flashcard has a question on the front and \
         its answer on the back. Keep them clear and concise, and focus on key concepts or terms.\n\n\
         1. Identify key concepts, terms, or important sentences in the text.\n\
         2. Turn them into question-and-answer pairs.\n\
         3. Keep each flashcard to a single concept or term.\n\
         4. Generate exactly {count} flashcards.\n\n\
         Return only JSON in this format:\n\
         [{{\"front\": str, \"back\": str}}]\n\n\
         {text}"
    )
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FlashcardPayload {
    Cards(Vec<Flashcard>),
    Wrapped { flashcards: Vec<Flashcard> },
}

/// Parse provider output into flashcards and check the count.
pub fn parse_flashcards(raw: &str, expected: usize) -> Result<Vec<Flashcard>, FlashcardError> {
    let trimmed = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    let cards = match serde_json::from_str::<FlashcardPayload>(trimmed) {
        Ok(FlashcardPayload::Cards(cards)) | Ok(FlashcardPayload::Wrapped { flashcards: cards }) => {
            cards
        }
        Err(error) => return Err(FlashcardError::MalformedResponse(error.to_string())),
    };

    if cards.len() != expected {
        return Err(FlashcardError::UnexpectedCount {
            expected,
            actual: cards.len(),
        });
    }
    Ok(cards)
}

/// Generates flashcard sets from documents or raw text.
pub struct FlashcardGenerator {
    preparer: Arc<InputPreparer>,
    generator: Arc<dyn GenerativeClient>,
    max_output_tokens: usize,
}

impl FlashcardGenerator {
    /// Build a generator sharing the summarizer's input preparation.
    pub fn new(
        preparer: Arc<InputPreparer>,
        generator: Arc<dyn GenerativeClient>,
        max_output_tokens: usize,
    ) -> Self {
        Self {
            preparer,
            generator,
            max_output_tokens,
        }
    }

    /// Generate exactly `count` flashcards.
    pub async fn generate(
        &self,
        input: &StudyInput,
        count: usize,
    ) -> Result<Vec<Flashcard>, FlashcardError> {
        let prepared = self.preparer.prepare(input, true)?;
        tracing::info!(
            input_tokens = prepared.tokens,
            count,
            "Generating flashcards"
        );
        let raw = self
            .generator
            .generate(GenerationRequest::json(
                flashcard_prompt(&prepared.text, count),
                self.max_output_tokens,
            ))
            .await?;

        parse_flashcards(&raw, count).inspect_err(|error| {
            tracing::warn!(error = %error, "Rejected flashcard response");
        })
    }
}
