//! Retrieval-augmented answers over indexed documents.

use std::sync::Arc;

use serde::Deserialize;

use super::types::{Answer, AnswerSource, AskError, AskRequest};
use crate::embedding::EmbeddingClient;
use crate::index::{IndexFilter, VectorIndex};
use crate::summarization::{GenerationRequest, GenerativeClient};

/// Reply used when the model cannot ground an answer in the document.
pub const FALLBACK_ANSWER: &str = "Hmmm I do not know that. Please ask me anything in the file.";

/// Chunks retrieved per question unless the caller asks for more.
pub const DEFAULT_TOP_K: usize = 1;

fn answer_prompt(question: &str, context: &str) -> String {
    format!(
        "Answer the question using only the document excerpts below. Keep the answer short, \
         precise, and in the format the question asks for. Do not answer anything the excerpts \
         do not cover.\n\n\
         Respond with JSON only, with nothing before or after it:\n\
         {{\"message\": \"<answer>\"}}\n\n\
         If the excerpts do not contain the answer, respond with:\n\
         {{\"message\": \"{FALLBACK_ANSWER}\"}}\n\n\
         Excerpts:\n{context}\n\n\
         Question: {question}"
    )
}

#[derive(Deserialize)]
struct AnswerPayload {
    message: Option<String>,
}

fn parse_answer(raw: &str) -> Option<String> {
    serde_json::from_str::<AnswerPayload>(raw.trim())
        .ok()
        .and_then(|payload| payload.message)
        .map(|message| message.trim().to_string())
        .filter(|message| !message.is_empty())
}

/// Answers questions from the chunks stored at ingestion time.
pub struct QuestionAnswerer {
    embedder: Arc<dyn EmbeddingClient>,
    index: Arc<dyn VectorIndex>,
    generator: Arc<dyn GenerativeClient>,
    max_output_tokens: usize,
}

impl QuestionAnswerer {
    /// Build an answerer from its collaborators.
    pub fn new(
        embedder: Arc<dyn EmbeddingClient>,
        index: Arc<dyn VectorIndex>,
        generator: Arc<dyn GenerativeClient>,
        max_output_tokens: usize,
    ) -> Self {
        Self {
            embedder,
            index,
            generator,
            max_output_tokens,
        }
    }

    /// Embed the question, retrieve context, and generate a grounded answer.
    pub async fn ask(&self, request: &AskRequest) -> Result<Answer, AskError> {
        let question = request.question.trim();
        if question.is_empty() {
            return Err(AskError::MissingQuestion);
        }

        let vector = self.embedder.embed(question).await?;
        let filter = IndexFilter {
            session_id: request.session_id.clone(),
            file_name: request.file_name.clone(),
        };
        let top_k = request.top_k.unwrap_or(DEFAULT_TOP_K).max(1);
        let matches = self.index.query(vector, top_k, &filter).await?;
        let context = matches
            .iter()
            .filter_map(|hit| hit.text())
            .collect::<Vec<_>>()
            .join(" ");
        tracing::debug!(
            session_id = ?request.session_id,
            file_name = ?request.file_name,
            matches = matches.len(),
            "Retrieved answer context"
        );

        let raw = self
            .generator
            .generate(GenerationRequest::json(
                answer_prompt(question, &context),
                self.max_output_tokens,
            ))
            .await?;
        let message = parse_answer(&raw).unwrap_or_else(|| {
            tracing::warn!("Answer was not valid JSON; using fallback reply");
            FALLBACK_ANSWER.to_string()
        });

        Ok(Answer {
            message,
            session_id: request.session_id.clone(),
            sources: matches
                .into_iter()
                .map(|hit| AnswerSource {
                    record_id: hit.record_id,
                    score: hit.score,
                })
                .collect(),
        })
    }
}
