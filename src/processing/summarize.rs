//! Summary generation with optional spoken narration.

use std::sync::Arc;

use super::prepare::InputPreparer;
use super::types::{AudioMode, StudyInput, SummarizeError, SummaryOptions, SummaryResult};
use crate::speech::{SpeechClientError, SpeechSynthesizer};
use crate::summarization::{GenerationRequest, GenerativeClient};

fn summary_prompt(text: &str) -> String {
    format!("Summarize the following text concisely:\n\n{text}\n\nSummary:")
}

/// Produces summaries of documents or raw text.
pub struct SummarizationOrchestrator {
    preparer: Arc<InputPreparer>,
    generator: Arc<dyn GenerativeClient>,
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    max_output_tokens: usize,
}

impl SummarizationOrchestrator {
    /// Build an orchestrator; `synthesizer` is `None` when narration is disabled.
    pub fn new(
        preparer: Arc<InputPreparer>,
        generator: Arc<dyn GenerativeClient>,
        synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
        max_output_tokens: usize,
    ) -> Self {
        Self {
            preparer,
            generator,
            synthesizer,
            max_output_tokens,
        }
    }

    /// Summarize the input, then narrate the summary according to `options.audio`.
    pub async fn summarize(
        &self,
        input: &StudyInput,
        options: SummaryOptions,
    ) -> Result<SummaryResult, SummarizeError> {
        let prepared = self.preparer.prepare(input, options.deduplicate)?;
        let max_output_tokens = options.max_output_tokens.unwrap_or(self.max_output_tokens);
        tracing::info!(
            input_tokens = prepared.tokens,
            max_output_tokens,
            source = ?prepared.source,
            "Generating summary"
        );

        let summary = self
            .generator
            .generate(GenerationRequest::text(
                summary_prompt(&prepared.text),
                max_output_tokens,
            ))
            .await?;
        let summary = summary.trim().to_string();
        if summary.is_empty() {
            return Err(SummarizeError::EmptySummary);
        }

        let (audio, audio_error) = match self.narrate(&summary, options.audio).await {
            Ok(audio) => (audio, None),
            Err(error) if options.audio == AudioMode::BestEffort => {
                tracing::warn!(error = %error, "Audio generation failed; returning text only");
                (None, Some(error.to_string()))
            }
            Err(error) => return Err(SummarizeError::Speech(error)),
        };

        Ok(SummaryResult {
            summary,
            audio,
            audio_error,
            input_tokens: prepared.tokens,
            source: prepared.source,
        })
    }

    async fn narrate(
        &self,
        summary: &str,
        mode: AudioMode,
    ) -> Result<Option<Vec<u8>>, SpeechClientError> {
        if mode == AudioMode::Skip {
            return Ok(None);
        }
        let synthesizer = self
            .synthesizer
            .as_ref()
            .ok_or(SpeechClientError::Disabled)?;
        synthesizer.synthesize(summary).await.map(Some)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::speech::{SpeechClientError, SpeechSynthesizer};
    use crate::summarization::{GenerationClientError, GenerationRequest, GenerativeClient};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Returns a canned reply and records every request.
    pub(crate) struct ScriptedGenerator {
        pub(crate) reply: Result<String, String>,
        pub(crate) requests: Mutex<Vec<GenerationRequest>>,
    }

    impl ScriptedGenerator {
        pub(crate) fn replying(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn failing(message: &str) -> Self {
            Self {
                reply: Err(message.to_string()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.requests.lock().expect("requests lock").len()
        }
    }

    #[async_trait]
    impl GenerativeClient for ScriptedGenerator {
        async fn generate(
            &self,
            request: GenerationRequest,
        ) -> Result<String, GenerationClientError> {
            self.requests.lock().expect("requests lock").push(request);
            self.reply
                .clone()
                .map_err(GenerationClientError::GenerationFailed)
        }
    }

    /// Speech stub that either returns fixed bytes or fails.
    pub(crate) struct StubSynthesizer {
        pub(crate) fail: bool,
    }

    #[async_trait]
    impl SpeechSynthesizer for StubSynthesizer {
        async fn synthesize(&self, _text: &str) -> Result<Vec<u8>, SpeechClientError> {
            if self.fail {
                Err(SpeechClientError::SynthesisFailed("tts offline".into()))
            } else {
                Ok(b"ID3mp3".to_vec())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{ScriptedGenerator, StubSynthesizer};
    use super::*;
    use crate::extraction::PdfTextExtractor;
    use crate::processing::chunking::ChunkSplitter;
    use crate::processing::tokens::{TokenCounter, whitespace_token_counter};
    use crate::processing::types::{InputSource, PreparationError};

    fn orchestrator(
        generator: Arc<ScriptedGenerator>,
        synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
        counter: TokenCounter,
    ) -> SummarizationOrchestrator {
        let preparer = InputPreparer::new(
            PdfTextExtractor::new(),
            ChunkSplitter::new(1000).expect("splitter"),
            counter,
            1_048_576,
        );
        SummarizationOrchestrator::new(Arc::new(preparer), generator, synthesizer, 8192)
    }

    fn text_only() -> SummaryOptions {
        SummaryOptions {
            audio: AudioMode::Skip,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn missing_input_fails_before_generation() {
        let generator = Arc::new(ScriptedGenerator::replying("unused"));
        let error = orchestrator(generator.clone(), None, whitespace_token_counter())
            .summarize(&StudyInput::default(), SummaryOptions::default())
            .await
            .expect_err("missing input");

        assert!(matches!(
            error,
            SummarizeError::Input(PreparationError::MissingInput)
        ));
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn oversized_input_never_reaches_generator() {
        let generator = Arc::new(ScriptedGenerator::replying("unused"));
        let counter: TokenCounter = Arc::new(|_: &str| 2_000_000);
        let error = orchestrator(generator.clone(), None, counter)
            .summarize(&StudyInput::text("A long book."), text_only())
            .await
            .expect_err("too large");

        assert!(matches!(
            error,
            SummarizeError::Input(PreparationError::InputTooLarge {
                measured: 2_000_000,
                limit: 1_048_576
            })
        ));
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn summary_uses_prompt_and_output_budget() {
        let generator = Arc::new(ScriptedGenerator::replying("  Cells are small.  "));
        let result = orchestrator(generator.clone(), None, whitespace_token_counter())
            .summarize(
                &StudyInput::text("Cells are tiny. Cells are tiny. They divide."),
                text_only(),
            )
            .await
            .expect("summary");

        assert_eq!(result.summary, "Cells are small.");
        assert_eq!(result.source, InputSource::Text);
        assert!(result.audio.is_none());
        assert!(result.audio_error.is_none());

        let requests = generator.requests.lock().expect("requests");
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].prompt,
            "Summarize the following text concisely:\n\nCells are tiny. They divide.\n\nSummary:"
        );
        assert_eq!(requests[0].max_output_tokens, 8192);
        assert!(!requests[0].json_output);
    }

    #[tokio::test]
    async fn deduplication_can_be_disabled() {
        let generator = Arc::new(ScriptedGenerator::replying("ok"));
        orchestrator(generator.clone(), None, whitespace_token_counter())
            .summarize(
                &StudyInput::text("Same. Same."),
                SummaryOptions {
                    deduplicate: false,
                    max_output_tokens: Some(64),
                    ..text_only()
                },
            )
            .await
            .expect("summary");

        let requests = generator.requests.lock().expect("requests");
        assert!(requests[0].prompt.contains("Same. Same."));
        assert_eq!(requests[0].max_output_tokens, 64);
    }

    #[tokio::test]
    async fn generator_failure_is_a_summarization_error() {
        let generator = Arc::new(ScriptedGenerator::failing("quota"));
        let error = orchestrator(generator, None, whitespace_token_counter())
            .summarize(&StudyInput::text("Some text."), text_only())
            .await
            .expect_err("failure");
        assert!(matches!(error, SummarizeError::Summarization(_)));
    }

    #[tokio::test]
    async fn empty_summary_is_rejected() {
        let generator = Arc::new(ScriptedGenerator::replying("   "));
        let error = orchestrator(generator, None, whitespace_token_counter())
            .summarize(&StudyInput::text("Some text."), text_only())
            .await
            .expect_err("empty");
        assert!(matches!(error, SummarizeError::EmptySummary));
    }

    #[tokio::test]
    async fn best_effort_audio_attaches_narration() {
        let generator = Arc::new(ScriptedGenerator::replying("Short summary."));
        let synthesizer: Arc<dyn SpeechSynthesizer> = Arc::new(StubSynthesizer { fail: false });
        let result = orchestrator(generator, Some(synthesizer), whitespace_token_counter())
            .summarize(&StudyInput::text("Some text."), SummaryOptions::default())
            .await
            .expect("summary");
        assert_eq!(result.audio.as_deref(), Some(&b"ID3mp3"[..]));
        assert!(result.audio_error.is_none());
    }

    #[tokio::test]
    async fn best_effort_audio_failure_keeps_text_summary() {
        let generator = Arc::new(ScriptedGenerator::replying("Short summary."));
        let synthesizer: Arc<dyn SpeechSynthesizer> = Arc::new(StubSynthesizer { fail: true });
        let result = orchestrator(generator, Some(synthesizer), whitespace_token_counter())
            .summarize(&StudyInput::text("Some text."), SummaryOptions::default())
            .await
            .expect("summary");
        assert_eq!(result.summary, "Short summary.");
        assert!(result.audio.is_none());
        assert!(
            result
                .audio_error
                .as_deref()
                .is_some_and(|message| message.contains("tts offline"))
        );
    }

    #[tokio::test]
    async fn required_audio_failure_fails_request() {
        let generator = Arc::new(ScriptedGenerator::replying("Short summary."));
        let error = orchestrator(generator, None, whitespace_token_counter())
            .summarize(
                &StudyInput::text("Some text."),
                SummaryOptions {
                    audio: AudioMode::Required,
                    ..Default::default()
                },
            )
            .await
            .expect_err("no synthesizer");
        assert!(matches!(
            error,
            SummarizeError::Speech(SpeechClientError::Disabled)
        ));
    }
}
