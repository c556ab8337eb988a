//! Text-to-speech narration for summaries.

use crate::config::{Config, SpeechProvider};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use thiserror::Error;

/// Longest text segment the Google Translate TTS endpoint accepts per request.
const MAX_SEGMENT_CHARS: usize = 100;

/// Errors raised while synthesizing speech.
#[derive(Debug, Error)]
pub enum SpeechClientError {
    /// No synthesizer is configured.
    #[error("speech synthesis is disabled")]
    Disabled,
    /// Provider could not be reached or constructed.
    #[error("Speech provider unavailable: {0}")]
    Unavailable(String),
    /// Provider returned an error response.
    #[error("Failed to synthesize speech: {0}")]
    SynthesisFailed(String),
}

/// Interface implemented by speech backends.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Render `text` as MP3 audio.
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SpeechClientError>;
}

/// Build the synthesizer selected by configuration, or `None` when narration is disabled.
pub fn build_speech_synthesizer(
    config: &Config,
) -> Result<Option<Arc<dyn SpeechSynthesizer>>, SpeechClientError> {
    match config.speech_provider {
        SpeechProvider::None => Ok(None),
        SpeechProvider::Google => Ok(Some(Arc::new(GoogleTranslateSpeechClient::new(
            config.speech_url.clone(),
            config.speech_language.clone(),
        )?))),
    }
}

/// Client for the Google Translate `translate_tts` endpoint.
pub struct GoogleTranslateSpeechClient {
    http: Client,
    base_url: String,
    language: String,
}

impl GoogleTranslateSpeechClient {
    /// Create a client speaking `language` against `base_url`.
    pub fn new(
        base_url: impl Into<String>,
        language: impl Into<String>,
    ) -> Result<Self, SpeechClientError> {
        let http = Client::builder()
            .user_agent("Mozilla/5.0 (compatible; summeryai/tts)")
            .build()
            .map_err(|error| SpeechClientError::Unavailable(error.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            language: language.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/translate_tts", self.base_url.trim_end_matches('/'))
    }

    async fn fetch_segment(
        &self,
        segment: &str,
        idx: usize,
        total: usize,
    ) -> Result<Vec<u8>, SpeechClientError> {
        let total = total.to_string();
        let idx = idx.to_string();
        let textlen = segment.chars().count().to_string();
        let response = self
            .http
            .get(self.endpoint())
            .query(&[
                ("ie", "UTF-8"),
                ("q", segment),
                ("tl", self.language.as_str()),
                ("client", "tw-ob"),
                ("total", total.as_str()),
                ("idx", idx.as_str()),
                ("textlen", textlen.as_str()),
            ])
            .send()
            .await
            .map_err(|error| {
                SpeechClientError::Unavailable(format!(
                    "failed to reach speech endpoint {}: {error}",
                    self.base_url
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SpeechClientError::SynthesisFailed(format!(
                "speech endpoint returned {status}: {body}"
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|error| SpeechClientError::SynthesisFailed(error.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleTranslateSpeechClient {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SpeechClientError> {
        let segments = split_segments(text, MAX_SEGMENT_CHARS);
        if segments.is_empty() {
            return Err(SpeechClientError::SynthesisFailed(
                "no text to synthesize".into(),
            ));
        }

        let mut audio = Vec::new();
        for (idx, segment) in segments.iter().enumerate() {
            audio.extend(self.fetch_segment(segment, idx, segments.len()).await?);
        }
        tracing::debug!(
            segments = segments.len(),
            bytes = audio.len(),
            language = %self.language,
            "Synthesized speech"
        );
        Ok(audio)
    }
}

/// Split text into segments of at most `limit` characters, breaking at whitespace.
///
/// A single word longer than `limit` is hard-split.
fn split_segments(text: &str, limit: usize) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0;

    for word in text.split_whitespace() {
        let mut word_chars: Vec<char> = word.chars().collect();
        while word_chars.len() > limit {
            if !current.is_empty() {
                segments.push(std::mem::take(&mut current));
                current_chars = 0;
            }
            let rest = word_chars.split_off(limit);
            segments.push(word_chars.into_iter().collect());
            word_chars = rest;
        }

        let separator = usize::from(!current.is_empty());
        if current_chars + separator + word_chars.len() > limit {
            segments.push(std::mem::take(&mut current));
            current_chars = 0;
        }
        if !current.is_empty() {
            current.push(' ');
            current_chars += 1;
        }
        current_chars += word_chars.len();
        current.extend(word_chars);
    }

    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::GET, MockServer};

    #[test]
    fn segments_break_on_word_boundaries() {
        let segments = split_segments("alpha beta gamma delta", 11);
        assert_eq!(segments, vec!["alpha beta", "gamma delta"]);
    }

    #[test]
    fn long_words_are_hard_split() {
        let segments = split_segments("hi abcdefghij", 4);
        assert_eq!(segments, vec!["hi", "abcd", "efgh", "ij"]);
    }

    #[test]
    fn segments_never_exceed_limit() {
        let text = "The mitochondria is the powerhouse of the cell. ".repeat(20);
        for segment in split_segments(&text, MAX_SEGMENT_CHARS) {
            assert!(segment.chars().count() <= MAX_SEGMENT_CHARS);
            assert!(!segment.is_empty());
        }
    }

    #[tokio::test]
    async fn google_client_concatenates_segments() {
        let server = MockServer::start_async().await;
        let first = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/translate_tts")
                    .query_param("client", "tw-ob")
                    .query_param("tl", "en")
                    .query_param("idx", "0")
                    .query_param("total", "2");
                then.status(200).body("AB");
            })
            .await;
        let second = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/translate_tts")
                    .query_param("idx", "1")
                    .query_param("total", "2");
                then.status(200).body("CD");
            })
            .await;

        let client = GoogleTranslateSpeechClient::new(server.base_url(), "en").expect("client");
        let text = format!("{} {}", "a".repeat(60), "b".repeat(60));
        let audio = client.synthesize(&text).await.expect("audio");

        first.assert_async().await;
        second.assert_async().await;
        assert_eq!(audio, b"ABCD");
    }

    #[tokio::test]
    async fn google_client_surfaces_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/translate_tts");
                then.status(503).body("unavailable");
            })
            .await;

        let client = GoogleTranslateSpeechClient::new(server.base_url(), "en").expect("client");
        let error = client.synthesize("hello").await.expect_err("error status");

        assert!(matches!(error, SpeechClientError::SynthesisFailed(message) if message.contains("503")));
    }

    #[tokio::test]
    async fn empty_text_is_rejected_without_request() {
        let client =
            GoogleTranslateSpeechClient::new("http://127.0.0.1:9", "en").expect("client");
        let error = client.synthesize("   ").await.expect_err("empty text");
        assert!(matches!(error, SpeechClientError::SynthesisFailed(_)));
    }
}
