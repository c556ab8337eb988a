//! Approximate token counting for the generative input budget.
//!
//! Counting prefers `tiktoken-rs` encodings. Models the library does not know (Gemini, most
//! Ollama tags) are measured with `cl100k_base`, which is close enough for a safety margin.
//! When no BPE table can be loaded at all, a whitespace counter keeps requests flowing.

use anyhow::Error as TokenizerError;
use std::sync::Arc;
use tiktoken_rs::{
    CoreBPE, cl100k_base, get_bpe_from_model, o200k_base, p50k_base, p50k_edit, r50k_base,
};

/// Shared, thread-safe token estimator.
pub type TokenCounter = Arc<dyn Fn(&str) -> usize + Send + Sync>;

/// Build a token counter for the given generative model.
///
/// Never fails: an unknown model falls back to `cl100k_base`, and a tokenizer that cannot be
/// loaded falls back to whitespace counting (logged at `warn`).
pub fn build_token_counter(model: &str) -> TokenCounter {
    match build_tiktoken_counter(model) {
        Ok(counter) => counter,
        Err(error) => {
            tracing::warn!(
                model,
                error = %error,
                "Tokenizer unavailable; falling back to whitespace counter"
            );
            whitespace_token_counter()
        }
    }
}

fn build_tiktoken_counter(model: &str) -> Result<TokenCounter, TokenizerError> {
    let normalized = model.trim();
    let target = if normalized.is_empty() {
        "cl100k_base"
    } else {
        normalized
    };
    let encoding = Arc::new(resolve_encoding(target)?);

    Ok(Arc::new(move |segment: &str| {
        encoding.encode_ordinary(segment).len()
    }))
}

fn resolve_encoding(model: &str) -> Result<CoreBPE, TokenizerError> {
    match get_bpe_from_model(model) {
        Ok(encoding) => Ok(encoding),
        Err(model_err) => {
            tracing::debug!(
                model,
                error = %model_err,
                "Tokenizer model lookup failed; trying encoding name"
            );
            encoding_from_name(model).unwrap_or_else(cl100k_base)
        }
    }
}

fn encoding_from_name(name: &str) -> Option<Result<CoreBPE, TokenizerError>> {
    match name {
        "cl100k_base" => Some(cl100k_base()),
        "o200k_base" => Some(o200k_base()),
        "p50k_base" => Some(p50k_base()),
        "p50k_edit" => Some(p50k_edit()),
        "r50k_base" | "gpt2" => Some(r50k_base()),
        _ => None,
    }
}

/// Counts whitespace-separated words; non-empty text always counts as at least one token.
pub fn whitespace_token_counter() -> TokenCounter {
    Arc::new(|segment: &str| {
        let tokens = segment.split_whitespace().count();
        if tokens == 0 && !segment.is_empty() {
            1
        } else {
            tokens
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_counter_counts_words() {
        let counter = whitespace_token_counter();
        assert_eq!(counter("one two  three"), 3);
        assert_eq!(counter(""), 0);
        assert_eq!(counter("   "), 1);
    }

    #[test]
    fn unknown_models_use_cl100k() {
        let gemini = build_token_counter("gemini-1.5-flash");
        let reference = build_token_counter("cl100k_base");
        let text = "The quick brown fox jumps over the lazy dog.";
        assert_eq!(gemini(text), reference(text));
        assert!(gemini(text) > 0);
    }

    #[test]
    fn empty_model_name_defaults_to_cl100k() {
        let counter = build_token_counter("  ");
        assert_eq!(counter("hello world"), 2);
    }
}
