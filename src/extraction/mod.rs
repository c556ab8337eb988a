//! Per-page PDF text extraction.
//!
//! Pages come back in document order with their 0-based index. A page without a text layer
//! (a scanned image, for example) yields an empty string rather than an error; downstream
//! chunking simply sees no lines for it.

use lopdf::Document;
use thiserror::Error;

use crate::config::DEFAULT_MAX_DOCUMENT_BYTES;

const PDF_MAGIC: &[u8] = b"%PDF";

/// Errors raised while turning PDF bytes into page text.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The upload contained no bytes.
    #[error("document is empty")]
    Empty,
    /// The buffer exceeded the configured extraction limit.
    #[error("document is {size} bytes, above the {limit} byte limit")]
    TooLarge {
        /// Size of the rejected buffer.
        size: usize,
        /// Configured maximum.
        limit: usize,
    },
    /// The buffer does not start with a PDF header.
    #[error("document is not a PDF (missing %PDF header)")]
    NotPdf,
    /// The document is encrypted and cannot be read without a password.
    #[error("document is encrypted")]
    Encrypted,
    /// The PDF structure could not be parsed.
    #[error("failed to parse PDF: {0}")]
    Malformed(String),
    /// Text decoding failed on a specific page.
    #[error("failed to extract text from page {page}: {message}")]
    Page {
        /// 0-based index of the page where extraction stopped.
        page: usize,
        /// Parser diagnostic.
        message: String,
    },
}

impl ExtractionError {
    /// Page index where extraction stopped, when it could be determined.
    pub fn page(&self) -> Option<usize> {
        match self {
            Self::Page { page, .. } => Some(*page),
            _ => None,
        }
    }
}

/// Text extracted from one page of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// 0-based position of the page in the document.
    pub index: usize,
    /// Extracted text; empty when the page has no text layer.
    pub text: String,
}

/// Extracts text page by page from raw PDF bytes.
#[derive(Debug, Clone)]
pub struct PdfTextExtractor {
    max_bytes: usize,
}

impl PdfTextExtractor {
    /// Create an extractor with the default size limit.
    pub fn new() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
        }
    }

    /// Override the maximum document size accepted for extraction.
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Extract the text of every page, in document order.
    pub fn extract(&self, data: &[u8]) -> Result<Vec<Page>, ExtractionError> {
        if data.is_empty() {
            return Err(ExtractionError::Empty);
        }
        if data.len() > self.max_bytes {
            return Err(ExtractionError::TooLarge {
                size: data.len(),
                limit: self.max_bytes,
            });
        }
        if !data.starts_with(PDF_MAGIC) {
            return Err(ExtractionError::NotPdf);
        }

        let document =
            Document::load_mem(data).map_err(|error| ExtractionError::Malformed(error.to_string()))?;
        if document.is_encrypted() {
            return Err(ExtractionError::Encrypted);
        }

        let page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
        let mut pages = Vec::with_capacity(page_numbers.len());
        for (index, page_number) in page_numbers.into_iter().enumerate() {
            let raw = document
                .extract_text(&[page_number])
                .map_err(|error| ExtractionError::Page {
                    page: index,
                    message: error.to_string(),
                })?;
            let text = clean_page_text(&raw);
            if text.trim().is_empty() {
                tracing::debug!(page = index, "Page has no extractable text layer");
            }
            pages.push(Page { index, text });
        }

        tracing::debug!(
            pages = pages.len(),
            bytes = data.len(),
            "Extracted PDF text"
        );
        Ok(pages)
    }
}

impl Default for PdfTextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Drop control characters that PDF text decoding sometimes leaves behind, keeping line
/// breaks and tabs so line structure survives for the splitter.
fn clean_page_text(raw: &str) -> String {
    raw.chars()
        .filter(|c| matches!(c, '\n' | '\r' | '\t') || !c.is_control())
        .collect()
}


#[cfg(test)]
mod tests {
    use super::test_support::build_pdf;
    use super::*;

    #[test]
    fn extracts_pages_in_document_order() {
        let pdf = build_pdf(&[&["Photosynthesis basics"], &["Cellular respiration"]]);
        let pages = PdfTextExtractor::new().extract(&pdf).expect("extraction");

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].index, 0);
        assert_eq!(pages[1].index, 1);
        assert!(pages[0].text.contains("Photosynthesis basics"));
        assert!(pages[1].text.contains("Cellular respiration"));
    }

    #[test]
    fn page_without_text_yields_empty_string() {
        let pdf = build_pdf(&[&["Intro"], &[]]);
        let pages = PdfTextExtractor::new().extract(&pdf).expect("extraction");

        assert_eq!(pages.len(), 2);
        assert!(pages[1].text.trim().is_empty());
    }

    #[test]
    fn rejects_empty_and_non_pdf_buffers() {
        let extractor = PdfTextExtractor::new();
        assert!(matches!(extractor.extract(b""), Err(ExtractionError::Empty)));
        assert!(matches!(
            extractor.extract(b"plain text, not a pdf"),
            Err(ExtractionError::NotPdf)
        ));
    }

    #[test]
    fn rejects_truncated_pdf() {
        let error = PdfTextExtractor::new()
            .extract(b"%PDF-1.5\n1 0 obj << /Type /Catalog")
            .unwrap_err();
        assert!(matches!(error, ExtractionError::Malformed(_)));
        assert_eq!(error.page(), None);
    }

    #[test]
    fn enforces_size_limit() {
        let pdf = build_pdf(&[&["Too big"]]);
        let error = PdfTextExtractor::new()
            .with_max_bytes(16)
            .extract(&pdf)
            .unwrap_err();
        assert!(matches!(error, ExtractionError::TooLarge { limit: 16, .. }));
    }

    #[test]
    fn clean_page_text_keeps_line_structure() {
        assert_eq!(clean_page_text("a\u{0}b\nc\td"), "ab\nc\td");
    }
}
