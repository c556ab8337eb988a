//! Line-accumulating chunk splitter.
//!
//! Page text is consumed line by line, in page order, and packed into chunks whose length
//! (in characters, counting the line break appended after every line) stays within the
//! configured budget. Lines are never cut: a line that cannot fit the budget on its own is
//! emitted whole as a single-line chunk. Pages are not pre-joined, so no line ever spans a
//! page boundary.

use serde::Deserialize;

use super::types::{Chunk, ChunkingError};

/// What happens to the accumulator when a page ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageBoundary {
    /// Keep accumulating across pages; only the budget seals a chunk.
    #[default]
    Continue,
    /// Seal whatever has accumulated at the end of every page.
    SealAtPageEnd,
}

/// Splits extracted page text into bounded-size [`Chunk`]s.
#[derive(Debug, Clone)]
pub struct ChunkSplitter {
    chunk_size: usize,
    page_boundary: PageBoundary,
}

impl ChunkSplitter {
    /// Build a splitter with the given character budget.
    ///
    /// A zero budget is a configuration error.
    pub fn new(chunk_size: usize) -> Result<Self, ChunkingError> {
        if chunk_size == 0 {
            return Err(ChunkingError::InvalidChunkSize);
        }
        Ok(Self {
            chunk_size,
            page_boundary: PageBoundary::Continue,
        })
    }

    /// Select the page-boundary policy.
    pub fn with_page_boundary(mut self, page_boundary: PageBoundary) -> Self {
        self.page_boundary = page_boundary;
        self
    }

    /// Character budget per chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Split page texts into chunks, assigning ordinals in sealing order.
    pub fn split<S: AsRef<str>>(&self, pages: &[S]) -> Vec<Chunk> {
        let mut accumulator = Accumulator::default();
        let mut chunks = Vec::new();

        for page in pages {
            for line in page.as_ref().lines() {
                let line_chars = line.chars().count();
                if !accumulator.is_empty()
                    && accumulator.chars + line_chars + 1 > self.chunk_size
                {
                    chunks.push(accumulator.seal(chunks.len()));
                }
                accumulator.push_line(line, line_chars);
            }

            if self.page_boundary == PageBoundary::SealAtPageEnd && !accumulator.is_empty() {
                chunks.push(accumulator.seal(chunks.len()));
            }
        }

        if !accumulator.is_empty() {
            chunks.push(accumulator.seal(chunks.len()));
        }

        tracing::trace!(
            chunk_size = self.chunk_size,
            chunks = chunks.len(),
            "Split page text"
        );
        chunks
    }
}

/// Convenience wrapper: validate `chunk_size` and split in one call.
pub fn split_pages<S: AsRef<str>>(
    pages: &[S],
    chunk_size: usize,
) -> Result<Vec<Chunk>, ChunkingError> {
    Ok(ChunkSplitter::new(chunk_size)?.split(pages))
}

#[derive(Default)]
struct Accumulator {
    text: String,
    chars: usize,
    lines: usize,
}

impl Accumulator {
    fn is_empty(&self) -> bool {
        self.lines == 0
    }

    fn push_line(&mut self, line: &str, line_chars: usize) {
        self.text.push_str(line);
        self.text.push('\n');
        self.chars += line_chars + 1;
        self.lines += 1;
    }

    fn seal(&mut self, ordinal: usize) -> Chunk {
        let taken = std::mem::take(self);
        Chunk {
            ordinal,
            text: taken.text,
            char_count: taken.chars,
            line_count: taken.lines,
        }
    }
}
