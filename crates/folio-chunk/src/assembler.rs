//! Greedy chunk assembly over a page-ordered sentence stream.
//!
//! Sentences are packed into the chunk in progress until the next one would
//! exceed `max_tokens`. The chunk is then emitted and the next chunk is
//! seeded with the last `overlap_tokens` tokens of the emitted text. A new
//! chapter heading emits the chunk in progress and starts over with no
//! overlap. A single sentence is never split, so a sentence larger than the
//! budget becomes an oversized chunk of its own.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use folio_core::{Chunk, ChunkConfig, Chunker, FolioError, Page, Result, TokenCounter};

use crate::{ChapterDetector, SentenceSplitter};

/// Chunk in progress.
#[derive(Default)]
struct Pending {
    text: String,
    start_page: Option<u32>,
}

impl Pending {
    fn seeded(text: String, page: u32) -> Self {
        Self {
            text,
            start_page: Some(page),
        }
    }

    /// The text this chunk would hold with `sentence` appended.
    fn joined(&self, sentence: &str) -> String {
        if self.text.is_empty() {
            sentence.to_string()
        } else {
            format!("{} {}", self.text, sentence)
        }
    }

    fn accept(&mut self, text: String, page: u32) {
        if self.text.is_empty() {
            self.start_page = Some(page);
        }
        self.text = text;
    }

    fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Sentence-aware, chapter-aware chunker.
pub struct ChunkAssembler {
    counter: Arc<dyn TokenCounter>,
    splitter: SentenceSplitter,
    detector: ChapterDetector,
}

impl ChunkAssembler {
    /// Create an assembler counting tokens with `counter`.
    pub fn new(counter: Arc<dyn TokenCounter>) -> Self {
        Self {
            counter,
            splitter: SentenceSplitter::new(),
            detector: ChapterDetector::new(),
        }
    }

    /// Assemble chunks from pages in order.
    pub fn assemble(&self, pages: &[Page], config: &ChunkConfig) -> Result<Vec<Chunk>> {
        self.assemble_with_cancel(pages, config, &CancellationToken::new())
    }

    /// Assemble chunks, giving up with `Cancelled` between pages once
    /// `cancel` fires. No partial list is returned.
    pub fn assemble_with_cancel(
        &self,
        pages: &[Page],
        config: &ChunkConfig,
        cancel: &CancellationToken,
    ) -> Result<Vec<Chunk>> {
        config.validate()?;
        check_page_order(pages)?;

        let mut chunks = Vec::new();
        let mut pending = Pending::default();
        let mut chapter: Option<u32> = None;
        let mut page_no = pages.first().map(|p| p.number).unwrap_or(0);

        for page in pages {
            if cancel.is_cancelled() {
                return Err(FolioError::Cancelled);
            }
            page_no = page.number;

            for sentence in self.splitter.split(&page.text) {
                if let Some(next) = self.detector.detect(&sentence) {
                    if chapter != Some(next) {
                        debug!(page = page_no, from = ?chapter, to = next, "chapter boundary");
                        emit(&mut chunks, std::mem::take(&mut pending), chapter, page_no);
                        chapter = Some(next);
                    }
                }

                // Count the joined text, not a sum of parts: the separator and
                // merges across it cost tokens too.
                let candidate = pending.joined(&sentence);
                if self.counter.count(&candidate)? > config.max_tokens {
                    let emitted = emit(&mut chunks, std::mem::take(&mut pending), chapter, page_no);
                    pending = self.start_after(emitted, sentence, page_no, config)?;
                } else {
                    pending.accept(candidate, page_no);
                }
            }
        }

        emit(&mut chunks, pending, chapter, page_no);

        debug!(
            pages = pages.len(),
            chunks = chunks.len(),
            encoding = self.counter.encoding(),
            "assembled chunks"
        );
        Ok(chunks)
    }

    /// Start the next chunk after an overflow: overlap seed plus sentence,
    /// or the sentence alone when the seed would push it over budget.
    fn start_after(
        &self,
        emitted: Option<&str>,
        sentence: String,
        page: u32,
        config: &ChunkConfig,
    ) -> Result<Pending> {
        let seed = match emitted {
            Some(text) if config.overlap_tokens > 0 => self.counter.tail(text, config.overlap_tokens)?,
            _ => String::new(),
        };

        if !seed.trim().is_empty() {
            let text = format!("{} {}", seed.trim(), sentence);
            if self.counter.count(&text)? <= config.max_tokens {
                return Ok(Pending::seeded(text, page));
            }
        }

        let sentence_tokens = self.counter.count(&sentence)?;
        if sentence_tokens > config.max_tokens {
            debug!(page, tokens = sentence_tokens, "sentence exceeds budget, keeping oversized chunk");
        }
        Ok(Pending::seeded(sentence, page))
    }
}

impl Chunker for ChunkAssembler {
    fn chunk_pages(&self, pages: &[Page], config: &ChunkConfig) -> Result<Vec<Chunk>> {
        self.assemble(pages, config)
    }
}

/// Emit the chunk in progress if it has content. Returns the emitted text.
fn emit(chunks: &mut Vec<Chunk>, pending: Pending, chapter: Option<u32>, page: u32) -> Option<&str> {
    if pending.is_blank() {
        return None;
    }
    let page_start = pending.start_page.unwrap_or(page);
    chunks.push(Chunk::text(pending.text, page_start, page, chapter));
    chunks.last().map(|c| c.text.as_str())
}

fn check_page_order(pages: &[Page]) -> Result<()> {
    for pair in pages.windows(2) {
        if pair[1].number <= pair[0].number {
            return Err(FolioError::invalid_argument(format!(
                "pages must be in increasing order (page {} follows page {})",
                pair[1].number, pair[0].number
            )));
        }
    }
    Ok(())
}
