//! Chapter heading detection.

use regex::Regex;

/// Detects chapter markers ("Chapter 12", "CHAP 3", "chap. 7") in a sentence.
///
/// Stateless: the same sentence always yields the same answer. Only the
/// first marker in a sentence counts.
pub struct ChapterDetector {
    pattern: Regex,
}

impl ChapterDetector {
    /// Create a new detector.
    pub fn new() -> Self {
        Self {
            pattern: Regex::new(r"(?i)\bchap(?:ter)?\.?\s*(\d+)").expect("chapter pattern is valid"),
        }
    }

    /// Return the chapter number announced by `sentence`, if any.
    pub fn detect(&self, sentence: &str) -> Option<u32> {
        self.pattern
            .captures(sentence)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }
}

impl Default for ChapterDetector {
    fn default() -> Self {
        Self::new()
    }
}
