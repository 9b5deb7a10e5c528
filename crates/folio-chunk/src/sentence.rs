//! Sentence splitting.

use regex::Regex;

/// Splits a block of text into sentence-like units.
///
/// A boundary is terminal punctuation (`.`, `!`, `?`, optionally followed by
/// closing quotes or brackets) followed by whitespace, or a blank line.
/// Whitespace inside a sentence is collapsed to single spaces, so text
/// extracted with hard line breaks still yields one sentence per sentence.
pub struct SentenceSplitter {
    boundary: Regex,
}

impl SentenceSplitter {
    /// Create a new splitter.
    pub fn new() -> Self {
        Self {
            boundary: Regex::new(r#"[.!?]+["'”’)\]]*\s+|\n[ \t]*\n\s*"#)
                .expect("sentence boundary pattern is valid"),
        }
    }

    /// Split text into ordered, non-empty sentences.
    pub fn split(&self, text: &str) -> Vec<String> {
        let mut sentences = Vec::new();
        let mut start = 0;

        for boundary in self.boundary.find_iter(text) {
            push_normalized(&mut sentences, &text[start..boundary.end()]);
            start = boundary.end();
        }
        push_normalized(&mut sentences, &text[start..]);

        sentences
    }
}

impl Default for SentenceSplitter {
    fn default() -> Self {
        Self::new()
    }
}

fn push_normalized(sentences: &mut Vec<String>, raw: &str) {
    let sentence = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if !sentence.is_empty() {
        sentences.push(sentence);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_simple() {
        let splitter = SentenceSplitter::new();
        let sentences = splitter.split("The cat sat. It was calm. Chapter 2 begins now. New story starts.");
        assert_eq!(
            sentences,
            vec!["The cat sat.", "It was calm.", "Chapter 2 begins now.", "New story starts."]
        );
    }

    #[test]
    fn test_split_mixed_punctuation() {
        let splitter = SentenceSplitter::new();
        let sentences = splitter.split("Who goes there? He shouted \"Stop!\" Then silence. Fine...  Go on");
        assert_eq!(
            sentences,
            vec!["Who goes there?", "He shouted \"Stop!\"", "Then silence.", "Fine...", "Go on"]
        );
    }

    #[test]
    fn test_decimal_points_do_not_split() {
        let splitter = SentenceSplitter::new();
        let sentences = splitter.split("Pi is about 3.14 and e is 2.71. Done.");
        assert_eq!(sentences, vec!["Pi is about 3.14 and e is 2.71.", "Done."]);
    }

    #[test]
    fn test_line_breaks_collapse() {
        let splitter = SentenceSplitter::new();
        let sentences = splitter.split("It was the best\nof times, it was\n  the worst of times.");
        assert_eq!(sentences, vec!["It was the best of times, it was the worst of times."]);
    }

    #[test]
    fn test_blank_line_is_boundary() {
        let splitter = SentenceSplitter::new();
        let sentences = splitter.split("CHAPTER 1\n\nLoomings\n   \nCall me Ishmael.");
        assert_eq!(sentences, vec!["CHAPTER 1", "Loomings", "Call me Ishmael."]);
    }

    #[test]
    fn test_empty_and_whitespace() {
        let splitter = SentenceSplitter::new();
        assert!(splitter.split("").is_empty());
        assert!(splitter.split("  \n\t \n ").is_empty());
    }
}
