use std::sync::OnceLock;

use regex::Regex;

/// A token with its byte span in the segmented text.
///
/// `start..end` indexes the UTF-8 input directly, so `&text[word.start..word.end]`
/// equals `word.word`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    /// Surface form.
    pub word: String,
    /// Inclusive byte offset.
    pub start: usize,
    /// Exclusive byte offset.
    pub end: usize,
}

/// A token paired with its part-of-speech tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// Surface form.
    pub word: String,
    /// Part-of-speech tag such as `ns` or `v`; empty when the engine gave none.
    pub tag: String,
}

impl Tag {
    /// Splits the engine's `word/tag` form on the last separator.
    pub(crate) fn parse(raw: &str) -> Self {
        static TAGGED: OnceLock<Regex> = OnceLock::new();
        let pattern = TAGGED.get_or_init(|| {
            Regex::new(r"(?s)^(.+)/([^/]+)$").expect("tag pattern is valid")
        });

        match pattern.captures(raw) {
            Some(captures) => Self {
                word: captures[1].to_string(),
                tag: captures[2].to_string(),
            },
            None => Self {
                word: raw.to_string(),
                tag: String::new(),
            },
        }
    }
}

/// Keyword returned by weighted extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct WordWeight {
    /// Keyword.
    pub word: String,
    /// TF-IDF relevance, larger is more relevant.
    pub weight: f64,
}
