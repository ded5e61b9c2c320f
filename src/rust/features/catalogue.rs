use std::collections::{HashMap, HashSet};

use lazy_static::lazy_static;

/// Features the built-in `TextStatistics` computer knows how to derive, in their
/// canonical order, paired with the phrase used when explaining them.
pub const TEXT_FEATURES: &[(&str, &str)] = &[
    ("num_chars", "number of characters"),
    ("num_words", "word count"),
    ("num_diff_words", "vocabulary diversity"),
    ("avg_word_len", "vocabulary complexity"),
    ("num_sentences", "number of sentences"),
    ("avg_sentence_len", "sentence length"),
    ("num_tokens", "number of tokens"),
    ("num_stops", "frequency of stop words"),
    ("num_questions", "frequency of question marks"),
    ("num_periods", "frequency of periods"),
    ("num_commas", "frequency of commas"),
    ("num_exclam", "frequency of exclamation points"),
    ("num_quotes", "frequency of quotation marks"),
    ("num_colon", "frequency of colons"),
    ("num_semicolon", "frequency of semicolons"),
    ("num_caps", "frequency of capital letters"),
    ("num_digits", "frequency of digits"),
    ("num_urls", "number of links"),
    ("num_line_breaks", "number of line breaks"),
    ("has_question_mark", "presence of a question mark"),
];

lazy_static! {
    static ref DISPLAY_NAMES: HashMap<&'static str, &'static str> =
        TEXT_FEATURES.iter().copied().collect();

    pub(crate) static ref STOP_WORDS: HashSet<&'static str> = [
        "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any",
        "are", "as", "at", "be", "because", "been", "before", "being", "below", "between",
        "both", "but", "by", "can", "could", "did", "do", "does", "doing", "down", "during",
        "each", "few", "for", "from", "further", "had", "has", "have", "having", "he", "her",
        "here", "hers", "him", "his", "how", "i", "if", "in", "into", "is", "it", "its",
        "itself", "just", "me", "more", "most", "my", "no", "nor", "not", "now", "of", "off",
        "on", "once", "only", "or", "other", "our", "out", "over", "own", "same", "she",
        "should", "so", "some", "such", "than", "that", "the", "their", "them", "then",
        "there", "these", "they", "this", "those", "through", "to", "too", "under", "until",
        "up", "very", "was", "we", "were", "what", "when", "where", "which", "while", "who",
        "whom", "why", "will", "with", "would", "you", "your",
    ]
    .into_iter()
    .collect();
}

/// Returns true when `name` is a feature the built-in computer can produce
pub fn is_text_feature(name: &str) -> bool {
    DISPLAY_NAMES.contains_key(name)
}

/// Human readable phrase for a feature.
///
/// Unknown names fall back to the identifier with underscores turned into spaces,
/// so `word_count` reads as "word count".
pub fn display_name(name: &str) -> String {
    match DISPLAY_NAMES.get(name) {
        Some(display) => (*display).to_string(),
        None => name.replace('_', " "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names() {
        assert_eq!(display_name("num_questions"), "frequency of question marks");
        assert_eq!(display_name("word_count"), "word count");
        assert_eq!(display_name("x"), "x");
    }

    #[test]
    fn test_catalogue_has_no_duplicates() {
        let unique: HashSet<_> = TEXT_FEATURES.iter().map(|(name, _)| *name).collect();
        assert_eq!(unique.len(), TEXT_FEATURES.len());
        assert!(is_text_feature("num_words"));
        assert!(!is_text_feature("polarity"));
    }

    #[test]
    fn test_stop_words_are_lowercase() {
        assert!(STOP_WORDS.contains("the"));
        assert!(STOP_WORDS.iter().all(|w| w.chars().all(|c| c.is_lowercase())));
    }
}
