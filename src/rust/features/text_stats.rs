use std::collections::HashSet;

use lazy_static::lazy_static;
use ndarray::Array2;
use regex::Regex;
use tokenizers::pre_tokenizers::bert::BertPreTokenizer;
use tokenizers::{OffsetReferential, OffsetType, PreTokenizedString, PreTokenizer};
use unicode_segmentation::UnicodeSegmentation;

use super::catalogue::{is_text_feature, STOP_WORDS};
use super::extractor::FeatureComputer;
use super::schema::FeatureSchema;
use super::vector::FeatureTable;
use crate::error::{EditorError, Result};

lazy_static! {
    static ref URL_PATTERN: Regex = Regex::new(r"https?://[^\s<>()]+|www\.[^\s<>()]+").unwrap();
}

/// Built-in feature computer deriving lexical and punctuation statistics.
///
/// Words and sentences follow Unicode segmentation rules (UAX #29); token pieces
/// come from the BERT pre-tokenizer, which also splits punctuation. Punctuation,
/// capitalisation and digit features are frequencies per character, so they stay
/// comparable between short and long texts. An empty text yields all zeros.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextStatistics;

impl TextStatistics {
    pub fn new() -> Self {
        Self
    }

    /// Computes every catalogue feature for one text
    pub fn measure(&self, text: &str) -> Result<TextMeasurements> {
        // Sentence segmentation underflows on an empty string
        if text.is_empty() {
            return Ok(TextMeasurements::default());
        }
        let num_chars = text.chars().count();
        let words: Vec<&str> = text.unicode_words().collect();
        let num_words = words.len();

        let lowercase: Vec<String> = words.iter().map(|w| w.to_lowercase()).collect();
        let unique: HashSet<&str> = lowercase.iter().map(String::as_str).collect();
        let stop_count = lowercase
            .iter()
            .filter(|w| STOP_WORDS.contains(w.as_str()))
            .count();
        let word_chars: usize = words.iter().map(|w| w.chars().count()).sum();

        let num_sentences = text
            .unicode_sentences()
            .filter(|s| !s.trim().is_empty())
            .count();

        Ok(TextMeasurements {
            num_chars: num_chars as f64,
            num_words: num_words as f64,
            num_diff_words: ratio(unique.len(), num_words),
            avg_word_len: ratio(word_chars, num_words),
            num_sentences: num_sentences as f64,
            avg_sentence_len: ratio(num_words, num_sentences),
            num_tokens: count_token_pieces(text)? as f64,
            num_stops: ratio(stop_count, num_words),
            num_questions: ratio(count_matching(text, |c| c == '?'), num_chars),
            num_periods: ratio(count_matching(text, |c| c == '.'), num_chars),
            num_commas: ratio(count_matching(text, |c| c == ','), num_chars),
            num_exclam: ratio(count_matching(text, |c| c == '!'), num_chars),
            num_quotes: ratio(
                count_matching(text, |c| matches!(c, '"' | '\u{201C}' | '\u{201D}')),
                num_chars,
            ),
            num_colon: ratio(count_matching(text, |c| c == ':'), num_chars),
            num_semicolon: ratio(count_matching(text, |c| c == ';'), num_chars),
            num_caps: ratio(count_matching(text, |c| c.is_uppercase()), num_chars),
            num_digits: ratio(count_matching(text, |c| c.is_ascii_digit()), num_chars),
            num_urls: URL_PATTERN.find_iter(text).count() as f64,
            num_line_breaks: text.matches('\n').count() as f64,
            has_question_mark: if text.contains('?') { 1.0 } else { 0.0 },
        })
    }
}

impl FeatureComputer for TextStatistics {
    fn compute(&self, texts: &[&str], schema: &FeatureSchema) -> Result<FeatureTable> {
        let unknown: Vec<&str> = schema
            .names()
            .iter()
            .map(String::as_str)
            .filter(|name| !is_text_feature(name))
            .collect();
        if !unknown.is_empty() {
            return Err(EditorError::Schema(format!(
                "Text statistics cannot compute features: {}",
                unknown.join(", ")
            )));
        }

        let mut values = Array2::zeros((texts.len(), schema.len()));
        for (row, text) in texts.iter().enumerate() {
            let measurements = self.measure(text)?;
            for (col, name) in schema.names().iter().enumerate() {
                // Catalogue membership was checked above
                let value = measurements.value(name).unwrap_or_default();
                values[[row, col]] = value as f32;
            }
        }

        FeatureTable::new(schema.names().to_vec(), values)
    }
}

/// Raw per-text measurements produced by [`TextStatistics::measure`]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TextMeasurements {
    pub num_chars: f64,
    pub num_words: f64,
    pub num_diff_words: f64,
    pub avg_word_len: f64,
    pub num_sentences: f64,
    pub avg_sentence_len: f64,
    pub num_tokens: f64,
    pub num_stops: f64,
    pub num_questions: f64,
    pub num_periods: f64,
    pub num_commas: f64,
    pub num_exclam: f64,
    pub num_quotes: f64,
    pub num_colon: f64,
    pub num_semicolon: f64,
    pub num_caps: f64,
    pub num_digits: f64,
    pub num_urls: f64,
    pub num_line_breaks: f64,
    pub has_question_mark: f64,
}

impl TextMeasurements {
    pub fn value(&self, name: &str) -> Option<f64> {
        let value = match name {
            "num_chars" => self.num_chars,
            "num_words" => self.num_words,
            "num_diff_words" => self.num_diff_words,
            "avg_word_len" => self.avg_word_len,
            "num_sentences" => self.num_sentences,
            "avg_sentence_len" => self.avg_sentence_len,
            "num_tokens" => self.num_tokens,
            "num_stops" => self.num_stops,
            "num_questions" => self.num_questions,
            "num_periods" => self.num_periods,
            "num_commas" => self.num_commas,
            "num_exclam" => self.num_exclam,
            "num_quotes" => self.num_quotes,
            "num_colon" => self.num_colon,
            "num_semicolon" => self.num_semicolon,
            "num_caps" => self.num_caps,
            "num_digits" => self.num_digits,
            "num_urls" => self.num_urls,
            "num_line_breaks" => self.num_line_breaks,
            "has_question_mark" => self.has_question_mark,
            _ => return None,
        };
        Some(value)
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn count_matching(text: &str, predicate: impl Fn(char) -> bool) -> usize {
    text.chars().filter(|&c| predicate(c)).count()
}

fn count_token_pieces(text: &str) -> Result<usize> {
    if text.trim().is_empty() {
        return Ok(0);
    }
    let mut pretokenized = PreTokenizedString::from(text);
    BertPreTokenizer
        .pre_tokenize(&mut pretokenized)
        .map_err(|e| EditorError::Schema(format!("Failed to pre-tokenize text: {}", e)))?;
    Ok(pretokenized
        .get_splits(OffsetReferential::Original, OffsetType::Char)
        .len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::catalogue::TEXT_FEATURES;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_question_measurements() {
        let m = TextStatistics::new().measure("Is this a good question?").unwrap();
        assert_eq!(m.num_chars, 24.0);
        assert_eq!(m.num_words, 5.0);
        assert_eq!(m.num_sentences, 1.0);
        assert_eq!(m.has_question_mark, 1.0);
        assert!(approx(m.num_questions, 1.0 / 24.0));
        assert!(approx(m.avg_word_len, 19.0 / 5.0));
        // "is", "this", "a" are stop words
        assert!(approx(m.num_stops, 3.0 / 5.0));
        // five words plus the question mark
        assert_eq!(m.num_tokens, 6.0);
    }

    #[test]
    fn test_empty_text_is_all_zero() {
        let m = TextStatistics::new().measure("").unwrap();
        assert_eq!(m, TextMeasurements::default());
    }

    #[test]
    fn test_whitespace_only_text_has_no_words() {
        for text in [" ", "\n", "\t \n"] {
            let m = TextStatistics::new().measure(text).unwrap();
            assert_eq!(m.num_words, 0.0);
            assert_eq!(m.num_sentences, 0.0);
            assert_eq!(m.num_tokens, 0.0);
        }
    }

    #[test]
    fn test_vocabulary_and_links() {
        let text = "The the THE cat.\nSee https://example.com/page for more!";
        let m = TextStatistics::new().measure(text).unwrap();
        assert_eq!(m.num_urls, 1.0);
        assert_eq!(m.num_line_breaks, 1.0);
        assert!(m.num_diff_words < 1.0);
        assert!(m.num_caps > 0.0);
    }

    #[test]
    fn test_every_catalogue_feature_is_measured() {
        let m = TextStatistics::new().measure("Hello: world; 42, \"quoted\"!").unwrap();
        for (name, _) in TEXT_FEATURES {
            assert!(m.value(name).is_some(), "missing measurement for {}", name);
        }
        assert!(m.value("polarity").is_none());
        assert!(m.num_digits > 0.0 && m.num_colon > 0.0 && m.num_semicolon > 0.0);
    }

    #[test]
    fn test_compute_rejects_unknown_columns() {
        let schema = FeatureSchema::new(["num_words", "polarity"]).unwrap();
        let result = TextStatistics::new().compute(&["text"], &schema);
        assert!(matches!(result, Err(EditorError::Schema(msg)) if msg.contains("polarity")));
    }

    #[test]
    fn test_compute_follows_schema_order() {
        let schema = FeatureSchema::new(["has_question_mark", "num_words"]).unwrap();
        let table = TextStatistics::new()
            .compute(&["one two?", "three"], &schema)
            .unwrap();
        assert_eq!(table.columns(), schema.names());
        assert_eq!(table.values()[[0, 0]], 1.0);
        assert_eq!(table.values()[[0, 1]], 2.0);
        assert_eq!(table.values()[[1, 0]], 0.0);
        assert_eq!(table.values()[[1, 1]], 1.0);
    }
}
