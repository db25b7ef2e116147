//! Text helpers shared by the clusterer and the data processor.
//!
//! Tokenization is CJK-aware: Latin words are lowercased and kept at length
//! >= 2, CJK runs are expanded into character bigrams, digit runs are kept
//! verbatim. This replaces a whitespace word tokenizer which yields one token
//! per sentence for unsegmented Chinese text.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid regex"));
static LATIN_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z]+").expect("valid regex"));

/// Strip HTML tags and collapse whitespace.
pub fn clean_text(text: &str) -> String {
    let without_tags = HTML_TAG.replace_all(text, "");
    WHITESPACE.replace_all(&without_tags, " ").trim().to_string()
}

pub fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{F900}'..='\u{FAFF}')
}

/// Character n-grams over CJK runs of the text.
pub fn cjk_ngrams(text: &str, min_len: usize, max_len: usize) -> Vec<String> {
    let mut grams = Vec::new();
    let mut run: Vec<char> = Vec::new();
    let mut flush = |run: &mut Vec<char>, grams: &mut Vec<String>| {
        for n in min_len..=max_len {
            if run.len() < n {
                break;
            }
            for window in run.windows(n) {
                grams.push(window.iter().collect());
            }
        }
        run.clear();
    };

    for c in text.chars() {
        if is_cjk(c) {
            run.push(c);
        } else {
            flush(&mut run, &mut grams);
        }
    }
    flush(&mut run, &mut grams);
    grams
}

/// Digit runs in the text (dates, counts, versions).
pub fn digit_runs(text: &str) -> Vec<String> {
    DIGIT_RUN.find_iter(text).map(|m| m.as_str().to_string()).collect()
}

/// Capitalized Latin words, a cheap stand-in for named entities.
pub fn capitalized_tokens(text: &str) -> Vec<String> {
    text.split_whitespace()
        .filter(|w| w.chars().next().is_some_and(|c| c.is_ascii_uppercase()))
        .map(|w| w.to_string())
        .collect()
}

/// Whether the text contains any Latin letters.
pub fn has_latin(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_alphabetic())
}

/// CJK-aware tokenization: lowercased Latin words (len >= 2), CJK character
/// bigrams, and digit runs.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens: Vec<String> = LATIN_WORD
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .filter(|w| w.len() >= 2)
        .collect();
    tokens.extend(cjk_ngrams(text, 2, 2));
    tokens.extend(digit_runs(text));
    tokens
}

/// Character set of a string (used by the title-similarity grouping).
pub fn char_set(text: &str) -> HashSet<char> {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Jaccard similarity of two sets.
pub fn jaccard<T: std::hash::Hash + Eq>(a: &HashSet<T>, b: &HashSet<T>) -> f64 {
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 { 0.0 } else { intersection as f64 / union as f64 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_strips_tags_and_whitespace() {
        assert_eq!(clean_text("<p>Hello   <b>world</b></p>\n"), "Hello world");
    }

    #[test]
    fn tokenize_mixes_latin_cjk_and_digits() {
        let tokens = tokenize("OpenAI 发布GPT 2024");
        assert!(tokens.contains(&"openai".to_string()));
        assert!(tokens.contains(&"发布".to_string()));
        assert!(tokens.contains(&"2024".to_string()));
    }

    #[test]
    fn cjk_ngrams_cover_short_runs() {
        let grams = cjk_ngrams("中国经济", 2, 4);
        assert!(grams.contains(&"中国".to_string()));
        assert!(grams.contains(&"中国经济".to_string()));
        assert!(!grams.contains(&"中".to_string()));
    }

    #[test]
    fn jaccard_handles_empty_sets() {
        let a: HashSet<char> = HashSet::new();
        let b: HashSet<char> = HashSet::new();
        assert_eq!(jaccard(&a, &b), 0.0);
    }
}
