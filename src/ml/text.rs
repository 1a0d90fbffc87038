//! Spanish complaint text normalisation and keyword detection

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").expect("valid regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Keywords whose presence signals an urgent complaint
pub const URGENT_KEYWORDS: &[&str] = &[
    "urgente",
    "grave",
    "critico",
    "crítico",
    "emergencia",
    "falta",
    "no hay",
    "necesitamos",
];

const MEDICAL_TERMS: &[&str] = &["medico", "médico", "doctor", "hospital", "salud"];
const WATER_TERMS: &[&str] = &["agua", "potable", "saneamiento"];
const SECURITY_TERMS: &[&str] = &["segur", "peligr", "violen"];
const EDUCATION_TERMS: &[&str] = &["escuela", "educacion", "educación", "biblioteca"];

/// Topics a complaint can mention
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    Medical,
    Water,
    Security,
    Education,
}

impl Topic {
    fn terms(&self) -> &'static [&'static str] {
        match self {
            Topic::Medical => MEDICAL_TERMS,
            Topic::Water => WATER_TERMS,
            Topic::Security => SECURITY_TERMS,
            Topic::Education => EDUCATION_TERMS,
        }
    }
}

/// Text preprocessing utilities
pub struct TextPreprocessor;

impl TextPreprocessor {
    /// Normalize text: lowercase, NFKC, non-alphanumerics to spaces, collapsed whitespace.
    ///
    /// Accented letters (á, é, ñ, ü ...) survive because NFKC keeps them composed
    /// and they are alphanumeric.
    pub fn normalize(text: &str) -> String {
        if text.trim().is_empty() {
            return String::new();
        }

        let lowered: String = text.to_lowercase().nfkc().collect();
        let cleaned = NON_WORD.replace_all(&lowered, " ");
        WHITESPACE.replace_all(&cleaned, " ").trim().to_string()
    }

    /// Split normalized text into tokens of at least two characters
    pub fn tokenize(normalized: &str) -> Vec<String> {
        normalized
            .split_whitespace()
            .filter(|w| w.chars().count() >= 2)
            .map(|w| w.to_string())
            .collect()
    }

    /// Generate word n-grams over `tokens` for every n in `range` (inclusive)
    pub fn ngrams(tokens: &[String], range: (usize, usize)) -> Vec<String> {
        let (min_n, max_n) = (range.0.max(1), range.1.max(range.0.max(1)));
        let mut terms = Vec::new();

        for n in min_n..=max_n {
            for window in tokens.windows(n) {
                terms.push(window.join(" "));
            }
        }

        terms
    }

    /// Number of distinct urgent keywords present in normalized text
    pub fn urgent_keyword_count(normalized: &str) -> usize {
        URGENT_KEYWORDS
            .iter()
            .filter(|keyword| normalized.contains(*keyword))
            .count()
    }

    /// Whether normalized text mentions a topic
    pub fn mentions(normalized: &str, topic: Topic) -> bool {
        topic.terms().iter().any(|term| normalized.contains(term))
    }

    /// Word count of normalized text
    pub fn word_count(normalized: &str) -> usize {
        normalized.split_whitespace().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_keeps_accents() {
        let text = "¡Faltan MÉDICOS en el hospital!!   Urgente...";
        assert_eq!(
            TextPreprocessor::normalize(text),
            "faltan médicos en el hospital urgente"
        );
    }

    #[test]
    fn test_normalize_decomposed_input() {
        // "e" followed by a combining acute accent composes to "é"
        let text = "me\u{0301}dico";
        assert_eq!(TextPreprocessor::normalize(text), "médico");
    }

    #[test]
    fn test_normalize_empty() {
        assert_eq!(TextPreprocessor::normalize(""), "");
        assert_eq!(TextPreprocessor::normalize("   "), "");
        assert_eq!(TextPreprocessor::normalize("?!...,"), "");
    }

    #[test]
    fn test_tokenize_drops_single_chars() {
        let tokens = TextPreprocessor::tokenize("no hay agua y luz");
        assert_eq!(tokens, vec!["no", "hay", "agua", "luz"]);
    }

    #[test]
    fn test_ngram_extraction() {
        let tokens = TextPreprocessor::tokenize("faltan médicos urgente");
        let terms = TextPreprocessor::ngrams(&tokens, (1, 3));

        assert_eq!(terms.len(), 6);
        assert!(terms.contains(&"faltan médicos".to_string()));
        assert!(terms.contains(&"faltan médicos urgente".to_string()));
    }

    #[test]
    fn test_urgent_keywords() {
        assert_eq!(
            TextPreprocessor::urgent_keyword_count("faltan médicos urgente"),
            2
        );
        assert_eq!(
            TextPreprocessor::urgent_keyword_count("no hay agua es una emergencia"),
            2
        );
        assert_eq!(TextPreprocessor::urgent_keyword_count(""), 0);
    }

    #[test]
    fn test_topic_mentions() {
        let text = TextPreprocessor::normalize("Las calles son peligrosas y no hay médico");
        assert!(TextPreprocessor::mentions(&text, Topic::Security));
        assert!(TextPreprocessor::mentions(&text, Topic::Medical));
        assert!(!TextPreprocessor::mentions(&text, Topic::Water));
        assert!(!TextPreprocessor::mentions(&text, Topic::Education));
    }

    #[test]
    fn test_word_count() {
        assert_eq!(TextPreprocessor::word_count("necesitamos más bibliotecas"), 3);
        assert_eq!(TextPreprocessor::word_count(""), 0);
    }
}
