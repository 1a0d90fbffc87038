use crate::error::{Result, TriageError};
use crate::ml::models::FeatureConfig;
use crate::ml::text::TextPreprocessor;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// TF-IDF vectorizer over word n-grams of normalized complaint text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TfidfVectorizer {
    /// Configuration
    config: FeatureConfig,

    /// Vocabulary mapping (term -> column), columns assigned in term order
    vocabulary: BTreeMap<String, usize>,

    /// Inverse document frequency per column
    idf: Vec<f64>,

    /// Is fitted (vocabulary built)
    is_fitted: bool,
}

impl TfidfVectorizer {
    pub fn new(config: FeatureConfig) -> Self {
        Self {
            config,
            vocabulary: BTreeMap::new(),
            idf: Vec::new(),
            is_fitted: false,
        }
    }

    /// Build the vocabulary and IDF weights from normalized documents
    pub fn fit(&mut self, documents: &[String]) -> Result<()> {
        let n_docs = documents.len();
        if n_docs == 0 {
            return Err(TriageError::Data(
                "cannot fit a vectorizer on zero documents".to_string(),
            ));
        }

        let mut doc_freq: BTreeMap<String, usize> = BTreeMap::new();
        let mut corpus_freq: BTreeMap<String, usize> = BTreeMap::new();

        for doc in documents {
            let terms = self.extract_terms(doc);
            for term in &terms {
                *corpus_freq.entry(term.clone()).or_insert(0) += 1;
            }
            let unique: BTreeSet<String> = terms.into_iter().collect();
            for term in unique {
                *doc_freq.entry(term).or_insert(0) += 1;
            }
        }

        // Document-frequency ceiling is meaningless with a single document
        let max_df = if n_docs > 1 {
            (self.config.max_doc_ratio * n_docs as f64).floor() as usize
        } else {
            usize::MAX
        };

        let mut candidates: Vec<(String, usize)> = doc_freq
            .iter()
            .filter(|(_, &df)| df >= self.config.min_doc_freq && df <= max_df)
            .map(|(term, _)| (term.clone(), corpus_freq[term]))
            .collect();

        // Most frequent terms first, ties broken alphabetically
        candidates.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        candidates.truncate(self.config.max_vocab_size);

        let kept: BTreeSet<String> = candidates.into_iter().map(|(term, _)| term).collect();

        self.vocabulary = kept
            .into_iter()
            .enumerate()
            .map(|(idx, term)| (term, idx))
            .collect();

        // Smooth IDF: ln((1 + n) / (1 + df)) + 1
        let mut idf = vec![0.0; self.vocabulary.len()];
        for (term, &idx) in &self.vocabulary {
            let df = doc_freq[term] as f64;
            idf[idx] = ((1.0 + n_docs as f64) / (1.0 + df)).ln() + 1.0;
        }
        self.idf = idf;
        self.is_fitted = true;

        Ok(())
    }

    /// L2-normalized TF-IDF row for one normalized document
    pub fn transform(&self, document: &str) -> Result<Vec<f64>> {
        if !self.is_fitted {
            return Err(TriageError::NotTrained(
                "TfidfVectorizer must be fitted before transform".to_string(),
            ));
        }

        let mut row = vec![0.0; self.vocabulary.len()];
        let mut counts: BTreeMap<usize, usize> = BTreeMap::new();

        for term in self.extract_terms(document) {
            if let Some(&idx) = self.vocabulary.get(&term) {
                *counts.entry(idx).or_insert(0) += 1;
            }
        }

        let mut norm = 0.0;
        for (&idx, &count) in &counts {
            let tf = if self.config.sublinear_tf {
                1.0 + (count as f64).ln()
            } else {
                count as f64
            };
            let value = tf * self.idf[idx];
            row[idx] = value;
            norm += value * value;
        }

        if norm > 0.0 {
            let norm = norm.sqrt();
            for &idx in counts.keys() {
                row[idx] /= norm;
            }
        }

        Ok(row)
    }

    fn extract_terms(&self, document: &str) -> Vec<String> {
        let tokens = TextPreprocessor::tokenize(document);
        TextPreprocessor::ngrams(&tokens, self.config.ngram_range)
    }

    /// Get vocabulary size
    pub fn vocab_size(&self) -> usize {
        self.vocabulary.len()
    }

    /// Column index of a term, if it made it into the vocabulary
    pub fn term_index(&self, term: &str) -> Option<usize> {
        self.vocabulary.get(term).copied()
    }

    /// Check if fitted
    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}
