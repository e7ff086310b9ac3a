//! Sparse TF-IDF vectors.
//!
//! ```text
//! tfidf(t, d) = tf(t, d) * idf(t)
//! tf(t, d)    = occurrences of t in d
//! idf(t)      = ln((1 + n) / (1 + df(t))) + 1
//! ```
//!
//! where `n` is the number of documents the vectorizer was fitted on and
//! `df(t)` the number of those containing `t`. Vectors are L2 normalized.
//!
//! Columns are assigned in sorted term order and vectors keep their entries
//! sorted by column, so every sum is taken in the same order and repeated runs
//! produce bit-identical scores.

use regex::Regex;
use std::{
    cmp::Ordering,
    collections::{BTreeMap, BTreeSet},
    sync::LazyLock,
};

// Two or more word characters; an optional '#' keeps inline hashtags apart
// from plain words.
static TOKEN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#?\w\w+").expect("hardcoded token regex is invalid"));

/// Lowercased terms of `document` in order of appearance.
pub fn tokenize(document: &str) -> impl Iterator<Item = String> + '_ {
    TOKEN_REGEX
        .find_iter(document)
        .map(|token| token.as_str().to_lowercase())
}

#[derive(Clone, PartialEq, Debug, Default)]
pub struct SparseVector {
    // sorted by column, no duplicate columns
    entries: Vec<(usize, f64)>,
}

impl SparseVector {
    fn from_sorted(entries: Vec<(usize, f64)>) -> Self {
        Self { entries }
    }

    #[must_use]
    pub fn entries(&self) -> &[(usize, f64)] {
        &self.entries
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.entries.iter().all(|&(_, weight)| weight == 0.0)
    }

    #[must_use]
    pub fn dot(&self, other: &SparseVector) -> f64 {
        let (mut left, mut right) = (0, 0);
        let mut sum = 0.0;

        while left < self.entries.len() && right < other.entries.len() {
            let (left_column, left_weight) = self.entries[left];
            let (right_column, right_weight) = other.entries[right];

            match left_column.cmp(&right_column) {
                Ordering::Less => left += 1,
                Ordering::Greater => right += 1,
                Ordering::Equal => {
                    sum += left_weight * right_weight;
                    left += 1;
                    right += 1;
                }
            }
        }

        sum
    }

    #[must_use]
    pub fn norm(&self) -> f64 {
        self.entries
            .iter()
            .map(|&(_, weight)| weight * weight)
            .sum::<f64>()
            .sqrt()
    }

    fn normalized(mut self) -> Self {
        let norm = self.norm();
        if norm > 0.0 {
            for (_, weight) in &mut self.entries {
                *weight /= norm;
            }
        }
        self
    }
}

/// Cosine of the angle between two vectors. Zero vectors are orthogonal to
/// everything.
#[must_use]
pub fn cosine_similarity(a: &SparseVector, b: &SparseVector) -> f64 {
    let denominator = a.norm() * b.norm();
    if denominator == 0.0 {
        return 0.0;
    }

    a.dot(b) / denominator
}

/// Vocabulary and inverse document frequencies learned from a corpus.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct TfidfVectorizer {
    vocabulary: BTreeMap<String, usize>,
    idf: Vec<f64>,
}

impl TfidfVectorizer {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fit<S: AsRef<str>>(documents: &[S]) -> Self {
        let mut document_frequency: BTreeMap<String, usize> = BTreeMap::new();
        for document in documents {
            let terms: BTreeSet<String> = tokenize(document.as_ref()).collect();
            for term in terms {
                *document_frequency.entry(term).or_default() += 1;
            }
        }

        let document_count = documents.len() as f64;
        let mut vocabulary = BTreeMap::new();
        let mut idf = Vec::with_capacity(document_frequency.len());
        for (column, (term, frequency)) in document_frequency.into_iter().enumerate() {
            idf.push(((1.0 + document_count) / (1.0 + frequency as f64)).ln() + 1.0);
            vocabulary.insert(term, column);
        }

        Self { vocabulary, idf }
    }

    #[must_use]
    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vocabulary.is_empty()
    }

    #[must_use]
    pub fn column(&self, term: &str) -> Option<usize> {
        self.vocabulary.get(term).copied()
    }

    #[must_use]
    pub fn idf(&self, term: &str) -> Option<f64> {
        self.column(term).map(|column| self.idf[column])
    }

    /// Projects `document` into the fitted vocabulary.
    ///
    /// Terms the vectorizer was not fitted on carry no weight at all, so a
    /// document made only of unseen terms maps to the zero vector.
    #[must_use]
    pub fn transform(&self, document: &str) -> SparseVector {
        let mut counts: BTreeMap<usize, u32> = BTreeMap::new();
        for term in tokenize(document) {
            if let Some(column) = self.column(&term) {
                *counts.entry(column).or_default() += 1;
            }
        }

        let entries = counts
            .into_iter()
            .map(|(column, count)| (column, f64::from(count) * self.idf[column]))
            .collect();

        SparseVector::from_sorted(entries).normalized()
    }
}
