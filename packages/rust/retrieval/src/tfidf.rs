//! Sparse TF-IDF vectors over the chunk corpus, compared by cosine
//! similarity. Vectors are unit length, so similarity is a dot product.

use std::collections::{HashMap, HashSet};

/// Simple stop words to filter out common English words.
const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "is", "it", "in", "on", "of", "to", "and", "or", "for", "with", "this",
    "that", "be", "are", "was", "were", "been", "being", "have", "has", "had", "do", "does",
    "did", "will", "would", "could", "should", "may", "might", "can", "shall", "not", "no",
    "but", "if", "at", "by", "as", "into", "about", "up", "out", "so", "its", "you", "your",
    "i", "my", "we", "our", "they", "them", "their", "how", "what",
];

/// term index → weight, sorted by term index.
type SparseVector = Vec<(usize, f32)>;

#[derive(Debug, Clone, Default)]
pub(crate) struct TfIdfIndex {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f32>,
    vectors: Vec<SparseVector>,
}

impl TfIdfIndex {
    pub fn build<S: AsRef<str>>(documents: &[S]) -> Self {
        if documents.is_empty() {
            return Self::default();
        }
        let n = documents.len() as f32;
        let tokenized: Vec<Vec<String>> = documents.iter().map(|d| tokenize(d.as_ref())).collect();

        let mut vocabulary: HashMap<String, usize> = HashMap::new();
        let mut doc_freq: Vec<f32> = Vec::new();
        for tokens in &tokenized {
            let unique: HashSet<&str> = tokens.iter().map(String::as_str).collect();
            for term in unique {
                let idx = match vocabulary.get(term) {
                    Some(&idx) => idx,
                    None => {
                        let idx = vocabulary.len();
                        vocabulary.insert(term.to_string(), idx);
                        doc_freq.push(0.0);
                        idx
                    }
                };
                doc_freq[idx] += 1.0;
            }
        }

        // Smoothed IDF: ln(N / df) + 1 keeps terms present everywhere non-zero.
        let idf: Vec<f32> = doc_freq
            .iter()
            .map(|df| (n / df.max(1.0)).ln() + 1.0)
            .collect();

        let mut index = Self {
            vocabulary,
            idf,
            vectors: Vec::with_capacity(tokenized.len()),
        };
        index.vectors = tokenized.iter().map(|t| index.vectorize(t)).collect();
        index
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Up to `k` `(document index, similarity)` pairs, best first. Documents
    /// sharing no term with the query are not returned.
    pub fn search(&self, query: &str, k: usize) -> Vec<(usize, f32)> {
        if self.is_empty() || k == 0 {
            return Vec::new();
        }
        let q = self.vectorize(&tokenize(query));
        if q.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, dot(&q, v)))
            .filter(|(_, s)| *s > 0.0)
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);
        scored
    }

    fn vectorize(&self, tokens: &[String]) -> SparseVector {
        let mut tf: HashMap<usize, f32> = HashMap::new();
        for token in tokens {
            if let Some(&idx) = self.vocabulary.get(token) {
                *tf.entry(idx).or_insert(0.0) += 1.0;
            }
        }

        let mut vector: SparseVector = tf
            .into_iter()
            .map(|(idx, count)| (idx, count * self.idf[idx]))
            .collect();
        vector.sort_unstable_by_key(|(idx, _)| *idx);

        let norm = vector.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
        if norm > 0.0 {
            for (_, w) in &mut vector {
                *w /= norm;
            }
        }
        vector
    }
}

/// Tokenize text: lowercase, split on non-alphanumeric (keeping `_`), drop
/// single characters and stop words.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| w.chars().count() > 1 && !STOP_WORDS.contains(w))
        .map(str::to_string)
        .collect()
}

/// Dot product of two index-sorted sparse vectors.
fn dot(a: &[(usize, f32)], b: &[(usize, f32)]) -> f32 {
    let (mut i, mut j, mut sum) = (0, 0, 0.0);
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                sum += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    sum
}
