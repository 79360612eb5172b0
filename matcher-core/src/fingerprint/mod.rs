//! # Fingerprinting
//!
//! Term-frequency fingerprints over transcript text, cosine similarity, and
//! smoothed inverse-document-frequency weighting over a small reference
//! corpus.
//!
//! Cosine on term counts is robust to speech-to-text noise while staying
//! cheap; callers keep the raw vector next to the weighted one so the same
//! transcript can be re-weighted against different reference subsets without
//! re-tokenizing.

use std::collections::HashMap;

#[cfg(test)]
mod tests;

/// Minimum token length retained by the tokenizer
const MIN_TOKEN_LEN: usize = 3;

/// Split text into comparable tokens.
///
/// Lowercases the input, splits on runs of non-alphanumeric characters, and
/// keeps tokens of at least three characters.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= MIN_TOKEN_LEN)
        .map(str::to_lowercase)
}

/// A token-weight vector with a cached Euclidean norm.
///
/// A fingerprint with no tokens (or zero norm) is the distinguished empty
/// value; similarity with it is always 0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fingerprint {
    weights: HashMap<String, f64>,
    norm: f64,
}

impl Fingerprint {
    /// The empty fingerprint
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a term-frequency fingerprint from raw text
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        let mut weights: HashMap<String, f64> = HashMap::new();
        for token in tokenize(text) {
            *weights.entry(token).or_insert(0.0) += 1.0;
        }
        Self::from_weights(weights)
    }

    /// Build from an explicit token-weight map, dropping non-positive weights
    #[must_use]
    pub fn from_weights(mut weights: HashMap<String, f64>) -> Self {
        weights.retain(|_, w| *w > 0.0);
        let norm = weights.values().map(|w| w * w).sum::<f64>().sqrt();
        if norm == 0.0 {
            return Self::empty();
        }
        Self { weights, norm }
    }

    /// Whether this fingerprint can participate in similarity
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty() || self.norm == 0.0
    }

    /// Number of distinct tokens
    #[must_use]
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Cached Euclidean norm of the weight vector
    #[must_use]
    pub fn norm(&self) -> f64 {
        self.norm
    }

    /// Weight of a single token, 0 when absent
    #[must_use]
    pub fn weight(&self, token: &str) -> f64 {
        self.weights.get(token).copied().unwrap_or(0.0)
    }

    /// Iterate over the token-weight pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.weights.iter().map(|(t, w)| (t.as_str(), *w))
    }

    /// Re-weight by an IDF table.
    ///
    /// Each weight becomes `weight × idf(token)`; zero products are dropped
    /// and the norm is recomputed. An all-zero result is the empty
    /// fingerprint.
    #[must_use]
    pub fn reweight(&self, idf: &IdfTable) -> Fingerprint {
        let weights: HashMap<String, f64> = self
            .weights
            .iter()
            .filter_map(|(token, w)| {
                let weighted = w * idf.weight(token);
                (weighted > 0.0).then(|| (token.clone(), weighted))
            })
            .collect();
        Self::from_weights(weights)
    }
}

/// Cosine similarity between two fingerprints.
///
/// Returns 0 when either side is empty, has zero norm, or shares no tokens
/// with the other. Symmetric and bounded in `[0, 1]` because weights are
/// non-negative.
#[must_use]
pub fn cosine(a: &Fingerprint, b: &Fingerprint) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    // Iterate the smaller map
    let (small, large) = if a.weights.len() <= b.weights.len() {
        (a, b)
    } else {
        (b, a)
    };
    let dot: f64 = small
        .weights
        .iter()
        .map(|(token, w)| w * large.weight(token))
        .sum();
    if dot == 0.0 {
        return 0.0;
    }
    (dot / (a.norm * b.norm)).min(1.0)
}

/// Smoothed inverse-document-frequency table over a reference corpus.
///
/// `idf(t) = ln((n + 1) / (df(t) + 1))` where `df(t)` counts references
/// containing `t`. The +1 smoothing keeps weights non-negative and stops
/// single-reference tokens from exploding in a corpus this small. Tokens
/// absent from the corpus weigh 0 and disappear on reweighting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdfTable {
    weights: HashMap<String, f64>,
}

impl IdfTable {
    /// Build the table from a reference corpus.
    ///
    /// Declined (returns `None`) for corpora of fewer than two documents;
    /// downstream then compares raw vectors.
    #[must_use]
    pub fn build<'a, I>(corpus: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Fingerprint>,
    {
        let docs: Vec<&Fingerprint> = corpus.into_iter().collect();
        if docs.len() < 2 {
            return None;
        }

        let mut document_frequency: HashMap<String, usize> = HashMap::new();
        for doc in &docs {
            for (token, _) in doc.iter() {
                *document_frequency.entry(token.to_string()).or_insert(0) += 1;
            }
        }

        let n = docs.len() as f64;
        let weights = document_frequency
            .into_iter()
            .map(|(token, df)| (token, ((n + 1.0) / (df as f64 + 1.0)).ln()))
            .collect();
        Some(Self { weights })
    }

    /// IDF weight of a token, 0 when the corpus never saw it
    #[must_use]
    pub fn weight(&self, token: &str) -> f64 {
        self.weights.get(token).copied().unwrap_or(0.0)
    }

    /// Number of tokens the corpus contributed
    #[must_use]
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Whether the table carries any tokens
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}
