// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Memorization rate metric
//!
//! Fraction of the dialogue's word n-grams that also occur in a reference
//! corpus of texts the generator must not reproduce (published examples,
//! licensed transcripts, prior training data). Long n-grams (8 by default)
//! rarely collide by chance, so any meaningful overlap indicates copying.

use crate::text::{ngrams, tokenize_whitespace};
use crate::{EvalError, Metric, MetricKind};
use dialogeval_core::{Dialogue, Seed};
use std::collections::HashSet;
use tracing::debug;

/// Default n-gram length
pub const DEFAULT_NGRAM: usize = 8;

/// N-gram overlap between the dialogue and a fixed reference corpus
#[derive(Debug, Clone)]
pub struct MemorizationMetric {
    n: usize,
    corpus_ngrams: HashSet<String>,
}

impl MemorizationMetric {
    /// Index `corpus` with the default n-gram length
    pub fn new<S: AsRef<str>>(corpus: &[S]) -> Self {
        Self::with_ngram(corpus, DEFAULT_NGRAM)
    }

    /// Index `corpus` with n-grams of length `n` (at least 1)
    pub fn with_ngram<S: AsRef<str>>(corpus: &[S], n: usize) -> Self {
        let n = n.max(1);
        let corpus_ngrams = corpus
            .iter()
            .flat_map(|doc| ngrams(&tokenize_whitespace(doc.as_ref()), n))
            .collect();
        Self { n, corpus_ngrams }
    }

    pub fn ngram_len(&self) -> usize {
        self.n
    }

    /// Number of distinct n-grams indexed from the corpus
    pub fn corpus_size(&self) -> usize {
        self.corpus_ngrams.len()
    }

    /// Overlap rate of `text` against the corpus
    pub fn rate(&self, text: &str) -> f64 {
        if self.corpus_ngrams.is_empty() {
            return 0.0;
        }
        let grams = ngrams(&tokenize_whitespace(text), self.n);
        if grams.is_empty() {
            return 0.0;
        }
        let copied = grams
            .iter()
            .filter(|g| self.corpus_ngrams.contains(g.as_str()))
            .count();
        copied as f64 / grams.len() as f64
    }
}

impl Metric for MemorizationMetric {
    fn kind(&self) -> MetricKind {
        MetricKind::MemorizationRate
    }

    fn compute(&self, dialogue: &Dialogue, _seed: &Seed) -> Result<f64, EvalError> {
        let rate = self.rate(&dialogue.content_text());
        debug!(dialogue_id = %dialogue.id, n = self.n, rate, "memorization rate computed");
        Ok(rate)
    }
}
