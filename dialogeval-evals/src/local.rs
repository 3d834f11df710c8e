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

//! Local/offline embedding support
//!
//! Embedding drift can run without a network by projecting text into a
//! fixed-dimension bag-of-words space with feature hashing. The vectors
//! capture lexical overlap only, which is enough for offline runs, tests and
//! benchmarks; plug an [`OpenAIClient`](crate::llm_client::OpenAIClient) in
//! for semantic embeddings.

use crate::llm_client::{EmbedError, EmbeddingClient};
use crate::text::word_tokens;
use async_trait::async_trait;
use std::hash::Hasher;
use twox_hash::XxHash64;

/// Standard size for small sentence-embedding models
pub const DEFAULT_DIMENSIONS: usize = 384;

/// Deterministic feature-hashing embedder
///
/// Each word token is hashed with xxHash64 into one of `dimensions` buckets,
/// with a second hash bit choosing the sign so collisions tend to cancel.
/// The result is L2-normalised; text without tokens embeds to the zero vector.
#[derive(Debug, Clone)]
pub struct HashingEmbeddingClient {
    dimensions: usize,
}

impl HashingEmbeddingClient {
    pub fn new() -> Self {
        Self::with_dimensions(DEFAULT_DIMENSIONS)
    }

    pub fn with_dimensions(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed_sync(&self, text: &str) -> Vec<f64> {
        let mut vec = vec![0.0; self.dimensions];
        for token in word_tokens(text, 1) {
            let mut hasher = XxHash64::with_seed(0);
            hasher.write(token.as_bytes());
            let hash = hasher.finish();
            let bucket = (hash % self.dimensions as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vec[bucket] += sign;
        }

        let norm = vec.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm > 0.0 {
            vec.iter_mut().for_each(|x| *x /= norm);
        }
        vec
    }
}

impl Default for HashingEmbeddingClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingClient for HashingEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f64>, EmbedError> {
        Ok(self.embed_sync(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f64>>, EmbedError> {
        Ok(texts.iter().map(|t| self.embed_sync(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f64], b: &[f64]) -> f64 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn test_deterministic_and_normalised() {
        let client = HashingEmbeddingClient::new();
        let a = client.embed("refund the duplicate charge").await.unwrap();
        let b = client.embed("refund the duplicate charge").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), DEFAULT_DIMENSIONS);
        assert!((dot(&a, &a) - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_empty_text_is_zero_vector() {
        let client = HashingEmbeddingClient::with_dimensions(16);
        let v = client.embed("  ...  ").await.unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn test_overlap_beats_disjoint() {
        let client = HashingEmbeddingClient::new();
        let batch = client
            .embed_batch(&[
                "reset my account password".to_string(),
                "please reset the password".to_string(),
                "volcanic basalt erosion".to_string(),
            ])
            .await
            .unwrap();
        assert!(dot(&batch[0], &batch[1]) > dot(&batch[0], &batch[2]));
    }
}
