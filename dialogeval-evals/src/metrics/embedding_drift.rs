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

//! Embedding drift metric
//!
//! How closely each conversational turn stays to the seed in embedding
//! space: the mean, over non-tool turns, of `max(0, cosine(turn, seed))`,
//! where the seed side is its reference text. Drift is best-effort like the
//! semantic judge and falls back to 0.5 on any embedding failure or timeout.

use super::block_on_or_neutral;
use super::semantic::DEFAULT_JUDGE_TIMEOUT;
use crate::llm_client::EmbeddingClient;
use crate::{EvalError, Metric, MetricKind};
use async_trait::async_trait;
use dialogeval_core::{Dialogue, Seed};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Cosine similarity, 0.0 when either vector has zero norm
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

pub struct EmbeddingDriftMetric {
    client: Arc<dyn EmbeddingClient>,
    timeout: Duration,
}

impl EmbeddingDriftMetric {
    pub fn new(client: Arc<dyn EmbeddingClient>) -> Self {
        Self {
            client,
            timeout: DEFAULT_JUDGE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn drift(&self, dialogue: &Dialogue, seed: &Seed) -> Result<f64, EvalError> {
        let mut texts = vec![seed.reference_text()];
        texts.extend(dialogue.content_turns().map(|t| t.content.clone()));
        if texts.len() == 1 {
            return Ok(0.0);
        }

        let embeddings = self
            .client
            .embed_batch(&texts)
            .await
            .map_err(|e| EvalError::LLMClientError(e.to_string()))?;
        if embeddings.len() != texts.len() {
            return Err(EvalError::LLMClientError(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            )));
        }

        let (reference, turns) = embeddings.split_at(1);
        let total: f64 = turns
            .iter()
            .map(|turn| cosine_similarity(turn, &reference[0]).max(0.0))
            .sum();
        Ok(total / turns.len() as f64)
    }

    /// Drift score bounded by the timeout, neutral on any failure
    pub async fn score(&self, dialogue: &Dialogue, seed: &Seed) -> f64 {
        let outcome = match tokio::time::timeout(self.timeout, self.drift(dialogue, seed)).await {
            Ok(result) => result,
            Err(_) => Err(EvalError::Timeout),
        };
        match outcome {
            Ok(score) => {
                debug!(dialogue_id = %dialogue.id, score, "embedding drift computed");
                score
            }
            Err(e) => {
                warn!(dialogue_id = %dialogue.id, error = %e, "embedding drift degraded to neutral");
                MetricKind::EmbeddingDrift.neutral()
            }
        }
    }
}

#[async_trait]
impl Metric for EmbeddingDriftMetric {
    fn kind(&self) -> MetricKind {
        MetricKind::EmbeddingDrift
    }

    fn compute(&self, dialogue: &Dialogue, seed: &Seed) -> Result<f64, EvalError> {
        Ok(block_on_or_neutral(self.kind(), self.score(dialogue, seed)))
    }

    async fn compute_async(&self, dialogue: &Dialogue, seed: &Seed) -> Result<f64, EvalError> {
        Ok(self.score(dialogue, seed).await)
    }
}
