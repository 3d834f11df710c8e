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

//! # Dialogeval Quality Engine
//!
//! Scores a generated multi-turn dialogue against the seed that produced it
//! and decides whether the dialogue is fit for use as training data.
//!
//! ## Features
//!
//! - **Trait-based metric system**: every metric implements [`Metric`]
//! - **Deterministic core**: ROUGE-L, factual fidelity, lexical diversity,
//!   coherence, tool-call validity and privacy residual need no network
//! - **Gated composite**: privacy and memorization gates zero the score
//! - **Best-effort enrichment**: LLM judge and embedding drift degrade to a
//!   neutral score instead of failing the evaluation
//! - **Batch evaluation**: sequential by default, order-preserving parallel
//!
//! ## Example
//!
//! ```rust,ignore
//! use dialogeval_core::{Dialogue, RoleSpec, Seed};
//! use dialogeval_evals::QualityEvaluator;
//!
//! let seed = Seed::new(
//!     "seed-42",
//!     "customer_support",
//!     vec![RoleSpec::new("customer", ""), RoleSpec::new("agent", "")],
//!     "Resolve a duplicate charge on the customer's card",
//! );
//! let dialogue = Dialogue::from_pairs("dlg-7", [("customer", "..."), ("agent", "...")]);
//!
//! let report = QualityEvaluator::new().evaluate(&dialogue, &seed)?;
//! if !report.passed() {
//!     for failure in report.failures() {
//!         println!("{failure}");
//!     }
//! }
//! ```

use async_trait::async_trait;
use dialogeval_core::{CoreError, Dialogue, Seed};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub mod composite;
pub mod config;
pub mod evaluator;
pub mod llm_client;
pub mod local;
pub mod metrics;
pub mod report;
pub mod summary;
pub mod text;

pub use composite::{compute_composite, Comparison, CompositeOutcome, Threshold, ThresholdTable};
pub use config::EvalConfig;
pub use evaluator::QualityEvaluator;
pub use report::{MetricVector, QualityReport};
pub use summary::BatchSummary;

/// Core trait that all metrics implement
///
/// `compute` is the synchronous contract the orchestrator relies on.
/// Metrics backed by a remote model override `compute_async` with a
/// non-blocking inference path; the default delegates to `compute`.
#[async_trait]
pub trait Metric: Send + Sync {
    /// Which slot of the metric vector this metric fills
    fn kind(&self) -> MetricKind;

    /// Score `dialogue` against `seed`, nominally in [0.0, 1.0]
    fn compute(&self, dialogue: &Dialogue, seed: &Seed) -> Result<f64, EvalError>;

    /// Non-blocking variant used by [`QualityEvaluator::evaluate_async`]
    async fn compute_async(&self, dialogue: &Dialogue, seed: &Seed) -> Result<f64, EvalError> {
        self.compute(dialogue, seed)
    }
}

/// Every metric the engine knows how to aggregate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    RougeL,
    Fidelity,
    LexicalDiversity,
    Coherence,
    ToolCallValidity,
    PrivacyResidual,
    MemorizationRate,
    SemanticFidelity,
    EmbeddingDrift,
}

impl MetricKind {
    pub const ALL: [MetricKind; 9] = [
        MetricKind::RougeL,
        MetricKind::Fidelity,
        MetricKind::LexicalDiversity,
        MetricKind::Coherence,
        MetricKind::ToolCallValidity,
        MetricKind::PrivacyResidual,
        MetricKind::MemorizationRate,
        MetricKind::SemanticFidelity,
        MetricKind::EmbeddingDrift,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MetricKind::RougeL => "rouge_l",
            MetricKind::Fidelity => "fidelity",
            MetricKind::LexicalDiversity => "lexical_diversity",
            MetricKind::Coherence => "coherence",
            MetricKind::ToolCallValidity => "tool_call_validity",
            MetricKind::PrivacyResidual => "privacy_residual",
            MetricKind::MemorizationRate => "memorization_rate",
            MetricKind::SemanticFidelity => "semantic_fidelity",
            MetricKind::EmbeddingDrift => "embedding_drift",
        }
    }

    /// Gate metrics zero the composite score when they fail
    pub fn is_gate(&self) -> bool {
        matches!(self, MetricKind::PrivacyResidual | MetricKind::MemorizationRate)
    }

    /// Optional model-backed metrics, omitted from the vector unless registered
    pub fn is_optional(&self) -> bool {
        matches!(self, MetricKind::SemanticFidelity | MetricKind::EmbeddingDrift)
    }

    /// Score used when the metric is not registered or cannot produce a value
    pub fn neutral(&self) -> f64 {
        match self {
            MetricKind::ToolCallValidity => 1.0,
            MetricKind::SemanticFidelity | MetricKind::EmbeddingDrift => 0.5,
            _ => 0.0,
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors that can occur during evaluation
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Batch length mismatch: {dialogues} dialogue(s) but {seeds} seed(s)")]
    BatchLengthMismatch { dialogues: usize, seeds: usize },

    #[error("Validation failed: {0}")]
    Validation(#[from] CoreError),

    #[error("Metric {metric} failed: {reason}")]
    Metric { metric: MetricKind, reason: String },

    #[error("LLM client error: {0}")]
    LLMClientError(String),

    #[error("Evaluation timeout")]
    Timeout,

    #[error("Evaluation task failed: {0}")]
    Panic(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_kind_names_are_unique() {
        let names: std::collections::HashSet<_> =
            MetricKind::ALL.iter().map(MetricKind::name).collect();
        assert_eq!(names.len(), MetricKind::ALL.len());
    }

    #[test]
    fn test_metric_kind_serializes_as_name() {
        for kind in MetricKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.name()));
        }
    }

    #[test]
    fn test_gates_and_neutrals() {
        assert!(MetricKind::PrivacyResidual.is_gate());
        assert!(MetricKind::MemorizationRate.is_gate());
        assert!(!MetricKind::RougeL.is_gate());
        assert_eq!(MetricKind::ToolCallValidity.neutral(), 1.0);
        assert_eq!(MetricKind::SemanticFidelity.neutral(), 0.5);
        assert_eq!(MetricKind::Coherence.neutral(), 0.0);
    }

    #[test]
    fn test_batch_mismatch_message() {
        let err = EvalError::BatchLengthMismatch {
            dialogues: 3,
            seeds: 2,
        };
        assert_eq!(
            err.to_string(),
            "Batch length mismatch: 3 dialogue(s) but 2 seed(s)"
        );
    }
}
