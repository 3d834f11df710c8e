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

//! Metric vector and quality report

use crate::composite::{compute_composite_with, ThresholdTable};
use crate::MetricKind;
use serde::{Deserialize, Serialize};

/// Per-metric scores for one evaluation
///
/// The mandatory metrics and memorization rate are always present; a slot
/// whose metric was not registered keeps its neutral value. The two optional
/// model-backed metrics are `None` unless registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricVector {
    pub rouge_l: f64,
    pub fidelity: f64,
    pub lexical_diversity: f64,
    pub coherence: f64,
    pub tool_call_validity: f64,
    pub privacy_residual: f64,
    pub memorization_rate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_fidelity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_drift: Option<f64>,
}

impl Default for MetricVector {
    /// Neutral scores for every always-present slot, optional slots empty
    fn default() -> Self {
        let mut vector = Self {
            rouge_l: 0.0,
            fidelity: 0.0,
            lexical_diversity: 0.0,
            coherence: 0.0,
            tool_call_validity: 0.0,
            privacy_residual: 0.0,
            memorization_rate: 0.0,
            semantic_fidelity: None,
            embedding_drift: None,
        };
        for kind in MetricKind::ALL.into_iter().filter(|kind| !kind.is_optional()) {
            vector.set(kind, kind.neutral());
        }
        vector
    }
}

impl MetricVector {
    /// Builder form of [`set`](Self::set)
    pub fn with(mut self, kind: MetricKind, value: f64) -> Self {
        self.set(kind, value);
        self
    }

    pub fn set(&mut self, kind: MetricKind, value: f64) {
        match kind {
            MetricKind::RougeL => self.rouge_l = value,
            MetricKind::Fidelity => self.fidelity = value,
            MetricKind::LexicalDiversity => self.lexical_diversity = value,
            MetricKind::Coherence => self.coherence = value,
            MetricKind::ToolCallValidity => self.tool_call_validity = value,
            MetricKind::PrivacyResidual => self.privacy_residual = value,
            MetricKind::MemorizationRate => self.memorization_rate = value,
            MetricKind::SemanticFidelity => self.semantic_fidelity = Some(value),
            MetricKind::EmbeddingDrift => self.embedding_drift = Some(value),
        }
    }

    /// Score for `kind`, `None` only for an unregistered optional metric
    pub fn get(&self, kind: MetricKind) -> Option<f64> {
        match kind {
            MetricKind::RougeL => Some(self.rouge_l),
            MetricKind::Fidelity => Some(self.fidelity),
            MetricKind::LexicalDiversity => Some(self.lexical_diversity),
            MetricKind::Coherence => Some(self.coherence),
            MetricKind::ToolCallValidity => Some(self.tool_call_validity),
            MetricKind::PrivacyResidual => Some(self.privacy_residual),
            MetricKind::MemorizationRate => Some(self.memorization_rate),
            MetricKind::SemanticFidelity => self.semantic_fidelity,
            MetricKind::EmbeddingDrift => self.embedding_drift,
        }
    }

    /// Present entries in [`MetricKind::ALL`] order
    pub fn iter(&self) -> impl Iterator<Item = (MetricKind, f64)> + '_ {
        MetricKind::ALL
            .into_iter()
            .filter_map(move |kind| self.get(kind).map(|value| (kind, value)))
    }
}

/// Outcome of evaluating one dialogue against its seed
///
/// Built once by [`QualityReport::assemble`] and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    dialogue_id: String,
    seed_id: String,
    metrics: MetricVector,
    composite_score: f64,
    passed: bool,
    failures: Vec<String>,
}

impl QualityReport {
    /// Run the composite over `metrics` and freeze the result
    pub fn assemble(
        dialogue_id: impl Into<String>,
        seed_id: impl Into<String>,
        metrics: MetricVector,
        thresholds: &ThresholdTable,
    ) -> Self {
        let outcome = compute_composite_with(thresholds, &metrics);
        Self {
            dialogue_id: dialogue_id.into(),
            seed_id: seed_id.into(),
            metrics,
            composite_score: outcome.score,
            passed: outcome.passed,
            failures: outcome.failures,
        }
    }

    pub fn dialogue_id(&self) -> &str {
        &self.dialogue_id
    }

    pub fn seed_id(&self) -> &str {
        &self.seed_id
    }

    pub fn metrics(&self) -> &MetricVector {
        &self.metrics
    }

    pub fn composite_score(&self) -> f64 {
        self.composite_score
    }

    pub fn passed(&self) -> bool {
        self.passed
    }

    /// Failing comparisons as `metric=value (constraint)`, in table order
    pub fn failures(&self) -> &[String] {
        &self.failures
    }
}
