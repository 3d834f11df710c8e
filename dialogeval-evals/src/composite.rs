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

//! Gated-minimum composite score
//!
//! Reduces a [`MetricVector`] to one scalar, a pass flag and the ordered list
//! of failing comparisons. Every threshold is checked so the failure list is
//! complete, then:
//!
//! - any gate failure (privacy residual, memorization rate) forces the score
//!   to 0.0 and the dialogue fails, whatever the other metrics say
//! - otherwise the score is the minimum of the non-gate metrics present, and
//!   the dialogue passes only when nothing failed

use crate::report::MetricVector;
use crate::MetricKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a metric value is compared against its bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    /// value >= bound
    AtLeast,
    /// value == bound
    Exactly,
    /// value < bound
    Below,
}

impl Comparison {
    pub fn holds(&self, value: f64, bound: f64) -> bool {
        match self {
            Comparison::AtLeast => value >= bound,
            Comparison::Exactly => value == bound,
            Comparison::Below => value < bound,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Comparison::AtLeast => ">=",
            Comparison::Exactly => "==",
            Comparison::Below => "<",
        }
    }
}

/// One row of the threshold table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub metric: MetricKind,
    pub comparison: Comparison,
    pub bound: f64,
}

impl Threshold {
    pub const fn new(metric: MetricKind, comparison: Comparison, bound: f64) -> Self {
        Self {
            metric,
            comparison,
            bound,
        }
    }

    pub fn check(&self, value: f64) -> bool {
        self.comparison.holds(value, self.bound)
    }

    /// Human-readable constraint, e.g. `>= 0.65`
    pub fn constraint(&self) -> String {
        format!("{} {:.2}", self.comparison.symbol(), self.bound)
    }

    /// Failure entry in the `metric=value (constraint)` form
    ///
    /// The value is printed unrounded.
    pub fn describe_failure(&self, value: f64) -> String {
        format!("{}={} ({})", self.metric, value, self.constraint())
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.metric, self.constraint())
    }
}

/// Ordered threshold table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdTable {
    thresholds: Vec<Threshold>,
}

impl ThresholdTable {
    pub fn new(thresholds: Vec<Threshold>) -> Self {
        Self { thresholds }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Threshold> {
        self.thresholds.iter()
    }

    pub fn get(&self, metric: MetricKind) -> Option<&Threshold> {
        self.thresholds.iter().find(|t| t.metric == metric)
    }
}

impl Default for ThresholdTable {
    fn default() -> Self {
        use Comparison::*;
        use MetricKind::*;

        Self::new(vec![
            Threshold::new(RougeL, AtLeast, 0.65),
            Threshold::new(Fidelity, AtLeast, 0.90),
            Threshold::new(LexicalDiversity, AtLeast, 0.55),
            Threshold::new(Coherence, AtLeast, 0.85),
            Threshold::new(ToolCallValidity, AtLeast, 0.90),
            Threshold::new(PrivacyResidual, Exactly, 0.0),
            Threshold::new(MemorizationRate, Below, 0.01),
            Threshold::new(SemanticFidelity, AtLeast, 0.60),
            Threshold::new(EmbeddingDrift, AtLeast, 0.40),
        ])
    }
}

/// Result of the composite function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeOutcome {
    pub score: f64,
    pub passed: bool,
    pub failures: Vec<String>,
}

/// Composite under the default threshold table
pub fn compute_composite(metrics: &MetricVector) -> CompositeOutcome {
    compute_composite_with(&ThresholdTable::default(), metrics)
}

/// Composite under an explicit threshold table
///
/// Thresholds for metrics absent from the vector are skipped.
pub fn compute_composite_with(table: &ThresholdTable, metrics: &MetricVector) -> CompositeOutcome {
    let mut failures = Vec::new();
    let mut gate_failed = false;

    for threshold in table.iter() {
        let Some(value) = metrics.get(threshold.metric) else {
            continue;
        };
        if !threshold.check(value) {
            failures.push(threshold.describe_failure(value));
            gate_failed |= threshold.metric.is_gate();
        }
    }

    if gate_failed {
        return CompositeOutcome {
            score: 0.0,
            passed: false,
            failures,
        };
    }

    let score = metrics
        .iter()
        .filter(|(kind, _)| !kind.is_gate())
        .map(|(_, value)| value)
        .reduce(f64::min)
        .unwrap_or(0.0);

    CompositeOutcome {
        score,
        passed: failures.is_empty(),
        failures,
    }
}
