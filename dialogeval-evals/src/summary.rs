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

//! Batch summary statistics

use crate::report::QualityReport;
use crate::MetricKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregate view over a batch of reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub pass_rate: f64,
    pub mean_composite: f64,
    /// Mean per metric over the reports where the metric is present
    pub metric_means: BTreeMap<MetricKind, f64>,
    /// How many reports failed each metric's threshold
    pub failure_counts: BTreeMap<String, usize>,
}

impl BatchSummary {
    pub fn from_reports(reports: &[QualityReport]) -> Self {
        let total = reports.len();
        let passed = reports.iter().filter(|r| r.passed()).count();

        let (pass_rate, mean_composite) = if total > 0 {
            (
                passed as f64 / total as f64,
                reports.iter().map(|r| r.composite_score()).sum::<f64>() / total as f64,
            )
        } else {
            (0.0, 0.0)
        };

        let mut sums: BTreeMap<MetricKind, (f64, usize)> = BTreeMap::new();
        for report in reports {
            for (kind, value) in report.metrics().iter() {
                let entry = sums.entry(kind).or_insert((0.0, 0));
                entry.0 += value;
                entry.1 += 1;
            }
        }
        let metric_means = sums
            .into_iter()
            .map(|(kind, (sum, count))| (kind, sum / count as f64))
            .collect();

        let mut failure_counts = BTreeMap::new();
        for failure in reports.iter().flat_map(|r| r.failures()) {
            let metric = failure.split_once('=').map_or(failure.as_str(), |(name, _)| name);
            *failure_counts.entry(metric.to_string()).or_insert(0) += 1;
        }

        Self {
            total,
            passed,
            failed: total - passed,
            pass_rate,
            mean_composite,
            metric_means,
            failure_counts,
        }
    }

    /// Metric that failed most often, ties broken by name
    pub fn most_common_failure(&self) -> Option<(&str, usize)> {
        self.failure_counts
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(name, count)| (name.as_str(), *count))
    }
}

impl std::fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Dialogues: {}/{} passed ({:.1}%), mean composite {:.3}",
            self.passed,
            self.total,
            self.pass_rate * 100.0,
            self.mean_composite
        )?;
        if let Some((metric, count)) = self.most_common_failure() {
            write!(f, ", most common failure {} ({})", metric, count)?;
        }
        Ok(())
    }
}
