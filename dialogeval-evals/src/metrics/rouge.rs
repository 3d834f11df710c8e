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

//! ROUGE-L structural metric
//!
//! Measures how much of the seed's intended structure survives in the
//! dialogue, as the Longest Common Subsequence between two token streams:
//!
//! - **Reference**: expected-flow steps, factual context, constraints, objective
//! - **Hypothesis**: content of every non-tool turn
//!
//! ```text
//! P = LCS / |hypothesis|     R = LCS / |reference|     F1 = 2PR / (P + R)
//! ```
//!
//! F1 is symmetric in its inputs, so swapping reference and hypothesis yields
//! the same score.

use crate::text::tokenize_whitespace;
use crate::{EvalError, Metric, MetricKind};
use dialogeval_core::{Dialogue, Seed};
use tracing::debug;

/// ROUGE score components (precision, recall, F1)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RougeScore {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Structural overlap between the seed template and the dialogue
#[derive(Debug, Clone, Copy, Default)]
pub struct RougeLMetric;

impl RougeLMetric {
    pub fn new() -> Self {
        Self
    }

    /// ROUGE-L between two free texts
    pub fn rouge_l(&self, reference: &str, hypothesis: &str) -> RougeScore {
        let ref_tokens = tokenize_whitespace(reference);
        let hyp_tokens = tokenize_whitespace(hypothesis);

        if ref_tokens.is_empty() || hyp_tokens.is_empty() {
            return RougeScore::default();
        }

        let lcs = lcs_length(&ref_tokens, &hyp_tokens) as f64;
        let precision = lcs / hyp_tokens.len() as f64;
        let recall = lcs / ref_tokens.len() as f64;
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        RougeScore {
            precision,
            recall,
            f1,
        }
    }
}

/// LCS length via DP with two rotating rows sized to the shorter sequence
///
/// O(m·n) time, O(min(m, n)) space
pub fn lcs_length(a: &[String], b: &[String]) -> usize {
    let (short, long) = if a.len() < b.len() { (a, b) } else { (b, a) };

    let mut prev = vec![0usize; short.len() + 1];
    let mut curr = vec![0usize; short.len() + 1];

    for i in 1..=long.len() {
        for j in 1..=short.len() {
            curr[j] = if long[i - 1] == short[j - 1] {
                prev[j - 1] + 1
            } else {
                prev[j].max(curr[j - 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[short.len()]
}

impl Metric for RougeLMetric {
    fn kind(&self) -> MetricKind {
        MetricKind::RougeL
    }

    fn compute(&self, dialogue: &Dialogue, seed: &Seed) -> Result<f64, EvalError> {
        let score = self.rouge_l(&seed.reference_text(), &dialogue.content_text());
        debug!(
            dialogue_id = %dialogue.id,
            precision = score.precision,
            recall = score.recall,
            f1 = score.f1,
            "rouge_l computed"
        );
        Ok(score.f1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dialogeval_core::RoleSpec;

    fn tokens(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_lcs_length() {
        let a = tokens(&["a", "b", "c", "d"]);
        let b = tokens(&["b", "c", "d", "e"]);
        assert_eq!(lcs_length(&a, &b), 3);
        assert_eq!(lcs_length(&b, &a), 3);
        assert_eq!(lcs_length(&a, &[]), 0);
    }

    #[test]
    fn test_rouge_l_identical() {
        let metric = RougeLMetric::new();
        let text = "The quick brown fox";
        assert_eq!(metric.rouge_l(text, text).f1, 1.0);
    }

    #[test]
    fn test_rouge_l_disjoint() {
        let metric = RougeLMetric::new();
        assert_eq!(metric.rouge_l("alpha beta", "gamma delta").f1, 0.0);
    }

    #[test]
    fn test_rouge_l_partial() {
        let metric = RougeLMetric::new();
        // LCS = "the brown fox" over 5 tokens each side
        let score = metric.rouge_l("The quick brown fox jumps", "The brown fox runs quickly");
        assert!((score.precision - 0.6).abs() < 1e-12);
        assert!((score.recall - 0.6).abs() < 1e-12);
        assert!((score.f1 - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_rouge_l_symmetric() {
        let metric = RougeLMetric::new();
        let a = "verify the account then issue a refund";
        let b = "the agent will verify identity and refund";
        assert_eq!(metric.rouge_l(a, b).f1, metric.rouge_l(b, a).f1);
    }

    #[test]
    fn test_empty_inputs() {
        let metric = RougeLMetric::new();
        assert_eq!(metric.rouge_l("", "test").f1, 0.0);
        assert_eq!(metric.rouge_l("test", "   ").f1, 0.0);
    }

    #[test]
    fn test_compute_uses_seed_reference_and_skips_tool_turns() {
        let seed = Seed::new(
            "s",
            "support",
            vec![RoleSpec::new("user", ""), RoleSpec::new("agent", "")],
            "refund the order",
        );
        let dialogue = Dialogue::from_pairs(
            "d",
            [("user", "refund the order"), ("tool", "internal payload tokens")],
        );
        let score = RougeLMetric::new().compute(&dialogue, &seed).unwrap();
        assert_eq!(score, 1.0);
    }
}
