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

//! Dialog coherence metric
//!
//! Weighted combination of four heuristics over the turn sequence:
//!
//! | Component                | Weight | Signal                                        |
//! |--------------------------|--------|-----------------------------------------------|
//! | Turn-pair coherence      | 0.35   | adjacent turns share vocabulary, not verbatim |
//! | Role alternation         | 0.25   | speakers take turns                           |
//! | Progressive flow         | 0.20   | no duplicate turns, no collapse to empty      |
//! | Referential consistency  | 0.20   | later turns refer back to earlier material    |
//!
//! Dialogues with fewer than two turns have nothing to be incoherent about and
//! score 1.0.

use crate::text::{jaccard, token_set};
use crate::{EvalError, Metric, MetricKind};
use dialogeval_core::{Dialogue, Seed, Turn};
use std::collections::HashSet;
use tracing::debug;

const TURN_PAIR_WEIGHT: f64 = 0.35;
const ROLE_ALTERNATION_WEIGHT: f64 = 0.25;
const PROGRESSIVE_FLOW_WEIGHT: f64 = 0.20;
const REFERENTIAL_WEIGHT: f64 = 0.20;

/// Tokens must be longer than two characters to count as content words
const MIN_TOKEN_LEN: usize = 3;

/// Below this similarity adjacent turns look like topic jumps
const TOPIC_JUMP_SIMILARITY: f64 = 0.02;
/// Above this similarity adjacent turns look like verbatim repetition
const REPETITION_SIMILARITY: f64 = 0.6;

/// Second-half turns may shrink to this fraction of first-half length
/// before the flow is considered collapsed
const LENGTH_COLLAPSE_RATIO: f64 = 0.3;

/// Component scores behind a coherence value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoherenceBreakdown {
    pub turn_pair: f64,
    pub role_alternation: f64,
    pub progressive_flow: f64,
    pub referential: f64,
}

impl CoherenceBreakdown {
    pub fn score(&self) -> f64 {
        TURN_PAIR_WEIGHT * self.turn_pair
            + ROLE_ALTERNATION_WEIGHT * self.role_alternation
            + PROGRESSIVE_FLOW_WEIGHT * self.progressive_flow
            + REFERENTIAL_WEIGHT * self.referential
    }
}

/// Structural coherence of the conversation
#[derive(Debug, Clone, Copy, Default)]
pub struct DialogCoherenceMetric;

impl DialogCoherenceMetric {
    pub fn new() -> Self {
        Self
    }

    /// Component scores; `None` for dialogues shorter than two turns
    pub fn breakdown(&self, dialogue: &Dialogue) -> Option<CoherenceBreakdown> {
        if dialogue.turns.len() < 2 {
            return None;
        }
        let sets: Vec<HashSet<String>> = dialogue
            .turns
            .iter()
            .map(|t| token_set(&t.content, MIN_TOKEN_LEN))
            .collect();

        Some(CoherenceBreakdown {
            turn_pair: turn_pair_coherence(&sets),
            role_alternation: role_alternation(&dialogue.turns),
            progressive_flow: progressive_flow(&dialogue.turns),
            referential: referential_consistency(&dialogue.turns, &sets),
        })
    }
}

/// Map the mean adjacent Jaccard similarity onto a coherence score
fn turn_pair_coherence(sets: &[HashSet<String>]) -> f64 {
    let pairs = sets.len().saturating_sub(1);
    if pairs == 0 {
        return 1.0;
    }
    let mean = sets.windows(2).map(|w| jaccard(&w[0], &w[1])).sum::<f64>() / pairs as f64;

    if mean < TOPIC_JUMP_SIMILARITY {
        mean * 20.0
    } else if mean > REPETITION_SIMILARITY {
        (1.0 - (mean - REPETITION_SIMILARITY)).max(0.3)
    } else {
        (0.5 + mean).min(1.0)
    }
}

/// Fraction of adjacent speaking turns whose roles differ
fn role_alternation(turns: &[Turn]) -> f64 {
    let roles: Vec<String> = turns
        .iter()
        .filter(|t| !t.is_tool_or_system())
        .map(|t| t.role.to_lowercase())
        .collect();
    if roles.len() < 2 {
        return 1.0;
    }
    let alternating = roles.windows(2).filter(|w| w[0] != w[1]).count();
    alternating as f64 / (roles.len() - 1) as f64
}

/// 0.6 × uniqueness + 0.4 × length stability
fn progressive_flow(turns: &[Turn]) -> f64 {
    let normalized: Vec<String> = turns
        .iter()
        .map(|t| t.content.trim().to_lowercase())
        .collect();
    let distinct: HashSet<&str> = normalized.iter().map(String::as_str).collect();
    let uniqueness = distinct.len() as f64 / turns.len() as f64;

    0.6 * uniqueness + 0.4 * length_stability(turns)
}

/// Compare mean word count of the second half against the first half
///
/// Natural shortening is tolerated down to [`LENGTH_COLLAPSE_RATIO`]; below
/// that the score falls linearly to 0.0 for empty turns.
fn length_stability(turns: &[Turn]) -> f64 {
    let mid = turns.len() / 2;
    let (first, second) = turns.split_at(mid);
    let mean_len = |half: &[Turn]| -> f64 {
        if half.is_empty() {
            return 0.0;
        }
        half.iter()
            .map(|t| t.content.split_whitespace().count())
            .sum::<usize>() as f64
            / half.len() as f64
    };

    let first_mean = mean_len(first);
    if first_mean == 0.0 {
        return 1.0;
    }
    let ratio = mean_len(second) / first_mean;
    if ratio >= LENGTH_COLLAPSE_RATIO {
        1.0
    } else {
        ratio / LENGTH_COLLAPSE_RATIO
    }
}

/// From the third turn on, fraction of non-tool turns that reuse at least one
/// token seen in any strictly earlier turn
fn referential_consistency(turns: &[Turn], sets: &[HashSet<String>]) -> f64 {
    if turns.len() < 3 {
        return 1.0;
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for set in &sets[..2] {
        seen.extend(set.iter().map(String::as_str));
    }

    let mut eligible = 0usize;
    let mut referencing = 0usize;
    for (turn, set) in turns.iter().zip(sets).skip(2) {
        if !turn.is_tool_turn() {
            eligible += 1;
            if set.iter().any(|token| seen.contains(token.as_str())) {
                referencing += 1;
            }
        }
        seen.extend(set.iter().map(String::as_str));
    }

    if eligible == 0 {
        1.0
    } else {
        referencing as f64 / eligible as f64
    }
}

impl Metric for DialogCoherenceMetric {
    fn kind(&self) -> MetricKind {
        MetricKind::Coherence
    }

    fn compute(&self, dialogue: &Dialogue, _seed: &Seed) -> Result<f64, EvalError> {
        let Some(breakdown) = self.breakdown(dialogue) else {
            return Ok(1.0);
        };
        let score = breakdown.score();
        debug!(
            dialogue_id = %dialogue.id,
            turn_pair = breakdown.turn_pair,
            role_alternation = breakdown.role_alternation,
            progressive_flow = breakdown.progressive_flow,
            referential = breakdown.referential,
            score,
            "coherence computed"
        );
        Ok(score)
    }
}
