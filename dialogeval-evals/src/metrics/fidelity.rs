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

//! Factual fidelity metric
//!
//! How faithfully the dialogue follows its seed. Five sub-scores, combined
//! with normalized weights:
//!
//! | Sub-score        | Weight |
//! |------------------|--------|
//! | Role compliance  | 0.25   |
//! | Flow adherence   | 0.25   |
//! | Turn count       | 0.15   |
//! | Context presence | 0.20   |
//! | Tool compliance  | 0.15   |

use crate::text::{token_set, word_tokens};
use crate::{EvalError, Metric, MetricKind};
use dialogeval_core::{Dialogue, Seed, TurnRange, IMPLICIT_ROLES};
use std::collections::BTreeSet;
use tracing::debug;

const ROLE_WEIGHT: f64 = 0.25;
const FLOW_WEIGHT: f64 = 0.25;
const TURN_COUNT_WEIGHT: f64 = 0.15;
const CONTEXT_WEIGHT: f64 = 0.20;
const TOOL_WEIGHT: f64 = 0.15;

/// Credit for a flow step whose words mostly appear but not as a phrase
const PARTIAL_STEP_CREDIT: f64 = 0.7;
/// Fraction of a step's words that must appear for partial credit
const PARTIAL_STEP_COVERAGE: f64 = 0.5;

/// Context keywords must be longer than three characters
const KEYWORD_MIN_LEN: usize = 4;

/// Tool compliance when tools were used although none were declared
const UNDECLARED_TOOL_USE: f64 = 0.8;
/// Tool compliance when tools were declared but none were used
const DECLARED_TOOLS_UNUSED: f64 = 0.3;

/// Sub-scores behind a fidelity value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FidelityBreakdown {
    pub role_compliance: f64,
    pub flow_adherence: f64,
    pub turn_count: f64,
    pub context_presence: f64,
    pub tool_compliance: f64,
}

impl FidelityBreakdown {
    pub fn score(&self) -> f64 {
        let weighted = ROLE_WEIGHT * self.role_compliance
            + FLOW_WEIGHT * self.flow_adherence
            + TURN_COUNT_WEIGHT * self.turn_count
            + CONTEXT_WEIGHT * self.context_presence
            + TOOL_WEIGHT * self.tool_compliance;
        weighted / (ROLE_WEIGHT + FLOW_WEIGHT + TURN_COUNT_WEIGHT + CONTEXT_WEIGHT + TOOL_WEIGHT)
    }
}

/// Adherence of the dialogue to the seed's roles, flow, size, facts and tools
#[derive(Debug, Clone, Copy, Default)]
pub struct FactualFidelityMetric;

impl FactualFidelityMetric {
    pub fn new() -> Self {
        Self
    }

    pub fn breakdown(&self, dialogue: &Dialogue, seed: &Seed) -> FidelityBreakdown {
        let text = dialogue.full_text().to_lowercase();
        FidelityBreakdown {
            role_compliance: role_compliance(dialogue, seed),
            flow_adherence: flow_adherence(&text, &seed.expected_flow),
            turn_count: turn_count_compliance(dialogue.turns.len(), seed.turn_range),
            context_presence: context_presence(&text, seed),
            tool_compliance: tool_compliance(dialogue, seed),
        }
    }
}

/// Fraction of roles present that the seed declares or that are implicit
fn role_compliance(dialogue: &Dialogue, seed: &Seed) -> f64 {
    let present = dialogue.roles();
    if present.is_empty() {
        return 0.0;
    }
    let declared = seed.role_names();
    let compliant = present
        .iter()
        .filter(|role| declared.contains(*role) || IMPLICIT_ROLES.contains(&role.as_str()))
        .count();
    compliant as f64 / present.len() as f64
}

/// Mean credit per expected-flow step; 1.0 when the seed lists no steps
fn flow_adherence(text: &str, steps: &[String]) -> f64 {
    if steps.is_empty() {
        return 1.0;
    }
    let dialogue_words = token_set(text, 1);

    let total: f64 = steps
        .iter()
        .map(|step| {
            let phrase = step.trim().to_lowercase();
            if phrase.is_empty() || text.contains(&phrase) {
                return 1.0;
            }
            let words = word_tokens(&phrase, 1);
            if words.is_empty() {
                return 0.0;
            }
            let present = words.iter().filter(|w| dialogue_words.contains(*w)).count();
            if present as f64 / words.len() as f64 >= PARTIAL_STEP_COVERAGE {
                PARTIAL_STEP_CREDIT
            } else {
                0.0
            }
        })
        .sum();

    (total / steps.len() as f64).min(1.0)
}

/// 1.0 inside the range, decaying linearly with the relative distance outside
fn turn_count_compliance(turns: usize, range: TurnRange) -> f64 {
    if range.contains(turns) {
        return 1.0;
    }
    let turns = turns as f64;
    let (bound, distance) = if turns < range.min as f64 {
        (range.min as f64, range.min as f64 - turns)
    } else {
        (range.max as f64, turns - range.max as f64)
    };
    if bound <= 0.0 {
        return 0.0;
    }
    (1.0 - distance / bound).max(0.0)
}

/// Fraction of context and constraint keywords found in the dialogue text
fn context_presence(text: &str, seed: &Seed) -> f64 {
    let mut source = seed.parameters.context.clone();
    for constraint in &seed.parameters.constraints {
        source.push(' ');
        source.push_str(constraint);
    }
    let keywords: BTreeSet<String> = word_tokens(&source, KEYWORD_MIN_LEN).into_iter().collect();
    if keywords.is_empty() {
        return 1.0;
    }
    let present = keywords.iter().filter(|k| text.contains(k.as_str())).count();
    present as f64 / keywords.len() as f64
}

/// Fraction of declared tools the dialogue actually used
fn tool_compliance(dialogue: &Dialogue, seed: &Seed) -> f64 {
    let declared = seed.declared_tools();
    let used = dialogue.tools_used();

    if declared.is_empty() {
        return if used.is_empty() { 1.0 } else { UNDECLARED_TOOL_USE };
    }
    if used.is_empty() {
        return DECLARED_TOOLS_UNUSED;
    }
    let matched = declared.iter().filter(|t| used.contains(*t)).count();
    matched as f64 / declared.len() as f64
}

impl Metric for FactualFidelityMetric {
    fn kind(&self) -> MetricKind {
        MetricKind::Fidelity
    }

    fn compute(&self, dialogue: &Dialogue, seed: &Seed) -> Result<f64, EvalError> {
        let breakdown = self.breakdown(dialogue, seed);
        let score = breakdown.score();
        debug!(
            dialogue_id = %dialogue.id,
            seed_id = %seed.id,
            role = breakdown.role_compliance,
            flow = breakdown.flow_adherence,
            turn_count = breakdown.turn_count,
            context = breakdown.context_presence,
            tools = breakdown.tool_compliance,
            score,
            "fidelity computed"
        );
        Ok(score)
    }
}
