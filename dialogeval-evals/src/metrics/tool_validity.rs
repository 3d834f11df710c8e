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

//! Tool-call validity metric
//!
//! Validates every tool invocation in the dialogue against the seed's
//! declared tools and their JSON-Schema-style argument schemas. Each check
//! contributes one unit to a `(passed, total)` tally:
//!
//! - free-text usage entry: name is declared
//! - structured call: name is declared (an unknown name stops here)
//! - with a schema: no unknown argument keys, every required key present,
//!   every typed argument matches its `type`, every enum argument is a member
//! - every structured call: a strictly later turn returns a result carrying
//!   the call's correlation id
//!
//! Score = passed / total. Whether tools were used *at all* is judged by the
//! fidelity metric's tool-compliance component, not here.

use crate::{EvalError, Metric, MetricKind};
use dialogeval_core::{Dialogue, Seed, ToolCall};
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::debug;

/// Score when the seed declares no tools but the dialogue used some
const UNDECLARED_TOOL_USE: f64 = 0.8;

/// Running count of validation checks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckTally {
    pub passed: usize,
    pub total: usize,
}

impl CheckTally {
    fn check(&mut self, ok: bool) {
        self.total += 1;
        if ok {
            self.passed += 1;
        }
    }

    /// passed / total, 1.0 when nothing was checked
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.passed as f64 / self.total as f64
        }
    }
}

/// Schema conformance of the dialogue's tool traffic
#[derive(Debug, Clone, Copy, Default)]
pub struct ToolCallValidityMetric;

impl ToolCallValidityMetric {
    pub fn new() -> Self {
        Self
    }

    /// Run every check and return the tally
    pub fn tally(&self, dialogue: &Dialogue, seed: &Seed) -> CheckTally {
        let declared = seed.declared_tools();
        let mut tally = CheckTally::default();

        for (index, turn) in dialogue.turns.iter().enumerate() {
            for name in &turn.tools_used {
                tally.check(declared.contains(name.as_str()));
            }

            for call in &turn.tool_calls {
                self.check_call(call, &declared, seed, &mut tally);
                tally.check(has_later_result(dialogue, index, call));
            }
        }

        tally
    }

    fn check_call(
        &self,
        call: &ToolCall,
        declared: &BTreeSet<&str>,
        seed: &Seed,
        tally: &mut CheckTally,
    ) {
        let known = declared.contains(call.name.as_str());
        tally.check(known);
        if !known {
            return;
        }
        let Some(schema) = seed.tool_schema(&call.name) else {
            return;
        };

        let properties = schema.get("properties").and_then(Value::as_object);

        if let Some(properties) = properties {
            for key in call.arguments.keys() {
                tally.check(properties.contains_key(key));
            }
        }

        if let Some(required) = schema.get("required").and_then(Value::as_array) {
            for key in required.iter().filter_map(Value::as_str) {
                tally.check(call.arguments.contains_key(key));
            }
        }

        let Some(properties) = properties else {
            return;
        };
        for (key, value) in &call.arguments {
            let Some(property) = properties.get(key) else {
                continue;
            };
            if let Some(expected) = property.get("type").and_then(Value::as_str) {
                if let Some(ok) = matches_type(value, expected) {
                    tally.check(ok);
                }
            }
            if let Some(allowed) = property.get("enum").and_then(Value::as_array) {
                tally.check(allowed.contains(value));
            }
        }
    }
}

/// Whether `value` satisfies a JSON-Schema primitive type name.
///
/// Booleans never satisfy `integer` or `number`. Unrecognised type names
/// return `None` and are not counted as checks.
fn matches_type(value: &Value, expected: &str) -> Option<bool> {
    let ok = match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => return None,
    };
    Some(ok)
}

/// A strictly later turn carries a result correlated with `call`
fn has_later_result(dialogue: &Dialogue, index: usize, call: &ToolCall) -> bool {
    let Some(id) = call.id.as_deref() else {
        return false;
    };
    dialogue.turns[index + 1..]
        .iter()
        .any(|turn| turn.tool_results.iter().any(|r| r.call_id == id))
}

impl Metric for ToolCallValidityMetric {
    fn kind(&self) -> MetricKind {
        MetricKind::ToolCallValidity
    }

    fn compute(&self, dialogue: &Dialogue, seed: &Seed) -> Result<f64, EvalError> {
        if seed.declared_tools().is_empty() {
            return Ok(if dialogue.uses_tools() {
                UNDECLARED_TOOL_USE
            } else {
                1.0
            });
        }

        let tally = self.tally(dialogue, seed);
        debug!(
            dialogue_id = %dialogue.id,
            passed = tally.passed,
            total = tally.total,
            "tool call validity computed"
        );
        Ok(tally.ratio())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dialogeval_core::{RoleSpec, ToolResult, Turn};
    use serde_json::json;

    fn refund_seed() -> Seed {
        Seed::new(
            "s",
            "payments",
            vec![RoleSpec::new("customer", ""), RoleSpec::new("agent", "")],
            "Refund a duplicate charge",
        )
        .with_tool_schema(
            "issue_refund",
            json!({
                "type": "object",
                "properties": {
                    "amount": {"type": "integer"},
                    "currency": {"type": "string", "enum": ["USD", "EUR"]},
                    "notify": {"type": "boolean"}
                },
                "required": ["amount", "currency"]
            }),
        )
    }

    fn dialogue_with(call: ToolCall, answered: bool) -> Dialogue {
        let call_id = call.id.clone().unwrap_or_default();
        let mut turns = vec![
            Turn::new(1, "customer", "I was charged twice"),
            Turn::new(2, "agent", "Refunding now").with_tool_call(call),
        ];
        if answered {
            turns.push(
                Turn::new(3, "tool", "refund ok")
                    .with_tool_result(ToolResult::new(call_id, json!({"status": "ok"}))),
            );
        }
        Dialogue::new("d", turns)
    }

    #[test]
    fn test_no_declared_tools() {
        let seed = Seed::new(
            "s",
            "d",
            vec![RoleSpec::new("a", ""), RoleSpec::new("b", "")],
            "o",
        );
        let metric = ToolCallValidityMetric::new();
        let plain = Dialogue::from_pairs("d", [("a", "hi")]);
        assert_eq!(metric.compute(&plain, &seed).unwrap(), 1.0);

        let used = Dialogue::new(
            "d",
            vec![Turn::new(1, "a", "searching").with_tools_used(["search"])],
        );
        assert_eq!(metric.compute(&used, &seed).unwrap(), 0.8);
    }

    #[test]
    fn test_declared_but_unused_scores_one() {
        let dialogue = Dialogue::from_pairs("d", [("customer", "hi"), ("agent", "hello")]);
        let metric = ToolCallValidityMetric::new();
        assert_eq!(metric.tally(&dialogue, &refund_seed()).total, 0);
        assert_eq!(metric.compute(&dialogue, &refund_seed()).unwrap(), 1.0);
    }

    #[test]
    fn test_valid_call_scores_one() {
        let call = ToolCall::new("c1", "issue_refund")
            .with_argument("amount", json!(40))
            .with_argument("currency", json!("USD"));
        let dialogue = dialogue_with(call, true);
        let tally = ToolCallValidityMetric::new().tally(&dialogue, &refund_seed());
        // name + 2 keys + 2 required + 2 types + 1 enum + sequence
        assert_eq!(tally, CheckTally { passed: 9, total: 9 });
    }

    #[test]
    fn test_unknown_name_skips_argument_checks() {
        let call = ToolCall::new("c1", "wire_money")
            .with_argument("amount", json!(true))
            .with_argument("bogus", json!(1));
        let dialogue = dialogue_with(call, false);
        let tally = ToolCallValidityMetric::new().tally(&dialogue, &refund_seed());
        // failed name check + failed sequence check, no argument checks
        assert_eq!(tally, CheckTally { passed: 0, total: 2 });
    }

    #[test]
    fn test_missing_required_argument() {
        let call = ToolCall::new("c1", "issue_refund").with_argument("amount", json!(40));
        let dialogue = dialogue_with(call, true);
        let score = ToolCallValidityMetric::new()
            .compute(&dialogue, &refund_seed())
            .unwrap();
        assert!(score < 1.0);
    }

    #[test]
    fn test_boolean_never_satisfies_numeric_types() {
        assert_eq!(matches_type(&json!(true), "integer"), Some(false));
        assert_eq!(matches_type(&json!(false), "number"), Some(false));
        assert_eq!(matches_type(&json!(3), "number"), Some(true));
        assert_eq!(matches_type(&json!(3.5), "integer"), Some(false));
        assert_eq!(matches_type(&json!("x"), "uuid"), None);

        let call = ToolCall::new("c1", "issue_refund")
            .with_argument("amount", json!(true))
            .with_argument("currency", json!("USD"));
        let dialogue = dialogue_with(call, true);
        let tally = ToolCallValidityMetric::new().tally(&dialogue, &refund_seed());
        assert_eq!(tally, CheckTally { passed: 8, total: 9 });
    }

    #[test]
    fn test_enum_and_unknown_key_failures() {
        let call = ToolCall::new("c1", "issue_refund")
            .with_argument("amount", json!(10))
            .with_argument("currency", json!("GBP"))
            .with_argument("reason", json!("dup"));
        let dialogue = dialogue_with(call, true);
        let tally = ToolCallValidityMetric::new().tally(&dialogue, &refund_seed());
        // name, 3 key checks (reason unknown), 2 required, 2 types, 1 enum (fails), sequence
        assert_eq!(tally, CheckTally { passed: 8, total: 10 });
    }

    #[test]
    fn test_result_must_come_in_a_later_turn() {
        let call = ToolCall::new("c1", "issue_refund")
            .with_argument("amount", json!(10))
            .with_argument("currency", json!("EUR"));
        let same_turn = Dialogue::new(
            "d",
            vec![Turn::new(1, "agent", "refund")
                .with_tool_call(call)
                .with_tool_result(ToolResult::new("c1", json!(null)))],
        );
        let tally = ToolCallValidityMetric::new().tally(&same_turn, &refund_seed());
        assert_eq!(tally.total - tally.passed, 1);

        let far_result = Dialogue::new(
            "d",
            vec![
                Turn::new(1, "agent", "refund").with_tool_call(
                    ToolCall::new("c9", "issue_refund")
                        .with_argument("amount", json!(10))
                        .with_argument("currency", json!("EUR")),
                ),
                Turn::new(2, "customer", "waiting"),
                Turn::new(3, "customer", "still waiting"),
                Turn::new(4, "tool", "done").with_tool_result(ToolResult::new("c9", json!(1))),
            ],
        );
        let tally = ToolCallValidityMetric::new().tally(&far_result, &refund_seed());
        assert_eq!(tally.passed, tally.total);
    }

    #[test]
    fn test_free_text_usage_checks_names() {
        let seed = refund_seed().with_tools(["lookup_charge"]);
        let dialogue = Dialogue::new(
            "d",
            vec![Turn::new(1, "agent", "checking").with_tools_used(["lookup_charge", "teleport"])],
        );
        let score = ToolCallValidityMetric::new().compute(&dialogue, &seed).unwrap();
        assert_eq!(score, 0.5);
    }
}
