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

//! Seed: the structured description a dialogue was generated from
//!
//! A seed is authored upstream and is read-only here. It carries everything
//! the metrics compare a dialogue against: declared roles, the objective, the
//! expected flow of the conversation, and the factual parameters (context,
//! constraints, tools).

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A participant role declared by the seed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl RoleSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Acceptable number of turns, inclusive on both ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnRange {
    pub min: u32,
    pub max: u32,
}

impl TurnRange {
    pub fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, turns: usize) -> bool {
        turns >= self.min as usize && turns <= self.max as usize
    }
}

impl Default for TurnRange {
    fn default() -> Self {
        Self { min: 2, max: 20 }
    }
}

/// Factual parameters the dialogue must stay grounded in
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactualParameters {
    /// Free-text background context
    #[serde(default)]
    pub context: String,

    /// Constraints the dialogue must honour
    #[serde(default)]
    pub constraints: Vec<String>,

    /// Names of tools the dialogue may invoke
    #[serde(default)]
    pub tools: Vec<String>,

    /// JSON-Schema-style argument schemas keyed by tool name.
    ///
    /// Either a bare object schema (`{"type": "object", "properties": ..}`) or a
    /// function definition wrapping one under `"parameters"`.
    #[serde(default)]
    pub tool_schemas: BTreeMap<String, serde_json::Value>,
}

/// Dialogue template: domain, tone, and expected flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seed {
    pub id: String,
    pub domain: String,
    #[serde(default = "default_language")]
    pub language: String,
    pub roles: Vec<RoleSpec>,
    pub objective: String,
    #[serde(default)]
    pub tone: String,
    #[serde(default)]
    pub turn_range: TurnRange,
    #[serde(default)]
    pub expected_flow: Vec<String>,
    #[serde(default)]
    pub parameters: FactualParameters,
}

fn default_language() -> String {
    "en".to_string()
}

impl Seed {
    /// Create a seed with the required fields; everything else defaults
    pub fn new(
        id: impl Into<String>,
        domain: impl Into<String>,
        roles: Vec<RoleSpec>,
        objective: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            domain: domain.into(),
            language: default_language(),
            roles,
            objective: objective.into(),
            tone: String::new(),
            turn_range: TurnRange::default(),
            expected_flow: Vec::new(),
            parameters: FactualParameters::default(),
        }
    }

    pub fn with_turn_range(mut self, min: u32, max: u32) -> Self {
        self.turn_range = TurnRange::new(min, max);
        self
    }

    pub fn with_expected_flow<S: Into<String>>(mut self, steps: impl IntoIterator<Item = S>) -> Self {
        self.expected_flow = steps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.parameters.context = context.into();
        self
    }

    pub fn with_constraints<S: Into<String>>(mut self, constraints: impl IntoIterator<Item = S>) -> Self {
        self.parameters.constraints = constraints.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tools<S: Into<String>>(mut self, tools: impl IntoIterator<Item = S>) -> Self {
        self.parameters.tools = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tool_schema(mut self, name: impl Into<String>, schema: serde_json::Value) -> Self {
        self.parameters.tool_schemas.insert(name.into(), schema);
        self
    }

    pub fn with_tone(mut self, tone: impl Into<String>) -> Self {
        self.tone = tone.into();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Declared role names, lowercased
    pub fn role_names(&self) -> BTreeSet<String> {
        self.roles.iter().map(|r| r.name.to_lowercase()).collect()
    }

    /// Every tool name the seed declares, from the flat list and the schemas
    pub fn declared_tools(&self) -> BTreeSet<&str> {
        self.parameters
            .tools
            .iter()
            .map(String::as_str)
            .chain(self.parameters.tool_schemas.keys().map(String::as_str))
            .collect()
    }

    /// Argument schema for `tool`, unwrapping a function-style `parameters` key
    pub fn tool_schema(&self, tool: &str) -> Option<&serde_json::Value> {
        let schema = self.parameters.tool_schemas.get(tool)?;
        match schema.get("parameters") {
            Some(params) if params.is_object() => Some(params),
            _ => Some(schema),
        }
    }

    /// Reference text the dialogue is expected to realise: flow steps,
    /// context, constraints and objective, in that order
    pub fn reference_text(&self) -> String {
        let mut parts: Vec<&str> = self.expected_flow.iter().map(String::as_str).collect();
        parts.push(&self.parameters.context);
        parts.extend(self.parameters.constraints.iter().map(String::as_str));
        parts.push(&self.objective);
        parts
            .into_iter()
            .filter(|p| !p.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Reject seeds the metrics cannot meaningfully score against
    pub fn validate(&self) -> Result<()> {
        if self.roles.len() < 2 {
            return Err(CoreError::TooFewRoles {
                seed_id: self.id.clone(),
                found: self.roles.len(),
            });
        }
        if self.turn_range.min > self.turn_range.max {
            return Err(CoreError::InvalidTurnRange {
                seed_id: self.id.clone(),
                min: self.turn_range.min,
                max: self.turn_range.max,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn support_seed() -> Seed {
        Seed::new(
            "seed-1",
            "customer_support",
            vec![
                RoleSpec::new("customer", "A customer with a billing issue"),
                RoleSpec::new("agent", "A support agent"),
            ],
            "Resolve a duplicate charge",
        )
    }

    #[test]
    fn test_validate_accepts_two_roles() {
        assert!(support_seed().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_single_role() {
        let mut seed = support_seed();
        seed.roles.truncate(1);
        let err = seed.validate().unwrap_err();
        assert_eq!(
            err,
            CoreError::TooFewRoles {
                seed_id: "seed-1".to_string(),
                found: 1
            }
        );
        assert!(err.to_string().contains("at least 2"));
    }

    #[test]
    fn test_validate_rejects_inverted_range() {
        let seed = support_seed().with_turn_range(8, 4);
        assert!(matches!(
            seed.validate(),
            Err(CoreError::InvalidTurnRange { min: 8, max: 4, .. })
        ));
    }

    #[test]
    fn test_declared_tools_merges_list_and_schemas() {
        let seed = support_seed()
            .with_tools(["lookup_invoice"])
            .with_tool_schema("issue_refund", json!({"type": "object"}));
        let tools = seed.declared_tools();
        assert!(tools.contains("lookup_invoice"));
        assert!(tools.contains("issue_refund"));
        assert_eq!(tools.len(), 2);
    }

    #[test]
    fn test_tool_schema_unwraps_parameters() {
        let seed = support_seed().with_tool_schema(
            "issue_refund",
            json!({"name": "issue_refund", "parameters": {"type": "object", "required": ["amount"]}}),
        );
        let schema = seed.tool_schema("issue_refund").unwrap();
        assert_eq!(schema["required"][0], "amount");
        assert!(seed.tool_schema("missing").is_none());
    }

    #[test]
    fn test_reference_text_order() {
        let seed = support_seed()
            .with_expected_flow(["greet", "verify account"])
            .with_context("card ending 1234")
            .with_constraints(["no refunds over 100"]);
        assert_eq!(
            seed.reference_text(),
            "greet verify account card ending 1234 no refunds over 100 Resolve a duplicate charge"
        );
    }

    #[test]
    fn test_seed_deserializes_with_defaults() {
        let seed: Seed = serde_json::from_value(json!({
            "id": "s",
            "domain": "d",
            "roles": [{"name": "a"}, {"name": "b"}],
            "objective": "o"
        }))
        .unwrap();
        assert_eq!(seed.language, "en");
        assert_eq!(seed.turn_range, TurnRange::default());
        assert!(seed.parameters.tools.is_empty());
    }
}
