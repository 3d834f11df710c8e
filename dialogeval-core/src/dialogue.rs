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

//! Dialogue: the multi-turn exchange being scored

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Role carried by turns that only relay tool traffic
pub const ROLE_TOOL: &str = "tool";
/// Role carried by system-prompt turns
pub const ROLE_SYSTEM: &str = "system";
/// Role carried by turns returning tool output
pub const ROLE_TOOL_RESULT: &str = "tool_result";

/// Roles every dialogue may use without the seed declaring them
pub const IMPLICIT_ROLES: [&str; 3] = [ROLE_TOOL, ROLE_SYSTEM, ROLE_TOOL_RESULT];

/// Structured tool invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Correlation id matched against [`ToolResult::call_id`]
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Map<String, serde_json::Value>,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            name: name.into(),
            arguments: serde_json::Map::new(),
        }
    }

    pub fn with_argument(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.arguments.insert(key.into(), value);
        self
    }
}

/// Output of a tool invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: String,
    #[serde(default)]
    pub content: serde_json::Value,
}

impl ToolResult {
    pub fn new(call_id: impl Into<String>, content: serde_json::Value) -> Self {
        Self {
            call_id: call_id.into(),
            content,
        }
    }
}

/// One utterance by one role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// 1-based position within the dialogue
    pub turn_number: u32,
    pub role: String,
    pub content: String,

    /// Free-text tool usage entries (tool names mentioned by the generator)
    #[serde(default)]
    pub tools_used: Vec<String>,

    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,

    #[serde(default)]
    pub tool_results: Vec<ToolResult>,

    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Turn {
    pub fn new(turn_number: u32, role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            turn_number,
            role: role.into(),
            content: content.into(),
            tools_used: Vec::new(),
            tool_calls: Vec::new(),
            tool_results: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_tools_used<S: Into<String>>(mut self, tools: impl IntoIterator<Item = S>) -> Self {
        self.tools_used = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tool_call(mut self, call: ToolCall) -> Self {
        self.tool_calls.push(call);
        self
    }

    pub fn with_tool_result(mut self, result: ToolResult) -> Self {
        self.tool_results.push(result);
        self
    }

    /// Turn relays tool traffic rather than conversational content
    pub fn is_tool_turn(&self) -> bool {
        let role = self.role.to_lowercase();
        role == ROLE_TOOL || role == ROLE_TOOL_RESULT
    }

    /// Turn is tool traffic or a system prompt
    pub fn is_tool_or_system(&self) -> bool {
        self.is_tool_turn() || self.role.eq_ignore_ascii_case(ROLE_SYSTEM)
    }

    /// Whether this turn used any tool, by free text or structured call
    pub fn uses_tools(&self) -> bool {
        !self.tools_used.is_empty() || !self.tool_calls.is_empty()
    }
}

/// Ordered sequence of turns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dialogue {
    pub id: String,
    pub turns: Vec<Turn>,
}

impl Dialogue {
    pub fn new(id: impl Into<String>, turns: Vec<Turn>) -> Self {
        Self {
            id: id.into(),
            turns,
        }
    }

    /// Build a dialogue from `(role, content)` pairs, numbering turns from 1
    pub fn from_pairs<R, C>(id: impl Into<String>, pairs: impl IntoIterator<Item = (R, C)>) -> Self
    where
        R: Into<String>,
        C: Into<String>,
    {
        let turns = pairs
            .into_iter()
            .enumerate()
            .map(|(i, (role, content))| Turn::new(i as u32 + 1, role, content))
            .collect();
        Self::new(id, turns)
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Turns carrying conversational content
    pub fn content_turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter().filter(|t| !t.is_tool_turn())
    }

    /// Content of every non-tool turn, space-joined
    pub fn content_text(&self) -> String {
        self.content_turns()
            .map(|t| t.content.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Content of every turn, newline-joined
    pub fn full_text(&self) -> String {
        self.turns
            .iter()
            .map(|t| t.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Distinct roles present, lowercased
    pub fn roles(&self) -> BTreeSet<String> {
        self.turns.iter().map(|t| t.role.to_lowercase()).collect()
    }

    /// Tool names used anywhere, from free-text lists and structured calls
    pub fn tools_used(&self) -> BTreeSet<&str> {
        self.turns
            .iter()
            .flat_map(|t| {
                t.tools_used
                    .iter()
                    .map(String::as_str)
                    .chain(t.tool_calls.iter().map(|c| c.name.as_str()))
            })
            .collect()
    }

    pub fn uses_tools(&self) -> bool {
        self.turns.iter().any(Turn::uses_tools)
    }

    pub fn validate(&self) -> Result<()> {
        if self.turns.is_empty() {
            return Err(CoreError::EmptyDialogue {
                dialogue_id: self.id.clone(),
            });
        }
        Ok(())
    }
}
