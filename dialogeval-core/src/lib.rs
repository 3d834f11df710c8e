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

//! Dialogeval Core
//!
//! Data model shared by the quality engine: the [`Seed`] a dialogue was
//! generated from, the [`Dialogue`] itself, and the validation applied to
//! both before any metric runs.

pub mod dialogue;
pub mod error;
pub mod seed;

pub use dialogue::{
    Dialogue, ToolCall, ToolResult, Turn, IMPLICIT_ROLES, ROLE_SYSTEM, ROLE_TOOL,
    ROLE_TOOL_RESULT,
};
pub use error::{CoreError, Result};
pub use seed::{FactualParameters, RoleSpec, Seed, TurnRange};
