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

//! Error types for input validation

use thiserror::Error;

/// Result type alias for dialogeval-core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Input-shape violations detected before any metric runs
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    #[error("seed {seed_id} declares {found} role(s); at least 2 are required")]
    TooFewRoles { seed_id: String, found: usize },

    #[error("seed {seed_id} has an inverted turn range: min {min} > max {max}")]
    InvalidTurnRange { seed_id: String, min: u32, max: u32 },

    #[error("dialogue {dialogue_id} has no turns")]
    EmptyDialogue { dialogue_id: String },
}
