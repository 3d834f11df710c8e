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

//! Lexical diversity via windowed Type-Token Ratio
//!
//! Plain TTR (unique / total) decays as text grows (Heaps' law), so longer
//! dialogues would be penalised for being long. Above one window of tokens
//! the Moving-Average TTR is used instead:
//!
//! ```text
//! MATTR = mean over i of |unique(tokens[i..i+W])| / W
//! ```
//!
//! with the window sliding one token at a time.

use crate::text::word_tokens;
use crate::{EvalError, Metric, MetricKind};
use dialogeval_core::{Dialogue, Seed};
use std::collections::HashMap;
use tracing::debug;

/// Window size for MATTR
pub const MATTR_WINDOW: usize = 50;

/// Minimum token length counted (tokens must be longer than one character)
const MIN_TOKEN_LEN: usize = 2;

/// unique / total, 0.0 for no tokens
pub fn type_token_ratio<S: AsRef<str>>(tokens: &[S]) -> f64 {
    if tokens.is_empty() {
        return 0.0;
    }
    let unique: std::collections::HashSet<&str> = tokens.iter().map(AsRef::as_ref).collect();
    unique.len() as f64 / tokens.len() as f64
}

/// Mean TTR over every `window`-sized slice; plain TTR when the input is
/// no longer than one window
pub fn moving_average_ttr<S: AsRef<str>>(tokens: &[S], window: usize) -> f64 {
    if window == 0 || tokens.len() <= window {
        return type_token_ratio(tokens);
    }

    // Incremental counts: one insert and one removal per step
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for token in &tokens[..window] {
        *counts.entry(token.as_ref()).or_insert(0) += 1;
    }

    let mut total = counts.len() as f64 / window as f64;
    let positions = tokens.len() - window + 1;

    for start in 1..positions {
        let outgoing = tokens[start - 1].as_ref();
        if let Some(count) = counts.get_mut(outgoing) {
            *count -= 1;
            if *count == 0 {
                counts.remove(outgoing);
            }
        }
        *counts.entry(tokens[start + window - 1].as_ref()).or_insert(0) += 1;
        total += counts.len() as f64 / window as f64;
    }

    total / positions as f64
}

/// Vocabulary richness of the conversational turns
#[derive(Debug, Clone, Copy)]
pub struct LexicalDiversityMetric {
    window: usize,
}

impl LexicalDiversityMetric {
    pub fn new() -> Self {
        Self {
            window: MATTR_WINDOW,
        }
    }
}

impl Default for LexicalDiversityMetric {
    fn default() -> Self {
        Self::new()
    }
}

impl Metric for LexicalDiversityMetric {
    fn kind(&self) -> MetricKind {
        MetricKind::LexicalDiversity
    }

    fn compute(&self, dialogue: &Dialogue, _seed: &Seed) -> Result<f64, EvalError> {
        let tokens = word_tokens(&dialogue.content_text(), MIN_TOKEN_LEN);
        let score = moving_average_ttr(&tokens, self.window);
        debug!(dialogue_id = %dialogue.id, tokens = tokens.len(), score, "lexical diversity computed");
        Ok(score)
    }
}
