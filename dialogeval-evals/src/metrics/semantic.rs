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

//! Semantic fidelity via LLM-as-judge
//!
//! Asks a model how faithfully the dialogue realises the seed's objective,
//! expected flow and tone. The judge is best-effort: any client error,
//! unparseable answer or timeout yields the neutral 0.5 rather than failing
//! the evaluation.

use super::block_on_or_neutral;
use crate::llm_client::LLMClient;
use crate::{EvalError, Metric, MetricKind};
use async_trait::async_trait;
use dialogeval_core::{Dialogue, Seed};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default bound on a single judge call
pub const DEFAULT_JUDGE_TIMEOUT: Duration = Duration::from_secs(30);

/// LLM judge scoring semantic fidelity of a dialogue to its seed
pub struct SemanticFidelityJudge {
    llm_client: Arc<dyn LLMClient>,
    prompt_template: String,
    timeout: Duration,
}

impl SemanticFidelityJudge {
    /// Create a judge with the default prompt template
    pub fn new(llm_client: Arc<dyn LLMClient>) -> Self {
        Self {
            llm_client,
            prompt_template: Self::default_prompt(),
            timeout: DEFAULT_JUDGE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replace the prompt template
    ///
    /// Placeholders: `{objective}`, `{domain}`, `{tone}`, `{flow}`,
    /// `{context}`, `{transcript}`.
    pub fn with_prompt(mut self, template: String) -> Self {
        self.prompt_template = template;
        self
    }

    fn default_prompt() -> String {
        r#"You are an expert reviewer of synthetic training dialogues.
Rate how faithfully the DIALOGUE realises the SEED it was generated from:
does it pursue the objective, follow the expected flow, respect the context,
and keep the requested tone?

SEED
Domain: {domain}
Objective: {objective}
Tone: {tone}
Expected flow:
{flow}
Context: {context}

DIALOGUE:
{transcript}

Respond in JSON format:
{
  "score": <float 0-1, 1 = perfectly faithful>,
  "reason": "one sentence"
}"#
        .to_string()
    }

    fn build_prompt(&self, dialogue: &Dialogue, seed: &Seed) -> String {
        let flow = seed
            .expected_flow
            .iter()
            .enumerate()
            .map(|(i, step)| format!("{}. {}", i + 1, step))
            .collect::<Vec<_>>()
            .join("\n");
        let transcript = dialogue
            .content_turns()
            .map(|t| format!("[{}] {}", t.role, t.content))
            .collect::<Vec<_>>()
            .join("\n");
        let tone = if seed.tone.is_empty() {
            "unspecified"
        } else {
            seed.tone.as_str()
        };

        self.prompt_template
            .replace("{domain}", &seed.domain)
            .replace("{objective}", &seed.objective)
            .replace("{tone}", tone)
            .replace("{flow}", &flow)
            .replace("{context}", &seed.parameters.context)
            .replace("{transcript}", &transcript)
    }

    /// One judge call, errors propagated
    async fn judge(&self, dialogue: &Dialogue, seed: &Seed) -> Result<f64, EvalError> {
        let prompt = self.build_prompt(dialogue, seed);
        let response = self
            .llm_client
            .evaluate(prompt)
            .await
            .map_err(|e| EvalError::LLMClientError(e.to_string()))?;

        let json = response.as_json().map_err(|e| {
            EvalError::LLMClientError(format!("Failed to parse judge JSON: {}", e))
        })?;
        let score = json["score"]
            .as_f64()
            .ok_or_else(|| EvalError::LLMClientError("Missing score field".to_string()))?;

        debug!(
            dialogue_id = %dialogue.id,
            model = self.llm_client.model_name(),
            score,
            reason = json["reason"].as_str().unwrap_or(""),
            "semantic judge answered"
        );
        Ok(score.clamp(0.0, 1.0))
    }

    /// Judge score bounded by the timeout, neutral on any failure
    pub async fn score(&self, dialogue: &Dialogue, seed: &Seed) -> f64 {
        let outcome = match tokio::time::timeout(self.timeout, self.judge(dialogue, seed)).await {
            Ok(result) => result,
            Err(_) => Err(EvalError::Timeout),
        };
        match outcome {
            Ok(score) => score,
            Err(e) => {
                warn!(dialogue_id = %dialogue.id, error = %e, "semantic judge degraded to neutral");
                MetricKind::SemanticFidelity.neutral()
            }
        }
    }
}

#[async_trait]
impl Metric for SemanticFidelityJudge {
    fn kind(&self) -> MetricKind {
        MetricKind::SemanticFidelity
    }

    fn compute(&self, dialogue: &Dialogue, seed: &Seed) -> Result<f64, EvalError> {
        Ok(block_on_or_neutral(self.kind(), self.score(dialogue, seed)))
    }

    async fn compute_async(&self, dialogue: &Dialogue, seed: &Seed) -> Result<f64, EvalError> {
        Ok(self.score(dialogue, seed).await)
    }
}
