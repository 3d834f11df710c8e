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

//! Evaluation engine configuration
//!
//! Only operational knobs live here. The quality thresholds are a fixed
//! product contract ([`ThresholdTable::default`](crate::ThresholdTable)) and
//! are deliberately not loaded from configuration.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalConfig {
    /// Upper bound on a single judge or embedding call, in seconds
    #[serde(default = "default_judge_timeout_secs")]
    pub judge_timeout_secs: u64,

    /// Pairs evaluated concurrently by the parallel batch entry point
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// N-gram length used by the memorization gate
    #[serde(default = "default_memorization_ngram")]
    pub memorization_ngram: usize,

    /// Model name used by [`QualityEvaluator::with_openai_judge`](crate::QualityEvaluator::with_openai_judge)
    #[serde(default = "default_judge_model")]
    pub judge_model: String,

    /// OpenAI-compatible endpoint for the judge; the public API when unset
    #[serde(default)]
    pub judge_base_url: Option<String>,
}

fn default_judge_timeout_secs() -> u64 {
    30
}

fn default_max_concurrent() -> usize {
    4
}

fn default_memorization_ngram() -> usize {
    8
}

fn default_judge_model() -> String {
    "gpt-4o-mini".to_string()
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            judge_timeout_secs: default_judge_timeout_secs(),
            max_concurrent: default_max_concurrent(),
            memorization_ngram: default_memorization_ngram(),
            judge_model: default_judge_model(),
            judge_base_url: None,
        }
    }
}

impl EvalConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from environment variables
    ///
    /// Supported environment variables:
    /// - DIALOGEVAL_JUDGE_TIMEOUT_SECS: judge/embedding call bound (default: 30)
    /// - DIALOGEVAL_MAX_CONCURRENT: parallel batch width (default: 4)
    /// - DIALOGEVAL_MEMORIZATION_NGRAM: memorization n-gram length (default: 8)
    /// - DIALOGEVAL_JUDGE_MODEL: semantic judge model (default: gpt-4o-mini)
    /// - DIALOGEVAL_JUDGE_BASE_URL: OpenAI-compatible judge endpoint
    ///
    /// Unparseable values are ignored and the default is kept.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(timeout) = std::env::var("DIALOGEVAL_JUDGE_TIMEOUT_SECS") {
            if let Ok(val) = timeout.parse() {
                config.judge_timeout_secs = val;
            }
        }

        if let Ok(width) = std::env::var("DIALOGEVAL_MAX_CONCURRENT") {
            if let Ok(val) = width.parse() {
                config.max_concurrent = val;
            }
        }

        if let Ok(n) = std::env::var("DIALOGEVAL_MEMORIZATION_NGRAM") {
            if let Ok(val) = n.parse() {
                config.memorization_ngram = val;
            }
        }

        if let Ok(model) = std::env::var("DIALOGEVAL_JUDGE_MODEL") {
            config.judge_model = model;
        }

        if let Ok(url) = std::env::var("DIALOGEVAL_JUDGE_BASE_URL") {
            if !url.is_empty() {
                config.judge_base_url = Some(url);
            }
        }

        config
    }

    pub fn judge_timeout(&self) -> Duration {
        Duration::from_secs(self.judge_timeout_secs)
    }

    /// Parallel batch width, never zero
    pub fn concurrency(&self) -> usize {
        self.max_concurrent.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = EvalConfig::default();
        assert_eq!(config.judge_timeout(), Duration::from_secs(30));
        assert_eq!(config.max_concurrent, 4);
        assert_eq!(config.memorization_ngram, 8);
        assert_eq!(config.judge_model, "gpt-4o-mini");
        assert!(config.judge_base_url.is_none());
    }

    #[test]
    fn test_from_file_fills_missing_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "max_concurrent = 16\njudge_model = \"llama-3.1-8b\"\njudge_base_url = \"http://localhost:8000/v1\""
        )
        .unwrap();

        let config = EvalConfig::from_file(file.path()).unwrap();
        assert_eq!(config.max_concurrent, 16);
        assert_eq!(config.judge_model, "llama-3.1-8b");
        assert_eq!(config.judge_base_url.as_deref(), Some("http://localhost:8000/v1"));
        assert_eq!(config.judge_timeout_secs, 30);
    }

    #[test]
    fn test_from_file_rejects_bad_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_concurrent = \"many\"").unwrap();
        assert!(EvalConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn test_from_env() {
        std::env::set_var("DIALOGEVAL_MEMORIZATION_NGRAM", "5");
        std::env::set_var("DIALOGEVAL_MAX_CONCURRENT", "not-a-number");
        std::env::set_var("DIALOGEVAL_JUDGE_BASE_URL", "http://judge.internal/v1");

        let config = EvalConfig::from_env();
        assert_eq!(config.memorization_ngram, 5);
        assert_eq!(config.max_concurrent, 4);
        assert_eq!(config.judge_base_url.as_deref(), Some("http://judge.internal/v1"));

        std::env::remove_var("DIALOGEVAL_JUDGE_BASE_URL");
        std::env::remove_var("DIALOGEVAL_MEMORIZATION_NGRAM");
        std::env::remove_var("DIALOGEVAL_MAX_CONCURRENT");
    }

    #[test]
    fn test_concurrency_never_zero() {
        let config = EvalConfig {
            max_concurrent: 0,
            ..EvalConfig::default()
        };
        assert_eq!(config.concurrency(), 1);
    }
}
