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

//! Built-in metrics

pub mod coherence;
pub mod diversity;
pub mod embedding_drift;
pub mod fidelity;
pub mod memorization;
pub mod privacy;
pub mod rouge;
pub mod semantic;
pub mod tool_validity;

pub use coherence::{CoherenceBreakdown, DialogCoherenceMetric};
pub use diversity::{moving_average_ttr, type_token_ratio, LexicalDiversityMetric, MATTR_WINDOW};
pub use embedding_drift::EmbeddingDriftMetric;
pub use fidelity::{FidelityBreakdown, FactualFidelityMetric};
pub use memorization::MemorizationMetric;
pub use privacy::{PiiPattern, PrivacyResidualMetric};
pub use rouge::{RougeLMetric, RougeScore};
pub use semantic::SemanticFidelityJudge;
pub use tool_validity::{CheckTally, ToolCallValidityMetric};

use crate::{Metric, MetricKind};
use std::future::Future;
use std::sync::Arc;
use tracing::warn;

/// The six mandatory metrics, in evaluation order
pub fn mandatory_metrics() -> Vec<Arc<dyn Metric>> {
    vec![
        Arc::new(RougeLMetric::new()),
        Arc::new(FactualFidelityMetric::new()),
        Arc::new(LexicalDiversityMetric::new()),
        Arc::new(DialogCoherenceMetric::new()),
        Arc::new(ToolCallValidityMetric::new()),
        Arc::new(PrivacyResidualMetric::new()),
    ]
}

/// Drive a model-backed score to completion from synchronous code
///
/// Runs `fut` on a private current-thread runtime. Blocking inside a caller's
/// runtime would stall its workers, so in that case the metric's neutral
/// score is returned instead and the caller is expected to use the async path.
pub(crate) fn block_on_or_neutral<F>(kind: MetricKind, fut: F) -> f64
where
    F: Future<Output = f64>,
{
    if tokio::runtime::Handle::try_current().is_ok() {
        warn!(
            metric = %kind,
            "synchronous evaluation inside an async runtime, returning neutral score"
        );
        return kind.neutral();
    }

    match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime.block_on(fut),
        Err(e) => {
            warn!(metric = %kind, error = %e, "failed to build runtime, returning neutral score");
            kind.neutral()
        }
    }
}
