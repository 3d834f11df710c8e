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

//! Evaluation orchestrator
//!
//! [`QualityEvaluator`] owns an ordered list of metrics. Each evaluation
//! validates its inputs, runs every metric in order, clamps the scores into
//! [0.0, 1.0], runs the composite and freezes the result into a
//! [`QualityReport`]. Evaluations share no mutable state, so the same pair
//! always produces the same report.

use crate::composite::ThresholdTable;
use crate::config::EvalConfig;
use crate::llm_client::{EmbeddingClient, LLMClient, OpenAIClient};
use crate::metrics::{
    mandatory_metrics, EmbeddingDriftMetric, MemorizationMetric, SemanticFidelityJudge,
};
use crate::report::{MetricVector, QualityReport};
use crate::{EvalError, Metric, MetricKind};
use dialogeval_core::{Dialogue, Seed};
use futures::{StreamExt, TryStreamExt};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info};

pub struct QualityEvaluator {
    metrics: Vec<Arc<dyn Metric>>,
    thresholds: ThresholdTable,
    config: EvalConfig,
}

impl QualityEvaluator {
    /// Evaluator with the six mandatory metrics and default configuration
    pub fn new() -> Self {
        Self {
            metrics: mandatory_metrics(),
            thresholds: ThresholdTable::default(),
            config: EvalConfig::default(),
        }
    }

    /// Apply configuration to metrics registered afterwards and to batches
    pub fn with_config(mut self, config: EvalConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a metric, replacing any registered metric of the same kind
    pub fn with_metric(mut self, metric: Arc<dyn Metric>) -> Self {
        let kind = metric.kind();
        match self.metrics.iter().position(|m| m.kind() == kind) {
            Some(idx) => self.metrics[idx] = metric,
            None => self.metrics.push(metric),
        }
        self
    }

    /// Replace the whole metric list
    pub fn with_metrics(mut self, metrics: Vec<Arc<dyn Metric>>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Enable the memorization gate against `corpus`
    pub fn with_memorization_corpus<S: AsRef<str>>(self, corpus: &[S]) -> Self {
        let metric = MemorizationMetric::with_ngram(corpus, self.config.memorization_ngram);
        self.with_metric(Arc::new(metric))
    }

    /// Enable the LLM semantic fidelity judge
    pub fn with_semantic_judge(self, client: Arc<dyn LLMClient>) -> Self {
        let judge = SemanticFidelityJudge::new(client).with_timeout(self.config.judge_timeout());
        self.with_metric(Arc::new(judge))
    }

    /// Enable the semantic judge on an OpenAI-compatible endpoint
    ///
    /// The model and endpoint come from the current configuration
    /// (`judge_model`, `judge_base_url`), so call [`with_config`](Self::with_config) first.
    pub fn with_openai_judge(self, api_key: impl Into<String>) -> Self {
        let mut client = OpenAIClient::new(api_key.into(), self.config.judge_model.clone());
        if let Some(base_url) = &self.config.judge_base_url {
            client = client.with_base_url(base_url.clone());
        }
        self.with_semantic_judge(Arc::new(client))
    }

    /// Enable embedding drift
    pub fn with_embedding_drift(self, client: Arc<dyn EmbeddingClient>) -> Self {
        let metric = EmbeddingDriftMetric::new(client).with_timeout(self.config.judge_timeout());
        self.with_metric(Arc::new(metric))
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Registered metric kinds, in evaluation order
    pub fn metric_kinds(&self) -> Vec<MetricKind> {
        self.metrics.iter().map(|m| m.kind()).collect()
    }

    fn check_inputs(&self, dialogue: &Dialogue, seed: &Seed) -> Result<(), EvalError> {
        if self.metrics.is_empty() {
            return Err(EvalError::InvalidInput("No metrics configured".to_string()));
        }
        seed.validate()?;
        dialogue.validate()?;
        Ok(())
    }

    fn record(
        &self,
        vector: &mut MetricVector,
        kind: MetricKind,
        outcome: Result<f64, EvalError>,
    ) -> Result<(), EvalError> {
        let raw = outcome.map_err(|e| match e {
            EvalError::Metric { .. } => e,
            other => EvalError::Metric {
                metric: kind,
                reason: other.to_string(),
            },
        })?;
        let score = clamp_score(raw);
        debug!(metric = %kind, raw, score, "metric computed");
        vector.set(kind, score);
        Ok(())
    }

    fn finish(&self, dialogue: &Dialogue, seed: &Seed, vector: MetricVector) -> QualityReport {
        let report = QualityReport::assemble(&dialogue.id, &seed.id, vector, &self.thresholds);
        debug!(
            dialogue_id = %dialogue.id,
            seed_id = %seed.id,
            composite = report.composite_score(),
            passed = report.passed(),
            failures = report.failures().len(),
            "dialogue evaluated"
        );
        report
    }

    /// Evaluate one dialogue against its seed
    ///
    /// Fails before any metric runs when the seed declares fewer than two
    /// roles or the dialogue has no turns. An error from any metric is fatal
    /// to the evaluation.
    pub fn evaluate(&self, dialogue: &Dialogue, seed: &Seed) -> Result<QualityReport, EvalError> {
        self.check_inputs(dialogue, seed)?;

        let mut vector = MetricVector::default();
        for metric in &self.metrics {
            self.record(&mut vector, metric.kind(), metric.compute(dialogue, seed))?;
        }
        Ok(self.finish(dialogue, seed, vector))
    }

    /// Like [`evaluate`](Self::evaluate), but model-backed metrics complete
    /// their inference call instead of falling back to a neutral score
    pub async fn evaluate_async(
        &self,
        dialogue: &Dialogue,
        seed: &Seed,
    ) -> Result<QualityReport, EvalError> {
        self.check_inputs(dialogue, seed)?;

        let mut vector = MetricVector::default();
        for metric in &self.metrics {
            let outcome = metric.compute_async(dialogue, seed).await;
            self.record(&mut vector, metric.kind(), outcome)?;
        }
        Ok(self.finish(dialogue, seed, vector))
    }

    /// Evaluate index-paired dialogues and seeds sequentially
    ///
    /// Mismatched lengths are rejected before anything is evaluated. The
    /// first failing pair fails the whole batch.
    #[tracing::instrument(skip(self, dialogues, seeds), fields(batch_size = dialogues.len()))]
    pub fn evaluate_batch(
        &self,
        dialogues: &[Dialogue],
        seeds: &[Seed],
    ) -> Result<Vec<QualityReport>, EvalError> {
        check_batch(dialogues.len(), seeds.len())?;

        let reports = dialogues
            .iter()
            .zip(seeds)
            .map(|(dialogue, seed)| self.evaluate(dialogue, seed))
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            evaluated = reports.len(),
            passed = reports.iter().filter(|r| r.passed()).count(),
            "batch evaluated"
        );
        Ok(reports)
    }

    /// Evaluate pairs concurrently, at most `max_concurrent` at a time
    ///
    /// Each pair runs as its own task through the async path. Reports come
    /// back in input order and the batch fails on the first error in that
    /// order; tasks still in flight at that point are aborted.
    #[tracing::instrument(skip(self, dialogues, seeds), fields(batch_size = dialogues.len()))]
    pub async fn evaluate_batch_parallel(
        self: Arc<Self>,
        dialogues: Vec<Dialogue>,
        seeds: Vec<Seed>,
    ) -> Result<Vec<QualityReport>, EvalError> {
        check_batch(dialogues.len(), seeds.len())?;
        let width = self.config.concurrency();

        let reports: Vec<QualityReport> = futures::stream::iter(dialogues.into_iter().zip(seeds))
            .map(|(dialogue, seed)| {
                let evaluator = Arc::clone(&self);
                AbortOnDrop(tokio::spawn(async move {
                    evaluator.evaluate_async(&dialogue, &seed).await
                }))
            })
            .buffered(width)
            .map(|joined| {
                joined
                    .map_err(|e| EvalError::Panic(e.to_string()))
                    .and_then(|outcome| outcome)
            })
            .try_collect()
            .await?;

        info!(
            evaluated = reports.len(),
            passed = reports.iter().filter(|r| r.passed()).count(),
            width,
            "parallel batch evaluated"
        );
        Ok(reports)
    }
}

impl Default for QualityEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

/// Join handle that aborts its task when dropped unfinished
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Future for AbortOnDrop<T> {
    type Output = Result<T, JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.0).poll(cx)
    }
}

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn check_batch(dialogues: usize, seeds: usize) -> Result<(), EvalError> {
    if dialogues != seeds {
        return Err(EvalError::BatchLengthMismatch { dialogues, seeds });
    }
    Ok(())
}

/// Clamp a raw metric output into [0.0, 1.0]; NaN maps to 0.0
fn clamp_score(raw: f64) -> f64 {
    if raw.is_nan() {
        0.0
    } else {
        raw.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dialogeval_core::{CoreError, RoleSpec};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed(MetricKind, f64);

    impl Metric for Fixed {
        fn kind(&self) -> MetricKind {
            self.0
        }

        fn compute(&self, _dialogue: &Dialogue, _seed: &Seed) -> Result<f64, EvalError> {
            Ok(self.1)
        }
    }

    struct Counting(AtomicUsize);

    impl Metric for Counting {
        fn kind(&self) -> MetricKind {
            MetricKind::RougeL
        }

        fn compute(&self, _dialogue: &Dialogue, _seed: &Seed) -> Result<f64, EvalError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(1.0)
        }
    }

    /// Counts evaluations that ran to completion on the async path
    struct Slow(Arc<AtomicUsize>);

    #[async_trait::async_trait]
    impl Metric for Slow {
        fn kind(&self) -> MetricKind {
            MetricKind::RougeL
        }

        fn compute(&self, _dialogue: &Dialogue, _seed: &Seed) -> Result<f64, EvalError> {
            Ok(1.0)
        }

        async fn compute_async(&self, dialogue: &Dialogue, seed: &Seed) -> Result<f64, EvalError> {
            tokio::time::sleep(std::time::Duration::from_millis(300)).await;
            self.0.fetch_add(1, Ordering::SeqCst);
            self.compute(dialogue, seed)
        }
    }

    struct Broken;

    impl Metric for Broken {
        fn kind(&self) -> MetricKind {
            MetricKind::Coherence
        }

        fn compute(&self, _dialogue: &Dialogue, _seed: &Seed) -> Result<f64, EvalError> {
            Err(EvalError::InvalidInput("boom".to_string()))
        }
    }

    fn seed() -> Seed {
        Seed::new(
            "seed-1",
            "support",
            vec![RoleSpec::new("customer", ""), RoleSpec::new("agent", "")],
            "resolve the billing issue",
        )
    }

    fn dialogue(id: &str) -> Dialogue {
        Dialogue::from_pairs(
            id,
            [
                ("customer", "I was billed twice for the billing issue"),
                ("agent", "I will resolve the billing issue by refunding one charge"),
            ],
        )
    }

    #[test]
    fn test_clamp_score() {
        assert_eq!(clamp_score(1.7), 1.0);
        assert_eq!(clamp_score(-0.2), 0.0);
        assert_eq!(clamp_score(f64::NAN), 0.0);
        assert_eq!(clamp_score(0.42), 0.42);
    }

    #[test]
    fn test_out_of_range_scores_are_clamped() {
        let evaluator = QualityEvaluator::new()
            .with_metric(Arc::new(Fixed(MetricKind::RougeL, 1.7)))
            .with_metric(Arc::new(Fixed(MetricKind::Coherence, f64::NAN)));
        let report = evaluator.evaluate(&dialogue("d"), &seed()).unwrap();
        assert_eq!(report.metrics().rouge_l, 1.0);
        assert_eq!(report.metrics().coherence, 0.0);
    }

    #[test]
    fn test_with_metric_replaces_same_kind() {
        let evaluator = QualityEvaluator::new().with_metric(Arc::new(Fixed(MetricKind::RougeL, 0.3)));
        assert_eq!(evaluator.metric_kinds().len(), 6);
        assert_eq!(evaluator.metric_kinds()[0], MetricKind::RougeL);

        let evaluator = evaluator.with_memorization_corpus(&["some published text"]);
        assert_eq!(evaluator.metric_kinds().len(), 7);
        assert_eq!(evaluator.metric_kinds()[6], MetricKind::MemorizationRate);
    }

    #[test]
    fn test_report_carries_ids() {
        let report = QualityEvaluator::new().evaluate(&dialogue("dlg-9"), &seed()).unwrap();
        assert_eq!(report.dialogue_id(), "dlg-9");
        assert_eq!(report.seed_id(), "seed-1");
        assert!(report.metrics().semantic_fidelity.is_none());
    }

    #[test]
    fn test_evaluate_is_idempotent() {
        let evaluator = QualityEvaluator::new();
        let first = evaluator.evaluate(&dialogue("d"), &seed()).unwrap();
        let second = evaluator.evaluate(&dialogue("d"), &seed()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_seed_rejected_before_metrics_run() {
        let counter = Arc::new(Counting(AtomicUsize::new(0)));
        let evaluator = QualityEvaluator::new().with_metrics(vec![counter.clone() as Arc<dyn Metric>]);
        let lonely = Seed::new("s", "d", vec![RoleSpec::new("only", "")], "o");

        let err = evaluator.evaluate(&dialogue("d"), &lonely).unwrap_err();
        assert!(matches!(
            err,
            EvalError::Validation(CoreError::TooFewRoles { found: 1, .. })
        ));
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_empty_dialogue_rejected() {
        let err = QualityEvaluator::new()
            .evaluate(&Dialogue::new("empty", vec![]), &seed())
            .unwrap_err();
        assert!(err.to_string().contains("has no turns"));
    }

    #[test]
    fn test_metric_error_is_fatal_and_named() {
        let evaluator = QualityEvaluator::new().with_metric(Arc::new(Broken));
        let err = evaluator.evaluate(&dialogue("d"), &seed()).unwrap_err();
        match err {
            EvalError::Metric { metric, reason } => {
                assert_eq!(metric, MetricKind::Coherence);
                assert!(reason.contains("boom"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_no_metrics_is_invalid() {
        let err = QualityEvaluator::new()
            .with_metrics(Vec::new())
            .evaluate(&dialogue("d"), &seed())
            .unwrap_err();
        assert!(matches!(err, EvalError::InvalidInput(_)));
    }

    #[test]
    fn test_batch_length_mismatch_evaluates_nothing() {
        let counter = Arc::new(Counting(AtomicUsize::new(0)));
        let evaluator = QualityEvaluator::new().with_metrics(vec![counter.clone() as Arc<dyn Metric>]);
        let err = evaluator
            .evaluate_batch(&[dialogue("a"), dialogue("b")], &[seed()])
            .unwrap_err();
        assert!(matches!(
            err,
            EvalError::BatchLengthMismatch {
                dialogues: 2,
                seeds: 1
            }
        ));
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_batch_preserves_order() {
        let reports = QualityEvaluator::new()
            .evaluate_batch(&[dialogue("a"), dialogue("b"), dialogue("c")], &[seed(), seed(), seed()])
            .unwrap();
        let ids: Vec<&str> = reports.iter().map(|r| r.dialogue_id()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_batch_fails_on_first_bad_pair() {
        let err = QualityEvaluator::new()
            .evaluate_batch(&[dialogue("a"), Dialogue::new("b", vec![])], &[seed(), seed()])
            .unwrap_err();
        assert!(matches!(err, EvalError::Validation(CoreError::EmptyDialogue { .. })));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_parallel_batch_matches_sequential() {
        let evaluator = Arc::new(QualityEvaluator::new().with_config(EvalConfig {
            max_concurrent: 2,
            ..EvalConfig::default()
        }));
        let dialogues: Vec<Dialogue> = (0..5).map(|i| dialogue(&format!("d{i}"))).collect();
        let seeds = vec![seed(); 5];

        let sequential = evaluator.evaluate_batch(&dialogues, &seeds).unwrap();
        let parallel = Arc::clone(&evaluator)
            .evaluate_batch_parallel(dialogues, seeds)
            .await
            .unwrap();
        assert_eq!(sequential, parallel);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_parallel_batch_fails_on_first_bad_pair() {
        let err = Arc::new(QualityEvaluator::new())
            .evaluate_batch_parallel(
                vec![dialogue("a"), Dialogue::new("bad", vec![]), dialogue("c")],
                vec![seed(), seed(), seed()],
            )
            .await
            .unwrap_err();
        match err {
            EvalError::Validation(CoreError::EmptyDialogue { dialogue_id }) => {
                assert_eq!(dialogue_id, "bad")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_parallel_batch_aborts_in_flight_pairs_on_error() {
        let finished = Arc::new(AtomicUsize::new(0));
        let evaluator = QualityEvaluator::new()
            .with_metrics(vec![Arc::new(Slow(Arc::clone(&finished))) as Arc<dyn Metric>])
            .with_config(EvalConfig {
                max_concurrent: 4,
                ..EvalConfig::default()
            });

        let err = Arc::new(evaluator)
            .evaluate_batch_parallel(
                vec![Dialogue::new("bad", vec![]), dialogue("b"), dialogue("c"), dialogue("d")],
                vec![seed(), seed(), seed(), seed()],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EvalError::Validation(CoreError::EmptyDialogue { .. })));

        tokio::time::sleep(std::time::Duration::from_millis(600)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_parallel_batch_rejects_mismatch() {
        let err = Arc::new(QualityEvaluator::new())
            .evaluate_batch_parallel(vec![dialogue("a")], Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EvalError::BatchLengthMismatch { .. }));
    }
}
