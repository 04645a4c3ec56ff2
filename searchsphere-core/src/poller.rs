//! Metrics poller.
//!
//! Periodically fetches the backend metrics document, keeps a bounded rolling
//! window of search latency percentiles, and remembers the latest evaluation
//! summary. A failed poll is recorded and logged but never stops the loop.

use crate::client::GatewayClient;
use crate::error::ClientError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Poller settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    /// Seconds between polls.
    pub interval_secs: u64,
    /// Number of samples retained.
    pub window: usize,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            window: 30,
        }
    }
}

impl PollerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.interval_secs == 0 {
            warnings.push("metrics.interval_secs is 0; polling every second instead".to_string());
        }
        if self.window == 0 {
            warnings.push("metrics.window is 0; a single sample will be kept".to_string());
        }
        warnings
    }
}

/// One point of the latency series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencySample {
    pub timestamp: DateTime<Utc>,
    pub p50_ms: f64,
    pub p95_ms: f64,
}

/// Fixed-capacity rolling window; the oldest sample is evicted first.
#[derive(Debug, Clone)]
pub struct LatencyWindow {
    samples: VecDeque<LatencySample>,
    capacity: usize,
}

impl LatencyWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sample: LatencySample) {
        while self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn latest(&self) -> Option<&LatencySample> {
        self.samples.back()
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &LatencySample> {
        self.samples.iter()
    }
}

/// p50/p95 for one stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageLatency {
    pub p50_ms: f64,
    pub p95_ms: f64,
}

/// Latest precision@k summary reported by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalSummary {
    pub k: u32,
    pub p_at_k: f64,
    #[serde(default)]
    pub runs: u64,
}

/// Read `stage` latency from either metrics shape.
///
/// Understands `{ "<stage>": { "p50_ms", "p95_ms" } }` and the older
/// `{ "latency_ms": { "<stage>_p50", "<stage>_p95" } }`.
pub fn stage_latency(metrics: &Value, stage: &str) -> Option<StageLatency> {
    if let Some(section) = metrics.get(stage)
        && let (Some(p50_ms), Some(p95_ms)) = (
            section.get("p50_ms").and_then(Value::as_f64),
            section.get("p95_ms").and_then(Value::as_f64),
        )
    {
        return Some(StageLatency { p50_ms, p95_ms });
    }

    let legacy = metrics.get("latency_ms")?;
    Some(StageLatency {
        p50_ms: legacy.get(format!("{stage}_p50"))?.as_f64()?,
        p95_ms: legacy.get(format!("{stage}_p95"))?.as_f64()?,
    })
}

pub fn eval_summary(metrics: &Value) -> Option<EvalSummary> {
    metrics
        .get("eval")
        .filter(|v| v.is_object())
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

/// Anything that can produce a metrics document.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn fetch_metrics(&self, cancel: &CancellationToken) -> Result<Value, ClientError>;
}

#[async_trait]
impl MetricsSource for GatewayClient {
    async fn fetch_metrics(&self, cancel: &CancellationToken) -> Result<Value, ClientError> {
        self.metrics(cancel).await
    }
}

/// Polls a [`MetricsSource`] and accumulates the latency series.
pub struct MetricsPoller<S> {
    source: S,
    config: PollerConfig,
    window: LatencyWindow,
    eval: Option<EvalSummary>,
    chat: Option<StageLatency>,
    last_error: Option<String>,
}

impl<S: MetricsSource> MetricsPoller<S> {
    pub fn new(source: S, config: PollerConfig) -> Self {
        let window = LatencyWindow::new(config.window);
        Self {
            source,
            config,
            window,
            eval: None,
            chat: None,
            last_error: None,
        }
    }

    pub fn window(&self) -> &LatencyWindow {
        &self.window
    }

    pub fn eval(&self) -> Option<&EvalSummary> {
        self.eval.as_ref()
    }

    /// Chat latency from the most recent successful poll.
    pub fn chat(&self) -> Option<StageLatency> {
        self.chat
    }

    /// Inline error from the most recent poll, cleared by the next success.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Poll once. Returns whether a sample was appended.
    pub async fn tick(&mut self, cancel: &CancellationToken) -> bool {
        let metrics = match self.source.fetch_metrics(cancel).await {
            Ok(metrics) => metrics,
            Err(err) if err.is_cancelled() => return false,
            Err(err) => {
                warn!(error = %err, "Metrics poll failed");
                self.last_error = Some(err.to_string());
                return false;
            }
        };

        if let Some(eval) = eval_summary(&metrics) {
            self.eval = Some(eval);
        }
        self.chat = stage_latency(&metrics, "chat");

        match stage_latency(&metrics, "search") {
            Some(search) => {
                self.window.push(LatencySample {
                    timestamp: Utc::now(),
                    p50_ms: search.p50_ms,
                    p95_ms: search.p95_ms,
                });
                self.last_error = None;
                debug!(p50_ms = search.p50_ms, p95_ms = search.p95_ms, "Metrics sample recorded");
                true
            }
            None => {
                warn!("Metrics response carried no search latency");
                self.last_error = Some("metrics response has no search latency".to_string());
                false
            }
        }
    }

    /// Poll on the configured interval until `cancel` fires.
    ///
    /// The first poll happens immediately. `on_tick` runs after every poll.
    pub async fn run<F>(&mut self, cancel: CancellationToken, mut on_tick: F)
    where
        F: FnMut(&Self) + Send,
    {
        let mut interval = tokio::time::interval(self.config.interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }
            self.tick(&cancel).await;
            if cancel.is_cancelled() {
                break;
            }
            on_tick(self);
        }
        debug!("Metrics poller stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Mutex;

    struct Scripted {
        responses: Mutex<VecDeque<Result<Value, ClientError>>>,
    }

    impl Scripted {
        fn new(responses: Vec<Result<Value, ClientError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
            }
        }
    }

    #[async_trait]
    impl MetricsSource for Scripted {
        async fn fetch_metrics(&self, _cancel: &CancellationToken) -> Result<Value, ClientError> {
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(json!({"search": {"p50_ms": 1.0, "p95_ms": 2.0}})))
        }
    }

    fn sample(n: usize) -> LatencySample {
        LatencySample {
            timestamp: Utc::now(),
            p50_ms: n as f64,
            p95_ms: n as f64 * 2.0,
        }
    }

    #[test]
    fn test_window_evicts_oldest() {
        let mut window = LatencyWindow::new(30);
        for n in 0..31 {
            window.push(sample(n));
        }
        assert_eq!(window.len(), 30);
        assert_eq!(window.iter().next().unwrap().p50_ms, 1.0);
        assert_eq!(window.latest().unwrap().p50_ms, 30.0);
    }

    #[test]
    fn test_zero_capacity_keeps_one() {
        let mut window = LatencyWindow::new(0);
        window.push(sample(1));
        window.push(sample(2));
        assert_eq!(window.capacity(), 1);
        assert_eq!(window.latest().unwrap().p50_ms, 2.0);
    }

    #[test]
    fn test_stage_latency_both_shapes() {
        let normalized = json!({
            "search": {"count": 4, "p50_ms": 120.0, "p95_ms": 340.5, "samples": 4},
            "chat": {"count": 1, "p50_ms": 900, "p95_ms": 900, "samples": 1}
        });
        assert_eq!(
            stage_latency(&normalized, "search"),
            Some(StageLatency { p50_ms: 120.0, p95_ms: 340.5 })
        );
        assert_eq!(stage_latency(&normalized, "chat").unwrap().p50_ms, 900.0);

        let legacy = json!({"latency_ms": {"search_p50": 80, "search_p95": 200}});
        assert_eq!(
            stage_latency(&legacy, "search"),
            Some(StageLatency { p50_ms: 80.0, p95_ms: 200.0 })
        );
        assert_eq!(stage_latency(&legacy, "chat"), None);
        assert_eq!(stage_latency(&json!({}), "search"), None);
    }

    #[test]
    fn test_eval_summary_extraction() {
        let metrics = json!({"eval": {"k": 10, "p_at_k": 0.62, "runs": 3}});
        assert_eq!(
            eval_summary(&metrics),
            Some(EvalSummary { k: 10, p_at_k: 0.62, runs: 3 })
        );
        assert_eq!(eval_summary(&json!({"eval": null})), None);
    }

    #[tokio::test]
    async fn test_failed_poll_records_error_then_clears() {
        let source = Scripted::new(vec![
            Err(ClientError::Status {
                operation: "Metrics",
                status: 502,
            }),
            Ok(json!({
                "search": {"p50_ms": 10.0, "p95_ms": 20.0},
                "eval": {"k": 5, "p_at_k": 0.4, "runs": 1}
            })),
        ]);
        let mut poller = MetricsPoller::new(source, PollerConfig::default());
        let cancel = CancellationToken::new();

        assert!(!poller.tick(&cancel).await);
        assert_eq!(poller.last_error(), Some("Metrics failed: 502"));
        assert!(poller.window().is_empty());

        assert!(poller.tick(&cancel).await);
        assert_eq!(poller.last_error(), None);
        assert_eq!(poller.window().len(), 1);
        assert_eq!(poller.eval().unwrap().k, 5);
    }

    #[tokio::test]
    async fn test_shapeless_metrics_is_an_inline_error() {
        let source = Scripted::new(vec![Ok(json!({"status": "warming up"}))]);
        let mut poller = MetricsPoller::new(source, PollerConfig::default());
        assert!(!poller.tick(&CancellationToken::new()).await);
        assert!(poller.last_error().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_keeps_polling_after_failures() {
        let source = Scripted::new(vec![Err(ClientError::Transport {
            operation: "Metrics",
            message: "connection refused".into(),
        })]);
        let config = PollerConfig {
            interval_secs: 10,
            window: 2,
        };
        let mut poller = MetricsPoller::new(source, config);
        let cancel = CancellationToken::new();

        let mut ticks = 0;
        let stop = cancel.clone();
        poller
            .run(cancel, |p| {
                ticks += 1;
                if ticks == 4 {
                    assert_eq!(p.window().len(), 2);
                    assert_eq!(p.last_error(), None);
                    stop.cancel();
                }
            })
            .await;
        assert_eq!(ticks, 4);
    }
}
