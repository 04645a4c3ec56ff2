//! Best-effort wall-clock latency measurement.
//!
//! The measurement includes network transit and is only a fallback: a value
//! the backend already embedded is never overwritten.

use serde_json::{Map, Value};
use std::future::Future;
use std::time::{Duration, Instant};

/// Response field carrying the measured latency in milliseconds.
pub const LATENCY_FIELD: &str = "__latency_ms";

/// Started before dispatch, read after the response is decoded.
#[derive(Debug, Clone, Copy)]
pub struct LatencyTimer {
    started: Instant,
}

impl LatencyTimer {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Whole milliseconds since `start()`.
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Run a future and report how long it took.
pub async fn timed<F: Future>(fut: F) -> (F::Output, Duration) {
    let timer = LatencyTimer::start();
    let out = fut.await;
    (out, timer.elapsed())
}

/// Set `__latency_ms` unless the object already carries a non-null value.
///
/// Returns `true` when the field was written.
pub fn inject_latency(object: &mut Map<String, Value>, elapsed_ms: u64) -> bool {
    match object.get(LATENCY_FIELD) {
        Some(existing) if !existing.is_null() => false,
        _ => {
            object.insert(LATENCY_FIELD.to_string(), Value::from(elapsed_ms));
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_inject_when_absent() {
        let mut obj = object(json!({"results": []}));
        assert!(inject_latency(&mut obj, 42));
        assert_eq!(obj[LATENCY_FIELD], json!(42));
    }

    #[test]
    fn test_upstream_value_is_kept() {
        let mut obj = object(json!({"__latency_ms": 7.5}));
        assert!(!inject_latency(&mut obj, 42));
        assert_eq!(obj[LATENCY_FIELD], json!(7.5));

        let mut obj = object(json!({"__latency_ms": 0}));
        assert!(!inject_latency(&mut obj, 42));
        assert_eq!(obj[LATENCY_FIELD], json!(0));
    }

    #[test]
    fn test_null_counts_as_absent() {
        let mut obj = object(json!({"__latency_ms": null}));
        assert!(inject_latency(&mut obj, 3));
        assert_eq!(obj[LATENCY_FIELD], json!(3));
    }

    #[tokio::test]
    async fn test_timed_measures_sleep() {
        let (value, elapsed) = timed(async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            5
        })
        .await;
        assert_eq!(value, 5);
        assert!(elapsed >= Duration::from_millis(20));
    }

    #[test]
    fn test_timer_monotonic() {
        let timer = LatencyTimer::start();
        let first = timer.elapsed();
        assert!(timer.elapsed() >= first);
        assert!(timer.elapsed_ms() < 5_000);
    }
}
