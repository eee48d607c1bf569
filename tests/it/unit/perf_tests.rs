//! Unit tests for perf module.

use streamchart::perf::{ScopedTimer, measure, measure_and_log};

#[test]
fn test_scoped_timer_creation() {
    // High threshold: dropping must not warn or panic
    let timer = ScopedTimer::new("test_op", 1000.0);
    assert_eq!(timer.name(), "test_op");
    assert!(timer.elapsed_ms() >= 0.0);
}

#[test]
fn test_measure_returns_result_and_time() {
    let (sum, elapsed_ms) = measure(|| (1..=10).sum::<i32>());
    assert_eq!(sum, 55);
    assert!(elapsed_ms >= 0.0);
}

#[test]
fn test_measure_and_log_passes_result_through() {
    let result: Result<u8, String> = measure_and_log("test_rollup", 1000.0, || Ok(3));
    assert_eq!(result, Ok(3));

    // A zero threshold logs, the value is still returned
    let value = measure_and_log("test_slow", 0.0, || "done");
    assert_eq!(value, "done");
}
