//! Tests for utility functions

use std::time::Duration;

use grid_hub::config::Timeout;
use grid_hub::util::{elapsed_ms, init_tracing, now_ms};

#[test]
fn test_now_ms_is_monotone_enough() {
    let a = now_ms();
    std::thread::sleep(Duration::from_millis(2));
    let b = now_ms();
    assert!(b >= a);
    assert!(a > 1_600_000_000_000);
}

#[test]
fn test_elapsed_ms_saturates() {
    assert_eq!(elapsed_ms(100, 350), 250);
    assert_eq!(elapsed_ms(350, 100), 0);
}

#[test]
fn test_timeout_sentinel() {
    assert_eq!(Timeout::from_millis(-1), Timeout::Disabled);
    assert_eq!(Timeout::from_millis(-42), Timeout::Disabled);
    assert_eq!(Timeout::from_millis(0), Timeout::After(Duration::ZERO));
    assert_eq!(Timeout::Disabled.as_millis(), -1);
    assert_eq!(serde_json::to_string(&Timeout::Disabled).unwrap(), "-1");
    let parsed: Timeout = serde_json::from_str("1500").unwrap();
    assert_eq!(parsed.as_duration(), Some(Duration::from_millis(1500)));
}

#[test]
fn test_timeout_elapsed() {
    let t = Timeout::from_millis(100);
    assert!(!t.has_elapsed(1_000, 1_050));
    assert!(t.has_elapsed(1_000, 1_100));
    assert!(!Timeout::Disabled.has_elapsed(0, u128::MAX));
}

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing();
    init_tracing();
    tracing::info!("tracing initialized twice without panicking");
}
