use analytics::{AnalyticsError, CorrelationEngine};
use chrono::{DateTime, Duration, TimeZone, Utc};
use configuration::CorrelationParams;
use core_types::Tick;
use rust_decimal::prelude::*;

fn day(i: usize) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(i as i64)
}

fn tick(instrument: &str, i: usize, close: f64) -> Tick {
    let price = Decimal::from_f64(close).unwrap().round_dp(6);
    Tick {
        instrument: instrument.to_string(),
        timestamp: day(i),
        open: price,
        high: price,
        low: price,
        close: price,
        volume: Decimal::from(100),
    }
}

fn wave(i: usize) -> f64 {
    100.0 + 5.0 * (i as f64 * 0.45).sin() + 0.05 * i as f64
}

fn engine(window: usize, lookback: usize) -> CorrelationEngine {
    CorrelationEngine::new(CorrelationParams { window, lookback }).unwrap()
}

#[test]
fn proportional_series_are_perfectly_correlated() {
    let mut ticks = Vec::new();
    for i in 0..40 {
        ticks.push(tick("AAA", i, wave(i)));
        ticks.push(tick("BBB", i, 2.0 * wave(i)));
        ticks.push(tick("CCC", i, 300.0 - wave(i)));
    }

    let rows = engine(20, 90).compute(&ticks).unwrap();

    // 21 window positions times 3 unordered pairs.
    assert_eq!(rows.len(), 21 * 3);
    for row in &rows {
        assert!(row.instrument_a < row.instrument_b);
        assert!(row.is_defined());
        assert!((-1.0..=1.0).contains(&row.correlation));
        match (row.instrument_a.as_str(), row.instrument_b.as_str()) {
            ("AAA", "BBB") => assert!((row.correlation - 1.0).abs() < 1e-6),
            ("AAA", "CCC") | ("BBB", "CCC") => assert!(row.correlation < -0.9),
            other => panic!("unexpected pair {:?}", other),
        }
    }
    assert_eq!(rows[0].timestamp, day(19));
    assert_eq!(rows.last().unwrap().timestamp, day(39));
}

#[test]
fn flat_series_correlation_is_not_a_number() {
    let mut ticks = Vec::new();
    for i in 0..25 {
        ticks.push(tick("FLAT", i, 50.0));
        ticks.push(tick("MOVE", i, wave(i)));
    }
    let rows = engine(20, 90).compute(&ticks).unwrap();
    assert_eq!(rows.len(), 6);
    assert!(rows.iter().all(|row| !row.is_defined()));
}

#[test]
fn short_histories_are_excluded() {
    let mut ticks = Vec::new();
    for i in 0..30 {
        ticks.push(tick("LONG1", i, wave(i)));
        ticks.push(tick("LONG2", i, wave(i + 3)));
    }
    for i in 0..10 {
        ticks.push(tick("SHORT", 20 + i, wave(i)));
    }

    let rows = engine(20, 90).compute(&ticks).unwrap();
    assert_eq!(rows.len(), 11);
    assert!(rows.iter().all(|row| row.instrument_a == "LONG1" && row.instrument_b == "LONG2"));
}

#[test]
fn single_eligible_instrument_produces_nothing() {
    let ticks: Vec<Tick> = (0..30).map(|i| tick("ONLY", i, wave(i))).collect();
    assert!(engine(20, 90).compute(&ticks).unwrap().is_empty());
}

#[test]
fn lookback_keeps_the_most_recent_ticks() {
    let mut ticks = Vec::new();
    for i in 0..120 {
        ticks.push(tick("AAA", i, wave(i)));
        ticks.push(tick("BBB", i, wave(i + 7)));
    }
    let rows = engine(20, 90).compute(&ticks).unwrap();
    // The axis covers days 30..120.
    assert_eq!(rows.len(), 90 - 20 + 1);
    assert_eq!(rows[0].timestamp, day(49));
}

#[test]
fn gaps_use_pairwise_complete_returns() {
    let mut ticks = Vec::new();
    for i in 0..30 {
        ticks.push(tick("AAA", i, wave(i)));
        if i % 5 != 2 {
            ticks.push(tick("BBB", i, 3.0 * wave(i)));
        }
    }
    let rows = engine(20, 90).compute(&ticks).unwrap();
    assert_eq!(rows.len(), 11);
    for row in rows {
        assert!((row.correlation - 1.0).abs() < 1e-6);
    }
}

#[test]
fn duplicate_timestamps_are_rejected() {
    let ticks = vec![tick("AAA", 0, 10.0), tick("AAA", 0, 11.0)];
    assert!(matches!(
        engine(2, 10).compute(&ticks),
        Err(AnalyticsError::InvalidInput(_))
    ));
}
