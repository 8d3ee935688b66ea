//! End-to-end checks of the feature rows produced for synthetic daily histories.

use chrono::{Duration, TimeZone, Utc};
use configuration::IndicatorParams;
use core_types::Tick;
use indicators::{IndicatorEngine, IndicatorError};
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;

fn daily_history(instrument: &str, closes: &[Decimal]) -> Vec<Tick> {
    let start = Utc.with_ymd_and_hms(2023, 1, 2, 21, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, close)| Tick {
            instrument: instrument.to_string(),
            timestamp: start + Duration::days(i as i64),
            open: *close,
            high: *close + dec!(0.5),
            low: *close - dec!(0.5),
            close: *close,
            volume: Decimal::from(1_000 + i as i64),
        })
        .collect()
}

#[test]
fn linear_trend_moving_average_matches_trailing_mean() {
    let closes: Vec<Decimal> = (0..260).map(|t| dec!(100) + dec!(0.1) * Decimal::from(t)).collect();
    let ticks = daily_history("TREND", &closes);

    let engine = IndicatorEngine::new(IndicatorParams::default()).unwrap();
    let rows = engine.compute(&ticks).unwrap();

    assert_eq!(rows.len(), 260);
    let expected: Decimal = closes[210..260].iter().sum::<Decimal>() / dec!(50);
    assert_eq!(rows[259].ma_short, Some(expected.round_dp(3)));
    assert_eq!(rows[259].ma_short, Some(dec!(123.45)));

    // The 200-day average is undefined until index 199.
    assert!(rows[198].ma_long.is_none());
    assert!(rows[199].ma_long.is_some());
    assert!(rows[48].ma_short.is_none());
    assert!(rows[49].ma_short.is_some());

    // A steady uptrend never has a down day.
    assert_eq!(rows[259].rsi, Some(dec!(100)));
}

#[test]
fn flat_series_has_zero_rolling_std_and_collapsed_bands() {
    let closes = vec![dec!(100); 260];
    let ticks = daily_history("FLAT", &closes);

    let engine = IndicatorEngine::new(IndicatorParams::default()).unwrap();
    let rows = engine.compute(&ticks).unwrap();

    let last = &rows[259];
    assert_eq!(last.rolling_std, Some(Decimal::ZERO));
    assert_eq!(last.bb_upper, Some(dec!(100)));
    assert_eq!(last.bb_lower, Some(dec!(100)));
    assert_eq!(last.macd, Some(Decimal::ZERO));
    // No moves at all: the oscillator is undefined, not zero.
    assert!(last.rsi.is_none());
}

#[test]
fn warm_up_rows_carry_no_values() {
    let closes: Vec<Decimal> = (0..30).map(|t| dec!(50) + Decimal::from(t % 3)).collect();
    let ticks = daily_history("SHORT", &closes);

    let engine = IndicatorEngine::new(IndicatorParams::default()).unwrap();
    let rows = engine.compute(&ticks).unwrap();

    for row in &rows {
        assert!(row.ma_short.is_none());
        assert!(row.ma_long.is_none());
        assert!(row.rolling_std.is_none());
        assert!(row.volume_avg.is_none());
    }
    assert!(rows[18].bb_upper.is_none());
    assert!(rows[19].bb_upper.is_some());
    assert!(rows[13].rsi.is_none());
    assert!(rows[14].rsi.is_some());
}

#[test]
fn bands_are_ordered_and_rsi_bounded_on_noisy_data() {
    let closes: Vec<Decimal> = (0..300)
        .map(|t| {
            let wave = 100.0 + 8.0 * (t as f64 * 0.21).sin() + 3.0 * (t as f64 * 1.7).cos();
            Decimal::from_f64(wave).unwrap().round_dp(2)
        })
        .collect();
    let ticks = daily_history("NOISY", &closes);

    let engine = IndicatorEngine::new(IndicatorParams::default()).unwrap();
    for row in engine.compute(&ticks).unwrap() {
        if let (Some(upper), Some(lower)) = (row.bb_upper, row.bb_lower) {
            assert!(upper >= lower);
        }
        if let Some(rsi) = row.rsi {
            assert!(rsi >= Decimal::ZERO && rsi <= dec!(100));
        }
    }
}

#[test]
fn out_of_order_history_is_rejected() {
    let mut ticks = daily_history("BAD", &[dec!(1), dec!(2), dec!(3)]);
    ticks.swap(0, 2);

    let engine = IndicatorEngine::new(IndicatorParams::default()).unwrap();
    assert!(matches!(engine.compute(&ticks), Err(IndicatorError::InvalidInput(_))));
}
