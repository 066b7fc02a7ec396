use common_test_utils::*;

use chrono::Utc;
use crypto_monitor::analyzer::divergence::{
    DetectionMode, DivergenceDetector, DivergenceKind, DivergenceMode, detect_regular_divergence,
};
use crypto_monitor::model::{Candle, Timeframe};

fn combined_detector() -> DivergenceDetector {
    DivergenceDetector {
        rsi_period: 7,
        lookback_periods: 15,
        ..Default::default()
    }
}

fn pivot_detector(recent: usize) -> DivergenceDetector {
    DivergenceDetector {
        rsi_period: 5,
        left_bars: 2,
        right_bars: 2,
        lookback_range: (3, 30),
        recent_bars_only: Some(recent),
        lookback_periods: 15,
    }
}

#[test]
fn test_regular_pair_is_bullish_only() {
    let kind = detect_regular_divergence((100.0, 40.0), (99.0, 43.0), 3.0);
    assert_eq!(kind, Some(DivergenceKind::RegularBullish));
}

#[test]
fn test_dip_then_recovery_yields_one_regular_bullish() {
    let candles = candles_from_closes(&dip_then_recovery_closes(), 0.5);
    let signals = combined_detector().detect(&candles, Timeframe::Minute5, DivergenceMode::Combined);

    assert_eq!(signals.len(), 1);
    let signal = &signals[0];
    assert_eq!(signal.kind, DivergenceKind::RegularBullish);
    assert_eq!(signal.mode, DetectionMode::Lookback);
    assert_eq!(signal.bars_apart, 10);
    assert_eq!(signal.price_pair, (100.0, 98.0));
    assert!(signal.rsi_change() >= 3.0);
    assert_eq!(signal.timestamp, candles[30].datetime());

    let message = signal.message(&Utc);
    assert!(message.contains("Regular Bullish"));
    assert!(message.contains("(5m)"));
}

#[test]
fn test_immediate_mode_stays_quiet_on_fixture() {
    let candles = candles_from_closes(&dip_then_recovery_closes(), 0.5);
    assert!(combined_detector()
        .detect_immediate(&candles, Timeframe::Minute5)
        .is_empty());
}

#[test]
fn test_hidden_found_only_without_regular() {
    let closes = [
        100.0, 101.0, 100.0, 98.0, 96.0, 99.0, 102.0, 103.0, 101.0, 103.0, 106.0, 109.0, 108.0,
        110.0, 108.0, 111.0, 110.0, 111.0, 113.0, 116.0, 117.0, 118.0, 117.0, 115.0, 118.0,
        119.0, 121.0, 124.0, 127.0, 126.0,
    ];
    let candles = candles_from_closes(&closes, 0.5);
    let signals = combined_detector().detect(&candles, Timeframe::Minute15, DivergenceMode::Combined);

    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0].kind, DivergenceKind::HiddenBullish);
    assert!(signals[0].kind.is_hidden());
    assert_eq!(signals[0].qualifier(), "15m_lookback_hidden_bullish");
}

#[test]
fn test_pivot_mode_regular_bullish() {
    let candles = candles_from_closes(&pivot_bullish_closes(), 0.5);
    let signals = pivot_detector(5).detect(&candles, Timeframe::Hour1, DivergenceMode::Pivot);

    assert_eq!(signals.len(), 1);
    let signal = &signals[0];
    assert_eq!(signal.kind, DivergenceKind::RegularBullish);
    assert_eq!(signal.mode, DetectionMode::Pivot);
    assert_eq!(signal.price_pair, (89.5, 88.5));
    assert!(signal.rsi_pair.1 > signal.rsi_pair.0);
    assert_eq!(signal.bars_apart, 11);
}

#[test]
fn test_pivot_mode_ignores_stale_pivots() {
    let candles = candles_from_closes(&pivot_bullish_closes(), 0.5);
    // 마지막 피벗이 끝에서 5캔들 떨어져 있음
    assert!(pivot_detector(4)
        .detect_pivot(&candles, Timeframe::Hour1)
        .is_empty());
}

#[test]
fn test_pivot_mode_respects_lookback_range() {
    let candles = candles_from_closes(&pivot_bullish_closes(), 0.5);
    let detector = DivergenceDetector {
        lookback_range: (3, 10),
        ..pivot_detector(5)
    };
    assert!(detector.detect_pivot(&candles, Timeframe::Hour1).is_empty());
}
