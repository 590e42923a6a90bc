// src/strategies/pullback.rs
use crate::config::StrategyConfig;
use crate::strategies::indicators::{ema, rsi};
use crate::strategies::traits::Strategy;
use crate::types::{CandleWindow, PositionState, PositionStatus, Signal, TrendBias};
use rust_decimal::prelude::ToPrimitive;
use tracing::debug;

/// Trend-filtered pullback entry with a fixed holding period.
///
/// Enters long when the closed candle is bullish, sits within a band around the
/// short EMA, momentum is above threshold and the higher timeframe is not
/// bearish. Exits after `exit_bars` closed candles, nothing else.
pub struct TrendPullback {
    params: StrategyConfig,
}

/// Each entry condition on its own, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntryChecks {
    pub near_ma: bool,
    pub momentum_ok: bool,
    pub bullish_candle: bool,
    pub trend_ok: bool,
}

impl EntryChecks {
    pub fn all(&self) -> bool {
        self.near_ma && self.momentum_ok && self.bullish_candle && self.trend_ok
    }
}

impl TrendPullback {
    pub fn new(params: StrategyConfig) -> Self {
        Self { params }
    }

    /// `None` when the window is too short for the indicators.
    pub fn entry_checks(&self, window: &CandleWindow, bias: TrendBias) -> Option<EntryChecks> {
        let closes = to_f64(window);
        let ma = ema(&closes, self.params.ma_period)?;
        let momentum = rsi(&closes, self.params.momentum_period)?;

        let candle = window.latest();
        let close = candle.close.to_f64()?;

        let checks = EntryChecks {
            near_ma: (close - ma).abs() <= ma * self.params.proximity_band,
            momentum_ok: momentum > self.params.momentum_threshold,
            bullish_candle: candle.close > candle.open,
            trend_ok: bias != TrendBias::Bearish,
        };

        debug!(
            close_time = candle.close_time,
            close, ma, momentum, ?bias, ?checks, "entry checks"
        );
        Some(checks)
    }
}

fn to_f64(window: &CandleWindow) -> Vec<f64> {
    window
        .closes()
        .iter()
        .filter_map(|c| c.to_f64())
        .collect()
}

impl Strategy for TrendPullback {
    fn name(&self) -> String {
        "TrendPullback".to_string()
    }

    fn trend_bias(&self, higher_tf: &CandleWindow) -> TrendBias {
        let closes = to_f64(higher_tf);
        let fast = ema(&closes, self.params.trend_fast_period);
        let slow = ema(&closes, self.params.trend_slow_period);
        match (fast, slow) {
            (Some(f), Some(s)) if f > s => TrendBias::Bullish,
            (Some(f), Some(s)) if f < s => TrendBias::Bearish,
            _ => TrendBias::Neutral,
        }
    }

    fn evaluate(
        &self,
        window: &CandleWindow,
        bias: TrendBias,
        position: &PositionState,
    ) -> Signal {
        match position.status {
            PositionStatus::Long => {
                if position.bars_held >= self.params.exit_bars {
                    Signal::ExitLong
                } else {
                    Signal::Hold
                }
            }
            PositionStatus::Flat => match self.entry_checks(window, bias) {
                Some(checks) if checks.all() => Signal::EnterLong,
                _ => Signal::Hold,
            },
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::Candle;
    use proptest::prelude::*;
    use rust_decimal::prelude::FromPrimitive;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    pub(crate) fn params(exit_bars: u32) -> StrategyConfig {
        StrategyConfig {
            ma_period: 3,
            momentum_period: 3,
            momentum_threshold: 50.0,
            proximity_band: 0.05,
            trend_fast_period: 2,
            trend_slow_period: 4,
            exit_bars,
        }
    }

    pub(crate) fn candle(close_time: i64, open: Decimal, close: Decimal) -> Candle {
        Candle {
            open_time: close_time - 299_999,
            close_time,
            open,
            high: open.max(close),
            low: open.min(close),
            close,
            volume: dec!(1),
            is_closed: true,
        }
    }

    /// Closes 100, 101, 102, 103 and a last candle open→close at close_time.
    pub(crate) fn window_ending(close_time: i64, open: Decimal, close: Decimal) -> CandleWindow {
        let mut candles: Vec<Candle> = [dec!(100), dec!(101), dec!(102), dec!(103)]
            .iter()
            .enumerate()
            .map(|(i, c)| candle(close_time - (4 - i as i64) * 300_000, *c - dec!(0.5), *c))
            .collect();
        candles.push(candle(close_time, open, close));
        CandleWindow::from_closed(candles).unwrap()
    }

    /// A window on which every entry condition holds.
    pub(crate) fn entry_window(close_time: i64) -> CandleWindow {
        window_ending(close_time, dec!(103), dec!(104))
    }

    #[test]
    fn enters_when_all_conditions_hold() {
        let s = TrendPullback::new(params(5));
        let w = entry_window(1_000_000);
        let checks = s.entry_checks(&w, TrendBias::Neutral).unwrap();
        assert!(checks.all(), "{checks:?}");
        assert_eq!(
            s.evaluate(&w, TrendBias::Bullish, &PositionState::flat()),
            Signal::EnterLong
        );
    }

    #[test]
    fn bearish_bias_blocks_entry() {
        let s = TrendPullback::new(params(5));
        let w = entry_window(1_000_000);
        assert_eq!(
            s.evaluate(&w, TrendBias::Bearish, &PositionState::flat()),
            Signal::Hold
        );
    }

    #[test]
    fn bearish_candle_blocks_entry() {
        let s = TrendPullback::new(params(5));
        // same close, but opened above it
        let w = window_ending(1_000_000, dec!(104.5), dec!(104));
        assert_eq!(
            s.evaluate(&w, TrendBias::Neutral, &PositionState::flat()),
            Signal::Hold
        );
        // doji: close == open is not bullish
        let w = window_ending(1_000_000, dec!(104), dec!(104));
        assert_eq!(
            s.evaluate(&w, TrendBias::Neutral, &PositionState::flat()),
            Signal::Hold
        );
    }

    #[test]
    fn close_far_from_ma_blocks_entry() {
        let mut p = params(5);
        p.proximity_band = 0.001;
        let s = TrendPullback::new(p);
        let w = entry_window(1_000_000);
        let checks = s.entry_checks(&w, TrendBias::Neutral).unwrap();
        assert!(!checks.near_ma);
        assert_eq!(
            s.evaluate(&w, TrendBias::Neutral, &PositionState::flat()),
            Signal::Hold
        );
    }

    #[test]
    fn weak_momentum_blocks_entry() {
        let mut p = params(5);
        // every change is a gain, so RSI is exactly 100; "above" is strict
        p.momentum_threshold = 100.0;
        let s = TrendPullback::new(p);
        let w = entry_window(1_000_000);
        assert_eq!(
            s.evaluate(&w, TrendBias::Neutral, &PositionState::flat()),
            Signal::Hold
        );
    }

    #[test]
    fn short_history_holds() {
        let s = TrendPullback::new(params(5));
        let w = CandleWindow::from_closed(vec![candle(1_000_000, dec!(1), dec!(2))]).unwrap();
        assert!(s.entry_checks(&w, TrendBias::Neutral).is_none());
        assert_eq!(
            s.evaluate(&w, TrendBias::Bullish, &PositionState::flat()),
            Signal::Hold
        );
    }

    #[test]
    fn exit_is_purely_time_based() {
        let s = TrendPullback::new(params(5));
        let w = entry_window(1_000_000);
        let mut pos = PositionState {
            status: PositionStatus::Long,
            entry_price: Some(dec!(104)),
            entry_close_time: Some(1),
            bars_held: 4,
        };
        // entry conditions still hold, but long positions never re-enter
        assert_eq!(s.evaluate(&w, TrendBias::Bullish, &pos), Signal::Hold);
        pos.bars_held = 5;
        assert_eq!(s.evaluate(&w, TrendBias::Bearish, &pos), Signal::ExitLong);
        pos.bars_held = 9;
        assert_eq!(s.evaluate(&w, TrendBias::Bearish, &pos), Signal::ExitLong);
    }

    fn htf_window(closes: &[i64]) -> CandleWindow {
        let candles = closes
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let c = Decimal::from(*c);
                candle((i as i64 + 1) * 900_000, c, c)
            })
            .collect();
        CandleWindow::from_closed(candles).unwrap()
    }

    #[test]
    fn trend_bias_from_fast_vs_slow_ema() {
        let s = TrendPullback::new(params(5));
        assert_eq!(s.trend_bias(&htf_window(&[100, 101, 102, 103, 104])), TrendBias::Bullish);
        assert_eq!(s.trend_bias(&htf_window(&[104, 103, 102, 101, 100])), TrendBias::Bearish);
        // slow EMA needs 4 closes
        assert_eq!(s.trend_bias(&htf_window(&[100, 200, 300])), TrendBias::Neutral);
    }

    proptest! {
        /// ENTER_LONG iff the four conditions, computed here from the raw
        /// indicators, all hold.
        #[test]
        fn enter_iff_every_condition_holds(
            open in 95.0..110.0_f64,
            close in 95.0..110.0_f64,
            band in 0.0..0.05_f64,
            threshold in 0.0..100.0_f64,
            bias_idx in 0usize..3,
        ) {
            let bias = [TrendBias::Bullish, TrendBias::Bearish, TrendBias::Neutral][bias_idx];
            let mut p = params(5);
            p.proximity_band = band;
            p.momentum_threshold = threshold;
            let s = TrendPullback::new(p.clone());

            let open = Decimal::from_f64(open).unwrap().round_dp(2);
            let close = Decimal::from_f64(close).unwrap().round_dp(2);
            let w = window_ending(1_000_000, open, close);

            let closes: Vec<f64> = w.closes().iter().map(|c| c.to_f64().unwrap()).collect();
            let ma = ema(&closes, p.ma_period).unwrap();
            let momentum = rsi(&closes, p.momentum_period).unwrap();
            let last = close.to_f64().unwrap();
            let expected = (last - ma).abs() <= ma * band
                && momentum > threshold
                && close > open
                && bias != TrendBias::Bearish;

            let signal = s.evaluate(&w, bias, &PositionState::flat());
            prop_assert_eq!(signal == Signal::EnterLong, expected);
        }
    }
}
