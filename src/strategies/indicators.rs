// src/strategies/indicators.rs
//! Pure indicator helpers over closing prices (oldest first).
//!
//! Both functions look only at the tail of the series they need and return
//! `None` when the history is too short, so callers treat "not enough data"
//! the same as "condition not met".

use ta::indicators::{ExponentialMovingAverage, SimpleMovingAverage};
use ta::Next;

/// EMA over the last `period` values, seeded with the first of them.
pub fn ema(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let mut ema = ExponentialMovingAverage::new(period).ok()?;
    let mut out = 0.0;
    for v in &values[values.len() - period..] {
        out = ema.next(*v);
    }
    Some(out)
}

/// RSI with simple-average gains/losses over the last `period` price changes.
///
/// Returns 100 when there were no losses in the lookback.
pub fn rsi(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period + 1 {
        return None;
    }
    let mut avg_gain = SimpleMovingAverage::new(period).ok()?;
    let mut avg_loss = SimpleMovingAverage::new(period).ok()?;
    let (mut gain, mut loss) = (0.0, 0.0);

    let tail = &values[values.len() - (period + 1)..];
    for pair in tail.windows(2) {
        let delta = pair[1] - pair[0];
        gain = avg_gain.next(delta.max(0.0));
        loss = avg_loss.next((-delta).max(0.0));
    }

    if loss == 0.0 {
        return Some(100.0);
    }
    let rs = gain / loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}
