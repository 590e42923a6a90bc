// src/strategies/traits.rs
use crate::types::{CandleWindow, PositionState, Signal, TrendBias};

/// A bar-closed decision rule.
///
/// Implementations hold parameters only. Everything that changes between bars
/// is passed in, so the same inputs always give the same `Signal`.
pub trait Strategy: Send + Sync {
    fn name(&self) -> String;

    /// Classify the higher timeframe. Called every cycle, never cached.
    fn trend_bias(&self, higher_tf: &CandleWindow) -> TrendBias;

    /// Decide on `window.latest()`, the candle that just closed.
    fn evaluate(
        &self,
        window: &CandleWindow,
        bias: TrendBias,
        position: &PositionState,
    ) -> Signal;
}
