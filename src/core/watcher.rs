// src/core/watcher.rs
use crate::connectors::traits::MarketData;
use crate::core::retry::{with_retry, RetryPolicy};
use crate::types::{Candle, CandleWindow};
use std::sync::Arc;
use tracing::{debug, warn};

/// Turns polled klines into "a new candle closed" events.
///
/// Keeps the close_time of the last emitted candle and only emits candles
/// strictly newer than it. If several candles closed since the last poll, only
/// the newest is emitted and the ones in between are dropped.
pub struct IntervalWatcher {
    market: Arc<dyn MarketData>,
    symbol: String,
    timeframe: String,
    candle_limit: usize,
    retry: RetryPolicy,
    last_close_time: Option<i64>,
}

impl IntervalWatcher {
    pub fn new(
        market: Arc<dyn MarketData>,
        symbol: String,
        timeframe: String,
        candle_limit: usize,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            market,
            symbol,
            timeframe,
            candle_limit,
            retry,
            last_close_time: None,
        }
    }

    pub fn last_close_time(&self) -> Option<i64> {
        self.last_close_time
    }

    /// One poll. `Some(window)` when a newer candle closed; `window.latest()` is it.
    pub async fn observe(&mut self) -> Option<CandleWindow> {
        let candles = self.fetch(&self.timeframe).await?;
        let window = CandleWindow::from_closed(candles)?;
        let latest = window.latest().close_time;

        if let Some(last) = self.last_close_time {
            if latest <= last {
                debug!(close_time = latest, "no new closed candle");
                return None;
            }
            let skipped = window
                .candles()
                .iter()
                .filter(|c| c.close_time > last && c.close_time < latest)
                .count();
            if skipped > 0 {
                warn!(
                    "{} candle(s) closed between polls were skipped; evaluating only close_time={}",
                    skipped, latest
                );
            }
        }

        self.last_close_time = Some(latest);
        Some(window)
    }

    /// Closed candles of another timeframe that had closed by `as_of`.
    pub async fn closed_window(&self, timeframe: &str, as_of: i64) -> Option<CandleWindow> {
        let candles = self.fetch(timeframe).await?;
        let candles = candles
            .into_iter()
            .filter(|c| c.close_time <= as_of)
            .collect();
        CandleWindow::from_closed(candles)
    }

    async fn fetch(&self, timeframe: &str) -> Option<Vec<Candle>> {
        let market = &self.market;
        let symbol = self.symbol.as_str();
        let limit = self.candle_limit;
        let what = format!("klines {symbol} {timeframe}");

        match with_retry(&self.retry, &what, move |_| {
            market.get_recent_candles(symbol, timeframe, limit)
        })
        .await
        {
            Ok(candles) => Some(candles),
            Err(e) => {
                warn!("Skipping poll, market data unavailable: {}", e);
                None
            }
        }
    }
}
