// src/connectors/traits.rs
use crate::error::ExchangeError;
use crate::types::{Candle, Fill, Side};
use async_trait::async_trait;
use rust_decimal::Decimal;

#[async_trait]
pub trait MarketData: Send + Sync {
    /// Most-recent-last. Every entry is closed except possibly the last.
    async fn get_recent_candles(
        &self,
        symbol: &str,
        timeframe: &str,
        count: usize,
    ) -> Result<Vec<Candle>, ExchangeError>;
}

/// Network order entry. Only the sandbox and live gateways hold one.
#[async_trait]
pub trait SpotOrderApi: Send + Sync {
    /// Submits a market order and returns the confirmed fill.
    ///
    /// The exchange only rejects a reused `client_order_id` while that order is
    /// still open, so a resend must be preceded by [`SpotOrderApi::find_order`].
    async fn market_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
        client_order_id: &str,
    ) -> Result<Fill, ExchangeError>;

    /// Looks up an earlier submission by client order id.
    ///
    /// `Ok(None)` only when the exchange says no such order exists. A found
    /// order that is not completely filled is `Ambiguous`.
    async fn find_order(
        &self,
        symbol: &str,
        client_order_id: &str,
        quantity: Decimal,
    ) -> Result<Option<Fill>, ExchangeError>;

    /// Base URL orders are sent to. Used to log which environment is live.
    fn trading_url(&self) -> &str;
}
