// src/types.rs
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

/// Which backend orders go to. Selected once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionMode {
    DryRun,
    Sandbox,
    Live,
}

impl ExecutionMode {
    pub fn tag(&self) -> &'static str {
        match self {
            ExecutionMode::DryRun => "DRY_RUN",
            ExecutionMode::Sandbox => "SANDBOX",
            ExecutionMode::Live => "LIVE",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One OHLCV bar. Times are epoch milliseconds as returned by the exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub open_time: i64,
    pub close_time: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub is_closed: bool,
}

/// The most recent closed candles of one timeframe, oldest first.
///
/// Never empty: `latest()` is always the newest closed candle.
#[derive(Debug, Clone, PartialEq)]
pub struct CandleWindow {
    candles: Vec<Candle>,
}

impl CandleWindow {
    /// Keeps only closed candles. Returns `None` if nothing closed is left.
    pub fn from_closed(candles: Vec<Candle>) -> Option<Self> {
        let candles: Vec<Candle> = candles.into_iter().filter(|c| c.is_closed).collect();
        if candles.is_empty() {
            None
        } else {
            Some(Self { candles })
        }
    }

    pub fn latest(&self) -> &Candle {
        // non-empty by construction
        &self.candles[self.candles.len() - 1]
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn closes(&self) -> Vec<Decimal> {
        self.candles.iter().map(|c| c.close).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendBias {
    Bullish,
    Bearish,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    EnterLong,
    ExitLong,
    Hold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionStatus {
    Flat,
    Long,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PositionState {
    pub status: PositionStatus,
    pub entry_price: Option<Decimal>,
    pub entry_close_time: Option<i64>,
    pub bars_held: u32,
}

impl PositionState {
    pub fn flat() -> Self {
        Self {
            status: PositionStatus::Flat,
            entry_price: None,
            entry_close_time: None,
            bars_held: 0,
        }
    }

    pub fn is_long(&self) -> bool {
        self.status == PositionStatus::Long
    }
}

impl Default for PositionState {
    fn default() -> Self {
        Self::flat()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: Side,
    pub quantity: Decimal,
    pub mode: ExecutionMode,
    /// Close of the decision candle. Only the simulated backend fills at it.
    pub reference_price: Decimal,
    /// Generated once per decision and reused across retries.
    pub client_order_id: String,
}

/// What the exchange (or the simulator) confirmed.
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub price: Decimal,
    pub executed_qty: Decimal,
    pub transact_time: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderErrorKind {
    Transient,
    Rejected,
    Ambiguous,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderResult {
    pub request: OrderRequest,
    pub accepted: bool,
    pub fill_price: Option<Decimal>,
    pub executed_qty: Option<Decimal>,
    pub error_kind: Option<OrderErrorKind>,
    pub error_message: Option<String>,
}

impl OrderResult {
    pub fn filled(request: OrderRequest, fill: Fill) -> Self {
        Self {
            request,
            accepted: true,
            fill_price: Some(fill.price),
            executed_qty: Some(fill.executed_qty),
            error_kind: None,
            error_message: None,
        }
    }

    pub fn failed(request: OrderRequest, kind: OrderErrorKind, message: String) -> Self {
        Self {
            request,
            accepted: false,
            fill_price: None,
            executed_qty: None,
            error_kind: Some(kind),
            error_message: Some(message),
        }
    }
}

/// One row of the trade log. Entry and exit of a round trip share `trade_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord {
    pub trade_id: String,
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub side: Side,
    pub price: Decimal,
    pub quantity: Decimal,
    pub mode: ExecutionMode,
    pub entry_time: DateTime<Utc>,
    pub exit_time: Option<DateTime<Utc>>,
    pub bars_held: Option<u32>,
}

pub fn millis_to_utc(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}
