// src/connectors/messages.rs
use crate::error::ExchangeError;
use crate::types::{Candle, Fill};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;

/// Binance error codes we treat specially.
const CODE_UNKNOWN_EXECUTION: i64 = -1007;
const CODE_TIMESTAMP_OUTSIDE_WINDOW: i64 = -1021;
const CODE_NO_SUCH_ORDER: i64 = -2013;

/// A row of `GET /api/v3/klines`:
/// `[openTime, open, high, low, close, volume, closeTime, ...]`, prices as strings.
pub fn parse_kline(row: &[Value], now_ms: i64) -> Result<Candle, ExchangeError> {
    if row.len() < 7 {
        return Err(ExchangeError::Decode(format!(
            "kline row has {} fields, expected at least 7",
            row.len()
        )));
    }

    let int_at = |i: usize| {
        row[i]
            .as_i64()
            .ok_or_else(|| ExchangeError::Decode(format!("kline field {i} is not an integer")))
    };
    let dec_at = |i: usize| {
        row[i]
            .as_str()
            .and_then(|s| Decimal::from_str(s).ok())
            .ok_or_else(|| ExchangeError::Decode(format!("kline field {i} is not a decimal string")))
    };

    let close_time = int_at(6)?;
    Ok(Candle {
        open_time: int_at(0)?,
        close_time,
        open: dec_at(1)?,
        high: dec_at(2)?,
        low: dec_at(3)?,
        close: dec_at(4)?,
        volume: dec_at(5)?,
        is_closed: close_time < now_ms,
    })
}

/// `{"code": -2010, "msg": "..."}`
#[derive(Debug, Deserialize)]
pub struct BinanceApiError {
    pub code: i64,
    pub msg: String,
}

#[derive(Debug, Deserialize)]
pub struct BinanceFill {
    pub price: Decimal,
    pub qty: Decimal,
}

/// `POST /api/v3/order` with `newOrderRespType=FULL`.
#[derive(Debug, Deserialize)]
pub struct BinanceOrderResponse {
    pub symbol: String,
    #[serde(rename = "orderId")]
    pub order_id: u64,
    #[serde(rename = "clientOrderId")]
    pub client_order_id: String,
    #[serde(rename = "transactTime")]
    pub transact_time: Option<i64>,
    pub status: String,
    #[serde(rename = "executedQty")]
    pub executed_qty: Decimal,
    #[serde(default)]
    pub fills: Vec<BinanceFill>,
}

impl BinanceOrderResponse {
    /// Anything short of a complete fill of `requested` is ambiguous.
    pub fn into_fill(self, requested: Decimal) -> Result<Fill, ExchangeError> {
        if self.status != "FILLED" {
            return Err(ExchangeError::Ambiguous(format!(
                "order {} ({}) ended with status {}, executed {}",
                self.order_id, self.client_order_id, self.status, self.executed_qty
            )));
        }
        if self.executed_qty != requested {
            return Err(ExchangeError::Ambiguous(format!(
                "order {} ({}) executed {} of {}",
                self.order_id, self.client_order_id, self.executed_qty, requested
            )));
        }

        let filled_qty: Decimal = self.fills.iter().map(|f| f.qty).sum();
        if self.fills.is_empty() || filled_qty.is_zero() {
            return Err(ExchangeError::Ambiguous(format!(
                "order {} ({}) reported FILLED without fills",
                self.order_id, self.client_order_id
            )));
        }
        let notional: Decimal = self.fills.iter().map(|f| f.price * f.qty).sum();

        Ok(Fill {
            price: notional / filled_qty,
            executed_qty: self.executed_qty,
            transact_time: self.transact_time,
        })
    }
}

/// `GET /api/v3/order`. No `fills` here, so the price comes from the quote total.
#[derive(Debug, Deserialize)]
pub struct BinanceOrderStatus {
    #[serde(rename = "orderId")]
    pub order_id: u64,
    #[serde(rename = "clientOrderId")]
    pub client_order_id: String,
    pub status: String,
    #[serde(rename = "executedQty")]
    pub executed_qty: Decimal,
    #[serde(rename = "cummulativeQuoteQty")]
    pub cummulative_quote_qty: Decimal,
    #[serde(rename = "updateTime")]
    pub update_time: Option<i64>,
}

impl BinanceOrderStatus {
    /// The order exists. Anything short of a complete fill of `requested` is ambiguous.
    pub fn into_fill(self, requested: Decimal) -> Result<Fill, ExchangeError> {
        if self.status != "FILLED" || self.executed_qty != requested || self.executed_qty.is_zero() {
            return Err(ExchangeError::Ambiguous(format!(
                "order {} ({}) found with status {}, executed {} of {}",
                self.order_id, self.client_order_id, self.status, self.executed_qty, requested
            )));
        }
        Ok(Fill {
            price: self.cummulative_quote_qty / self.executed_qty,
            executed_qty: self.executed_qty,
            transact_time: self.update_time,
        })
    }
}

/// True when an error body says the queried order was never placed.
pub fn is_unknown_order(body: &str) -> bool {
    matches!(
        serde_json::from_str::<BinanceApiError>(body),
        Ok(api) if api.code == CODE_NO_SUCH_ORDER
    )
}

/// Maps a non-2xx response to an error class.
///
/// `resend` is true when this request reuses a client order id that was
/// already sent once, so a duplicate-order rejection means the first one
/// may have gone through.
pub fn classify_http_error(status: u16, body: &str, resend: bool) -> ExchangeError {
    if status >= 500 || status == 429 {
        return ExchangeError::Transient(format!("HTTP {status}: {body}"));
    }

    match serde_json::from_str::<BinanceApiError>(body) {
        Ok(api) if api.code == CODE_UNKNOWN_EXECUTION => ExchangeError::Ambiguous(api.msg),
        Ok(api) if api.code == CODE_TIMESTAMP_OUTSIDE_WINDOW => ExchangeError::Transient(api.msg),
        Ok(api) if resend && api.msg.to_lowercase().contains("duplicate") => {
            ExchangeError::Ambiguous(format!("resend rejected as duplicate: {}", api.msg))
        }
        Ok(api) => ExchangeError::Rejected {
            code: api.code,
            msg: api.msg,
        },
        Err(_) => ExchangeError::Rejected {
            code: status as i64,
            msg: body.to_string(),
        },
    }
}
