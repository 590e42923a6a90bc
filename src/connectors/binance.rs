// src/connectors/binance.rs
use crate::connectors::messages::{
    classify_http_error, is_unknown_order, parse_kline, BinanceOrderResponse, BinanceOrderStatus,
};
use crate::connectors::traits::{MarketData, SpotOrderApi};
use crate::error::ExchangeError;
use crate::types::{Candle, Fill, Side};
use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method};
use rust_decimal::Decimal;
use serde_json::Value;
use sha2::Sha256;
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

type HmacSha256 = Hmac<Sha256>;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Binance Spot REST client.
///
/// Market data always comes from `market_data_url` (mainnet): the Spot testnet
/// does not serve reliable klines. Orders go to `trading_url`, which is the
/// testnet for SANDBOX and mainnet for LIVE.
pub struct BinanceClient {
    api_key: String,
    secret_key: String,
    http_client: Client,
    market_data_url: String,
    trading_url: String,
    recv_window_ms: u64,
    /// Client order ids already sent once. A repeat is a resend of the same decision.
    sent_client_ids: Mutex<HashSet<String>>,
}

impl BinanceClient {
    pub fn new(
        api_key: String,
        secret_key: String,
        market_data_url: String,
        trading_url: String,
        recv_window_ms: u64,
    ) -> Result<Self, ExchangeError> {
        let http_client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| ExchangeError::Transient(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_key,
            secret_key,
            http_client,
            market_data_url: market_data_url.trim_end_matches('/').to_string(),
            trading_url: trading_url.trim_end_matches('/').to_string(),
            recv_window_ms,
            sent_client_ids: Mutex::new(HashSet::new()),
        })
    }

    fn sign_and_build_query(&self, params: Vec<(&str, String)>) -> Result<String, ExchangeError> {
        let mut params = params;
        params.push(("recvWindow", self.recv_window_ms.to_string()));
        params.push(("timestamp", Utc::now().timestamp_millis().to_string()));

        let query_string = serde_urlencoded::to_string(&params)
            .map_err(|e| ExchangeError::Decode(format!("cannot encode query: {e}")))?;
        let signature = sign(&self.secret_key, &query_string)?;

        Ok(format!("{}&signature={}", query_string, signature))
    }

    /// Sends a signed request and hands back the raw status and body.
    async fn send_signed_request(
        &self,
        method: Method,
        endpoint: &str,
        params: Vec<(&str, String)>,
    ) -> Result<(u16, String), ExchangeError> {
        let full_query = self.sign_and_build_query(params)?;
        let url = format!("{}{}?{}", self.trading_url, endpoint, full_query);

        let response = self
            .http_client
            .request(method, &url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await?;

        let status = response.status().as_u16();
        // the request was received; losing the body loses its outcome
        let body = response.text().await.map_err(|e| {
            ExchangeError::Ambiguous(format!("HTTP {status} from {endpoint}, body unreadable: {e}"))
        })?;
        Ok((status, body))
    }

    /// Records `id` as sent and reports whether it had been sent before.
    fn mark_sent(&self, id: &str) -> bool {
        match self.sent_client_ids.lock() {
            Ok(mut ids) => !ids.insert(id.to_string()),
            // poisoned only if another holder panicked; be conservative
            Err(_) => true,
        }
    }
}

fn sign(secret_key: &str, payload: &str) -> Result<String, ExchangeError> {
    let mut mac = HmacSha256::new_from_slice(secret_key.as_bytes())
        .map_err(|e| ExchangeError::Decode(format!("invalid secret key: {e}")))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[async_trait]
impl MarketData for BinanceClient {
    async fn get_recent_candles(
        &self,
        symbol: &str,
        timeframe: &str,
        count: usize,
    ) -> Result<Vec<Candle>, ExchangeError> {
        let limit = count.to_string();
        let url = Url::parse_with_params(
            &format!("{}/api/v3/klines", self.market_data_url),
            &[
                ("symbol", symbol),
                ("interval", timeframe),
                ("limit", limit.as_str()),
            ],
        )
        .map_err(|e| ExchangeError::Decode(format!("bad klines url: {e}")))?;

        let response = self.http_client.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        if !(200..300).contains(&status) {
            return Err(classify_http_error(status, &body, false));
        }

        let rows: Vec<Vec<Value>> = serde_json::from_str(&body)
            .map_err(|e| ExchangeError::Decode(format!("klines for {symbol}: {e}")))?;

        let now_ms = Utc::now().timestamp_millis();
        let candles = rows
            .iter()
            .map(|row| parse_kline(row, now_ms))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(symbol, timeframe, count = candles.len(), "fetched klines");
        Ok(candles)
    }
}

#[async_trait]
impl SpotOrderApi for BinanceClient {
    async fn market_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
        client_order_id: &str,
    ) -> Result<Fill, ExchangeError> {
        let params = vec![
            ("symbol", symbol.to_string()),
            ("side", side.as_str().to_string()),
            ("type", "MARKET".to_string()),
            ("quantity", quantity.to_string()),
            ("newClientOrderId", client_order_id.to_string()),
            ("newOrderRespType", "FULL".to_string()),
        ];

        let resend = self.mark_sent(client_order_id);
        if resend {
            warn!(client_order_id, "Resending order with the same client id");
        }

        info!(
            "🚀 Sending Order: {} {} {} (client id {})",
            side.as_str(),
            quantity,
            symbol,
            client_order_id
        );

        let (status, body) = self
            .send_signed_request(Method::POST, "/api/v3/order", params)
            .await?;

        if !(200..300).contains(&status) {
            return Err(classify_http_error(status, &body, resend));
        }

        // the order went through; anything we can't read is ambiguous, not a failure
        let resp: BinanceOrderResponse = serde_json::from_str(&body).map_err(|e| {
            ExchangeError::Ambiguous(format!(
                "accepted order {client_order_id} returned unreadable body: {e}"
            ))
        })?;
        debug!(symbol = %resp.symbol, order_id = resp.order_id, status = %resp.status, "order response");

        resp.into_fill(quantity)
    }

    async fn find_order(
        &self,
        symbol: &str,
        client_order_id: &str,
        quantity: Decimal,
    ) -> Result<Option<Fill>, ExchangeError> {
        let params = vec![
            ("symbol", symbol.to_string()),
            ("origClientOrderId", client_order_id.to_string()),
        ];
        let (status, body) = self
            .send_signed_request(Method::GET, "/api/v3/order", params)
            .await?;

        if !(200..300).contains(&status) {
            if is_unknown_order(&body) {
                debug!(client_order_id, "order not found on exchange");
                return Ok(None);
            }
            return Err(classify_http_error(status, &body, false));
        }

        let order: BinanceOrderStatus = serde_json::from_str(&body).map_err(|e| {
            ExchangeError::Ambiguous(format!(
                "order {client_order_id} lookup returned unreadable body: {e}"
            ))
        })?;
        info!(
            "🔎 Found earlier order {} ({}): status {}",
            client_order_id, order.order_id, order.status
        );
        order.into_fill(quantity).map(Some)
    }

    fn trading_url(&self) -> &str {
        &self.trading_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hmac_signature_matches_binance_docs_example() {
        // example from the Binance Spot API docs (SIGNED endpoint security)
        let secret = "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j";
        let payload = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559";
        assert_eq!(
            sign(secret, payload).unwrap(),
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[test]
    fn signed_query_carries_timestamp_and_signature() {
        let client = BinanceClient::new(
            "key".into(),
            "secret".into(),
            "https://api.binance.com/".into(),
            "https://testnet.binance.vision".into(),
            5_000,
        )
        .unwrap();
        let q = client
            .sign_and_build_query(vec![("symbol", "BTCUSDT".to_string())])
            .unwrap();
        assert!(q.starts_with("symbol=BTCUSDT&recvWindow=5000&timestamp="));
        assert!(q.contains("&signature="));
        assert_eq!(client.market_data_url, "https://api.binance.com");
    }

    #[test]
    fn second_send_of_same_client_id_is_a_resend() {
        let client = BinanceClient::new(
            String::new(),
            String::new(),
            "https://api.binance.com".into(),
            "https://api.binance.com".into(),
            5_000,
        )
        .unwrap();
        assert!(!client.mark_sent("ps-1"));
        assert!(client.mark_sent("ps-1"));
        assert!(!client.mark_sent("ps-2"));
    }
}
