// src/connectors/gateway.rs
use crate::connectors::traits::SpotOrderApi;
use crate::core::retry::RetryPolicy;
use crate::error::ExchangeError;
use crate::types::{ExecutionMode, Fill, OrderRequest};
use crate::utils::precision::normalize_price;
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

/// Where a market order ends up. One implementation per execution mode,
/// chosen once at startup by [`select_gateway`].
#[async_trait]
pub trait OrderGateway: Send + Sync {
    fn mode(&self) -> ExecutionMode;

    fn retry_policy(&self) -> RetryPolicy;

    async fn place_market_order(&self, request: &OrderRequest) -> Result<Fill, ExchangeError>;

    /// Whether an earlier send of `request` reached the exchange.
    /// `Ok(None)` means it definitely did not.
    async fn find_order(&self, request: &OrderRequest) -> Result<Option<Fill>, ExchangeError>;
}

/// DRY_RUN: fills instantly at the decision candle's close. No network.
pub struct SimulatedGateway {
    price_tick: Decimal,
    retry: RetryPolicy,
}

impl SimulatedGateway {
    pub fn new(price_tick: Decimal, retry: RetryPolicy) -> Self {
        Self { price_tick, retry }
    }
}

#[async_trait]
impl OrderGateway for SimulatedGateway {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::DryRun
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    async fn place_market_order(&self, request: &OrderRequest) -> Result<Fill, ExchangeError> {
        let price = normalize_price(request.reference_price, self.price_tick);
        info!(
            "Paper {}: {} {} at ${} (client id {})",
            request.side.as_str(),
            request.quantity,
            request.symbol,
            price,
            request.client_order_id
        );
        Ok(Fill {
            price,
            executed_qty: request.quantity,
            transact_time: Some(Utc::now().timestamp_millis()),
        })
    }

    async fn find_order(&self, _request: &OrderRequest) -> Result<Option<Fill>, ExchangeError> {
        Ok(None)
    }
}

/// SANDBOX: Binance Spot testnet. Real execution path, fake funds.
pub struct SandboxGateway {
    api: Arc<dyn SpotOrderApi>,
    retry: RetryPolicy,
}

impl SandboxGateway {
    pub fn new(api: Arc<dyn SpotOrderApi>, retry: RetryPolicy) -> Self {
        Self {
            api,
            retry: retry.tolerant(),
        }
    }
}

#[async_trait]
impl OrderGateway for SandboxGateway {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Sandbox
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    async fn place_market_order(&self, request: &OrderRequest) -> Result<Fill, ExchangeError> {
        self.api
            .market_order(
                &request.symbol,
                request.side,
                request.quantity,
                &request.client_order_id,
            )
            .await
    }

    async fn find_order(&self, request: &OrderRequest) -> Result<Option<Fill>, ExchangeError> {
        self.api
            .find_order(&request.symbol, &request.client_order_id, request.quantity)
            .await
    }
}

/// LIVE: Binance Spot mainnet. Real money.
pub struct LiveGateway {
    api: Arc<dyn SpotOrderApi>,
    retry: RetryPolicy,
}

impl LiveGateway {
    pub fn new(api: Arc<dyn SpotOrderApi>, retry: RetryPolicy) -> Self {
        Self { api, retry }
    }
}

#[async_trait]
impl OrderGateway for LiveGateway {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Live
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    async fn place_market_order(&self, request: &OrderRequest) -> Result<Fill, ExchangeError> {
        self.api
            .market_order(
                &request.symbol,
                request.side,
                request.quantity,
                &request.client_order_id,
            )
            .await
    }

    async fn find_order(&self, request: &OrderRequest) -> Result<Option<Fill>, ExchangeError> {
        self.api
            .find_order(&request.symbol, &request.client_order_id, request.quantity)
            .await
    }
}

pub fn select_gateway(
    mode: ExecutionMode,
    api: Arc<dyn SpotOrderApi>,
    price_tick: Decimal,
    retry: RetryPolicy,
) -> Box<dyn OrderGateway> {
    match mode {
        ExecutionMode::DryRun => {
            warn!("[DRY_RUN] Orders will NOT be sent to the exchange");
            Box::new(SimulatedGateway::new(price_tick, retry))
        }
        ExecutionMode::Sandbox => {
            warn!("[SANDBOX] Orders go to {} (paper funds)", api.trading_url());
            Box::new(SandboxGateway::new(api, retry))
        }
        ExecutionMode::Live => {
            warn!("🚨 [LIVE] Orders go to {} (REAL FUNDS)", api.trading_url());
            Box::new(LiveGateway::new(api, retry))
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::Side;
    use rust_decimal_macros::dec;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Scripted order API that records every call.
    ///
    /// Order lookups answer from their own script and report "no such order"
    /// once it runs dry.
    #[derive(Default)]
    pub(crate) struct ScriptedOrderApi {
        pub responses: Mutex<VecDeque<Result<Fill, ExchangeError>>>,
        pub lookups: Mutex<VecDeque<Result<Option<Fill>, ExchangeError>>>,
        pub calls: Mutex<Vec<(Side, Decimal, String)>>,
        pub lookup_ids: Mutex<Vec<String>>,
    }

    impl ScriptedOrderApi {
        pub(crate) fn with(responses: Vec<Result<Fill, ExchangeError>>) -> Arc<Self> {
            Self::with_lookups(responses, vec![])
        }

        pub(crate) fn with_lookups(
            responses: Vec<Result<Fill, ExchangeError>>,
            lookups: Vec<Result<Option<Fill>, ExchangeError>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                lookups: Mutex::new(lookups.into()),
                calls: Mutex::new(Vec::new()),
                lookup_ids: Mutex::new(Vec::new()),
            })
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        pub(crate) fn lookup_count(&self) -> usize {
            self.lookup_ids.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl SpotOrderApi for ScriptedOrderApi {
        async fn market_order(
            &self,
            _symbol: &str,
            side: Side,
            quantity: Decimal,
            client_order_id: &str,
        ) -> Result<Fill, ExchangeError> {
            self.calls
                .lock()
                .unwrap()
                .push((side, quantity, client_order_id.to_string()));
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ExchangeError::Transient("no scripted response".into())))
        }

        async fn find_order(
            &self,
            _symbol: &str,
            client_order_id: &str,
            _quantity: Decimal,
        ) -> Result<Option<Fill>, ExchangeError> {
            self.lookup_ids
                .lock()
                .unwrap()
                .push(client_order_id.to_string());
            self.lookups.lock().unwrap().pop_front().unwrap_or(Ok(None))
        }

        fn trading_url(&self) -> &str {
            "mock://exchange"
        }
    }

    pub(crate) fn instant_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    fn request(mode: ExecutionMode) -> OrderRequest {
        OrderRequest {
            symbol: "BTCUSDT".into(),
            side: Side::Buy,
            quantity: dec!(0.001),
            mode,
            reference_price: dec!(43210.987),
            client_order_id: "ps-test".into(),
        }
    }

    #[tokio::test]
    async fn simulated_fill_uses_reference_price_and_never_calls_api() {
        let api = ScriptedOrderApi::with(vec![]);
        let gw = select_gateway(ExecutionMode::DryRun, api.clone(), dec!(0.01), instant_retry(3));
        assert_eq!(gw.mode(), ExecutionMode::DryRun);

        let fill = gw
            .place_market_order(&request(ExecutionMode::DryRun))
            .await
            .unwrap();
        assert_eq!(fill.price, dec!(43210.99));
        assert_eq!(fill.executed_qty, dec!(0.001));
        assert_eq!(api.call_count(), 0);
    }

    #[tokio::test]
    async fn network_gateways_forward_to_api() {
        let fill = Fill {
            price: dec!(43000),
            executed_qty: dec!(0.001),
            transact_time: None,
        };
        for mode in [ExecutionMode::Sandbox, ExecutionMode::Live] {
            let api = ScriptedOrderApi::with(vec![Ok(fill.clone())]);
            let gw = select_gateway(mode, api.clone(), dec!(0.01), instant_retry(3));
            assert_eq!(gw.mode(), mode);
            assert_eq!(gw.place_market_order(&request(mode)).await.unwrap(), fill);
            assert_eq!(api.call_count(), 1);
            assert_eq!(api.calls.lock().unwrap()[0].2, "ps-test");
        }
    }

    #[test]
    fn sandbox_retries_more_than_live() {
        let api = ScriptedOrderApi::with(vec![]);
        let live = select_gateway(ExecutionMode::Live, api.clone(), dec!(0), instant_retry(3));
        let sandbox = select_gateway(ExecutionMode::Sandbox, api, dec!(0), instant_retry(3));
        assert!(sandbox.retry_policy().max_attempts > live.retry_policy().max_attempts);
    }
}
