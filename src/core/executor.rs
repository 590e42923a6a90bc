// src/core/executor.rs
use crate::connectors::gateway::OrderGateway;
use crate::core::position::{transition_for, Transition};
use crate::core::retry::with_retry;
use crate::error::ExchangeError;
use crate::types::{
    Candle, ExecutionMode, Fill, OrderRequest, OrderResult, PositionState, Side, Signal,
};
use crate::utils::precision::normalize_quantity;
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

/// Turns an actionable signal into exactly one market order.
pub struct OrderExecutor {
    gateway: Box<dyn OrderGateway>,
    symbol: String,
    quantity: Decimal,
}

impl OrderExecutor {
    /// `order_quantity` is rounded down to `quantity_step` once, here.
    pub fn new(
        gateway: Box<dyn OrderGateway>,
        symbol: String,
        order_quantity: Decimal,
        quantity_step: Decimal,
    ) -> Self {
        Self {
            gateway,
            symbol,
            quantity: normalize_quantity(order_quantity, quantity_step),
        }
    }

    pub fn mode(&self) -> ExecutionMode {
        self.gateway.mode()
    }

    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    /// `None` when the signal needs no order in this state.
    ///
    /// Transient failures are retried under the gateway's policy with the same
    /// client order id. Every resend is preceded by a lookup of that id, and a
    /// found order is taken as the result instead of sending again. When the
    /// retries run out, one last lookup decides between a clean failure (the
    /// order does not exist) and an ambiguous one. Rejections and ambiguous
    /// outcomes come back at once.
    pub async fn execute(
        &self,
        signal: Signal,
        position: &PositionState,
        candle: &Candle,
    ) -> Option<OrderResult> {
        let side = match transition_for(position.status, signal) {
            Transition::AttemptEnter => Side::Buy,
            Transition::AttemptExit => Side::Sell,
            Transition::None => return None,
        };

        let request = OrderRequest {
            symbol: self.symbol.clone(),
            side,
            quantity: self.quantity,
            mode: self.gateway.mode(),
            reference_price: candle.close,
            client_order_id: new_client_order_id(),
        };

        info!(
            "[ORDER] {} {} {} | mode={} close_time={} client_id={}",
            side.as_str(),
            request.quantity,
            request.symbol,
            request.mode,
            candle.close_time,
            request.client_order_id
        );

        let policy = self.gateway.retry_policy();
        let what = format!("{} order {}", side.as_str(), request.client_order_id);
        let gateway = &self.gateway;
        let req = &request;
        let outcome = with_retry(&policy, &what, move |attempt| async move {
            if attempt > 1 {
                if let Some(fill) = gateway.find_order(req).await? {
                    warn!(
                        "Order {} had already executed; not sending again",
                        req.client_order_id
                    );
                    return Ok(fill);
                }
            }
            gateway.place_market_order(req).await
        })
        .await;

        let outcome = match outcome {
            Err(e) if e.is_transient() => self.settle(&request, e).await,
            other => other,
        };

        Some(match outcome {
            Ok(fill) => OrderResult::filled(request, fill),
            Err(e) => OrderResult::failed(request, e.order_error_kind(), e.to_string()),
        })
    }

    /// Retries are spent and the last send may still have executed.
    async fn settle(&self, request: &OrderRequest, last: ExchangeError) -> Result<Fill, ExchangeError> {
        match self.gateway.find_order(request).await {
            Ok(Some(fill)) => {
                warn!(
                    "Order {} executed despite failed responses",
                    request.client_order_id
                );
                Ok(fill)
            }
            Ok(None) => Err(last),
            Err(lookup) => Err(ExchangeError::Ambiguous(format!(
                "order {} unconfirmed after retries ({}); status lookup failed: {}",
                request.client_order_id, last, lookup
            ))),
        }
    }
}

/// Binance accepts up to 36 chars of `[.A-Z:/a-z0-9_-]`.
fn new_client_order_id() -> String {
    format!("ps-{}", Uuid::new_v4().simple())
}
