// src/core/engine.rs
use crate::core::executor::OrderExecutor;
use crate::core::position::{PositionTracker, Transition};
use crate::core::recorder::{TradeEvent, TradeRecorder};
use crate::core::watcher::IntervalWatcher;
use crate::strategies::traits::Strategy;
use crate::types::{
    CandleWindow, OrderErrorKind, OrderResult, PositionState, Side, TrendBias,
};
use anyhow::Result;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// What one decision cycle ended up doing.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// No newly closed candle this poll.
    Idle,
    Hold,
    Entered,
    Exited,
    /// An order was attempted and not confirmed. State unchanged.
    OrderFailed(OrderErrorKind),
    /// An earlier order outcome is unknown; nothing is sent until restart.
    Halted,
}

/// The single sequential control loop.
///
/// Owns every mutable piece (watermark, position, trade counter) so there is
/// exactly one writer of each, and each cycle runs to completion before the
/// next poll.
pub struct TradingEngine<S> {
    watcher: IntervalWatcher,
    strategy: S,
    tracker: PositionTracker,
    executor: OrderExecutor,
    recorder: TradeRecorder,
    higher_timeframe: String,
    poll_interval: Duration,
    /// Set by an ambiguous order outcome. Only a restart clears it.
    needs_review: Option<String>,
}

impl<S> TradingEngine<S>
where
    S: Strategy,
{
    pub fn new(
        watcher: IntervalWatcher,
        strategy: S,
        executor: OrderExecutor,
        recorder: TradeRecorder,
        higher_timeframe: String,
        poll_interval: Duration,
    ) -> Self {
        Self {
            watcher,
            strategy,
            tracker: PositionTracker::new(),
            executor,
            recorder,
            higher_timeframe,
            poll_interval,
            needs_review: None,
        }
    }

    pub fn position(&self) -> &PositionState {
        self.tracker.state()
    }

    pub fn needs_review(&self) -> Option<&str> {
        self.needs_review.as_deref()
    }

    /// Polls until `shutdown` flips to true. The flag is only looked at between
    /// cycles, so an order in flight always gets its answer.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!(
            "Engine loop running. Strategy: {} | Mode: {}",
            self.strategy.name(),
            self.executor.mode()
        );
        warn!("[ASSUMPTION] Starting FLAT. Positions opened before this start are not tracked.");

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.run_cycle().await;

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                changed = shutdown.changed() => {
                    // sender gone counts as shutdown too
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        if self.tracker.state().is_long() {
            warn!(
                "Stopping while LONG (entry {:?}). The position stays open on the exchange.",
                self.tracker.state().entry_price
            );
        }
        info!(
            "Engine stopped. Last processed close_time: {:?}",
            self.watcher.last_close_time()
        );
        Ok(())
    }

    /// Observe, evaluate, transition, execute, record. One poll's worth.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let window = match self.watcher.observe().await {
            Some(w) => w,
            None => return CycleOutcome::Idle,
        };
        if let Some(reason) = &self.needs_review {
            error!(
                "🚨 Trading halted: {}. Reconcile the account by hand, then restart.",
                reason
            );
            return CycleOutcome::Halted;
        }
        let candle = window.latest().clone();
        info!(
            "[CANDLE] close_time={} close={} history={}",
            candle.close_time,
            candle.close,
            window.len()
        );

        // bars are counted per closed candle, before deciding on it
        self.tracker.tick();

        let bias = match self.trend_bias(candle.close_time).await {
            Some(bias) => bias,
            None if self.tracker.state().is_long() => TrendBias::Neutral,
            None => {
                warn!("Higher timeframe unavailable, no entry this cycle");
                return CycleOutcome::Hold;
            }
        };

        let signal = self.strategy.evaluate(&window, bias, self.tracker.state());
        let transition = self.tracker.on_signal(signal);
        info!(
            "[DECISION] signal={:?} bias={:?} position={:?} bars_held={}",
            signal,
            bias,
            self.tracker.state().status,
            self.tracker.state().bars_held
        );

        if transition == Transition::None {
            return CycleOutcome::Hold;
        }

        let result = match self
            .executor
            .execute(signal, self.tracker.state(), &candle)
            .await
        {
            Some(r) => r,
            None => return CycleOutcome::Hold,
        };

        self.apply(transition, result, candle.close_time)
    }

    async fn trend_bias(&self, as_of: i64) -> Option<TrendBias> {
        let htf: CandleWindow = self
            .watcher
            .closed_window(&self.higher_timeframe, as_of)
            .await?;
        Some(self.strategy.trend_bias(&htf))
    }

    /// Only an accepted result moves the position.
    fn apply(&mut self, transition: Transition, result: OrderResult, close_time: i64) -> CycleOutcome {
        if !result.accepted {
            return self.report_failure(&result);
        }

        let (price, quantity) = match (result.fill_price, result.executed_qty) {
            (Some(p), Some(q)) => (p, q),
            _ => {
                error!(
                    "Accepted order {} carried no fill details. MANUAL REVIEW REQUIRED.",
                    result.request.client_order_id
                );
                self.halt(format!(
                    "order {} accepted without fill details",
                    result.request.client_order_id
                ));
                return CycleOutcome::OrderFailed(OrderErrorKind::Ambiguous);
            }
        };

        match transition {
            Transition::AttemptEnter => {
                if let Err(e) = self.tracker.confirm_entry(price, close_time) {
                    error!("Entry fill could not be applied: {}", e);
                    self.halt(format!("entry fill not applied: {e}"));
                    return CycleOutcome::OrderFailed(OrderErrorKind::Ambiguous);
                }
                info!("[ENTRY] LONG {} @ {}", quantity, price);
                self.recorder.record(TradeEvent::Entry {
                    price,
                    quantity,
                    close_time,
                });
                CycleOutcome::Entered
            }
            Transition::AttemptExit => {
                let closed = match self.tracker.confirm_exit() {
                    Ok(closed) => closed,
                    Err(e) => {
                        error!("Exit fill could not be applied: {}", e);
                        self.halt(format!("exit fill not applied: {e}"));
                        return CycleOutcome::OrderFailed(OrderErrorKind::Ambiguous);
                    }
                };
                info!(
                    "[EXIT] FLAT {} @ {} after {} bars",
                    quantity, price, closed.bars_held
                );
                self.recorder.record(TradeEvent::Exit {
                    price,
                    quantity,
                    close_time,
                    entry_close_time: closed.entry_close_time.unwrap_or(close_time),
                    bars_held: closed.bars_held,
                });
                CycleOutcome::Exited
            }
            Transition::None => CycleOutcome::Hold,
        }
    }

    fn halt(&mut self, reason: String) {
        if self.needs_review.is_none() {
            self.needs_review = Some(reason);
        }
    }

    fn report_failure(&mut self, result: &OrderResult) -> CycleOutcome {
        let kind = result.error_kind.unwrap_or(OrderErrorKind::Ambiguous);
        let side = result.request.side;
        let msg = result.error_message.as_deref().unwrap_or("unknown error");
        match kind {
            OrderErrorKind::Transient => warn!(
                "⚠️ {} order failed after retries, state unchanged: {}",
                side.as_str(),
                msg
            ),
            OrderErrorKind::Rejected => warn!(
                "⚠️ {} order rejected by exchange, state unchanged: {}",
                side.as_str(),
                msg
            ),
            OrderErrorKind::Ambiguous => {
                error!(
                    "🚨 {} order outcome UNKNOWN (client id {}): {}. State unchanged. MANUAL REVIEW REQUIRED.",
                    side.as_str(),
                    result.request.client_order_id,
                    msg
                );
                self.halt(format!(
                    "{} order {} has an unknown outcome",
                    side.as_str(),
                    result.request.client_order_id
                ));
                return CycleOutcome::OrderFailed(kind);
            }
        }
        if side == Side::Sell {
            warn!("Exit will be retried on the next closed candle");
        }
        CycleOutcome::OrderFailed(kind)
    }
}
