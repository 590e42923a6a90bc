// src/main.rs
use crate::config::AppConfig;
use crate::connectors::binance::BinanceClient;
use crate::connectors::gateway::select_gateway;
use crate::core::engine::TradingEngine;
use crate::core::executor::OrderExecutor;
use crate::core::recorder::{CsvTradeLog, TradeRecorder};
use crate::core::retry::RetryPolicy;
use crate::core::watcher::IntervalWatcher;
use crate::strategies::pullback::TrendPullback;
use crate::types::ExecutionMode;
use dotenvy::dotenv;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

mod config;
mod connectors;
mod core;
mod error;
mod strategies;
mod types;
mod utils;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // 1. Load Configuration (fatal before anything touches the network)
    let cfg = match AppConfig::new() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(2);
        }
    };

    let _log_guard = utils::logging::init(&cfg.log, "pullback_sniper.log")?;

    println!("========================================");
    println!("     PULLBACK SNIPER - v{}", env!("CARGO_PKG_VERSION"));
    println!("========================================");
    println!("Target:    {}", cfg.symbol);
    println!(
        "Timeframe: {} (trend {})",
        cfg.lower_timeframe, cfg.higher_timeframe
    );
    println!(
        "Mode:      {}",
        match cfg.mode {
            ExecutionMode::DryRun => "📝 DRY RUN",
            ExecutionMode::Sandbox => "🧪 SANDBOX (testnet)",
            ExecutionMode::Live => "🚨 LIVE TRADING",
        }
    );
    println!("========================================");

    info!(
        "Config loaded: symbol={} qty={} exit_bars={} poll={}s",
        cfg.symbol, cfg.order_quantity, cfg.strategy.exit_bars, cfg.poll_interval_secs
    );

    // 2. Initialize Components
    let trading_url = match cfg.mode {
        ExecutionMode::Sandbox => cfg.binance.testnet_url.clone(),
        _ => cfg.binance.mainnet_url.clone(),
    };
    let client = Arc::new(BinanceClient::new(
        cfg.binance.api_key.clone(),
        cfg.binance.secret_key.clone(),
        cfg.binance.mainnet_url.clone(),
        trading_url,
        cfg.binance.recv_window_ms,
    )?);

    let retry = RetryPolicy::from_config(&cfg.retry);
    let gateway = select_gateway(cfg.mode, client.clone(), cfg.price_tick, retry);
    let executor = OrderExecutor::new(
        gateway,
        cfg.symbol.clone(),
        cfg.order_quantity,
        cfg.quantity_step,
    );
    info!("Order size per entry: {} {}", executor.quantity(), cfg.symbol);
    let watcher = IntervalWatcher::new(
        client,
        cfg.symbol.clone(),
        cfg.lower_timeframe.clone(),
        cfg.candle_limit,
        retry,
    );
    let recorder = TradeRecorder::new(
        Box::new(CsvTradeLog::new(&cfg.trade_log_path)),
        cfg.symbol.clone(),
        cfg.mode,
    );
    let strategy = TrendPullback::new(cfg.strategy.clone());

    // 3. Shutdown on Ctrl-C, picked up between cycles
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(utils::shutdown::forward_shutdown(
        tokio::signal::ctrl_c(),
        shutdown_tx,
    ));

    // 4. Run Engine
    let mut engine = TradingEngine::new(
        watcher,
        strategy,
        executor,
        recorder,
        cfg.higher_timeframe.clone(),
        cfg.poll_interval(),
    );

    if let Err(e) = engine.run(shutdown_rx).await {
        error!("Fatal Engine Error: {:#}", e);
        return Err(e);
    }

    Ok(())
}
