// src/core/recorder.rs
use crate::types::{millis_to_utc, ExecutionMode, Side, TradeRecord};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use tracing::{error, info};

/// Append-only destination for trade records.
pub trait TradeSink: Send {
    fn append(&mut self, record: &TradeRecord) -> Result<()>;
}

const CSV_HEADER: [&str; 10] = [
    "trade_id",
    "timestamp",
    "symbol",
    "side",
    "price",
    "quantity",
    "mode",
    "entry_time",
    "exit_time",
    "bars_held",
];

/// Appends rows to a CSV file; writes the header only when the file is new.
pub struct CsvTradeLog {
    path: PathBuf,
}

impl CsvTradeLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TradeSink for CsvTradeLog {
    fn append(&mut self, record: &TradeRecord) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)
                    .with_context(|| format!("creating {}", dir.display()))?;
            }
        }

        let is_new = fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening {}", self.path.display()))?;

        let mut wtr = csv::Writer::from_writer(file);
        if is_new {
            wtr.write_record(CSV_HEADER)?;
        }
        wtr.write_record([
            record.trade_id.clone(),
            record.timestamp.to_rfc3339(),
            record.symbol.clone(),
            record.side.as_str().to_string(),
            record.price.to_string(),
            record.quantity.to_string(),
            record.mode.tag().to_string(),
            record.entry_time.to_rfc3339(),
            record.exit_time.map(|t| t.to_rfc3339()).unwrap_or_default(),
            record.bars_held.map(|b| b.to_string()).unwrap_or_default(),
        ])?;
        wtr.flush().context("flushing trade log")?;
        Ok(())
    }
}

/// A confirmed fill worth recording.
#[derive(Debug, Clone, PartialEq)]
pub enum TradeEvent {
    Entry {
        price: Decimal,
        quantity: Decimal,
        close_time: i64,
    },
    Exit {
        price: Decimal,
        quantity: Decimal,
        close_time: i64,
        entry_close_time: i64,
        bars_held: u32,
    },
}

/// Numbers round trips and writes one record per confirmed entry and exit.
pub struct TradeRecorder {
    sink: Box<dyn TradeSink>,
    symbol: String,
    mode: ExecutionMode,
    trade_counter: u32,
}

impl TradeRecorder {
    pub fn new(sink: Box<dyn TradeSink>, symbol: String, mode: ExecutionMode) -> Self {
        Self {
            sink,
            symbol,
            mode,
            trade_counter: 0,
        }
    }

    /// Sink failures are logged, never propagated: a broken log file must not
    /// stop the loop while a position is open.
    pub fn record(&mut self, event: TradeEvent) -> Option<TradeRecord> {
        let record = self.build(event, Utc::now());
        match self.sink.append(&record) {
            Ok(()) => {
                info!(
                    "[TRADE] {} {} {} {} @ {} | mode={}",
                    record.trade_id,
                    record.side.as_str(),
                    record.quantity,
                    record.symbol,
                    record.price,
                    record.mode
                );
                Some(record)
            }
            Err(e) => {
                error!("Failed to write trade record {:?}: {:#}", record, e);
                None
            }
        }
    }

    fn build(&mut self, event: TradeEvent, now: DateTime<Utc>) -> TradeRecord {
        match event {
            TradeEvent::Entry {
                price,
                quantity,
                close_time,
            } => {
                self.trade_counter += 1;
                TradeRecord {
                    trade_id: self.trade_id(),
                    timestamp: now,
                    symbol: self.symbol.clone(),
                    side: Side::Buy,
                    price,
                    quantity,
                    mode: self.mode,
                    entry_time: millis_to_utc(close_time),
                    exit_time: None,
                    bars_held: None,
                }
            }
            TradeEvent::Exit {
                price,
                quantity,
                close_time,
                entry_close_time,
                bars_held,
            } => TradeRecord {
                trade_id: self.trade_id(),
                timestamp: now,
                symbol: self.symbol.clone(),
                side: Side::Sell,
                price,
                quantity,
                mode: self.mode,
                entry_time: millis_to_utc(entry_close_time),
                exit_time: Some(millis_to_utc(close_time)),
                bars_held: Some(bars_held),
            },
        }
    }

    fn trade_id(&self) -> String {
        format!("T{:03}", self.trade_counter)
    }
}
