// src/core/position.rs
use crate::error::StateError;
use crate::types::{PositionState, PositionStatus, Signal};
use rust_decimal::Decimal;

/// What a signal asks for, given the current position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    AttemptEnter,
    AttemptExit,
    None,
}

/// The one transition table. Used by both the tracker and the executor.
pub fn transition_for(status: PositionStatus, signal: Signal) -> Transition {
    match (status, signal) {
        (PositionStatus::Flat, Signal::EnterLong) => Transition::AttemptEnter,
        (PositionStatus::Long, Signal::ExitLong) => Transition::AttemptExit,
        _ => Transition::None,
    }
}

/// Sole owner of the position. Starts FLAT on every process start.
///
/// State only changes through `confirm_entry` / `confirm_exit`, which the
/// engine calls after an accepted order, and `tick`.
#[derive(Debug, Default)]
pub struct PositionTracker {
    state: PositionState,
}

impl PositionTracker {
    pub fn new() -> Self {
        Self {
            state: PositionState::flat(),
        }
    }

    pub fn state(&self) -> &PositionState {
        &self.state
    }

    /// Never mutates; the caller still has to get an order filled.
    pub fn on_signal(&self, signal: Signal) -> Transition {
        transition_for(self.state.status, signal)
    }

    pub fn confirm_entry(&mut self, fill_price: Decimal, close_time: i64) -> Result<(), StateError> {
        if self.state.is_long() {
            return Err(StateError::AlreadyLong);
        }
        self.state = PositionState {
            status: PositionStatus::Long,
            entry_price: Some(fill_price),
            entry_close_time: Some(close_time),
            bars_held: 0,
        };
        Ok(())
    }

    /// Returns the position as it was just before closing.
    pub fn confirm_exit(&mut self) -> Result<PositionState, StateError> {
        if !self.state.is_long() {
            return Err(StateError::NotLong);
        }
        Ok(std::mem::replace(&mut self.state, PositionState::flat()))
    }

    /// One more closed candle while long. No-op when flat.
    pub fn tick(&mut self) {
        if self.state.is_long() {
            self.state.bars_held += 1;
        }
    }
}
