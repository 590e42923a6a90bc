pub mod engine;
pub mod executor;
pub mod position;
pub mod recorder;
pub mod retry;
pub mod watcher;
