pub mod binance;
pub mod gateway;
pub mod messages;
pub mod traits;
