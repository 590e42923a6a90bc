pub mod indicators;
pub mod pullback;
pub mod traits;
