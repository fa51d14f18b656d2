//! Technical indicator implementations.
//!
//! Every function is pure and returns a series the same length as its input,
//! with `None` wherever the lookback is not yet satisfied.

pub mod bollinger;
pub mod rsi;
pub mod sma;

pub use bollinger::bollinger;
pub use rsi::rsi;
pub use sma::sma;
