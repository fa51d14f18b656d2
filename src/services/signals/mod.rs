//! Signal computation: indicator math, stance aggregation and the
//! per-instrument analysis pass.

pub mod aggregation;
pub mod analysis;
pub mod indicators;

pub use aggregation::{bb_stance, combine, overall_stance, rsi_stance, sma_stance};
pub use analysis::{analyze, check_history};
