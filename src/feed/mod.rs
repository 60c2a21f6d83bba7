//! Market-data and account feed interfaces
//!
//! Ticks and account snapshots are produced by external collaborators and
//! pushed into the risk system.

mod types;

pub use types::{AccountSnapshot, PriceTick};
