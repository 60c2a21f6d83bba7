//! Strategy-facing trade intents
//!
//! Signal generation lives outside this crate; strategies hand the risk
//! system a [`TradeIntent`] and receive a [`crate::risk::Decision`].

mod types;

pub use types::{Side, TradeIntent};
