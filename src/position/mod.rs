//! Position sizing and the live position ledger
//!
//! Provides:
//! - Kelly criterion estimation from closed-trade returns
//! - Fixed, ATR, volatility-adjusted and Kelly sizing methods
//! - The position ledger with portfolio limits and rebalancing suggestions

pub mod kelly;
pub mod ledger;
pub mod sizing;

pub use kelly::{KellyCalculator, KellyEstimate, KellyFallback};
pub use ledger::{
    Adjustment, ClosedPosition, PortfolioSuggestion, PortfolioSummary, Position, PositionLimits,
    PositionManager, DEFAULT_TARGET_VOLATILITY,
};
pub use sizing::{calculate_quantity, SizingInput, SizingMethod, FALLBACK_PCT};
