//! Position sizing algorithms
//!
//! Every method produces a share count that is finally clamped to the
//! single-position value cap. Degenerate inputs (zero ATR, too little Kelly
//! history, negative volatility) fall back to a conservative 2% fixed
//! percentage rather than failing.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::kelly::KellyCalculator;

/// Fraction of account used when a method cannot size a trade
pub const FALLBACK_PCT: Decimal = dec!(0.02);

/// Sizing algorithm together with its parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum SizingMethod {
    /// Fixed fraction of account value
    FixedPercentage { pct: Decimal },
    /// Fixed amount of account currency
    FixedAmount { amount: Decimal },
    /// Half Kelly from recorded trade returns
    KellyCriterion,
    /// Risk a fraction of account over `atr * atr_multiplier` per share
    AtrBased {
        atr: Decimal,
        risk_pct: Decimal,
        atr_multiplier: Decimal,
    },
    /// Base fraction shrunk by volatility
    VolatilityAdjusted { volatility: Decimal, base_pct: Decimal },
}

impl SizingMethod {
    /// Get the sizing mode name
    pub fn mode_name(&self) -> &'static str {
        match self {
            SizingMethod::FixedPercentage { .. } => "fixed_percentage",
            SizingMethod::FixedAmount { .. } => "fixed_amount",
            SizingMethod::KellyCriterion => "kelly_criterion",
            SizingMethod::AtrBased { .. } => "atr_based",
            SizingMethod::VolatilityAdjusted { .. } => "volatility_adjusted",
        }
    }
}

impl Default for SizingMethod {
    fn default() -> Self {
        SizingMethod::FixedPercentage { pct: dec!(0.05) }
    }
}

/// Inputs shared by all sizing methods
#[derive(Debug, Clone, Copy)]
pub struct SizingInput<'a> {
    pub entry_price: Decimal,
    pub account_value: Decimal,
    /// Single-position cap as a fraction of account value
    pub max_position_pct: Decimal,
    /// Recorded trade returns, oldest first
    pub returns: &'a [Decimal],
}

impl SizingInput<'_> {
    fn shares(&self, value: Decimal) -> Decimal {
        value / self.entry_price
    }

    fn fixed_pct(&self, pct: Decimal) -> Decimal {
        self.shares(self.account_value * pct.min(self.max_position_pct))
    }

    fn cap(&self) -> Decimal {
        self.shares(self.account_value * self.max_position_pct)
    }
}

/// Calculate a share count for the given method
pub fn calculate_quantity(
    method: &SizingMethod,
    input: &SizingInput<'_>,
    kelly: &KellyCalculator,
) -> u64 {
    if input.entry_price <= dec!(0) || input.account_value <= dec!(0) {
        tracing::warn!(
            entry_price = %input.entry_price,
            account_value = %input.account_value,
            "Cannot size position with non-positive price or account value"
        );
        return 0;
    }

    let raw = match method {
        SizingMethod::FixedPercentage { pct } => input.fixed_pct(*pct),
        SizingMethod::FixedAmount { amount } => input.shares(*amount),
        SizingMethod::KellyCriterion => match kelly.estimate(input.returns) {
            Ok(estimate) => {
                tracing::debug!(
                    kelly = %estimate.kelly_fraction,
                    applied = %estimate.applied_fraction,
                    win_rate = %estimate.win_rate,
                    "Kelly sizing"
                );
                input.shares(input.account_value * estimate.applied_fraction)
            }
            Err(reason) => {
                tracing::info!(%reason, "Kelly unavailable, using 2% fixed sizing");
                input.fixed_pct(FALLBACK_PCT)
            }
        },
        SizingMethod::AtrBased {
            atr,
            risk_pct,
            atr_multiplier,
        } => {
            let per_share_risk = *atr * *atr_multiplier;
            if per_share_risk <= dec!(0) {
                tracing::info!(%atr, %atr_multiplier, "Degenerate ATR, using 2% fixed sizing");
                input.fixed_pct(FALLBACK_PCT)
            } else {
                (input.account_value * *risk_pct) / per_share_risk
            }
        }
        SizingMethod::VolatilityAdjusted {
            volatility,
            base_pct,
        } => {
            if *volatility < dec!(0) {
                tracing::info!(%volatility, "Negative volatility, using 2% fixed sizing");
                input.fixed_pct(FALLBACK_PCT)
            } else {
                let adjusted = *base_pct / (Decimal::ONE + *volatility * dec!(10));
                input.fixed_pct(adjusted)
            }
        }
    };

    let quantity = raw.min(input.cap()).max(dec!(0)).floor();
    quantity.to_u64().unwrap_or(0)
}
