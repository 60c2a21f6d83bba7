//! Risk limits and drawdown tracking

use super::types::RiskError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Account-level risk limits
///
/// Constructed only through [`RiskLimitsBuilder::build`] (or deserialization,
/// which goes through the same validation), so a `RiskLimits` value is always
/// within range and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RiskLimitsBuilder")]
pub struct RiskLimits {
    max_single_loss_pct: Decimal,
    max_daily_loss_pct: Decimal,
    max_position_pct: Decimal,
    max_total_position_pct: Decimal,
    max_consecutive_losses: u32,
    min_account_value: Decimal,
    max_correlation: Decimal,
    max_leverage: Decimal,
}

impl RiskLimits {
    pub fn builder() -> RiskLimitsBuilder {
        RiskLimitsBuilder::default()
    }

    /// Maximum loss of a single trade as a fraction of account value
    pub fn max_single_loss_pct(&self) -> Decimal {
        self.max_single_loss_pct
    }

    /// Maximum loss per session as a fraction of account value
    pub fn max_daily_loss_pct(&self) -> Decimal {
        self.max_daily_loss_pct
    }

    /// Per-position fraction of account value, before leverage
    ///
    /// The admission gate allows up to `max_position_pct * max_leverage`
    /// (see [`RiskLimits::single_position_cap`]), so 10% at 2x admits a
    /// 20% notional position.
    pub fn max_position_pct(&self) -> Decimal {
        self.max_position_pct
    }

    /// Maximum notional of all positions as a fraction of account value
    pub fn max_total_position_pct(&self) -> Decimal {
        self.max_total_position_pct
    }

    pub fn max_consecutive_losses(&self) -> u32 {
        self.max_consecutive_losses
    }

    pub fn min_account_value(&self) -> Decimal {
        self.min_account_value
    }

    pub fn max_correlation(&self) -> Decimal {
        self.max_correlation
    }

    pub fn max_leverage(&self) -> Decimal {
        self.max_leverage
    }

    /// Notional cap for a single new position at the admission gate
    pub fn single_position_cap(&self) -> Decimal {
        self.max_position_pct * self.max_leverage
    }
}

impl Default for RiskLimits {
    fn default() -> Self {
        let b = RiskLimitsBuilder::default();
        Self {
            max_single_loss_pct: b.max_single_loss_pct,
            max_daily_loss_pct: b.max_daily_loss_pct,
            max_position_pct: b.max_position_pct,
            max_total_position_pct: b.max_total_position_pct,
            max_consecutive_losses: b.max_consecutive_losses,
            min_account_value: b.min_account_value,
            max_correlation: b.max_correlation,
            max_leverage: b.max_leverage,
        }
    }
}

impl TryFrom<RiskLimitsBuilder> for RiskLimits {
    type Error = RiskError;

    fn try_from(builder: RiskLimitsBuilder) -> Result<Self, Self::Error> {
        builder.build()
    }
}

/// Unvalidated limit values
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RiskLimitsBuilder {
    pub max_single_loss_pct: Decimal,
    pub max_daily_loss_pct: Decimal,
    pub max_position_pct: Decimal,
    pub max_total_position_pct: Decimal,
    pub max_consecutive_losses: u32,
    pub min_account_value: Decimal,
    pub max_correlation: Decimal,
    pub max_leverage: Decimal,
}

impl Default for RiskLimitsBuilder {
    fn default() -> Self {
        Self {
            max_single_loss_pct: dec!(0.005), // 0.5% per trade
            max_daily_loss_pct: dec!(0.02),   // 2% per day
            max_position_pct: dec!(0.10),
            max_total_position_pct: dec!(0.80),
            max_consecutive_losses: 5,
            min_account_value: dec!(10000),
            max_correlation: dec!(0.7),
            max_leverage: dec!(2),
        }
    }
}

impl RiskLimitsBuilder {
    #[must_use]
    pub fn with_max_single_loss_pct(mut self, value: Decimal) -> Self {
        self.max_single_loss_pct = value;
        self
    }

    #[must_use]
    pub fn with_max_daily_loss_pct(mut self, value: Decimal) -> Self {
        self.max_daily_loss_pct = value;
        self
    }

    #[must_use]
    pub fn with_max_position_pct(mut self, value: Decimal) -> Self {
        self.max_position_pct = value;
        self
    }

    #[must_use]
    pub fn with_max_total_position_pct(mut self, value: Decimal) -> Self {
        self.max_total_position_pct = value;
        self
    }

    #[must_use]
    pub fn with_max_consecutive_losses(mut self, value: u32) -> Self {
        self.max_consecutive_losses = value;
        self
    }

    #[must_use]
    pub fn with_min_account_value(mut self, value: Decimal) -> Self {
        self.min_account_value = value;
        self
    }

    #[must_use]
    pub fn with_max_correlation(mut self, value: Decimal) -> Self {
        self.max_correlation = value;
        self
    }

    #[must_use]
    pub fn with_max_leverage(mut self, value: Decimal) -> Self {
        self.max_leverage = value;
        self
    }

    /// Validate and freeze the limits
    pub fn build(self) -> Result<RiskLimits, RiskError> {
        check_fraction("max_single_loss_pct", self.max_single_loss_pct)?;
        check_fraction("max_daily_loss_pct", self.max_daily_loss_pct)?;
        check_fraction("max_position_pct", self.max_position_pct)?;
        check_fraction("max_total_position_pct", self.max_total_position_pct)?;
        check_fraction("max_correlation", self.max_correlation)?;

        if self.max_consecutive_losses == 0 {
            return Err(RiskError::invalid_limit(
                "max_consecutive_losses",
                self.max_consecutive_losses,
                "at least 1",
            ));
        }
        if self.min_account_value < Decimal::ZERO {
            return Err(RiskError::invalid_limit(
                "min_account_value",
                self.min_account_value,
                "non-negative",
            ));
        }
        if self.max_leverage < Decimal::ONE {
            return Err(RiskError::invalid_limit(
                "max_leverage",
                self.max_leverage,
                "at least 1",
            ));
        }

        Ok(RiskLimits {
            max_single_loss_pct: self.max_single_loss_pct,
            max_daily_loss_pct: self.max_daily_loss_pct,
            max_position_pct: self.max_position_pct,
            max_total_position_pct: self.max_total_position_pct,
            max_consecutive_losses: self.max_consecutive_losses,
            min_account_value: self.min_account_value,
            max_correlation: self.max_correlation,
            max_leverage: self.max_leverage,
        })
    }
}

pub(crate) fn check_fraction(field: &'static str, value: Decimal) -> Result<(), RiskError> {
    if value <= Decimal::ZERO || value > Decimal::ONE {
        return Err(RiskError::invalid_limit(field, value, "in (0, 1]"));
    }
    Ok(())
}

/// Tracks drawdown over the cumulative P&L of a session
#[derive(Debug, Clone)]
pub struct DrawdownTracker {
    /// Account value at session start
    pub base_equity: Decimal,
    /// Highest cumulative P&L seen this session
    pub peak_pnl: Decimal,
    /// Latest cumulative P&L
    pub current_pnl: Decimal,
    /// Largest drawdown seen this session
    pub max_drawdown: Decimal,
}

impl DrawdownTracker {
    pub fn new(base_equity: Decimal) -> Self {
        Self {
            base_equity,
            peak_pnl: dec!(0),
            current_pnl: dec!(0),
            max_drawdown: dec!(0),
        }
    }

    /// Record the latest cumulative P&L and return the session max drawdown
    pub fn update(&mut self, cumulative_pnl: Decimal) -> Decimal {
        self.current_pnl = cumulative_pnl;
        if cumulative_pnl > self.peak_pnl {
            self.peak_pnl = cumulative_pnl;
        }
        let drawdown = self.current_drawdown();
        if drawdown > self.max_drawdown {
            self.max_drawdown = drawdown;
        }
        self.max_drawdown
    }

    /// Peak-to-current decline as a fraction of peak equity
    pub fn current_drawdown(&self) -> Decimal {
        let peak_equity = self.base_equity + self.peak_pnl;
        if peak_equity <= dec!(0) {
            return dec!(0);
        }
        ((self.peak_pnl - self.current_pnl) / peak_equity).max(dec!(0))
    }

    /// Start a new session from the given equity
    pub fn reset(&mut self, base_equity: Decimal) {
        *self = Self::new(base_equity);
    }
}
