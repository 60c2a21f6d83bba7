//! Kelly criterion position sizing

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::fmt;

/// Why a Kelly estimate could not be produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KellyFallback {
    /// Not enough closed trades recorded
    InsufficientHistory { have: usize, need: usize },
    /// No winning trades, payoff ratio undefined
    NoWins,
    /// No losing trades (average loss of zero)
    NoLosses,
}

impl fmt::Display for KellyFallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KellyFallback::InsufficientHistory { have, need } => {
                write!(f, "insufficient history ({have} of {need} trades)")
            }
            KellyFallback::NoWins => f.write_str("no winning trades"),
            KellyFallback::NoLosses => f.write_str("no losing trades"),
        }
    }
}

/// Kelly estimate derived from trade history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KellyEstimate {
    /// Fraction of winning trades
    pub win_rate: Decimal,
    /// Average win divided by average loss
    pub payoff_ratio: Decimal,
    /// Kelly fraction after clamping
    pub kelly_fraction: Decimal,
    /// Fraction of capital actually allocated
    pub applied_fraction: Decimal,
}

/// Kelly criterion calculator over historical trade returns
#[derive(Debug, Clone)]
pub struct KellyCalculator {
    /// Scale applied to the clamped Kelly fraction (0.5 for half Kelly)
    pub fraction: Decimal,
    /// Upper clamp of the raw Kelly fraction
    pub max_fraction: Decimal,
    /// Minimum closed trades before Kelly is trusted
    pub min_history: usize,
}

impl KellyCalculator {
    /// Create a new Kelly calculator
    pub fn new(fraction: Decimal, max_fraction: Decimal, min_history: usize) -> Self {
        Self {
            fraction,
            max_fraction,
            min_history,
        }
    }

    /// Kelly fraction f* = (b*p - q) / b, clamped to [0, max_fraction]
    ///
    /// Returns `None` when the payoff ratio is not positive.
    pub fn kelly_fraction(&self, win_rate: Decimal, payoff_ratio: Decimal) -> Option<Decimal> {
        if payoff_ratio <= dec!(0) {
            return None;
        }
        let p = win_rate.clamp(dec!(0), Decimal::ONE);
        let q = Decimal::ONE - p;
        let kelly = (payoff_ratio * p - q) / payoff_ratio;
        Some(kelly.clamp(dec!(0), self.max_fraction))
    }

    /// Estimate the fraction of capital to allocate from trade returns
    pub fn estimate(&self, returns: &[Decimal]) -> Result<KellyEstimate, KellyFallback> {
        if returns.len() < self.min_history {
            return Err(KellyFallback::InsufficientHistory {
                have: returns.len(),
                need: self.min_history,
            });
        }

        let wins: Vec<Decimal> = returns.iter().copied().filter(|r| *r > dec!(0)).collect();
        let losses: Vec<Decimal> = returns.iter().copied().filter(|r| *r < dec!(0)).collect();

        if wins.is_empty() {
            return Err(KellyFallback::NoWins);
        }
        if losses.is_empty() {
            return Err(KellyFallback::NoLosses);
        }

        let avg_win = wins.iter().sum::<Decimal>() / Decimal::from(wins.len());
        let avg_loss = (losses.iter().sum::<Decimal>() / Decimal::from(losses.len())).abs();
        if avg_loss == dec!(0) {
            return Err(KellyFallback::NoLosses);
        }

        let payoff_ratio = avg_win / avg_loss;
        let win_rate = Decimal::from(wins.len()) / Decimal::from(returns.len());
        let kelly_fraction = self
            .kelly_fraction(win_rate, payoff_ratio)
            .ok_or(KellyFallback::NoWins)?;

        Ok(KellyEstimate {
            win_rate,
            payoff_ratio,
            kelly_fraction,
            applied_fraction: kelly_fraction * self.fraction,
        })
    }
}

impl Default for KellyCalculator {
    fn default() -> Self {
        Self::new(dec!(0.5), dec!(0.25), 10)
    }
}
