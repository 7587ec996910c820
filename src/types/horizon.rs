use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};

/// A validated `(horizon, periods)` pair.
///
/// `periods` must equal `horizon * k` for an integer `k >= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Horizon {
    horizon: u32,
    periods: u32,
}

impl Horizon {
    pub fn new(horizon: u32, periods: u32) -> Result<Self> {
        if horizon == 0 {
            return Err(StoreError::InvalidHorizon {
                horizon,
                periods,
                reason: "horizon must be positive".to_string(),
            });
        }
        if periods / horizon == 0 {
            return Err(StoreError::InvalidHorizon {
                horizon,
                periods,
                reason: format!("horizon {} must be less than periods {} (or equal)", horizon, periods),
            });
        }
        if periods % horizon != 0 {
            return Err(StoreError::InvalidHorizon {
                horizon,
                periods,
                reason: format!("horizon {} must be a factor of periods {}", horizon, periods),
            });
        }
        Ok(Self { horizon, periods })
    }

    /// `periods = horizon * multiplier`.
    pub fn scaled(horizon: u32, multiplier: u32) -> Result<Self> {
        let periods = horizon
            .checked_mul(multiplier)
            .ok_or_else(|| StoreError::InvalidHorizon {
                horizon,
                periods: u32::MAX,
                reason: format!("horizon {} x {} overflows", horizon, multiplier),
            })?;
        Self::new(horizon, periods)
    }

    pub fn horizon(&self) -> u32 {
        self.horizon
    }

    pub fn periods(&self) -> u32 {
        self.periods
    }

    pub fn multiplier(&self) -> u32 {
        self.periods / self.horizon
    }
}

/// Validate every horizon of a configuration against one multiplier.
pub fn scaled_horizons(horizons: &[u32], multiplier: u32) -> Result<Vec<Horizon>> {
    horizons
        .iter()
        .map(|&h| Horizon::scaled(h, multiplier))
        .collect()
}
