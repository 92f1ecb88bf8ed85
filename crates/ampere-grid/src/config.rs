//! Tunables of the energy ledger.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{Error, Result};

/// Configuration shared by every network of an [`EnergySystem`](crate::EnergySystem).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Window W of the moving averages; each tick decays by (W-1)/W.
    pub average_window: f64,
    /// Consecutive successful probes that must be exceeded before power goes public.
    pub power_debounce_ticks: u64,
    /// Ticks after which the cached stored power is recomputed from providers.
    pub refresh_interval: u64,
    /// Energy a network without providers buffers instead of returning it.
    pub empty_buffer: f64,
    /// Energy below this is treated as nothing.
    pub epsilon: f64,
    /// Idle draw above which the power probe actually pays the draw.
    pub idle_draw_threshold: f64,
    /// Allowed shortfall when paying idle draw.
    pub draw_tolerance: f64,
    /// Amount simulated by the power probe when idle draw is trivial.
    pub probe_amount: f64,
    /// Ratio used by [`PowerMultiplier::Config`](crate::PowerMultiplier::Config).
    pub power_multiplier: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            average_window: 40.0,
            power_debounce_ticks: 30,
            refresh_interval: 90,
            empty_buffer: 1000.0,
            epsilon: 1e-8,
            idle_draw_threshold: 0.0001,
            draw_tolerance: 0.001,
            probe_amount: 0.1,
            power_multiplier: 1.0,
        }
    }
}

impl GridConfig {
    /// Create config from `AMPERE_*` environment variables, defaulting anything unset.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Self {
            average_window: env_or("AMPERE_AVERAGE_WINDOW", defaults.average_window)?,
            power_debounce_ticks: env_or("AMPERE_POWER_DEBOUNCE_TICKS", defaults.power_debounce_ticks)?,
            refresh_interval: env_or("AMPERE_REFRESH_INTERVAL", defaults.refresh_interval)?,
            empty_buffer: env_or("AMPERE_EMPTY_BUFFER", defaults.empty_buffer)?,
            epsilon: env_or("AMPERE_EPSILON", defaults.epsilon)?,
            idle_draw_threshold: env_or("AMPERE_IDLE_DRAW_THRESHOLD", defaults.idle_draw_threshold)?,
            draw_tolerance: env_or("AMPERE_DRAW_TOLERANCE", defaults.draw_tolerance)?,
            probe_amount: env_or("AMPERE_PROBE_AMOUNT", defaults.probe_amount)?,
            power_multiplier: env_or("AMPERE_POWER_MULTIPLIER", defaults.power_multiplier)?,
        }
        .validated()
    }

    /// Reject values the ledger cannot work with.
    pub fn validated(self) -> Result<Self> {
        if !(self.average_window >= 1.0) {
            return Err(Error::Config {
                key: "average_window",
                value: self.average_window.to_string(),
            });
        }
        if !(self.power_multiplier > 0.0) {
            return Err(Error::Config {
                key: "power_multiplier",
                value: self.power_multiplier.to_string(),
            });
        }
        Ok(self)
    }

    /// Decay factor applied to the moving averages every tick.
    pub fn decay(&self) -> f64 {
        (self.average_window - 1.0) / self.average_window
    }
}

fn env_or<T: FromStr>(key: &'static str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| Error::Config { key, value: raw }),
        Err(_) => Ok(default),
    }
}
