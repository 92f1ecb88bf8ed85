//! Per-tick accounting and the power-availability state machine.

use serde::{Deserialize, Serialize};

use crate::config::GridConfig;

/// Idle draw and smoothed drain/injection of one network.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickStatistics {
    idle_draw: f64,
    avg_drain: f64,
    avg_injection: f64,
    tick_drain: f64,
    tick_injection: f64,
}

impl TickStatistics {
    /// Create zeroed statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Energy the attached machines draw every tick.
    pub fn idle_draw(&self) -> f64 {
        self.idle_draw
    }

    /// Change idle draw by `delta`.
    pub fn adjust_idle_draw(&mut self, delta: f64) {
        self.idle_draw += delta;
    }

    /// Smoothed energy extracted per tick.
    pub fn avg_drain(&self) -> f64 {
        self.avg_drain
    }

    /// Smoothed energy injected per tick.
    pub fn avg_injection(&self) -> f64 {
        self.avg_injection
    }

    /// Extracted so far this tick.
    pub fn tick_drain(&self) -> f64 {
        self.tick_drain
    }

    /// Injected so far this tick.
    pub fn tick_injection(&self) -> f64 {
        self.tick_injection
    }

    pub(crate) fn record_drain(&mut self, amount: f64) {
        self.tick_drain += amount;
    }

    pub(crate) fn record_injection(&mut self, amount: f64) {
        self.tick_injection += amount;
    }

    /// Fold this tick into the moving averages over the configured window and
    /// reset the accumulators.
    pub fn roll(&mut self, config: &GridConfig) {
        let window = config.average_window;
        let decay = config.decay();
        self.avg_drain = self.avg_drain * decay + self.tick_drain / window;
        self.avg_injection = self.avg_injection * decay + self.tick_injection / window;
        self.tick_drain = 0.0;
        self.tick_injection = 0.0;
    }
}

/// Power availability of a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PowerState {
    /// The last probe failed.
    #[default]
    NoPower,
    /// Probes succeed but not yet for long enough.
    PowerPending,
    /// Probes have succeeded for longer than the debounce window.
    PowerPublic,
}

/// Debounces power gain; power loss is immediate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PowerHysteresis {
    state: PowerState,
    consecutive: u64,
}

impl PowerHysteresis {
    /// Start without power.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> PowerState {
        self.state
    }

    /// Whether power is publicly available.
    pub fn is_public(&self) -> bool {
        self.state == PowerState::PowerPublic
    }

    /// Consecutive successful probes.
    pub fn consecutive(&self) -> u64 {
        self.consecutive
    }

    /// Feed one probe result. Returns the new public flag if it flipped.
    pub fn observe(&mut self, has_power: bool, debounce_ticks: u64) -> Option<bool> {
        let was_public = self.is_public();
        if has_power {
            self.consecutive = self.consecutive.saturating_add(1);
            self.state = if self.consecutive > debounce_ticks {
                PowerState::PowerPublic
            } else {
                PowerState::PowerPending
            };
        } else {
            self.consecutive = 0;
            self.state = PowerState::NoPower;
        }
        let is_public = self.is_public();
        (was_public != is_public).then_some(is_public)
    }
}
