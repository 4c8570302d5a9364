//! Reconnect policy: linear backoff up to a ceiling, then a fixed cooldown.

use std::time::Duration;

/// Fixed wait after `ceiling` consecutive connect failures.
pub const RECONNECT_COOLDOWN: Duration = Duration::from_secs(60);

/// What to do before the next connect attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPlan {
    /// No failures yet: connect right away.
    Immediate,
    /// Wait `delay_unit * failed` first.
    Backoff(Duration),
    /// Ceiling reached: wait the cooldown, reset the counter, then connect.
    Cooldown(Duration),
}

impl ReconnectPlan {
    /// Time to sleep before the attempt.
    pub fn delay(&self) -> Duration {
        match self {
            ReconnectPlan::Immediate => Duration::ZERO,
            ReconnectPlan::Backoff(d) | ReconnectPlan::Cooldown(d) => *d,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Consecutive failures tolerated before the cooldown.
    pub ceiling: u32,
    /// Unit of the linear backoff.
    pub delay_unit: Duration,
    pub cooldown: Duration,
}

impl ReconnectPolicy {
    pub fn new(ceiling: u32, delay_unit: Duration) -> Self {
        Self {
            ceiling,
            delay_unit,
            cooldown: RECONNECT_COOLDOWN,
        }
    }

    /// Plan the next attempt given the current failure count.
    pub fn plan(&self, failed: u32) -> ReconnectPlan {
        if failed >= self.ceiling {
            ReconnectPlan::Cooldown(self.cooldown)
        } else if failed > 0 {
            ReconnectPlan::Backoff(self.delay_unit.saturating_mul(failed))
        } else {
            ReconnectPlan::Immediate
        }
    }
}
