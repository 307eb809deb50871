//! Bounded busy-wait
//!
//! Waiting for the transport to go idle means pumping events in a loop. The
//! loop is bounded by a spin count, a wall-clock deadline, or both, so a
//! transport that never drains surfaces as [`LinkError::Timeout`] instead of
//! a hang.

use crate::error::{LinkError, LinkResult};
use std::time::{Duration, Instant};

/// Default wall-clock bound of a busy-wait
pub const DEFAULT_BUSY_WAIT: Duration = Duration::from_secs(5);

/// Bounds of one busy-wait loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollBudget {
    /// Largest number of spins, unbounded if `None`
    pub max_spins: Option<u32>,
    /// Longest wall-clock wait, unbounded if `None`
    pub deadline: Option<Duration>,
}

impl PollBudget {
    /// Wait as long as it takes
    pub fn unbounded() -> Self {
        Self {
            max_spins: None,
            deadline: None,
        }
    }

    /// Give up after `spins` spins
    pub fn spins(spins: u32) -> Self {
        Self {
            max_spins: Some(spins),
            deadline: None,
        }
    }

    /// Give up after `deadline`
    pub fn within(deadline: Duration) -> Self {
        Self {
            max_spins: None,
            deadline: Some(deadline),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.max_spins.is_none() && self.deadline.is_none()
    }

    /// Start a wait bounded by this budget
    pub fn start(&self) -> Poller {
        Poller {
            budget: *self,
            spins: 0,
            started: Instant::now(),
        }
    }
}

impl Default for PollBudget {
    fn default() -> Self {
        Self::within(DEFAULT_BUSY_WAIT)
    }
}

/// One running busy-wait
#[derive(Debug)]
pub struct Poller {
    budget: PollBudget,
    spins: u32,
    started: Instant,
}

impl Poller {
    /// Account for one more spin, failing once the budget is spent.
    pub fn tick(&mut self) -> LinkResult<()> {
        if let Some(max) = self.budget.max_spins {
            if self.spins >= max {
                return Err(LinkError::Timeout);
            }
        }
        if let Some(deadline) = self.budget.deadline {
            if self.started.elapsed() >= deadline {
                return Err(LinkError::Timeout);
            }
        }
        self.spins += 1;
        Ok(())
    }

    /// Spins taken so far
    pub fn spins(&self) -> u32 {
        self.spins
    }
}
