//! The single poll-until-condition-or-deadline primitive.
//!
//! Every wait in the engine (element appearance, challenge clearing, URL
//! settling) goes through [`Poller`] so that no loop can wait unbounded and
//! no loop sleeps before its first check.

use std::time::Duration;
use tokio::time::Instant;

/// Interval + deadline pair handed to anything that waits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollBudget {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollBudget {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    /// Standard budget: 500 ms polls until the given timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            interval: Duration::from_millis(500),
            timeout,
        }
    }

    /// A budget that allows exactly one immediate check and no sleeping.
    pub fn immediate() -> Self {
        Self {
            interval: Duration::from_millis(1),
            timeout: Duration::ZERO,
        }
    }
}

/// Deadline tracker for a bounded poll loop.
///
/// Usage: check the condition, then `tick()` — which sleeps one interval and
/// reports whether budget remains. The first condition check therefore always
/// happens without any sleep.
pub struct Poller {
    interval: Duration,
    deadline: Instant,
    rounds: u32,
}

impl Poller {
    pub fn start(budget: PollBudget) -> Self {
        Self {
            interval: budget.interval,
            deadline: Instant::now() + budget.timeout,
            rounds: 0,
        }
    }

    /// Number of completed sleep rounds.
    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Sleep one interval (clamped to the remaining budget). Returns `false`
    /// without sleeping once the deadline has passed, so a
    /// `loop { check; if !tick() { break } }` shape always gets one final
    /// check after the last sleep and never sleeps past the deadline.
    pub async fn tick(&mut self) -> bool {
        let now = Instant::now();
        if now >= self.deadline {
            return false;
        }
        let remaining = self.deadline - now;
        tokio::time::sleep(self.interval.min(remaining)).await;
        self.rounds += 1;
        true
    }
}
