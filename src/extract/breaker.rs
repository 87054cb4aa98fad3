//! Circuit breaker for the column-lineage batch operation.
//!
//! Repeated batch failures usually mean the provider is rate-limiting or
//! down; continuing to hammer it wastes the retry budget of every
//! remaining batch. The breaker is an explicit state machine owned by the
//! caller and shared across all files of a run, so failures accumulate
//! process-wide.

use std::time::{Duration, Instant};

use tracing::{info, warn};

/// Breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Attempts flow through; failures are counted.
    Closed,
    /// Attempts are refused until the cooldown elapses.
    Open,
}

/// Consecutive-failure circuit breaker.
///
/// Closed → Open after `failure_threshold` consecutive failures. While
/// open, [`CircuitBreaker::try_acquire`] refuses without a call until
/// `cooldown` has elapsed since the last failure; the first check after
/// that closes the breaker and resets the count, so the next attempt runs
/// against a clean slate.
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    cooldown: Duration,
    consecutive_failures: u32,
    last_failure: Option<Instant>,
    state: BreakerState,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            failure_threshold,
            cooldown,
            consecutive_failures: 0,
            last_failure: None,
            state: BreakerState::Closed,
        }
    }

    /// Whether an attempt may proceed right now.
    ///
    /// Transitions Open → Closed (with the failure count reset) once the
    /// cooldown has elapsed.
    pub fn try_acquire(&mut self) -> bool {
        match self.state {
            BreakerState::Closed => true,
            BreakerState::Open => {
                let cooled_down = self
                    .last_failure
                    .map(|at| at.elapsed() >= self.cooldown)
                    .unwrap_or(true);
                if cooled_down {
                    info!("circuit breaker cooldown elapsed, closing");
                    self.state = BreakerState::Closed;
                    self.consecutive_failures = 0;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record a failed attempt; opens the breaker at the threshold.
    pub fn record_failure(&mut self) {
        self.consecutive_failures += 1;
        self.last_failure = Some(Instant::now());
        if self.state == BreakerState::Closed
            && self.consecutive_failures >= self.failure_threshold
        {
            warn!(
                failures = self.consecutive_failures,
                "circuit breaker opened"
            );
            self.state = BreakerState::Open;
        }
    }

    /// Record a successful attempt, resetting the failure count.
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.last_failure = None;
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}
