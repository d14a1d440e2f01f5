use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryStrategy {
    Linear,
    Exponential,
}

/// Bounded retry for delegated lookups.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    strategy: RetryStrategy,
    max_attempts: usize,
    base_delay: Duration,
    max_delay: Option<Duration>,
    jitter_fraction: f64,
}

impl RetryPolicy {
    pub fn linear(max_attempts: usize, base_delay: Duration) -> Self {
        Self::new(RetryStrategy::Linear, max_attempts, base_delay)
    }

    pub fn exponential(max_attempts: usize, base_delay: Duration) -> Self {
        Self::new(RetryStrategy::Exponential, max_attempts, base_delay)
    }

    /// One attempt, no delay.
    pub fn none() -> Self {
        Self::new(RetryStrategy::Linear, 1, Duration::ZERO)
    }

    pub fn new(strategy: RetryStrategy, max_attempts: usize, base_delay: Duration) -> Self {
        Self {
            strategy,
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: None,
            jitter_fraction: 0.0,
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = if max_delay.is_zero() {
            None
        } else {
            Some(max_delay)
        };
        self
    }

    pub fn with_jitter(mut self, fraction: f64) -> Self {
        self.jitter_fraction = fraction.clamp(0.0, 1.0);
        self
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn handle(&self) -> RetryHandle {
        RetryHandle {
            policy: self.clone(),
            attempts: 1,
        }
    }

    /// Runs `op` until it succeeds, fails with a non-transient error, or the
    /// attempts run out. `sleep` receives each backoff delay.
    pub fn run<T, E, F, P, S>(&self, mut op: F, is_transient: P, mut sleep: S) -> Result<T, E>
    where
        F: FnMut(usize) -> Result<T, E>,
        P: Fn(&E) -> bool,
        S: FnMut(Duration),
    {
        let mut handle = self.handle();
        loop {
            match op(handle.attempts()) {
                Ok(value) => return Ok(value),
                Err(err) if is_transient(&err) => match handle.next_delay() {
                    Some(delay) => sleep(delay),
                    None => return Err(err),
                },
                Err(err) => return Err(err),
            }
        }
    }

    fn delay_for_attempt(&self, attempt: usize) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }
        let raw = match self.strategy {
            RetryStrategy::Linear => self.base_delay.saturating_mul(attempt as u32),
            RetryStrategy::Exponential => {
                let shift = attempt.saturating_sub(1).min(31) as u32;
                self.base_delay.saturating_mul(1u32 << shift)
            }
        };
        let bounded = match self.max_delay {
            Some(max) => raw.min(max),
            None => raw,
        };
        if bounded.is_zero() || self.jitter_fraction <= 0.0 {
            return bounded;
        }
        let factor = thread_rng().gen_range((1.0 - self.jitter_fraction)..=(1.0 + self.jitter_fraction));
        Duration::from_secs_f64((bounded.as_secs_f64() * factor).max(0.0))
    }
}

pub struct RetryHandle {
    policy: RetryPolicy,
    attempts: usize,
}

impl RetryHandle {
    /// Delay before the next attempt, or `None` once attempts are exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= self.policy.max_attempts {
            return None;
        }
        let delay = self.policy.delay_for_attempt(self.attempts);
        self.attempts += 1;
        Some(delay)
    }

    /// Attempts started so far, counting the current one.
    pub fn attempts(&self) -> usize {
        self.attempts
    }
}
