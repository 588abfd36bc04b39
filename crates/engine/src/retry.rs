use std::time::Duration;

/// Strategy for computing delay between dispatch retry attempts.
///
/// Each variant defines a different backoff curve. All variants clamp the
/// computed delay so it never exceeds the configured maximum. The engine
/// never sleeps on these delays: they become due times on the durable
/// scheduler, so a restart resumes the wait instead of losing it.
#[derive(Debug, Clone)]
pub enum RetryStrategy {
    /// Exponential backoff: `base * multiplier^attempt`.
    Exponential {
        /// Initial delay before the first retry.
        base: Duration,
        /// Upper bound on the computed delay.
        max: Duration,
        /// Factor applied on each successive attempt.
        multiplier: f64,
    },
    /// Constant delay between every retry attempt.
    Constant {
        /// Fixed delay duration.
        delay: Duration,
    },
}

impl RetryStrategy {
    /// Compute the delay duration for the given zero-based `attempt` number.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self {
            Self::Exponential {
                base,
                max,
                multiplier,
            } => {
                // In practice `attempt` is a small retry count (< 100), so
                // wrapping from u32 to i32 cannot occur.
                #[allow(clippy::cast_possible_wrap)]
                let raw = base.as_secs_f64() * multiplier.powi(attempt as i32);
                let clamped = raw.min(max.as_secs_f64());
                Duration::from_secs_f64(clamped)
            }
            Self::Constant { delay } => *delay,
        }
    }
}

impl Default for RetryStrategy {
    /// One minute doubling per attempt, capped at an hour.
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_secs(60),
            max: Duration::from_secs(3600),
            multiplier: 2.0,
        }
    }
}
