//! Bounded retry with a fixed delay.
//!
//! VirtualBox sometimes cannot find or lock a VM configuration right after
//! the machine stops, so commands issued at that point are retried a few
//! times with a short constant pause. There is no backoff growth and no
//! jitter.

use std::fmt::Display;
use std::thread;
use std::time::Duration;

/// Default number of attempts, including the first.
pub const DEFAULT_MAX_ATTEMPTS: usize = 5;

/// Default pause between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(200);

/// How often and how patiently to retry an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum attempts, including the first.
    pub max_attempts: usize,
    /// Pause after each failed attempt that is followed by another one.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Create a retry policy.
    pub fn new(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Run `op` until it succeeds or the attempts run out, sleeping the
    /// calling thread between attempts.
    ///
    /// `op` receives the 1-based attempt number. On exhaustion the error of
    /// the last attempt is returned.
    pub fn run<T, E, F>(&self, op: F) -> Result<T, E>
    where
        E: Display,
        F: FnMut(usize) -> Result<T, E>,
    {
        self.run_with_sleep(op, thread::sleep)
    }

    /// Like [`run`](Self::run), with the pause between attempts delegated to
    /// `sleep`.
    pub fn run_with_sleep<T, E, F, S>(&self, mut op: F, mut sleep: S) -> Result<T, E>
    where
        E: Display,
        F: FnMut(usize) -> Result<T, E>,
        S: FnMut(Duration),
    {
        // Zero attempts would leave no error to report.
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(err) if attempt >= attempts => {
                    tracing::debug!(attempt, %err, "giving up");
                    return Err(err);
                }
                Err(err) => {
                    tracing::debug!(attempt, max_attempts = attempts, %err, "attempt failed, retrying");
                    sleep(self.delay);
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.delay, Duration::from_millis(200));
    }

    #[test]
    fn test_first_success_does_not_sleep() {
        let mut sleeps = Vec::new();
        let result: Result<&str, String> = RetryPolicy::default()
            .run_with_sleep(|_| Ok("done"), |d| sleeps.push(d));
        assert_eq!(result, Ok("done"));
        assert!(sleeps.is_empty());
    }

    #[test]
    fn test_stops_on_success() {
        let mut calls = 0;
        let mut sleeps = Vec::new();
        let result = RetryPolicy::default().run_with_sleep(
            |attempt| {
                calls += 1;
                if attempt == 3 {
                    Ok(attempt)
                } else {
                    Err(format!("attempt {attempt} failed"))
                }
            },
            |d| sleeps.push(d),
        );
        assert_eq!(result, Ok(3));
        assert_eq!(calls, 3);
        assert_eq!(sleeps, vec![Duration::from_millis(200); 2]);
    }

    #[test]
    fn test_exhaustion_returns_last_error() {
        let mut calls = 0;
        let mut sleeps = Vec::new();
        let result: Result<(), String> = RetryPolicy::default().run_with_sleep(
            |attempt| {
                calls += 1;
                Err(format!("attempt {attempt} failed"))
            },
            |d| sleeps.push(d),
        );
        assert_eq!(result, Err("attempt 5 failed".to_string()));
        assert_eq!(calls, 5);
        // Only between attempts, never after the last one.
        assert_eq!(sleeps.len(), 4);
    }

    #[test]
    fn test_zero_attempts_still_tries_once() {
        let mut calls = 0;
        let result: Result<(), String> = RetryPolicy::new(0, Duration::ZERO).run(|_| {
            calls += 1;
            Err("nope".to_string())
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_run_sleeps_for_real() {
        let policy = RetryPolicy::new(3, Duration::from_millis(20));
        let start = std::time::Instant::now();
        let result: Result<(), String> = policy.run(|_| Err("busy".to_string()));
        assert!(result.is_err());
        assert!(start.elapsed() >= Duration::from_millis(40));
    }
}
