//! Synchronous bounded retry with a fixed delay between attempts.

use std::time::Duration;

use thiserror::Error;
use tracing::trace;

/// Something that can block the current thread for a while. Split out so
/// tests can run the retry loop against a simulated clock.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) { std::thread::sleep(duration) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

/// CoreWLAN's setPower:error: intermittently fails while the driver is busy.
pub const WIFI_POWER_RETRY: RetryPolicy = RetryPolicy {
    max_attempts: 10,
    delay: Duration::from_millis(100),
};

#[derive(Debug, Error)]
pub enum RetryError<E> {
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },
    #[error("attempt {attempt} failed permanently: {error}")]
    Fatal { attempt: u32, error: E },
}

impl RetryPolicy {
    /// Runs `action` until it succeeds, fails with an error `is_transient`
    /// rejects, or `max_attempts` attempts have failed. Every transient failure
    /// is followed by `delay`, including the last one. At least one attempt is
    /// always made.
    pub fn run<T, E>(
        &self,
        sleeper: &impl Sleeper,
        mut action: impl FnMut(u32) -> Result<T, E>,
        is_transient: impl Fn(&E) -> bool,
    ) -> Result<T, RetryError<E>> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match action(attempt) {
                Ok(value) => return Ok(value),
                Err(error) if !is_transient(&error) => {
                    return Err(RetryError::Fatal { attempt, error });
                }
                Err(error) => {
                    trace!(attempt, max_attempts = self.max_attempts, "attempt failed");
                    sleeper.sleep(self.delay);
                    if attempt >= self.max_attempts {
                        return Err(RetryError::Exhausted { attempts: attempt, last: error });
                    }
                }
            }
        }
    }
}
