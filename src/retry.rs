use std::thread;
use std::time::Duration;

pub const DEFAULT_ATTEMPTS: usize = 5;
const BASE_DELAY_MS: u64 = 50;

/// Runs `f` until it succeeds or `max_attempts` is used up.
///
/// Backoff doubles from 50ms: 50, 100, 200, 400, ...
pub fn retry_with_backoff<F, T, E>(mut f: F, max_attempts: usize) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    E: std::fmt::Display,
{
    let mut attempt = 1;
    loop {
        match f() {
            Ok(result) => return Ok(result),
            Err(e) if attempt >= max_attempts => return Err(e),
            Err(e) => {
                let delay = backoff_delay(attempt);
                tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, %e, "Retrying");
                thread::sleep(delay);
                attempt += 1;
            }
        }
    }
}

fn backoff_delay(attempt: usize) -> Duration {
    let shift = attempt.saturating_sub(1).min(16) as u32;
    Duration::from_millis(BASE_DELAY_MS << shift)
}
