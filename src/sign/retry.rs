use std::{
    thread,
    time::{Duration, Instant},
};

use crate::{sign::FrameSink, Error, Result};

/// Bounded retry for a sign frame: fixed backoff between attempts, giving
/// up once elapsed wall time since the first attempt exceeds the bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub backoff: Duration,
    pub max_elapsed: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            backoff: Duration::from_secs(10),
            max_elapsed: Duration::from_secs(300),
        }
    }
}

/// Returns the attempt count on success, or the last error once the time
/// budget is spent. The caller logs and defers to the next cycle; this
/// never blocks past `max_elapsed` plus one backoff.
pub fn send_with_retry<S: FrameSink + ?Sized>(
    sink: &mut S,
    frame: &[u8],
    policy: &RetryPolicy,
) -> std::result::Result<u32, Error> {
    let start = Instant::now();
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        match sink.write_frame(frame) {
            Ok(()) => return Ok(attempts),
            Err(err) => {
                if start.elapsed() > policy.max_elapsed {
                    return Err(err);
                }
                thread::sleep(policy.backoff);
            }
        }
    }
}

/// Fixed-attempt retry for outbound HTTP calls. The last error propagates
/// to the caller; cached state is never touched here.
pub fn with_attempts<T, F>(attempts: u32, pause: Duration, mut op: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let attempts = attempts.max(1);
    let mut last = None;
    for attempt in 0..attempts {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) => {
                last = Some(err);
                if attempt + 1 < attempts {
                    thread::sleep(pause);
                }
            }
        }
    }
    Err(last.expect("at least one attempt was made"))
}
