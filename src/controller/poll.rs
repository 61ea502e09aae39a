//! Bounded fixed-interval polling.
//!
//! Used by every wait in the lifecycle: public address, database readiness, and the
//! front page lookup. The probe decides per attempt whether to stop, keep waiting, or
//! abort with an error.

use std::future::Future;
use std::time::Duration;
use tracing::trace;

/// Interval and attempt budget of one polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollPolicy {
    pub const fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    pub const fn with_interval(self, interval: Duration) -> Self {
        Self { interval, ..self }
    }
}

/// Position of the current probe within the budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    /// 1-based attempt number.
    pub number: u32,
    /// Attempts left including this one.
    pub remaining: u32,
}

/// Runs `probe` until it yields a value, the budget is spent, or it fails.
///
/// - `Ok(Some(v))` stops with `Ok(Some(v))`.
/// - `Ok(None)` sleeps `policy.interval` and tries again; after the last attempt the
///   loop returns `Ok(None)` without sleeping.
/// - `Err(e)` stops immediately with `Err(e)`.
pub async fn poll<T, E, F, Fut>(policy: PollPolicy, mut probe: F) -> Result<Option<T>, E>
where
    F: FnMut(Attempt) -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    for number in 1..=policy.max_attempts {
        let attempt = Attempt {
            number,
            remaining: policy.max_attempts - number + 1,
        };

        if let Some(value) = probe(attempt).await? {
            return Ok(Some(value));
        }

        trace!(attempt = number, max = policy.max_attempts, "Poll miss");
        if number < policy.max_attempts && !policy.interval.is_zero() {
            tokio::time::sleep(policy.interval).await;
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    #[tokio::test]
    async fn stops_at_first_hit() {
        let mut seen = Vec::new();
        let result: Result<Option<u32>, Infallible> =
            poll(PollPolicy::new(Duration::ZERO, 10), |a| {
                seen.push(a.number);
                async move { Ok((a.number == 3).then_some(a.number)) }
            })
            .await;

        assert_eq!(result, Ok(Some(3)));
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn exhausts_budget() {
        let mut calls = 0;
        let result: Result<Option<()>, Infallible> =
            poll(PollPolicy::new(Duration::ZERO, 4), |a| {
                calls += 1;
                assert_eq!(a.number + a.remaining, 5);
                async { Ok(None) }
            })
            .await;

        assert_eq!(result, Ok(None));
        assert_eq!(calls, 4);
    }

    #[tokio::test]
    async fn error_aborts_immediately() {
        let mut calls = 0;
        let result: Result<Option<()>, &str> = poll(PollPolicy::new(Duration::ZERO, 10), |_| {
            calls += 1;
            async { Err("lookup failed") }
        })
        .await;

        assert_eq!(result, Err("lookup failed"));
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn waits_between_attempts() {
        let start = tokio::time::Instant::now();
        let _: Result<Option<()>, Infallible> =
            poll(PollPolicy::new(Duration::from_millis(20), 3), |_| async { Ok(None) }).await;
        assert!(start.elapsed() >= Duration::from_millis(40));
    }
}
