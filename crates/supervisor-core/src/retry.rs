use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Indicates whether an error should be retried or treated as fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    Retry,
    Stop,
}

/// Result of running an operation under the retry policy.
#[derive(Debug)]
pub enum RetryError<E> {
    /// The error was considered fatal and should bubble up immediately.
    Fatal(E),
    /// The error was retryable, but the configured attempts were exhausted.
    AttemptsExceeded(E),
    /// The cancellation token fired between attempts.
    Cancelled,
}

/// Fixed-interval polling with a bounded number of attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub interval: Duration,
}

impl RetryPolicy {
    /// At least one attempt is always made.
    pub fn fixed(interval: Duration, max_attempts: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval,
        }
    }

    /// Longest time spent sleeping before giving up.
    pub fn total_delay(&self) -> Duration {
        self.interval
            .saturating_mul(self.max_attempts.saturating_sub(1).try_into().unwrap_or(u32::MAX))
    }

    /// Executes the operation until it succeeds, fails fatally, runs out of
    /// attempts or `cancel` fires.
    pub async fn run<F, Fut, T, E, Classifier>(
        &self,
        cancel: &CancellationToken,
        mut op: F,
        classify: Classifier,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        Classifier: Fn(&E) -> RetryDisposition,
    {
        let mut attempt = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled);
            }

            match op().await {
                Ok(result) => return Ok(result),
                Err(err) => match classify(&err) {
                    RetryDisposition::Stop => return Err(RetryError::Fatal(err)),
                    RetryDisposition::Retry => {
                        if attempt + 1 >= self.max_attempts {
                            return Err(RetryError::AttemptsExceeded(err));
                        }

                        tokio::select! {
                            _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                            _ = sleep(self.interval) => {}
                        }
                        attempt += 1;
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn total_delay_counts_sleeps_between_attempts() {
        let policy = RetryPolicy::fixed(Duration::from_secs(1), 4);
        assert_eq!(policy.total_delay(), Duration::from_secs(3));
        assert_eq!(RetryPolicy::fixed(Duration::from_secs(1), 0).max_attempts, 1);
    }

    #[tokio::test]
    async fn stops_after_max_attempts() {
        let calls = AtomicUsize::new(0);
        let policy = RetryPolicy::fixed(Duration::from_millis(1), 3);
        let result: Result<(), _> = policy
            .run(
                &CancellationToken::new(),
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err::<(), _>("not yet") }
                },
                |_| RetryDisposition::Retry,
            )
            .await;

        assert!(matches!(result, Err(RetryError::AttemptsExceeded("not yet"))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fatal_errors_are_not_retried() {
        let calls = AtomicUsize::new(0);
        let policy = RetryPolicy::fixed(Duration::from_millis(1), 10);
        let result: Result<(), _> = policy
            .run(
                &CancellationToken::new(),
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err::<(), _>("broken") }
                },
                |_| RetryDisposition::Stop,
            )
            .await;

        assert!(matches!(result, Err(RetryError::Fatal("broken"))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_interrupts_the_wait() {
        let cancel = CancellationToken::new();
        let policy = RetryPolicy::fixed(Duration::from_secs(3600), 10);

        let trigger = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result: Result<(), _> = policy
            .run(
                &cancel,
                || async { Err::<(), _>(()) },
                |_| RetryDisposition::Retry,
            )
            .await;

        assert!(matches!(result, Err(RetryError::Cancelled)));
    }
}
