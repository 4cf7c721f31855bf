//! Bounded retry with exponential backoff for dependencies that are
//! populated by another task.

use ruta_core::{DependencyError, RetrySettings};

/// Result of waiting on a dependency check.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryOutcome<T> {
    Ready { value: T, attempts: u32 },
    Exhausted { missing: Vec<String>, attempts: u32 },
}

impl<T> RetryOutcome<T> {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Ready { attempts, .. } | Self::Exhausted { attempts, .. } => *attempts,
        }
    }

    pub fn into_result(self) -> Result<T, DependencyError> {
        match self {
            Self::Ready { value, .. } => Ok(value),
            Self::Exhausted { missing, attempts } => {
                Err(DependencyError::NotReady { missing, attempts })
            }
        }
    }
}

/// Run `check` until it succeeds or `settings.max_retries` retries are used.
///
/// `check` returns the names of the dependencies still missing. Between
/// attempts the task sleeps `settings.delay_for(retry)`, so with the default
/// settings a check that never succeeds runs 4 times over 1s + 2s + 4s.
pub async fn retry_until_ready<T, F>(settings: &RetrySettings, mut check: F) -> RetryOutcome<T>
where
    F: FnMut() -> Result<T, Vec<String>>,
{
    let mut retry = 0u32;
    loop {
        let attempts = retry + 1;
        match check() {
            Ok(value) => return RetryOutcome::Ready { value, attempts },
            Err(missing) if retry >= settings.max_retries => {
                return RetryOutcome::Exhausted { missing, attempts };
            }
            Err(missing) => {
                let delay = settings.delay_for(retry);
                tracing::warn!(
                    attempt = attempts,
                    max_retries = settings.max_retries,
                    missing = ?missing,
                    delay_ms = delay.as_millis() as u64,
                    "Dependencies not ready, backing off"
                );
                tokio::time::sleep(delay).await;
                retry += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_after_max_retries_with_capped_backoff() {
        let settings = RetrySettings::default();
        let started = Instant::now();
        let mut checks = 0;

        let outcome: RetryOutcome<()> = retry_until_ready(&settings, || {
            checks += 1;
            Err(vec!["primary/clients".to_string()])
        })
        .await;

        assert_eq!(checks, 4);
        assert_eq!(outcome.attempts(), 4);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(7000), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(7100), "{elapsed:?}");

        let err = outcome.into_result().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Dependencies not ready after 4 attempts: missing primary/clients"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_on_later_attempt() {
        let settings = RetrySettings {
            max_retries: 5,
            base_delay_ms: 100,
            max_delay_ms: 150,
        };
        let started = Instant::now();
        let mut checks = 0;

        let outcome = retry_until_ready(&settings, || {
            checks += 1;
            if checks < 3 {
                Err(vec!["primary/deliveries".to_string()])
            } else {
                Ok(checks)
            }
        })
        .await;

        assert_eq!(outcome, RetryOutcome::Ready { value: 3, attempts: 3 });
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(250), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(300), "{elapsed:?}");
    }

    #[tokio::test]
    async fn test_zero_retries_checks_once() {
        let settings = RetrySettings {
            max_retries: 0,
            ..RetrySettings::default()
        };
        let outcome: RetryOutcome<u8> =
            retry_until_ready(&settings, || Err(vec!["x".into()])).await;
        assert_eq!(outcome.attempts(), 1);
    }
}
