//! Retry and circuit breaking beneath every registry request.
//!
//! [`ResilientTransport`] wraps any [`HttpTransport`]. Transient failures
//! (transport errors, `408`, `429`, `5xx`) are retried with exponential
//! backoff; other statuses are returned to the caller untouched.
//!
//! The circuit breaker records failures per host. Once `max_errors`
//! failures fall inside the last `age`, requests to that host are rejected
//! without touching the network until enough of them age out.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::transport::{HttpRequest, HttpResponse, HttpTransport, TransportError};

/// Attempts made by the default retry strategy, including the first.
const DEFAULT_MAX_ATTEMPTS: u32 = 4;

/// Base delay between retries (doubles each attempt: 200ms, 400ms, 800ms).
const DEFAULT_BASE_DELAY_MS: u64 = 200;

const DEFAULT_MAX_HOST_ERRORS: usize = 50;
const DEFAULT_ERROR_AGE_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStrategy {
    /// Every request is attempted once.
    None,
    /// Up to `max_attempts` attempts, sleeping `base_delay * 2^n` before
    /// attempt `n + 1`.
    ExponentialBackoff {
        max_attempts: u32,
        base_delay: Duration,
    },
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self::ExponentialBackoff {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
        }
    }
}

impl RetryStrategy {
    fn max_attempts(self) -> u32 {
        match self {
            Self::None => 1,
            Self::ExponentialBackoff { max_attempts, .. } => max_attempts.max(1),
        }
    }

    fn delay(self, attempt: u32) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::ExponentialBackoff { base_delay, .. } => {
                base_delay.saturating_mul(2u32.saturating_pow(attempt))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitBreakerStrategy {
    None,
    /// Open the circuit for a host once `max_errors` failures occurred
    /// within `age`.
    HostErrors { max_errors: usize, age: Duration },
}

impl Default for CircuitBreakerStrategy {
    fn default() -> Self {
        Self::HostErrors {
            max_errors: DEFAULT_MAX_HOST_ERRORS,
            age: Duration::from_secs(DEFAULT_ERROR_AGE_SECS),
        }
    }
}

/// Statuses worth another attempt.
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429) || (500..600).contains(&status)
}

/// Statuses that count against a host's circuit.
fn is_host_failure(status: u16) -> bool {
    (500..600).contains(&status)
}

/// An [`HttpTransport`] with retry and circuit breaking applied.
pub struct ResilientTransport<T> {
    inner: T,
    retry: RetryStrategy,
    circuit_breaker: CircuitBreakerStrategy,
    host_errors: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl<T> std::fmt::Debug for ResilientTransport<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientTransport")
            .field("retry", &self.retry)
            .field("circuit_breaker", &self.circuit_breaker)
            .finish_non_exhaustive()
    }
}

impl<T: HttpTransport> ResilientTransport<T> {
    pub fn new(inner: T, retry: RetryStrategy, circuit_breaker: CircuitBreakerStrategy) -> Self {
        Self {
            inner,
            retry,
            circuit_breaker,
            host_errors: Mutex::new(HashMap::new()),
        }
    }

    fn check_circuit(&self, host: &str) -> Result<(), TransportError> {
        let CircuitBreakerStrategy::HostErrors { max_errors, age } = self.circuit_breaker else {
            return Ok(());
        };
        let mut hosts = self.host_errors.lock();
        let Some(errors) = hosts.get_mut(host) else {
            return Ok(());
        };
        let now = Instant::now();
        while errors
            .front()
            .is_some_and(|at| now.duration_since(*at) > age)
        {
            errors.pop_front();
        }
        if errors.is_empty() {
            hosts.remove(host);
            return Ok(());
        }
        if errors.len() >= max_errors {
            return Err(TransportError::CircuitOpen {
                host: host.to_string(),
            });
        }
        Ok(())
    }

    fn record_failure(&self, host: &str) {
        let CircuitBreakerStrategy::HostErrors { max_errors, .. } = self.circuit_breaker else {
            return;
        };
        let mut hosts = self.host_errors.lock();
        let errors = hosts.entry(host.to_string()).or_default();
        errors.push_back(Instant::now());
        while errors.len() > max_errors {
            errors.pop_front();
        }
        if errors.len() == max_errors {
            tracing::warn!(host, max_errors, "circuit breaker opened");
        }
    }
}

#[async_trait]
impl<T: HttpTransport> HttpTransport for ResilientTransport<T> {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let host = request.host();
        let max_attempts = self.retry.max_attempts();
        let mut attempt = 0;

        loop {
            self.check_circuit(&host)?;
            attempt += 1;

            let outcome = self.inner.execute(request.clone()).await;
            let retryable = match &outcome {
                Ok(response) => {
                    if is_host_failure(response.status) {
                        self.record_failure(&host);
                    }
                    is_retryable_status(response.status)
                }
                Err(_) => {
                    self.record_failure(&host);
                    true
                }
            };

            if !retryable || attempt >= max_attempts {
                return outcome;
            }

            let delay = self.retry.delay(attempt - 1);
            match &outcome {
                Ok(response) => tracing::warn!(
                    attempt,
                    max_attempts,
                    status = response.status,
                    url = %request.url,
                    "registry request returned a retryable status, retrying in {delay:?}"
                ),
                Err(e) => tracing::warn!(
                    attempt,
                    max_attempts,
                    url = %request.url,
                    "registry request failed, retrying in {delay:?}: {e}"
                ),
            }
            tokio::time::sleep(delay).await;
        }
    }
}
