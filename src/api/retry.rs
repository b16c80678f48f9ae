//! Retry policies for remote calls
//!
//! Two independent policies apply to every request:
//!
//! - [`TransportRetry`] covers failures where no response arrived at all
//!   (connection refused, timeout, truncated body). These are retried
//!   immediately, without backoff, up to a fixed number of attempts.
//! - [`StatusRetry`] covers responses that did arrive. The default is
//!   [`StatusRetry::Never`]: a 403 or 5xx is a decision by the server and is
//!   handed back to the caller untouched.

use super::error::{ApiError, Operation};
use std::fmt::Display;
use tracing::{debug, warn};

pub const DEFAULT_TRANSPORT_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportRetry {
    pub max_attempts: u32,
}

impl Default for TransportRetry {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_TRANSPORT_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusRetry {
    #[default]
    Never,
    /// Resend on 5xx responses, up to `max_attempts` total sends
    ServerErrors { max_attempts: u32 },
}

impl StatusRetry {
    fn should_retry(&self, status: u16, retries_used: u32) -> bool {
        match self {
            StatusRetry::Never => false,
            StatusRetry::ServerErrors { max_attempts } => {
                status >= 500 && retries_used + 1 < *max_attempts
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryPolicy {
    pub transport: TransportRetry,
    pub status: StatusRetry,
}

impl RetryPolicy {
    /// Runs `send` until it yields a response the policy accepts.
    ///
    /// `status_of` reads the HTTP status from a response so the status policy
    /// can be consulted without knowing the response type.
    pub fn execute<R, E, F, S>(
        &self,
        operation: Operation,
        mut send: F,
        status_of: S,
    ) -> Result<R, ApiError>
    where
        E: Display,
        F: FnMut() -> Result<R, E>,
        S: Fn(&R) -> u16,
    {
        let max_transport = self.transport.max_attempts.max(1);
        let mut transport_failures = 0;
        let mut status_retries = 0;

        loop {
            match send() {
                Ok(response) => {
                    let status = status_of(&response);
                    if self.status.should_retry(status, status_retries) {
                        status_retries += 1;
                        warn!(
                            operation = %operation,
                            status,
                            retry = status_retries,
                            "Server error response, resending"
                        );
                        continue;
                    }
                    debug!(operation = %operation, status, "Response received");
                    return Ok(response);
                }
                Err(err) => {
                    transport_failures += 1;
                    warn!(
                        operation = %operation,
                        attempt = transport_failures,
                        max_attempts = max_transport,
                        error = %err,
                        "{} exception occurred",
                        operation
                    );
                    if transport_failures >= max_transport {
                        return Err(ApiError::Transport {
                            operation,
                            attempts: transport_failures,
                            message: err.to_string(),
                        });
                    }
                }
            }
        }
    }
}
