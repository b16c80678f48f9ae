//! Result polling
//!
//! Raw status strings are turned into an [`AnalysisStatus`] by [`classify`]
//! and nowhere else. The loop has no attempt cap: it ends on a terminal
//! status, a failed fetch, or once the wait budget is spent.

use crate::api::{AnalysisApi, ApiError};
use crate::config::{AnalysisContext, MIN_POLLING_INTERVAL_SECS};
use crate::progress::{ProgressEvent, ProgressHandler};
use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    Unspecified,
    Violation,
    Vulnerability,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FailureReason::Unspecified => "the analysis failed",
            FailureReason::Violation => "policy violations were found",
            FailureReason::Vulnerability => "vulnerabilities were found",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisStatus {
    Running,
    /// The vendor reported an error that may clear on the next fetch
    TransientError,
    Finished,
    Failed { reason: FailureReason },
}

impl AnalysisStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AnalysisStatus::Finished | AnalysisStatus::Failed { .. })
    }
}

/// Maps a raw vendor status onto [`AnalysisStatus`], ignoring case
pub fn classify(raw: &str) -> AnalysisStatus {
    let status = raw.trim().to_lowercase();

    if status == "finished" {
        AnalysisStatus::Finished
    } else if status.starts_with("failed") {
        let reason = if status.contains("violation") {
            FailureReason::Violation
        } else if status.contains("vulnerabilit") {
            FailureReason::Vulnerability
        } else {
            FailureReason::Unspecified
        };
        AnalysisStatus::Failed { reason }
    } else if status == "error" {
        AnalysisStatus::TransientError
    } else {
        AnalysisStatus::Running
    }
}

/// Time source for the polling loop
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// Wall clock with real sleeps
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Clock that only advances when slept on
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// Total time slept so far
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        *offset += duration;
    }
}

/// A finished analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSuccess {
    pub attempts: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Error)]
pub enum PollFailure {
    #[error("Analysis Result Max Wait Time Reached ({} seconds) after {attempts} status check(s)", .max_wait.as_secs())]
    MaxWaitReached { max_wait: Duration, attempts: usize },

    #[error("Analysis complete with status '{status}': {reason}")]
    AnalysisFailed {
        reason: FailureReason,
        status: String,
    },

    #[error(transparent)]
    Api(#[from] ApiError),
}

pub struct ResultPoller<'a> {
    api: &'a dyn AnalysisApi,
    context: &'a AnalysisContext,
    clock: &'a dyn Clock,
    progress: &'a dyn ProgressHandler,
    max_wait: Duration,
    interval: Duration,
}

impl<'a> ResultPoller<'a> {
    /// Intervals under the minimum are raised to it
    pub fn new(
        api: &'a dyn AnalysisApi,
        context: &'a AnalysisContext,
        clock: &'a dyn Clock,
        progress: &'a dyn ProgressHandler,
        max_wait: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            api,
            context,
            clock,
            progress,
            max_wait,
            interval: interval.max(Duration::from_secs(MIN_POLLING_INTERVAL_SECS)),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn poll(&self, report_status_url: &str) -> Result<PollSuccess, PollFailure> {
        let started = self.clock.now();
        let mut attempts = 0;

        loop {
            let elapsed = self.clock.now().saturating_duration_since(started);
            if elapsed > self.max_wait {
                return Err(PollFailure::MaxWaitReached {
                    max_wait: self.max_wait,
                    attempts,
                });
            }

            attempts += 1;
            let raw = self.api.analysis_status(self.context, report_status_url)?;
            self.progress.on_progress(&ProgressEvent::StatusPolled {
                attempt: attempts,
                status: raw.clone(),
                elapsed,
            });

            match classify(&raw) {
                AnalysisStatus::Finished => {
                    return Ok(PollSuccess { attempts, elapsed });
                }
                AnalysisStatus::Failed { reason } => {
                    return Err(PollFailure::AnalysisFailed {
                        reason,
                        status: raw,
                    });
                }
                AnalysisStatus::TransientError => {
                    warn!(attempt = attempts, "Analysis status reported an error, retrying");
                }
                AnalysisStatus::Running => {
                    debug!(attempt = attempts, status = %raw, "Analysis still running");
                }
            }

            self.clock.sleep(self.interval);
        }
    }
}
