//! soos-ci - CI client for remote dependency-manifest analysis
//!
//! A run opens an analysis structure on the remote service, uploads every
//! dependency manifest found in the source tree, starts the analysis and then
//! either waits for the result or stores a token so a later invocation can
//! collect it.
//!
//! # Example Usage
//!
//! ```no_run
//! use soos_ci::{
//!     AnalysisSaga, CiMetadata, ContextSources, HttpAnalysisApi, LoggingHandler, RunSettings,
//!     SystemClock,
//! };
//! use std::time::Duration;
//!
//! # fn main() -> anyhow::Result<()> {
//! let context = ContextSources::from_env().validate(CiMetadata::default())?;
//! let settings = RunSettings::default();
//! let api = HttpAnalysisApi::new(Duration::from_secs(60))?;
//!
//! let outcome = AnalysisSaga::new(&api, &context, &settings, &SystemClock, &LoggingHandler).run()?;
//! println!("{:?}", outcome);
//! # Ok(())
//! # }
//! ```
//!
//! # Project Structure
//!
//! - [`api`]: remote operations, retry policies, and a scripted mock
//! - [`config`]: run context, settings, and validation
//! - [`discovery`]: manifest matching and exclusion
//! - [`upload`]: per-manifest upload with independent outcomes
//! - [`poller`]: status classification and the polling loop
//! - [`handoff`]: token store shared by the two async modes
//! - [`saga`]: the run state machine

pub mod api;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod handoff;
pub mod poller;
pub mod progress;
pub mod saga;
pub mod upload;
pub mod util;

pub use api::{AnalysisApi, AnalysisHandle, ApiError, HttpAnalysisApi, ManifestPattern, MockAnalysisApi};
pub use config::{AnalysisContext, CiMetadata, ConfigError, ContextSources, Mode, OnFailure, RunSettings};
pub use discovery::{DiscoveredManifest, ExclusionRules, ManifestDiscovery};
pub use handoff::{AsyncResumptionToken, HandoffError, HandoffStore};
pub use poller::{classify, AnalysisStatus, Clock, FailureReason, ManualClock, ResultPoller, SystemClock};
pub use progress::{LoggingHandler, NoOpHandler, ProgressEvent, ProgressHandler};
pub use saga::{AnalysisSaga, SagaFailure, SagaOutcome, SagaState};
pub use upload::{UploadOutcome, UploadPipeline, UploadSummary};
pub use util::{init_from_env, init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
