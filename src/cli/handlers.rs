use crate::api::HttpAnalysisApi;
use crate::cli::commands::CliArgs;
use crate::config::{ConfigError, ContextSources, OnFailure};
use crate::poller::SystemClock;
use crate::progress::LoggingHandler;
use crate::saga::{self, AnalysisSaga, SagaOutcome};
use std::fmt::Display;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Runs one invocation end to end and returns the process exit code
pub fn handle_run(args: &CliArgs) -> i32 {
    let on_failure = args.on_failure;

    let sources = args.context_overrides().or(ContextSources::from_env());
    let context = match sources.validate(args.metadata()) {
        Ok(context) => context,
        Err(e) => return config_failure(&e, on_failure),
    };
    let settings = match args.run_settings() {
        Ok(settings) => settings,
        Err(e) => return config_failure(&e, on_failure),
    };
    debug!(?context, ?settings, "Configuration resolved");

    let api = match HttpAnalysisApi::new(Duration::from_secs(args.request_timeout)) {
        Ok(api) => api,
        Err(e) => return failure(&format!("Failed to create HTTP client: {}", e), on_failure),
    };

    let mut saga = AnalysisSaga::new(&api, &context, &settings, &SystemClock, &LoggingHandler);
    let result = saga.run();

    match &result {
        Ok(SagaOutcome::Finished { report_url, poll }) => {
            info!(
                attempts = poll.attempts,
                elapsed_secs = poll.elapsed.as_secs(),
                "Analysis finished"
            );
            if let Some(url) = report_url {
                info!(report_url = %url, "View the report");
            }
        }
        Ok(SagaOutcome::HandoffWritten { path }) => {
            info!(
                path = %path.display(),
                "Analysis started; run again with mode async_result to collect the result"
            );
        }
        // The saga already reported the error through its progress handler
        Err(_) => return disposition(on_failure),
    }

    saga::exit_code(&result, on_failure)
}

fn config_failure(err: &ConfigError, on_failure: OnFailure) -> i32 {
    if let ConfigError::MissingFields(fields) = err {
        for field in fields {
            if let Some(hint) = field.hint() {
                warn!("{}", hint);
            }
        }
    }
    failure(err, on_failure)
}

fn failure(err: &dyn Display, on_failure: OnFailure) -> i32 {
    error!("{}", err);
    disposition(on_failure)
}

fn disposition(on_failure: OnFailure) -> i32 {
    match on_failure {
        OnFailure::FailTheBuild => error!("Failing the build"),
        OnFailure::ContinueOnFailure => warn!("Continuing the build despite the failure"),
    }
    on_failure.failure_exit_code()
}
