//! Logging-based progress handler

use super::{ProgressEvent, ProgressHandler};
use tracing::{debug, error, info};

/// Handler that logs progress events using tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl ProgressHandler for LoggingHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Started { mode, project_name } => {
                info!(mode = %mode, project = %project_name, "Starting analysis run");
            }
            ProgressEvent::StructureOpened {
                structure_id,
                project_id,
            } => {
                info!(
                    structure_id = %structure_id,
                    project_id = %project_id,
                    "Analysis structure opened"
                );
            }
            ProgressEvent::DiscoveryComplete {
                package_managers,
                candidates,
                excluded,
            } => {
                info!(
                    package_managers,
                    candidates,
                    excluded,
                    "Manifest discovery complete"
                );
            }
            ProgressEvent::ManifestProcessed { path, outcome } => {
                debug!(path = %path, outcome, "Manifest processed");
            }
            ProgressEvent::UploadComplete {
                accepted,
                total,
                duration,
            } => {
                info!(
                    accepted,
                    total,
                    duration_ms = duration.as_millis(),
                    "Manifests uploaded"
                );
            }
            ProgressEvent::AnalysisStarted { report_url } => {
                info!(report_url = %report_url, "Analysis started, the report will be available at the report URL");
            }
            ProgressEvent::HandoffWritten { path } => {
                info!(path = %path, "Async analysis token written");
            }
            ProgressEvent::HandoffRead { path } => {
                info!(path = %path, "Async analysis token read");
            }
            ProgressEvent::StatusPolled {
                attempt,
                status,
                elapsed,
            } => {
                info!(
                    attempt,
                    status = %status,
                    elapsed_secs = elapsed.as_secs(),
                    "Analysis status"
                );
            }
            ProgressEvent::Completed { total_time } => {
                info!(
                    total_time_ms = total_time.as_millis(),
                    "Analysis run complete"
                );
            }
            ProgressEvent::Failed { error } => {
                error!(error = %error, "Analysis run failed");
            }
        }
    }
}
