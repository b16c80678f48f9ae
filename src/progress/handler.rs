//! Progress handler trait and events

use crate::config::Mode;
use std::time::Duration;

/// Events emitted as an analysis run moves through its states
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Run started
    Started { mode: Mode, project_name: String },

    /// Structure record created
    StructureOpened {
        structure_id: String,
        project_id: String,
    },

    /// Manifest patterns fetched and the source tree matched against them
    DiscoveryComplete {
        package_managers: usize,
        candidates: usize,
        excluded: usize,
    },

    /// One candidate manifest handled by the upload pipeline
    ManifestProcessed { path: String, outcome: &'static str },

    /// Every candidate handled
    UploadComplete {
        accepted: usize,
        total: usize,
        duration: Duration,
    },

    /// Analysis started remotely
    AnalysisStarted { report_url: String },

    /// Resumption token persisted for a later invocation
    HandoffWritten { path: String },

    /// Resumption token loaded from a previous invocation
    HandoffRead { path: String },

    /// One status fetch answered
    StatusPolled {
        attempt: usize,
        status: String,
        elapsed: Duration,
    },

    /// Run completed successfully
    Completed { total_time: Duration },

    /// Run failed
    Failed { error: String },
}

/// Trait for handling progress events during a run
pub trait ProgressHandler: Send + Sync {
    /// Called when a progress event occurs
    fn on_progress(&self, event: &ProgressEvent);
}

/// No-op handler that ignores all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpHandler;

impl ProgressHandler for NoOpHandler {
    fn on_progress(&self, _event: &ProgressEvent) {
        // Intentionally empty
    }
}
