//! Analysis lifecycle saga
//!
//! Drives one run through
//! `Idle -> StructureOpened -> ManifestsUploaded -> AnalysisStarted ->
//! {Polling | HandoffWritten} -> Terminal`.
//! Every failure branch ends the run; nothing is retried across states.

use crate::api::{AnalysisApi, AnalysisHandle, ApiError};
use crate::config::{AnalysisContext, ConfigError, Mode, OnFailure, RunSettings};
use crate::discovery::{ExclusionRules, ManifestDiscovery};
use crate::handoff::{AsyncResumptionToken, HandoffError, HandoffStore};
use crate::poller::{Clock, PollFailure, PollSuccess, ResultPoller};
use crate::progress::{ProgressEvent, ProgressHandler};
use crate::upload::UploadPipeline;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SagaState {
    Idle,
    StructureOpened,
    ManifestsUploaded,
    AnalysisStarted,
    Polling,
    HandoffWritten,
    Terminal,
}

/// How a successful run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SagaOutcome {
    /// The analysis reached `finished`
    Finished {
        /// Known only to the process that started the analysis
        report_url: Option<String>,
        poll: PollSuccess,
    },
    /// The token was stored for a later `async_result` run
    HandoffWritten { path: PathBuf },
}

#[derive(Debug, Error)]
pub enum SagaFailure {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Could not create the analysis structure: {0}")]
    OpenStructure(#[source] ApiError),

    #[error("Could not fetch the supported manifest types: {0}")]
    ManifestPatterns(#[source] ApiError),

    #[error("No valid manifests were located ({candidates} candidate file(s) found). Nothing to analyze")]
    NoManifests { candidates: usize },

    #[error("Could not start the analysis: {0}")]
    StartAnalysis(#[source] ApiError),

    #[error(transparent)]
    Handoff(#[from] HandoffError),

    #[error(transparent)]
    Poll(#[from] PollFailure),
}

/// Exit code of a finished run under the given disposition
pub fn exit_code(result: &Result<SagaOutcome, SagaFailure>, on_failure: OnFailure) -> i32 {
    match result {
        Ok(_) => 0,
        Err(_) => on_failure.failure_exit_code(),
    }
}

pub struct AnalysisSaga<'a> {
    api: &'a dyn AnalysisApi,
    context: &'a AnalysisContext,
    settings: &'a RunSettings,
    clock: &'a dyn Clock,
    progress: &'a dyn ProgressHandler,
    state: SagaState,
    history: Vec<SagaState>,
}

impl<'a> AnalysisSaga<'a> {
    pub fn new(
        api: &'a dyn AnalysisApi,
        context: &'a AnalysisContext,
        settings: &'a RunSettings,
        clock: &'a dyn Clock,
        progress: &'a dyn ProgressHandler,
    ) -> Self {
        Self {
            api,
            context,
            settings,
            clock,
            progress,
            state: SagaState::Idle,
            history: Vec::new(),
        }
    }

    pub fn state(&self) -> SagaState {
        self.state
    }

    /// States entered after `Idle`, in order
    pub fn history(&self) -> &[SagaState] {
        &self.history
    }

    /// Runs the saga for the configured mode. Always leaves the saga terminal.
    pub fn run(&mut self) -> Result<SagaOutcome, SagaFailure> {
        let start = Instant::now();
        self.progress.on_progress(&ProgressEvent::Started {
            mode: self.settings.mode,
            project_name: self.context.project_name.clone(),
        });

        let result = match self.settings.mode {
            Mode::RunAndWait => self.run_and_wait(),
            Mode::AsyncInit => self.async_init(),
            Mode::AsyncResult => self.async_result(),
        };
        self.transition(SagaState::Terminal);

        match &result {
            Ok(_) => self.progress.on_progress(&ProgressEvent::Completed {
                total_time: start.elapsed(),
            }),
            Err(err) => self.progress.on_progress(&ProgressEvent::Failed {
                error: err.to_string(),
            }),
        }
        result
    }

    fn run_and_wait(&mut self) -> Result<SagaOutcome, SagaFailure> {
        let handle = self.start_analysis()?;
        let poll = self.poll(&handle.report_status_url)?;
        Ok(SagaOutcome::Finished {
            report_url: Some(handle.report_url),
            poll,
        })
    }

    fn async_init(&mut self) -> Result<SagaOutcome, SagaFailure> {
        let store = HandoffStore::new(self.working_directory()?);
        let handle = self.start_analysis()?;

        store.write(&AsyncResumptionToken {
            report_status_url: handle.report_status_url,
        })?;
        self.transition(SagaState::HandoffWritten);

        let path = store.path().to_path_buf();
        self.progress.on_progress(&ProgressEvent::HandoffWritten {
            path: path.display().to_string(),
        });
        Ok(SagaOutcome::HandoffWritten { path })
    }

    fn async_result(&mut self) -> Result<SagaOutcome, SagaFailure> {
        let store = HandoffStore::new(self.working_directory()?);
        let token = store.read()?;
        self.transition(SagaState::HandoffWritten);
        self.progress.on_progress(&ProgressEvent::HandoffRead {
            path: store.path().display().to_string(),
        });

        let poll = self.poll(&token.report_status_url)?;
        Ok(SagaOutcome::Finished {
            report_url: None,
            poll,
        })
    }

    /// Opens the structure, uploads manifests and starts the analysis
    fn start_analysis(&mut self) -> Result<AnalysisHandle, SagaFailure> {
        let handle = self
            .api
            .open_structure(self.context)
            .map_err(SagaFailure::OpenStructure)?;
        self.transition(SagaState::StructureOpened);
        self.progress.on_progress(&ProgressEvent::StructureOpened {
            structure_id: handle.structure_id.clone(),
            project_id: handle.project_id.clone(),
        });

        let patterns = self
            .api
            .manifest_patterns(self.context)
            .map_err(SagaFailure::ManifestPatterns)?;

        let discovery = ManifestDiscovery::new(
            &self.context.source_code_path,
            ExclusionRules::from_settings(self.settings),
        );
        let manifests = discovery.discover(&patterns);
        self.progress.on_progress(&ProgressEvent::DiscoveryComplete {
            package_managers: patterns.len(),
            candidates: manifests.len(),
            excluded: manifests.iter().filter(|m| m.is_excluded()).count(),
        });

        let upload_start = Instant::now();
        let summary =
            UploadPipeline::new(self.api, self.context, &handle, self.progress).run(manifests);
        self.progress.on_progress(&ProgressEvent::UploadComplete {
            accepted: summary.accepted(),
            total: summary.total(),
            duration: upload_start.elapsed(),
        });

        if summary.accepted() == 0 {
            return Err(SagaFailure::NoManifests {
                candidates: summary.total(),
            });
        }
        self.transition(SagaState::ManifestsUploaded);

        self.api
            .start_analysis(self.context, &handle)
            .map_err(SagaFailure::StartAnalysis)?;
        self.transition(SagaState::AnalysisStarted);

        info!(report_url = %handle.report_url, "Analysis report URL");
        self.progress.on_progress(&ProgressEvent::AnalysisStarted {
            report_url: handle.report_url.clone(),
        });
        Ok(handle)
    }

    fn poll(&mut self, report_status_url: &str) -> Result<PollSuccess, SagaFailure> {
        self.transition(SagaState::Polling);
        let poller = ResultPoller::new(
            self.api,
            self.context,
            self.clock,
            self.progress,
            self.settings.max_wait,
            self.settings.polling_interval,
        );
        Ok(poller.poll(report_status_url)?)
    }

    fn working_directory(&self) -> Result<&'a Path, SagaFailure> {
        self.settings
            .working_directory
            .as_deref()
            .ok_or(SagaFailure::Config(ConfigError::WorkingDirectoryRequired(
                self.settings.mode,
            )))
    }

    fn transition(&mut self, next: SagaState) {
        debug!(from = ?self.state, to = ?next, "Saga transition");
        self.state = next;
        self.history.push(next);
    }
}
