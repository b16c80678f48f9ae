use super::client::AnalysisApi;
use super::error::{ApiError, Operation, VendorFailure};
use super::types::{AnalysisHandle, ManifestPattern, ManifestReceipt, ManifestUpload};
use crate::config::{AnalysisContext, CiMetadata};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Mutex;

/// A call observed by [`MockAnalysisApi`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    OpenStructure,
    ManifestPatterns,
    PutManifest {
        label: String,
        name: String,
        content: String,
    },
    StartAnalysis {
        project_id: String,
        analysis_id: String,
    },
    AnalysisStatus {
        url: String,
    },
}

/// Scripted [`AnalysisApi`] for tests
///
/// Structure, pattern and start results are fixed; upload results and status
/// responses are consumed from queues. An empty upload queue accepts every
/// manifest, an empty status queue is an error.
pub struct MockAnalysisApi {
    structure: Mutex<Result<AnalysisHandle, ApiError>>,
    patterns: Mutex<Result<Vec<ManifestPattern>, ApiError>>,
    uploads: Mutex<VecDeque<Result<ManifestReceipt, ApiError>>>,
    start: Mutex<Result<(), ApiError>>,
    statuses: Mutex<VecDeque<Result<String, ApiError>>>,
    calls: Mutex<Vec<MockCall>>,
}

pub fn sample_handle() -> AnalysisHandle {
    AnalysisHandle {
        structure_id: "structure-1".to_string(),
        project_id: "project-1".to_string(),
        analysis_id: "structure-1".to_string(),
        report_url: "https://app.example.test/report/structure-1".to_string(),
        embed_url: "https://app.example.test/embed/structure-1".to_string(),
        report_status_url: "https://api.example.test/status/structure-1".to_string(),
    }
}

pub fn sample_context(base_uri: &str) -> AnalysisContext {
    AnalysisContext {
        base_uri: base_uri.to_string(),
        source_code_path: PathBuf::from("."),
        project_name: "sample-project".to_string(),
        client_id: "client-1".to_string(),
        api_key: "secret-key".to_string(),
        metadata: CiMetadata::default(),
    }
}

/// A vendor rejection for scripting failures
pub fn rejection(operation: Operation, status: u16, code: &str, message: &str) -> ApiError {
    let body = serde_json::json!({ "code": code, "message": message }).to_string();
    ApiError::Rejected {
        operation,
        failure: VendorFailure::from_body(status, body),
    }
}

impl MockAnalysisApi {
    pub fn new() -> Self {
        Self {
            structure: Mutex::new(Ok(sample_handle())),
            patterns: Mutex::new(Ok(Vec::new())),
            uploads: Mutex::new(VecDeque::new()),
            start: Mutex::new(Ok(())),
            statuses: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_structure(self, result: Result<AnalysisHandle, ApiError>) -> Self {
        *self.structure.lock().unwrap() = result;
        self
    }

    pub fn with_patterns(self, patterns: Vec<ManifestPattern>) -> Self {
        *self.patterns.lock().unwrap() = Ok(patterns);
        self
    }

    pub fn with_patterns_error(self, error: ApiError) -> Self {
        *self.patterns.lock().unwrap() = Err(error);
        self
    }

    pub fn with_upload_results(
        self,
        results: impl IntoIterator<Item = Result<ManifestReceipt, ApiError>>,
    ) -> Self {
        self.uploads.lock().unwrap().extend(results);
        self
    }

    pub fn with_start_result(self, result: Result<(), ApiError>) -> Self {
        *self.start.lock().unwrap() = result;
        self
    }

    pub fn with_statuses<I, S>(self, statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.statuses
            .lock()
            .unwrap()
            .extend(statuses.into_iter().map(|s| Ok(s.into())));
        self
    }

    pub fn with_status_result(self, result: Result<String, ApiError>) -> Self {
        self.statuses.lock().unwrap().push_back(result);
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> Vec<MockCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, MockCall::PutManifest { .. }))
            .collect()
    }

    pub fn start_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, MockCall::StartAnalysis { .. }))
            .count()
    }

    pub fn status_fetches(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, MockCall::AnalysisStatus { .. }))
            .count()
    }

    fn record(&self, call: MockCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Default for MockAnalysisApi {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisApi for MockAnalysisApi {
    fn open_structure(&self, _context: &AnalysisContext) -> Result<AnalysisHandle, ApiError> {
        self.record(MockCall::OpenStructure);
        self.structure.lock().unwrap().clone()
    }

    fn manifest_patterns(
        &self,
        _context: &AnalysisContext,
    ) -> Result<Vec<ManifestPattern>, ApiError> {
        self.record(MockCall::ManifestPatterns);
        self.patterns.lock().unwrap().clone()
    }

    fn put_manifest(
        &self,
        _context: &AnalysisContext,
        _handle: &AnalysisHandle,
        manifest: ManifestUpload<'_>,
    ) -> Result<ManifestReceipt, ApiError> {
        self.record(MockCall::PutManifest {
            label: manifest.label.to_string(),
            name: manifest.name.to_string(),
            content: manifest.content.to_string(),
        });
        self.uploads
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(ManifestReceipt {
                status: 200,
                code: None,
                message: None,
            }))
    }

    fn start_analysis(
        &self,
        _context: &AnalysisContext,
        handle: &AnalysisHandle,
    ) -> Result<(), ApiError> {
        self.record(MockCall::StartAnalysis {
            project_id: handle.project_id.clone(),
            analysis_id: handle.analysis_id.clone(),
        });
        self.start.lock().unwrap().clone()
    }

    fn analysis_status(
        &self,
        _context: &AnalysisContext,
        report_status_url: &str,
    ) -> Result<String, ApiError> {
        self.record(MockCall::AnalysisStatus {
            url: report_status_url.to_string(),
        });
        self.statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(ApiError::InvalidResponse {
                    operation: Operation::AnalysisStatus,
                    message: "MockAnalysisApi: No more statuses in queue".to_string(),
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_records_calls_in_order() {
        let api = MockAnalysisApi::new().with_statuses(["running"]);
        let context = sample_context("https://api.example.test/api/");
        let handle = api.open_structure(&context).unwrap();
        api.start_analysis(&context, &handle).unwrap();
        assert_eq!(
            api.analysis_status(&context, &handle.report_status_url).unwrap(),
            "running"
        );

        assert_eq!(
            api.calls(),
            vec![
                MockCall::OpenStructure,
                MockCall::StartAnalysis {
                    project_id: "project-1".to_string(),
                    analysis_id: "structure-1".to_string(),
                },
                MockCall::AnalysisStatus {
                    url: handle.report_status_url.clone(),
                },
            ]
        );
    }

    #[test]
    fn test_mock_status_queue_exhausted() {
        let api = MockAnalysisApi::new();
        let context = sample_context("https://api.example.test/api/");
        assert!(api.analysis_status(&context, "https://x/status").is_err());
    }
}
