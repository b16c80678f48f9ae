//! Analysis API client
//!
//! [`AnalysisApi`] is the seam between the saga and the network. The HTTP
//! implementation is fully blocking: the whole run is sequential, so there is
//! nothing to gain from an async runtime.

use super::error::{vendor_code_and_message, ApiError, Operation, VendorFailure};
use super::retry::RetryPolicy;
use super::types::{
    AnalysisHandle, ManifestPattern, ManifestReceipt, ManifestUpload, StatusReport,
    StructureRequest, StructureResponse,
};
use crate::config::AnalysisContext;
use reqwest::blocking::{multipart, Client, RequestBuilder};
use reqwest::Url;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info};

/// Header carrying the API key on every request
pub const API_KEY_HEADER: &str = "x-soos-apikey";

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// The remote operations the saga depends on
///
/// Every call takes the run's [`AnalysisContext`] explicitly for the address
/// and credentials.
pub trait AnalysisApi {
    /// Creates the structure record for this run
    fn open_structure(&self, context: &AnalysisContext) -> Result<AnalysisHandle, ApiError>;

    /// Fetches the manifest glob patterns for every supported package manager
    fn manifest_patterns(&self, context: &AnalysisContext)
        -> Result<Vec<ManifestPattern>, ApiError>;

    /// Uploads one manifest into the analysis
    fn put_manifest(
        &self,
        context: &AnalysisContext,
        handle: &AnalysisHandle,
        manifest: ManifestUpload<'_>,
    ) -> Result<ManifestReceipt, ApiError>;

    /// Starts the analysis over the uploaded manifests
    fn start_analysis(
        &self,
        context: &AnalysisContext,
        handle: &AnalysisHandle,
    ) -> Result<(), ApiError>;

    /// Fetches the raw status text of a running analysis
    fn analysis_status(
        &self,
        context: &AnalysisContext,
        report_status_url: &str,
    ) -> Result<String, ApiError>;
}

#[derive(Debug, Clone)]
struct RawResponse {
    status: u16,
    body: String,
}

impl RawResponse {
    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn into_failure(self) -> VendorFailure {
        VendorFailure::from_body(self.status, self.body)
    }
}

/// [`AnalysisApi`] over blocking HTTP
pub struct HttpAnalysisApi {
    http_client: Client,
    retry: RetryPolicy,
}

impl HttpAnalysisApi {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    fn send<F>(&self, operation: Operation, build: F) -> Result<RawResponse, ApiError>
    where
        F: Fn() -> RequestBuilder,
    {
        self.retry.execute(
            operation,
            || -> reqwest::Result<RawResponse> {
                let response = build().send()?;
                let status = response.status().as_u16();
                let body = response.text()?;
                Ok(RawResponse { status, body })
            },
            |raw| raw.status,
        )
    }
}

/// Builds `{base_uri}{segments...}` with each segment percent-encoded
pub(crate) fn endpoint(
    operation: Operation,
    base_uri: &str,
    segments: &[&str],
) -> Result<Url, ApiError> {
    let invalid = |message: String| ApiError::InvalidUrl {
        operation,
        url: base_uri.to_string(),
        message,
    };

    let mut url = Url::parse(base_uri).map_err(|e| invalid(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| invalid("base address cannot carry a path".to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn decode<T: DeserializeOwned>(operation: Operation, body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|e| ApiError::InvalidResponse {
        operation,
        message: e.to_string(),
    })
}

impl AnalysisApi for HttpAnalysisApi {
    fn open_structure(&self, context: &AnalysisContext) -> Result<AnalysisHandle, ApiError> {
        let operation = Operation::OpenStructure;
        let url = endpoint(
            operation,
            &context.base_uri,
            &["clients", &context.client_id, "analysis", "structure"],
        )?;
        let request = StructureRequest::from_context(context, &chrono::Local::now());

        debug!(url = %url, project = %request.project_name, "Opening analysis structure");

        let raw = self.send(operation, || {
            self.http_client
                .post(url.clone())
                .header(API_KEY_HEADER, &context.api_key)
                .json(&request)
        })?;

        if raw.status == 403 {
            return Err(ApiError::Forbidden {
                operation,
                failure: raw.into_failure(),
            });
        }
        if raw.status >= 299 {
            return Err(ApiError::Rejected {
                operation,
                failure: raw.into_failure(),
            });
        }

        let response: StructureResponse = decode(operation, &raw.body)?;
        Ok(response.into())
    }

    fn manifest_patterns(
        &self,
        context: &AnalysisContext,
    ) -> Result<Vec<ManifestPattern>, ApiError> {
        let operation = Operation::ManifestTypes;
        let url = endpoint(
            operation,
            &context.base_uri,
            &["clients", &context.client_id, "manifests"],
        )?;

        let raw = self.send(operation, || {
            self.http_client
                .get(url.clone())
                .header(API_KEY_HEADER, &context.api_key)
        })?;

        if !raw.is_success() {
            return Err(ApiError::Rejected {
                operation,
                failure: raw.into_failure(),
            });
        }
        decode(operation, &raw.body)
    }

    fn put_manifest(
        &self,
        context: &AnalysisContext,
        handle: &AnalysisHandle,
        manifest: ManifestUpload<'_>,
    ) -> Result<ManifestReceipt, ApiError> {
        let operation = Operation::PutManifest;
        let url = endpoint(
            operation,
            &context.base_uri,
            &[
                "clients",
                &context.client_id,
                "projects",
                &handle.project_id,
                "analysis",
                &handle.analysis_id,
                "manifests",
                manifest.label,
                manifest.name,
            ],
        )?;

        info!(name = manifest.name, url = %url, "Putting manifest");

        let raw = self.send(operation, || {
            let part = multipart::Part::text(manifest.content.to_string())
                .file_name(manifest.name.to_string());
            self.http_client
                .put(url.clone())
                .header(API_KEY_HEADER, &context.api_key)
                .multipart(multipart::Form::new().part("manifest", part))
        })?;

        if !raw.is_success() {
            return Err(ApiError::Rejected {
                operation,
                failure: raw.into_failure(),
            });
        }

        let (code, message) = vendor_code_and_message(&raw.body);
        Ok(ManifestReceipt {
            status: raw.status,
            code,
            message,
        })
    }

    fn start_analysis(
        &self,
        context: &AnalysisContext,
        handle: &AnalysisHandle,
    ) -> Result<(), ApiError> {
        let operation = Operation::StartAnalysis;
        let url = endpoint(
            operation,
            &context.base_uri,
            &[
                "clients",
                &context.client_id,
                "projects",
                &handle.project_id,
                "analysis",
                &handle.analysis_id,
            ],
        )?;

        let raw = self.send(operation, || {
            self.http_client
                .put(url.clone())
                .header(API_KEY_HEADER, &context.api_key)
                .json(&serde_json::json!({}))
        })?;

        if raw.status >= 400 {
            return Err(ApiError::Rejected {
                operation,
                failure: raw.into_failure(),
            });
        }
        Ok(())
    }

    fn analysis_status(
        &self,
        context: &AnalysisContext,
        report_status_url: &str,
    ) -> Result<String, ApiError> {
        let operation = Operation::AnalysisStatus;
        let url = Url::parse(report_status_url).map_err(|e| ApiError::InvalidUrl {
            operation,
            url: report_status_url.to_string(),
            message: e.to_string(),
        })?;

        let raw = self.send(operation, || {
            self.http_client
                .get(url.clone())
                .header(API_KEY_HEADER, &context.api_key)
        })?;

        if raw.status >= 299 {
            return Err(ApiError::Rejected {
                operation,
                failure: raw.into_failure(),
            });
        }

        let report: StatusReport = decode(operation, &raw.body)?;
        Ok(report.status)
    }
}
