//! Remote endpoint errors
//!
//! Transport failures and vendor rejections are kept apart: the first kind is
//! retried by [`RetryPolicy`](super::RetryPolicy), the second is surfaced to the
//! caller verbatim.

use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// The remote operations the client knows how to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    OpenStructure,
    ManifestTypes,
    PutManifest,
    StartAnalysis,
    AnalysisStatus,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::OpenStructure => "Structure API",
            Operation::ManifestTypes => "Manifest Types API",
            Operation::PutManifest => "Manifest API",
            Operation::StartAnalysis => "Analysis Start API",
            Operation::AnalysisStatus => "Analysis Result API",
        };
        f.write_str(name)
    }
}

/// A well-formed but unsuccessful HTTP response from the vendor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorFailure {
    pub status: u16,
    pub code: Option<String>,
    pub message: Option<String>,
    pub body: String,
}

impl VendorFailure {
    /// Builds a failure from a status and raw body, picking up `{code, message}` when present
    pub fn from_body(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        let (code, message) = vendor_code_and_message(&body);
        Self {
            status,
            code,
            message,
            body,
        }
    }

    /// True when the vendor supplied a `message` field
    pub fn has_vendor_message(&self) -> bool {
        self.message.is_some()
    }
}

impl fmt::Display for VendorFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.code, &self.message) {
            (Some(code), Some(message)) => write!(f, "{} =====> {}", code, message),
            (None, Some(message)) => write!(f, "{}", message),
            _ if self.body.trim().is_empty() => write!(f, "HTTP {}", self.status),
            _ => write!(f, "HTTP {}: {}", self.status, self.body.trim()),
        }
    }
}

/// Extracts the vendor's `code` and `message` fields from a JSON body.
///
/// `code` may be sent as a number or a string.
pub(crate) fn vendor_code_and_message(body: &str) -> (Option<String>, Option<String>) {
    let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) else {
        return (None, None);
    };

    let code = map.get("code").and_then(|v| match v {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    });
    let message = map
        .get("message")
        .and_then(|v| v.as_str())
        .map(str::to_string);

    (code, message)
}

/// Errors returned by [`AnalysisApi`](super::AnalysisApi) operations
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// Every transport attempt failed (connection, timeout, body read)
    #[error("{operation} could not be reached after {attempts} attempt(s): {message}")]
    Transport {
        operation: Operation,
        attempts: u32,
        message: String,
    },

    /// The vendor answered with an unsuccessful status
    #[error("{operation} status {}: {failure}", .failure.status)]
    Rejected {
        operation: Operation,
        failure: VendorFailure,
    },

    /// The vendor refused the credentials (HTTP 403)
    #[error("{operation} refused the request (HTTP 403), check the client id and API key: {failure}")]
    Forbidden {
        operation: Operation,
        failure: VendorFailure,
    },

    /// A successful status whose body did not match the expected shape
    #[error("{operation} returned an unreadable response: {message}")]
    InvalidResponse { operation: Operation, message: String },

    /// The request address could not be built
    #[error("{operation} address is invalid ({url}): {message}")]
    InvalidUrl {
        operation: Operation,
        url: String,
        message: String,
    },
}

impl ApiError {
    pub fn operation(&self) -> Operation {
        match self {
            ApiError::Transport { operation, .. }
            | ApiError::Rejected { operation, .. }
            | ApiError::Forbidden { operation, .. }
            | ApiError::InvalidResponse { operation, .. }
            | ApiError::InvalidUrl { operation, .. } => *operation,
        }
    }

    /// The vendor's failure response, if the error came from one
    pub fn vendor_failure(&self) -> Option<&VendorFailure> {
        match self {
            ApiError::Rejected { failure, .. } | ApiError::Forbidden { failure, .. } => {
                Some(failure)
            }
            _ => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Transport { .. })
    }
}
