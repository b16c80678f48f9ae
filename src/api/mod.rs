//! Remote endpoint client for the analysis service
//!
//! - [`AnalysisApi`]: the five remote operations the saga performs
//! - [`HttpAnalysisApi`]: blocking HTTP implementation
//! - [`MockAnalysisApi`]: scripted implementation for tests
//! - [`RetryPolicy`]: transport retry and status retry, configured separately

pub mod client;
pub mod error;
pub mod mock;
pub mod retry;
pub mod types;

pub use client::{AnalysisApi, HttpAnalysisApi, API_KEY_HEADER, DEFAULT_REQUEST_TIMEOUT_SECS};
pub use error::{ApiError, Operation, VendorFailure};
pub use mock::{MockAnalysisApi, MockCall};
pub use retry::{RetryPolicy, StatusRetry, TransportRetry, DEFAULT_TRANSPORT_ATTEMPTS};
pub use types::{AnalysisHandle, ManifestPattern, ManifestReceipt, ManifestUpload, StructureRequest};
