//! Wire types for the analysis API

use crate::config::{AnalysisContext, INTEGRATION_TYPE};
use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};

/// Timestamp format used for the structure record's `name`
pub const STRUCTURE_NAME_FORMAT: &str = "%m/%d/%Y, %H:%M:%S";

/// Body of the open-structure request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureRequest {
    pub project_name: String,
    pub name: String,
    pub integration_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch_uri: Option<String>,
    #[serde(rename = "branch", skip_serializing_if = "Option::is_none")]
    pub branch_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operating_environment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integration_name: Option<String>,
}

impl StructureRequest {
    pub fn from_context<Tz>(context: &AnalysisContext, now: &DateTime<Tz>) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        let meta = &context.metadata;
        Self {
            project_name: context.project_name.clone(),
            name: now.format(STRUCTURE_NAME_FORMAT).to_string(),
            integration_type: INTEGRATION_TYPE.to_string(),
            branch_uri: meta.branch_uri.clone(),
            branch_name: meta.branch_name.clone(),
            commit_hash: meta.commit_hash.clone(),
            build_version: meta.build_version.clone(),
            build_uri: meta.build_uri.clone(),
            operating_environment: Some(meta.operating_environment.clone()),
            integration_name: meta.integration_name.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StructureResponse {
    #[serde(rename = "Id", alias = "id")]
    pub id: String,
    pub project_id: String,
    #[serde(default)]
    pub report_url: Option<String>,
    #[serde(default)]
    pub embed_url: Option<String>,
    pub report_status_url: String,
}

/// Identity and result locations of one remote analysis run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisHandle {
    pub structure_id: String,
    pub project_id: String,
    pub analysis_id: String,
    pub report_url: String,
    pub embed_url: String,
    pub report_status_url: String,
}

impl From<StructureResponse> for AnalysisHandle {
    fn from(response: StructureResponse) -> Self {
        Self {
            analysis_id: response.id.clone(),
            structure_id: response.id,
            project_id: response.project_id,
            report_url: response.report_url.unwrap_or_default(),
            embed_url: response.embed_url.unwrap_or_default(),
            report_status_url: response.report_status_url,
        }
    }
}

/// Glob patterns recognised for one package manager
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "ManifestTypeEntry")]
pub struct ManifestPattern {
    pub package_manager: String,
    pub patterns: Vec<String>,
}

impl ManifestPattern {
    pub fn new(package_manager: impl Into<String>, patterns: &[&str]) -> Self {
        Self {
            package_manager: package_manager.into(),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestTypeEntry {
    package_manager: String,
    #[serde(default)]
    manifests: Vec<ManifestTypePattern>,
}

#[derive(Debug, Deserialize)]
struct ManifestTypePattern {
    pattern: String,
}

impl From<ManifestTypeEntry> for ManifestPattern {
    fn from(entry: ManifestTypeEntry) -> Self {
        Self {
            package_manager: entry.package_manager,
            patterns: entry.manifests.into_iter().map(|m| m.pattern).collect(),
        }
    }
}

/// One manifest ready to be put, with label and name already made URL-safe
#[derive(Debug, Clone, Copy)]
pub struct ManifestUpload<'a> {
    pub label: &'a str,
    pub name: &'a str,
    pub content: &'a str,
}

/// Vendor acknowledgement of an accepted manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestReceipt {
    pub status: u16,
    pub code: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusReport {
    pub status: String,
}
