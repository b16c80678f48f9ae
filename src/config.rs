//! Configuration management for soos-ci
//!
//! A run is described by two values:
//!
//! - [`AnalysisContext`]: where to send manifests and on whose behalf
//! - [`RunSettings`]: how the run behaves (mode, failure disposition,
//!   exclusions, polling budget)
//!
//! Context values are resolved from environment variables and command-line
//! overrides; an override always wins over the environment.
//!
//! # Environment Variables
//!
//! - `SOOS_API_BASE_URI`: API base address - **required**
//! - `SOOS_ROOT_CODE_PATH`: root of the manifest search - **required**
//! - `SOOS_PROJECT_NAME`: project name for tracking results - **required**
//! - `SOOS_CLIENT_ID`: API client id - **required**
//! - `SOOS_API_KEY`: API key - **required**
//! - `SOOS_LOG_LEVEL`: logging level - default: "info"
//! - `SOOS_LOG_JSON`: JSON log output (true|false) - default: "false"
//!
//! CI metadata (commit, branch, build, environment, integration name) is only
//! taken from the command line.

use anyhow::{bail, Context as _, Result};
use clap::ValueEnum;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Integration type reported to the vendor for every structure record
pub const INTEGRATION_TYPE: &str = "CI";

/// Default values for run settings
pub const DEFAULT_MAX_WAIT_SECS: u64 = 300;
pub const DEFAULT_POLLING_INTERVAL_SECS: u64 = 10;
pub const MIN_POLLING_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_EXCLUDED_DIR: &str = "node_modules";

pub const ENV_BASE_URI: &str = "SOOS_API_BASE_URI";
pub const ENV_SOURCE_CODE_PATH: &str = "SOOS_ROOT_CODE_PATH";
pub const ENV_PROJECT_NAME: &str = "SOOS_PROJECT_NAME";
pub const ENV_CLIENT_ID: &str = "SOOS_CLIENT_ID";
pub const ENV_API_KEY: &str = "SOOS_API_KEY";

/// How far a single invocation carries the saga
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Upload, start, and wait for the result
    #[default]
    #[value(name = "run_and_wait")]
    RunAndWait,
    /// Upload, start, and persist a handoff token for a later invocation
    #[value(name = "async_init")]
    AsyncInit,
    /// Read the handoff token and wait for the result
    #[value(name = "async_result")]
    AsyncResult,
}

impl Mode {
    pub fn is_async(&self) -> bool {
        matches!(self, Mode::AsyncInit | Mode::AsyncResult)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::RunAndWait => "run_and_wait",
            Mode::AsyncInit => "async_init",
            Mode::AsyncResult => "async_result",
        };
        f.write_str(name)
    }
}

/// What a failed run does to the build
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnFailure {
    /// Exit non-zero
    #[default]
    #[value(name = "fail_the_build")]
    FailTheBuild,
    /// Log the failure and exit zero
    #[value(name = "continue_on_failure")]
    ContinueOnFailure,
}

impl OnFailure {
    /// Process exit code for a run that ended in failure
    pub fn failure_exit_code(&self) -> i32 {
        match self {
            OnFailure::FailTheBuild => 1,
            OnFailure::ContinueOnFailure => 0,
        }
    }
}

impl fmt::Display for OnFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OnFailure::FailTheBuild => "fail_the_build",
            OnFailure::ContinueOnFailure => "continue_on_failure",
        };
        f.write_str(name)
    }
}

/// The five values a run cannot do without
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredField {
    BaseUri,
    SourceCodePath,
    ProjectName,
    ClientId,
    ApiKey,
}

impl RequiredField {
    pub fn env_var(&self) -> &'static str {
        match self {
            RequiredField::BaseUri => ENV_BASE_URI,
            RequiredField::SourceCodePath => ENV_SOURCE_CODE_PATH,
            RequiredField::ProjectName => ENV_PROJECT_NAME,
            RequiredField::ClientId => ENV_CLIENT_ID,
            RequiredField::ApiKey => ENV_API_KEY,
        }
    }

    /// Extra guidance printed alongside the missing-field message
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            RequiredField::ClientId => Some(
                "CLIENT_ID, if you do not already have one, will be provided with a subscription to SOOS.io services.",
            ),
            RequiredField::ApiKey => Some(
                "API_KEY, if you do not already have one, will be provided with a subscription to SOOS.io services.",
            ),
            _ => None,
        }
    }
}

impl fmt::Display for RequiredField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.env_var())
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// One or more required context values are absent or empty
    #[error("Could not find required Environment/Script Variables. One or more are missing or empty: {}", format_fields(.0))]
    MissingFields(Vec<RequiredField>),

    /// A configured directory does not exist or is not a directory
    #[error("The {label} does not exist or it is not a directory: {}", .path.display())]
    InvalidDirectory { label: &'static str, path: PathBuf },

    /// Async modes need somewhere to keep the handoff token
    #[error("Working Directory is required when mode is ASYNC ({0})")]
    WorkingDirectoryRequired(Mode),
}

fn format_fields(fields: &[RequiredField]) -> String {
    fields
        .iter()
        .map(|f| f.env_var())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Optional CI metadata attached to the structure record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CiMetadata {
    pub commit_hash: Option<String>,
    pub branch_name: Option<String>,
    pub branch_uri: Option<String>,
    pub build_version: Option<String>,
    pub build_uri: Option<String>,
    pub operating_environment: String,
    pub integration_name: Option<String>,
}

impl Default for CiMetadata {
    fn default() -> Self {
        Self {
            commit_hash: None,
            branch_name: None,
            branch_uri: None,
            build_version: None,
            build_uri: None,
            operating_environment: env::consts::OS.to_string(),
            integration_name: None,
        }
    }
}

/// Immutable per-run configuration, passed explicitly to every component
#[derive(Clone, PartialEq, Eq)]
pub struct AnalysisContext {
    /// API base address, always ending with `/`
    pub base_uri: String,
    pub source_code_path: PathBuf,
    pub project_name: String,
    pub client_id: String,
    pub api_key: String,
    pub metadata: CiMetadata,
}

impl fmt::Debug for AnalysisContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisContext")
            .field("base_uri", &self.base_uri)
            .field("source_code_path", &self.source_code_path)
            .field("project_name", &self.project_name)
            .field("client_id", &"SECRET")
            .field("api_key", &"SECRET")
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// Partially known context values from a single source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextSources {
    pub base_uri: Option<String>,
    pub source_code_path: Option<String>,
    pub project_name: Option<String>,
    pub client_id: Option<String>,
    pub api_key: Option<String>,
}

impl ContextSources {
    /// Reads the five context variables from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads the five context variables through `lookup`
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            base_uri: lookup(ENV_BASE_URI),
            source_code_path: lookup(ENV_SOURCE_CODE_PATH),
            project_name: lookup(ENV_PROJECT_NAME),
            client_id: lookup(ENV_CLIENT_ID),
            api_key: lookup(ENV_API_KEY),
        }
    }

    /// Values from `self` win; gaps are filled from `fallback`
    pub fn or(self, fallback: ContextSources) -> Self {
        Self {
            base_uri: self.base_uri.or(fallback.base_uri),
            source_code_path: self.source_code_path.or(fallback.source_code_path),
            project_name: self.project_name.or(fallback.project_name),
            client_id: self.client_id.or(fallback.client_id),
            api_key: self.api_key.or(fallback.api_key),
        }
    }

    /// Lists every required field that is absent or empty
    pub fn missing_fields(&self) -> Vec<RequiredField> {
        let checks = [
            (RequiredField::BaseUri, &self.base_uri),
            (RequiredField::SourceCodePath, &self.source_code_path),
            (RequiredField::ProjectName, &self.project_name),
            (RequiredField::ClientId, &self.client_id),
            (RequiredField::ApiKey, &self.api_key),
        ];

        checks
            .into_iter()
            .filter(|(_, value)| value.as_deref().map_or(true, |v| v.trim().is_empty()))
            .map(|(field, _)| field)
            .collect()
    }

    /// Validates the values and builds the run's context.
    ///
    /// Missing fields are reported all at once, before the source path is
    /// touched.
    pub fn validate(self, metadata: CiMetadata) -> Result<AnalysisContext, ConfigError> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(ConfigError::MissingFields(missing));
        }

        let (
            Some(base_uri),
            Some(source_code_path),
            Some(project_name),
            Some(client_id),
            Some(api_key),
        ) = (
            self.base_uri,
            self.source_code_path,
            self.project_name,
            self.client_id,
            self.api_key,
        )
        else {
            return Err(ConfigError::MissingFields(vec![]));
        };

        let source_code_path = resolve_directory(&source_code_path).map_err(|_| {
            ConfigError::InvalidDirectory {
                label: "source code directory",
                path: PathBuf::from(&source_code_path),
            }
        })?;

        Ok(AnalysisContext {
            base_uri: normalize_base_uri(&base_uri),
            source_code_path,
            project_name,
            client_id,
            api_key,
            metadata,
        })
    }
}

/// Behaviour knobs for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub mode: Mode,
    pub on_failure: OnFailure,
    /// Directory substrings to skip; always contains [`DEFAULT_EXCLUDED_DIR`]
    pub dirs_to_exclude: Vec<String>,
    /// File name substrings to skip
    pub files_to_exclude: Vec<String>,
    pub working_directory: Option<PathBuf>,
    pub max_wait: Duration,
    pub polling_interval: Duration,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            on_failure: OnFailure::default(),
            dirs_to_exclude: vec![DEFAULT_EXCLUDED_DIR.to_string()],
            files_to_exclude: Vec::new(),
            working_directory: None,
            max_wait: Duration::from_secs(DEFAULT_MAX_WAIT_SECS),
            polling_interval: Duration::from_secs(DEFAULT_POLLING_INTERVAL_SECS),
        }
    }
}

impl RunSettings {
    /// Adds user directory exclusions on top of the default set
    pub fn with_dirs_to_exclude(mut self, raw: Option<&str>) -> Self {
        self.dirs_to_exclude.extend(split_list(raw));
        self
    }

    pub fn with_files_to_exclude(mut self, raw: Option<&str>) -> Self {
        self.files_to_exclude.extend(split_list(raw));
        self
    }

    pub fn with_max_wait_secs(mut self, secs: u64) -> Self {
        self.max_wait = Duration::from_secs(secs);
        self
    }

    /// Sets the polling interval, raised to the minimum when smaller
    pub fn with_polling_interval_secs(mut self, secs: u64) -> Self {
        self.polling_interval = Duration::from_secs(clamp_polling_interval(secs));
        self
    }

    /// Resolves and validates the working directory
    pub fn with_working_directory(mut self, raw: Option<&str>) -> Result<Self, ConfigError> {
        self.working_directory = match raw.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => Some(resolve_directory(raw).map_err(|_| {
                ConfigError::InvalidDirectory {
                    label: "working directory",
                    path: PathBuf::from(raw),
                }
            })?),
            None => None,
        };
        Ok(self)
    }

    /// Checks settings that depend on the mode
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mode.is_async() && self.working_directory.is_none() {
            return Err(ConfigError::WorkingDirectoryRequired(self.mode));
        }
        Ok(())
    }
}

/// Applies the polling interval floor
pub fn clamp_polling_interval(secs: u64) -> u64 {
    secs.max(MIN_POLLING_INTERVAL_SECS)
}

/// Splits a comma-separated option into trimmed, non-empty tokens
pub fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

/// Makes sure the base address ends with a single `/`
pub fn normalize_base_uri(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    }
}

/// Expands a leading `~` and canonicalizes an existing directory
pub fn resolve_directory(raw: &str) -> Result<PathBuf> {
    let expanded = expand_home(raw.trim());
    if !expanded.is_dir() {
        bail!("Not a directory: {}", expanded.display());
    }
    expanded
        .canonicalize()
        .with_context(|| format!("Failed to canonicalize {}", expanded.display()))
}

fn expand_home(raw: &str) -> PathBuf {
    let rest = raw
        .strip_prefix("~/")
        .or_else(|| raw.strip_prefix("$HOME/"))
        .or_else(|| (raw == "~").then_some(""));

    match (rest, dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => Path::new(raw).to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;
    use tempfile::TempDir;

    /// Helper to temporarily set environment variables for testing
    struct EnvGuard {
        key: String,
        old_value: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &str, value: &str) -> Self {
            let old_value = env::var(key).ok();
            env::set_var(key, value);
            Self {
                key: key.to_string(),
                old_value,
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.old_value {
                Some(v) => env::set_var(&self.key, v),
                None => env::remove_var(&self.key),
            }
        }
    }

    fn complete_sources(root: &Path) -> ContextSources {
        ContextSources {
            base_uri: Some("https://api.example.test/api".to_string()),
            source_code_path: Some(root.display().to_string()),
            project_name: Some("shop".to_string()),
            client_id: Some("client".to_string()),
            api_key: Some("key".to_string()),
        }
    }

    #[test]
    fn test_validate_complete_sources() {
        let dir = TempDir::new().unwrap();
        let context = complete_sources(dir.path())
            .validate(CiMetadata::default())
            .unwrap();

        assert_eq!(context.base_uri, "https://api.example.test/api/");
        assert_eq!(
            context.source_code_path,
            dir.path().canonicalize().unwrap()
        );
        assert_eq!(context.metadata.operating_environment, env::consts::OS);
    }

    #[test]
    fn test_missing_fields_reported_together() {
        let sources = ContextSources {
            base_uri: Some("https://api.example.test/api/".to_string()),
            source_code_path: None,
            project_name: Some("   ".to_string()),
            client_id: Some("client".to_string()),
            api_key: Some(String::new()),
        };

        match sources.validate(CiMetadata::default()).unwrap_err() {
            ConfigError::MissingFields(fields) => assert_eq!(
                fields,
                vec![
                    RequiredField::SourceCodePath,
                    RequiredField::ProjectName,
                    RequiredField::ApiKey
                ]
            ),
            other => panic!("Expected MissingFields, got {:?}", other),
        }
    }

    #[test]
    fn test_every_single_missing_field_invalidates() {
        let dir = TempDir::new().unwrap();
        let fields = [
            RequiredField::BaseUri,
            RequiredField::SourceCodePath,
            RequiredField::ProjectName,
            RequiredField::ClientId,
            RequiredField::ApiKey,
        ];
        for field in fields {
            let mut sources = complete_sources(dir.path());
            match field {
                RequiredField::BaseUri => sources.base_uri = None,
                RequiredField::SourceCodePath => sources.source_code_path = None,
                RequiredField::ProjectName => sources.project_name = None,
                RequiredField::ClientId => sources.client_id = None,
                RequiredField::ApiKey => sources.api_key = None,
            }
            assert_eq!(sources.missing_fields(), vec![field]);
            assert!(sources.validate(CiMetadata::default()).is_err());
        }
    }

    #[test]
    fn test_source_path_must_be_directory() {
        let dir = TempDir::new().unwrap();
        let mut sources = complete_sources(dir.path());
        sources.source_code_path = Some(dir.path().join("missing").display().to_string());

        assert!(matches!(
            sources.validate(CiMetadata::default()),
            Err(ConfigError::InvalidDirectory { .. })
        ));
    }

    #[test]
    fn test_overrides_take_precedence() {
        let env_values: HashMap<&str, &str> = [
            (ENV_BASE_URI, "https://env.example.test/"),
            (ENV_PROJECT_NAME, "from-env"),
            (ENV_API_KEY, "env-key"),
        ]
        .into_iter()
        .collect();
        let from_env = ContextSources::from_lookup(|k| env_values.get(k).map(|v| v.to_string()));

        let overrides = ContextSources {
            project_name: Some("from-cli".to_string()),
            client_id: Some("cli-client".to_string()),
            ..ContextSources::default()
        };

        let merged = overrides.or(from_env);
        assert_eq!(merged.base_uri.as_deref(), Some("https://env.example.test/"));
        assert_eq!(merged.project_name.as_deref(), Some("from-cli"));
        assert_eq!(merged.client_id.as_deref(), Some("cli-client"));
        assert_eq!(merged.api_key.as_deref(), Some("env-key"));
        assert_eq!(merged.missing_fields(), vec![RequiredField::SourceCodePath]);
    }

    #[test]
    #[serial]
    fn test_from_env_reads_process_environment() {
        let _guards = vec![
            EnvGuard::set(ENV_BASE_URI, "https://api.example.test/api/"),
            EnvGuard::set(ENV_CLIENT_ID, "env-client"),
        ];

        let sources = ContextSources::from_env();
        assert_eq!(
            sources.base_uri.as_deref(),
            Some("https://api.example.test/api/")
        );
        assert_eq!(sources.client_id.as_deref(), Some("env-client"));
    }

    #[test]
    fn test_debug_masks_secrets() {
        let dir = TempDir::new().unwrap();
        let context = complete_sources(dir.path())
            .validate(CiMetadata::default())
            .unwrap();
        let debug_str = format!("{:?}", context);
        assert!(!debug_str.contains("\"key\""));
        assert!(debug_str.contains("SECRET"));
    }

    #[test]
    fn test_default_run_settings() {
        let settings = RunSettings::default();
        assert_eq!(settings.mode, Mode::RunAndWait);
        assert_eq!(settings.on_failure, OnFailure::FailTheBuild);
        assert_eq!(settings.dirs_to_exclude, vec!["node_modules".to_string()]);
        assert!(settings.files_to_exclude.is_empty());
        assert_eq!(settings.max_wait, Duration::from_secs(300));
        assert_eq!(settings.polling_interval, Duration::from_secs(10));
    }

    #[test]
    fn test_polling_interval_floor() {
        assert_eq!(clamp_polling_interval(3), 10);
        assert_eq!(clamp_polling_interval(10), 10);
        assert_eq!(clamp_polling_interval(45), 45);

        let settings = RunSettings::default().with_polling_interval_secs(3);
        assert_eq!(settings.polling_interval, Duration::from_secs(10));
    }

    #[test]
    fn test_exclusions_are_additive() {
        let settings = RunSettings::default()
            .with_dirs_to_exclude(Some("vendor, build/out ,,"))
            .with_files_to_exclude(Some("test-requirements.txt"));

        assert_eq!(
            settings.dirs_to_exclude,
            vec![
                "node_modules".to_string(),
                "vendor".to_string(),
                "build/out".to_string()
            ]
        );
        assert_eq!(
            settings.files_to_exclude,
            vec!["test-requirements.txt".to_string()]
        );
    }

    #[test]
    fn test_async_mode_requires_working_directory() {
        let settings = RunSettings {
            mode: Mode::AsyncInit,
            ..RunSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::WorkingDirectoryRequired(Mode::AsyncInit))
        ));

        let dir = TempDir::new().unwrap();
        let settings = settings
            .with_working_directory(Some(&dir.path().display().to_string()))
            .unwrap();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_working_directory_must_exist() {
        let result = RunSettings::default().with_working_directory(Some("/nonexistent/soos/wd"));
        assert!(matches!(result, Err(ConfigError::InvalidDirectory { .. })));
    }

    #[test]
    fn test_on_failure_exit_codes() {
        assert_eq!(OnFailure::FailTheBuild.failure_exit_code(), 1);
        assert_eq!(OnFailure::ContinueOnFailure.failure_exit_code(), 0);
    }

    #[test]
    fn test_normalize_base_uri() {
        assert_eq!(normalize_base_uri("https://a/api"), "https://a/api/");
        assert_eq!(normalize_base_uri("https://a/api/"), "https://a/api/");
    }

    #[test]
    fn test_expand_home() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/ws"), home.join("ws"));
            assert_eq!(expand_home("$HOME/ws"), home.join("ws"));
        }
        assert_eq!(expand_home("/tmp/ws"), PathBuf::from("/tmp/ws"));
    }
}
