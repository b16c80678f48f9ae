use crate::api::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::config::{
    CiMetadata, ConfigError, ContextSources, Mode, OnFailure, RunSettings, DEFAULT_MAX_WAIT_SECS,
    DEFAULT_POLLING_INTERVAL_SECS,
};
use crate::util::logging::parse_level;
use clap::Parser;
use tracing::Level;

/// Uploads dependency manifests for remote analysis and reports the result
#[derive(Parser, Debug)]
#[command(
    name = "soos-ci",
    about = "Uploads dependency manifests for remote analysis and reports the result",
    version,
    author,
    long_about = "soos-ci locates dependency manifests in a source tree, uploads them for \
                  analysis and either waits for the result or leaves a token so a later \
                  invocation can collect it.\n\n\
                  Required values may come from SOOS_API_BASE_URI, SOOS_ROOT_CODE_PATH, \
                  SOOS_PROJECT_NAME, SOOS_CLIENT_ID and SOOS_API_KEY; command-line flags win.\n\n\
                  Examples:\n  \
                  soos-ci --project-name shop\n  \
                  soos-ci --mode async_init --working-directory /tmp/ws\n  \
                  soos-ci --mode async_result --working-directory /tmp/ws"
)]
pub struct CliArgs {
    #[arg(short = 'm', long, value_enum, default_value_t = Mode::RunAndWait, help = "Run mode")]
    pub mode: Mode,

    #[arg(
        long,
        value_enum,
        default_value_t = OnFailure::FailTheBuild,
        help = "What a failed run does to the build"
    )]
    pub on_failure: OnFailure,

    #[arg(
        long,
        value_name = "DIRS",
        help = "Comma-separated directory substrings to skip (node_modules is always skipped)"
    )]
    pub dirs_to_exclude: Option<String>,

    #[arg(long, value_name = "FILES", help = "Comma-separated file name substrings to skip")]
    pub files_to_exclude: Option<String>,

    #[arg(
        long,
        value_name = "DIR",
        help = "Directory holding the async token (required for async modes)"
    )]
    pub working_directory: Option<String>,

    #[arg(
        long,
        value_name = "SECONDS",
        default_value_t = DEFAULT_MAX_WAIT_SECS,
        help = "Maximum time to wait for the analysis result"
    )]
    pub analysis_result_max_wait: u64,

    #[arg(
        long,
        value_name = "SECONDS",
        default_value_t = DEFAULT_POLLING_INTERVAL_SECS,
        help = "Time between status checks (minimum 10)"
    )]
    pub analysis_result_polling_interval: u64,

    #[arg(long, value_name = "URI", help = "API base URI [env: SOOS_API_BASE_URI]")]
    pub base_uri: Option<String>,

    #[arg(
        long,
        value_name = "PATH",
        help = "Root of the manifest search [env: SOOS_ROOT_CODE_PATH]"
    )]
    pub source_code_path: Option<String>,

    #[arg(long, value_name = "NAME", help = "Project name [env: SOOS_PROJECT_NAME]")]
    pub project_name: Option<String>,

    #[arg(long, value_name = "ID", help = "API client id [env: SOOS_CLIENT_ID]")]
    pub client_id: Option<String>,

    #[arg(long, value_name = "KEY", help = "API key [env: SOOS_API_KEY]")]
    pub api_key: Option<String>,

    #[arg(long, value_name = "SHA", help = "Commit hash of the build")]
    pub commit_hash: Option<String>,

    #[arg(long, value_name = "NAME", help = "Branch name of the build")]
    pub branch_name: Option<String>,

    #[arg(long, value_name = "URI", help = "Branch URI")]
    pub branch_uri: Option<String>,

    #[arg(long, value_name = "VERSION", help = "Build version")]
    pub build_version: Option<String>,

    #[arg(long, value_name = "URI", help = "Build URI")]
    pub build_uri: Option<String>,

    #[arg(
        long,
        value_name = "NAME",
        help = "Operating environment (defaults to the host OS)"
    )]
    pub operating_environment: Option<String>,

    #[arg(long, value_name = "NAME", help = "Name of the calling CI integration")]
    pub integration_name: Option<String>,

    #[arg(
        long,
        value_name = "SECONDS",
        default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS,
        help = "HTTP request timeout"
    )]
    pub request_timeout: u64,

    #[arg(long, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, help = "Verbose output")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,
}

impl CliArgs {
    /// Context values given on the command line
    pub fn context_overrides(&self) -> ContextSources {
        ContextSources {
            base_uri: self.base_uri.clone(),
            source_code_path: self.source_code_path.clone(),
            project_name: self.project_name.clone(),
            client_id: self.client_id.clone(),
            api_key: self.api_key.clone(),
        }
    }

    pub fn metadata(&self) -> CiMetadata {
        let defaults = CiMetadata::default();
        CiMetadata {
            commit_hash: self.commit_hash.clone(),
            branch_name: self.branch_name.clone(),
            branch_uri: self.branch_uri.clone(),
            build_version: self.build_version.clone(),
            build_uri: self.build_uri.clone(),
            operating_environment: self
                .operating_environment
                .clone()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.operating_environment),
            integration_name: self.integration_name.clone(),
        }
    }

    pub fn run_settings(&self) -> Result<RunSettings, ConfigError> {
        let settings = RunSettings {
            mode: self.mode,
            on_failure: self.on_failure,
            ..RunSettings::default()
        }
        .with_dirs_to_exclude(self.dirs_to_exclude.as_deref())
        .with_files_to_exclude(self.files_to_exclude.as_deref())
        .with_max_wait_secs(self.analysis_result_max_wait)
        .with_polling_interval_secs(self.analysis_result_polling_interval)
        .with_working_directory(self.working_directory.as_deref())?;

        settings.validate()?;
        Ok(settings)
    }

    /// Explicit `--log-level` wins, then `-v`/`-q`; `None` defers to the environment
    pub fn log_level_override(&self) -> Option<Level> {
        if let Some(level) = &self.log_level {
            Some(parse_level(level))
        } else if self.verbose {
            Some(Level::DEBUG)
        } else if self.quiet {
            Some(Level::ERROR)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_cli_args_verify() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let args = CliArgs::parse_from(["soos-ci"]);
        assert_eq!(args.mode, Mode::RunAndWait);
        assert_eq!(args.on_failure, OnFailure::FailTheBuild);
        assert_eq!(args.analysis_result_max_wait, 300);
        assert_eq!(args.analysis_result_polling_interval, 10);
        assert_eq!(args.request_timeout, 60);
        assert!(args.working_directory.is_none());
        assert!(args.log_level_override().is_none());
        assert_eq!(args.context_overrides(), ContextSources::default());
    }

    #[test]
    fn test_full_command_line() {
        let args = CliArgs::parse_from([
            "soos-ci",
            "--mode",
            "async_init",
            "--on-failure",
            "continue_on_failure",
            "--dirs-to-exclude",
            "vendor,dist",
            "--base-uri",
            "https://api.example.test/api",
            "--project-name",
            "shop",
            "--commit-hash",
            "abc123",
            "--branch-name",
            "main",
            "--integration-name",
            "GitHub",
            "-v",
        ]);

        assert_eq!(args.mode, Mode::AsyncInit);
        assert_eq!(args.on_failure, OnFailure::ContinueOnFailure);
        assert_eq!(args.log_level_override(), Some(Level::DEBUG));

        let overrides = args.context_overrides();
        assert_eq!(
            overrides.base_uri.as_deref(),
            Some("https://api.example.test/api")
        );
        assert_eq!(overrides.project_name.as_deref(), Some("shop"));
        assert!(overrides.api_key.is_none());

        let metadata = args.metadata();
        assert_eq!(metadata.commit_hash.as_deref(), Some("abc123"));
        assert_eq!(metadata.branch_name.as_deref(), Some("main"));
        assert_eq!(metadata.integration_name.as_deref(), Some("GitHub"));
        assert_eq!(metadata.operating_environment, std::env::consts::OS);
    }

    #[test]
    fn test_invalid_mode_rejected() {
        assert!(CliArgs::try_parse_from(["soos-ci", "--mode", "later"]).is_err());
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(CliArgs::try_parse_from(["soos-ci", "-v", "-q"]).is_err());
    }

    #[test]
    fn test_run_settings_clamps_interval() {
        let args = CliArgs::parse_from(["soos-ci", "--analysis-result-polling-interval", "3"]);
        let settings = args.run_settings().unwrap();
        assert_eq!(settings.polling_interval, Duration::from_secs(10));
    }

    #[test]
    fn test_run_settings_async_needs_working_directory() {
        let args = CliArgs::parse_from(["soos-ci", "--mode", "async_result"]);
        assert!(matches!(
            args.run_settings(),
            Err(ConfigError::WorkingDirectoryRequired(Mode::AsyncResult))
        ));

        let dir = TempDir::new().unwrap();
        let wd = dir.path().display().to_string();
        let args = CliArgs::parse_from([
            "soos-ci",
            "--mode",
            "async_result",
            "--working-directory",
            wd.as_str(),
        ]);
        assert!(args.run_settings().unwrap().working_directory.is_some());
    }

    #[test]
    fn test_operating_environment_override() {
        let args = CliArgs::parse_from(["soos-ci", "--operating-environment", "ubuntu-22.04"]);
        assert_eq!(args.metadata().operating_environment, "ubuntu-22.04");
    }
}
