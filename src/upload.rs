//! Sequential manifest upload
//!
//! Every candidate gets exactly one outcome. A failure on one file, local or
//! remote, never stops the batch; only the accepted count matters to the
//! caller.

use crate::api::{AnalysisApi, AnalysisHandle, ApiError, ManifestReceipt, ManifestUpload};
use crate::config::AnalysisContext;
use crate::discovery::{DiscoveredManifest, Exclusion};
use crate::progress::{ProgressEvent, ProgressHandler};
use std::fs;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Manifest file name as a URL path segment: `.` becomes `*`
pub fn sanitize_name(name: &str) -> String {
    name.replace('.', "*")
}

/// Manifest label as a URL path segment: `.`, `/` and `\` are dropped
pub fn sanitize_label(label: &str) -> String {
    label
        .chars()
        .filter(|c| !matches!(c, '.' | '/' | '\\'))
        .collect()
}

#[derive(Debug, Clone)]
pub enum UploadOutcome {
    Accepted(ManifestReceipt),
    /// The vendor or the transport refused the manifest
    Rejected(ApiError),
    /// Empty after trimming; never sent
    Skipped,
    Excluded(Exclusion),
    /// The file could not be read as text
    Unreadable(String),
}

impl UploadOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, UploadOutcome::Accepted(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            UploadOutcome::Accepted(_) => "accepted",
            UploadOutcome::Rejected(_) => "rejected",
            UploadOutcome::Skipped => "skipped",
            UploadOutcome::Excluded(_) => "excluded",
            UploadOutcome::Unreadable(_) => "unreadable",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ManifestResult {
    pub manifest: DiscoveredManifest,
    pub outcome: UploadOutcome,
}

/// Per-file outcomes of one upload batch
#[derive(Debug, Clone, Default)]
pub struct UploadSummary {
    pub results: Vec<ManifestResult>,
}

impl UploadSummary {
    pub fn accepted(&self) -> usize {
        self.count(|o| o.is_accepted())
    }

    pub fn rejected(&self) -> usize {
        self.count(|o| matches!(o, UploadOutcome::Rejected(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, UploadOutcome::Skipped))
    }

    pub fn excluded(&self) -> usize {
        self.count(|o| matches!(o, UploadOutcome::Excluded(_)))
    }

    pub fn unreadable(&self) -> usize {
        self.count(|o| matches!(o, UploadOutcome::Unreadable(_)))
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    fn count(&self, predicate: impl Fn(&UploadOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| predicate(&r.outcome)).count()
    }
}

pub struct UploadPipeline<'a> {
    api: &'a dyn AnalysisApi,
    context: &'a AnalysisContext,
    handle: &'a AnalysisHandle,
    progress: &'a dyn ProgressHandler,
}

impl<'a> UploadPipeline<'a> {
    pub fn new(
        api: &'a dyn AnalysisApi,
        context: &'a AnalysisContext,
        handle: &'a AnalysisHandle,
        progress: &'a dyn ProgressHandler,
    ) -> Self {
        Self {
            api,
            context,
            handle,
            progress,
        }
    }

    pub fn run(&self, manifests: Vec<DiscoveredManifest>) -> UploadSummary {
        let start = Instant::now();
        let mut summary = UploadSummary::default();

        for manifest in manifests {
            let outcome = self.process(&manifest);
            self.progress.on_progress(&ProgressEvent::ManifestProcessed {
                path: manifest.relative_path.clone(),
                outcome: outcome.kind(),
            });
            summary.results.push(ManifestResult { manifest, outcome });
        }

        info!(
            accepted = summary.accepted(),
            rejected = summary.rejected(),
            skipped = summary.skipped(),
            excluded = summary.excluded(),
            unreadable = summary.unreadable(),
            duration_ms = start.elapsed().as_millis(),
            "Manifest upload complete"
        );
        summary
    }

    fn process(&self, manifest: &DiscoveredManifest) -> UploadOutcome {
        if let Some(reason) = &manifest.exclusion {
            return UploadOutcome::Excluded(reason.clone());
        }

        let content = match fs::read_to_string(&manifest.path) {
            Ok(content) => content,
            Err(err) => {
                warn!(
                    path = %manifest.path.display(),
                    error = %err,
                    "Failed to read manifest"
                );
                return UploadOutcome::Unreadable(err.to_string());
            }
        };

        if content.trim().is_empty() {
            debug!(path = %manifest.path.display(), "Skipping empty manifest");
            return UploadOutcome::Skipped;
        }

        let label = sanitize_label(&manifest.label);
        let name = sanitize_name(&manifest.name);
        let upload = ManifestUpload {
            label: &label,
            name: &name,
            content: &content,
        };

        match self.api.put_manifest(self.context, self.handle, upload) {
            Ok(receipt) => {
                info!(
                    path = %manifest.path.display(),
                    package_manager = %manifest.package_manager,
                    status = receipt.status,
                    code = receipt.code.as_deref().unwrap_or(""),
                    message = receipt.message.as_deref().unwrap_or(""),
                    "Manifest uploaded"
                );
                UploadOutcome::Accepted(receipt)
            }
            Err(err) => {
                warn!(
                    path = %manifest.path.display(),
                    package_manager = %manifest.package_manager,
                    error = %err,
                    "Manifest rejected"
                );
                UploadOutcome::Rejected(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::{rejection, sample_context, sample_handle};
    use crate::api::{MockAnalysisApi, MockCall, Operation};
    use crate::progress::NoOpHandler;
    use std::path::Path;
    use tempfile::TempDir;
    use yare::parameterized;

    fn manifest(root: &Path, relative: &str, content: Option<&str>) -> DiscoveredManifest {
        let path = root.join(relative);
        if let Some(content) = content {
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, content).unwrap();
        }
        let (dir, name) = relative.rsplit_once('/').unwrap_or(("", relative));
        DiscoveredManifest {
            label: dir.rsplit('/').next().unwrap_or_default().to_string(),
            name: name.to_string(),
            relative_path: relative.to_string(),
            package_manager: "NPM".to_string(),
            exclusion: None,
            path,
        }
    }

    fn run(api: &MockAnalysisApi, manifests: Vec<DiscoveredManifest>) -> UploadSummary {
        let context = sample_context("https://api.example.test/api/");
        let handle = sample_handle();
        UploadPipeline::new(api, &context, &handle, &NoOpHandler).run(manifests)
    }

    #[parameterized(
        plain = { "package.json", "package*json" },
        several_dots = { "packages.lock.json", "packages*lock*json" },
        no_dot = { "Gemfile", "Gemfile" },
    )]
    fn test_sanitize_name(input: &str, expected: &str) {
        assert_eq!(sanitize_name(input), expected);
    }

    #[parameterized(
        plain = { "web", "web" },
        dotted = { "my.app", "myapp" },
        separators = { "a/b\\c", "abc" },
        hidden = { ".config", "config" },
    )]
    fn test_sanitize_label(input: &str, expected: &str) {
        assert_eq!(sanitize_label(input), expected);
    }

    #[test]
    fn test_uploads_non_empty_manifest() {
        let dir = TempDir::new().unwrap();
        let api = MockAnalysisApi::new();

        let summary = run(
            &api,
            vec![manifest(dir.path(), "web.app/package.json", Some("{\"name\":\"x\"}"))],
        );

        assert_eq!(summary.accepted(), 1);
        assert_eq!(
            api.uploads(),
            vec![MockCall::PutManifest {
                label: "webapp".to_string(),
                name: "package*json".to_string(),
                content: "{\"name\":\"x\"}".to_string(),
            }]
        );
    }

    #[test]
    fn test_whitespace_manifest_skipped() {
        let dir = TempDir::new().unwrap();
        let api = MockAnalysisApi::new();

        let summary = run(&api, vec![manifest(dir.path(), "a/requirements.txt", Some(" \n\t\n"))]);

        assert_eq!(summary.accepted(), 0);
        assert_eq!(summary.skipped(), 1);
        assert!(api.uploads().is_empty());
    }

    #[test]
    fn test_excluded_manifest_never_read_or_sent() {
        let dir = TempDir::new().unwrap();
        let api = MockAnalysisApi::new();
        let mut excluded = manifest(dir.path(), "node_modules/x/package.json", None);
        excluded.exclusion = Some(Exclusion::Directory("node_modules".to_string()));

        let summary = run(&api, vec![excluded]);

        assert_eq!(summary.excluded(), 1);
        assert!(api.uploads().is_empty());
    }

    #[test]
    fn test_failures_do_not_abort_batch() {
        let dir = TempDir::new().unwrap();
        let api = MockAnalysisApi::new().with_upload_results(vec![
            Err(rejection(Operation::PutManifest, 422, "E1", "bad manifest")),
            Ok(ManifestReceipt {
                status: 200,
                code: None,
                message: None,
            }),
        ]);

        let summary = run(
            &api,
            vec![
                manifest(dir.path(), "a/package.json", Some("{}")),
                manifest(dir.path(), "b/missing.json", None),
                manifest(dir.path(), "c/package.json", Some("{}")),
            ],
        );

        assert_eq!(summary.total(), 3);
        assert_eq!(summary.rejected(), 1);
        assert_eq!(summary.unreadable(), 1);
        assert_eq!(summary.accepted(), 1);
        assert_eq!(api.uploads().len(), 2);
        assert!(summary.results[2].outcome.is_accepted());
    }
}
