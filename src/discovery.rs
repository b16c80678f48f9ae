//! Manifest discovery
//!
//! Walks the source tree once, then matches every package manager's glob
//! patterns against the collected relative paths. A bare pattern such as
//! `package.json` matches at any depth. Hidden directories are not entered
//! and wildcards never match a leading dot, but a pattern naming a dotfile
//! literally still finds it. Symlinked directories are followed.

use crate::api::ManifestPattern;
use crate::config::RunSettings;
use glob::{MatchOptions, Pattern};
use ignore::WalkBuilder;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

/// Why a candidate was left out of the upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exclusion {
    /// Token found in the containing directory path
    Directory(String),
    /// Token found in the file name
    File(String),
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exclusion::Directory(token) => write!(f, "directory matches '{}'", token),
            Exclusion::File(token) => write!(f, "file name matches '{}'", token),
        }
    }
}

/// Substring exclusion filters for directories and file names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionRules {
    dirs: Vec<String>,
    files: Vec<String>,
}

impl ExclusionRules {
    pub fn new<D, F>(dirs: D, files: F) -> Self
    where
        D: IntoIterator,
        D::Item: Into<String>,
        F: IntoIterator,
        F::Item: Into<String>,
    {
        fn clean<I>(tokens: I) -> Vec<String>
        where
            I: IntoIterator,
            I::Item: Into<String>,
        {
            tokens
                .into_iter()
                .map(|t| t.into().trim().to_string())
                .filter(|t| !t.is_empty())
                .collect()
        }

        Self {
            dirs: clean(dirs),
            files: clean(files),
        }
    }

    pub fn from_settings(settings: &RunSettings) -> Self {
        Self::new(
            settings.dirs_to_exclude.iter().cloned(),
            settings.files_to_exclude.iter().cloned(),
        )
    }

    /// Directory tokens are checked first, then file tokens.
    pub fn check(&self, containing_dir: &str, file_name: &str) -> Option<Exclusion> {
        if let Some(token) = self.dirs.iter().find(|t| containing_dir.contains(t.as_str())) {
            return Some(Exclusion::Directory(token.clone()));
        }
        self.files
            .iter()
            .find(|t| file_name.contains(t.as_str()))
            .map(|t| Exclusion::File(t.clone()))
    }
}

/// A file matched by a package manager pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredManifest {
    pub path: PathBuf,
    /// Path relative to the source root, `/`-separated
    pub relative_path: String,
    pub package_manager: String,
    /// Name of the immediate parent directory, empty when it cannot be derived
    pub label: String,
    pub name: String,
    pub exclusion: Option<Exclusion>,
}

impl DiscoveredManifest {
    pub fn is_excluded(&self) -> bool {
        self.exclusion.is_some()
    }
}

pub struct ManifestDiscovery {
    root: PathBuf,
    rules: ExclusionRules,
}

impl ManifestDiscovery {
    pub fn new(root: impl Into<PathBuf>, rules: ExclusionRules) -> Self {
        Self {
            root: root.into(),
            rules,
        }
    }

    /// Ordered candidates: package managers in the given order, patterns in
    /// order, files sorted by path. A file matched twice for the same package
    /// manager appears once.
    pub fn discover(&self, patterns: &[ManifestPattern]) -> Vec<DiscoveredManifest> {
        let files = self.collect_files();
        debug!(
            root = %self.root.display(),
            files = files.len(),
            "Collected source tree"
        );

        let mut manifests = Vec::new();
        for entry in patterns {
            let mut seen = HashSet::new();
            for raw in &entry.patterns {
                let Some(pattern) = compile(raw) else {
                    continue;
                };
                for relative in files.iter().filter(|f| pattern.matches_with(f, MATCH_OPTIONS)) {
                    if !seen.insert(relative.clone()) {
                        continue;
                    }
                    manifests.push(self.candidate(&entry.package_manager, relative));
                }
            }
        }

        let excluded = manifests.iter().filter(|m| m.is_excluded()).count();
        info!(
            candidates = manifests.len(),
            excluded,
            "Manifest discovery complete"
        );
        manifests
    }

    fn candidate(&self, package_manager: &str, relative: &str) -> DiscoveredManifest {
        let path = self.root.join(relative);
        let (containing_dir, name) = match relative.rsplit_once('/') {
            Some((dir, name)) => (dir, name),
            None => ("", relative),
        };

        let exclusion = self.rules.check(containing_dir, name);
        if let Some(reason) = &exclusion {
            debug!(path = %path.display(), %reason, "Manifest excluded");
        }

        DiscoveredManifest {
            label: derive_label(&path),
            name: name.to_string(),
            relative_path: relative.to_string(),
            package_manager: package_manager.to_string(),
            exclusion,
            path,
        }
    }

    fn collect_files(&self) -> Vec<String> {
        let mut files = Vec::new();

        for result in WalkBuilder::new(&self.root)
            .hidden(false)
            .ignore(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .parents(false)
            .follow_links(true)
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden_dir(entry))
            .sort_by_file_name(|a, b| a.cmp(b))
            .build()
        {
            let entry = match result {
                Ok(e) => e,
                Err(err) => {
                    warn!(error = %err, "Failed to read directory entry");
                    continue;
                }
            };

            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }

            if let Some(relative) = relative_slash_path(&self.root, entry.path()) {
                files.push(relative);
            }
        }

        files.sort();
        files
    }
}

fn compile(raw: &str) -> Option<Pattern> {
    let trimmed = raw.trim().trim_start_matches("./").trim_start_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    let anchored = if trimmed.starts_with("**/") {
        trimmed.to_string()
    } else {
        format!("**/{}", trimmed)
    };

    match Pattern::new(&anchored) {
        Ok(p) => Some(p),
        Err(err) => {
            warn!(pattern = raw, error = %err, "Skipping invalid manifest pattern");
            None
        }
    }
}

fn is_hidden_dir(entry: &ignore::DirEntry) -> bool {
    entry.file_type().is_some_and(|t| t.is_dir())
        && entry.file_name().to_str().is_some_and(|n| n.starts_with('.'))
}

fn relative_slash_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Option<Vec<&str>> = relative.components().map(|c| c.as_os_str().to_str()).collect();
    Some(parts?.join("/"))
}

/// Last segment of the containing directory, or empty
pub fn derive_label(path: &Path) -> String {
    path.parent()
        .and_then(Path::file_name)
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string()
}
