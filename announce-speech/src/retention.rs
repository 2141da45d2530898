//! Artifact retention.
//!
//! Keeps at most `max_files` artifacts in the output directory, deleting the
//! oldest by creation time first. Cleanup never fails the caller: listing and
//! deletion errors are logged and skipped.

use crate::request::{ARTIFACT_EXTENSION, ARTIFACT_PREFIX};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;
use tracing::{debug, info, warn};

/// Which files in the directory count as artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPattern {
    prefix: String,
    extension: String,
}

impl Default for ArtifactPattern {
    fn default() -> Self {
        Self::new(ARTIFACT_PREFIX, ARTIFACT_EXTENSION)
    }
}

impl ArtifactPattern {
    /// Match `<prefix>*.<extension>`.
    pub fn new(prefix: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            extension: extension.into(),
        }
    }

    /// Whether `file_name` is an artifact name.
    pub fn matches(&self, file_name: &str) -> bool {
        let Some(rest) = file_name.strip_prefix(self.prefix.as_str()) else {
            return false;
        };
        match rest.rsplit_once('.') {
            Some((stem, ext)) => !stem.is_empty() && ext == self.extension,
            None => false,
        }
    }
}

/// Outcome of one cleanup pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionReport {
    /// Artifacts left in the directory.
    pub kept: usize,
    /// Artifacts deleted by this pass, oldest first.
    pub removed: Vec<PathBuf>,
    /// Artifacts that could not be deleted.
    pub failed: Vec<PathBuf>,
}

/// Retention cap over one artifact directory.
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    dir: PathBuf,
    pattern: ArtifactPattern,
    max_files: usize,
}

struct ArtifactEntry {
    path: PathBuf,
    created: SystemTime,
}

impl RetentionPolicy {
    /// Keep at most `max_files` default-pattern artifacts in `dir`.
    pub fn new(dir: impl Into<PathBuf>, max_files: usize) -> Self {
        Self {
            dir: dir.into(),
            pattern: ArtifactPattern::default(),
            max_files,
        }
    }

    /// Replace the artifact pattern.
    pub fn with_pattern(mut self, pattern: ArtifactPattern) -> Self {
        self.pattern = pattern;
        self
    }

    /// Directory being managed.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Retention cap.
    pub fn max_files(&self) -> usize {
        self.max_files
    }

    /// Delete the oldest artifacts beyond the cap.
    ///
    /// Idempotent: a second pass over an already-trimmed directory removes
    /// nothing.
    pub async fn enforce(&self) -> RetentionReport {
        let mut entries = match list_artifacts(&self.dir, &self.pattern).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "Cleanup skipped: cannot list artifacts");
                return RetentionReport::default();
            }
        };

        entries.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.path.cmp(&b.path)));

        let excess = entries.len().saturating_sub(self.max_files);
        let mut report = RetentionReport {
            kept: entries.len() - excess,
            ..RetentionReport::default()
        };

        for entry in entries.drain(..excess) {
            match fs::remove_file(&entry.path).await {
                Ok(()) => {
                    info!(file = %display_name(&entry.path), "Cleaned up old artifact");
                    report.removed.push(entry.path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!(file = %display_name(&entry.path), "Artifact already removed");
                }
                Err(e) => {
                    warn!(file = %entry.path.display(), error = %e, "Could not delete artifact");
                    report.failed.push(entry.path);
                }
            }
        }

        report
    }

    /// Count artifacts currently on disk.
    pub async fn count(&self) -> usize {
        count_artifacts(&self.dir, &self.pattern).await
    }
}

/// Count the files in `dir` matching `pattern`. An unreadable directory
/// counts as empty.
pub async fn count_artifacts(dir: &Path, pattern: &ArtifactPattern) -> usize {
    list_artifacts(dir, pattern)
        .await
        .map(|entries| entries.len())
        .unwrap_or(0)
}

async fn list_artifacts(dir: &Path, pattern: &ArtifactPattern) -> std::io::Result<Vec<ArtifactEntry>> {
    let mut read_dir = fs::read_dir(dir).await?;
    let mut entries = Vec::new();

    while let Some(entry) = read_dir.next_entry().await? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !pattern.matches(name) {
            continue;
        }
        // Files can vanish between read_dir and stat.
        let Ok(metadata) = entry.metadata().await else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        let created = metadata
            .created()
            .or_else(|_| metadata.modified())
            .unwrap_or(UNIX_EPOCH);
        entries.push(ArtifactEntry {
            path: entry.path(),
            created,
        });
    }

    Ok(entries)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
