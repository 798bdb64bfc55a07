//! Sources of prior document revisions
//!
//! The comparator never talks to version control directly; it receives a
//! [`RevisionSource`] and asks it for the bytes of a file at a revision.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::error::FetchError;

/// Capability to fetch a file's content as of a named revision
///
/// The revision is an opaque string (commit hash, tag, branch) passed through
/// untouched. Implementations must report a missing file or revision as
/// [`FetchError::NotFound`].
#[cfg_attr(test, mockall::automock)]
pub trait RevisionSource: Send + Sync {
    fn fetch(&self, revision: &str, file_path: &str) -> Result<Vec<u8>, FetchError>;
}

/// Reads prior revisions with `git show <rev>:<path>`
#[derive(Debug, Clone)]
pub struct GitRevisionSource {
    repo_dir: PathBuf,
}

impl GitRevisionSource {
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
        }
    }

    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }
}

impl RevisionSource for GitRevisionSource {
    fn fetch(&self, revision: &str, file_path: &str) -> Result<Vec<u8>, FetchError> {
        let object = format!("{}:{}", revision, file_path);
        debug!(repo = %self.repo_dir.display(), %object, "Running git show");

        let output = Command::new("git")
            .args(["show", &object])
            .current_dir(&self.repo_dir)
            .output()
            .map_err(|e| FetchError::Failed {
                revision: revision.to_string(),
                path: file_path.to_string(),
                reason: format!("failed to run git: {}", e),
            })?;

        if output.status.success() {
            return Ok(output.stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if is_missing_object(&stderr) {
            Err(FetchError::NotFound {
                revision: revision.to_string(),
                path: file_path.to_string(),
            })
        } else {
            Err(FetchError::Failed {
                revision: revision.to_string(),
                path: file_path.to_string(),
                reason: stderr.trim().to_string(),
            })
        }
    }
}

/// Whether git's stderr describes an unknown revision or a path absent from it
fn is_missing_object(stderr: &str) -> bool {
    const MARKERS: [&str; 5] = [
        "does not exist in",
        "exists on disk, but not in",
        "invalid object name",
        "unknown revision",
        "bad revision",
    ];
    let lower = stderr.to_ascii_lowercase();
    MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Fixture-backed source keyed by (revision, path)
#[derive(Debug, Clone, Default)]
pub struct InMemoryRevisionSource {
    files: HashMap<(String, String), Vec<u8>>,
}

impl InMemoryRevisionSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(
        mut self,
        revision: impl Into<String>,
        path: impl Into<String>,
        content: impl Into<Vec<u8>>,
    ) -> Self {
        self.insert(revision, path, content);
        self
    }

    pub fn insert(
        &mut self,
        revision: impl Into<String>,
        path: impl Into<String>,
        content: impl Into<Vec<u8>>,
    ) {
        self.files
            .insert((revision.into(), path.into()), content.into());
    }
}

impl RevisionSource for InMemoryRevisionSource {
    fn fetch(&self, revision: &str, file_path: &str) -> Result<Vec<u8>, FetchError> {
        self.files
            .get(&(revision.to_string(), file_path.to_string()))
            .cloned()
            .ok_or_else(|| FetchError::NotFound {
                revision: revision.to_string(),
                path: file_path.to_string(),
            })
    }
}

/// Adapter turning a closure into a [`RevisionSource`]
pub struct FnRevisionSource<F>(F);

impl<F> FnRevisionSource<F>
where
    F: Fn(&str, &str) -> Result<Vec<u8>, FetchError> + Send + Sync,
{
    pub fn new(fetch: F) -> Self {
        Self(fetch)
    }
}

impl<F> RevisionSource for FnRevisionSource<F>
where
    F: Fn(&str, &str) -> Result<Vec<u8>, FetchError> + Send + Sync,
{
    fn fetch(&self, revision: &str, file_path: &str) -> Result<Vec<u8>, FetchError> {
        (self.0)(revision, file_path)
    }
}
