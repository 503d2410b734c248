//! Request-scoped scratch directories for uploaded reference images.
//!
//! A [`Workspace`] is a freshly created, randomly named directory under the configured root. It is
//! owned by exactly one in-flight request and removed when released, either explicitly or when the
//! value is dropped (early return, panic, cancelled future).

use crate::api::models::materials::UploadedFile;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

const WORKSPACE_PREFIX: &str = "materials-";
const FALLBACK_FILE_NAME: &str = "reference";

#[derive(Debug)]
pub struct Workspace {
    dir: Option<TempDir>,
    path: PathBuf,
    used_names: HashSet<String>,
}

impl Workspace {
    /// Create a new uniquely named directory inside `root`, creating `root` if needed.
    pub fn acquire(root: &Path) -> io::Result<Self> {
        std::fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new().prefix(WORKSPACE_PREFIX).tempdir_in(root)?;
        let path = dir.path().to_path_buf();
        debug!(workspace = %path.display(), "Acquired workspace");

        Ok(Self {
            dir: Some(dir),
            path,
            used_names: HashSet::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write an uploaded file into the workspace under a sanitized name and return where it went.
    pub async fn materialize(&mut self, file: &UploadedFile) -> io::Result<PathBuf> {
        if self.dir.is_none() {
            return Err(io::Error::new(io::ErrorKind::NotFound, "workspace already released"));
        }

        let name = self.claim_name(&sanitize_file_name(&file.file_name));
        let target = self.path.join(&name);
        tokio::fs::write(&target, &file.data).await?;

        debug!(
            declared = %file.file_name,
            stored = %target.display(),
            bytes = file.data.len(),
            "Materialized reference file"
        );
        Ok(target)
    }

    /// Materialize each file in order, returning the stored paths in the same order.
    pub async fn materialize_all(&mut self, files: &[UploadedFile]) -> io::Result<Vec<PathBuf>> {
        let mut paths = Vec::with_capacity(files.len());
        for file in files {
            paths.push(self.materialize(file).await?);
        }
        Ok(paths)
    }

    /// Remove the directory and everything in it. Safe to call more than once, and a directory
    /// that has already disappeared is not an error.
    pub fn release(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };

        match dir.close() {
            Ok(()) => debug!(workspace = %self.path.display(), "Released workspace"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(workspace = %self.path.display(), error = %e, "Failed to remove workspace"),
        }
    }

    /// Two uploads may sanitize to the same name; later ones get a numeric prefix.
    fn claim_name(&mut self, sanitized: &str) -> String {
        if self.used_names.insert(sanitized.to_string()) {
            return sanitized.to_string();
        }
        let mut n = 1;
        loop {
            let candidate = format!("{n}_{sanitized}");
            if self.used_names.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.release();
    }
}

/// Reduce a client-declared file name to a single safe path component.
///
/// Directory components (either separator) are dropped, anything outside `[A-Za-z0-9._-]` becomes
/// `_`, and leading/trailing dots and underscores are stripped so the result can never be `.`,
/// `..` or a hidden file.
pub fn sanitize_file_name(declared: &str) -> String {
    let base = declared.rsplit(['/', '\\']).next().unwrap_or("");

    let replaced: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
        .collect();

    let trimmed = replaced.trim_matches(|c| c == '.' || c == '_');
    if trimmed.is_empty() {
        FALLBACK_FILE_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}
