//! Per-call temporary artifacts.

use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

/// Owns the temporary files of a single execution.
///
/// Paths are registered before anything is written to them, so every file a
/// call may have created is removed when the guard drops, whichever exit path
/// the call took.
pub struct Staging {
    id: String,
    dir: PathBuf,
    prefix: &'static str,
    paths: Vec<PathBuf>,
}

impl Staging {
    /// Create a staging area under `dir`. Names look like `polycell_<prefix>_<id><suffix>`.
    pub fn new(dir: impl Into<PathBuf>, prefix: &'static str) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            dir: dir.into(),
            prefix,
            paths: Vec::new(),
        }
    }

    /// Unique identifier shared by every artifact of this call.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Reserve a path for cleanup without creating it.
    pub fn path(&mut self, suffix: &str) -> PathBuf {
        let path = self
            .dir
            .join(format!("polycell_{}_{}{}", self.prefix, self.id, suffix));
        self.paths.push(path.clone());
        path
    }

    /// Reserve a path and write `contents` to it.
    pub async fn write(&mut self, suffix: &str, contents: &str) -> io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path(suffix);
        tokio::fs::write(&path, contents).await?;
        Ok(path)
    }

    /// Paths registered so far.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl Drop for Staging {
    fn drop(&mut self) {
        for path in &self.paths {
            remove_quietly(path);
        }
    }
}

fn remove_quietly(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::debug!("Failed to remove {}: {}", path.display(), e),
    }
}
