use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::{PubupError, Result};
use crate::files::DependencyFile;

/// Hands out disposable scratch directories, one per staged pair.
pub trait WorkspaceProvisioner: Send + Sync {
    fn provision(&self) -> Result<Workspace>;
}

/// A scratch directory exclusively owned by one orchestration step.
///
/// Files are staged flat under their final file name; the external updater
/// runs with the workspace root as its working directory. When backed by a
/// temporary directory the whole tree is deleted on drop, whatever the
/// outcome of the invocation.
pub struct Workspace {
    root: PathBuf,
    _guard: Option<TempDir>,
}

impl Workspace {
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            _guard: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Write a snapshot file into the workspace under its file name.
    pub fn stage(&self, file: &DependencyFile) -> Result<PathBuf> {
        let target = self.root.join(file.file_name());
        fs::write(&target, &file.content)?;
        Ok(target)
    }

    /// Read a staged file's content after the updater has run.
    pub fn read_back(&self, file: &DependencyFile) -> Result<String> {
        let target = self.root.join(file.file_name());
        fs::read_to_string(&target).map_err(PubupError::Io)
    }
}

/// Default provisioner backed by `tempfile`, cleaning up on drop.
#[derive(Debug, Default)]
pub struct TempWorkspaceProvisioner;

impl WorkspaceProvisioner for TempWorkspaceProvisioner {
    fn provision(&self) -> Result<Workspace> {
        let dir = tempfile::Builder::new().prefix("pubup-").tempdir()?;
        Ok(Workspace {
            root: dir.path().to_path_buf(),
            _guard: Some(dir),
        })
    }
}
