use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PubupError, Result};
use crate::files::{DependencyFile, LOCKFILE_NAME, MANIFEST_NAME};
use crate::utils::paths;

/// Directories never scanned for manifests: VCS metadata, pub caches and
/// build output.
const SKIPPED_DIRS: &[&str] = &[".git", ".dart_tool", "build"];

/// Loads the project snapshot: every pubspec manifest and lockfile under
/// the root, as immutable in-memory content.
pub struct ProjectScannerAgent {
    project_path: PathBuf,
}

impl ProjectScannerAgent {
    pub fn new<P: AsRef<Path>>(project_path: P) -> Result<Self> {
        let project_path = paths::validate_project_root(project_path)?;
        Ok(Self { project_path })
    }

    pub fn project_path(&self) -> &Path {
        &self.project_path
    }

    /// Walk the tree and snapshot every `pubspec.yaml` / `pubspec.lock`.
    ///
    /// Fails with a missing-manifest error when not a single manifest is
    /// found, since there is nothing a dependency update could ever do.
    pub fn load_snapshot(&self) -> Result<Vec<DependencyFile>> {
        let mut files = Vec::new();
        self.walk(&self.project_path, &mut files)?;
        files.sort_by(|a, b| a.name.cmp(&b.name));

        if !files.iter().any(DependencyFile::is_manifest) {
            return Err(PubupError::MissingManifest);
        }
        Ok(files)
    }

    fn walk(&self, dir: &Path, files: &mut Vec<DependencyFile>) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();

            if path.is_dir() {
                if file_name.starts_with('.') || SKIPPED_DIRS.contains(&file_name.as_ref()) {
                    continue;
                }
                self.walk(&path, files)?;
                continue;
            }

            if file_name != MANIFEST_NAME && file_name != LOCKFILE_NAME {
                continue;
            }

            let content = fs::read_to_string(&path)?;
            files.push(DependencyFile::new(
                self.relative_name(&path),
                self.relative_directory(&path),
                content,
            ));
        }
        Ok(())
    }

    fn relative_name(&self, path: &Path) -> String {
        path.strip_prefix(&self.project_path)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    fn relative_directory(&self, path: &Path) -> String {
        let parent = path.parent().unwrap_or(path);
        let relative = parent.strip_prefix(&self.project_path).unwrap_or(parent);
        if relative.as_os_str().is_empty() {
            ".".to_string()
        } else {
            relative.to_string_lossy().replace('\\', "/")
        }
    }
}
