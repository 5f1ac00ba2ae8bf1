use std::path::Path;

/// File name every pub manifest carries, regardless of directory.
pub const MANIFEST_NAME: &str = "pubspec.yaml";
/// File name of the machine-generated lockfile next to a manifest.
pub const LOCKFILE_NAME: &str = "pubspec.lock";

/// One tracked file of the project snapshot.
///
/// `name` is the path relative to the project root; `directory` is the
/// grouping key used to pair manifests with lockfiles. Snapshots are loaded
/// once and never mutated: an update produces new content strings on the
/// side, it never rewrites a snapshot in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyFile {
    pub name: String,
    pub directory: String,
    pub content: String,
    /// Immutable files are tracked for context but must never be rewritten.
    pub immutable: bool,
}

impl DependencyFile {
    pub fn new(
        name: impl Into<String>,
        directory: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            directory: directory.into(),
            content: content.into(),
            immutable: false,
        }
    }

    pub fn immutable(mut self) -> Self {
        self.immutable = true;
        self
    }

    pub fn is_manifest(&self) -> bool {
        self.file_name() == MANIFEST_NAME
    }

    pub fn is_lockfile(&self) -> bool {
        self.file_name() == LOCKFILE_NAME
    }

    /// Final path component, used when staging into a flat scratch directory.
    pub fn file_name(&self) -> &str {
        Path::new(&self.name)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.name)
    }
}

/// A manifest and its lockfile sharing a directory, updated together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestLockPair {
    pub manifest: DependencyFile,
    pub lockfile: DependencyFile,
}

impl ManifestLockPair {
    pub fn directory(&self) -> &str {
        &self.manifest.directory
    }
}

/// Pair every manifest with the lockfile from the same directory.
///
/// A manifest without a matching lockfile is skipped, not an error;
/// lockfiles are optional in some project layouts.
pub fn pair_by_directory(files: &[DependencyFile]) -> Vec<ManifestLockPair> {
    let mut pairs = Vec::new();

    for manifest in files.iter().filter(|f| f.is_manifest()) {
        let lockfile = files
            .iter()
            .find(|f| f.is_lockfile() && f.directory == manifest.directory);

        if let Some(lockfile) = lockfile {
            pairs.push(ManifestLockPair {
                manifest: manifest.clone(),
                lockfile: lockfile.clone(),
            });
        }
    }

    pairs
}

/// Manifests that have no lockfile next to them and are therefore excluded
/// from any update run.
pub fn unpaired_manifests(files: &[DependencyFile]) -> Vec<&DependencyFile> {
    files
        .iter()
        .filter(|f| {
            f.is_manifest()
                && !files
                    .iter()
                    .any(|l| l.is_lockfile() && l.directory == f.directory)
        })
        .collect()
}
