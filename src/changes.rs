use std::collections::HashMap;

use sha2::{Digest, Sha256};

use crate::files::DependencyFile;

/// Decides whether a file differs from its last known snapshot.
///
/// Pairs where neither member changed are skipped by the orchestrator, so
/// the detector is what scopes an update run.
pub trait ChangeDetector: Send + Sync {
    fn file_changed(&self, file: &DependencyFile) -> bool;
}

/// Marks every file as changed. Used when no earlier snapshot exists and the
/// whole project should be put through the updater.
#[derive(Debug, Default)]
pub struct AlwaysChanged;

impl ChangeDetector for AlwaysChanged {
    fn file_changed(&self, _file: &DependencyFile) -> bool {
        true
    }
}

/// Compares content hashes against a recorded baseline.
///
/// Files absent from the baseline count as changed.
#[derive(Debug)]
pub struct ContentHashDetector {
    baseline: HashMap<String, Vec<u8>>,
}

impl ContentHashDetector {
    pub fn from_baseline(files: &[DependencyFile]) -> Self {
        let baseline = files
            .iter()
            .map(|f| (f.name.clone(), hash_content(&f.content)))
            .collect();
        Self { baseline }
    }
}

impl ChangeDetector for ContentHashDetector {
    fn file_changed(&self, file: &DependencyFile) -> bool {
        match self.baseline.get(&file.name) {
            Some(expected) => expected != &hash_content(&file.content),
            None => true,
        }
    }
}

/// Selects the pair a requirement originates from: the named manifest and
/// any file sharing its directory (the lockfile moves with its manifest).
#[derive(Debug)]
pub struct RequirementScopeDetector {
    manifest_name: String,
    directory: Option<String>,
}

impl RequirementScopeDetector {
    pub fn new(manifest_name: impl Into<String>, files: &[DependencyFile]) -> Self {
        let manifest_name = manifest_name.into();
        let directory = files
            .iter()
            .find(|f| f.name == manifest_name)
            .map(|f| f.directory.clone());
        Self {
            manifest_name,
            directory,
        }
    }
}

impl ChangeDetector for RequirementScopeDetector {
    fn file_changed(&self, file: &DependencyFile) -> bool {
        if file.name == self.manifest_name {
            return true;
        }
        match &self.directory {
            Some(dir) => &file.directory == dir,
            None => false,
        }
    }
}

fn hash_content(content: &str) -> Vec<u8> {
    // Normalize line endings so a checkout-only difference does not count.
    let normalized = content.replace("\r\n", "\n");
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hasher.finalize().to_vec()
}
