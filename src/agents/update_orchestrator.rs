use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::changes::ChangeDetector;
use crate::credentials::CredentialConfigurator;
use crate::dependency::TargetDependency;
use crate::error::{PubupError, Result};
use crate::files::{DependencyFile, ManifestLockPair, pair_by_directory};
use crate::workspace::WorkspaceProvisioner;

/// Boundary to the external tool that owns dependency resolution.
///
/// Given a working directory holding a staged manifest and lockfile, the
/// invoker upgrades exactly one dependency and mutates both files in place.
/// Exit semantics are the tool's; the orchestrator only observes resulting
/// file content.
pub trait ResolverInvoker: Send + Sync {
    fn upgrade(
        &self,
        workdir: &Path,
        dependency: &str,
        version: Option<&str>,
        env: &[(String, String)],
    ) -> Result<()>;
}

/// One rewritten file: old and new content always differ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedFile {
    pub name: String,
    pub directory: String,
    pub old_content: String,
    pub new_content: String,
}

/// Outcome of an update run: which files changed, keyed by file name.
///
/// Zero entries never leaves the orchestrator; that case surfaces as an
/// error instead, because "update a dependency" promises forward progress.
#[derive(Debug, Default)]
pub struct UpdateResult {
    entries: BTreeMap<String, ChangedFile>,
    stale_manifests: Vec<String>,
}

impl UpdateResult {
    fn record(&mut self, change: ChangedFile) {
        self.entries.insert(change.name.clone(), change);
    }

    fn record_stale(&mut self, manifest: String) {
        self.stale_manifests.push(manifest);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, name: &str) -> Option<&ChangedFile> {
        self.entries.get(name)
    }

    pub fn changed_files(&self) -> impl Iterator<Item = &ChangedFile> {
        self.entries.values()
    }

    /// Pairs that were selected for update but came back untouched. Only
    /// populated when the run is configured to continue past stale pairs.
    pub fn stale_manifests(&self) -> &[String] {
        &self.stale_manifests
    }
}

enum PairOutcome {
    Unchanged,
    Updated(Vec<ChangedFile>),
    Stale,
}

/// Drives a single-dependency update across every manifest/lockfile pair of
/// a project snapshot.
///
/// All side effects go through injected collaborators, so the orchestrator
/// itself holds no global state and runs against fakes in tests. One
/// invocation updates exactly one dependency; callers wanting several issue
/// sequential runs and never share a project root between concurrent runs.
pub struct UpdateOrchestrator {
    resolver: Arc<dyn ResolverInvoker>,
    workspaces: Arc<dyn WorkspaceProvisioner>,
    credentials: Arc<dyn CredentialConfigurator>,
    changes: Arc<dyn ChangeDetector>,
    continue_on_stale: bool,
}

impl UpdateOrchestrator {
    pub fn new(
        resolver: Arc<dyn ResolverInvoker>,
        workspaces: Arc<dyn WorkspaceProvisioner>,
        credentials: Arc<dyn CredentialConfigurator>,
        changes: Arc<dyn ChangeDetector>,
    ) -> Self {
        Self {
            resolver,
            workspaces,
            credentials,
            changes,
            continue_on_stale: false,
        }
    }

    /// Keep processing remaining pairs when one comes back stale, instead of
    /// aborting on the first. The run still fails if nothing changed at all.
    pub fn continue_on_stale(mut self, enabled: bool) -> Self {
        self.continue_on_stale = enabled;
        self
    }

    /// Update one dependency across the snapshot.
    ///
    /// Manifests without a lockfile in their directory are silently excluded.
    /// Fails before any subprocess work when the snapshot has no manifest at
    /// all, and fails afterwards when no file content changed anywhere.
    pub fn update_dependency(
        &self,
        files: &[DependencyFile],
        dependency: &TargetDependency,
    ) -> Result<UpdateResult> {
        if !files.iter().any(DependencyFile::is_manifest) {
            return Err(PubupError::MissingManifest);
        }

        let mut result = UpdateResult::default();
        for pair in pair_by_directory(files) {
            match self.update_pair(&pair, dependency)? {
                PairOutcome::Unchanged => {}
                PairOutcome::Updated(changes) => {
                    for change in changes {
                        result.record(change);
                    }
                }
                PairOutcome::Stale => {
                    if !self.continue_on_stale {
                        return Err(PubupError::StaleUpdate {
                            manifest: pair.manifest.name.clone(),
                        });
                    }
                    result.record_stale(pair.manifest.name.clone());
                }
            }
        }

        if result.is_empty() {
            return Err(PubupError::NoChanges);
        }
        Ok(result)
    }

    fn update_pair(
        &self,
        pair: &ManifestLockPair,
        dependency: &TargetDependency,
    ) -> Result<PairOutcome> {
        if !self.changes.file_changed(&pair.manifest) && !self.changes.file_changed(&pair.lockfile)
        {
            return Ok(PairOutcome::Unchanged);
        }

        let workspace = self.workspaces.provision()?;
        workspace.stage(&pair.manifest)?;
        workspace.stage(&pair.lockfile)?;

        // Credentials live exactly as long as the resolver call.
        let guard = self.credentials.configure(workspace.path())?;
        self.resolver.upgrade(
            workspace.path(),
            &dependency.name,
            dependency.version.as_deref(),
            guard.env(),
        )?;
        drop(guard);

        let mut changes = Vec::new();
        for file in [&pair.manifest, &pair.lockfile] {
            let new_content = workspace.read_back(file)?;
            if new_content != file.content && !file.immutable {
                changes.push(ChangedFile {
                    name: file.name.clone(),
                    directory: file.directory.clone(),
                    old_content: file.content.clone(),
                    new_content,
                });
            }
        }

        if changes.is_empty() {
            return Ok(PairOutcome::Stale);
        }
        Ok(PairOutcome::Updated(changes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Mutex;

    use crate::changes::AlwaysChanged;
    use crate::credentials::{CredentialGuard, NoCredentials};
    use crate::dependency::{DependencyRequirement, RequirementSource};
    use crate::files::{LOCKFILE_NAME, MANIFEST_NAME};
    use crate::workspace::TempWorkspaceProvisioner;

    enum Behavior {
        RewriteBoth,
        RewriteLockOnly,
        /// Rewrite the lockfile only when the staged manifest contains the
        /// given marker, leaving other pairs untouched.
        RewriteLockWhenManifestContains(&'static str),
        Noop,
        Fail,
    }

    struct FakeResolver {
        behavior: Behavior,
        seen_workdirs: Mutex<Vec<PathBuf>>,
    }

    impl FakeResolver {
        fn new(behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                behavior,
                seen_workdirs: Mutex::new(Vec::new()),
            })
        }

        fn invocations(&self) -> usize {
            self.seen_workdirs.lock().unwrap().len()
        }
    }

    impl ResolverInvoker for FakeResolver {
        fn upgrade(
            &self,
            workdir: &Path,
            dependency: &str,
            _version: Option<&str>,
            _env: &[(String, String)],
        ) -> Result<()> {
            self.seen_workdirs
                .lock()
                .unwrap()
                .push(workdir.to_path_buf());

            let lock_path = workdir.join(LOCKFILE_NAME);
            let manifest_path = workdir.join(MANIFEST_NAME);
            match &self.behavior {
                Behavior::RewriteBoth => {
                    fs::write(&manifest_path, format!("name: app\n# {dependency} bumped\n"))?;
                    fs::write(&lock_path, format!("packages:\n  {dependency}: 2.0.0\n"))?;
                }
                Behavior::RewriteLockOnly => {
                    fs::write(&lock_path, format!("packages:\n  {dependency}: 2.0.0\n"))?;
                }
                Behavior::RewriteLockWhenManifestContains(marker) => {
                    let manifest = fs::read_to_string(&manifest_path)?;
                    if manifest.contains(marker) {
                        fs::write(&lock_path, format!("packages:\n  {dependency}: 2.0.0\n"))?;
                    }
                }
                Behavior::Noop => {}
                Behavior::Fail => {
                    return Err(PubupError::SubprocessFailure {
                        command: "dart pub upgrade".to_string(),
                        status: 65,
                        stderr: "version solving failed".to_string(),
                    });
                }
            }
            Ok(())
        }
    }

    /// Real git credential configurator, so failure paths exercise the
    /// guard's cleanup of staged secret files.
    struct StagedGitCredentials;

    impl CredentialConfigurator for StagedGitCredentials {
        fn configure(&self, scratch: &Path) -> Result<CredentialGuard> {
            crate::credentials::GitCredentialConfigurator::new(vec![
                crate::credentials::Credential {
                    kind: crate::credentials::GIT_SOURCE.to_string(),
                    host: "github.com".to_string(),
                    username: Some("u".to_string()),
                    password: Some("p".to_string()),
                },
            ])
            .configure(scratch)
        }
    }

    fn target(name: &str) -> TargetDependency {
        TargetDependency::new(
            name,
            Some("2.0.0".to_string()),
            DependencyRequirement {
                requirement: Some("^2.0.0".to_string()),
                groups: vec![],
                file: MANIFEST_NAME.to_string(),
                source: RequirementSource::hosted_default(),
            },
        )
    }

    fn manifest_in(dir: &str, content: &str) -> DependencyFile {
        let name = if dir == "." {
            MANIFEST_NAME.to_string()
        } else {
            format!("{dir}/{MANIFEST_NAME}")
        };
        DependencyFile::new(name, dir, content)
    }

    fn lockfile_in(dir: &str, content: &str) -> DependencyFile {
        let name = if dir == "." {
            LOCKFILE_NAME.to_string()
        } else {
            format!("{dir}/{LOCKFILE_NAME}")
        };
        DependencyFile::new(name, dir, content)
    }

    fn orchestrator(resolver: Arc<FakeResolver>) -> UpdateOrchestrator {
        UpdateOrchestrator::new(
            resolver,
            Arc::new(TempWorkspaceProvisioner),
            Arc::new(NoCredentials),
            Arc::new(AlwaysChanged),
        )
    }

    #[test]
    fn rejects_snapshots_without_any_manifest() {
        let resolver = FakeResolver::new(Behavior::RewriteBoth);
        let files = vec![lockfile_in(".", "packages: {}\n")];
        let err = orchestrator(resolver.clone())
            .update_dependency(&files, &target("path"))
            .unwrap_err();

        assert!(matches!(err, PubupError::MissingManifest));
        assert_eq!(resolver.invocations(), 0);
    }

    #[test]
    fn lockless_manifest_is_excluded_without_invoking_the_resolver() {
        let resolver = FakeResolver::new(Behavior::RewriteBoth);
        let files = vec![
            manifest_in("a", "name: a\ndeps: path\n"),
            lockfile_in("a", "packages:\n  path: 1.7.0\n"),
            manifest_in("b", "name: b\n"),
        ];

        let result = orchestrator(resolver.clone())
            .update_dependency(&files, &target("path"))
            .unwrap();

        assert_eq!(resolver.invocations(), 1);
        assert!(result.get("a/pubspec.yaml").is_some());
        assert!(result.get("b/pubspec.yaml").is_none());
    }

    #[test]
    fn lockfile_only_change_is_a_valid_single_entry() {
        let resolver = FakeResolver::new(Behavior::RewriteLockOnly);
        let files = vec![
            manifest_in(".", "name: app\n"),
            lockfile_in(".", "packages:\n  path: 1.7.0\n"),
        ];

        let result = orchestrator(resolver)
            .update_dependency(&files, &target("path"))
            .unwrap();

        assert_eq!(result.len(), 1);
        let change = result.get(LOCKFILE_NAME).unwrap();
        assert_ne!(change.old_content, change.new_content);
        assert!(change.new_content.contains("2.0.0"));
    }

    #[test]
    fn untouched_pair_fails_as_stale() {
        let resolver = FakeResolver::new(Behavior::Noop);
        let files = vec![
            manifest_in(".", "name: app\n"),
            lockfile_in(".", "packages:\n  path: 1.7.0\n"),
        ];

        let err = orchestrator(resolver)
            .update_dependency(&files, &target("path"))
            .unwrap_err();
        assert!(matches!(err, PubupError::StaleUpdate { manifest } if manifest == MANIFEST_NAME));
    }

    #[test]
    fn continue_on_stale_records_the_pair_and_keeps_going() {
        let resolver = FakeResolver::new(Behavior::RewriteLockWhenManifestContains("path"));
        let files = vec![
            manifest_in("a", "name: a\ndeps: path\n"),
            lockfile_in("a", "packages:\n  path: 1.7.0\n"),
            manifest_in("b", "name: b\n"),
            lockfile_in("b", "packages: {}\n"),
        ];

        let result = orchestrator(resolver)
            .continue_on_stale(true)
            .update_dependency(&files, &target("path"))
            .unwrap();

        assert_eq!(result.len(), 1);
        assert!(result.get("a/pubspec.lock").is_some());
        assert_eq!(result.stale_manifests(), ["b/pubspec.yaml"]);
    }

    #[test]
    fn all_pairs_stale_still_fails_even_when_continuing() {
        let resolver = FakeResolver::new(Behavior::Noop);
        let files = vec![
            manifest_in(".", "name: app\n"),
            lockfile_in(".", "packages: {}\n"),
        ];

        let err = orchestrator(resolver)
            .continue_on_stale(true)
            .update_dependency(&files, &target("path"))
            .unwrap_err();
        assert!(matches!(err, PubupError::NoChanges));
    }

    #[test]
    fn second_run_on_upgraded_snapshot_reports_no_changes() {
        let files = vec![
            manifest_in(".", "name: app\n"),
            lockfile_in(".", "packages:\n  path: 1.7.0\n"),
        ];
        let first = orchestrator(FakeResolver::new(Behavior::RewriteLockOnly))
            .update_dependency(&files, &target("path"))
            .unwrap();

        // Apply the result to a fresh snapshot, then update again with a
        // resolver that has nothing left to do.
        let upgraded = vec![
            files[0].clone(),
            DependencyFile::new(
                LOCKFILE_NAME,
                ".",
                first.get(LOCKFILE_NAME).unwrap().new_content.clone(),
            ),
        ];
        let err = orchestrator(FakeResolver::new(Behavior::Noop))
            .update_dependency(&upgraded, &target("path"))
            .unwrap_err();
        assert!(matches!(err, PubupError::StaleUpdate { .. } | PubupError::NoChanges));
    }

    #[test]
    fn unchanged_pairs_are_skipped_entirely() {
        struct NothingChanged;
        impl ChangeDetector for NothingChanged {
            fn file_changed(&self, _file: &DependencyFile) -> bool {
                false
            }
        }

        let resolver = FakeResolver::new(Behavior::RewriteBoth);
        let files = vec![
            manifest_in(".", "name: app\n"),
            lockfile_in(".", "packages: {}\n"),
        ];
        let orchestrator = UpdateOrchestrator::new(
            resolver.clone(),
            Arc::new(TempWorkspaceProvisioner),
            Arc::new(NoCredentials),
            Arc::new(NothingChanged),
        );

        let err = orchestrator
            .update_dependency(&files, &target("path"))
            .unwrap_err();
        assert!(matches!(err, PubupError::NoChanges));
        assert_eq!(resolver.invocations(), 0);
    }

    #[test]
    fn resolver_failure_propagates_and_cleans_up_scratch_and_credentials() {
        let resolver = FakeResolver::new(Behavior::Fail);
        let files = vec![
            manifest_in(".", "name: app\n"),
            lockfile_in(".", "packages: {}\n"),
        ];
        let orchestrator = UpdateOrchestrator::new(
            resolver.clone(),
            Arc::new(TempWorkspaceProvisioner),
            Arc::new(StagedGitCredentials),
            Arc::new(AlwaysChanged),
        );

        let err = orchestrator
            .update_dependency(&files, &target("path"))
            .unwrap_err();
        assert!(matches!(err, PubupError::SubprocessFailure { .. }));

        let workdirs = resolver.seen_workdirs.lock().unwrap();
        assert_eq!(workdirs.len(), 1);
        // Scratch directory gone means the staged credentials went with it.
        assert!(!workdirs[0].exists());
    }

    #[test]
    fn immutable_files_never_receive_new_content() {
        let resolver = FakeResolver::new(Behavior::RewriteLockOnly);
        let files = vec![
            manifest_in(".", "name: app\n"),
            lockfile_in(".", "packages: {}\n").immutable(),
        ];

        let err = orchestrator(resolver)
            .update_dependency(&files, &target("path"))
            .unwrap_err();
        // The only rewritten file was immutable, so the pair made no
        // progress.
        assert!(matches!(err, PubupError::StaleUpdate { .. }));
    }
}
