use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use semver::Version;
use serde::Deserialize;

use crate::agents::pub_execution::run_with_timeout;
use crate::error::{PubupError, Result};
use crate::files::ManifestLockPair;
use crate::dependency::RequirementSource;
use crate::workspace::WorkspaceProvisioner;

/// Produces the raw `pub outdated --json` report for a staged pair.
pub trait OutdatedReportSource: Send + Sync {
    fn outdated_report(&self, workdir: &Path, env: &[(String, String)]) -> Result<String>;
}

impl OutdatedReportSource for crate::agents::pub_execution::PubExecutionAgent {
    fn outdated_report(&self, workdir: &Path, env: &[(String, String)]) -> Result<String> {
        crate::agents::pub_execution::PubExecutionAgent::outdated_report(self, workdir, env)
    }
}

/// Versions the toolchain reports for one dependency.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionReport {
    pub current: Option<String>,
    /// Newest version reachable without touching the manifest constraint.
    pub resolvable: Option<String>,
    /// Newest published version, constraints aside.
    pub latest: Option<String>,
}

impl VersionReport {
    /// Whether moving to `latest` would be a real upgrade.
    pub fn can_update(&self) -> bool {
        let Some(latest) = self.latest.as_deref() else {
            return false;
        };
        match self.current.as_deref() {
            Some(current) => is_newer(latest, current),
            None => true,
        }
    }
}

fn is_newer(candidate: &str, current: &str) -> bool {
    match (Version::parse(candidate), Version::parse(current)) {
        (Ok(a), Ok(b)) => a > b,
        _ => candidate != current,
    }
}

// `dart pub outdated --json` report shape; only the fields read here.
#[derive(Debug, Deserialize)]
struct OutdatedReport {
    packages: Vec<OutdatedPackage>,
}

#[derive(Debug, Deserialize)]
struct OutdatedPackage {
    package: String,
    current: Option<VersionDescriptor>,
    resolvable: Option<VersionDescriptor>,
    latest: Option<VersionDescriptor>,
}

#[derive(Debug, Deserialize)]
struct VersionDescriptor {
    version: String,
}

/// Finds the latest permissible version of one dependency without ever
/// interpreting manifest or lockfile grammar itself.
///
/// Hosted dependencies go through the pub toolchain's outdated report; git
/// dependencies through the remote's tag list. Path dependencies have no
/// published versions and are never updatable.
pub struct UpdateCheckerAgent {
    reporter: Arc<dyn OutdatedReportSource>,
    workspaces: Arc<dyn WorkspaceProvisioner>,
    git_timeout: Duration,
}

impl UpdateCheckerAgent {
    pub fn new(
        reporter: Arc<dyn OutdatedReportSource>,
        workspaces: Arc<dyn WorkspaceProvisioner>,
        git_timeout: Duration,
    ) -> Self {
        Self {
            reporter,
            workspaces,
            git_timeout,
        }
    }

    pub fn versions_for(
        &self,
        pair: &ManifestLockPair,
        dependency: &str,
        source: &RequirementSource,
        env: &[(String, String)],
    ) -> Result<VersionReport> {
        match source {
            RequirementSource::Hosted { .. } => self.hosted_versions(pair, dependency, env),
            RequirementSource::Git { url, reference, .. } => {
                self.git_versions(url, reference.as_deref(), env)
            }
            RequirementSource::Path { .. } => Ok(VersionReport::default()),
        }
    }

    fn hosted_versions(
        &self,
        pair: &ManifestLockPair,
        dependency: &str,
        env: &[(String, String)],
    ) -> Result<VersionReport> {
        let workspace = self.workspaces.provision()?;
        workspace.stage(&pair.manifest)?;
        workspace.stage(&pair.lockfile)?;

        let raw = self.reporter.outdated_report(workspace.path(), env)?;
        Ok(parse_outdated_report(&raw, dependency)?.unwrap_or_default())
    }

    /// A git dependency is only upgradable when it is pinned to a
    /// version-like tag; branches and bare SHAs give nothing to move to.
    fn git_versions(
        &self,
        url: &str,
        reference: Option<&str>,
        env: &[(String, String)],
    ) -> Result<VersionReport> {
        let Some(reference) = reference else {
            return Ok(VersionReport::default());
        };
        let Some(current) = version_from_ref(reference) else {
            return Ok(VersionReport::default());
        };

        let mut command = Command::new("git");
        command.args(["ls-remote", "--tags", url]);
        for (key, value) in env {
            command.env(key, value);
        }
        let label = format!("git ls-remote --tags {url}");
        let output = run_with_timeout(command, &label, self.git_timeout)?;
        if !output.success {
            return Err(PubupError::GitOperation(format!(
                "{label} failed: {}",
                output.stderr.trim()
            )));
        }

        let latest = latest_tag_version(&output.stdout);
        Ok(VersionReport {
            current: Some(current.to_string()),
            resolvable: latest.clone(),
            latest,
        })
    }
}

fn parse_outdated_report(raw: &str, dependency: &str) -> Result<Option<VersionReport>> {
    let report: OutdatedReport = serde_json::from_str(raw)?;
    Ok(report
        .packages
        .into_iter()
        .find(|p| p.package == dependency)
        .map(|p| VersionReport {
            current: p.current.map(|d| d.version),
            resolvable: p.resolvable.map(|d| d.version),
            latest: p.latest.map(|d| d.version),
        }))
}

/// Extract the version carried by a tag-like ref, e.g. `1.7.0`,
/// `v1.7.0` or `tags/1.7.0`.
fn version_from_ref(reference: &str) -> Option<Version> {
    let trimmed = reference
        .rsplit('/')
        .next()
        .unwrap_or(reference)
        .trim_start_matches('v');
    Version::parse(trimmed).ok()
}

fn latest_tag_version(ls_remote_output: &str) -> Option<String> {
    let Ok(tag_re) = Regex::new(r"refs/tags/(v?\d+\.\d+\.\d+(?:[-+][0-9A-Za-z.\-]+)?)$") else {
        return None;
    };

    let mut versions: Vec<(Version, String)> = Vec::new();
    for line in ls_remote_output.lines() {
        // Peeled entries (`^{}`) duplicate the annotated tag itself.
        if line.ends_with("^{}") {
            continue;
        }
        let Some(captures) = tag_re.captures(line.trim()) else {
            continue;
        };
        let raw = captures[1].to_string();
        if let Ok(parsed) = Version::parse(raw.trim_start_matches('v')) {
            versions.push((parsed, raw));
        }
    }

    versions.sort_by(|a, b| a.0.cmp(&b.0));
    versions.pop().map(|(_, raw)| raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::files::{DependencyFile, LOCKFILE_NAME, MANIFEST_NAME};
    use crate::workspace::TempWorkspaceProvisioner;

    const SAMPLE_REPORT: &str = r#"{
        "packages": [
            {
                "package": "path",
                "current": {"version": "1.7.0"},
                "upgradable": {"version": "1.9.1"},
                "resolvable": {"version": "1.9.1"},
                "latest": {"version": "2.1.0"}
            },
            {
                "package": "collection",
                "current": {"version": "1.18.0"},
                "upgradable": null,
                "resolvable": null,
                "latest": {"version": "1.18.0"}
            }
        ]
    }"#;

    struct FakeReporter {
        raw: &'static str,
        staged: Mutex<Vec<std::path::PathBuf>>,
    }

    impl OutdatedReportSource for FakeReporter {
        fn outdated_report(&self, workdir: &Path, _env: &[(String, String)]) -> Result<String> {
            self.staged.lock().unwrap().push(workdir.to_path_buf());
            Ok(self.raw.to_string())
        }
    }

    fn pair() -> ManifestLockPair {
        ManifestLockPair {
            manifest: DependencyFile::new(MANIFEST_NAME, ".", "name: app\n"),
            lockfile: DependencyFile::new(LOCKFILE_NAME, ".", "packages: {}\n"),
        }
    }

    #[test]
    fn reads_versions_from_the_outdated_report() {
        let reporter = Arc::new(FakeReporter {
            raw: SAMPLE_REPORT,
            staged: Mutex::new(Vec::new()),
        });
        let checker = UpdateCheckerAgent::new(
            reporter.clone(),
            Arc::new(TempWorkspaceProvisioner),
            Duration::from_secs(30),
        );

        let report = checker
            .versions_for(
                &pair(),
                "path",
                &RequirementSource::hosted_default(),
                &[],
            )
            .unwrap();

        assert_eq!(report.current.as_deref(), Some("1.7.0"));
        assert_eq!(report.resolvable.as_deref(), Some("1.9.1"));
        assert_eq!(report.latest.as_deref(), Some("2.1.0"));
        assert!(report.can_update());
        assert_eq!(reporter.staged.lock().unwrap().len(), 1);
    }

    #[test]
    fn up_to_date_package_cannot_update() {
        let report = parse_outdated_report(SAMPLE_REPORT, "collection")
            .unwrap()
            .unwrap();
        assert!(!report.can_update());
    }

    #[test]
    fn unknown_package_yields_empty_report() {
        let report = parse_outdated_report(SAMPLE_REPORT, "missing").unwrap();
        assert!(report.is_none());
    }

    #[test]
    fn path_sources_are_never_updatable() {
        let checker = UpdateCheckerAgent::new(
            Arc::new(FakeReporter {
                raw: SAMPLE_REPORT,
                staged: Mutex::new(Vec::new()),
            }),
            Arc::new(TempWorkspaceProvisioner),
            Duration::from_secs(30),
        );
        let report = checker
            .versions_for(
                &pair(),
                "shared",
                &RequirementSource::Path {
                    relative: "../shared".to_string(),
                },
                &[],
            )
            .unwrap();
        assert!(!report.can_update());
    }

    #[test]
    fn picks_the_newest_version_tag_from_ls_remote() {
        let output = "\
10c778c\trefs/tags/1.7.0\n\
20c778c\trefs/tags/1.8.0\n\
30c778c\trefs/tags/1.8.0^{}\n\
40c778c\trefs/tags/v1.6.2\n\
50c778c\trefs/tags/nightly\n";
        assert_eq!(latest_tag_version(output).as_deref(), Some("1.8.0"));
    }

    #[test]
    fn tag_parsing_handles_prefixes_and_junk() {
        assert_eq!(
            version_from_ref("tags/1.7.0"),
            Some(Version::new(1, 7, 0))
        );
        assert_eq!(version_from_ref("v2.0.0"), Some(Version::new(2, 0, 0)));
        assert!(version_from_ref("master").is_none());
        assert!(version_from_ref("10c778c799b2fc06").is_none());
    }

    #[test]
    fn newer_comparison_prefers_semver_order() {
        assert!(is_newer("2.0.0", "1.9.9"));
        assert!(!is_newer("1.9.9", "2.0.0"));
        assert!(!is_newer("1.0.0", "1.0.0"));
    }
}
