use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use crate::agents::pub_execution::run_with_timeout;
use crate::agents::update_orchestrator::ResolverInvoker;
use crate::dependency::{HelperRequirement, TargetDependency};
use crate::error::{PubupError, Result};
use crate::files::{LOCKFILE_NAME, MANIFEST_NAME};

/// Which staged file the helper is asked to patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchKind {
    Yaml,
    Lock,
}

impl PatchKind {
    fn flag(&self) -> &'static str {
        match self {
            Self::Yaml => "yaml",
            Self::Lock => "lock",
        }
    }

    fn file_name(&self) -> &'static str {
        match self {
            Self::Yaml => MANIFEST_NAME,
            Self::Lock => LOCKFILE_NAME,
        }
    }
}

/// Client for the native text-patch helper binary, the legacy alternative
/// to running the resolver. The helper performs pure syntax patching and
/// returns the rewritten content on stdout.
pub struct NativePatchHelper {
    helper_path: PathBuf,
    timeout: Duration,
}

impl NativePatchHelper {
    pub fn new(helper_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            helper_path: helper_path.into(),
            timeout,
        }
    }

    /// Patch one file's content for the target dependency.
    pub fn patch(
        &self,
        kind: PatchKind,
        content: &str,
        dependency: &TargetDependency,
    ) -> Result<String> {
        let requirement = HelperRequirement::from_requirement(&dependency.requirement);
        let requirement_json = serde_json::to_string(&requirement)?;
        let version = dependency.version.clone().unwrap_or_default();

        let mut command = Command::new(&self.helper_path);
        command.args([
            "--type",
            kind.flag(),
            "--content",
            content,
            "--dependency",
            &dependency.name,
            "--version",
            &version,
            "--requirement",
            &requirement_json,
        ]);

        let label = format!("{} --type {}", self.helper_path.display(), kind.flag());
        let output = run_with_timeout(command, &label, self.timeout)?;
        if !output.success {
            return Err(PubupError::Helper(format!(
                "`{label}` exited with status {}: {}",
                output.status_code,
                output.stderr.trim()
            )));
        }
        Ok(output.stdout)
    }
}

/// Adapter that satisfies the resolver seam with the patch helper: instead
/// of running the pub toolchain, each staged file is piped through the
/// helper and written back in place.
pub struct HelperPatchInvoker {
    helper: NativePatchHelper,
    target: TargetDependency,
}

impl HelperPatchInvoker {
    pub fn new(helper: NativePatchHelper, target: TargetDependency) -> Self {
        Self { helper, target }
    }
}

impl ResolverInvoker for HelperPatchInvoker {
    fn upgrade(
        &self,
        workdir: &Path,
        _dependency: &str,
        _version: Option<&str>,
        _env: &[(String, String)],
    ) -> Result<()> {
        for kind in [PatchKind::Yaml, PatchKind::Lock] {
            let path = workdir.join(kind.file_name());
            let content = fs::read_to_string(&path)?;
            let patched = self.helper.patch(kind, &content, &self.target)?;
            fs::write(&path, patched)?;
        }
        Ok(())
    }
}
