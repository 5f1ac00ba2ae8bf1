use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use jiff::Zoned;

use crate::agents::update_orchestrator::UpdateResult;
use crate::error::{PubupError, Result};
use crate::utils::paths;

/// Git operations around an applied update: branch, stage, commit.
pub struct VersionControlAgent {
    project_path: PathBuf,
}

impl VersionControlAgent {
    pub fn new<P: AsRef<Path>>(project_path: P) -> Result<Self> {
        let project_path = paths::validate_project_root(project_path)?;
        Ok(Self { project_path })
    }

    pub fn is_repository(&self) -> bool {
        self.project_path.join(".git").is_dir()
    }

    pub fn is_working_directory_clean(&self) -> Result<bool> {
        let output = self.run_git(&["status", "--porcelain"])?;
        Self::ensure_success(&output, "git status")?;
        Ok(output.stdout.is_empty())
    }

    /// Create a branch, stage exactly the rewritten files and commit them.
    /// Returns the branch name.
    pub fn commit_update(&self, dependency: &str, result: &UpdateResult) -> Result<String> {
        let branch = self.branch_name(dependency);
        let output = self.run_git(&["checkout", "-b", &branch])?;
        Self::ensure_success(&output, "git checkout -b")?;

        for change in result.changed_files() {
            let path = self.project_path.join(&change.name);
            paths::ensure_within(&path, &self.project_path).map_err(|err| {
                PubupError::GitOperation(format!("Refusing to stage unsafe path: {err}"))
            })?;
            let output = self.run_git(&["add", change.name.as_str()])?;
            Self::ensure_success(&output, "git add")?;
        }

        let message = format!("chore(deps): upgrade {dependency}");
        let output = self.run_git(&["commit", "-m", &message])?;
        Self::ensure_success(&output, "git commit")?;
        Ok(branch)
    }

    fn run_git(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .current_dir(&self.project_path)
            .args(args)
            .output()
            .map_err(|e| {
                PubupError::GitOperation(format!(
                    "Failed to execute git command '{}': {e}",
                    args.join(" ")
                ))
            })
    }

    fn ensure_success(output: &Output, command: &str) -> Result<()> {
        if output.status.success() {
            return Ok(());
        }
        Err(PubupError::GitOperation(format!(
            "{} failed: {}",
            command,
            String::from_utf8_lossy(&output.stderr)
        )))
    }

    /// Branch names embed the dependency and date, restricted to characters
    /// git accepts everywhere.
    fn branch_name(&self, dependency: &str) -> String {
        let date = Zoned::now().strftime("%Y-%m-%d").to_string();
        let mut branch: String = format!("deps/{dependency}-{date}")
            .chars()
            .map(|c| match c {
                'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '/' => c,
                _ => '-',
            })
            .collect();

        if branch.len() > 60 {
            branch.truncate(60);
        }
        branch
    }
}
