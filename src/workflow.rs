use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use crate::agents::update_orchestrator::ResolverInvoker;
use crate::agents::{
    ProjectScannerAgent, PubExecutionAgent, PubTool, UpdateCheckerAgent, UpdateOrchestrator,
    UpdateResult, VersionControlAgent,
};
use crate::changes::{AlwaysChanged, ChangeDetector, RequirementScopeDetector};
use crate::config::PubupConfig;
use crate::credentials::{
    Credential, CredentialConfigurator, GitCredentialConfigurator, load_credentials,
};
use crate::dependency::{DependencyRequirement, RequirementSource, TargetDependency};
use crate::error::Result;
use crate::files::{DependencyFile, pair_by_directory, unpaired_manifests};
use crate::helper::{HelperPatchInvoker, NativePatchHelper};
use crate::utils::paths;
use crate::workspace::{TempWorkspaceProvisioner, WorkspaceProvisioner};

/// Options for the update workflow, mirrored from the CLI.
#[derive(Debug, Default)]
pub struct UpdateOptions {
    pub version: Option<String>,
    pub requirement: Option<String>,
    pub manifest: Option<String>,
    pub credentials: Option<PathBuf>,
    pub git_url: Option<String>,
    pub git_ref: Option<String>,
    pub continue_on_stale: bool,
    pub timeout: Option<u64>,
    pub dry_run: bool,
    pub no_git: bool,
}

/// Options for the check workflow.
#[derive(Debug, Default)]
pub struct CheckOptions {
    pub credentials: Option<PathBuf>,
    pub git_url: Option<String>,
    pub git_ref: Option<String>,
}

/// Execute the update workflow: one dependency, every eligible pair.
pub fn execute_update(project_path: &str, dependency: &str, options: UpdateOptions) -> Result<()> {
    println!("{}", "Starting dependency update process...".cyan().bold());

    println!("\n{}", "1. Validating project structure...".yellow());
    let scanner = ProjectScannerAgent::new(project_path)?;
    let files = scanner.load_snapshot()?;
    println!("{}", "✓ Project structure is valid".green());

    println!("\n{}", "2. Loading configuration...".yellow());
    let config = PubupConfig::load(scanner.project_path())?;
    let timeout = Duration::from_secs(options.timeout.unwrap_or(config.update.timeout_secs));
    let continue_on_stale = options.continue_on_stale || config.update.continue_on_stale;
    let tool = PubTool::parse(&config.tools.pub_tool)?;
    println!(
        "   Tool: {}  Timeout: {}s",
        tool.command().bright_cyan(),
        timeout.as_secs()
    );

    let pairs = pair_by_directory(&files);
    let skipped = unpaired_manifests(&files);
    println!(
        "   Found {} manifest/lockfile pair(s)",
        pairs.len().to_string().yellow()
    );
    for manifest in &skipped {
        println!(
            "   {} {} has no lockfile, skipping",
            "•".dimmed(),
            manifest.name.dimmed()
        );
    }

    let credentials = load_optional_credentials(options.credentials.as_deref())?;
    let target = build_target(dependency, &options, &files);

    println!(
        "\n{}",
        format!("3. Updating '{dependency}'...").yellow()
    );
    let resolver: Arc<dyn ResolverInvoker> = match &config.tools.helper_path {
        Some(helper_path) => Arc::new(HelperPatchInvoker::new(
            NativePatchHelper::new(helper_path.clone(), timeout),
            target.clone(),
        )),
        None => Arc::new(PubExecutionAgent::new(tool, timeout)),
    };
    // Without --manifest every pair is in scope for the update.
    let detector: Arc<dyn ChangeDetector> = match &options.manifest {
        Some(manifest) => Arc::new(RequirementScopeDetector::new(manifest.clone(), &files)),
        None => Arc::new(AlwaysChanged),
    };
    let orchestrator = UpdateOrchestrator::new(
        resolver,
        Arc::new(TempWorkspaceProvisioner),
        Arc::new(GitCredentialConfigurator::new(credentials)),
        detector,
    )
    .continue_on_stale(continue_on_stale);

    let result = orchestrator.update_dependency(&files, &target)?;
    println!("{}", "✓ Update completed".green());
    print_update_result(&result);

    if options.dry_run {
        println!("\n{}", "Dry run: nothing was written back.".yellow());
        return Ok(());
    }

    println!("\n{}", "4. Writing updated files...".yellow());
    for change in result.changed_files() {
        let path = scanner.project_path().join(&change.name);
        paths::ensure_within(&path, scanner.project_path())?;
        fs::write(&path, &change.new_content)?;
        println!("   {} {}", "✓".green(), change.name);
    }

    let git_agent = VersionControlAgent::new(scanner.project_path())?;
    if git_agent.is_repository() && !options.no_git {
        println!("\n{}", "5. Creating Git commit...".yellow());
        let branch = git_agent.commit_update(dependency, &result)?;
        println!(
            "{}",
            format!("✓ Changes committed to branch: {branch}").green()
        );
    }

    println!(
        "\n{}",
        "✨ Update process completed successfully!".green().bold()
    );
    Ok(())
}

/// Execute the check workflow: report the latest available version of a
/// dependency per pair, applying nothing.
pub fn execute_check(project_path: &str, dependency: &str, options: CheckOptions) -> Result<()> {
    println!(
        "{}",
        format!("Checking for updates to '{dependency}'...")
            .cyan()
            .bold()
    );

    println!("\n{}", "1. Validating project structure...".yellow());
    let scanner = ProjectScannerAgent::new(project_path)?;
    let files = scanner.load_snapshot()?;
    println!("{}", "✓ Project structure is valid".green());

    let config = PubupConfig::load(scanner.project_path())?;
    let timeout = Duration::from_secs(config.update.timeout_secs);
    let tool = PubTool::parse(&config.tools.pub_tool)?;
    let pairs = pair_by_directory(&files);

    let credentials = load_optional_credentials(options.credentials.as_deref())?;
    let source = build_source(&options.git_url, &options.git_ref);

    // Credentials staged once, reused across pairs.
    let cred_workspace = TempWorkspaceProvisioner.provision()?;
    let guard = GitCredentialConfigurator::new(credentials).configure(cred_workspace.path())?;

    let executor = Arc::new(PubExecutionAgent::new(tool, timeout));
    let checker = UpdateCheckerAgent::new(executor, Arc::new(TempWorkspaceProvisioner), timeout);

    println!("\n{}", "2. Querying available versions...".yellow());
    let pb = ProgressBar::new(pairs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  [{bar:40}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("=>-"),
    );

    let mut reports = Vec::new();
    for pair in &pairs {
        pb.set_message(format!("Checking {}", pair.directory()));
        let report = checker.versions_for(pair, dependency, &source, guard.env())?;
        reports.push((pair.directory().to_string(), report));
        pb.inc(1);
    }
    pb.finish_and_clear();
    println!("{}", "✓ Check completed".green());

    let mut any_update = false;
    for (directory, report) in &reports {
        let current = report.current.as_deref().unwrap_or("-");
        let latest = report.latest.as_deref().unwrap_or("-");
        if report.can_update() {
            any_update = true;
            println!(
                "  {} {} {} → {}",
                directory.white().bold(),
                current.red(),
                "upgradable to".dimmed(),
                latest.green().bold()
            );
        } else {
            println!(
                "  {} {} {}",
                directory.white().bold(),
                current.green(),
                "(up to date)".dimmed()
            );
        }
    }

    if any_update {
        println!("\n{}", "To apply, run:".dimmed());
        println!("  {}", format!("pubup update {dependency}").cyan());
    } else {
        println!(
            "\n{}",
            format!("✨ '{dependency}' is up to date everywhere!")
                .green()
                .bold()
        );
    }
    Ok(())
}

/// Execute the list workflow: show the discovered pairs.
pub fn execute_list(project_path: &str) -> Result<()> {
    println!(
        "{}",
        "Listing manifest/lockfile pairs...".cyan().bold()
    );

    let scanner = ProjectScannerAgent::new(project_path)?;
    let files = scanner.load_snapshot()?;
    let pairs = pair_by_directory(&files);
    let skipped = unpaired_manifests(&files);

    println!("\n{}", "📦 Pairs:".cyan().bold());
    for pair in &pairs {
        println!(
            "  {} {} + {}",
            pair.directory().white().bold(),
            pair.manifest.file_name().cyan(),
            pair.lockfile.file_name().cyan()
        );
    }
    for manifest in &skipped {
        println!(
            "  {} {} {}",
            manifest.directory.white().bold(),
            manifest.file_name().cyan(),
            "(no lockfile, excluded from updates)".yellow()
        );
    }

    println!("\n{}", "Summary:".cyan().bold());
    println!("  {} pair(s)", pairs.len().to_string().yellow());
    println!(
        "  {} manifest(s) without lockfile",
        skipped.len().to_string().yellow()
    );
    Ok(())
}

fn load_optional_credentials(path: Option<&std::path::Path>) -> Result<Vec<Credential>> {
    match path {
        Some(path) => load_credentials(path),
        None => Ok(Vec::new()),
    }
}

fn build_source(git_url: &Option<String>, git_ref: &Option<String>) -> RequirementSource {
    match git_url {
        Some(url) => RequirementSource::Git {
            url: url.clone(),
            path: None,
            reference: git_ref.clone(),
            resolved_ref: None,
            branch: None,
        },
        None => RequirementSource::hosted_default(),
    }
}

fn build_target(
    dependency: &str,
    options: &UpdateOptions,
    files: &[DependencyFile],
) -> TargetDependency {
    // The requirement originates from the targeted manifest when one is
    // named, otherwise nominally from the first paired manifest.
    let file = options.manifest.clone().unwrap_or_else(|| {
        pair_by_directory(files)
            .first()
            .map(|pair| pair.manifest.name.clone())
            .unwrap_or_else(|| crate::files::MANIFEST_NAME.to_string())
    });

    TargetDependency::new(
        dependency,
        options.version.clone(),
        DependencyRequirement {
            requirement: options.requirement.clone(),
            groups: Vec::new(),
            file,
            source: build_source(&options.git_url, &options.git_ref),
        },
    )
}

fn print_update_result(result: &UpdateResult) {
    println!("\n{}", "Update Summary:".cyan().bold());
    println!(
        "{}",
        format!("Changed files: {}", result.len()).green()
    );
    for change in result.changed_files() {
        println!(
            "  {} {} ({} → {} bytes)",
            "•".dimmed(),
            change.name.white().bold(),
            change.old_content.len(),
            change.new_content.len()
        );
    }
    for manifest in result.stale_manifests() {
        println!(
            "  {} {} {}",
            "•".dimmed(),
            manifest.white().bold(),
            "came back unchanged".yellow()
        );
    }
}
