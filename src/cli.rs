use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "pubup",
    about = "pubup - orchestrate single-dependency updates for Dart pub projects",
    version,
    author
)]
pub struct Cli {
    /// Path to the project directory (defaults to current directory)
    #[arg(short, long, default_value = ".")]
    pub path: String,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Update one dependency across every manifest/lockfile pair
    Update {
        /// Name of the dependency to update
        dependency: String,

        /// Pin a target version instead of taking the latest the resolver
        /// accepts
        #[arg(long)]
        version: Option<String>,

        /// New constraint string to record in the manifest
        #[arg(long)]
        requirement: Option<String>,

        /// Restrict the update to the pair this manifest belongs to
        /// (path relative to the project root)
        #[arg(long, value_name = "PATH")]
        manifest: Option<String>,

        /// JSON file with credential records for private sources
        #[arg(long, value_name = "FILE")]
        credentials: Option<PathBuf>,

        /// Git URL when the dependency comes from a git source
        #[arg(long, value_name = "URL")]
        git_url: Option<String>,

        /// Git ref the dependency is pinned to
        #[arg(long, value_name = "REF", requires = "git_url")]
        git_ref: Option<String>,

        /// Keep going when a pair produces no changes instead of aborting
        #[arg(long)]
        continue_on_stale: bool,

        /// Override the subprocess time budget in seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Show what would change without writing anything back
        #[arg(long)]
        dry_run: bool,

        /// Skip Git operations (don't create branch or commit)
        #[arg(long)]
        no_git: bool,
    },

    /// Check the latest available version of a dependency without applying
    Check {
        /// Name of the dependency to check
        dependency: String,

        /// JSON file with credential records for private sources
        #[arg(long, value_name = "FILE")]
        credentials: Option<PathBuf>,

        /// Git URL when the dependency comes from a git source
        #[arg(long, value_name = "URL")]
        git_url: Option<String>,

        /// Git ref the dependency is pinned to
        #[arg(long, value_name = "REF", requires = "git_url")]
        git_ref: Option<String>,
    },

    /// List the manifest/lockfile pairs discovered under the project root
    List,
}
