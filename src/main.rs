mod agents;
mod changes;
mod cli;
mod config;
mod credentials;
mod dependency;
mod error;
mod files;
mod helper;
mod utils;
mod workflow;
mod workspace;

use clap::Parser;
use cli::{Cli, Commands};
use colored::Colorize;
use std::process;
use workflow::{CheckOptions, UpdateOptions};

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        unsafe {
            std::env::set_var("PUBUP_VERBOSE", "1");
        }
    }

    let result = match cli.command {
        Commands::Update {
            dependency,
            version,
            requirement,
            manifest,
            credentials,
            git_url,
            git_ref,
            continue_on_stale,
            timeout,
            dry_run,
            no_git,
        } => workflow::execute_update(
            &cli.path,
            &dependency,
            UpdateOptions {
                version,
                requirement,
                manifest,
                credentials,
                git_url,
                git_ref,
                continue_on_stale,
                timeout,
                dry_run,
                no_git,
            },
        ),
        Commands::Check {
            dependency,
            credentials,
            git_url,
            git_ref,
        } => workflow::execute_check(
            &cli.path,
            &dependency,
            CheckOptions {
                credentials,
                git_url,
                git_ref,
            },
        ),
        Commands::List => workflow::execute_list(&cli.path),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        process::exit(1);
    }
}
