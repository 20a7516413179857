//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

use crate::commands;
use reftree::output::{init_logging, log_level, OutputConfig};

/// reftree - Keep a tree of programs and libraries in sync through pointer files
#[derive(Parser, Debug)]
#[command(name = "reftree")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "info")]
    log_level: String,

    /// Verbose output; repeat for more detail (-vv)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new program or library
    New(commands::new::NewArgs),

    /// Import a program and all of its dependencies
    Import(commands::import::ImportArgs),

    /// Add a library to the current program
    Add(commands::add::AddArgs),

    /// Remove a library and its pointer file
    Remove(commands::remove::RemoveArgs),

    /// Fetch every declared dependency that is missing
    Deploy(commands::deploy::DeployArgs),

    /// Move the current checkout to a revision and reconcile its dependencies
    Update(commands::update::UpdateArgs),

    /// Rewrite pointer files from what is on disk
    Sync(commands::sync::SyncArgs),

    /// Commit and push the current checkout and its dependencies
    Publish(commands::publish::PublishArgs),

    /// Print the dependency tree
    Ls(commands::ls::LsArgs),

    /// Show uncommitted changes across the dependency tree
    Status(commands::status::StatusArgs),

    /// Get, set or list settings
    Config(commands::config::ConfigArgs),

    /// Manage the repository cache
    Cache(commands::cache::CacheArgs),

    /// Run the configured build driver over the program
    Build(commands::build::BuildArgs),

    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        let output = OutputConfig::from_env_and_flag(&self.color);
        init_logging(&output, log_level(&self.log_level, self.verbose));

        match self.command {
            Commands::New(args) => commands::new::execute(args),
            Commands::Import(args) => commands::import::execute(args),
            Commands::Add(args) => commands::add::execute(args),
            Commands::Remove(args) => commands::remove::execute(args),
            Commands::Deploy(args) => commands::deploy::execute(args),
            Commands::Update(args) => commands::update::execute(args),
            Commands::Sync(args) => commands::sync::execute(args),
            Commands::Publish(args) => commands::publish::execute(args),
            Commands::Ls(args) => commands::ls::execute(args, &output),
            Commands::Status(args) => commands::status::execute(args),
            Commands::Config(args) => commands::config::execute(args),
            Commands::Cache(args) => commands::cache::execute(args, &output),
            Commands::Build(args) => commands::build::execute(args),
            Commands::Completions(args) => commands::completions::execute(args),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbose_counts() {
        let cli = Cli::try_parse_from(["reftree", "-vv", "ls"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_update_flags_parse() {
        let cli = Cli::try_parse_from([
            "reftree",
            "update",
            "v1.2",
            "--clean",
            "--clean-deps",
            "-I",
        ])
        .unwrap();
        match cli.command {
            Commands::Update(args) => {
                assert_eq!(args.rev.as_deref(), Some("v1.2"));
                assert!(args.clean);
                assert!(args.clean_deps);
                assert!(args.fetch.ignore);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
