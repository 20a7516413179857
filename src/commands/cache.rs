//! # Cache Command Implementation
//!
//! This module implements the `cache` subcommand, which inspects and purges
//! the repository cache used to speed up clones.
//!
//! ## Subcommands
//!
//! - **`list`**: Display all cached repositories with their size
//! - **`clean`**: Remove every cached repository

use anyhow::Result;
use clap::{Args, Subcommand};
use dialoguer::{theme::ColorfulTheme, Confirm};
use std::env;
use std::path::PathBuf;

use reftree::cache::{format_size, Cache, CacheEntry};
use reftree::config::Program;
use reftree::output::{emoji, OutputConfig};
use reftree::suggestions;

/// Manage the repository cache
#[derive(Args, Debug)]
pub struct CacheArgs {
    /// The cache directory.
    ///
    /// Defaults to the CACHE setting. Can also be set with the
    /// `REFTREE_CACHE` environment variable.
    #[arg(long, value_name = "DIR", env = "REFTREE_CACHE")]
    pub cache_dir: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: CacheSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum CacheSubcommand {
    /// List all cached repositories
    List(ListArgs),
    /// Remove all cached repositories
    Clean(CleanArgs),
}

/// Arguments for the cache list command
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the cache clean command
#[derive(Args, Debug)]
pub struct CleanArgs {
    /// Show what would be deleted without actually deleting anything
    #[arg(long)]
    pub dry_run: bool,

    /// Skip confirmation prompt and delete immediately
    #[arg(short, long)]
    pub yes: bool,
}

/// Execute the `cache` command.
pub fn execute(args: CacheArgs, output: &OutputConfig) -> Result<()> {
    let cache = resolve_cache(args.cache_dir)?;
    match args.command {
        CacheSubcommand::List(list_args) => execute_list(&cache, list_args),
        CacheSubcommand::Clean(clean_args) => execute_clean(&cache, clean_args, output),
    }
}

/// The cache named on the command line, or the configured one.
fn resolve_cache(cache_dir: Option<PathBuf>) -> Result<Cache> {
    if let Some(dir) = cache_dir {
        return Ok(Cache::new(dir));
    }
    let program = Program::locate(&env::current_dir()?);
    match program.get("CACHE")? {
        Some(dir) => Ok(Cache::new(dir)),
        None => Err(suggestions::cache_not_configured()),
    }
}

/// Execute the `cache list` command.
fn execute_list(cache: &Cache, args: ListArgs) -> Result<()> {
    let entries = cache.entries()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    if entries.is_empty() {
        println!("No cached repositories found in: {}", cache.root().display());
        return Ok(());
    }
    display_table(&entries);
    Ok(())
}

/// Display cache entries in table format
fn display_table(entries: &[CacheEntry]) {
    println!("Cached repositories:\n");
    println!("{:<50} {:<5} {:>12}", "REPOSITORY", "KIND", "SIZE");
    println!("{}", "-".repeat(69));

    for entry in entries {
        println!(
            "{:<50} {:<5} {:>12}",
            entry.key,
            entry.kind.name(),
            format_size(entry.size)
        );
    }

    let total: u64 = entries.iter().map(|e| e.size).sum();
    println!(
        "\nTotal: {} cached repositories ({})",
        entries.len(),
        format_size(total)
    );
}

/// Execute the `cache clean` command.
fn execute_clean(cache: &Cache, args: CleanArgs, output: &OutputConfig) -> Result<()> {
    let entries = cache.entries()?;
    if entries.is_empty() {
        println!("No cached repositories found in: {}", cache.root().display());
        return Ok(());
    }

    println!("Cache entries to be deleted:\n");
    for entry in &entries {
        println!("  {} ({})", entry.key, format_size(entry.size));
    }
    let total: u64 = entries.iter().map(|e| e.size).sum();
    println!("\nTotal: {} entries ({})", entries.len(), format_size(total));

    if args.dry_run {
        println!(
            "\n{}Dry run mode - no changes were made.",
            emoji(output, "🔎 ", "")
        );
        return Ok(());
    }

    if !args.yes {
        let confirmed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt("Delete these cache entries?")
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Clean cancelled.");
            return Ok(());
        }
    }

    let removed = cache.clean()?;
    println!(
        "\n{}Successfully deleted {} cache entries.",
        emoji(output, "✅ ", ""),
        removed
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_cache_prefers_explicit_dir() {
        let temp = TempDir::new().unwrap();
        let cache = resolve_cache(Some(temp.path().to_path_buf())).unwrap();
        assert_eq!(cache.root(), temp.path());
    }

    #[test]
    fn test_clean_dry_run_keeps_entries() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("github.com/org/driver/.git")).unwrap();
        let cache = Cache::new(temp.path());

        let args = CleanArgs {
            dry_run: true,
            yes: false,
        };
        execute_clean(&cache, args, &OutputConfig { use_color: false }).unwrap();
        assert_eq!(cache.entries().unwrap().len(), 1);
    }

    #[test]
    fn test_clean_with_yes_removes_entries() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("github.com/org/driver/.git")).unwrap();
        let cache = Cache::new(temp.path());

        let args = CleanArgs {
            dry_run: false,
            yes: true,
        };
        execute_clean(&cache, args, &OutputConfig { use_color: false }).unwrap();
        assert!(cache.entries().unwrap().is_empty());
    }
}
