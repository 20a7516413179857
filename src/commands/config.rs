//! # Config Command Implementation
//!
//! Reads and writes settings. Program settings live in the `.reftree` file
//! at the program root (the current directory when there is no program yet);
//! `--global` works on the per-user settings file instead.
//!
//! ```bash
//! reftree config TARGET K64F          # set
//! reftree config TARGET               # print
//! reftree config --global CACHE ~/.cache/reftree
//! reftree config --unset TARGET
//! reftree config --list
//! ```

use anyhow::{anyhow, Result};
use clap::Args;
use std::env;

use reftree::config::{self, is_known_key, Program, Settings, KNOWN_KEYS};
use reftree::suggestions;

/// Get, set or list settings
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Setting name.
    #[arg(value_name = "KEY", required_unless_present = "list")]
    pub key: Option<String>,

    /// New value. Prints the current value when omitted.
    #[arg(value_name = "VALUE")]
    pub value: Option<String>,

    /// Use the per-user settings instead of the program's.
    #[arg(short = 'G', long)]
    pub global: bool,

    /// Remove the setting.
    #[arg(short = 'U', long, conflicts_with = "value")]
    pub unset: bool,

    /// List all settings.
    #[arg(short = 'L', long, conflicts_with_all = ["key", "unset"])]
    pub list: bool,
}

fn global_settings() -> Result<Settings> {
    config::global().ok_or_else(|| anyhow!("Unable to determine the home directory for global settings"))
}

fn print_settings(title: &str, settings: &Settings) -> Result<()> {
    println!("[{}] {}", title, settings.path().display());
    let values = settings.list()?;
    if values.is_empty() {
        println!("  No settings");
    }
    for (key, value) in values {
        println!("  {}={}", key, value);
    }
    Ok(())
}

/// Execute the `config` command.
pub fn execute(args: ConfigArgs) -> Result<()> {
    let program = Program::locate(&env::current_dir()?);

    if args.list {
        print_settings("Global", &global_settings()?)?;
        if args.global {
            return Ok(());
        }
        print_settings("Program", &program.settings())?;
        println!();
        println!("Known settings:");
        for (key, description) in KNOWN_KEYS {
            println!("  {:<13} {}", key, description);
        }
        return Ok(());
    }

    let Some(key) = args.key.as_deref() else {
        return Ok(());
    };
    if !is_known_key(key) {
        return Err(suggestions::unknown_config_key(key));
    }
    let key = key.to_ascii_uppercase();
    let settings = if args.global {
        global_settings()?
    } else {
        program.settings()
    };
    let scope = if args.global { "global" } else { "program" };

    if args.unset {
        if settings.unset(&key)? {
            println!("Unset {} setting {}", scope, key);
        } else {
            println!("No {} setting for {}", scope, key);
        }
    } else if let Some(value) = args.value.as_deref() {
        settings.set(&key, value)?;
        println!("{} now set as \"{}\" in {} settings", key, value, scope);
    } else {
        let value = if args.global {
            settings.get(&key)?
        } else {
            program.get(&key)?
        };
        match value {
            Some(value) => println!("{}", value),
            None => println!("No {} setting for {}", scope, key),
        }
    }
    Ok(())
}
