//! # CLI Command Implementations
//!
//! This module contains the implementation of each subcommand of the `reftree`
//! binary. Each command lives in its own module with an `Args` struct parsed by
//! `clap` and an `execute` function that builds a workflow
//! [`Context`](reftree::workflows::Context) and hands off to the library.

pub mod add;
pub mod build;
pub mod cache;
pub mod completions;
pub mod config;
pub mod deploy;
pub mod import;
pub mod ls;
pub mod new;
pub mod publish;
pub mod remove;
pub mod status;
pub mod sync;
pub mod update;

use std::env;

use anyhow::{Context as _, Result};
use clap::Args;

use reftree::workflows::Context;

/// Options shared by every command that clones repositories.
#[derive(Args, Debug, Clone, Default)]
pub struct FetchArgs {
    /// Keep going when a dependency fails; report it as a warning instead.
    #[arg(short = 'I', long)]
    pub ignore: bool,

    /// Clone with a history truncated to this many commits.
    #[arg(long, value_name = "N")]
    pub depth: Option<u32>,

    /// Transport used for repository URLs (https, http, ssh or git).
    ///
    /// Overrides the PROTOCOL setting.
    #[arg(long, value_name = "PROTOCOL")]
    pub protocol: Option<String>,
}

impl FetchArgs {
    /// Workflow context for the current directory with these options applied.
    pub fn context(&self) -> Result<Context> {
        let mut ctx = context()?.with_ignore(self.ignore).with_depth(self.depth);
        if let Some(protocol) = &self.protocol {
            ctx = ctx.with_protocol(protocol.parse()?);
        }
        Ok(ctx)
    }
}

/// Workflow context for the current directory, configured from its program's
/// settings.
pub fn context() -> Result<Context> {
    let cwd = env::current_dir().context("Unable to determine the current directory")?;
    Ok(Context::for_program(cwd)?)
}
