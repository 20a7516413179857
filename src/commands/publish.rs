//! # Publish Command Implementation
//!
//! Commits and pushes the current checkout after its dependencies, so every
//! pointer file that gets committed names a revision that is already
//! upstream. Checkouts with uncommitted changes are committed with the
//! message from `-M`, or one asked for interactively.

use anyhow::Result;
use clap::Args;
use dialoguer::{theme::ColorfulTheme, Input};
use std::io;

use reftree::error::{Error as LibError, Result as LibResult};
use reftree::repository::RepositoryHandle;
use reftree::workflows::{self, CommitPrompt};

/// Commit and push the current checkout and its dependencies
#[derive(Args, Debug)]
pub struct PublishArgs {
    /// Push all branches and tags, not just the current branch.
    #[arg(short = 'A', long)]
    pub all: bool,

    /// Commit message used for every checkout with uncommitted changes.
    #[arg(short = 'M', long, value_name = "MESSAGE")]
    pub message: Option<String>,
}

/// Asks for a commit message on the terminal.
struct TerminalPrompt;

impl CommitPrompt for TerminalPrompt {
    fn commit_message(&self, repo: &RepositoryHandle) -> LibResult<String> {
        let message: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("Commit message for \"{}\"", repo.name))
            .interact_text()
            .map_err(prompt_error)?;
        Ok(message.trim().to_string())
    }
}

/// A failed prompt (no terminal, interrupted read) as a library error.
fn prompt_error(error: dialoguer::Error) -> LibError {
    LibError::Io(io::Error::other(error))
}

/// Execute the `publish` command.
pub fn execute(args: PublishArgs) -> Result<()> {
    let ctx = super::context()?;
    let root = ctx.root.clone();
    workflows::publish(
        &ctx,
        &root,
        args.all,
        args.message.as_deref(),
        &TerminalPrompt,
        true,
    )?;
    Ok(())
}
