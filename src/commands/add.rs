//! # Add Command Implementation
//!
//! Clones a library into the current program, writes its pointer file,
//! registers the pointer with the program's version control and ignores the
//! library directory.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use super::FetchArgs;
use reftree::workflows;

/// Add a library to the current program
#[derive(Args, Debug)]
pub struct AddArgs {
    /// Repository URL, optionally with a `#revision` suffix.
    #[arg(value_name = "URL")]
    pub url: String,

    /// Destination directory. Defaults to the repository name.
    #[arg(value_name = "PATH")]
    pub path: Option<PathBuf>,

    #[command(flatten)]
    pub fetch: FetchArgs,
}

/// Execute the `add` command.
pub fn execute(args: AddArgs) -> Result<()> {
    let ctx = args.fetch.context()?;
    workflows::add(&ctx, &args.url, args.path.as_deref())?;
    Ok(())
}
