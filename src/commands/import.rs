//! # Import Command Implementation
//!
//! Clones a program into a new directory and deploys every dependency it
//! declares. A bare name is expanded against the `BASE_URL` setting.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use super::FetchArgs;
use reftree::workflows;

/// Import a program and all of its dependencies
#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Repository URL, optionally with a `#revision` suffix.
    #[arg(value_name = "URL")]
    pub url: String,

    /// Destination directory. Defaults to the repository name.
    #[arg(value_name = "PATH")]
    pub path: Option<PathBuf>,

    #[command(flatten)]
    pub fetch: FetchArgs,
}

/// Execute the `import` command.
pub fn execute(args: ImportArgs) -> Result<()> {
    let ctx = args.fetch.context()?;
    workflows::import(&ctx, &args.url, args.path.as_deref())?;
    Ok(())
}
