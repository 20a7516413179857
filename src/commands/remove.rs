//! # Remove Command Implementation

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use reftree::workflows;

/// Remove a library and its pointer file
#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Library directory to remove.
    #[arg(value_name = "PATH")]
    pub path: PathBuf,
}

/// Execute the `remove` command.
pub fn execute(args: RemoveArgs) -> Result<()> {
    let ctx = super::context()?;
    workflows::remove(&ctx, &args.path)?;
    Ok(())
}
