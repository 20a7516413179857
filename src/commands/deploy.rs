//! # Deploy Command Implementation
//!
//! Fetches every dependency the current checkout declares but does not have,
//! and brings the ones already present to their declared revisions.

use anyhow::Result;
use clap::Args;

use super::FetchArgs;
use reftree::workflows;

/// Fetch every declared dependency that is missing
#[derive(Args, Debug)]
pub struct DeployArgs {
    #[command(flatten)]
    pub fetch: FetchArgs,
}

/// Execute the `deploy` command.
pub fn execute(args: DeployArgs) -> Result<()> {
    let ctx = args.fetch.context()?;
    let root = ctx.root.clone();
    workflows::deploy(&ctx, &root)?;
    Ok(())
}
