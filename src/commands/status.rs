//! # Status Command Implementation

use anyhow::Result;
use clap::Args;

use reftree::workflows;

/// Show uncommitted changes across the dependency tree
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Report failing dependencies as warnings and continue.
    #[arg(short = 'I', long)]
    pub ignore: bool,
}

/// Execute the `status` command.
pub fn execute(args: StatusArgs) -> Result<()> {
    let ctx = super::context()?.with_ignore(args.ignore);
    let dirty = workflows::status(&ctx, &ctx.root)?;

    if dirty.is_empty() {
        println!("No local modifications.");
        return Ok(());
    }
    for checkout in dirty {
        println!("--- {} ({}) ---", checkout.name, ctx.display(&checkout.path));
        println!("{}", checkout.status.trim_end());
    }
    Ok(())
}
