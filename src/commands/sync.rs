//! # Sync Command Implementation
//!
//! Rewrites the pointer files below the current checkout from what is
//! actually on disk: references to missing dependencies are dropped, checkouts
//! without a pointer file get one.

use anyhow::Result;
use clap::Args;

use reftree::workflows::{self, SyncOptions};

/// Rewrite pointer files from what is on disk
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Keep pointer files whose dependency is missing.
    #[arg(long)]
    pub keep_refs: bool,

    /// Report failing dependencies as warnings and continue.
    #[arg(short = 'I', long)]
    pub ignore: bool,
}

/// Execute the `sync` command.
pub fn execute(args: SyncArgs) -> Result<()> {
    let ctx = super::context()?.with_ignore(args.ignore);
    let root = ctx.root.clone();
    let options = SyncOptions {
        keep_refs: args.keep_refs,
        ..SyncOptions::default()
    };
    workflows::sync(&ctx, &root, options, true)?;
    Ok(())
}
