//! # Build Command Implementation
//!
//! Hands the synchronized tree to the external build driver configured as
//! `BUILD_DRIVER`. Arguments after `--` are passed to the driver unchanged.

use anyhow::Result;
use clap::Args;

use reftree::build::{self, BuildOptions};

/// Run the configured build driver over the program
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Build target. Overrides the TARGET setting.
    #[arg(short = 'm', long, value_name = "TARGET")]
    pub target: Option<String>,

    /// Toolchain. Overrides the TOOLCHAIN setting.
    #[arg(short = 't', long, value_name = "TOOLCHAIN")]
    pub toolchain: Option<String>,

    /// Extra arguments for the build driver.
    #[arg(last = true, value_name = "ARGS")]
    pub extra: Vec<String>,
}

/// Execute the `build` command.
pub fn execute(args: BuildArgs) -> Result<()> {
    let ctx = super::context()?;
    let options = BuildOptions {
        target: args.target,
        toolchain: args.toolchain,
        extra: args.extra,
    };
    build::build(&ctx, &ctx.root, &options)?;
    Ok(())
}
