//! # Update Command Implementation
//!
//! Moves the current checkout to a revision (or the head of its branch) and
//! reconciles the dependency tree with what the new revision declares.
//!
//! Dependencies are only discarded when that cannot lose work. The override
//! flags widen what may be thrown away:
//!
//! - `--clean` discards uncommitted changes and untracked files
//! - `--clean-files` also deletes ignored files (needs `--clean`)
//! - `--clean-deps` discards local-only checkouts and unpublished commits

use anyhow::Result;
use clap::Args;

use super::FetchArgs;
use reftree::suggestions;
use reftree::workflows::{self, UpdateFlags};

/// Move the current checkout to a revision and reconcile its dependencies
#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Revision, branch or tag. Defaults to the latest revision of the
    /// current branch.
    #[arg(value_name = "REV")]
    pub rev: Option<String>,

    /// Discard uncommitted changes and untracked files.
    #[arg(short = 'C', long)]
    pub clean: bool,

    /// Also delete ignored files.
    #[arg(long)]
    pub clean_files: bool,

    /// Replace dependencies even if they hold local-only or unpublished work.
    #[arg(long)]
    pub clean_deps: bool,

    #[command(flatten)]
    pub fetch: FetchArgs,
}

impl UpdateArgs {
    fn flags(&self) -> Result<UpdateFlags> {
        if self.clean_files && !self.clean {
            return Err(suggestions::clean_required("--clean-files"));
        }
        Ok(UpdateFlags {
            clean: self.clean,
            clean_files: self.clean_files,
            clean_deps: self.clean_deps,
        })
    }
}

/// Execute the `update` command.
pub fn execute(args: UpdateArgs) -> Result<()> {
    let flags = args.flags()?;
    let ctx = args.fetch.context()?;
    let root = ctx.root.clone();
    workflows::update(&ctx, &root, args.rev.as_deref(), flags, true)?;
    Ok(())
}
