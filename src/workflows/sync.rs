//! Rewrite pointer files from what is actually on disk.
//!
//! The walk happens first and produces a snapshot: the declared dependencies
//! and the nested checkouts nothing declares. Pointer files are only written
//! afterwards, while iterating that snapshot, and only when their content
//! changes.

use std::path::Path;

use log::info;

use super::{add_pointer, ignore_path, remove_pointer, report_invalid, unignore_path, Context};
use crate::error::Result;
use crate::repository::{PathType, RepositoryHandle};
use crate::scm::DEFAULT_IGNORES;
use crate::walker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Keep pointer files whose checkout is missing.
    pub keep_refs: bool,
    /// Descend into dependencies after syncing this checkout.
    pub recursive: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            keep_refs: false,
            recursive: true,
        }
    }
}

/// Synchronize the pointer files of the checkout at `path`.
pub fn sync(ctx: &Context, path: &Path, options: SyncOptions, top: bool) -> Result<()> {
    if top && options.recursive {
        info!("Synchronizing dependency references...");
    }

    let mut repo = RepositoryHandle::resolve(&ctx.backends, path)?;
    report_invalid(ctx, &mut repo)?;
    if let Some(backend) = repo.backend(&ctx.backends) {
        backend.write_ignores(&repo.path, DEFAULT_IGNORES)?;
    }

    let declared = std::mem::take(&mut repo.dependencies);
    let unlinked = walker::find_unlinked(&repo.path)?;

    for dep in &declared {
        if dep.is_present() {
            let result = dep.check().and_then(|()| {
                let child = RepositoryHandle::resolve(&ctx.backends, &dep.path)?;
                child.write_pointer(&ctx.root)?;
                ignore_path(ctx, &repo, &dep.path)
            });
            if let Err(e) = result {
                ctx.recover(e.in_dependency(&dep.path))?;
            }
        } else if !options.keep_refs {
            info!(
                "Removing reference \"{}\" -> \"{}\"",
                dep.name(),
                dep.reference.render()
            );
            remove_pointer(ctx, &repo, &dep.pointer)?;
            unignore_path(ctx, &repo, &dep.path)?;
        }
    }

    for path in &unlinked {
        let result = RepositoryHandle::resolve(&ctx.backends, path).and_then(|child| {
            child.write_pointer(&ctx.root)?;
            ignore_path(ctx, &repo, path)?;
            add_pointer(ctx, &repo, &child.pointer_path())
        });
        if let Err(e) = result {
            ctx.recover(e.in_dependency(path))?;
        }
    }

    repo.refresh(&ctx.backends)?;

    if options.recursive {
        for dep in &repo.dependencies {
            if dep.check().is_err() {
                continue;
            }
            if let Err(e) = sync(ctx, &dep.path, options, false) {
                ctx.recover(e.in_dependency(&dep.path))?;
            }
        }
    }

    if top && PathType::of(&repo.path) == PathType::Library {
        let repo = RepositoryHandle::resolve(&ctx.backends, &repo.path)?;
        repo.write_pointer(&ctx.root)?;
    }
    Ok(())
}
