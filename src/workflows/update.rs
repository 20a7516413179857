//! Move a checkout to a revision and reconcile the dependency tree with it.
//!
//! The dependency list is captured before the checkout moves. Afterwards the
//! workflow runs four passes in a fixed order:
//!
//! 1. remove dependencies the new revision no longer declares,
//! 2. replace dependencies whose declared URL changed,
//! 3. fetch dependencies that are declared but missing,
//! 4. recurse into the rest with their declared revision.
//!
//! Passes 1 and 2 discard checkouts and therefore go through
//! [`RepositoryHandle::can_update`].

use std::path::Path;

use log::info;

use super::sync::{self, SyncOptions};
use super::{discard_checkout, fetch, ignore_path, report_invalid, Context};
use crate::config::Program;
use crate::error::{Error, Result};
use crate::reference::{same_url, ReferenceKind, RevisionKind};
use crate::repository::{Dependency, PathType, RepositoryHandle};
use crate::scm::UpdateOptions;

/// Overrides for the update safety gate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateFlags {
    /// Discard uncommitted changes and untracked files.
    pub clean: bool,
    /// Also delete ignored files when cleaning.
    pub clean_files: bool,
    /// Discard local-only checkouts and unpublished commits.
    pub clean_deps: bool,
}

/// Update the checkout at `path` to `rev`, or to the latest revision of its
/// current branch.
///
/// `top` marks the checkout the operator ran the command in; only there does
/// a detached checkout without `rev` fail, and only there are the pointer
/// file in the parent and the program root refreshed.
pub fn update(
    ctx: &Context,
    path: &Path,
    rev: Option<&str>,
    flags: UpdateFlags,
    top: bool,
) -> Result<()> {
    if top && flags.clean {
        sync::sync(ctx, path, SyncOptions::default(), true)?;
    }

    let mut repo = RepositoryHandle::resolve(&ctx.backends, path)?;
    report_invalid(ctx, &mut repo)?;
    let before = std::mem::take(&mut repo.dependencies);

    if top && rev.is_none() && repo.is_detached(&ctx.backends)? {
        return Err(Error::Detached {
            name: repo.name.clone(),
        });
    }

    let what = if top { PathType::of(&repo.path) } else { PathType::Library };
    if repo.is_local && repo.rev.is_none() {
        info!(
            "Skipping unpublished empty {} \"{}\"",
            what.name(),
            ctx.display(&repo.path)
        );
    } else if let Some(backend) = repo.backend(&ctx.backends) {
        info!(
            "Updating {} \"{}\" to {}",
            what.name(),
            ctx.display(&repo.path),
            RevisionKind::of(rev)
        );
        let options = UpdateOptions {
            clean: flags.clean,
            clean_files: flags.clean_files,
            is_local: repo.is_local,
        };
        if let Err(e) = backend.update(&repo.path, rev, &options) {
            if e.is_fatal() {
                return Err(e);
            }
            ctx.recover(Error::UpdateFailed {
                name: repo.name.clone(),
                target: RevisionKind::of(rev).to_string(),
                hint: ctx.depth_hint(rev),
                source: Box::new(e),
            })?;
        }
        repo.remove_untracked_pointers(&ctx.backends)?;

        if top && what == PathType::Library {
            repo.refresh(&ctx.backends)?;
            repo.write_pointer(&ctx.root)?;
        }
    }

    remove_obsolete(ctx, &repo, &before, flags)?;
    repo.refresh(&ctx.backends)?;
    report_invalid(ctx, &mut repo)?;
    replace_moved(ctx, &repo, flags)?;

    for dep in &repo.dependencies {
        let result = if dep.is_present() {
            dep.check().and_then(|()| {
                update(ctx, &dep.path, dep.reference.rev.as_deref(), flags, false)
            })
        } else {
            fetch(ctx, &dep.reference, &dep.path, false)
                .and_then(|()| ignore_path(ctx, &repo, &dep.path))
        };
        if let Err(e) = result {
            ctx.recover(e.in_dependency(&dep.path))?;
        }
    }

    if top {
        Program::locate(&repo.path).set_root()?;
    }
    Ok(())
}

/// Discard `dep` if the gate allows it, otherwise report why not.
fn discard_gated(
    ctx: &Context,
    repo: &RepositoryHandle,
    dep: &Dependency,
    flags: UpdateFlags,
    why: &str,
) -> Result<()> {
    let child = RepositoryHandle::resolve(&ctx.backends, &dep.path)?;
    match child.can_update(&ctx.backends, flags.clean, flags.clean_deps)? {
        None => {
            info!("Removing library \"{}\" ({})", ctx.display(&dep.path), why);
            discard_checkout(ctx, repo, &dep.path)
        }
        Some(reason) => ctx.recover(child.blocked(reason)),
    }
}

/// Pass 1: checkouts whose pointer file disappeared with the new revision.
fn remove_obsolete(
    ctx: &Context,
    repo: &RepositoryHandle,
    before: &[Dependency],
    flags: UpdateFlags,
) -> Result<()> {
    for dep in before {
        if dep.pointer.is_file() || !dep.path.is_dir() {
            continue;
        }
        discard_gated(ctx, repo, dep, flags, "obsolete")?;
    }
    Ok(())
}

/// Pass 2: checkouts that track a different URL than their pointer declares.
/// They are discarded here and fetched again from the new URL afterwards.
fn replace_moved(ctx: &Context, repo: &RepositoryHandle, flags: UpdateFlags) -> Result<()> {
    for dep in &repo.dependencies {
        if dep.reference.kind == ReferenceKind::Local || dep.check().is_err() {
            continue;
        }
        let child = RepositoryHandle::resolve(&ctx.backends, &dep.path)?;
        let moved = match child.url.as_deref() {
            Some(url) if !child.is_local => !same_url(url, &dep.reference.url),
            _ => false,
        };
        if moved {
            discard_gated(ctx, repo, dep, flags, "changed URL, will add from new URL")?;
        }
    }
    Ok(())
}
