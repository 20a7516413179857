//! Bring a checkout's dependencies to the revisions its pointer files declare.

use std::path::Path;

use log::debug;

use super::update::{self, UpdateFlags};
use super::{fetch, ignore_path, report_invalid, Context};
use crate::error::Result;
use crate::repository::RepositoryHandle;
use crate::scm::DEFAULT_IGNORES;

/// Fetch every declared dependency of the checkout at `path` that is not on
/// disk yet and update the ones that are, recursively.
///
/// Dependencies already present are moved to their declared revision with
/// the same safety gate as `update`, so local work is never discarded.
pub fn deploy(ctx: &Context, path: &Path) -> Result<()> {
    let mut repo = RepositoryHandle::resolve(&ctx.backends, path)?;
    report_invalid(ctx, &mut repo)?;
    if let Some(backend) = repo.backend(&ctx.backends) {
        backend.write_ignores(&repo.path, DEFAULT_IGNORES)?;
    }

    for dep in &repo.dependencies {
        let result = if dep.is_present() {
            debug!("\"{}\" already present, updating", ctx.display(&dep.path));
            dep.check().and_then(|()| {
                update::update(
                    ctx,
                    &dep.path,
                    dep.reference.rev.as_deref(),
                    UpdateFlags::default(),
                    false,
                )
            })
        } else {
            fetch(ctx, &dep.reference, &dep.path, false)
                .and_then(|()| ignore_path(ctx, &repo, &dep.path))
        };
        if let Err(e) = result {
            ctx.recover(e.in_dependency(&dep.path))?;
        }
    }
    Ok(())
}
