//! Commit and push a checkout and its dependencies, children first, so that
//! every pointer file a parent commits names a revision that already exists
//! upstream.

use std::path::Path;

use log::info;

use super::sync::{self, SyncOptions};
use super::Context;
use crate::error::{Error, Result};
use crate::repository::{PathType, RepositoryHandle};
use crate::scm::Outgoing;

/// Supplies commit messages for checkouts with uncommitted changes when no
/// message was given up front.
pub trait CommitPrompt {
    fn commit_message(&self, repo: &RepositoryHandle) -> Result<String>;
}

/// Uses the same message for every checkout.
#[derive(Debug, Clone)]
pub struct FixedMessage(pub String);

impl CommitPrompt for FixedMessage {
    fn commit_message(&self, _repo: &RepositoryHandle) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Publish the checkout at `path`.
///
/// `all_refs` pushes every branch instead of the current one. `message`, when
/// set, is used for every commit; otherwise `prompt` is asked per checkout.
pub fn publish(
    ctx: &Context,
    path: &Path,
    all_refs: bool,
    message: Option<&str>,
    prompt: &dyn CommitPrompt,
    top: bool,
) -> Result<()> {
    if top {
        info!("Checking for local modifications...");
    }

    let repo = RepositoryHandle::resolve(&ctx.backends, path)?;
    let Some(backend) = repo.backend(&ctx.backends).filter(|_| !repo.is_local) else {
        return Err(Error::LocalRepository {
            name: repo.name.clone(),
            path: repo.path.clone(),
        });
    };

    for dep in &repo.dependencies {
        if dep.check().is_ok() {
            publish(ctx, &dep.path, all_refs, message, prompt, false)
                .map_err(|e| e.in_dependency(&dep.path))?;
        }
    }

    let options = SyncOptions {
        recursive: false,
        ..SyncOptions::default()
    };
    sync::sync(ctx, &repo.path, options, false)?;

    if backend.is_dirty(&repo.path)? {
        info!(
            "Uncommitted changes in {} \"{}\" in \"{}\"",
            PathType::of(&repo.path).name(),
            repo.name,
            repo.path.display()
        );
        let message = match message {
            Some(message) => message.to_string(),
            None => prompt.commit_message(&repo)?,
        };
        backend.commit(&repo.path, &message)?;
    }

    match backend.outgoing(&repo.path)? {
        Outgoing::Nothing => {
            if top {
                info!("Nothing to publish to the remote repository (the source tree is unmodified)");
            }
        }
        Outgoing::Pending | Outgoing::NoRemote => {
            info!(
                "Pushing local repository \"{}\" to remote \"{}\"",
                repo.name,
                repo.url.as_deref().unwrap_or_default()
            );
            backend.publish(&repo.path, all_refs)?;
        }
    }
    Ok(())
}
