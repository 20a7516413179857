//! Read-only views of a dependency tree, behind `ls` and `status`.

use std::path::{Path, PathBuf};

use log::warn;
use serde::Serialize;

use super::Context;
use crate::error::Result;
use crate::reference::short_rev;
use crate::repository::{relative, RepositoryHandle};

/// One checkout in the tree printed by `ls`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    /// Name of the root, or the path relative to the parent for children.
    pub label: String,
    pub path: PathBuf,
    pub url: Option<String>,
    pub rev: Option<String>,
    pub children: Vec<TreeNode>,
    /// Pointer files next to the children whose content could not be parsed,
    /// relative to this checkout.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub invalid: Vec<String>,
}

impl TreeNode {
    /// `url#rev` when `detailed`, otherwise the abbreviated revision.
    pub fn describe(&self, detailed: bool) -> String {
        let rev = self.rev.as_deref().map(short_rev);
        let text = if detailed {
            match (self.url.as_deref(), rev) {
                (Some(url), Some(rev)) => format!("{}#{}", url, rev),
                (Some(url), None) => url.to_string(),
                (None, rev) => rev.unwrap_or_default().to_string(),
            }
        } else {
            rev.unwrap_or_default().to_string()
        };
        if text.is_empty() {
            "no revision".to_string()
        } else {
            text
        }
    }

    /// Number of checkouts in this subtree, including this one.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(TreeNode::count).sum::<usize>()
    }
}

/// Build the tree below `path`, children sorted by path.
pub fn tree(ctx: &Context, path: &Path) -> Result<TreeNode> {
    let repo = RepositoryHandle::resolve(&ctx.backends, path)?;
    build(ctx, repo, None)
}

fn build(ctx: &Context, repo: RepositoryHandle, parent: Option<&Path>) -> Result<TreeNode> {
    let label = match parent {
        Some(parent) => relative(parent, &repo.path),
        None => repo.name.clone(),
    };
    let mut dependencies = repo.dependencies;
    dependencies.sort_by(|a, b| a.path.cmp(&b.path));

    let mut invalid = Vec::new();
    for entry in &repo.invalid {
        warn!("{}: {}", ctx.display(&entry.pointer), entry.error);
        invalid.push(relative(&repo.path, &entry.pointer));
    }
    invalid.sort();

    let mut children = Vec::new();
    for dep in &dependencies {
        if let Err(e) = dep.check() {
            ctx.recover(e)?;
            continue;
        }
        let child = RepositoryHandle::resolve(&ctx.backends, &dep.path)?;
        children.push(build(ctx, child, Some(&repo.path))?);
    }

    Ok(TreeNode {
        label,
        path: repo.path,
        url: repo.url,
        rev: repo.rev,
        children,
        invalid,
    })
}

/// Version-control status of a checkout with uncommitted changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutStatus {
    pub name: String,
    pub path: PathBuf,
    pub status: String,
}

/// Every checkout in the tree below `path` that has uncommitted changes,
/// parents before their dependencies.
pub fn status(ctx: &Context, path: &Path) -> Result<Vec<CheckoutStatus>> {
    let mut found = Vec::new();
    collect_status(ctx, path, &mut found)?;
    Ok(found)
}

fn collect_status(ctx: &Context, path: &Path, found: &mut Vec<CheckoutStatus>) -> Result<()> {
    let repo = RepositoryHandle::resolve(&ctx.backends, path)?;
    if let Some(backend) = repo.backend(&ctx.backends) {
        if backend.is_dirty(&repo.path)? {
            found.push(CheckoutStatus {
                name: repo.name.clone(),
                path: repo.path.clone(),
                status: backend.status(&repo.path)?,
            });
        }
    }
    for dep in &repo.dependencies {
        match dep.check() {
            Ok(()) => collect_status(ctx, &dep.path, found)?,
            Err(e) => ctx.recover(e)?,
        }
    }
    Ok(())
}
