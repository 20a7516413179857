//! # Synchronization Workflows
//!
//! The recursive operations over a dependency tree. Each one starts at a
//! checkout, resolves its [`RepositoryHandle`], works through the declared
//! dependencies and recurses into the ones present on disk:
//!
//! - [`deploy`](deploy::deploy) fetches whatever is declared but missing.
//! - [`update`](update::update) moves a checkout to a revision and reconciles
//!   the dependencies that changed with it.
//! - [`sync`](sync::sync) rewrites pointer files from what is on disk.
//! - [`publish`](publish::publish) commits and pushes, children first.
//!
//! [`import`](import::import), [`add`](import::add), [`remove`](import::remove)
//! and [`new`](import::new) manage single checkouts, and [`inspect`] holds the
//! read-only views (`ls`, `status`).
//!
//! All state a workflow needs travels in a [`Context`]. Nothing changes the
//! process working directory; every path is absolute.
//!
//! ## Failure handling
//!
//! Failures in a child are wrapped with the child's path. By default they abort
//! the whole workflow and leave the tree as far as it got. With
//! [`Context::ignore`] set they are logged as warnings and the remaining
//! siblings are still processed, except for a missing backend executable,
//! which is always fatal.

pub mod deploy;
pub mod import;
pub mod inspect;
pub mod publish;
pub mod sync;
pub mod update;

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::cache::Cache;
use crate::config::Program;
use crate::error::{Error, Result};
use crate::reference::{format_url, Reference, RevisionKind, UrlFormat};
use crate::repository::{find_parent, relative, RepositoryHandle};
use crate::scm::{BackendKind, Backends, CloneOptions, DEFAULT_IGNORES};

pub use deploy::deploy;
pub use import::{add, import, new, remove, NewKind};
pub use inspect::{status, tree, CheckoutStatus, TreeNode};
pub use publish::{publish, CommitPrompt, FixedMessage};
pub use sync::{sync, SyncOptions};
pub use update::{update, UpdateFlags};

/// Settings and flags shared by every step of a workflow.
#[derive(Debug, Clone)]
pub struct Context {
    /// Directory the workflow was started from; messages show paths
    /// relative to it.
    pub root: PathBuf,
    pub backends: Backends,
    pub cache: Option<Cache>,
    pub clone: CloneOptions,
    /// Demote recoverable failures to warnings.
    pub ignore: bool,
    /// Prefix for bare names given to `import`.
    pub base_url: Option<String>,
}

impl Context {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: crate::repository::absolute(&root.into()),
            backends: Backends::default(),
            cache: None,
            clone: CloneOptions::default(),
            ignore: false,
            base_url: None,
        }
    }

    /// Context for working in `root`, configured from the settings of the
    /// program it belongs to.
    pub fn for_program(root: impl Into<PathBuf>) -> Result<Self> {
        let mut ctx = Self::new(root);
        let program = Program::locate(&ctx.root);
        let git = program.get("GIT_CMD")?.unwrap_or_else(|| "git".to_string());
        let hg = program.get("HG_CMD")?.unwrap_or_else(|| "hg".to_string());
        ctx.backends = Backends::new(&git, &hg);
        ctx.cache = program.get("CACHE")?.map(Cache::new);
        if let Some(protocol) = program.get("PROTOCOL")? {
            ctx.clone.protocol = protocol.parse()?;
        }
        ctx.base_url = program.get("BASE_URL")?;
        Ok(ctx)
    }

    pub fn with_ignore(mut self, ignore: bool) -> Self {
        self.ignore = ignore;
        self
    }

    pub fn with_depth(mut self, depth: Option<u32>) -> Self {
        self.clone.depth = depth;
        self
    }

    pub fn with_protocol(mut self, protocol: UrlFormat) -> Self {
        self.clone.protocol = protocol;
        self
    }

    pub fn with_cache(mut self, cache: Option<Cache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_backends(mut self, backends: Backends) -> Self {
        self.backends = backends;
        self
    }

    /// How to name `path` in messages.
    pub fn display(&self, path: &Path) -> String {
        if path == self.root {
            path.file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| ".".to_string())
        } else {
            relative(&self.root, path)
        }
    }

    /// Continue after `error` when ignoring is enabled and the error allows it.
    pub fn recover(&self, error: Error) -> Result<()> {
        if self.ignore && !error.is_fatal() {
            warn!("{}", error);
            Ok(())
        } else {
            Err(error)
        }
    }

    /// Hint attached to update failures when history was truncated.
    fn depth_hint(&self, rev: Option<&str>) -> Option<String> {
        self.clone.depth.map(|_| {
            format!(
                "the --depth option might prevent fetching the whole revision tree and checking out {}",
                RevisionKind::of(rev)
            )
        })
    }
}

/// The checkout containing `path`, for commands run from inside a program.
pub fn current(path: &Path) -> Result<PathBuf> {
    find_parent(path).ok_or_else(|| Error::NotInProgram {
        path: path.to_path_buf(),
    })
}

/// Report pointer files that could not be parsed.
fn report_invalid(ctx: &Context, repo: &mut RepositoryHandle) -> Result<()> {
    for invalid in repo.invalid.drain(..) {
        ctx.recover(invalid.error.in_dependency(invalid.pointer))?;
    }
    Ok(())
}

/// Add `path` to the ignore list of `repo`.
fn ignore_path(ctx: &Context, repo: &RepositoryHandle, path: &Path) -> Result<()> {
    match repo.backend(&ctx.backends) {
        Some(backend) => backend.ignore(&repo.path, &relative(&repo.path, path)),
        None => Ok(()),
    }
}

fn unignore_path(ctx: &Context, repo: &RepositoryHandle, path: &Path) -> Result<()> {
    match repo.backend(&ctx.backends) {
        Some(backend) => backend.unignore(&repo.path, &relative(&repo.path, path)),
        None => Ok(()),
    }
}

/// Stop tracking a pointer file in `repo` and delete it.
fn remove_pointer(ctx: &Context, repo: &RepositoryHandle, pointer: &Path) -> Result<()> {
    match repo.backend(&ctx.backends) {
        Some(backend) => backend.remove(&repo.path, &relative(&repo.path, pointer)),
        None => {
            if pointer.is_file() {
                fs::remove_file(pointer)?;
            }
            Ok(())
        }
    }
}

/// Start tracking a pointer file in `repo`.
fn add_pointer(ctx: &Context, repo: &RepositoryHandle, pointer: &Path) -> Result<()> {
    match repo.backend(&ctx.backends) {
        Some(backend) => backend.add(&repo.path, &relative(&repo.path, pointer)),
        None => Ok(()),
    }
}

/// Remove a checkout that is about to be replaced or dropped.
fn discard_checkout(ctx: &Context, parent: &RepositoryHandle, path: &Path) -> Result<()> {
    fs::remove_dir_all(path)?;
    unignore_path(ctx, parent, path)
}

/// Clone `url` into `path` with the first backend that manages it.
///
/// Backends whose URL pattern matches are tried first. Each attempt starts
/// from the cache when one is configured. On success the checkout gets the
/// default ignore list and the cache entry is refreshed.
fn clone_into(ctx: &Context, url: &str, path: &Path, rev: Option<&str>) -> Result<BackendKind> {
    let existed = path.exists();
    let mut not_found: Option<Error> = None;

    for backend in ctx.backends.candidates(url) {
        let matching = backend.matches_url(url);

        if let Some(cache) = &ctx.cache {
            match cache.try_clone(backend, url, path, rev) {
                Ok(true) => {
                    backend.write_ignores(path, DEFAULT_IGNORES)?;
                    return Ok(backend.kind());
                }
                Ok(false) => {}
                Err(e) => {
                    if matching && not_found.is_none() {
                        not_found = Some(e);
                    }
                    continue;
                }
            }
        }

        match backend.clone_repo(url, path, &ctx.clone) {
            Ok(()) => {
                backend.write_ignores(path, DEFAULT_IGNORES)?;
                if let Some(cache) = &ctx.cache {
                    cache.store(backend, url, path);
                }
                return Ok(backend.kind());
            }
            Err(e) => {
                debug!("{} clone of \"{}\" failed: {}", backend.kind(), url, e);
                if !existed && path.exists() {
                    fs::remove_dir_all(path)?;
                }
                if e.is_fatal() && matching && not_found.is_none() {
                    not_found = Some(e);
                }
            }
        }
    }

    Err(not_found.unwrap_or_else(|| Error::CloneFailed {
        url: url.to_string(),
    }))
}

/// Fetch a declared dependency into `path` and deploy its own dependencies.
///
/// `top` marks the checkout as a program root instead of a library.
fn fetch(ctx: &Context, reference: &Reference, path: &Path, top: bool) -> Result<()> {
    let rev = reference.rev.as_deref();
    info!(
        "{} \"{}\" from \"{}\" at {}",
        if top { "Importing program" } else { "Adding library" },
        ctx.display(path),
        format_url(&reference.url, ctx.clone.protocol),
        RevisionKind::of(rev)
    );

    match clone_into(ctx, &reference.url, path, rev) {
        Ok(kind) => {
            if top {
                Program::at(path).set_root()?;
            }
            let backend = ctx.backends.get(kind);
            if let Err(e) = backend.checkout(path, rev, true) {
                if e.is_fatal() {
                    return Err(e);
                }
                ctx.recover(Error::UpdateFailed {
                    name: reference.name.clone(),
                    target: RevisionKind::of(rev).to_string(),
                    hint: ctx.depth_hint(rev),
                    source: Box::new(e),
                })?;
            }
        }
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => ctx.recover(e)?,
    }

    if path.is_dir() {
        deploy::deploy(ctx, path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_recover_respects_ignore_and_fatality() {
        let ctx = Context::new("/w").with_ignore(true);
        assert!(ctx
            .recover(Error::CloneFailed {
                url: "https://example.com/x".to_string()
            })
            .is_ok());
        assert!(ctx
            .recover(Error::BackendNotFound {
                program: "hg".to_string()
            })
            .is_err());

        let strict = Context::new("/w");
        assert!(strict
            .recover(Error::CloneFailed {
                url: "https://example.com/x".to_string()
            })
            .is_err());
    }

    #[test]
    fn test_recover_logs_demoted_error() {
        testing_logger::setup();
        let ctx = Context::new("/w").with_ignore(true);
        ctx.recover(Error::CloneFailed {
            url: "https://example.com/x".to_string(),
        })
        .unwrap();

        testing_logger::validate(|logs| {
            assert_eq!(logs.len(), 1);
            assert_eq!(logs[0].level, log::Level::Warn);
            assert!(logs[0].body.contains("https://example.com/x"));
        });
    }

    #[test]
    fn test_display_paths() {
        let ctx = Context::new("/w/prog");
        assert_eq!(ctx.display(Path::new("/w/prog")), "prog");
        assert_eq!(ctx.display(Path::new("/w/prog/libs/driver")), "libs/driver");
    }

    #[test]
    fn test_current_requires_program() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("prog/.git")).unwrap();
        fs::create_dir_all(temp.path().join("prog/src")).unwrap();
        assert_eq!(
            current(&temp.path().join("prog/src")).unwrap(),
            temp.path().join("prog")
        );
    }

    #[test]
    fn test_clone_failure_removes_partial_directory() {
        let temp = TempDir::new().unwrap();
        let ctx = Context::new(temp.path()).with_backends(Backends::new(
            "reftree-no-such-git",
            "reftree-no-such-hg",
        ));
        let target = temp.path().join("driver");
        let err = clone_into(&ctx, "https://github.com/org/driver", &target, None).unwrap_err();
        assert!(matches!(err, Error::BackendNotFound { .. }));
        assert!(!target.exists());
    }

    #[test]
    fn test_depth_hint() {
        let ctx = Context::new("/w").with_depth(Some(1));
        let hint = ctx.depth_hint(Some("0123456789abcdef")).unwrap();
        assert!(hint.contains("rev #0123456789ab"));
        assert!(Context::new("/w").depth_hint(None).is_none());
    }
}
