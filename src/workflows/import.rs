//! Creating, importing, adding and removing single checkouts.

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

use super::sync::{self, SyncOptions};
use super::{add_pointer, current, fetch, ignore_path, remove_pointer, unignore_path, Context};
use crate::config::Program;
use crate::error::{Error, Result};
use crate::reference::Reference;
use crate::repository::{absolute, find_parent, is_checkout, pointer_path, RepositoryHandle};
use crate::scm::{BackendKind, DEFAULT_IGNORES};

/// What `new` should create.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NewKind {
    /// A library inside an existing program, a program anywhere else.
    #[default]
    Auto,
    Program,
    Library,
}

fn entry_count(dir: &Path) -> Result<usize> {
    Ok(fs::read_dir(dir)?.count())
}

/// Refuse destinations that already hold more than a stray file.
fn ensure_empty(path: &Path) -> Result<()> {
    if path.is_dir() && entry_count(path)? > 1 {
        return Err(Error::DirectoryNotEmpty {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

/// Where a checkout of `reference` goes: `path` relative to the context
/// root, or a directory named after the reference.
fn destination(ctx: &Context, reference: &Reference, path: Option<&Path>) -> PathBuf {
    match path {
        Some(path) => absolute(&ctx.root.join(path)),
        None => ctx.root.join(&reference.name),
    }
}

/// Expand a bare name like `driver` against the configured base URL.
fn expand_url(ctx: &Context, url: &str) -> String {
    if Reference::is_url(url) || ctx.root.join(url).exists() {
        return url.to_string();
    }
    match &ctx.base_url {
        Some(base) => format!("{}/{}", base.trim_end_matches('/'), url),
        None => url.to_string(),
    }
}

/// Import a program and all of its dependencies. Returns the program path.
pub fn import(ctx: &Context, url: &str, path: Option<&Path>) -> Result<PathBuf> {
    let reference = Reference::parse(&expand_url(ctx, url))?;
    let target = destination(ctx, &reference, path);

    let program = Program::locate(&target);
    if !program.is_cwd {
        return Err(Error::AlreadyInProgram {
            path: target,
            program: program.name,
        });
    }
    ensure_empty(&target)?;

    // Messages below the program are shown relative to it
    let ctx = Context {
        root: target.clone(),
        ..ctx.clone()
    };
    fetch(&ctx, &reference, &target, true)?;
    Ok(target)
}

/// Add a library to the program containing the context root. Returns the
/// library path.
pub fn add(ctx: &Context, url: &str, path: Option<&Path>) -> Result<PathBuf> {
    let repo = RepositoryHandle::resolve(&ctx.backends, &current(&ctx.root)?)?;
    let reference = Reference::parse(url)?;
    let target = destination(ctx, &reference, path);
    ensure_empty(&target)?;

    fetch(ctx, &reference, &target, false)?;
    ignore_path(ctx, &repo, &target)?;

    let lib = RepositoryHandle::resolve(&ctx.backends, &target)?;
    lib.write_pointer(&ctx.root)?;
    add_pointer(ctx, &repo, &lib.pointer_path())?;
    Ok(target)
}

/// Delete a library checkout together with its pointer file and ignore entry.
pub fn remove(ctx: &Context, path: &Path) -> Result<()> {
    let target = absolute(&ctx.root.join(path));
    if !is_checkout(&target) {
        return Err(Error::NotACheckout {
            pointer: pointer_path(&target, false),
            path: target,
        });
    }
    let parent = target
        .parent()
        .and_then(find_parent)
        .ok_or_else(|| Error::NotInProgram {
            path: target.clone(),
        })?;
    let repo = RepositoryHandle::resolve(&ctx.backends, &parent)?;
    let lib = RepositoryHandle::resolve(&ctx.backends, &target)?;

    info!(
        "Removing library \"{}\" in \"{}\"",
        lib.name,
        lib.path.display()
    );
    fs::remove_dir_all(&lib.path)?;
    remove_pointer(ctx, &repo, &lib.pointer_path())?;
    unignore_path(ctx, &repo, &lib.path)
}

/// Create a new program or library at `path`, initialized with `scm` or as a
/// plain directory. Returns what was created.
pub fn new(
    ctx: &Context,
    path: &Path,
    scm: Option<BackendKind>,
    kind: NewKind,
) -> Result<NewKind> {
    let target = absolute(&ctx.root.join(path));
    let parent = target.parent().map(Path::to_path_buf).unwrap_or_else(|| target.clone());

    let kind = match kind {
        NewKind::Auto if Program::locate(&parent).is_cwd => NewKind::Program,
        NewKind::Auto => NewKind::Library,
        explicit => explicit,
    };
    let label = if kind == NewKind::Program { "program" } else { "library" };

    if target.exists() {
        let taken = match kind {
            NewKind::Program => !Program::locate(&target).is_cwd,
            _ => is_checkout(&target),
        };
        if taken {
            return Err(Error::AlreadyExists {
                kind: label.to_string(),
                path: target,
            });
        }
    }

    match scm {
        Some(BackendKind::Snapshot) => {
            return Err(Error::Config {
                message: "snapshot builds cannot be created, choose git or hg".to_string(),
            })
        }
        Some(scm) => match BackendKind::detect(&target) {
            Some(existing) if existing != scm => {
                return Err(Error::AlreadyExists {
                    kind: format!("{} repository", existing),
                    path: target,
                })
            }
            Some(_) => {}
            None => ctx.backends.get(scm).init(&target)?,
        },
        None => fs::create_dir_all(&target)?,
    }

    if entry_count(&target)? > 1 {
        warn!("Directory \"{}\" is not empty.", target.display());
    }

    info!(
        "Creating new {} \"{}\" ({})",
        label,
        target.file_name().unwrap_or_default().to_string_lossy(),
        scm.map(|s| s.name()).unwrap_or("folder")
    );

    let program = Program::at(&target);
    if kind == NewKind::Program {
        program.set_root()?;
        if let Some(backend) = ctx.backends.detect(&target) {
            backend.write_ignores(&target, DEFAULT_IGNORES)?;
        }
    } else {
        program.unset_root()?;
        if let Some(enclosing) = find_parent(&parent) {
            sync::sync(ctx, &enclosing, SyncOptions::default(), true)?;
        }
    }
    Ok(kind)
}
