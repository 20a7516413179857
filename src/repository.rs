//! # Repository Handles
//!
//! A [`RepositoryHandle`] is the in-memory model of one checkout: where it
//! lives, which backend manages it, the URL and revision it is at, and the
//! dependencies its pointer files declare. Handles are created by
//! [`RepositoryHandle::resolve`], which only reads from disk and from the
//! backend, and re-derived with [`RepositoryHandle::refresh`] whenever a
//! workflow has changed the checkout.
//!
//! The only durable projection of a handle is its pointer file, written by
//! [`RepositoryHandle::write_pointer`] into the parent checkout.
//!
//! [`RepositoryHandle::can_update`] is the safety gate every destructive
//! workflow step goes through: a checkout that is local-only, dirty or has
//! unpublished commits is never discarded without an explicit override.

use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use log::{debug, info};

use crate::config::SETTINGS_FILE;
use crate::error::{BlockReason, Error, Result};
use crate::reference::{same_url, Reference, ReferenceKind};
use crate::scm::{Backend, BackendKind, Backends, Outgoing};
use crate::walker::{self, InvalidPointer};

/// Suffix of pointer files for version-controlled dependencies.
pub const LIB_SUFFIX: &str = "lib";

/// Suffix of pointer files for snapshot builds.
pub const BLD_SUFFIX: &str = "bld";

/// Make a path absolute and lexically normalized without touching the
/// filesystem.
pub fn absolute(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// `path` relative to `base` with `/` separators, for messages and
/// synthesized local URLs. Falls back to the full path.
pub fn relative(base: &Path, path: &Path) -> String {
    match path.strip_prefix(base) {
        Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
        Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
        Err(_) => path.to_string_lossy().replace('\\', "/"),
    }
}

/// The pointer file that declares the checkout at `path`.
pub fn pointer_path(path: &Path, snapshot: bool) -> PathBuf {
    let suffix = if snapshot { BLD_SUFFIX } else { LIB_SUFFIX };
    let mut pointer = path.as_os_str().to_owned();
    pointer.push(".");
    pointer.push(suffix);
    PathBuf::from(pointer)
}

/// Whether a file name is a pointer file.
pub fn is_pointer_name(name: &str) -> bool {
    match name.rsplit_once('.') {
        Some((stem, ext)) => !stem.is_empty() && (ext == LIB_SUFFIX || ext == BLD_SUFFIX),
        None => false,
    }
}

/// Whether a stored pointer revision still describes the live one.
///
/// Equal revisions always match, including two absent ones. A stored
/// revision also matches when it is an abbreviated commit id (6 to 40 hex
/// digits) that prefixes the live id. Branch and tag names never match by
/// prefix.
pub fn revisions_match(stored: Option<&str>, live: Option<&str>) -> bool {
    match (stored, live) {
        (None, None) => true,
        (Some(stored), Some(live)) => {
            if stored == live {
                return true;
            }
            let abbreviated = (6..=40).contains(&stored.len())
                && stored.len() < live.len()
                && stored.chars().all(|c| c.is_ascii_hexdigit())
                && live.chars().all(|c| c.is_ascii_hexdigit());
            abbreviated && live[..stored.len()].eq_ignore_ascii_case(stored)
        }
        _ => false,
    }
}

/// Whether `path` is a checkout of any backend.
pub fn is_checkout(path: &Path) -> bool {
    BackendKind::detect(path).is_some()
}

/// Nearest directory at or above `path` that is a program root or a checkout.
pub fn find_parent(path: &Path) -> Option<PathBuf> {
    absolute(path)
        .ancestors()
        .find(|dir| dir.join(SETTINGS_FILE).is_file() || is_checkout(dir))
        .map(Path::to_path_buf)
}

/// Where a directory sits in a program tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathType {
    /// Not inside any program or checkout.
    Directory,
    /// The outermost checkout.
    Program,
    /// A checkout nested in another one.
    Library,
}

impl PathType {
    pub fn of(path: &Path) -> Self {
        let mut depth = 0;
        let mut current = find_parent(path);
        while let Some(found) = current {
            depth += 1;
            current = found.parent().and_then(find_parent);
        }
        match depth {
            0 => PathType::Directory,
            1 => PathType::Program,
            _ => PathType::Library,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PathType::Directory => "directory",
            PathType::Program => "program",
            PathType::Library => "library",
        }
    }
}

/// A dependency declared by a pointer file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub reference: Reference,
    /// Where the checkout belongs: the pointer path without its suffix.
    pub path: PathBuf,
    pub pointer: PathBuf,
}

impl Dependency {
    pub fn from_pointer(pointer: PathBuf, reference: Reference) -> Self {
        let path = pointer.with_extension("");
        Self {
            reference,
            path,
            pointer,
        }
    }

    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.reference.name.clone())
    }

    pub fn is_present(&self) -> bool {
        self.path.is_dir()
    }

    /// Fails unless the declared directory exists and is a checkout.
    pub fn check(&self) -> Result<()> {
        if !self.path.is_dir() {
            return Err(Error::MissingDependency {
                pointer: self.pointer.clone(),
                path: self.path.clone(),
            });
        }
        if !is_checkout(&self.path) {
            return Err(Error::NotACheckout {
                pointer: self.pointer.clone(),
                path: self.path.clone(),
            });
        }
        Ok(())
    }
}

/// Treat a failing backend query as "unknown"; a missing executable is
/// still an error.
fn tolerate<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e @ Error::BackendOperation { .. }) => {
            debug!("{}", e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// The live state of one checkout.
#[derive(Debug)]
pub struct RepositoryHandle {
    pub name: String,
    pub path: PathBuf,
    pub url: Option<String>,
    pub rev: Option<String>,
    pub backend: Option<BackendKind>,
    /// No remote is configured; `url` is a path relative to the parent.
    pub is_local: bool,
    pub is_snapshot: bool,
    pub dependencies: Vec<Dependency>,
    /// Pointer files that could not be parsed.
    pub invalid: Vec<InvalidPointer>,
}

impl RepositoryHandle {
    /// Probe `path` and build its handle. Never modifies the disk.
    pub fn resolve(backends: &Backends, path: &Path) -> Result<Self> {
        let path = absolute(path);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let mut handle = Self {
            name,
            path,
            url: None,
            rev: None,
            backend: None,
            is_local: false,
            is_snapshot: false,
            dependencies: Vec::new(),
            invalid: Vec::new(),
        };
        handle.refresh(backends)?;
        Ok(handle)
    }

    /// A handle for a dependency that may not exist on disk yet, carrying
    /// the declared URL and revision.
    pub fn declared(dependency: &Dependency) -> Self {
        let reference = &dependency.reference;
        Self {
            name: dependency.name(),
            path: dependency.path.clone(),
            url: Some(reference.url.clone()),
            rev: reference.rev.clone(),
            backend: None,
            is_local: reference.kind == ReferenceKind::Local,
            is_snapshot: reference.kind == ReferenceKind::Snapshot,
            dependencies: Vec::new(),
            invalid: Vec::new(),
        }
    }

    /// Re-derive URL, revision and dependencies from disk.
    pub fn refresh(&mut self, backends: &Backends) -> Result<()> {
        self.url = None;
        self.rev = None;
        self.dependencies.clear();
        self.invalid.clear();
        if !self.path.is_dir() {
            return Ok(());
        }

        self.backend = BackendKind::detect(&self.path);
        if let Some(kind) = self.backend {
            self.is_snapshot = kind == BackendKind::Snapshot;
            let backend = backends.get(kind);
            self.url = tolerate(backend.url(&self.path))?.filter(|u| !u.is_empty());
            self.rev = tolerate(backend.revision(&self.path))?.filter(|r| !r.is_empty());
        }

        self.is_local = self.url.is_none();
        if self.is_local {
            let parent = self.path.parent().and_then(find_parent);
            self.url = Some(match parent {
                Some(parent) => relative(&parent, &self.path),
                None => self.name.clone(),
            });
        }

        let discovery = walker::discover(&self.path)?;
        self.dependencies = discovery.dependencies;
        self.invalid = discovery.invalid;
        Ok(())
    }

    pub fn backend<'b>(&self, backends: &'b Backends) -> Option<&'b dyn Backend> {
        self.backend.map(|kind| backends.get(kind))
    }

    pub fn pointer_path(&self) -> PathBuf {
        pointer_path(&self.path, self.is_snapshot)
    }

    pub fn kind(&self) -> ReferenceKind {
        if self.is_snapshot {
            ReferenceKind::Snapshot
        } else if self.is_local {
            ReferenceKind::Local
        } else {
            ReferenceKind::Remote
        }
    }

    /// The reference this checkout should be declared with.
    pub fn reference(&self) -> Option<Reference> {
        let url = self.url.as_deref()?;
        Some(Reference::from_parts(
            self.kind(),
            url,
            self.rev.as_deref(),
            &self.name,
        ))
    }

    pub fn is_dirty(&self, backends: &Backends) -> Result<bool> {
        match self.backend(backends) {
            Some(backend) => backend.is_dirty(&self.path),
            None => Ok(false),
        }
    }

    pub fn outgoing(&self, backends: &Backends) -> Result<Outgoing> {
        match self.backend(backends) {
            Some(_) if self.is_local => Ok(Outgoing::NoRemote),
            Some(backend) => backend.outgoing(&self.path),
            None => Ok(Outgoing::NoRemote),
        }
    }

    pub fn is_detached(&self, backends: &Backends) -> Result<bool> {
        match self.backend(backends) {
            Some(backend) => backend.is_detached(&self.path),
            None => Ok(false),
        }
    }

    /// The update gate. `None` means the checkout may be discarded.
    ///
    /// `clean` overrides uncommitted changes, `clean_deps` overrides local-only
    /// checkouts and unpublished commits.
    pub fn can_update(
        &self,
        backends: &Backends,
        clean: bool,
        clean_deps: bool,
    ) -> Result<Option<BlockReason>> {
        if (self.is_local || self.url.is_none()) && !clean_deps {
            return Ok(Some(BlockReason::LocalOnly));
        }
        if !clean && self.is_dirty(backends)? {
            return Ok(Some(BlockReason::Dirty));
        }
        if !clean_deps && self.outgoing(backends)?.is_unpublished() {
            return Ok(Some(BlockReason::Unpublished));
        }
        Ok(None)
    }

    /// The error reported when the gate refuses.
    pub fn blocked(&self, reason: BlockReason) -> Error {
        Error::DivergenceBlocked {
            name: self.name.clone(),
            path: self.path.clone(),
            reason,
        }
    }

    /// Rewrite the pointer file if it no longer describes the checkout.
    /// Returns whether the file was written.
    pub fn write_pointer(&self, root: &Path) -> Result<bool> {
        let Some(reference) = self.reference() else {
            return Ok(false);
        };
        let pointer = self.pointer_path();
        if let Ok(existing) = fs::read_to_string(&pointer) {
            if let Ok(stored) = Reference::parse(existing.trim()) {
                if same_url(&stored.url, &reference.url)
                    && revisions_match(stored.rev.as_deref(), reference.rev.as_deref())
                {
                    debug!("Reference \"{}\" unmodified", self.name);
                    return Ok(false);
                }
            }
        }

        let rendered = reference.render();
        let display = if root == self.path {
            self.name.clone()
        } else {
            relative(root, &self.path)
        };
        info!("Updating reference \"{}\" -> \"{}\"", display, rendered);
        write_atomic(&pointer, &format!("{}\n", rendered))?;
        Ok(true)
    }

    /// Delete pointer files the backend reports as untracked. They are
    /// left over from a revision that has just been checked out away from.
    pub fn remove_untracked_pointers(&self, backends: &Backends) -> Result<()> {
        let Some(backend) = self.backend(backends) else {
            return Ok(());
        };
        for file in backend.untracked(&self.path)? {
            let name = file.rsplit('/').next().unwrap_or(&file);
            let path = self.path.join(&file);
            if is_pointer_name(name) && path.is_file() {
                info!("Remove untracked library reference \"{}\"", file);
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }
}

/// Write through a temporary sibling and rename over the target.
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let temp = path.with_file_name(format!(".{}.tmp", file_name));
    {
        let mut file = fs::File::create(&temp)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
    }
    if let Err(e) = fs::rename(&temp, path) {
        let _ = fs::remove_file(&temp);
        return Err(e.into());
    }
    Ok(())
}
