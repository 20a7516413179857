//! # Repository Cache
//!
//! An optional on-disk store of backend metadata, used to avoid full network
//! clones. Entries are keyed by the `https` form of the repository URL:
//! `https://github.com/org/driver` is cached under
//! `<cache>/github.com/org/driver`.
//!
//! Only the backend's metadata directory (`.git`, `.hg`) is stored. A clone
//! from the cache copies the entry, points it at the real remote and runs a
//! clean update, which restores the working files. Any failure on that path
//! removes the partial copy so the caller can fall back to a real clone.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::Serialize;
use url::Url;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::reference::{format_url, UrlFormat};
use crate::scm::{Backend, BackendKind, UpdateOptions};

/// A cached repository found by [`Cache::entries`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheEntry {
    /// `host/path` key of the entry.
    pub key: String,
    pub path: PathBuf,
    pub kind: BackendKind,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cache {
    root: PathBuf,
}

impl Cache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where an entry for `url` lives, whether or not it exists.
    pub fn location(&self, url: &str) -> Option<PathBuf> {
        let https = format_url(url, UrlFormat::Https);
        let parsed = Url::parse(&https).ok()?;
        let host = match parsed.host_str() {
            Some(host) => host,
            None if parsed.scheme() == "file" => "localhost",
            None => return None,
        };
        let path = parsed.path().trim_matches('/');
        if path.is_empty() {
            return None;
        }
        let path = path.strip_suffix(".git").unwrap_or(path);
        let mut location = self.root.join(host);
        for segment in path.split('/').filter(|s| !s.is_empty() && *s != "..") {
            location.push(segment);
        }
        Some(location)
    }

    /// Existing entry for `url`.
    pub fn lookup(&self, url: &str) -> Option<PathBuf> {
        self.location(url).filter(|path| path.is_dir())
    }

    /// Clone `url` into `path` from the cache. Returns `false` when there is
    /// no usable entry; nothing is left behind in that case.
    pub fn try_clone(
        &self,
        backend: &dyn Backend,
        url: &str,
        path: &Path,
        rev: Option<&str>,
    ) -> Result<bool> {
        let Some(entry) = self.lookup(url) else {
            return Ok(false);
        };
        if path.exists() || !entry.join(backend.kind().marker()).is_dir() {
            return Ok(false);
        }
        info!("Found matching cached repository in \"{}\"", entry.display());

        let attempt = || -> Result<()> {
            info!("Carbon copy from \"{}\" to \"{}\"", entry.display(), path.display());
            copy_dir(&entry, path)?;
            backend.set_url(path, url)?;
            info!("Update cached copy from remote repository");
            let options = UpdateOptions {
                clean: true,
                ..UpdateOptions::default()
            };
            backend.update(path, rev, &options)
        };

        match attempt() {
            Ok(()) => Ok(true),
            Err(e) if e.is_fatal() => {
                remove_partial(path);
                Err(e)
            }
            Err(e) => {
                warn!("Unable to use cached copy of \"{}\": {}", url, e);
                remove_partial(path);
                Ok(false)
            }
        }
    }

    /// Refresh the entry for `url` from a fresh checkout. Failures are only
    /// logged.
    pub fn store(&self, backend: &dyn Backend, url: &str, path: &Path) {
        let Some(location) = self.location(url) else {
            return;
        };
        let marker = backend.kind().marker();
        let source = path.join(marker);
        if !source.is_dir() {
            return;
        }
        let target = location.join(marker);
        let result = (|| -> Result<()> {
            fs::create_dir_all(&location)?;
            if target.is_dir() {
                fs::remove_dir_all(&target)?;
            }
            copy_dir(&source, &target)
        })();
        match result {
            Ok(()) => debug!("Cached \"{}\" in \"{}\"", url, location.display()),
            Err(e) => warn!(
                "Unable to cache \"{}\" to \"{}\": {}",
                path.display(),
                location.display(),
                e
            ),
        }
    }

    /// Every cached repository, sorted by key.
    pub fn entries(&self) -> Result<Vec<CacheEntry>> {
        let mut entries = Vec::new();
        if !self.root.is_dir() {
            return Ok(entries);
        }
        let mut walker = WalkDir::new(&self.root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter();
        while let Some(entry) = walker.next() {
            let entry = entry?;
            if !entry.file_type().is_dir() {
                continue;
            }
            let Some(kind) = BackendKind::detect(entry.path()) else {
                continue;
            };
            walker.skip_current_dir();
            let key = entry
                .path()
                .strip_prefix(&self.root)
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            entries.push(CacheEntry {
                key,
                path: entry.path().to_path_buf(),
                kind,
                size: dir_size(entry.path()),
            });
        }
        Ok(entries)
    }

    /// Delete every entry. Returns how many were removed.
    pub fn clean(&self) -> Result<usize> {
        let entries = self.entries()?;
        for entry in &entries {
            fs::remove_dir_all(&entry.path).map_err(|e| Error::Cache {
                message: format!("unable to remove {}: {}", entry.path.display(), e),
            })?;
        }
        // Drop the now empty host directories
        if self.root.is_dir() {
            for host in fs::read_dir(&self.root)? {
                let host = host?.path();
                if host.is_dir() && is_empty_tree(&host) {
                    fs::remove_dir_all(&host)?;
                }
            }
        }
        Ok(entries.len())
    }
}

fn remove_partial(path: &Path) {
    if path.is_dir() {
        if let Err(e) = fs::remove_dir_all(path) {
            warn!("Unable to remove \"{}\": {}", path.display(), e);
        }
    }
}

fn is_empty_tree(path: &Path) -> bool {
    WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .all(|e| e.file_type().is_dir())
}

fn dir_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

/// Recursively copy a directory. Symlinks are recreated, not followed.
pub(crate) fn copy_dir(source: &Path, target: &Path) -> Result<()> {
    for entry in WalkDir::new(source) {
        let entry = entry?;
        let rel = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| Error::Cache {
                message: e.to_string(),
            })?;
        let dest = target.join(rel);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&dest)?;
        } else if file_type.is_symlink() {
            let link = fs::read_link(entry.path())?;
            #[cfg(unix)]
            std::os::unix::fs::symlink(&link, &dest)?;
            #[cfg(not(unix))]
            {
                let _ = link;
                fs::copy(entry.path(), &dest)?;
            }
        } else {
            fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}

/// Human readable size, for `cache list`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}
