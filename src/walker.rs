//! # Dependency Discovery
//!
//! Walks a checkout for pointer files and returns an immutable snapshot of
//! what they declare. Discovery never writes; workflows that rewrite pointer
//! files do so afterwards, driven by the snapshot.
//!
//! The walk skips:
//!
//! - dot entries (backend metadata, tool state),
//! - directories that have a sibling pointer file, which are that pointer's
//!   checkout and declare their own dependencies,
//! - nested checkouts, whose pointer files belong to them.
//!
//! Entries are visited sorted by file name so results are deterministic.

use std::fs;
use std::path::{Path, PathBuf};

use log::warn;
use walkdir::{DirEntry, WalkDir};

use crate::error::{Error, Result};
use crate::reference::Reference;
use crate::repository::{is_checkout, is_pointer_name, pointer_path, Dependency};

/// Leading bytes of a static library archive, which shares the `.lib` suffix
/// with pointer files on some toolchains.
const ARCHIVE_MAGIC: &[u8] = b"!<arch>";

/// A pointer file whose content is not a valid reference.
#[derive(Debug)]
pub struct InvalidPointer {
    pub pointer: PathBuf,
    pub error: Error,
}

/// What a walk found.
#[derive(Debug, Default)]
pub struct Discovery {
    pub dependencies: Vec<Dependency>,
    pub invalid: Vec<InvalidPointer>,
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

/// Whether a directory is declared by a pointer file next to it.
fn has_pointer(dir: &Path) -> bool {
    pointer_path(dir, false).is_file() || pointer_path(dir, true).is_file()
}

/// Read one pointer file. `Ok(None)` means the file is not a pointer at all.
pub fn read_pointer(pointer: &Path) -> Result<Option<Result<Reference>>> {
    let bytes = fs::read(pointer)?;
    if bytes.starts_with(ARCHIVE_MAGIC) {
        warn!(
            "A static library \"{}\" uses the pointer file extension; rename it (for example to \"{}\")",
            pointer.display(),
            pointer.with_extension("ar").display()
        );
        return Ok(None);
    }
    let content = String::from_utf8_lossy(&bytes);
    Ok(Some(Reference::parse(content.trim())))
}

/// Collect the dependencies declared below `root`.
pub fn discover(root: &Path) -> Result<Discovery> {
    let mut discovery = Discovery::default();
    let walker = WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            !is_hidden(entry)
                && !(entry.file_type().is_dir()
                    && (has_pointer(entry.path()) || is_checkout(entry.path())))
        });

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() || !is_pointer_name(&entry.file_name().to_string_lossy()) {
            continue;
        }
        let pointer = entry.into_path();
        match read_pointer(&pointer)? {
            None => {}
            Some(Ok(reference)) => discovery
                .dependencies
                .push(Dependency::from_pointer(pointer, reference)),
            Some(Err(error)) => discovery.invalid.push(InvalidPointer { pointer, error }),
        }
    }
    Ok(discovery)
}

/// Nested checkouts below `root` that no pointer file declares.
pub fn find_unlinked(root: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut walker = WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_hidden(entry));

    while let Some(entry) = walker.next() {
        let entry = entry?;
        if !entry.file_type().is_dir() || !is_checkout(entry.path()) {
            continue;
        }
        if !has_pointer(entry.path()) {
            found.push(entry.path().to_path_buf());
        }
        walker.skip_current_dir();
    }
    Ok(found)
}
