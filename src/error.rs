//! # Error Handling
//!
//! This module defines the centralized error type for `reftree`. It uses the
//! `thiserror` library to build a single `Error` enum covering every failure
//! mode of the synchronizer, with messages that tell the operator what went
//! wrong and, where possible, how to recover.
//!
//! ## Error Kinds
//!
//! - **Reference errors**: a pointer string matched none of the recognized
//!   grammars (`InvalidReference`).
//! - **Backend errors**: a version-control executable could not be located on
//!   the search path (`BackendNotFound`), or a backend call exited non-zero
//!   (`BackendOperation`).
//! - **Divergence errors**: the update safety gate refused to discard a
//!   checkout (`DivergenceBlocked`), carrying the specific `BlockReason`.
//! - **Tree errors**: pointer files that reference missing directories or
//!   directories that are not checkouts.
//! - **Ambient errors**: I/O, directory walking, settings, cache and
//!   download failures.
//!
//! Failures raised while recursing into a dependency are wrapped in
//! `Error::Dependency`, which records the path of the dependency so that the
//! final message carries full path context. `Error::innermost` strips those
//! wrappers again.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Why the update gate refused to discard a checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    /// The checkout has no remote it could be restored from.
    LocalOnly,
    /// The working tree has uncommitted changes.
    Dirty,
    /// The checkout has commits that were never pushed.
    Unpublished,
}

impl BlockReason {
    /// The command-line switch that overrides this block.
    pub fn override_flag(self) -> &'static str {
        match self {
            BlockReason::Dirty => "--clean",
            BlockReason::LocalOnly | BlockReason::Unpublished => "--clean-deps",
        }
    }
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockReason::LocalOnly => write!(
                f,
                "it is a local repository with no remote to restore it from"
            ),
            BlockReason::Dirty => write!(f, "it has uncommitted changes"),
            BlockReason::Unpublished => write!(f, "it has unpublished commits"),
        }
    }
}

/// Main error type for reftree operations
#[derive(Error, Debug)]
pub enum Error {
    /// A pointer string did not match any recognized reference grammar.
    #[error("Invalid reference \"{reference}\": {message}")]
    InvalidReference { reference: String, message: String },

    /// A configured version-control executable is not on the search path.
    #[error("Could not execute \"{program}\"\n  hint: verify that it is installed and reachable from your PATH")]
    BackendNotFound { program: String },

    /// A version-control command exited with a non-zero status.
    #[error("\"{command}\" in \"{}\" returned error code {}{}", dir.display(), code.map(|c| c.to_string()).unwrap_or_else(|| "?".to_string()), if stderr.is_empty() { String::new() } else { format!("\n{}", stderr.trim_end()) })]
    BackendOperation {
        command: String,
        dir: PathBuf,
        code: Option<i32>,
        stderr: String,
    },

    /// The update gate refused to discard a checkout.
    #[error("Refusing to replace \"{name}\" in \"{}\": {reason}\n  hint: publish or discard the changes first, or pass {} (this cannot be undone)", path.display(), reason.override_flag())]
    DivergenceBlocked {
        name: String,
        path: PathBuf,
        reason: BlockReason,
    },

    /// No backend was able to clone the given URL.
    #[error("Unable to clone repository ({url})")]
    CloneFailed { url: String },

    /// A checkout could not be moved to the requested revision.
    #[error("Unable to update \"{name}\" to {target}{}: {source}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    UpdateFailed {
        name: String,
        target: String,
        hint: Option<String>,
        #[source]
        source: Box<Error>,
    },

    /// A pointer file references a directory that does not exist.
    #[error("Library reference \"{}\" points to non-existing library in \"{}\"\n  hint: use \"reftree deploy\" to import missing libraries, or \"reftree sync\" to drop invalid references", pointer.display(), path.display())]
    MissingDependency { pointer: PathBuf, path: PathBuf },

    /// A pointer file references a directory that is not a checkout.
    #[error("Library reference \"{}\" points to \"{}\", which is not a valid repository", pointer.display(), path.display())]
    NotACheckout { pointer: PathBuf, path: PathBuf },

    /// No program or checkout was found above the given directory.
    #[error("Could not find a program in \"{}\"\n  hint: run \"reftree new .\" or \"reftree config ROOT .\" in the root of your program", path.display())]
    NotInProgram { path: PathBuf },

    /// Import target lives inside an existing program.
    #[error("Cannot import into \"{}\" because it is already part of program \"{program}\"\n  hint: use \"reftree add\" to import the URL as a library", path.display())]
    AlreadyInProgram { path: PathBuf, program: String },

    /// Import target is an existing, non-empty directory.
    #[error("Directory \"{}\" is not empty", path.display())]
    DirectoryNotEmpty { path: PathBuf },

    /// `new` would overwrite an existing program, library or repository.
    #[error("A {kind} already exists in \"{}\"\n  hint: select a different name or location", path.display())]
    AlreadyExists { kind: String, path: PathBuf },

    /// The checkout is not on a branch, so there is no upstream to follow.
    #[error("\"{name}\" is in detached HEAD state\n  hint: check out a branch before running \"reftree update\" without a revision")]
    Detached { name: String },

    /// Publishing needs a remote.
    #[error("\"{name}\" in \"{}\" is a local repository\n  hint: associate it with a remote repository URL before publishing", path.display())]
    LocalRepository { name: String, path: PathBuf },

    /// A failure that happened while working on a dependency.
    #[error("{}: {source}", path.display())]
    Dependency {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },

    /// An error occurred with a cache operation.
    #[error("Cache operation error: {message}")]
    Cache { message: String },

    /// A settings file could not be read or written.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A snapshot archive could not be downloaded or unpacked.
    #[error("Download of {url} failed: {message}")]
    Download { url: String, message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A directory walk error, wrapped from `walkdir::Error`.
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl Error {
    /// Strips `Dependency` wrappers and returns the error that started it.
    pub fn innermost(&self) -> &Error {
        match self {
            Error::Dependency { source, .. } => source.innermost(),
            other => other,
        }
    }

    /// Fatal errors abort the workflow even in ignore mode.
    pub fn is_fatal(&self) -> bool {
        matches!(self.innermost(), Error::BackendNotFound { .. })
    }

    /// Attach the path of the dependency being processed.
    pub fn in_dependency(self, path: impl Into<PathBuf>) -> Error {
        Error::Dependency {
            path: path.into(),
            source: Box::new(self),
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
