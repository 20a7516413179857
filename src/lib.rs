//! # reftree
//!
//! Keeps a tree of source-controlled programs and libraries in step. A
//! checkout declares each dependency in a small pointer file next to the
//! directory the dependency lives in:
//!
//! ```text
//! prog/
//! ├── driver.lib      https://github.com/org/driver/#3f2a9c1d7e8b
//! ├── driver/         (git checkout of org/driver at 3f2a9c1d7e8b)
//! ├── mbed.bld        https://os.example.org/code/mbed/builds/65be27845400
//! └── mbed/           (unpacked snapshot archive)
//! ```
//!
//! The library discovers the declared tree, fetches what is missing, moves
//! checkouts to new revisions, rewrites pointer files from what is on disk
//! and publishes local commits. It never discards a checkout that holds
//! uncommitted, unpublished or local-only work unless told to.
//!
//! ## Quick Example
//!
//! ```
//! use reftree::reference::{Reference, ReferenceKind};
//!
//! let reference = Reference::parse("git@github.com:org/driver.git#3f2a9c1d7e8b").unwrap();
//! assert_eq!(reference.kind, ReferenceKind::Remote);
//! assert_eq!(reference.name, "driver");
//! assert_eq!(reference.render(), "https://github.com/org/driver/#3f2a9c1d7e8b");
//! ```
//!
//! ## Modules
//!
//! - **References (`reference`)**: parsing and rendering of pointer-file
//!   contents, URL transport rewriting.
//! - **Backends (`scm`, `process`)**: the `Backend` trait and its git,
//!   Mercurial and snapshot implementations, all driven through external
//!   processes with an explicit working directory.
//! - **Repository handles (`repository`, `walker`)**: the live state of one
//!   checkout and the discovery of the pointer files below it.
//! - **Workflows (`workflows`)**: deploy, update, sync and publish, plus the
//!   single-checkout operations and read-only views.
//! - **Support (`cache`, `config`, `build`, `error`)**: the clone cache,
//!   settings files, the build driver hand-off and the error type.
//! - **CLI helpers (`output`, `suggestions`)**: terminal output and
//!   hint-bearing operator errors used by the `reftree` binary.

pub mod build;
pub mod cache;
pub mod config;
pub mod error;
pub mod output;
pub mod process;
pub mod reference;
pub mod repository;
pub mod scm;
pub mod suggestions;
pub mod walker;
pub mod workflows;
