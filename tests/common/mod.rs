//! Shared test utilities for integration and E2E tests.
//!
//! Scenarios run against real git repositories that live entirely in a
//! temporary directory: bare repositories under `remotes/` act as the
//! upstreams, `scratch/` holds a working clone of each one used to push new
//! revisions, and `work/` is where the code under test operates. Nothing
//! touches the network.
//!
//! ## Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let Some(world) = GitWorld::new() else { return };
//!     let rev = world.create("driver", &[("driver.c", "int x;\n")]);
//!     // ... test code
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    #[allow(unused_imports)]
    pub use assert_cmd::cargo::cargo_bin_cmd;
    #[allow(unused_imports)]
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::{git, head, GitWorld, TestFixture};
}

/// Identity and defaults passed to every git call made by the tests, so the
/// host's git configuration cannot change the outcome.
const GIT_DEFAULTS: &[&str] = &[
    "-c",
    "user.name=Reftree Tests",
    "-c",
    "user.email=tests@example.com",
    "-c",
    "init.defaultBranch=main",
    "-c",
    "commit.gpgsign=false",
];

/// Run git in `dir` and return its trimmed standard output. Panics when git
/// fails.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(GIT_DEFAULTS)
        .args(args)
        .current_dir(dir)
        .output()
        .expect("Failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed in {}: {}",
        args,
        dir.display(),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// The commit checked out in `dir`.
#[allow(dead_code)]
pub fn head(dir: &Path) -> String {
    git(dir, &["rev-parse", "HEAD"])
}

/// A temporary set of upstream repositories and a work area.
#[allow(dead_code)]
pub struct GitWorld {
    temp: assert_fs::TempDir,
}

#[allow(dead_code)]
impl GitWorld {
    /// Create the world, or `None` when git is not installed.
    pub fn new() -> Option<Self> {
        if which::which("git").is_err() {
            eprintln!("git not found, skipping");
            return None;
        }
        let temp = assert_fs::TempDir::new().expect("Failed to create temp directory");
        for dir in ["remotes", "scratch", "work", "home"] {
            fs::create_dir_all(temp.path().join(dir)).expect("Failed to create directory");
        }
        Some(Self { temp })
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    /// Directory the code under test works in.
    pub fn work(&self) -> PathBuf {
        self.temp.path().join("work")
    }

    /// Directory used as `REFTREE_HOME` by CLI tests.
    pub fn home(&self) -> PathBuf {
        self.temp.path().join("home")
    }

    /// URL of the upstream repository `name`.
    pub fn url(&self, name: &str) -> String {
        self.temp
            .path()
            .join("remotes")
            .join(format!("{}.git", name))
            .to_string_lossy()
            .to_string()
    }

    /// Pointer file content declaring `name` at `rev`.
    pub fn pointer(&self, name: &str, rev: &str) -> String {
        format!("{}/#{}\n", self.url(name), rev)
    }

    fn scratch(&self, name: &str) -> PathBuf {
        self.temp.path().join("scratch").join(name)
    }

    /// Create upstream `name` with an initial commit holding `files`.
    /// Returns the commit id.
    pub fn create(&self, name: &str, files: &[(&str, &str)]) -> String {
        let bare = PathBuf::from(self.url(name));
        fs::create_dir_all(&bare).expect("Failed to create bare repository");
        git(&bare, &["init", "--bare", "-q"]);
        git(&bare, &["symbolic-ref", "HEAD", "refs/heads/main"]);

        let scratch = self.scratch(name);
        fs::create_dir_all(&scratch).expect("Failed to create scratch clone");
        git(&scratch, &["init", "-q"]);
        git(&scratch, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        git(&scratch, &["remote", "add", "origin", &self.url(name)]);
        self.commit(name, files, "Initial commit")
    }

    /// Push a commit writing `files` to upstream `name`. Returns the commit id.
    pub fn commit(&self, name: &str, files: &[(&str, &str)], message: &str) -> String {
        let scratch = self.scratch(name);
        for (path, content) in files {
            let file = scratch.join(path);
            if let Some(parent) = file.parent() {
                fs::create_dir_all(parent).expect("Failed to create directory");
            }
            fs::write(&file, content).expect("Failed to write file");
        }
        git(&scratch, &["add", "-A"]);
        self.push(name, message)
    }

    /// Push a commit deleting `file` from upstream `name`. Returns the commit id.
    pub fn delete(&self, name: &str, file: &str, message: &str) -> String {
        let scratch = self.scratch(name);
        git(&scratch, &["rm", "-q", file]);
        self.push(name, message)
    }

    fn push(&self, name: &str, message: &str) -> String {
        let scratch = self.scratch(name);
        git(&scratch, &["commit", "-q", "-m", message]);
        git(&scratch, &["push", "-q", "origin", "main"]);
        head(&scratch)
    }

    /// Content of `file` on the upstream `main` branch of `name`.
    pub fn upstream_file(&self, name: &str, file: &str) -> String {
        git(
            Path::new(&self.url(name)),
            &["show", &format!("main:{}", file)],
        )
    }

    /// Commit id of the upstream `main` branch of `name`.
    pub fn upstream_head(&self, name: &str) -> String {
        git(Path::new(&self.url(name)), &["rev-parse", "main"])
    }

    /// Command running the `reftree` binary in `dir` with isolated global
    /// settings.
    pub fn command(&self, dir: &Path) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("reftree");
        cmd.current_dir(dir)
            .env("REFTREE_HOME", self.home())
            .env("NO_COLOR", "1")
            .env_remove("REFTREE_CACHE");
        cmd
    }
}

/// A temporary directory for CLI tests that need no repositories.
#[allow(dead_code)]
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
    home: assert_fs::TempDir,
}

#[allow(dead_code)]
impl TestFixture {
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
            home: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Add a file with the given path and content.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        let file = self.temp_dir.path().join(path);
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent).expect("Failed to create directory");
        }
        fs::write(file, content).expect("Failed to write file");
        self
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// The isolated global settings directory.
    pub fn home(&self) -> &Path {
        self.home.path()
    }

    /// Create a command configured to run in this fixture's directory.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("reftree");
        cmd.current_dir(self.path())
            .env("REFTREE_HOME", self.home())
            .env("NO_COLOR", "1")
            .env_remove("REFTREE_CACHE");
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
