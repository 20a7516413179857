//! # Version-Control Backends
//!
//! The synchronizer talks to version control through the [`Backend`] trait.
//! Each supported system implements it once:
//!
//! - [`Git`](git::Git) and [`Hg`](hg::Hg) drive the `git` and `hg` executables.
//! - [`Snapshot`](snapshot::Snapshot) fetches immutable pre-built archives.
//!
//! A checkout is recognized by its marker directory (`.git`, `.hg`, `.bld`),
//! and the matching [`BackendKind`] is stored on the repository handle when it
//! is resolved. [`Backends`] holds one configured instance of every backend
//! and hands out the right one for a kind or a URL.
//!
//! All methods take the checkout directory explicitly.

pub mod git;
pub mod hg;
pub mod snapshot;

use std::fmt;
use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::error::Result;
use crate::reference::UrlFormat;

pub use git::Git;
pub use hg::Hg;
pub use snapshot::Snapshot;

/// Patterns written to every checkout's ignore list.
pub const DEFAULT_IGNORES: &[&str] = &[
    // Version control folders
    ".hg",
    ".git",
    ".svn",
    ".CVS",
    ".cvs",
    ".bld",
    // Version control fallout
    "*.orig",
    // Tool state
    ".reftree",
    "BUILD",
    ".build",
    ".export",
    ".temp",
    // Editor and IDE droppings
    "*.swp",
    ".idea",
    ".vscode",
    // Python
    "*.py[cod]",
];

/// Separates the default patterns from per-dependency entries.
pub const SUBREPO_MARKER: &str = "# subrepo ignores";

/// The supported backends, in preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Git,
    Hg,
    Snapshot,
}

impl BackendKind {
    pub const ALL: [BackendKind; 3] = [BackendKind::Git, BackendKind::Hg, BackendKind::Snapshot];

    pub fn name(self) -> &'static str {
        match self {
            BackendKind::Git => "git",
            BackendKind::Hg => "hg",
            BackendKind::Snapshot => "bld",
        }
    }

    /// Directory whose presence marks a checkout of this kind.
    pub fn marker(self) -> &'static str {
        match self {
            BackendKind::Git => ".git",
            BackendKind::Hg => ".hg",
            BackendKind::Snapshot => ".bld",
        }
    }

    /// Probe a directory for backend markers.
    pub fn detect(path: &Path) -> Option<BackendKind> {
        Self::ALL
            .into_iter()
            .find(|kind| path.join(kind.marker()).is_dir())
    }

    pub fn from_name(name: &str) -> Option<BackendKind> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether a checkout has commits its remote does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outgoing {
    Nothing,
    Pending,
    /// No remote is configured, so nothing is known to be published.
    NoRemote,
}

impl Outgoing {
    /// Anything that cannot be restored from a remote counts as unpublished.
    pub fn is_unpublished(self) -> bool {
        !matches!(self, Outgoing::Nothing)
    }
}

/// Options for fetching a new checkout.
#[derive(Debug, Clone, Copy, Default)]
pub struct CloneOptions {
    /// Number of revisions to fetch; `None` fetches the whole history.
    pub depth: Option<u32>,
    pub protocol: UrlFormat,
}

/// Options for moving an existing checkout.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateOptions {
    /// Discard local modifications first.
    pub clean: bool,
    /// Also remove ignored files when cleaning.
    pub clean_files: bool,
    /// Skip talking to the remote.
    pub is_local: bool,
}

/// The operations the synchronizer needs from a version-control system.
pub trait Backend {
    fn kind(&self) -> BackendKind;

    /// Whether the URL looks like one this backend serves.
    fn matches_url(&self, url: &str) -> bool;

    fn init(&self, path: &Path) -> Result<()>;

    /// Clone `url` into `path`, which must not exist yet.
    fn clone_repo(&self, url: &str, path: &Path, options: &CloneOptions) -> Result<()>;

    /// Start tracking a file.
    fn add(&self, dir: &Path, file: &str) -> Result<()>;

    /// Stop tracking a file and delete it.
    fn remove(&self, dir: &Path, file: &str) -> Result<()>;

    /// Commit every tracked change.
    fn commit(&self, dir: &Path, message: &str) -> Result<()>;

    /// Push outgoing commits; `all_refs` pushes every branch.
    fn publish(&self, dir: &Path, all_refs: bool) -> Result<()>;

    fn fetch(&self, dir: &Path) -> Result<()>;

    /// Throw away uncommitted changes.
    fn discard(&self, dir: &Path, clean_files: bool) -> Result<()>;

    fn merge(&self, dir: &Path, upstream: &str) -> Result<()>;

    /// Check out `rev`, or the tip of the current branch when `None`.
    fn checkout(&self, dir: &Path, rev: Option<&str>, clean: bool) -> Result<()>;

    /// Fetch (unless local) and move to `rev`.
    fn update(&self, dir: &Path, rev: Option<&str>, options: &UpdateOptions) -> Result<()>;

    fn status(&self, dir: &Path) -> Result<String>;

    fn is_dirty(&self, dir: &Path) -> Result<bool>;

    fn untracked(&self, dir: &Path) -> Result<Vec<String>>;

    fn outgoing(&self, dir: &Path) -> Result<Outgoing>;

    /// URL of the default remote, or an empty string.
    fn url(&self, dir: &Path) -> Result<String>;

    /// Point the default remote at `url`.
    fn set_url(&self, dir: &Path, url: &str) -> Result<()>;

    fn revision(&self, dir: &Path) -> Result<String>;

    /// Current branch, `None` when detached.
    fn branch(&self, dir: &Path) -> Result<Option<String>>;

    fn is_detached(&self, dir: &Path) -> Result<bool> {
        Ok(self.branch(dir)?.is_none())
    }

    /// Path of the ignore list relative to the checkout, if the backend has one.
    fn ignore_file(&self) -> Option<&'static str>;

    /// Rewrite the default part of the ignore list.
    fn write_ignores(&self, dir: &Path, patterns: &[&str]) -> Result<()> {
        match self.ignore_file() {
            Some(file) => ignore_list::write_defaults(&dir.join(file), "", patterns),
            None => Ok(()),
        }
    }

    /// Add a single path to the ignore list.
    fn ignore(&self, dir: &Path, dest: &str) -> Result<()> {
        match self.ignore_file() {
            Some(file) => ignore_list::add(&dir.join(file), dest),
            None => Ok(()),
        }
    }

    /// Remove a single path from the ignore list.
    fn unignore(&self, dir: &Path, dest: &str) -> Result<()> {
        match self.ignore_file() {
            Some(file) => ignore_list::remove(&dir.join(file), dest),
            None => Ok(()),
        }
    }
}

/// One configured instance of every backend.
#[derive(Debug, Clone)]
pub struct Backends {
    git: Git,
    hg: Hg,
    snapshot: Snapshot,
}

impl Backends {
    pub fn new(git_cmd: &str, hg_cmd: &str) -> Self {
        Self {
            git: Git::new(git_cmd),
            hg: Hg::new(hg_cmd),
            snapshot: Snapshot::new(hg_cmd),
        }
    }

    pub fn get(&self, kind: BackendKind) -> &dyn Backend {
        match kind {
            BackendKind::Git => &self.git,
            BackendKind::Hg => &self.hg,
            BackendKind::Snapshot => &self.snapshot,
        }
    }

    /// Backend of the checkout at `path`, if it is one.
    pub fn detect(&self, path: &Path) -> Option<&dyn Backend> {
        BackendKind::detect(path).map(|kind| self.get(kind))
    }

    /// Backends to try for cloning `url`: those whose URL pattern matches
    /// come first, the rest follow in preference order.
    pub fn candidates(&self, url: &str) -> Vec<&dyn Backend> {
        let (mut matching, rest): (Vec<&dyn Backend>, Vec<&dyn Backend>) = BackendKind::ALL
            .into_iter()
            .map(|kind| self.get(kind))
            .partition(|backend| backend.matches_url(url));
        matching.extend(rest);
        matching
    }
}

impl Default for Backends {
    fn default() -> Self {
        Self::new("git", "hg")
    }
}

/// Reading and writing line-based ignore lists.
pub(crate) mod ignore_list {
    use super::*;

    fn read_lines(file: &Path) -> Vec<String> {
        fs::read_to_string(file)
            .map(|content| content.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    fn write_if_changed(file: &Path, lines: &[String]) -> Result<()> {
        let content = format!("{}\n", lines.join("\n"));
        if fs::read_to_string(file).ok().as_deref() == Some(content.as_str()) {
            return Ok(());
        }
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(file, content)?;
        Ok(())
    }

    /// Replace everything above the subrepo marker with `header` and
    /// `patterns`, keeping the per-dependency entries below it.
    pub fn write_defaults(file: &Path, header: &str, patterns: &[&str]) -> Result<()> {
        let existing = read_lines(file);
        let kept: Vec<String> = existing
            .iter()
            .skip_while(|line| line.as_str() != SUBREPO_MARKER)
            .skip(1)
            .cloned()
            .collect();

        let mut lines: Vec<String> = Vec::new();
        if !header.is_empty() {
            lines.push(header.to_string());
        }
        lines.extend(patterns.iter().map(|p| p.to_string()));
        lines.push(SUBREPO_MARKER.to_string());
        lines.extend(kept);
        write_if_changed(file, &lines)
    }

    pub fn add(file: &Path, dest: &str) -> Result<()> {
        let dest = dest.replace('\\', "/");
        let mut lines = read_lines(file);
        if lines.iter().any(|line| *line == dest) {
            return Ok(());
        }
        lines.push(dest);
        write_if_changed(file, &lines)
    }

    pub fn remove(file: &Path, dest: &str) -> Result<()> {
        let dest = dest.replace('\\', "/");
        let mut lines = read_lines(file);
        let before = lines.len();
        lines.retain(|line| *line != dest);
        if lines.len() == before {
            return Ok(());
        }
        write_if_changed(file, &lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_detect_backend_by_marker() {
        let temp = TempDir::new().unwrap();
        assert_eq!(BackendKind::detect(temp.path()), None);

        fs::create_dir(temp.path().join(".hg")).unwrap();
        assert_eq!(BackendKind::detect(temp.path()), Some(BackendKind::Hg));

        fs::create_dir(temp.path().join(".git")).unwrap();
        assert_eq!(BackendKind::detect(temp.path()), Some(BackendKind::Git));
    }

    #[test]
    fn test_marker_must_be_a_directory() {
        let temp = TempDir::new().unwrap();
        // Git worktrees and submodules use a .git file; those are not ours
        fs::write(temp.path().join(".git"), "gitdir: ../x").unwrap();
        assert_eq!(BackendKind::detect(temp.path()), None);
    }

    #[test]
    fn test_candidates_prefer_matching_backends() {
        let backends = Backends::default();

        let kinds: Vec<_> = backends
            .candidates("https://os.example.org/team/code/lib/builds/tip")
            .iter()
            .map(|b| b.kind())
            .collect();
        assert_eq!(
            kinds,
            vec![BackendKind::Snapshot, BackendKind::Git, BackendKind::Hg]
        );

        let kinds: Vec<_> = backends
            .candidates("file://hgserver/repos/lib")
            .iter()
            .map(|b| b.kind())
            .collect();
        assert_eq!(kinds[0], BackendKind::Hg);

        let kinds: Vec<_> = backends
            .candidates("/srv/remotes/lib.git")
            .iter()
            .map(|b| b.kind())
            .collect();
        assert_eq!(kinds, BackendKind::ALL.to_vec());
    }

    #[test]
    fn test_from_name() {
        assert_eq!(BackendKind::from_name("GIT"), Some(BackendKind::Git));
        assert_eq!(BackendKind::from_name("hg"), Some(BackendKind::Hg));
        assert_eq!(BackendKind::from_name("svn"), None);
    }

    #[test]
    fn test_outgoing_unpublished() {
        assert!(!Outgoing::Nothing.is_unpublished());
        assert!(Outgoing::Pending.is_unpublished());
        assert!(Outgoing::NoRemote.is_unpublished());
    }

    #[test]
    fn test_ignore_list_keeps_dependency_entries() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("info").join("exclude");

        ignore_list::write_defaults(&file, "", &["*.orig"]).unwrap();
        ignore_list::add(&file, "libs/driver").unwrap();
        ignore_list::add(&file, "libs/driver").unwrap();
        ignore_list::write_defaults(&file, "", &["*.orig", "BUILD"]).unwrap();

        let content = fs::read_to_string(&file).unwrap();
        assert_eq!(
            content,
            format!("*.orig\nBUILD\n{}\nlibs/driver\n", SUBREPO_MARKER)
        );

        ignore_list::remove(&file, "libs/driver").unwrap();
        let content = fs::read_to_string(&file).unwrap();
        assert!(!content.contains("libs/driver"));
    }

    #[test]
    fn test_ignore_list_not_rewritten_when_unchanged() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("exclude");
        ignore_list::write_defaults(&file, "", DEFAULT_IGNORES).unwrap();
        let first = fs::metadata(&file).unwrap().modified().unwrap();

        std::thread::sleep(std::time::Duration::from_millis(20));
        ignore_list::write_defaults(&file, "", DEFAULT_IGNORES).unwrap();
        let second = fs::metadata(&file).unwrap().modified().unwrap();
        assert_eq!(first, second);
    }
}
