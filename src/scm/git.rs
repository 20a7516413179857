//! Git backend, driving the system `git` executable.
//!
//! Using the executable rather than a library keeps SSH keys, credential
//! helpers and everything else configured in `~/.gitconfig` working.

use std::fs;
use std::path::Path;

use log::{info, warn};

use super::{Backend, BackendKind, CloneOptions, Outgoing, UpdateOptions};
use crate::error::{Error, Result};
use crate::process::{query, run};
use crate::reference::{format_url, is_snapshot_url, location, RevisionKind, GIT_URL};

const GIT_SCHEMES: &[&str] = &["git", "ssh", "http", "https"];

#[derive(Debug, Clone)]
pub struct Git {
    cmd: String,
}

impl Git {
    pub fn new(cmd: &str) -> Self {
        Self {
            cmd: cmd.to_string(),
        }
    }

    fn run(&self, dir: &Path, args: &[&str]) -> Result<()> {
        run(&self.cmd, args, dir)
    }

    fn query(&self, dir: &Path, args: &[&str]) -> Result<String> {
        query(&self.cmd, args, dir)
    }

    /// Like `run`, but a failing git call is only logged. A missing
    /// executable is still an error.
    fn run_tolerant(&self, dir: &Path, args: &[&str]) -> Result<()> {
        match self.run(dir, args) {
            Err(e @ Error::BackendOperation { .. }) => {
                warn!("{}", e);
                Ok(())
            }
            other => other,
        }
    }

    /// Name of the remote to talk to, preferring `origin`.
    fn remote(&self, dir: &Path) -> Result<Option<String>> {
        let remotes = self.query(dir, &["remote"])?;
        let names: Vec<&str> = remotes.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        if names.contains(&"origin") {
            return Ok(Some("origin".to_string()));
        }
        Ok(names.first().map(|n| n.to_string()))
    }

    /// Merge `<remote>/<branch>` into the current branch. A merge that git
    /// refuses is only logged, leaving the checkout where it was.
    fn merge_upstream(&self, dir: &Path, remote: &str, branch: &str) -> Result<()> {
        match self.merge(dir, &format!("{}/{}", remote, branch)) {
            Err(e @ Error::BackendOperation { .. }) => {
                warn!("Unable to merge with \"{}/{}\": {}", remote, branch, e);
                Ok(())
            }
            other => other,
        }
    }

    /// Bring a checkout that tracks branch `name` up to the remote head of
    /// that branch. Tags leave HEAD detached and are not moved.
    fn follow_branch(&self, dir: &Path, name: &str, clean: bool) -> Result<()> {
        if self.branch(dir)?.as_deref() != Some(name) {
            return Ok(());
        }
        let Some(remote) = self.remote(dir)? else {
            return Ok(());
        };
        if clean {
            let upstream = format!("{}/{}", remote, name);
            info!("Resetting \"{}\" to \"{}\"", dir_name(dir), upstream);
            return self.run(dir, &["reset", "--hard", &upstream, "-q"]);
        }
        self.merge_upstream(dir, &remote, name)
    }

    /// Switch from a detached HEAD to a branch whose head is the same commit.
    ///
    /// Remote branches are only used when no local branch of that name
    /// exists, since checking out the local one would move to another commit.
    fn reattach(&self, dir: &Path, rev: &str) -> Result<()> {
        let head = self.revision(dir)?;
        let refs = self.query(dir, &["show-ref"]).unwrap_or_default();
        let refs: Vec<(&str, &str)> = refs
            .lines()
            .filter_map(|line| line.trim().split_once(' '))
            .collect();
        let local = |name: &str| refs.iter().any(|(_, r)| r.strip_prefix("refs/heads/") == Some(name));

        for (sha, name) in &refs {
            if *sha != head {
                continue;
            }
            let branch = if let Some(branch) = name.strip_prefix("refs/heads/") {
                branch
            } else if let Some((_, branch)) = name
                .strip_prefix("refs/remotes/")
                .and_then(|r| r.split_once('/'))
            {
                if branch == "HEAD" || local(branch) {
                    continue;
                }
                branch
            } else {
                continue;
            };
            info!(
                "Revision \"{}\" matches a branch \"{}\" reference. Re-attaching HEAD",
                rev, branch
            );
            return self.run(dir, &["checkout", branch, "-q"]);
        }
        Ok(())
    }
}

impl Backend for Git {
    fn kind(&self) -> BackendKind {
        BackendKind::Git
    }

    fn matches_url(&self, url: &str) -> bool {
        if is_snapshot_url(url) {
            return false;
        }
        let Some(location) = location(url) else {
            return false;
        };
        if let Some((scheme, _)) = location.split_once("://") {
            if !GIT_SCHEMES.contains(&scheme.to_ascii_lowercase().as_str()) {
                return false;
            }
        }
        GIT_URL.is_match(&location)
    }

    fn init(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        self.run(path, &["init", "-q"])
    }

    fn clone_repo(&self, url: &str, path: &Path, options: &CloneOptions) -> Result<()> {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)?;
        let url = format_url(url, options.protocol);
        let target = path.to_string_lossy();
        let depth = options.depth.map(|d| d.to_string());
        let mut args = vec!["clone", url.as_str(), target.as_ref()];
        if let Some(depth) = &depth {
            args.extend(["--depth", depth.as_str(), "--no-single-branch"]);
        }
        args.push("-q");
        self.run(parent, &args)
    }

    fn add(&self, dir: &Path, file: &str) -> Result<()> {
        info!("Adding reference \"{}\"", file);
        self.run_tolerant(dir, &["add", file])
    }

    fn remove(&self, dir: &Path, file: &str) -> Result<()> {
        info!("Removing reference \"{}\"", file);
        self.run_tolerant(dir, &["rm", "-f", file, "-q"])?;
        let path = dir.join(file);
        if path.is_file() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn commit(&self, dir: &Path, message: &str) -> Result<()> {
        self.run(dir, &["commit", "-a", "-m", message])
    }

    fn publish(&self, dir: &Path, all_refs: bool) -> Result<()> {
        let remote = self.remote(dir)?.ok_or_else(|| Error::BackendOperation {
            command: format!("{} push", self.cmd),
            dir: dir.to_path_buf(),
            code: None,
            stderr: "no remote configured".to_string(),
        })?;
        if all_refs {
            info!("Publishing all branches to remote \"{}\"", remote);
            return self.run(dir, &["push", &remote, "--all", "-v"]);
        }
        let branch = self.branch(dir)?.ok_or_else(|| Error::Detached {
            name: dir_name(dir),
        })?;
        info!("Publishing branch \"{}\" to remote \"{}\"", branch, remote);
        self.run(dir, &["push", &remote, &branch, "-v"])
    }

    fn fetch(&self, dir: &Path) -> Result<()> {
        info!("Fetching revisions from remote repository to \"{}\"", dir_name(dir));
        self.run(dir, &["fetch", "--all", "--tags", "-q"])
    }

    fn discard(&self, dir: &Path, clean_files: bool) -> Result<()> {
        info!("Discarding local changes in \"{}\"", dir_name(dir));
        self.run(dir, &["reset", "--hard", "-q"])?;
        let clean = if clean_files { "-fdx" } else { "-fd" };
        self.run(dir, &["clean", clean, "-q"])
    }

    fn merge(&self, dir: &Path, upstream: &str) -> Result<()> {
        info!("Merging \"{}\" with \"{}\"", dir_name(dir), upstream);
        self.run(dir, &["merge", upstream, "-q"])
    }

    fn checkout(&self, dir: &Path, rev: Option<&str>, clean: bool) -> Result<()> {
        let Some(rev) = rev.filter(|r| !r.is_empty()) else {
            return Ok(());
        };
        info!("Checkout \"{}\" in {}", rev, dir_name(dir));
        let mut args = vec!["checkout", rev, "-q"];
        if clean {
            args.push("-f");
        }
        self.run(dir, &args)?;
        if self.is_detached(dir)? {
            self.reattach(dir, rev)?;
        }
        Ok(())
    }

    fn update(&self, dir: &Path, rev: Option<&str>, options: &UpdateOptions) -> Result<()> {
        if options.clean {
            self.discard(dir, options.clean_files)?;
        }
        if !options.is_local {
            self.fetch(dir)?;
        }
        match rev.filter(|r| !r.is_empty()) {
            Some(rev) => {
                self.checkout(dir, Some(rev), options.clean)?;
                match RevisionKind::of(Some(rev)) {
                    RevisionKind::Branch(name) if !options.is_local => {
                        self.follow_branch(dir, name, options.clean)
                    }
                    _ => Ok(()),
                }
            }
            None => {
                let (Some(remote), Some(branch)) = (self.remote(dir)?, self.branch(dir)?) else {
                    return Ok(());
                };
                self.merge_upstream(dir, &remote, &branch)
            }
        }
    }

    fn status(&self, dir: &Path) -> Result<String> {
        self.query(dir, &["status", "-s"])
    }

    fn is_dirty(&self, dir: &Path) -> Result<bool> {
        Ok(!self
            .query(dir, &["status", "-uno", "--porcelain"])?
            .trim()
            .is_empty())
    }

    fn untracked(&self, dir: &Path) -> Result<Vec<String>> {
        Ok(self
            .query(dir, &["ls-files", "--others", "--exclude-standard"])?
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn outgoing(&self, dir: &Path) -> Result<Outgoing> {
        let Some(remote) = self.remote(dir)? else {
            return Ok(Outgoing::NoRemote);
        };
        match self.branch(dir)? {
            None => {
                let containing = self
                    .query(dir, &["branch", "-r", "--contains", "HEAD"])
                    .unwrap_or_default();
                if containing.trim().is_empty() {
                    Ok(Outgoing::Pending)
                } else {
                    Ok(Outgoing::Nothing)
                }
            }
            Some(branch) => {
                let upstream = format!("{}/{}", remote, branch);
                if self
                    .query(dir, &["rev-parse", "--verify", "-q", &upstream])
                    .is_err()
                {
                    return Ok(Outgoing::Pending);
                }
                let log = self.query(
                    dir,
                    &["log", "--oneline", &format!("{}..{}", upstream, branch)],
                )?;
                if log.trim().is_empty() {
                    Ok(Outgoing::Nothing)
                } else {
                    Ok(Outgoing::Pending)
                }
            }
        }
    }

    fn url(&self, dir: &Path) -> Result<String> {
        let Some(remote) = self.remote(dir)? else {
            return Ok(String::new());
        };
        let url = self
            .query(dir, &["config", "--get", &format!("remote.{}.url", remote)])
            .unwrap_or_default();
        Ok(url.trim().to_string())
    }

    fn set_url(&self, dir: &Path, url: &str) -> Result<()> {
        match self.remote(dir)? {
            Some(remote) => self.run(dir, &["remote", "set-url", &remote, url]),
            None => self.run(dir, &["remote", "add", "origin", url]),
        }
    }

    fn revision(&self, dir: &Path) -> Result<String> {
        match self.query(dir, &["rev-parse", "HEAD"]) {
            Ok(rev) => Ok(rev.trim().to_string()),
            // An empty repository has no HEAD yet
            Err(Error::BackendOperation { .. }) => Ok(String::new()),
            Err(e) => Err(e),
        }
    }

    fn branch(&self, dir: &Path) -> Result<Option<String>> {
        match self.query(dir, &["symbolic-ref", "--short", "-q", "HEAD"]) {
            Ok(name) if !name.trim().is_empty() => Ok(Some(name.trim().to_string())),
            Ok(_) | Err(Error::BackendOperation { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn ignore_file(&self) -> Option<&'static str> {
        Some(".git/info/exclude")
    }
}

fn dir_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| dir.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn git_available() -> bool {
        which::which("git").is_ok()
    }

    fn configure_identity(git: &Git, dir: &Path) {
        git.run(dir, &["config", "user.email", "dev@example.com"]).unwrap();
        git.run(dir, &["config", "user.name", "Dev"]).unwrap();
    }

    #[test]
    fn test_matches_url() {
        let git = Git::new("git");
        assert!(git.matches_url("https://github.com/org/driver"));
        assert!(git.matches_url("git@github.com:org/driver.git"));
        assert!(git.matches_url("ssh://git@host.com/org/driver.git#main"));
        assert!(!git.matches_url("file://hgserver/repos/lib"));
        assert!(!git.matches_url("https://host/code/lib/builds/tip"));
    }

    #[test]
    fn test_missing_executable_is_backend_not_found() {
        let git = Git::new("reftree-no-such-git");
        let temp = TempDir::new().unwrap();
        let err = git.status(temp.path()).unwrap_err();
        assert!(matches!(err, Error::BackendNotFound { .. }));
        // Tolerant calls must still surface a missing executable
        let err = git.add(temp.path(), "lib.lib").unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_fresh_repository_state() {
        if !git_available() {
            return;
        }
        let git = Git::new("git");
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("prog");
        git.init(&dir).unwrap();

        assert_eq!(git.url(&dir).unwrap(), "");
        assert_eq!(git.revision(&dir).unwrap(), "");
        assert_eq!(git.outgoing(&dir).unwrap(), Outgoing::NoRemote);
        assert!(!git.is_dirty(&dir).unwrap());
    }

    #[test]
    fn test_commit_and_dirty_tracking() {
        if !git_available() {
            return;
        }
        let git = Git::new("git");
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("prog");
        git.init(&dir).unwrap();
        configure_identity(&git, &dir);

        fs::write(dir.join("main.c"), "int main;\n").unwrap();
        assert_eq!(git.untracked(&dir).unwrap(), vec!["main.c".to_string()]);
        git.add(&dir, "main.c").unwrap();
        assert!(git.is_dirty(&dir).unwrap());
        git.commit(&dir, "initial").unwrap();
        assert!(!git.is_dirty(&dir).unwrap());
        assert_eq!(git.revision(&dir).unwrap().len(), 40);
        assert!(git.branch(&dir).unwrap().is_some());
    }

    #[test]
    fn test_set_url_adds_origin() {
        if !git_available() {
            return;
        }
        let git = Git::new("git");
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("prog");
        git.init(&dir).unwrap();

        git.set_url(&dir, "https://example.com/org/prog").unwrap();
        assert_eq!(git.url(&dir).unwrap(), "https://example.com/org/prog");
        git.set_url(&dir, "https://example.com/org/other").unwrap();
        assert_eq!(git.url(&dir).unwrap(), "https://example.com/org/other");
    }

    #[test]
    fn test_write_ignores_to_exclude_file() {
        if !git_available() {
            return;
        }
        let git = Git::new("git");
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("prog");
        git.init(&dir).unwrap();

        git.write_ignores(&dir, super::super::DEFAULT_IGNORES).unwrap();
        git.ignore(&dir, "driver").unwrap();
        let exclude = fs::read_to_string(dir.join(".git/info/exclude")).unwrap();
        assert!(exclude.contains(".bld\n"));
        assert!(exclude.ends_with("driver\n"));
    }
}
