//! Mercurial backend, driving the system `hg` executable.

use std::fs;
use std::path::Path;

use ini::Ini;
use log::{info, warn};

use super::{ignore_list, Backend, BackendKind, CloneOptions, Outgoing, UpdateOptions};
use crate::error::{Error, Result};
use crate::process::{exit_code, query, run};
use crate::reference::{format_url, is_snapshot_url, location, HG_URL};

const HGRC: &str = ".hg/hgrc";
const IGNORE_HOOK: (&str, &str) = ("ignore.local", ".hg/hgignore");

#[derive(Debug, Clone)]
pub struct Hg {
    cmd: String,
}

impl Hg {
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

    fn load_hgrc(dir: &Path) -> Result<Ini> {
        let path = dir.join(HGRC);
        if !path.is_file() {
            return Ok(Ini::new());
        }
        Ini::load_from_file(&path).map_err(|e| Error::Config {
            message: format!("unable to read {}: {}", path.display(), e),
        })
    }

    fn save_hgrc(dir: &Path, hgrc: &Ini) -> Result<()> {
        hgrc.write_to_file(dir.join(HGRC))?;
        Ok(())
    }

    /// Make hg read the per-checkout ignore list.
    fn install_ignore_hook(dir: &Path) -> Result<()> {
        let mut hgrc = Self::load_hgrc(dir)?;
        let (key, value) = IGNORE_HOOK;
        if hgrc.section(Some("ui")).and_then(|ui| ui.get(key)) == Some(value) {
            return Ok(());
        }
        hgrc.with_section(Some("ui")).set(key, value);
        Self::save_hgrc(dir, &hgrc)
    }

    /// Latest revision id of a remote repository, without cloning it.
    pub fn remote_id(&self, dir: &Path, url: &str, rev: Option<&str>) -> Result<String> {
        let mut args = vec!["id", "--id", url];
        if let Some(rev) = rev {
            args.extend(["-r", rev]);
        }
        Ok(self.query(dir, &args)?.trim().to_string())
    }
}

impl Backend for Hg {
    fn kind(&self) -> BackendKind {
        BackendKind::Hg
    }

    fn matches_url(&self, url: &str) -> bool {
        if is_snapshot_url(url) {
            return false;
        }
        location(url).is_some_and(|location| HG_URL.is_match(&location))
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
        self.run(parent, &["clone", &url, &target, "-q"])
    }

    fn add(&self, dir: &Path, file: &str) -> Result<()> {
        info!("Adding reference \"{}\"", file);
        match self.run(dir, &["add", file, "-q"]) {
            Err(Error::BackendOperation { .. }) => Ok(()),
            other => other,
        }
    }

    fn remove(&self, dir: &Path, file: &str) -> Result<()> {
        info!("Removing reference \"{}\"", file);
        match self.run(dir, &["rm", "-f", file, "-q"]) {
            Err(Error::BackendOperation { .. }) | Ok(()) => {}
            Err(e) => return Err(e),
        }
        let path = dir.join(file);
        if path.is_file() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn commit(&self, dir: &Path, message: &str) -> Result<()> {
        self.run(dir, &["commit", "-m", message, "-q"])
    }

    fn publish(&self, dir: &Path, all_refs: bool) -> Result<()> {
        let mut args = vec!["push", "-q"];
        if all_refs {
            args.push("--new-branch");
        }
        match self.run(dir, &args) {
            // Exit status 1 means there was nothing to push
            Err(e) if exit_code(&e) == Some(1) => Ok(()),
            other => other,
        }
    }

    fn fetch(&self, dir: &Path) -> Result<()> {
        info!(
            "Fetching revisions from remote repository to \"{}\"",
            dir.file_name().unwrap_or_default().to_string_lossy()
        );
        self.run(dir, &["pull", "-q"])
    }

    fn discard(&self, dir: &Path, clean_files: bool) -> Result<()> {
        info!(
            "Discarding local changes in \"{}\"",
            dir.file_name().unwrap_or_default().to_string_lossy()
        );
        if clean_files {
            let files = self.query(dir, &["status", "--no-status", "-ui"])?;
            for file in files.lines().map(str::trim).filter(|f| !f.is_empty()) {
                info!("Remove untracked file \"{}\"", file);
                let path = dir.join(file);
                if let Err(e) = fs::remove_file(&path) {
                    warn!("Unable to remove \"{}\": {}", path.display(), e);
                }
            }
        }
        self.run(dir, &["update", "-C", "-q"])
    }

    fn merge(&self, dir: &Path, upstream: &str) -> Result<()> {
        self.run(dir, &["merge", upstream, "-q"])
    }

    fn checkout(&self, dir: &Path, rev: Option<&str>, clean: bool) -> Result<()> {
        let rev = rev.filter(|r| !r.is_empty());
        info!(
            "Checkout \"{}\" in {}",
            rev.unwrap_or("latest"),
            dir.file_name().unwrap_or_default().to_string_lossy()
        );
        let mut args = vec!["update", "-q"];
        if clean {
            args.push("-C");
        }
        if let Some(rev) = rev {
            args.extend(["-r", rev]);
        }
        self.run(dir, &args)
    }

    fn update(&self, dir: &Path, rev: Option<&str>, options: &UpdateOptions) -> Result<()> {
        if options.clean && options.clean_files {
            self.discard(dir, true)?;
        }
        if !options.is_local {
            self.fetch(dir)?;
        }
        self.checkout(dir, rev, options.clean)
    }

    fn status(&self, dir: &Path) -> Result<String> {
        self.query(dir, &["status"])
    }

    fn is_dirty(&self, dir: &Path) -> Result<bool> {
        Ok(!self.query(dir, &["status", "-q"])?.trim().is_empty())
    }

    fn untracked(&self, dir: &Path) -> Result<Vec<String>> {
        Ok(self
            .query(dir, &["status", "--no-status", "-u"])?
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn outgoing(&self, dir: &Path) -> Result<Outgoing> {
        if self.url(dir)?.is_empty() {
            return Ok(Outgoing::NoRemote);
        }
        match self.query(dir, &["outgoing", "-q"]) {
            Ok(_) => Ok(Outgoing::Pending),
            Err(e) if exit_code(&e) == Some(1) => Ok(Outgoing::Nothing),
            Err(e) => Err(e),
        }
    }

    fn url(&self, dir: &Path) -> Result<String> {
        let configured = Self::load_hgrc(dir)
            .ok()
            .and_then(|hgrc| {
                hgrc.section(Some("paths"))
                    .and_then(|paths| paths.get("default"))
                    .map(str::to_string)
            })
            .filter(|url| !url.is_empty());
        if let Some(url) = configured {
            return Ok(url);
        }
        match self.query(dir, &["paths", "default"]) {
            Ok(url) => Ok(url.trim().to_string()),
            Err(Error::BackendOperation { .. }) => Ok(String::new()),
            Err(e) => Err(e),
        }
    }

    fn set_url(&self, dir: &Path, url: &str) -> Result<()> {
        let mut hgrc = Self::load_hgrc(dir)?;
        hgrc.with_section(Some("paths")).set("default", url);
        Self::save_hgrc(dir, &hgrc)
    }

    fn revision(&self, dir: &Path) -> Result<String> {
        let node = self.query(dir, &["log", "-r", ".", "--template", "{node}"])?;
        let node = node.trim();
        // The null revision of an empty repository
        if node.chars().all(|c| c == '0') {
            return Ok(String::new());
        }
        Ok(node.to_string())
    }

    fn branch(&self, dir: &Path) -> Result<Option<String>> {
        Ok(Some(self.query(dir, &["branch"])?.trim().to_string()))
    }

    fn ignore_file(&self) -> Option<&'static str> {
        Some(".hg/hgignore")
    }

    fn write_ignores(&self, dir: &Path, patterns: &[&str]) -> Result<()> {
        Self::install_ignore_hook(dir)?;
        ignore_list::write_defaults(&dir.join(".hg/hgignore"), "syntax: glob", patterns)
    }

    fn ignore(&self, dir: &Path, dest: &str) -> Result<()> {
        Self::install_ignore_hook(dir)?;
        ignore_list::add(&dir.join(".hg/hgignore"), dest)
    }
}
