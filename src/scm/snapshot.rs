//! Snapshot builds: immutable pre-built archives instead of live clones.
//!
//! A snapshot checkout is a plain directory with a `.bld/bldrc` file holding
//! the build URL it was unpacked from, `<base>/builds/<rev>`. Moving to
//! another revision wipes the working files and unpacks
//! `<base>/archive/<rev>.tar.gz`. The latest revision is asked from the
//! Mercurial server hosting the build.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use flate2::read::GzDecoder;
use log::info;
use tar::Archive;

use super::{hg::Hg, Backend, BackendKind, CloneOptions, Outgoing, UpdateOptions};
use crate::error::{Error, Result};
use crate::reference::{is_snapshot_url, Reference, ReferenceKind};

const BLDRC: &str = ".bld/bldrc";

#[derive(Debug, Clone)]
pub struct Snapshot {
    hg: Hg,
}

/// Base URL and revision recorded in a snapshot checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
struct BuildUrl {
    base: String,
    rev: Option<String>,
}

impl BuildUrl {
    fn parse(raw: &str) -> Option<Self> {
        let reference = Reference::parse(raw).ok()?;
        if reference.kind != ReferenceKind::Snapshot {
            return None;
        }
        let base = reference.url.strip_suffix("/builds")?.to_string();
        Some(Self {
            base,
            rev: reference.rev,
        })
    }

    fn builds(&self) -> String {
        format!("{}/builds", self.base)
    }

    fn with_rev(&self, rev: &str) -> String {
        format!("{}/builds/{}", self.base, rev)
    }

    fn archive(&self, rev: &str) -> String {
        format!("{}/archive/{}.tar.gz", self.base, rev)
    }
}

impl Snapshot {
    pub fn new(hg_cmd: &str) -> Self {
        Self { hg: Hg::new(hg_cmd) }
    }

    fn read_bldrc(dir: &Path) -> Result<Option<BuildUrl>> {
        let path = dir.join(BLDRC);
        if !path.is_file() {
            return Ok(None);
        }
        Ok(BuildUrl::parse(fs::read_to_string(path)?.trim()))
    }

    fn write_bldrc(dir: &Path, url: &str) -> Result<()> {
        let path = dir.join(BLDRC);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, url)?;
        Ok(())
    }

    /// Remove everything except dot entries.
    fn clear(dir: &Path) -> Result<()> {
        info!("Cleaning up library build folder");
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            if entry.file_type()?.is_dir() {
                fs::remove_dir_all(entry.path())?;
            } else {
                fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }

    fn download(url: &str, target: &Path) -> Result<()> {
        let failed = |message: String| Error::Download {
            url: url.to_string(),
            message,
        };
        info!("Downloading library build \"{}\" (might take a minute)", url);
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| failed(format!("failed to build HTTP client: {e}")))?;
        let response = client
            .get(url)
            .send()
            .map_err(|e| failed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(failed(format!("server answered {}", response.status())));
        }
        let body = response.bytes().map_err(|e| failed(e.to_string()))?;
        let mut file = File::create(target)?;
        file.write_all(&body)?;
        Ok(())
    }
}

/// Unpack a gzipped tarball into `dir`, dropping the archive's top-level
/// directory.
pub(crate) fn unpack(archive: &Path, dir: &Path) -> Result<()> {
    let mut archive = Archive::new(GzDecoder::new(File::open(archive)?));
    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.into_owned();
        let stripped: PathBuf = path.components().skip(1).collect();
        if stripped.as_os_str().is_empty()
            || stripped
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            continue;
        }
        let target = dir.join(&stripped);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        entry.unpack(&target)?;
    }
    Ok(())
}

impl Backend for Snapshot {
    fn kind(&self) -> BackendKind {
        BackendKind::Snapshot
    }

    fn matches_url(&self, url: &str) -> bool {
        is_snapshot_url(url)
    }

    fn init(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        Ok(())
    }

    fn clone_repo(&self, url: &str, path: &Path, _options: &CloneOptions) -> Result<()> {
        let build = BuildUrl::parse(url).ok_or_else(|| Error::InvalidReference {
            reference: url.to_string(),
            message: "not a library build URL".to_string(),
        })?;
        self.init(path)?;
        Self::write_bldrc(path, &build.with_rev("tip"))
    }

    fn add(&self, _dir: &Path, _file: &str) -> Result<()> {
        Ok(())
    }

    fn remove(&self, dir: &Path, file: &str) -> Result<()> {
        let path = dir.join(file);
        if path.is_file() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn commit(&self, _dir: &Path, _message: &str) -> Result<()> {
        Ok(())
    }

    fn publish(&self, _dir: &Path, _all_refs: bool) -> Result<()> {
        Ok(())
    }

    fn fetch(&self, _dir: &Path) -> Result<()> {
        Ok(())
    }

    fn discard(&self, _dir: &Path, _clean_files: bool) -> Result<()> {
        Ok(())
    }

    fn merge(&self, _dir: &Path, _upstream: &str) -> Result<()> {
        Ok(())
    }

    fn checkout(&self, dir: &Path, rev: Option<&str>, _clean: bool) -> Result<()> {
        let build = Self::read_bldrc(dir)?.ok_or_else(|| Error::InvalidReference {
            reference: dir.join(BLDRC).display().to_string(),
            message: "not a library build URL".to_string(),
        })?;
        let requested = rev.filter(|r| !r.is_empty() && *r != "tip");
        let rev = self.hg.remote_id(dir, &build.base, requested)?;
        if rev.is_empty() {
            return Err(Error::Download {
                url: build.base.clone(),
                message: "unable to fetch the latest library revision".to_string(),
            });
        }
        if build.rev.as_deref() == Some(rev.as_str()) {
            return Ok(());
        }

        Self::clear(dir)?;
        info!(
            "Checkout \"{}\" in {}",
            rev,
            dir.file_name().unwrap_or_default().to_string_lossy()
        );
        let archive = dir.join(format!(".bld/.rev-{}.tar.gz", rev));
        let url = build.archive(&rev);
        let fetched = if archive.is_file() {
            Ok(())
        } else {
            Self::download(&url, &archive)
        };
        let result = fetched.and_then(|_| unpack(&archive, dir));
        if let Err(e) = result {
            if archive.is_file() {
                fs::remove_file(&archive)?;
            }
            return Err(match e {
                e @ Error::Download { .. } => e,
                other => Error::Download {
                    url,
                    message: format!("unable to unpack archive: {}", other),
                },
            });
        }
        Self::write_bldrc(dir, &build.with_rev(&rev))
    }

    fn update(&self, dir: &Path, rev: Option<&str>, _options: &UpdateOptions) -> Result<()> {
        self.checkout(dir, rev, false)
    }

    fn status(&self, _dir: &Path) -> Result<String> {
        Ok(String::new())
    }

    fn is_dirty(&self, _dir: &Path) -> Result<bool> {
        Ok(false)
    }

    fn untracked(&self, _dir: &Path) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn outgoing(&self, _dir: &Path) -> Result<Outgoing> {
        Ok(Outgoing::Nothing)
    }

    fn url(&self, dir: &Path) -> Result<String> {
        Ok(Self::read_bldrc(dir)?
            .map(|build| build.builds())
            .unwrap_or_default())
    }

    fn set_url(&self, dir: &Path, url: &str) -> Result<()> {
        Self::write_bldrc(dir, url)
    }

    fn revision(&self, dir: &Path) -> Result<String> {
        Ok(Self::read_bldrc(dir)?
            .and_then(|build| build.rev)
            .unwrap_or_default())
    }

    fn branch(&self, _dir: &Path) -> Result<Option<String>> {
        Ok(Some("default".to_string()))
    }

    fn ignore_file(&self) -> Option<&'static str> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tempfile::TempDir;

    #[test]
    fn test_build_url_parse() {
        let build = BuildUrl::parse("https://os.example.org/users/team/code/lib/builds/65be27845400")
            .unwrap();
        assert_eq!(build.base, "https://os.example.org/users/team/code/lib");
        assert_eq!(build.rev.as_deref(), Some("65be27845400"));
        assert_eq!(
            build.archive("65be27845400"),
            "https://os.example.org/users/team/code/lib/archive/65be27845400.tar.gz"
        );
        assert!(BuildUrl::parse("https://github.com/org/lib").is_none());
    }

    #[test]
    fn test_clone_writes_tip_bldrc() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("lib");
        let snapshot = Snapshot::new("hg");
        snapshot
            .clone_repo(
                "https://os.example.org/code/lib/builds",
                &target,
                &CloneOptions::default(),
            )
            .unwrap();

        assert_eq!(
            fs::read_to_string(target.join(BLDRC)).unwrap(),
            "https://os.example.org/code/lib/builds/tip"
        );
        assert_eq!(
            snapshot.url(&target).unwrap(),
            "https://os.example.org/code/lib/builds"
        );
        assert_eq!(snapshot.revision(&target).unwrap(), "tip");
        assert!(BackendKind::detect(&target) == Some(BackendKind::Snapshot));
    }

    #[test]
    fn test_clone_rejects_non_build_url() {
        let temp = TempDir::new().unwrap();
        let err = Snapshot::new("hg")
            .clone_repo(
                "https://github.com/org/lib",
                &temp.path().join("lib"),
                &CloneOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidReference { .. }));
    }

    #[test]
    fn test_unpack_strips_top_level_directory() {
        let temp = TempDir::new().unwrap();
        let archive_path = temp.path().join("build.tar.gz");
        {
            let file = File::create(&archive_path).unwrap();
            let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
            let content = b"void lib(void);\n";
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, "lib-65be27845400/include/lib.h", &content[..])
                .unwrap();
            builder.into_inner().unwrap().finish().unwrap();
        }

        let out = temp.path().join("out");
        fs::create_dir(&out).unwrap();
        unpack(&archive_path, &out).unwrap();
        assert_eq!(
            fs::read_to_string(out.join("include/lib.h")).unwrap(),
            "void lib(void);\n"
        );
    }

    #[test]
    fn test_clear_keeps_dot_entries() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join(".bld")).unwrap();
        fs::create_dir_all(temp.path().join("src")).unwrap();
        fs::write(temp.path().join("lib.h"), "").unwrap();

        Snapshot::clear(temp.path()).unwrap();
        assert!(temp.path().join(".bld").is_dir());
        assert!(!temp.path().join("src").exists());
        assert!(!temp.path().join("lib.h").exists());
    }
}
