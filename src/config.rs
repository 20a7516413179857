//! # Settings
//!
//! Settings are kept in small INI files of bare `KEY=value` lines, read and
//! written with `rust-ini`:
//!
//! - **Program settings** live in a `.reftree` file at the program root. The
//!   file doubles as the marker that identifies the root, through the `ROOT`
//!   key written by `new` and `import`.
//! - **Global settings** live in `$REFTREE_HOME/config`, or
//!   `~/.reftree/config` when the variable is unset.
//!
//! [`Program::get`] consults the program file first and falls back to the
//! global file.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use ini::Ini;

use crate::error::{Error, Result};

/// Name of the per-program settings file.
pub const SETTINGS_FILE: &str = ".reftree";

/// Environment variable overriding the global settings directory.
pub const HOME_ENV: &str = "REFTREE_HOME";

/// Keys understood by the tool, with a short description for `config --list`.
pub const KNOWN_KEYS: &[(&str, &str)] = &[
    ("ROOT", "marks the program root"),
    ("CACHE", "directory used to cache repositories between clones"),
    ("PROTOCOL", "default clone protocol (https, http, ssh or git)"),
    ("GIT_CMD", "git executable"),
    ("HG_CMD", "hg executable"),
    ("TARGET", "default build target"),
    ("TOOLCHAIN", "default build toolchain"),
    ("BUILD_DRIVER", "external build driver command"),
    ("BASE_URL", "prefix used to expand bare names given to import"),
];

pub fn is_known_key(key: &str) -> bool {
    KNOWN_KEYS
        .iter()
        .any(|(known, _)| known.eq_ignore_ascii_case(key))
}

/// One settings file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    path: PathBuf,
}

impl Settings {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Ini> {
        if !self.path.is_file() {
            return Ok(Ini::new());
        }
        Ini::load_from_file(&self.path).map_err(|e| Error::Config {
            message: format!("unable to read {}: {}", self.path.display(), e),
        })
    }

    fn save(&self, ini: &Ini) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        ini.write_to_file(&self.path).map_err(|e| Error::Config {
            message: format!("unable to write {}: {}", self.path.display(), e),
        })
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_ascii_uppercase();
        Ok(self
            .load()?
            .general_section()
            .get(&key)
            .filter(|value| !value.is_empty())
            .map(str::to_string))
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut ini = self.load()?;
        ini.with_general_section()
            .set(key.to_ascii_uppercase(), value);
        self.save(&ini)
    }

    /// Remove a key. Returns whether it was present.
    pub fn unset(&self, key: &str) -> Result<bool> {
        let mut ini = self.load()?;
        let removed = ini
            .delete_from(None::<String>, &key.to_ascii_uppercase())
            .is_some();
        if removed {
            self.save(&ini)?;
        }
        Ok(removed)
    }

    pub fn list(&self) -> Result<Vec<(String, String)>> {
        Ok(self
            .load()?
            .general_section()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect())
    }
}

/// Directory holding the global settings file.
pub fn global_dir() -> Option<PathBuf> {
    match env::var_os(HOME_ENV) {
        Some(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
        _ => dirs::home_dir().map(|home| home.join(".reftree")),
    }
}

/// The global settings file, if a home directory can be determined.
pub fn global() -> Option<Settings> {
    global_dir().map(|dir| Settings::at(dir.join("config")))
}

/// The program a directory belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    pub path: PathBuf,
    pub name: String,
    /// No settings file was found; `path` is just the starting directory.
    pub is_cwd: bool,
}

impl Program {
    /// Walk up from `start` looking for a settings file.
    pub fn locate(start: &Path) -> Program {
        let start = crate::repository::absolute(start);
        let found = start
            .ancestors()
            .find(|dir| dir.join(SETTINGS_FILE).is_file())
            .map(Path::to_path_buf);
        let (path, is_cwd) = match found {
            Some(path) => (path, false),
            None => (start, true),
        };
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Program { path, name, is_cwd }
    }

    /// A program rooted exactly at `path`.
    pub fn at(path: &Path) -> Program {
        let path = crate::repository::absolute(path);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let is_cwd = !path.join(SETTINGS_FILE).is_file();
        Program { path, name, is_cwd }
    }

    pub fn settings(&self) -> Settings {
        Settings::at(self.path.join(SETTINGS_FILE))
    }

    /// Program setting, falling back to the global one.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        if let Some(value) = self.settings().get(key)? {
            return Ok(Some(value));
        }
        match global() {
            Some(global) => global.get(key),
            None => Ok(None),
        }
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        self.settings().set(key, value)
    }

    pub fn set_root(&self) -> Result<()> {
        self.set("ROOT", ".")
    }

    /// Drop the root marker, deleting the settings file once it is empty.
    pub fn unset_root(&self) -> Result<()> {
        let settings = self.settings();
        settings.unset("ROOT")?;
        if settings.path().is_file() && settings.list()?.is_empty() {
            fs::remove_file(settings.path())?;
        }
        Ok(())
    }
}
