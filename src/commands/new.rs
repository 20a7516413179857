//! # New Command Implementation
//!
//! Creates a program, or a library inside the current program. A program is
//! marked with a `ROOT` setting and gets the default ignore list; a library is
//! registered with its parent by a `sync` of the enclosing program.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use reftree::scm::BackendKind;
use reftree::suggestions;
use reftree::workflows::{self, NewKind};

/// Create a new program or library
#[derive(Args, Debug)]
pub struct NewArgs {
    /// Directory to create.
    #[arg(value_name = "NAME")]
    pub name: PathBuf,

    /// Source control system to initialize (git, hg or none).
    #[arg(long, value_name = "SCM", default_value = "git")]
    pub scm: String,

    /// Create a program even inside another program.
    #[arg(long, conflicts_with = "library")]
    pub program: bool,

    /// Create a library even outside a program.
    #[arg(long)]
    pub library: bool,
}

/// Map `--scm` to a backend; `none` creates a plain directory.
fn parse_scm(name: &str) -> Result<Option<BackendKind>> {
    if name.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    match BackendKind::from_name(name) {
        Some(kind @ (BackendKind::Git | BackendKind::Hg)) => Ok(Some(kind)),
        _ => Err(suggestions::unknown_scm(name)),
    }
}

/// Execute the `new` command.
pub fn execute(args: NewArgs) -> Result<()> {
    let scm = parse_scm(&args.scm)?;
    let kind = if args.program {
        NewKind::Program
    } else if args.library {
        NewKind::Library
    } else {
        NewKind::Auto
    };

    let ctx = super::context()?;
    workflows::new(&ctx, &args.name, scm, kind)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scm() {
        assert_eq!(parse_scm("git").unwrap(), Some(BackendKind::Git));
        assert_eq!(parse_scm("HG").unwrap(), Some(BackendKind::Hg));
        assert_eq!(parse_scm("none").unwrap(), None);
    }

    #[test]
    fn test_parse_scm_rejects_snapshot_and_typos() {
        assert!(parse_scm("bld").is_err());
        let message = parse_scm("gti").unwrap_err().to_string();
        assert!(message.contains("Did you mean 'git'?"));
    }
}
