//! External command execution for the version-control backends.
//!
//! Every command runs with an explicit working directory passed to
//! `Command::current_dir`; the process-wide current directory is never
//! changed, so a failing command cannot leave the process pointing somewhere
//! unexpected.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use log::{debug, trace};

use crate::error::{Error, Result};

/// Locate an executable on the search path.
pub fn locate(program: &str) -> Result<PathBuf> {
    which::which(program).map_err(|_| Error::BackendNotFound {
        program: program.to_string(),
    })
}

fn command_line(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

fn execute(program: &str, args: &[&str], dir: &Path) -> Result<Output> {
    let executable = locate(program)?;
    let output = Command::new(executable)
        .args(args)
        .current_dir(dir)
        .output()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::BackendNotFound {
                    program: program.to_string(),
                }
            } else {
                Error::Io(e)
            }
        })?;

    if !output.status.success() {
        return Err(Error::BackendOperation {
            command: command_line(program, args),
            dir: dir.to_path_buf(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    Ok(output)
}

/// Run a command for its side effect.
pub fn run(program: &str, args: &[&str], dir: &Path) -> Result<()> {
    debug!("Exec \"{}\" in {}", command_line(program, args), dir.display());
    let output = execute(program, args, dir)?;
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        debug!("{}", stderr.trim_end());
    }
    Ok(())
}

/// Run a command and return its standard output.
pub fn query(program: &str, args: &[&str], dir: &Path) -> Result<String> {
    trace!("Query \"{}\" in {}", command_line(program, args), dir.display());
    let output = execute(program, args, dir)?;
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    trace!("{}", stdout.trim_end());
    Ok(stdout)
}

/// Run a command with inherited stdio, for tools whose output the operator
/// should see directly (build drivers).
pub fn run_interactive(program: &str, args: &[String], dir: &Path) -> Result<()> {
    let executable = locate(program)?;
    debug!("Exec \"{} {}\" in {}", program, args.join(" "), dir.display());
    let status = Command::new(executable)
        .args(args)
        .current_dir(dir)
        .status()?;
    if !status.success() {
        return Err(Error::BackendOperation {
            command: format!("{} {}", program, args.join(" ")),
            dir: dir.to_path_buf(),
            code: status.code(),
            stderr: String::new(),
        });
    }
    Ok(())
}

/// Exit code of a failed backend call, if that is what the error is.
pub fn exit_code(error: &Error) -> Option<i32> {
    match error {
        Error::BackendOperation { code, .. } => *code,
        _ => None,
    }
}
