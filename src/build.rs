//! Hand-off to the external build driver.
//!
//! Building is not done here. Once the tree is synchronized, the command
//! configured as `BUILD_DRIVER` is run from the program root with one
//! `--source <dir>` per checkout in the tree, followed by the target and
//! toolchain and any extra arguments.

use std::path::{Path, PathBuf};

use log::info;

use crate::config::Program;
use crate::error::{Error, Result};
use crate::process::run_interactive;
use crate::workflows::{tree, Context, TreeNode};

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Overrides the configured `TARGET`.
    pub target: Option<String>,
    /// Overrides the configured `TOOLCHAIN`.
    pub toolchain: Option<String>,
    /// Passed to the driver unchanged.
    pub extra: Vec<String>,
}

/// The driver program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverCommand {
    pub program: String,
    pub args: Vec<String>,
    pub dir: PathBuf,
}

fn sources(node: &TreeNode, out: &mut Vec<PathBuf>) {
    out.push(node.path.clone());
    for child in &node.children {
        sources(child, out);
    }
}

/// Assemble the driver invocation for the program containing `path`.
pub fn driver_command(ctx: &Context, path: &Path, options: &BuildOptions) -> Result<DriverCommand> {
    let program = Program::locate(path);
    if program.is_cwd {
        return Err(Error::NotInProgram {
            path: path.to_path_buf(),
        });
    }

    let driver = program.get("BUILD_DRIVER")?.ok_or_else(|| Error::Config {
        message: "no build driver configured\n  hint: set one with \"reftree config BUILD_DRIVER <command>\"".to_string(),
    })?;
    let mut words = driver.split_whitespace().map(str::to_string);
    let Some(executable) = words.next() else {
        return Err(Error::Config {
            message: "BUILD_DRIVER is empty".to_string(),
        });
    };
    let mut args: Vec<String> = words.collect();

    let mut roots = Vec::new();
    sources(&tree(ctx, &program.path)?, &mut roots);
    for root in roots {
        args.push("--source".to_string());
        args.push(root.to_string_lossy().to_string());
    }

    let target = match &options.target {
        Some(target) => Some(target.clone()),
        None => program.get("TARGET")?,
    };
    if let Some(target) = target {
        args.extend(["-m".to_string(), target]);
    }
    let toolchain = match &options.toolchain {
        Some(toolchain) => Some(toolchain.clone()),
        None => program.get("TOOLCHAIN")?,
    };
    if let Some(toolchain) = toolchain {
        args.extend(["-t".to_string(), toolchain]);
    }
    args.extend(options.extra.iter().cloned());

    Ok(DriverCommand {
        program: executable,
        args,
        dir: program.path,
    })
}

/// Run the build driver for the program containing `path`.
pub fn build(ctx: &Context, path: &Path, options: &BuildOptions) -> Result<()> {
    let command = driver_command(ctx, path, options)?;
    info!("Building program \"{}\"", command.dir.display());
    run_interactive(&command.program, &command.args, &command.dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SETTINGS_FILE;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_driver_command_collects_sources_and_settings() {
        let temp = TempDir::new().unwrap();
        let prog = temp.path().join("prog");
        fs::create_dir_all(prog.join("driver/.git")).unwrap();
        fs::write(prog.join("driver.lib"), "driver/\n").unwrap();
        fs::write(
            prog.join(SETTINGS_FILE),
            "ROOT=.\nBUILD_DRIVER=make-driver --quiet\nTARGET=K64F\n",
        )
        .unwrap();

        let options = BuildOptions {
            toolchain: Some("GCC_ARM".to_string()),
            extra: vec!["-j4".to_string()],
            ..BuildOptions::default()
        };
        let command = match driver_command(&Context::new(&prog), &prog, &options) {
            Ok(command) => command,
            // git missing: resolving the fake checkout needs it
            Err(e) if e.is_fatal() => return,
            Err(e) => panic!("unexpected error: {}", e),
        };

        assert_eq!(command.program, "make-driver");
        assert_eq!(command.dir, prog);
        let expected: Vec<String> = [
            "--quiet",
            "--source",
            &prog.to_string_lossy(),
            "--source",
            &prog.join("driver").to_string_lossy(),
            "-m",
            "K64F",
            "-t",
            "GCC_ARM",
            "-j4",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(command.args, expected);
    }

    #[test]
    fn test_driver_command_requires_driver() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(SETTINGS_FILE), "ROOT=.\n").unwrap();
        let err = driver_command(
            &Context::new(temp.path()),
            temp.path(),
            &BuildOptions::default(),
        );
        // Unless BUILD_DRIVER is set globally on this machine
        if let Err(err) = err {
            assert!(matches!(err, Error::Config { .. }));
        }
    }
}
