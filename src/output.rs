//! # Output Configuration
//!
//! Controls how the CLI talks to the terminal: whether colour is used, and
//! how log records from the library are rendered.
//!
//! ## Colour
//!
//! Decided once from the `--color` flag and the environment:
//! - `--color=never|always|auto`
//! - `NO_COLOR` disables colour when set (per https://no-color.org/)
//! - `CLICOLOR=0` disables colour, `CLICOLOR_FORCE=1` forces it
//! - `TERM=dumb` disables colour
//!
//! ## Log records
//!
//! Library progress is reported through `log`. The binary installs an
//! `env_logger` that prints every record as `[reftree] <message>`, with
//! warnings and errors tagged `WARNING:` and `ERROR:` so they stand out from
//! regular progress lines.

use std::env;
use std::io::Write;

use console::Style;
use log::{Level, LevelFilter};

/// Output configuration for controlling colors and emojis.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Whether colors and emojis should be used in output.
    pub use_color: bool,
}

impl OutputConfig {
    /// Create an output configuration from environment and CLI flag.
    ///
    /// `always` overrides `NO_COLOR`, `never` wins over everything, and
    /// anything else inspects the environment and the terminal.
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };

        Self { use_color }
    }

    fn detect_color_support() -> bool {
        // The presence of the variable (even if empty) disables colors
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }

        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }

        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }

        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }

        console::Term::stderr().features().colors_supported()
    }

    /// Create a configuration with colors always enabled.
    #[cfg(test)]
    pub fn with_color() -> Self {
        Self { use_color: true }
    }

    /// Create a configuration with colors always disabled.
    #[cfg(test)]
    pub fn without_color() -> Self {
        Self { use_color: false }
    }

    /// Apply `style` to `text` when colour is enabled.
    pub fn paint(&self, style: &Style, text: &str) -> String {
        if self.use_color {
            style.apply_to(text).to_string()
        } else {
            text.to_string()
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// Returns the emoji when colour is enabled, the plain alternative otherwise.
pub fn emoji<'a>(config: &OutputConfig, emoji_str: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        emoji_str
    } else {
        plain
    }
}

/// Log level selected by `--log-level` and the number of `-v` flags.
///
/// Each `-v` raises the level by one step above the given one. Unknown level
/// names fall back to `info`.
pub fn log_level(name: &str, verbose: u8) -> LevelFilter {
    let base = name.parse::<LevelFilter>().unwrap_or(LevelFilter::Info);
    let levels = [
        LevelFilter::Off,
        LevelFilter::Error,
        LevelFilter::Warn,
        LevelFilter::Info,
        LevelFilter::Debug,
        LevelFilter::Trace,
    ];
    let index = levels.iter().position(|l| *l == base).unwrap_or(3);
    levels[(index + verbose as usize).min(levels.len() - 1)]
}

/// The text of one log line, without the trailing newline.
pub fn format_record(config: &OutputConfig, level: Level, message: &str) -> String {
    let prefix = config.paint(&Style::new().dim(), "[reftree]");
    match level {
        Level::Error => format!(
            "{} {} {}",
            prefix,
            config.paint(&Style::new().red().bold(), "ERROR:"),
            message
        ),
        Level::Warn => format!(
            "{} {} {}",
            prefix,
            config.paint(&Style::new().yellow().bold(), "WARNING:"),
            message
        ),
        Level::Info => format!("{} {}", prefix, message),
        Level::Debug | Level::Trace => {
            format!("{} {}", prefix, config.paint(&Style::new().dim(), message))
        }
    }
}

/// Install the logger used by the binary. `RUST_LOG` still overrides the
/// level for individual modules.
pub fn init_logging(config: &OutputConfig, level: LevelFilter) {
    let config = config.clone();
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_env("RUST_LOG")
        .format(move |buf, record| {
            writeln!(
                buf,
                "{}",
                format_record(&config, record.level(), &record.args().to_string())
            )
        })
        .try_init();
}
