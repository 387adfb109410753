// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `assetdag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "assetdag",
    version,
    about = "Build and watch front-end assets from declarative pipelines.",
    long_about = None
)]
pub struct CliArgs {
    /// Task to run.
    ///
    /// Defaults to `[config].default_task` (itself defaulting to `default`).
    #[arg(value_name = "TASK")]
    pub task: Option<String>,

    /// Path to the config file (TOML).
    ///
    /// Relative pipeline paths are resolved against the directory that
    /// contains it.
    #[arg(long, value_name = "PATH", default_value = "Assetdag.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `ASSETDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Validate the config and print what the task would run, without
    /// touching any files.
    #[arg(long)]
    pub dry_run: bool,

    /// Print every task name with its kind and exit.
    #[arg(long, conflicts_with = "dry_run")]
    pub list: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positional_task_and_flags() {
        let args = CliArgs::try_parse_from([
            "assetdag",
            "build",
            "--config",
            "site/Assetdag.toml",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(args.task.as_deref(), Some("build"));
        assert_eq!(args.config, "site/Assetdag.toml");
        assert!(matches!(args.log_level, Some(LogLevel::Debug)));
        assert!(!args.dry_run);
    }

    #[test]
    fn defaults() {
        let args = CliArgs::try_parse_from(["assetdag"]).unwrap();
        assert_eq!(args.task, None);
        assert_eq!(args.config, "Assetdag.toml");
        assert!(!args.list);
    }
}
