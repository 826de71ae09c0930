// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use deez::{
    config::Config,
    deploy::{backup::Backup, Deployer},
    hook::{CommandRunner, FailurePolicy},
    path::{backup_run_dir, cache_base_dir, clones_dir, default_config_file},
    session::Session,
    source::{resolve_source_root, Git2Source},
    system::HostSystem,
};

use anyhow::{Context, Result};
use clap::Parser;
use std::{path::PathBuf, process::exit};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Deploy dotfiles described by a configuration file.
#[derive(Debug, Clone, Parser)]
#[command(about, version, override_usage = "deez [options]")]
struct Cli {
    /// Configuration file to deploy from.
    #[arg(short, long, value_name = "file")]
    pub config: Option<PathBuf>,

    /// Use this directory as source root instead of the configured one.
    #[arg(short, long, value_name = "dir")]
    pub source_root: Option<PathBuf>,

    /// What to do when a hook command fails: "abort" or "prompt".
    #[arg(long, value_name = "policy", default_value_t = FailurePolicy::Abort)]
    pub on_error: FailurePolicy,

    /// Log debug information.
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log warnings and errors.
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }

    fn run(self) -> Result<()> {
        let config_file = match self.config {
            Some(path) => path,
            None => default_config_file()?,
        };
        if !config_file.is_file() {
            anyhow::bail!("the file {:?} does not exist", config_file.display());
        }

        info!("reading file: {}", config_file.display());
        let config = Config::load(&config_file)
            .with_context(|| format!("failed to load {:?}", config_file.display()))?;

        let base = cache_base_dir()?;
        let source_root = resolve_source_root(
            &Git2Source,
            &config_file,
            &config.settings,
            self.source_root.as_deref(),
            &clones_dir(&base),
        )?;
        info!("source root: {}", source_root.display());

        let system = HostSystem::new();
        let deployer = Deployer::new(source_root, Backup::new(backup_run_dir(&base)));
        let mut session = Session::new(&system, CommandRunner::new(self.on_error), deployer);
        session.run(&config)?;

        Ok(())
    }
}

fn main() {
    let cli = Cli::parse();
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(cli.log_level()))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = cli.run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}
