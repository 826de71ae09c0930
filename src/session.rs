// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Deployment session.
//!
//! A __session__ is one run over a loaded configuration. It carries every
//! piece of run state explicitly: the host handle, the command runner, and
//! the deployer with its backup directory. Nothing is kept in globals.
//!
//! # Control Flow
//!
//! 1. Resolve package managers, and gate the whole run on global
//!    dependencies.
//! 2. Run the start commands.
//! 3. For each dot in declared order: gate on the dot's own dependencies,
//!    run its pre commands, deploy its file-groups in order, run its post
//!    commands.
//! 4. Run the end commands.
//!
//! A dot with missing dependencies is skipped with a warning. Missing global
//! dependencies, or a failing hook command, end the session.

use crate::{
    config::{Config, DependencyMap, Dot},
    dependency::{check, filter, resolve},
    deploy::{Deployer, Report},
    hook::CommandRunner,
    system::System,
};

use tracing::{error, info, instrument, warn};

/// Explicit context of a single deployment run.
pub struct Session<'a> {
    system: &'a dyn System,
    runner: CommandRunner,
    deployer: Deployer,
}

impl<'a> Session<'a> {
    /// Construct new session.
    pub fn new(system: &'a dyn System, runner: CommandRunner, deployer: Deployer) -> Self {
        Self {
            system,
            runner,
            deployer,
        }
    }

    /// Deploy every dot of `config`.
    ///
    /// # Errors
    ///
    /// - Return [`SessionError::Dependency`] if no package manager can be
    ///   used, or a package query fails.
    /// - Return [`SessionError::MissingDependencies`] if global dependencies
    ///   are not satisfied.
    /// - Return [`SessionError::Hook`] if a hook command aborts the run.
    /// - Return [`SessionError::PathsFailed`] if any path failed to deploy.
    ///   Every dot is still processed first.
    #[instrument(skip(self, config), level = "debug")]
    pub fn run(&mut self, config: &Config) -> Result<Report> {
        let settings = &config.settings;
        let available = self.system.available_managers();
        let managers = resolve(&settings.package_manager, &available)?;
        info!("expected package manager: {managers:?}");

        let global = filter(&managers, &settings.dependency);
        if !check(self.system, &global)? {
            error!("missing dependencies: {global:?}");
            return Err(SessionError::MissingDependencies(global));
        }

        self.runner
            .run(self.system, "start", &settings.start_command)?;

        let mut report = Report::default();
        for dot in &config.dots {
            report += self.run_dot(config, dot, &managers)?;
        }

        self.runner.run(self.system, "end", &settings.end_command)?;
        info!("{report}");

        if report.failed > 0 {
            return Err(SessionError::PathsFailed(report));
        }

        Ok(report)
    }

    fn run_dot(&mut self, config: &Config, dot: &Dot, managers: &[String]) -> Result<Report> {
        info!("deploying {}", dot.name);
        let mut report = Report::default();

        let dependencies = filter(managers, &dot.dependency);
        if !check(self.system, &dependencies)? {
            warn!(
                "skipping {} due to missing dependencies: {dependencies:?}",
                dot.name
            );
            report.dots_skipped += 1;
            return Ok(report);
        }

        self.runner.run(self.system, "pre", &dot.pre_command)?;

        for group in &dot.files {
            let action = config.action_for(dot, group);
            report += self.deployer.deploy_group(&dot.name, &action, group);
        }

        self.runner.run(self.system, "post", &dot.post_command)?;
        info!("____________________________");

        Ok(report)
    }
}

/// Session error types.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Package managers cannot be resolved, or queried.
    #[error(transparent)]
    Dependency(#[from] crate::dependency::DependencyError),

    /// Global dependencies are not installed.
    #[error("missing dependencies: {0:?}")]
    MissingDependencies(DependencyMap),

    /// Hook command aborted the run.
    #[error(transparent)]
    Hook(#[from] crate::hook::HookError),

    /// Some paths could not be deployed.
    #[error("{} path(s) failed to deploy ({})", .0.failed, .0)]
    PathsFailed(Report),
}

/// Friendly result alias :3
type Result<T, E = SessionError> = std::result::Result<T, E>;
