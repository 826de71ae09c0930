// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Host system capabilities.
//!
//! Everything Deez needs from the host beyond the file system goes through
//! the [`System`] trait: looking up executables, asking a package manager if
//! a package is installed, and running shell commands. Dependency checks and
//! hook execution only ever see this trait, so they can be driven by a fake
//! host in tests.

use crate::dependency::{query_command, KNOWN_MANAGERS};

use std::{
    ffi::OsStr,
    process::{Command, Output},
};
use tracing::{debug, instrument};

/// Shell used to run hook commands and package queries.
const SHELL: &str = "sh";

/// Layer of indirection for host interaction.
#[cfg_attr(test, mockall::automock)]
pub trait System {
    /// List package managers that are installed on the host.
    fn available_managers(&self) -> Vec<String>;

    /// Check if `name` resolves to an executable on the search path.
    fn has_executable(&self, name: &str) -> bool;

    /// Ask `manager` whether `package` is installed.
    fn query_package(&self, manager: &str, package: &str) -> Result<PackageQuery>;

    /// Run `command` through the shell and capture its output.
    fn run_command(&self, command: &str) -> Result<CommandOutput>;
}

/// Answer of a package manager query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageQuery {
    Installed,
    Missing,

    /// Manager has no known way to query installed packages.
    Unsupported,
}

/// Captured result of a finished shell command.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub code: Option<i32>,
    pub success: bool,
}

impl CommandOutput {
    /// Construct successful output with given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            code: Some(0),
            success: true,
            ..Default::default()
        }
    }

    /// Construct failed output with given exit code and stderr.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stderr: stderr.into(),
            code: Some(code),
            success: false,
            ..Default::default()
        }
    }
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        // INVARIANT: Chomp trailing newlines.
        let chomp = |bytes: &[u8]| String::from_utf8_lossy(bytes).trim_end().to_string();
        Self {
            stdout: chomp(output.stdout.as_slice()),
            stderr: chomp(output.stderr.as_slice()),
            code: output.status.code(),
            success: output.status.success(),
        }
    }
}

/// The real host, reached through `sh` and the search path.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostSystem;

impl HostSystem {
    /// Construct new host system handle.
    pub fn new() -> Self {
        Self
    }
}

impl System for HostSystem {
    fn available_managers(&self) -> Vec<String> {
        KNOWN_MANAGERS
            .iter()
            .filter(|manager| self.has_executable(manager))
            .map(ToString::to_string)
            .collect()
    }

    fn has_executable(&self, name: &str) -> bool {
        which::which(name).is_ok()
    }

    #[instrument(skip(self), level = "debug")]
    fn query_package(&self, manager: &str, package: &str) -> Result<PackageQuery> {
        let Some(query) = query_command(manager) else {
            debug!("no query command known for {manager:?}");
            return Ok(PackageQuery::Unsupported);
        };

        // INVARIANT: Package name is passed as a positional parameter, never
        // spliced into the script itself.
        let output = shell(format!("{query} \"$1\""), [package])?;
        if output.success && !output.stdout.is_empty() {
            Ok(PackageQuery::Installed)
        } else {
            Ok(PackageQuery::Missing)
        }
    }

    #[instrument(skip(self), level = "debug")]
    fn run_command(&self, command: &str) -> Result<CommandOutput> {
        shell(command, std::iter::empty::<&str>())
    }
}

fn shell(
    script: impl AsRef<str>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
) -> Result<CommandOutput> {
    let output = Command::new(SHELL)
        .arg("-c")
        .arg(script.as_ref())
        .arg(SHELL)
        .args(args)
        .output()
        .map_err(|source| SystemError::Spawn {
            command: script.as_ref().to_string(),
            source,
        })?;

    Ok(output.into())
}

/// Host interaction error types.
#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    /// Shell could not be started at all.
    #[error("failed to spawn shell for {command:?}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Friendly result alias :3
pub type Result<T, E = SystemError> = std::result::Result<T, E>;
