// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Hook command execution.
//!
//! Start, end, pre, and post commands are plain shell snippets. They run one
//! at a time in declared order, because later steps may rely on what earlier
//! ones produced.

use crate::system::System;

use inquire::Confirm;
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};
use tracing::{debug, error, info, instrument, warn};

/// What to do when a hook command exits non-zero.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop the whole run.
    #[default]
    Abort,

    /// Ask the user whether to carry on.
    Prompt,
}

impl FromStr for FailurePolicy {
    type Err = HookError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        match data {
            "abort" => Ok(Self::Abort),
            "prompt" => Ok(Self::Prompt),
            other => Err(HookError::UnknownPolicy(other.into())),
        }
    }
}

impl Display for FailurePolicy {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Abort => fmt.write_str("abort"),
            Self::Prompt => fmt.write_str("prompt"),
        }
    }
}

/// Sequential runner of hook command lists.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandRunner {
    policy: FailurePolicy,
}

impl CommandRunner {
    /// Construct new command runner.
    pub fn new(policy: FailurePolicy) -> Self {
        Self { policy }
    }

    /// Run every non-empty command of `commands` in order.
    ///
    /// Output of each command is captured, and its stdout logged. The
    /// failure policy applies to each failing command alike.
    ///
    /// # Errors
    ///
    /// - Return [`HookError::Failed`] if a command fails under
    ///   [`FailurePolicy::Abort`], or the user declines to continue under
    ///   [`FailurePolicy::Prompt`].
    /// - Return [`HookError::System`] if the shell cannot be started.
    #[instrument(skip(self, system, commands), level = "debug")]
    pub fn run(&self, system: &dyn System, label: &str, commands: &[String]) -> Result<()> {
        for command in commands.iter().filter(|command| !command.trim().is_empty()) {
            debug!("run {label} command {command:?}");
            let output = system.run_command(command)?;
            if !output.stdout.is_empty() {
                info!("{}", output.stdout);
            }

            if output.success {
                continue;
            }

            error!(
                "{label} command {command:?} failed with exit code {}: {}",
                output.code.map_or_else(|| "none".into(), |code| code.to_string()),
                output.stderr
            );

            if !self.should_continue(command) {
                return Err(HookError::Failed {
                    command: command.clone(),
                    code: output.code,
                });
            }

            warn!("continuing past failed {label} command {command:?}");
        }

        Ok(())
    }

    fn should_continue(&self, command: &str) -> bool {
        match self.policy {
            FailurePolicy::Abort => false,
            FailurePolicy::Prompt => Confirm::new(&format!("{command:?} failed, continue?"))
                .with_default(false)
                .prompt()
                .unwrap_or(false),
        }
    }
}

/// Hook execution error types.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    /// Command exited non-zero and the run was aborted.
    #[error("command {command:?} failed with exit code {code:?}")]
    Failed { command: String, code: Option<i32> },

    /// Failure policy name is not recognized.
    #[error("unknown failure policy {0:?}, expected \"abort\" or \"prompt\"")]
    UnknownPolicy(String),

    /// Shell could not be started.
    #[error(transparent)]
    System(#[from] crate::system::SystemError),
}

/// Friendly result alias :3
type Result<T, E = HookError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::{CommandOutput, MockSystem};

    use mockall::{predicate::eq, Sequence};
    use simple_test_case::test_case;

    fn commands(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn run_commands_in_declared_order() -> anyhow::Result<()> {
        let mut system = MockSystem::new();
        let mut seq = Sequence::new();
        for command in ["mkdir -p out", "touch out/file", "cat out/file"] {
            system
                .expect_run_command()
                .with(eq(command))
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_| Ok(CommandOutput::ok("")));
        }

        CommandRunner::default().run(
            &system,
            "pre",
            &commands(&["mkdir -p out", "touch out/file", "cat out/file"]),
        )?;

        Ok(())
    }

    #[test]
    fn skip_blank_commands() -> anyhow::Result<()> {
        let mut system = MockSystem::new();
        system
            .expect_run_command()
            .with(eq("true"))
            .times(1)
            .returning(|_| Ok(CommandOutput::ok("")));

        CommandRunner::default().run(&system, "post", &commands(&["", "  ", "true"]))?;

        Ok(())
    }

    #[test]
    fn abort_stops_at_first_failure() {
        let mut system = MockSystem::new();
        system
            .expect_run_command()
            .with(eq("false"))
            .times(1)
            .returning(|_| Ok(CommandOutput::failed(1, "")));
        system.expect_run_command().with(eq("echo never")).never();

        let result = CommandRunner::new(FailurePolicy::Abort).run(
            &system,
            "start",
            &commands(&["false", "echo never"]),
        );

        assert!(matches!(
            result,
            Err(HookError::Failed { command, code: Some(1) }) if command == "false"
        ));
    }

    #[test_case("abort", Some(FailurePolicy::Abort); "abort")]
    #[test_case("prompt", Some(FailurePolicy::Prompt); "prompt")]
    #[test_case("ignore", None; "unknown")]
    #[test]
    fn parse_failure_policy(name: &str, expect: Option<FailurePolicy>) {
        assert_eq!(name.parse::<FailurePolicy>().ok(), expect);
    }
}
