// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! File deployment engine.
//!
//! Deploys the paths of a file-group from a source root into a target root.
//! Each group runs in two phases.
//!
//! # Backup Phase
//!
//! Before anything is mutated, every target path that already exists is
//! copied into the run's backup directory. This happens for every action,
//! including unrecognized ones, so destructive actions always have a snapshot
//! to recover from.
//!
//! # Action Phase
//!
//! The group's [`Action`] then decides how each path gets reconciled:
//!
//! - __preserve__ copies the source only where no target exists yet.
//! - __overwrite__ removes the existing target, directory trees included,
//!   and copies a fresh tree from the source.
//! - __sync__ currently behaves exactly like overwrite.
//! - Anything else skips the whole group.
//!
//! A target whose backup could not be taken is never replaced. The unit of
//! failure is a single path. A missing source, a failed backup, or a failed
//! copy only affects the path it happened on.
//!
//! # See Also
//!
//! 1. [`backup`]
//! 2. [`copy`]

pub mod backup;
pub mod copy;

use crate::{
    config::{expand, Action, ConfigError, FileGroup},
    deploy::{
        backup::{Backup, Snapshot},
        copy::{copy_tree, ensure_parent, exists, remove_tree},
    },
};

use std::{
    error::Error as StdError,
    fmt::{Display, Formatter, Result as FmtResult},
    fs::canonicalize,
    ops::AddAssign,
    path::{Component, Path, PathBuf},
};
use tracing::{error, info, instrument, warn};

/// Tally of what happened to deployed paths.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Report {
    /// Targets copied into the backup directory.
    pub backed_up: usize,

    /// Targets written from source.
    pub deployed: usize,

    /// Targets left alone by preserve.
    pub preserved: usize,

    /// Paths skipped with a warning.
    pub skipped: usize,

    /// Paths that failed with an I/O error.
    pub failed: usize,

    /// Whole file-groups skipped with a warning.
    pub groups_skipped: usize,

    /// Whole dots skipped for missing dependencies.
    pub dots_skipped: usize,
}

impl AddAssign for Report {
    fn add_assign(&mut self, other: Self) {
        self.backed_up += other.backed_up;
        self.deployed += other.deployed;
        self.preserved += other.preserved;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.groups_skipped += other.groups_skipped;
        self.dots_skipped += other.dots_skipped;
    }
}

impl Display for Report {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(
            fmt,
            "{} deployed, {} preserved, {} backed up, {} skipped, {} failed, \
             {} groups skipped, {} dots skipped",
            self.deployed,
            self.preserved,
            self.backed_up,
            self.skipped,
            self.failed,
            self.groups_skipped,
            self.dots_skipped
        )
    }
}

/// Outcome of the action phase for a single path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Deployed,
    Preserved,
    Skipped,
}

/// Deploys file-groups out of one source tree.
#[derive(Debug)]
pub struct Deployer {
    source_root: PathBuf,
    backup: Backup,
}

impl Deployer {
    /// Construct new deployer.
    ///
    /// Relative file-group source roots get resolved against `source_root`.
    pub fn new(source_root: impl Into<PathBuf>, backup: Backup) -> Self {
        Self {
            source_root: source_root.into(),
            backup,
        }
    }

    /// Expand and deploy a configured file-group of `dot`.
    ///
    /// Groups whose roots or paths cannot be expanded are skipped with a
    /// warning.
    pub fn deploy_group(&mut self, dot: &str, action: &Action, group: &FileGroup) -> Report {
        match expand_group(group) {
            Ok((source_root, target_root, paths)) => self.deploy(
                dot,
                action,
                Path::new(source_root.as_deref().unwrap_or_default()),
                Path::new(target_root.as_deref().unwrap_or_default()),
                &paths,
            ),
            Err(err) => {
                warn!("skipping file-group of {dot:?}, cannot expand configuration: {err}");
                Report {
                    groups_skipped: 1,
                    ..Default::default()
                }
            }
        }
    }

    /// Deploy `paths` from `source_root` into `target_root` using `action`.
    ///
    /// An empty source root, target root, or path listing skips the group.
    /// Backups are taken before the action is even looked at.
    #[instrument(skip(self, paths), level = "debug")]
    pub fn deploy(
        &mut self,
        dot: &str,
        action: &Action,
        source_root: &Path,
        target_root: &Path,
        paths: &[PathBuf],
    ) -> Report {
        let mut report = Report::default();

        if source_root.as_os_str().is_empty() {
            warn!("skipping due to missing source_root for paths: {paths:?}");
            report.groups_skipped += 1;
            return report;
        }

        if target_root.as_os_str().is_empty() {
            warn!("skipping due to missing target_root for paths: {paths:?}");
            report.groups_skipped += 1;
            return report;
        }

        if paths.is_empty() {
            warn!("skipping {} due to empty paths", source_root.display());
            report.groups_skipped += 1;
            return report;
        }

        // INVARIANT: Paths must stay below their roots.
        let mut usable = Vec::with_capacity(paths.len());
        for path in paths {
            if escapes_root(path) {
                warn!("skipping path {path:?}, it must be relative and stay below its root");
                report.skipped += 1;
            } else {
                usable.push(path.as_path());
            }
        }

        // INVARIANT: Backup everything before any mutation, whatever the action.
        let mut ready = Vec::with_capacity(usable.len());
        for path in usable {
            let target = target_root.join(path);
            let destination = self.backup.destination(dot, source_root, path);
            match self.backup.snapshot(&target, &destination) {
                Ok(Snapshot::Taken(_)) => {
                    report.backed_up += 1;
                    ready.push(path);
                }
                Ok(snapshot) if snapshot.is_recoverable() || !action.replaces_target() => {
                    ready.push(path)
                }
                Ok(_) => {
                    warn!(
                        "skipping {}, it cannot be backed up before being replaced",
                        target.display()
                    );
                    report.skipped += 1;
                }
                Err(err) => {
                    log_failure(&DeployError::Backup {
                        target,
                        destination,
                        source: err,
                    });
                    report.failed += 1;
                }
            }
        }

        let source_root = self.source_root.join(source_root);
        match action {
            Action::Preserve => info!("preserving: {}", target_root.display()),
            Action::Overwrite => info!("overwriting: {}", target_root.display()),
            Action::Sync => info!("syncing: {}", target_root.display()),
            Action::Unknown(_) => {
                warn!("skipping {} due to unknown action: {action}", source_root.display());
                report.groups_skipped += 1;
                return report;
            }
        }

        for path in ready {
            let source = source_root.join(path);
            let target = target_root.join(path);
            let outcome = match action {
                Action::Preserve => preserve(&source, &target),
                _ => overwrite(&source, &target),
            };

            match outcome {
                Ok(Outcome::Deployed) => report.deployed += 1,
                Ok(Outcome::Preserved) => report.preserved += 1,
                Ok(Outcome::Skipped) => report.skipped += 1,
                Err(err) => {
                    log_failure(&err);
                    report.failed += 1;
                }
            }
        }

        report
    }
}

/// Expanded source root, target root, and paths of a file-group.
type ExpandedGroup = (Option<String>, Option<String>, Vec<PathBuf>);

fn expand_group(group: &FileGroup) -> Result<ExpandedGroup, ConfigError> {
    let source_root = group.source_root.as_deref().map(expand).transpose()?;
    let target_root = group.target_root.as_deref().map(expand).transpose()?;
    let paths = group
        .paths
        .iter()
        .map(|path| expand(path).map(PathBuf::from))
        .collect::<Result<Vec<_>, _>>()?;

    Ok((source_root, target_root, paths))
}

fn preserve(source: &Path, target: &Path) -> Result<Outcome> {
    if !exists(source) {
        warn!("skipping missing source path: {}", source.display());
        return Ok(Outcome::Skipped);
    }

    if exists(target) {
        info!("target path already exists: {}", target.display());
        return Ok(Outcome::Preserved);
    }

    info!("populating: {}", target.display());
    place(source, target)?;

    Ok(Outcome::Deployed)
}

fn overwrite(source: &Path, target: &Path) -> Result<Outcome> {
    if !exists(source) {
        warn!("skipping missing source path: {}", source.display());
        return Ok(Outcome::Skipped);
    }

    if same_location(source, target) {
        warn!(
            "source and target are the same location, skipping: {}",
            target.display()
        );
        return Ok(Outcome::Skipped);
    }

    if exists(target) {
        info!("replacing: {}", target.display());
        remove_tree(target).map_err(|source| DeployError::Remove {
            path: target.to_path_buf(),
            source,
        })?;
    } else {
        info!("populating: {}", target.display());
    }

    place(source, target)?;

    Ok(Outcome::Deployed)
}

fn place(source: &Path, target: &Path) -> Result<()> {
    ensure_parent(target).map_err(|err| DeployError::CreateParent {
        path: target.to_path_buf(),
        source: err,
    })?;

    copy_tree(source, target).map_err(|err| DeployError::Copy {
        from: source.to_path_buf(),
        to: target.to_path_buf(),
        source: err,
    })
}

fn escapes_root(path: &Path) -> bool {
    path.as_os_str().is_empty()
        || path
            .components()
            .any(|part| !matches!(part, Component::Normal(_) | Component::CurDir))
}

fn same_location(source: &Path, target: &Path) -> bool {
    match (canonicalize(source), canonicalize(target)) {
        (Ok(source), Ok(target)) => source == target,
        _ => source == target,
    }
}

fn log_failure(err: &DeployError) {
    match err.source() {
        Some(cause) => error!("{err}: {cause}"),
        None => error!("{err}"),
    }
}

/// Deployment error types.
///
/// These never abort a group. They get logged and counted per path.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// Target could not be copied into the backup directory.
    #[error("failed to back up {target:?} into {destination:?}")]
    Backup {
        target: PathBuf,
        destination: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Existing target could not be removed before replacement.
    #[error("failed to remove {path:?}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Parent directories of target could not be created.
    #[error("failed to create parent directories of {path:?}")]
    CreateParent {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Source could not be copied to target.
    #[error("failed to copy {from:?} to {to:?}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Friendly result alias :3
type Result<T, E = DeployError> = std::result::Result<T, E>;

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs::{create_dir_all, read_link, read_to_string, write};
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        source: PathBuf,
        target: PathBuf,
        backup: PathBuf,
    }

    impl Fixture {
        fn new() -> anyhow::Result<Self> {
            let dir = tempfile::tempdir()?;
            let source = dir.path().join("src");
            let target = dir.path().join("home");
            let backup = dir.path().join("backup");
            create_dir_all(source.join("zsh"))?;
            create_dir_all(&target)?;

            Ok(Self {
                _dir: dir,
                source,
                target,
                backup,
            })
        }

        fn deployer(&self) -> Deployer {
            Deployer::new(&self.source, Backup::new(&self.backup))
        }

        fn deploy(&self, action: Action, paths: &[&str]) -> Report {
            let paths: Vec<PathBuf> = paths.iter().map(PathBuf::from).collect();
            self.deployer()
                .deploy("shell", &action, Path::new("zsh"), &self.target, &paths)
        }
    }

    #[test]
    fn missing_roots_skip_group() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let mut deployer = fixture.deployer();
        let paths = vec![PathBuf::from(".zshrc")];

        let report = deployer.deploy(
            "shell",
            &Action::Overwrite,
            Path::new(""),
            &fixture.target,
            &paths,
        );
        assert_eq!(report.groups_skipped, 1);

        let report = deployer.deploy(
            "shell",
            &Action::Overwrite,
            Path::new("zsh"),
            Path::new(""),
            &paths,
        );
        assert_eq!(report.groups_skipped, 1);

        let report = deployer.deploy(
            "shell",
            &Action::Overwrite,
            Path::new("zsh"),
            &fixture.target,
            &[],
        );
        assert_eq!(report.groups_skipped, 1);

        Ok(())
    }

    #[test]
    fn missing_source_only_skips_that_path() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        write(fixture.source.join("zsh/.zprofile"), "NEW")?;

        let report = fixture.deploy(Action::Overwrite, &[".zshrc", ".zprofile"]);

        assert_eq!(report.skipped, 1);
        assert_eq!(report.deployed, 1);
        assert_eq!(read_to_string(fixture.target.join(".zprofile"))?, "NEW");

        Ok(())
    }

    #[test]
    fn reject_escaping_paths() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        write(fixture.source.join("zsh/.zshrc"), "NEW")?;

        let outside = fixture.target.join("../outside");
        write(&outside, "OUTSIDE-OLD")?;
        write(fixture.source.join("outside"), "NEW")?;

        let report = fixture.deploy(
            Action::Overwrite,
            &["", "/etc/passwd", "../outside", "conf/../../outside", ".zshrc"],
        );

        assert_eq!(report.skipped, 4);
        assert_eq!(report.deployed, 1);
        assert_eq!(read_to_string(&outside)?, "OUTSIDE-OLD");

        Ok(())
    }

    #[test]
    fn never_replace_target_holding_backup_dir() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        create_dir_all(fixture.source.join("zsh/cache"))?;
        write(fixture.source.join("zsh/cache/fresh"), "NEW")?;
        create_dir_all(fixture.target.join("cache"))?;
        write(fixture.target.join("cache/precious"), "OLD")?;
        let backup = Backup::new(fixture.target.join("cache/backup/1"));
        let paths = [PathBuf::from("cache")];

        for action in [Action::Overwrite, Action::Sync] {
            let report = Deployer::new(&fixture.source, backup.clone()).deploy(
                "shell",
                &action,
                Path::new("zsh"),
                &fixture.target,
                &paths,
            );

            assert_eq!(report.skipped, 1);
            assert_eq!(report.deployed, 0);
            assert_eq!(read_to_string(fixture.target.join("cache/precious"))?, "OLD");
            assert!(!fixture.target.join("cache/fresh").exists());
        }

        let report = Deployer::new(&fixture.source, backup).deploy(
            "shell",
            &Action::Preserve,
            Path::new("zsh"),
            &fixture.target,
            &paths,
        );
        assert_eq!(report.preserved, 1);

        Ok(())
    }

    #[test]
    fn overwrite_clears_stale_directory_entries() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        create_dir_all(fixture.source.join("zsh/conf.d"))?;
        write(fixture.source.join("zsh/conf.d/new.zsh"), "new")?;
        create_dir_all(fixture.target.join("conf.d"))?;
        write(fixture.target.join("conf.d/stale.zsh"), "stale")?;

        let report = fixture.deploy(Action::Overwrite, &["conf.d"]);

        assert_eq!(report.backed_up, 1);
        assert!(!fixture.target.join("conf.d/stale.zsh").exists());
        assert_eq!(read_to_string(fixture.target.join("conf.d/new.zsh"))?, "new");

        Ok(())
    }

    #[test]
    fn overwrite_replaces_link_not_its_target() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        write(fixture.source.join("zsh/.zshrc"), "NEW")?;
        let elsewhere = fixture.target.join("elsewhere");
        write(&elsewhere, "KEEP")?;
        std::os::unix::fs::symlink(&elsewhere, fixture.target.join(".zshrc"))?;

        fixture.deploy(Action::Overwrite, &[".zshrc"]);

        assert_eq!(read_to_string(&elsewhere)?, "KEEP");
        assert_eq!(read_to_string(fixture.target.join(".zshrc"))?, "NEW");
        assert!(!fixture.target.join(".zshrc").symlink_metadata()?.file_type().is_symlink());
        assert_eq!(
            read_link(fixture.backup.join("shell/zsh/.zshrc"))?,
            elsewhere
        );

        Ok(())
    }

    #[test]
    fn overwrite_refuses_to_copy_onto_source() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        write(fixture.source.join("zsh/.zshrc"), "SAME")?;
        let mut deployer = fixture.deployer();

        let report = deployer.deploy(
            "shell",
            &Action::Overwrite,
            Path::new("zsh"),
            &fixture.source.join("zsh"),
            &[PathBuf::from(".zshrc")],
        );

        assert_eq!(report.skipped, 1);
        assert_eq!(read_to_string(fixture.source.join("zsh/.zshrc"))?, "SAME");

        Ok(())
    }

    #[test]
    fn unknown_action_still_backs_up() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        write(fixture.source.join("zsh/.zshrc"), "NEW")?;
        write(fixture.target.join(".zshrc"), "OLD")?;

        let report = fixture.deploy(Action::Unknown("merge".into()), &[".zshrc"]);

        assert_eq!(report.groups_skipped, 1);
        assert_eq!(report.backed_up, 1);
        assert_eq!(read_to_string(fixture.target.join(".zshrc"))?, "OLD");
        assert_eq!(read_to_string(fixture.backup.join("shell/zsh/.zshrc"))?, "OLD");

        Ok(())
    }
}
