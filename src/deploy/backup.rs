// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Backup of target content.
//!
//! Every run owns one backup directory, created the first time something
//! actually needs backing up. Entries are namespaced as
//! `<backup>/<dot>/<source_root>/<path>`, so different dots and file-groups
//! that share a relative path rarely collide. When two distinct targets do
//! map onto the same entry, the later one is stored beside it with a numeric
//! suffix, so no target is ever left without a snapshot.

use crate::{
    deploy::copy::{copy_tree, ensure_parent, exists},
    path::nest_under,
};

use std::{
    collections::HashMap,
    ffi::OsString,
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

/// Result of backing up one target path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Snapshot {
    /// Target was copied to the contained location.
    Taken(PathBuf),

    /// Target was already copied to the contained location earlier this run.
    Kept(PathBuf),

    /// Target does not exist, so there is nothing to save.
    Absent,

    /// Target contains the backup destination, so it cannot be copied.
    ///
    /// Nothing of the target is saved. Callers must not replace it.
    Overlap,
}

impl Snapshot {
    /// Check if the target's prior content is recoverable from the backup.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Overlap)
    }
}

/// Append-only backup directory of a single run.
#[derive(Debug, Clone)]
pub struct Backup {
    root: PathBuf,
    created: bool,
    taken: HashMap<(PathBuf, PathBuf), PathBuf>,
}

impl Backup {
    /// Construct new backup rooted at `root`.
    ///
    /// Nothing touches the file system until the first snapshot is taken.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            created: false,
            taken: HashMap::new(),
        }
    }

    /// Where target `path` of a dot's file-group gets backed up to.
    pub fn destination(&self, dot: &str, source_root: &Path, path: &Path) -> PathBuf {
        nest_under(&self.root, &[Path::new(dot), source_root, path])
    }

    /// Copy `target` to `destination` unless it is missing or unsafe to.
    ///
    /// A destination equal to, or inside of, the target would copy the target
    /// onto itself, so [`Snapshot::Overlap`] is returned instead. A target
    /// snapshotted to the same destination earlier this run keeps its first,
    /// older snapshot. A destination already occupied by anything else gets
    /// a free sibling name instead.
    ///
    /// # Errors
    ///
    /// - Return [`std::io::Error`] if creating the backup directory or
    ///   copying fails.
    pub fn snapshot(&mut self, target: &Path, destination: &Path) -> std::io::Result<Snapshot> {
        if !exists(target) {
            debug!("nothing to back up at {}", target.display());
            return Ok(Snapshot::Absent);
        }

        if destination.starts_with(target) {
            warn!(
                "backup destination {} lies within target {}, cannot back up",
                destination.display(),
                target.display()
            );
            return Ok(Snapshot::Overlap);
        }

        let key = (target.to_path_buf(), destination.to_path_buf());
        if let Some(first) = self.taken.get(&key) {
            warn!(
                "backup of {} already taken this run, keeping first copy",
                target.display()
            );
            return Ok(Snapshot::Kept(first.clone()));
        }

        let destination = vacant(destination);
        if !self.created {
            mkdirp::mkdirp(&self.root)?;
            self.created = true;
            info!("backup directory: {}", self.root.display());
        }

        info!("backing up target path: {}", target.display());
        ensure_parent(&destination)?;
        copy_tree(target, &destination)?;
        self.taken.insert(key, destination.clone());

        Ok(Snapshot::Taken(destination))
    }
}

/// First of `destination`, `destination.1`, `destination.2`, ... not on disk.
fn vacant(destination: &Path) -> PathBuf {
    if !exists(destination) {
        return destination.to_path_buf();
    }

    let name = destination.file_name().map(OsString::from).unwrap_or_default();
    (1..)
        .map(|n| {
            let mut numbered = name.clone();
            numbered.push(format!(".{n}"));
            destination.with_file_name(numbered)
        })
        .find(|candidate| !exists(candidate))
        .unwrap_or_else(|| destination.to_path_buf())
}
