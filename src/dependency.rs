// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Dependency resolution.
//!
//! Dots can require packages to be present before they get deployed. The
//! configuration lists those packages per package manager, and the resolver
//! works out which managers apply to this run, narrows the listing down to
//! them, and checks every package against the host.
//!
//! # Checking Order
//!
//! A package whose name resolves to an executable on the search path is
//! satisfied no matter what manager it was listed under. Only when that fast
//! path fails is the package manager itself queried. Managers without a
//! known query command provide no information, so their packages are skipped
//! instead of counted as missing.

use crate::{
    config::{DependencyMap, ManagerSelection, MANAGER_DELIMITER},
    system::{PackageQuery, System},
};

use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

/// Package managers Deez knows how to detect, in detection order.
pub const KNOWN_MANAGERS: &[&str] = &["flatpak", "pacman", "yay", "paru", "dnf", "apt"];

/// Shell snippet that asks `manager` if a package is installed.
///
/// The package name gets appended as the final argument. A query counts as
/// a hit when it exits zero and prints something.
pub fn query_command(manager: &str) -> Option<&'static str> {
    match manager {
        "pacman" => Some("pacman -Qs"),
        "yay" => Some("yay -Qs"),
        "paru" => Some("paru -Qs"),
        "dnf" => Some("dnf list installed"),
        "apt" => Some("apt list --installed"),
        "flatpak" => Some("flatpak list --app --columns=application | grep --"),
        _ => None,
    }
}

/// Determine package managers to use for this run.
///
/// An explicit selection is used as is, provided at least one of its
/// managers is available. Automatic selection uses every available manager.
///
/// # Errors
///
/// - Return [`DependencyError::NoManagers`] if nothing is available.
/// - Return [`DependencyError::NoneAvailable`] if no requested manager is
///   available.
pub fn resolve(requested: &ManagerSelection, available: &[String]) -> Result<Vec<String>> {
    if available.is_empty() {
        return Err(DependencyError::NoManagers);
    }

    match requested {
        ManagerSelection::Auto => Ok(available.to_vec()),
        ManagerSelection::Explicit(managers) => {
            if managers.iter().any(|manager| available.contains(manager)) {
                Ok(managers.clone())
            } else {
                Err(DependencyError::NoneAvailable {
                    requested: managers.clone(),
                    available: available.to_vec(),
                })
            }
        }
    }
}

/// Narrow dependency mapping down to the managers in use.
///
/// Keys are split on [`MANAGER_DELIMITER`]. Packages of a matching entry are
/// filed under each manager in `managers` order, but a package is only ever
/// filed once across the whole result. Managers left without packages are
/// dropped.
pub fn filter(managers: &[String], mapping: &DependencyMap) -> DependencyMap {
    let mut filtered = DependencyMap::new();
    let mut seen = HashSet::new();

    for manager in managers {
        for (key, packages) in mapping {
            if !key
                .split(MANAGER_DELIMITER)
                .any(|name| name.trim() == manager.as_str())
            {
                continue;
            }

            let entry = filtered.entry(manager.clone()).or_default();
            for package in packages {
                if seen.insert(package.as_str()) {
                    entry.push(package.clone());
                }
            }
        }
    }

    filtered.retain(|_, packages| !packages.is_empty());
    filtered
}

/// Check that every package in filtered mapping is present.
///
/// Does not stop at the first missing package, so the log lists all of
/// them.
///
/// # Errors
///
/// - Return [`DependencyError::System`] if a package query cannot be run.
#[instrument(skip(system, dependencies), level = "debug")]
pub fn check(system: &dyn System, dependencies: &DependencyMap) -> Result<bool> {
    let mut satisfied = true;

    for (manager, packages) in dependencies {
        for package in packages {
            if system.has_executable(package) {
                info!("package command {package:?} is available");
                continue;
            }

            match system.query_package(manager, package)? {
                PackageQuery::Installed => debug!("{manager} reports {package:?} installed"),
                PackageQuery::Unsupported => {
                    debug!("cannot query {manager} for {package:?}, skipping")
                }
                PackageQuery::Missing => {
                    warn!("package {package:?} is not installed through {manager}");
                    satisfied = false;
                }
            }
        }
    }

    Ok(satisfied)
}

/// Dependency resolution error types.
#[derive(Debug, thiserror::Error)]
pub enum DependencyError {
    /// No supported package manager found on host.
    #[error("no package manager available on this system")]
    NoManagers,

    /// None of the configured package managers are installed.
    #[error("requested package managers {requested:?} are unavailable, found {available:?}")]
    NoneAvailable {
        requested: Vec<String>,
        available: Vec<String>,
    },

    /// Package query could not be performed.
    #[error(transparent)]
    System(#[from] crate::system::SystemError),
}

/// Friendly result alias :3
type Result<T, E = DependencyError> = std::result::Result<T, E>;
