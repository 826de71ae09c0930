// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Deploy dotfiles from a declarative configuration.
//!
//! Deez reads a TOML configuration describing named __dots__, logical bundles
//! of configuration files. Each dot lists the packages it depends on, hook
//! commands to run around it, and __file-groups__ that map paths of a source
//! tree onto a target directory. Deployment of every path is guarded by a
//! backup of whatever the target held before.
//!
//! # Components
//!
//! - [`config`] parses the configuration and resolves inherited actions.
//! - [`dependency`] picks package managers and checks packages.
//! - [`hook`] runs hook commands in order.
//! - [`source`] provides the source tree, locally or from a clone.
//! - [`deploy`] backs up and deploys file-groups.
//! - [`session`] ties all of the above into a single run.
//!
//! Host interaction goes through [`system::System`], so all of the above can
//! be driven without touching real package managers or shells.

pub mod config;
pub mod dependency;
pub mod deploy;
pub mod hook;
pub mod path;
pub mod session;
pub mod source;
pub mod system;
