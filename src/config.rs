// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the configuration file that drives a deployment. The
//! file is read once at startup and never changes afterwards.
//!
//! # General Layout
//!
//! The top-level table holds run-wide settings: the ordered `dots` listing,
//! a default action, start and end commands, the package manager preference,
//! global dependencies, and where the source tree comes from. Every name in
//! `dots` doubles as the key of its own table in the same file, which holds
//! that dot's action override, hooks, dependencies, and file-groups.
//!
//! ```toml
//! default_action = "preserve"
//! package_manager = "auto"
//! dots = ["shell"]
//!
//! [dependency]
//! "pacman,yay" = ["git"]
//!
//! [shell]
//! action = "overwrite"
//! pre_command = "echo deploying shell"
//!
//! [[shell.files]]
//! source_root = "zsh"
//! target_root = "$HOME"
//! paths = [".zshrc", ".zprofile"]
//! ```

use serde::{Deserialize, Deserializer};
use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter, Result as FmtResult},
    fs::read_to_string,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::warn;

/// Mapping of package manager names to required packages.
///
/// A key may name several managers separated by [`MANAGER_DELIMITER`],
/// meaning the packages can be satisfied through any one of them.
pub type DependencyMap = BTreeMap<String, Vec<String>>;

/// Separator between manager names in a [`DependencyMap`] key.
pub const MANAGER_DELIMITER: char = ',';

/// Whole configuration file.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Config {
    /// Run-wide settings from the top-level table.
    pub settings: Settings,

    /// Dot sections in the order `settings.dots` declares them.
    pub dots: Vec<Dot>,
}

impl Config {
    /// Read and parse configuration file at `path`.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Read`] if the file cannot be read.
    /// - Return any parsing error [`Config::from_str`] produces.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = read_to_string(path.as_ref()).map_err(|source| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source,
        })?;

        data.parse()
    }

    /// Resolve effective action of a file-group.
    ///
    /// File-group action beats dot action, which beats the default action.
    /// With nothing set anywhere the action is an empty [`Action::Unknown`],
    /// so the group gets skipped.
    pub fn action_for(&self, dot: &Dot, group: &FileGroup) -> Action {
        group
            .action
            .as_ref()
            .or(dot.action.as_ref())
            .or(self.settings.default_action.as_ref())
            .cloned()
            .unwrap_or_else(|| Action::Unknown(String::new()))
    }

    fn flag_unknown_actions(&self) {
        if let Some(Action::Unknown(name)) = &self.settings.default_action {
            warn!("default action {name:?} is not recognized");
        }

        for dot in &self.dots {
            if let Some(Action::Unknown(name)) = &dot.action {
                warn!("dot {:?} uses unrecognized action {name:?}", dot.name);
            }

            for group in &dot.files {
                if let Some(Action::Unknown(name)) = &group.action {
                    warn!(
                        "file-group {:?} of dot {:?} uses unrecognized action {name:?}",
                        group.source_root.as_deref().unwrap_or_default(),
                        dot.name
                    );
                }
            }
        }
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let settings: Settings = toml::de::from_str(data)?;
        if settings.dots.is_empty() {
            return Err(ConfigError::NoDots);
        }

        // INVARIANT: Dot sections live beside settings in the same table.
        let sections: toml::Table = toml::de::from_str(data)?;
        let mut dots = Vec::with_capacity(settings.dots.len());
        for name in &settings.dots {
            let section = sections
                .get(name)
                .cloned()
                .ok_or_else(|| ConfigError::MissingDot(name.clone()))?;
            let mut dot = section
                .try_into::<Dot>()
                .map_err(|source| ConfigError::InvalidDot {
                    name: name.clone(),
                    source,
                })?;
            dot.name = name.clone();
            dots.push(dot);
        }

        let config = Self { settings, dots };
        config.flag_unknown_actions();

        Ok(config)
    }
}

/// Run-wide settings.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize)]
pub struct Settings {
    /// Ordered listing of dot section names to deploy.
    pub dots: Vec<String>,

    /// Action used when neither dot nor file-group specify one.
    pub default_action: Option<Action>,

    /// Package managers to check dependencies against.
    #[serde(default)]
    pub package_manager: ManagerSelection,

    /// Commands to run before any dot.
    #[serde(default, deserialize_with = "one_or_many")]
    pub start_command: Vec<String>,

    /// Commands to run after every dot.
    #[serde(default, deserialize_with = "one_or_many")]
    pub end_command: Vec<String>,

    /// Dependencies that gate the whole run.
    #[serde(default)]
    pub dependency: DependencyMap,

    /// Local source directory, relative to the configuration file.
    pub source: Option<PathBuf>,

    /// Remote repository to clone the source tree from.
    pub git: Option<GitSource>,
}

/// Remote source repository descriptor.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize)]
pub struct GitSource {
    /// URL to clone from.
    pub url: String,

    /// Branch to check out instead of the remote default.
    pub branch: Option<String>,

    /// Tag to check out. Takes priority over `branch`.
    pub version: Option<String>,
}

/// Single dot section.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize)]
pub struct Dot {
    /// Section name this dot was read from.
    #[serde(skip)]
    pub name: String,

    /// Action override for every file-group of this dot.
    pub action: Option<Action>,

    /// Commands to run before deploying file-groups.
    #[serde(default, deserialize_with = "one_or_many")]
    pub pre_command: Vec<String>,

    /// Commands to run after deploying file-groups.
    #[serde(default, deserialize_with = "one_or_many")]
    pub post_command: Vec<String>,

    /// Dependencies that gate only this dot.
    #[serde(default)]
    pub dependency: DependencyMap,

    /// File-groups in deployment order.
    #[serde(default)]
    pub files: Vec<FileGroup>,
}

/// One source root to target root mapping with its list of paths.
///
/// All string fields may hold environment references, which stay unexpanded
/// until the group is deployed.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize)]
pub struct FileGroup {
    pub action: Option<Action>,
    pub source_root: Option<String>,
    pub target_root: Option<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub paths: Vec<String>,
}

/// Conflict policy applied when deploying a path.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Action {
    /// Leave existing targets alone, only fill in missing ones.
    Preserve,

    /// Replace targets with a fresh copy of the source.
    Overwrite,

    /// Currently behaves exactly like [`Action::Overwrite`].
    Sync,

    /// Unrecognized action name, kept for diagnostics.
    Unknown(String),
}

impl Action {
    /// Check if this action removes existing targets before copying.
    pub fn replaces_target(&self) -> bool {
        matches!(self, Self::Overwrite | Self::Sync)
    }
}

impl From<&str> for Action {
    fn from(name: &str) -> Self {
        match name {
            "preserve" => Self::Preserve,
            "overwrite" => Self::Overwrite,
            "sync" => Self::Sync,
            other => Self::Unknown(other.into()),
        }
    }
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        Ok(Self::from(name.as_str()))
    }
}

impl Display for Action {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Preserve => fmt.write_str("preserve"),
            Self::Overwrite => fmt.write_str("overwrite"),
            Self::Sync => fmt.write_str("sync"),
            Self::Unknown(name) if name.is_empty() => fmt.write_str("<unset>"),
            Self::Unknown(name) => fmt.write_str(name),
        }
    }
}

/// Package managers selected by configuration.
#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub enum ManagerSelection {
    /// Use every package manager detected on the host.
    #[default]
    Auto,

    /// Use this exact listing.
    Explicit(Vec<String>),
}

impl<'de> Deserialize<'de> for ManagerSelection {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let names: Vec<String> = one_or_many(deserializer)?
            .into_iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();

        if names.is_empty() || names == ["auto"] {
            Ok(Self::Auto)
        } else {
            Ok(Self::Explicit(names))
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values,
    })
}

/// Expand environment references and leading tilde in `value`.
///
/// # Errors
///
/// - Return [`ConfigError::ShellExpansion`] if a referenced variable is not
///   set, or is not valid unicode.
pub fn expand(value: &str) -> Result<String> {
    Ok(shellexpand::full(value)?.into_owned())
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read configuration file {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Dot section exists but has the wrong shape.
    #[error("dot section {name:?} is invalid")]
    InvalidDot {
        name: String,
        #[source]
        source: toml::de::Error,
    },

    /// Dot listed in `dots` has no section of its own.
    #[error("dot {0:?} is listed but has no section")]
    MissingDot(String),

    /// Configuration lists no dots at all.
    #[error("no dots declared in configuration")]
    NoDots,

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
