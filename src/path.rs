// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Well-known locations.
//!
//! Where the configuration file lives by default, and where backups and
//! cloned sources are kept. Nothing here touches the file system.

use std::{
    env::var_os,
    path::{Component, Path, PathBuf},
};

/// Name of the directory Deez claims under the config and cache directories.
pub const APP_DIR: &str = "deez-dots";

/// Environment variable that overrides the cache base directory.
pub const CACHE_HOME_VAR: &str = "DEEZ_CACHE_HOME";

/// Determine default absolute path to the configuration file.
///
/// Uses `$XDG_CONFIG_HOME/deez-dots/deez.toml` on Linux, and whatever the
/// platform equivalent of the user configuration directory is elsewhere.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn default_config_file() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join(APP_DIR).join("deez.toml"))
        .ok_or(NoWayHome)
}

/// Determine the base directory that backups and clones live under.
///
/// Checks `$DEEZ_CACHE_HOME` first, then `$XDG_CACHE_HOME`, and finally
/// falls back to the platform cache directory. The application directory is
/// always appended to the result.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn cache_base_dir() -> Result<PathBuf> {
    let base = [CACHE_HOME_VAR, "XDG_CACHE_HOME"]
        .into_iter()
        .filter_map(var_os)
        .find(|value| !value.is_empty())
        .map(PathBuf::from)
        .or_else(dirs::cache_dir)
        .ok_or(NoWayHome)?;

    Ok(base.join(APP_DIR))
}

/// Directory holding every backup taken by this run.
///
/// Layout is `<base>/backup/<timestamp>`, where timestamp is formatted as
/// `YYYYmmddHHMMSS` in local time.
pub fn backup_run_dir(base: impl AsRef<Path>) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d%H%M%S").to_string();
    base.as_ref().join("backup").join(stamp)
}

/// Directory that cloned sources are kept in.
pub fn clones_dir(base: impl AsRef<Path>) -> PathBuf {
    base.as_ref().join("clones")
}

/// Append only the normal components of `parts` onto `root`.
///
/// Root, prefix, current and parent directory components are dropped, so the
/// result can never escape `root`. Used to namespace backup entries by values
/// that came out of user configuration.
pub fn nest_under(root: impl AsRef<Path>, parts: &[&Path]) -> PathBuf {
    let mut nested = root.as_ref().to_path_buf();
    for part in parts {
        for component in part.components() {
            if let Component::Normal(name) = component {
                nested.push(name);
            }
        }
    }

    nested
}

/// No way to determine user's home directory.
///
/// # See Also
///
/// - [`dirs::home_dir`](https://docs.rs/dirs/latest/dirs/fn.home_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's home directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use sealed_test::prelude::*;
    use simple_test_case::test_case;

    #[test_case("zsh", ".zshrc", "/backup/shell/zsh/.zshrc"; "relative parts")]
    #[test_case("/etc/zsh", ".zshrc", "/backup/shell/etc/zsh/.zshrc"; "absolute source root")]
    #[test_case("../up", "./x/../y", "/backup/shell/up/x/y"; "parent components dropped")]
    #[test]
    fn nest_under_keeps_normal_components(source: &str, path: &str, expect: &str) {
        let result = nest_under(
            "/backup",
            &[Path::new("shell"), Path::new(source), Path::new(path)],
        );
        assert_eq!(result, PathBuf::from(expect));
    }

    #[sealed_test(env = [("DEEZ_CACHE_HOME", "/tmp/deez-cache"), ("XDG_CACHE_HOME", "/tmp/xdg")])]
    fn cache_base_dir_prefers_override() -> anyhow::Result<()> {
        assert_eq!(cache_base_dir()?, PathBuf::from("/tmp/deez-cache/deez-dots"));
        Ok(())
    }

    #[sealed_test(env = [("DEEZ_CACHE_HOME", ""), ("XDG_CACHE_HOME", "/tmp/xdg")])]
    fn cache_base_dir_falls_back_to_xdg() -> anyhow::Result<()> {
        assert_eq!(cache_base_dir()?, PathBuf::from("/tmp/xdg/deez-dots"));
        Ok(())
    }

    #[test]
    fn backup_run_dir_is_timestamped() {
        let dir = backup_run_dir("/base");
        let stamp = dir.file_name().unwrap().to_string_lossy().into_owned();
        assert_eq!(dir.parent(), Some(Path::new("/base/backup")));
        assert_eq!(stamp.len(), 14);
        assert!(stamp.chars().all(|c| c.is_ascii_digit()));
    }
}
