// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Source tree acquisition.
//!
//! File-group source roots are relative to a single __source root__. That
//! root is either a local directory, or a clone of a remote repository kept
//! in the clones directory.
//!
//! # Clone Layout
//!
//! Each clone is stored as `<clones>/<owner>.<repo>[.<version>]`. A clone
//! that already exists is fetched and checked out again instead of being
//! cloned from scratch. Checking out the same branch or tag twice leaves the
//! clone in the same state.

use crate::config::{expand, GitSource, Settings};

use auth_git2::{GitAuthenticator, Prompter};
use git2::{
    build::{CheckoutBuilder, RepoBuilder},
    AutotagOption, BranchType, Config, FetchOptions, RemoteCallbacks, Repository,
};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Password, Text};
use std::{
    fs::canonicalize,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};
use tracing::{debug, info, instrument};

/// Determine the source root for this run.
///
/// Precedence, highest first: explicit override, `[git]` clone, `source`
/// key, then the directory holding the configuration file. The `source` key
/// is relative to the configuration file's directory.
///
/// # Errors
///
/// - Return [`SourceError::Config`] if the `source` key cannot be expanded.
/// - Return any error of [`SourceAccess::acquire`].
pub fn resolve_source_root(
    access: &impl SourceAccess,
    config_file: &Path,
    settings: &Settings,
    override_root: Option<&Path>,
    clones: &Path,
) -> Result<PathBuf> {
    if let Some(root) = override_root {
        debug!("using source root override {}", root.display());
        return Ok(root.to_path_buf());
    }

    if let Some(git) = &settings.git {
        return access.acquire(git, clones);
    }

    let config_file = canonicalize(config_file).unwrap_or_else(|_| config_file.to_path_buf());
    let config_dir = config_file
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    match &settings.source {
        Some(source) => Ok(config_dir.join(expand(&source.to_string_lossy())?)),
        None => Ok(config_dir),
    }
}

/// Name of the clone directory for `url` at `version`.
///
/// # Errors
///
/// - Return [`SourceError::InvalidUrl`] if no owner and repository name can
///   be taken from `url`.
pub fn clone_dir_name(url: &str, version: Option<&str>) -> Result<String> {
    let trimmed = url.trim_end_matches('/');
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);
    let mut parts = trimmed.rsplit(['/', ':']);
    let repo = parts.next().filter(|part| !part.is_empty());
    let owner = parts.next().filter(|part| !part.is_empty());

    match (owner, repo) {
        (Some(owner), Some(repo)) => Ok(match version {
            Some(version) => format!("{owner}.{repo}.{}", version.replace('/', "-")),
            None => format!("{owner}.{repo}"),
        }),
        _ => Err(SourceError::InvalidUrl(url.into())),
    }
}

/// Layer of indirection for remote source access.
pub trait SourceAccess {
    /// Make `source` available locally under `clones`, returning its path.
    fn acquire(&self, source: &GitSource, clones: &Path) -> Result<PathBuf>;
}

/// Remote source access through libgit2.
#[derive(Debug, Default)]
pub struct Git2Source;

impl SourceAccess for Git2Source {
    /// Clone or update `source`, then check out its branch or tag.
    ///
    /// Progress is displayed through a progress bar. If credentials are
    /// required, the user is prompted for them, blocking the progress bar.
    ///
    /// # Errors
    ///
    /// - Return [`SourceError::Git2`] if libgit2 operations fail.
    /// - Return [`SourceError::Io`] if clones directory cannot be created.
    #[instrument(skip(self, source, clones), level = "debug")]
    fn acquire(&self, source: &GitSource, clones: &Path) -> Result<PathBuf> {
        let path = clones.join(clone_dir_name(&source.url, source.version.as_deref())?);
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{elapsed_precise:.green}  {msg:<50}  [{wide_bar:.yellow/blue}]",
        )?
        .progress_chars("-Cco.");
        bar.set_style(style);
        bar.set_message(source.url.clone());
        bar.enable_steady_tick(Duration::from_millis(100));

        let repository = match Repository::open(&path) {
            Ok(repository) => {
                info!("fetch {} into {}", source.url, path.display());
                with_fetch_options(&bar, |mut options| {
                    repository
                        .find_remote("origin")?
                        .fetch(&[] as &[&str], Some(&mut options), None)
                })?;
                repository
            }
            Err(_) => {
                info!("clone {} into {}", source.url, path.display());
                mkdirp::mkdirp(clones)?;
                with_fetch_options(&bar, |options| {
                    let mut builder = RepoBuilder::new();
                    builder.fetch_options(options);
                    if let (Some(branch), None) = (&source.branch, &source.version) {
                        builder.branch(branch);
                    }
                    builder.clone(&source.url, &path)
                })?
            }
        };

        checkout(&repository, source)?;
        bar.finish_and_clear();

        Ok(path)
    }
}

fn with_fetch_options<T>(
    bar: &ProgressBar,
    action: impl FnOnce(FetchOptions<'_>) -> Result<T, git2::Error>,
) -> Result<T> {
    let authenticator = GitAuthenticator::default().set_prompter(SuspendingPrompter(bar.clone()));
    let config = Config::open_default()?;

    let progress = bar.clone();
    let mut throttle = Instant::now();
    let mut rc = RemoteCallbacks::new();
    rc.credentials(authenticator.credentials(&config));
    rc.transfer_progress(move |stats| {
        if throttle.elapsed() > Duration::from_millis(10) {
            throttle = Instant::now();
            progress.set_length(stats.total_objects() as u64);
            progress.set_position(stats.received_objects() as u64);
        }
        true
    });

    let mut options = FetchOptions::new();
    options.remote_callbacks(rc);
    options.download_tags(AutotagOption::All);

    Ok(action(options)?)
}

fn checkout(repository: &Repository, source: &GitSource) -> Result<()> {
    let mut options = CheckoutBuilder::new();
    options.force();

    // INVARIANT: Version tags win over branches.
    if let Some(version) = &source.version {
        debug!("check out tag {version}");
        let commit = repository
            .revparse_single(&format!("refs/tags/{version}"))?
            .peel_to_commit()?;
        repository.checkout_tree(commit.as_object(), Some(&mut options))?;
        repository.set_head_detached(commit.id())?;
        return Ok(());
    }

    let branch = match &source.branch {
        Some(branch) => branch.clone(),
        None => default_branch(repository)?,
    };
    debug!("check out branch {branch}");
    let commit = repository
        .find_reference(&format!("refs/remotes/origin/{branch}"))?
        .peel_to_commit()?;

    match repository.find_branch(&branch, BranchType::Local) {
        Ok(local) => {
            local
                .into_reference()
                .set_target(commit.id(), "deez: update to origin")?;
        }
        Err(_) => {
            repository.branch(&branch, &commit, false)?;
        }
    }

    repository.checkout_tree(commit.as_object(), Some(&mut options))?;
    repository.set_head(&format!("refs/heads/{branch}"))?;

    Ok(())
}

fn default_branch(repository: &Repository) -> Result<String> {
    if let Ok(reference) = repository.find_reference("refs/remotes/origin/HEAD") {
        if let Some(name) = reference
            .symbolic_target()
            .and_then(|target| target.strip_prefix("refs/remotes/origin/"))
        {
            return Ok(name.to_string());
        }
    }

    let head = repository.head()?;
    match head.shorthand() {
        Some(name) if head.is_branch() => Ok(name.to_string()),
        _ => Err(SourceError::NoDefaultBranch),
    }
}

/// Credential prompts that pause the progress bar while asking.
#[derive(Debug, Clone)]
struct SuspendingPrompter(ProgressBar);

impl SuspendingPrompter {
    fn ask(&self, label: &str, secret: bool) -> Option<String> {
        self.0.suspend(|| {
            if secret {
                Password::new(label).without_confirmation().prompt().ok()
            } else {
                Text::new(label).prompt().ok()
            }
        })
    }
}

impl Prompter for SuspendingPrompter {
    fn prompt_username_password(
        &mut self,
        url: &str,
        _config: &git2::Config,
    ) -> Option<(String, String)> {
        info!("{url} wants a username and password");
        Some((self.ask("username", false)?, self.ask("password", true)?))
    }

    fn prompt_password(
        &mut self,
        username: &str,
        url: &str,
        _config: &git2::Config,
    ) -> Option<String> {
        info!("{url} wants the password of {username}");
        self.ask("password", true)
    }

    fn prompt_ssh_key_passphrase(
        &mut self,
        ssh_key_path: &Path,
        _config: &git2::Config,
    ) -> Option<String> {
        info!("{} is locked by a passphrase", ssh_key_path.display());
        self.ask("passphrase", true)
    }
}

/// Source acquisition error types.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Owner and repository name cannot be taken from URL.
    #[error("cannot determine owner and repository name of {0:?}")]
    InvalidUrl(String),

    /// Remote has no default branch to check out.
    #[error("cannot determine default branch to check out")]
    NoDefaultBranch,

    /// Local source path cannot be expanded.
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    /// Style template cannot be set for progress bars.
    #[error(transparent)]
    IndicatifStyleTemplate(#[from] indicatif::style::TemplateError),

    /// Clones directory cannot be created.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),
}

/// Friendly result alias :3
type Result<T, E = SourceError> = std::result::Result<T, E>;
