// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::RepoFixture;

use anyhow::Result;
use deez::{
    config::GitSource,
    source::{Git2Source, SourceAccess},
};
use pretty_assertions::assert_eq;
use std::{fs::read_to_string, path::Path};
use tempfile::TempDir;

fn git_source(remote: &Path, branch: Option<&str>, version: Option<&str>) -> GitSource {
    GitSource {
        url: remote.to_string_lossy().into_owned(),
        branch: branch.map(Into::into),
        version: version.map(Into::into),
    }
}

#[test]
fn acquire_clones_then_updates() -> Result<()> {
    let dir = TempDir::new()?;
    let remote = dir.path().join("owner").join("dots");
    let clones = dir.path().join("clones");
    let fixture = RepoFixture::new(&remote)?;
    fixture.stage_and_commit("zsh/.zshrc", "export EDITOR=vim")?;

    let source = git_source(&remote, None, None);
    let path = Git2Source.acquire(&source, &clones)?;
    assert_eq!(path, clones.join("owner.dots"));
    assert_eq!(read_to_string(path.join("zsh/.zshrc"))?, "export EDITOR=vim");

    fixture.stage_and_commit("zsh/.zshrc", "export EDITOR=nvim")?;
    let path = Git2Source.acquire(&source, &clones)?;
    assert_eq!(read_to_string(path.join("zsh/.zshrc"))?, "export EDITOR=nvim");

    // Same state on repeat.
    let path = Git2Source.acquire(&source, &clones)?;
    assert_eq!(read_to_string(path.join("zsh/.zshrc"))?, "export EDITOR=nvim");

    Ok(())
}

#[test]
fn acquire_checks_out_version_tag() -> Result<()> {
    let dir = TempDir::new()?;
    let remote = dir.path().join("owner").join("dots");
    let clones = dir.path().join("clones");
    let fixture = RepoFixture::new(&remote)?;
    fixture.stage_and_commit("git/.gitconfig", "[user] v1")?;
    fixture.tag("v1.0")?;
    fixture.stage_and_commit("git/.gitconfig", "[user] v2")?;

    let source = git_source(&remote, Some("main"), Some("v1.0"));
    let path = Git2Source.acquire(&source, &clones)?;
    assert_eq!(path, clones.join("owner.dots.v1.0"));
    assert_eq!(read_to_string(path.join("git/.gitconfig"))?, "[user] v1");

    Ok(())
}

#[test]
fn acquire_checks_out_requested_branch() -> Result<()> {
    let dir = TempDir::new()?;
    let remote = dir.path().join("owner").join("dots");
    let clones = dir.path().join("clones");
    let fixture = RepoFixture::new(&remote)?;
    fixture.stage_and_commit("README", "main branch")?;

    let source = git_source(&remote, Some("main"), None);
    let path = Git2Source.acquire(&source, &clones)?;
    assert_eq!(read_to_string(path.join("README"))?, "main branch");

    let missing = git_source(&remote, Some("nope"), None);
    assert!(Git2Source.acquire(&missing, &dir.path().join("other")).is_err());

    Ok(())
}
