// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! File tree copying and removal.
//!
//! Symbolic links are never followed. A link in the source becomes a link with
//! the same target at the destination, whether it is dangling or not.

use std::{
    fs::{copy, create_dir_all, read_dir, read_link, remove_dir_all, remove_file},
    io,
    path::Path,
};

/// Check if anything exists at `path`, dangling symbolic links included.
pub fn exists(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}

/// Check if `path` is a real directory, not a link to one.
pub fn is_real_dir(path: &Path) -> bool {
    path.symlink_metadata()
        .map(|meta| meta.file_type().is_dir())
        .unwrap_or(false)
}

/// Recursively copy `from` to `to`.
///
/// Regular files keep their permissions, symbolic links are recreated as
/// links. Destination must not exist yet, or must be a directory when `from`
/// is one.
///
/// # Errors
///
/// - Return [`io::Error`] of the first entry that fails to copy.
pub fn copy_tree(from: &Path, to: &Path) -> io::Result<()> {
    let file_type = from.symlink_metadata()?.file_type();

    if file_type.is_symlink() {
        return symlink(&read_link(from)?, to);
    }

    if file_type.is_dir() {
        create_dir_all(to)?;
        for entry in read_dir(from)? {
            let entry = entry?;
            copy_tree(&entry.path(), &to.join(entry.file_name()))?;
        }

        return Ok(());
    }

    copy(from, to).map(|_| ())
}

/// Remove whatever lives at `path`.
///
/// Real directories are removed with all their contents. Files and links are
/// unlinked, so the target of a link is left alone.
///
/// # Errors
///
/// - Return [`io::Error`] if removal fails.
pub fn remove_tree(path: &Path) -> io::Result<()> {
    if is_real_dir(path) {
        remove_dir_all(path)
    } else {
        remove_link_or_file(path)
    }
}

/// Create every missing ancestor of `path`.
///
/// # Errors
///
/// - Return [`io::Error`] if a directory cannot be created.
pub fn ensure_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => mkdirp::mkdirp(parent).map(|_| ()),
        _ => Ok(()),
    }
}

#[cfg(unix)]
fn symlink(original: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(original, link)
}

#[cfg(windows)]
fn symlink(original: &Path, link: &Path) -> io::Result<()> {
    use std::os::windows::fs::{symlink_dir, symlink_file};

    // INVARIANT: Relative link targets resolve against the link's directory.
    let resolved = match link.parent() {
        Some(parent) => parent.join(original),
        None => original.to_path_buf(),
    };

    if resolved.is_dir() {
        symlink_dir(original, link)
    } else {
        symlink_file(original, link)
    }
}

#[cfg(unix)]
fn remove_link_or_file(path: &Path) -> io::Result<()> {
    remove_file(path)
}

#[cfg(windows)]
fn remove_link_or_file(path: &Path) -> io::Result<()> {
    // Directory links must go through remove_dir on Windows.
    match remove_file(path) {
        Err(_) if path.is_dir() => std::fs::remove_dir(path),
        result => result,
    }
}
