//! Atomic writes and directory helpers

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use fs2::FileExt;

use crate::{Error, NormalizedPath, Result};

/// Write content atomically to a file with locking.
///
/// Uses write-to-temp-then-rename so readers never observe a partially
/// written file. Acquires an advisory lock on the temp file while writing.
pub fn write_atomic(path: &NormalizedPath, content: &[u8]) -> Result<()> {
    let native_path = path.to_native();

    if let Some(parent) = native_path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    // Same directory keeps the rename on one filesystem
    let temp_name = format!(
        ".{}.{}.tmp",
        native_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default(),
        std::process::id()
    );
    let temp_path = native_path.with_file_name(&temp_name);

    let mut temp_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)
        .map_err(|e| Error::io(&temp_path, e))?;

    temp_file.lock_exclusive().map_err(|_| Error::LockFailed {
        path: native_path.clone(),
    })?;

    temp_file
        .write_all(content)
        .map_err(|e| Error::io(&temp_path, e))?;
    temp_file.sync_all().map_err(|e| Error::io(&temp_path, e))?;

    temp_file.unlock().map_err(|_| Error::LockFailed {
        path: native_path.clone(),
    })?;

    fs::rename(&temp_path, &native_path).map_err(|e| Error::io(&native_path, e))?;

    Ok(())
}

/// Read text content from a file.
pub fn read_text(path: &NormalizedPath) -> Result<String> {
    let native_path = path.to_native();
    fs::read_to_string(&native_path).map_err(|e| Error::io(&native_path, e))
}

/// Write text content to a file atomically.
pub fn write_text(path: &NormalizedPath, content: &str) -> Result<()> {
    write_atomic(path, content.as_bytes())
}

/// Create an empty file at `path` unless something already exists there.
///
/// Returns `true` when the file was created.
pub fn touch(path: &Path) -> Result<bool> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(Error::io(path, e)),
    }
}

/// Remove a directory tree or a symbolic link at `path`.
///
/// A link is removed without touching its target. Returns `false` when
/// nothing existed at `path`; anything else (a regular file, a socket) is
/// rejected rather than deleted.
pub fn remove_dir_or_link(path: &Path) -> Result<bool> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(Error::io(path, e)),
    };

    if meta.file_type().is_symlink() {
        remove_link(path)?;
    } else if meta.is_dir() {
        fs::remove_dir_all(path).map_err(|e| Error::io(path, e))?;
    } else {
        return Err(Error::NotDirectoryOrLink {
            path: path.to_path_buf(),
        });
    }
    Ok(true)
}

#[cfg(not(windows))]
fn remove_link(path: &Path) -> Result<()> {
    fs::remove_file(path).map_err(|e| Error::io(path, e))
}

#[cfg(windows)]
fn remove_link(path: &Path) -> Result<()> {
    // Directory junctions and symlinks to directories need remove_dir
    fs::remove_dir(path)
        .or_else(|_| fs::remove_file(path))
        .map_err(|e| Error::io(path, e))
}

/// Create a directory symbolic link at `link` pointing to `target`.
pub fn symlink_dir(target: &Path, link: &Path) -> Result<()> {
    #[cfg(not(windows))]
    let result = std::os::unix::fs::symlink(target, link);
    #[cfg(windows)]
    let result = std::os::windows::fs::symlink_dir(target, link);
    result.map_err(|e| Error::io(link, e))
}

/// Recursively copy the contents of `src` into `dst`.
///
/// `dst` is created if needed; existing files are overwritten. Symbolic links
/// inside `src` are followed and their targets copied as regular content,
/// except directory links that lead back into their own ancestry, which are
/// skipped.
pub fn copy_dir_all(src: &Path, dst: &Path) -> Result<()> {
    if dst.starts_with(src) {
        return Err(Error::CopyIntoSelf {
            src: src.to_path_buf(),
            dst: dst.to_path_buf(),
        });
    }

    let mut pending = vec![(src.to_path_buf(), dst.to_path_buf(), Vec::new())];
    while let Some((from, to, mut ancestors)) = pending.pop() {
        let canonical = fs::canonicalize(&from).map_err(|e| Error::io(&from, e))?;
        if ancestors.contains(&canonical) {
            tracing::debug!(path = %from.display(), "Skipping directory link into its own ancestry");
            continue;
        }
        ancestors.push(canonical);

        fs::create_dir_all(&to).map_err(|e| Error::io(&to, e))?;
        let entries = fs::read_dir(&from).map_err(|e| Error::io(&from, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| Error::io(&from, e))?;
            let source = entry.path();
            let target = to.join(entry.file_name());
            let meta = fs::metadata(&source).map_err(|e| Error::io(&source, e))?;
            if meta.is_dir() {
                pending.push((source, target, ancestors.clone()));
            } else {
                fs::copy(&source, &target).map_err(|e| Error::io(&source, e))?;
            }
        }
    }
    Ok(())
}

/// Append `line` to the text file at `path` unless a line equal to it is
/// already present.
///
/// `comment` is written on its own line before `line` so readers know where
/// the entry came from. Returns `true` when the file was changed.
pub fn append_line_once(path: &NormalizedPath, comment: &str, line: &str) -> Result<bool> {
    let existing = if path.exists() {
        read_text(path)?
    } else {
        String::new()
    };

    if existing.lines().any(|l| l.trim() == line) {
        return Ok(false);
    }

    let mut updated = existing;
    if !updated.is_empty() {
        if !updated.ends_with('\n') {
            updated.push('\n');
        }
        updated.push('\n');
    }
    updated.push_str(comment);
    updated.push('\n');
    updated.push_str(line);
    updated.push('\n');

    write_text(path, &updated)?;
    tracing::debug!(path = %path, line = %line, "Appended line");
    Ok(true)
}
