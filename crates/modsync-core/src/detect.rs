//! Modification detection
//!
//! Answers "has the user touched anything we gave them": the walk is driven
//! by the pristine snapshot, so files that only exist in the working copy
//! never count as modifications.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Directory names skipped during the walk besides hidden entries.
const SKIPPED_DIRS: &[&str] = &["__pycache__"];

const CHUNK: usize = 8 * 1024;

/// Whether `working` differs from the pristine tree at `pristine`.
///
/// Returns on the first difference. A pristine entry that is neither a file
/// nor a directory (a dangling link, a socket) is reported as
/// [`Error::InvalidCacheEntry`].
pub fn is_modified(working: &Path, pristine: &Path) -> Result<bool> {
    if !pristine.is_dir() {
        tracing::warn!(
            pristine = %pristine.display(),
            "Pristine snapshot is missing, treating working copy as modified"
        );
        return Ok(true);
    }

    let mut visited = HashSet::new();
    let mut pending: Vec<(PathBuf, PathBuf)> = vec![(pristine.to_path_buf(), working.to_path_buf())];

    while let Some((pristine_dir, working_dir)) = pending.pop() {
        // Symlink cycles inside a snapshot would otherwise loop forever
        let canonical = dunce::canonicalize(&pristine_dir)?;
        if !visited.insert(canonical) {
            continue;
        }

        let entries = fs::read_dir(&pristine_dir).map_err(|e| modsync_fs::Error::io(&pristine_dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| modsync_fs::Error::io(&pristine_dir, e))?;
            let name = entry.file_name();
            if is_skipped(&name.to_string_lossy()) {
                continue;
            }

            let pristine_path = entry.path();
            let working_path = working_dir.join(&name);
            let meta = fs::metadata(&pristine_path).map_err(|_| Error::InvalidCacheEntry {
                path: pristine_path.clone(),
            })?;

            if meta.is_file() {
                if !files_equal(&pristine_path, &working_path)? {
                    tracing::debug!(
                        path = %working_path.display(),
                        "Working copy differs from pristine snapshot"
                    );
                    return Ok(true);
                }
            } else if meta.is_dir() {
                pending.push((pristine_path, working_path));
            } else {
                return Err(Error::InvalidCacheEntry { path: pristine_path });
            }
        }
    }

    Ok(false)
}

fn is_skipped(name: &str) -> bool {
    name.starts_with('.') || SKIPPED_DIRS.contains(&name)
}

/// Byte-for-byte comparison; a missing or non-file working entry differs.
fn files_equal(pristine: &Path, working: &Path) -> Result<bool> {
    let working_meta = match fs::metadata(working) {
        Ok(meta) if meta.is_file() => meta,
        _ => return Ok(false),
    };
    let pristine_meta = fs::metadata(pristine).map_err(|e| modsync_fs::Error::io(pristine, e))?;
    if working_meta.len() != pristine_meta.len() {
        return Ok(false);
    }

    let mut left = BufReader::new(File::open(pristine).map_err(|e| modsync_fs::Error::io(pristine, e))?);
    let mut right = BufReader::new(File::open(working).map_err(|e| modsync_fs::Error::io(working, e))?);
    let mut left_buf = [0u8; CHUNK];
    let mut right_buf = [0u8; CHUNK];

    loop {
        let read = read_full(&mut left, &mut left_buf).map_err(|e| modsync_fs::Error::io(pristine, e))?;
        let other = read_full(&mut right, &mut right_buf).map_err(|e| modsync_fs::Error::io(working, e))?;
        if read != other || left_buf[..read] != right_buf[..other] {
            return Ok(false);
        }
        if read == 0 {
            return Ok(true);
        }
    }
}

/// Fill `buf` as far as the reader allows; returns the number of bytes read.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}
