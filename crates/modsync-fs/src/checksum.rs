//! SHA-256 tree digests
//!
//! The digest is bare hex so it can name a content-addressed snapshot folder.

use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::{Error, Result};

/// Compute a digest over every regular file below `root`.
///
/// Files are visited in sorted relative-path order and both the relative
/// path and the content feed the hash, so renames change the digest.
/// Directory links leading back into their own ancestry are not descended.
/// Returns 64 lowercase hex characters without a prefix.
pub fn compute_tree_digest(root: &Path) -> Result<String> {
    let mut files = Vec::new();
    collect_files(root, Path::new(""), &mut Vec::new(), &mut files)?;
    files.sort();

    let mut hasher = Sha256::new();
    for relative in &files {
        let normalized = relative.to_string_lossy().replace('\\', "/");
        let content = fs::read(root.join(relative)).map_err(|e| Error::io(root.join(relative), e))?;
        hasher.update(normalized.as_bytes());
        hasher.update([0u8]);
        hasher.update((content.len() as u64).to_le_bytes());
        hasher.update(&content);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn collect_files(
    root: &Path,
    relative: &Path,
    ancestors: &mut Vec<PathBuf>,
    out: &mut Vec<PathBuf>,
) -> Result<()> {
    let dir = root.join(relative);
    let canonical = fs::canonicalize(&dir).map_err(|e| Error::io(&dir, e))?;
    if ancestors.contains(&canonical) {
        return Ok(());
    }
    ancestors.push(canonical);

    let entries = fs::read_dir(&dir).map_err(|e| Error::io(&dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(&dir, e))?;
        let child = relative.join(entry.file_name());
        let meta = fs::metadata(entry.path()).map_err(|e| Error::io(entry.path(), e))?;
        if meta.is_dir() {
            collect_files(root, &child, ancestors, out)?;
        } else {
            out.push(child);
        }
    }
    ancestors.pop();
    Ok(())
}
