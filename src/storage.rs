use std::{
    io::Write as _,
    path::{Path, PathBuf},
};

use crate::error::{PressError, PressResult};

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

pub fn ensure_parent_dir(path: &Path) -> PressResult<()> {
    let parent = parent_dir(path);
    std::fs::create_dir_all(&parent).map_err(|e| PressError::storage(parent, e))
}

/// Replaces `path` with `bytes` through a sibling temp file and a rename, so a
/// reader never observes a partially written artifact. Returns the size of
/// the persisted file as reported by the filesystem.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> PressResult<u64> {
    ensure_parent_dir(path)?;
    let dir = parent_dir(path);

    let mut tmp = tempfile::Builder::new()
        .prefix(".collage-press-")
        .suffix(".tmp")
        .tempfile_in(&dir)
        .map_err(|e| PressError::storage(&dir, e))?;

    tmp.write_all(bytes)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| PressError::storage(tmp.path(), e))?;

    // on failure the NamedTempFile inside the error is dropped, which unlinks it
    tmp.persist(path)
        .map_err(|e| PressError::storage(path, e.error))?;

    let len = std::fs::metadata(path)
        .map_err(|e| PressError::storage(path, e))?
        .len();
    tracing::trace!(path = %path.display(), bytes = len, "artifact persisted");
    Ok(len)
}
