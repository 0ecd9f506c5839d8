use crate::backend::validate_key;
use crate::error::StorageError;
use std::path::{Path, PathBuf};

/// Maps a key onto a physical path under `root`, refusing anything that would land
/// outside the sandbox.
///
/// The key is checked lexically first. The deepest ancestor that already exists on
/// disk is then canonicalized, so a symlinked shard directory pointing elsewhere is
/// rejected even though the key itself looks harmless.
pub(crate) fn resolve_key(root: &Path, key: &str) -> Result<PathBuf, StorageError> {
    validate_key(key)?;
    let joined = key.split('/').fold(root.to_path_buf(), |path, segment| path.join(segment));
    confine(root, &joined)?;
    Ok(joined)
}

fn confine(root: &Path, joined: &Path) -> Result<(), StorageError> {
    let mut current = Some(joined);

    while let Some(path) = current {
        if path == root {
            return Ok(());
        }

        match path.canonicalize() {
            Ok(canonical) if canonical.starts_with(root) => return Ok(()),
            Ok(canonical) => {
                return Err(StorageError::PathTraversalAttempt {
                    message: canonical.display().to_string().into(),
                    context: Some("Resolved outside the sandbox via a symlink".into()),
                });
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => current = path.parent(),
            Err(e) => {
                return Err(StorageError::Io {
                    source: e,
                    context: Some(format!("Failed to verify {}", path.display()).into()),
                });
            },
        }
    }

    Err(StorageError::PathTraversalAttempt {
        message: joined.display().to_string().into(),
        context: Some("No ancestor found within the sandbox".into()),
    })
}
