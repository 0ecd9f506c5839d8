use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::{error, info, warn};
use walkdir::{DirEntry, WalkDir};

/// Marker embedded in in-flight write files (`<name>.fktmp.<n>`).
pub(crate) const TMP_MARKER: &str = ".fktmp.";

/// Temp files younger than this may still belong to a live writer.
const STALE_AFTER: Duration = Duration::from_secs(300);

pub(crate) fn is_tmp_name(name: &str) -> bool {
    name.contains(TMP_MARKER)
}

/// Removes write leftovers from crashed processes. Never fails; problems are logged.
pub(crate) async fn purge_tmp(root: &Path) {
    let root = root.to_path_buf();
    let now = SystemTime::now();

    match tokio::task::spawn_blocking(move || remove_stale(&root, now)).await {
        Ok((removed, failed)) if removed > 0 || failed > 0 => {
            info!(removed, failed, "Cleaned up orphaned write files");
        },
        Err(e) => error!(error = %e, "Temp file cleanup task panicked"),
        _ => {},
    }
}

fn remove_stale(root: &Path, now: SystemTime) -> (usize, usize) {
    let mut removed = 0;
    let mut failed = 0;

    for entry in WalkDir::new(root).into_iter().flatten() {
        if !entry.file_type().is_file() || !is_orphan(&entry, now) {
            continue;
        }
        match std::fs::remove_file(entry.path()) {
            Ok(()) => removed += 1,
            Err(e) => {
                warn!(path = %entry.path().display(), error = %e, "Failed to remove orphaned write file");
                failed += 1;
            },
        }
    }

    (removed, failed)
}

fn is_orphan(entry: &DirEntry, now: SystemTime) -> bool {
    let named_tmp = entry.file_name().to_str().is_some_and(is_tmp_name);
    named_tmp
        && entry
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .and_then(|modified| now.duration_since(modified).ok())
            .is_none_or(|age| age > STALE_AFTER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_stale_tmp_files_are_removed() {
        let tmp = tempfile::tempdir().unwrap();
        let shard = tmp.path().join("uploads").join("1");
        std::fs::create_dir_all(&shard).unwrap();
        std::fs::write(shard.join("a.png.fktmp.3"), b"partial").unwrap();
        std::fs::write(shard.join("a.png"), b"done").unwrap();

        let later = SystemTime::now() + Duration::from_secs(3600);
        let (removed, failed) = remove_stale(tmp.path(), later);

        assert_eq!((removed, failed), (1, 0));
        assert!(shard.join("a.png").exists());
        assert!(!shard.join("a.png.fktmp.3").exists());
    }

    #[test]
    fn fresh_tmp_files_survive() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("b.bin.fktmp.1"), b"live").unwrap();

        let (removed, _) = remove_stale(tmp.path(), SystemTime::now());
        assert_eq!(removed, 0);
    }
}
